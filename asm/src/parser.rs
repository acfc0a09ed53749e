use crate::error::Error;
use crate::expr::{parse_expr, BinaryOp, Expr};
use crate::lexer::tokenize;
use crate::token::{Token, TokenKind};
use serde::Serialize;
use strum::{Display, EnumString};

/// Position of a line: index of the source file and 1-based line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Location {
    pub file: usize,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub name: String,
    /// `name::` ignores the enclosing `#local` scope
    pub global: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataWidth {
    Byte,
    Word,
    Long,
}

impl DataWidth {
    pub fn size(self) -> usize {
        match self {
            DataWidth::Byte => 1,
            DataWidth::Word => 2,
            DataWidth::Long => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataItem {
    Expr(Expr),
    /// String bytes; the optional operation applies to the last byte only
    Text(Vec<u8>, Option<(BinaryOp, Expr)>),
    Predefined(Predefined),
}

/// Names that expand to text inside `db` and its aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum Predefined {
    /// `YYYY-MM-DD`
    #[strum(serialize = "__date__")]
    Date,
    /// `HH:MM:SS`
    #[strum(serialize = "__time__")]
    Time,
    #[strum(serialize = "__file__")]
    File,
    /// 1-based, in decimal
    #[strum(serialize = "__line__")]
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Target {
    Bin,
    Rom,
}

impl Target {
    /// Default fill byte of `ds` and `align`
    pub fn fill(self) -> u8 {
        match self {
            Target::Bin => 0x00,
            Target::Rom => 0xFF,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
enum Directive {
    #[strum(
        serialize = "db",
        serialize = "defb",
        serialize = ".db",
        serialize = ".byte",
        serialize = "defm",
        serialize = "dm",
        serialize = ".dm",
        serialize = ".text",
        serialize = ".ascii"
    )]
    DefByte,
    #[strum(serialize = "dw", serialize = "defw", serialize = ".dw", serialize = ".word")]
    DefWord,
    #[strum(serialize = ".long")]
    DefLong,
    #[strum(serialize = "equ", serialize = ".equ")]
    Equ,
    #[strum(serialize = "org", serialize = ".org", serialize = ".loc")]
    Org,
    #[strum(serialize = "align", serialize = ".align")]
    Align,
    #[strum(
        serialize = "ds",
        serialize = "defs",
        serialize = ".ds",
        serialize = ".block",
        serialize = ".blkb",
        serialize = "data"
    )]
    Fill,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Instruction { mnemonic: String, operands: Vec<Token> },
    Data(DataWidth, Vec<DataItem>),
    Equ(Expr),
    Org(Expr),
    Align { boundary: Expr, fill: Option<Expr> },
    Fill { count: Expr, fill: Option<Expr> },
    Code { name: String, address: Option<Expr> },
    Local,
    EndLocal,
    Target(Target),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub loc: Location,
    pub label: Option<Label>,
    pub stmt: Option<Stmt>,
}

impl Line {
    pub fn parse(loc: Location, raw: &str) -> Result<Line, Error> {
        let mut tokens = tokenize(raw)?;
        if let Some(Token {
            kind: TokenKind::Comment(_),
            ..
        }) = tokens.last()
        {
            tokens.pop();
        }

        let mut line = Line {
            loc,
            label: None,
            stmt: None,
        };
        let mut rest = &tokens[..];

        // Directive: "#" name args
        if let [Token {
            kind: TokenKind::Hash,
            ..
        }, tail @ ..] = rest
        {
            line.stmt = Some(parse_hash_directive(tail)?);
            return Ok(line);
        }

        // Label: ident in column 1, or any ident followed by ":"
        if let [Token {
            kind: TokenKind::Ident(name),
            col,
        }, tail @ ..] = rest
        {
            let colon = matches!(tail.first(), Some(t) if t.kind == TokenKind::Colon);
            if *col == 0 || colon {
                let mut global = false;
                rest = tail;
                if colon {
                    rest = &rest[1..];
                    if let [Token {
                        kind: TokenKind::Colon,
                        ..
                    }, tail @ ..] = rest
                    {
                        global = true;
                        rest = tail;
                    }
                }
                line.label = Some(Label {
                    name: name.clone(),
                    global,
                });
            }
        }

        let (mnemonic, args) = match rest {
            [] => return Ok(line),
            [Token {
                kind: TokenKind::Ident(word),
                ..
            }, args @ ..] => (word.to_ascii_lowercase(), args),
            [token, ..] => {
                return Err(Error::SyntaxError(format!(
                    "expected a mnemonic, found `{}`",
                    token.kind
                )))
            }
        };

        let stmt = match mnemonic.parse::<Directive>() {
            Ok(Directive::DefByte) => Stmt::Data(DataWidth::Byte, parse_data(args, true)?),
            Ok(Directive::DefWord) => Stmt::Data(DataWidth::Word, parse_data(args, false)?),
            Ok(Directive::DefLong) => Stmt::Data(DataWidth::Long, parse_data(args, false)?),
            Ok(Directive::Equ) => {
                if line.label.is_none() {
                    return Err(Error::SyntaxError(format!("`{mnemonic}` needs a label")));
                }
                Stmt::Equ(single_expr(args)?)
            }
            Ok(Directive::Org) => Stmt::Org(single_expr(args)?),
            Ok(Directive::Align) => {
                let (boundary, fill) = expr_with_fill(args)?;
                Stmt::Align { boundary, fill }
            }
            Ok(Directive::Fill) => {
                let (count, fill) = expr_with_fill(args)?;
                Stmt::Fill { count, fill }
            }
            Err(_) => Stmt::Instruction {
                mnemonic,
                operands: args.to_vec(),
            },
        };
        line.stmt = Some(stmt);
        Ok(line)
    }
}

fn parse_hash_directive(tokens: &[Token]) -> Result<Stmt, Error> {
    let (name, args) = match tokens {
        [Token {
            kind: TokenKind::Ident(name),
            ..
        }, args @ ..] => (name.to_ascii_lowercase(), args),
        _ => return Err(Error::SyntaxError("directive name expected after `#`".to_string())),
    };

    match name.as_str() {
        "code" => {
            let (segment, rest) = match args {
                [Token {
                    kind: TokenKind::Ident(segment),
                    ..
                }, rest @ ..] => (segment.clone(), rest),
                _ => return Err(Error::SyntaxError("segment name expected".to_string())),
            };
            let address = match rest {
                [] => None,
                [Token {
                    kind: TokenKind::Comma,
                    ..
                }, rest @ ..] => {
                    // trailing segment size is accepted and ignored
                    let exprs = expr_list(rest)?;
                    if exprs.len() > 2 {
                        return Err(Error::SyntaxError("too many arguments to #code".to_string()));
                    }
                    exprs.into_iter().next()
                }
                _ => return Err(Error::SyntaxError("`,` expected".to_string())),
            };
            Ok(Stmt::Code {
                name: segment,
                address,
            })
        }
        "local" => no_args(args, Stmt::Local),
        "endlocal" => no_args(args, Stmt::EndLocal),
        "target" => match args {
            [Token {
                kind: TokenKind::Ident(target),
                ..
            }] => target
                .parse::<Target>()
                .map(Stmt::Target)
                .map_err(|_| Error::SyntaxError(format!("unknown target `{target}`"))),
            _ => Err(Error::SyntaxError("target name expected".to_string())),
        },
        _ => Err(Error::UnknownDirective(format!("#{name}"))),
    }
}

fn no_args(args: &[Token], stmt: Stmt) -> Result<Stmt, Error> {
    match args {
        [] => Ok(stmt),
        [token, ..] => Err(Error::SyntaxError(format!("unexpected `{}`", token.kind))),
    }
}

/// Comma separated expressions, at least one.
fn expr_list(tokens: &[Token]) -> Result<Vec<Expr>, Error> {
    let mut exprs = Vec::new();
    let mut rest = tokens;
    loop {
        let (expr, used) = parse_expr(rest)?;
        exprs.push(expr);
        rest = &rest[used..];
        match rest {
            [] => return Ok(exprs),
            [Token {
                kind: TokenKind::Comma,
                ..
            }, tail @ ..] => rest = tail,
            [token, ..] => {
                return Err(Error::SyntaxError(format!("unexpected `{}`", token.kind)))
            }
        }
    }
}

fn single_expr(tokens: &[Token]) -> Result<Expr, Error> {
    let mut exprs = expr_list(tokens)?;
    match exprs.len() {
        1 => Ok(exprs.remove(0)),
        _ => Err(Error::SyntaxError("a single value is expected".to_string())),
    }
}

fn expr_with_fill(tokens: &[Token]) -> Result<(Expr, Option<Expr>), Error> {
    let mut exprs = expr_list(tokens)?.into_iter();
    match (exprs.next(), exprs.next(), exprs.next()) {
        (Some(value), fill, None) => Ok((value, fill)),
        _ => Err(Error::SyntaxError("expected `value[, fill]`".to_string())),
    }
}

fn parse_data(tokens: &[Token], strings: bool) -> Result<Vec<DataItem>, Error> {
    let mut items = Vec::new();
    let mut rest = tokens;
    loop {
        match rest {
            [Token {
                kind: TokenKind::Text(text),
                ..
            }, tail @ ..]
                if strings =>
            {
                rest = tail;
                let adjust = match rest.first().map(|t| &t.kind) {
                    Some(TokenKind::Plus) => Some(BinaryOp::Add),
                    Some(TokenKind::Minus) => Some(BinaryOp::Sub),
                    Some(TokenKind::Ampasand) => Some(BinaryOp::And),
                    Some(TokenKind::Pipe) => Some(BinaryOp::Or),
                    Some(TokenKind::Caret) => Some(BinaryOp::Xor),
                    _ => None,
                };
                let adjust = match adjust {
                    Some(op) => {
                        let (expr, used) = parse_expr(&rest[1..])?;
                        rest = &rest[1 + used..];
                        Some((op, expr))
                    }
                    None => None,
                };
                items.push(DataItem::Text(text_bytes(text)?, adjust));
            }
            [Token {
                kind: TokenKind::Ident(name),
                ..
            }, tail @ ..]
                if strings && name.parse::<Predefined>().is_ok() =>
            {
                items.extend(name.parse::<Predefined>().map(DataItem::Predefined));
                rest = tail;
            }
            _ => {
                let (expr, used) = parse_expr(rest)?;
                rest = &rest[used..];
                items.push(DataItem::Expr(expr));
            }
        }
        match rest {
            [] => return Ok(items),
            [Token {
                kind: TokenKind::Comma,
                ..
            }, tail @ ..] => rest = tail,
            [token, ..] => {
                return Err(Error::SyntaxError(format!("unexpected `{}`", token.kind)))
            }
        }
    }
}

fn text_bytes(text: &str) -> Result<Vec<u8>, Error> {
    text.chars()
        .map(|ch| {
            u8::try_from(ch as u32)
                .map_err(|_| Error::LexError(format!("character `{ch}` does not fit in a byte")))
        })
        .collect()
}
