use crate::error::Error;
use crate::token::{Token, TokenKind};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(i32),
    Current, // `$`
    Symbol(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    Xor,
    And,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// What an expression needs from its surroundings. Swapping the context is
/// how callers plug in their own symbol scoping.
pub trait EvalContext {
    fn lookup(&self, name: &str) -> Option<i32>;
    fn current_address(&self) -> u16;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Undefined symbols defer the whole expression (pass 1)
    Tolerant,
    /// Undefined symbols are errors (pass 2)
    Strict,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    Value(i32),
    Unresolved(Expr),
}

impl Expr {
    pub fn eval(&self, ctx: &dyn EvalContext, mode: Strictness) -> Result<Evaluated, Error> {
        match (self.value(ctx), mode) {
            (Ok(v), _) => Ok(Evaluated::Value(v)),
            (Err(Error::UndefinedSymbol(_)), Strictness::Tolerant) => {
                Ok(Evaluated::Unresolved(self.clone()))
            }
            (Err(e), _) => Err(e),
        }
    }

    pub fn eval_strict(&self, ctx: &dyn EvalContext) -> Result<i32, Error> {
        self.value(ctx)
    }

    fn value(&self, ctx: &dyn EvalContext) -> Result<i32, Error> {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Current => Ok(ctx.current_address() as i32),
            Expr::Symbol(name) => ctx
                .lookup(name)
                .ok_or_else(|| Error::UndefinedSymbol(name.clone())),
            Expr::Unary(op, expr) => {
                let v = expr.value(ctx)?;
                match op {
                    UnaryOp::Pos => Ok(v),
                    UnaryOp::Neg => v.checked_neg().ok_or_else(|| overflow(self)),
                    UnaryOp::Not => Ok(!v),
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let a = lhs.value(ctx)?;
                let b = rhs.value(ctx)?;
                let result = match op {
                    BinaryOp::Or => Some(a | b),
                    BinaryOp::Xor => Some(a ^ b),
                    BinaryOp::And => Some(a & b),
                    BinaryOp::Shl => shift_amount(b)?.and_then(|s| a.checked_shl(s)),
                    BinaryOp::Shr => shift_amount(b)?.and_then(|s| a.checked_shr(s)),
                    BinaryOp::Add => a.checked_add(b),
                    BinaryOp::Sub => a.checked_sub(b),
                    BinaryOp::Mul => a.checked_mul(b),
                    BinaryOp::Div | BinaryOp::Mod if b == 0 => {
                        return Err(Error::ArithmeticError(format!("division by zero in `{self}`")))
                    }
                    BinaryOp::Div => a.checked_div(b),
                    BinaryOp::Mod => a.checked_rem(b),
                };
                result.ok_or_else(|| overflow(self))
            }
        }
    }

    /// Symbol names referenced by the expression, in order of appearance.
    pub fn symbols(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_symbols(&mut names);
        names
    }

    fn collect_symbols<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Symbol(name) => names.push(name),
            Expr::Unary(_, expr) => expr.collect_symbols(names),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_symbols(names);
                rhs.collect_symbols(names);
            }
            Expr::Number(_) | Expr::Current => {}
        }
    }
}

fn shift_amount(b: i32) -> Result<Option<u32>, Error> {
    match u32::try_from(b) {
        Ok(s) if s < 32 => Ok(Some(s)),
        _ => Err(Error::ArithmeticError(format!("shift by {b}"))),
    }
}

fn overflow(expr: &Expr) -> Error {
    Error::ArithmeticError(format!("overflow in `{expr}`"))
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Current => write!(f, "$"),
            Expr::Symbol(name) => write!(f, "{name}"),
            Expr::Unary(op, expr) => {
                let op = match op {
                    UnaryOp::Pos => "+",
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "~",
                };
                write!(f, "{op}{expr}")
            }
            Expr::Binary(op, lhs, rhs) => {
                let op = match op {
                    BinaryOp::Or => "|",
                    BinaryOp::Xor => "^",
                    BinaryOp::And => "&",
                    BinaryOp::Shl => "<<",
                    BinaryOp::Shr => ">>",
                    BinaryOp::Add => "+",
                    BinaryOp::Sub => "-",
                    BinaryOp::Mul => "*",
                    BinaryOp::Div => "/",
                    BinaryOp::Mod => "%",
                };
                write!(f, "({lhs} {op} {rhs})")
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Parser
// ----------------------------------------------------------------------------

/// Parses the longest expression at the start of `tokens`. Returns the
/// expression and the number of tokens it used.
pub fn parse_expr(tokens: &[Token]) -> Result<(Expr, usize), Error> {
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    Ok((expr, parser.pos))
}

/// Like [`parse_expr`], but an operand may not open with `(`: in operand
/// position parentheses mean memory indirection.
pub fn parse_operand(tokens: &[Token]) -> Result<(Expr, usize), Error> {
    match tokens.first() {
        Some(Token {
            kind: TokenKind::LParen,
            ..
        }) => Err(Error::SyntaxError(
            "operand expression cannot start with `(`".to_string(),
        )),
        _ => parse_expr(tokens),
    }
}

struct ExprParser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> ExprParser<'t> {
    fn peek(&self) -> Option<&'t TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn next(&mut self) -> Option<&'t TokenKind> {
        let kind = self.peek();
        if kind.is_some() {
            self.pos += 1;
        }
        kind
    }

    fn binary<F>(&mut self, ops: &[(TokenKind, BinaryOp)], operand: F) -> Result<Expr, Error>
    where
        F: Fn(&mut Self) -> Result<Expr, Error>,
    {
        let mut lhs = operand(self)?;
        while let Some(&(_, op)) = ops.iter().find(|(kind, _)| Some(kind) == self.peek()) {
            self.next();
            let rhs = operand(self)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// expr = or-expr
    fn parse_expr(&mut self) -> Result<Expr, Error> {
        self.parse_or_expr()
    }

    /// or-expr = xor-expr { "|" xor-expr }
    fn parse_or_expr(&mut self) -> Result<Expr, Error> {
        self.binary(&[(TokenKind::Pipe, BinaryOp::Or)], Self::parse_xor_expr)
    }

    /// xor-expr = and-expr { "^" and-expr }
    fn parse_xor_expr(&mut self) -> Result<Expr, Error> {
        self.binary(&[(TokenKind::Caret, BinaryOp::Xor)], Self::parse_and_expr)
    }

    /// and-expr = shift-expr { "&" shift-expr }
    fn parse_and_expr(&mut self) -> Result<Expr, Error> {
        self.binary(&[(TokenKind::Ampasand, BinaryOp::And)], Self::parse_shift_expr)
    }

    /// shift-expr = add-expr { ( "<<" | ">>" ) add-expr }
    fn parse_shift_expr(&mut self) -> Result<Expr, Error> {
        self.binary(
            &[
                (TokenKind::LAngleLAngle, BinaryOp::Shl),
                (TokenKind::RAngleRAngle, BinaryOp::Shr),
            ],
            Self::parse_add_expr,
        )
    }

    /// add-expr = mul-expr { ( "+" | "-" ) mul-expr }
    fn parse_add_expr(&mut self) -> Result<Expr, Error> {
        self.binary(
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
            Self::parse_mul_expr,
        )
    }

    /// mul-expr = unary-expr { ( "*" | "/" | "%" ) unary-expr }
    fn parse_mul_expr(&mut self) -> Result<Expr, Error> {
        self.binary(
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
            Self::parse_unary_expr,
        )
    }

    /// unary-expr = ( "+" | "-" | "~" ) unary-expr | prim-expr
    fn parse_unary_expr(&mut self) -> Result<Expr, Error> {
        let op = match self.peek() {
            Some(TokenKind::Plus) => UnaryOp::Pos,
            Some(TokenKind::Minus) => UnaryOp::Neg,
            Some(TokenKind::Tilde) => UnaryOp::Not,
            _ => return self.parse_prim_expr(),
        };
        self.next();
        let expr = self.parse_unary_expr()?;
        Ok(match (op, expr) {
            // Fold literals so `-128` stays a plain number
            (UnaryOp::Neg, Expr::Number(n)) if n != i32::MIN => Expr::Number(-n),
            (UnaryOp::Pos, expr) => expr,
            (op, expr) => Expr::Unary(op, Box::new(expr)),
        })
    }

    /// prim-expr = "(" expr ")" | ident | "$" | num-lit | char-lit
    fn parse_prim_expr(&mut self) -> Result<Expr, Error> {
        match self.next() {
            Some(TokenKind::LParen) => {
                let inner = self.parse_expr()?;
                match self.next() {
                    Some(TokenKind::RParen) => Ok(inner),
                    _ => Err(Error::SyntaxError("expected `)`".to_string())),
                }
            }
            Some(TokenKind::Ident(name)) => Ok(Expr::Symbol(name.clone())),
            Some(TokenKind::Dollar) => Ok(Expr::Current),
            Some(TokenKind::Number(_, n)) => Ok(Expr::Number(*n)),
            Some(TokenKind::Char(ch)) => Ok(Expr::Number(*ch as i32)),
            Some(TokenKind::Text(s)) if s.chars().count() == 1 => {
                Ok(Expr::Number(s.chars().next().map(|c| c as i32).unwrap_or(0)))
            }
            Some(other) => Err(Error::SyntaxError(format!(
                "unexpected `{other}` in expression"
            ))),
            None => Err(Error::SyntaxError("expression expected".to_string())),
        }
    }
}
