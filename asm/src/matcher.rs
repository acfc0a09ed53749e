use crate::error::Error;
use crate::expr::{parse_operand, EvalContext, Evaluated, Expr, Strictness};
use crate::token::{render, Token, TokenKind};
use z80_arch::{lookup, InstructionVariant, PatternToken, PlaceholderKind};

/// An operand expression bound to a placeholder of the chosen variant.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundOperand {
    pub kind: PlaceholderKind,
    pub expr: Expr,
}

#[derive(Debug, Clone)]
pub struct Match {
    pub variant: &'static InstructionVariant,
    /// In opcode placeholder order
    pub operands: Vec<BoundOperand>,
}

enum Outcome {
    Matched(Vec<BoundOperand>),
    Mismatch,
    /// A numeric pattern token could not be compared yet
    Unresolved(String),
}

/// Picks the first variant of `mnemonic`, in table order, whose pattern
/// accepts `operands`.
pub fn match_variant(
    mnemonic: &str,
    operands: &[Token],
    ctx: &dyn EvalContext,
    allow_undocumented: bool,
) -> Result<Match, Error> {
    let variants =
        lookup(mnemonic).ok_or_else(|| Error::UnknownMnemonic(mnemonic.to_string()))?;

    let mut unresolved = None;
    for variant in variants {
        match try_variant(variant, operands, ctx) {
            Outcome::Matched(_) if !allow_undocumented && !variant.documented() => {
                return Err(Error::UndocumentedOpcodeRejected(variant.spelling(mnemonic)));
            }
            Outcome::Matched(bound) => {
                return Ok(Match {
                    variant,
                    operands: bound,
                })
            }
            Outcome::Unresolved(name) => {
                unresolved.get_or_insert(name);
            }
            Outcome::Mismatch => {}
        }
    }

    if let Some(name) = unresolved {
        return Err(Error::UndefinedSymbol(name));
    }
    Err(Error::NoMatchingVariant(
        mnemonic.to_string(),
        render(operands),
    ))
}

fn try_variant(variant: &InstructionVariant, input: &[Token], ctx: &dyn EvalContext) -> Outcome {
    let pattern = &variant.tokens;
    let mut bound = vec![];
    let mut pos = 0;
    let mut k = 0;

    while k < pattern.len() {
        let next = input.get(pos).map(|t| &t.kind);
        match &pattern[k] {
            // Index displacement: "+" may be written as "-" (sign of the
            // displacement) or left out entirely, as in "(ix)".
            PatternToken::Punct('+')
                if pattern.get(k + 1)
                    == Some(&PatternToken::Placeholder(PlaceholderKind::Disp8)) =>
            {
                match next {
                    Some(TokenKind::Plus) => pos += 1,
                    Some(TokenKind::Minus) => {}
                    Some(TokenKind::RParen) => {
                        bound.push(BoundOperand {
                            kind: PlaceholderKind::Disp8,
                            expr: Expr::Number(0),
                        });
                        k += 1;
                    }
                    _ => return Outcome::Mismatch,
                }
            }
            PatternToken::Punct(ch) => match next {
                Some(kind) if kind.punct() == Some(*ch) => pos += 1,
                _ => return Outcome::Mismatch,
            },
            PatternToken::Keyword(kw) => match next {
                Some(TokenKind::Keyword(got)) if got == kw => pos += 1,
                _ => return Outcome::Mismatch,
            },
            PatternToken::Word(word) => match next {
                Some(TokenKind::Ident(got)) if got.eq_ignore_ascii_case(word) => pos += 1,
                _ => return Outcome::Mismatch,
            },
            PatternToken::Number(n) => {
                let Ok((expr, used)) = parse_operand(&input[pos..]) else {
                    return Outcome::Mismatch;
                };
                match expr.eval(ctx, Strictness::Tolerant) {
                    Ok(Evaluated::Value(v)) if v == *n => pos += used,
                    Ok(Evaluated::Unresolved(expr)) => {
                        let name = expr.symbols().first().map(|s| s.to_string());
                        return Outcome::Unresolved(name.unwrap_or_default());
                    }
                    _ => return Outcome::Mismatch,
                }
            }
            PatternToken::Placeholder(kind) => {
                let Ok((expr, used)) = parse_operand(&input[pos..]) else {
                    return Outcome::Mismatch;
                };
                bound.push(BoundOperand { kind: *kind, expr });
                pos += used;
            }
        }
        k += 1;
    }

    if pos == input.len() {
        Outcome::Matched(bound)
    } else {
        Outcome::Mismatch
    }
}
