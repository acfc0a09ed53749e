use std::fmt;
use z80_arch::Keyword;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub col: usize,
}

impl Token {
    pub fn new(kind: TokenKind, col: usize) -> Self {
        Token { kind, col }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Double character tokens
    LAngleLAngle, // '<<'
    RAngleRAngle, // '>>'

    // Single character tokens
    Plus,     // '+'
    Minus,    // '-'
    Star,     // '*'
    Slash,    // '/'
    Percent,  // '%'
    Ampasand, // '&'
    Pipe,     // '|'
    Caret,    // '^'
    Tilde,    // '~'
    Colon,    // ':'
    Comma,    // ','
    LParen,   // '('
    RParen,   // ')'
    Hash,     // '#'
    Dollar,   // '$' (current address)

    // Registers and conditions, canonical lowercase
    Keyword(Keyword),

    // Identifier
    Ident(String),

    // Literals
    Number(String, i32),
    Text(String),
    Char(char),

    // Special
    Comment(String),
}

impl TokenKind {
    /// Whether the token can end an operand, so that a following `%` is
    /// the modulo operator rather than a binary prefix.
    pub fn ends_value(&self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Keyword(_) | Ident(_) | Number(_, _) | Text(_) | Char(_) | RParen | Dollar
        )
    }

    /// Source spelling of a punctuation token.
    pub fn punct(&self) -> Option<char> {
        use TokenKind::*;
        Some(match self {
            Plus => '+',
            Minus => '-',
            Star => '*',
            Slash => '/',
            Percent => '%',
            Ampasand => '&',
            Pipe => '|',
            Caret => '^',
            Tilde => '~',
            Colon => ':',
            Comma => ',',
            LParen => '(',
            RParen => ')',
            Hash => '#',
            Dollar => '$',
            _ => return None,
        })
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        if let Some(c) = self.punct() {
            return write!(f, "{c}");
        }
        match self {
            LAngleLAngle => write!(f, "<<"),
            RAngleRAngle => write!(f, ">>"),
            Keyword(kw) => write!(f, "{kw}"),
            Ident(name) => write!(f, "{name}"),
            Number(lexeme, _) => write!(f, "{lexeme}"),
            Text(s) => write!(f, "{s:?}"),
            Char(c) => write!(f, "'{c}'"),
            Comment(s) => write!(f, ";{s}"),
            _ => Ok(()),
        }
    }
}

/// Joins tokens back into compact operand text, for messages.
pub fn render(tokens: &[Token]) -> String {
    let mut text = String::new();
    for (idx, token) in tokens.iter().enumerate() {
        let spaced = idx > 0
            && matches!(
                (&tokens[idx - 1].kind, &token.kind),
                (
                    TokenKind::Ident(_) | TokenKind::Keyword(_) | TokenKind::Number(_, _),
                    TokenKind::Ident(_) | TokenKind::Keyword(_) | TokenKind::Number(_, _)
                )
            );
        if spaced {
            text.push(' ');
        }
        text.push_str(&token.kind.to_string());
    }
    text
}
