use crate::{table::TableError, Keyword, PlaceholderKind};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// One element of a variant's operand pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PatternToken {
    Punct(char),
    Keyword(Keyword),
    /// Must evaluate to exactly this value (`bit 3,a`, `im 1`, `rst 56`)
    Number(i32),
    /// Bare word that is not a register, e.g. `rlc` in `ld b,rlc (ix+dd)`
    Word(String),
    Placeholder(PlaceholderKind),
}

impl FromStr for PatternToken {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(kind) = PlaceholderKind::parse(s) {
            return Ok(PatternToken::Placeholder(kind));
        }
        let mut chars = s.chars();
        if let (Some(c @ ('(' | ')' | ',' | '+')), None) = (chars.next(), chars.next()) {
            return Ok(PatternToken::Punct(c));
        }
        if let Some(kw) = Keyword::parse(s) {
            return Ok(PatternToken::Keyword(kw));
        }
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
            return s
                .parse()
                .map(PatternToken::Number)
                .map_err(|_| TableError::BadToken(s.to_string()));
        }
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic()) {
            return Ok(PatternToken::Word(s.to_ascii_lowercase()));
        }
        Err(TableError::BadToken(s.to_string()))
    }
}

impl TryFrom<String> for PatternToken {
    type Error = TableError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PatternToken> for String {
    fn from(token: PatternToken) -> Self {
        token.to_string()
    }
}

impl fmt::Display for PatternToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternToken::Punct(c) => write!(f, "{c}"),
            PatternToken::Keyword(kw) => write!(f, "{kw}"),
            PatternToken::Number(n) => write!(f, "{n}"),
            PatternToken::Word(w) => write!(f, "{w}"),
            PatternToken::Placeholder(kind) => write!(f, "{kind}"),
        }
    }
}

/// One element of an opcode template. On the wire this is either a byte
/// value or a placeholder tag string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpcodeByte {
    Byte(u8),
    Placeholder(PlaceholderKind),
}

impl OpcodeByte {
    pub fn width(self) -> usize {
        match self {
            OpcodeByte::Byte(_) => 1,
            OpcodeByte::Placeholder(kind) => kind.width(),
        }
    }
}

/// CPU metadata carried through from the table untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClrInfo {
    pub opcodes: String,
    pub undocumented: bool,
    /// Effect on C N P/V H Z S, one character each
    pub flags: String,
    pub byte_count: usize,
    pub with_jump_clock_count: u32,
    pub without_jump_clock_count: u32,
    pub description: String,
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionVariant {
    pub tokens: Vec<PatternToken>,
    pub opcode: Vec<OpcodeByte>,
    pub clr: Option<ClrInfo>,
}

impl InstructionVariant {
    /// Variants without metadata expand into documented opcodes only.
    pub fn documented(&self) -> bool {
        self.clr.as_ref().map(|clr| !clr.undocumented).unwrap_or(true)
    }

    /// Pair moves such as `ld hl,bc` that no single Z80 opcode implements.
    pub fn is_synthetic(&self) -> bool {
        self.clr.is_none()
    }

    pub fn byte_count(&self) -> usize {
        self.opcode.iter().map(|op| op.width()).sum()
    }

    pub fn placeholders(&self) -> impl Iterator<Item = PlaceholderKind> + '_ {
        self.opcode.iter().filter_map(|op| match op {
            OpcodeByte::Placeholder(kind) => Some(*kind),
            OpcodeByte::Byte(_) => None,
        })
    }

    fn pattern_placeholders(&self) -> impl Iterator<Item = PlaceholderKind> + '_ {
        self.tokens.iter().filter_map(|token| match token {
            PatternToken::Placeholder(kind) => Some(*kind),
            _ => None,
        })
    }

    /// Opcode bytes known without operands, placeholders left out.
    pub fn literal_bytes(&self) -> Vec<u8> {
        self.opcode
            .iter()
            .filter_map(|op| match op {
                OpcodeByte::Byte(b) => Some(*b),
                OpcodeByte::Placeholder(_) => None,
            })
            .collect()
    }

    pub fn validate(&self, mnemonic: &str) -> Result<(), TableError> {
        if !self.placeholders().eq(self.pattern_placeholders()) {
            return Err(TableError::PlaceholderMismatch(self.spelling(mnemonic)));
        }
        if let Some(clr) = &self.clr {
            if clr.byte_count != self.byte_count() {
                return Err(TableError::ByteCountMismatch(
                    self.spelling(mnemonic),
                    clr.byte_count,
                    self.byte_count(),
                ));
            }
        }
        Ok(())
    }

    /// Operand text as written in source, e.g. `(ix+dd),nn`.
    pub fn operands(&self) -> String {
        let mut text = String::new();
        for (idx, token) in self.tokens.iter().enumerate() {
            text.push_str(&token.to_string());
            if matches!(token, PatternToken::Word(_)) && idx + 1 < self.tokens.len() {
                text.push(' ');
            }
        }
        text
    }

    pub fn spelling(&self, mnemonic: &str) -> String {
        if self.tokens.is_empty() {
            mnemonic.to_string()
        } else {
            format!("{} {}", mnemonic, self.operands())
        }
    }
}
