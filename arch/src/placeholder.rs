use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use strum::{Display, EnumString};

/// Variable slot of an opcode template, filled from an operand expression.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
pub enum PlaceholderKind {
    /// 8-bit immediate
    #[strum(serialize = "nn")]
    #[serde(rename = "nn")]
    Imm8,

    /// 16-bit immediate, little-endian
    #[strum(serialize = "nnnn")]
    #[serde(rename = "nnnn")]
    Imm16,

    /// Signed index displacement of `(ix+dd)` / `(iy+dd)`
    #[strum(serialize = "dd")]
    #[serde(rename = "dd")]
    Disp8,

    /// Signed branch displacement, relative to the end of the instruction
    #[strum(serialize = "offset")]
    #[serde(rename = "offset")]
    RelOffset,
}

impl PlaceholderKind {
    pub fn width(self) -> usize {
        match self {
            PlaceholderKind::Imm16 => 2,
            _ => 1,
        }
    }

    /// Accepted values. For `RelOffset` this is the range of the computed
    /// displacement, not of the branch target.
    pub fn range(self) -> RangeInclusive<i32> {
        match self {
            PlaceholderKind::Imm8 | PlaceholderKind::Disp8 => -128..=255,
            PlaceholderKind::Imm16 => -32768..=65535,
            PlaceholderKind::RelOffset => -128..=127,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        s.parse::<Self>().ok()
    }
}

#[test]
fn test() {
    assert_eq!(PlaceholderKind::parse("nnnn"), Some(PlaceholderKind::Imm16));
    assert_eq!(PlaceholderKind::parse("offset"), Some(PlaceholderKind::RelOffset));
    assert_eq!(PlaceholderKind::parse("n"), None);
    assert_eq!(PlaceholderKind::Disp8.to_string(), "dd");
    assert_eq!(PlaceholderKind::Imm16.width(), 2);
    assert!(PlaceholderKind::Imm8.range().contains(&255));
    assert!(!PlaceholderKind::RelOffset.range().contains(&128));
}
