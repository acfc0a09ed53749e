use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Reserved operand words: registers and branch conditions.
///
/// `c` is both the carry condition and the C register; the table does not
/// distinguish them, so neither does the keyword.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    IntoStaticStr,
    EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Keyword {
    A,
    B,
    C,
    D,
    E,
    F,
    H,
    L,
    I,
    R,
    Ixh,
    Ixl,
    Iyh,
    Iyl,

    Af,
    #[strum(serialize = "af'")]
    #[serde(rename = "af'")]
    AfShadow,
    Bc,
    De,
    Hl,
    Sp,
    Ix,
    Iy,

    Nz,
    Z,
    Nc,
    Po,
    Pe,
    P,
    M,
    Nv,
    V,
}

impl Keyword {
    pub fn parse(s: &str) -> Option<Self> {
        s.parse::<Self>().ok()
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}
