use crate::InstructionVariant;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const TABLE_JSON: &str = include_str!("../data/z80.json");

/// The built-in table, parsed and validated on first use.
pub static INSTRUCTION_SET: Lazy<InstructionSet> = Lazy::new(|| {
    InstructionSet::from_json(TABLE_JSON).expect("built-in instruction table is well-formed")
});

pub fn lookup(mnemonic: &str) -> Option<&'static [InstructionVariant]> {
    INSTRUCTION_SET.lookup(mnemonic)
}

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Malformed table: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown pattern token: `{0}`")]
    BadToken(String),

    #[error("Placeholders of `{0}` differ between pattern and opcode")]
    PlaceholderMismatch(String),

    #[error("`{0}` declares {1} bytes but its opcode template has {2}")]
    ByteCountMismatch(String, usize, usize),

    #[error("Mnemonic `{0}` must be lowercase")]
    MnemonicCase(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MnemonicEntry {
    pub variants: Vec<InstructionVariant>,
}

/// Mnemonic to variants, in table order. The order of variants is the
/// tie-break when several spellings match the same operands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionSet {
    mnemonics: IndexMap<String, MnemonicEntry>,
}

impl InstructionSet {
    pub fn from_json(src: &str) -> Result<Self, TableError> {
        let set: Self = serde_json::from_str(src)?;
        set.validate()?;
        Ok(set)
    }

    fn validate(&self) -> Result<(), TableError> {
        for (mnemonic, entry) in &self.mnemonics {
            if mnemonic.chars().any(|c| c.is_ascii_uppercase()) {
                return Err(TableError::MnemonicCase(mnemonic.clone()));
            }
            for variant in &entry.variants {
                variant.validate(mnemonic)?;
            }
        }
        Ok(())
    }

    /// `mnemonic` must already be lowercase.
    pub fn lookup(&self, mnemonic: &str) -> Option<&[InstructionVariant]> {
        self.mnemonics
            .get(mnemonic)
            .map(|entry| entry.variants.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[InstructionVariant])> {
        self.mnemonics
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.variants.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.mnemonics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mnemonics.is_empty()
    }
}
