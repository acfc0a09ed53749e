mod keyword;
mod placeholder;
mod table;
mod variant;

pub use keyword::Keyword;
pub use placeholder::PlaceholderKind;
pub use table::{lookup, InstructionSet, MnemonicEntry, TableError, INSTRUCTION_SET};
pub use variant::{ClrInfo, InstructionVariant, OpcodeByte, PatternToken};
