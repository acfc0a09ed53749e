use color_print::cprintln;
use indexmap::IndexMap;
use serde::Serialize;
use strum::{Display, EnumDiscriminants};
use thiserror::Error;
use z80_arch::PlaceholderKind;

#[derive(Error, Debug, EnumDiscriminants)]
#[strum_discriminants(name(ErrorKind), derive(Display, Serialize, Hash))]
pub enum Error {
    #[error("Lex error: {0}")]
    LexError(String),

    #[error("Syntax error: {0}")]
    SyntaxError(String),

    #[error("Unknown directive: `{0}`")]
    UnknownDirective(String),

    #[error("Unknown mnemonic: `{0}`")]
    UnknownMnemonic(String),

    #[error("No variant of `{0}` accepts `{1}`")]
    NoMatchingVariant(String, String),

    #[error("Undocumented instruction is disabled: `{0}`")]
    UndocumentedOpcodeRejected(String),

    #[error("Symbol `{0}` is already defined at line {1}")]
    DuplicateSymbol(String, usize),

    #[error("Undefined symbol: `{0}`")]
    UndefinedSymbol(String),

    #[error("Arithmetic error: {0}")]
    ArithmeticError(String),

    #[error("Operand {0} is out of range for `{1}`")]
    OperandOutOfRange(i64, PlaceholderKind),

    #[error("Branch target is {0} bytes away, outside -128..127")]
    BranchOutOfRange(i64),

    #[error("Encoding of `{0}` changed size between passes")]
    AmbiguousEncoding(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to read file: {0}")]
    FileRead(String, #[source] std::io::Error),

    #[error("Failed to create file: {0}")]
    FileCreate(String, #[source] std::io::Error),

    #[error("Failed to write file: {0}")]
    FileWrite(String, #[source] std::io::Error),
}

/// One reported problem, tied to a source line (1-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: usize,
    pub kind: ErrorKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(file: &str, line: usize, error: &Error) -> Self {
        Diagnostic {
            file: file.to_string(),
            line,
            kind: ErrorKind::from(error),
            message: error.to_string(),
        }
    }

    /// Print with file location and the offending line
    pub fn print_diag(&self, files: &IndexMap<String, Vec<String>>) {
        cprintln!("<red,bold>error</>: {}", self.message);
        cprintln!("     <blue>--></> <underline>{}:{}</>", self.file, self.line);
        cprintln!("      <blue>|</>");

        let line_content = files
            .get(&self.file)
            .and_then(|lines| lines.get(self.line.wrapping_sub(1)))
            .map(|s| s.as_str())
            .unwrap_or("");

        cprintln!(" <blue>{:>4} |</> {}", self.line, line_content);
        cprintln!("      <blue>|</>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_carries_kind() {
        let err = Error::BranchOutOfRange(128);
        let diag = Diagnostic::new("main.z80", 3, &err);
        assert_eq!(diag.kind, ErrorKind::BranchOutOfRange);
        assert_eq!(diag.kind.to_string(), "BranchOutOfRange");
        assert_eq!(diag.line, 3);
        assert!(diag.message.contains("128"));
    }

    #[test]
    fn diagnostic_serializes() {
        let err = Error::UndefinedSymbol("loop".to_string());
        let json = serde_json::to_value(Diagnostic::new("a.z80", 1, &err)).unwrap();
        assert_eq!(json["kind"], "UndefinedSymbol");
        assert_eq!(json["line"], 1);
        assert_eq!(json["message"], "Undefined symbol: `loop`");
    }
}
