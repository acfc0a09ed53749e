mod assembler;
mod config;
mod error;
mod expr;
mod image;
mod lexer;
mod matcher;
mod parser;
mod symbol;
mod token;
mod util;

pub use assembler::{Assembler, Assembly, FixupRecord, SourceFile};
pub use config::{parse_define, parse_value, Config};
pub use error::{Diagnostic, Error, ErrorKind};
pub use expr::{
    parse_expr, parse_operand, BinaryOp, EvalContext, Evaluated, Expr, Strictness, UnaryOp,
};
pub use image::{Emission, ProgramImage};
pub use lexer::tokenize;
pub use matcher::{match_variant, BoundOperand, Match};
pub use parser::{DataItem, DataWidth, Label, Line, Location, Predefined, Stmt, Target};
pub use symbol::{Scoped, Symbol, SymbolKind, Symbols};
pub use token::{Token, TokenKind};
pub use util::{dump, print_dump, print_symbols};
