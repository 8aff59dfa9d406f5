//! Terminal compiler and lexer runtime (spec §4.4, §4.8 C1/C5/C8).
pub mod basic;
pub mod contextual;
pub mod dynamic;
pub mod regexc;

pub use basic::BasicLexer;
pub use contextual::ContextualLexer;
pub use dynamic::{DynamicLexer, DynamicMode};
pub use regexc::{CompiledTerminal, TerminalCompiler};
