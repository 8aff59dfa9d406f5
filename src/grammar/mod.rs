//! Grammar front-end (spec §4.1-§4.3): source text in, a flat lowered
//! [`model::Grammar`] out. Organised the way the teacher splits its own
//! front door (`lib.rs`) from its production machinery
//! (`production/mod.rs`): this module is the single entry point,
//! `ast`/`lexer`/`parser`/`loader`/`lower` are the internal pipeline
//! stages behind it.
pub mod ast;
pub mod lexer;
pub mod loader;
pub mod lower;
pub mod model;
pub mod parser;

pub use loader::{GrammarSource, NoImports};
pub use lower::PriorityMode;
pub use model::Grammar;

use crate::error::Error;

/// Compile EBNF+ source text into a lowered grammar ready for the LALR
/// and Earley engines, resolving `%import` through `source` and treating
/// `start_symbols` as the grammar's entry points (spec §6 `start`
/// constructor option).
pub fn compile(
    src: &str,
    source: &dyn GrammarSource,
    start_symbols: Vec<String>,
    priority: PriorityMode,
) -> Result<Grammar, Error> {
    let file = parser::parse_grammar(src)?;
    let loaded = loader::load(file, source)?;
    let grammar = lower::lower(loaded, lower::LowerOptions { start_symbols, priority })?;
    Ok(grammar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_small_grammar_end_to_end() {
        let src = "start: WORD \",\" WORD \"!\"\nWORD: /[a-zA-Z]+/\n%ignore \" \"\n";
        let g = compile(src, &NoImports, vec!["start".to_string()], PriorityMode::Normal).unwrap();
        assert!(g.is_rule("start"));
        assert!(g.is_terminal("WORD"));
        assert!(g.terminal("WORD").unwrap().keep);
    }
}
