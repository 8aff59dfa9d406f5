//! Dynamic lexer (spec §4.6 Earley, "Dynamic lexer"): rather than
//! committing to one terminal per position, reports every terminal that
//! could start matching there so the Earley chart's scan step can follow
//! each possibility. `dynamic_complete` additionally enumerates every
//! prefix length a regex terminal could stop at, for grammars whose
//! lexical ambiguity isn't just "which terminal" but "how much of the
//! input it consumes".
//!
//! Grounded on the same `ILexeme::consume` position-driven loop as
//! `creative-forest-lang-pt/src/tokenization.rs`, but querying every
//! lexeme utility at a position instead of stopping at the first match.
use super::regexc::TerminalCompiler;
use crate::position::Code;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicMode {
    Standard,
    Complete,
}

pub struct DynamicLexer<'g> {
    compiler: &'g TerminalCompiler,
}

impl<'g> DynamicLexer<'g> {
    pub fn new(compiler: &'g TerminalCompiler) -> Self {
        Self { compiler }
    }

    /// Advance past a run of `%ignore`d terminals starting at `pointer`.
    pub fn skip_ignored(&self, code: &Code, mut pointer: usize) -> usize {
        loop {
            let text = code.as_str(pointer, code.len());
            let ignored = self.compiler.terminals.iter().filter(|t| t.ignored && !t.is_external());
            match self.compiler.longest_match(ignored, text) {
                Some((_, len)) if len > 0 => pointer += len,
                _ => break,
            }
        }
        pointer
    }

    /// Every `(terminal name, match length)` pair viable at `pointer`.
    pub fn scan_at(&self, code: &Code, pointer: usize, mode: DynamicMode) -> Vec<(Rc<str>, usize)> {
        let text = code.as_str(pointer, code.len());
        let mut out = Vec::new();
        for t in self.compiler.terminals.iter().filter(|t| !t.ignored && !t.is_external()) {
            match mode {
                DynamicMode::Standard => {
                    if let Some(len) = t.match_len(text) {
                        out.push((t.name.clone(), len));
                    }
                }
                DynamicMode::Complete => {
                    for len in t.all_match_lens(text) {
                        out.push((t.name.clone(), len));
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::model::{Grammar, Rule, Symbol, Terminal, TerminalPattern};

    fn grammar() -> Grammar {
        Grammar::build(
            vec![
                Terminal { name: Rc::from("A"), pattern: TerminalPattern::Literal { text: "x".into(), case_insensitive: false }, priority: 0, ignored: false, keep: true, order: 0 },
                Terminal { name: Rc::from("B"), pattern: TerminalPattern::Literal { text: "xx".into(), case_insensitive: false }, priority: 0, ignored: false, keep: true, order: 1 },
            ],
            vec![Rule { name: Rc::from("start"), symbols: vec![Symbol::Terminal(Rc::from("A"))], alias: None, keep_all_tokens: false, filter_out: false, inline_if_single: false, optional_epsilon: false, priority: 0, order: 0 }],
            vec![Rc::from("start")],
        )
    }

    #[test]
    fn standard_mode_reports_every_terminal_own_longest_match() {
        let g = grammar();
        let tc = TerminalCompiler::compile(&g).unwrap();
        let lexer = DynamicLexer::new(&tc);
        let code = Code::new(b"xx");
        let mut matches = lexer.scan_at(&code, 0, DynamicMode::Standard);
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(matches, vec![(Rc::from("A"), 1), (Rc::from("B"), 2)]);
    }

    #[test]
    fn complete_mode_enumerates_regex_prefixes() {
        let g = Grammar::build(
            vec![Terminal { name: Rc::from("DIGITS"), pattern: TerminalPattern::Regex("[0-9]+".into()), priority: 0, ignored: false, keep: true, order: 0 }],
            vec![Rule { name: Rc::from("start"), symbols: vec![Symbol::Terminal(Rc::from("DIGITS"))], alias: None, keep_all_tokens: false, filter_out: false, inline_if_single: false, optional_epsilon: false, priority: 0, order: 0 }],
            vec![Rc::from("start")],
        );
        let tc = TerminalCompiler::compile(&g).unwrap();
        let lexer = DynamicLexer::new(&tc);
        let code = Code::new(b"123");
        let mut matches = lexer.scan_at(&code, 0, DynamicMode::Complete);
        matches.sort_by_key(|(_, len)| *len);
        assert_eq!(matches.iter().map(|(_, l)| *l).collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
