//! Desugaring pass (spec §4.3 C4): rewrites `*`, `+`, `?`, `(...)`,
//! `[...]`, `~n..m`, inline string/regex literals, and `-> alias` into a
//! flat [`crate::grammar::model::Grammar`] whose rules contain only bare
//! symbol references.
//!
//! Grounded on the teacher's own repertoire of production combinators
//! (`production::non_terminals::Suffixes` for `* + ?`,
//! `production::wrappers::{List, SeparatedList}` for repetition,
//! `production::non_terminals::{Union, Concat}` for alternation and
//! sequencing): where the teacher composes those as `Rc<dyn IProduction>`
//! objects evaluated directly during parsing, this pass instead rewrites
//! them once, ahead of time, into additional flat grammar rules so that
//! both the LALR and Earley engines -- which need a *static* rule set,
//! not a combinator tree -- can consume the result uniformly.
use super::ast::*;
use super::loader::LoadedGrammar;
use super::model::{Grammar, Rule, Symbol, Terminal, TerminalPattern};
use crate::error::GrammarError;
use regex::escape;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityMode {
    Normal,
    Invert,
    None,
}

pub struct LowerOptions {
    pub start_symbols: Vec<String>,
    pub priority: PriorityMode,
}

struct Lowerer {
    terminals: Vec<Terminal>,
    terminal_names: HashMap<String, usize>,
    anon_literal: HashMap<(String, bool), String>,
    anon_regex: HashMap<String, String>,
    rules: Vec<Rule>,
    anon_rule_counter: usize,
    max_user_priority: i32,
    priority_mode: PriorityMode,
}

pub fn lower(loaded: LoadedGrammar, opts: LowerOptions) -> Result<Grammar, GrammarError> {
    let max_user_priority = loaded
        .tokens
        .iter()
        .filter_map(|t| t.priority)
        .chain(loaded.rules.iter().filter_map(|r| r.priority))
        .max()
        .unwrap_or(0);

    let mut lw = Lowerer {
        terminals: Vec::new(),
        terminal_names: HashMap::new(),
        anon_literal: HashMap::new(),
        anon_regex: HashMap::new(),
        rules: Vec::new(),
        anon_rule_counter: 0,
        max_user_priority,
        priority_mode: opts.priority,
    };

    lw.register_declared(&loaded.declared)?;
    lw.register_tokens(&loaded.tokens, &loaded.ignored)?;
    lw.register_rules(&loaded.rules)?;

    let start_symbols: Vec<Rc<str>> = opts.start_symbols.iter().map(|s| Rc::from(s.as_str())).collect();
    let grammar = Grammar::build(lw.terminals, lw.rules, start_symbols);
    grammar.validate()?;
    Ok(grammar)
}

impl Lowerer {
    fn apply_priority(&self, p: Option<i32>) -> i32 {
        let p = p.unwrap_or(0);
        match self.priority_mode {
            PriorityMode::Normal => p,
            PriorityMode::None => 0,
            PriorityMode::Invert => if p != 0 { -p } else { 0 },
        }
    }

    fn register_declared(&mut self, declared: &std::collections::HashSet<String>) -> Result<(), GrammarError> {
        for name in declared {
            self.push_terminal(Terminal {
                name: Rc::from(name.as_str()),
                pattern: TerminalPattern::External,
                priority: 0,
                ignored: false,
                keep: true,
                order: self.terminals.len(),
            });
        }
        Ok(())
    }

    fn push_terminal(&mut self, t: Terminal) {
        self.terminal_names.insert(t.name.to_string(), self.terminals.len());
        self.terminals.push(t);
    }

    fn register_tokens(&mut self, tokens: &[TokenDecl], ignored: &std::collections::HashSet<String>) -> Result<(), GrammarError> {
        // Two passes: first reserve every name so forward references
        // between terminal definitions resolve, then compile patterns.
        for t in tokens {
            if self.terminal_names.contains_key(&t.name) {
                return Err(GrammarError::new(format!("terminal {:?} declared more than once", t.name)));
            }
            self.terminal_names.insert(t.name.clone(), usize::MAX);
        }
        let decls: HashMap<&str, &TokenDecl> = tokens.iter().map(|t| (t.name.as_str(), t)).collect();
        let mut resolved: HashMap<String, String> = HashMap::new();
        for t in tokens {
            let pattern = self.resolve_terminal_pattern(&t.name, &decls, &mut resolved, &mut Vec::new())?;
            let idx = self.terminals.len();
            self.terminal_names.insert(t.name.clone(), idx);
            self.terminals.push(Terminal {
                name: Rc::from(t.name.as_str()),
                pattern: TerminalPattern::Regex(pattern),
                priority: self.apply_priority(t.priority),
                ignored: ignored.contains(&t.name) || t.ignored,
                keep: true,
                order: idx,
            });
        }
        Ok(())
    }

    /// Compile a named terminal's expansions into a single regex pattern
    /// fragment, resolving references to other terminals recursively
    /// with cycle detection.
    fn resolve_terminal_pattern(
        &self,
        name: &str,
        decls: &HashMap<&str, &TokenDecl>,
        cache: &mut HashMap<String, String>,
        stack: &mut Vec<String>,
    ) -> Result<String, GrammarError> {
        if let Some(p) = cache.get(name) {
            return Ok(p.clone());
        }
        if stack.contains(&name.to_string()) {
            return Err(GrammarError::new(format!("terminal {:?} is defined in terms of itself", name)));
        }
        let decl = decls.get(name).ok_or_else(|| GrammarError::new(format!("undefined terminal {:?}", name)))?;
        stack.push(name.to_string());
        let alts: Result<Vec<String>, GrammarError> = decl
            .expansions
            .alts
            .iter()
            .map(|alt| self.compile_terminal_expansion(&alt.expansion, decls, cache, stack))
            .collect();
        let alts = alts?;
        stack.pop();
        let pattern = if alts.len() == 1 { alts.into_iter().next().unwrap() } else { format!("(?:{})", alts.join("|")) };
        cache.insert(name.to_string(), pattern.clone());
        Ok(pattern)
    }

    fn compile_terminal_expansion(
        &self,
        expansion: &Expansion,
        decls: &HashMap<&str, &TokenDecl>,
        cache: &mut HashMap<String, String>,
        stack: &mut Vec<String>,
    ) -> Result<String, GrammarError> {
        let mut out = String::new();
        for expr in &expansion.exprs {
            out.push_str(&self.compile_terminal_expr(expr, decls, cache, stack)?);
        }
        Ok(out)
    }

    fn compile_terminal_expr(
        &self,
        expr: &Expr,
        decls: &HashMap<&str, &TokenDecl>,
        cache: &mut HashMap<String, String>,
        stack: &mut Vec<String>,
    ) -> Result<String, GrammarError> {
        let base = match &expr.atom {
            Atom::StringLiteral { text, case_insensitive } => {
                if *case_insensitive { format!("(?i:{})", escape(text)) } else { escape(text) }
            }
            Atom::Regex(r) => format!("(?:{})", r),
            Atom::Ref(n) => {
                if decls.contains_key(n.as_str()) {
                    self.resolve_terminal_pattern(n, decls, cache, stack)?
                } else if self.terminal_names.contains_key(n) {
                    // an externally declared terminal referenced from a
                    // composite terminal definition has no pattern to
                    // splice in; reject rather than silently drop it.
                    return Err(GrammarError::new(format!(
                        "terminal definition cannot reference the declared-external terminal {:?}",
                        n
                    )));
                } else {
                    return Err(GrammarError::new(format!("terminal expansion references unknown symbol {:?}", n)));
                }
            }
            Atom::Group(g) | Atom::OptionalGroup(g) => {
                let alts: Result<Vec<String>, GrammarError> =
                    g.alts.iter().map(|a| self.compile_terminal_expansion(&a.expansion, decls, cache, stack)).collect();
                let inner = alts?.join("|");
                let grouped = format!("(?:{})", inner);
                if matches!(expr.atom, Atom::OptionalGroup(_)) {
                    format!("{}?", grouped)
                } else {
                    grouped
                }
            }
        };
        Ok(apply_quantifier(&base, &expr.quantifier))
    }

    fn register_rules(&mut self, rules: &[RuleDecl]) -> Result<(), GrammarError> {
        for r in rules {
            for alt in &r.expansions.alts {
                let symbols = self.lower_symbols(&alt.expansion.exprs)?;
                self.rules.push(Rule {
                    name: Rc::from(r.name.as_str()),
                    symbols,
                    alias: alt.alias.as_deref().map(Rc::from),
                    keep_all_tokens: false,
                    filter_out: r.filter_out,
                    inline_if_single: r.inline,
                    optional_epsilon: false,
                    priority: self.apply_priority(r.priority),
                    order: self.rules.len(),
                });
            }
        }
        Ok(())
    }

    fn lower_symbols(&mut self, exprs: &[Expr]) -> Result<Vec<Symbol>, GrammarError> {
        let mut out = Vec::new();
        for expr in exprs {
            out.push(self.lower_expr(expr)?);
        }
        Ok(out)
    }

    fn lower_expr(&mut self, expr: &Expr) -> Result<Symbol, GrammarError> {
        let base = self.lower_atom(&expr.atom)?;
        match &expr.quantifier {
            Quantifier::None => Ok(base),
            Quantifier::Optional => Ok(self.make_optional(base)),
            Quantifier::Star => Ok(self.make_star(base)),
            Quantifier::Plus => Ok(self.make_plus(base)),
            Quantifier::Range { min, max } => self.make_range(base, *min, *max),
        }
    }

    fn lower_atom(&mut self, atom: &Atom) -> Result<Symbol, GrammarError> {
        match atom {
            Atom::Ref(name) => {
                if self.terminal_names.contains_key(name) {
                    Ok(Symbol::Terminal(Rc::from(name.as_str())))
                } else {
                    // Rules may be referenced before their declaration is
                    // processed in `register_rules`; validity is checked
                    // once the whole grammar is assembled.
                    Ok(Symbol::Rule(Rc::from(name.as_str())))
                }
            }
            Atom::StringLiteral { text, case_insensitive } => Ok(self.anon_literal_terminal(text, *case_insensitive)),
            Atom::Regex(r) => Ok(self.anon_regex_terminal(r)),
            Atom::Group(g) => Ok(self.make_group_rule(g, false)),
            Atom::OptionalGroup(g) => Ok(self.make_group_rule(g, true)),
        }
    }

    fn anon_literal_terminal(&mut self, text: &str, ci: bool) -> Symbol {
        let key = (text.to_string(), ci);
        if let Some(existing) = self.anon_literal.get(&key) {
            return Symbol::Terminal(Rc::from(existing.as_str()));
        }
        // A user terminal that matches this literal exactly wins over
        // creating a new anonymous one (spec §4.2).
        for t in &self.terminals {
            if let TerminalPattern::Literal { text: t_text, case_insensitive: t_ci } = &t.pattern {
                if t_text == text && *t_ci == ci {
                    self.anon_literal.insert(key, t.name.to_string());
                    return Symbol::Terminal(t.name.clone());
                }
            }
        }
        let name = format!("__ANON_{}", self.terminals.len());
        let keep = is_word_like(text);
        self.push_terminal(Terminal {
            name: Rc::from(name.as_str()),
            pattern: TerminalPattern::Literal { text: text.to_string(), case_insensitive: ci },
            priority: self.max_user_priority + 1,
            ignored: false,
            keep,
            order: self.terminals.len(),
        });
        self.anon_literal.insert(key, name.clone());
        Symbol::Terminal(Rc::from(name.as_str()))
    }

    fn anon_regex_terminal(&mut self, pattern: &str) -> Symbol {
        if let Some(existing) = self.anon_regex.get(pattern) {
            return Symbol::Terminal(Rc::from(existing.as_str()));
        }
        let name = format!("__ANON_{}", self.terminals.len());
        self.push_terminal(Terminal {
            name: Rc::from(name.as_str()),
            pattern: TerminalPattern::Regex(pattern.to_string()),
            priority: self.max_user_priority + 1,
            ignored: false,
            keep: true,
            order: self.terminals.len(),
        });
        self.anon_regex.insert(pattern.to_string(), name.clone());
        Symbol::Terminal(Rc::from(name.as_str()))
    }

    fn fresh_rule_name(&mut self) -> Rc<str> {
        let name = format!("__anon_{}", self.anon_rule_counter);
        self.anon_rule_counter += 1;
        Rc::from(name.as_str())
    }

    /// `(x y z)` or, with `optional = true`, `[x y z]` (spec §4.3).
    fn make_group_rule(&mut self, expansions: &Expansions, optional: bool) -> Symbol {
        let name = self.fresh_rule_name();
        let mut alt_symbols = Vec::new();
        for alt in &expansions.alts {
            let symbols = self.lower_symbols(&alt.expansion.exprs).unwrap_or_default();
            alt_symbols.push((symbols, alt.alias.clone()));
        }
        for (symbols, alias) in alt_symbols {
            self.rules.push(Rule {
                name: name.clone(),
                symbols,
                alias: alias.as_deref().map(Rc::from),
                keep_all_tokens: false,
                filter_out: true,
                inline_if_single: false,
                optional_epsilon: false,
                priority: 0,
                order: self.rules.len(),
            });
        }
        if optional {
            self.rules.push(Rule {
                name: name.clone(),
                symbols: Vec::new(),
                alias: None,
                keep_all_tokens: false,
                filter_out: true,
                inline_if_single: false,
                optional_epsilon: true,
                priority: 0,
                order: self.rules.len(),
            });
        }
        Symbol::Rule(name)
    }

    /// `a?` (spec §4.3: anonymous rule with productions `a` and `ε`).
    fn make_optional(&mut self, base: Symbol) -> Symbol {
        let name = self.fresh_rule_name();
        self.push_alt(&name, vec![base]);
        self.push_alt_optional_epsilon(&name);
        Symbol::Rule(name)
    }

    /// `a+` (spec §4.3: `a_plus: a | a_plus a`, left-recursive).
    fn make_plus(&mut self, base: Symbol) -> Symbol {
        let name = self.fresh_rule_name();
        self.push_alt(&name, vec![base.clone()]);
        self.push_alt(&name, vec![Symbol::Rule(name.clone()), base]);
        Symbol::Rule(name)
    }

    /// `a*` (spec §4.3: `a_star: | a_star a`, left-recursive).
    fn make_star(&mut self, base: Symbol) -> Symbol {
        let name = self.fresh_rule_name();
        self.push_alt(&name, vec![]);
        self.push_alt(&name, vec![Symbol::Rule(name.clone()), base]);
        Symbol::Rule(name)
    }

    /// `a ~ n..m` (spec §4.3: enumerated alternatives of lengths n..=m).
    fn make_range(&mut self, base: Symbol, min: u32, max: Option<u32>) -> Result<Symbol, GrammarError> {
        let max = max.unwrap_or(min);
        if max < min {
            return Err(GrammarError::new(format!("invalid repetition range {}..{}", min, max)));
        }
        let name = self.fresh_rule_name();
        for count in min..=max {
            let symbols = std::iter::repeat(base.clone()).take(count as usize).collect();
            self.push_alt(&name, symbols);
        }
        Ok(Symbol::Rule(name))
    }

    fn push_alt(&mut self, name: &Rc<str>, symbols: Vec<Symbol>) {
        self.rules.push(Rule {
            name: name.clone(),
            symbols,
            alias: None,
            keep_all_tokens: false,
            filter_out: true,
            inline_if_single: false,
            optional_epsilon: false,
            priority: 0,
            order: self.rules.len(),
        });
    }

    /// The epsilon alternative of a genuine `a?`, marked so the LALR/Earley
    /// drivers can tell it apart from the structurally identical empty base
    /// case of `a*` when `maybe_placeholders` is enabled.
    fn push_alt_optional_epsilon(&mut self, name: &Rc<str>) {
        self.rules.push(Rule {
            name: name.clone(),
            symbols: Vec::new(),
            alias: None,
            keep_all_tokens: false,
            filter_out: true,
            inline_if_single: false,
            optional_epsilon: true,
            priority: 0,
            order: self.rules.len(),
        });
    }
}

fn apply_quantifier(base: &str, q: &Quantifier) -> String {
    match q {
        Quantifier::None => base.to_string(),
        Quantifier::Optional => format!("(?:{})?", base),
        Quantifier::Star => format!("(?:{})*", base),
        Quantifier::Plus => format!("(?:{})+", base),
        Quantifier::Range { min, max } => match max {
            Some(max) => format!("(?:{}){{{},{}}}", base, min, max),
            None => format!("(?:{}){{{}}}", base, min),
        },
    }
}

fn is_word_like(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::loader::{load, NoImports};
    use crate::grammar::parser::parse_grammar;

    fn lower_src(src: &str, start: &str) -> Grammar {
        let gf = parse_grammar(src).unwrap();
        let loaded = load(gf, &NoImports).unwrap();
        lower(loaded, LowerOptions { start_symbols: vec![start.to_string()], priority: PriorityMode::Normal }).unwrap()
    }

    #[test]
    fn star_desugars_left_recursive() {
        let g = lower_src("start: \"a\"*\n", "start");
        let star_name = match &g.rules[0].symbols[0] {
            Symbol::Rule(n) => n.clone(),
            _ => panic!("expected anonymous rule"),
        };
        let prods: Vec<_> = g.productions(&star_name).collect();
        assert_eq!(prods.len(), 2);
        assert!(prods.iter().any(|r| r.symbols.is_empty()));
    }

    #[test]
    fn anonymous_literal_keyword_is_kept() {
        let g = lower_src("start: \"true\"\n", "start");
        let t = g.terminals.iter().find(|t| matches!(&t.pattern, TerminalPattern::Literal{text,..} if text=="true")).unwrap();
        assert!(t.keep);
    }

    #[test]
    fn anonymous_punctuation_is_not_kept() {
        let g = lower_src("start: \",\"\n", "start");
        let t = g.terminals.iter().find(|t| matches!(&t.pattern, TerminalPattern::Literal{text,..} if text==",")).unwrap();
        assert!(!t.keep);
    }

    #[test]
    fn identical_literals_collapse_to_one_terminal() {
        let g = lower_src("start: a b\na: \"x\"\nb: \"x\"\n", "start");
        let anon_count = g.terminals.iter().filter(|t| t.name.starts_with("__ANON_")).count();
        assert_eq!(anon_count, 1);
    }
}
