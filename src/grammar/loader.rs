//! Import resolution and directive application (spec §4.2 C3).
//!
//! `%import` is resolved through an explicit [`GrammarSource`] trait
//! rather than touching disk directly, per spec §1 ("file discovery and
//! import path resolution from disk" is an external collaborator) and
//! design note "Global grammar registry for `%import`": no process-wide
//! mutable registry, just a loader object passed in at construction --
//! the same boundary-by-trait style the teacher uses for
//! `ITokenization`/`ILexeme` to keep an external concern behind an
//! interface instead of baking it into the core.
use super::ast::*;
use super::parser::parse_grammar;
use crate::error::GrammarError;
use std::collections::{HashMap, HashSet};

/// Supplies the text of an imported grammar module given its dotted path
/// segments (e.g. `["common"]` for `%import common.NUMBER`). Implemented
/// by the out-of-scope file-discovery layer; this crate never reads from
/// disk itself.
pub trait GrammarSource {
    fn resolve(&self, path: &[String]) -> Result<String, GrammarError>;
}

/// A `GrammarSource` with no modules available, for standalone grammars
/// that use no `%import` statements.
pub struct NoImports;
impl GrammarSource for NoImports {
    fn resolve(&self, path: &[String]) -> Result<String, GrammarError> {
        Err(GrammarError::new(format!("no grammar source configured to resolve import {:?}", path.join("."))))
    }
}

/// The merged, directive-applied (but not yet lowered) set of
/// declarations ready for [`super::lower::lower`].
#[derive(Debug, Default)]
pub struct LoadedGrammar {
    pub rules: Vec<RuleDecl>,
    pub tokens: Vec<TokenDecl>,
    pub ignored: HashSet<String>,
    pub declared: HashSet<String>,
}

struct Builder<'s> {
    source: &'s dyn GrammarSource,
    rules: HashMap<String, RuleDecl>,
    rule_order: Vec<String>,
    tokens: HashMap<String, TokenDecl>,
    token_order: Vec<String>,
    ignored: HashSet<String>,
    declared: HashSet<String>,
    importing: HashSet<String>,
    anon_ignore_counter: usize,
}

pub fn load(root_items: GrammarFile, source: &dyn GrammarSource) -> Result<LoadedGrammar, GrammarError> {
    let mut b = Builder {
        source,
        rules: HashMap::new(),
        rule_order: Vec::new(),
        tokens: HashMap::new(),
        token_order: Vec::new(),
        ignored: HashSet::new(),
        declared: HashSet::new(),
        importing: HashSet::new(),
        anon_ignore_counter: 0,
    };
    b.apply_items(root_items)?;
    Ok(LoadedGrammar {
        rules: b.rule_order.iter().map(|n| b.rules[n].clone()).collect(),
        tokens: b.token_order.iter().map(|n| b.tokens[n].clone()).collect(),
        ignored: b.ignored,
        declared: b.declared,
    })
}

impl<'s> Builder<'s> {
    fn apply_items(&mut self, file: GrammarFile) -> Result<(), GrammarError> {
        for item in file.items {
            match item {
                GrammarItem::Rule(r) => self.insert_rule(r, false)?,
                GrammarItem::Token(t) => self.insert_token(t, false)?,
                GrammarItem::Statement(Statement::Ignore(target)) => {
                    let name = self.register_ignore_target(target)?;
                    self.ignored.insert(name);
                }
                GrammarItem::Statement(Statement::Declare(names)) => {
                    for n in names {
                        self.declared.insert(n);
                    }
                }
                GrammarItem::Statement(Statement::Override(Item::Rule(r))) => self.insert_rule(r, true)?,
                GrammarItem::Statement(Statement::Override(Item::Token(t))) => self.insert_token(t, true)?,
                GrammarItem::Statement(Statement::Extend(Item::Rule(r))) => self.extend_rule(r)?,
                GrammarItem::Statement(Statement::Extend(Item::Token(t))) => self.extend_token(t)?,
                GrammarItem::Statement(Statement::Import(imp)) => self.apply_import(imp)?,
            }
        }
        Ok(())
    }

    fn insert_rule(&mut self, r: RuleDecl, is_override: bool) -> Result<(), GrammarError> {
        if is_override && !self.rules.contains_key(&r.name) {
            return Err(GrammarError::new(format!("%override of undefined rule {:?}", r.name)));
        }
        if !is_override && self.rules.contains_key(&r.name) {
            return Err(GrammarError::new(format!("rule {:?} defined more than once", r.name)));
        }
        if !self.rules.contains_key(&r.name) {
            self.rule_order.push(r.name.clone());
        }
        self.rules.insert(r.name.clone(), r);
        Ok(())
    }

    fn insert_token(&mut self, t: TokenDecl, is_override: bool) -> Result<(), GrammarError> {
        if is_override && !self.tokens.contains_key(&t.name) {
            return Err(GrammarError::new(format!("%override of undefined terminal {:?}", t.name)));
        }
        if !is_override && self.tokens.contains_key(&t.name) {
            return Err(GrammarError::new(format!("terminal {:?} defined more than once", t.name)));
        }
        if !self.tokens.contains_key(&t.name) {
            self.token_order.push(t.name.clone());
        }
        self.tokens.insert(t.name.clone(), t);
        Ok(())
    }

    fn extend_rule(&mut self, r: RuleDecl) -> Result<(), GrammarError> {
        let existing = self.rules.get_mut(&r.name)
            .ok_or_else(|| GrammarError::new(format!("%extend of undefined rule {:?}", r.name)))?;
        existing.expansions.alts.extend(r.expansions.alts);
        Ok(())
    }

    /// Resolves a `%ignore` target to a terminal name, synthesizing an
    /// anonymous terminal declaration for an inline literal/regex (spec
    /// §4.2): `%ignore " "` needs no prior `WS: " "` declaration to
    /// refer to.
    fn register_ignore_target(&mut self, target: IgnoreTarget) -> Result<String, GrammarError> {
        let atom = match target {
            IgnoreTarget::Name(n) => return Ok(n),
            IgnoreTarget::Literal { text, case_insensitive } => Atom::StringLiteral { text, case_insensitive },
            IgnoreTarget::Regex(pattern) => Atom::Regex(pattern),
        };
        let name = format!("__IGNORE_{}", self.anon_ignore_counter);
        self.anon_ignore_counter += 1;
        let decl = TokenDecl {
            name: name.clone(),
            ignored: false,
            priority: None,
            expansions: single_atom_expansions(atom),
        };
        self.insert_token(decl, false)?;
        Ok(name)
    }

    fn extend_token(&mut self, t: TokenDecl) -> Result<(), GrammarError> {
        let existing = self.tokens.get_mut(&t.name)
            .ok_or_else(|| GrammarError::new(format!("%extend of undefined terminal {:?}", t.name)))?;
        existing.expansions.alts.extend(t.expansions.alts);
        Ok(())
    }

    fn apply_import(&mut self, imp: ImportStatement) -> Result<(), GrammarError> {
        let key = imp.path.join(".");
        if !self.importing.insert(key.clone()) {
            return Err(GrammarError::new(format!("cyclic %import of {:?}", key)));
        }
        let text = self.source.resolve(&imp.path)?;
        let parsed = parse_grammar(&text).map_err(|e| GrammarError::new(format!("in imported module {:?}: {}", key, e)))?;

        let mut module_rules = HashMap::new();
        let mut module_tokens = HashMap::new();
        let mut module_ignored = HashSet::new();
        for item in &parsed.items {
            match item {
                GrammarItem::Rule(r) => { module_rules.insert(r.name.clone(), r.clone()); }
                GrammarItem::Token(t) => { module_tokens.insert(t.name.clone(), t.clone()); }
                GrammarItem::Statement(Statement::Ignore(target)) => match target {
                    IgnoreTarget::Name(n) => { module_ignored.insert(n.clone()); }
                    IgnoreTarget::Literal { .. } | IgnoreTarget::Regex(_) => {
                        let name = self.register_ignore_target(target.clone())?;
                        self.ignored.insert(name);
                    }
                },
                _ => {}
            }
        }

        let mut needed_rules = HashSet::new();
        let mut needed_tokens = HashSet::new();
        let mut frontier: Vec<String> = imp.names.iter().map(|(from, _)| from.clone()).collect();
        while let Some(name) = frontier.pop() {
            if let Some(r) = module_rules.get(&name) {
                if needed_rules.insert(name.clone()) {
                    for refname in referenced_names(&r.expansions) {
                        frontier.push(refname);
                    }
                }
            } else if let Some(t) = module_tokens.get(&name) {
                if needed_tokens.insert(name.clone()) {
                    for refname in referenced_names(&t.expansions) {
                        frontier.push(refname);
                    }
                }
            } else {
                return Err(GrammarError::new(format!("import {:?} not found in module {:?}", name, key)));
            }
        }

        for name in &needed_rules {
            let mut decl = module_rules[name].clone();
            if let Some(rename) = rename_of(&imp.names, name) {
                decl.name = rename;
            }
            self.insert_rule(decl, false).or_else(|e| {
                // re-importing an identical rule via a shared dependency is benign
                if self.rules.get(name).is_some() { Ok(()) } else { Err(e) }
            })?;
        }
        for name in &needed_tokens {
            let mut decl = module_tokens[name].clone();
            if let Some(rename) = rename_of(&imp.names, name) {
                decl.name = rename;
            }
            if module_ignored.contains(name) {
                self.ignored.insert(decl.name.clone());
            }
            self.insert_token(decl, false).or_else(|e| {
                if self.tokens.get(name).is_some() { Ok(()) } else { Err(e) }
            })?;
        }

        self.importing.remove(&key);
        Ok(())
    }
}

/// A `TokenDecl`'s expansion for a single, unquantified atom: just enough
/// structure to give a synthesized ignore-terminal something to match.
fn single_atom_expansions(atom: Atom) -> Expansions {
    Expansions {
        alts: vec![Alias {
            expansion: Expansion { exprs: vec![Expr { atom, quantifier: Quantifier::None }] },
            alias: None,
        }],
    }
}

fn rename_of(names: &[(String, Option<String>)], original: &str) -> Option<String> {
    names.iter().find(|(from, _)| from == original).and_then(|(_, to)| to.clone())
}

fn referenced_names(expansions: &Expansions) -> Vec<String> {
    let mut out = Vec::new();
    fn walk(e: &Expansions, out: &mut Vec<String>) {
        for alt in &e.alts {
            for expr in &alt.expansion.exprs {
                match &expr.atom {
                    Atom::Ref(n) => out.push(n.clone()),
                    Atom::Group(g) | Atom::OptionalGroup(g) => walk(g, out),
                    Atom::StringLiteral { .. } | Atom::Regex(_) => {}
                }
            }
        }
    }
    walk(expansions, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSource;
    impl GrammarSource for FakeSource {
        fn resolve(&self, path: &[String]) -> Result<String, GrammarError> {
            match path.join(".").as_str() {
                "common" => Ok("NUMBER: /[0-9]+(\\.[0-9]+)?/\nWORD: /[a-zA-Z]+/\n".to_string()),
                other => Err(GrammarError::new(format!("no such module {:?}", other))),
            }
        }
    }

    #[test]
    fn import_brings_in_requested_terminal() {
        let gf = parse_grammar("start: NUMBER\n%import common.NUMBER\n").unwrap();
        let loaded = load(gf, &FakeSource).unwrap();
        assert!(loaded.tokens.iter().any(|t| t.name == "NUMBER"));
        assert!(!loaded.tokens.iter().any(|t| t.name == "WORD"));
    }

    #[test]
    fn override_requires_prior_definition() {
        let gf = parse_grammar("%override start: \"x\"\n").unwrap();
        let err = load(gf, &NoImports).unwrap_err();
        assert!(format!("{}", err).contains("undefined rule"));
    }
}
