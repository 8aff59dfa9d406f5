//! Visitor/Transformer dispatch over immutable parse trees (spec §4.8
//! C10). Grounded on spec §9 "Transformer dispatch": a name→handler
//! mapping as the portable substitute for method-lookup-by-name, built in
//! the teacher's `Rc<dyn ...>` trait-object idiom (already used
//! throughout `production/mod.rs`) since no teacher precedent exists for
//! named dispatch verbatim.
use crate::error::VisitError;
use crate::tree::{Child, Token, Tree};
use std::collections::HashMap;
use std::rc::Rc;

/// Walk order for [`Visitor`] (spec §4.8 "top-down or bottom-up walk").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    TopDown,
    BottomUp,
}

/// Invokes a handler per rule name while walking a tree; returns nothing
/// (spec §4.8 `Visitor`).
pub struct Visitor {
    handlers: HashMap<String, Rc<dyn Fn(&Tree)>>,
    order: Order,
}

impl Visitor {
    pub fn new(order: Order) -> Self {
        Self { handlers: HashMap::new(), order }
    }

    /// Registers `handler` to run whenever a tree node named `rule` is
    /// visited.
    pub fn on(mut self, rule: impl Into<String>, handler: impl Fn(&Tree) + 'static) -> Self {
        self.handlers.insert(rule.into(), Rc::new(handler));
        self
    }

    pub fn visit(&self, tree: &Tree) {
        match self.order {
            Order::TopDown => self.visit_top_down(tree),
            Order::BottomUp => self.visit_bottom_up(tree),
        }
    }

    fn visit_top_down(&self, tree: &Tree) {
        self.dispatch(tree);
        for child in &tree.children {
            if let Child::Tree(sub) = child {
                self.visit_top_down(sub);
            }
        }
    }

    fn visit_bottom_up(&self, tree: &Tree) {
        for child in &tree.children {
            if let Child::Tree(sub) = child {
                self.visit_bottom_up(sub);
            }
        }
        self.dispatch(tree);
    }

    fn dispatch(&self, tree: &Tree) {
        if let Some(handler) = self.handlers.get(tree.data.as_ref()) {
            handler(tree);
        }
    }
}

/// Bottom-up rewrite: the handler for rule `R` receives the
/// already-transformed children and returns a replacement value; the
/// root's transformed value is the final result (spec §4.8
/// `Transformer`). This is the "inline" variant: handlers see the
/// children themselves, with no access back to the source `Tree` node,
/// the closest Rust equivalent of Lark's positional-argument unpacking.
pub trait Transformer<V> {
    fn token(&self, token: &Token) -> V;
    fn rule(&self, name: &str, children: Vec<V>) -> Result<V, VisitError>;
}

pub fn transform<V>(tree: &Tree, t: &dyn Transformer<V>) -> Result<V, VisitError> {
    let mut children = Vec::with_capacity(tree.children.len());
    for child in &tree.children {
        children.push(match child {
            Child::Tree(sub) => transform(sub, t)?,
            Child::Token(tok) => t.token(tok),
        });
    }
    t.rule(&tree.data, children)
}

/// The other `Transformer` variant named in spec §4.8: the handler also
/// receives the whole (pre-transform) tree node, for rules whose
/// replacement needs the node's own span or alias rather than only its
/// children's values.
pub trait TreeTransformer<V> {
    fn token(&self, token: &Token) -> V;
    fn rule(&self, tree: &Tree, children: Vec<V>) -> Result<V, VisitError>;
}

pub fn transform_with_tree<V>(tree: &Tree, t: &dyn TreeTransformer<V>) -> Result<V, VisitError> {
    let mut children = Vec::with_capacity(tree.children.len());
    for child in &tree.children {
        children.push(match child {
            Child::Tree(sub) => transform_with_tree(sub, t)?,
            Child::Token(tok) => t.token(tok),
        });
    }
    t.rule(tree, children)
}

/// A [`Transformer`] built from a name→handler registry rather than a
/// hand-written impl, for callers assembling dispatch tables at runtime
/// (spec §9 "name→handler mapping").
pub struct NamedTransformer<V> {
    handlers: HashMap<String, Rc<dyn Fn(Vec<V>) -> Result<V, VisitError>>>,
    token_handler: Rc<dyn Fn(&Token) -> V>,
    default_rule: Rc<dyn Fn(&str, Vec<V>) -> Result<V, VisitError>>,
}

impl<V: 'static> NamedTransformer<V> {
    /// `token_handler` converts a leaf token to `V`; `default_rule` runs
    /// for any rule name with no registered handler (typically: error, or
    /// pass the children through unchanged for a single-child rule).
    pub fn new(token_handler: impl Fn(&Token) -> V + 'static, default_rule: impl Fn(&str, Vec<V>) -> Result<V, VisitError> + 'static) -> Self {
        Self { handlers: HashMap::new(), token_handler: Rc::new(token_handler), default_rule: Rc::new(default_rule) }
    }

    pub fn on(mut self, rule: impl Into<String>, handler: impl Fn(Vec<V>) -> Result<V, VisitError> + 'static) -> Self {
        self.handlers.insert(rule.into(), Rc::new(handler));
        self
    }
}

impl<V> Transformer<V> for NamedTransformer<V> {
    fn token(&self, token: &Token) -> V {
        (self.token_handler)(token)
    }

    fn rule(&self, name: &str, children: Vec<V>) -> Result<V, VisitError> {
        match self.handlers.get(name) {
            Some(handler) => handler(children),
            None => (self.default_rule)(name, children),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Span;
    use std::cell::RefCell;

    fn leaf_tree(name: &str, children: Vec<Child>) -> Tree {
        let meta = Tree::span_from_children(&children);
        Tree::new(Rc::from(name), children, meta)
    }

    fn num_token(value: &str) -> Child {
        Child::Token(Token::new(Rc::from("NUMBER"), value.to_string(), Span::default(), true))
    }

    /// `(200 + 3*-3) * 7` built by hand as `mul(add(200, neg(mul(3, 3))), 7)`,
    /// mirroring spec scenario S2's calculator grammar shape.
    fn calculator_tree() -> Tree {
        let two_hundred = leaf_tree("number", vec![num_token("200")]);
        let three_a = leaf_tree("number", vec![num_token("3")]);
        let three_b = leaf_tree("number", vec![num_token("3")]);
        let inner_mul = leaf_tree("mul", vec![Child::Tree(three_a), Child::Tree(three_b)]);
        let negated = leaf_tree("neg", vec![Child::Tree(inner_mul)]);
        let sum = leaf_tree("add", vec![Child::Tree(two_hundred), Child::Tree(negated)]);
        let seven = leaf_tree("number", vec![num_token("7")]);
        leaf_tree("mul", vec![Child::Tree(sum), Child::Tree(seven)])
    }

    fn calculator() -> NamedTransformer<f64> {
        NamedTransformer::new(
            |tok| tok.value.parse().unwrap_or(0.0),
            |name, _| Err(VisitError { rule: name.to_string(), message: "no handler".into() }),
        )
        .on("number", |children| Ok(children[0]))
        .on("neg", |children| Ok(-children[0]))
        .on("add", |children| Ok(children.iter().sum()))
        .on("mul", |children| Ok(children.iter().product()))
    }

    #[test]
    fn transforms_calculator_expression_to_expected_value() {
        let tree = calculator_tree();
        let result = transform(&tree, &calculator()).unwrap();
        assert_eq!(result, 1337.0);
    }

    #[test]
    fn visitor_runs_bottom_up_before_parent() {
        let tree = calculator_tree();
        let order: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let seen = order.clone();
        let visitor = Visitor::new(Order::BottomUp).on("mul", move |t| seen.borrow_mut().push(t.data.to_string()));
        visitor.visit(&tree);
        // the inner mul(3, 3) must be recorded before the outer mul(add, 7)
        assert_eq!(order.borrow().len(), 2);
    }

    #[test]
    fn tree_transformer_sees_original_node() {
        struct SpanCounter;
        impl TreeTransformer<usize> for SpanCounter {
            fn token(&self, _token: &Token) -> usize {
                1
            }
            fn rule(&self, _tree: &Tree, children: Vec<usize>) -> Result<usize, VisitError> {
                Ok(children.iter().sum())
            }
        }
        let tree = calculator_tree();
        let leaves = transform_with_tree(&tree, &SpanCounter).unwrap();
        assert_eq!(leaves, 4);
    }
}
