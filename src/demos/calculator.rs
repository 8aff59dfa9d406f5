//! A small arithmetic-expression grammar (the S2 scenario grammar),
//! evaluated through a [`crate::Transformer`] rather than just walked,
//! so this fixture also exercises the visitor half of the public API.
pub const GRAMMAR: &str = "\
?start: sum
?sum: product
    | sum \"+\" product -> add
    | sum \"-\" product -> sub
?product: atom
    | product \"*\" atom -> mul
    | product \"/\" atom -> div
?atom: NUMBER -> number
     | \"-\" atom -> neg
     | \"(\" sum \")\"
NUMBER: /[0-9]+(\\.[0-9]+)?/
%ignore \" \"
";

fn evaluator() -> crate::NamedTransformer<f64> {
    crate::NamedTransformer::new(
        |tok| tok.value.parse::<f64>().expect("NUMBER always lexes a valid f64"),
        |name, _| Err(crate::VisitError { rule: name.to_string(), message: "no handler registered".into() }),
    )
    .on("number", |c| Ok(c[0]))
    .on("neg", |c| Ok(-c[0]))
    .on("add", |c| Ok(c[0] + c[1]))
    .on("sub", |c| Ok(c[0] - c[1]))
    .on("mul", |c| Ok(c[0] * c[1]))
    .on("div", |c| Ok(c[0] / c[1]))
}

pub fn evaluate(tree: &crate::Tree) -> Result<f64, crate::VisitError> {
    crate::transform(tree, &evaluator())
}
