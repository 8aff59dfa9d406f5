//! A JSON grammar, small enough to read in one sitting but with every
//! shape the engines need to agree on: nesting, repetition, optional
//! groups, and aliased alternatives.
pub const GRAMMAR: &str = "\
?start: value
?value: object
      | array
      | STRING -> string
      | NUMBER -> number
      | \"true\" -> true_
      | \"false\" -> false_
      | \"null\" -> null_
object: \"{\" [pair (\",\" pair)*] \"}\"
pair: STRING \":\" value
array: \"[\" [value (\",\" value)*] \"]\"
STRING: /\"([^\"\\\\]|\\\\.)*\"/
NUMBER: /-?[0-9]+(\\.[0-9]+)?([eE][+-]?[0-9]+)?/
%ignore /[ \\t\\n\\r]+/
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LexerMode, NoImports, Parser, ParserAlgorithm, ParserOptions};

    fn sample() -> &'static str {
        r#"{"a": [1, 2.5, true, null], "b": "x", "c": {}}"#
    }

    #[test]
    fn lalr_parses_the_sample() {
        let parser = Parser::build(GRAMMAR, &NoImports, ParserOptions::new().parser(ParserAlgorithm::Lalr)).unwrap();
        let tree = parser.parse(sample(), None).unwrap();
        assert_eq!(&*tree.data, "object");
    }

    #[test]
    fn earley_parses_the_sample() {
        let parser = Parser::build(
            GRAMMAR,
            &NoImports,
            ParserOptions::new().parser(ParserAlgorithm::Earley).lexer(LexerMode::Dynamic),
        )
        .unwrap();
        let tree = parser.parse(sample(), None).unwrap();
        assert_eq!(&*tree.data, "object");
    }

    /// Spec §8 property 1: on an unambiguous grammar, both engines must
    /// produce identical trees, not just trees that look alike.
    #[test]
    fn both_engines_agree_on_the_sample() {
        let lalr = Parser::build(GRAMMAR, &NoImports, ParserOptions::new().parser(ParserAlgorithm::Lalr)).unwrap();
        let earley = Parser::build(
            GRAMMAR,
            &NoImports,
            ParserOptions::new().parser(ParserAlgorithm::Earley).lexer(LexerMode::Dynamic),
        )
        .unwrap();

        let lalr_tree = lalr.parse(sample(), None).unwrap();
        let earley_tree = earley.parse(sample(), None).unwrap();
        assert_eq!(lalr_tree, earley_tree);
    }

    #[test]
    fn empty_array_and_object_round_trip() {
        let parser = Parser::build(GRAMMAR, &NoImports, ParserOptions::new().parser(ParserAlgorithm::Lalr)).unwrap();
        let tree = parser.parse("[]", None).unwrap();
        assert_eq!(&*tree.data, "array");
        assert_eq!(tree.children.len(), 0);
    }

    /// Cross-checks against a real JSON parser: anything this grammar
    /// accepts as well-formed, `serde_json` should too.
    #[test]
    fn accepted_input_is_also_valid_json_by_serde() {
        let parser = Parser::build(GRAMMAR, &NoImports, ParserOptions::new().parser(ParserAlgorithm::Lalr)).unwrap();
        parser.parse(sample(), None).unwrap();
        serde_json::from_str::<serde_json::Value>(sample()).unwrap();
    }
}
