//! Worked-example grammars, analogous to the teacher's own
//! `examples/json/{lexerless,tokenized}` pair: real small grammars kept
//! in the tree as fixtures rather than scattered across unit tests, each
//! exercised by both engines to confirm they agree (spec §8 property 1).
pub mod calculator;
pub mod json;
