//! Language front ends.
//!
//! Rust is read through `syn`; every other language goes through the
//! tokenizer-derived pseudo-trees in [`tokens`], the literal parser in
//! [`literal`] and the call-statement splitter in [`calls`].

pub mod calls;
pub mod literal;
pub mod records;
pub mod rust;
pub mod tokens;
