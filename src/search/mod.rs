//! Per-document vector stores and the fan-in across them.

pub mod fanin;
pub mod vector;
