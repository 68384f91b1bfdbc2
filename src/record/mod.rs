//! Record-file layer
//!
//! Parses SGF game-record files into a [`Document`] and serializes them back.
//! The pipeline treats this layer as an opaque collaborator: the per-file
//! actions call [`parse_file`] and [`write_document`], nothing else does.
//!
//! Parsing never fails outright. Syntax and semantic problems are collected
//! as [`ParseError`]s next to whatever could be recovered, and the caller's
//! error policy decides what happens to the file.

mod parser;
pub mod types;
mod writer;

pub use parser::{parse_file, ParseError, MAX_TREE_DEPTH};
pub use types::{Document, GameTree, Node, ParseMode, Property};
pub use writer::write_document;
