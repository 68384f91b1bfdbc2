//! Recursive-descent SGF parser
//!
//! ```text
//! Collection = GameTree { GameTree }
//! GameTree   = "(" Sequence { GameTree } ")"
//! Sequence   = Node { Node }
//! Node       = ";" { Property }
//! Property   = PropIdent PropValue { PropValue }
//! PropValue  = "[" text "]"
//! ```
//!
//! Text before the first `(` is ignored, as archives often carry headers.
//! Variations nest at most [`MAX_TREE_DEPTH`] deep; deeper subtrees are
//! reported and skipped.

use super::types::{
    parse_board_size, Document, GameTree, Node, ParseMode, Property, DEFAULT_BOARD_SIZE,
};
use thiserror::Error;
use tracing::trace;

/// Deepest variation nesting that is parsed; the top-level tree is depth 1
pub const MAX_TREE_DEPTH: usize = 128;

/// A problem found while parsing, with the byte offset it was found at
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("byte {offset}: {message}")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

/// Parse a record file
///
/// `move_limit > 0` stops storing nodes once that many move nodes have been
/// read; the rest of the file is still scanned so syntax errors are reported.
pub fn parse_file(
    name: &str,
    bytes: &[u8],
    mode: ParseMode,
    move_limit: usize,
) -> (Document, Vec<ParseError>) {
    let mut parser = Parser {
        name,
        src: bytes,
        pos: 0,
        mode,
        move_limit,
        moves_seen: 0,
        truncated: false,
        board: (DEFAULT_BOARD_SIZE, DEFAULT_BOARD_SIZE),
        errors: Vec::new(),
    };

    let collection = parser.collection();
    let document = Document {
        name: name.to_string(),
        collection,
        truncated: parser.truncated,
    };
    (document, parser.errors)
}

struct Parser<'a> {
    name: &'a str,
    src: &'a [u8],
    pos: usize,
    mode: ParseMode,
    move_limit: usize,
    moves_seen: usize,
    truncated: bool,
    board: (u8, u8),
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    fn collection(&mut self) -> Vec<GameTree> {
        let mut trees = Vec::new();
        loop {
            // Skip anything that is not the start of a game tree
            while let Some(b) = self.peek() {
                if b == b'(' {
                    break;
                }
                self.pos += 1;
            }
            if self.peek().is_none() {
                break;
            }
            self.board = (DEFAULT_BOARD_SIZE, DEFAULT_BOARD_SIZE);
            let tree = self.game_tree(1);
            trees.push(tree);
        }

        if trees.is_empty() && !self.src.iter().all(u8::is_ascii_whitespace) {
            self.error(0, "no game tree found");
        }
        trees
    }

    fn game_tree(&mut self, depth: usize) -> GameTree {
        let open = self.pos;
        self.pos += 1; // '('
        let mut tree = GameTree::default();
        let top_level = depth == 1;

        if depth > MAX_TREE_DEPTH {
            self.error(open, format!("variations nested deeper than {}", MAX_TREE_DEPTH));
            self.skip_tree();
            return tree;
        }

        self.skip_ws();
        if self.peek() != Some(b';') {
            self.error(self.pos, "game tree without nodes");
        }

        loop {
            self.skip_ws();
            match self.peek() {
                Some(b';') => {
                    let is_root = top_level && tree.nodes.is_empty();
                    if let Some(node) = self.node(is_root) {
                        tree.nodes.push(node);
                    }
                }
                Some(b'(') => {
                    let variation = self.game_tree(depth + 1);
                    if !variation.nodes.is_empty() {
                        tree.variations.push(variation);
                    }
                }
                Some(b')') => {
                    self.pos += 1;
                    return tree;
                }
                Some(b) => {
                    self.error(self.pos, format!("unexpected character '{}'", b as char));
                    self.pos += 1;
                }
                None => {
                    self.error(open, "unterminated game tree");
                    return tree;
                }
            }
        }
    }

    /// Parse one node; `None` when the move limit dropped it
    fn node(&mut self, is_root: bool) -> Option<Node> {
        let start = self.pos;
        self.pos += 1; // ';'
        let mut node = Node::default();

        loop {
            self.skip_ws();
            match self.peek() {
                Some(b) if b.is_ascii_alphabetic() => {
                    if let Some(property) = self.property() {
                        node.properties.push(property);
                    }
                }
                _ => break,
            }
        }

        if !self.mode.contains(ParseMode::COMMENTS) {
            node.properties.retain(|p| p.ident != "C");
        }

        if is_root {
            if let Some(size) = node.get("SZ").and_then(|sz| parse_board_size(&sz.value())) {
                self.board = size;
            }
            if self.mode.contains(ParseMode::GOGOD) {
                self.check_root(&node, start);
            }
        }

        if self.mode.contains(ParseMode::PLAY) {
            self.check_moves(&node, start);
        }

        if self.mode.contains(ParseMode::TRACE) {
            trace!(
                file = self.name,
                offset = start,
                properties = node.properties.len(),
                "Parsed node"
            );
        }

        if self.move_limit > 0 && self.moves_seen >= self.move_limit {
            self.truncated = true;
            return None;
        }
        if node.is_move() {
            self.moves_seen += 1;
        }
        Some(node)
    }

    fn property(&mut self) -> Option<Property> {
        let start = self.pos;
        let mut ident = String::new();
        while let Some(b) = self.peek() {
            if !b.is_ascii_alphabetic() {
                break;
            }
            // FF[1-3] long identifiers mix in lowercase letters; only the capitals count
            if b.is_ascii_uppercase() {
                ident.push(b as char);
            }
            self.pos += 1;
        }

        let mut values = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() != Some(b'[') {
                break;
            }
            match self.value() {
                Some(value) => values.push(value),
                None => break,
            }
        }

        if ident.is_empty() {
            self.error(start, "property identifier without capital letters");
            return None;
        }
        if values.is_empty() {
            self.error(start, format!("property {} has no value", ident));
            return None;
        }
        Some(Property::new(ident, values))
    }

    fn value(&mut self) -> Option<Vec<u8>> {
        let open = self.pos;
        self.pos += 1; // '['
        let mut raw = Vec::new();
        loop {
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    return Some(raw);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        // Soft line break
                        Some(b'\n') => self.pos += 1,
                        Some(b'\r') => {
                            self.pos += 1;
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        Some(b) => {
                            raw.push(b);
                            self.pos += 1;
                        }
                        None => {}
                    }
                }
                Some(b) => {
                    raw.push(b);
                    self.pos += 1;
                }
                None => {
                    self.error(open, "unterminated property value");
                    return None;
                }
            }
        }
    }

    fn check_root(&mut self, node: &Node, offset: usize) {
        if let Some(gm) = node.get("GM") {
            if gm.value().trim() != "1" {
                self.error(offset, format!("GM[{}] is not a game of Go", gm.value()));
            }
        }
        if let Some(ff) = node.get("FF") {
            match ff.value().trim().parse::<u8>() {
                Ok(1..=4) => {}
                _ => self.error(offset, format!("unsupported file format FF[{}]", ff.value())),
            }
        }
    }

    fn check_moves(&mut self, node: &Node, offset: usize) {
        let (cols, rows) = self.board;
        for prop in node.properties.iter().filter(|p| p.ident == "B" || p.ident == "W") {
            let value = prop.value();
            let value = value.trim();
            if value.is_empty() || (value == "tt" && cols <= 19 && rows <= 19) {
                continue;
            }
            let coords = value.as_bytes();
            let on_board = coords.len() == 2
                && coords.iter().all(u8::is_ascii_lowercase)
                && coords[0] - b'a' < cols
                && coords[1] - b'a' < rows;
            if !on_board {
                self.error(
                    offset,
                    format!("move {}[{}] is off the {}x{} board", prop.ident, value, cols, rows),
                );
            }
        }
    }

    /// Skip to just past the `)` closing the tree whose `(` was consumed
    fn skip_tree(&mut self) {
        let mut open = 1usize;
        let mut in_value = false;
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'\\' if in_value => self.pos += 1,
                b']' if in_value => in_value = false,
                _ if in_value => {}
                b'[' => in_value = true,
                b'(' => open += 1,
                b')' => {
                    open -= 1;
                    if open == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn error(&mut self, offset: usize, message: impl Into<String>) {
        self.errors.push(ParseError {
            offset,
            message: message.into(),
        });
    }
}
