//! SGF serializer
//!
//! The root node of each top-level game goes on its own line; after that at
//! most `line_width` nodes are written per line. Every game tree closes with
//! `)` and a newline, so variations each start on a fresh line.

use super::types::{Document, GameTree, Node};

/// Serialize a document back to SGF bytes
pub fn write_document(document: &Document, line_width: usize) -> Vec<u8> {
    let line_width = line_width.max(1);
    let mut out = Vec::new();
    for tree in &document.collection {
        write_tree(&mut out, tree, line_width, true);
    }
    out
}

fn write_tree(out: &mut Vec<u8>, tree: &GameTree, line_width: usize, top_level: bool) {
    out.push(b'(');
    let mut on_line = 0;
    for (i, node) in tree.nodes.iter().enumerate() {
        write_node(out, node);
        if top_level && i == 0 {
            out.push(b'\n');
            continue;
        }
        on_line += 1;
        if on_line == line_width {
            out.push(b'\n');
            on_line = 0;
        }
    }
    if on_line > 0 && !tree.variations.is_empty() {
        out.push(b'\n');
    }
    for variation in &tree.variations {
        write_tree(out, variation, line_width, false);
    }
    out.extend_from_slice(b")\n");
}

fn write_node(out: &mut Vec<u8>, node: &Node) {
    out.push(b';');
    for property in &node.properties {
        out.extend_from_slice(property.ident.as_bytes());
        for value in &property.values {
            out.push(b'[');
            for &b in value {
                if b == b']' || b == b'\\' {
                    out.push(b'\\');
                }
                out.push(b);
            }
            out.push(b']');
        }
    }
}
