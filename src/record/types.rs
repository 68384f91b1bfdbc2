//! Game-record document types

use std::borrow::Cow;
use std::fmt;
use std::ops::BitOr;

/// Default board size when a record carries no `SZ` property
pub const DEFAULT_BOARD_SIZE: u8 = 19;

/// Parser mode selector (bitmask)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ParseMode(u32);

impl ParseMode {
    /// Keep comment (`C`) properties; they are dropped otherwise
    pub const COMMENTS: ParseMode = ParseMode(1);
    /// Emit a trace event for every parsed node
    pub const TRACE: ParseMode = ParseMode(2);
    /// Check that every move falls on the board
    pub const PLAY: ParseMode = ParseMode(4);
    /// Check the root-node conventions of curated databases (GM, FF)
    pub const GOGOD: ParseMode = ParseMode(8);

    /// No optional behavior
    pub const fn empty() -> Self {
        ParseMode(0)
    }

    /// Mode used when none is configured
    pub const fn standard() -> Self {
        ParseMode(Self::COMMENTS.0 | Self::PLAY.0 | Self::GOGOD.0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        ParseMode(bits & 0xF)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: ParseMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ParseMode {
    type Output = ParseMode;

    fn bitor(self, rhs: ParseMode) -> ParseMode {
        ParseMode(self.0 | rhs.0)
    }
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::COMMENTS, "comments"),
            (Self::TRACE, "trace"),
            (Self::PLAY, "play"),
            (Self::GOGOD, "gogod"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();

        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("+"))
        }
    }
}

/// A property: identifier plus one or more values
///
/// Values are kept as the raw bytes of the file (escapes removed) so records
/// in any `CA` charset are written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub ident: String,
    pub values: Vec<Vec<u8>>,
}

impl Property {
    pub fn new(ident: impl Into<String>, values: Vec<Vec<u8>>) -> Self {
        Self {
            ident: ident.into(),
            values,
        }
    }

    /// First value as raw bytes, or empty
    pub fn raw(&self) -> &[u8] {
        self.values.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value as text (lossy for non-UTF-8 charsets), or the empty string
    pub fn value(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.raw())
    }
}

/// A node (`;` followed by properties)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    pub properties: Vec<Property>,
}

impl Node {
    pub fn get(&self, ident: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.ident == ident)
    }

    /// A node that plays a stone (or passes)
    pub fn is_move(&self) -> bool {
        self.properties
            .iter()
            .any(|p| p.ident == "B" || p.ident == "W")
    }
}

/// A game tree: a main sequence of nodes followed by variations
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameTree {
    pub nodes: Vec<Node>,
    pub variations: Vec<GameTree>,
}

impl GameTree {
    pub fn node_count(&self) -> usize {
        self.nodes.len() + self.variations.iter().map(GameTree::node_count).sum::<usize>()
    }

    pub fn move_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_move()).count()
            + self.variations.iter().map(GameTree::move_count).sum::<usize>()
    }

    pub fn variation_count(&self) -> usize {
        self.variations.len()
            + self
                .variations
                .iter()
                .map(GameTree::variation_count)
                .sum::<usize>()
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }
}

/// A parsed record file: a collection of game trees
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    /// File name the document was parsed from
    pub name: String,

    /// Top-level game trees
    pub collection: Vec<GameTree>,

    /// Nodes were dropped because the move limit was reached
    pub truncated: bool,
}

impl Document {
    pub fn node_count(&self) -> usize {
        self.collection.iter().map(GameTree::node_count).sum()
    }

    pub fn move_count(&self) -> usize {
        self.collection.iter().map(GameTree::move_count).sum()
    }

    pub fn variation_count(&self) -> usize {
        self.collection.iter().map(GameTree::variation_count).sum()
    }

    /// Board size of the first game, as (columns, rows)
    pub fn board_size(&self) -> (u8, u8) {
        self.collection
            .first()
            .and_then(GameTree::root)
            .and_then(|root| root.get("SZ"))
            .and_then(|sz| parse_board_size(&sz.value()))
            .unwrap_or((DEFAULT_BOARD_SIZE, DEFAULT_BOARD_SIZE))
    }
}

/// Parse an `SZ` value: `19` or `19:13`
pub fn parse_board_size(value: &str) -> Option<(u8, u8)> {
    let value = value.trim();
    match value.split_once(':') {
        Some((cols, rows)) => {
            let cols = cols.trim().parse::<u8>().ok()?;
            let rows = rows.trim().parse::<u8>().ok()?;
            (cols > 0 && rows > 0).then_some((cols, rows))
        }
        None => {
            let size = value.parse::<u8>().ok()?;
            (size > 0).then_some((size, size))
        }
    }
}
