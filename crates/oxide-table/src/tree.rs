//! Reconstruction of nested structures from flat, sorted rows.
//!
//! A join across a chain of one-to-many relationships returns one row per
//! leaf. A [`Program`] describes the levels of that chain; given rows sorted
//! by the levels' keys, [`Program::reconstruct`] knits them back into a
//! tree:
//!
//! ```rust
//! use oxide_query::{record, Value};
//! use oxide_table::tree::{Level, Program};
//!
//! let program = Program::new(vec![
//!     Level::keyed("departments", "dept", ["floor"]),
//!     Level::listed("people", ["person"]),
//! ]);
//! let rows = vec![
//!     record([("dept", Value::from_text("ops")), ("floor", Value::Int(1)), ("person", Value::from_text("ann"))]),
//!     record([("dept", Value::from_text("ops")), ("floor", Value::Int(1)), ("person", Value::from_text("bob"))]),
//! ];
//!
//! let tree = program.reconstruct(&rows);
//! assert_eq!(
//!     tree.to_json(),
//!     serde_json::json!({"ops": {"dept": "ops", "floor": 1, "people": ["ann", "bob"]}})
//! );
//! ```
//!
//! The rows must be sorted by the levels' fields. Out-of-order rows are not
//! an error: they open a second node for the same key, visible as a
//! duplicate entry in the output.

use oxide_query::{Record, Value};

/// One level of a reconstruction program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    /// Name of the container holding this level's nodes in the parent.
    pub name: String,
    /// Field whose value keys nodes in the container; `None` for a list.
    pub key: Option<String>,
    /// Payload fields copied into each node.
    pub fields: Vec<String>,
}

impl Level {
    /// A level whose nodes are keyed by `key`.
    #[must_use]
    pub fn keyed<I, S>(name: impl Into<String>, key: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            key: Some(key.into()),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// A level whose nodes are appended to a list.
    #[must_use]
    pub fn listed<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            key: None,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// The values that identify this level's node for `row`.
    fn signature(&self, row: &Record) -> Vec<Value> {
        self.key
            .iter()
            .chain(&self.fields)
            .map(|field| row.get(field).cloned().unwrap_or_default())
            .collect()
    }

    fn empty_container(&self) -> Container {
        if self.key.is_some() {
            Container::Keyed(Vec::new())
        } else {
            Container::Listed(Vec::new())
        }
    }
}

/// An ordered list of levels, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    levels: Vec<Level>,
}

/// A node of the reconstructed tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A deepest-level node with a single payload field, collapsed to its
    /// value.
    Scalar(Value),
    /// A node with its key, payload fields and (except on the deepest
    /// level) the container of its children.
    Branch {
        /// Key and payload fields, in program order.
        fields: Record,
        /// Child container name and contents.
        children: Option<(String, Container)>,
    },
}

/// A collection of sibling nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Container {
    /// Nodes with their key values, in insertion order. Keys may repeat
    /// when the input was not sorted.
    Keyed(Vec<(Value, Node)>),
    /// Nodes in insertion order.
    Listed(Vec<Node>),
}

impl Program {
    /// Creates a program from its levels.
    #[must_use]
    pub const fn new(levels: Vec<Level>) -> Self {
        Self { levels }
    }

    /// Appends a level.
    #[must_use]
    pub fn level(mut self, level: Level) -> Self {
        self.levels.push(level);
        self
    }

    /// Returns the levels, outermost first.
    #[must_use]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Builds the tree for rows sorted by the levels' fields.
    #[must_use]
    pub fn reconstruct(&self, rows: &[Record]) -> Container {
        let Some(first) = self.levels.first() else {
            return Container::Listed(Vec::new());
        };
        let mut top = first.empty_container();
        // Signatures of the open node on each level. The open node is
        // always the last entry of its container.
        let mut open: Vec<Vec<Value>> = Vec::with_capacity(self.levels.len());

        for row in rows {
            let depth = open
                .iter()
                .zip(&self.levels)
                .position(|(signature, level)| *signature != level.signature(row))
                .unwrap_or(open.len());
            open.truncate(depth);

            for index in depth..self.levels.len() {
                let node = self.make_node(index, row);
                let key = self.levels[index]
                    .key
                    .as_ref()
                    .map(|key| row.get(key).cloned().unwrap_or_default());
                if let Some(container) = open_container(&mut top, index) {
                    container.push(key, node);
                }
                open.push(self.levels[index].signature(row));
            }
        }

        top
    }

    fn make_node(&self, index: usize, row: &Record) -> Node {
        let level = &self.levels[index];
        let deepest = index + 1 == self.levels.len();
        if deepest && level.fields.len() == 1 {
            return Node::Scalar(row.get(&level.fields[0]).cloned().unwrap_or_default());
        }

        let fields: Record = level
            .key
            .iter()
            .chain(&level.fields)
            .map(|field| (field.clone(), row.get(field).cloned().unwrap_or_default()))
            .collect();
        let children = self
            .levels
            .get(index + 1)
            .map(|child| (child.name.clone(), child.empty_container()));
        Node::Branch { fields, children }
    }
}

/// Walks from `top` through the last node of each level down to the
/// container for `depth`.
fn open_container(top: &mut Container, depth: usize) -> Option<&mut Container> {
    let mut container = top;
    for _ in 0..depth {
        match container.last_mut()? {
            Node::Branch {
                children: Some((_, children)),
                ..
            } => container = children,
            _ => return None,
        }
    }
    Some(container)
}

impl Container {
    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Keyed(entries) => entries.len(),
            Self::Listed(nodes) => nodes.len(),
        }
    }

    /// Returns true if there are no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> Box<dyn Iterator<Item = &Node> + '_> {
        match self {
            Self::Keyed(entries) => Box::new(entries.iter().map(|(_, node)| node)),
            Self::Listed(nodes) => Box::new(nodes.iter()),
        }
    }

    /// Returns the first node stored under `key`.
    #[must_use]
    pub fn get(&self, key: &Value) -> Option<&Node> {
        match self {
            Self::Keyed(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, n)| n),
            Self::Listed(_) => None,
        }
    }

    /// Converts to JSON: keyed containers become objects (the last of any
    /// repeated keys wins), lists become arrays.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Keyed(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(key, node)| (key.to_key(), node.to_json()))
                    .collect(),
            ),
            Self::Listed(nodes) => {
                serde_json::Value::Array(nodes.iter().map(Node::to_json).collect())
            }
        }
    }

    fn push(&mut self, key: Option<Value>, node: Node) {
        match self {
            Self::Keyed(entries) => entries.push((key.unwrap_or_default(), node)),
            Self::Listed(nodes) => nodes.push(node),
        }
    }

    fn last_mut(&mut self) -> Option<&mut Node> {
        match self {
            Self::Keyed(entries) => entries.last_mut().map(|(_, node)| node),
            Self::Listed(nodes) => nodes.last_mut(),
        }
    }
}

impl Node {
    /// Returns a field of a branch node.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Branch { fields, .. } => fields.get(name),
            Self::Scalar(_) => None,
        }
    }

    /// Returns the children of a branch node.
    #[must_use]
    pub fn children(&self) -> Option<&Container> {
        match self {
            Self::Branch {
                children: Some((_, children)),
                ..
            } => Some(children),
            _ => None,
        }
    }

    /// Converts to JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Scalar(value) => serde_json::to_value(value).unwrap_or_default(),
            Self::Branch { fields, children } => {
                let mut object: serde_json::Map<String, serde_json::Value> = fields
                    .iter()
                    .map(|(name, value)| {
                        (name.clone(), serde_json::to_value(value).unwrap_or_default())
                    })
                    .collect();
                if let Some((name, container)) = children {
                    object.insert(name.clone(), container.to_json());
                }
                serde_json::Value::Object(object)
            }
        }
    }
}
