#![forbid(unsafe_code)]

use serde_json::Value;

/// Handle to a node inside a [`Report`]. Channel controllers keep these for
/// the arrays they append into while an analysis runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

#[derive(Debug)]
enum Node {
    Object(Vec<(String, NodeId)>),
    Array(Vec<NodeId>),
    Text(String),
}

/// Append-only hierarchical document accumulated for one task.
///
/// Nodes live in an arena indexed by [`NodeId`]; the root is always an
/// object. Created empty when the task is created and destroyed with it.
#[derive(Debug)]
pub struct Report {
    nodes: Vec<Node>,
}

impl Report {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::Object(Vec::new())],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Create an empty object under `parent` (an object node).
    pub fn add_object(&mut self, parent: NodeId, key: &str) -> NodeId {
        let id = self.push(Node::Object(Vec::new()));
        self.attach(parent, key, id);
        id
    }

    /// Create an empty array under `parent` (an object node).
    pub fn add_array(&mut self, parent: NodeId, key: &str) -> NodeId {
        let id = self.push(Node::Array(Vec::new()));
        self.attach(parent, key, id);
        id
    }

    /// Set a text field on `parent` (an object node).
    pub fn add_text(&mut self, parent: NodeId, key: &str, text: impl Into<String>) {
        let id = self.push(Node::Text(text.into()));
        self.attach(parent, key, id);
    }

    /// Append a string to `array` (an array node).
    pub fn push_string(&mut self, array: NodeId, text: impl Into<String>) {
        let id = self.push(Node::Text(text.into()));
        if let Node::Array(items) = &mut self.nodes[array.0] {
            items.push(id);
        } else {
            debug_assert!(false, "push_string target is not an array");
        }
    }

    pub fn array_len(&self, array: NodeId) -> usize {
        match &self.nodes[array.0] {
            Node::Array(items) => items.len(),
            _ => 0,
        }
    }

    /// Render the whole document.
    pub fn to_json(&self) -> Value {
        self.render(self.root())
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn attach(&mut self, parent: NodeId, key: &str, child: NodeId) {
        if let Node::Object(fields) = &mut self.nodes[parent.0] {
            fields.push((key.to_string(), child));
        } else {
            debug_assert!(false, "attach target is not an object");
        }
    }

    fn render(&self, id: NodeId) -> Value {
        match &self.nodes[id.0] {
            Node::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, child)| (key.clone(), self.render(*child)))
                    .collect(),
            ),
            Node::Array(items) => {
                Value::Array(items.iter().map(|child| self.render(*child)).collect())
            }
            Node::Text(text) => Value::String(text.clone()),
        }
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}
