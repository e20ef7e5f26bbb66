//! Minimal syntax node shared by every non-syn front end.
//!
//! Tokenizer-derived pseudo-trees (see [`crate::lang::tokens`]) and literal
//! trees (see [`crate::lang::literal`]) are both expressed as [`Node`]s so the
//! adapters and the schema walker only ever depend on this shape.

/// Node categories produced by the front ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Statement,
    Object,
    Array,
    /// Key/value entry; `text` is the key, the single child is the value
    Pair,
    String,
    Number,
    Ident,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub text: String,
    /// 1-based source line
    pub line: usize,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// Value of the `Pair` child keyed `key`, for object nodes
    pub fn field(&self, key: &str) -> Option<&Node> {
        self.children
            .iter()
            .find(|c| c.kind == NodeKind::Pair && c.text == key)
            .and_then(|pair| pair.children.first())
    }

    /// Text of this node followed by the text of every descendant, space separated
    pub fn full_text(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push(' ');
            out.push_str(&child.full_text());
        }
        out
    }
}

/// What a visitor wants the walk to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitFlow {
    Continue,
    SkipChildren,
    Stop,
}

pub trait NodeVisitor {
    fn enter(&mut self, node: &Node) -> VisitFlow;

    /// Called after the children of a node were walked (not called for skipped or stopped nodes)
    fn leave(&mut self, _node: &Node) {}
}

/// Depth-first walk. Returns [`VisitFlow::Stop`] if the visitor stopped the walk.
pub fn walk<V: NodeVisitor + ?Sized>(node: &Node, visitor: &mut V) -> VisitFlow {
    match visitor.enter(node) {
        VisitFlow::Stop => return VisitFlow::Stop,
        VisitFlow::SkipChildren => return VisitFlow::Continue,
        VisitFlow::Continue => {}
    }

    for child in &node.children {
        if walk(child, visitor) == VisitFlow::Stop {
            return VisitFlow::Stop;
        }
    }

    visitor.leave(node);
    VisitFlow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Node {
        Node::new(NodeKind::File, "root", 0).with_children(vec![
            Node::new(NodeKind::Statement, "a", 1)
                .with_children(vec![Node::new(NodeKind::Statement, "a.1", 2)]),
            Node::new(NodeKind::Statement, "b", 3)
                .with_children(vec![Node::new(NodeKind::Statement, "b.1", 4)]),
            Node::new(NodeKind::Statement, "c", 5),
        ])
    }

    struct Recorder {
        seen: Vec<String>,
        left: Vec<String>,
        skip: &'static str,
        stop: &'static str,
    }

    impl NodeVisitor for Recorder {
        fn enter(&mut self, node: &Node) -> VisitFlow {
            self.seen.push(node.text.clone());
            if node.text == self.stop {
                VisitFlow::Stop
            } else if node.text == self.skip {
                VisitFlow::SkipChildren
            } else {
                VisitFlow::Continue
            }
        }

        fn leave(&mut self, node: &Node) {
            self.left.push(node.text.clone());
        }
    }

    #[test]
    fn test_walk_skip_children() {
        let mut visitor = Recorder {
            seen: Vec::new(),
            left: Vec::new(),
            skip: "a",
            stop: "-",
        };
        let flow = walk(&sample_tree(), &mut visitor);

        assert_eq!(flow, VisitFlow::Continue);
        assert_eq!(visitor.seen, vec!["root", "a", "b", "b.1", "c"]);
        assert_eq!(visitor.left, vec!["b.1", "b", "c", "root"]);
    }

    #[test]
    fn test_walk_stop() {
        let mut visitor = Recorder {
            seen: Vec::new(),
            left: Vec::new(),
            skip: "-",
            stop: "b.1",
        };
        let flow = walk(&sample_tree(), &mut visitor);

        assert_eq!(flow, VisitFlow::Stop);
        assert_eq!(visitor.seen, vec!["root", "a", "a.1", "b", "b.1"]);
        assert!(!visitor.seen.contains(&"c".to_string()));
    }

    #[test]
    fn test_field_lookup() {
        let object = Node::new(NodeKind::Object, "", 1).with_children(vec![Node::new(
            NodeKind::Pair,
            "type",
            1,
        )
        .with_children(vec![Node::new(NodeKind::String, "object", 1)])]);

        assert_eq!(object.field("type").map(|n| n.text.as_str()), Some("object"));
        assert!(object.field("properties").is_none());
    }
}
