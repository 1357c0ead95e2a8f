//! Configuration AST
//!
//! A small arena-based tree shared by the Nginx and Apache bindings. Nodes
//! are held in a flat `Vec` and referenced by index (`NodeId`) rather than
//! through owned/borrowed pointers, which keeps the tree easy to mutate
//! in place (add/remove a child, replace a directive's args) without
//! fighting the borrow checker over parent/child references.
//!
//! The two dialects disagree on surface syntax (`;`-terminated directives
//! and brace blocks for Nginx; bare-line directives and `<Tag>...</Tag>`
//! blocks for Apache) but share this same node shape, so vhost-view code
//! that only needs to walk directives/blocks is dialect-agnostic.

use serde::{Deserialize, Serialize};

/// Index into an [`Ast`]'s node arena.
pub type NodeId = usize;

/// Which dialect a tree was parsed as, controlling how [`Ast::dump`]
/// renders it back to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialect {
    Nginx,
    Apache,
}

/// A single AST node: either a directive (`listen 443 ssl;` /
/// `Listen 443`) or a block (`server { ... }` / `<VirtualHost>...</VirtualHost>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Directive {
        name: String,
        args: Vec<String>,
        comment: Option<String>,
    },
    Block {
        name: String,
        args: Vec<String>,
        children: Vec<NodeId>,
        comment: Option<String>,
    },
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Directive { name, .. } => name,
            Node::Block { name, .. } => name,
        }
    }

    pub fn args(&self) -> &[String] {
        match self {
            Node::Directive { args, .. } => args,
            Node::Block { args, .. } => args,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Node::Block { .. })
    }

    pub fn children(&self) -> &[NodeId] {
        match self {
            Node::Block { children, .. } => children,
            Node::Directive { .. } => &[],
        }
    }
}

/// An arena of nodes for one parsed configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ast {
    pub dialect: Dialect,
    pub nodes: Vec<Node>,
    pub top_level: Vec<NodeId>,
}

impl Ast {
    pub fn new(dialect: Dialect) -> Self {
        Ast {
            dialect,
            nodes: Vec::new(),
            top_level: Vec::new(),
        }
    }

    /// Push a new node into the arena and return its id. Does not attach
    /// it anywhere — callers add the id to `top_level` or a parent's
    /// `children`.
    pub fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    /// Deep-copy the subtree rooted at `id` (which may belong to a
    /// different `Ast`, including `self`) into `dest`, returning the new
    /// node's id. Used when synthesizing an SSL clone of a plain-HTTP
    /// block into a fresh file.
    pub fn clone_subtree_into(&self, id: NodeId, dest: &mut Ast) -> NodeId {
        match self.node(id) {
            Node::Directive {
                name,
                args,
                comment,
            } => dest.alloc(Node::Directive {
                name: name.clone(),
                args: args.clone(),
                comment: comment.clone(),
            }),
            Node::Block {
                name,
                args,
                children,
                comment,
            } => {
                let new_children: Vec<NodeId> = children
                    .iter()
                    .map(|&child| self.clone_subtree_into(child, dest))
                    .collect();
                dest.alloc(Node::Block {
                    name: name.clone(),
                    args: args.clone(),
                    children: new_children,
                    comment: comment.clone(),
                })
            }
        }
    }

    /// Depth-first iterator over every node in the tree, in document order.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for &id in &self.top_level {
            self.walk_from(id, &mut out);
        }
        out
    }

    fn walk_from(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        for &child in self.node(id).children() {
            self.walk_from(child, out);
        }
    }

    /// Find all top-level (or nested) blocks with the given tag name,
    /// case-insensitively (Apache tags are case-insensitive; Nginx
    /// directive names are conventionally lowercase already).
    pub fn find_blocks(&self, name: &str) -> Vec<NodeId> {
        self.walk()
            .into_iter()
            .filter(|&id| {
                let node = self.node(id);
                node.is_block() && node.name().eq_ignore_ascii_case(name)
            })
            .collect()
    }

    /// Find direct children of `parent` that are directives named `name`.
    pub fn find_directives(&self, parent: NodeId, name: &str) -> Vec<NodeId> {
        self.node(parent)
            .children()
            .iter()
            .copied()
            .filter(|&id| {
                let node = self.node(id);
                !node.is_block() && node.name().eq_ignore_ascii_case(name)
            })
            .collect()
    }

    /// Append a new directive as the last child of `parent`.
    pub fn add_directive(&mut self, parent: NodeId, name: &str, args: Vec<String>) -> NodeId {
        let id = self.alloc(Node::Directive {
            name: name.to_string(),
            args,
            comment: None,
        });
        self.push_child(parent, id);
        id
    }

    /// Append a new (empty) block as the last child of `parent`.
    pub fn add_block(&mut self, parent: NodeId, name: &str, args: Vec<String>) -> NodeId {
        let id = self.alloc(Node::Block {
            name: name.to_string(),
            args,
            children: Vec::new(),
            comment: None,
        });
        self.push_child(parent, id);
        id
    }

    fn push_child(&mut self, parent: NodeId, child: NodeId) {
        match self.node_mut(parent) {
            Node::Block { children, .. } => children.push(child),
            Node::Directive { .. } => {
                panic!("cannot add a child to a directive node")
            }
        }
    }

    /// Append a node directly at the top level (used when building a
    /// synthesized file from scratch).
    pub fn push_top_level(&mut self, id: NodeId) {
        self.top_level.push(id);
    }

    /// Remove every direct child of `parent` matching `predicate`. Returns
    /// how many were removed.
    pub fn remove_children_where<F>(&mut self, parent: NodeId, predicate: F) -> usize
    where
        F: Fn(&Node) -> bool,
    {
        let to_remove: Vec<NodeId> = self
            .node(parent)
            .children()
            .iter()
            .copied()
            .filter(|&id| predicate(self.node(id)))
            .collect();

        if let Node::Block { children, .. } = self.node_mut(parent) {
            children.retain(|id| !to_remove.contains(id));
        }
        to_remove.len()
    }

    /// Remove a specific child id (and, for a directive, its immediately
    /// preceding sibling directives matching `precedes`) from `parent`.
    /// Used for Apache's "delete a RewriteRule and its preceding
    /// RewriteCond lines" behavior.
    pub fn remove_with_preceding<F>(&mut self, parent: NodeId, target: NodeId, precedes: F)
    where
        F: Fn(&Node) -> bool,
    {
        let children = match self.node(parent) {
            Node::Block { children, .. } => children.clone(),
            Node::Directive { .. } => return,
        };

        let Some(pos) = children.iter().position(|&id| id == target) else {
            return;
        };

        let mut start = pos;
        while start > 0 && precedes(self.node(children[start - 1])) {
            start -= 1;
        }

        let remove_set: std::collections::HashSet<NodeId> =
            children[start..=pos].iter().copied().collect();

        if let Node::Block { children, .. } = self.node_mut(parent) {
            children.retain(|id| !remove_set.contains(id));
        }
    }

    /// Render the tree back to text in the dialect's own surface syntax.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for &id in &self.top_level {
            self.dump_node(id, 0, &mut out);
        }
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let indent = "    ".repeat(depth);
        match self.node(id) {
            Node::Directive { name, args, comment } => {
                if let Some(c) = comment {
                    out.push_str(&format!("{}# {}\n", indent, c));
                }
                match self.dialect {
                    Dialect::Nginx => {
                        out.push_str(&indent);
                        out.push_str(name);
                        for a in args {
                            out.push(' ');
                            out.push_str(&quote_if_needed(a));
                        }
                        out.push_str(";\n");
                    }
                    Dialect::Apache => {
                        out.push_str(&indent);
                        out.push_str(name);
                        for a in args {
                            out.push(' ');
                            out.push_str(&quote_if_needed(a));
                        }
                        out.push('\n');
                    }
                }
            }
            Node::Block { name, args, children, comment } => {
                if let Some(c) = comment {
                    out.push_str(&format!("{}# {}\n", indent, c));
                }
                match self.dialect {
                    Dialect::Nginx => {
                        out.push_str(&indent);
                        out.push_str(name);
                        for a in args {
                            out.push(' ');
                            out.push_str(&quote_if_needed(a));
                        }
                        out.push_str(" {\n");
                        for &child in children {
                            self.dump_node(child, depth + 1, out);
                        }
                        out.push_str(&indent);
                        out.push_str("}\n");
                    }
                    Dialect::Apache => {
                        out.push_str(&indent);
                        out.push('<');
                        out.push_str(name);
                        for a in args {
                            out.push(' ');
                            out.push_str(&quote_if_needed(a));
                        }
                        out.push_str(">\n");
                        for &child in children {
                            self.dump_node(child, depth + 1, out);
                        }
                        out.push_str(&indent);
                        out.push_str(&format!("</{}>\n", name));
                    }
                }
            }
        }
    }
}

fn quote_if_needed(s: &str) -> String {
    if s.is_empty() || s.chars().any(|c| c.is_whitespace()) {
        format!("\"{}\"", s.replace('"', "\\\""))
    } else {
        s.to_string()
    }
}
