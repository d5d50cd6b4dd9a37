//! In-memory schema model: the shared vocabulary of the generator.
//!
//! A [`Schema`] is an arena of [`NodeDef`]s describing one AST type each;
//! inheritance is a non-owning index into the same arena, so the
//! single-inheritance forest is an explicit graph rather than a host
//! language class hierarchy. The model is built once by the loader,
//! immutable afterwards, and shared read-only across generation workers.

use std::collections::HashMap;

use serde::Serialize;

/// Index of a node definition inside its [`Schema`] arena.
pub type NodeIdx = usize;

/// What kind of value a member holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Lexer token captured verbatim.
    Token,
    /// String literal copied by value.
    StringLiteral,
    /// Single owned child node.
    Child,
    /// Ordered vector of owned child nodes. Never optional: an empty
    /// vector is the absent state.
    ChildVec,
}

impl ValueKind {
    /// Child-bearing kinds participate in deep-clone recursion and default
    /// visitor traversal.
    pub fn is_child(self) -> bool {
        matches!(self, ValueKind::Child | ValueKind::ChildVec)
    }
}

/// One typed field of a node type.
#[derive(Debug, Clone, Serialize)]
pub struct MemberDef {
    /// snake_case accessor name.
    pub field_name: String,
    /// Name as it appears in the modeled DSL; may differ from `field_name`.
    pub source_name: String,
    pub value_kind: ValueKind,
    pub is_optional: bool,
    /// Literal fragments for source-text reconstruction.
    pub prefix: String,
    pub suffix: String,
    /// Joins repeated `ChildVec` elements during reconstruction.
    pub separator: String,
    pub exposes_getter: bool,
    /// A hand-written getter exists downstream; suppress the generated one.
    pub getter_is_overridden: bool,
    pub participates_in_equality_or_clone: bool,
    /// Generate an `add_<field>` mutator (ChildVec members only).
    pub add_method: bool,
    /// This member's rendered value doubles as the node's name.
    pub is_node_name: bool,
    /// Provenance/documentation link carried into the artifact text.
    pub doc_url: Option<String>,
}

/// One AST type: name, optional base, ordered members.
///
/// Member order is semantically significant - it fixes constructor
/// parameter order and source-reconstruction emission order.
#[derive(Debug, Clone, Serialize)]
pub struct NodeDef {
    pub type_name: String,
    pub base_type: Option<String>,
    /// Resolved arena index of `base_type`; set by the loader.
    #[serde(skip)]
    pub base: Option<NodeIdx>,
    pub is_abstract: bool,
    /// One-line documentation carried into generated artifact headers.
    pub brief: Option<String>,
    pub members: Vec<MemberDef>,
}

impl NodeDef {
    pub fn member(&self, field_name: &str) -> Option<&MemberDef> {
        self.members.iter().find(|m| m.field_name == field_name)
    }
}

/// Validated, immutable collection of node definitions.
///
/// Owns every [`NodeDef`]; only the loader constructs one, so an existing
/// `Schema` has always passed validation in full.
#[derive(Debug, Serialize)]
pub struct Schema {
    nodes: Vec<NodeDef>,
    #[serde(skip)]
    by_name: HashMap<String, NodeIdx>,
}

impl Schema {
    pub(crate) fn new(nodes: Vec<NodeDef>, by_name: HashMap<String, NodeIdx>) -> Self {
        Self { nodes, by_name }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: NodeIdx) -> &NodeDef {
        &self.nodes[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIdx, &NodeDef)> {
        self.nodes.iter().enumerate()
    }

    pub fn lookup(&self, type_name: &str) -> Option<NodeIdx> {
        self.by_name.get(type_name).copied()
    }

    /// Inheritance chain of `idx` from the root ancestor down to `idx`
    /// itself, in base-first order.
    pub fn ancestry(&self, idx: NodeIdx) -> Vec<NodeIdx> {
        let mut chain = vec![idx];
        let mut cur = idx;
        while let Some(base) = self.nodes[cur].base {
            chain.push(base);
            cur = base;
        }
        chain.reverse();
        chain
    }

    /// Constructor member list for `idx`: inherited members of the base
    /// chain first (root-most ancestor leading), then the node's own
    /// members, each group in declaration order.
    pub fn ctor_members(&self, idx: NodeIdx) -> Vec<&MemberDef> {
        self.ancestry(idx)
            .into_iter()
            .flat_map(|a| self.nodes[a].members.iter())
            .collect()
    }

    /// Inheritance depth: 0 for roots, parent depth + 1 otherwise.
    fn depth(&self, idx: NodeIdx) -> usize {
        self.ancestry(idx).len() - 1
    }

    /// Topological generation order over the inheritance forest: a base
    /// type always precedes its subtypes; roots and siblings keep
    /// declaration order.
    pub fn topo_order(&self) -> Vec<NodeIdx> {
        let mut order: Vec<NodeIdx> = (0..self.nodes.len()).collect();
        order.sort_by_key(|&idx| self.depth(idx));
        order
    }

    /// Concrete (instantiable) node definitions in declaration order.
    pub fn concrete(&self) -> impl Iterator<Item = (NodeIdx, &NodeDef)> {
        self.iter().filter(|(_, n)| !n.is_abstract)
    }
}
