//! Dynamic node instances over a validated schema.
//!
//! The generated artifacts promise each node class a constructor, a
//! visitor dispatch, a deep copy, and a source-text reconstruction. This
//! module realizes those contracts directly against the schema so they can
//! be exercised without compiling generated output: a [`Tree`] is an arena
//! of instances whose shape is checked against the schema's constructor
//! parameter lists, and a [`VisitorTable`] is the tagged double-dispatch
//! table resolved by node-type index - no string lookup on the dispatch
//! path.
//!
//! Ownership: a node owns its children; parents are back-references.
//! `NodeId`s are only minted by the owning tree, so instance lookups index
//! directly.

use std::collections::HashSet;

use crate::errors::{AstgenError, ErrorKind};
use crate::schema::{MemberDef, NodeIdx, Schema, ValueKind};

/// Handle to one instance inside a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One member value, matching the member's [`ValueKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Token(String),
    Str(String),
    Node(NodeId),
    Nodes(Vec<NodeId>),
    /// Only valid for optional members.
    Absent,
}

#[derive(Debug)]
struct Instance {
    type_idx: NodeIdx,
    /// Member values in constructor order (inherited first).
    values: Vec<Value>,
    parent: Option<NodeId>,
}

/// Arena of node instances for one schema.
pub struct Tree<'s> {
    schema: &'s Schema,
    nodes: Vec<Instance>,
}

fn bad_instance(message: impl Into<String>) -> AstgenError {
    AstgenError::new(ErrorKind::BadInstance {
        message: message.into(),
    })
}

impl<'s> Tree<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            nodes: Vec::new(),
        }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Construct an instance of a concrete type. `values` must match the
    /// type's constructor parameter list in order, arity, and kind; child
    /// values are re-parented to the new node.
    pub fn build(&mut self, type_name: &str, values: Vec<Value>) -> Result<NodeId, AstgenError> {
        let type_idx = self
            .schema
            .lookup(type_name)
            .ok_or_else(|| bad_instance(format!("unknown node type '{}'", type_name)))?;
        if self.schema.node(type_idx).is_abstract {
            return Err(bad_instance(format!(
                "'{}' is abstract and cannot be instantiated directly",
                type_name
            )));
        }

        let params = self.schema.ctor_members(type_idx);
        if params.len() != values.len() {
            return Err(bad_instance(format!(
                "'{}' takes {} constructor argument(s), got {}",
                type_name,
                params.len(),
                values.len()
            )));
        }
        // A child may appear at most once across the whole argument list;
        // the parent pointer only catches ownership taken by earlier builds.
        let mut claimed: HashSet<NodeId> = HashSet::new();
        for (member, value) in params.iter().zip(&values) {
            self.check_value(type_name, member, value)?;
            for child in child_ids(value) {
                if !claimed.insert(child) {
                    return Err(bad_instance(format!(
                        "'{}.{}' repeats a child within one construction",
                        type_name, member.field_name
                    )));
                }
            }
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Instance {
            type_idx,
            values,
            parent: None,
        });
        self.adopt_children(id);
        Ok(id)
    }

    fn check_value(
        &self,
        type_name: &str,
        member: &MemberDef,
        value: &Value,
    ) -> Result<(), AstgenError> {
        let ok = match (member.value_kind, value) {
            (ValueKind::Token, Value::Token(_)) => true,
            (ValueKind::StringLiteral, Value::Str(_)) => true,
            (ValueKind::Child, Value::Node(_)) => true,
            (ValueKind::ChildVec, Value::Nodes(_)) => true,
            (_, Value::Absent) => member.is_optional,
            _ => false,
        };
        if !ok {
            return Err(bad_instance(format!(
                "'{}.{}' expects a {:?} value",
                type_name, member.field_name, member.value_kind
            )));
        }
        for child in child_ids(value) {
            if child.0 >= self.nodes.len() {
                return Err(bad_instance(format!(
                    "'{}.{}' references a node from another tree",
                    type_name, member.field_name
                )));
            }
            if self.nodes[child.0].parent.is_some() {
                return Err(bad_instance(format!(
                    "'{}.{}' takes a child that is already owned",
                    type_name, member.field_name
                )));
            }
        }
        Ok(())
    }

    /// Point every child referenced by `id`'s values back at `id`.
    fn adopt_children(&mut self, id: NodeId) {
        let children = self.children(id);
        for child in children {
            self.nodes[child.0].parent = Some(id);
        }
    }

    pub fn type_of(&self, id: NodeId) -> NodeIdx {
        self.nodes[id.0].type_idx
    }

    pub fn type_name(&self, id: NodeId) -> &str {
        &self.schema.node(self.nodes[id.0].type_idx).type_name
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Member value by accessor name, searching the full ctor member list.
    pub fn get(&self, id: NodeId, field_name: &str) -> Option<&Value> {
        let inst = &self.nodes[id.0];
        self.schema
            .ctor_members(inst.type_idx)
            .iter()
            .position(|m| m.field_name == field_name)
            .map(|pos| &inst.values[pos])
    }

    /// Child ids of `id` in declaration order; the traversal domain of the
    /// default visitor entry.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id.0].values.iter().flat_map(child_ids).collect()
    }

    /// The node's name, when a member is designated as such: the member's
    /// rendered value.
    pub fn node_name(&self, id: NodeId) -> Option<String> {
        let inst = &self.nodes[id.0];
        let members = self.schema.ctor_members(inst.type_idx);
        let pos = members.iter().position(|m| m.is_node_name)?;
        match &inst.values[pos] {
            Value::Token(t) | Value::Str(t) => Some(t.clone()),
            Value::Node(child) => Some(self.to_source(*child)),
            Value::Nodes(_) | Value::Absent => None,
        }
    }

    /// Append a child through a generated `add_<field>` mutator and
    /// re-parent it.
    pub fn add_child(
        &mut self,
        id: NodeId,
        field_name: &str,
        child: NodeId,
    ) -> Result<(), AstgenError> {
        let type_idx = self.nodes[id.0].type_idx;
        let members = self.schema.ctor_members(type_idx);
        let pos = members
            .iter()
            .position(|m| m.field_name == field_name)
            .ok_or_else(|| {
                bad_instance(format!(
                    "'{}' has no member '{}'",
                    self.type_name(id),
                    field_name
                ))
            })?;
        if !members[pos].add_method {
            return Err(bad_instance(format!(
                "no add method is generated for '{}.{}'",
                self.type_name(id),
                field_name
            )));
        }
        if self.nodes[child.0].parent.is_some() {
            return Err(bad_instance("appended child is already owned"));
        }
        match &mut self.nodes[id.0].values[pos] {
            Value::Nodes(items) => items.push(child),
            // add_method is loader-restricted to ChildVec members.
            _ => return Err(AstgenError::internal("add method on non-vector member")),
        }
        self.nodes[child.0].parent = Some(id);
        Ok(())
    }

    /// Deep copy: child members are cloned recursively, token and string
    /// members are copied by value, and every cloned child's parent
    /// back-reference points at the clone. Members opted out of cloning
    /// reset to their empty state when optional (or an empty vector) and
    /// are copied otherwise, since the constructor contract requires them.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let type_idx = self.nodes[id.0].type_idx;
        let specs: Vec<(ValueKind, bool, bool)> = self
            .schema
            .ctor_members(type_idx)
            .iter()
            .map(|m| (m.value_kind, m.is_optional, m.participates_in_equality_or_clone))
            .collect();

        let values = self.nodes[id.0].values.clone();
        let mut cloned = Vec::with_capacity(values.len());
        for (value, (kind, optional, cloneable)) in values.into_iter().zip(specs) {
            let v = if !cloneable && kind == ValueKind::ChildVec {
                Value::Nodes(Vec::new())
            } else if !cloneable && optional {
                Value::Absent
            } else {
                match value {
                    Value::Node(child) => Value::Node(self.deep_clone(child)),
                    Value::Nodes(items) => {
                        Value::Nodes(items.into_iter().map(|c| self.deep_clone(c)).collect())
                    }
                    other => other,
                }
            };
            cloned.push(v);
        }

        let new_id = NodeId(self.nodes.len());
        self.nodes.push(Instance {
            type_idx,
            values: cloned,
            parent: None,
        });
        let children = self.children(new_id);
        for child in children {
            self.nodes[child.0].parent = Some(new_id);
        }
        new_id
    }

    /// Reconstruct source-syntax text: for each member in declaration
    /// order, `prefix` + rendered value + `suffix`, with vector elements
    /// joined by the member's `separator`. Absent members contribute
    /// nothing.
    pub fn to_source(&self, id: NodeId) -> String {
        let inst = &self.nodes[id.0];
        let members = self.schema.ctor_members(inst.type_idx);
        let mut out = String::new();
        for (member, value) in members.iter().zip(&inst.values) {
            let rendered = match value {
                Value::Absent => continue,
                Value::Token(t) | Value::Str(t) => t.clone(),
                Value::Node(child) => self.to_source(*child),
                Value::Nodes(items) => items
                    .iter()
                    .map(|c| self.to_source(*c))
                    .collect::<Vec<_>>()
                    .join(&member.separator),
            };
            out.push_str(&member.prefix);
            out.push_str(&rendered);
            out.push_str(&member.suffix);
        }
        out
    }
}

fn child_ids(value: &Value) -> Vec<NodeId> {
    match value {
        Value::Node(id) => vec![*id],
        Value::Nodes(ids) => ids.clone(),
        _ => Vec::new(),
    }
}

// ============================================================================
// VISITOR DISPATCH TABLE
// ============================================================================

/// Per-concrete-type handler slots indexed by node-type index, plus the
/// default traversal.
///
/// `dispatch` invokes exactly the node's own concrete entry, exactly once;
/// a type with no registered handler falls back to the default traversal,
/// which recurses into every child-bearing member in declaration order and
/// otherwise does nothing.
pub struct VisitorTable<'h> {
    handlers: Vec<Option<Box<dyn FnMut(&Tree, NodeId) + 'h>>>,
}

impl<'h> VisitorTable<'h> {
    pub fn new(schema: &Schema) -> Self {
        Self {
            handlers: (0..schema.len()).map(|_| None).collect(),
        }
    }

    /// Register the entry point for a concrete type.
    pub fn on(
        &mut self,
        schema: &Schema,
        type_name: &str,
        handler: impl FnMut(&Tree, NodeId) + 'h,
    ) -> Result<(), AstgenError> {
        let idx = schema
            .lookup(type_name)
            .ok_or_else(|| bad_instance(format!("unknown node type '{}'", type_name)))?;
        if schema.node(idx).is_abstract {
            return Err(bad_instance(format!(
                "'{}' is abstract; visitor entries exist per concrete type only",
                type_name
            )));
        }
        self.handlers[idx] = Some(Box::new(handler));
        Ok(())
    }

    /// Route `id` to its own type's entry point, or to the default
    /// traversal when none is registered.
    pub fn dispatch(&mut self, tree: &Tree, id: NodeId) {
        let idx = tree.type_of(id);
        // Take the handler out so it may not re-enter itself through us.
        if let Some(mut handler) = self.handlers[idx].take() {
            handler(tree, id);
            self.handlers[idx] = Some(handler);
        } else {
            self.visit_children(tree, id);
        }
    }

    /// Default traversal: dispatch every child in declaration order.
    pub fn visit_children(&mut self, tree: &Tree, id: NodeId) {
        for child in tree.children(id) {
            self.dispatch(tree, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::loader::validate;
    use crate::schema::RawNode;
    use std::cell::RefCell;

    fn schema_from_yaml(text: &str) -> Schema {
        let raw: Vec<RawNode> = serde_yaml::from_str(text).unwrap();
        validate(raw).unwrap()
    }

    fn two_level_schema() -> Schema {
        schema_from_yaml(
            r#"
- name: Base
  abstract: true
- name: Derived
  base: Base
  members:
    - { name: x, kind: child }
- name: Leaf
  base: Base
  members:
    - { name: value, kind: token }
"#,
        )
    }

    #[test]
    fn build_checks_arity_and_kind() {
        let schema = two_level_schema();
        let mut tree = Tree::new(&schema);
        assert!(tree.build("Leaf", vec![]).is_err());
        assert!(tree
            .build("Leaf", vec![Value::Str("x".into())])
            .is_err());
        assert!(tree.build("Base", vec![]).is_err()); // abstract
        assert!(tree.build("Leaf", vec![Value::Token("x".into())]).is_ok());
    }

    #[test]
    fn construction_sets_parent_back_references() {
        let schema = two_level_schema();
        let mut tree = Tree::new(&schema);
        let leaf = tree.build("Leaf", vec![Value::Token("1".into())]).unwrap();
        let derived = tree.build("Derived", vec![Value::Node(leaf)]).unwrap();
        assert_eq!(tree.parent(leaf), Some(derived));
        assert_eq!(tree.parent(derived), None);
    }

    #[test]
    fn a_child_cannot_be_owned_twice() {
        let schema = two_level_schema();
        let mut tree = Tree::new(&schema);
        let leaf = tree.build("Leaf", vec![Value::Token("1".into())]).unwrap();
        tree.build("Derived", vec![Value::Node(leaf)]).unwrap();
        assert!(tree.build("Derived", vec![Value::Node(leaf)]).is_err());
    }

    #[test]
    fn a_child_cannot_appear_twice_in_one_construction() {
        let schema = schema_from_yaml(
            r#"
- name: Leaf
  members:
    - { name: value, kind: token }
- name: Pair
  members:
    - { name: first, kind: child }
    - { name: rest, kind: children }
"#,
        );
        let mut tree = Tree::new(&schema);
        let a = tree.build("Leaf", vec![Value::Token("a".into())]).unwrap();
        let b = tree.build("Leaf", vec![Value::Token("b".into())]).unwrap();

        // Same node in two member slots.
        assert!(tree
            .build("Pair", vec![Value::Node(a), Value::Nodes(vec![a])])
            .is_err());
        // Same node twice inside one vector.
        assert!(tree
            .build("Pair", vec![Value::Node(b), Value::Nodes(vec![a, a])])
            .is_err());

        // A rejected construction takes no ownership.
        assert_eq!(tree.parent(a), None);
        assert_eq!(tree.parent(b), None);
        assert!(tree
            .build("Pair", vec![Value::Node(a), Value::Nodes(vec![b])])
            .is_ok());
    }

    #[test]
    fn clone_reparents_children_to_the_clone() {
        let schema = two_level_schema();
        let mut tree = Tree::new(&schema);
        let leaf = tree.build("Leaf", vec![Value::Token("1".into())]).unwrap();
        let derived = tree.build("Derived", vec![Value::Node(leaf)]).unwrap();

        let copy = tree.deep_clone(derived);
        let copied_child = match tree.get(copy, "x").unwrap() {
            Value::Node(id) => *id,
            other => panic!("expected child node, got {:?}", other),
        };
        assert_ne!(copied_child, leaf);
        assert_eq!(tree.parent(copied_child), Some(copy));
        // The original is untouched.
        assert_eq!(tree.parent(leaf), Some(derived));
    }

    #[test]
    fn dispatch_calls_own_entry_exactly_once() {
        let schema = two_level_schema();
        let mut tree = Tree::new(&schema);
        let leaf = tree.build("Leaf", vec![Value::Token("1".into())]).unwrap();
        let derived = tree.build("Derived", vec![Value::Node(leaf)]).unwrap();

        let calls = RefCell::new(Vec::<String>::new());
        let mut table = VisitorTable::new(&schema);
        table
            .on(&schema, "Derived", |t, id| {
                calls.borrow_mut().push(t.type_name(id).to_string());
            })
            .unwrap();
        table
            .on(&schema, "Leaf", |t, id| {
                calls.borrow_mut().push(t.type_name(id).to_string());
            })
            .unwrap();

        table.dispatch(&tree, derived);
        // The Derived entry ran exactly once and did not recurse.
        assert_eq!(*calls.borrow(), vec!["Derived".to_string()]);
    }

    #[test]
    fn abstract_types_take_no_handler() {
        let schema = two_level_schema();
        let mut table = VisitorTable::new(&schema);
        assert!(table.on(&schema, "Base", |_, _| {}).is_err());
    }

    #[test]
    fn default_traversal_reaches_children_in_order() {
        let schema = schema_from_yaml(
            r#"
- name: Leaf
  members:
    - { name: value, kind: token }
- name: Pair
  members:
    - { name: first, kind: child }
    - { name: rest, kind: children }
"#,
        );
        let mut tree = Tree::new(&schema);
        let a = tree.build("Leaf", vec![Value::Token("a".into())]).unwrap();
        let b = tree.build("Leaf", vec![Value::Token("b".into())]).unwrap();
        let c = tree.build("Leaf", vec![Value::Token("c".into())]).unwrap();
        let pair = tree
            .build("Pair", vec![Value::Node(a), Value::Nodes(vec![b, c])])
            .unwrap();

        let seen = RefCell::new(Vec::<String>::new());
        let mut table = VisitorTable::new(&schema);
        table
            .on(&schema, "Leaf", |t, id| match t.get(id, "value") {
                Some(Value::Token(v)) => seen.borrow_mut().push(v.clone()),
                _ => unreachable!(),
            })
            .unwrap();

        // No handler for Pair: the default traversal recurses in
        // declaration order and visits nothing else.
        table.dispatch(&tree, pair);
        assert_eq!(*seen.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn source_reconstruction_uses_fragments_and_separator() {
        let schema = schema_from_yaml(
            r#"
- name: Name
  members:
    - { name: value, kind: token }
- name: Call
  members:
    - { name: callee, kind: child }
    - { name: args, kind: children, prefix: "(", suffix: ")", separator: ", " }
"#,
        );
        let mut tree = Tree::new(&schema);
        let f = tree.build("Name", vec![Value::Token("f".into())]).unwrap();
        let x = tree.build("Name", vec![Value::Token("x".into())]).unwrap();
        let y = tree.build("Name", vec![Value::Token("y".into())]).unwrap();
        let call = tree
            .build("Call", vec![Value::Node(f), Value::Nodes(vec![x, y])])
            .unwrap();
        assert_eq!(tree.to_source(call), "f(x, y)");
    }

    #[test]
    fn absent_optional_member_contributes_nothing() {
        let schema = schema_from_yaml(
            r#"
- name: Decl
  members:
    - { name: name, kind: token }
    - { name: init, kind: child, optional: true, prefix: " = " }
"#,
        );
        let mut tree = Tree::new(&schema);
        let bare = tree
            .build("Decl", vec![Value::Token("x".into()), Value::Absent])
            .unwrap();
        assert_eq!(tree.to_source(bare), "x");
    }

    #[test]
    fn add_child_appends_and_reparents() {
        let schema = schema_from_yaml(
            r#"
- name: Leaf
  members:
    - { name: value, kind: token }
- name: Block
  members:
    - { name: statements, kind: children, add_method: true, separator: "; " }
"#,
        );
        let mut tree = Tree::new(&schema);
        let block = tree.build("Block", vec![Value::Nodes(vec![])]).unwrap();
        let s = tree.build("Leaf", vec![Value::Token("s".into())]).unwrap();
        tree.add_child(block, "statements", s).unwrap();
        assert_eq!(tree.parent(s), Some(block));
        assert_eq!(tree.to_source(block), "s");
    }

    #[test]
    fn node_name_member_renders_the_name() {
        let schema = schema_from_yaml(
            r#"
- name: Block
  members:
    - { name: name, kind: token, node_name: true }
    - { name: body, kind: children }
"#,
        );
        let mut tree = Tree::new(&schema);
        let block = tree
            .build(
                "Block",
                vec![Value::Token("NET_RECEIVE".into()), Value::Nodes(vec![])],
            )
            .unwrap();
        assert_eq!(tree.node_name(block).as_deref(), Some("NET_RECEIVE"));
    }
}
