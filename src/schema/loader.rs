//! Schema loading and validation.
//!
//! The loader turns external schema input (a YAML descriptor list, or an
//! already-deserialized descriptor list from another front-end) into a
//! validated [`Schema`]. Validation is all-or-nothing: the passes below run
//! in a fixed order and the first failure aborts the load, so no partial
//! schema ever reaches generation.
//!
//! Pass order: duplicate node names, undefined base types, inheritance
//! cycles, member shape.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{AstgenError, ErrorKind, SourceContext};
use crate::names;
use crate::schema::model::{MemberDef, NodeDef, NodeIdx, Schema, ValueKind};

// ============================================================================
// RAW DESCRIPTORS - the structural input contract
// ============================================================================

/// Raw node descriptor as it arrives from the schema front-end.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawNode {
    pub name: String,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub brief: Option<String>,
    #[serde(default)]
    pub members: Vec<RawMember>,
}

/// Raw member descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMember {
    pub name: String,
    /// Name in the modeled DSL; defaults to `name`.
    #[serde(default)]
    pub source_name: Option<String>,
    pub kind: RawKind,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub separator: String,
    #[serde(default = "default_true")]
    pub getter: bool,
    #[serde(default)]
    pub getter_override: bool,
    #[serde(default = "default_true")]
    pub cloneable: bool,
    #[serde(default)]
    pub add_method: bool,
    #[serde(default)]
    pub node_name: bool,
    #[serde(default)]
    pub url: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RawKind {
    #[serde(rename = "token")]
    Token,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "child")]
    Child,
    #[serde(rename = "children")]
    Children,
}

impl From<RawKind> for ValueKind {
    fn from(kind: RawKind) -> Self {
        match kind {
            RawKind::Token => ValueKind::Token,
            RawKind::String => ValueKind::StringLiteral,
            RawKind::Child => ValueKind::Child,
            RawKind::Children => ValueKind::ChildVec,
        }
    }
}

// ============================================================================
// LOADING ENTRY POINTS
// ============================================================================

/// Load and validate a schema from a YAML file.
pub fn load_file(path: &Path) -> Result<Schema, AstgenError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AstgenError::new(ErrorKind::SchemaSyntax {
            message: format!("cannot read schema '{}': {}", path.display(), e),
        })
    })?;
    load_str(&path.display().to_string(), &text)
}

/// Load and validate a schema from YAML text. Errors carry the source text
/// and, where the offending identifier can be located, a span into it.
pub fn load_str(name: &str, text: &str) -> Result<Schema, AstgenError> {
    let ctx = SourceContext::from_file(name, text);
    let raw: Vec<RawNode> = serde_yaml::from_str(text).map_err(|e| {
        let err = AstgenError::new(ErrorKind::SchemaSyntax {
            message: e.to_string(),
        });
        match e.location() {
            Some(loc) => err.with_source(&ctx, (loc.index()..loc.index() + 1).into()),
            None => err,
        }
    })?;
    validate(raw).map_err(|e| attach_context(e, &ctx))
}

/// Validate an ordered descriptor list into a [`Schema`].
///
/// This is the structural contract entry point: front-ends other than the
/// YAML reader can feed descriptors here directly.
pub fn validate(raw: Vec<RawNode>) -> Result<Schema, AstgenError> {
    // Pass 1: duplicate node names.
    let mut by_name: HashMap<String, NodeIdx> = HashMap::new();
    for (idx, node) in raw.iter().enumerate() {
        if by_name.insert(node.name.clone(), idx).is_some() {
            return Err(AstgenError::new(ErrorKind::DuplicateNodeName {
                type_name: node.name.clone(),
            }));
        }
    }

    // Pass 2: every base type must name a defined node.
    let mut bases: Vec<Option<NodeIdx>> = Vec::with_capacity(raw.len());
    for node in &raw {
        let base = match &node.base {
            Some(base_name) => Some(by_name.get(base_name).copied().ok_or_else(|| {
                AstgenError::new(ErrorKind::UndefinedBaseType {
                    type_name: node.name.clone(),
                    base_type: base_name.clone(),
                })
            })?),
            None => None,
        };
        bases.push(base);
    }

    // Pass 3: the base graph must form a forest.
    check_acyclic(&raw, &bases)?;

    // Pass 4: member shape.
    for node in &raw {
        check_members(node)?;
    }

    let nodes = raw
        .into_iter()
        .zip(bases)
        .map(|(node, base)| lower_node(node, base))
        .collect();
    Ok(Schema::new(nodes, by_name))
}

// ============================================================================
// VALIDATION PASSES
// ============================================================================

/// Walks every base chain once; a node revisited while still on the
/// current path closes an inheritance cycle.
fn check_acyclic(raw: &[RawNode], bases: &[Option<NodeIdx>]) -> Result<(), AstgenError> {
    const UNSEEN: u8 = 0;
    const ON_PATH: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![UNSEEN; raw.len()];
    for start in 0..raw.len() {
        let mut path: Vec<NodeIdx> = Vec::new();
        let mut cur = start;
        loop {
            match state[cur] {
                DONE => break,
                ON_PATH => {
                    // Nodes from earlier chains are DONE, so a revisit can
                    // only hit the current path.
                    let entry = path.iter().position(|&p| p == cur).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[entry..].iter().map(|&p| raw[p].name.clone()).collect();
                    cycle.push(raw[cur].name.clone());
                    return Err(AstgenError::new(ErrorKind::CyclicInheritance {
                        path: cycle,
                    }));
                }
                _ => {}
            }
            state[cur] = ON_PATH;
            path.push(cur);
            match bases[cur] {
                Some(base) => cur = base,
                None => break,
            }
        }
        for &p in &path {
            state[p] = DONE;
        }
    }
    Ok(())
}

fn member_shape_error(node: &RawNode, member: &RawMember, reason: &str) -> AstgenError {
    AstgenError::new(ErrorKind::InvalidMemberShape {
        type_name: node.name.clone(),
        field_name: member.name.clone(),
        reason: reason.to_string(),
    })
}

fn check_members(node: &RawNode) -> Result<(), AstgenError> {
    let mut node_name_count = 0;
    for (i, member) in node.members.iter().enumerate() {
        if member.kind == RawKind::Children && member.optional {
            return Err(member_shape_error(
                node,
                member,
                "a vector of children cannot be optional; an empty vector is the absent state",
            ));
        }
        if member.add_method && member.kind != RawKind::Children {
            return Err(member_shape_error(
                node,
                member,
                "add_method is only meaningful on a vector of children",
            ));
        }
        if member.node_name {
            if member.kind == RawKind::Children {
                return Err(member_shape_error(
                    node,
                    member,
                    "a vector of children cannot serve as the node name",
                ));
            }
            node_name_count += 1;
            if node_name_count > 1 {
                return Err(member_shape_error(
                    node,
                    member,
                    "at most one member may be marked as the node name",
                ));
            }
        }
        if names::property_form(&member.name) != member.name {
            return Err(member_shape_error(
                node,
                member,
                "field name must be snake_case",
            ));
        }
        if node.members[..i].iter().any(|m| m.name == member.name) {
            return Err(member_shape_error(node, member, "duplicate field name"));
        }
    }
    Ok(())
}

fn lower_node(node: RawNode, base: Option<NodeIdx>) -> NodeDef {
    let members = node
        .members
        .into_iter()
        .map(|m| MemberDef {
            source_name: m.source_name.unwrap_or_else(|| m.name.clone()),
            field_name: m.name,
            value_kind: m.kind.into(),
            is_optional: m.optional,
            prefix: m.prefix,
            suffix: m.suffix,
            separator: m.separator,
            exposes_getter: m.getter,
            getter_is_overridden: m.getter_override,
            participates_in_equality_or_clone: m.cloneable,
            add_method: m.add_method,
            is_node_name: m.node_name,
            doc_url: m.url,
        })
        .collect();
    NodeDef {
        type_name: node.name,
        base_type: node.base,
        base,
        is_abstract: node.is_abstract,
        brief: node.brief,
        members,
    }
}

// ============================================================================
// SOURCE ATTACHMENT
// ============================================================================

/// Point a validation error at the offending identifier in the schema text.
/// Best effort: when the identifier cannot be located the error stays
/// unspanned but keeps the full source for context.
fn attach_context(err: AstgenError, ctx: &SourceContext) -> AstgenError {
    let needle = match &err.kind {
        // For duplicates the second occurrence is the offending one.
        ErrorKind::DuplicateNodeName { type_name } => Some((type_name.as_str(), 1)),
        ErrorKind::UndefinedBaseType { base_type, .. } => Some((base_type.as_str(), 0)),
        ErrorKind::CyclicInheritance { path } => path.first().map(|n| (n.as_str(), 0)),
        ErrorKind::InvalidMemberShape { field_name, .. } => Some((field_name.as_str(), 0)),
        _ => return err,
    };
    match needle.and_then(|(s, nth)| find_nth(&ctx.content, s, nth).map(|pos| (pos, s.len()))) {
        Some((pos, len)) => err.with_source(ctx, (pos..pos + len).into()),
        None => err,
    }
}

fn find_nth(haystack: &str, needle: &str, nth: usize) -> Option<usize> {
    haystack.match_indices(needle).nth(nth).map(|(pos, _)| pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, base: Option<&str>) -> RawNode {
        RawNode {
            name: name.to_string(),
            base: base.map(str::to_string),
            is_abstract: false,
            brief: None,
            members: vec![],
        }
    }

    fn member(name: &str, kind: RawKind) -> RawMember {
        RawMember {
            name: name.to_string(),
            source_name: None,
            kind,
            optional: false,
            prefix: String::new(),
            suffix: String::new(),
            separator: String::new(),
            getter: true,
            getter_override: false,
            cloneable: true,
            add_method: false,
            node_name: false,
            url: None,
        }
    }

    #[test]
    fn accepts_minimal_schema() {
        let schema = validate(vec![node("Leaf", None)]).unwrap();
        assert_eq!(schema.len(), 1);
        assert_eq!(schema.lookup("Leaf"), Some(0));
    }

    #[test]
    fn rejects_duplicate_node_names() {
        let err = validate(vec![node("Leaf", None), node("Leaf", None)]).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::DuplicateNodeName {
                type_name: "Leaf".into()
            }
        );
    }

    #[test]
    fn rejects_undefined_base_type() {
        let err = validate(vec![node("Derived", Some("Missing"))]).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::UndefinedBaseType {
                type_name: "Derived".into(),
                base_type: "Missing".into()
            }
        );
    }

    #[test]
    fn rejects_two_node_cycle() {
        let err = validate(vec![node("A", Some("B")), node("B", Some("A"))]).unwrap_err();
        match err.kind {
            ErrorKind::CyclicInheritance { path } => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 3);
            }
            other => panic!("expected CyclicInheritance, got {:?}", other),
        }
    }

    #[test]
    fn rejects_self_inheritance() {
        let err = validate(vec![node("A", Some("A"))]).unwrap_err();
        match err.kind {
            ErrorKind::CyclicInheritance { path } => assert_eq!(path, vec!["A", "A"]),
            other => panic!("expected CyclicInheritance, got {:?}", other),
        }
    }

    #[test]
    fn rejects_optional_child_vector() {
        let mut n = node("Block", None);
        let mut m = member("statements", RawKind::Children);
        m.optional = true;
        n.members.push(m);
        let err = validate(vec![n]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidMemberShape { .. }));
    }

    #[test]
    fn rejects_add_method_on_scalar_member() {
        let mut n = node("Unary", None);
        let mut m = member("operand", RawKind::Child);
        m.add_method = true;
        n.members.push(m);
        let err = validate(vec![n]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidMemberShape { .. }));
    }

    #[test]
    fn validation_order_reports_duplicates_before_cycles() {
        // Both defects present; the duplicate pass runs first.
        let err = validate(vec![
            node("A", Some("B")),
            node("B", Some("A")),
            node("A", None),
        ])
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DuplicateNodeName { .. }));
    }

    #[test]
    fn resolves_base_indices() {
        let schema = validate(vec![node("Base", None), node("Derived", Some("Base"))]).unwrap();
        let derived = schema.lookup("Derived").unwrap();
        assert_eq!(schema.node(derived).base, Some(schema.lookup("Base").unwrap()));
    }

    #[test]
    fn yaml_front_end_defaults() {
        let schema = load_str(
            "test.yaml",
            r#"
- name: Expression
  abstract: true
- name: Number
  base: Expression
  members:
    - name: value
      kind: token
"#,
        )
        .unwrap();
        let number = schema.lookup("Number").unwrap();
        let m = schema.node(number).member("value").unwrap();
        assert_eq!(m.value_kind, ValueKind::Token);
        assert_eq!(m.source_name, "value");
        assert!(m.exposes_getter);
        assert!(m.participates_in_equality_or_clone);
    }

    #[test]
    fn yaml_errors_carry_source_span() {
        let err = load_str(
            "test.yaml",
            "- name: Child\n  base: Ghost\n",
        )
        .unwrap_err();
        assert!(err.source_info.is_some());
        assert_eq!(err.diagnostic_info.error_code, "astgen::schema::undefined_base_type");
    }
}
