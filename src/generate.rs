//! Generation engine: derives the generation-ready description of the
//! three artifact families (AST classes, visitor entries, bindings) for
//! every node of a validated schema.
//!
//! Nodes are processed in topological order over the inheritance forest so
//! a base type's description always exists before its subtypes'. Each
//! node's derivation depends only on the read-only schema, so the per-node
//! work fans out across a rayon pool.
//!
//! The engine assumes the schema has passed validation; an invariant
//! violation observed here is a loader defect and surfaces as an internal
//! error, never as a schema error.

use log::debug;
use rayon::prelude::*;
use serde::Serialize;

use crate::errors::AstgenError;
use crate::names::{property_form, tag_form};
use crate::schema::{NodeIdx, Schema, ValueKind};

/// Reserved marker: generated units whose name starts with this prefix
/// belong to the bindings output location regardless of claimed family.
pub const BINDING_MARKER: &str = "py";

// ============================================================================
// ARTIFACT DESCRIPTIONS
// ============================================================================

/// One constructor parameter, in declaration order (inherited first).
#[derive(Debug, Clone, Serialize)]
pub struct CtorParam {
    pub field_name: String,
    pub value_kind: ValueKind,
    pub is_optional: bool,
    /// Type that declares this member (the node itself or an ancestor).
    pub declared_by: String,
    /// Source-reconstruction fragments, in ctor order.
    pub prefix: String,
    pub suffix: String,
    pub separator: String,
    pub cloneable: bool,
}

/// One generated accessor method.
#[derive(Debug, Clone, Serialize)]
pub struct AccessorDesc {
    pub method_name: String,
    pub field_name: String,
    pub doc_url: Option<String>,
}

/// One generated `add_<field>` mutator (ChildVec members flagged
/// `add_method`): appends a child and re-parents it.
#[derive(Debug, Clone, Serialize)]
pub struct MutatorDesc {
    pub method_name: String,
    pub field_name: String,
}

/// Generation-ready description of one AST class.
#[derive(Debug, Clone, Serialize)]
pub struct ClassDesc {
    pub type_name: String,
    /// UPPER_SNAKE discriminant for the node-type enumeration.
    pub tag: String,
    pub base_type: Option<String>,
    pub is_abstract: bool,
    pub brief: Option<String>,
    pub ctor_params: Vec<CtorParam>,
    pub accessors: Vec<AccessorDesc>,
    pub mutators: Vec<MutatorDesc>,
    /// Member whose rendered value doubles as the node's name.
    pub node_name_member: Option<String>,
    /// Per-type visitor entry this class dispatches to; absent for
    /// abstract classes, which are never dispatch targets.
    pub visit_hook: Option<String>,
}

/// One per-concrete-type visitor entry point.
#[derive(Debug, Clone, Serialize)]
pub struct VisitorEntry {
    pub method_name: String,
    pub type_name: String,
}

/// One step of the default traversal: a child-bearing member, in
/// declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct TraversalStep {
    pub field_name: String,
    pub is_vector: bool,
}

/// Default traversal of one concrete type: exactly its child-bearing
/// members, in ctor order.
#[derive(Debug, Clone, Serialize)]
pub struct TraversalDesc {
    pub type_name: String,
    pub steps: Vec<TraversalStep>,
}

/// Generation-ready description of the visitor interface.
#[derive(Debug, Clone, Serialize)]
pub struct VisitorDesc {
    pub entries: Vec<VisitorEntry>,
    pub traversals: Vec<TraversalDesc>,
}

/// Generation-ready description of one binding unit. Bindings expose
/// references only; children stay owned by their node.
#[derive(Debug, Clone, Serialize)]
pub struct BindingDesc {
    pub type_name: String,
    /// Name the class is exported under on the embedding side.
    pub property_name: String,
    pub ctor_params: Vec<CtorParam>,
    /// Exported accessors: `exposes_getter` members without a hand-written
    /// override.
    pub accessors: Vec<AccessorDesc>,
}

/// All three families for one generation run, in topological node order.
#[derive(Debug, Serialize)]
pub struct GeneratedModel {
    pub classes: Vec<ClassDesc>,
    pub visitor: VisitorDesc,
    pub bindings: Vec<BindingDesc>,
}

// ============================================================================
// DERIVATION
// ============================================================================

/// Derive the full generated model for a validated schema.
pub fn generate(schema: &Schema) -> Result<GeneratedModel, AstgenError> {
    let order = schema.topo_order();

    let classes: Vec<ClassDesc> = order
        .par_iter()
        .map(|&idx| derive_class(schema, idx))
        .collect::<Result<_, _>>()?;

    let concrete: Vec<NodeIdx> = order
        .iter()
        .copied()
        .filter(|&idx| !schema.node(idx).is_abstract)
        .collect();

    let entries = concrete
        .iter()
        .map(|&idx| {
            let name = &schema.node(idx).type_name;
            VisitorEntry {
                method_name: format!("visit_{}", property_form(name)),
                type_name: name.clone(),
            }
        })
        .collect();
    let traversals = concrete
        .iter()
        .map(|&idx| derive_traversal(schema, idx))
        .collect();

    let bindings = concrete
        .iter()
        .map(|&idx| derive_binding(schema, idx))
        .collect::<Result<_, _>>()?;

    debug!(
        "derived descriptions for {} classes ({} concrete)",
        schema.len(),
        concrete.len()
    );

    Ok(GeneratedModel {
        classes,
        visitor: VisitorDesc {
            entries,
            traversals,
        },
        bindings,
    })
}

/// Constructor parameters in declaration order, inherited members first.
fn ctor_params(schema: &Schema, idx: NodeIdx) -> Result<Vec<CtorParam>, AstgenError> {
    let mut params = Vec::new();
    for ancestor in schema.ancestry(idx) {
        let node = schema.node(ancestor);
        if node.base_type.is_some() && node.base.is_none() {
            // The loader resolves every base before a Schema exists.
            return Err(AstgenError::internal(format!(
                "unresolved base type on '{}' reached generation",
                node.type_name
            )));
        }
        for m in &node.members {
            params.push(CtorParam {
                field_name: m.field_name.clone(),
                value_kind: m.value_kind,
                is_optional: m.is_optional,
                declared_by: node.type_name.clone(),
                prefix: m.prefix.clone(),
                suffix: m.suffix.clone(),
                separator: m.separator.clone(),
                cloneable: m.participates_in_equality_or_clone,
            });
        }
    }
    Ok(params)
}

fn derive_class(schema: &Schema, idx: NodeIdx) -> Result<ClassDesc, AstgenError> {
    let node = schema.node(idx);

    let accessors = node
        .members
        .iter()
        .filter(|m| m.exposes_getter && !m.getter_is_overridden)
        .map(|m| AccessorDesc {
            method_name: format!("get_{}", m.field_name),
            field_name: m.field_name.clone(),
            doc_url: m.doc_url.clone(),
        })
        .collect();

    let mutators = node
        .members
        .iter()
        .filter(|m| m.add_method)
        .map(|m| MutatorDesc {
            method_name: format!("add_{}", m.field_name),
            field_name: m.field_name.clone(),
        })
        .collect();

    let node_name_member = node
        .members
        .iter()
        .find(|m| m.is_node_name)
        .map(|m| m.field_name.clone());

    let visit_hook =
        (!node.is_abstract).then(|| format!("visit_{}", property_form(&node.type_name)));

    Ok(ClassDesc {
        type_name: node.type_name.clone(),
        tag: tag_form(&node.type_name),
        base_type: node.base_type.clone(),
        is_abstract: node.is_abstract,
        brief: node.brief.clone(),
        ctor_params: ctor_params(schema, idx)?,
        accessors,
        mutators,
        node_name_member,
        visit_hook,
    })
}

fn derive_traversal(schema: &Schema, idx: NodeIdx) -> TraversalDesc {
    let steps = schema
        .ctor_members(idx)
        .into_iter()
        .filter(|m| m.value_kind.is_child())
        .map(|m| TraversalStep {
            field_name: m.field_name.clone(),
            is_vector: m.value_kind == ValueKind::ChildVec,
        })
        .collect();
    TraversalDesc {
        type_name: schema.node(idx).type_name.clone(),
        steps,
    }
}

fn derive_binding(schema: &Schema, idx: NodeIdx) -> Result<BindingDesc, AstgenError> {
    let node = schema.node(idx);
    let accessors = schema
        .ctor_members(idx)
        .into_iter()
        .filter(|m| m.exposes_getter && !m.getter_is_overridden)
        .map(|m| AccessorDesc {
            method_name: format!("get_{}", m.field_name),
            field_name: m.field_name.clone(),
            doc_url: m.doc_url.clone(),
        })
        .collect();
    Ok(BindingDesc {
        type_name: node.type_name.clone(),
        property_name: property_form(&node.type_name),
        ctor_params: ctor_params(schema, idx)?,
        accessors,
    })
}
