//! Artifact emission: renders the generated descriptions into one text
//! unit per family and writes each unit to its caller-designated output
//! location.
//!
//! Rendering is plain string concatenation over the derived descriptions -
//! the emitted text witnesses the constructor/accessor/dispatch/clone/
//! reconstruction contract; template authoring is out of scope. Any write
//! failure is fatal: there is no retry and no partial-output contract, so
//! a failed run's output directories must be regenerated fully.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::errors::AstgenError;
use crate::generate::{BindingDesc, ClassDesc, GeneratedModel, VisitorDesc, BINDING_MARKER};
use crate::schema::ValueKind;

/// The three categories of generated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Ast,
    Visitor,
    Binding,
}

/// One renderable output unit.
#[derive(Debug)]
pub struct Unit {
    pub name: String,
    pub family: Family,
    pub text: String,
}

/// Caller-designated output locations, one per artifact family.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub ast_dir: PathBuf,
    pub visitor_dir: PathBuf,
    pub binding_dir: PathBuf,
}

// ============================================================================
// RENDERING
// ============================================================================

/// Render the whole model into one unit per family.
pub fn render_units(model: &GeneratedModel) -> Vec<Unit> {
    vec![
        Unit {
            name: "ast.hpp".to_string(),
            family: Family::Ast,
            text: render_classes(&model.classes),
        },
        Unit {
            name: "visitor.hpp".to_string(),
            family: Family::Visitor,
            text: render_visitor(&model.visitor),
        },
        Unit {
            name: format!("{}astgen.cpp", BINDING_MARKER),
            family: Family::Binding,
            text: render_bindings(&model.bindings),
        },
    ]
}

fn param_type(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Token => "Token",
        ValueKind::StringLiteral => "std::string",
        ValueKind::Child => "Node*",
        ValueKind::ChildVec => "NodeVector",
    }
}

fn ctor_signature(class_name: &str, params: &[crate::generate::CtorParam]) -> String {
    let list = params
        .iter()
        .map(|p| format!("{} {}", param_type(p.value_kind), p.field_name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}({})", class_name, list)
}

fn render_classes(classes: &[ClassDesc]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "// Generated by astgen. Do not edit.");
    let _ = writeln!(out);

    let _ = writeln!(out, "enum class NodeType {{");
    for class in classes {
        let _ = writeln!(out, "    {},", class.tag);
    }
    let _ = writeln!(out, "}};");
    let _ = writeln!(out);

    for class in classes {
        if let Some(brief) = &class.brief {
            let _ = writeln!(out, "/// {}", brief);
        }
        let base = class.base_type.as_deref().unwrap_or("Node");
        let _ = writeln!(out, "class {} : public {} {{", class.type_name, base);
        let _ = writeln!(out, "  public:");
        let _ = writeln!(out, "    {};", ctor_signature(&class.type_name, &class.ctor_params));
        for accessor in &class.accessors {
            if let Some(url) = &accessor.doc_url {
                let _ = writeln!(out, "    // see {}", url);
            }
            let _ = writeln!(out, "    auto {}() const;", accessor.method_name);
        }
        for mutator in &class.mutators {
            let _ = writeln!(
                out,
                "    void {}(Node* n);  // appends to {} and re-parents n",
                mutator.method_name, mutator.field_name
            );
        }
        if let Some(member) = &class.node_name_member {
            let _ = writeln!(
                out,
                "    std::string get_node_name() const;  // renders {}",
                member
            );
        }
        if let Some(hook) = &class.visit_hook {
            let _ = writeln!(
                out,
                "    void accept(Visitor& v) override;  // v.{}(*this)",
                hook
            );
            let _ = writeln!(
                out,
                "    {}* clone() const override;  // deep copy, re-parents children",
                class.type_name
            );
            let _ = writeln!(out, "    std::string to_source() const;  // {}", recon_contract(class));
        }
        let _ = writeln!(out, "}};");
        let _ = writeln!(out);
    }
    out
}

/// Human-readable reconstruction contract, member by member.
fn recon_contract(class: &ClassDesc) -> String {
    let parts: Vec<String> = class
        .ctor_params
        .iter()
        .map(|p| {
            if p.value_kind == ValueKind::ChildVec {
                format!("{:?} join({}, {:?}) {:?}", p.prefix, p.field_name, p.separator, p.suffix)
            } else {
                format!("{:?} {} {:?}", p.prefix, p.field_name, p.suffix)
            }
        })
        .collect();
    parts.join(" ")
}

fn render_visitor(visitor: &VisitorDesc) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "// Generated by astgen. Do not edit.");
    let _ = writeln!(out);
    let _ = writeln!(out, "class Visitor {{");
    let _ = writeln!(out, "  public:");
    for entry in &visitor.entries {
        let _ = writeln!(
            out,
            "    virtual void {}({}& node) = 0;",
            entry.method_name, entry.type_name
        );
    }
    let _ = writeln!(out, "}};");
    let _ = writeln!(out);
    let _ = writeln!(out, "// Default traversal: visits every child member in");
    let _ = writeln!(out, "// declaration order and nothing else.");
    let _ = writeln!(out, "class AstVisitor : public Visitor {{");
    let _ = writeln!(out, "  public:");
    for traversal in &visitor.traversals {
        let entry = format!("visit_{}", crate::names::property_form(&traversal.type_name));
        let _ = writeln!(out, "    void {}({}& node) override {{", entry, traversal.type_name);
        for step in &traversal.steps {
            if step.is_vector {
                let _ = writeln!(
                    out,
                    "        for (auto& child : node.{}) {{ child->accept(*this); }}",
                    step.field_name
                );
            } else {
                let _ = writeln!(out, "        node.{}->accept(*this);", step.field_name);
            }
        }
        let _ = writeln!(out, "    }}");
    }
    let _ = writeln!(out, "}};");
    out
}

fn render_bindings(bindings: &[BindingDesc]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "// Generated by astgen. Do not edit.");
    let _ = writeln!(out, "// Bindings expose references only; nodes own their children.");
    let _ = writeln!(out);
    for binding in bindings {
        let _ = writeln!(
            out,
            "class_<{0}, {0}*>(m, \"{1}\")",
            binding.type_name, binding.property_name
        );
        let _ = writeln!(
            out,
            "    .def(init([]({}) {{ ... }}))",
            binding
                .ctor_params
                .iter()
                .map(|p| format!("{} {}", param_type(p.value_kind), p.field_name))
                .collect::<Vec<_>>()
                .join(", ")
        );
        for accessor in &binding.accessors {
            let _ = writeln!(
                out,
                "    .def(\"{0}\", &{1}::{0})",
                accessor.method_name, binding.type_name
            );
        }
        let _ = writeln!(
            out,
            "    .def(\"to_source\", &{}::to_source);",
            binding.type_name
        );
        let _ = writeln!(out);
    }
    out
}

// ============================================================================
// EMISSION
// ============================================================================

/// Writes rendered units to the filesystem.
pub struct Emitter {
    layout: OutputLayout,
}

impl Emitter {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    /// Output directory for a unit. Units whose name begins with the
    /// reserved binding marker are routed to the bindings location even
    /// when otherwise indistinguishable from AST or visitor artifacts.
    pub fn route(&self, unit: &Unit) -> &Path {
        if unit.name.starts_with(BINDING_MARKER) {
            return &self.layout.binding_dir;
        }
        match unit.family {
            Family::Ast => &self.layout.ast_dir,
            Family::Visitor => &self.layout.visitor_dir,
            Family::Binding => &self.layout.binding_dir,
        }
    }

    /// Write every unit, creating output directories as needed. Returns
    /// the paths written, in unit order.
    pub fn emit_all(&self, units: &[Unit]) -> Result<Vec<PathBuf>, AstgenError> {
        let mut written = Vec::with_capacity(units.len());
        for unit in units {
            let dir = self.route(unit);
            fs::create_dir_all(dir).map_err(|e| AstgenError::emission(dir, &e))?;
            let path = dir.join(&unit.name);
            fs::write(&path, &unit.text).map_err(|e| AstgenError::emission(&path, &e))?;
            debug!("wrote {}", path.display());
            written.push(path);
        }
        info!("emitted {} unit(s)", written.len());
        Ok(written)
    }
}
