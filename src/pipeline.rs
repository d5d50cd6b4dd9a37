//! Pipeline orchestration.
//!
//! One generation run is a single linear sequence with no branching
//! states: load and validate the schema, derive the artifact descriptions,
//! render, emit. The first error short-circuits the whole run; there is no
//! retry transition, so a failed run is restarted from scratch.

use std::path::{Path, PathBuf};

use log::info;

use crate::emit::{render_units, Emitter, OutputLayout};
use crate::errors::AstgenError;
use crate::generate;
use crate::schema;

/// What a completed run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub node_count: usize,
    pub written: Vec<PathBuf>,
}

/// Execute a full generation run against one schema file.
pub fn run(schema_path: &Path, layout: OutputLayout) -> Result<RunSummary, AstgenError> {
    let schema = schema::load_file(schema_path)?;
    info!("loaded and validated {} node definition(s)", schema.len());

    let model = generate::generate(&schema)?;
    let units = render_units(&model);

    let written = Emitter::new(layout).emit_all(&units)?;
    Ok(RunSummary {
        node_count: schema.len(),
        written,
    })
}
