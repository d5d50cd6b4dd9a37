pub use crate::errors::{print_error, AstgenError, ErrorCategory, ErrorKind, SourceContext};

pub mod cli;
pub mod emit;
pub mod errors;
pub mod generate;
pub mod names;
pub mod pipeline;
pub mod schema;
pub mod tree;
