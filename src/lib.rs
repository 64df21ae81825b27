pub mod collaborator;
pub mod column_merge;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod output_assembler;
pub mod pipeline;
pub mod staleness_cache;
mod table_io;

pub use collaborator::{Collaborator, ProcessCollaborator};
pub use config::{AnnotatorOptions, DepthColumns, ReannotateConfig};
pub use error::{ReannotateError, ReannotateResult};
pub use pipeline::{Pipeline, RunReport};
pub use reannotate_protocol as protocol;
