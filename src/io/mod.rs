mod cif;
mod context;
mod error;

pub mod report;

pub use cif::reader::read as read_cif_structure;
pub use cif::rewriter::{
    rewrite, rewrite_file, rewrite_files, RewriteEdits, RewriteJob, RewriteSummary,
    DEFAULT_CONCAT_STRIDE,
};

pub use context::ResidueCodeTable;

pub use error::Error;
