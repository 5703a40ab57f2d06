mod error;

pub mod assign;
pub mod concat;
pub mod entity;
pub mod renumber;
pub mod standard;
pub mod workflow;

pub use error::Error;

pub use assign::{AssignConfig, ChainReassignment};
pub use concat::ConcatenationState;
pub use entity::{EntityConversion, EntityConversionSet};
pub use renumber::{ConversionTemplate, RenumberConfig};
pub use standard::StandardSequences;
pub use workflow::{CurationState, StandardSource, Workflow};
