//! # CifCurate
//!
//! **CifCurate** reconciles the chain identifiers, residue numbering, and entity naming of large collections of mmCIF depositions that describe the same biological assembly. Depositions of one assembly routinely disagree on which chain is "A", where its numbering starts, and what each molecule is called; the crate derives one canonical description and rewrites every file to match it, keeping the pipeline deterministic and auditable from parsing to the final rewrite.
//!
//! ## Features
//!
//! - **Sequence extraction** – A streaming mmCIF reader distills every chain into a one-letter sequence with its parallel author numbering, plus the entity table linking molecule descriptions to chains.
//! - **Canonical sequences** – One reference sequence per logical chain slot, taken verbatim from a chosen structure or voted from all inputs with containment-aware consensus scoring.
//! - **Stable chain assignment** – Pairwise alignment identity feeds a capacity-1 hospital/residents matching, so no two canonical slots ever fight over the same local chain.
//! - **Collision-free renumbering** – Multi-alignment column numbering with letter-suffixed low-consensus columns, and stride offsets that keep concatenated chains apart in residue-number space.
//! - **In-place rewriting** – Coordinate records are rewritten field by field while every other line passes through untouched; an output file always has its input's line count.

mod model;
mod utils;

pub mod align;
pub mod io;
pub mod ops;

pub use model::chain::Chain;
pub use model::entity::Entity;
pub use model::ids::{ChainKey, NewResidueId, ResidueId};
pub use model::structure::Structure;
