//! `usdref` composes USD prims through references and default prims.
//!
//! # Modules
//!
//! - `sdf` - Scene description: paths, values, list ops, layers and the layer store
//! - `usda` - Text format (.usda) reader and writer
//! - `composition` - Reference list editing, default prim resolution and arc composition
//! - `stage` - Lazily composed, self-invalidating view of a layer stack

pub mod composition;
pub mod sdf;
pub mod stage;
pub mod usda;

pub use half::f16;
pub use stage::{PrimState, Stage, StageReferences};
