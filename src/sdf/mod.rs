//! Scene Description Foundations.
//!
//! Paths, values, list ops, reference arcs, prim/attribute specs, layers and
//! the layer store that owns them.

mod layer;
mod layer_store;
mod list_op;
pub(crate) mod path;
mod reference;
mod spec;
mod value;

pub use layer::{Layer, LayerChange, LayerError};
pub use layer_store::LayerStore;
pub use list_op::{ListOp, ListPosition};
pub use path::{is_valid_identifier, path, Path, PathError};
pub use reference::{InvalidArcError, LayerOffset, Reference};
pub use spec::{is_valid_property_name, AttributeSpec, PrimSpec, Specifier};
pub use value::Value;

pub(crate) use value::quote;
