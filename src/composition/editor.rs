use thiserror::Error;

use crate::sdf::{InvalidArcError, Layer, LayerError, LayerOffset, ListOp, ListPosition, Path, Reference};

/// Failure of a reference list edit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReferenceEditError {
    #[error(transparent)]
    InvalidArc(#[from] InvalidArcError),
    #[error(transparent)]
    Layer(#[from] LayerError),
    #[error("Layer {0} is not loaded")]
    LayerNotLoaded(String),
}

/// Edits the reference list op of one prim spec in one layer.
///
/// Every edit goes through [`Layer::edit_references`], so the prim spec is
/// created as an `over` when missing and the change lands in the layer
/// journal, which invalidates dependent composed prims.
pub struct ReferenceListEditor<'a> {
    layer: &'a mut Layer,
    path: Path,
}

impl<'a> ReferenceListEditor<'a> {
    pub fn new(layer: &'a mut Layer, path: Path) -> Self {
        Self { layer, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layer(&self) -> &Layer {
        &*self.layer
    }

    /// The list op currently authored at the edited prim, if any.
    pub fn list_op(&self) -> Option<&ListOp<Reference>> {
        self.layer.prim(&self.path).map(|spec| &spec.references)
    }

    /// Add `reference` at `position`.
    ///
    /// Front positions make the newest item the strongest; back positions
    /// keep earlier items stronger.
    pub fn add(&mut self, reference: Reference, position: ListPosition) -> Result<(), ReferenceEditError> {
        log::trace!("<{}>: add reference {reference} at {position:?}", self.path);
        self.layer
            .edit_references(&self.path, |refs| refs.insert(reference, position))?;
        Ok(())
    }

    /// Add a reference to `asset_path`, optionally targeting `prim_path`.
    pub fn add_reference(
        &mut self,
        asset_path: &str,
        prim_path: Option<Path>,
        layer_offset: LayerOffset,
        position: ListPosition,
    ) -> Result<(), ReferenceEditError> {
        let reference = Reference::new(asset_path, prim_path, layer_offset)?;
        self.add(reference, position)
    }

    /// Add a reference to `prim_path` within the referencing layer stack.
    pub fn add_internal(
        &mut self,
        prim_path: Path,
        layer_offset: LayerOffset,
        position: ListPosition,
    ) -> Result<(), ReferenceEditError> {
        let reference = Reference::new(String::new(), Some(prim_path), layer_offset)?;
        self.add(reference, position)
    }

    /// Remove `reference`, recording a delete unless the list is explicit.
    pub fn remove(&mut self, reference: &Reference) -> Result<(), ReferenceEditError> {
        self.layer.edit_references(&self.path, |refs| refs.remove(reference))?;
        Ok(())
    }

    /// Replace the list with an explicit one.
    pub fn set_references(&mut self, references: Vec<Reference>) -> Result<(), ReferenceEditError> {
        self.layer
            .edit_references(&self.path, |refs| refs.set_explicit_items(references))?;
        Ok(())
    }

    /// Drop every reference opinion of the edited prim in this layer.
    pub fn clear(&mut self) -> Result<(), ReferenceEditError> {
        if !self.layer.has_prim(&self.path) {
            return Ok(());
        }
        self.layer.edit_references(&self.path, ListOp::clear)?;
        Ok(())
    }
}
