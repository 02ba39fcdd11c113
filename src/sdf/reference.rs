use std::fmt;

use thiserror::Error;

use super::Path;

/// Rejected reference construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidArcError {
    #[error("Reference must name an asset path, a prim path, or both")]
    Empty,
    #[error("Reference target <{0}> must be an absolute prim path")]
    InvalidTargetPath(Path),
    #[error("Invalid layer offset (offset = {offset}, scale = {scale})")]
    InvalidLayerOffset { offset: f64, scale: f64 },
}

/// Time mapping applied across an arc: `stage_time = source_time * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerOffset {
    pub offset: f64,
    pub scale: f64,
}

impl Default for LayerOffset {
    fn default() -> Self {
        Self { offset: 0.0, scale: 1.0 }
    }
}

impl LayerOffset {
    pub fn new(offset: f64, scale: f64) -> Self {
        Self { offset, scale }
    }

    pub fn is_identity(&self) -> bool {
        self.offset == 0.0 && self.scale == 1.0
    }

    pub fn is_valid(&self) -> bool {
        self.offset.is_finite() && self.scale.is_finite() && self.scale != 0.0
    }

    /// Map a time in the source layer into the referencing layer.
    pub fn apply(&self, time: f64) -> f64 {
        time * self.scale + self.offset
    }

    /// The offset that undoes this one. Only meaningful for valid offsets.
    pub fn inverse(&self) -> LayerOffset {
        LayerOffset {
            offset: -self.offset / self.scale,
            scale: 1.0 / self.scale,
        }
    }

    /// `self ∘ inner`: first apply `inner`, then `self`.
    pub fn compose(&self, inner: &LayerOffset) -> LayerOffset {
        LayerOffset {
            offset: self.scale * inner.offset + self.offset,
            scale: self.scale * inner.scale,
        }
    }
}

/// A reference arc: asset path, optional target prim path and layer offset.
///
/// An empty asset path makes the reference internal (it targets the layer
/// stack of the prim holding it). A missing prim path targets the default
/// prim of the referenced layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    asset_path: String,
    prim_path: Option<Path>,
    layer_offset: LayerOffset,
}

impl Reference {
    pub fn new(
        asset_path: impl Into<String>,
        prim_path: Option<Path>,
        layer_offset: LayerOffset,
    ) -> Result<Self, InvalidArcError> {
        let asset_path = asset_path.into();

        if asset_path.is_empty() && prim_path.is_none() {
            return Err(InvalidArcError::Empty);
        }
        if let Some(path) = &prim_path {
            if !path.is_prim_path() {
                return Err(InvalidArcError::InvalidTargetPath(path.clone()));
            }
        }
        if !layer_offset.is_valid() {
            return Err(InvalidArcError::InvalidLayerOffset {
                offset: layer_offset.offset,
                scale: layer_offset.scale,
            });
        }

        Ok(Self {
            asset_path,
            prim_path,
            layer_offset,
        })
    }

    /// Reference to the default prim of the layer at `asset_path`.
    pub fn external(asset_path: impl Into<String>) -> Result<Self, InvalidArcError> {
        Self::new(asset_path, None, LayerOffset::default())
    }

    /// Reference to `prim_path` in the referencing prim's own layer stack.
    pub fn internal(prim_path: Path) -> Result<Self, InvalidArcError> {
        Self::new(String::new(), Some(prim_path), LayerOffset::default())
    }

    pub fn asset_path(&self) -> &str {
        &self.asset_path
    }

    pub fn prim_path(&self) -> Option<&Path> {
        self.prim_path.as_ref()
    }

    pub fn layer_offset(&self) -> &LayerOffset {
        &self.layer_offset
    }

    pub fn is_internal(&self) -> bool {
        self.asset_path.is_empty()
    }
}

/// usda form: `@asset@</path> (offset = 1; scale = 2)`.
impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.asset_path.is_empty() {
            write!(f, "@{}@", self.asset_path)?;
        }
        if let Some(path) = &self.prim_path {
            write!(f, "<{path}>")?;
        }
        if !self.layer_offset.is_identity() {
            write!(f, " (offset = {}; scale = {})", self.layer_offset.offset, self.layer_offset.scale)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::path;

    #[test]
    fn construction_rules() {
        assert_eq!(Reference::new("", None, LayerOffset::default()), Err(InvalidArcError::Empty));
        assert!(Reference::external("a.usda").is_ok());
        assert!(Reference::internal(path("/trg").unwrap()).unwrap().is_internal());

        assert!(matches!(
            Reference::internal(Path::abs_root()),
            Err(InvalidArcError::InvalidTargetPath(_))
        ));
        assert!(matches!(
            Reference::internal(path("trg").unwrap()),
            Err(InvalidArcError::InvalidTargetPath(_))
        ));
        assert!(matches!(
            Reference::new("a.usda", None, LayerOffset::new(1.0, 0.0)),
            Err(InvalidArcError::InvalidLayerOffset { .. })
        ));
    }

    #[test]
    fn compared_by_value() {
        let a = Reference::new("a.usda", Some(path("/trg").unwrap()), LayerOffset::new(1.25, 2.0)).unwrap();
        let b = Reference::new("a.usda", Some(path("/trg").unwrap()), LayerOffset::new(1.25, 2.0)).unwrap();
        let c = Reference::new("a.usda", Some(path("/trg").unwrap()), LayerOffset::default()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn offsets_compose_and_invert() {
        let outer = LayerOffset::new(10.0, 2.0);
        let inner = LayerOffset::new(1.0, 3.0);
        let both = outer.compose(&inner);
        assert_eq!(both.apply(1.0), outer.apply(inner.apply(1.0)));
        assert!((both.inverse().apply(both.apply(4.0)) - 4.0).abs() < 1e-12);
        assert!(LayerOffset::default().is_identity());
    }

    #[test]
    fn display_usda() {
        let r = Reference::new("./a.usda", Some(path("/trg").unwrap()), LayerOffset::new(1.25, 2.0)).unwrap();
        assert_eq!(r.to_string(), "@./a.usda@</trg> (offset = 1.25; scale = 2)");
        assert_eq!(Reference::internal(path("/x").unwrap()).unwrap().to_string(), "</x>");
    }
}
