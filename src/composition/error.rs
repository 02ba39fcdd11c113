use thiserror::Error;

use crate::sdf::{Path, Reference};

/// Non-fatal problem found while composing a prim.
///
/// The offending arc is skipped; the rest of the reference list still
/// composes. Errors are reported once per composition of the prim.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompositionError {
    #[error("<{prim}>: reference {reference} names no prim and layer '{layer}' has no usable default prim")]
    UnresolvedDefaultPrim {
        prim: Path,
        layer: String,
        reference: Reference,
    },
    #[error("<{prim}>: reference {reference} targets <{target}>, which has no spec in '{layer}'")]
    TargetNotFound {
        prim: Path,
        layer: String,
        target: Path,
        reference: Reference,
    },
    #[error("<{prim}>: layer '{asset}' of reference {reference} is not loaded")]
    LayerNotFound {
        prim: Path,
        asset: String,
        reference: Reference,
    },
    #[error("<{prim}>: reference {reference} forms a cycle")]
    ArcCycle { prim: Path, reference: Reference },
}

impl CompositionError {
    /// The prim whose composition reported the error.
    pub fn prim(&self) -> &Path {
        match self {
            CompositionError::UnresolvedDefaultPrim { prim, .. }
            | CompositionError::TargetNotFound { prim, .. }
            | CompositionError::LayerNotFound { prim, .. }
            | CompositionError::ArcCycle { prim, .. } => prim,
        }
    }

    /// The arc that was skipped.
    pub fn reference(&self) -> &Reference {
        match self {
            CompositionError::UnresolvedDefaultPrim { reference, .. }
            | CompositionError::TargetNotFound { reference, .. }
            | CompositionError::LayerNotFound { reference, .. }
            | CompositionError::ArcCycle { reference, .. } => reference,
        }
    }
}
