//! Reference composition.
//!
//! A prim's opinions come from, strongest first:
//! - **local** specs in the stage's layer stack (session, then root layer);
//! - **references** authored on the prim, in effective list-op order, each
//!   expanded depth-first through the references found at its target;
//! - **ancestral** sites: the parent's referenced sites with the prim's name
//!   appended.
//!
//! Per attribute the strongest opinion wins; weaker sites never overwrite
//! it. Problems with individual arcs are reported as [`CompositionError`]s
//! and the arc is skipped.

mod composer;
mod dependencies;
mod editor;
mod error;
mod resolver;

pub use composer::{ArcComposer, ArcNode, ComposedPrim, PrimSite, PropertyOverlay, ResolvedAttribute};
pub use dependencies::{Dependency, DependencyRegistry};
pub use editor::{ReferenceEditError, ReferenceListEditor};
pub use error::CompositionError;
pub use resolver::DefaultPrimResolver;
