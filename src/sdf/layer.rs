use std::collections::{BTreeMap, HashMap};
use std::path::{Path as FsPath, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::spec::is_valid_property_name;
use super::{AttributeSpec, ListOp, Path, PathError, PrimSpec, Reference, Specifier, Value};

/// Errors produced by layer edits.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayerError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("No prim spec at <{0}>")]
    PrimNotFound(Path),
    #[error("Invalid property name '{0}'")]
    InvalidPropertyName(String),
}

/// One entry of a layer's change journal.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerChange {
    DefaultPrim,
    Metadata(String),
    /// A prim spec was created, removed or had its specifier/type changed.
    PrimSpec(Path),
    Property { prim: Path, name: String },
    References(Path),
}

impl LayerChange {
    /// The prim path the change touched, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            LayerChange::DefaultPrim | LayerChange::Metadata(_) => None,
            LayerChange::PrimSpec(path) | LayerChange::References(path) => Some(path),
            LayerChange::Property { prim, .. } => Some(prim),
        }
    }
}

/// An in-memory layer: prim specs keyed by absolute path plus layer metadata.
///
/// All edits go through methods on the layer so they are recorded in the
/// change journal. A layer's revision counts every change ever recorded;
/// the journal only retains the entries after the last
/// [`compact_journal`](Layer::compact_journal) point.
#[derive(Debug, Clone)]
pub struct Layer {
    identifier: String,
    real_path: Option<PathBuf>,
    default_prim: Option<String>,
    metadata: BTreeMap<String, Value>,
    prims: HashMap<Path, PrimSpec>,
    root_prims: Vec<String>,
    journal: Vec<LayerChange>,
    /// Revision of the first retained journal entry.
    journal_base: u64,
}

impl Layer {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            real_path: None,
            default_prim: None,
            metadata: BTreeMap::new(),
            prims: HashMap::new(),
            root_prims: Vec::new(),
            journal: Vec::new(),
            journal_base: 0,
        }
    }

    /// Assemble a layer from parsed content. Nothing is journaled.
    pub(crate) fn from_parts(
        identifier: impl Into<String>,
        default_prim: Option<String>,
        metadata: BTreeMap<String, Value>,
        prims: HashMap<Path, PrimSpec>,
        root_prims: Vec<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            real_path: None,
            default_prim,
            metadata,
            prims,
            root_prims,
            journal: Vec::new(),
            journal_base: 0,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_anonymous(&self) -> bool {
        self.identifier.starts_with("anon:")
    }

    pub fn real_path(&self) -> Option<&FsPath> {
        self.real_path.as_deref()
    }

    pub(crate) fn set_real_path(&mut self, path: PathBuf) {
        self.real_path = Some(path);
    }

    pub fn default_prim(&self) -> Option<&str> {
        self.default_prim.as_deref()
    }

    pub fn has_default_prim(&self) -> bool {
        self.default_prim.is_some()
    }

    pub fn set_default_prim(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.default_prim.as_deref() != Some(name.as_str()) {
            self.default_prim = Some(name);
            self.record(LayerChange::DefaultPrim);
        }
    }

    pub fn clear_default_prim(&mut self) {
        if self.default_prim.take().is_some() {
            self.record(LayerChange::DefaultPrim);
        }
    }

    /// Layer metadata other than the default prim (`doc`, `upAxis`, ...).
    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.metadata.insert(key.clone(), value);
        self.record(LayerChange::Metadata(key));
    }

    /// Root prim names in authored order.
    pub fn root_prims(&self) -> &[String] {
        &self.root_prims
    }

    pub fn prim(&self, path: &Path) -> Option<&PrimSpec> {
        self.prims.get(path)
    }

    pub fn has_prim(&self, path: &Path) -> bool {
        self.prims.contains_key(path)
    }

    pub fn prims(&self) -> impl Iterator<Item = (&Path, &PrimSpec)> {
        self.prims.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }

    /// Create (or respecify) the prim at `path`.
    ///
    /// Missing ancestors are created as `over`s. An existing prim keeps its
    /// opinions and takes the new specifier.
    pub fn create_prim(&mut self, path: &Path, specifier: Specifier) -> Result<(), LayerError> {
        if let Some(spec) = self.prims.get_mut(path) {
            if spec.specifier != specifier {
                spec.specifier = specifier;
                self.record(LayerChange::PrimSpec(path.clone()));
            }
            return Ok(());
        }
        self.insert_new_prim(path, specifier)
    }

    /// Make sure a prim spec exists at `path`, creating an `over` if needed.
    pub fn ensure_prim(&mut self, path: &Path) -> Result<(), LayerError> {
        if self.prims.contains_key(path) {
            return Ok(());
        }
        self.insert_new_prim(path, Specifier::Over)
    }

    fn insert_new_prim(&mut self, path: &Path, specifier: Specifier) -> Result<(), LayerError> {
        if !path.is_prim_path() {
            return Err(PathError::NotAbsolutePrimPath(path.to_string()).into());
        }

        let parent = path.parent().unwrap_or_else(Path::abs_root);
        if parent.is_absolute_root() {
            self.root_prims.push(path.name().to_owned());
        } else {
            self.ensure_prim(&parent)?;
            if let Some(parent_spec) = self.prims.get_mut(&parent) {
                parent_spec.children.push(path.name().to_owned());
            }
        }

        self.prims.insert(path.clone(), PrimSpec::new(specifier));
        self.record(LayerChange::PrimSpec(path.clone()));
        Ok(())
    }

    /// Remove the prim at `path` and everything beneath it.
    pub fn remove_prim(&mut self, path: &Path) -> bool {
        if self.prims.remove(path).is_none() {
            return false;
        }
        self.prims.retain(|p, _| !p.has_prefix(path));

        let name = path.name();
        match path.parent() {
            Some(parent) if parent.is_absolute_root() => self.root_prims.retain(|n| n != name),
            Some(parent) => {
                if let Some(spec) = self.prims.get_mut(&parent) {
                    spec.children.retain(|n| n != name);
                }
            }
            None => {}
        }

        self.record(LayerChange::PrimSpec(path.clone()));
        true
    }

    pub fn set_type_name(&mut self, path: &Path, type_name: Option<String>) -> Result<(), LayerError> {
        let spec = self
            .prims
            .get_mut(path)
            .ok_or_else(|| LayerError::PrimNotFound(path.clone()))?;
        spec.type_name = type_name;
        self.record(LayerChange::PrimSpec(path.clone()));
        Ok(())
    }

    /// Declare an attribute on an existing prim (keeping any authored values).
    pub fn create_attribute(&mut self, prim: &Path, name: &str, type_name: &str) -> Result<(), LayerError> {
        self.edit_attribute(prim, name, type_name, |attr| {
            attr.type_name = type_name.to_owned();
        })
    }

    /// Author the default value of an attribute, declaring it if needed.
    pub fn set_attribute_default(
        &mut self,
        prim: &Path,
        name: &str,
        type_name: &str,
        value: Value,
    ) -> Result<(), LayerError> {
        self.edit_attribute(prim, name, type_name, |attr| attr.default = Some(value))
    }

    /// Remove the default value of an attribute, leaving its declaration.
    pub fn clear_attribute_default(&mut self, prim: &Path, name: &str) -> Result<(), LayerError> {
        let spec = self
            .prims
            .get_mut(prim)
            .ok_or_else(|| LayerError::PrimNotFound(prim.clone()))?;
        if let Some(attr) = spec.attributes.get_mut(name) {
            if attr.default.take().is_some() {
                self.record(LayerChange::Property {
                    prim: prim.clone(),
                    name: name.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Author a time sample, declaring the attribute if needed.
    pub fn set_time_sample(
        &mut self,
        prim: &Path,
        name: &str,
        type_name: &str,
        time: f64,
        value: Value,
    ) -> Result<(), LayerError> {
        self.edit_attribute(prim, name, type_name, |attr| attr.set_time_sample(time, value))
    }

    pub fn remove_attribute(&mut self, prim: &Path, name: &str) -> bool {
        let removed = self
            .prims
            .get_mut(prim)
            .and_then(|spec| spec.attributes.remove(name))
            .is_some();
        if removed {
            self.record(LayerChange::Property {
                prim: prim.clone(),
                name: name.to_owned(),
            });
        }
        removed
    }

    fn edit_attribute(
        &mut self,
        prim: &Path,
        name: &str,
        type_name: &str,
        edit: impl FnOnce(&mut AttributeSpec),
    ) -> Result<(), LayerError> {
        if !is_valid_property_name(name) {
            return Err(LayerError::InvalidPropertyName(name.to_owned()));
        }
        let spec = self
            .prims
            .get_mut(prim)
            .ok_or_else(|| LayerError::PrimNotFound(prim.clone()))?;
        let attr = spec
            .attributes
            .entry(name.to_owned())
            .or_insert_with(|| AttributeSpec::new(type_name));
        edit(attr);
        self.record(LayerChange::Property {
            prim: prim.clone(),
            name: name.to_owned(),
        });
        Ok(())
    }

    /// Edit the reference list op of the prim at `path`, creating an `over` if needed.
    pub fn edit_references<R>(
        &mut self,
        path: &Path,
        edit: impl FnOnce(&mut ListOp<Reference>) -> R,
    ) -> Result<R, LayerError> {
        self.ensure_prim(path)?;
        let spec = self
            .prims
            .get_mut(path)
            .ok_or_else(|| LayerError::PrimNotFound(path.clone()))?;

        let before = spec.references.clone();
        let out = edit(&mut spec.references);
        if spec.references != before {
            self.record(LayerChange::References(path.clone()));
        }
        Ok(out)
    }

    /// Number of changes recorded so far, including compacted ones.
    pub fn revision(&self) -> u64 {
        self.journal_base + self.journal.len() as u64
    }

    /// Changes recorded after `revision`.
    ///
    /// A revision older than the last compaction point yields every
    /// retained entry.
    pub fn changes_since(&self, revision: u64) -> &[LayerChange] {
        let offset = revision.saturating_sub(self.journal_base);
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.journal.len());
        &self.journal[start..]
    }

    /// Drop journal entries up to `revision`. No reader may still need them.
    pub fn compact_journal(&mut self, revision: u64) {
        let drop = usize::try_from(revision.saturating_sub(self.journal_base))
            .unwrap_or(usize::MAX)
            .min(self.journal.len());
        if drop > 0 {
            self.journal.drain(..drop);
            self.journal_base += drop as u64;
        }
    }

    /// Number of journal entries currently retained.
    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    fn record(&mut self, change: LayerChange) {
        log::trace!("{}: {:?}", self.identifier, change);
        self.journal.push(change);
    }

    /// Serialize the layer to usda text.
    pub fn export_to_string(&self) -> String {
        crate::usda::write_layer(self)
    }

    /// Write the layer as usda text to `path`.
    pub fn export(&self, path: impl AsRef<FsPath>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.export_to_string())
            .with_context(|| format!("Failed to write layer {} to {}", self.identifier, path.display()))
    }
}
