use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path as FsPath, PathBuf};

use anyhow::{bail, Context, Result};

use super::Layer;
use crate::usda::TextReader;

/// Owns every layer a stage can compose, keyed by identifier.
///
/// File-backed layers are identified by their canonical file path, anonymous
/// layers by `anon:<n>:<tag>`. Asset paths written in references are resolved
/// against the referencing layer's directory first, then the configured
/// search paths.
#[derive(Debug, Default)]
pub struct LayerStore {
    layers: HashMap<String, Layer>,
    /// Generation at which each layer was (re)inserted.
    stamps: HashMap<String, u64>,
    search_paths: Vec<PathBuf>,
    next_anonymous: u64,
    generation: u64,
}

impl LayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_paths(search_paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            search_paths: search_paths.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    /// Bumped whenever a layer is added to or removed from the store.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Create an empty anonymous layer and return its identifier.
    pub fn create_anonymous(&mut self, tag: &str) -> String {
        let identifier = format!("anon:{}:{}", self.next_anonymous, tag);
        self.next_anonymous += 1;
        self.insert(Layer::new(identifier.clone()));
        identifier
    }

    /// Add a layer, replacing any layer with the same identifier.
    pub fn insert(&mut self, layer: Layer) -> String {
        let identifier = layer.identifier().to_owned();
        if self.layers.insert(identifier.clone(), layer).is_some() {
            log::debug!("Replaced layer {identifier}");
        }
        self.generation += 1;
        self.stamps.insert(identifier.clone(), self.generation);
        identifier
    }

    pub fn remove(&mut self, identifier: &str) -> Option<Layer> {
        let removed = self.layers.remove(identifier);
        if removed.is_some() {
            self.stamps.remove(identifier);
            self.generation += 1;
        }
        removed
    }

    /// The generation at which the layer currently stored under `identifier` was inserted.
    pub fn layer_generation(&self, identifier: &str) -> Option<u64> {
        self.stamps.get(identifier).copied()
    }

    pub fn find(&self, identifier: &str) -> Option<&Layer> {
        self.layers.get(identifier)
    }

    pub fn find_mut(&mut self, identifier: &str) -> Option<&mut Layer> {
        self.layers.get_mut(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.layers.contains_key(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Open a usda layer from disk, or return the already loaded one.
    pub fn open(&mut self, path: impl AsRef<FsPath>) -> Result<String> {
        let path = path.as_ref();
        let canonical = path
            .canonicalize()
            .with_context(|| format!("Failed to canonicalize path: {}", path.display()))?;
        let identifier = canonical.display().to_string();

        if self.layers.contains_key(&identifier) {
            return Ok(identifier);
        }

        let layer = TextReader::read(&canonical)
            .with_context(|| format!("Failed to read layer: {}", canonical.display()))?
            .into_layer();
        Ok(self.insert(layer))
    }

    /// Open a layer and every layer reachable through its references.
    ///
    /// Referenced layers that fail to resolve or parse are skipped with a
    /// warning; composition reports them later as missing layers.
    pub fn open_with_dependencies(&mut self, path: impl AsRef<FsPath>) -> Result<String> {
        let root = self.open(path)?;

        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([root.clone()]);

        while let Some(identifier) = queue.pop_front() {
            if !visited.insert(identifier.clone()) {
                continue;
            }

            let Some(layer) = self.find(&identifier) else {
                continue;
            };

            let mut assets: Vec<String> = layer
                .prims()
                .flat_map(|(_, spec)| spec.references.items())
                .filter(|r| !r.is_internal())
                .map(|r| r.asset_path().to_owned())
                .collect();
            assets.sort();
            assets.dedup();

            for asset in assets {
                let resolved = self.resolve_identifier(&asset, Some(&identifier));
                if self.contains(&resolved) {
                    queue.push_back(resolved);
                    continue;
                }
                match self.open(&resolved) {
                    Ok(opened) => queue.push_back(opened),
                    Err(err) => log::warn!("Skipping unresolvable reference @{asset}@ in {identifier}: {err:#}"),
                }
            }
        }

        Ok(root)
    }

    /// Resolve an asset path written in `anchor` to a layer identifier.
    ///
    /// Identifiers of loaded layers resolve to themselves. Relative file
    /// paths are tried against the anchor layer's directory and then each
    /// search path. Unresolvable paths come back unchanged.
    pub fn resolve_identifier(&self, asset_path: &str, anchor: Option<&str>) -> String {
        let clean = asset_path.trim_matches('@').trim();
        if self.layers.contains_key(clean) {
            return clean.to_owned();
        }

        let candidate = PathBuf::from(clean);
        let mut candidates = Vec::new();
        if candidate.is_absolute() {
            candidates.push(candidate);
        } else {
            if let Some(dir) = anchor
                .and_then(|id| self.find(id))
                .and_then(Layer::real_path)
                .and_then(FsPath::parent)
            {
                candidates.push(dir.join(clean));
            }
            candidates.extend(self.search_paths.iter().map(|dir| dir.join(clean)));
        }

        candidates
            .into_iter()
            .find_map(|path| path.canonicalize().ok())
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| clean.to_owned())
    }

    /// Write a file-backed layer back to disk.
    pub fn save(&self, identifier: &str) -> Result<()> {
        let Some(layer) = self.find(identifier) else {
            bail!("No layer named {identifier}");
        };
        let Some(path) = layer.real_path() else {
            bail!("Layer {identifier} has no file to save to");
        };
        layer.export(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn create_temp_dir() -> PathBuf {
        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!("usdref_store_test_{}_{}", std::process::id(), counter));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("Failed to create temp dir");
        dir
    }

    #[test]
    fn anonymous_layers_are_unique() {
        let mut store = LayerStore::new();
        let a = store.create_anonymous("a.usda");
        let b = store.create_anonymous("a.usda");
        assert_ne!(a, b);
        assert!(store.find(&a).unwrap().is_anonymous());
        assert_eq!(store.len(), 2);
        assert_eq!(store.resolve_identifier(&a, None), a);
    }

    #[test]
    fn generation_tracks_membership() {
        let mut store = LayerStore::new();
        let start = store.generation();
        let id = store.create_anonymous("x");
        assert_eq!(store.generation(), start + 1);
        store.find_mut(&id).unwrap().set_default_prim("x");
        assert_eq!(store.generation(), start + 1);
        assert_eq!(store.layer_generation(&id), Some(start + 1));
        assert!(store.remove(&id).is_some());
        assert_eq!(store.generation(), start + 2);
        assert_eq!(store.layer_generation(&id), None);
    }

    #[test]
    fn open_resolves_relative_references() {
        let dir = create_temp_dir();
        fs::write(
            dir.join("leaf.usda"),
            "#usda 1.0\n(\n    defaultPrim = \"Leaf\"\n)\n\ndef \"Leaf\" {\n    double attr = 1\n}\n",
        )
        .unwrap();
        fs::write(
            dir.join("root.usda"),
            "#usda 1.0\n\ndef \"Root\" (\n    references = @./leaf.usda@\n) {\n}\n",
        )
        .unwrap();

        let mut store = LayerStore::new();
        let root = store.open_with_dependencies(dir.join("root.usda")).unwrap();
        let leaf = store.resolve_identifier("./leaf.usda", Some(&root));

        assert_eq!(store.len(), 2);
        assert!(store.contains(&leaf));
        assert_eq!(store.open(dir.join("leaf.usda")).unwrap(), leaf);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn search_paths_are_consulted() {
        let dir = create_temp_dir();
        fs::write(dir.join("lib.usda"), "#usda 1.0\n").unwrap();

        let store = LayerStore::with_search_paths([dir.clone()]);
        let resolved = store.resolve_identifier("lib.usda", None);
        assert_eq!(resolved, dir.join("lib.usda").canonicalize().unwrap().display().to_string());
        assert_eq!(store.resolve_identifier("missing.usda", None), "missing.usda");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn added_search_path_finds_library() {
        let shots = create_temp_dir();
        let library = create_temp_dir();
        fs::write(library.join("lib.usda"), "#usda 1.0\n").unwrap();
        fs::write(
            shots.join("shot.usda"),
            "#usda 1.0\n\ndef \"Shot\" (\n    references = @lib.usda@\n) {\n}\n",
        )
        .unwrap();

        let mut store = LayerStore::new();
        store.open_with_dependencies(shots.join("shot.usda")).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.resolve_identifier("lib.usda", None), "lib.usda");

        store.add_search_path(&library);
        assert_eq!(store.search_paths(), [library.clone()]);
        let root = store.open_with_dependencies(shots.join("shot.usda")).unwrap();
        let lib = store.resolve_identifier("lib.usda", Some(&root));
        assert_eq!(lib, library.join("lib.usda").canonicalize().unwrap().display().to_string());
        assert_eq!(store.len(), 2);
        assert!(store.contains(&lib));

        let _ = fs::remove_dir_all(&shots);
        let _ = fs::remove_dir_all(&library);
    }
}
