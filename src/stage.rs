//! Composed view of a layer stack.
//!
//! A [`Stage`] owns a [`LayerStore`] and composes prims lazily.
//!
//! [`Stage::process_changes`] pulls the change journals of the layers that
//! cached prims depend on and marks affected prims (and their descendants)
//! uncomposed, firing the invalidation callbacks. Stage authoring methods
//! run it before returning, as does every read; composition itself waits
//! for the next read.

use std::collections::HashMap;

use anyhow::{bail, ensure, Context, Result};

use crate::composition::{
    ArcComposer, ComposedPrim, CompositionError, Dependency, DependencyRegistry, ReferenceEditError,
    ReferenceListEditor, ResolvedAttribute,
};
use crate::sdf::{
    Layer, LayerError, LayerOffset, LayerStore, ListOp, ListPosition, Path, Reference, Specifier, Value,
};

/// Composition state of a prim in the stage cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimState {
    Uncomposed,
    Composing,
    Composed,
}

struct CacheEntry {
    state: PrimState,
    composed: Option<ComposedPrim>,
}

type InvalidationCallback = Box<dyn FnMut(&Path)>;

pub struct Stage {
    store: LayerStore,
    root_layer: String,
    session_layer: Option<String>,
    /// Strongest first.
    layer_stack: Vec<String>,
    edit_target: String,
    cache: HashMap<Path, CacheEntry>,
    registry: DependencyRegistry,
    /// Journal revision each tracked layer has been synced to.
    cursors: HashMap<String, u64>,
    seen_generation: u64,
    callbacks: Vec<InvalidationCallback>,
}

impl Stage {
    /// Open a stage on `root_layer`: the identifier of a loaded layer, or a
    /// usda file path which is loaded along with the layers it references.
    pub fn open(mut store: LayerStore, root_layer: &str) -> Result<Self> {
        let root = Self::load(&mut store, root_layer)?;
        Ok(Self::new(store, root, None))
    }

    /// Like [`Stage::open`], with a session layer stronger than the root layer.
    pub fn open_with_session_layer(mut store: LayerStore, root_layer: &str, session_layer: &str) -> Result<Self> {
        let root = Self::load(&mut store, root_layer)?;
        let session = Self::load(&mut store, session_layer)?;
        ensure!(root != session, "Session layer must differ from the root layer");
        Ok(Self::new(store, root, Some(session)))
    }

    /// A stage on a new anonymous root layer.
    pub fn create_in_memory(mut store: LayerStore, tag: &str) -> Self {
        let root = store.create_anonymous(tag);
        Self::new(store, root, None)
    }

    fn load(store: &mut LayerStore, identifier: &str) -> Result<String> {
        if store.contains(identifier) {
            return Ok(identifier.to_owned());
        }
        store
            .open_with_dependencies(identifier)
            .with_context(|| format!("Failed to open stage layer {identifier}"))
    }

    fn new(store: LayerStore, root_layer: String, session_layer: Option<String>) -> Self {
        let layer_stack = session_layer
            .iter()
            .cloned()
            .chain(std::iter::once(root_layer.clone()))
            .collect();
        let seen_generation = store.generation();
        log::debug!("Opened stage on {root_layer}");

        Self {
            store,
            edit_target: root_layer.clone(),
            root_layer,
            session_layer,
            layer_stack,
            cache: HashMap::new(),
            registry: DependencyRegistry::new(),
            cursors: HashMap::new(),
            seen_generation,
            callbacks: Vec::new(),
        }
    }

    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    /// Mutable access to every layer.
    ///
    /// Invalidation for edits made here happens on the next read or
    /// [`Stage::process_changes`] call. [`Stage::edit_store`] does both at once.
    pub fn store_mut(&mut self) -> &mut LayerStore {
        &mut self.store
    }

    /// Run `edit` on the layer store, then process the resulting changes.
    pub fn edit_store<R>(&mut self, edit: impl FnOnce(&mut LayerStore) -> R) -> R {
        let out = edit(&mut self.store);
        self.process_changes();
        out
    }

    pub fn into_store(self) -> LayerStore {
        self.store
    }

    pub fn root_layer(&self) -> &str {
        &self.root_layer
    }

    pub fn session_layer(&self) -> Option<&str> {
        self.session_layer.as_deref()
    }

    /// Stage layers, strongest first.
    pub fn layer_stack(&self) -> &[String] {
        &self.layer_stack
    }

    pub fn layer(&self, identifier: &str) -> Option<&Layer> {
        self.store.find(identifier)
    }

    /// Mutable access to one layer. See [`Stage::store_mut`] for invalidation.
    pub fn layer_mut(&mut self, identifier: &str) -> Option<&mut Layer> {
        self.store.find_mut(identifier)
    }

    /// Run `edit` on a loaded layer, then process the resulting changes.
    pub fn edit_layer<R>(&mut self, identifier: &str, edit: impl FnOnce(&mut Layer) -> R) -> Option<R> {
        let out = self.store.find_mut(identifier).map(edit);
        self.process_changes();
        out
    }

    pub fn edit_target(&self) -> &str {
        &self.edit_target
    }

    /// Direct authoring at one of the stage's own layers.
    pub fn set_edit_target(&mut self, identifier: &str) -> Result<()> {
        ensure!(
            self.layer_stack.iter().any(|id| id == identifier),
            "Edit target {identifier} is not in the stage layer stack"
        );
        self.edit_target = identifier.to_owned();
        Ok(())
    }

    /// Apply `edit` to the edit target, then process the resulting changes
    /// whether or not the edit succeeded.
    fn author<R>(&mut self, edit: impl FnOnce(&mut Layer) -> Result<R, LayerError>) -> Result<R> {
        let layer = self
            .store
            .find_mut(&self.edit_target)
            .with_context(|| format!("Edit target {} is not loaded", self.edit_target))?;
        let out = edit(layer);
        self.process_changes();
        Ok(out?)
    }

    /// Author a `def` for `path` in the edit target, optionally typed.
    pub fn define_prim(&mut self, path: &Path, type_name: Option<&str>) -> Result<()> {
        self.author(|layer| {
            layer.create_prim(path, Specifier::Def)?;
            if let Some(type_name) = type_name {
                layer.set_type_name(path, Some(type_name.to_owned()))?;
            }
            Ok(())
        })
    }

    /// Make sure the edit target has a spec for `path`, authoring an `over` if needed.
    pub fn override_prim(&mut self, path: &Path) -> Result<()> {
        self.author(|layer| layer.ensure_prim(path))
    }

    /// Remove the edit target's spec for `path` and its descendants.
    pub fn remove_prim(&mut self, path: &Path) -> Result<bool> {
        self.author(|layer| Ok(layer.remove_prim(path)))
    }

    /// Author a default value in the edit target.
    ///
    /// The attribute keeps its composed type if it has one.
    pub fn set_attribute(&mut self, path: &Path, name: &str, value: Value) -> Result<()> {
        let type_name = self.attribute_type(path, name, &value);
        self.author(|layer| {
            layer.ensure_prim(path)?;
            layer.set_attribute_default(path, name, &type_name, value)
        })
    }

    /// Author a time sample in the edit target.
    pub fn set_time_sample(&mut self, path: &Path, name: &str, time: f64, value: Value) -> Result<()> {
        let type_name = self.attribute_type(path, name, &value);
        self.author(|layer| {
            layer.ensure_prim(path)?;
            layer.set_time_sample(path, name, &type_name, time, value)
        })
    }

    /// Remove the edit target's opinions for an attribute. Weaker opinions show through.
    pub fn clear_attribute(&mut self, path: &Path, name: &str) -> Result<bool> {
        self.author(|layer| Ok(layer.remove_attribute(path, name)))
    }

    fn attribute_type(&mut self, path: &Path, name: &str, value: &Value) -> String {
        self.attribute(path, name)
            .map(|attr| attr.type_name().to_owned())
            .unwrap_or_else(|| value.default_type_name().to_owned())
    }

    /// Edit the references of `path` in the edit target.
    pub fn references(&mut self, path: &Path) -> Result<StageReferences<'_>> {
        if !path.is_prim_path() {
            bail!("Cannot edit references of <{path}>");
        }
        ensure!(
            self.store.contains(&self.edit_target),
            "Edit target {} is not loaded",
            self.edit_target
        );
        Ok(StageReferences {
            stage: self,
            path: path.clone(),
        })
    }

    /// Register a callback invoked with each composed prim that becomes uncomposed.
    pub fn on_invalidate(&mut self, callback: impl FnMut(&Path) + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    /// The composed prim at `path`, if it and all its ancestors exist.
    pub fn prim(&mut self, path: &Path) -> Option<&ComposedPrim> {
        self.process_changes();
        if !self.is_present(path) {
            return None;
        }
        self.cache.get(path).and_then(|entry| entry.composed.as_ref())
    }

    pub fn has_prim(&mut self, path: &Path) -> bool {
        self.prim(path).is_some()
    }

    /// Current composition state of `path`, after pending layer changes are applied.
    pub fn prim_state(&mut self, path: &Path) -> PrimState {
        self.process_changes();
        self.cache
            .get(path)
            .map(|entry| entry.state)
            .unwrap_or(PrimState::Uncomposed)
    }

    /// The resolved attribute, or `None` when no site declares it.
    pub fn attribute(&mut self, path: &Path, name: &str) -> Option<ResolvedAttribute> {
        self.prim(path)?.attribute(name).cloned()
    }

    /// Attribute value at the default time.
    pub fn attribute_value(&mut self, path: &Path, name: &str) -> Option<Value> {
        self.prim(path)?.attribute(name)?.value()
    }

    /// Attribute value at stage `time`.
    pub fn attribute_value_at(&mut self, path: &Path, name: &str, time: f64) -> Option<Value> {
        self.prim(path)?.attribute(name)?.value_at(time)
    }

    /// Errors from the latest composition of `path`.
    pub fn composition_errors(&mut self, path: &Path) -> Vec<CompositionError> {
        self.process_changes();
        if !path.is_prim_path() {
            return Vec::new();
        }
        self.ensure_composed(path);
        self.cache
            .get(path)
            .and_then(|entry| entry.composed.as_ref())
            .map(|prim| prim.errors().to_vec())
            .unwrap_or_default()
    }

    /// Root prims authored in the stage layer stack, strongest layer's order first.
    pub fn root_prims(&mut self) -> Vec<Path> {
        let mut names: Vec<String> = Vec::new();
        for id in &self.layer_stack {
            let Some(layer) = self.store.find(id) else {
                continue;
            };
            for name in layer.root_prims() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }

        let root = Path::abs_root();
        names
            .iter()
            .filter_map(|name| root.append_child(name).ok())
            .filter(|path| self.has_prim(path))
            .collect()
    }

    /// Paths of the existing children of `path`.
    pub fn children(&mut self, path: &Path) -> Vec<Path> {
        let names = match self.prim(path) {
            Some(prim) => prim.children().to_vec(),
            None => return Vec::new(),
        };
        names
            .iter()
            .filter_map(|name| path.append_child(name).ok())
            .filter(|child| self.has_prim(child))
            .collect()
    }

    /// Every existing prim, depth-first in child order.
    pub fn traverse(&mut self) -> Vec<Path> {
        let mut out = Vec::new();
        let mut pending: Vec<Path> = self.root_prims().into_iter().rev().collect();
        while let Some(path) = pending.pop() {
            let children = self.children(&path);
            out.push(path);
            pending.extend(children.into_iter().rev());
        }
        out
    }

    /// Composition errors of every existing prim.
    pub fn all_composition_errors(&mut self) -> Vec<CompositionError> {
        let prims = self.traverse();
        prims
            .iter()
            .flat_map(|path| self.composition_errors(path))
            .collect()
    }

    /// Mark every cached prim uncomposed.
    pub fn invalidate_all(&mut self) {
        let paths: Vec<Path> = self.cache.keys().filter(|p| p.is_root_prim()).cloned().collect();
        for path in paths {
            self.invalidate(&path);
        }
    }

    /// Compose `path` and its ancestors, then check each of them exists.
    fn is_present(&mut self, path: &Path) -> bool {
        if !path.is_prim_path() {
            return false;
        }
        self.ensure_composed(path);

        let mut current = Some(path.clone());
        while let Some(p) = current.filter(|p| !p.is_absolute_root()) {
            let exists = self
                .cache
                .get(&p)
                .and_then(|entry| entry.composed.as_ref())
                .is_some_and(ComposedPrim::exists);
            if !exists {
                return false;
            }
            current = p.parent();
        }
        true
    }

    fn ensure_composed(&mut self, path: &Path) {
        if matches!(self.cache.get(path), Some(entry) if entry.state == PrimState::Composed) {
            return;
        }

        let parent = path.parent().filter(|p| !p.is_absolute_root());
        if let Some(parent) = &parent {
            self.ensure_composed(parent);
        }

        self.cache.insert(
            path.clone(),
            CacheEntry {
                state: PrimState::Composing,
                composed: None,
            },
        );
        log::trace!("Composing <{path}>");

        let composed = {
            let composer = ArcComposer::new(&self.store, &self.layer_stack);
            let parent_prim = parent
                .as_ref()
                .and_then(|p| self.cache.get(p))
                .and_then(|entry| entry.composed.as_ref());
            composer.compose(path, parent_prim)
        };

        for (layer, dependency) in composed.dependencies() {
            self.registry.add(layer, path, dependency.clone());
            if !self.cursors.contains_key(layer) {
                let revision = match self.store.find_mut(layer) {
                    Some(tracked) => {
                        let revision = tracked.revision();
                        tracked.compact_journal(revision);
                        revision
                    }
                    None => 0,
                };
                self.cursors.insert(layer.clone(), revision);
            }
        }

        self.cache.insert(
            path.clone(),
            CacheEntry {
                state: PrimState::Composed,
                composed: Some(composed),
            },
        );
    }

    /// Pull layer changes, mark dependent prims uncomposed and fire the
    /// invalidation callbacks.
    ///
    /// Journals of tracked layers are compacted up to the synced revision.
    pub fn process_changes(&mut self) {
        let mut stale: Vec<Path> = Vec::new();

        let generation = self.store.generation();
        if generation != self.seen_generation {
            let tracked: Vec<String> = self.cursors.keys().cloned().collect();
            for id in tracked {
                if matches!(self.store.layer_generation(&id), Some(stamp) if stamp <= self.seen_generation) {
                    continue;
                }
                log::debug!("Layer {id} was replaced or removed");
                stale.extend(self.registry.dependents(&id));
                match self.store.find(&id) {
                    Some(layer) => {
                        self.cursors.insert(id, layer.revision());
                    }
                    None => {
                        self.cursors.remove(&id);
                    }
                }
            }

            // Any newly loaded layer may be one an arc could not find.
            for id in self.registry.missing_layers() {
                stale.extend(self.registry.dependents(&id).into_iter().filter(|dependent| {
                    self.registry
                        .dependencies(&id, dependent)
                        .is_some_and(|deps| deps.contains(&Dependency::Missing))
                }));
            }
            self.seen_generation = generation;
        }

        for (id, cursor) in self.cursors.iter_mut() {
            let Some(layer) = self.store.find_mut(id) else {
                continue;
            };
            for change in layer.changes_since(*cursor) {
                stale.extend(self.registry.affected_by(id, change));
            }
            *cursor = layer.revision();
            layer.compact_journal(*cursor);
        }

        stale.sort();
        stale.dedup();
        for path in stale {
            self.invalidate(&path);
        }
    }

    /// Mark `path` and its cached descendants uncomposed.
    fn invalidate(&mut self, path: &Path) {
        let affected: Vec<Path> = self.cache.keys().filter(|p| p.has_prefix(path)).cloned().collect();
        for prim in affected {
            let Some(entry) = self.cache.get_mut(&prim) else {
                continue;
            };
            let was_composed = entry.state == PrimState::Composed;
            entry.state = PrimState::Uncomposed;
            entry.composed = None;
            self.registry.remove_dependent(&prim);

            if was_composed {
                log::trace!("Invalidated <{prim}>");
                for callback in &mut self.callbacks {
                    callback(&prim);
                }
            }
        }
    }
}

/// Reference list edits on one prim of a stage's edit target.
///
/// Each edit processes the stage's changes before returning, so
/// invalidation callbacks have fired by the time it returns.
pub struct StageReferences<'s> {
    stage: &'s mut Stage,
    path: Path,
}

impl StageReferences<'_> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The list op authored at this prim in the edit target, if any.
    pub fn list_op(&self) -> Option<&ListOp<Reference>> {
        self.stage
            .store
            .find(&self.stage.edit_target)?
            .prim(&self.path)
            .map(|spec| &spec.references)
    }

    pub fn add(&mut self, reference: Reference, position: ListPosition) -> Result<(), ReferenceEditError> {
        self.edit(|editor| editor.add(reference, position))
    }

    pub fn add_reference(
        &mut self,
        asset_path: &str,
        prim_path: Option<Path>,
        layer_offset: LayerOffset,
        position: ListPosition,
    ) -> Result<(), ReferenceEditError> {
        self.edit(|editor| editor.add_reference(asset_path, prim_path, layer_offset, position))
    }

    pub fn add_internal(
        &mut self,
        prim_path: Path,
        layer_offset: LayerOffset,
        position: ListPosition,
    ) -> Result<(), ReferenceEditError> {
        self.edit(|editor| editor.add_internal(prim_path, layer_offset, position))
    }

    pub fn remove(&mut self, reference: &Reference) -> Result<(), ReferenceEditError> {
        self.edit(|editor| editor.remove(reference))
    }

    pub fn set_references(&mut self, references: Vec<Reference>) -> Result<(), ReferenceEditError> {
        self.edit(|editor| editor.set_references(references))
    }

    pub fn clear(&mut self) -> Result<(), ReferenceEditError> {
        self.edit(|editor| editor.clear())
    }

    fn edit(
        &mut self,
        edit: impl FnOnce(&mut ReferenceListEditor<'_>) -> Result<(), ReferenceEditError>,
    ) -> Result<(), ReferenceEditError> {
        let target = self.stage.edit_target.clone();
        let layer = self
            .stage
            .store
            .find_mut(&target)
            .ok_or(ReferenceEditError::LayerNotLoaded(target))?;
        let out = edit(&mut ReferenceListEditor::new(layer, self.path.clone()));
        self.stage.process_changes();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::{path, LayerOffset, ListPosition, Reference};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn targets() -> (LayerStore, String) {
        let mut store = LayerStore::new();
        let targ = store.create_anonymous("targets.usda");
        let layer = store.find_mut(&targ).unwrap();
        for (name, value) in [("/target1", 1.234), ("/target2", 2.345)] {
            let prim = path(name).unwrap();
            layer.create_prim(&prim, Specifier::Def).unwrap();
            layer.set_attribute_default(&prim, "attr", "double", Value::Double(value)).unwrap();
        }
        layer.set_default_prim("target1");
        (store, targ)
    }

    #[test]
    fn state_machine_follows_edits() {
        let (store, targ) = targets();
        let mut stage = Stage::create_in_memory(store, "state.usda");
        let source = path("/source").unwrap();

        assert_eq!(stage.prim_state(&source), PrimState::Uncomposed);
        stage.override_prim(&source).unwrap();
        stage
            .references(&source)
            .unwrap()
            .add_reference(&targ, None, LayerOffset::default(), ListPosition::FRONT)
            .unwrap();

        assert_eq!(stage.attribute_value(&source, "attr"), Some(Value::Double(1.234)));
        assert_eq!(stage.prim_state(&source), PrimState::Composed);

        stage.layer_mut(&targ).unwrap().set_default_prim("target2");
        assert_eq!(stage.prim_state(&source), PrimState::Uncomposed);
        assert_eq!(stage.attribute_value(&source, "attr"), Some(Value::Double(2.345)));
        assert_eq!(stage.prim_state(&source), PrimState::Composed);
    }

    #[test]
    fn callbacks_fire_for_prim_and_descendants() {
        let (store, targ) = targets();
        let mut stage = Stage::create_in_memory(store, "callbacks.usda");
        let source = path("/source").unwrap();
        let child = path("/source/child").unwrap();
        stage.define_prim(&child, Some("Xform")).unwrap();
        stage
            .references(&source)
            .unwrap()
            .add_reference(&targ, None, LayerOffset::default(), ListPosition::FRONT)
            .unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        stage.on_invalidate(move |p| sink.borrow_mut().push(p.clone()));

        assert!(stage.has_prim(&child));
        assert_eq!(stage.prim(&child).unwrap().type_name(), Some("Xform"));
        assert!(seen.borrow().is_empty());

        stage.layer_mut(&targ).unwrap().clear_default_prim();
        assert_eq!(stage.prim_state(&child), PrimState::Uncomposed);

        let mut fired = seen.borrow().clone();
        fired.sort();
        assert_eq!(fired, vec![source.clone(), child.clone()]);

        assert!(stage.has_prim(&source));
        assert_eq!(stage.attribute(&source, "attr"), None);
        assert!(matches!(
            stage.composition_errors(&source).as_slice(),
            [CompositionError::UnresolvedDefaultPrim { .. }]
        ));
    }

    #[test]
    fn unrelated_edits_keep_cache() {
        let (store, targ) = targets();
        let mut stage = Stage::create_in_memory(store, "cache.usda");
        let source = path("/source").unwrap();
        stage
            .references(&source)
            .unwrap()
            .add_internal(path("/local").unwrap(), LayerOffset::default(), ListPosition::BACK)
            .unwrap();
        stage.define_prim(&path("/local").unwrap(), None).unwrap();
        stage
            .references(&source)
            .unwrap()
            .add_reference(&targ, Some(path("/target2").unwrap()), LayerOffset::default(), ListPosition::BACK)
            .unwrap();

        assert_eq!(stage.attribute_value(&source, "attr"), Some(Value::Double(2.345)));

        let layer = stage.layer_mut(&targ).unwrap();
        layer.set_attribute_default(&path("/target1").unwrap(), "attr", "double", Value::Double(0.0)).unwrap();
        assert_eq!(stage.prim_state(&source), PrimState::Composed);

        let layer = stage.layer_mut(&targ).unwrap();
        layer.set_attribute_default(&path("/target2").unwrap(), "attr", "double", Value::Double(3.0)).unwrap();
        assert_eq!(stage.prim_state(&source), PrimState::Uncomposed);
        assert_eq!(stage.attribute_value(&source, "attr"), Some(Value::Double(3.0)));
    }

    #[test]
    fn late_loaded_layer_resolves_missing_arc() {
        let mut stage = Stage::create_in_memory(LayerStore::new(), "late.usda");
        let source = path("/source").unwrap();
        stage
            .references(&source)
            .unwrap()
            .add(Reference::external("anon:late").unwrap(), ListPosition::FRONT)
            .unwrap();

        assert!(matches!(
            stage.composition_errors(&source).as_slice(),
            [CompositionError::LayerNotFound { .. }]
        ));

        let mut late = Layer::new("anon:late");
        let target = path("/Late").unwrap();
        late.create_prim(&target, Specifier::Def).unwrap();
        late.set_attribute_default(&target, "attr", "int", Value::Int(7)).unwrap();
        late.set_default_prim("Late");
        stage.store_mut().insert(late);

        assert_eq!(stage.attribute_value(&source, "attr"), Some(Value::Int(7)));
        assert!(stage.composition_errors(&source).is_empty());
    }

    #[test]
    fn session_layer_is_stronger() {
        let mut store = LayerStore::new();
        let root = store.create_anonymous("root.usda");
        let session = store.create_anonymous("session.usda");
        let mut stage = Stage::open_with_session_layer(store, &root, &session).unwrap();
        let prim = path("/World").unwrap();

        stage.define_prim(&prim, None).unwrap();
        stage.set_attribute(&prim, "size", Value::Double(1.0)).unwrap();
        stage.set_edit_target(&session).unwrap();
        stage.set_attribute(&prim, "size", Value::Double(2.0)).unwrap();

        assert_eq!(stage.layer_stack(), [session.clone(), root.clone()]);
        assert_eq!(stage.attribute_value(&prim, "size"), Some(Value::Double(2.0)));
        assert_eq!(stage.attribute(&prim, "size").unwrap().type_name(), "double");
        assert!(stage.set_edit_target("anon:elsewhere").is_err());
    }

    #[test]
    fn traverse_and_remove() {
        let mut stage = Stage::create_in_memory(LayerStore::new(), "traverse.usda");
        stage.define_prim(&path("/a/b").unwrap(), None).unwrap();
        stage.define_prim(&path("/a/c").unwrap(), None).unwrap();
        stage.define_prim(&path("/d").unwrap(), None).unwrap();

        let all: Vec<String> = stage.traverse().iter().map(ToString::to_string).collect();
        assert_eq!(all, ["/a", "/a/b", "/a/c", "/d"]);

        assert!(stage.remove_prim(&path("/a").unwrap()).unwrap());
        assert!(!stage.has_prim(&path("/a/b").unwrap()));
        assert_eq!(stage.traverse(), vec![path("/d").unwrap()]);
    }

    #[test]
    fn animated_values_through_offsets() {
        let (mut store, targ) = targets();
        let layer = store.find_mut(&targ).unwrap();
        let target = path("/target1").unwrap();
        layer.set_time_sample(&target, "attr", "double", 0.0, Value::Double(0.0)).unwrap();
        layer.set_time_sample(&target, "attr", "double", 1.0, Value::Double(1.0)).unwrap();

        let mut stage = Stage::create_in_memory(store, "anim.usda");
        let source = path("/source").unwrap();
        stage
            .references(&source)
            .unwrap()
            .add_reference(&targ, None, LayerOffset::new(10.0, 1.0), ListPosition::FRONT)
            .unwrap();

        assert_eq!(stage.attribute_value(&source, "attr"), Some(Value::Double(1.234)));
        assert_eq!(stage.attribute_value_at(&source, "attr", 10.5), Some(Value::Double(0.5)));
        assert_eq!(stage.attribute_value_at(&source, "attr", 0.0), Some(Value::Double(0.0)));
    }

    #[test]
    fn invalidate_all_resets_cache() {
        let (store, targ) = targets();
        let mut stage = Stage::create_in_memory(store, "reset.usda");
        let source = path("/source").unwrap();
        let child = path("/source/child").unwrap();
        let other = path("/other").unwrap();
        stage.define_prim(&child, None).unwrap();
        stage.define_prim(&other, None).unwrap();
        stage
            .references(&source)
            .unwrap()
            .add_reference(&targ, None, LayerOffset::default(), ListPosition::FRONT)
            .unwrap();
        assert_eq!(stage.traverse().len(), 3);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        stage.on_invalidate(move |p| sink.borrow_mut().push(p.clone()));

        stage.invalidate_all();
        let mut fired = seen.borrow().clone();
        fired.sort();
        assert_eq!(fired, vec![other.clone(), source.clone(), child.clone()]);
        assert_eq!(stage.prim_state(&child), PrimState::Uncomposed);

        // Nothing composed, nothing to report.
        stage.invalidate_all();
        assert_eq!(seen.borrow().len(), 3);
        assert_eq!(stage.attribute_value(&source, "attr"), Some(Value::Double(1.234)));
    }

    #[test]
    fn cleared_attribute_falls_back_to_reference() {
        let (store, targ) = targets();
        let mut stage = Stage::create_in_memory(store, "fallback.usda");
        let source = path("/source").unwrap();
        stage
            .references(&source)
            .unwrap()
            .add_reference(&targ, None, LayerOffset::default(), ListPosition::FRONT)
            .unwrap();
        stage.set_attribute(&source, "attr", Value::Double(5.0)).unwrap();
        assert_eq!(stage.attribute_value(&source, "attr"), Some(Value::Double(5.0)));

        assert!(stage.clear_attribute(&source, "attr").unwrap());
        assert_eq!(stage.prim_state(&source), PrimState::Uncomposed);
        assert_eq!(stage.attribute_value(&source, "attr"), Some(Value::Double(1.234)));
        assert!(!stage.clear_attribute(&source, "attr").unwrap());

        // Edits to the referenced layer reach the stage the same way.
        let target = path("/target1").unwrap();
        stage
            .edit_layer(&targ, |layer| layer.clear_attribute_default(&target, "attr"))
            .unwrap()
            .unwrap();
        assert_eq!(stage.prim_state(&source), PrimState::Uncomposed);
        assert_eq!(stage.attribute_value(&source, "attr"), None);
        assert!(stage.attribute(&source, "attr").is_some());

        stage.edit_layer(&targ, |layer| layer.remove_attribute(&target, "attr"));
        assert!(stage.attribute(&source, "attr").is_none());
    }

    #[test]
    fn tracked_journals_are_compacted() {
        let (store, targ) = targets();
        let mut stage = Stage::create_in_memory(store, "compact.usda");
        let source = path("/source").unwrap();
        stage
            .references(&source)
            .unwrap()
            .add_reference(&targ, None, LayerOffset::default(), ListPosition::FRONT)
            .unwrap();
        assert_eq!(stage.attribute_value(&source, "attr"), Some(Value::Double(1.234)));
        assert_eq!(stage.layer(&targ).unwrap().journal_len(), 0);

        let target = path("/target1").unwrap();
        for value in [1.0, 2.0, 3.0] {
            let layer = stage.layer_mut(&targ).unwrap();
            layer.set_attribute_default(&target, "attr", "double", Value::Double(value)).unwrap();
            assert_eq!(layer.journal_len(), 1);
            stage.process_changes();
            assert_eq!(stage.layer(&targ).unwrap().journal_len(), 0);
            assert_eq!(stage.attribute_value(&source, "attr"), Some(Value::Double(value)));
        }
        assert_eq!(stage.layer(stage.root_layer()).unwrap().journal_len(), 0);
    }

    #[test]
    fn into_store_keeps_edits() {
        let mut stage = Stage::create_in_memory(LayerStore::new(), "keep.usda");
        let prim = path("/World").unwrap();
        stage.set_attribute(&prim, "size", Value::Double(2.0)).unwrap();
        let root = stage.root_layer().to_owned();

        let store = stage.into_store();
        let spec = store.find(&root).unwrap().prim(&prim).unwrap();
        assert_eq!(spec.specifier, Specifier::Over);
        assert_eq!(spec.attribute("size").unwrap().default, Some(Value::Double(2.0)));

        let mut reopened = Stage::open(store, &root).unwrap();
        assert_eq!(reopened.attribute_value(&prim, "size"), Some(Value::Double(2.0)));
    }
}
