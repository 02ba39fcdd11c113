use std::collections::{BTreeMap, HashSet};

use crate::sdf::{LayerOffset, LayerStore, Path, PrimSpec, Reference, Specifier, Value};

use super::{CompositionError, DefaultPrimResolver, Dependency};

/// A layer stack at a path, seen through an accumulated time offset.
///
/// Layer stacks are listed strongest first; the last layer is the stack's
/// root layer, whose default prim serves path-less references.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcNode {
    pub stack: Vec<String>,
    pub path: Path,
    pub offset: LayerOffset,
    /// The stage's own layer stack at the composed prim's path.
    pub local: bool,
}

impl ArcNode {
    fn key(&self) -> (Vec<String>, Path) {
        (self.stack.clone(), self.path.clone())
    }
}

/// One prim spec contributing opinions to a composed prim.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimSite {
    pub layer: String,
    pub path: Path,
    pub offset: LayerOffset,
}

/// An attribute after first-writer-wins resolution across sites.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAttribute {
    type_name: String,
    custom: bool,
    default: Option<Value>,
    default_strength: usize,
    /// Samples in stage time, sorted.
    time_samples: Vec<(f64, Value)>,
    samples_strength: usize,
}

impl ResolvedAttribute {
    fn declared(type_name: &str, custom: bool) -> Self {
        Self {
            type_name: type_name.to_owned(),
            custom,
            default: None,
            default_strength: usize::MAX,
            time_samples: Vec::new(),
            samples_strength: usize::MAX,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_custom(&self) -> bool {
        self.custom
    }

    /// The strongest authored default.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// The strongest authored samples, mapped to stage time.
    pub fn time_samples(&self) -> &[(f64, Value)] {
        &self.time_samples
    }

    pub fn has_value(&self) -> bool {
        self.default.is_some() || !self.time_samples.is_empty()
    }

    /// Value at the default time.
    pub fn value(&self) -> Option<Value> {
        self.default.clone()
    }

    /// Value at stage `time`.
    ///
    /// Samples are used when their site is at least as strong as the
    /// default's site. Floating point scalars interpolate linearly, other
    /// types hold the previous sample.
    pub fn value_at(&self, time: f64) -> Option<Value> {
        if self.time_samples.is_empty() || self.samples_strength > self.default_strength {
            return self.default.clone();
        }

        let samples = &self.time_samples;
        let idx = samples.partition_point(|(t, _)| *t <= time);
        if idx == 0 {
            return samples.first().map(|(_, v)| v.clone());
        }
        let (t0, v0) = &samples[idx - 1];
        let Some((t1, v1)) = samples.get(idx) else {
            return Some(v0.clone());
        };

        let alpha = (time - t0) / (t1 - t0);
        Some(v0.lerp(v1, alpha).unwrap_or_else(|| v0.clone()))
    }
}

/// Property opinions merged from a strongest-first sequence of sites.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyOverlay {
    attributes: BTreeMap<String, ResolvedAttribute>,
}

impl PropertyOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the opinions of `spec`, which is weaker than every site merged so far.
    ///
    /// Existing opinions are never overwritten.
    pub fn merge_site(&mut self, strength: usize, spec: &PrimSpec, offset: &LayerOffset) {
        for (name, attr) in &spec.attributes {
            let resolved = self
                .attributes
                .entry(name.clone())
                .or_insert_with(|| ResolvedAttribute::declared(&attr.type_name, attr.custom));

            if resolved.default.is_none() {
                if let Some(value) = &attr.default {
                    resolved.default = Some(value.clone());
                    resolved.default_strength = strength;
                }
            }

            if resolved.time_samples.is_empty() && !attr.time_samples.is_empty() {
                let mut samples: Vec<_> = attr
                    .time_samples
                    .iter()
                    .map(|(t, v)| (offset.apply(*t), v.clone()))
                    .collect();
                samples.sort_by(|a, b| a.0.total_cmp(&b.0));
                resolved.time_samples = samples;
                resolved.samples_strength = strength;
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedAttribute> {
        self.attributes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedAttribute)> {
        self.attributes.iter().map(|(name, attr)| (name.as_str(), attr))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// The result of composing one prim.
#[derive(Debug, Clone)]
pub struct ComposedPrim {
    path: Path,
    specifier: Specifier,
    type_name: Option<String>,
    nodes: Vec<ArcNode>,
    sites: Vec<PrimSite>,
    children: Vec<String>,
    properties: PropertyOverlay,
    errors: Vec<CompositionError>,
    dependencies: Vec<(String, Dependency)>,
}

impl ComposedPrim {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A prim exists when at least one site holds a spec for it.
    pub fn exists(&self) -> bool {
        !self.sites.is_empty()
    }

    /// Strongest `def` or `class`, else `over`.
    pub fn specifier(&self) -> Specifier {
        self.specifier
    }

    pub fn is_defined(&self) -> bool {
        self.exists() && self.specifier.is_defining()
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Contributing layer stacks, strongest first.
    pub fn nodes(&self) -> &[ArcNode] {
        &self.nodes
    }

    /// Contributing prim specs, strongest first.
    pub fn sites(&self) -> &[PrimSite] {
        &self.sites
    }

    /// Child prim names from every site, strongest site's order first.
    pub fn children(&self) -> &[String] {
        &self.children
    }

    pub fn properties(&self) -> &PropertyOverlay {
        &self.properties
    }

    pub fn attribute(&self, name: &str) -> Option<&ResolvedAttribute> {
        self.properties.get(name)
    }

    pub fn errors(&self) -> &[CompositionError] {
        &self.errors
    }

    /// Layers this composition read, and what it read from them.
    pub fn dependencies(&self) -> &[(String, Dependency)] {
        &self.dependencies
    }
}

/// Composes prims from a stage layer stack and the reference arcs reachable from it.
pub struct ArcComposer<'a> {
    store: &'a LayerStore,
    root_stack: &'a [String],
}

impl<'a> ArcComposer<'a> {
    /// `root_stack` lists the stage's layers, strongest first (session, then root).
    pub fn new(store: &'a LayerStore, root_stack: &'a [String]) -> Self {
        Self { store, root_stack }
    }

    pub fn store(&self) -> &LayerStore {
        self.store
    }

    pub fn root_stack(&self) -> &[String] {
        self.root_stack
    }

    /// Compose the prim at `path`.
    ///
    /// Strength order: local specs, then the prim's own reference arcs
    /// (each expanded depth-first through nested references), then the
    /// parent's referenced sites with this prim's name appended.
    pub fn compose(&self, path: &Path, parent: Option<&ComposedPrim>) -> ComposedPrim {
        let mut expansion = Expansion::new(self, path.clone());
        let mut visiting = Vec::new();

        expansion.expand_node(
            ArcNode {
                stack: self.root_stack.to_vec(),
                path: path.clone(),
                offset: LayerOffset::default(),
                local: true,
            },
            &mut visiting,
        );

        if let Some(parent) = parent {
            for node in parent.nodes.iter().filter(|node| !node.local) {
                let Ok(child_path) = node.path.append_child(path.name()) else {
                    continue;
                };
                expansion.expand_node(
                    ArcNode {
                        stack: node.stack.clone(),
                        path: child_path,
                        offset: node.offset,
                        local: false,
                    },
                    &mut visiting,
                );
            }
        }

        expansion.finish()
    }

    /// Compose only the contributions of `arcs`, strongest first, as if
    /// they were authored on `node` in the stage's root layer.
    ///
    /// Local opinions at `node` are not included.
    pub fn compose_arcs(&self, node: &Path, arcs: &[Reference]) -> ComposedPrim {
        let mut expansion = Expansion::new(self, node.clone());
        let from = ArcNode {
            stack: self.root_stack.to_vec(),
            path: node.clone(),
            offset: LayerOffset::default(),
            local: true,
        };
        let anchor = self.root_stack.last().cloned().unwrap_or_default();

        let mut visiting = vec![from.key()];
        for reference in arcs {
            expansion.expand_arc(&from, reference, &anchor, &mut visiting);
        }
        expansion.finish()
    }

    /// The reference list in effect at `path` within `stack`, strongest first.
    ///
    /// List ops are applied weakest layer first. Each arc is paired with
    /// the strongest layer that mentions it, which anchors its asset path.
    pub fn effective_references(&self, stack: &[String], path: &Path) -> Vec<(Reference, String)> {
        let specs: Vec<(&String, &PrimSpec)> = stack
            .iter()
            .filter_map(|id| Some((id, self.store.find(id)?.prim(path)?)))
            .collect();

        let mut effective = Vec::new();
        for (_, spec) in specs.iter().rev() {
            effective = spec.references.apply_operations(effective);
        }

        let fallback = stack.last().cloned().unwrap_or_default();
        effective
            .into_iter()
            .map(|reference| {
                let anchor = specs
                    .iter()
                    .find(|(_, spec)| spec.references.items().any(|item| *item == reference))
                    .map(|(id, _)| (*id).clone())
                    .unwrap_or_else(|| fallback.clone());
                (reference, anchor)
            })
            .collect()
    }

    fn has_spec(&self, stack: &[String], path: &Path) -> bool {
        stack
            .iter()
            .any(|id| self.store.find(id).is_some_and(|layer| layer.has_prim(path)))
    }
}

/// Working state while composing one prim.
struct Expansion<'c, 'a> {
    composer: &'c ArcComposer<'a>,
    prim: Path,
    nodes: Vec<ArcNode>,
    seen: HashSet<(Vec<String>, Path)>,
    errors: Vec<CompositionError>,
    dependencies: Vec<(String, Dependency)>,
}

impl<'c, 'a> Expansion<'c, 'a> {
    fn new(composer: &'c ArcComposer<'a>, prim: Path) -> Self {
        Self {
            composer,
            prim,
            nodes: Vec::new(),
            seen: HashSet::new(),
            errors: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    fn depend(&mut self, layer: &str, dependency: Dependency) {
        self.dependencies.push((layer.to_owned(), dependency));
    }

    fn fail(&mut self, error: CompositionError) {
        log::warn!("{error}");
        self.errors.push(error);
    }

    /// Add `node` and, depth-first, everything its reference arcs bring in.
    ///
    /// A node already reached through a stronger path contributes nothing new.
    fn expand_node(&mut self, node: ArcNode, visiting: &mut Vec<(Vec<String>, Path)>) {
        let key = node.key();
        if !self.seen.insert(key.clone()) {
            return;
        }

        for layer in &node.stack {
            self.depend(layer, Dependency::Site(node.path.clone()));
        }

        let references = self.composer.effective_references(&node.stack, &node.path);
        self.nodes.push(node.clone());

        visiting.push(key);
        for (reference, anchor) in references {
            self.expand_arc(&node, &reference, &anchor, visiting);
        }
        visiting.pop();
    }

    fn expand_arc(
        &mut self,
        from: &ArcNode,
        reference: &Reference,
        anchor: &str,
        visiting: &mut Vec<(Vec<String>, Path)>,
    ) {
        let store = self.composer.store;

        let stack = if reference.is_internal() {
            from.stack.clone()
        } else {
            let identifier = store.resolve_identifier(reference.asset_path(), Some(anchor));
            if !store.contains(&identifier) {
                self.depend(&identifier, Dependency::Missing);
                self.fail(CompositionError::LayerNotFound {
                    prim: self.prim.clone(),
                    asset: reference.asset_path().to_owned(),
                    reference: reference.clone(),
                });
                return;
            }
            vec![identifier]
        };
        let root_layer = stack.last().cloned().unwrap_or_default();

        let target = match reference.prim_path() {
            Some(target) => {
                if !self.composer.has_spec(&stack, target) {
                    for layer in &stack {
                        self.depend(layer, Dependency::Site(target.clone()));
                    }
                    self.fail(CompositionError::TargetNotFound {
                        prim: self.prim.clone(),
                        layer: root_layer,
                        target: target.clone(),
                        reference: reference.clone(),
                    });
                    return;
                }
                target.clone()
            }
            None => {
                self.depend(&root_layer, Dependency::DefaultPrim);
                let resolved = store.find(&root_layer).and_then(DefaultPrimResolver::resolve_path);
                let Some(target) = resolved else {
                    self.fail(CompositionError::UnresolvedDefaultPrim {
                        prim: self.prim.clone(),
                        layer: root_layer,
                        reference: reference.clone(),
                    });
                    return;
                };
                target
            }
        };

        let node = ArcNode {
            stack,
            path: target,
            offset: from.offset.compose(reference.layer_offset()),
            local: false,
        };
        if visiting.contains(&node.key()) {
            self.fail(CompositionError::ArcCycle {
                prim: self.prim.clone(),
                reference: reference.clone(),
            });
            return;
        }

        self.expand_node(node, visiting);
    }

    fn finish(self) -> ComposedPrim {
        let store = self.composer.store;

        let mut sites = Vec::new();
        for node in &self.nodes {
            for id in &node.stack {
                if store.find(id).is_some_and(|layer| layer.has_prim(&node.path)) {
                    sites.push(PrimSite {
                        layer: id.clone(),
                        path: node.path.clone(),
                        offset: node.offset,
                    });
                }
            }
        }

        let mut specifier = None;
        let mut type_name = None;
        let mut children: Vec<String> = Vec::new();
        let mut properties = PropertyOverlay::new();

        for (strength, site) in sites.iter().enumerate() {
            let Some(spec) = store.find(&site.layer).and_then(|layer| layer.prim(&site.path)) else {
                continue;
            };

            if specifier.is_none() && spec.specifier.is_defining() {
                specifier = Some(spec.specifier);
            }
            if type_name.is_none() {
                type_name = spec.type_name.clone();
            }
            for child in &spec.children {
                if !children.contains(child) {
                    children.push(child.clone());
                }
            }
            properties.merge_site(strength, spec, &site.offset);
        }

        ComposedPrim {
            path: self.prim,
            specifier: specifier.unwrap_or(Specifier::Over),
            type_name,
            nodes: self.nodes,
            sites,
            children,
            properties,
            errors: self.errors,
            dependencies: self.dependencies,
        }
    }
}
