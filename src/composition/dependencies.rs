use std::collections::{HashMap, HashSet};

use crate::sdf::{LayerChange, Path};

/// What a composed prim read from a layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// The layer's default prim resolved a path-less reference.
    DefaultPrim,
    /// Specs at this path (and the names of its children) contributed opinions or arcs.
    Site(Path),
    /// The layer was referenced but is not loaded.
    Missing,
}

impl Dependency {
    /// Whether `change` in the layer can alter what this dependency observed.
    pub fn is_affected_by(&self, change: &LayerChange) -> bool {
        match (self, change) {
            (Dependency::DefaultPrim, LayerChange::DefaultPrim) => true,
            // A default prim only resolves while its root prim spec exists.
            (Dependency::DefaultPrim, LayerChange::PrimSpec(changed)) => changed.is_root_prim(),
            (Dependency::Site(site), LayerChange::PrimSpec(changed)) => {
                site.has_prefix(changed) || changed.parent().as_ref() == Some(site)
            }
            (Dependency::Site(site), LayerChange::Property { prim, .. }) => site == prim,
            (Dependency::Site(site), LayerChange::References(prim)) => site == prim,
            _ => false,
        }
    }
}

/// Observer registry from layers to the composed prims that depend on them.
///
/// Dependents are stage prim paths, never pointers; the stage looks them up
/// in its own cache when a layer changes.
#[derive(Debug, Default)]
pub struct DependencyRegistry {
    by_layer: HashMap<String, HashMap<Path, HashSet<Dependency>>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, layer: &str, dependent: &Path, dependency: Dependency) {
        self.by_layer
            .entry(layer.to_owned())
            .or_default()
            .entry(dependent.clone())
            .or_default()
            .insert(dependency);
    }

    /// Forget everything `dependent` registered, ahead of recomposing it.
    pub fn remove_dependent(&mut self, dependent: &Path) {
        self.by_layer.retain(|_, dependents| {
            dependents.remove(dependent);
            !dependents.is_empty()
        });
    }

    /// Layers with at least one dependent.
    pub fn layers(&self) -> impl Iterator<Item = &str> {
        self.by_layer.keys().map(String::as_str)
    }

    /// Every prim depending on `layer` in any way.
    pub fn dependents(&self, layer: &str) -> Vec<Path> {
        self.by_layer
            .get(layer)
            .map(|dependents| dependents.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Dependencies `dependent` registered on `layer`.
    pub fn dependencies(&self, layer: &str, dependent: &Path) -> Option<&HashSet<Dependency>> {
        self.by_layer.get(layer).and_then(|dependents| dependents.get(dependent))
    }

    /// Prims whose composition may be stale after `change` in `layer`.
    pub fn affected_by(&self, layer: &str, change: &LayerChange) -> Vec<Path> {
        let Some(dependents) = self.by_layer.get(layer) else {
            return Vec::new();
        };
        dependents
            .iter()
            .filter(|(_, deps)| deps.iter().any(|dep| dep.is_affected_by(change)))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Identifiers of referenced layers that were missing at composition time.
    pub fn missing_layers(&self) -> Vec<String> {
        self.by_layer
            .iter()
            .filter(|(_, dependents)| dependents.values().any(|deps| deps.contains(&Dependency::Missing)))
            .map(|(layer, _)| layer.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_layer.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_layer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::path;

    #[test]
    fn default_prim_changes_reach_dependents() {
        let mut registry = DependencyRegistry::new();
        let source = path("/source").unwrap();
        registry.add("targ", &source, Dependency::DefaultPrim);
        registry.add("targ", &source, Dependency::Site(path("/target1").unwrap()));

        assert_eq!(registry.affected_by("targ", &LayerChange::DefaultPrim), vec![source.clone()]);
        assert!(registry.affected_by("other", &LayerChange::DefaultPrim).is_empty());
        assert!(registry
            .affected_by("targ", &LayerChange::Metadata("doc".into()))
            .is_empty());
    }

    #[test]
    fn site_changes_match_by_path() {
        let site = Dependency::Site(path("/target1/child").unwrap());

        assert!(site.is_affected_by(&LayerChange::Property {
            prim: path("/target1/child").unwrap(),
            name: "attr".into(),
        }));
        assert!(!site.is_affected_by(&LayerChange::Property {
            prim: path("/target1").unwrap(),
            name: "attr".into(),
        }));
        // Removing an ancestor removes the site.
        assert!(site.is_affected_by(&LayerChange::PrimSpec(path("/target1").unwrap())));
        // A new child changes the child list.
        assert!(site.is_affected_by(&LayerChange::PrimSpec(path("/target1/child/new").unwrap())));
        assert!(!site.is_affected_by(&LayerChange::PrimSpec(path("/target2").unwrap())));
        assert!(site.is_affected_by(&LayerChange::References(path("/target1/child").unwrap())));
    }

    #[test]
    fn remove_dependent_drops_empty_layers() {
        let mut registry = DependencyRegistry::new();
        let a = path("/a").unwrap();
        let b = path("/b").unwrap();
        registry.add("l1", &a, Dependency::Missing);
        registry.add("l2", &a, Dependency::DefaultPrim);
        registry.add("l2", &b, Dependency::DefaultPrim);

        assert_eq!(registry.missing_layers(), vec!["l1".to_owned()]);

        registry.remove_dependent(&a);
        assert!(registry.missing_layers().is_empty());
        assert_eq!(registry.layers().collect::<Vec<_>>(), ["l2"]);
        assert_eq!(registry.dependents("l2"), vec![b.clone()]);
        assert!(registry.dependencies("l2", &b).unwrap().contains(&Dependency::DefaultPrim));

        registry.clear();
        assert!(registry.is_empty());
    }
}
