use crate::sdf::{Layer, Path};

/// Resolves the implicit target of references that name no prim.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPrimResolver;

impl DefaultPrimResolver {
    /// The layer's default prim name, if it is set and names an existing root prim.
    pub fn resolve(layer: &Layer) -> Option<&str> {
        let name = layer.default_prim()?;
        let path = Path::abs_root().append_child(name).ok()?;
        if !layer.has_prim(&path) {
            log::debug!("{}: defaultPrim '{name}' has no root prim spec", layer.identifier());
            return None;
        }
        Some(name)
    }

    /// Like [`DefaultPrimResolver::resolve`], as an absolute prim path.
    pub fn resolve_path(layer: &Layer) -> Option<Path> {
        Self::resolve(layer).and_then(|name| Path::abs_root().append_child(name).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::{path, Specifier};

    #[test]
    fn resolves_existing_root_prim() {
        let mut layer = Layer::new("anon:0:resolver");
        assert_eq!(DefaultPrimResolver::resolve(&layer), None);

        layer.create_prim(&path("/target1").unwrap(), Specifier::Def).unwrap();
        layer.set_default_prim("target1");
        assert_eq!(DefaultPrimResolver::resolve(&layer), Some("target1"));
        assert_eq!(DefaultPrimResolver::resolve_path(&layer), Some(path("/target1").unwrap()));

        layer.clear_default_prim();
        assert_eq!(DefaultPrimResolver::resolve(&layer), None);
    }

    #[test]
    fn rejects_missing_or_invalid_names() {
        let mut layer = Layer::new("anon:1:resolver");
        layer.create_prim(&path("/a/b").unwrap(), Specifier::Def).unwrap();

        layer.set_default_prim("missing");
        assert_eq!(DefaultPrimResolver::resolve(&layer), None);

        layer.set_default_prim("a/b");
        assert_eq!(DefaultPrimResolver::resolve(&layer), None);

        layer.set_default_prim("");
        assert_eq!(DefaultPrimResolver::resolve(&layer), None);
    }
}
