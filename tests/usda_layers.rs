//! Composition of usda files on disk.

use std::path::PathBuf;

use usdref::composition::CompositionError;
use usdref::sdf::{path, LayerStore, Specifier, Value};
use usdref::usda::TextReader;
use usdref::Stage;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("references")
        .join(name)
}

fn open(name: &str) -> Stage {
    let file = fixture_path(name);
    Stage::open(LayerStore::new(), file.to_str().unwrap()).expect("Failed to open stage")
}

#[test]
fn test_read_asset_layer() {
    let reader = TextReader::read(&fixture_path("asset.usda")).expect("Failed to read asset.usda");
    let layer = reader.into_layer();

    assert_eq!(layer.default_prim(), Some("Model"));
    assert_eq!(
        layer.metadata().get("doc"),
        Some(&Value::String("Referenced asset with a default prim".into()))
    );
    assert!(layer.real_path().is_some());

    let model = layer.prim(&path("/Model").unwrap()).unwrap();
    assert_eq!(model.specifier, Specifier::Def);
    assert_eq!(model.type_name.as_deref(), Some("Xform"));
    assert_eq!(model.children, vec!["Geom".to_owned()]);
    assert_eq!(model.attribute("radius").unwrap().time_samples.len(), 2);
}

#[test]
fn test_open_loads_referenced_layers() {
    let stage = open("shot.usda");
    let asset = fixture_path("asset.usda").canonicalize().unwrap();

    assert_eq!(stage.store().len(), 2);
    assert!(stage.store().contains(&asset.display().to_string()));
}

#[test]
fn test_default_prim_reference_with_offset() {
    let mut stage = open("shot.usda");
    let hero = path("/World/Hero").unwrap();

    // Local opinion wins over the referenced one.
    assert_eq!(stage.attribute_value(&hero, "size"), Some(Value::Double(1.0)));
    assert_eq!(stage.attribute_value(&hero, "purpose"), Some(Value::Token("render".into())));
    assert_eq!(stage.prim(&hero).unwrap().type_name(), Some("Xform"));

    // Samples at layer times 0 and 10 land at 10 and 30.
    assert_eq!(stage.attribute_value_at(&hero, "radius", 20.0), Some(Value::Float(1.5)));
    assert_eq!(stage.attribute_value_at(&hero, "radius", 0.0), Some(Value::Float(1.0)));
    assert_eq!(stage.attribute_value_at(&hero, "radius", 40.0), Some(Value::Float(2.0)));

    let geom = path("/World/Hero/Geom").unwrap();
    assert_eq!(stage.attribute_value(&geom, "count"), Some(Value::Int(4)));
    assert_eq!(stage.prim(&geom).unwrap().type_name(), Some("Mesh"));
}

#[test]
fn test_subroot_reference_from_file() {
    let mut stage = open("shot.usda");
    let prop = path("/World/Prop").unwrap();

    assert_eq!(stage.attribute_value(&prop, "count"), Some(Value::Int(4)));
    assert_eq!(stage.prim(&prop).unwrap().type_name(), Some("Mesh"));
    assert!(stage.children(&prop).is_empty());
}

#[test]
fn test_prepend_and_append_lists() {
    let mut stage = open("shot.usda");

    let layered = path("/World/Layered").unwrap();
    assert_eq!(stage.attribute_value(&layered, "size"), Some(Value::Double(7.0)));
    assert_eq!(
        stage.attribute_value(&layered, "purpose"),
        Some(Value::Token("render".into()))
    );

    let weak = path("/World/Weak").unwrap();
    assert_eq!(stage.attribute_value(&weak, "size"), Some(Value::Double(2.5)));
}

#[test]
fn test_internal_reference_from_file() {
    let mut stage = open("shot.usda");
    let local = path("/World/Local").unwrap();

    assert_eq!(stage.attribute_value(&local, "size"), Some(Value::Double(1.0)));
    assert_eq!(stage.attribute_value_at(&local, "radius", 20.0), Some(Value::Float(1.5)));
    assert!(stage.has_prim(&path("/World/Local/Geom").unwrap()));
}

#[test]
fn test_traverse_shot() {
    let mut stage = open("shot.usda");
    let prims: Vec<String> = stage.traverse().iter().map(ToString::to_string).collect();

    assert_eq!(
        prims,
        [
            "/World",
            "/World/Hero",
            "/World/Hero/Geom",
            "/World/Prop",
            "/World/Layered",
            "/World/Layered/Geom",
            "/World/Weak",
            "/World/Weak/Geom",
            "/World/Local",
            "/World/Local/Geom",
        ]
    );
    assert!(stage.all_composition_errors().is_empty());
}

#[test]
fn test_broken_references_are_reported() {
    let mut stage = open("broken.usda");

    let errors = stage.all_composition_errors();
    assert_eq!(errors.len(), 3);
    assert!(matches!(errors[0], CompositionError::UnresolvedDefaultPrim { .. }));
    assert!(matches!(errors[1], CompositionError::TargetNotFound { .. }));
    assert!(matches!(errors[2], CompositionError::LayerNotFound { .. }));

    // Failed arcs are skipped; the prims still exist.
    assert!(stage.has_prim(&path("/NoLayer").unwrap()));
    assert_eq!(stage.attribute_value(&path("/NoDefault").unwrap(), "value"), None);
}

#[test]
fn test_cycle_between_files() {
    let mut stage = open("cycle_a.usda");
    let a = path("/A").unwrap();

    assert_eq!(stage.attribute_value(&a, "fromA"), Some(Value::Int(1)));
    assert_eq!(stage.attribute_value(&a, "fromB"), Some(Value::Int(2)));
    assert!(matches!(
        stage.composition_errors(&a).as_slice(),
        [CompositionError::ArcCycle { .. }]
    ));
}

#[test]
fn test_edits_round_trip_through_text() {
    let mut stage = open("shot.usda");
    let hero = path("/World/Hero").unwrap();
    stage.set_attribute(&hero, "size", Value::Double(3.0)).unwrap();

    let text = stage.layer(stage.root_layer()).unwrap().export_to_string();
    let reread = TextReader::parse("shot_copy.usda", &text)
        .expect("Failed to parse exported layer")
        .into_layer();

    let spec = reread.prim(&hero).unwrap();
    assert_eq!(spec.references.prepended_items.len(), 1);
    assert_eq!(
        spec.attribute("size").unwrap().default,
        Some(Value::Double(3.0))
    );
}
