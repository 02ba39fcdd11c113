use std::fmt::{self, Write};

use crate::sdf::{self, Layer, ListOp, Path, PrimSpec, Reference};

const INDENT: &str = "    ";

/// Serialize a layer to usda text.
///
/// Prims are written in authored child order, so reading the text back
/// yields the same hierarchy, attribute opinions and reference list ops.
pub fn write_layer(layer: &Layer) -> String {
    LayerWriter(layer).to_string()
}

struct LayerWriter<'a>(&'a Layer);

impl fmt::Display for LayerWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layer = self.0;
        f.write_str("#usda 1.0\n")?;

        let metadata: Vec<_> = layer
            .metadata()
            .iter()
            .filter(|(key, _)| {
                let valid = sdf::is_valid_identifier(key);
                if !valid {
                    log::warn!("Dropping layer metadata with invalid key '{key}'");
                }
                valid
            })
            .collect();

        if layer.default_prim().is_some() || !metadata.is_empty() {
            f.write_str("(\n")?;
            if let Some(name) = layer.default_prim() {
                writeln!(f, "{INDENT}defaultPrim = {}", sdf::quote(name))?;
            }
            for (key, value) in metadata {
                writeln!(f, "{INDENT}{key} = {value}")?;
            }
            f.write_str(")\n")?;
        }

        let root = Path::abs_root();
        for name in layer.root_prims() {
            let Ok(path) = root.append_child(name) else {
                continue;
            };
            f.write_char('\n')?;
            write_prim(f, layer, &path, 0)?;
        }

        Ok(())
    }
}

fn write_prim(f: &mut impl Write, layer: &Layer, path: &Path, depth: usize) -> fmt::Result {
    let Some(spec) = layer.prim(path) else {
        return Ok(());
    };
    let pad = INDENT.repeat(depth);

    write!(f, "{pad}{}", spec.specifier.as_str())?;
    if let Some(type_name) = &spec.type_name {
        write!(f, " {type_name}")?;
    }
    write!(f, " {}", sdf::quote(path.name()))?;

    if spec.references.has_keys() {
        f.write_str(" (\n")?;
        write_references(f, &spec.references, &format!("{pad}{INDENT}"))?;
        write!(f, "{pad})")?;
    }
    writeln!(f, "\n{pad}{{")?;

    write_attributes(f, spec, &format!("{pad}{INDENT}"))?;

    for (index, child) in spec.children.iter().enumerate() {
        let Ok(child_path) = path.append_child(child) else {
            continue;
        };
        if index > 0 || !spec.attributes.is_empty() {
            f.write_char('\n')?;
        }
        write_prim(f, layer, &child_path, depth + 1)?;
    }

    writeln!(f, "{pad}}}")
}

fn write_references(f: &mut impl Write, list: &ListOp<Reference>, pad: &str) -> fmt::Result {
    if list.is_explicit() {
        return write_reference_list(f, pad, None, &list.explicit_items);
    }

    let ops = [
        ("delete", &list.deleted_items),
        ("add", &list.added_items),
        ("prepend", &list.prepended_items),
        ("append", &list.appended_items),
        ("reorder", &list.ordered_items),
    ];
    for (op, items) in ops {
        if !items.is_empty() {
            write_reference_list(f, pad, Some(op), items)?;
        }
    }
    Ok(())
}

fn write_reference_list(f: &mut impl Write, pad: &str, op: Option<&str>, items: &[Reference]) -> fmt::Result {
    f.write_str(pad)?;
    if let Some(op) = op {
        write!(f, "{op} ")?;
    }
    f.write_str("references = ")?;

    match items {
        [] => f.write_str("None")?,
        [single] => write!(f, "{single}")?,
        many => {
            f.write_char('[')?;
            for (i, reference) in many.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{reference}")?;
            }
            f.write_char(']')?;
        }
    }
    f.write_char('\n')
}

fn write_attributes(f: &mut impl Write, spec: &PrimSpec, pad: &str) -> fmt::Result {
    for (name, attr) in &spec.attributes {
        let custom = if attr.custom { "custom " } else { "" };

        if attr.default.is_some() || attr.time_samples.is_empty() {
            write!(f, "{pad}{custom}{} {name}", attr.type_name)?;
            if let Some(value) = &attr.default {
                write!(f, " = {value}")?;
            }
            f.write_char('\n')?;
        }

        if !attr.time_samples.is_empty() {
            writeln!(f, "{pad}{custom}{} {name}.timeSamples = {{", attr.type_name)?;
            for (time, value) in &attr.time_samples {
                writeln!(f, "{pad}{INDENT}{}: {value},", sdf::Value::Double(*time))?;
            }
            writeln!(f, "{pad}}}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::{path, LayerOffset, ListPosition, Specifier, Value};
    use crate::usda::TextReader;

    fn sample_layer() -> Layer {
        let mut layer = Layer::new("anon:0:writer");
        layer.set_default_prim("World");
        layer.set_metadata("upAxis", Value::String("Z".into()));

        let world = path("/World").unwrap();
        let child = path("/World/Child").unwrap();
        layer.create_prim(&world, Specifier::Def).unwrap();
        layer.set_type_name(&world, Some("Xform".into())).unwrap();
        layer.create_prim(&child, Specifier::Over).unwrap();

        layer.set_attribute_default(&world, "size", "double", Value::Double(2.5)).unwrap();
        layer
            .set_time_sample(&world, "anim", "float", 0.0, Value::Float(1.0))
            .unwrap();
        layer
            .set_time_sample(&world, "anim", "float", 10.0, Value::Float(2.0))
            .unwrap();

        layer
            .edit_references(&child, |refs| {
                refs.insert(
                    Reference::new("./asset.usda", Some(path("/Asset").unwrap()), LayerOffset::new(5.0, 2.0)).unwrap(),
                    ListPosition::BACK,
                );
                refs.insert(Reference::internal(path("/World").unwrap()).unwrap(), ListPosition::FRONT);
                refs.remove(&Reference::external("gone.usda").unwrap());
            })
            .unwrap();
        layer
    }

    #[test]
    fn writes_usda_text() {
        let text = write_layer(&sample_layer());

        assert!(text.starts_with("#usda 1.0\n(\n    defaultPrim = \"World\"\n    upAxis = \"Z\"\n)\n"));
        assert!(text.contains("def Xform \"World\"\n{\n"));
        assert!(text.contains("    double size = 2.5\n"));
        assert!(text.contains("    float anim.timeSamples = {\n        0: 1,\n        10: 2,\n    }\n"));
        assert!(text.contains("    over \"Child\" (\n"));
        assert!(text.contains("        delete references = @gone.usda@\n"));
        assert!(text.contains("        prepend references = </World>\n"));
        assert!(text.contains("        append references = @./asset.usda@</Asset> (offset = 5; scale = 2)\n"));
    }

    #[test]
    fn text_reads_back() {
        let layer = sample_layer();
        let reread = TextReader::parse("reread.usda", &write_layer(&layer)).unwrap().into_layer();

        assert_eq!(reread.default_prim(), layer.default_prim());
        assert_eq!(reread.metadata(), layer.metadata());
        assert_eq!(reread.root_prims(), layer.root_prims());
        for (path, spec) in layer.prims() {
            assert_eq!(reread.prim(path), Some(spec), "prim {path} differs");
        }
    }

    #[test]
    fn explicit_empty_references() {
        let mut layer = Layer::new("anon:1:writer");
        let prim = path("/A").unwrap();
        layer.create_prim(&prim, Specifier::Def).unwrap();
        layer.edit_references(&prim, |refs| refs.set_explicit_items(Vec::new())).unwrap();

        let text = write_layer(&layer);
        assert!(text.contains("def \"A\" (\n    references = None\n)\n{\n}\n"));
    }
}
