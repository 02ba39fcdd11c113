use anyhow::{anyhow, bail, ensure, Context, Result};

use crate::sdf;
use crate::usda::token::{unescape, Token};

use super::LayerContent;

/// Hierarchy parsing functions for prims, attributes, and relationships.
impl<'a> super::Parser<'a> {
    /// Parse the whole document.
    /// Checks the `#usda 1.0` header, reads layer metadata, then recurses through every prim.
    pub fn parse(&mut self) -> Result<LayerContent> {
        let header = self.source.trim_start().lines().next().unwrap_or_default().trim_end();
        let version = header
            .strip_prefix("#usda")
            .ok_or_else(|| anyhow!("Text file must start with '#usda 1.0', got: {header:?}"))?
            .trim();
        ensure!(version == "1.0", "File must start with '#usda 1.0', got: {version:?}");

        let mut content = LayerContent::default();
        self.read_pseudo_root(&mut content).context("Unable to parse pseudo root")?;

        let root = sdf::Path::abs_root();
        let mut root_children = Vec::new();
        while self.peek_next().is_some() {
            self.read_prim(&root, &mut root_children, &mut content)?;
        }
        content.root_prims = root_children;

        Ok(content)
    }

    /// Parse the optional layer metadata block that follows the header.
    pub(super) fn read_pseudo_root(&mut self, content: &mut LayerContent) -> Result<()> {
        if !self.eat(Token::Punctuation('('))? {
            return Ok(());
        }

        loop {
            let next = self.fetch_next().context("Unable to fetch next pseudo root property")?;

            match next {
                Token::Punctuation(')') => break,
                Token::String(doc) => {
                    content.metadata.insert("doc".to_owned(), sdf::Value::String(unescape(doc)));
                }
                Token::Doc => {
                    self.ensure_pun('=')?;
                    let doc = self.fetch_str()?;
                    content.metadata.insert("doc".to_owned(), sdf::Value::String(unescape(doc)));
                }
                Token::DefaultPrim => {
                    self.ensure_pun('=')?;
                    let name = self.fetch_str().context("defaultPrim must be a string")?;
                    content.default_prim = Some(unescape(name));
                }
                Token::Identifier("subLayers") => {
                    self.ensure_pun('=')?;
                    log::debug!("Ignoring subLayers; layers are composed through references only");
                    self.skip_value().context("Unable to parse subLayers")?;
                }
                _ => {
                    let name = match next {
                        Token::Identifier(name) => name,
                        ref other => other
                            .keyword_lexeme()
                            .ok_or_else(|| anyhow!("Unexpected token {other:?}"))?,
                    };
                    self.ensure_pun('=')?;
                    let value = self
                        .parse_metadata_value()
                        .with_context(|| format!("Unable to parse pseudo root metadata value for {name}"))?;
                    if let Some(value) = value {
                        content.metadata.insert(name.to_owned(), value);
                    }
                }
            }
        }

        Ok(())
    }

    /// Parse a prim declaration, capture its metadata, and recursively traverse nested prims/props.
    pub(super) fn read_prim(
        &mut self,
        parent_path: &sdf::Path,
        parent_children: &mut Vec<String>,
        content: &mut LayerContent,
    ) -> Result<()> {
        let specifier = {
            let specifier_token = self.fetch_next().context("Unable to read prim specifier")?;
            match specifier_token {
                Token::Def => sdf::Specifier::Def,
                Token::Over => sdf::Specifier::Over,
                Token::Class => sdf::Specifier::Class,
                _ => bail!("Unexpected prim specifier: {specifier_token:?}"),
            }
        };
        let mut spec = sdf::PrimSpec::new(specifier);

        // Optional type name, valid for def, over, and class.
        let mut name_token = self.fetch_next()?;
        if let Some(prim_type) = name_token.clone().try_as_identifier() {
            spec.type_name = Some(prim_type.to_owned());
            name_token = self.fetch_next()?;
        }

        let name = name_token
            .clone()
            .try_as_string()
            .ok_or_else(|| anyhow!("Unexpected token {name_token:?} (want String)"))?;
        let prim_path = parent_path.append_child(name)?;
        ensure!(!parent_children.iter().any(|child| child == name), "Duplicate prim {prim_path}");
        parent_children.push(name.to_owned());

        if self.eat(Token::Punctuation('('))? {
            self.read_prim_metadata(&mut spec)
                .with_context(|| format!("Unable to parse metadata of {prim_path}"))?;
        }

        self.ensure_pun('{').context("Prim body must start with {")?;

        loop {
            let next = self
                .peek_next()
                .context("Unexpected end of prim body")?
                .as_ref()
                .map_err(|e| anyhow!("{e:?}"))?;

            match next {
                Token::Punctuation('}') => {
                    self.fetch_next()?;
                    break;
                }
                Token::Def | Token::Over | Token::Class => {
                    self.read_prim(&prim_path, &mut spec.children, content)
                        .context("Unable to read nested primitive")?;
                }
                Token::Rel => {
                    self.fetch_next()?;
                    self.read_relationship().context("Unable to read relationship")?;
                }
                Token::Identifier("variantSet") => {
                    self.fetch_next()?;
                    self.skip_variant_set().context("Unable to read variant set")?;
                }
                // List ops may prefix relationships and connections: `prepend rel`, `add rel`, etc.
                Token::Add | Token::Append | Token::Delete | Token::Prepend | Token::Reorder => {
                    self.fetch_next()?;
                    if self.eat(Token::Rel)? {
                        self.read_relationship().context("Unable to read relationship")?;
                    } else {
                        self.read_attribute(&mut spec).context("Unable to read attribute")?;
                    }
                }
                _ => {
                    self.read_attribute(&mut spec)
                        .with_context(|| format!("Unable to read attribute of {prim_path}"))?;
                }
            }
        }

        content.prims.insert(prim_path, spec);
        Ok(())
    }

    /// Parse an attribute declaration: variability, type, name, default value or time samples.
    pub(super) fn read_attribute(&mut self, spec: &mut sdf::PrimSpec) -> Result<()> {
        let custom = self.eat(Token::Custom)?;

        if custom && self.eat(Token::Rel)? {
            return self.read_relationship();
        }

        if !self.eat(Token::Varying)? {
            self.eat(Token::Uniform)?;
        }

        let type_token = self.fetch_next()?;
        let type_name = type_token
            .clone()
            .try_as_identifier()
            .ok_or_else(|| anyhow!("Unexpected token type for attribute type, expected Identifier, got {type_token:?}"))?;
        let data_type = Self::parse_data_type(type_name);

        let name_token = self.fetch_next()?;
        let name = match name_token {
            Token::Identifier(s) => s,
            _ => name_token
                .keyword_lexeme()
                .ok_or_else(|| anyhow!("Unexpected token type for attribute name: {name_token:?}"))?,
        };
        ensure!(sdf::is_valid_property_name(name), "Invalid attribute name: {name}");

        let suffix = if self.eat(Token::Punctuation('.'))? {
            let token = self.fetch_next()?;
            Some(
                token
                    .clone()
                    .try_as_identifier()
                    .ok_or_else(|| anyhow!("Unexpected attribute suffix {token:?}"))?,
            )
        } else {
            None
        };

        let attribute = spec
            .attributes
            .entry(name.to_owned())
            .or_insert_with(|| sdf::AttributeSpec::new(type_name));
        attribute.custom |= custom;

        if self.is_next(Token::Punctuation('(')) {
            self.skip_property_metadata()?;
        }

        if !self.eat(Token::Punctuation('='))? {
            return Ok(());
        }

        match suffix {
            None => {
                attribute.default = self
                    .parse_value(data_type)
                    .with_context(|| format!("Unable to parse value of {name}"))?;
            }
            Some("timeSamples") => {
                let samples = self
                    .parse_time_samples(data_type)
                    .with_context(|| format!("Unable to parse time samples of {name}"))?;
                for (time, value) in samples {
                    attribute.set_time_sample(time, value);
                }
            }
            Some(other) => {
                log::trace!("Skipping {name}.{other}");
                self.skip_value()?;
            }
        }

        if self.is_next(Token::Punctuation('(')) {
            self.skip_property_metadata()?;
        }

        Ok(())
    }

    /// Read past a relationship declaration. Relationships are not composed.
    pub(super) fn read_relationship(&mut self) -> Result<()> {
        let name_token = self.fetch_next()?;
        let name = name_token
            .clone()
            .try_as_identifier()
            .ok_or_else(|| anyhow!("Unexpected token in relationship declaration: {name_token:?}"))?;
        log::trace!("Skipping relationship {name}");

        if self.is_next(Token::Punctuation('(')) {
            self.skip_property_metadata()?;
        }

        if self.eat(Token::Punctuation('='))? {
            self.skip_value().context("Unable to parse relationship targets")?;
        }

        if self.is_next(Token::Punctuation('(')) {
            self.skip_property_metadata()?;
        }

        Ok(())
    }

    /// Read past `variantSet "name" = { ... }`. Variants are not composed.
    pub(super) fn skip_variant_set(&mut self) -> Result<()> {
        let name = self.fetch_str().context("Variant set name expected")?;
        log::debug!("Ignoring variant set {name}");
        self.ensure_pun('=')?;
        self.skip_group('{', '}')
    }
}
