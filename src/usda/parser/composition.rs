use anyhow::{anyhow, bail, Context, Result};

use crate::sdf;
use crate::usda::token::Token;

/// Composition arc parsing functions.
impl<'a> super::Parser<'a> {
    /// Parse a reference arc: `@asset@</path> (offset = ..; scale = ..)`, `@asset@` or `</path>`.
    pub(super) fn parse_reference(&mut self) -> Result<sdf::Reference> {
        let mut asset_path = "";
        if matches!(self.peek_next(), Some(Ok(Token::AssetRef(..)))) {
            asset_path = self
                .fetch_next()?
                .try_as_asset_ref()
                .ok_or_else(|| anyhow!("Asset reference expected"))?;
        }

        let mut prim_path = None;
        if matches!(self.peek_next(), Some(Ok(Token::PathRef(..)))) {
            let path = self
                .fetch_next()?
                .try_as_path_ref()
                .ok_or_else(|| anyhow!("Path reference expected"))?;
            prim_path = Some(sdf::Path::new(path)?);
        }

        if asset_path.is_empty() && prim_path.is_none() {
            let token = self.fetch_next()?;
            bail!("Expected an asset or path reference, got {token:?}");
        }

        let mut layer_offset = sdf::LayerOffset::default();
        if self.is_next(Token::Punctuation('(')) {
            self.parse_reference_layer_offset(&mut layer_offset)
                .context("Unable to parse reference layer offset")?;
        }

        Ok(sdf::Reference::new(asset_path, prim_path, layer_offset)?)
    }

    /// Parse `(offset = ...; scale = ...)` blocks attached to references.
    pub(super) fn parse_reference_layer_offset(&mut self, layer_offset: &mut sdf::LayerOffset) -> Result<()> {
        self.parse_seq_fn(';', |this, _index| {
            let token = this.fetch_next()?;
            this.ensure_pun('=')?;
            let value = this.parse_token::<f64>()?;

            match token {
                Token::Offset => layer_offset.offset = value,
                Token::Scale => layer_offset.scale = value,
                unexpected => bail!("Unexpected token in layer offset: {unexpected:?}"),
            }

            Ok(())
        })
    }

    /// Parse a list-op friendly sequence of references. `None` is the empty list.
    pub(super) fn parse_reference_list(&mut self) -> Result<Vec<sdf::Reference>> {
        if self.eat(Token::None)? {
            return Ok(Vec::new());
        }

        if self.is_next(Token::Punctuation('[')) {
            let mut out = Vec::new();
            self.parse_array_fn(|this| {
                out.push(this.parse_reference()?);
                Ok(())
            })?;
            Ok(out)
        } else {
            Ok(vec![self.parse_reference()?])
        }
    }

    /// Merge one `[op] references = ...` statement into `list`.
    ///
    /// A statement without an operation makes the list op explicit; each
    /// operation statement fills its own list.
    pub(super) fn apply_list_op<T: Clone + PartialEq>(
        &mut self,
        list: &mut sdf::ListOp<T>,
        op: Option<Token<'a>>,
        items: Vec<T>,
    ) -> Result<()> {
        match op {
            None => list.set_explicit_items(items),
            Some(Token::Prepend) => list.prepended_items.extend(items),
            Some(Token::Append) => list.appended_items.extend(items),
            Some(Token::Add) => list.added_items.extend(items),
            Some(Token::Delete) => list.deleted_items.extend(items),
            Some(Token::Reorder) => list.ordered_items.extend(items),
            other => bail!("Unsupported list op: {other:?}"),
        }

        Ok(())
    }
}
