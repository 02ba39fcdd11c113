use anyhow::{anyhow, bail, Context, Result};

use crate::sdf;
use crate::usda::token::{unescape, Token};

/// Metadata parsing functions.
impl<'a> super::Parser<'a> {
    /// Parse prim metadata up to and including the closing `)`.
    ///
    /// Only `references` is kept; other metadata (kind, apiSchemas, inherits,
    /// payloads, variants, custom data) is read and dropped.
    pub(super) fn read_prim_metadata(&mut self, spec: &mut sdf::PrimSpec) -> Result<()> {
        loop {
            let token = self.fetch_next().context("Unterminated prim metadata")?;
            match token {
                Token::Punctuation(')') => break,
                Token::Punctuation(';') => continue,
                // Bare string is prim documentation.
                Token::String(_) => continue,
                token => self
                    .read_prim_metadata_entry(token, spec)
                    .context("Unable to parse prim metadata entry")?,
            }
        }
        Ok(())
    }

    /// Parse a single prim metadata assignment, honoring list ops for references.
    pub(super) fn read_prim_metadata_entry(&mut self, token: Token<'a>, spec: &mut sdf::PrimSpec) -> Result<()> {
        let (list_op, name_token) = match token {
            Token::Add | Token::Append | Token::Delete | Token::Prepend | Token::Reorder => {
                let name = self.fetch_next()?;
                (Some(token), name)
            }
            _ => (None, token),
        };

        self.ensure_pun('=')?;

        match name_token {
            Token::References => {
                let references = self.parse_reference_list().context("Unable to parse references")?;
                self.apply_list_op(&mut spec.references, list_op, references)
                    .context("Unable to build references listOp")?;
            }
            Token::Doc => {
                self.fetch_str().context("doc metadata must be a string")?;
            }
            Token::Identifier(name) => {
                log::trace!("Skipping prim metadata '{name}'");
                self.skip_value()
                    .with_context(|| format!("Unable to parse prim metadata: {name}"))?;
            }
            other => bail!("Unexpected metadata name token: {other:?}"),
        }

        Ok(())
    }

    /// Skip a `( ... )` metadata block attached to a property.
    pub(super) fn skip_property_metadata(&mut self) -> Result<()> {
        self.skip_group('(', ')').context("Unable to parse property metadata")
    }

    /// Decode an untyped metadata value.
    ///
    /// Strings, numbers and booleans are kept; dictionaries, lists and arcs
    /// are consumed and reported as `None`.
    pub(super) fn parse_metadata_value(&mut self) -> Result<Option<sdf::Value>> {
        let next = self
            .peek_next()
            .context("Unexpected end of tokens")?
            .as_ref()
            .map_err(|e| anyhow!("Logos error: {e:?}"))?
            .clone();

        let value = match next {
            Token::String(_) => sdf::Value::String(unescape(self.fetch_str()?)),
            Token::Number(_) => sdf::Value::Double(self.parse_token()?),
            Token::Identifier("true" | "false") => sdf::Value::Bool(self.parse_bool()?),
            _ => {
                self.skip_value()?;
                return Ok(None);
            }
        };

        Ok(Some(value))
    }
}
