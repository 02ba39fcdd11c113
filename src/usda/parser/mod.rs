mod composition;
mod error;
mod hierarchy;
mod metadata;
mod token_ops;
mod value;

use logos::Logos;
use std::collections::{BTreeMap, HashMap};
use std::iter::Peekable;
use std::ops::Range;

use crate::sdf;
use crate::usda::token::Token;

pub use error::ErrorHighlight;

/// Everything a usda file declares, before it becomes a [`sdf::Layer`].
#[derive(Debug, Default)]
pub struct LayerContent {
    pub default_prim: Option<String>,
    pub metadata: BTreeMap<String, sdf::Value>,
    pub prims: HashMap<sdf::Path, sdf::PrimSpec>,
    pub root_prims: Vec<String>,
}

/// Parser translates a list of tokens into structured data.
pub struct Parser<'a> {
    iter: Peekable<logos::SpannedIter<'a, Token<'a>>>,
    source: &'a str,
    last_span: Option<Range<usize>>,
}

impl<'a> Parser<'a> {
    /// Create a new parser from source text.
    pub fn new(data: &'a str) -> Self {
        Self {
            iter: Token::lexer(data).spanned().peekable(),
            source: data,
            last_span: None,
        }
    }

    /// Returns a highlight for the most recent token span processed by the parser.
    pub fn last_error_highlight(&self) -> Option<ErrorHighlight> {
        self.last_span
            .clone()
            .and_then(|span| ErrorHighlight::from_span(self.source, span))
    }
}
