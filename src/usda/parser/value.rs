use anyhow::{anyhow, bail, Context, Result};
use std::any::type_name;
use std::fmt::Debug;
use std::str::FromStr;

use half::f16;

use crate::sdf;
use crate::usda::token::{unescape, Token};

/// Attribute value types the reader decodes. Everything else is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Bool,
    Int,
    Int64,
    Half,
    Float,
    Double,
    String,
    Token,
    Asset,
    Float2,
    Float3,
    Float4,
    Double2,
    Double3,
    Double4,
    BoolVec,
    IntVec,
    FloatVec,
    DoubleVec,
    StringVec,
    TokenVec,
    /// Known to usda but not decoded (matrices, quaternions, tuple arrays, ...).
    Unsupported,
}

/// Value parsing functions.
impl<'a> super::Parser<'a> {
    /// Map a usda type name (including role names) to a decoding [`Type`].
    pub(super) fn parse_data_type(ty: &str) -> Type {
        match ty {
            "bool" => Type::Bool,
            "int" => Type::Int,
            "int64" | "uint" | "uint64" | "uchar" => Type::Int64,
            "half" => Type::Half,
            "float" => Type::Float,
            "double" | "timecode" => Type::Double,
            "string" => Type::String,
            "token" => Type::Token,
            "asset" => Type::Asset,

            "float2" | "texCoord2f" => Type::Float2,
            "float3" | "point3f" | "normal3f" | "vector3f" | "color3f" | "texCoord3f" => Type::Float3,
            "float4" | "color4f" => Type::Float4,
            "double2" | "texCoord2d" => Type::Double2,
            "double3" | "point3d" | "normal3d" | "vector3d" | "color3d" | "texCoord3d" => Type::Double3,
            "double4" | "color4d" => Type::Double4,

            "bool[]" => Type::BoolVec,
            "int[]" => Type::IntVec,
            "float[]" => Type::FloatVec,
            "double[]" | "timecode[]" => Type::DoubleVec,
            "string[]" => Type::StringVec,
            "token[]" => Type::TokenVec,

            _ => Type::Unsupported,
        }
    }

    /// Decode a typed value. Returns `None` for blocked (`None`) or unsupported values.
    pub(super) fn parse_value(&mut self, ty: Type) -> Result<Option<sdf::Value>> {
        if self.eat(Token::None)? {
            return Ok(None);
        }

        let value = match ty {
            Type::Bool => sdf::Value::Bool(self.parse_bool()?),
            Type::Int => sdf::Value::Int(self.parse_token()?),
            Type::Int64 => sdf::Value::Int64(self.parse_token()?),
            Type::Half => sdf::Value::Half(self.parse_token::<f16>()?),
            Type::Float => sdf::Value::Float(self.parse_token()?),
            Type::Double => sdf::Value::Double(self.parse_token()?),
            Type::String => sdf::Value::String(unescape(self.fetch_str()?)),
            Type::Token => sdf::Value::Token(unescape(self.fetch_str()?)),
            Type::Asset => sdf::Value::AssetPath(self.parse_asset_path()?),

            Type::Float2 => sdf::Value::Vec2f(self.parse_tuple()?),
            Type::Float3 => sdf::Value::Vec3f(self.parse_tuple()?),
            Type::Float4 => sdf::Value::Vec4f(self.parse_tuple()?),
            Type::Double2 => sdf::Value::Vec2d(self.parse_tuple()?),
            Type::Double3 => sdf::Value::Vec3d(self.parse_tuple()?),
            Type::Double4 => sdf::Value::Vec4d(self.parse_tuple()?),

            Type::BoolVec => {
                let mut out = Vec::new();
                self.parse_array_fn(|this| {
                    out.push(this.parse_bool()?);
                    Ok(())
                })?;
                sdf::Value::BoolVec(out)
            }
            Type::IntVec => sdf::Value::IntVec(self.parse_array()?),
            Type::FloatVec => sdf::Value::FloatVec(self.parse_array()?),
            Type::DoubleVec => sdf::Value::DoubleVec(self.parse_array()?),
            Type::StringVec => sdf::Value::StringVec(self.parse_string_array()?),
            Type::TokenVec => sdf::Value::TokenVec(self.parse_string_array()?),

            Type::Unsupported => {
                self.skip_value()?;
                return Ok(None);
            }
        };

        Ok(Some(value))
    }

    /// Parse single token as `T` which can be deserialized from string (such as `int`, `float`, etc).
    pub(super) fn parse_token<T: FromStr>(&mut self) -> Result<T>
    where
        <T as FromStr>::Err: Debug,
    {
        let token = self.fetch_next()?;
        let value_str = match token {
            Token::Number(s) | Token::Identifier(s) | Token::String(s) => s,
            _ => bail!("Expected a number, identifier, or string, got {token:?}"),
        };
        T::from_str(value_str)
            .map_err(|err| anyhow!("Failed to parse {} from '{}': {:?}", type_name::<T>(), value_str, err))
    }

    /// Parse USD's flexible boolean literal forms (identifiers, numeric, or string).
    pub(super) fn parse_bool(&mut self) -> Result<bool> {
        let token = self.fetch_next()?;
        match token {
            Token::Identifier(value) | Token::String(value) => match value {
                "true" => Ok(true),
                "false" => Ok(false),
                other => bail!("Unexpected literal for bool: {other}"),
            },
            Token::Number(value) => {
                let parsed = value.parse::<f64>().context("Unable to parse numeric bool")?;
                if parsed == 0.0 {
                    Ok(false)
                } else if parsed == 1.0 {
                    Ok(true)
                } else {
                    bail!("Numeric bool literals must be 0 or 1, got {value}");
                }
            }
            other => bail!("Unexpected token for bool literal: {other:?}"),
        }
    }

    /// Parse an asset path reference.
    pub(super) fn parse_asset_path(&mut self) -> Result<String> {
        let token = self.fetch_next()?;
        token
            .try_as_asset_ref()
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("Asset reference expected"))
    }

    /// Generic array parser that delegates element parsing while handling delimiters.
    pub(super) fn parse_array_fn(&mut self, mut read_elements: impl FnMut(&mut Self) -> Result<()>) -> Result<()> {
        self.ensure_pun('[').context("Array must start with [")?;

        let mut index = 0;
        loop {
            if self.eat(Token::Punctuation(']'))? {
                break;
            }

            read_elements(self).with_context(|| format!("Unable to read array element {index}"))?;
            index += 1;

            match self.fetch_next()? {
                Token::Punctuation(',') => continue,
                Token::Punctuation(']') => break,
                t => bail!("Either comma or closing bracket expected after value, got: {t:?}"),
            }
        }
        Ok(())
    }

    /// Parse delimiter-separated sequences like `(a, b)` or `(offset = ...; scale = ...)`.
    pub(super) fn parse_seq_fn(
        &mut self,
        delim: char,
        mut read_element: impl FnMut(&mut Self, usize) -> Result<()>,
    ) -> Result<()> {
        self.ensure_pun('(').context("Open brace expected")?;

        let mut index = 0;
        loop {
            if self.eat(Token::Punctuation(')'))? {
                break;
            }

            read_element(self, index).with_context(|| format!("Unable to read element {index}"))?;
            index += 1;

            match self.fetch_next()? {
                Token::Punctuation(')') => break,
                Token::Punctuation(d) if d == delim => continue,
                t => bail!("Unexpected token between (): {t:?}"),
            }
        }
        Ok(())
    }

    /// Parse a fixed-size tuple such as `(1, 2, 3)`.
    pub(super) fn parse_tuple<T, const N: usize>(&mut self) -> Result<[T; N]>
    where
        T: FromStr,
        <T as FromStr>::Err: Debug,
    {
        let mut items = Vec::with_capacity(N);
        self.parse_seq_fn(',', |this, _| {
            items.push(this.parse_token::<T>()?);
            Ok(())
        })?;
        let len = items.len();
        <[T; N]>::try_from(items).map_err(|_| anyhow!("Expected a tuple of {N} elements, got {len}"))
    }

    /// Parse an array of scalars.
    pub(super) fn parse_array<T>(&mut self) -> Result<Vec<T>>
    where
        T: FromStr,
        <T as FromStr>::Err: Debug,
    {
        let mut out = Vec::new();
        self.parse_array_fn(|this| {
            out.push(this.parse_token::<T>()?);
            Ok(())
        })?;
        Ok(out)
    }

    /// Parse an array of quoted strings, resolving escapes.
    pub(super) fn parse_string_array(&mut self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        self.parse_array_fn(|this| {
            out.push(unescape(this.fetch_str()?));
            Ok(())
        })?;
        Ok(out)
    }

    /// Parse time samples in the format `{ time: value, time: value, ... }`.
    ///
    /// Blocked samples (`None`) are dropped.
    pub(super) fn parse_time_samples(&mut self, ty: Type) -> Result<Vec<(f64, sdf::Value)>> {
        self.ensure_pun('{').context("Time samples must start with {")?;

        let mut samples = Vec::new();
        loop {
            if self.eat(Token::Punctuation('}'))? {
                break;
            }

            let time = self.parse_token::<f64>().context("Expected number for time sample time")?;
            self.ensure_pun(':').context("Expected ':' after time in time sample")?;

            if let Some(value) = self.parse_value(ty)? {
                samples.push((time, value));
            }

            self.eat(Token::Punctuation(','))?;
        }

        Ok(samples)
    }
}
