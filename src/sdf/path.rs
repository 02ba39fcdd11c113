use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced while building or manipulating prim paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Path is empty")]
    Empty,
    #[error("Invalid prim name '{name}' in path '{path}'")]
    InvalidName { path: String, name: String },
    #[error("Path '{0}' is not an absolute prim path")]
    NotAbsolutePrimPath(String),
}

/// A prim path such as `/World/Geom` (absolute) or `Geom/Mesh` (relative).
///
/// Paths are validated on construction: every component must be a valid
/// identifier. The absolute root is spelled `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(String);

/// Shorthand for [`Path::new`].
pub fn path(s: &str) -> Result<Path, PathError> {
    Path::new(s)
}

/// Returns true if `name` is a valid prim name (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Path {
    pub fn new(s: &str) -> Result<Self, PathError> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        if s == "/" {
            return Ok(Self::abs_root());
        }

        let body = s.strip_prefix('/').unwrap_or(s);
        for name in body.split('/') {
            if !is_valid_identifier(name) {
                return Err(PathError::InvalidName {
                    path: s.to_owned(),
                    name: name.to_owned(),
                });
            }
        }

        Ok(Path(s.to_owned()))
    }

    /// The absolute root path `/`.
    pub fn abs_root() -> Self {
        Path("/".to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_absolute(&self) -> bool {
        self.0.starts_with('/')
    }

    pub fn is_absolute_root(&self) -> bool {
        self.0 == "/"
    }

    /// True for absolute paths with exactly one component (`/World`).
    pub fn is_root_prim(&self) -> bool {
        self.is_absolute() && !self.is_absolute_root() && self.0[1..].find('/').is_none()
    }

    /// True for any absolute path other than the absolute root.
    pub fn is_prim_path(&self) -> bool {
        self.is_absolute() && !self.is_absolute_root()
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        let body = self.0.strip_prefix('/').unwrap_or(&self.0);
        body.split('/').filter(|c| !c.is_empty())
    }

    pub fn depth(&self) -> usize {
        self.components().count()
    }

    /// Name of the last component, or an empty string for the absolute root.
    pub fn name(&self) -> &str {
        if self.is_absolute_root() {
            return "";
        }
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Parent path. The absolute root and single-component relative paths have none.
    pub fn parent(&self) -> Option<Path> {
        if self.is_absolute_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::abs_root()),
            Some(idx) => Some(Path(self.0[..idx].to_owned())),
            None => None,
        }
    }

    /// Append a single child prim name.
    pub fn append_child(&self, name: &str) -> Result<Path, PathError> {
        if !is_valid_identifier(name) {
            return Err(PathError::InvalidName {
                path: self.0.clone(),
                name: name.to_owned(),
            });
        }
        Ok(self.join_unchecked(name))
    }

    /// Append a relative path (one or more components) to this path.
    pub fn append_path(&self, relative: &str) -> Result<Path, PathError> {
        let relative = Path::new(relative)?;
        if relative.is_absolute() {
            return Ok(relative);
        }
        let mut out = self.clone();
        for name in relative.components() {
            out = out.join_unchecked(name);
        }
        Ok(out)
    }

    /// Anchor a relative path to `anchor`; absolute paths are returned unchanged.
    pub fn make_absolute(&self, anchor: &Path) -> Path {
        if self.is_absolute() {
            return self.clone();
        }
        let mut out = anchor.clone();
        for name in self.components() {
            out = out.join_unchecked(name);
        }
        out
    }

    /// Component-wise prefix test. Every absolute path has `/` as a prefix.
    pub fn has_prefix(&self, prefix: &Path) -> bool {
        if prefix.is_absolute() != self.is_absolute() {
            return false;
        }
        let mut mine = self.components();
        prefix.components().all(|p| mine.next() == Some(p))
    }

    /// Replace `old` prefix with `new`. Returns `None` if `old` is not a prefix.
    pub fn replace_prefix(&self, old: &Path, new: &Path) -> Option<Path> {
        if !self.has_prefix(old) {
            return None;
        }
        let mut out = new.clone();
        for name in self.components().skip(old.depth()) {
            out = out.join_unchecked(name);
        }
        Some(out)
    }

    fn join_unchecked(&self, name: &str) -> Path {
        if self.is_absolute_root() {
            Path(format!("/{name}"))
        } else {
            Path(format!("{}/{name}", self.0))
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::new(s)
    }
}

impl AsRef<str> for Path {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
