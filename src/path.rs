//! Hierarchical path values used to address files and directories.
//!
//! A [`Path`] is an immutable sequence of non-empty components rooted at
//! `/`. Components may not contain `/` or `:`. The derived total order is
//! lexicographic over the component sequences, so a parent always sorts
//! before its descendants and siblings sort by component name; locking a
//! set of paths in ascending order therefore acquires ancestors first.

use std::fmt;
use std::str::FromStr;

use crate::error::DfsError;

/// An absolute path in the distributed file system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    components: Vec<String>,
}

impl Path {
    /// The root path `/`.
    pub fn root() -> Path {
        Path { components: Vec::new() }
    }

    /// Reports whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// The components of this path, in order. Empty for the root.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// The final component, or `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// The path with the final component removed, or `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        match self.components.split_last() {
            Some((_, rest)) => Some(Path { components: rest.to_vec() }),
            None => None,
        }
    }

    /// This path extended by one component.
    pub fn child(&self, name: &str) -> Result<Path, DfsError> {
        validate_component(name)?;
        let mut components = self.components.clone();
        components.push(name.to_owned());
        Ok(Path { components })
    }

    /// Reports whether `prefix`'s components are a prefix of this path's.
    ///
    /// Every path starts with the root, and with itself.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.components.starts_with(&prefix.components)
    }

    /// The strict ancestors of this path, root first, this path excluded.
    pub fn ancestors(&self) -> impl Iterator<Item = Path> + '_ {
        (0..self.components.len()).map(|depth| Path { components: self.components[..depth].to_vec() })
    }
}

impl FromStr for Path {
    type Err = DfsError;

    fn from_str(input: &str) -> Result<Path, DfsError> {
        let Some(rest) = input.strip_prefix('/') else {
            return Err(DfsError::IllegalArgument(format!("path {input:?} is not absolute")));
        };
        let mut components = Vec::new();
        for component in rest.split('/') {
            // Repeated and trailing separators contribute empty components.
            if component.is_empty() {
                continue;
            }
            validate_component(component)?;
            components.push(component.to_owned());
        }
        Ok(Path { components })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

fn validate_component(component: &str) -> Result<(), DfsError> {
    if component.is_empty() {
        return Err(DfsError::IllegalArgument("empty path component".to_owned()));
    }
    if component.contains(['/', ':']) {
        return Err(DfsError::IllegalArgument(format!("component {component:?} contains a reserved character")));
    }
    Ok(())
}
