//! Catalog record types and path/shape helpers.

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

/// A registered source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: i64,
    pub file_name: String,
    /// Opaque locator understood by the slab reader (directory or object prefix).
    pub storage_path: String,
}

/// An array variable inside a registered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub file_id: i64,
    pub name: String,
    /// Normalized group path, e.g. `/` or `/FS/SLV`.
    pub parent_path: String,
    pub shape: Vec<u64>,
    pub dtype: String,
}

impl DatasetRecord {
    pub fn new(
        file_id: i64,
        parent_path: &str,
        name: impl Into<String>,
        shape: Vec<u64>,
        dtype: impl Into<String>,
    ) -> Self {
        Self {
            file_id,
            name: name.into(),
            parent_path: normalize_group_path(parent_path),
            shape,
            dtype: dtype.into(),
        }
    }

    /// Absolute path of the dataset inside its file.
    pub fn full_path(&self) -> String {
        join_path(&self.parent_path, &self.name)
    }

    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }
}

/// Normalize a group path to a leading `/` and no trailing `/`.
///
/// The root group is `/`. Repeated separators collapse.
pub fn normalize_group_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Join a group path and a child name into an absolute node path.
pub fn join_path(group: &str, name: &str) -> String {
    let group = normalize_group_path(group);
    let name = name.trim_matches('/');
    if name.is_empty() {
        group
    } else if group == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", group, name)
    }
}

/// Every group from the root down to `path` itself, root first.
///
/// `group_ancestors("/FS/SLV")` is `["/", "/FS", "/FS/SLV"]`.
pub fn group_ancestors(path: &str) -> Vec<String> {
    let normalized = normalize_group_path(path);
    let mut out = vec!["/".to_string()];
    let mut current = String::new();
    for part in normalized.split('/').filter(|p| !p.is_empty()) {
        current.push('/');
        current.push_str(part);
        out.push(current.clone());
    }
    out
}

/// Parse a shape as recorded by ingestion.
///
/// Accepts `(100, 50)`, `[100,50]`, `(100,)`, `()` and bare `100, 50`.
/// A missing shape is a scalar.
pub fn parse_shape(dataset: &str, text: Option<&str>) -> CatalogResult<Vec<u64>> {
    let invalid = || CatalogError::InvalidShape {
        dataset: dataset.to_string(),
        shape: text.unwrap_or_default().to_string(),
    };

    let Some(text) = text else {
        return Ok(Vec::new());
    };

    let trimmed = text.trim();
    let inner = match (trimmed.chars().next(), trimmed.chars().last()) {
        (Some('('), Some(')')) | (Some('['), Some(']')) => &trimmed[1..trimmed.len() - 1],
        (Some('('), _) | (Some('['), _) | (_, Some(')')) | (_, Some(']')) => {
            return Err(invalid())
        }
        _ => trimmed,
    };

    let mut shape = Vec::new();
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            // Trailing comma of a one-element tuple, or an empty shape.
            if i == parts.len() - 1 {
                continue;
            }
            return Err(invalid());
        }
        let extent = part
            .trim_end_matches('L')
            .parse::<u64>()
            .map_err(|_| invalid())?;
        shape.push(extent);
    }

    Ok(shape)
}

/// Render a shape the way ingestion writes it.
pub fn format_shape(shape: &[u64]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({},)", n),
        _ => {
            let parts: Vec<String> = shape.iter().map(|n| n.to_string()).collect();
            format!("({})", parts.join(", "))
        }
    }
}
