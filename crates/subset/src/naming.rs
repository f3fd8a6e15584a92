//! Output file naming.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// `{stem}_cropped_{YYYYMMDDHHMMSS}{.ext}` for an input file name.
///
/// Only the final path component of `file_name` is used; its extension is kept.
pub fn cropped_file_name(file_name: &str, now: DateTime<Utc>) -> String {
    let base = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());

    let (stem, ext) = match base.rfind('.') {
        Some(idx) if idx > 0 => (&base[..idx], &base[idx..]),
        _ => (base.as_str(), ""),
    };

    format!("{}_cropped_{}{}", stem, now.format("%Y%m%d%H%M%S"), ext)
}

/// Full output path: an explicit name if given, otherwise a timestamped one.
pub fn output_path(
    output_dir: &Path,
    file_name: &str,
    output_name: Option<&str>,
    now: DateTime<Utc>,
) -> PathBuf {
    match output_name {
        Some(name) => output_dir.join(name),
        None => output_dir.join(cropped_file_name(file_name, now)),
    }
}
