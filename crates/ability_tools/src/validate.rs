//! Data validation utilities.

use std::path::{Path, PathBuf};

use ability_core::data::Catalog;

use crate::{read_file, Result, ToolError};

/// Outcome of validating one catalog file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSummary {
    /// File that was checked.
    pub path: PathBuf,
    /// Number of unit types.
    pub unit_types: usize,
    /// Number of abilities across all unit types.
    pub abilities: usize,
}

/// Parse and validate one catalog file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, does not parse, or fails
/// validation.
pub fn validate_catalog_file(path: &Path) -> Result<CatalogSummary> {
    let text = read_file(path)?;
    let catalog = Catalog::from_ron_str(&text, &path.display().to_string())?;
    let abilities = catalog.iter().map(|unit_type| unit_type.abilities.len()).sum();
    Ok(CatalogSummary {
        path: path.to_path_buf(),
        unit_types: catalog.len(),
        abilities,
    })
}

/// Validate a single catalog file, or every `.ron` file in a directory.
///
/// Files are checked in name order. Every file is checked even after a
/// failure; the first error is returned once all have been reported.
///
/// # Errors
///
/// Returns an error if the path cannot be listed, holds no data files, or
/// any data file fails validation.
pub fn validate_data_directory(path: &Path) -> Result<Vec<CatalogSummary>> {
    if path.is_file() {
        return validate_catalog_file(path).map(|summary| vec![summary]);
    }

    let entries = std::fs::read_dir(path).map_err(|source| ToolError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|file| file.extension().is_some_and(|ext| ext == "ron"))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(ToolError::NoDataFiles(path.display().to_string()));
    }

    let mut summaries = Vec::with_capacity(files.len());
    let mut first_error = None;
    for file in files {
        match validate_catalog_file(&file) {
            Ok(summary) => {
                tracing::info!(
                    file = %summary.path.display(),
                    unit_types = summary.unit_types,
                    abilities = summary.abilities,
                    "catalog ok"
                );
                summaries.push(summary);
            }
            Err(err) => {
                tracing::error!(file = %file.display(), "{err}");
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(summaries),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets/data")
    }

    #[test]
    fn test_bundled_data_directory_validates() {
        let summaries = validate_data_directory(&data_dir()).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].unit_types, 11);
        assert!(summaries[0].abilities >= 11);
    }

    #[test]
    fn test_single_file_validates() {
        let summary = validate_catalog_file(&data_dir().join("monsters.ron")).unwrap();
        assert_eq!(summary.unit_types, 11);
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let err = validate_data_directory(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, ToolError::Io { .. }));
    }
}
