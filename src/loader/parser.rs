use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Parses a JSON file into a given type `T`.
///
/// Errors are converted into `crate::error::Error` variants:
/// - `Error::IoError` if the file cannot be read.
/// - `Error::DeserializationError` if the JSON is malformed.
pub fn parse_json_file<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> Result<T> {
    let data = fs::read_to_string(file_path)?;
    let parsed_data: T = serde_json::from_str(&data)?;

    Ok(parsed_data)
}

/// Parses a YAML file into a given type `T`.
///
/// Returns `Error::YamlError` if the document does not match `T`.
pub fn parse_yaml_file<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> Result<T> {
    let data = fs::read_to_string(file_path)?;
    let parsed_data: T = serde_yaml::from_str(&data)?;

    Ok(parsed_data)
}

/// Resolves `path` against the directory containing `config_path` unless it is absolute.
pub fn resolve_relative(config_path: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }

    match config_path.parent() {
        Some(dir) => dir.join(candidate),
        None => candidate.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_against_config_dir() {
        let resolved = resolve_relative(Path::new("/etc/broker/config.yaml"), "topology.json");
        assert_eq!(resolved, PathBuf::from("/etc/broker/topology.json"));
    }

    #[test]
    fn test_resolve_keeps_absolute_path() {
        let resolved = resolve_relative(Path::new("/etc/broker/config.yaml"), "/srv/topology.json");
        assert_eq!(resolved, PathBuf::from("/srv/topology.json"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result: Result<serde_json::Value> = parse_json_file("/nonexistent/vsnet/topology.json");
        assert!(matches!(result, Err(crate::error::Error::IoError(_))));
    }
}
