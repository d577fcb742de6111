//! Rule file loader
//!
//! Thin collaborator that reads automation declarations from YAML or JSON
//! files. Validation beyond the typed model is not its job; the dissector
//! degrades gracefully on anything the model admits.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::automation::AutomationConfig;

/// Result type for loader operations
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors that can occur while reading rule files
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to parse JSON in {path}: {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load automation declarations from a file.
///
/// The file may hold a single automation mapping or a list of them;
/// `.json` selects the JSON parser, anything else is treated as YAML.
pub fn load_file(path: impl AsRef<Path>) -> LoadResult<Vec<AutomationConfig>> {
    let path = path.as_ref();
    debug!(?path, "loading rule file");

    let content = fs::read_to_string(path).map_err(|e| LoadError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    if path.extension().is_some_and(|ext| ext == "json") {
        from_json_str(&content, path)
    } else {
        from_yaml_str(&content, path)
    }
}

/// Parse YAML content holding one automation or a list
pub fn from_yaml_str(content: &str, origin: &Path) -> LoadResult<Vec<AutomationConfig>> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<AutomationConfig>),
        One(Box<AutomationConfig>),
    }

    let parsed: OneOrMany = serde_yaml::from_str(content).map_err(|e| LoadError::ParseYaml {
        path: origin.to_path_buf(),
        source: e,
    })?;

    Ok(match parsed {
        OneOrMany::Many(configs) => configs,
        OneOrMany::One(config) => vec![*config],
    })
}

fn from_json_str(content: &str, origin: &Path) -> LoadResult<Vec<AutomationConfig>> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| LoadError::ParseJson {
            path: origin.to_path_buf(),
            source: e,
        })?;

    let parse = |v: serde_json::Value| {
        serde_json::from_value(v).map_err(|e| LoadError::ParseJson {
            path: origin.to_path_buf(),
            source: e,
        })
    };

    match value {
        serde_json::Value::Array(items) => items.into_iter().map(parse).collect(),
        other => Ok(vec![parse(other)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_YAML: &str = r#"
- id: heating_guard
  alias: Heating guard
  mode: restart
  triggers:
    - trigger: numeric_state
      entity_id: sensor.living_room_temp
      below: 17
  actions:
    - service: climate.turn_on
      target:
        entity_id: climate.living_room
- id: night_lock
  triggers:
    - trigger: time
      at: "23:00:00"
  actions:
    - service: lock.lock
      target:
        entity_id: lock.front_door
"#;

    #[test]
    fn test_yaml_list() {
        let configs = from_yaml_str(SAMPLE_YAML, Path::new("automations.yaml")).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].id.as_deref(), Some("heating_guard"));
    }

    #[test]
    fn test_single_mapping() {
        let yaml = r#"
id: lone
triggers:
  - trigger: sun
    event: sunset
actions: []
"#;
        let configs = from_yaml_str(yaml, Path::new("one.yaml")).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].id.as_deref(), Some("lone"));
    }

    #[test]
    fn test_load_file_roundtrip() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(SAMPLE_YAML.as_bytes()).unwrap();

        let configs = load_file(file.path()).unwrap();
        assert_eq!(configs.len(), 2);
    }

    #[test]
    fn test_parse_error_carries_path() {
        let err = from_yaml_str(": not yaml :", Path::new("bad.yaml")).unwrap_err();
        assert!(matches!(err, LoadError::ParseYaml { .. }));
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, LoadError::ReadFile { .. }));
    }
}
