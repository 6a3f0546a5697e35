//! Pod annotations, mounted by the orchestrator as a `key="value"` file.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{Error, Result};

/// Maximum gRPC message size in bytes, applied to both directions.
pub const GRPC_MAX_MSG_SIZE: &str = "seldon.io/grpc-max-message-size";

/// Parse annotation lines of the form `key="value"`.
///
/// Lines without `=` are skipped. Surrounding quotes are stripped and `\"`
/// is unescaped inside the value.
pub fn parse(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((key.to_string(), value.replace("\\\"", "\"")))
        })
        .collect()
}

/// Read annotations from `path`. A missing file yields no annotations.
pub fn load(path: &Path) -> Result<HashMap<String, String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let annotations = parse(&contents);
            tracing::info!(path = %path.display(), count = annotations.len(), "Loaded annotations");
            Ok(annotations)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No annotations file");
            Ok(HashMap::new())
        }
        Err(e) => Err(Error::Configuration(format!(
            "failed to read annotations from {}: {}",
            path.display(),
            e
        ))),
    }
}

/// gRPC message size limit, if annotated.
pub fn max_message_size(annotations: &HashMap<String, String>) -> Result<Option<usize>> {
    annotations
        .get(GRPC_MAX_MSG_SIZE)
        .map(|raw| {
            raw.trim().parse::<usize>().map_err(|_| {
                Error::Configuration(format!(
                    "{} must be a byte count, got {:?}",
                    GRPC_MAX_MSG_SIZE, raw
                ))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_quoted_values() {
        let annotations = parse(
            "seldon.io/grpc-max-message-size=\"1048576\"\nnote=\"say \\\"hi\\\"\"\ngarbage\n",
        );
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[GRPC_MAX_MSG_SIZE], "1048576");
        assert_eq!(annotations["note"], "say \"hi\"");
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let annotations = load(Path::new("/nonexistent/annotations")).unwrap();
        assert!(annotations.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}=\"2048\"", GRPC_MAX_MSG_SIZE).unwrap();
        let annotations = load(file.path()).unwrap();
        assert_eq!(max_message_size(&annotations).unwrap(), Some(2048));
    }

    #[test]
    fn test_invalid_size_is_configuration_error() {
        let annotations = parse(&format!("{}=\"lots\"", GRPC_MAX_MSG_SIZE));
        let err = max_message_size(&annotations).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_absent_size() {
        assert_eq!(max_message_size(&HashMap::new()).unwrap(), None);
    }
}
