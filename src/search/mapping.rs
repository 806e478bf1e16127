//! Backend-specific index mapping documents

use crate::search::config::{BackendKind, SearchConfig};
use std::path::PathBuf;
use std::sync::Arc;

/// Supplies the schema document passed verbatim to `IndexBackend::create_index`
pub trait MappingSource: Send + Sync {
    /// `None` when no mapping is available for the backend
    fn load(&self, backend: BackendKind) -> Option<String>;
}

/// Mappings compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinMappings;

impl MappingSource for BuiltinMappings {
    fn load(&self, backend: BackendKind) -> Option<String> {
        let mapping = match backend {
            BackendKind::Elasticsearch => {
                include_str!("../../resources/mappings/elasticsearch.json")
            }
            BackendKind::Solr => include_str!("../../resources/mappings/solr.json"),
            BackendKind::Memory => include_str!("../../resources/mappings/memory.json"),
        };
        Some(mapping.to_string())
    }
}

/// Mappings read from `<dir>/<backend>.json` at load time
#[derive(Debug, Clone)]
pub struct DirectoryMappings {
    dir: PathBuf,
}

impl DirectoryMappings {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl MappingSource for DirectoryMappings {
    fn load(&self, backend: BackendKind) -> Option<String> {
        let path = self.dir.join(format!("{}.json", backend));
        match std::fs::read_to_string(&path) {
            Ok(mapping) => Some(mapping),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Mapping resource unavailable");
                None
            }
        }
    }
}

/// A source with nothing to offer; rebuilds against it always fail
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMappings;

impl MappingSource for NoMappings {
    fn load(&self, _backend: BackendKind) -> Option<String> {
        None
    }
}

/// Directory overrides when configured, compiled-in mappings otherwise
pub fn mapping_source(config: &SearchConfig) -> Arc<dyn MappingSource> {
    match config.mapping_dir {
        Some(ref dir) => Arc::new(DirectoryMappings::new(dir.clone())),
        None => Arc::new(BuiltinMappings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_mappings_parse() {
        for kind in [BackendKind::Elasticsearch, BackendKind::Solr, BackendKind::Memory] {
            let mapping = BuiltinMappings.load(kind).unwrap();
            assert!(serde_json::from_str::<serde_json::Value>(&mapping).is_ok());
        }
    }

    #[test]
    fn test_directory_mappings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("memory.json"), r#"{"fields": []}"#).unwrap();

        let source = DirectoryMappings::new(dir.path());
        assert_eq!(
            source.load(BackendKind::Memory).as_deref(),
            Some(r#"{"fields": []}"#)
        );
        assert!(source.load(BackendKind::Solr).is_none());
    }
}
