//! Process-wide adapter registry.
//!
//! Maps adapter names to factories so a pipeline can be selected by name
//! (from a config file or the command line).
//!
//! Initialisation order: the table is created on first access and the
//! built-in adapters ([`NpyFolderAdapter`] and [`SyntheticAdapter`]) are
//! inserted at that moment. Any later [`register_adapter`] call sees them and
//! may replace them.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::adapter::{NpyFolderAdapter, SourceAdapter};
use crate::error::{PipelineError, PipelineResult};
use crate::synthetic::SyntheticAdapter;

/// Creates a fresh adapter instance.
pub type AdapterFactory = Arc<dyn Fn() -> Arc<dyn SourceAdapter> + Send + Sync>;

static REGISTRY: OnceLock<RwLock<HashMap<String, AdapterFactory>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<String, AdapterFactory>> {
    REGISTRY.get_or_init(|| {
        let mut table: HashMap<String, AdapterFactory> = HashMap::new();
        table.insert(
            NpyFolderAdapter::NAME.to_string(),
            Arc::new(|| Arc::new(NpyFolderAdapter::new()) as Arc<dyn SourceAdapter>),
        );
        table.insert(
            SyntheticAdapter::NAME.to_string(),
            Arc::new(|| Arc::new(SyntheticAdapter::default()) as Arc<dyn SourceAdapter>),
        );
        RwLock::new(table)
    })
}

/// Register `factory` under `name`, replacing any previous entry.
pub fn register_adapter<F>(name: impl Into<String>, factory: F)
where
    F: Fn() -> Arc<dyn SourceAdapter> + Send + Sync + 'static,
{
    let name = name.into();
    let previous = registry().write().insert(name.clone(), Arc::new(factory));
    if previous.is_some() {
        warn!("Adapter `{name}` re-registered; previous factory replaced");
    } else {
        debug!("Registered adapter `{name}`");
    }
}

/// Instantiate the adapter registered under `name`.
///
/// # Errors
///
/// [`PipelineError::UnknownAdapter`] if nothing is registered under `name`.
pub fn build_adapter(name: &str) -> PipelineResult<Arc<dyn SourceAdapter>> {
    let factory = registry().read().get(name).cloned();
    match factory {
        Some(factory) => Ok(factory()),
        None => Err(PipelineError::UnknownAdapter {
            name: name.to_string(),
            available: registered_adapters(),
        }),
    }
}

/// Registered names, sorted.
pub fn registered_adapters() -> Vec<String> {
    let mut names: Vec<String> = registry().read().keys().cloned().collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{SyntheticClass, SyntheticConfig};

    #[test]
    fn builtins_are_present() {
        let names = registered_adapters();
        assert!(names.contains(&"npy-folder".to_string()));
        assert!(names.contains(&"synthetic".to_string()));
        assert_eq!(build_adapter("synthetic").unwrap().name(), "synthetic");
    }

    #[test]
    fn unknown_name_is_error() {
        match build_adapter("no-such-adapter") {
            Err(PipelineError::UnknownAdapter { name, available }) => {
                assert_eq!(name, "no-such-adapter");
                assert!(available.contains(&"npy-folder".to_string()));
            }
            other => panic!("expected UnknownAdapter, got {:?}", other.map(|a| a.name().to_string())),
        }
    }

    #[test]
    fn custom_adapter_can_be_registered_and_replaced() {
        register_adapter("registry-test-custom", || {
            Arc::new(SyntheticAdapter::new(SyntheticConfig {
                classes: vec![SyntheticClass::new("only", 0.1)],
                files_per_class: 1,
                samples_per_file: 16,
            })) as Arc<dyn SourceAdapter>
        });
        assert!(registered_adapters().contains(&"registry-test-custom".to_string()));
        assert_eq!(build_adapter("registry-test-custom").unwrap().name(), "synthetic");

        register_adapter("registry-test-custom", || Arc::new(NpyFolderAdapter) as Arc<dyn SourceAdapter>);
        assert_eq!(build_adapter("registry-test-custom").unwrap().name(), "npy-folder");
    }

    #[test]
    fn names_are_sorted() {
        let names = registered_adapters();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
