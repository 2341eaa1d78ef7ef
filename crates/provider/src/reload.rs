//! Reload Coordination
//!
//! Components register themselves with a [`ReloadCoordinator`] at startup.
//! A reload loads fresh settings and hands them to every hook in
//! registration order; hook failures are collected, never short-circuited.

use crate::{AggregateReloadError, Config, ProviderError, ReloadFailure, Settings};
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Component that can re-apply settings on demand
pub trait Reloadable: Send + Sync {
    /// Name used in logs and failure reports
    fn name(&self) -> &str;

    fn reload(&self, settings: &Settings) -> anyhow::Result<()>;
}

/// Process-wide registry of reloadable components
pub struct ReloadCoordinator {
    config_path: Option<PathBuf>,
    registry: RwLock<Vec<Arc<dyn Reloadable>>>,
    current: RwLock<Arc<Settings>>,
    /// One reload at a time
    reload_lock: Mutex<()>,
}

impl ReloadCoordinator {
    /// `initial` are the settings the components were built with
    pub fn new(config_path: Option<PathBuf>, initial: Settings) -> Self {
        Self {
            config_path,
            registry: RwLock::new(Vec::new()),
            current: RwLock::new(Arc::new(initial)),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn register(&self, component: Arc<dyn Reloadable>) {
        info!(component = component.name(), "registered reloadable component");
        self.registry.write().push(component);
    }

    pub fn registered(&self) -> usize {
        self.registry.read().len()
    }

    /// Settings applied by the last successful load
    pub fn current(&self) -> Arc<Settings> {
        self.current.read().clone()
    }

    /// Reload every registered component
    pub fn reload_registered(&self) -> Result<(), ProviderError> {
        let components = self.registry.read().clone();
        self.reload(&components)
    }

    fn apply(&self, settings: &Settings, components: &[Arc<dyn Reloadable>]) -> Result<(), ProviderError> {
        let mut failures = Vec::new();
        for component in components {
            match component.reload(settings) {
                Ok(()) => info!(component = component.name(), "component reloaded"),
                Err(error) => {
                    warn!(component = component.name(), error = %error, "component reload failed");
                    failures.push(ReloadFailure {
                        component: component.name().to_string(),
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AggregateReloadError {
                attempted: components.len(),
                failures,
            }
            .into())
        }
    }
}

impl Config for ReloadCoordinator {
    fn reload(&self, reloadables: &[Arc<dyn Reloadable>]) -> Result<(), ProviderError> {
        let _guard = self.reload_lock.lock();

        let settings = match Settings::load(self.config_path.as_deref()) {
            Ok(settings) => Arc::new(settings),
            Err(e) => {
                warn!(error = %e, "settings load failed, keeping current configuration");
                return Err(e);
            }
        };
        *self.current.write() = settings.clone();

        info!(components = reloadables.len(), "reloading configuration");
        self.apply(&settings, reloadables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::tests::write_settings;

    struct Recorder {
        name: String,
        fail: bool,
        seen: Mutex<Vec<usize>>,
    }

    impl Recorder {
        fn new(name: &str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                fail,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl Reloadable for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn reload(&self, settings: &Settings) -> anyhow::Result<()> {
            self.seen.lock().push(settings.alerts.subscriber_buffer);
            if self.fail {
                anyhow::bail!("rejected new settings");
            }
            Ok(())
        }
    }

    #[test]
    fn test_failure_does_not_stop_remaining_hooks() {
        let coordinator = ReloadCoordinator::new(None, Settings::default());
        let failing = Recorder::new("failing", true);
        let healthy = Recorder::new("healthy", false);
        coordinator.register(failing.clone());
        coordinator.register(healthy.clone());
        assert_eq!(coordinator.registered(), 2);

        match coordinator.reload_registered() {
            Err(ProviderError::Reload(aggregate)) => {
                assert_eq!(aggregate.attempted, 2);
                assert_eq!(aggregate.components(), vec!["failing"]);
            }
            other => panic!("expected aggregate reload error, got {other:?}"),
        }
        assert_eq!(*healthy.seen.lock(), vec![200]);
        assert_eq!(failing.seen.lock().len(), 1);
    }

    #[test]
    fn test_all_failures_are_collected() {
        let coordinator = ReloadCoordinator::new(None, Settings::default());
        let first = Recorder::new("first", true);
        let second = Recorder::new("second", true);
        let components: Vec<Arc<dyn Reloadable>> = vec![first as Arc<dyn Reloadable>, second];

        match coordinator.reload(&components) {
            Err(ProviderError::Reload(aggregate)) => {
                assert_eq!(aggregate.components(), vec!["first", "second"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_reload_applies_file_settings() {
        let path = write_settings("reload", "[alerts]\nsubscriber_buffer = 32\n");
        let coordinator = ReloadCoordinator::new(Some(path.clone()), Settings::default());
        let healthy = Recorder::new("healthy", false);
        coordinator.register(healthy.clone());

        coordinator.reload_registered().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(*healthy.seen.lock(), vec![32]);
        assert_eq!(coordinator.current().alerts.subscriber_buffer, 32);
    }

    #[test]
    fn test_invalid_settings_abort_before_hooks() {
        let path = write_settings("reload-invalid", "[alerts]\nsubscriber_buffer = 0\n");
        let coordinator = ReloadCoordinator::new(Some(path.clone()), Settings::default());
        let healthy = Recorder::new("healthy", false);
        coordinator.register(healthy.clone());

        let result = coordinator.reload_registered();
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(ProviderError::Settings(_))));
        assert!(healthy.seen.lock().is_empty());
        assert_eq!(coordinator.current().alerts.subscriber_buffer, 200);
    }
}
