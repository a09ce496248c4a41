//! Host lifecycle: activate with a configuration, run against a vault,
//! deactivate.
//!
//! Hosts that embed the mirror (an editor plugin, a watcher, the CLI) hold a
//! [`Session`] instead of threading configuration through global state. The
//! configuration is validated once on activation and is immutable afterwards.

use crate::config::{ConfigError, SyncConfig};
use crate::imaging::{ImageBackend, RustBackend};
use crate::sync::{self, SyncError, SyncEvent, SyncOptions, SyncReport};
use std::path::Path;
use std::sync::mpsc::Sender;
use tracing::{debug, info};

pub struct Session<B: ImageBackend = RustBackend> {
    config: SyncConfig,
    backend: B,
    options: SyncOptions,
    events: Option<Sender<SyncEvent>>,
}

impl Session<RustBackend> {
    /// Validate `config` and start a session with the built-in image backend.
    pub fn activate(config: SyncConfig) -> Result<Self, ConfigError> {
        Self::with_backend(config, RustBackend::new())
    }
}

impl<B: ImageBackend> Session<B> {
    pub fn with_backend(config: SyncConfig, backend: B) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            vault = %config.vault_path.display(),
            site = %config.site_path.display(),
            "session activated"
        );
        Ok(Self {
            config,
            backend,
            options: SyncOptions::default(),
            events: None,
        })
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Forward progress events of every run to `events`.
    pub fn with_events(mut self, events: Sender<SyncEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Sync `vault_root` into the configured site.
    pub fn run(&self, vault_root: &Path) -> Result<SyncReport, SyncError> {
        let config = SyncConfig {
            vault_path: vault_root.to_path_buf(),
            ..self.config.clone()
        };
        sync::sync_with_backend(&self.backend, &config, &self.options, self.events.clone())
    }

    /// End the session. Nothing is held between runs, so this only logs.
    pub fn deactivate(self) {
        debug!(site = %self.config.site_path.display(), "session deactivated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::Fixture;

    #[test]
    fn activate_rejects_invalid_config() {
        let config = SyncConfig {
            main_language: "english".into(),
            ..SyncConfig::default()
        };
        assert!(matches!(
            Session::activate(config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn run_uses_given_vault_root() {
        let fx = Fixture::new();
        let other = fx.tmp.path().join("other-vault");
        crate::test_helpers::write_file(&other, "docs/page.md", b"hello\n");

        let session = Session::with_backend(fx.config.clone(), MockBackend::new()).unwrap();
        let report = session.run(&other).unwrap();
        session.deactivate();

        assert_eq!(report.converted, 1);
        assert_eq!(fx.read_site("docs/page.md"), "hello\n");
    }

    #[test]
    fn runs_are_incremental_across_calls() {
        let fx = Fixture::new();
        fx.write("docs/page.md", "x\n");
        let session = Session::with_backend(fx.config.clone(), MockBackend::new()).unwrap();

        assert_eq!(session.run(fx.vault()).unwrap().converted, 1);
        assert_eq!(session.run(fx.vault()).unwrap().converted, 0);
    }

    #[test]
    fn options_apply_to_every_run() {
        let fx = Fixture::new();
        fx.write("docs/page.md", "x\n");
        crate::test_helpers::write_file(fx.site(), "docs/stray.md", b"stray\n");
        let session = Session::with_backend(fx.config.clone(), MockBackend::new())
            .unwrap()
            .with_options(SyncOptions {
                orphan_sweep: Some(false),
            });

        let report = session.run(fx.vault()).unwrap();

        assert_eq!(report.swept, 0);
        assert!(fx.site_file("docs/stray.md").exists());
    }

    #[test]
    fn events_forwarded() {
        let fx = Fixture::new();
        fx.write("docs/page.md", "x\n");
        let (tx, rx) = std::sync::mpsc::channel();
        let session = Session::with_backend(fx.config.clone(), MockBackend::new())
            .unwrap()
            .with_events(tx);

        session.run(fx.vault()).unwrap();
        drop(session);

        assert!(rx.iter().any(|e| matches!(e, SyncEvent::Converted { .. })));
    }
}
