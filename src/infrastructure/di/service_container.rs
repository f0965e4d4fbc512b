//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::services::LedgerService;
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::infrastructure::traits::{FileSystem, Prompter, RealFileSystem, TerminalPrompter};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Confirmation prompts
    pub prompter: Arc<dyn Prompter>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem), Arc::new(TerminalPrompter))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        let settings = Arc::new(settings);

        Self {
            settings,
            fs,
            prompter,
        }
    }

    /// Ledger path: explicit override or the configured default.
    pub fn ledger_path(&self, explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.settings.ledger_file.clone())
    }

    /// Open a ledger session on `path`, honouring `keep_history`.
    pub fn ledger(&self, path: &Path) -> ApplicationResult<LedgerService> {
        LedgerService::open(Arc::clone(&self.fs), path, self.settings.keep_history)
    }

    /// Persist a ledger session to `path`, honouring `keep_history`.
    pub fn save_ledger(&self, ledger: &LedgerService, path: &Path) -> ApplicationResult<()> {
        ledger.save(path, self.settings.keep_history)
    }
}
