//! Application state for the acts server

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::IngestConfig;
use crate::error::Result;
use crate::processing::RunOrchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    orchestrator: Arc<RunOrchestrator>,
    /// Set while a run is streaming to some client
    running: AtomicBool,
}

impl AppState {
    /// Create state with the orchestrator wired from configuration
    pub fn new(config: Arc<IngestConfig>) -> Result<Self> {
        let orchestrator = RunOrchestrator::from_config(config)?;
        tracing::info!(
            "Application state ready, issuers: {:?}",
            orchestrator.issuers()
        );
        Ok(Self::with_orchestrator(Arc::new(orchestrator)))
    }

    pub fn with_orchestrator(orchestrator: Arc<RunOrchestrator>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                orchestrator,
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn orchestrator(&self) -> Arc<RunOrchestrator> {
        self.inner.orchestrator.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Claim the single run slot; `None` if a run is already going
    pub fn try_begin_run(&self) -> Option<RunGuard> {
        self.inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunGuard {
                state: self.clone(),
            })
    }
}

/// Releases the run slot when dropped
pub struct RunGuard {
    state: AppState,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.state.inner.running.store(false, Ordering::SeqCst);
    }
}
