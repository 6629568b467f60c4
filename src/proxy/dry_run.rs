//! Dry-run proxy manager.
//!
//! Honors the full `ProxyManager` contract (render, diff, reload-on-change)
//! but never touches the filesystem or spawns nginx. Every call is logged and
//! appended to a journal that callers can inspect.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::proxy::{ApplyOutcome, ProxyManager, ProxyState};
use crate::render::Renderer;
use crate::topology::Snapshot;

/// A management action the dry-run manager would have performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Status(ProxyState),
    SetConfig { bytes: usize, changed: bool },
    Start,
    Reload,
}

/// Shared, append-only record of actions.
#[derive(Debug, Clone, Default)]
pub struct ActionJournal {
    inner: Arc<Mutex<Vec<Action>>>,
}

impl ActionJournal {
    fn record(&self, action: Action) {
        self.inner.lock().expect("action journal mutex poisoned").push(action);
    }

    /// Copy of every action recorded so far.
    pub fn actions(&self) -> Vec<Action> {
        self.inner.lock().expect("action journal mutex poisoned").clone()
    }

    pub fn count(&self, pred: impl Fn(&Action) -> bool) -> usize {
        self.inner
            .lock()
            .expect("action journal mutex poisoned")
            .iter()
            .filter(|a| pred(a))
            .count()
    }
}

/// Logs management calls instead of executing them.
#[derive(Debug)]
pub struct DryRunManager {
    renderer: Renderer,
    state: ProxyState,
    applied: Option<Vec<u8>>,
    journal: ActionJournal,
}

impl DryRunManager {
    pub fn new(renderer: Renderer) -> Self {
        tracing::info!("Created dry-run proxy manager; nginx will not be touched");
        Self {
            renderer,
            state: ProxyState::Stopped,
            applied: None,
            journal: ActionJournal::default(),
        }
    }

    pub fn journal(&self) -> ActionJournal {
        self.journal.clone()
    }
}

#[async_trait]
impl ProxyManager for DryRunManager {
    async fn status(&self) -> Result<ProxyState> {
        tracing::info!(state = ?self.state, "called ProxyManager::status()");
        self.journal.record(Action::Status(self.state));
        Ok(self.state)
    }

    async fn set_config(&mut self, snapshot: &Snapshot) -> Result<ApplyOutcome> {
        let rendered = self.renderer.render(snapshot)?;
        let changed = self.applied.as_deref() != Some(rendered.as_slice());

        tracing::info!(
            bytes = rendered.len(),
            changed,
            snapshot = %serde_json::to_string(snapshot).unwrap_or_default(),
            "called ProxyManager::set_config()"
        );
        tracing::debug!(config = %String::from_utf8_lossy(&rendered), "Rendered config");
        self.journal.record(Action::SetConfig {
            bytes: rendered.len(),
            changed,
        });

        if !changed {
            return Ok(ApplyOutcome::Unchanged);
        }

        if self.state == ProxyState::Running {
            self.reload().await?;
            self.applied = Some(rendered);
            Ok(ApplyOutcome::Reloaded)
        } else {
            Ok(ApplyOutcome::Written)
        }
    }

    async fn start(&mut self) -> Result<()> {
        tracing::info!("called ProxyManager::start()");
        self.journal.record(Action::Start);
        self.applied = None;
        self.state = ProxyState::Running;
        Ok(())
    }

    async fn reload(&mut self) -> Result<()> {
        tracing::info!("called ProxyManager::reload()");
        self.journal.record(Action::Reload);
        Ok(())
    }
}
