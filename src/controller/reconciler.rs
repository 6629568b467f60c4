//! Controller driving topology into the proxy.

use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::health::{Phase, StatusHandle};
use crate::proxy::{ApplyOutcome, ProxyManager, ProxyState};
use crate::topology::{Snapshot, TopologyProvider};

/// Stage of a tick that failed, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fetch,
    Apply,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Apply => "apply",
        }
    }
}

/// Owns the topology provider and proxy manager for the controller's lifetime.
pub struct Controller {
    provider: Box<dyn TopologyProvider>,
    manager: Box<dyn ProxyManager>,
    refresh_interval: Duration,
    status: StatusHandle,
}

impl Controller {
    pub fn new(
        provider: Box<dyn TopologyProvider>,
        manager: Box<dyn ProxyManager>,
        refresh_interval: Duration,
        status: StatusHandle,
    ) -> Self {
        Self {
            provider,
            manager,
            refresh_interval,
            status,
        }
    }

    /// Make sure nginx is running with at least the default config.
    ///
    /// Every error here is fatal to the controller.
    pub async fn initialize(&mut self) -> Result<()> {
        self.status.update(|r| r.phase = Phase::Initializing);

        let state = self.manager.status().await?;
        if state == ProxyState::Running {
            tracing::info!("nginx already running; adopting it");
        } else {
            tracing::info!(?state, "Writing default config before start");
            self.manager.set_config(&Snapshot::empty()).await?;
            self.manager.start().await?;
        }

        self.status.update(|r| r.phase = Phase::Steady);
        tracing::info!("Controller initialized");
        Ok(())
    }

    /// One reconciliation pass: fetch topology and apply it.
    pub async fn tick(&mut self) -> Result<ApplyOutcome> {
        let result = self.reconcile().await;

        match &result {
            Ok(outcome) => {
                self.status.update(|r| {
                    r.ticks += 1;
                    r.last_outcome = Some(*outcome);
                    r.last_error = None;
                    r.consecutive_failures = 0;
                });
            }
            Err(e) => {
                let message = e.to_string();
                self.status.update(|r| {
                    r.ticks += 1;
                    r.last_error = Some(message);
                    r.consecutive_failures += 1;
                });
            }
        }

        result
    }

    async fn reconcile(&mut self) -> Result<ApplyOutcome> {
        let snapshot = match self.provider.fetch_topology().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(stage = Stage::Fetch.as_str(), error = %e, "Topology fetch failed");
                return Err(e);
            }
        };

        let http_groups = snapshot.http_groups().len();
        let tcp_services = snapshot.tcp_services().len();

        match self.manager.set_config(&snapshot).await {
            Ok(outcome) => {
                if outcome == ApplyOutcome::Unchanged {
                    tracing::debug!(http_groups, tcp_services, "Topology unchanged");
                } else {
                    tracing::info!(http_groups, tcp_services, ?outcome, "Topology applied");
                }
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(
                    stage = Stage::Apply.as_str(),
                    http_groups,
                    tcp_services,
                    error = %e,
                    "Applying topology failed; previous config stays live"
                );
                Err(e)
            }
        }
    }

    /// Initialize, then reconcile until `shutdown` fires.
    ///
    /// Returns `Err` only if initialization fails.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        self.initialize().await?;

        tracing::info!(
            refresh_interval_secs = self.refresh_interval.as_secs(),
            "Entering reconciliation loop"
        );

        loop {
            // Failures are logged inside tick and retried next period.
            let _ = self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.refresh_interval) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Reconciliation loop stopping");
                    break;
                }
            }
        }

        self.status.update(|r| r.phase = Phase::Stopped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::error::Error;
    use crate::proxy::{Action, ActionJournal, DryRunManager};
    use crate::render::{Renderer, StaticConfig};
    use crate::topology::{Endpoint, StaticProvider, TcpService};
    use async_trait::async_trait;

    fn dry_run() -> (DryRunManager, ActionJournal) {
        let renderer = Renderer::new(StaticConfig::from(&GatewayConfig::default())).unwrap();
        let manager = DryRunManager::new(renderer);
        let journal = manager.journal();
        (manager, journal)
    }

    fn tcp_snapshot() -> Snapshot {
        Snapshot::new(
            vec![],
            vec![TcpService {
                namespace: "ns1".into(),
                name: "svc1".into(),
                listen_port: 19822,
                target_port: 0,
                endpoints: vec![Endpoint::new("pod-a", "10.0.0.1", 5000)],
            }],
        )
        .unwrap()
    }

    fn controller(provider: StaticProvider, manager: impl ProxyManager + 'static) -> Controller {
        Controller::new(
            Box::new(provider),
            Box::new(manager),
            Duration::from_millis(10),
            StatusHandle::new(),
        )
    }

    #[tokio::test]
    async fn test_initialize_starts_stopped_proxy() {
        let (manager, journal) = dry_run();
        let mut c = controller(StaticProvider::new(Snapshot::empty()), manager);

        c.initialize().await.unwrap();

        let actions = journal.actions();
        assert_eq!(actions[0], Action::Status(ProxyState::Stopped));
        assert!(matches!(actions[1], Action::SetConfig { changed: true, .. }));
        assert_eq!(actions[2], Action::Start);
        assert_eq!(c.status.load().phase, Phase::Steady);
    }

    #[tokio::test]
    async fn test_repeated_ticks_reload_once() {
        let (manager, journal) = dry_run();
        let mut c = controller(StaticProvider::new(tcp_snapshot()), manager);
        c.initialize().await.unwrap();

        assert_eq!(c.tick().await.unwrap(), ApplyOutcome::Reloaded);
        assert_eq!(c.tick().await.unwrap(), ApplyOutcome::Unchanged);
        assert_eq!(c.tick().await.unwrap(), ApplyOutcome::Unchanged);

        assert_eq!(journal.count(|a| *a == Action::Reload), 1);
        assert_eq!(c.status.load().ticks, 3);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_fatal() {
        let (manager, journal) = dry_run();
        let mut c = controller(StaticProvider::failing("api unreachable"), manager);
        c.initialize().await.unwrap();

        let err = c.tick().await.unwrap_err();
        assert!(matches!(err, Error::TopologyFetch(_)));
        assert!(!err.is_fatal());

        let report = c.status.load();
        assert_eq!(report.consecutive_failures, 1);
        assert!(report.last_error.as_deref().unwrap().contains("api unreachable"));
        assert_eq!(journal.count(|a| matches!(a, Action::SetConfig { .. })), 1);
    }

    struct BrokenStatus;

    #[async_trait]
    impl ProxyManager for BrokenStatus {
        async fn status(&self) -> Result<ProxyState> {
            Err(Error::Status {
                path: "/var/run/nginx.pid".into(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
        async fn set_config(&mut self, _: &Snapshot) -> Result<ApplyOutcome> {
            unreachable!("set_config after failed probe")
        }
        async fn start(&mut self) -> Result<()> {
            unreachable!("start after failed probe")
        }
        async fn reload(&mut self) -> Result<()> {
            unreachable!("reload after failed probe")
        }
    }

    #[tokio::test]
    async fn test_unknown_state_aborts_initialization() {
        let c = controller(StaticProvider::new(Snapshot::empty()), BrokenStatus);
        let shutdown = crate::lifecycle::Shutdown::new();

        let result = c.run(shutdown.subscribe()).await;
        assert!(matches!(result, Err(Error::Status { .. })));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (manager, journal) = dry_run();
        let status = StatusHandle::new();
        let c = Controller::new(
            Box::new(StaticProvider::new(tcp_snapshot())),
            Box::new(manager),
            Duration::from_secs(3600),
            status.clone(),
        );
        let shutdown = crate::lifecycle::Shutdown::new();
        let rx = shutdown.subscribe();

        let handle = tokio::spawn(c.run(rx));
        // first tick fires without waiting a full period
        tokio::time::timeout(Duration::from_secs(5), async {
            while status.load().ticks == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        shutdown.trigger();
        handle.await.unwrap().unwrap();
        assert_eq!(status.load().phase, Phase::Stopped);
        assert_eq!(journal.count(|a| *a == Action::Reload), 1);
    }
}
