//! nginx process manager.
//!
//! # Responsibilities
//! - Probe liveness via the PID file
//! - Stage, validate and atomically install rendered configs
//! - Invoke `nginx -t`, `nginx` and `nginx -s reload` with a bounded timeout

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::NginxConfig;
use crate::error::{CommandError, Error, Result};
use crate::proxy::{ApplyOutcome, ProxyManager, ProxyState};
use crate::render::Renderer;
use crate::topology::Snapshot;

const PID_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A single nginx invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Invocation {
    Validate,
    Start,
    Reload,
}

impl Invocation {
    fn verb(self) -> &'static [&'static str] {
        match self {
            Invocation::Validate => &["-t"],
            Invocation::Start => &[],
            Invocation::Reload => &["-s", "reload"],
        }
    }

    /// The daemonized master would hold a piped stderr open, so start discards it.
    fn captures_stderr(self) -> bool {
        !matches!(self, Invocation::Start)
    }
}

/// Manages a real nginx process.
#[derive(Debug)]
pub struct NginxManager {
    config: NginxConfig,
    renderer: Renderer,
    /// Bytes of the last config installed on disk and in effect.
    applied: Option<Vec<u8>>,
}

impl NginxManager {
    pub fn new(config: NginxConfig, renderer: Renderer) -> Self {
        Self {
            config,
            renderer,
            applied: None,
        }
    }

    pub fn config_file(&self) -> &Path {
        &self.config.config_file
    }

    /// Sibling of the config file, so the final rename stays on one filesystem.
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .config
            .config_file
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("nginx.conf"));
        name.push(".pending");
        self.config.config_file.with_file_name(name)
    }

    async fn run(&self, config_file: &Path, invocation: Invocation) -> std::result::Result<(), CommandError> {
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(&self.config.binary_args)
            .arg("-c")
            .arg(config_file)
            .args(invocation.verb())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(if invocation.captures_stderr() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        tracing::debug!(
            binary = ?self.config.binary,
            config = ?config_file,
            verb = ?invocation.verb(),
            "Invoking nginx"
        );

        let limit = self.config.command_timeout();
        let output = match timeout(limit, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(CommandError::Spawn {
                    program: self.config.binary.display().to_string(),
                    source,
                })
            }
            Err(_) => return Err(CommandError::Timeout(limit)),
        };

        if output.status.success() {
            tracing::debug!(verb = ?invocation.verb(), "nginx command succeeded");
            Ok(())
        } else {
            Err(CommandError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn validate(&self, path: &Path) -> Result<()> {
        self.run(path, Invocation::Validate)
            .await
            .map_err(|e| Error::ReloadValidation {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    async fn signal_reload(&self) -> Result<()> {
        self.run(&self.config.config_file, Invocation::Reload)
            .await
            .map_err(|e| Error::ReloadValidation {
                path: self.config.config_file.clone(),
                reason: format!("reload signal failed: {}", e),
            })
    }

    async fn stage(&self, rendered: &[u8]) -> Result<PathBuf> {
        let staged = self.staging_path();
        let write_error = |source: std::io::Error| Error::ConfigWrite {
            path: staged.clone(),
            source,
        };

        let mut file = tokio::fs::File::create(&staged).await.map_err(write_error)?;
        file.write_all(rendered).await.map_err(write_error)?;
        file.sync_all().await.map_err(write_error)?;
        Ok(staged)
    }

    async fn install(&self, staged: &Path) -> Result<()> {
        tokio::fs::rename(staged, &self.config.config_file)
            .await
            .map_err(|source| Error::ConfigWrite {
                path: self.config.config_file.clone(),
                source,
            })
    }

    /// The launcher exits before the daemonized master writes its PID file.
    async fn wait_until_running(&self) -> Result<()> {
        let limit = self.config.command_timeout();
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            match self.status().await {
                Ok(ProxyState::Running) => return Ok(()),
                Ok(_) => {}
                Err(e) => return Err(Error::ProcessStart(e.to_string())),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::ProcessStart(format!(
                    "pid file {:?} did not appear within {:?}",
                    self.config.pid_file, limit
                )));
            }
            tokio::time::sleep(PID_POLL_INTERVAL).await;
        }
    }

    async fn discard(&self, staged: &Path) {
        if let Err(e) = tokio::fs::remove_file(staged).await {
            tracing::warn!(path = ?staged, error = %e, "Failed removing rejected config");
        }
    }
}

#[async_trait]
impl ProxyManager for NginxManager {
    async fn status(&self) -> Result<ProxyState> {
        match tokio::fs::metadata(&self.config.pid_file).await {
            Ok(_) => Ok(ProxyState::Running),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProxyState::Stopped),
            Err(source) => Err(Error::Status {
                path: self.config.pid_file.clone(),
                source,
            }),
        }
    }

    async fn set_config(&mut self, snapshot: &Snapshot) -> Result<ApplyOutcome> {
        let rendered = self.renderer.render(snapshot)?;
        if self.applied.as_deref() == Some(rendered.as_slice()) {
            tracing::debug!("Rendered config unchanged, skipping write");
            return Ok(ApplyOutcome::Unchanged);
        }

        let state = self.status().await?;
        let staged = self.stage(&rendered).await?;

        if state != ProxyState::Running {
            self.install(&staged).await?;
            tracing::info!(path = ?self.config.config_file, bytes = rendered.len(), "Config written");
            // Nothing has loaded these bytes yet; the next apply against a
            // running nginx must still validate and reload.
            self.applied = None;
            return Ok(ApplyOutcome::Written);
        }

        if let Err(e) = self.validate(&staged).await {
            self.discard(&staged).await;
            return Err(e);
        }
        self.install(&staged).await?;
        self.signal_reload().await?;

        tracing::info!(path = ?self.config.config_file, bytes = rendered.len(), "Config applied and nginx reloaded");
        self.applied = Some(rendered);
        Ok(ApplyOutcome::Reloaded)
    }

    async fn start(&mut self) -> Result<()> {
        self.applied = None;

        if self.status().await? == ProxyState::Running {
            tracing::info!("nginx already running");
            return Ok(());
        }

        tracing::info!(config = ?self.config.config_file, "Starting nginx");
        self.validate(&self.config.config_file)
            .await
            .map_err(|e| Error::ProcessStart(e.to_string()))?;
        self.run(&self.config.config_file, Invocation::Start)
            .await
            .map_err(|e| Error::ProcessStart(e.to_string()))?;
        self.wait_until_running().await?;

        tracing::info!("nginx started");
        Ok(())
    }

    /// Re-validate and re-signal the config already installed on disk.
    ///
    /// This does not stage anything: new configs go through `set_config`,
    /// which validates a staged copy before it can replace the live file.
    async fn reload(&mut self) -> Result<()> {
        tracing::info!("Reloading nginx");
        self.validate(&self.config.config_file).await?;
        self.signal_reload().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::StaticConfig;

    fn manager(dir: &Path) -> NginxManager {
        let config = NginxConfig {
            config_file: dir.join("nginx.conf"),
            pid_file: dir.join("nginx.pid"),
            ..NginxConfig::default()
        };
        let renderer = Renderer::new(StaticConfig::from(&crate::config::GatewayConfig::default())).unwrap();
        NginxManager::new(config, renderer)
    }

    #[test]
    fn test_staging_path_is_sibling() {
        let m = manager(Path::new("/etc/nginx"));
        assert_eq!(m.staging_path(), PathBuf::from("/etc/nginx/nginx.conf.pending"));
    }

    #[tokio::test]
    async fn test_status_follows_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        assert_eq!(m.status().await.unwrap(), ProxyState::Stopped);

        std::fs::write(dir.path().join("nginx.pid"), "1234\n").unwrap();
        assert_eq!(m.status().await.unwrap(), ProxyState::Running);
    }

    #[tokio::test]
    async fn test_status_unknown_on_probe_error() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("file");
        std::fs::write(&not_a_dir, "").unwrap();

        let m = manager(&not_a_dir);
        assert!(matches!(m.status().await, Err(Error::Status { .. })));
    }

    #[tokio::test]
    async fn test_write_without_running_process() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = manager(dir.path());

        let outcome = m.set_config(&Snapshot::empty()).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Written);
        let on_disk = std::fs::read_to_string(dir.path().join("nginx.conf")).unwrap();
        assert!(on_disk.contains("listen 7332;"));
        assert!(!dir.path().join("nginx.conf.pending").exists());

        // nothing has loaded the file, so it is written again rather than skipped
        let outcome = m.set_config(&Snapshot::empty()).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Written);
    }

    #[tokio::test]
    async fn test_config_written_while_stopped_is_reloaded_once_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = manager(dir.path());
        m.config.binary = PathBuf::from("true");
        m.set_config(&Snapshot::empty()).await.unwrap();

        std::fs::write(dir.path().join("nginx.pid"), "1\n").unwrap();
        assert_eq!(m.set_config(&Snapshot::empty()).await.unwrap(), ApplyOutcome::Reloaded);
        assert_eq!(m.set_config(&Snapshot::empty()).await.unwrap(), ApplyOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_start_fails_when_pid_file_never_appears() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = manager(dir.path());
        m.config.binary = PathBuf::from("true");
        m.config.command_timeout_secs = 1;
        m.set_config(&Snapshot::empty()).await.unwrap();

        let err = m.start().await.unwrap_err();
        assert!(matches!(err, Error::ProcessStart(_)));
        assert!(err.to_string().contains("did not appear"), "{}", err);
    }

    #[tokio::test]
    async fn test_missing_binary_fails_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = manager(dir.path());
        m.config.binary = dir.path().join("no-such-nginx");
        m.set_config(&Snapshot::empty()).await.unwrap();

        let err = m.start().await.unwrap_err();
        assert!(matches!(err, Error::ProcessStart(_)));
        assert!(err.is_fatal());
    }
}
