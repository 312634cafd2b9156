//! Lifecycle of an HTTP server child process used by the relay bridge

use super::probe_blocking;
use anyhow::{Context, Result, bail};
use std::ffi::OsStr;
use std::net::{Ipv4Addr, TcpListener};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use url::Url;

const READY_POLL_INTERVAL_MS: u64 = 100;

/// A running server child. Killed on [`ServerProcess::shutdown`] or drop.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    base_url: Url,
}

impl ServerProcess {
    /// Start this executable as `http` on a free loopback port
    #[inline]
    pub async fn spawn_current_exe(config_dir: &Path, startup_timeout: Duration) -> Result<Self> {
        let program = std::env::current_exe().context("Failed to locate the current executable")?;
        let port = free_port()?;
        let base_url = Url::parse(&format!("http://{}:{}/", Ipv4Addr::LOCALHOST, port))
            .context("Failed to build child server URL")?;

        let args = [
            "--config-dir".to_string(),
            config_dir.display().to_string(),
            "http".to_string(),
            "--host".to_string(),
            Ipv4Addr::LOCALHOST.to_string(),
            "--port".to_string(),
            port.to_string(),
        ];

        Self::launch(&program, &args, base_url, startup_timeout).await
    }

    /// Start `program` and wait until `base_url` answers
    #[inline]
    pub async fn launch<P, S>(
        program: P,
        args: &[S],
        base_url: Url,
        startup_timeout: Duration,
    ) -> Result<Self>
    where
        P: AsRef<OsStr>,
        S: AsRef<OsStr>,
    {
        let program = program.as_ref();
        let child = Command::new(program)
            .args(args)
            // stdout belongs to the bridge's protocol stream
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start server process {}", program.to_string_lossy()))?;

        info!(
            "Started server process {} (pid {:?}) for {}",
            program.to_string_lossy(),
            child.id(),
            base_url
        );

        let mut process = Self { child, base_url };
        if let Err(e) = process.wait_until_ready(startup_timeout).await {
            process.shutdown().await;
            return Err(e);
        }
        Ok(process)
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[inline]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait_until_ready(&mut self, startup_timeout: Duration) -> Result<()> {
        let started = Instant::now();

        loop {
            if let Some(status) = self
                .child
                .try_wait()
                .context("Failed to poll server process")?
            {
                bail!("Server process exited before becoming ready ({})", status);
            }

            let base_url = self.base_url.clone();
            let probe = tokio::task::spawn_blocking(move || probe_blocking(&base_url))
                .await
                .context("Probe task failed")?;
            match probe {
                Ok(()) => {
                    info!(
                        "Server process ready after {:?}",
                        started.elapsed()
                    );
                    return Ok(());
                }
                Err(e) => debug!("Server not ready yet: {:#}", e),
            }

            if started.elapsed() >= startup_timeout {
                bail!(
                    "Server process did not become ready within {:?}",
                    startup_timeout
                );
            }

            tokio::time::sleep(Duration::from_millis(READY_POLL_INTERVAL_MS)).await;
        }
    }

    /// Kill the child and reap it
    #[inline]
    pub async fn shutdown(&mut self) {
        if let Ok(Some(status)) = self.child.try_wait() {
            debug!("Server process already exited ({})", status);
            return;
        }

        match self.child.kill().await {
            Ok(()) => info!("Server process stopped"),
            Err(e) => warn!("Failed to stop server process: {}", e),
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        // No-op when the child was already reaped
        let _ = self.child.start_kill();
    }
}

/// Ask the OS for an unused loopback port
#[inline]
pub fn free_port() -> Result<u16> {
    let listener =
        TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).context("Failed to reserve a local port")?;
    let port = listener
        .local_addr()
        .context("Failed to read reserved port")?
        .port();
    Ok(port)
}
