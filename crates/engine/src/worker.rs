//! Background monitor worker: stands in for the scheduler collaborator by
//! running a full sweep at startup and then on a fixed interval.

use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::monitor::ThresholdMonitor;

/// Monitor worker configuration.
#[derive(Debug, Clone)]
pub struct MonitorWorkerConfig {
    /// Time between full sweeps.
    pub interval: Duration,
    /// Name for the worker thread and its logs.
    pub name: String,
}

impl Default for MonitorWorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            name: "threshold-monitor".to_string(),
        }
    }
}

impl MonitorWorkerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Handle to control a running worker.
#[derive(Debug)]
pub struct MonitorWorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl MonitorWorkerHandle {
    /// Request graceful shutdown and wait for the thread to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Spawns sweep loops on a dedicated thread.
pub struct MonitorWorker;

impl MonitorWorker {
    pub fn spawn(
        monitor: Arc<ThresholdMonitor>,
        config: MonitorWorkerConfig,
    ) -> MonitorWorkerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let name = config.name.clone();
        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                worker_loop(monitor, config, shutdown_rx);
            })
            .expect("failed to spawn monitor worker thread");

        MonitorWorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

fn worker_loop(
    monitor: Arc<ThresholdMonitor>,
    config: MonitorWorkerConfig,
    shutdown_rx: mpsc::Receiver<()>,
) {
    info!(worker = %config.name, "monitor worker started");

    // Startup sweep before the first interval elapses.
    run_sweep(&monitor, &config.name);

    loop {
        match shutdown_rx.recv_timeout(config.interval) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => run_sweep(&monitor, &config.name),
        }
    }

    info!(worker = %config.name, "monitor worker stopped");
}

fn run_sweep(monitor: &ThresholdMonitor, name: &str) {
    match monitor.sweep(Utc::now()) {
        Ok(stats) => info!(
            worker = %name,
            inventories = stats.inventories_scanned,
            expired = stats.units_expired,
            alerts = stats.alerts_emitted,
            "sweep finished"
        ),
        Err(err) => warn!(worker = %name, error = %err, "sweep failed"),
    }
}
