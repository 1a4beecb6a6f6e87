//! Process supervisor
//!
//! Runs one crawler process per configured source, polls them for liveness and
//! applies the configured policy when one exits: relaunch just that process,
//! or take everything down and exit with the failing process's code. An
//! interrupt kills all children and exits with 130.

mod policy;
mod process;

pub use policy::{ExitAction, Policy};
pub use process::{ProcessSpec, ProcessTable, SupervisedProcess};

use crate::config::{Config, SupervisorConfig};
use crate::shutdown;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Conventional exit code after SIGINT
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Errors raised while starting supervised processes
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to spawn '{name}': {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },

    #[error("Empty command for '{0}'")]
    EmptyCommand(String),

    #[error("No sources to supervise")]
    NoSources,
}

/// Builds one process spec per source
///
/// Sources without an explicit `command` run this executable as
/// `crawl --config <config_path> --source <name> --forever`.
pub fn process_specs(config: &Config, config_path: &Path, exe: &Path) -> Vec<ProcessSpec> {
    config
        .sources
        .iter()
        .map(|source| {
            let command = source.command.clone().unwrap_or_else(|| {
                vec![
                    exe.display().to_string(),
                    "crawl".to_string(),
                    "--config".to_string(),
                    config_path.display().to_string(),
                    "--source".to_string(),
                    source.name.clone(),
                    "--forever".to_string(),
                ]
            });
            ProcessSpec::new(&source.name, command)
        })
        .collect()
}

/// Keeps the process table alive according to a [`Policy`]
#[derive(Debug)]
pub struct Supervisor {
    table: ProcessTable,
    policy: Policy,
    poll_tick: Duration,
}

impl Supervisor {
    /// Launches every process
    ///
    /// A process that cannot be spawned at startup is an error.
    pub fn start(specs: Vec<ProcessSpec>, config: &SupervisorConfig) -> Result<Self, SupervisorError> {
        Self::start_with(specs, Policy::from(config), config.poll_tick())
    }

    pub fn start_with(
        specs: Vec<ProcessSpec>,
        policy: Policy,
        poll_tick: Duration,
    ) -> Result<Self, SupervisorError> {
        if specs.is_empty() {
            return Err(SupervisorError::NoSources);
        }
        let table = ProcessTable::launch_all(specs)?;
        tracing::info!(processes = table.len(), policy = ?policy.kind(), "supervisor started");

        Ok(Self {
            table,
            policy,
            poll_tick,
        })
    }

    /// Pids of the running processes, `None` for ones currently down
    pub fn pids(&self) -> Vec<Option<u32>> {
        self.table.iter().map(SupervisedProcess::pid).collect()
    }

    /// Restart counts, in configuration order
    pub fn restarts(&self) -> Vec<u32> {
        self.table.iter().map(SupervisedProcess::restarts).collect()
    }

    /// One liveness pass
    ///
    /// Returns the exit code the supervisor must exit with, if any.
    pub async fn step(&mut self) -> Option<i32> {
        let mut exit = None;

        for process in self.table.iter_mut() {
            if process.restart_if_due() {
                continue;
            }

            let Some(code) = process.poll_exit() else {
                continue;
            };
            tracing::warn!(name = %process.name(), code, "process exited");

            match self.policy.on_exit(code) {
                ExitAction::Restart { after } => process.schedule_restart(after),
                ExitAction::Exit(code) => {
                    exit = Some(code);
                    break;
                }
            }
        }

        if let Some(code) = exit {
            tracing::error!(code, "fail-fast: stopping all processes");
            self.table.terminate_all().await;
        }
        exit
    }

    /// Polls until the policy ends supervision or shutdown is requested
    pub async fn run(&mut self, mut shutdown_rx: watch::Receiver<bool>) -> i32 {
        loop {
            if let Some(code) = self.step().await {
                return code;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_tick) => {}
                _ = shutdown::requested(&mut shutdown_rx) => {
                    tracing::info!("interrupted, stopping all processes");
                    self.table.terminate_all().await;
                    return INTERRUPTED_EXIT_CODE;
                }
            }
        }
    }

    /// Kills every running process
    pub async fn stop(&mut self) {
        self.table.terminate_all().await;
    }
}
