use super::SupervisorError;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::Instant;

/// Name and command line of one supervised process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub name: String,
    pub command: Vec<String>,
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command,
        }
    }

    fn spawn(&self) -> Result<Child, SupervisorError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| SupervisorError::EmptyCommand(self.name.clone()))?;

        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                name: self.name.clone(),
                source,
            })
    }
}

#[derive(Debug)]
enum ProcessState {
    Running(Child),
    /// Waiting for a relaunch at `restart_at`, or for good when `None`
    Exited {
        code: i32,
        restart_at: Option<Instant>,
    },
}

/// One child and its history
#[derive(Debug)]
pub struct SupervisedProcess {
    spec: ProcessSpec,
    state: ProcessState,
    restarts: u32,
    last_exit_code: Option<i32>,
}

impl SupervisedProcess {
    /// Launches the process
    pub fn launch(spec: ProcessSpec) -> Result<Self, SupervisorError> {
        let child = spec.spawn()?;
        tracing::info!(name = %spec.name, pid = ?child.id(), "process started");
        Ok(Self {
            spec,
            state: ProcessState::Running(child),
            restarts: 0,
            last_exit_code: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn pid(&self) -> Option<u32> {
        match &self.state {
            ProcessState::Running(child) => child.id(),
            ProcessState::Exited { .. } => None,
        }
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn last_exit_code(&self) -> Option<i32> {
        self.last_exit_code
    }

    /// Non-blocking liveness check; returns the exit code if the child just exited
    pub fn poll_exit(&mut self) -> Option<i32> {
        let ProcessState::Running(child) = &mut self.state else {
            return None;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                let code = status.code().unwrap_or(1);
                self.last_exit_code = Some(code);
                self.state = ProcessState::Exited {
                    code,
                    restart_at: None,
                };
                Some(code)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(name = %self.spec.name, "Failed to poll process: {}", e);
                None
            }
        }
    }

    /// Schedules a relaunch `delay` from now
    pub fn schedule_restart(&mut self, delay: Duration) {
        if let ProcessState::Exited { restart_at, .. } = &mut self.state {
            *restart_at = Some(Instant::now() + delay);
        }
    }

    /// Relaunches the process if a restart is due
    ///
    /// A failed spawn is logged and retried on the next call.
    pub fn restart_if_due(&mut self) -> bool {
        let ProcessState::Exited {
            code,
            restart_at: Some(at),
        } = &self.state
        else {
            return false;
        };
        let (code, at) = (*code, *at);
        if Instant::now() < at {
            return false;
        }

        match self.spec.spawn() {
            Ok(child) => {
                self.restarts += 1;
                tracing::info!(
                    name = %self.spec.name,
                    pid = ?child.id(),
                    previous_code = code,
                    restarts = self.restarts,
                    "process restarted"
                );
                self.state = ProcessState::Running(child);
                true
            }
            Err(e) => {
                tracing::error!(name = %self.spec.name, "Restart failed: {}", e);
                false
            }
        }
    }

    /// Kills the child if it is still running and waits for it
    pub async fn terminate(&mut self) {
        if let ProcessState::Running(child) = &mut self.state {
            if let Err(e) = child.kill().await {
                tracing::warn!(name = %self.spec.name, "Failed to kill process: {}", e);
            }
            tracing::info!(name = %self.spec.name, "process stopped");
        }
        self.state = ProcessState::Exited {
            code: self.last_exit_code.unwrap_or(1),
            restart_at: None,
        };
    }
}

/// All supervised processes, in configuration order
#[derive(Debug, Default)]
pub struct ProcessTable {
    processes: Vec<SupervisedProcess>,
}

impl ProcessTable {
    /// Launches every process; fails on the first one that cannot be spawned
    ///
    /// Processes already started are killed on drop when that happens.
    pub fn launch_all(specs: Vec<ProcessSpec>) -> Result<Self, SupervisorError> {
        let processes = specs
            .into_iter()
            .map(SupervisedProcess::launch)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { processes })
    }

    pub(crate) fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SupervisedProcess> {
        self.processes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SupervisedProcess> {
        self.processes.iter_mut()
    }

    pub async fn terminate_all(&mut self) {
        for process in self.processes.iter_mut() {
            process.terminate().await;
        }
    }
}
