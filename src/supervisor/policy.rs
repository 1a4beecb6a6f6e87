use crate::config::{PolicyKind, SupervisorConfig};
use std::time::Duration;

/// What the supervisor does after a child exits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitAction {
    /// Relaunch that child once the delay has passed
    Restart { after: Duration },
    /// Stop everything and exit with this code
    Exit(i32),
}

/// Reaction to child exits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    kind: PolicyKind,
    restart_delay: Duration,
}

impl Policy {
    pub fn new(kind: PolicyKind, restart_delay: Duration) -> Self {
        Self {
            kind,
            restart_delay,
        }
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    /// Decides what to do about a child that exited with `code`
    ///
    /// Children killed by a signal have no code and are reported as 1.
    pub fn on_exit(&self, code: i32) -> ExitAction {
        match self.kind {
            PolicyKind::Restart => ExitAction::Restart {
                after: self.restart_delay,
            },
            PolicyKind::FailFast => ExitAction::Exit(code),
        }
    }
}

impl From<&SupervisorConfig> for Policy {
    fn from(config: &SupervisorConfig) -> Self {
        Self::new(config.policy, config.restart_delay())
    }
}
