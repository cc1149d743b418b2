use std::fmt;

/// Lifecycle of one supervisor run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Init,
    ResolvingPaths,
    LaunchingHub,
    AwaitingReady,
    Ready,
    RunningTransport,
    ShuttingDown,
    Terminated,
    Failed,
}

impl SupervisorState {
    /// Whether `next` is a legal successor of `self`.
    ///
    /// Shutdown can be entered from any live state; it is the single path
    /// to `Terminated`.
    pub fn can_transition_to(self, next: SupervisorState) -> bool {
        use SupervisorState::*;

        match (self, next) {
            (Terminated, _) => false,
            (Failed, ShuttingDown) => true,
            (Failed, _) => false,
            (ShuttingDown, Terminated) => true,
            (ShuttingDown, _) => false,
            (_, ShuttingDown) => true,
            (Init, ResolvingPaths)
            | (ResolvingPaths, LaunchingHub)
            | (LaunchingHub, AwaitingReady)
            | (AwaitingReady, Ready)
            | (AwaitingReady, Failed)
            | (Ready, RunningTransport) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Init => "init",
            SupervisorState::ResolvingPaths => "resolving_paths",
            SupervisorState::LaunchingHub => "launching_hub",
            SupervisorState::AwaitingReady => "awaiting_ready",
            SupervisorState::Ready => "ready",
            SupervisorState::RunningTransport => "running_transport",
            SupervisorState::ShuttingDown => "shutting_down",
            SupervisorState::Terminated => "terminated",
            SupervisorState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::SupervisorState::*;

    #[test]
    fn test_happy_path_is_legal() {
        let path = [
            Init,
            ResolvingPaths,
            LaunchingHub,
            AwaitingReady,
            Ready,
            RunningTransport,
            ShuttingDown,
            Terminated,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_shutdown_reachable_from_every_live_state() {
        for state in [
            Init,
            ResolvingPaths,
            LaunchingHub,
            AwaitingReady,
            Ready,
            RunningTransport,
            Failed,
        ] {
            assert!(state.can_transition_to(ShuttingDown), "{state}");
        }
        assert!(!Terminated.can_transition_to(ShuttingDown));
        assert!(!ShuttingDown.can_transition_to(ShuttingDown));
    }

    #[test]
    fn test_no_transport_without_ready() {
        assert!(!AwaitingReady.can_transition_to(RunningTransport));
        assert!(!LaunchingHub.can_transition_to(Ready));
        assert!(!Failed.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Failed));
    }
}
