//! Cooperative run/pause/stop signalling between supervisor and run-loop.

use std::time::Duration;
use tokio::sync::watch;

/// Command the supervisor last issued to a run-loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunCommand {
    /// Keep running cycles.
    Run,
    /// Finish the in-flight cycle, then wait.
    Pause,
    /// Stop at the next suspension point.
    Stop,
}

/// Supervisor side of the control channel.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    sender: watch::Sender<RunCommand>,
}

/// Run-loop side of the control channel, observed at suspension points.
#[derive(Debug, Clone)]
pub struct ControlSignal {
    receiver: watch::Receiver<RunCommand>,
}

/// Creates a connected handle and signal starting in [`RunCommand::Run`].
#[must_use]
pub fn control_channel() -> (ControlHandle, ControlSignal) {
    let (sender, receiver) = watch::channel(RunCommand::Run);
    (ControlHandle { sender }, ControlSignal { receiver })
}

impl ControlHandle {
    /// Requests running (or resuming).
    pub fn run(&self) {
        self.sender.send_replace(RunCommand::Run);
    }

    /// Requests a pause after the in-flight cycle.
    pub fn pause(&self) {
        self.sender.send_replace(RunCommand::Pause);
    }

    /// Requests a stop.
    pub fn stop(&self) {
        self.sender.send_replace(RunCommand::Stop);
    }

    /// Returns the last issued command.
    #[must_use]
    pub fn current(&self) -> RunCommand {
        *self.sender.borrow()
    }
}

impl ControlSignal {
    /// Returns the current command. A dropped handle reads as
    /// [`RunCommand::Stop`].
    #[must_use]
    pub fn current(&self) -> RunCommand {
        if self.receiver.has_changed().is_err() {
            return RunCommand::Stop;
        }
        *self.receiver.borrow()
    }

    /// Returns whether a stop has been requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.current() == RunCommand::Stop
    }

    /// Resolves once a stop is requested.
    pub async fn stop_requested(&self) {
        self.wait_until(|command| command == RunCommand::Stop).await;
    }

    /// Resolves with the first command other than [`RunCommand::Pause`].
    pub async fn resumed(&self) -> RunCommand {
        self.wait_until(|command| command != RunCommand::Pause).await
    }

    /// Sleeps for `duration` unless a pause or stop arrives first; returns
    /// the command in force when it wakes.
    pub async fn sleep(&self, duration: Duration) -> RunCommand {
        tokio::select! {
            () = tokio::time::sleep(duration) => self.current(),
            command = self.wait_until(|next| next != RunCommand::Run) => command,
        }
    }

    async fn wait_until(&self, accept: impl Fn(RunCommand) -> bool) -> RunCommand {
        let mut receiver = self.receiver.clone();
        receiver
            .wait_for(|command| accept(*command))
            .await
            .map_or(RunCommand::Stop, |command| *command)
    }
}
