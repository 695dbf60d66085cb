use anyhow::{Context, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::http::OperatorCommand;
use crate::remote::{OscMessage, OscSender, RemoteController};
use crate::session::{SessionOrchestrator, SessionStatus, Stage};
use crate::telemetry::{EventBus, HeadRotation, PupilometrySample, SubscriptionId, SyntheticTracker};

/// Channel ends the tick loop reads from and publishes to
pub struct RunnerChannels {
    pub commands: mpsc::Receiver<OperatorCommand>,
    pub remote: mpsc::Receiver<OscMessage>,
    pub status: watch::Sender<SessionStatus>,
}

/// The frame loop: the only place the orchestrator, stage and remote
/// controller are touched. Background tasks reach it through channels.
///
/// Runs on the task that created it; the capture device is not `Send`.
pub struct Runner<S: Stage> {
    orchestrator: SessionOrchestrator<S>,
    controller: RemoteController,
    sender: Arc<Mutex<OscSender>>,
    pupilometry: Arc<EventBus<PupilometrySample>>,
    head_rotation: Arc<EventBus<HeadRotation>>,
    subscriptions: (SubscriptionId, SubscriptionId),
    channels: RunnerChannels,
    tracker: Option<SyntheticTracker>,
    exit_when_finished: bool,
    ticks: u64,
}

impl<S: Stage> Runner<S> {
    /// Wire the sender to the telemetry buses and take over the loop inputs
    pub fn new(
        orchestrator: SessionOrchestrator<S>,
        controller: RemoteController,
        sender: Arc<Mutex<OscSender>>,
        pupilometry: Arc<EventBus<PupilometrySample>>,
        head_rotation: Arc<EventBus<HeadRotation>>,
        channels: RunnerChannels,
    ) -> Self {
        let forward = Arc::clone(&sender);
        let pupil_id = pupilometry.subscribe(move |sample: &PupilometrySample| {
            lock(&forward).send_pupilometry(sample);
        });
        let forward = Arc::clone(&sender);
        let head_id = head_rotation.subscribe(move |rotation: &HeadRotation| {
            lock(&forward).send_head_rotation(rotation);
        });

        Self {
            orchestrator,
            controller,
            sender,
            pupilometry,
            head_rotation,
            subscriptions: (pupil_id, head_id),
            channels,
            tracker: None,
            exit_when_finished: false,
            ticks: 0,
        }
    }

    /// Publish stand-in eye tracking every tick
    pub fn with_tracker(mut self, tracker: SyntheticTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Stop the loop once the session completes or aborts
    pub fn exit_when_finished(mut self, exit: bool) -> Self {
        self.exit_when_finished = exit;
        self
    }

    pub fn orchestrator(&self) -> &SessionOrchestrator<S> {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut SessionOrchestrator<S> {
        &mut self.orchestrator
    }

    pub fn controller(&self) -> &RemoteController {
        &self.controller
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Replay cached screen positions onto the stage
    pub fn restore_positions(&mut self) -> usize {
        let restored = self.controller.restore_positions(self.orchestrator.stage_mut());
        if restored > 0 {
            info!("Restored {} screen positions", restored);
        }
        restored
    }

    /// Run one frame. Returns false when the loop should stop.
    pub fn step(&mut self) -> bool {
        self.ticks += 1;

        while let Ok(command) = self.channels.commands.try_recv() {
            let result = match command {
                OperatorCommand::Ready => self.orchestrator.signal_ready(),
                OperatorCommand::StopRecording => self.orchestrator.signal_stop_recording(),
            };
            if let Err(e) = result {
                error!("Operator {:?} failed: {}", command, e);
            }
        }

        while let Ok(msg) = self.channels.remote.try_recv() {
            self.controller.process(&msg, self.orchestrator.stage_mut());
        }

        if let Some(tracker) = &self.tracker {
            tracker.publish();
        }

        match self.orchestrator.tick() {
            Ok(events) => {
                let mut sender = lock(&self.sender);
                for event in &events {
                    sender.send_stage_event(event);
                }
            }
            Err(e) => error!("Session tick failed: {}", e),
        }

        lock(&self.sender).refresh();

        let status = self.orchestrator.status();
        self.channels.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });

        !(self.exit_when_finished && self.orchestrator.state().is_terminal())
    }

    /// Tick at `tick_hz` until finished or interrupted with Ctrl-C
    pub async fn run(mut self, tick_hz: f64) -> Result<()> {
        let period = Duration::from_secs_f64(1.0 / tick_hz.max(1.0));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!("Frame loop running at {:.0}Hz", 1.0 / period.as_secs_f64());

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !self.step() {
                        info!("Session finished in state {}", self.orchestrator.state());
                        break;
                    }
                }
                result = &mut shutdown => {
                    result.context("Failed to listen for Ctrl-C")?;
                    info!("Interrupted, shutting down");
                    break;
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Abort any running session and detach from the buses
    pub fn shutdown(&mut self) {
        self.orchestrator.interrupt();
        self.pupilometry.unsubscribe(self.subscriptions.0);
        self.head_rotation.unsubscribe(self.subscriptions.1);
        self.channels.status.send_replace(self.orchestrator.status());
        debug!("Frame loop stopped after {} ticks", self.ticks);
    }
}

fn lock(sender: &Mutex<OscSender>) -> MutexGuard<'_, OscSender> {
    sender.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
