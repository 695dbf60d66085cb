use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::osc::{OscArg, OscMessage};
use super::sender::OscSender;
use super::spec::{Rejection, RemoteCommand};
use crate::catalogue::VideoCatalogue;
use crate::prefs::PreferenceStore;
use crate::script::ScreenTransform;
use crate::session::{Stage, BACKGROUND_PLAYER, SCREEN_PLAYERS};

/// Outcome of one inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Applied(RemoteCommand),
    Rejected(Rejection),
}

/// Preference key for a screen's last position
pub fn position_key(player: usize) -> String {
    format!("videoPosition[{}]", player)
}

/// Inbound half of the remote protocol: validates messages and applies them
/// to the stage and the outbound sender.
pub struct RemoteController {
    catalogue: Arc<VideoCatalogue>,
    sender: Arc<Mutex<OscSender>>,
    prefs: PreferenceStore,
    remote_mode: bool,
    positions: BTreeMap<usize, [f32; 7]>,
}

impl RemoteController {
    pub fn new(
        catalogue: Arc<VideoCatalogue>,
        sender: Arc<Mutex<OscSender>>,
        prefs: PreferenceStore,
        remote_mode: bool,
    ) -> Self {
        Self {
            catalogue,
            sender,
            prefs,
            remote_mode,
            positions: BTreeMap::new(),
        }
    }

    pub fn remote_mode(&self) -> bool {
        self.remote_mode
    }

    pub fn set_remote_mode(&mut self, remote_mode: bool) {
        self.remote_mode = remote_mode;
    }

    /// Last position applied to each screen
    pub fn positions(&self) -> &BTreeMap<usize, [f32; 7]> {
        &self.positions
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.prefs
    }

    fn sender(&self) -> MutexGuard<'_, OscSender> {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validate and apply one message. Never panics on bad input.
    pub fn process(&mut self, msg: &OscMessage, stage: &mut dyn Stage) -> Dispatch {
        let command = match RemoteCommand::parse(msg, self.remote_mode) {
            Ok(command) => command,
            Err(rejection) => {
                match &rejection {
                    Rejection::Unrecognised { .. } => debug!("Ignoring message: {}", rejection),
                    _ => warn!("Rejected message {}: {}", msg, rejection),
                }
                return Dispatch::Rejected(rejection);
            }
        };

        match self.apply(&msg.address, &command, stage) {
            Ok(()) => Dispatch::Applied(command),
            Err(reason) => {
                let rejection = Rejection::InvalidValue {
                    address: msg.address.clone(),
                    reason,
                };
                warn!("Rejected message {}: {}", msg, rejection);
                Dispatch::Rejected(rejection)
            }
        }
    }

    fn player(&self, player: i32, allow_background: bool) -> Result<usize, String> {
        let valid = usize::try_from(player).ok().filter(|p| {
            SCREEN_PLAYERS.contains(p) || (allow_background && *p == BACKGROUND_PLAYER)
        });
        valid.ok_or_else(|| format!("no video player {}", player))
    }

    fn known_video(&self, video: &str) -> Result<(), String> {
        if self.catalogue.contains(video) {
            Ok(())
        } else {
            Err(format!("video {} is not in the catalogue", video))
        }
    }

    fn apply(
        &mut self,
        address: &str,
        command: &RemoteCommand,
        stage: &mut dyn Stage,
    ) -> Result<(), String> {
        match command {
            RemoteCommand::PlayVideo { player, video } => {
                let player = self.player(*player, true)?;
                self.known_video(video)?;
                stage.play_video(player, video);
            }
            RemoteCommand::SetIdleVideo { player, video } => {
                let player = self.player(*player, false)?;
                self.known_video(video)?;
                stage.set_idle_video(player, video);
            }
            RemoteCommand::StopVideo { player } => {
                stage.stop_video(self.player(*player, true)?);
            }
            RemoteCommand::StartIdle { player } => {
                stage.start_idle(self.player(*player, false)?);
            }
            RemoteCommand::Position { player, transform } => {
                let player = self.player(*player, false)?;
                stage.set_screen_transform(player, &ScreenTransform::from_array(*transform));
                self.positions.insert(player, *transform);
                if let Err(e) = self
                    .prefs
                    .set(&position_key(player), transform)
                    .and_then(|_| self.prefs.save())
                {
                    warn!("Failed to persist {}: {:#}", position_key(player), e);
                }
            }
            RemoteCommand::SetClientAddress { ip, port } => {
                let port = u16::try_from(*port)
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or_else(|| format!("invalid port {}", port))?;
                let ip: IpAddr = ip
                    .parse()
                    .map_err(|_| format!("invalid address {}", ip))?;

                let changed = self.sender().set_destination(SocketAddr::new(ip, port));
                if changed {
                    // Connects now so the positions are not dropped
                    let positions = self.positions.clone();
                    let mut sender = self.sender();
                    sender.refresh();
                    for (player, transform) in &positions {
                        sender.send_video_position(*player, transform);
                    }
                }
            }
            RemoteCommand::ResetOrientation => stage.reset_orientation(),
            RemoteCommand::SetOrientation(euler) => stage.set_orientation(*euler),
            RemoteCommand::BrightnessCalibrationView { enabled, brightness } => {
                stage.show_calibration_view(*enabled, brightness.clamp(0.0, 1.0));
            }
            RemoteCommand::SendVideoNames => {
                self.catalogue.log_names();
                self.sender().send_video_names();
            }
            RemoteCommand::SpeechLevel(level) => stage.set_speech_level(level.clamp(0.0, 1.0)),
            RemoteCommand::MaskingLevel(level) => stage.set_masking_level(level.clamp(0.0, 1.0)),
        }

        debug!("Applied {}", address);
        Ok(())
    }

    /// Replay cached screen positions through the normal validation path
    pub fn restore_positions(&mut self, stage: &mut dyn Stage) -> usize {
        let mut restored = 0;
        for player in SCREEN_PLAYERS {
            let Some(values) = self.prefs.get_as::<Vec<f32>>(&position_key(player)) else {
                continue;
            };

            let mut args = vec![OscArg::Int(player as i32)];
            args.extend(values.into_iter().map(OscArg::Float));
            let msg = OscMessage::with_args("/video/position", args);

            if let Dispatch::Applied(_) = self.process(&msg, stage) {
                restored += 1;
            }
        }

        if restored > 0 {
            info!("Restored {} cached screen positions", restored);
        }
        restored
    }
}
