use std::fmt;
use thiserror::Error;

use super::osc::{OscArg, OscMessage};

/// Argument types the inbound message set uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Int,
    Float,
    Str,
}

impl ArgType {
    pub fn matches(self, arg: &OscArg) -> bool {
        matches!(
            (self, arg),
            (ArgType::Int, OscArg::Int(_))
                | (ArgType::Float, OscArg::Float(_))
                | (ArgType::Str, OscArg::Str(_))
        )
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArgType::Int => "int",
            ArgType::Float => "float",
            ArgType::Str => "string",
        })
    }
}

/// Validation contract for one inbound address
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MessageSpec {
    pub address: &'static str,
    pub args: &'static [ArgType],
    /// Only accepted when the session is driven remotely
    pub remote_only: bool,
}

use ArgType::{Float as F, Int as I, Str as S};

pub const REGISTRY: &[MessageSpec] = &[
    MessageSpec { address: "/video/play", args: &[I, S], remote_only: true },
    MessageSpec { address: "/video/set_idle", args: &[I, S], remote_only: true },
    MessageSpec { address: "/video/stop", args: &[I], remote_only: false },
    MessageSpec { address: "/video/start_idle", args: &[I], remote_only: true },
    MessageSpec { address: "/video/position", args: &[I, F, F, F, F, F, F, F], remote_only: false },
    MessageSpec { address: "/set_client_address", args: &[S, I], remote_only: false },
    MessageSpec { address: "/reset_orientation", args: &[], remote_only: false },
    MessageSpec { address: "/set_orientation", args: &[F, F, F], remote_only: false },
    MessageSpec { address: "/brightness_calibration_view", args: &[I, F], remote_only: false },
    MessageSpec { address: "/send_video_names", args: &[], remote_only: true },
    MessageSpec { address: "/audio/level/speech", args: &[F], remote_only: true },
    MessageSpec { address: "/audio/level/masking", args: &[F], remote_only: true },
];

pub fn find_spec(address: &str) -> Option<&'static MessageSpec> {
    REGISTRY.iter().find(|spec| spec.address == address)
}

/// Why an inbound message was not dispatched
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Rejection {
    #[error("unrecognised address {address}")]
    Unrecognised { address: String },

    #[error("malformed {address}: expected ({expected}), received ({received})")]
    Malformed {
        address: String,
        expected: String,
        received: String,
    },

    #[error("{address} is only accepted in remote mode")]
    NotPermitted { address: String },

    #[error("{address} rejected: {reason}")]
    InvalidValue { address: String, reason: String },
}

fn describe_expected(types: &[ArgType]) -> String {
    types.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn describe_received(args: &[OscArg]) -> String {
    args.iter()
        .map(|arg| match arg {
            OscArg::Int(_) => "int",
            OscArg::Float(_) => "float",
            OscArg::Str(_) => "string",
            OscArg::Long(_) => "long",
            OscArg::Blob(_) => "blob",
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check an inbound message against the registry: address, then argument
/// types, then permission.
pub fn validate(msg: &OscMessage, remote_mode: bool) -> Result<&'static MessageSpec, Rejection> {
    let spec = find_spec(&msg.address).ok_or_else(|| Rejection::Unrecognised {
        address: msg.address.clone(),
    })?;

    let types_match = spec.args.len() == msg.args.len()
        && spec.args.iter().zip(&msg.args).all(|(t, a)| t.matches(a));
    if !types_match {
        return Err(Rejection::Malformed {
            address: msg.address.clone(),
            expected: describe_expected(spec.args),
            received: describe_received(&msg.args),
        });
    }

    if spec.remote_only && !remote_mode {
        return Err(Rejection::NotPermitted {
            address: msg.address.clone(),
        });
    }

    Ok(spec)
}

/// A validated inbound request
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    PlayVideo { player: i32, video: String },
    SetIdleVideo { player: i32, video: String },
    StopVideo { player: i32 },
    StartIdle { player: i32 },
    Position { player: i32, transform: [f32; 7] },
    SetClientAddress { ip: String, port: i32 },
    ResetOrientation,
    SetOrientation([f32; 3]),
    BrightnessCalibrationView { enabled: bool, brightness: f32 },
    SendVideoNames,
    SpeechLevel(f32),
    MaskingLevel(f32),
}

fn int(args: &[OscArg], i: usize) -> i32 {
    match args.get(i) {
        Some(OscArg::Int(v)) => *v,
        _ => 0,
    }
}

fn float(args: &[OscArg], i: usize) -> f32 {
    match args.get(i) {
        Some(OscArg::Float(v)) => *v,
        _ => 0.0,
    }
}

fn string(args: &[OscArg], i: usize) -> String {
    match args.get(i) {
        Some(OscArg::Str(v)) => v.clone(),
        _ => String::new(),
    }
}

impl RemoteCommand {
    /// Validate and convert in one step
    pub fn parse(msg: &OscMessage, remote_mode: bool) -> Result<Self, Rejection> {
        let spec = validate(msg, remote_mode)?;
        let a = &msg.args;

        Ok(match spec.address {
            "/video/play" => RemoteCommand::PlayVideo { player: int(a, 0), video: string(a, 1) },
            "/video/set_idle" => RemoteCommand::SetIdleVideo { player: int(a, 0), video: string(a, 1) },
            "/video/stop" => RemoteCommand::StopVideo { player: int(a, 0) },
            "/video/start_idle" => RemoteCommand::StartIdle { player: int(a, 0) },
            "/video/position" => {
                let mut transform = [0.0; 7];
                for (i, v) in transform.iter_mut().enumerate() {
                    *v = float(a, i + 1);
                }
                RemoteCommand::Position { player: int(a, 0), transform }
            }
            "/set_client_address" => RemoteCommand::SetClientAddress { ip: string(a, 0), port: int(a, 1) },
            "/reset_orientation" => RemoteCommand::ResetOrientation,
            "/set_orientation" => RemoteCommand::SetOrientation([float(a, 0), float(a, 1), float(a, 2)]),
            "/brightness_calibration_view" => RemoteCommand::BrightnessCalibrationView {
                enabled: int(a, 0) != 0,
                brightness: float(a, 1),
            },
            "/send_video_names" => RemoteCommand::SendVideoNames,
            "/audio/level/speech" => RemoteCommand::SpeechLevel(float(a, 0)),
            "/audio/level/masking" => RemoteCommand::MaskingLevel(float(a, 0)),
            other => {
                return Err(Rejection::Unrecognised {
                    address: other.to_string(),
                })
            }
        })
    }
}
