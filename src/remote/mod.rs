//! Remote-control protocol over UDP (OSC 1.0)
//!
//! - `osc`: wire codec
//! - `spec`: registry of accepted messages and their validation
//! - `controller`: applies validated messages to the stage
//! - `sender`: outbound telemetry, video events and catalogue
//! - `server`: UDP listener task

pub mod controller;
pub mod osc;
pub mod sender;
pub mod server;
pub mod spec;

pub use controller::{position_key, Dispatch, RemoteController};
pub use osc::{decode_packet, OscArg, OscMessage};
pub use sender::{Connector, OscSender, Transport, UdpTransport, MAX_LOGGED_FAILURES};
pub use spec::{find_spec, validate, ArgType, MessageSpec, Rejection, RemoteCommand, REGISTRY};
