use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::osc::{OscArg, OscMessage};
use crate::catalogue::VideoCatalogue;
use crate::clock::Clock;
use crate::session::StageEvent;
use crate::telemetry::{HeadRotation, PupilometrySample, TelemetryValue};

/// After this many consecutive send failures, failures stop being logged
pub const MAX_LOGGED_FAILURES: u32 = 5;

const INITIAL_BACKOFF_SECS: f64 = 0.5;
const MAX_BACKOFF_SECS: f64 = 8.0;

/// One connected outbound socket
pub trait Transport: Send {
    fn send(&mut self, packet: &[u8]) -> io::Result<()>;
}

/// Opens a transport to a destination
pub type Connector = Box<dyn FnMut(SocketAddr) -> io::Result<Box<dyn Transport>> + Send>;

pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub fn connect(destination: SocketAddr) -> io::Result<Self> {
        let local: SocketAddr = if destination.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(destination)?;
        Ok(Self { socket })
    }

    pub fn connector() -> Connector {
        Box::new(|destination| Ok(Box::new(UdpTransport::connect(destination)?) as Box<dyn Transport>))
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, packet: &[u8]) -> io::Result<()> {
        self.socket.send(packet).map(|_| ())
    }
}

/// Outbound half of the remote protocol: one destination, reconnected lazily.
///
/// `refresh()` is called once per tick; it (re)connects when the destination
/// changed, backing off after failures, and announces the catalogue and
/// telemetry labels on every new connection.
pub struct OscSender {
    clock: Arc<dyn Clock>,
    catalogue: Arc<VideoCatalogue>,
    connector: Connector,
    destination: Option<SocketAddr>,
    transport: Option<Box<dyn Transport>>,
    retry_at: f64,
    backoff: f64,
    consecutive_failures: u32,
    logged_failures: u32,
    sent: u64,
    log_sent_messages: bool,
}

impl OscSender {
    pub fn new(clock: Arc<dyn Clock>, catalogue: Arc<VideoCatalogue>, connector: Connector) -> Self {
        Self {
            clock,
            catalogue,
            connector,
            destination: None,
            transport: None,
            retry_at: 0.0,
            backoff: INITIAL_BACKOFF_SECS,
            consecutive_failures: 0,
            logged_failures: 0,
            sent: 0,
            log_sent_messages: false,
        }
    }

    pub fn with_logging(mut self, log_sent_messages: bool) -> Self {
        self.log_sent_messages = log_sent_messages;
        self
    }

    pub fn destination(&self) -> Option<SocketAddr> {
        self.destination
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Send failures that were written to the log
    pub fn logged_failures(&self) -> u32 {
        self.logged_failures
    }

    pub fn sent_count(&self) -> u64 {
        self.sent
    }

    /// Returns true when the destination actually changed
    pub fn set_destination(&mut self, destination: SocketAddr) -> bool {
        if self.destination == Some(destination) {
            return false;
        }
        info!("Remote client address set to {}", destination);
        self.destination = Some(destination);
        self.transport = None;
        self.retry_at = 0.0;
        self.backoff = INITIAL_BACKOFF_SECS;
        true
    }

    /// Connect if needed. Call once per tick.
    pub fn refresh(&mut self) {
        let Some(destination) = self.destination else {
            return;
        };
        if self.transport.is_some() || self.clock.now() < self.retry_at {
            return;
        }

        match (self.connector)(destination) {
            Ok(transport) => {
                info!("Connected to remote client {}", destination);
                self.transport = Some(transport);
                self.backoff = INITIAL_BACKOFF_SECS;
                self.send_video_names();
                self.send_pupilometry_labels();
            }
            Err(e) => {
                warn!(
                    "Failed to connect to {}: {} (retrying in {:.1}s)",
                    destination, e, self.backoff
                );
                self.retry_at = self.clock.now() + self.backoff;
                self.backoff = (self.backoff * 2.0).min(MAX_BACKOFF_SECS);
            }
        }
    }

    /// Send one message; returns false when it was not delivered to the socket
    pub fn send(&mut self, msg: &OscMessage) -> bool {
        let Some(transport) = self.transport.as_mut() else {
            return false;
        };

        match transport.send(&msg.encode()) {
            Ok(()) => {
                self.consecutive_failures = 0;
                self.sent += 1;
                if self.log_sent_messages {
                    debug!("Sent {}", msg);
                }
                true
            }
            Err(e) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures <= MAX_LOGGED_FAILURES {
                    self.logged_failures += 1;
                    warn!("Failed to send {}: {}", msg.address, e);
                    if self.consecutive_failures == MAX_LOGGED_FAILURES {
                        warn!(
                            "{} consecutive send failures, no further errors will be logged",
                            MAX_LOGGED_FAILURES
                        );
                    }
                }
                false
            }
        }
    }

    /// `/video/names/{type}` for every kind in the catalogue
    pub fn send_video_names(&mut self) {
        for (kind, names) in self.catalogue.names_by_kind() {
            let msg = OscMessage::with_args(
                format!("/video/names/{}", kind),
                names.into_iter().map(OscArg::Str).collect(),
            );
            self.send(&msg);
        }
    }

    pub fn send_pupilometry_labels(&mut self) {
        let msg = OscMessage::with_args(
            "/pupilometryLabels",
            PupilometrySample::LABELS
                .iter()
                .map(|label| OscArg::Str(label.to_string()))
                .collect(),
        );
        self.send(&msg);
    }

    pub fn send_pupilometry(&mut self, sample: &PupilometrySample) {
        let args = sample
            .fields()
            .into_iter()
            .map(|value| match value {
                TelemetryValue::Long(v) => OscArg::Long(v),
                TelemetryValue::Bool(v) => OscArg::Int(v as i32),
                TelemetryValue::Float(v) => OscArg::Float(v),
            })
            .collect();
        self.send(&OscMessage::with_args("/pupilometry", args));
    }

    pub fn send_head_rotation(&mut self, rotation: &HeadRotation) {
        let args = rotation.euler.iter().map(|v| OscArg::Float(*v)).collect();
        self.send(&OscMessage::with_args("/head_rotation", args));
    }

    pub fn send_video_position(&mut self, player: usize, transform: &[f32; 7]) {
        let mut args = vec![OscArg::Int(player as i32)];
        args.extend(transform.iter().map(|v| OscArg::Float(*v)));
        self.send(&OscMessage::with_args("/video/position", args));
    }

    /// Forward `/video/prepared` and `/video/first_frame`
    pub fn send_stage_event(&mut self, event: &StageEvent) {
        let (address, player, video, idle) = match event {
            StageEvent::Prepared { player, video, idle } => ("/video/prepared", player, video, idle),
            StageEvent::FirstFrame { player, video, idle } => {
                ("/video/first_frame", player, video, idle)
            }
            StageEvent::PlaybackFinished { .. } => return,
        };
        let msg = OscMessage::new(address)
            .arg(OscArg::Int(*player as i32))
            .arg(OscArg::Str(video.clone()))
            .arg(OscArg::Int(*idle as i32));
        self.send(&msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::VideoKind;
    use crate::clock::ManualClock;
    use std::sync::Mutex;

    /// Records packets, or fails every send when `fail` is set
    struct FakeTransport {
        packets: Arc<Mutex<Vec<Vec<u8>>>>,
        fail: Arc<Mutex<bool>>,
    }

    impl Transport for FakeTransport {
        fn send(&mut self, packet: &[u8]) -> io::Result<()> {
            if *self.fail.lock().unwrap() {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
            }
            self.packets.lock().unwrap().push(packet.to_vec());
            Ok(())
        }
    }

    fn fake_sender(
        clock: Arc<ManualClock>,
    ) -> (OscSender, Arc<Mutex<Vec<Vec<u8>>>>, Arc<Mutex<bool>>, Arc<Mutex<u32>>) {
        let packets = Arc::new(Mutex::new(Vec::new()));
        let fail = Arc::new(Mutex::new(false));
        let connects = Arc::new(Mutex::new(0));

        let (p, f, c) = (packets.clone(), fail.clone(), connects.clone());
        let connector: Connector = Box::new(move |_| {
            *c.lock().unwrap() += 1;
            Ok(Box::new(FakeTransport {
                packets: p.clone(),
                fail: f.clone(),
            }) as Box<dyn Transport>)
        });

        let catalogue = Arc::new(
            VideoCatalogue::new()
                .with_video(VideoKind::Speech, "s1", None)
                .with_video(VideoKind::Idle, "i1", None),
        );
        (
            OscSender::new(clock, catalogue, connector),
            packets,
            fail,
            connects,
        )
    }

    #[test]
    fn test_connect_announces_catalogue_and_labels() {
        let clock = Arc::new(ManualClock::new(0.0));
        let (mut sender, packets, _, connects) = fake_sender(clock);

        sender.refresh();
        assert!(!sender.is_connected(), "no destination yet");

        assert!(sender.set_destination("127.0.0.1:6789".parse().unwrap()));
        assert!(!sender.set_destination("127.0.0.1:6789".parse().unwrap()));
        sender.refresh();
        sender.refresh();

        assert_eq!(*connects.lock().unwrap(), 1);
        let addresses: Vec<String> = packets
            .lock()
            .unwrap()
            .iter()
            .map(|p| crate::remote::osc::decode_packet(p).unwrap()[0].address.clone())
            .collect();
        assert_eq!(
            addresses,
            vec![
                "/video/names/masking",
                "/video/names/speech",
                "/video/names/idle",
                "/pupilometryLabels"
            ]
        );
    }

    #[test]
    fn test_failures_stop_being_logged_but_sending_continues() {
        let clock = Arc::new(ManualClock::new(0.0));
        let (mut sender, packets, fail, _) = fake_sender(clock);
        sender.set_destination("127.0.0.1:6789".parse().unwrap());
        sender.refresh();
        packets.lock().unwrap().clear();

        *fail.lock().unwrap() = true;
        for _ in 0..8 {
            sender.send_head_rotation(&HeadRotation::default());
        }
        assert_eq!(sender.consecutive_failures(), 8);
        assert_eq!(sender.logged_failures(), MAX_LOGGED_FAILURES);

        *fail.lock().unwrap() = false;
        sender.send_head_rotation(&HeadRotation::default());
        assert_eq!(sender.consecutive_failures(), 0);
        assert_eq!(packets.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_connection_failures_back_off() {
        let clock = Arc::new(ManualClock::new(0.0));
        let attempts = Arc::new(Mutex::new(0));
        let a = attempts.clone();
        let connector: Connector = Box::new(move |_| {
            *a.lock().unwrap() += 1;
            Err(io::Error::new(io::ErrorKind::Other, "unreachable"))
        });
        let mut sender = OscSender::new(clock.clone(), Arc::new(VideoCatalogue::new()), connector);
        sender.set_destination("10.0.0.1:7000".parse().unwrap());

        sender.refresh(); // attempt 1, next in 0.5s
        clock.advance(0.4);
        sender.refresh();
        assert_eq!(*attempts.lock().unwrap(), 1);

        clock.advance(0.2);
        sender.refresh(); // attempt 2, next in 1s
        clock.advance(0.9);
        sender.refresh();
        assert_eq!(*attempts.lock().unwrap(), 2);

        clock.advance(0.2);
        sender.refresh();
        assert_eq!(*attempts.lock().unwrap(), 3);
    }
}
