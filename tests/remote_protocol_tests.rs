// Integration tests for the remote-control protocol
//
// Inbound messages go through the same decode / validate / dispatch path the
// UDP listener uses; outbound traffic is captured by an in-memory transport.

use anyhow::Result;
use listening_effort::catalogue::{VideoCatalogue, VideoKind};
use listening_effort::remote::{
    decode_packet, position_key, server, Connector, Dispatch, OscArg, OscMessage, OscSender,
    Rejection, RemoteCommand, RemoteController, Transport,
};
use listening_effort::session::{HeadlessStage, StageCall};
use listening_effort::{Clock, ManualClock, PreferenceStore};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

type Packets = Arc<Mutex<Vec<Vec<u8>>>>;

struct RecordingTransport {
    packets: Packets,
}

impl Transport for RecordingTransport {
    fn send(&mut self, packet: &[u8]) -> io::Result<()> {
        self.packets.lock().unwrap().push(packet.to_vec());
        Ok(())
    }
}

fn recording_connector(packets: Packets) -> Connector {
    Box::new(move |_destination| {
        Ok(Box::new(RecordingTransport {
            packets: Arc::clone(&packets),
        }) as Box<dyn Transport>)
    })
}

struct Fixture {
    stage: HeadlessStage,
    controller: RemoteController,
    sender: Arc<Mutex<OscSender>>,
    packets: Packets,
}

fn catalogue() -> Arc<VideoCatalogue> {
    Arc::new(
        VideoCatalogue::new()
            .with_video(VideoKind::Masking, "cafe", Some(60.0))
            .with_video(VideoKind::Idle, "idle", None)
            .with_video(VideoKind::Speech, "speech_a", Some(2.0)),
    )
}

fn fixture(prefs: PreferenceStore, remote_mode: bool) -> Fixture {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0.0));
    let catalogue = catalogue();
    let packets: Packets = Arc::new(Mutex::new(Vec::new()));
    let sender = Arc::new(Mutex::new(OscSender::new(
        Arc::clone(&clock),
        Arc::clone(&catalogue),
        recording_connector(Arc::clone(&packets)),
    )));

    Fixture {
        stage: HeadlessStage::new(clock, Arc::clone(&catalogue)),
        controller: RemoteController::new(catalogue, Arc::clone(&sender), prefs, remote_mode),
        sender,
        packets,
    }
}

fn sent_messages(packets: &Packets) -> Vec<OscMessage> {
    packets
        .lock()
        .unwrap()
        .iter()
        .flat_map(|p| decode_packet(p).unwrap())
        .collect()
}

fn position(player: i32, values: [f32; 7]) -> OscMessage {
    let mut args = vec![OscArg::Int(player)];
    args.extend(values.iter().map(|v| OscArg::Float(*v)));
    OscMessage::with_args("/video/position", args)
}

#[test]
fn test_play_with_missing_argument_is_rejected() {
    let mut f = fixture(PreferenceStore::in_memory(), true);

    let msg = OscMessage::new("/video/play").arg(OscArg::Int(1));
    let dispatch = f.controller.process(&msg, &mut f.stage);

    match dispatch {
        Dispatch::Rejected(Rejection::Malformed { expected, received, .. }) => {
            assert_eq!(expected, "int, string");
            assert_eq!(received, "int");
        }
        other => panic!("expected a malformed rejection, got {other:?}"),
    }
    assert!(f.stage.calls().is_empty());
}

#[test]
fn test_remote_only_messages_need_remote_mode() {
    let mut f = fixture(PreferenceStore::in_memory(), false);

    let msg = OscMessage::new("/video/play")
        .arg(OscArg::Int(1))
        .arg(OscArg::Str("speech_a".into()));
    assert!(matches!(
        f.controller.process(&msg, &mut f.stage),
        Dispatch::Rejected(Rejection::NotPermitted { .. })
    ));
    assert!(f.stage.calls().is_empty());

    f.controller.set_remote_mode(true);
    assert_eq!(
        f.controller.process(&msg, &mut f.stage),
        Dispatch::Applied(RemoteCommand::PlayVideo {
            player: 1,
            video: "speech_a".into()
        })
    );
    assert_eq!(
        f.stage.calls(),
        &[StageCall::Play {
            player: 1,
            video: "speech_a".into()
        }]
    );
}

#[test]
fn test_values_are_checked_before_dispatch() {
    let mut f = fixture(PreferenceStore::in_memory(), true);

    let unknown_video = OscMessage::new("/video/play")
        .arg(OscArg::Int(2))
        .arg(OscArg::Str("not_in_catalogue".into()));
    let bad_player = OscMessage::new("/video/start_idle").arg(OscArg::Int(0));
    let unknown_address = OscMessage::new("/video/rewind").arg(OscArg::Int(1));

    for msg in [&unknown_video, &bad_player] {
        assert!(matches!(
            f.controller.process(msg, &mut f.stage),
            Dispatch::Rejected(Rejection::InvalidValue { .. })
        ));
    }
    assert!(matches!(
        f.controller.process(&unknown_address, &mut f.stage),
        Dispatch::Rejected(Rejection::Unrecognised { .. })
    ));
    assert!(f.stage.calls().is_empty());

    // The background player accepts play and stop
    let stop_background = OscMessage::new("/video/stop").arg(OscArg::Int(0));
    assert!(matches!(
        f.controller.process(&stop_background, &mut f.stage),
        Dispatch::Applied(_)
    ));
}

#[test]
fn test_levels_are_clamped() {
    let mut f = fixture(PreferenceStore::in_memory(), true);

    f.controller.process(
        &OscMessage::new("/audio/level/speech").arg(OscArg::Float(1.7)),
        &mut f.stage,
    );
    f.controller.process(
        &OscMessage::new("/audio/level/masking").arg(OscArg::Float(-0.2)),
        &mut f.stage,
    );

    assert_eq!(
        f.stage.calls(),
        &[StageCall::SpeechLevel(1.0), StageCall::MaskingLevel(0.0)]
    );
}

#[test]
fn test_positions_persist_and_restore() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let prefs_path = temp_dir.path().join("preferences.json");
    let values = [5.0, -30.0, 0.0, 1.0, 2.0, 1.5, 1.0];

    {
        let mut f = fixture(PreferenceStore::open(&prefs_path)?, false);
        assert!(matches!(
            f.controller.process(&position(1, values), &mut f.stage),
            Dispatch::Applied(_)
        ));
        assert_eq!(f.controller.positions().get(&1), Some(&values));
    }

    let reopened = PreferenceStore::open(&prefs_path)?;
    assert_eq!(reopened.get_as::<Vec<f32>>(&position_key(1)), Some(values.to_vec()));

    let mut f = fixture(reopened, false);
    assert_eq!(f.controller.restore_positions(&mut f.stage), 1);

    match f.stage.calls() {
        [StageCall::ScreenTransform { player, transform }] => {
            assert_eq!(*player, 1);
            assert_eq!(transform.to_array(), values);
        }
        other => panic!("expected one screen transform, got {other:?}"),
    }

    Ok(())
}

#[test]
fn test_client_address_change_announces_and_sends_positions() {
    let mut f = fixture(PreferenceStore::in_memory(), false);
    f.controller
        .process(&position(2, [0.0, 10.0, 0.0, 0.0, 0.0, 1.0, 1.0]), &mut f.stage);

    let bad_port = OscMessage::new("/set_client_address")
        .arg(OscArg::Str("127.0.0.1".into()))
        .arg(OscArg::Int(70000));
    assert!(matches!(
        f.controller.process(&bad_port, &mut f.stage),
        Dispatch::Rejected(Rejection::InvalidValue { .. })
    ));
    assert!(f.sender.lock().unwrap().destination().is_none());

    let good = OscMessage::new("/set_client_address")
        .arg(OscArg::Str("127.0.0.1".into()))
        .arg(OscArg::Int(9000));
    assert!(matches!(
        f.controller.process(&good, &mut f.stage),
        Dispatch::Applied(_)
    ));
    assert!(f.sender.lock().unwrap().is_connected());

    let sent = sent_messages(&f.packets);
    let addresses: Vec<&str> = sent.iter().map(|m| m.address.as_str()).collect();
    assert_eq!(
        addresses,
        vec![
            "/video/names/masking",
            "/video/names/speech",
            "/video/names/idle",
            "/pupilometryLabels",
            "/video/position",
        ]
    );
    assert_eq!(sent[4].args[0], OscArg::Int(2));
    assert_eq!(sent[4].args[2], OscArg::Float(10.0));

    // Same address again: nothing is re-sent
    f.controller.process(&good, &mut f.stage);
    assert_eq!(sent_messages(&f.packets).len(), 5);
}

#[tokio::test]
async fn test_listener_forwards_decoded_messages() -> Result<()> {
    let socket = server::bind(0).await?;
    let port = socket.local_addr()?.port();
    let (tx, mut rx) = mpsc::channel(8);
    let listener = tokio::spawn(server::serve(socket, tx));

    let client = std::net::UdpSocket::bind("127.0.0.1:0")?;
    client.send_to(b"garbage", ("127.0.0.1", port))?;
    let msg = OscMessage::new("/video/stop").arg(OscArg::Int(3));
    client.send_to(&msg.encode(), ("127.0.0.1", port))?;

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await?
        .expect("listener forwards the valid message");
    assert_eq!(received, msg);

    listener.abort();
    Ok(())
}
