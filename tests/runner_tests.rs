// Integration tests for the frame loop
//
// Each test steps the runner by hand; channels stand in for the HTTP console
// and the UDP listener.

use anyhow::Result;
use listening_effort::audio::{AudioCaptureService, SyntheticMicrophone};
use listening_effort::catalogue::{VideoCatalogue, VideoKind};
use listening_effort::http::OperatorCommand;
use listening_effort::remote::{
    decode_packet, Connector, OscArg, OscMessage, OscSender, RemoteController, Transport,
};
use listening_effort::session::{
    Collaborators, DisabledTranscriber, HeadlessStage, OrchestratorSettings, SessionOrchestrator,
    SessionState, SessionStatus, StageCall,
};
use listening_effort::telemetry::{EventBus, HeadRotation, PupilometrySample, SyntheticTracker};
use listening_effort::{Clock, ManualClock, PreferenceStore, Runner, RunnerChannels};
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};

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
    Box::new(move |_| {
        Ok(Box::new(RecordingTransport {
            packets: Arc::clone(&packets),
        }) as Box<dyn Transport>)
    })
}

const SCRIPT: &str = r#"
session:
  speaker amplitude: 1.0
  masking video: cafe
  maskers:
    - { rotation: 0.0, amplitude: 0.5 }
    - { rotation: 90.0, amplitude: 0.5 }
    - { rotation: 180.0, amplitude: 0.5 }
    - { rotation: 270.0, amplitude: 0.5 }
  video screens:
    - idle video: idle
    - idle video: idle
    - idle video: idle
  challenges:
    - [speech_a, speech_a, speech_a]
  delay before playing videos: 1.0
  delay after playing videos: 0.5
  recording duration: 4.0
"#;

struct Fixture {
    runner: Runner<HeadlessStage>,
    commands: mpsc::Sender<OperatorCommand>,
    remote: mpsc::Sender<OscMessage>,
    status: watch::Receiver<SessionStatus>,
    pupilometry: Arc<EventBus<PupilometrySample>>,
    packets: Packets,
    script: PathBuf,
    _temp_dir: TempDir,
}

fn fixture() -> Result<Fixture> {
    let temp_dir = TempDir::new()?;
    let script = temp_dir.path().join("runner.yaml");
    fs::write(&script, SCRIPT)?;

    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0.0));
    let catalogue = Arc::new(
        VideoCatalogue::new()
            .with_video(VideoKind::Masking, "cafe", Some(600.0))
            .with_video(VideoKind::Idle, "idle", None)
            .with_video(VideoKind::Speech, "speech_a", Some(2.0)),
    );
    let pupilometry = Arc::new(EventBus::new());
    let head_rotation: Arc<EventBus<HeadRotation>> = Arc::new(EventBus::new());

    let orchestrator = SessionOrchestrator::new(
        Arc::clone(&clock),
        Arc::clone(&catalogue),
        OrchestratorSettings {
            data_dir: temp_dir.path().join("data"),
            subject_label: None,
        },
        Collaborators {
            stage: HeadlessStage::new(Arc::clone(&clock), Arc::clone(&catalogue)),
            capture: AudioCaptureService::new(
                Box::new(SyntheticMicrophone::new(Arc::clone(&clock))),
                Arc::clone(&clock),
                temp_dir.path().join("data"),
            ),
            transcriber: Arc::new(DisabledTranscriber),
            pupilometry: Arc::clone(&pupilometry),
            head_rotation: Arc::clone(&head_rotation),
        },
    );

    let packets: Packets = Arc::new(Mutex::new(Vec::new()));
    let mut sender = OscSender::new(
        Arc::clone(&clock),
        Arc::clone(&catalogue),
        recording_connector(Arc::clone(&packets)),
    );
    sender.set_destination(SocketAddr::from(([127, 0, 0, 1], 6789)));
    let sender = Arc::new(Mutex::new(sender));

    let controller = RemoteController::new(
        Arc::clone(&catalogue),
        Arc::clone(&sender),
        PreferenceStore::in_memory(),
        false,
    );

    let (commands, command_rx) = mpsc::channel(8);
    let (remote, remote_rx) = mpsc::channel(8);
    let (status_tx, status) = watch::channel(SessionStatus::default());

    let tracker = SyntheticTracker::new(
        Arc::clone(&clock),
        Arc::clone(&pupilometry),
        Arc::clone(&head_rotation),
    );
    let runner = Runner::new(
        orchestrator,
        controller,
        sender,
        Arc::clone(&pupilometry),
        head_rotation,
        RunnerChannels {
            commands: command_rx,
            remote: remote_rx,
            status: status_tx,
        },
    )
    .with_tracker(tracker);

    Ok(Fixture {
        runner,
        commands,
        remote,
        status,
        pupilometry,
        packets,
        script,
        _temp_dir: temp_dir,
    })
}

fn sent_addresses(packets: &Packets) -> Vec<String> {
    packets
        .lock()
        .unwrap()
        .iter()
        .flat_map(|p| decode_packet(p).unwrap())
        .map(|m| m.address)
        .collect()
}

#[tokio::test]
async fn test_step_applies_operator_and_remote_input() -> Result<()> {
    let mut f = fixture()?;
    f.runner.orchestrator_mut().start_session(&f.script)?;

    f.commands.send(OperatorCommand::Ready).await?;
    f.remote
        .send(OscMessage::new("/reset_orientation"))
        .await?;

    assert!(f.runner.step());
    assert_eq!(f.runner.orchestrator().state(), SessionState::DelayBeforePlayingVideo);
    assert_eq!(f.status.borrow().state, SessionState::DelayBeforePlayingVideo);
    assert!(f
        .runner
        .orchestrator()
        .stage()
        .calls()
        .contains(&StageCall::ResetOrientation));

    Ok(())
}

#[tokio::test]
async fn test_stage_events_and_telemetry_are_forwarded() -> Result<()> {
    let mut f = fixture()?;

    // First step connects and announces the catalogue
    f.runner.step();
    let announced = sent_addresses(&f.packets);
    assert!(announced.contains(&"/video/names/speech".to_string()));
    assert!(announced.contains(&"/pupilometryLabels".to_string()));

    f.runner.orchestrator_mut().start_session(&f.script)?;
    f.runner.step();

    let sent = sent_addresses(&f.packets);
    let after: Vec<&str> = sent[announced.len()..].iter().map(String::as_str).collect();
    assert!(after.contains(&"/pupilometry"));
    assert!(after.contains(&"/head_rotation"));
    assert!(after.contains(&"/video/prepared"));
    assert!(after.contains(&"/video/first_frame"));

    // The masking video runs on the background player
    let first_frame = f
        .packets
        .lock()
        .unwrap()
        .iter()
        .flat_map(|p| decode_packet(p).unwrap())
        .find(|m| m.address == "/video/first_frame")
        .unwrap();
    assert_eq!(first_frame.args[0], OscArg::Int(0));
    assert_eq!(first_frame.args[1], OscArg::Str("cafe".into()));

    Ok(())
}

#[tokio::test]
async fn test_scripted_run_stops_on_terminal_state() -> Result<()> {
    let mut f = fixture()?;
    f.runner = f.runner.exit_when_finished(true);

    f.runner.orchestrator_mut().start_session(&f.script)?;
    assert!(f.runner.step());

    // Stop while nothing is being recorded aborts the session
    f.commands.send(OperatorCommand::StopRecording).await?;
    assert!(!f.runner.step());
    assert_eq!(f.runner.orchestrator().state(), SessionState::Aborted);

    Ok(())
}

#[tokio::test]
async fn test_shutdown_detaches_and_interrupts() -> Result<()> {
    let mut f = fixture()?;
    assert_eq!(f.pupilometry.subscriber_count(), 1);

    f.runner.orchestrator_mut().start_session(&f.script)?;
    f.commands.send(OperatorCommand::Ready).await?;
    f.runner.step();
    // Sender plus the open telemetry scope
    assert_eq!(f.pupilometry.subscriber_count(), 2);

    f.runner.shutdown();
    assert_eq!(f.pupilometry.subscriber_count(), 0);
    assert_eq!(f.runner.orchestrator().state(), SessionState::Aborted);
    assert_eq!(f.status.borrow().state, SessionState::Aborted);

    Ok(())
}
