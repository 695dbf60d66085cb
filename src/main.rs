use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use listening_effort::audio::{AudioCaptureService, CaptureDevice, SyntheticMicrophone};
use listening_effort::config::{CaptureDeviceKind, TranscriptionBackend};
use listening_effort::http::{create_router, AppState};
use listening_effort::remote::{server, OscSender, RemoteController, UdpTransport};
use listening_effort::session::{
    Collaborators, DisabledTranscriber, HeadlessStage, NatsTranscriber, OrchestratorSettings,
    SessionOrchestrator, SessionStatus, Transcriber,
};
use listening_effort::telemetry::{EventBus, SyntheticTracker};
use listening_effort::{
    transcribe_session, Clock, Config, PreferenceStore, Runner, RunnerChannels, SystemClock,
    VideoCatalogue,
};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "listening-effort")]
#[command(about = "Run listening-effort trial sessions")]
#[command(args_conflicts_with_subcommands = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file
    #[arg(short, long, default_value = "config/listening-effort.toml")]
    config: String,

    /// Subject label appended to the session folder name
    #[arg(short, long)]
    subject: Option<String>,

    /// Accept remote-only messages (video playback driven by the remote peer)
    #[arg(short, long)]
    remote: bool,

    /// Session script to run; without one only the remote protocol is served
    script: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Re-transcribe every response WAV of a recorded session
    Transcribe {
        /// Session folder holding the response recordings
        session_dir: PathBuf,

        /// Output file (default: transcriptions.csv in the session folder)
        #[arg(short, long)]
        out_file: Option<PathBuf>,

        /// Configuration file
        #[arg(short, long, default_value = "config/listening-effort.toml")]
        config: String,
    },
}

async fn postprocess(session_dir: &Path, out_file: Option<&Path>, cfg: &Config) -> Result<()> {
    if cfg.transcription.backend == TranscriptionBackend::Disabled {
        bail!("Transcription backend is disabled in the configuration");
    }
    let timeout = Duration::from_secs_f64(cfg.transcription.timeout_secs.max(0.1));
    let transcriber = NatsTranscriber::connect(&cfg.transcription.nats_url, timeout)
        .await
        .context("Speech-to-text service unavailable")?;

    let summary = transcribe_session(session_dir, out_file, &transcriber).await?;
    if summary.transcribed + summary.failed == 0 {
        warn!("Nothing to transcribe in {}", session_dir.display());
    }
    Ok(())
}

fn load_config(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        Config::load(path)
    } else {
        warn!("Config file {} not found, using defaults", path);
        Ok(Config::default())
    }
}

fn capture_device(kind: CaptureDeviceKind, clock: Arc<dyn Clock>) -> Box<dyn CaptureDevice> {
    match kind {
        CaptureDeviceKind::Synthetic => Box::new(SyntheticMicrophone::new(clock)),
        CaptureDeviceKind::None => Box::new(SyntheticMicrophone::absent(clock)),
        #[cfg(feature = "microphone")]
        CaptureDeviceKind::Microphone => {
            Box::new(listening_effort::audio::CpalMicrophone::open_default())
        }
        #[cfg(not(feature = "microphone"))]
        CaptureDeviceKind::Microphone => {
            warn!("Built without the microphone feature, continuing without audio capture");
            Box::new(SyntheticMicrophone::absent(clock))
        }
    }
}

async fn transcriber(cfg: &Config) -> Arc<dyn Transcriber> {
    match cfg.transcription.backend {
        TranscriptionBackend::Disabled => Arc::new(DisabledTranscriber),
        TranscriptionBackend::Nats => {
            let timeout = Duration::from_secs_f64(cfg.transcription.timeout_secs.max(0.1));
            match NatsTranscriber::connect(&cfg.transcription.nats_url, timeout).await {
                Ok(transcriber) => Arc::new(transcriber),
                Err(e) => {
                    error!("Transcription disabled: {:#}", e);
                    Arc::new(DisabledTranscriber)
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    if let Some(Command::Transcribe {
        session_dir,
        out_file,
        config,
    }) = &args.command
    {
        let cfg = load_config(config)?;
        return postprocess(session_dir, out_file.as_deref(), &cfg).await;
    }

    let cfg = load_config(&args.config)?;

    info!("Listening Effort v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());

    let catalogue = match VideoCatalogue::from_directory(&cfg.storage.catalogue_dir) {
        Ok(catalogue) => catalogue,
        Err(e) => {
            warn!("Starting with an empty video catalogue: {:#}", e);
            VideoCatalogue::new()
        }
    };
    info!("Video catalogue holds {} videos", catalogue.len());
    let catalogue = Arc::new(catalogue);

    let capture = AudioCaptureService::new(
        capture_device(cfg.audio.device, Arc::clone(&clock)),
        Arc::clone(&clock),
        &cfg.storage.data_dir,
    );
    let pupilometry = Arc::new(EventBus::new());
    let head_rotation = Arc::new(EventBus::new());

    let orchestrator = SessionOrchestrator::new(
        Arc::clone(&clock),
        Arc::clone(&catalogue),
        OrchestratorSettings {
            data_dir: PathBuf::from(&cfg.storage.data_dir),
            subject_label: args.subject.clone().or_else(|| cfg.session.subject_label.clone()),
        },
        Collaborators {
            stage: HeadlessStage::new(Arc::clone(&clock), Arc::clone(&catalogue)),
            capture,
            transcriber: transcriber(&cfg).await,
            pupilometry: Arc::clone(&pupilometry),
            head_rotation: Arc::clone(&head_rotation),
        },
    );

    // Outbound remote traffic
    let mut sender = OscSender::new(
        Arc::clone(&clock),
        Arc::clone(&catalogue),
        UdpTransport::connector(),
    )
    .with_logging(cfg.osc.log_sent_messages);
    match cfg.osc.client_ip.parse::<IpAddr>() {
        Ok(ip) => {
            sender.set_destination(SocketAddr::new(ip, cfg.osc.client_port));
        }
        Err(_) => warn!("Ignoring invalid client address {}", cfg.osc.client_ip),
    }
    let sender = Arc::new(Mutex::new(sender));

    let prefs = match PreferenceStore::open(&cfg.storage.preferences_file) {
        Ok(prefs) => prefs,
        Err(e) => {
            warn!("Preferences unavailable, positions will not persist: {:#}", e);
            PreferenceStore::in_memory()
        }
    };
    let controller = RemoteController::new(
        Arc::clone(&catalogue),
        Arc::clone(&sender),
        prefs,
        args.remote,
    );

    let (command_tx, command_rx) = mpsc::channel(32);
    let (remote_tx, remote_rx) = mpsc::channel(256);
    let (status_tx, status_rx) = watch::channel(SessionStatus::default());

    // Operator console
    if cfg.http.enabled {
        let addr = format!("{}:{}", cfg.http.bind, cfg.http.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind operator console on {}", addr))?;
        let app = create_router(AppState::new(command_tx, status_rx));
        info!("Operator console listening on http://{}", addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Operator console stopped: {}", e);
            }
        });
    }

    // Remote control listener
    if cfg.osc.enabled {
        let socket = server::bind(cfg.osc.listen_port).await?;
        tokio::spawn(async move {
            if let Err(e) = server::serve(socket, remote_tx).await {
                error!("Remote control listener stopped: {:#}", e);
            }
        });
    }

    let tracker = SyntheticTracker::new(
        Arc::clone(&clock),
        Arc::clone(&pupilometry),
        Arc::clone(&head_rotation),
    );
    let mut runner = Runner::new(
        orchestrator,
        controller,
        sender,
        pupilometry,
        head_rotation,
        RunnerChannels {
            commands: command_rx,
            remote: remote_rx,
            status: status_tx,
        },
    )
    .with_tracker(tracker)
    .exit_when_finished(args.script.is_some());

    runner.restore_positions();

    if let Some(script) = &args.script {
        runner
            .orchestrator_mut()
            .start_session(script)
            .with_context(|| format!("Failed to start session {}", script.display()))?;
    }

    runner.run(cfg.session.tick_hz).await
}
