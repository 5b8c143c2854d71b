pub mod analysis;
pub mod audio;
pub mod capture;
pub mod engine;
pub mod error;
pub mod guidance;
pub mod narration;
pub mod session;
pub mod settings;
pub mod signals;
pub mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use analysis::{HttpDescriptionClient, TrafficMode};
use audio::RodioToneEngine;
use capture::StillImageCamera;
use narration::{EspeakSpeech, LogSpeech, SpeechSynthesizer};
use session::{SessionMode, SessionStatus};
use settings::{EngineSettings, SettingsStore, VoiceSettings};
use signals::KeywordExtractor;

pub use engine::{Engine, EngineDeps, EngineSnapshot};

#[derive(Parser, Debug)]
#[command(name = "sightline")]
#[command(about = "Camera guidance for object search, traffic safety and Braille reading", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Guide the camera until QUERY is found
    Search {
        query: String,
        /// Images the camera cycles through
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },
    /// Warn about vehicles and obstacles while walking
    Navigation {
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },
    /// Tell whether it is safe to cross the street
    Crossing {
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },
    /// Read one Braille capture
    Braille {
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },
    /// Read Braille continuously
    BrailleContinuous {
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },
    /// Turn voice narration on or off
    Voice {
        #[arg(value_enum)]
        state: Toggle,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum Toggle {
    On,
    Off,
}

impl Commands {
    fn frames(&self) -> Option<&[PathBuf]> {
        match self {
            Commands::Search { frames, .. }
            | Commands::Navigation { frames }
            | Commands::Crossing { frames }
            | Commands::Braille { frames }
            | Commands::BrailleContinuous { frames } => Some(frames),
            Commands::Voice { .. } => None,
        }
    }
}

fn build_engine(settings: EngineSettings, frames: Vec<PathBuf>) -> Result<Engine> {
    let client = HttpDescriptionClient::new(&settings.service)
        .context("failed to build description service client")?;
    let speech: Arc<dyn SpeechSynthesizer> = match EspeakSpeech::detect() {
        Some(espeak) => Arc::new(espeak),
        None => Arc::new(LogSpeech),
    };

    Ok(Engine::new(
        settings,
        EngineDeps {
            camera: Arc::new(StillImageCamera::new(frames)),
            client: Arc::new(client),
            extractor: Arc::new(KeywordExtractor::new()),
            speech,
            tones: Arc::new(RodioToneEngine::new()),
        },
    ))
}

/// Run one session and print every published snapshot as a JSON line until the session
/// ends on its own, a single-shot capture completes, or Ctrl-C.
async fn drive(engine: Engine, command: Commands) -> Result<()> {
    let mut snapshots = engine.subscribe();
    let single_shot = matches!(command, Commands::Braille { .. });

    let started = match command {
        Commands::Search { query, .. } => engine.start_search(&query).await,
        Commands::Navigation { .. } => engine.switch_traffic_mode(TrafficMode::Navigation).await,
        Commands::Crossing { .. } => engine.switch_traffic_mode(TrafficMode::Crossing).await,
        Commands::Braille { .. } => engine.start_session(SessionMode::BrailleSingle).await,
        Commands::BrailleContinuous { .. } => {
            engine.start_session(SessionMode::BrailleContinuous).await
        }
        Commands::Voice { .. } => return Ok(()),
    };
    let session = started.context("failed to start session")?;
    log::info!("session {} running ({})", session.id, session.mode.as_str());

    if single_shot {
        engine.trigger_capture().await;
    }

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                println!("{}", serde_json::to_string(&snapshot)?);

                let finished = snapshot
                    .session
                    .as_ref()
                    .is_some_and(|s| s.status == SessionStatus::Stopped);
                let single_done =
                    single_shot && snapshot.stats.completed + snapshot.stats.failed > 0;
                if finished || single_done {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupted, stopping session");
                break;
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}

pub fn run() -> Result<()> {
    utils::init_logging(settings::debug_mode());
    log::info!("Sightline starting up...");

    let cli = Cli::parse();
    let store = SettingsStore::new(settings::settings_path())?;

    if let Commands::Voice { state } = &cli.command {
        let enabled = *state == Toggle::On;
        store.update_voice(VoiceSettings {
            enabled,
            ..store.engine().voice
        })?;
        log::info!("voice narration {}", if enabled { "on" } else { "off" });
        return Ok(());
    }
    let frames = cli.command.frames().unwrap_or_default().to_vec();

    let settings = store.engine().with_env_overrides();
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async move {
        let engine = build_engine(settings, frames)?;
        drive(engine, cli.command).await
    })
}
