//! Voice Receiver Demo
//!
//! Streams a synthetic talk spurt with loss and reordering through a source
//! session and reports what reached the sinks.

use anyhow::{Context, Result};
use bytes::Bytes;
use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use voice_source::{
    audio::MemoryOutput,
    config::{SharedConfig, VoiceConfig},
    line::{SourceLine, StaticLineRegistry},
    position::{InMemoryWorld, Pose},
    protocol::{CodecInfo, DataPacket, EndPacket, SourceInfo, SourceKind},
    SessionContext, SourceManager,
};

const PACKETS: u64 = 100;
const MAX_DISTANCE: u16 = 16;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting voice receiver demo");

    let config = load_config()?;
    let sample_rate = config.codec.sample_rate;
    let frame_size = config.codec.frame_size;
    let config = SharedConfig::new(config);

    let line = SourceLine::new(Uuid::new_v4(), "proximity");
    let lines = Arc::new(StaticLineRegistry::with_lines([line.clone()]));
    let output = Arc::new(MemoryOutput::new());
    let world = Arc::new(InMemoryWorld::new());

    let speaker = Uuid::new_v4();
    world.set_listener(Some([0.0, 0.0, 0.0]));
    world.set_entity(
        speaker,
        Pose {
            position: [6.0, 0.0, 0.0],
            look: [-1.0, 0.0, 0.0],
        },
    );

    let ctx = SessionContext::new(
        config,
        lines,
        output.clone(),
        world,
        tokio::runtime::Handle::current(),
    );
    let manager = SourceManager::new(ctx);

    let mut encoder = PayloadEncoder::new(sample_rate, frame_size)?;
    let source = SourceInfo {
        id: Uuid::new_v4(),
        line_id: line.id,
        state: 1,
        stereo: false,
        codec: encoder.codec(),
        kind: SourceKind::Player { player_id: speaker },
    };
    let source_id = source.id;
    let session = manager.update(source)?;

    let payloads = (0..PACKETS)
        .map(|seq| encoder.encode(seq).map(Bytes::from))
        .collect::<Result<Vec<_>>>()?;

    let mut ticker = tokio::time::interval(Duration::from_millis(20));
    let mut sent = 0u64;
    let mut seq = 0u64;
    while seq < PACKETS {
        ticker.tick().await;

        // every 17th packet is lost, every 11th pair arrives swapped
        let order: Vec<u64> = if seq % 11 == 5 && seq + 1 < PACKETS {
            vec![seq + 1, seq]
        } else {
            vec![seq]
        };
        for s in &order {
            if s % 17 == 16 {
                continue;
            }
            let packet = DataPacket {
                line_id: line.id,
                sequence_number: *s,
                source_state: 1,
                max_distance: MAX_DISTANCE,
                payload: payloads[*s as usize].clone(),
            };
            if manager.process_data(source_id, packet) {
                sent += 1;
            }
        }
        seq += order.len() as u64;

        if seq % 25 == 0 {
            session.flush().await;
            tracing::info!(
                "Source stats: {} sent, last sequence {:?}, activated {}, audible {}",
                sent,
                session.last_sequence(),
                session.is_activated(),
                session.can_hear()
            );
        }
    }

    manager.process_end(
        source_id,
        EndPacket {
            sequence_number: PACKETS - 1,
        },
    );
    tokio::time::sleep(Duration::from_millis(200)).await;
    session.flush().await;

    if let Some(record) = output.latest() {
        tracing::info!(
            "Sink stats: {} frames ({} filler), last gain {:?}, max distance {:?}",
            record.frames.len(),
            record.silent_frames(),
            record.last_gain(),
            record.max_distance
        );
    }
    tracing::info!(
        "After end packet: activated {}, audible {}",
        session.is_activated(),
        session.can_hear()
    );

    manager.close_all();
    Ok(())
}

fn load_config() -> Result<VoiceConfig> {
    let path = std::env::args().nth(1).map(PathBuf::from).or_else(|| {
        ProjectDirs::from("dev", "voice-source", "voice-source")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .filter(|path| path.exists())
    });

    match path {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path.display());
            VoiceConfig::load(&path)
                .with_context(|| format!("failed to load {}", path.display()))
        }
        None => Ok(VoiceConfig::default()),
    }
}

/// Sine tone, Opus-encoded when the codec is compiled in
struct PayloadEncoder {
    sample_rate: u32,
    frame_size: usize,
    #[cfg(feature = "opus-codec")]
    encoder: opus::Encoder,
}

impl PayloadEncoder {
    fn new(sample_rate: u32, frame_size: usize) -> Result<Self> {
        Ok(Self {
            sample_rate,
            frame_size,
            #[cfg(feature = "opus-codec")]
            encoder: opus::Encoder::new(sample_rate, opus::Channels::Mono, opus::Application::Voip)
                .context("failed to create Opus encoder")?,
        })
    }

    fn codec(&self) -> Option<CodecInfo> {
        if cfg!(feature = "opus-codec") {
            Some(CodecInfo::opus())
        } else {
            None
        }
    }

    fn tone(&self, seq: u64) -> Vec<i16> {
        let offset = seq as usize * self.frame_size;
        (0..self.frame_size)
            .map(|i| {
                let t = (offset + i) as f32 / self.sample_rate as f32;
                ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 8000.0) as i16
            })
            .collect()
    }

    #[cfg(feature = "opus-codec")]
    fn encode(&mut self, seq: u64) -> Result<Vec<u8>> {
        let samples = self.tone(seq);
        self.encoder
            .encode_vec(&samples, 4000)
            .context("failed to encode frame")
    }

    #[cfg(not(feature = "opus-codec"))]
    fn encode(&mut self, seq: u64) -> Result<Vec<u8>> {
        Ok(self.tone(seq).iter().flat_map(|s| s.to_le_bytes()).collect())
    }
}
