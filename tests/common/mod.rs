//! Shared fixtures for session tests

#![allow(dead_code)]

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use voice_source::audio::{MemoryOutput, PcmFrame};
use voice_source::codec::{AudioDecoder, DecoderFactory};
use voice_source::config::{SharedConfig, VoiceConfig};
use voice_source::crypto::Cipher;
use voice_source::error::{CodecError, CryptoError};
use voice_source::line::{SourceLine, StaticLineRegistry};
use voice_source::position::{InMemoryWorld, OcclusionProvider, Pose, Vec3};
use voice_source::protocol::{CodecInfo, DataPacket, EndPacket, SourceInfo, SourceKind};
use voice_source::session::SessionObserver;
use voice_source::{Session, SessionContext};

pub const LINE_NAME: &str = "proximity";

/// Counters shared by every decoder a factory hands out
#[derive(Default)]
pub struct DecoderCounters {
    pub created: AtomicUsize,
    pub decoded: AtomicUsize,
    pub concealed: AtomicUsize,
    pub resets: AtomicUsize,
    pub closed: AtomicUsize,
}

impl DecoderCounters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Decodes little-endian PCM; conceals with a recognisable frame
pub struct FakeDecoder {
    channels: u16,
    counters: Arc<DecoderCounters>,
}

pub const CONCEALED_SAMPLE: i16 = 777;

impl AudioDecoder for FakeDecoder {
    fn decode(&mut self, data: &[u8]) -> Result<PcmFrame, CodecError> {
        if data.first() == Some(&0xee) {
            return Err(CodecError::DecodingFailed("corrupt frame".into()));
        }
        self.counters.decoded.fetch_add(1, Ordering::SeqCst);
        PcmFrame::from_le_bytes(data, self.channels)
    }

    fn supports_concealment(&self) -> bool {
        true
    }

    fn decode_concealed(&mut self) -> Result<PcmFrame, CodecError> {
        self.counters.concealed.fetch_add(1, Ordering::SeqCst);
        Ok(PcmFrame::new(
            vec![CONCEALED_SAMPLE; 4 * self.channels as usize],
            self.channels,
        ))
    }

    fn reset(&mut self) -> Result<(), CodecError> {
        self.counters.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeDecoders {
    pub counters: Arc<DecoderCounters>,
}

impl DecoderFactory for FakeDecoders {
    fn create(
        &self,
        codec: &CodecInfo,
        stereo: bool,
    ) -> Result<Box<dyn AudioDecoder>, CodecError> {
        if codec.name != "fake" {
            return Err(CodecError::UnsupportedCodec(codec.name.clone()));
        }
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeDecoder {
            channels: if stereo { 2 } else { 1 },
            counters: self.counters.clone(),
        }))
    }
}

/// XOR "cipher" failing on payloads starting with 0xff
pub struct XorCipher(pub u8);

impl Cipher for XorCipher {
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.first() == Some(&0xff) {
            return Err(CryptoError::DecryptionFailed("bad tag".into()));
        }
        Ok(data.iter().map(|b| b ^ self.0).collect())
    }
}

/// Occlusion under test control
#[derive(Default)]
pub struct FixedOcclusion(pub Mutex<f64>);

impl OcclusionProvider for FixedOcclusion {
    fn occluded_fraction(&self, _listener: Vec3, _emitter: Vec3) -> f64 {
        *self.0.lock()
    }
}

#[derive(Default)]
pub struct CountingObserver {
    pub initialized: AtomicUsize,
    pub closed: AtomicUsize,
}

impl SessionObserver for CountingObserver {
    fn on_initialized(&self, _info: &SourceInfo) {
        self.initialized.fetch_add(1, Ordering::SeqCst);
    }

    fn on_closed(&self, _info: &SourceInfo) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub config: SharedConfig,
    pub line: SourceLine,
    pub lines: Arc<StaticLineRegistry>,
    pub output: Arc<MemoryOutput>,
    pub world: Arc<InMemoryWorld>,
    pub counters: Arc<DecoderCounters>,
    pub occlusion: Arc<FixedOcclusion>,
    pub observer: Arc<CountingObserver>,
    pub speaker: Uuid,
}

impl Harness {
    /// Listener at the origin, speaker 5 blocks away on the x axis
    pub fn new() -> Self {
        Self::with_config(VoiceConfig::default())
    }

    pub fn with_config(config: VoiceConfig) -> Self {
        let line = SourceLine::new(Uuid::new_v4(), LINE_NAME);
        let world = Arc::new(InMemoryWorld::new());
        let speaker = Uuid::new_v4();
        world.set_listener(Some([0.0, 0.0, 0.0]));
        world.set_entity(
            speaker,
            Pose {
                position: [5.0, 0.0, 0.0],
                look: [-1.0, 0.0, 0.0],
            },
        );

        Self {
            config: SharedConfig::new(config),
            lines: Arc::new(StaticLineRegistry::with_lines([line.clone()])),
            line,
            output: Arc::new(MemoryOutput::new()),
            world,
            counters: Arc::new(DecoderCounters::default()),
            occlusion: Arc::new(FixedOcclusion::default()),
            observer: Arc::new(CountingObserver::default()),
            speaker,
        }
    }

    pub fn context(&self) -> SessionContext {
        SessionContext::new(
            self.config.clone(),
            self.lines.clone(),
            self.output.clone(),
            self.world.clone(),
            tokio::runtime::Handle::current(),
        )
        .with_decoders(Arc::new(FakeDecoders {
            counters: self.counters.clone(),
        }))
        .with_occlusion(self.occlusion.clone())
        .with_observer(self.observer.clone())
    }

    /// Mono raw PCM source on the harness line
    pub fn source(&self) -> SourceInfo {
        SourceInfo {
            id: Uuid::new_v4(),
            line_id: self.line.id,
            state: 1,
            stereo: false,
            codec: None,
            kind: SourceKind::Player {
                player_id: self.speaker,
            },
        }
    }

    /// Mono source using the fake decoder
    pub fn coded_source(&self) -> SourceInfo {
        SourceInfo {
            codec: Some(CodecInfo::new("fake")),
            ..self.source()
        }
    }

    pub fn session(&self, info: SourceInfo) -> Session {
        Session::new(self.context(), info).expect("session")
    }

    pub fn data(&self, sequence_number: u64) -> DataPacket {
        self.data_with_distance(sequence_number, 0)
    }

    /// Payload of four samples equal to the sequence number
    pub fn data_with_distance(&self, sequence_number: u64, max_distance: u16) -> DataPacket {
        DataPacket {
            line_id: self.line.id,
            sequence_number,
            source_state: 1,
            max_distance,
            payload: pcm_payload(&[sequence_number as i16; 4]),
        }
    }

    pub fn end(&self, sequence_number: u64) -> EndPacket {
        EndPacket { sequence_number }
    }

    pub fn resets(&self) -> usize {
        DecoderCounters::get(&self.counters.resets)
    }
}

pub fn pcm_payload(samples: &[i16]) -> Bytes {
    Bytes::from(
        samples
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect::<Vec<u8>>(),
    )
}
