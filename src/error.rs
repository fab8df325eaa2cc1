//! Error types for voice source sessions

use thiserror::Error;
use uuid::Uuid;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while a session handles packets or updates
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Decryption failed: {0}")]
    Decryption(#[from] CryptoError),

    #[error("Decoding failed: {0}")]
    Decode(#[from] CodecError),

    #[error("Source line not found: {0}")]
    LineNotFound(Uuid),

    #[error("Position unavailable: {0}")]
    PositionUnavailable(#[from] PositionUnavailable),

    #[error("Packet source state {packet} does not match session state {session}")]
    ProtocolMismatch { packet: u8, session: u8 },

    #[error("Session is closed")]
    Closed,
}

/// Listener or emitter could not be sampled
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionUnavailable {
    #[error("no active listener")]
    NoListener,

    #[error("emitter {0} is not present")]
    EmitterMissing(Uuid),
}

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Decoder initialization failed: {0}")]
    DecoderInit(String),

    #[error("Decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("Packet loss concealment is not supported by this decoder")]
    ConcealmentUnsupported,

    #[error("Invalid frame size: {0}")]
    InvalidFrameSize(usize),
}

/// Cipher errors
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
}

/// Output device errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to create sinks: {0}")]
    SinkCreation(String),

    #[error("Output device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
