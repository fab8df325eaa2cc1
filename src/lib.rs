//! # Voice Source
//!
//! Receiving side of positional voice chat: one [`Session`] per remote
//! speaker turns the lossy, unordered, encrypted packet stream of that
//! speaker into continuous spatialized output.
//!
//! ## Architecture Overview
//!
//! ```text
//!   transport (external)
//!        │ DataPacket / EndPacket
//!        ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                    SourceManager (session::manager)                   │
//! │        DashMap<source id, Session> · routes host device events       │
//! └───────┬──────────────────────────────────────────────────────────────┘
//!         │ per source
//!         ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ Session                                                              │
//! │  process_*() ── fast reject (closed / muted) ──► mpsc queue          │
//! │                                                    │                 │
//! │                                  worker task ◄─────┘                 │
//! │                                      │ lock                          │
//! │   ┌──────────────┐  ┌──────────────┐ │ ┌──────────────┐ ┌──────────┐ │
//! │   │  Sequence    │─►│ Spatial gain │─┼►│    Loss      │►│  Decode  │ │
//! │   │  tracker     │  │ + occlusion  │ │ │ compensator  │ │ pipeline │ │
//! │   └──────────────┘  └──────────────┘ │ └──────────────┘ └────┬─────┘ │
//! │                                      │                       ▼       │
//! │   Lifecycle: Idle ─► Active ─► ... ─►│ Closed          SinkGroup     │
//! │   end packet ─► delayed reset timer ─┘ (generation checked)          │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod line;
pub mod position;
pub mod protocol;
pub mod session;

pub use error::{Error, Result};
pub use session::{Session, SessionContext, SourceManager};

/// Crate-wide constants
pub mod constants {
    /// Default sample rate for decoding
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default frame size in samples per channel (20ms at 48kHz)
    pub const DEFAULT_FRAME_SIZE: usize = 960;

    /// Backward distance below which an older packet counts as a reorder
    pub const REORDER_TOLERANCE: u64 = 10;

    /// Largest gap filled with synthetic frames
    pub const MAX_COMPENSATED_FRAMES: u64 = 4;

    /// Largest occlusion change applied per packet
    pub const OCCLUSION_STEP: f64 = 0.05;

    /// Silence after which an active source resets itself
    pub const DEFAULT_CLOSE_TIMEOUT_MS: u64 = 500;

    /// Delay between an end packet and its reset
    pub const DEFAULT_END_GRACE_MS: u64 = 100;

    /// Max gain the output sinks may apply
    pub const MAX_SINK_GAIN: f32 = 4.0;

    /// Directional source inner cone angle in degrees
    pub const CONE_INNER_ANGLE: f32 = 90.0;

    /// Directional source outer cone angle in degrees
    pub const CONE_OUTER_ANGLE: f32 = 180.0;
}
