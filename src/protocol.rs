//! Source descriptions and packets handed over by the transport layer

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::position::Vec3;

/// Codec announced for a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecInfo {
    /// Codec name, e.g. "opus"
    pub name: String,
    /// Codec-specific parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl CodecInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn opus() -> Self {
        Self::new("opus")
    }
}

/// What the audio is attached to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceKind {
    /// Follows a player entity
    Player { player_id: Uuid },
    /// Fixed point in the world
    Static { position: Vec3, direction: Vec3 },
}

/// Server-side description of a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub id: Uuid,
    pub line_id: Uuid,
    /// State counter; packets carrying another value are stale
    pub state: u8,
    pub stereo: bool,
    /// Absent for raw PCM streams
    pub codec: Option<CodecInfo>,
    pub kind: SourceKind,
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "source {} (line {}, state {}, {})",
            self.id,
            self.line_id,
            self.state,
            if self.stereo { "stereo" } else { "mono" }
        )
    }
}

/// Audio data for a source
#[derive(Debug, Clone)]
pub struct DataPacket {
    pub line_id: Uuid,
    pub sequence_number: u64,
    /// Source state the sender believed current
    pub source_state: u8,
    /// Max audible distance, 0 for sources without distance falloff
    pub max_distance: u16,
    /// Encrypted and encoded payload
    pub payload: Bytes,
}

/// Signals the speaker stopped talking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndPacket {
    /// Sequence number of the last data packet sent
    pub sequence_number: u64,
}
