//! Output sink contracts
//!
//! A sink group holds the device handles rendering one source. The
//! concrete backend lives outside this crate; see [`super::memory`] for the
//! in-memory one.

use std::fmt;

use crate::audio::frame::PcmFrame;
use crate::constants::{CONE_INNER_ANGLE, CONE_OUTER_ANGLE, MAX_SINK_GAIN};
use crate::error::AudioError;
use crate::position::Vec3;

/// Handle of one device sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(pub u64);

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink#{}", self.0)
    }
}

/// How the renderer attenuates by distance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceModel {
    /// Linear falloff up to the max distance
    Linear,
    /// No renderer attenuation, gain is applied manually
    None,
}

/// Parameters a sink group is created with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinkParams {
    pub max_gain: f32,
    pub distance_model: DistanceModel,
    /// Positions are relative to the listener
    pub relative: bool,
}

impl SinkParams {
    /// Parameters for the given panning setting
    pub fn for_panning(panning: bool) -> Self {
        if panning {
            Self {
                max_gain: MAX_SINK_GAIN,
                distance_model: DistanceModel::Linear,
                relative: false,
            }
        } else {
            Self {
                max_gain: MAX_SINK_GAIN,
                distance_model: DistanceModel::None,
                relative: true,
            }
        }
    }
}

/// Emission pattern of a source
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Direction {
    Cone {
        direction: Vec3,
        inner_angle: f32,
        outer_angle: f32,
        outer_gain: f32,
    },
    Omnidirectional,
}

impl Direction {
    /// Narrow inner cone, wide outer cone, silent outside
    pub fn cone(direction: Vec3) -> Self {
        Direction::Cone {
            direction,
            inner_angle: CONE_INNER_ANGLE,
            outer_angle: CONE_OUTER_ANGLE,
            outer_gain: 0.0,
        }
    }
}

/// Host notifications about sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The sink was released by the device (e.g. device reload)
    SinkDestroyed(SinkId),
    /// The sink's stream ran dry and stopped
    StreamStopped(SinkId),
}

impl DeviceEvent {
    pub fn sink(&self) -> SinkId {
        match self {
            DeviceEvent::SinkDestroyed(id) | DeviceEvent::StreamStopped(id) => *id,
        }
    }
}

/// Output device able to create sink groups
pub trait OutputDevice: Send + Sync {
    fn create_group(
        &self,
        stereo: bool,
        params: &SinkParams,
    ) -> Result<Box<dyn SinkGroup>, AudioError>;
}

/// Sinks rendering one source
pub trait SinkGroup: Send {
    fn sinks(&self) -> &[SinkId];

    fn contains(&self, id: SinkId) -> bool {
        self.sinks().contains(&id)
    }

    /// Queue a frame on every sink; each sink runs its own filters
    fn write(&mut self, frame: &PcmFrame);

    fn set_gain(&mut self, gain: f32);

    /// Emitter position, with a zero reference distance
    fn set_position(&mut self, position: Vec3);

    fn set_direction(&mut self, direction: &Direction);

    fn set_max_distance(&mut self, distance: f32);

    /// Release every sink
    fn clear(&mut self);
}
