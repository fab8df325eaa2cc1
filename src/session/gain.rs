//! Volume, distance falloff and occlusion for one packet

use crate::audio::{Direction, SinkGroup};
use crate::constants::OCCLUSION_STEP;
use crate::position::{distance, Vec3};

/// Rate-limited occlusion tracking
///
/// Rises by a fixed [`OCCLUSION_STEP`] per packet and falls by at most that
/// much, so a source passing behind a wall fades instead of cutting out. A
/// rise may overshoot the raw value for one packet.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct OcclusionFilter {
    value: Option<f64>,
}

impl OcclusionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Feed a raw fraction, get the smoothed one back
    pub fn track(&mut self, raw: f64) -> f64 {
        let raw = raw.clamp(0.0, 1.0);
        let next = match self.value {
            None => raw,
            Some(prev) if raw > prev => (prev + OCCLUSION_STEP).min(1.0),
            Some(prev) => (prev - OCCLUSION_STEP).max(raw),
        };
        self.value = Some(next);
        next
    }
}

/// Inputs sampled for one packet
#[derive(Debug, Clone, Copy)]
pub struct GainInputs {
    pub listener: Vec3,
    pub emitter: Vec3,
    pub look: Vec3,
    /// Max audible distance, 0 when distance does not apply
    pub max_distance: f32,
    pub master_volume: f64,
    pub source_volume: f64,
    pub line_volume: f64,
    /// Output topology is stereo
    pub stereo: bool,
    pub panning: bool,
    pub directional: bool,
    /// Raw occlusion, `None` when occlusion is disabled
    pub occlusion: Option<f64>,
}

/// Parameters pushed to the sink group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialUpdate {
    pub gain: f32,
    pub position: Option<Vec3>,
    pub direction: Option<Direction>,
    pub max_distance: Option<f32>,
}

impl SpatialUpdate {
    pub fn apply_to(&self, group: &mut dyn SinkGroup) {
        group.set_gain(self.gain);
        if let Some(position) = self.position {
            group.set_position(position);
        }
        if let Some(max_distance) = self.max_distance {
            group.set_max_distance(max_distance);
        }
        if let Some(direction) = &self.direction {
            group.set_direction(direction);
        }
    }
}

/// Result of one gain computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainOutcome {
    pub update: SpatialUpdate,
    pub distance: f32,
    pub audible: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SpatialGainCalculator;

impl SpatialGainCalculator {
    pub fn compute(&self, inputs: &GainInputs, occlusion: &mut OcclusionFilter) -> GainOutcome {
        let max_distance = inputs.max_distance;
        let distance = distance(inputs.listener, inputs.emitter);

        let distance_gain = if max_distance > 0.0 {
            1.0 - distance.min(max_distance) / max_distance
        } else {
            1.0
        };

        let mut volume = inputs.master_volume * inputs.source_volume * inputs.line_volume;
        if let Some(raw) = inputs.occlusion {
            volume *= 1.0 - occlusion.track(raw);
        }

        // the renderer only attenuates positioned mono sources
        let manual_falloff = (inputs.stereo || !inputs.panning) && max_distance > 0.0;
        let gain = if manual_falloff {
            volume as f32 * distance_gain
        } else {
            volume as f32
        };

        let update = if inputs.panning {
            SpatialUpdate {
                gain,
                position: Some(inputs.emitter),
                direction: Some(if inputs.directional {
                    Direction::cone(inputs.look)
                } else {
                    Direction::Omnidirectional
                }),
                max_distance: (max_distance > 0.0).then_some(max_distance),
            }
        } else {
            SpatialUpdate {
                gain,
                position: None,
                direction: None,
                max_distance: None,
            }
        };

        GainOutcome {
            update,
            distance,
            audible: max_distance <= 0.0 || distance <= max_distance,
        }
    }
}
