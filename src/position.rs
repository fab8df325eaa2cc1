//! Listener and emitter sampling
//!
//! Each emitter kind has its own [`PositionProvider`]; the session picks one
//! from [`SourceKind`] whenever the source info changes.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::PositionUnavailable;
use crate::protocol::SourceKind;

/// World-space vector
pub type Vec3 = [f32; 3];

pub const ZERO_VECTOR: Vec3 = [0.0, 0.0, 0.0];

/// Euclidean distance between two points
pub fn distance(a: Vec3, b: Vec3) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Position and facing of an entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub look: Vec3,
}

/// Read access to the local world
pub trait World: Send + Sync {
    /// Ear position of the local listener, `None` without an active player
    fn listener_position(&self) -> Option<Vec3>;

    fn entity_pose(&self, id: Uuid) -> Option<Pose>;
}

/// Samples listener and emitter for one source
pub trait PositionProvider: Send + Sync {
    fn listener_position(&self) -> Result<Vec3, PositionUnavailable>;

    fn emitter_position(&self) -> Result<Vec3, PositionUnavailable>;

    fn emitter_look_direction(&self) -> Result<Vec3, PositionUnavailable>;
}

/// Emitter attached to a player entity
pub struct PlayerEmitter {
    world: Arc<dyn World>,
    player_id: Uuid,
}

impl PlayerEmitter {
    pub fn new(world: Arc<dyn World>, player_id: Uuid) -> Self {
        Self { world, player_id }
    }

    fn pose(&self) -> Result<Pose, PositionUnavailable> {
        self.world
            .entity_pose(self.player_id)
            .ok_or(PositionUnavailable::EmitterMissing(self.player_id))
    }
}

impl PositionProvider for PlayerEmitter {
    fn listener_position(&self) -> Result<Vec3, PositionUnavailable> {
        self.world
            .listener_position()
            .ok_or(PositionUnavailable::NoListener)
    }

    fn emitter_position(&self) -> Result<Vec3, PositionUnavailable> {
        Ok(self.pose()?.position)
    }

    fn emitter_look_direction(&self) -> Result<Vec3, PositionUnavailable> {
        Ok(self.pose()?.look)
    }
}

/// Emitter fixed in place
pub struct StaticEmitter {
    world: Arc<dyn World>,
    position: Vec3,
    direction: Vec3,
}

impl StaticEmitter {
    pub fn new(world: Arc<dyn World>, position: Vec3, direction: Vec3) -> Self {
        Self {
            world,
            position,
            direction,
        }
    }
}

impl PositionProvider for StaticEmitter {
    fn listener_position(&self) -> Result<Vec3, PositionUnavailable> {
        self.world
            .listener_position()
            .ok_or(PositionUnavailable::NoListener)
    }

    fn emitter_position(&self) -> Result<Vec3, PositionUnavailable> {
        Ok(self.position)
    }

    fn emitter_look_direction(&self) -> Result<Vec3, PositionUnavailable> {
        Ok(self.direction)
    }
}

/// Build the provider matching an emitter kind
pub fn provider_for(kind: &SourceKind, world: Arc<dyn World>) -> Box<dyn PositionProvider> {
    match kind {
        SourceKind::Player { player_id } => Box::new(PlayerEmitter::new(world, *player_id)),
        SourceKind::Static {
            position,
            direction,
        } => Box::new(StaticEmitter::new(world, *position, *direction)),
    }
}

/// Line-of-sight blockage between listener and emitter
pub trait OcclusionProvider: Send + Sync {
    /// Fraction of the path that is blocked, in `[0, 1]`
    fn occluded_fraction(&self, listener: Vec3, emitter: Vec3) -> f64;
}

/// Never occluded
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOcclusion;

impl OcclusionProvider for NoOcclusion {
    fn occluded_fraction(&self, _listener: Vec3, _emitter: Vec3) -> f64 {
        0.0
    }
}

/// Mutable in-memory world
#[derive(Default)]
pub struct InMemoryWorld {
    listener: RwLock<Option<Vec3>>,
    entities: RwLock<HashMap<Uuid, Pose>>,
}

impl InMemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_listener(&self, position: Option<Vec3>) {
        *self.listener.write() = position;
    }

    pub fn set_entity(&self, id: Uuid, pose: Pose) {
        self.entities.write().insert(id, pose);
    }

    pub fn remove_entity(&self, id: Uuid) {
        self.entities.write().remove(&id);
    }
}

impl World for InMemoryWorld {
    fn listener_position(&self) -> Option<Vec3> {
        *self.listener.read()
    }

    fn entity_pose(&self, id: Uuid) -> Option<Pose> {
        self.entities.read().get(&id).copied()
    }
}
