//! In-memory output device
//!
//! Records everything a session sends to its sinks. Used by the demo
//! receiver and the tests.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::frame::PcmFrame;
use crate::audio::sink::{Direction, OutputDevice, SinkGroup, SinkId, SinkParams};
use crate::error::AudioError;
use crate::position::Vec3;

/// What happened to one sink group
#[derive(Debug, Clone)]
pub struct GroupRecord {
    pub stereo: bool,
    pub params: SinkParams,
    pub sinks: Vec<SinkId>,
    /// Frames written to the group, in order
    pub frames: Vec<PcmFrame>,
    /// Every gain set, in order
    pub gains: Vec<f32>,
    pub position: Option<Vec3>,
    pub direction: Option<Direction>,
    pub max_distance: Option<f32>,
    pub cleared: bool,
}

impl GroupRecord {
    pub fn last_gain(&self) -> Option<f32> {
        self.gains.last().copied()
    }

    /// Number of empty filler frames written
    pub fn silent_frames(&self) -> usize {
        self.frames.iter().filter(|f| f.is_silence()).count()
    }
}

/// Output device keeping every group in memory
pub struct MemoryOutput {
    next_sink: AtomicU64,
    groups: Mutex<Vec<Arc<Mutex<GroupRecord>>>>,
    fail_creation: Mutex<bool>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self {
            next_sink: AtomicU64::new(1),
            groups: Mutex::new(Vec::new()),
            fail_creation: Mutex::new(false),
        }
    }

    /// Make later `create_group` calls fail
    pub fn set_fail_creation(&self, fail: bool) {
        *self.fail_creation.lock() = fail;
    }

    /// Snapshot of every group created so far
    pub fn groups(&self) -> Vec<GroupRecord> {
        self.groups.lock().iter().map(|g| g.lock().clone()).collect()
    }

    /// Snapshot of the most recent group
    pub fn latest(&self) -> Option<GroupRecord> {
        self.groups.lock().last().map(|g| g.lock().clone())
    }

    pub fn group_count(&self) -> usize {
        self.groups.lock().len()
    }
}

impl Default for MemoryOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDevice for MemoryOutput {
    fn create_group(
        &self,
        stereo: bool,
        params: &SinkParams,
    ) -> Result<Box<dyn SinkGroup>, AudioError> {
        if *self.fail_creation.lock() {
            return Err(AudioError::SinkCreation("creation disabled".into()));
        }

        let sink = SinkId(self.next_sink.fetch_add(1, Ordering::Relaxed));
        let record = Arc::new(Mutex::new(GroupRecord {
            stereo,
            params: *params,
            sinks: vec![sink],
            frames: Vec::new(),
            gains: Vec::new(),
            position: None,
            direction: None,
            max_distance: None,
            cleared: false,
        }));
        self.groups.lock().push(record.clone());

        Ok(Box::new(MemorySinkGroup {
            sinks: vec![sink],
            record,
        }))
    }
}

/// Sink group handed out by [`MemoryOutput`]
pub struct MemorySinkGroup {
    sinks: Vec<SinkId>,
    record: Arc<Mutex<GroupRecord>>,
}

impl SinkGroup for MemorySinkGroup {
    fn sinks(&self) -> &[SinkId] {
        &self.sinks
    }

    fn write(&mut self, frame: &PcmFrame) {
        let mut record = self.record.lock();
        if !record.cleared {
            record.frames.push(frame.clone());
        }
    }

    fn set_gain(&mut self, gain: f32) {
        self.record.lock().gains.push(gain);
    }

    fn set_position(&mut self, position: Vec3) {
        self.record.lock().position = Some(position);
    }

    fn set_direction(&mut self, direction: &Direction) {
        self.record.lock().direction = Some(*direction);
    }

    fn set_max_distance(&mut self, distance: f32) {
        self.record.lock().max_distance = Some(distance);
    }

    fn clear(&mut self) {
        self.sinks.clear();
        self.record.lock().cleared = true;
    }
}
