//! Audio output side: PCM frames and sink groups

pub mod frame;
pub mod memory;
pub mod sink;

pub use frame::PcmFrame;
pub use memory::MemoryOutput;
pub use sink::{DeviceEvent, Direction, OutputDevice, SinkGroup, SinkId, SinkParams};
