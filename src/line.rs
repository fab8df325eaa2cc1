//! Source lines
//!
//! A line groups sources (proximity, group chat, ...) and carries its own
//! volume and mute keys in the configuration.

use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// A line known to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub id: Uuid,
    /// Configuration key for this line's volume and mute
    pub name: String,
}

impl SourceLine {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Resolves line ids announced by the server
pub trait LineRegistry: Send + Sync {
    fn line(&self, id: Uuid) -> Option<SourceLine>;
}

/// Registry backed by a map
#[derive(Default)]
pub struct StaticLineRegistry {
    lines: RwLock<HashMap<Uuid, SourceLine>>,
}

impl StaticLineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines(lines: impl IntoIterator<Item = SourceLine>) -> Self {
        let registry = Self::new();
        for line in lines {
            registry.register(line);
        }
        registry
    }

    pub fn register(&self, line: SourceLine) {
        self.lines.write().insert(line.id, line);
    }

    pub fn unregister(&self, id: Uuid) -> Option<SourceLine> {
        self.lines.write().remove(&id)
    }
}

impl LineRegistry for StaticLineRegistry {
    fn line(&self, id: Uuid) -> Option<SourceLine> {
        self.lines.read().get(&id).cloned()
    }
}
