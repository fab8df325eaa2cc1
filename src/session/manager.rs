//! Registry of live sessions, one per source

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::audio::DeviceEvent;
use crate::error::Result;
use crate::protocol::{DataPacket, EndPacket, SourceInfo};
use crate::session::{Session, SessionContext};

/// Creates, updates and routes to sessions
pub struct SourceManager {
    ctx: SessionContext,
    sessions: DashMap<Uuid, Arc<Session>>,
}

impl SourceManager {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            sessions: DashMap::new(),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Create the session for a source, or update the existing one
    ///
    /// A closed session is replaced by a fresh one. No map lock is held
    /// while sessions are built or updated, so observers may query the
    /// manager.
    pub fn update(&self, info: SourceInfo) -> Result<Arc<Session>> {
        if let Some(session) = self.get(info.id).filter(|s| !s.is_closed()) {
            session.update(info)?;
            return Ok(session);
        }

        let id = info.id;
        let session = Arc::new(Session::new(self.ctx.clone(), info)?);
        let replaced = self.sessions.insert(id, session.clone());
        if let Some(old) = replaced {
            // closed already, unless a concurrent update raced this one
            old.close();
        }
        Ok(session)
    }

    pub fn get(&self, source_id: Uuid) -> Option<Arc<Session>> {
        self.sessions.get(&source_id).map(|s| s.value().clone())
    }

    pub fn process_data(&self, source_id: Uuid, packet: DataPacket) -> bool {
        match self.get(source_id) {
            Some(session) => session.process_data(packet),
            None => {
                trace!("Drop packet for unknown source {}", source_id);
                false
            }
        }
    }

    pub fn process_end(&self, source_id: Uuid, packet: EndPacket) -> bool {
        match self.get(source_id) {
            Some(session) => session.process_end(packet),
            None => {
                trace!("Drop end packet for unknown source {}", source_id);
                false
            }
        }
    }

    /// Remove and close a source
    pub fn remove(&self, source_id: Uuid) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(&source_id)?;
        session.close();
        Some(session)
    }

    /// Forward a device event to every session
    pub fn handle_device_event(&self, event: &DeviceEvent) {
        for session in self.snapshot() {
            session.on_device_event(event);
        }
    }

    /// Drop sessions that closed themselves
    pub fn purge_closed(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_closed());
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            debug!("Purged {} closed sources", purged);
        }
        purged
    }

    pub fn close_all(&self) {
        for session in self.snapshot() {
            session.close();
        }
        self.sessions.clear();
    }

    /// Sources that are currently talking
    pub fn activated(&self) -> Vec<Uuid> {
        self.snapshot()
            .into_iter()
            .filter(|s| s.is_activated())
            .map(|s| s.id())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    // collected first so no shard lock is held while sessions lock
    fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }
}
