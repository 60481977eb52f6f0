//! Live sessions keyed by id.
//!
//! A session exists while it has observers or an active run. Creation on
//! first attach and removal on cleanup both happen under the map's per-key
//! lock, so a connection arriving while the last one leaves either joins the
//! surviving session or creates a fresh one, never a half-removed one.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use safari_core::ids::{ObserverId, SessionId};
use safari_engine::SessionState;
use safari_settings::WorldSettings;

use crate::hub::BroadcastHub;

pub struct Session {
    pub id: SessionId,
    pub state: Arc<SessionState>,
    pub hub: Arc<BroadcastHub>,
}

impl Session {
    fn new(id: SessionId, world: &WorldSettings) -> Self {
        Self {
            id,
            state: Arc::new(SessionState::new(world)),
            hub: Arc::new(BroadcastHub::new()),
        }
    }
}

pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    world: WorldSettings,
}

impl SessionRegistry {
    pub fn new(world: WorldSettings) -> Self {
        Self {
            sessions: DashMap::new(),
            world,
        }
    }

    fn create(&self, id: &SessionId) -> Arc<Session> {
        tracing::info!(session_id = %id, "session created");
        Arc::new(Session::new(id.clone(), &self.world))
    }

    pub fn get_or_create(&self, id: &SessionId) -> Arc<Session> {
        let entry = self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| self.create(id));
        Arc::clone(entry.value())
    }

    /// Get-or-create and register the observer while holding the entry.
    pub fn attach(&self, id: &SessionId, observer: ObserverId, tx: mpsc::Sender<String>) -> Arc<Session> {
        let entry = self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| self.create(id));
        entry.hub.attach(observer, tx);
        Arc::clone(entry.value())
    }

    pub fn detach(&self, id: &SessionId, observer: &ObserverId) {
        if let Some(session) = self.get(id) {
            session.hub.detach(observer);
        }
        self.cleanup(id);
    }

    /// Drop the session when nobody watches it and nothing runs in it.
    pub fn cleanup(&self, id: &SessionId) -> bool {
        let removed = self
            .sessions
            .remove_if(id, |_, s| s.hub.is_empty() && !s.state.is_busy())
            .is_some();
        if removed {
            tracing::info!(session_id = %id, "session removed");
        }
        removed
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|e| Arc::clone(e.value()))
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Cancel every agent and autoplay run. Returns how many sessions had one.
    pub fn stop_all(&self) -> usize {
        let sessions: Vec<Arc<Session>> = self.sessions.iter().map(|e| Arc::clone(e.value())).collect();
        sessions.iter().filter(|s| s.state.stop_autoplay()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(WorldSettings {
            obstacle_count: 10,
            animal_count: 5,
        })
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let reg = registry();
        let id = SessionId::from_raw("s1");
        let a = reg.get_or_create(&id);
        let b = reg.get_or_create(&id);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn concurrent_attach_resolves_to_one_session() {
        let reg = Arc::new(registry());
        let id = SessionId::from_raw("shared");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&reg);
                let id = id.clone();
                std::thread::spawn(move || {
                    let (tx, rx) = mpsc::channel(4);
                    let session = reg.attach(&id, ObserverId::new(), tx);
                    (session, rx)
                })
            })
            .collect();
        let sessions: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(reg.count(), 1);
        let first = &sessions[0].0;
        assert!(sessions.iter().all(|(s, _)| Arc::ptr_eq(s, first)));
        assert_eq!(first.hub.len(), 8);
    }

    #[test]
    fn last_detach_removes_session() {
        let reg = registry();
        let id = SessionId::from_raw("s1");
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);
        let o1 = ObserverId::new();
        let o2 = ObserverId::new();
        reg.attach(&id, o1.clone(), tx1);
        reg.attach(&id, o2.clone(), tx2);

        reg.detach(&id, &o1);
        assert_eq!(reg.count(), 1);
        reg.detach(&id, &o2);
        assert_eq!(reg.count(), 0);
    }

    #[test]
    fn running_agent_keeps_session_alive() {
        let reg = registry();
        let id = SessionId::from_raw("s1");
        let (tx, _rx) = mpsc::channel(4);
        let observer = ObserverId::new();
        let session = reg.attach(&id, observer.clone(), tx);
        let guard = session.state.try_start_agent().unwrap();

        reg.detach(&id, &observer);
        assert_eq!(reg.count(), 1);

        drop(guard);
        assert!(reg.cleanup(&id));
        assert_eq!(reg.count(), 0);
    }

    #[test]
    fn running_autoplay_keeps_session_alive() {
        let reg = registry();
        let id = SessionId::from_raw("s1");
        let session = reg.get_or_create(&id);
        let guard = session.state.try_start_autoplay(2).unwrap();
        assert!(!reg.cleanup(&id));
        drop(guard);
        assert!(reg.cleanup(&id));
    }

    #[test]
    fn reattach_after_removal_gets_fresh_session() {
        let reg = registry();
        let id = SessionId::from_raw("s1");
        let (tx, _rx) = mpsc::channel(4);
        let observer = ObserverId::new();
        let old = reg.attach(&id, observer.clone(), tx);
        reg.detach(&id, &observer);

        let (tx, _rx) = mpsc::channel(4);
        let fresh = reg.attach(&id, ObserverId::new(), tx);
        assert!(!Arc::ptr_eq(&old, &fresh));
    }

    #[test]
    fn stop_all_cancels_runs() {
        let reg = registry();
        let session = reg.get_or_create(&SessionId::from_raw("busy"));
        reg.get_or_create(&SessionId::from_raw("idle"));
        let guard = session.state.try_start_agent().unwrap();
        assert_eq!(reg.stop_all(), 1);
        assert!(guard.token().is_cancelled());
    }
}
