//! Per-session engine state: the world, the notepad and the two run slots.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use safari_core::events::SessionEvent;
use safari_settings::WorldSettings;

use crate::error::EngineError;
use crate::world::GridWorld;

struct AutoplaySlot {
    cancel: CancellationToken,
    current: u32,
    total: u32,
    mission: String,
}

pub struct SessionState {
    world: Mutex<GridWorld>,
    notepad: Mutex<String>,
    agent: Mutex<Option<CancellationToken>>,
    autoplay: Mutex<Option<AutoplaySlot>>,
}

impl SessionState {
    pub fn new(settings: &WorldSettings) -> Self {
        Self::with_world(GridWorld::new(settings))
    }

    pub fn with_world(world: GridWorld) -> Self {
        Self {
            world: Mutex::new(world),
            notepad: Mutex::new(String::new()),
            agent: Mutex::new(None),
            autoplay: Mutex::new(None),
        }
    }

    pub fn world(&self) -> &Mutex<GridWorld> {
        &self.world
    }

    pub fn notepad(&self) -> String {
        self.notepad.lock().clone()
    }

    pub fn set_notepad(&self, notepad: String) {
        *self.notepad.lock() = notepad;
    }

    // Lock order: autoplay, then agent, then world.

    /// Claim the agent slot. The slot is released when the guard drops.
    /// Autoplay claims it once per round through this call.
    pub fn try_start_agent(self: &Arc<Self>) -> Result<AgentRunGuard, EngineError> {
        let mut slot = self.agent.lock();
        if slot.is_some() {
            return Err(EngineError::AgentBusy);
        }
        let cancel = CancellationToken::new();
        *slot = Some(cancel.clone());
        Ok(AgentRunGuard {
            session: Arc::clone(self),
            cancel,
        })
    }

    /// Claim the agent slot for an observer mission. Refused while autoplay owns the session.
    pub fn try_start_mission(self: &Arc<Self>) -> Result<AgentRunGuard, EngineError> {
        let autoplay = self.autoplay.lock();
        if autoplay.is_some() {
            return Err(EngineError::AutoplayBusy);
        }
        self.try_start_agent()
    }

    /// Claim the autoplay slot. Refused while any agent run is active.
    pub fn try_start_autoplay(self: &Arc<Self>, total: u32) -> Result<AutoplayGuard, EngineError> {
        let mut slot = self.autoplay.lock();
        if slot.is_some() {
            return Err(EngineError::AutoplayBusy);
        }
        if self.agent.lock().is_some() {
            return Err(EngineError::AgentBusy);
        }
        let cancel = CancellationToken::new();
        *slot = Some(AutoplaySlot {
            cancel: cancel.clone(),
            current: 0,
            total,
            mission: String::new(),
        });
        Ok(AutoplayGuard {
            session: Arc::clone(self),
            cancel,
        })
    }

    /// Run `f` on the world, but only while no run owns the session.
    pub fn with_idle_world<R>(&self, f: impl FnOnce(&mut GridWorld) -> R) -> Result<R, EngineError> {
        let autoplay = self.autoplay.lock();
        if autoplay.is_some() {
            return Err(EngineError::AutoplayBusy);
        }
        let agent = self.agent.lock();
        if agent.is_some() {
            return Err(EngineError::AgentBusy);
        }
        let mut world = self.world.lock();
        Ok(f(&mut world))
    }

    /// Request the running agent to stop at its next state boundary.
    pub fn stop_agent(&self) -> bool {
        match self.agent.lock().as_ref() {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop autoplay and the agent run it drives.
    pub fn stop_autoplay(&self) -> bool {
        let stopped = match self.autoplay.lock().as_ref() {
            Some(slot) => {
                slot.cancel.cancel();
                true
            }
            None => false,
        };
        self.stop_agent() || stopped
    }

    pub fn is_agent_running(&self) -> bool {
        self.agent.lock().is_some()
    }

    pub fn is_autoplay_running(&self) -> bool {
        self.autoplay.lock().is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.is_agent_running() || self.is_autoplay_running()
    }

    /// Latest `autoProgress` of the active autoplay, for observers joining mid-run.
    pub fn autoplay_progress(&self) -> Option<SessionEvent> {
        self.autoplay.lock().as_ref().map(|s| SessionEvent::AutoProgress {
            current: s.current,
            total: s.total,
            mission: s.mission.clone(),
        })
    }
}

pub struct AgentRunGuard {
    session: Arc<SessionState>,
    cancel: CancellationToken,
}

impl AgentRunGuard {
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }
}

impl Drop for AgentRunGuard {
    fn drop(&mut self) {
        *self.session.agent.lock() = None;
        debug!("agent slot released");
    }
}

pub struct AutoplayGuard {
    session: Arc<SessionState>,
    cancel: CancellationToken,
}

impl AutoplayGuard {
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn begin_round(&self, round: u32, mission: &str) {
        if let Some(slot) = self.session.autoplay.lock().as_mut() {
            slot.current = round;
            slot.mission = mission.to_string();
        }
    }
}

impl Drop for AutoplayGuard {
    fn drop(&mut self) {
        *self.session.autoplay.lock() = None;
        debug!("autoplay slot released");
    }
}
