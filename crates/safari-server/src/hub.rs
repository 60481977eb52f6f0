use dashmap::DashMap;
use tokio::sync::mpsc;

use safari_core::events::{EventSink, SessionEvent};
use safari_core::ids::ObserverId;

/// Fan-out of session events to every attached observer queue.
pub struct BroadcastHub {
    observers: DashMap<ObserverId, mpsc::Sender<String>>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            observers: DashMap::new(),
        }
    }

    pub fn attach(&self, id: ObserverId, tx: mpsc::Sender<String>) {
        self.observers.insert(id, tx);
    }

    pub fn detach(&self, id: &ObserverId) -> bool {
        self.observers.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Serialize once and queue for every observer. Full or closed queues drop the message.
    pub fn broadcast(&self, event: &SessionEvent) {
        let Some(text) = encode(event) else {
            return;
        };
        for entry in self.observers.iter() {
            if let Err(e) = entry.value().try_send(text.clone()) {
                tracing::debug!(
                    observer_id = %entry.key(),
                    event = event.event_type(),
                    error = %e,
                    "broadcast dropped"
                );
            }
        }
    }

    /// Queue an event for one observer only.
    pub fn send_to(&self, id: &ObserverId, event: &SessionEvent) -> bool {
        let Some(tx) = self.observers.get(id).map(|e| e.value().clone()) else {
            return false;
        };
        let Some(text) = encode(event) else {
            return false;
        };
        match tx.try_send(text) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(
                    observer_id = %id,
                    msg_len = msg.len(),
                    "send queue full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

impl EventSink for BroadcastHub {
    fn emit(&self, event: SessionEvent) {
        self.broadcast(&event);
    }
}

fn encode(event: &SessionEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!(event = event.event_type(), error = %e, "failed to encode event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safari_core::events::AgentStatus;

    #[test]
    fn broadcast_reaches_every_observer() {
        let hub = BroadcastHub::new();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        hub.attach(ObserverId::new(), tx1);
        hub.attach(ObserverId::new(), tx2);

        hub.emit(SessionEvent::status(AgentStatus::Running));

        let a: serde_json::Value = serde_json::from_str(&rx1.try_recv().unwrap()).unwrap();
        assert_eq!(a["type"], "agentStatus");
        assert_eq!(a["status"], "running");
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn full_queue_drops_without_detaching() {
        let hub = BroadcastHub::new();
        let (tx, mut rx) = mpsc::channel(1);
        let id = ObserverId::new();
        hub.attach(id.clone(), tx);

        hub.broadcast(&SessionEvent::status(AgentStatus::Running));
        hub.broadcast(&SessionEvent::status(AgentStatus::Done));

        assert_eq!(hub.len(), 1);
        assert!(rx.try_recv().unwrap().contains("running"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_queue_is_ignored() {
        let hub = BroadcastHub::new();
        let (tx, rx) = mpsc::channel(4);
        hub.attach(ObserverId::new(), tx);
        drop(rx);
        hub.broadcast(&SessionEvent::status(AgentStatus::Stopped));
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn send_to_targets_one_observer() {
        let hub = BroadcastHub::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        let first = ObserverId::new();
        hub.attach(first.clone(), tx1);
        hub.attach(ObserverId::new(), tx2);

        assert!(hub.send_to(&first, &SessionEvent::status(AgentStatus::Done)));
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
        assert!(!hub.send_to(&ObserverId::new(), &SessionEvent::status(AgentStatus::Done)));
    }

    #[test]
    fn detach_removes_observer() {
        let hub = BroadcastHub::new();
        let (tx, _rx) = mpsc::channel(4);
        let id = ObserverId::new();
        hub.attach(id.clone(), tx);
        assert!(hub.detach(&id));
        assert!(!hub.detach(&id));
        assert!(hub.is_empty());
    }
}
