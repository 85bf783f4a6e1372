//! Delivery sink recording what every node handed to its application.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ring_relay_core::{ParticipantId, Payload};

/// One local delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery<P> {
    pub participant: ParticipantId,
    pub payload: P,
}

/// Shared log of deliveries across nodes.
pub struct Recorder<P> {
    deliveries: Arc<Mutex<Vec<Delivery<P>>>>,
}

impl<P> Clone for Recorder<P> {
    fn clone(&self) -> Self {
        Self {
            deliveries: Arc::clone(&self.deliveries),
        }
    }
}

impl<P> Default for Recorder<P> {
    fn default() -> Self {
        Self {
            deliveries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<P: Payload> Recorder<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A delivery handler that records into this log on behalf of
    /// `participant`.
    pub fn handler(&self, participant: ParticipantId) -> impl Fn(&P) + Send + Sync + 'static {
        let deliveries = Arc::clone(&self.deliveries);
        move |payload: &P| {
            deliveries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Delivery {
                    participant: participant.clone(),
                    payload: payload.clone(),
                });
        }
    }

    /// Snapshot of every delivery so far, in arrival order.
    pub fn deliveries(&self) -> Vec<Delivery<P>> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Deliveries of `payload`, counted per participant.
    pub fn receipts_of(&self, payload: &P) -> BTreeMap<ParticipantId, usize>
    where
        P: PartialEq,
    {
        let mut counts = BTreeMap::new();
        for delivery in self.lock().iter().filter(|d| &d.payload == payload) {
            *counts.entry(delivery.participant.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Participants that received `payload`, sorted.
    pub fn receivers_of(&self, payload: &P) -> Vec<ParticipantId>
    where
        P: PartialEq,
    {
        self.receipts_of(payload).into_keys().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Delivery<P>>> {
        self.deliveries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_records_per_participant() {
        let recorder = Recorder::<String>::new();
        let p1 = recorder.handler("p1".into());
        let p2 = recorder.handler("p2".into());

        p1(&"a".to_string());
        p2(&"a".to_string());
        p2(&"a".to_string());
        p2(&"b".to_string());

        let counts = recorder.receipts_of(&"a".to_string());
        assert_eq!(counts.get(&ParticipantId::from("p1")), Some(&1));
        assert_eq!(counts.get(&ParticipantId::from("p2")), Some(&2));
        assert_eq!(recorder.receivers_of(&"b".to_string()), vec![ParticipantId::from("p2")]);
        assert_eq!(recorder.len(), 4);

        recorder.clear();
        assert!(recorder.is_empty());
    }
}
