//! Lifecycle notifications sent by the host around entity construction and save.
//!
//! Receivers are connected per (signal, entity type) under a dispatch uid, so
//! connecting the same uid twice is a no-op.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::{entity::EntityAdapter, errors::EavResult, store::EavStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// A new instance was constructed.
    PostInit,
    /// The host is about to persist the instance. An error aborts the save.
    PreSave,
    /// The host persisted the instance.
    PostSave,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signal::PostInit => "post_init",
            Signal::PreSave => "pre_save",
            Signal::PostSave => "post_save",
        })
    }
}

/// Everything a receiver may touch for one instance.
pub struct SignalContext<'a> {
    pub signal: Signal,
    pub entity_type: &'a str,
    pub entity_id: Option<String>,
    pub store: &'a Rc<dyn EavStore>,
    pub adapter: &'a mut Option<EntityAdapter>,
}

pub type Receiver = Arc<dyn Fn(&mut SignalContext<'_>) -> EavResult<()> + Send + Sync>;

struct Connection {
    signal: Signal,
    entity_type: String,
    uid: String,
    receiver: Receiver,
}

#[derive(Default)]
pub struct Signals {
    connections: Vec<Connection>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects `receiver`. Returns `false` if `uid` is already connected for this signal and type.
    pub fn connect<F>(&mut self, signal: Signal, entity_type: &str, uid: impl Into<String>, receiver: F) -> bool
    where
        F: Fn(&mut SignalContext<'_>) -> EavResult<()> + Send + Sync + 'static,
    {
        let uid = uid.into();
        if self.position(signal, entity_type, &uid).is_some() {
            return false;
        }
        self.connections.push(Connection {
            signal,
            entity_type: entity_type.to_string(),
            uid,
            receiver: Arc::new(receiver),
        });
        true
    }

    pub fn disconnect(&mut self, signal: Signal, entity_type: &str, uid: &str) -> bool {
        match self.position(signal, entity_type, uid) {
            Some(index) => {
                self.connections.remove(index);
                true
            }
            None => false,
        }
    }

    /// Drops every receiver connected for `entity_type`, returning how many were removed.
    pub fn disconnect_all(&mut self, entity_type: &str) -> usize {
        let before = self.connections.len();
        self.connections.retain(|connection| connection.entity_type != entity_type);
        before - self.connections.len()
    }

    pub fn receiver_count(&self, signal: Signal, entity_type: &str) -> usize {
        self.connections
            .iter()
            .filter(|connection| connection.signal == signal && connection.entity_type == entity_type)
            .count()
    }

    /// Runs the receivers for `context.signal` in connection order; the first error stops dispatch.
    pub fn send(&self, context: &mut SignalContext<'_>) -> EavResult<()> {
        let receivers: Vec<Receiver> = self
            .connections
            .iter()
            .filter(|connection| connection.signal == context.signal && connection.entity_type == context.entity_type)
            .map(|connection| Arc::clone(&connection.receiver))
            .collect();
        for receiver in receivers {
            receiver(context)?;
        }
        Ok(())
    }

    fn position(&self, signal: Signal, entity_type: &str, uid: &str) -> Option<usize> {
        self.connections.iter().position(|connection| {
            connection.signal == signal && connection.entity_type == entity_type && connection.uid == uid
        })
    }
}

impl fmt::Debug for Signals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.connections
                    .iter()
                    .map(|connection| format!("{}:{}:{}", connection.signal, connection.entity_type, connection.uid)),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EavError;
    use crate::store::MemStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn duplicate_uids_are_ignored() {
        let mut signals = Signals::new();
        assert!(signals.connect(Signal::PreSave, "patient", "validate", |_| Ok(())));
        assert!(!signals.connect(Signal::PreSave, "patient", "validate", |_| Ok(())));
        assert!(signals.connect(Signal::PreSave, "encounter", "validate", |_| Ok(())));
        assert_eq!(signals.receiver_count(Signal::PreSave, "patient"), 1);

        assert!(signals.disconnect(Signal::PreSave, "patient", "validate"));
        assert!(!signals.disconnect(Signal::PreSave, "patient", "validate"));
        assert_eq!(signals.disconnect_all("encounter"), 1);
    }

    #[test]
    fn send_dispatches_by_signal_and_type() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut signals = Signals::new();
        let counter = Arc::clone(&hits);
        signals.connect(Signal::PostSave, "patient", "count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        signals.connect(Signal::PreSave, "patient", "fail", |_| Err(EavError::state("rejected")));

        let store: Rc<dyn EavStore> = Rc::new(MemStore::new());
        let mut adapter = None;
        let mut context = SignalContext {
            signal: Signal::PostSave,
            entity_type: "patient",
            entity_id: Some("p1".into()),
            store: &store,
            adapter: &mut adapter,
        };
        signals.send(&mut context).expect("post save");
        context.entity_type = "encounter";
        signals.send(&mut context).expect("no receivers");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        context.entity_type = "patient";
        context.signal = Signal::PreSave;
        assert!(signals.send(&mut context).is_err());
    }
}
