use crate::context::keys;
use crate::curve::Point;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// One blackboard slot. `source` records who wrote it last and is never
/// consulted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub value: Value,
    pub source: String,
}

/// Change notifications published by a [`Context`]
#[derive(Debug, Clone, PartialEq)]
pub enum ContextEvent {
    Changed { key: String, source: String },
    Removed { key: String },
}

/// Parameters and points recorded by the previous dispatch of an algorithm
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LastRun {
    pub curve_id: Option<String>,
    pub parameters: Map<String, Value>,
    pub points: Vec<Point>,
}

/// Typed key/value blackboard shared by the coordinator and algorithms.
///
/// Values are held as `serde_json::Value`, so [`Clone`] is a deep copy and a
/// clone never aliases the original's storage. Subscribers are not carried
/// over to clones.
#[derive(Debug)]
pub struct Context {
    entries: HashMap<String, ContextEntry>,
    history_depth: usize,
    event_capacity: usize,
    events: broadcast::Sender<ContextEvent>,
}

impl Context {
    pub fn new(history_depth: usize) -> Self {
        Self::with_event_capacity(history_depth, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(history_depth: usize, event_capacity: usize) -> Self {
        let event_capacity = event_capacity.max(1);
        let (events, _) = broadcast::channel(event_capacity);
        Self {
            entries: HashMap::new(),
            history_depth: history_depth.max(1),
            event_capacity,
            events,
        }
    }

    /// Receive change and removal notifications from this context only.
    pub fn subscribe(&self) -> broadcast::Receiver<ContextEvent> {
        self.events.subscribe()
    }

    /// Store `value` under `key`.
    ///
    /// Null values, empty keys and values that fail to serialize are rejected.
    /// Returns `true` when a change notification was published, which happens
    /// only for new keys or differing values.
    pub fn set_value<T: Serialize + ?Sized>(&mut self, key: &str, value: &T, source: &str) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.set_raw(key, value, source),
            Err(e) => {
                warn!(key, error = %e, "Rejected context value that failed to serialize");
                false
            }
        }
    }

    pub fn set_raw(&mut self, key: &str, value: Value, source: &str) -> bool {
        if key.is_empty() {
            warn!("Rejected context value with empty key");
            return false;
        }
        if value.is_null() {
            debug!(key, "Rejected null context value");
            return false;
        }

        match self.entries.get_mut(key) {
            Some(entry) if entry.value == value => {
                entry.source = source.to_string();
                false
            }
            Some(entry) => {
                entry.value = value;
                entry.source = source.to_string();
                self.publish(ContextEvent::Changed {
                    key: key.to_string(),
                    source: source.to_string(),
                });
                true
            }
            None => {
                self.entries.insert(
                    key.to_string(),
                    ContextEntry {
                        value,
                        source: source.to_string(),
                    },
                );
                self.publish(ContextEvent::Changed {
                    key: key.to_string(),
                    source: source.to_string(),
                });
                true
            }
        }
    }

    /// Typed read; `None` when absent or not convertible to `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.entries.get(key)?;
        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key, error = %e, "Context value not convertible to requested type");
                None
            }
        }
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn entry(&self, key: &str) -> Option<&ContextEntry> {
        self.entries.get(key)
    }

    pub fn source_of(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|entry| entry.source.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove a key. No-op (and no notification) when absent.
    pub fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.publish(ContextEvent::Removed {
                key: key.to_string(),
            });
            true
        } else {
            false
        }
    }

    /// Remove every key in a namespace, returning how many were removed.
    pub fn remove_prefix(&mut self, prefix: &str) -> usize {
        let doomed = self.keys(prefix);
        doomed.iter().filter(|key| self.remove(key)).count()
    }

    /// All keys starting with `prefix`, sorted. An empty prefix lists everything.
    pub fn keys(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn history_depth(&self) -> usize {
        self.history_depth
    }

    /// Change the per-(algorithm, curve) history bound. Zero is rejected.
    /// Shrinking evicts overflow from every existing history immediately.
    pub fn set_history_depth(&mut self, depth: usize) -> bool {
        if depth == 0 {
            warn!("Rejected history depth of 0");
            return false;
        }
        self.history_depth = depth;
        self.enforce_history_depth();
        true
    }

    /// Parameters/points recorded by the last dispatch of `algorithm`.
    pub fn last_run(&self, algorithm: &str) -> Option<LastRun> {
        let parameters: Option<Map<String, Value>> = self.get(&keys::last_run_params(algorithm));
        let points: Option<Vec<Point>> = self.get(&keys::last_run_points(algorithm));
        if parameters.is_none() && points.is_none() {
            return None;
        }
        Some(LastRun {
            curve_id: self.get(&keys::last_run_curve(algorithm)),
            parameters: parameters.unwrap_or_default(),
            points: points.unwrap_or_default(),
        })
    }

    pub(crate) fn publish(&self, event: ContextEvent) {
        // No subscribers is the common case.
        let _ = self.events.send(event);
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        let (events, _) = broadcast::channel(self.event_capacity);
        Self {
            entries: self.entries.clone(),
            history_depth: self.history_depth,
            event_capacity: self.event_capacity,
            events,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(10)
    }
}
