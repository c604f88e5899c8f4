//! Bounded result history per (algorithm, curve) pair.
//!
//! For each pair the context holds three kinds of keys under
//! [`keys::result_ns`]: one entry per stored task result, a
//! `latest` pointer holding the newest task id, and a `history` list of task
//! ids, newest first. The list never exceeds the context's history depth and
//! evicted ids take their stored results with them.

use crate::context::keys;
use crate::context::store::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

const HISTORY_SOURCE: &str = "history";

impl Context {
    /// Store a task result and record it as the newest entry for the pair.
    ///
    /// Rejects (returns `false`) when any id is empty or the result does not
    /// serialize.
    pub fn save_result<T: Serialize + ?Sized>(
        &mut self,
        task_id: &str,
        algorithm: &str,
        curve_id: &str,
        result: &T,
    ) -> bool {
        if task_id.is_empty() || algorithm.is_empty() || curve_id.is_empty() {
            warn!(
                task_id,
                algorithm, curve_id, "Refusing to save result with empty identifier"
            );
            return false;
        }

        let value = match serde_json::to_value(result) {
            Ok(value) if !value.is_null() => value,
            Ok(_) => {
                warn!(task_id, algorithm, "Refusing to save empty result");
                return false;
            }
            Err(e) => {
                warn!(task_id, algorithm, error = %e, "Result failed to serialize");
                return false;
            }
        };

        let task_key = keys::result_task(algorithm, curve_id, task_id);
        self.set_raw(&task_key, value, algorithm);
        self.set_value(&keys::result_latest(algorithm, curve_id), task_id, HISTORY_SOURCE);

        let history_key = keys::result_history(algorithm, curve_id);
        let mut history = self.history_ids(algorithm, curve_id);
        history.retain(|id| id != task_id);
        history.insert(0, task_id.to_string());
        self.store_history(algorithm, curve_id, &history_key, history);

        debug!(task_id, algorithm, curve_id, "Saved result");
        true
    }

    /// Newest result for the pair, if the pointer resolves.
    pub fn latest_result<T: DeserializeOwned>(&self, algorithm: &str, curve_id: &str) -> Option<T> {
        let task_id: String = self.get(&keys::result_latest(algorithm, curve_id))?;
        self.task_result(algorithm, curve_id, &task_id)
    }

    /// Up to `limit` results, newest first; `limit == 0` returns all.
    /// Ids that no longer resolve are skipped.
    pub fn history_results<T: DeserializeOwned>(
        &self,
        algorithm: &str,
        curve_id: &str,
        limit: usize,
    ) -> Vec<T> {
        let ids = self.history_ids(algorithm, curve_id);
        let take = if limit == 0 { ids.len() } else { limit };
        ids.iter()
            .take(take)
            .filter_map(|id| self.task_result(algorithm, curve_id, id))
            .collect()
    }

    pub fn task_result<T: DeserializeOwned>(
        &self,
        algorithm: &str,
        curve_id: &str,
        task_id: &str,
    ) -> Option<T> {
        self.get(&keys::result_task(algorithm, curve_id, task_id))
    }

    /// Task ids in the history list, newest first.
    pub fn history_ids(&self, algorithm: &str, curve_id: &str) -> Vec<String> {
        self.get(&keys::result_history(algorithm, curve_id))
            .unwrap_or_default()
    }

    pub(crate) fn enforce_history_depth(&mut self) {
        let pairs: Vec<(String, String)> = self
            .keys(keys::RESULT_NS)
            .iter()
            .filter_map(|key| match keys::parse_result_key(key) {
                Some((algorithm, curve_id, "history")) => {
                    Some((algorithm.to_string(), curve_id.to_string()))
                }
                _ => None,
            })
            .collect();

        for (algorithm, curve_id) in pairs {
            let history_key = keys::result_history(&algorithm, &curve_id);
            let ids = self.history_ids(&algorithm, &curve_id);
            if ids.len() > self.history_depth() {
                self.store_history(&algorithm, &curve_id, &history_key, ids);
            }
        }
    }

    fn store_history(&mut self, algorithm: &str, curve_id: &str, history_key: &str, mut history: Vec<String>) {
        let depth = self.history_depth();
        if history.len() > depth {
            for evicted in history.split_off(depth) {
                debug!(task_id = %evicted, algorithm, curve_id, "Evicting result from history");
                self.remove(&keys::result_task(algorithm, curve_id, &evicted));
            }
        }
        self.set_value(history_key, &history, HISTORY_SOURCE);
    }
}
