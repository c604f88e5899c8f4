//! Key namespaces used on the blackboard.
//!
//! Namespaces are plain string prefixes; `Context::keys(prefix)` treats every
//! key starting with one of these as a member of the group.

/// Active curve (stored by value)
pub const ACTIVE_CURVE: &str = "curve.active";
/// Id of the active curve
pub const ACTIVE_CURVE_ID: &str = "curve.active_id";
/// Prefix for both curve keys
pub const CURVE_NS: &str = "curve.";

/// Resolved parameters for the current run, `param.<key>`
pub const PARAM_NS: &str = "param.";

/// Picked points for the current run
pub const SELECTED_POINTS: &str = "points.selected";
pub const POINTS_NS: &str = "points.";

/// Last-run snapshots, `history.<algorithm>.params` / `.points`
pub const HISTORY_NS: &str = "history.";

/// Stored results, `result.<len>:<algorithm>.<len>:<curve>.…`.
///
/// Both ids are length-prefixed, so ids containing `.` cannot make two
/// pairs share a namespace.
pub const RESULT_NS: &str = "result.";

pub fn param(key: &str) -> String {
    format!("{PARAM_NS}{key}")
}

pub fn last_run_params(algorithm: &str) -> String {
    format!("{HISTORY_NS}{algorithm}.params")
}

pub fn last_run_points(algorithm: &str) -> String {
    format!("{HISTORY_NS}{algorithm}.points")
}

pub fn last_run_curve(algorithm: &str) -> String {
    format!("{HISTORY_NS}{algorithm}.curve")
}

/// Namespace of every result key for one (algorithm, curve) pair
pub fn result_ns(algorithm: &str, curve_id: &str) -> String {
    format!(
        "{RESULT_NS}{}:{algorithm}.{}:{curve_id}.",
        algorithm.len(),
        curve_id.len()
    )
}

pub fn result_task(algorithm: &str, curve_id: &str, task_id: &str) -> String {
    format!("{}task.{task_id}", result_ns(algorithm, curve_id))
}

pub fn result_latest(algorithm: &str, curve_id: &str) -> String {
    format!("{}latest", result_ns(algorithm, curve_id))
}

pub fn result_history(algorithm: &str, curve_id: &str) -> String {
    format!("{}history", result_ns(algorithm, curve_id))
}

/// Split a result key into `(algorithm, curve, rest)`, where `rest` is
/// `latest`, `history` or `task.<id>`.
pub fn parse_result_key(key: &str) -> Option<(&str, &str, &str)> {
    let rest = key.strip_prefix(RESULT_NS)?;
    let (algorithm, rest) = split_component(rest)?;
    let (curve_id, rest) = split_component(rest)?;
    Some((algorithm, curve_id, rest))
}

fn split_component(s: &str) -> Option<(&str, &str)> {
    let (len, rest) = s.split_once(':')?;
    let len: usize = len.parse().ok()?;
    let component = rest.get(..len)?;
    let rest = rest.get(len..)?.strip_prefix('.')?;
    Some((component, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_keys_share_namespace() {
        let ns = result_ns("baseline", "C1");
        assert!(result_task("baseline", "C1", "t1").starts_with(&ns));
        assert!(result_latest("baseline", "C1").starts_with(&ns));
        assert!(result_history("baseline", "C1").starts_with(&ns));
        assert!(param("window").starts_with(PARAM_NS));
        assert!(ACTIVE_CURVE.starts_with(CURVE_NS));
        assert!(SELECTED_POINTS.starts_with(POINTS_NS));
    }

    #[test]
    fn dotted_ids_do_not_collide() {
        let a = result_ns("peak.area", "C1");
        let b = result_ns("peak", "area.C1");
        assert_ne!(a, b);
        assert!(!a.starts_with(&b) && !b.starts_with(&a));
        assert_ne!(result_latest("peak.area", "C1"), result_latest("peak", "area.C1"));
    }

    #[test]
    fn result_keys_parse_back() {
        let key = result_task("peak.area", "C:1", "t.history");
        assert_eq!(parse_result_key(&key), Some(("peak.area", "C:1", "task.t.history")));
        assert_eq!(
            parse_result_key(&result_history("ä", "C1")),
            Some(("ä", "C1", "history"))
        );
        assert_eq!(parse_result_key("result.9:short.2:C1.latest"), None);
        assert_eq!(parse_result_key("param.window"), None);
    }
}
