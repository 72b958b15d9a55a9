//! Event matching.
//!
//! A hook subscribes with one or more matchers. A matcher accepts an event when
//! its type equals the event type (or is `*`) and every field filter matches
//! the corresponding top-level field of the JSON payload.

use glob::Pattern;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Matches any event type.
pub const ANY_EVENT: &str = "*";

/// Glob filter applied to one top-level payload field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    /// Payload field name
    pub field: String,
    /// Compiled glob pattern
    pub pattern: Pattern,
}

impl Serialize for FieldFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FieldFilter", 2)?;
        state.serialize_field("field", &self.field)?;
        state.serialize_field("pattern", self.pattern.as_str())?;
        state.end()
    }
}

/// One `{type, filter?}` entry of a hook's `events` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventMatcher {
    /// Event type, or `*`
    #[serde(rename = "type")]
    pub event_type: String,
    /// All filters must match
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<FieldFilter>,
}

impl EventMatcher {
    /// Whether this matcher accepts the event.
    pub fn matches(&self, event: &EventContext) -> bool {
        if self.event_type != ANY_EVENT && self.event_type != event.event_type {
            return false;
        }
        if self.filter.is_empty() {
            return true;
        }
        let Some(fields) = &event.fields else {
            return false;
        };
        self.filter.iter().all(|f| {
            fields
                .get(&f.field)
                .and_then(scalar_to_string)
                .map(|value| f.pattern.matches(&value))
                .unwrap_or(false)
        })
    }
}

fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// The event being dispatched, as seen by matchers.
///
/// The payload stays an opaque blob for the hook itself; it is parsed here only
/// so filters can look at top-level fields.
#[derive(Debug, Clone)]
pub struct EventContext {
    /// Event type, e.g. `task.completed`
    pub event_type: String,
    fields: Option<serde_json::Map<String, serde_json::Value>>,
}

impl EventContext {
    /// Build a context from the raw payload bytes.
    ///
    /// Payloads that are not a JSON object simply have no fields; filtered
    /// matchers never match them.
    pub fn new(event_type: impl Into<String>, payload: &[u8]) -> Self {
        let fields = match serde_json::from_slice::<serde_json::Value>(payload) {
            Ok(serde_json::Value::Object(map)) => Some(map),
            _ => None,
        };
        Self {
            event_type: event_type.into(),
            fields,
        }
    }

    /// Whether the payload parsed as a JSON object.
    pub fn has_fields(&self) -> bool {
        self.fields.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(event_type: &str, filter: &[(&str, &str)]) -> EventMatcher {
        EventMatcher {
            event_type: event_type.to_string(),
            filter: filter
                .iter()
                .map(|(field, pattern)| FieldFilter {
                    field: field.to_string(),
                    pattern: Pattern::new(pattern).unwrap(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_type_must_match() {
        let event = EventContext::new("task.completed", b"");
        assert!(matcher("task.completed", &[]).matches(&event));
        assert!(!matcher("task.created", &[]).matches(&event));
        assert!(matcher("*", &[]).matches(&event));
    }

    #[test]
    fn test_filter_globs_top_level_fields() {
        let event = EventContext::new(
            "vcs.commit",
            br#"{"branch": "release/1.2", "files": 3, "draft": false}"#,
        );
        assert!(matcher("vcs.commit", &[("branch", "release/*")]).matches(&event));
        assert!(matcher("vcs.commit", &[("files", "3"), ("draft", "false")]).matches(&event));
        assert!(!matcher("vcs.commit", &[("branch", "main")]).matches(&event));
        assert!(!matcher("vcs.commit", &[("missing", "*")]).matches(&event));
    }

    #[test]
    fn test_filter_never_matches_opaque_payload() {
        let event = EventContext::new("vcs.commit", b"not json at all");
        assert!(!event.has_fields());
        assert!(!matcher("vcs.commit", &[("branch", "*")]).matches(&event));
        assert!(matcher("vcs.commit", &[]).matches(&event));
    }
}
