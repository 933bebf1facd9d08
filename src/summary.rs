//! Summary builder for CLI output.
//!
//! Turns the final lifecycle state into either human-readable lines or a JSON document.

use crate::lifecycle::FilterLifecycle;
use crate::model::{Filter, LifecycleState};
use serde::Serialize;

/// Serializable view of a lifecycle after the controller stopped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub app_name: Option<String>,
    pub state: LifecycleState,
    pub filters: Vec<Filter>,
    pub current: Option<Filter>,
    pub errors: Vec<String>,
}

impl Snapshot {
    pub fn capture(lifecycle: &FilterLifecycle, errors: Vec<String>) -> Self {
        Self {
            app_name: lifecycle.app_name().map(|a| a.to_string()),
            state: lifecycle.state(),
            filters: lifecycle.filters().map(<[Filter]>::to_vec).unwrap_or_default(),
            current: lifecycle.current_filter().cloned(),
            errors,
        }
    }
}

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn build_text_summary(snapshot: &Snapshot) -> TextSummary {
    let mut lines = Vec::new();

    let app = snapshot.app_name.as_deref().unwrap_or("-");
    lines.push(format!("Application: {app} ({:?})", snapshot.state));

    if snapshot.filters.is_empty() {
        lines.push("No filters".to_string());
    }
    let current_id = snapshot.current.as_ref().and_then(|f| f.id.as_ref());
    for f in &snapshot.filters {
        let marker = if f.id.is_some() && f.id.as_ref() == current_id {
            '*'
        } else {
            ' '
        };
        let id = f.id.as_ref().map(|id| id.as_str()).unwrap_or("-");
        let icon = f.icon.as_deref().unwrap_or("-");
        lines.push(format!("{marker} {:<24} id={id} icon={icon}", f.name));
        if !f.query.is_empty() {
            let query: Vec<String> = f.query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            lines.push(format!("    {}", query.join(" ")));
        }
    }

    match snapshot.current.as_ref() {
        Some(f) => lines.push(format!("Current: {}", f.name)),
        None => lines.push("Current: -".to_string()),
    }
    for e in &snapshot.errors {
        lines.push(format!("Error: {e}"));
    }

    TextSummary { lines }
}
