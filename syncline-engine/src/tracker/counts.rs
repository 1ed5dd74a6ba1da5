//! Step status and record-count derivation.
//!
//! The backend exposes counts under inconsistent conventions: cumulative
//! since the connector was created for some steps, per-run for others, and
//! sometimes only inside a free-form details blob. Everything here is pure
//! so the precedence rules are testable without a clock or a backend.

use serde_json::Value;

use syncline_core::pipeline::{DataStats, RunSnapshot, StepSnapshot};
use syncline_core::status::StepStatus;

/// Detail-blob keys which are treated as carrying a record count.
const COUNT_KEY_MARKERS: &[&str] = &["count", "records", "items", "rows", "processed"];

/// A local-only snapshot of the cumulative totals at the moment a new run was
/// first observed; used to derive per-run deltas for counters the backend
/// only reports cumulatively. Written only by the progress tracker.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BaselineCounts {
    pub total_records: u64,
    pub items_processed: u64,
}

impl BaselineCounts {
    /// Capture the then-current cumulative totals.
    pub fn capture(stats: Option<&DataStats>) -> Self {
        Self {
            total_records: stats.and_then(|s| s.total_records).unwrap_or(0),
            items_processed: stats.and_then(|s| s.items_processed).unwrap_or(0),
        }
    }
}

/// Conventional classification of a step by name.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StepClass {
    Extract,
    Transform,
    Load,
    Other,
}

fn classify_step(name: &str) -> StepClass {
    let lowered = name.to_ascii_lowercase();
    if lowered.contains("extract") {
        StepClass::Extract
    } else if lowered.contains("transform") {
        StepClass::Transform
    } else if lowered.contains("load") {
        StepClass::Load
    } else {
        StepClass::Other
    }
}

/// Determine the raw count for a step under the fixed precedence:
///
/// 1. extract/load steps prefer the cumulative total-records statistic;
/// 2. transform steps derive a per-run delta from the cumulative items
///    counter and the captured baseline (never below zero);
/// 3. otherwise the free-form details blob is parsed for count-like keys;
/// 4. otherwise zero.
pub fn raw_count_for_step(step: &StepSnapshot, stats: Option<&DataStats>, baseline: &BaselineCounts) -> u64 {
    match classify_step(&step.name) {
        StepClass::Extract | StepClass::Load => {
            if let Some(total) = stats.and_then(|s| s.total_records) {
                return total;
            }
        }
        StepClass::Transform => {
            if let Some(items) = stats.and_then(|s| s.items_processed) {
                return items.saturating_sub(baseline.items_processed);
            }
        }
        StepClass::Other => {}
    }
    step.details.as_ref().and_then(details_count).unwrap_or(0)
}

/// Extract a count from a free-form details blob, if one is present.
///
/// Objects are scanned for count-like keys (nested one blob deep); strings
/// yield their trailing integer; bare numbers are used as-is.
pub fn details_count(details: &Value) -> Option<u64> {
    match details {
        Value::Number(num) => num.as_u64(),
        Value::String(text) => trailing_integer(text),
        Value::Object(map) => {
            for (key, val) in map {
                let lowered = key.to_ascii_lowercase();
                if COUNT_KEY_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                    if let Some(count) = scalar_count(val) {
                        return Some(count);
                    }
                }
            }
            map.values().filter(|val| val.is_object()).find_map(details_count)
        }
        _ => None,
    }
}

fn scalar_count(val: &Value) -> Option<u64> {
    match val {
        Value::Number(num) => num.as_u64(),
        Value::String(text) => text.trim().parse().ok().or_else(|| trailing_integer(text)),
        _ => None,
    }
}

/// The last run of ASCII digits in the given text, parsed as a count.
fn trailing_integer(text: &str) -> Option<u64> {
    let mut end = None;
    let mut start = 0;
    for (idx, chr) in text.char_indices().rev() {
        if chr.is_ascii_digit() {
            if end.is_none() {
                end = Some(idx + 1);
            }
            start = idx;
        } else if end.is_some() {
            break;
        }
    }
    end.and_then(|end| text[start..end].parse().ok())
}

/// Determine the index of the active step, iterating in pipeline order.
///
/// Three tiers, because backends may mark the overall run as running without
/// having set any individual step's status yet:
///
/// 1. the first step with an explicit running/in-progress status;
/// 2. the first step that has started but not completed;
/// 3. if the run itself is running, the first step with no completion
///    timestamp.
pub fn active_step(run: &RunSnapshot) -> Option<usize> {
    let run_status = run.status.as_deref().map(StepStatus::normalize).unwrap_or_default();
    active_step_with(&run.steps, run_status)
}

/// `active_step` over already-normalized run state.
pub fn active_step_with(steps: &[StepSnapshot], run_status: StepStatus) -> Option<usize> {
    if let Some(pos) = steps
        .iter()
        .position(|step| step.status.as_deref().map(StepStatus::normalize) == Some(StepStatus::Running))
    {
        return Some(pos);
    }
    if let Some(pos) = steps.iter().position(|step| step.started_at.is_some() && step.completed_at.is_none()) {
        return Some(pos);
    }
    if run_status == StepStatus::Running {
        return steps.iter().position(|step| step.completed_at.is_none());
    }
    None
}

/// Derive the display status for a step: explicit status first, then the
/// timestamps when the backend has not set one.
pub fn derived_status(step: &StepSnapshot) -> StepStatus {
    if let Some(raw) = step.status.as_deref() {
        if !raw.trim().is_empty() {
            return StepStatus::normalize(raw);
        }
    }
    if step.completed_at.is_some() {
        StepStatus::Success
    } else if step.started_at.is_some() {
        StepStatus::Running
    } else {
        StepStatus::Pending
    }
}
