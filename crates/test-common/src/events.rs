//! Event stream processing helpers for workflow tests.

use futures::StreamExt;
use provision::workflow::{EventStream, WorkflowEvent, WorkflowFailure, WorkflowSummary};

/// Collects all events from a stream for testing verification.
///
/// # Example
/// ```rust
/// let events = collect_events(runner.start(workflow)).await;
/// ```
pub async fn collect_events(stream: EventStream) -> Vec<WorkflowEvent> {
    stream.collect().await
}

/// The result carried by the `Completed` event, if one was sent.
#[must_use]
pub fn completion(events: &[WorkflowEvent]) -> Option<&Result<WorkflowSummary, WorkflowFailure>> {
    events.iter().find_map(|event| match event {
        WorkflowEvent::Completed(result) => Some(result),
        _ => None,
    })
}

/// Counts events of a specific type for verification.
///
/// # Example
/// ```rust
/// let started = count_events_of_type(&events, |e| {
///     matches!(e, WorkflowEvent::StepStarted { .. })
/// });
/// ```
pub fn count_events_of_type<F>(events: &[WorkflowEvent], predicate: F) -> usize
where
    F: Fn(&WorkflowEvent) -> bool,
{
    events.iter().filter(|e| predicate(e)).count()
}

/// Text of every relayed output line, in order.
#[must_use]
pub fn output_lines(events: &[WorkflowEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            WorkflowEvent::Output(line) => Some(line.text().to_string()),
            _ => None,
        })
        .collect()
}

/// Titles of the steps whose pre-check skipped them.
#[must_use]
pub fn skipped_steps(events: &[WorkflowEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            WorkflowEvent::StepSkipped { title, .. } => Some(title.clone()),
            _ => None,
        })
        .collect()
}
