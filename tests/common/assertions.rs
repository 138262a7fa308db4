//! Custom test assertions for integration tests

use docshift::{Event, Orchestrator, Status, TaskId};
use std::time::Duration;

/// Result of waiting for a task to finish
#[derive(Debug, PartialEq)]
pub enum WaitResult {
    /// Task completed successfully
    Completed,
    /// Task failed with error
    Failed(String),
    /// Timeout waiting for a terminal state
    Timeout,
}

/// Poll a task's status until it is Completed or Failed
///
/// # Arguments
/// * `orchestrator` - The orchestrator instance
/// * `id` - Task ID to wait for
/// * `timeout` - Maximum time to wait
pub async fn wait_for_terminal(
    orchestrator: &Orchestrator,
    id: TaskId,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            if let Ok(view) = orchestrator.status(id).await {
                match view.status {
                    Status::Completed => return WaitResult::Completed,
                    Status::Failed => return WaitResult::Failed(view.error.unwrap_or_default()),
                    Status::Pending | Status::Processing => {}
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Collect events until `stop` matches one or the timeout elapses
pub async fn collect_events_until<F>(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    timeout: Duration,
    mut stop: F,
) -> Vec<Event>
where
    F: FnMut(&Event) -> bool,
{
    let mut collected = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let done = stop(&event);
            collected.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    collected
}

/// Assert that a directory holds exactly `expected` entries
pub fn assert_entry_count(dir: &std::path::Path, expected: usize) {
    let count = std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).count())
        .unwrap_or(0);
    assert_eq!(
        count,
        expected,
        "expected {} entries in {}, found {}",
        expected,
        dir.display(),
        count
    );
}
