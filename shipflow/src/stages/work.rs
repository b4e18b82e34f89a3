//! Helpers shared by the built-in stages.

use crate::report::StepResult;
use std::future::Future;
use std::time::Duration;

/// Drives `work` to completion while copying `read_progress` into `result` on
/// every tick, then once more after it finished.
pub(crate) async fn mirror_progress<F, P>(
    work: F,
    result: &StepResult,
    read_progress: P,
    interval: Duration,
) -> bool
where
    F: Future<Output = bool>,
    P: Fn() -> f64,
{
    tokio::pin!(work);
    let mut ticker = tokio::time::interval(interval);
    let ok = loop {
        tokio::select! {
            ok = &mut work => break ok,
            _ = ticker.tick() => result.set_progress(read_progress()),
        }
    };
    result.set_progress(read_progress());
    ok
}

/// Makes sure a failed work item leaves a failed result behind.
pub(crate) fn settle(result: &StepResult, ok: bool, failure: impl FnOnce() -> String) -> bool {
    if !ok && result.is_successful() {
        result.set_failed(failure());
    }
    ok && result.is_successful()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_mirror_progress_samples_while_running() {
        let progress = Arc::new(AtomicU64::new(0.25f64.to_bits()));
        let result = StepResult::detached();
        let read_progress = {
            let progress = progress.clone();
            move || f64::from_bits(progress.load(Ordering::SeqCst))
        };

        let ok = mirror_progress(
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                false
            },
            &result,
            read_progress,
            Duration::from_millis(1),
        )
        .await;

        assert!(!ok);
        assert_eq!(result.percent_complete(), 0.25);
    }

    #[tokio::test]
    async fn test_mirror_progress_samples_after_completion() {
        let result = StepResult::detached();
        let ok = mirror_progress(async { true }, &result, || 0.5, Duration::from_millis(5)).await;
        assert!(ok);
        assert_eq!(result.percent_complete(), 0.5);
    }

    #[test]
    fn test_settle() {
        let result = StepResult::detached();
        assert!(!settle(&result, false, || "fetch failed".to_string()));
        assert_eq!(result.fail_reason().as_deref(), Some("fetch failed"));

        let already_failed = StepResult::detached();
        already_failed.set_failed("disk full");
        assert!(!settle(&already_failed, true, || "unused".to_string()));
        assert_eq!(already_failed.fail_reason().as_deref(), Some("disk full"));
    }
}
