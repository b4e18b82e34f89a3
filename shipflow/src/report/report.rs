//! The run report.

use super::{LogLine, StepResult};
use crate::core::{StageType, SubPhase};
use crate::utils::{generate_uuid, now_utc, Timestamp};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

type Cells = BTreeMap<(StageType, SubPhase), Vec<Arc<StepResult>>>;

/// The single source of truth for what happened during a run.
///
/// `is_successful` is monotonic: once any contained [`StepResult`] fails,
/// the report stays failed.
#[derive(Debug)]
pub struct Report {
    id: Uuid,
    started_at: RwLock<Option<Timestamp>>,
    ended_at: RwLock<Option<Timestamp>>,
    successful: Arc<AtomicBool>,
    sub_phase: RwLock<SubPhase>,
    cells: RwLock<Cells>,
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl Report {
    /// Creates an empty, successful report.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: generate_uuid(),
            started_at: RwLock::new(None),
            ended_at: RwLock::new(None),
            successful: Arc::new(AtomicBool::new(true)),
            sub_phase: RwLock::new(SubPhase::Intra),
            cells: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the report identity.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Records the start time. Only the first call has an effect.
    pub fn start(&self) {
        let mut started = self.started_at.write();
        if started.is_none() {
            *started = Some(now_utc());
        }
    }

    /// Records the end time.
    pub fn finish(&self) {
        *self.ended_at.write() = Some(now_utc());
    }

    /// Returns when the run started.
    #[must_use]
    pub fn started_at(&self) -> Option<Timestamp> {
        *self.started_at.read()
    }

    /// Returns when the run ended.
    #[must_use]
    pub fn ended_at(&self) -> Option<Timestamp> {
        *self.ended_at.read()
    }

    /// Returns whether every step result so far succeeded.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.successful.load(Ordering::SeqCst)
    }

    /// Returns the sub-phase new results are filed under.
    #[must_use]
    pub fn sub_phase(&self) -> SubPhase {
        *self.sub_phase.read()
    }

    /// Switches the sub-phase new results are filed under.
    pub fn set_sub_phase(&self, sub_phase: SubPhase) {
        *self.sub_phase.write() = sub_phase;
    }

    /// Allocates one result for `stage` under the current sub-phase.
    pub fn new_report(&self, stage: StageType) -> Arc<StepResult> {
        self.new_report_in(stage, self.sub_phase())
    }

    /// Allocates one result for `stage` under an explicit sub-phase.
    pub fn new_report_in(&self, stage: StageType, sub_phase: SubPhase) -> Arc<StepResult> {
        let result = Arc::new(StepResult::new(self.successful.clone()));
        self.cells
            .write()
            .entry((stage, sub_phase))
            .or_default()
            .push(result.clone());
        result
    }

    /// Allocates `count` results for `stage` under the current sub-phase.
    pub fn new_reports(&self, stage: StageType, count: usize) -> Vec<Arc<StepResult>> {
        let sub_phase = self.sub_phase();
        let results: Vec<_> = (0..count)
            .map(|_| Arc::new(StepResult::new(self.successful.clone())))
            .collect();
        self.cells
            .write()
            .entry((stage, sub_phase))
            .or_default()
            .extend(results.iter().cloned());
        results
    }

    /// Returns the results filed under one cell, in creation order.
    #[must_use]
    pub fn step_results(&self, stage: StageType, sub_phase: SubPhase) -> Vec<Arc<StepResult>> {
        self.cells
            .read()
            .get(&(stage, sub_phase))
            .cloned()
            .unwrap_or_default()
    }

    /// Mean progress of every result in the cell, finished or not.
    ///
    /// Returns 0 when the cell is empty.
    #[must_use]
    pub fn progress(&self, stage: StageType, sub_phase: SubPhase) -> f64 {
        let cells = self.cells.read();
        match cells.get(&(stage, sub_phase)) {
            Some(results) if !results.is_empty() => {
                let total: f64 = results.iter().map(|r| r.percent_complete()).sum();
                total / results.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Returns `(stage, reason)` for every failed result.
    ///
    /// Ordered by stage, then sub-phase, then creation order within a cell;
    /// this is not chronological across stages.
    #[must_use]
    pub fn fail_reasons(&self) -> Vec<(StageType, String)> {
        self.cells
            .read()
            .iter()
            .flat_map(|((stage, _), results)| {
                results
                    .iter()
                    .filter_map(move |r| r.fail_reason().map(|reason| (*stage, reason)))
            })
            .collect()
    }

    /// Returns true if any result of `stage` failed, in either sub-phase.
    #[must_use]
    pub fn stage_failed(&self, stage: StageType) -> bool {
        let cells = self.cells.read();
        SubPhase::ALL.iter().any(|phase| {
            cells
                .get(&(stage, *phase))
                .is_some_and(|results| results.iter().any(|r| !r.is_successful()))
        })
    }

    /// Total number of log lines recorded for `stage`, both sub-phases.
    #[must_use]
    pub fn count_step_logs(&self, stage: StageType) -> usize {
        let cells = self.cells.read();
        SubPhase::ALL
            .iter()
            .filter_map(|phase| cells.get(&(stage, *phase)))
            .flatten()
            .map(|r| r.log_count())
            .sum()
    }

    /// All log lines of one cell, result by result.
    #[must_use]
    pub fn step_logs(&self, stage: StageType, sub_phase: SubPhase) -> Vec<LogLine> {
        self.step_results(stage, sub_phase)
            .iter()
            .flat_map(|r| r.logs())
            .collect()
    }

    /// Number of results created for `stage`, both sub-phases.
    #[must_use]
    pub fn result_count(&self, stage: StageType) -> usize {
        let cells = self.cells.read();
        SubPhase::ALL
            .iter()
            .filter_map(|phase| cells.get(&(stage, *phase)))
            .map(Vec::len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_report_uses_current_sub_phase() {
        let report = Report::new();
        report.new_report(StageType::GetSources);
        report.set_sub_phase(SubPhase::Post);
        report.new_report(StageType::GetSources);
        report.new_report(StageType::GetSources);

        assert_eq!(report.step_results(StageType::GetSources, SubPhase::Intra).len(), 1);
        assert_eq!(report.step_results(StageType::GetSources, SubPhase::Post).len(), 2);
        assert_eq!(report.result_count(StageType::GetSources), 3);
    }

    #[test]
    fn test_new_reports_batch() {
        let report = Report::new();
        let results = report.new_reports(StageType::Upload, 4);
        assert_eq!(results.len(), 4);
        assert_eq!(report.step_results(StageType::Upload, SubPhase::Intra).len(), 4);
    }

    #[test]
    fn test_average_progress() {
        let report = Report::new();
        let results = report.new_reports(StageType::GetSources, 3);
        results[0].set_progress(0.2);
        results[1].set_progress(0.4);
        results[2].set_progress(0.6);

        let progress = report.progress(StageType::GetSources, SubPhase::Intra);
        assert!((progress - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_progress_of_empty_cell_is_zero() {
        let report = Report::new();
        assert_eq!(report.progress(StageType::Upload, SubPhase::Intra), 0.0);
    }

    #[test]
    fn test_success_is_monotonic() {
        let report = Report::new();
        assert!(report.is_successful());

        report.new_report(StageType::GetSources).set_failed("fetch failed");
        assert!(!report.is_successful());

        let passing = report.new_report(StageType::Upload);
        passing.add_log("uploaded");
        assert!(!report.is_successful());
    }

    #[test]
    fn test_fail_reasons_in_stage_order() {
        let report = Report::new();
        report.new_report(StageType::Upload).set_failed("upload");
        report.new_report(StageType::GetSources).set_failed("fetch");
        report.new_report(StageType::GetSources);

        assert_eq!(
            report.fail_reasons(),
            vec![
                (StageType::GetSources, "fetch".to_string()),
                (StageType::Upload, "upload".to_string()),
            ]
        );
        assert!(report.stage_failed(StageType::Upload));
        assert!(!report.stage_failed(StageType::Cleanup));
    }

    #[test]
    fn test_count_and_get_step_logs() {
        let report = Report::new();
        let result = report.new_report(StageType::CacheSources);
        result.add_log("copied");
        result.add_warning("large file");
        report.set_sub_phase(SubPhase::Post);
        report.new_report(StageType::CacheSources).add_log("1 artifact cached");

        assert_eq!(report.count_step_logs(StageType::CacheSources), 3);
        assert_eq!(report.step_logs(StageType::CacheSources, SubPhase::Intra).len(), 2);
        assert_eq!(report.step_logs(StageType::CacheSources, SubPhase::Post).len(), 1);
        assert_eq!(report.count_step_logs(StageType::Upload), 0);
    }

    #[test]
    fn test_start_only_once() {
        let report = Report::new();
        report.start();
        let first = report.started_at();
        report.start();
        assert_eq!(report.started_at(), first);
        assert!(report.ended_at().is_none());
        report.finish();
        assert!(report.ended_at().is_some());
    }
}
