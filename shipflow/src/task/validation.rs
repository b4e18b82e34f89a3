//! Pre-flight validation run before any stage.

use super::Task;
use crate::config::ActionEntry;
use crate::core::StageType;
use crate::providers::ValidationIssues;
use crate::report::{Report, StepResult};
use tracing::{debug, warn};

/// Writes `issues` into `result`; errors fail it with a joined reason.
fn record(result: &StepResult, issues: &ValidationIssues) -> bool {
    for warning in &issues.warnings {
        result.add_warning(warning.clone());
    }
    for error in &issues.errors {
        result.add_error(error.clone());
    }
    if !issues.is_ok() {
        result.set_failed(issues.errors.join("; "));
    }
    result.set_progress(1.0);
    issues.is_ok()
}

fn validate_actions(kind: &str, entries: &[ActionEntry], report: &Report) -> bool {
    let mut ok = true;
    for (index, action) in entries.iter().enumerate() {
        let result = report.new_report(StageType::Validation);
        let prefix = format!("{kind} #{} ({})", index + 1, action.entry.label());
        let mut issues = ValidationIssues::new();

        if action.entry.enabled {
            match action.entry.provider() {
                Some(provider) => issues.merge(&prefix, provider.validate()),
                None => issues.errors.push(format!("{prefix}: no provider selected")),
            }
        } else {
            result.add_log(format!("{prefix}: disabled"));
        }
        ok &= record(&result, &issues);
    }
    ok
}

/// Validates every action entry and every enabled configuration.
///
/// Each entry and each enabled configuration gets its own result under
/// [`StageType::Validation`]. Returns false if any error was found.
pub(crate) fn validate(task: &Task, report: &Report) -> bool {
    debug!(task = %task.name(), "Validating");
    let mut ok = validate_actions("Pre-action", task.pre_actions(), report);
    ok &= validate_actions("Post-action", task.post_actions(), report);

    if task.enabled_configs().next().is_none() {
        let result = report.new_report(StageType::Validation);
        ok &= record(
            &result,
            &ValidationIssues::new().with_error("No enabled configurations"),
        );
    }

    for config in task.enabled_configs() {
        let result = report.new_report(StageType::Validation);
        result.add_log(format!("Checking configuration '{}'", config.name));
        ok &= record(&result, &config.validate());
    }

    if !ok {
        warn!(task = %task.name(), reasons = ?report.fail_reasons(), "Validation failed");
    }
    ok
}
