//! Stages that prepare destinations and publish to them.

use super::work::{mirror_progress, settle};
use super::Stage;
use crate::cancellation::CancellationToken;
use crate::config::ConfigurationAggregate;
use crate::core::StageType;
use crate::providers::Destination;
use crate::report::{Report, StepResult};
use crate::task::Task;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

type DestinationWork<'a> = (&'a ConfigurationAggregate, &'a Arc<dyn Destination>);

fn destination_work(task: &Task) -> Vec<DestinationWork<'_>> {
    task.enabled_configs()
        .flat_map(|config| config.active_destinations().map(move |dest| (config, dest)))
        .collect()
}

/// Lets every enabled destination prepare its target.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrepareDestinationsStage;

#[async_trait]
impl Stage for PrepareDestinationsStage {
    fn stage_type(&self) -> StageType {
        StageType::PrepareDestinations
    }

    async fn run(
        &self,
        task: &Task,
        report: &Report,
        _token: &CancellationToken,
    ) -> anyhow::Result<bool> {
        let work = destination_work(task);
        let results = report.new_reports(self.stage_type(), work.len());

        let outcomes = join_all(work.iter().zip(&results).map(|((config, dest), result)| async move {
            debug!(config = %config.name, destination = dest.type_tag(), "Preparing destination");
            let ok = dest.prepare(config.context(), result).await;
            result.set_progress(1.0);
            settle(result, ok, || format!("Preparing {} failed", dest.type_tag()))
        }))
        .await;

        Ok(outcomes.into_iter().all(|ok| ok))
    }
}

/// Publishes every cached artifact to every enabled destination.
///
/// Destinations run concurrently; each destination receives its
/// configuration's artifacts one after another.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadStage;

#[allow(clippy::cast_precision_loss)]
async fn publish_all(
    config: &ConfigurationAggregate,
    dest: &Arc<dyn Destination>,
    description: &str,
    result: &StepResult,
    interval: Duration,
) -> bool {
    let paths = config.cached_paths();
    if paths.is_empty() {
        warn!(config = %config.name, "Nothing to upload");
        result.add_warning("Nothing to upload");
        result.set_progress(1.0);
        return true;
    }

    let total = paths.len() as f64;
    for (done, path) in paths.iter().enumerate() {
        debug!(config = %config.name, destination = dest.type_tag(), path = %path.display(), "Publishing");
        let ok = mirror_progress(
            dest.publish(path, description, config.context(), result),
            result,
            || (done as f64 + dest.publish_progress()) / total,
            interval,
        )
        .await;
        if !settle(result, ok, || {
            format!("Publishing {} to {} failed", path.display(), dest.type_tag())
        }) {
            return false;
        }
        result.set_progress((done + 1) as f64 / total);
    }
    true
}

#[async_trait]
impl Stage for UploadStage {
    fn stage_type(&self) -> StageType {
        StageType::Upload
    }

    async fn run(
        &self,
        task: &Task,
        report: &Report,
        _token: &CancellationToken,
    ) -> anyhow::Result<bool> {
        let work = destination_work(task);
        let results = report.new_reports(self.stage_type(), work.len());
        let template = &task.settings().upload_description;
        let interval = task.settings().poll_interval();

        let outcomes = join_all(work.iter().zip(&results).map(|((config, dest), result)| async move {
            let description = config.context().expand(template);
            publish_all(config, dest, &description, result, interval).await
        }))
        .await;

        Ok(outcomes.into_iter().all(|ok| ok))
    }
}
