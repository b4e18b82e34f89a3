//! The terminal cleanup stage.

use super::Stage;
use crate::cancellation::CancellationToken;
use crate::config::ConfigurationAggregate;
use crate::core::StageType;
use crate::report::{Report, StepResult};
use crate::task::Task;
use async_trait::async_trait;
use futures::future::join_all;
use std::io::ErrorKind;
use tracing::{debug, warn};

/// Releases provider state and the run cache.
///
/// Never gated. Every enabled configuration is cleaned whether or not the
/// earlier stages reached it. Problems removing the cache are warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupStage;

async fn clean_config(task: &Task, config: &ConfigurationAggregate, result: &StepResult) {
    for source in config.active_sources() {
        debug!(config = %config.name, source = source.type_tag(), "Cleaning up source");
        source.clean_up().await;
    }
    for dest in config.active_destinations() {
        debug!(config = %config.name, destination = dest.type_tag(), "Cleaning up destination");
        dest.clean_up().await;
    }

    let dir = task.cache_dir(config);
    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => result.add_log(format!("Removed {}", dir.display())),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot remove cache");
            result.add_warning(format!("Cannot remove {}: {e}", dir.display()));
        }
    }
    config.clear_cached();
    result.set_progress(1.0);
}

#[async_trait]
impl Stage for CleanupStage {
    fn stage_type(&self) -> StageType {
        StageType::Cleanup
    }

    fn requires_everything_before_to_succeed(&self) -> bool {
        false
    }

    async fn run(
        &self,
        task: &Task,
        report: &Report,
        _token: &CancellationToken,
    ) -> anyhow::Result<bool> {
        let configs: Vec<_> = task.enabled_configs().collect();
        let results = report.new_reports(self.stage_type(), configs.len());

        join_all(
            configs
                .iter()
                .zip(&results)
                .map(|(config, result)| clean_config(task, config, result)),
        )
        .await;

        // The task folder is shared by every configuration; drop it once empty.
        let _ = tokio::fs::remove_dir(task.task_cache_dir()).await;
        Ok(true)
    }
}
