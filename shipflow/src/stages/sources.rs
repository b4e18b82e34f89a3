//! Stages that acquire, cache and transform source content.

use super::work::{mirror_progress, settle};
use super::Stage;
use crate::cancellation::CancellationToken;
use crate::config::ConfigurationAggregate;
use crate::core::StageType;
use crate::providers::Source;
use crate::report::{Report, StepResult};
use crate::task::Task;
use crate::utils::{copy_artifact, sha256_hex};
use anyhow::Context as _;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

type SourceWork<'a> = (&'a ConfigurationAggregate, &'a Arc<dyn Source>);

fn source_work(task: &Task) -> Vec<SourceWork<'_>> {
    task.enabled_configs()
        .flat_map(|config| config.active_sources().map(move |source| (config, source)))
        .collect()
}

/// Lets every enabled source set up before fetching.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrepareSourcesStage;

#[async_trait]
impl Stage for PrepareSourcesStage {
    fn stage_type(&self) -> StageType {
        StageType::PrepareSources
    }

    async fn run(
        &self,
        task: &Task,
        report: &Report,
        _token: &CancellationToken,
    ) -> anyhow::Result<bool> {
        let work = source_work(task);
        let results = report.new_reports(self.stage_type(), work.len());

        let outcomes = join_all(work.iter().zip(&results).map(|((config, source), result)| async move {
            debug!(config = %config.name, source = source.type_tag(), "Preparing source");
            let ok = source.prepare(config.context(), result).await;
            result.set_progress(1.0);
            settle(result, ok, || format!("Preparing {} failed", source.type_tag()))
        }))
        .await;

        Ok(outcomes.into_iter().all(|ok| ok))
    }
}

/// Fetches every enabled source concurrently.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetSourcesStage;

#[async_trait]
impl Stage for GetSourcesStage {
    fn stage_type(&self) -> StageType {
        StageType::GetSources
    }

    async fn run(
        &self,
        task: &Task,
        report: &Report,
        _token: &CancellationToken,
    ) -> anyhow::Result<bool> {
        let work = source_work(task);
        let results = report.new_reports(self.stage_type(), work.len());
        let interval = task.settings().poll_interval();

        let outcomes = join_all(work.iter().zip(&results).map(|((config, source), result)| async move {
            debug!(config = %config.name, source = source.type_tag(), "Fetching source");
            let fetched = mirror_progress(
                source.fetch(config.context(), result),
                result,
                || source.fetch_progress(),
                interval,
            )
            .await;
            if fetched {
                result.set_progress(1.0);
            }
            if fetched && source.local_path().is_none() {
                result.set_failed(format!("{} fetched nothing", source.type_tag()));
            }
            settle(result, fetched, || format!("Fetching {} failed", source.type_tag()))
        }))
        .await;

        Ok(outcomes.into_iter().all(|ok| ok))
    }

    async fn post_run_result(&self, task: &Task, report: &Report) -> anyhow::Result<bool> {
        let work = source_work(task);
        let fetched = work
            .iter()
            .filter(|(_, source)| source.local_path().is_some())
            .count();
        let summary = report.new_report(self.stage_type());
        summary.add_log(format!("Fetched {fetched}/{} sources", work.len()));
        summary.set_progress(1.0);
        info!(fetched, total = work.len(), "Sources fetched");
        Ok(true)
    }
}

/// Copies fetched content into the run cache and records a digest.
///
/// Artifacts, single files or whole folders, land in
/// `<cache_root>/<task id>/<config id>/` under a name unique within the
/// configuration. The cached paths are recorded on the configuration in
/// source order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheSourcesStage;

async fn cache_artifact(from: &Path, target: &Path) -> anyhow::Result<String> {
    let copied = copy_artifact(from, target)
        .await
        .with_context(|| format!("Cannot copy {} to {}", from.display(), target.display()))?;
    let digest = sha256_hex(target)
        .await
        .with_context(|| format!("Cannot hash {}", target.display()))?;
    Ok(if copied.files == 1 {
        format!("{} bytes, sha256 {digest}", copied.bytes)
    } else {
        format!("{} files, {} bytes, sha256 {digest}", copied.files, copied.bytes)
    })
}

/// Picks a cache name not yet in `taken` and claims it.
///
/// A clash is resolved by prefixing the source index, counting upwards
/// until the name is free.
fn claim_name(taken: &mut HashSet<String>, name: String, index: usize) -> String {
    let mut candidate = name.clone();
    let mut prefix = index;
    while taken.contains(&candidate) {
        candidate = format!("{prefix}-{name}");
        prefix += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

async fn cache_config(task: &Task, config: &ConfigurationAggregate, results: &[Arc<StepResult>]) -> bool {
    config.clear_cached();
    let dir = task.cache_dir(config);
    let mut names = HashSet::new();
    let mut ok = true;

    for (index, (source, result)) in config.active_sources().zip(results).enumerate() {
        let Some(path) = source.local_path() else {
            result.set_failed(format!("{} has nothing to cache", source.type_tag()));
            ok = false;
            continue;
        };
        let original = path
            .file_name()
            .map_or_else(|| format!("source-{index}"), |n| n.to_string_lossy().into_owned());
        let name = claim_name(&mut names, original.clone(), index);
        if name != original {
            warn!(config = %config.name, %original, %name, "Renamed duplicate artifact");
        }

        let target = dir.join(&name);
        match cache_artifact(&path, &target).await {
            Ok(summary) => {
                result.add_log(format!("Cached {name} ({summary})"));
                config.record_cached(target);
            }
            Err(e) => {
                result.set_failed(format!("{e:#}"));
                ok = false;
            }
        }
        result.set_progress(1.0);
    }
    ok
}

#[async_trait]
impl Stage for CacheSourcesStage {
    fn stage_type(&self) -> StageType {
        StageType::CacheSources
    }

    async fn run(
        &self,
        task: &Task,
        report: &Report,
        _token: &CancellationToken,
    ) -> anyhow::Result<bool> {
        let configs: Vec<_> = task.enabled_configs().collect();
        let per_config: Vec<_> = configs
            .iter()
            .map(|config| report.new_reports(self.stage_type(), config.active_sources().count()))
            .collect();

        let outcomes = join_all(
            configs
                .iter()
                .zip(&per_config)
                .map(|(config, results)| cache_config(task, config, results)),
        )
        .await;

        Ok(outcomes.into_iter().all(|ok| ok))
    }
}

/// Runs each configuration's modifiers over its cached artifacts.
///
/// Configurations are processed concurrently; within one configuration the
/// modifiers run strictly in list order and the first failure stops it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModifySourcesStage;

#[allow(clippy::cast_precision_loss)]
async fn modify_config(config: &ConfigurationAggregate, result: &StepResult) -> bool {
    let paths: Vec<PathBuf> = config.cached_paths();
    let modifiers: Vec<_> = config.active_modifiers().collect();
    let total = (paths.len() * modifiers.len()).max(1) as f64;
    let mut done = 0usize;

    for modifier in modifiers {
        for path in &paths {
            debug!(config = %config.name, modifier = modifier.type_tag(), path = %path.display(), "Applying modifier");
            let ok = modifier.apply(path, config.context(), result).await;
            if !settle(result, ok, || {
                format!("{} failed on {}", modifier.type_tag(), path.display())
            }) {
                return false;
            }
            done += 1;
            result.set_progress(done as f64 / total);
        }
    }
    result.set_progress(1.0);
    true
}

#[async_trait]
impl Stage for ModifySourcesStage {
    fn stage_type(&self) -> StageType {
        StageType::ModifySources
    }

    async fn run(
        &self,
        task: &Task,
        report: &Report,
        _token: &CancellationToken,
    ) -> anyhow::Result<bool> {
        let configs: Vec<_> = task
            .enabled_configs()
            .filter(|config| config.active_modifiers().next().is_some())
            .collect();
        let results = report.new_reports(self.stage_type(), configs.len());

        let outcomes = join_all(
            configs
                .iter()
                .zip(&results)
                .map(|(config, result)| modify_config(config, result)),
        )
        .await;

        Ok(outcomes.into_iter().all(|ok| ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_claim_name_keeps_unique_names() {
        let mut taken = HashSet::new();
        assert_eq!(claim_name(&mut taken, "x.zip".to_string(), 0), "x.zip");
        assert_eq!(claim_name(&mut taken, "x.zip".to_string(), 1), "1-x.zip");
        assert_eq!(claim_name(&mut taken, "1-x.zip".to_string(), 2), "2-1-x.zip");
        assert_eq!(claim_name(&mut taken, "x.zip".to_string(), 1), "2-x.zip");
        assert_eq!(taken.len(), 4);
    }
}
