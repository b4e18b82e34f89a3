//! Text rendering and at-rest persistence of reports.

use super::Report;
use crate::core::{StageType, SubPhase};
use crate::errors::Result;
use crate::utils::format_iso8601;
use std::fmt::Write as _;
use std::path::Path;
use tokio::io::AsyncWriteExt;

const EMPTY_PLACEHOLDER: &str = "(no entries)";

impl Report {
    /// Renders the whole report as plain text.
    ///
    /// One section per stage in declared order. Sections whose results have
    /// no log lines and no failures print a placeholder unless
    /// `ignore_empty` is set, in which case they are omitted.
    #[must_use]
    pub fn render(&self, ignore_empty: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Report {}", self.id());
        if let Some(started) = self.started_at() {
            let _ = writeln!(out, "Started: {}", format_iso8601(&started));
        }
        if let Some(ended) = self.ended_at() {
            let _ = writeln!(out, "Ended: {}", format_iso8601(&ended));
        }
        let outcome = if self.is_successful() { "Succeeded" } else { "Failed" };
        let _ = writeln!(out, "Result: {outcome}");

        for stage in StageType::ALL {
            let section = self.render_stage(stage);
            if section.is_empty() && ignore_empty {
                continue;
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "== {} ==", stage.title());
            if section.is_empty() {
                let _ = writeln!(out, "{EMPTY_PLACEHOLDER}");
            } else {
                out.push_str(&section);
            }
        }
        out
    }

    fn render_stage(&self, stage: StageType) -> String {
        let mut out = String::new();
        for phase in SubPhase::ALL {
            let mut body = String::new();
            for result in self.step_results(stage, phase) {
                for line in result.logs() {
                    let _ = writeln!(body, "  {line}");
                }
                if let Some(reason) = result.fail_reason() {
                    let _ = writeln!(body, "  FAILED: {reason}");
                }
            }
            if !body.is_empty() {
                let _ = writeln!(out, "-- {phase} --");
                out.push_str(&body);
            }
        }
        out
    }

    /// Appends the rendered report to `path`, creating parent directories.
    pub async fn persist(&self, path: impl AsRef<Path>, ignore_empty: bool) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        let mut text = self.render(ignore_empty);
        text.push('\n');
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
