//! Stage identity and sub-phase enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed, ordered enumeration of pipeline stages.
///
/// Declaration order is execution order and is also the order in which a
/// [`Report`](crate::report::Report) is iterated and rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    /// Pre-flight checks, run outside the stage list.
    Validation,
    /// Sources get a chance to set up before fetching.
    PrepareSources,
    /// Sources fetch their content.
    GetSources,
    /// Fetched content is copied into the run cache.
    CacheSources,
    /// Modifiers transform cached content in place.
    ModifySources,
    /// Destinations set up their publish targets.
    PrepareDestinations,
    /// Pre-publish actions.
    PreActions,
    /// Cached content is published to every destination.
    Upload,
    /// Post-publish actions.
    PostActions,
    /// Local and temporary state is released.
    Cleanup,
}

impl StageType {
    /// Every stage type in declared order.
    pub const ALL: [Self; 10] = [
        Self::Validation,
        Self::PrepareSources,
        Self::GetSources,
        Self::CacheSources,
        Self::ModifySources,
        Self::PrepareDestinations,
        Self::PreActions,
        Self::Upload,
        Self::PostActions,
        Self::Cleanup,
    ];

    /// Returns a human readable title.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Validation => "Validation",
            Self::PrepareSources => "Prepare Sources",
            Self::GetSources => "Get Sources",
            Self::CacheSources => "Cache Sources",
            Self::ModifySources => "Modify Sources",
            Self::PrepareDestinations => "Prepare Destinations",
            Self::PreActions => "Pre Actions",
            Self::Upload => "Upload",
            Self::PostActions => "Post Actions",
            Self::Cleanup => "Cleanup",
        }
    }
}

impl Default for StageType {
    fn default() -> Self {
        Self::Validation
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::PrepareSources => write!(f, "prepare_sources"),
            Self::GetSources => write!(f, "get_sources"),
            Self::CacheSources => write!(f, "cache_sources"),
            Self::ModifySources => write!(f, "modify_sources"),
            Self::PrepareDestinations => write!(f, "prepare_destinations"),
            Self::PreActions => write!(f, "pre_actions"),
            Self::Upload => write!(f, "upload"),
            Self::PostActions => write!(f, "post_actions"),
            Self::Cleanup => write!(f, "cleanup"),
        }
    }
}

/// Which pass of a stage a report entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubPhase {
    /// The stage's primary execution.
    Intra,
    /// Result summarization after the primary execution.
    Post,
}

impl SubPhase {
    /// Both sub-phases in report order.
    pub const ALL: [Self; 2] = [Self::Intra, Self::Post];
}

impl Default for SubPhase {
    fn default() -> Self {
        Self::Intra
    }
}

impl fmt::Display for SubPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intra => write!(f, "intra"),
            Self::Post => write!(f, "post"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_type_order_matches_declaration() {
        let mut sorted = StageType::ALL;
        sorted.sort();
        assert_eq!(sorted, StageType::ALL);
        assert!(StageType::Validation < StageType::Cleanup);
        assert!(StageType::Upload < StageType::PostActions);
    }

    #[test]
    fn test_stage_type_display() {
        assert_eq!(StageType::GetSources.to_string(), "get_sources");
        assert_eq!(StageType::Cleanup.to_string(), "cleanup");
        assert_eq!(StageType::PrepareDestinations.title(), "Prepare Destinations");
    }

    #[test]
    fn test_stage_type_serialize() {
        let json = serde_json::to_string(&StageType::PostActions).unwrap();
        assert_eq!(json, r#""post_actions""#);

        let back: StageType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StageType::PostActions);
    }

    #[test]
    fn test_sub_phase_order() {
        assert!(SubPhase::Intra < SubPhase::Post);
        assert_eq!(SubPhase::default(), SubPhase::Intra);
    }
}
