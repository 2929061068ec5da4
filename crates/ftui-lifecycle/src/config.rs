#![forbid(unsafe_code)]

//! Tuning knobs for a [`PartTree`](crate::PartTree).
//!
//! Defaults match production behavior: detachment prunes the registry and
//! ancestor chains are unbounded. Both knobs can be overridden from the
//! environment for debugging a misbehaving tree:
//!
//! - `FTUI_LIFECYCLE_PRUNE=0|false|off` keeps registry entries after
//!   detachment so they can be inspected.
//! - `FTUI_LIFECYCLE_DEPTH_LIMIT=<n>` caps how far registration climbs,
//!   turning an accidental parent cycle into an error instead of a hang.

use std::env;

const PRUNE_VAR: &str = "FTUI_LIFECYCLE_PRUNE";
const DEPTH_LIMIT_VAR: &str = "FTUI_LIFECYCLE_DEPTH_LIMIT";

/// Configuration for lifecycle bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Remove registry entries that go empty when content is detached.
    pub prune_on_detach: bool,
    /// Maximum number of ancestors a single registration may add links to.
    pub ancestor_depth_limit: Option<usize>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            prune_on_detach: true,
            ancestor_depth_limit: None,
        }
    }
}

impl LifecycleConfig {
    /// Defaults with any environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let prune = env::var(PRUNE_VAR).ok();
        let depth = env::var(DEPTH_LIMIT_VAR).ok();
        Self::from_vars(prune.as_deref(), depth.as_deref())
    }

    #[must_use]
    pub fn prune_on_detach(mut self, prune: bool) -> Self {
        self.prune_on_detach = prune;
        self
    }

    #[must_use]
    pub fn ancestor_depth_limit(mut self, limit: usize) -> Self {
        self.ancestor_depth_limit = Some(limit);
        self
    }

    fn from_vars(prune: Option<&str>, depth: Option<&str>) -> Self {
        let mut config = Self::default();
        if let Some(flag) = prune.and_then(parse_flag) {
            config.prune_on_detach = flag;
        }
        config.ancestor_depth_limit = depth
            .map(str::trim)
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|&limit| limit > 0);
        config
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
