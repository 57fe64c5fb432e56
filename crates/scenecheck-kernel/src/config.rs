//! Engine configuration.
//!
//! Read from `scenecheck.toml`:
//!
//! ```toml
//! slice_budget_ms = 10
//! rich_text = true
//! scene_extension = ".unity"
//! exclude_label = "ExcludeValidation"
//!
//! [rules]
//! null_reference = true
//! ignored_type_patterns = ['^(UnityEngine|TMPro|Cinemachine)\.']
//! prefab_usage = true
//! scene_folder_root = "Assets/Scenes"
//! ```
//!
//! Discovery order: explicit path, `./scenecheck.toml`, then
//! `$XDG_CONFIG_HOME/scenecheck/config.toml`. Missing files fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "scenecheck.toml";

/// Label of the empty collection produced by a cancelled run.
pub const DEFAULT_ABORTED_LABEL: &str = "Validation was aborted due to entering play mode";

/// Scene documents carrying this label are left out of scene tests.
pub const DEFAULT_EXCLUDE_LABEL: &str = "ExcludeValidation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Wall-clock work per slice before the time-sliced driver yields.
    pub slice_budget_ms: u64,
    /// Keep `<b>`/`<color>` markup in issue text for asynchronous runs.
    pub rich_text: bool,
    /// Extension of scene files; these are never expanded as dependencies.
    pub scene_extension: String,
    pub aborted_label: String,
    /// Scene tests skip documents labeled with this.
    pub exclude_label: String,
    pub rules: RulesConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slice_budget_ms: 10,
            rich_text: true,
            scene_extension: ".unity".to_string(),
            aborted_label: DEFAULT_ABORTED_LABEL.to_string(),
            exclude_label: DEFAULT_EXCLUDE_LABEL.to_string(),
            rules: RulesConfig::default(),
        }
    }
}

/// Settings for the builtin rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    pub null_reference: bool,
    /// Declaring types matching any of these are not null-checked.
    pub ignored_type_patterns: Vec<String>,
    pub prefab_usage: bool,
    /// Enables the scene-folder rule for assets under this folder.
    pub scene_folder_root: Option<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            null_reference: true,
            ignored_type_patterns: vec![r"^(UnityEngine|TMPro|Cinemachine)\.".to_string()],
            prefab_usage: true,
            scene_folder_root: None,
        }
    }
}

impl RulesConfig {
    pub fn ignored_types(&self) -> Result<RegexSet, ValidationError> {
        RegexSet::new(&self.ignored_type_patterns).map_err(|e| ValidationError::Config {
            reason: format!("ignored_type_patterns: {e}"),
        })
    }
}

impl EngineConfig {
    /// Defaults with plain-text messages, for tests and batch runs.
    pub fn plain() -> Self {
        Self {
            rich_text: false,
            ..Self::default()
        }
    }

    pub fn with_slice_budget(mut self, budget: Duration) -> Self {
        self.slice_budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_rich_text(mut self, rich_text: bool) -> Self {
        self.rich_text = rich_text;
        self
    }

    pub fn slice_budget(&self) -> Duration {
        Duration::from_millis(self.slice_budget_ms)
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text).context("parsing engine config")?;
        config.rules.ignored_types()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Load from `explicit`, or the first config file found, or defaults.
    pub fn discover(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        for candidate in candidate_paths() {
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "loading config");
                return Self::load(&candidate);
            }
        }
        Ok(Self::default())
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
    #[cfg(feature = "native")]
    paths.push(crate::paths::config_file());
    paths
}
