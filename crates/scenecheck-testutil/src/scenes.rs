//! Scene validation as a test: every provided scene must validate without errors.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use scenecheck_kernel::{Engine, EngineConfig, MemoryScene, RunTarget, SceneDocument};
use scenecheck_types::Severity;

use crate::{TestResult, TestSummary};

/// Supplies the scene documents to test.
pub trait SceneProvider {
    fn scene_paths(&self) -> Result<Vec<PathBuf>>;
}

impl SceneProvider for Vec<PathBuf> {
    fn scene_paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self.clone())
    }
}

/// Every `*.json` document directly inside a directory, sorted by name.
///
/// Documents labeled with the exclude label are left out. A document that
/// cannot be read or parsed is still listed so the runner reports it.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
    exclude_label: Option<String>,
}

impl DirectoryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude_label: None,
        }
    }

    /// Skip documents carrying `label`.
    pub fn excluding_label(mut self, label: impl Into<String>) -> Self {
        self.exclude_label = Some(label.into());
        self
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let Some(label) = &self.exclude_label else {
            return false;
        };
        let excluded = std::fs::read_to_string(path)
            .ok()
            .and_then(|text| SceneDocument::from_json(&text).ok())
            .is_some_and(|document| document.has_label(label));
        if excluded {
            tracing::debug!(path = %path.display(), label = %label, "scene excluded from tests");
        }
        excluded
    }
}

impl SceneProvider for DirectoryProvider {
    fn scene_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.root).with_context(|| format!("listing {}", self.root.display()))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") && !self.is_excluded(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// Short display name for a document: `folder/stem`.
pub fn case_name(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("?");
    match path.parent().and_then(|p| p.file_name()).and_then(|s| s.to_str()) {
        Some(folder) => format!("{folder}/{stem}"),
        None => stem.to_string(),
    }
}

/// Validates scene documents synchronously, one engine per document.
#[derive(Debug, Clone, Default)]
pub struct SceneTestRunner {
    config: EngineConfig,
}

impl SceneTestRunner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Validate one already-parsed document.
    pub fn run_document(&self, name: &str, document: &SceneDocument) -> TestResult {
        if document.scenes.is_empty() && document.prefab_stage.is_none() {
            return TestResult::Skip {
                reason: "document opens no scene".to_string(),
            };
        }
        let host = match MemoryScene::from_document(document) {
            Ok(host) => Arc::new(host),
            Err(e) => return TestResult::Error { message: e.to_string() },
        };
        let target = RunTarget::current(host.as_ref());
        let engine = match Engine::new(self.config.clone(), host) {
            Ok(engine) => engine,
            Err(e) => return TestResult::Error { message: e.to_string() },
        };
        let collection = match engine.run_synchronously(target) {
            Ok(collection) => collection,
            Err(e) => return TestResult::Error { message: e.to_string() },
        };

        let errors: Vec<_> = collection
            .issues()
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .collect();
        if errors.is_empty() {
            tracing::debug!(scene = name, warnings = collection.warnings(), "scene passed");
            return TestResult::Pass;
        }

        let mut report = String::new();
        let _ = writeln!(report, "{} check(s) have failed:", errors.len());
        for issue in &errors {
            let _ = writeln!(report, "{} ({})", issue.source.file_name(), issue.info_text());
        }
        let _ = writeln!(report, "\nOpen {name} and run validation to debug objects.");
        TestResult::Fail {
            errors: errors.len(),
            report,
        }
    }

    /// Load and validate the document at `path`.
    pub fn run_file(&self, path: &Path) -> TestResult {
        let name = case_name(path);
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                return TestResult::Error {
                    message: format!("reading {}: {e}", path.display()),
                };
            }
        };
        match SceneDocument::from_json(&text) {
            Ok(document) => self.run_document(&name, &document),
            Err(e) => TestResult::Error { message: e.to_string() },
        }
    }

    /// Validate every distinct document the provider lists.
    pub fn run_all(&self, provider: &dyn SceneProvider) -> Result<TestSummary> {
        let mut summary = TestSummary::new();
        let mut seen = HashSet::new();
        for path in provider.scene_paths()? {
            if path.as_os_str().is_empty() || !seen.insert(path.clone()) {
                continue;
            }
            let result = self.run_file(&path);
            summary.record(case_name(&path), result);
        }
        Ok(summary)
    }
}
