//! A single recorded check failure.

use std::fmt;

use serde::Serialize;

use scenecheck_types::{ScopeKind, Severity, SourceInfo, ValidationScope};

use crate::error::ValidationError;
use crate::host::SceneHost;

/// Zero-argument remediation attached to an issue.
pub type AutoFix = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// Index of an issue within its collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct IssueId(pub usize);

/// One failed check.
///
/// Parent and children are indices into the owning collection, set only by
/// parent resolution.
#[derive(Serialize)]
pub struct Issue {
    pub scope: ValidationScope,
    pub source: SourceInfo,
    pub severity: Severity,
    info_text: String,
    #[serde(skip)]
    auto_fix: Option<AutoFix>,
    parent: Option<IssueId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    children: Option<Vec<IssueId>>,
}

impl Issue {
    pub fn new(
        scope: ValidationScope,
        source: SourceInfo,
        info_text: impl Into<String>,
        severity: Severity,
        auto_fix: Option<AutoFix>,
    ) -> Self {
        Self {
            scope,
            source,
            severity,
            info_text: info_text.into(),
            auto_fix,
            parent: None,
            children: None,
        }
    }

    pub fn info_text(&self) -> &str {
        &self.info_text
    }

    pub fn parent(&self) -> Option<IssueId> {
        self.parent
    }

    pub fn children(&self) -> &[IssueId] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn has_auto_fix(&self) -> bool {
        self.auto_fix.is_some()
    }

    pub fn is_dependency(&self) -> bool {
        self.scope.is_dependency
    }

    pub fn is_asset(&self) -> bool {
        self.scope.is_asset()
    }

    pub(crate) fn clear_links(&mut self) {
        self.parent = None;
        self.children = None;
    }

    pub(crate) fn set_parent(&mut self, parent: IssueId) {
        self.parent = Some(parent);
    }

    pub(crate) fn push_child(&mut self, child: IssueId) {
        self.children.get_or_insert_with(Vec::new).push(child);
    }

    /// Run the auto-fix, then mark the target dirty and save it.
    ///
    /// Does nothing if there is no fix. A fix on a prefab reached only as a
    /// dependency is refused before it runs.
    pub fn apply_auto_fix<H: SceneHost + ?Sized>(&mut self, host: &H) -> Result<(), ValidationError> {
        if self.auto_fix.is_none() {
            return Ok(());
        }
        if !self.scope.allows_auto_fix() {
            return Err(ValidationError::InvalidRemediation {
                target: self.target_label(host),
            });
        }
        let Some(fix) = self.auto_fix.take() else {
            return Ok(());
        };

        fix().map_err(|e| ValidationError::RuleExecution {
            rule: "auto-fix".to_string(),
            target: self.target_label(host),
            reason: format!("{e:#}"),
        })?;

        if let Some(target) = self.scope.target {
            host.mark_dirty(target);
            host.save_if_dirty(target);
        }
        if self.scope.kind == ScopeKind::Scene {
            host.mark_all_scenes_dirty();
        }
        tracing::debug!(source = %self.source, "auto-fix applied");
        self.info_text = "fixed".to_string();
        Ok(())
    }

    fn target_label<H: SceneHost + ?Sized>(&self, host: &H) -> String {
        self.scope
            .target
            .and_then(|id| host.object(id))
            .map(|info| info.to_string())
            .unwrap_or_else(|| "<no target>".to_string())
    }
}

impl fmt::Debug for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Issue")
            .field("scope", &self.scope)
            .field("source", &self.source)
            .field("severity", &self.severity)
            .field("info_text", &self.info_text)
            .field("auto_fix", &self.auto_fix.is_some())
            .field("parent", &self.parent)
            .field("children", &self.children())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::host::MemoryScene;

    fn counting_fix(counter: &Arc<AtomicUsize>) -> Option<AutoFix> {
        let counter = Arc::clone(counter);
        Some(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }

    #[test]
    fn fix_marks_dirty_and_saves() {
        let host = MemoryScene::new();
        let prefab = host.add_prefab("Assets/Door.prefab", "Door");
        let counter = Arc::new(AtomicUsize::new(0));
        let mut issue = Issue::new(
            ValidationScope::new(ScopeKind::Prefab, Some(prefab), false),
            SourceInfo::new("rules.rs", 10),
            "broken",
            Severity::Error,
            counting_fix(&counter),
        );

        issue.apply_auto_fix(&host).expect("fix applies");

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(issue.info_text(), "fixed");
        assert!(!issue.has_auto_fix());
        assert_eq!(host.saved(), vec![prefab]);
        assert!(!host.scenes_marked_dirty());

        // Applying again is a no-op.
        issue.apply_auto_fix(&host).expect("no fix left");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dependency_prefab_fix_is_refused_before_running() {
        let host = MemoryScene::new();
        let prefab = host.add_prefab("Assets/Door.prefab", "Door");
        let counter = Arc::new(AtomicUsize::new(0));
        let mut issue = Issue::new(
            ValidationScope::new(ScopeKind::Prefab, Some(prefab), true),
            SourceInfo::new("rules.rs", 10),
            "broken",
            Severity::Error,
            counting_fix(&counter),
        );

        let err = issue.apply_auto_fix(&host).expect_err("must refuse");
        assert!(matches!(err, ValidationError::InvalidRemediation { .. }));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(issue.has_auto_fix());
        assert!(host.saved().is_empty());
    }

    #[test]
    fn scene_fix_marks_scenes_dirty() {
        let host = MemoryScene::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut issue = Issue::new(
            ValidationScope::scene(),
            SourceInfo::new("rules.rs", 4),
            "scene check",
            Severity::Warning,
            counting_fix(&counter),
        );
        issue.apply_auto_fix(&host).expect("fix applies");
        assert!(host.scenes_marked_dirty());
    }

    #[test]
    fn failing_fix_reports_rule_error() {
        let host = MemoryScene::new();
        let mut issue = Issue::new(
            ValidationScope::scene(),
            SourceInfo::new("rules.rs", 4),
            "scene check",
            Severity::Error,
            Some(Box::new(|| -> anyhow::Result<()> { anyhow::bail!("disk full") })),
        );
        let err = issue.apply_auto_fix(&host).expect_err("fix fails");
        assert!(err.to_string().contains("disk full"));
        assert_eq!(issue.info_text(), "scene check");
    }
}
