//! The result of one validation run.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;

use scenecheck_types::{ObjectId, Severity, SourceInfo};

use super::issue::{Issue, IssueId};
use crate::error::ValidationError;
use crate::host::{ObjectGraph, SceneHost};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Aborted,
}

/// Issues from one run plus a label describing what was inspected.
///
/// Replaced wholesale by the next run; nothing is merged across runs.
#[derive(Debug, Serialize)]
pub struct IssueCollection {
    label: String,
    status: RunStatus,
    issues: Vec<Issue>,
}

impl IssueCollection {
    /// Build a completed collection, resolving prefab parents against `graph`.
    pub fn new<G: ObjectGraph + ?Sized>(issues: Vec<Issue>, label: impl Into<String>, graph: &G) -> Self {
        let mut collection = Self {
            label: label.into(),
            status: RunStatus::Completed,
            issues,
        };
        collection.resolve_parents(graph);
        collection
    }

    /// A completed run with nothing to report.
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            status: RunStatus::Completed,
            issues: Vec::new(),
        }
    }

    /// A cancelled run. Never carries partial results.
    pub fn aborted(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            status: RunStatus::Aborted,
            issues: Vec::new(),
        }
    }

    /// Link every issue to the issue raised at the same call site against
    /// its target's correspondence source.
    ///
    /// A single pass over the batch; links from an earlier call are cleared
    /// first, so calling this again yields the same result.
    pub fn resolve_parents<G: ObjectGraph + ?Sized>(&mut self, graph: &G) {
        for issue in &mut self.issues {
            issue.clear_links();
        }

        let mut first: HashMap<(ObjectId, &SourceInfo), IssueId> = HashMap::new();
        for (index, issue) in self.issues.iter().enumerate() {
            if let Some(target) = issue.scope.target {
                first.entry((target, &issue.source)).or_insert(IssueId(index));
            }
        }

        let mut links = Vec::new();
        for (index, issue) in self.issues.iter().enumerate() {
            let Some(source) = issue.scope.target.and_then(|t| graph.correspondence_source(t)) else {
                continue;
            };
            if let Some(&parent) = first.get(&(source, &issue.source)) {
                if parent.0 != index {
                    links.push((IssueId(index), parent));
                }
            }
        }

        for (child, parent) in links {
            self.issues[child.0].set_parent(parent);
            self.issues[parent.0].push_child(child);
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_aborted(&self) -> bool {
        self.status == RunStatus::Aborted
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn get(&self, id: IssueId) -> Option<&Issue> {
        self.issues.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues with no parent, in run order.
    pub fn roots(&self) -> impl Iterator<Item = IssueId> + '_ {
        self.issues
            .iter()
            .enumerate()
            .filter(|(_, issue)| issue.parent().is_none())
            .map(|(index, _)| IssueId(index))
    }

    pub fn children(&self, id: IssueId) -> &[IssueId] {
        self.get(id).map(Issue::children).unwrap_or(&[])
    }

    /// The issue plus everything linked beneath it.
    pub fn instance_count(&self, id: IssueId) -> usize {
        let mut count = 0;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            count += 1;
            stack.extend_from_slice(self.children(next));
        }
        count
    }

    pub fn errors(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Apply the auto-fix of one issue.
    pub fn apply_auto_fix<H: SceneHost + ?Sized>(&mut self, id: IssueId, host: &H) -> Result<(), ValidationError> {
        match self.issues.get_mut(id.0) {
            Some(issue) => issue.apply_auto_fix(host),
            None => Ok(()),
        }
    }

    /// Plain-text report: root issues with instance counts, children indented.
    pub fn render_plain<G: ObjectGraph + ?Sized>(&self, graph: &G) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.label);
        if self.is_aborted() {
            return out;
        }
        if self.issues.is_empty() {
            out.push_str("No issues found.\n");
            return out;
        }
        for root in self.roots() {
            self.render_issue(&mut out, graph, root, 0);
        }
        let _ = writeln!(out, "{} error(s), {} warning(s)", self.errors(), self.warnings());
        out
    }

    fn render_issue<G: ObjectGraph + ?Sized>(&self, out: &mut String, graph: &G, id: IssueId, depth: usize) {
        let Some(issue) = self.get(id) else {
            return;
        };
        let indent = "    ".repeat(depth);
        let target = issue
            .scope
            .target
            .and_then(|t| graph.object(t))
            .map(|info| info.name)
            .unwrap_or_else(|| "<scene>".to_string());
        let count = self.instance_count(id);
        let _ = write!(out, "{indent}[{}] {target}: {}", issue.severity, issue.info_text());
        if depth == 0 && count > 1 {
            let _ = write!(out, " (x{count})");
        }
        if issue.is_dependency() {
            out.push_str(" [dependency]");
        }
        out.push('\n');
        for &child in issue.children() {
            self.render_issue(out, graph, child, depth + 1);
        }
    }
}
