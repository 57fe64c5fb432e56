//! One validation run as a resumable step machine.
//!
//! Full-scene runs go scene rules, then every open scene's hierarchy, then the
//! dependency closure of the open scene paths. Prefab runs walk the staged
//! prefab's content, then its dependencies. Both are driven by the
//! [`scheduler`](crate::scheduler) drivers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use scenecheck_types::{ObjectId, PrefabStage, ScopeKind};

use super::collection::IssueCollection;
use super::context::{ContextOptions, ValidationContext};
use super::dependencies::DependencyWalk;
use super::hierarchy::HierarchyWalk;
use crate::error::ValidationError;
use crate::host::{ObjectGraph, SceneHost};
use crate::rules::{RuleEnv, RuleRegistry, dispatch};
use crate::scheduler::{Step, StepState};

static NEXT_RUN: AtomicU64 = AtomicU64::new(1);

/// What a run inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTarget {
    /// Every loaded scene.
    OpenScenes,
    /// The prefab open for isolated editing.
    Prefab(PrefabStage),
}

impl RunTarget {
    /// The staged prefab if there is one, otherwise the open scenes.
    pub fn current<G: ObjectGraph + ?Sized>(graph: &G) -> Self {
        match graph.prefab_stage() {
            Some(stage) => RunTarget::Prefab(stage),
            None => RunTarget::OpenScenes,
        }
    }

    /// Label for the collection this target produces.
    pub fn label<G: ObjectGraph + ?Sized>(&self, graph: &G) -> String {
        match self {
            RunTarget::OpenScenes => {
                let paths: Vec<String> = graph.containers().into_iter().map(|c| c.path).collect();
                format!("Scene(s) {}", paths.join("  "))
            }
            RunTarget::Prefab(stage) => format!("Prefab {}", stage.file_name()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub context: ContextOptions,
    /// Scene files are roots, never dependency edges.
    pub scene_extension: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            context: ContextOptions::default(),
            scene_extension: ".unity".to_string(),
        }
    }
}

impl RunOptions {
    pub fn new(context: ContextOptions, scene_extension: impl Into<String>) -> Self {
        Self {
            context,
            scene_extension: scene_extension.into(),
        }
    }
}

enum Phase {
    SceneRules,
    Hierarchy(HierarchyWalk),
    Dependencies(DependencyWalk),
    Done,
}

/// A single run in progress.
///
/// Holds its own issue list; nothing is visible to the host until
/// [`ValidationRun::finish`].
pub struct ValidationRun {
    id: u64,
    host: Arc<dyn SceneHost>,
    registry: Arc<RuleRegistry>,
    ctx: ValidationContext,
    phase: Phase,
    label: String,
    dependency_roots: Vec<String>,
    scene_extension: String,
    span: tracing::Span,
}

impl ValidationRun {
    /// Prepare a run. Fails with [`ValidationError::InvalidRunState`] while the
    /// host is simulating.
    pub fn new(
        host: Arc<dyn SceneHost>,
        registry: Arc<RuleRegistry>,
        target: RunTarget,
        options: RunOptions,
    ) -> Result<Self, ValidationError> {
        let mut ctx = ValidationContext::new(host.as_ref(), options.context)?;
        let id = NEXT_RUN.fetch_add(1, Ordering::Relaxed);
        let label = target.label(host.as_ref());
        let span = tracing::info_span!("validation_run", run = id, target = %label);

        let (phase, dependency_roots) = match &target {
            RunTarget::OpenScenes => {
                ctx.set_scope(ScopeKind::Scene, None, false);
                let paths = host.containers().into_iter().map(|c| c.path).collect();
                (Phase::SceneRules, paths)
            }
            RunTarget::Prefab(stage) => (
                Phase::Hierarchy(HierarchyWalk::new([stage.root], ScopeKind::Prefab, false)),
                vec![stage.asset_path.clone()],
            ),
        };
        span.in_scope(|| tracing::debug!(rules = registry.len(), "run prepared"));

        Ok(Self {
            id,
            host,
            registry,
            ctx,
            phase,
            label,
            dependency_roots,
            scene_extension: options.scene_extension,
            span,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    /// Issues recorded so far.
    pub fn issues_so_far(&self) -> usize {
        self.ctx.issues().len()
    }

    /// Collect the issues, resolving prefab parents.
    pub fn finish(self) -> IssueCollection {
        let collection = IssueCollection::new(self.ctx.into_issues(), self.label, self.host.as_ref());
        self.span.in_scope(|| {
            tracing::info!(
                issues = collection.len(),
                errors = collection.errors(),
                warnings = collection.warnings(),
                "validation finished"
            );
        });
        collection
    }

    fn scene_roots(&self) -> Vec<ObjectId> {
        self.host
            .containers()
            .iter()
            .flat_map(|c| self.host.root_nodes(&c.path))
            .collect()
    }
}

impl Step for ValidationRun {
    fn step(&mut self) -> StepState {
        let _entered = self.span.enter();
        let env = RuleEnv {
            host: self.host.as_ref(),
            registry: self.registry.as_ref(),
        };

        let next = match &mut self.phase {
            Phase::SceneRules => {
                dispatch::validate_scene(env, &mut self.ctx);
                let roots = self.scene_roots();
                tracing::debug!(roots = roots.len(), "scene rules done");
                Phase::Hierarchy(HierarchyWalk::new(roots, ScopeKind::SceneObject, false))
            }
            Phase::Hierarchy(walk) => {
                if walk.step(env, &mut self.ctx) == StepState::MoreWork {
                    return StepState::MoreWork;
                }
                tracing::debug!(nodes = walk.visited(), "hierarchy done");
                Phase::Dependencies(DependencyWalk::new(
                    std::mem::take(&mut self.dependency_roots),
                    &self.scene_extension,
                ))
            }
            Phase::Dependencies(walk) => {
                if walk.step(env, &mut self.ctx) == StepState::MoreWork {
                    return StepState::MoreWork;
                }
                tracing::debug!(dependencies = walk.dependencies().len(), "dependencies done");
                Phase::Done
            }
            Phase::Done => return StepState::Finished,
        };

        self.phase = next;
        if self.is_finished() {
            StepState::Finished
        } else {
            StepState::MoreWork
        }
    }
}

impl std::fmt::Debug for ValidationRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self.phase {
            Phase::SceneRules => "scene-rules",
            Phase::Hierarchy(_) => "hierarchy",
            Phase::Dependencies(_) => "dependencies",
            Phase::Done => "done",
        };
        f.debug_struct("ValidationRun")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("phase", &phase)
            .field("issues", &self.ctx.issues().len())
            .finish()
    }
}
