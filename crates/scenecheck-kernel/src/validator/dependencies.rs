//! Transitive asset dependencies of the run's roots.

use std::collections::{HashSet, VecDeque};

use scenecheck_types::{ObjectClass, ScopeKind};

use super::context::ValidationContext;
use super::hierarchy::HierarchyWalk;
use crate::host::DependencyProvider;
use crate::rules::{RuleEnv, dispatch};
use crate::scheduler::StepState;

struct Frame {
    edges: Vec<String>,
    next: usize,
}

/// Depth-first collection of the dependency closure, one edge per step.
///
/// The visited set is shared across all roots, so an asset reached from two
/// roots is collected once. Scene paths are never expanded.
pub struct DependencyCollector {
    roots: Vec<String>,
    next_root: usize,
    frames: Vec<Frame>,
    order: Vec<String>,
    visited: HashSet<String>,
    scene_extension: String,
}

impl DependencyCollector {
    pub fn new(roots: Vec<String>, scene_extension: impl Into<String>) -> Self {
        Self {
            roots,
            next_root: 0,
            frames: Vec::new(),
            order: Vec::new(),
            visited: HashSet::new(),
            scene_extension: scene_extension.into(),
        }
    }

    pub fn step<P: DependencyProvider + ?Sized>(&mut self, provider: &P) -> StepState {
        let Some(frame) = self.frames.last_mut() else {
            let Some(root) = self.roots.get(self.next_root) else {
                return StepState::Finished;
            };
            self.next_root += 1;
            self.frames.push(Frame {
                edges: provider.direct_dependencies(root),
                next: 0,
            });
            return StepState::MoreWork;
        };

        let Some(edge) = frame.edges.get(frame.next).cloned() else {
            self.frames.pop();
            return self.progress();
        };
        frame.next += 1;
        if !edge.ends_with(&self.scene_extension) && self.visited.insert(edge.clone()) {
            self.frames.push(Frame {
                edges: provider.direct_dependencies(&edge),
                next: 0,
            });
            self.order.push(edge);
        }
        self.progress()
    }

    fn progress(&self) -> StepState {
        if self.frames.is_empty() && self.next_root >= self.roots.len() {
            StepState::Finished
        } else {
            StepState::MoreWork
        }
    }

    /// Dependencies in discovery order, roots excluded.
    pub fn finish(self) -> (Vec<String>, Vec<String>) {
        let roots = self.roots;
        let dependencies = self.order.into_iter().filter(|path| !roots.contains(path)).collect();
        (roots, dependencies)
    }
}

/// All transitive dependencies of `roots`, excluding the roots themselves.
pub fn collect_dependencies<P: DependencyProvider + ?Sized>(
    provider: &P,
    roots: &[String],
    scene_extension: &str,
) -> Vec<String> {
    let mut collector = DependencyCollector::new(roots.to_vec(), scene_extension);
    while collector.step(provider) == StepState::MoreWork {}
    collector.finish().1
}

enum Phase {
    Collect(DependencyCollector),
    Validate {
        pending: VecDeque<String>,
        current: Option<HierarchyWalk>,
    },
    Pairs {
        next_root: usize,
    },
    Done,
}

/// Collects the closure, validates every dependency asset, then offers every
/// (root, dependency) pair to the path rules.
///
/// Prefab dependencies get a full hierarchy walk scoped as dependency
/// prefabs; other assets go through object rules scoped as dependency
/// assets.
pub struct DependencyWalk {
    phase: Phase,
    roots: Vec<String>,
    dependencies: Vec<String>,
}

impl DependencyWalk {
    pub fn new(roots: Vec<String>, scene_extension: &str) -> Self {
        Self {
            phase: Phase::Collect(DependencyCollector::new(roots, scene_extension)),
            roots: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Collected dependencies; empty until collection has finished.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn step(&mut self, env: RuleEnv<'_>, ctx: &mut ValidationContext) -> StepState {
        match &mut self.phase {
            Phase::Collect(collector) => {
                if collector.step(env.host) == StepState::Finished {
                    let Phase::Collect(collector) = std::mem::replace(&mut self.phase, Phase::Done) else {
                        return StepState::Finished;
                    };
                    let (roots, dependencies) = collector.finish();
                    tracing::debug!(roots = roots.len(), dependencies = dependencies.len(), "dependencies collected");
                    self.phase = Phase::Validate {
                        pending: dependencies.iter().cloned().collect(),
                        current: None,
                    };
                    self.roots = roots;
                    self.dependencies = dependencies;
                }
                StepState::MoreWork
            }
            Phase::Validate { pending, current } => {
                if let Some(walk) = current {
                    if walk.step(env, ctx) == StepState::Finished {
                        *current = None;
                    }
                    return StepState::MoreWork;
                }
                match pending.pop_front() {
                    Some(path) => validate_asset(env, ctx, &path, current),
                    None => self.phase = Phase::Pairs { next_root: 0 },
                }
                StepState::MoreWork
            }
            Phase::Pairs { next_root } => {
                ctx.set_scope(ScopeKind::Asset, None, true);
                if let Some(root) = self.roots.get(*next_root) {
                    for dependency in &self.dependencies {
                        dispatch::validate_path(env, ctx, root, dependency);
                    }
                    *next_root += 1;
                }
                if *next_root >= self.roots.len() {
                    self.phase = Phase::Done;
                    StepState::Finished
                } else {
                    StepState::MoreWork
                }
            }
            Phase::Done => StepState::Finished,
        }
    }
}

fn validate_asset(env: RuleEnv<'_>, ctx: &mut ValidationContext, path: &str, current: &mut Option<HierarchyWalk>) {
    let Some(info) = env.host.load_asset(path).and_then(|id| env.host.object(id)) else {
        tracing::warn!(path, "dependency could not be loaded");
        return;
    };
    match info.class {
        ObjectClass::Node => *current = Some(HierarchyWalk::new([info.id], ScopeKind::Prefab, true)),
        _ => {
            ctx.set_scope(ScopeKind::Asset, Some(info.id), true);
            dispatch::validate_object(env, ctx, &info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryScene;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn closure_in_discovery_order() {
        let host = MemoryScene::new();
        host.add_dependency("Main.unity", "A.prefab");
        host.add_dependency("A.prefab", "B.mat");
        host.add_dependency("B.mat", "C.png");
        host.add_dependency("Main.unity", "D.mat");

        let deps = collect_dependencies(&host, &paths(&["Main.unity"]), ".unity");
        assert_eq!(deps, paths(&["A.prefab", "B.mat", "C.png", "D.mat"]));
    }

    #[test]
    fn cycles_and_shared_dependencies_visited_once() {
        let host = MemoryScene::new();
        host.add_dependency("One.unity", "A.prefab");
        host.add_dependency("Two.unity", "A.prefab");
        host.add_dependency("A.prefab", "B.prefab");
        host.add_dependency("B.prefab", "A.prefab");

        let deps = collect_dependencies(&host, &paths(&["One.unity", "Two.unity"]), ".unity");
        assert_eq!(deps, paths(&["A.prefab", "B.prefab"]));
    }

    #[test]
    fn scenes_are_not_expanded_and_roots_excluded() {
        let host = MemoryScene::new();
        host.add_dependency("Main.unity", "Other.unity");
        host.add_dependency("Other.unity", "Hidden.mat");
        host.add_dependency("Main.unity", "Root.prefab");
        host.add_dependency("Root.prefab", "Shared.mat");

        let deps = collect_dependencies(&host, &paths(&["Main.unity", "Root.prefab"]), ".unity");
        assert_eq!(deps, paths(&["Shared.mat"]));
    }
}
