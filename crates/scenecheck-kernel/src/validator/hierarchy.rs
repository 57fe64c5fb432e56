//! Walking a node tree and validating every node and component.

use scenecheck_types::{ObjectId, ScopeKind};

use super::context::ValidationContext;
use crate::host::SceneHost;
use crate::rules::{RuleEnv, dispatch};
use crate::scheduler::StepState;

/// True if `node` sits under (or is) a validation parent that skips its children.
///
/// The nearest capability-bearing node decides.
pub fn skipped_by_validation_parent<H: SceneHost + ?Sized>(host: &H, node: ObjectId) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        if let Some(skip) = host.validation_parent(id) {
            return skip;
        }
        current = host.parent(id);
    }
    false
}

/// Pre-order walk over one or more subtrees, one node per step.
///
/// Inactive nodes are included. A skipped node is pruned with its whole
/// subtree.
#[derive(Debug)]
pub struct HierarchyWalk {
    stack: Vec<ObjectId>,
    kind: ScopeKind,
    is_dependency: bool,
    visited: usize,
}

impl HierarchyWalk {
    pub fn new(roots: impl IntoIterator<Item = ObjectId>, kind: ScopeKind, is_dependency: bool) -> Self {
        let mut stack: Vec<ObjectId> = roots.into_iter().collect();
        stack.reverse();
        Self {
            stack,
            kind,
            is_dependency,
            visited: 0,
        }
    }

    /// Nodes validated so far.
    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn is_finished(&self) -> bool {
        self.stack.is_empty()
    }

    /// Validate the next node and its components.
    pub fn step(&mut self, env: RuleEnv<'_>, ctx: &mut ValidationContext) -> StepState {
        let Some(node) = self.stack.pop() else {
            return StepState::Finished;
        };

        if skipped_by_validation_parent(env.host, node) {
            tracing::debug!(node = %node, "skipped by validation parent");
        } else {
            self.validate(env, ctx, node);
            self.visited += 1;
            let children = env.host.children(node);
            self.stack.extend(children.into_iter().rev());
        }

        if self.stack.is_empty() {
            StepState::Finished
        } else {
            StepState::MoreWork
        }
    }

    fn validate(&self, env: RuleEnv<'_>, ctx: &mut ValidationContext, node: ObjectId) {
        for id in std::iter::once(node).chain(env.host.components(node)) {
            let Some(info) = env.host.object(id) else {
                tracing::warn!(object = %id, "object vanished during validation");
                continue;
            };
            ctx.set_scope(self.kind, Some(id), self.is_dependency);
            if let Some(validator) = env.host.self_validator(id) {
                dispatch::isolate("self-validation", &info, || validator.validate(ctx));
            }
            dispatch::validate_object(env, ctx, &info);
        }
    }

    /// Walk everything remaining without yielding.
    pub fn run(&mut self, env: RuleEnv<'_>, ctx: &mut ValidationContext) {
        while self.step(env, ctx) == StepState::MoreWork {}
    }
}
