//! The engine: owns the rule registry and drives runs for a host.
//!
//! At most one asynchronous run is active. Requesting another cancels the
//! one in flight (last request wins). When the host starts simulating, the
//! active run is cancelled, replaced by an empty, labeled, aborted
//! collection, and the engine returns to idle.
//!
//! ```text
//! Idle ──run_validation──▶ Running ──▶ Finished
//!  ▲                          │
//!  └──host_mode_changed(Simulating), RunEvent::Aborted
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::ValidationError;
use crate::host::{CallSiteResolver, SceneHost};
use crate::rules::{RuleRegistry, register_builtins};
use crate::scheduler::{run_time_sliced, run_to_completion};
use crate::validator::{ContextOptions, IssueCollection, IssueId, RunOptions, RunTarget, ValidationRun};

const EVENT_CAPACITY: usize = 64;

/// Host lifecycle as reported to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    Editing,
    Simulating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Finished,
}

/// Notifications for subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum RunEvent {
    Started {
        run: u64,
        label: String,
    },
    Finished {
        run: u64,
        errors: usize,
        warnings: usize,
    },
    Aborted {
        run: u64,
        label: String,
    },
}

struct Active {
    generation: u64,
    run: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Inner {
    state: RunState,
    generation: u64,
    active: Option<Active>,
    collection: Option<IssueCollection>,
}

impl Inner {
    /// Stop the active run, if any, without publishing a result.
    fn stop_active(&mut self) -> Option<u64> {
        let active = self.active.take()?;
        active.cancel.cancel();
        active.task.abort();
        self.generation += 1;
        Some(active.run)
    }
}

pub struct Engine {
    config: EngineConfig,
    host: Arc<dyn SceneHost>,
    registry: Arc<RuleRegistry>,
    resolver: Option<Arc<dyn CallSiteResolver>>,
    inner: Arc<Mutex<Inner>>,
    events: broadcast::Sender<RunEvent>,
}

impl Engine {
    /// An engine with the builtin rules enabled by `config`.
    pub fn new(config: EngineConfig, host: Arc<dyn SceneHost>) -> Result<Self, ValidationError> {
        let mut registry = RuleRegistry::new();
        register_builtins(&mut registry, &config.rules, &config.scene_extension)?;
        Ok(Self::with_registry(config, host, registry))
    }

    /// An engine with an explicit rule set.
    pub fn with_registry(config: EngineConfig, host: Arc<dyn SceneHost>, registry: RuleRegistry) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        tracing::debug!(rules = ?registry.names(), "engine ready");
        Self {
            config,
            host,
            registry: Arc::new(registry),
            resolver: None,
            inner: Arc::new(Mutex::new(Inner {
                state: RunState::Idle,
                generation: 0,
                active: None,
                collection: None,
            })),
            events,
        }
    }

    /// Name unlabeled assertions from their call sites.
    pub fn with_resolver(mut self, resolver: Arc<dyn CallSiteResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn host(&self) -> &Arc<dyn SceneHost> {
        &self.host
    }

    pub fn state(&self) -> RunState {
        self.lock().state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn options(&self, rich_text: bool) -> RunOptions {
        RunOptions::new(
            ContextOptions {
                rich_text,
                resolver: self.resolver.clone(),
            },
            self.config.scene_extension.clone(),
        )
    }

    /// Start a time-sliced run of the current target in the background.
    ///
    /// Cancels any run in flight. Returns the new run's id. Must be called
    /// from within a tokio runtime.
    pub fn run_validation(&self) -> Result<u64, ValidationError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ValidationError::NoRuntime)?;
        let target = RunTarget::current(self.host.as_ref());

        let mut inner = self.lock();
        if let Some(previous) = inner.stop_active() {
            tracing::debug!(run = previous, "superseded by a new run");
            inner.state = RunState::Idle;
        }
        let mut run = ValidationRun::new(
            Arc::clone(&self.host),
            Arc::clone(&self.registry),
            target,
            self.options(self.config.rich_text),
        )?;
        let run_id = run.id();
        let generation = inner.generation;
        let cancel = CancellationToken::new();
        // No subscribers is fine.
        let _ = self.events.send(RunEvent::Started {
            run: run_id,
            label: run.label().to_string(),
        });

        let shared = Arc::clone(&self.inner);
        let events = self.events.clone();
        let token = cancel.clone();
        let budget = self.config.slice_budget();
        let task = runtime.spawn(async move {
            // Whoever cancelled the run has already published its outcome.
            let Ok(stats) = run_time_sliced(&mut run, budget, &token).await else {
                return;
            };
            let mut inner = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.generation != generation {
                return;
            }
            inner.active = None;
            tracing::debug!(run = run_id, steps = stats.steps, yields = stats.yields, "run drained");
            let collection = run.finish();
            let finished = RunEvent::Finished {
                run: run_id,
                errors: collection.errors(),
                warnings: collection.warnings(),
            };
            inner.collection = Some(collection);
            inner.state = RunState::Finished;
            let _ = events.send(finished);
        });

        inner.active = Some(Active {
            generation,
            run: run_id,
            cancel,
            task,
        });
        inner.state = RunState::Running;
        Ok(run_id)
    }

    /// Validate all open scenes on the calling thread, with plain-text messages.
    pub fn run_validation_synchronously(&self) -> Result<IssueCollection, ValidationError> {
        self.run_synchronously(RunTarget::OpenScenes)
    }

    /// Validate `target` on the calling thread, with plain-text messages.
    ///
    /// Cancels any asynchronous run in flight. The result is returned to the
    /// caller and does not replace the engine's current collection.
    pub fn run_synchronously(&self, target: RunTarget) -> Result<IssueCollection, ValidationError> {
        {
            let mut inner = self.lock();
            if let Some(previous) = inner.stop_active() {
                tracing::debug!(run = previous, "superseded by a synchronous run");
                inner.state = RunState::Idle;
            }
        }
        let mut run = ValidationRun::new(
            Arc::clone(&self.host),
            Arc::clone(&self.registry),
            target,
            self.options(false),
        )?;
        let stats = run_to_completion(&mut run);
        tracing::debug!(run = run.id(), steps = stats.steps, "synchronous run drained");
        Ok(run.finish())
    }

    /// React to the host entering or leaving simulation.
    ///
    /// Entering simulation cancels the active run, publishes an empty aborted
    /// collection carrying the configured label, sends [`RunEvent::Aborted`],
    /// and leaves the engine idle.
    pub fn host_mode_changed(&self, mode: HostMode) {
        if mode != HostMode::Simulating {
            return;
        }
        let mut inner = self.lock();
        let Some(run) = inner.stop_active() else {
            return;
        };
        tracing::info!(run, "run aborted by host simulation");
        let label = self.config.aborted_label.clone();
        inner.collection = Some(IssueCollection::aborted(label.clone()));
        inner.state = RunState::Idle;
        let _ = self.events.send(RunEvent::Aborted { run, label });
    }

    /// Inspect the most recent asynchronous result.
    pub fn with_current_collection<R>(&self, f: impl FnOnce(&IssueCollection) -> R) -> Option<R> {
        self.lock().collection.as_ref().map(f)
    }

    /// Take the most recent asynchronous result, leaving none.
    pub fn take_current_collection(&self) -> Option<IssueCollection> {
        self.lock().collection.take()
    }

    /// Apply the auto-fix of an issue in the current collection.
    pub fn apply_auto_fix(&self, id: IssueId) -> Result<(), ValidationError> {
        let mut inner = self.lock();
        match inner.collection.as_mut() {
            Some(collection) => collection.apply_auto_fix(id, self.host.as_ref()),
            None => Ok(()),
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.lock().stop_active();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Engine")
            .field("state", &inner.state)
            .field("active", &inner.active.as_ref().map(|a| (a.run, a.generation)))
            .field("rules", &self.registry.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::host::MemoryScene;
    use crate::validator::RunStatus;

    fn host() -> Arc<MemoryScene> {
        let host = MemoryScene::new();
        host.add_scene("Assets/Main.unity");
        let root = host.add_root("Assets/Main.unity", "Door").expect("scene open");
        let comp = host.add_component(root, "Game.Door").expect("node exists");
        host.set_field(comp, "frame", scenecheck_types::FieldValue::Null);
        Arc::new(host)
    }

    fn engine(host: Arc<MemoryScene>) -> Engine {
        Engine::new(EngineConfig::plain().with_slice_budget(Duration::ZERO), host).expect("default config")
    }

    #[tokio::test]
    async fn async_run_publishes_collection() {
        let engine = engine(host());
        let mut events = engine.subscribe();
        let run = engine.run_validation().expect("runtime present");
        assert_eq!(engine.state(), RunState::Running);

        assert!(matches!(events.recv().await, Ok(RunEvent::Started { run: r, .. }) if r == run));
        assert_eq!(
            events.recv().await.expect("finished event"),
            RunEvent::Finished {
                run,
                errors: 1,
                warnings: 0
            }
        );
        assert_eq!(engine.state(), RunState::Finished);
        assert_eq!(engine.with_current_collection(|c| c.len()), Some(1));
    }

    #[tokio::test]
    async fn simulation_aborts_active_run() {
        let engine = engine(host());
        let mut events = engine.subscribe();
        let run = engine.run_validation().expect("runtime present");
        engine.host_mode_changed(HostMode::Simulating);

        assert_eq!(engine.state(), RunState::Idle);
        let (status, label, len) = engine
            .with_current_collection(|c| (c.status(), c.label().to_string(), c.len()))
            .expect("aborted collection");
        assert_eq!(status, RunStatus::Aborted);
        assert_eq!(label, crate::config::DEFAULT_ABORTED_LABEL);
        assert_eq!(len, 0);

        assert!(matches!(events.recv().await, Ok(RunEvent::Started { .. })));
        assert!(matches!(events.recv().await, Ok(RunEvent::Aborted { run: r, .. }) if r == run));
    }

    #[tokio::test]
    async fn cancelled_task_publishes_nothing_more() {
        let engine = engine(host());
        let mut events = engine.subscribe();
        let first = engine.run_validation().expect("runtime present");
        engine.host_mode_changed(HostMode::Simulating);
        engine.host_mode_changed(HostMode::Simulating);

        let second = engine.run_validation().expect("idle engine accepts a new run");
        let mut seen = Vec::new();
        loop {
            let event = events.recv().await.expect("events flow");
            let done = matches!(event, RunEvent::Finished { .. });
            seen.push(event);
            if done {
                break;
            }
        }
        let aborted: Vec<_> = seen
            .iter()
            .filter_map(|e| match e {
                RunEvent::Aborted { run, .. } => Some(*run),
                _ => None,
            })
            .collect();
        assert_eq!(aborted, vec![first], "one abort, sent once");
        assert!(matches!(seen.last(), Some(RunEvent::Finished { run, .. }) if *run == second));
        assert_eq!(engine.state(), RunState::Finished);
        assert_eq!(engine.with_current_collection(|c| c.is_aborted()), Some(false));
    }

    #[tokio::test]
    async fn last_request_wins() {
        let engine = engine(host());
        let mut events = engine.subscribe();
        let first = engine.run_validation().expect("runtime present");
        let second = engine.run_validation().expect("runtime present");
        assert_ne!(first, second);

        loop {
            match events.recv().await.expect("events flow") {
                RunEvent::Finished { run, .. } => {
                    assert_eq!(run, second);
                    break;
                }
                RunEvent::Started { .. } => {}
                RunEvent::Aborted { .. } => panic!("superseded runs are not reported as aborted"),
            }
        }
        assert_eq!(engine.state(), RunState::Finished);
    }

    #[test]
    fn async_run_needs_runtime() {
        let engine = engine(host());
        assert!(matches!(engine.run_validation(), Err(ValidationError::NoRuntime)));
        assert_eq!(engine.state(), RunState::Idle);
    }

    #[test]
    fn synchronous_run_is_plain_text() {
        let engine = Engine::new(EngineConfig::default(), host()).expect("default config");
        let collection = engine.run_validation_synchronously().expect("not simulating");
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.issues()[0].info_text(), "Property frame is null");
        assert!(engine.with_current_collection(|_| ()).is_none());
    }

    #[test]
    fn synchronous_run_refused_while_simulating() {
        let host = host();
        host.set_simulating(true);
        let engine = engine(host);
        assert!(matches!(
            engine.run_validation_synchronously(),
            Err(ValidationError::InvalidRunState)
        ));
    }
}
