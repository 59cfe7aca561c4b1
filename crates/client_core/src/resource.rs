//! Per-resource `{data, loading, error}` state and the lifecycle that drives it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared::error::ErrorPayload;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Courses,
    Sprints,
    Login,
    Signup,
    Checker,
}

/// Where a resource sits in its request lifecycle. `Succeeded` and `Failed`
/// are the two settled outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Loading,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub enum Lifecycle<T> {
    Started,
    Succeeded(T),
    Failed(ErrorPayload),
    /// Only produced by dispatches that carry a cancellation token.
    Cancelled,
    /// Data loaded outside a request, e.g. from session storage at startup.
    Hydrated(T),
    Reset,
}

/// Broadcast after every transition of any container in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreEvent {
    pub resource: ResourceKind,
    pub phase: Phase,
}

/// What happens to an optimistic mutation when its request fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPolicy {
    /// Leave the optimistic data in place and surface the error.
    #[default]
    KeepStale,
    /// Put the data back to what it was before the mutation.
    Restore,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    pub data: T,
    pub loading: bool,
    pub error: Option<ErrorPayload>,
    phase: Phase,
}

impl<T: Default> Default for ResourceState<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> ResourceState<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            loading: false,
            error: None,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.phase, Phase::Succeeded | Phase::Failed)
    }

    /// Applies one lifecycle event. A settle event arriving while not loading
    /// is still applied: the last response to land wins.
    pub fn reduce(&mut self, event: Lifecycle<T>)
    where
        T: Default,
    {
        match event {
            Lifecycle::Started => {
                self.loading = true;
                self.error = None;
                self.phase = Phase::Loading;
            }
            Lifecycle::Succeeded(data) => {
                self.data = data;
                self.settle(Phase::Succeeded);
            }
            Lifecycle::Failed(error) => {
                self.loading = false;
                self.error = Some(error);
                self.phase = Phase::Failed;
            }
            Lifecycle::Cancelled => {
                self.loading = false;
                self.phase = Phase::Cancelled;
            }
            Lifecycle::Hydrated(data) => {
                *self = Self::new(data);
            }
            Lifecycle::Reset => {
                *self = Self::default();
            }
        }
    }

    fn settle(&mut self, phase: Phase) {
        self.loading = false;
        self.error = None;
        self.phase = phase;
    }
}

/// Data captured before an optimistic mutation.
#[derive(Debug)]
#[must_use = "a checkpoint should be reconciled once the request settles"]
pub struct Checkpoint<T> {
    before: T,
}

/// Shared handle to one resource's state. The container is the only writer
/// of that state; any number of readers can take snapshots.
pub struct ResourceContainer<T> {
    kind: ResourceKind,
    state: Arc<RwLock<ResourceState<T>>>,
    events: broadcast::Sender<StoreEvent>,
    rollback: RollbackPolicy,
}

impl<T> Clone for ResourceContainer<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            rollback: self.rollback,
        }
    }
}

impl<T> ResourceContainer<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    pub fn new(
        kind: ResourceKind,
        events: broadcast::Sender<StoreEvent>,
        rollback: RollbackPolicy,
    ) -> Self {
        Self {
            kind,
            state: Arc::new(RwLock::new(ResourceState::default())),
            events,
            rollback,
        }
    }

    pub async fn snapshot(&self) -> ResourceState<T> {
        self.state.read().await.clone()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&ResourceState<T>) -> R) -> R {
        f(&*self.state.read().await)
    }

    pub async fn apply(&self, event: Lifecycle<T>) -> Phase {
        let mut state = self.state.write().await;
        if matches!(event, Lifecycle::Succeeded(_) | Lifecycle::Failed(_)) && !state.loading {
            debug!(resource = ?self.kind, "settling a resource that is not loading");
        }
        state.reduce(event);
        let phase = state.phase;
        drop(state);
        self.publish(phase);
        phase
    }

    /// Settles successfully by merging into the current data under the write
    /// lock, so merges from concurrent responses are not lost.
    pub async fn settle_with<R>(&self, merge: impl FnOnce(&mut T) -> R) -> R {
        let mut state = self.state.write().await;
        if !state.loading {
            debug!(resource = ?self.kind, "settling a resource that is not loading");
        }
        let result = merge(&mut state.data);
        state.settle(Phase::Succeeded);
        drop(state);
        self.publish(Phase::Succeeded);
        result
    }

    /// Mutates the data ahead of server confirmation. The phase is left
    /// as is; the returned checkpoint is handed back on failure.
    pub async fn optimistic(&self, mutate: impl FnOnce(&mut T)) -> Checkpoint<T> {
        let mut state = self.state.write().await;
        let before = state.data.clone();
        mutate(&mut state.data);
        let phase = state.phase;
        drop(state);
        self.publish(phase);
        Checkpoint { before }
    }

    /// Records a failed request that had an optimistic mutation in flight,
    /// restoring the checkpoint when the policy says so.
    pub async fn fail_optimistic(&self, checkpoint: Checkpoint<T>, error: ErrorPayload) {
        self.reconcile(checkpoint, Lifecycle::Failed(error)).await;
    }

    pub async fn cancel_optimistic(&self, checkpoint: Checkpoint<T>) {
        self.reconcile(checkpoint, Lifecycle::Cancelled).await;
    }

    async fn reconcile(&self, checkpoint: Checkpoint<T>, event: Lifecycle<T>) {
        let mut state = self.state.write().await;
        if self.rollback == RollbackPolicy::Restore {
            state.data = checkpoint.before;
        }
        state.reduce(event);
        let phase = state.phase;
        drop(state);
        debug!(resource = ?self.kind, policy = ?self.rollback, "optimistic mutation not confirmed");
        self.publish(phase);
    }

    fn publish(&self, phase: Phase) {
        debug!(resource = ?self.kind, ?phase, "resource transition");
        let _ = self.events.send(StoreEvent {
            resource: self.kind,
            phase,
        });
    }
}

#[cfg(test)]
#[path = "tests/resource_tests.rs"]
mod tests;
