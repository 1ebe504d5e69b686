//! Optimistic updates for toggle and counter style actions.
//!
//! Each target moves Idle -> Pending -> Idle. While a target is pending, a new
//! action on it is rejected with [`ClientError::Pending`].

use std::{collections::HashMap, fmt::Debug, future::Future, hash::Hash, sync::Arc};

use shared::protocol::LikeEcho;
use tokio::{runtime::Handle, sync::Mutex};
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStatus {
    Pending,
    Confirmed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticEdit<K, V> {
    pub target: K,
    pub previous: V,
    pub proposed: V,
    pub status: EditStatus,
}

/// Handle to one pending edit. Stale once the edit resolves or is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditTicket<K> {
    target: K,
    seq: u64,
}

impl<K: Copy> EditTicket<K> {
    pub fn target(&self) -> K {
        self.target
    }
}

struct PendingEdit<K, V> {
    seq: u64,
    edit: OptimisticEdit<K, V>,
}

struct CoordinatorState<K, V> {
    pending: HashMap<K, PendingEdit<K, V>>,
    next_seq: u64,
}

impl<K: Eq + Hash, V> CoordinatorState<K, V> {
    fn holds(&self, ticket: &EditTicket<K>) -> bool {
        matches!(self.pending.get(&ticket.target), Some(pending) if pending.seq == ticket.seq)
    }

    fn take(&mut self, ticket: &EditTicket<K>) -> Option<OptimisticEdit<K, V>> {
        if !self.holds(ticket) {
            return None;
        }
        self.pending.remove(&ticket.target).map(|pending| pending.edit)
    }
}

type SharedState<K, V> = Arc<Mutex<CoordinatorState<K, V>>>;

pub struct MutationCoordinator<K, V> {
    label: &'static str,
    state: SharedState<K, V>,
}

impl<K, V> MutationCoordinator<K, V>
where
    K: Copy + Eq + Hash + Debug + Send + 'static,
    V: Clone + PartialEq + Send + 'static,
{
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            state: Arc::new(Mutex::new(CoordinatorState {
                pending: HashMap::new(),
                next_seq: 0,
            })),
        }
    }

    pub async fn begin(&self, target: K, previous: V, proposed: V) -> ClientResult<EditTicket<K>> {
        let mut state = self.state.lock().await;
        if state.pending.contains_key(&target) {
            debug!(mutation = self.label, ?target, "optimistic: rejected, edit pending");
            return Err(ClientError::Pending);
        }
        state.next_seq += 1;
        let seq = state.next_seq;
        state.pending.insert(
            target,
            PendingEdit {
                seq,
                edit: OptimisticEdit {
                    target,
                    previous,
                    proposed,
                    status: EditStatus::Pending,
                },
            },
        );
        Ok(EditTicket { target, seq })
    }

    /// Resolves the edit as confirmed. `None` when the ticket is stale.
    pub async fn confirm(&self, ticket: &EditTicket<K>) -> Option<OptimisticEdit<K, V>> {
        self.resolve(ticket, EditStatus::Confirmed).await
    }

    /// Resolves the edit as rolled back; the caller restores `previous`.
    pub async fn roll_back(&self, ticket: &EditTicket<K>) -> Option<OptimisticEdit<K, V>> {
        self.resolve(ticket, EditStatus::RolledBack).await
    }

    async fn resolve(
        &self,
        ticket: &EditTicket<K>,
        status: EditStatus,
    ) -> Option<OptimisticEdit<K, V>> {
        self.state.lock().await.take(ticket).map(|mut edit| {
            edit.status = status;
            edit
        })
    }

    pub async fn is_pending(&self, target: K) -> bool {
        self.state.lock().await.pending.contains_key(&target)
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Forgets every pending edit. Their completions will not touch state.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        if !state.pending.is_empty() {
            info!(
                mutation = self.label,
                dropped = state.pending.len(),
                "optimistic: pending edits cleared"
            );
        }
        state.pending.clear();
    }

    /// Applies `proposed`, awaits `request`, then settles the visible value.
    ///
    /// On success the value from `reconcile` (server echo, or the proposed value
    /// kept) is applied if it differs. On failure `previous` is applied back
    /// before the error is returned. If the edit was cleared meanwhile nothing
    /// is applied. Dropping the returned future before it settles rolls the
    /// edit back on a background task and frees the target.
    pub async fn run<A, AFut, Req, R, Rec>(
        &self,
        target: K,
        previous: V,
        proposed: V,
        apply: A,
        request: Req,
        reconcile: Rec,
    ) -> ClientResult<R>
    where
        A: Fn(V) -> AFut,
        AFut: Future<Output = ()> + Send + 'static,
        Req: Future<Output = ClientResult<R>>,
        Rec: FnOnce(&R, V) -> V,
    {
        let ticket = self
            .begin(target, previous.clone(), proposed.clone())
            .await?;
        let mut guard = AbandonGuard {
            label: self.label,
            state: Arc::clone(&self.state),
            ticket,
            restore: Some(apply(previous)),
        };
        apply(proposed.clone()).await;

        match request.await {
            Ok(response) => {
                let settled = reconcile(&response, proposed.clone());
                let confirmed = self.confirm(&ticket).await.is_some();
                guard.disarm();
                if confirmed {
                    if settled != proposed {
                        apply(settled).await;
                    }
                    debug!(mutation = self.label, ?target, "optimistic: confirmed");
                }
                Ok(response)
            }
            Err(err) => {
                let rolled_back = self.roll_back(&ticket).await.is_some();
                let restore = guard.disarm();
                if let (true, Some(restore)) = (rolled_back, restore) {
                    restore.await;
                    warn!(
                        mutation = self.label,
                        ?target,
                        error = %err,
                        "optimistic: rolled back"
                    );
                }
                Err(err)
            }
        }
    }
}

/// Rolls an edit back when the future driving it is dropped mid-request.
struct AbandonGuard<K, V, F>
where
    K: Copy + Eq + Hash + Debug + Send + 'static,
    V: Send + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    label: &'static str,
    state: SharedState<K, V>,
    ticket: EditTicket<K>,
    restore: Option<F>,
}

impl<K, V, F> AbandonGuard<K, V, F>
where
    K: Copy + Eq + Hash + Debug + Send + 'static,
    V: Send + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    fn disarm(&mut self) -> Option<F> {
        self.restore.take()
    }
}

impl<K, V, F> Drop for AbandonGuard<K, V, F>
where
    K: Copy + Eq + Hash + Debug + Send + 'static,
    V: Send + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    fn drop(&mut self) {
        let Some(restore) = self.restore.take() else {
            return;
        };
        let label = self.label;
        let ticket = self.ticket;
        let state = Arc::clone(&self.state);

        let Ok(runtime) = Handle::try_current() else {
            // No runtime left to restore on; at least free the target.
            if let Ok(mut state) = state.try_lock() {
                state.take(&ticket);
            }
            warn!(mutation = label, target = ?ticket.target, "optimistic: edit abandoned");
            return;
        };

        // The target stays pending until the previous value is back, so a new
        // press cannot interleave with the restore.
        runtime.spawn(async move {
            if !state.lock().await.holds(&ticket) {
                return;
            }
            restore.await;
            if state.lock().await.take(&ticket).is_some() {
                warn!(
                    mutation = label,
                    target = ?ticket.target,
                    "optimistic: abandoned edit rolled back"
                );
            }
        });
    }
}

/// Like flag plus the counter shown next to it.
///
/// The shown count is the last server count with a local delta on top, so a
/// rollback only has to drop the delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
    pub base_count: u64,
    pub delta: i8,
}

impl LikeState {
    pub fn new(liked: bool, count: u64) -> Self {
        Self {
            liked,
            base_count: count,
            delta: 0,
        }
    }

    pub fn displayed_count(&self) -> u64 {
        if self.delta >= 0 {
            self.base_count.saturating_add(self.delta as u64)
        } else {
            self.base_count.saturating_sub(self.delta.unsigned_abs() as u64)
        }
    }

    pub fn toggled(self) -> Self {
        let liked = !self.liked;
        let step = if liked { 1 } else { -1 };
        Self {
            liked,
            base_count: self.base_count,
            delta: self.delta.saturating_add(step),
        }
    }

    /// Folds a server echo in. Missing fields keep the optimistic value.
    pub fn reconciled(self, echo: Option<&LikeEcho>) -> Self {
        let Some(echo) = echo else {
            return self;
        };
        let liked = echo.like_yn.unwrap_or(self.liked);
        match echo.likes_count {
            Some(count) => Self::new(liked, count),
            None => Self { liked, ..self },
        }
    }
}

#[cfg(test)]
#[path = "tests/optimistic_tests.rs"]
mod tests;
