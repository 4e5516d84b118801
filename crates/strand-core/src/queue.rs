//! Per-ratchet job serialization.
//!
//! Every operation that reads, advances and writes back a sender key record
//! runs while holding that record's *turn*. Turns for one [`SenderKeyId`] are
//! granted strictly in the order they were requested (`tokio::sync::Mutex` is
//! FIFO-fair). Turns for different ids never contend: each id owns its own
//! lock, and the registry lock is only held to look one up.
//!
//! # Invariants
//!
//! - At most one turn per id is held at any time
//! - A registry entry exists exactly while some caller holds or awaits its
//!   turn; the last member out removes it
//! - Dropping a caller while it waits for its turn (cancellation) leaves no
//!   trace in the registry and does not disturb the callers queued behind it
//! - A job runs on the blocking pool and owns its turn until it returns, so
//!   a slow storage commit for one id never stalls the async workers

#![allow(clippy::disallowed_types, reason = "Registry lock is never held across an await")]

use std::{
    collections::HashMap,
    panic,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::SenderKeyId;

type Registry = Arc<Mutex<HashMap<SenderKeyId, Chain>>>;

/// Queue of pending jobs for a single id.
struct Chain {
    lock: Arc<AsyncMutex<()>>,
    /// Callers holding or awaiting this chain's turn
    members: usize,
}

/// Registry of per-id job chains.
///
/// Clones share the registry.
#[derive(Clone, Default)]
pub struct JobQueue {
    chains: Registry,
}

impl JobQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the exclusive turn of `id`.
    ///
    /// The turn is released when the returned [`Turn`] is dropped.
    pub async fn turn(&self, id: &SenderKeyId) -> Turn {
        let lock = {
            let mut chains = lock_registry(&self.chains);
            let chain = chains
                .entry(id.clone())
                .or_insert_with(|| Chain { lock: Arc::default(), members: 0 });
            chain.members += 1;
            Arc::clone(&chain.lock)
        };

        // Constructed before awaiting so a cancelled wait still leaves the chain
        let membership = Membership { chains: Arc::clone(&self.chains), id: id.clone() };
        let guard = lock.lock_owned().await;

        Turn { _guard: guard, _membership: membership }
    }

    /// Run `job` once every job queued earlier for `id` has finished.
    ///
    /// The job is synchronous and runs on the blocking thread pool. Once it
    /// starts it runs to completion before the turn passes on, even if the
    /// caller stops waiting for the result. A panic in the job resumes in
    /// the caller.
    pub async fn run<T, F>(&self, id: &SenderKeyId, job: F) -> T
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let turn = self.turn(id).await;
        let handle = tokio::task::spawn_blocking(move || {
            let _turn = turn;
            job()
        });

        match handle.await {
            Ok(output) => output,
            Err(err) => match err.try_into_panic() {
                Ok(payload) => panic::resume_unwind(payload),
                Err(err) => panic::resume_unwind(Box::new(err)),
            },
        }
    }

    /// Number of ids with a job running or queued.
    pub fn active_chains(&self) -> usize {
        lock_registry(&self.chains).len()
    }

    /// Whether a job is running or queued for `id`.
    pub fn is_active(&self, id: &SenderKeyId) -> bool {
        lock_registry(&self.chains).contains_key(id)
    }
}

/// Exclusive turn on one id's record.
///
/// Field order matters: the lock is released before membership is dropped.
pub struct Turn {
    _guard: OwnedMutexGuard<()>,
    _membership: Membership,
}

struct Membership {
    chains: Registry,
    id: SenderKeyId,
}

impl Drop for Membership {
    fn drop(&mut self) {
        let mut chains = lock_registry(&self.chains);
        let Some(chain) = chains.get_mut(&self.id) else {
            return;
        };

        chain.members -= 1;
        if chain.members == 0 {
            chains.remove(&self.id);
        }
    }
}

fn lock_registry(chains: &Registry) -> MutexGuard<'_, HashMap<SenderKeyId, Chain>> {
    chains.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{GroupId, SenderIdentity};

    fn id(sender: &str) -> SenderKeyId {
        SenderKeyId::new(GroupId::new("g"), SenderIdentity::new(sender))
    }

    #[tokio::test]
    async fn run_returns_job_output_and_cleans_up() {
        let queue = JobQueue::new();

        let value = queue.run(&id("alice"), || 41 + 1).await;

        assert_eq!(value, 42);
        assert_eq!(queue.active_chains(), 0);
    }

    #[tokio::test]
    async fn held_turn_keeps_chain_registered() {
        let queue = JobQueue::new();

        let turn = queue.turn(&id("alice")).await;
        assert!(queue.is_active(&id("alice")));
        assert!(!queue.is_active(&id("bob")));

        drop(turn);
        assert_eq!(queue.active_chains(), 0);
    }

    #[tokio::test]
    async fn other_ids_are_not_blocked() {
        let queue = JobQueue::new();
        let _held = queue.turn(&id("alice")).await;

        let result = tokio::time::timeout(Duration::from_secs(1), queue.run(&id("bob"), || 7)).await;

        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn same_id_waits_for_turn() {
        let queue = JobQueue::new();
        let held = queue.turn(&id("alice")).await;

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), queue.run(&id("alice"), || ())).await;
        assert!(blocked.is_err());

        drop(held);
        queue.run(&id("alice"), || ()).await;
    }

    #[tokio::test]
    async fn cancelled_wait_leaves_no_entry() {
        let queue = JobQueue::new();
        let held = queue.turn(&id("alice")).await;

        let _ = tokio::time::timeout(Duration::from_millis(20), queue.turn(&id("alice"))).await;
        assert!(queue.is_active(&id("alice")));

        drop(held);
        assert_eq!(queue.active_chains(), 0);
    }

    #[tokio::test]
    async fn blocked_job_does_not_stall_other_ids() {
        let queue = JobQueue::new();
        let (release, wait) = std::sync::mpsc::channel::<()>();

        let cloned = queue.clone();
        let slow = tokio::spawn(async move {
            cloned.run(&id("alice"), move || wait.recv().is_ok()).await
        });
        tokio::task::yield_now().await;

        let fast = tokio::time::timeout(Duration::from_secs(1), queue.run(&id("bob"), || 7)).await;
        assert_eq!(fast, Ok(7));
        assert!(queue.is_active(&id("alice")));

        release.send(()).unwrap();
        assert!(slow.await.unwrap());
        assert_eq!(queue.active_chains(), 0);
    }

    #[tokio::test]
    async fn panicking_job_releases_turn() {
        let queue = JobQueue::new();
        let cloned = queue.clone();

        let handle = tokio::spawn(async move {
            cloned.run(&id("alice"), || panic!("job failed")).await;
        });
        assert!(handle.await.is_err());

        assert_eq!(queue.run(&id("alice"), || 1).await, 1);
        assert_eq!(queue.active_chains(), 0);
    }
}
