//! # Job List Module
//!
//! Collezione ordinata e deduplicata di `JobItem`, unica fonte di verità sullo stato.
//!
//! ## Responsabilità:
//! - `add` / `remove` guidati dall'utente, con purge opzionale dei file già convertiti
//! - Proiezioni in sola lettura per la UI (`snapshot`, `get`, `eligible_for_conversion`)
//! - Notifiche di cambiamento via `broadcast` (`JobEvent`)
//! - Transizioni di stato per il worker pool (`claim`, `settle`)
//!
//! ## Concorrenza:
//! - `RwLock` sulla mappa: write lock solo per add/remove
//! - Un `Mutex` per item: aggiornamenti di item diversi non si bloccano a vicenda
//! - Ogni scrittura del worker verifica l'`id` dell'item: un item rimosso
//!   (o rimosso e ri-aggiunto) non viene mai resuscitato

use crate::job::{JobFailure, JobItem, JobState};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, warn};

const EVENT_CAPACITY: usize = 1024;

/// What `add` does with items that already converted successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddPolicy {
    /// Drop `Success` items before inserting, so a fresh add starts a clean list
    #[default]
    PurgeSucceeded,
    /// Leave every existing item in place
    KeepSucceeded,
}

/// Change notification for subscribers (UI, progress bar)
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Added(Vec<PathBuf>),
    Removed(Vec<PathBuf>),
    StateChanged(JobItem),
}

/// Terminal outcome written back by a worker
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Success { source_size: u64, output_size: u64 },
    Fail(JobFailure),
}

type Entry = Arc<Mutex<JobItem>>;

/// Ordered, deduplicated job collection
pub struct JobList {
    items: RwLock<BTreeMap<PathBuf, Entry>>,
    next_id: AtomicU64,
    events: broadcast::Sender<JobEvent>,
}

impl Default for JobList {
    fn default() -> Self {
        Self::new()
    }
}

impl JobList {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            items: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            events,
        }
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Add paths as `Unstarted` items. Returns how many were inserted.
    pub async fn add<I>(&self, paths: I, policy: AddPolicy) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let paths: BTreeSet<PathBuf> = paths.into_iter().collect();
        let mut sizes = Vec::with_capacity(paths.len());
        for path in paths {
            let size = tokio::fs::metadata(&path).await.ok().map(|m| m.len());
            sizes.push((path, size));
        }

        let mut items = self.items.write().await;

        let mut purged = Vec::new();
        if policy == AddPolicy::PurgeSucceeded {
            for (path, entry) in items.iter() {
                if entry.lock().await.state == JobState::Success {
                    purged.push(path.clone());
                }
            }
            for path in &purged {
                items.remove(path);
            }
        }

        let mut added = Vec::new();
        for (path, size) in sizes {
            if items.contains_key(&path) {
                continue;
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let mut item = JobItem::new(id, path.clone());
            item.source_size_bytes = size;
            items.insert(path.clone(), Arc::new(Mutex::new(item)));
            added.push(path);
        }
        drop(items);

        if !purged.is_empty() {
            debug!("Purged {} converted items before add", purged.len());
            self.emit(JobEvent::Removed(purged));
        }
        let count = added.len();
        if count > 0 {
            debug!("Added {} items to job list", count);
            self.emit(JobEvent::Added(added));
        }
        count
    }

    /// Remove items regardless of state. Returns how many were removed.
    pub async fn remove<I>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut items = self.items.write().await;
        let removed: Vec<PathBuf> = paths
            .into_iter()
            .filter(|path| items.remove(path).is_some())
            .collect();
        drop(items);

        let count = removed.len();
        if count > 0 {
            debug!("Removed {} items from job list", count);
            self.emit(JobEvent::Removed(removed));
        }
        count
    }

    /// Items that are candidates for (re-)conversion: everything not in `Success`
    pub async fn eligible_for_conversion(&self) -> Vec<JobItem> {
        self.snapshot()
            .await
            .into_iter()
            .filter(|item| item.state != JobState::Success)
            .collect()
    }

    /// Copy of every item, in sorted order
    pub async fn snapshot(&self) -> Vec<JobItem> {
        let items = self.items.read().await;
        let mut out = Vec::with_capacity(items.len());
        for entry in items.values() {
            out.push(entry.lock().await.clone());
        }
        out
    }

    pub async fn get(&self, source_path: &Path) -> Option<JobItem> {
        let items = self.items.read().await;
        match items.get(source_path) {
            Some(entry) => Some(entry.lock().await.clone()),
            None => None,
        }
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Run `f` on the item if it still exists with the same id, then publish its new state
    async fn update<F>(&self, id: u64, source_path: &Path, f: F) -> Option<JobItem>
    where
        F: FnOnce(&mut JobItem) -> bool,
    {
        let items = self.items.read().await;
        let entry = items.get(source_path)?;
        let mut item = entry.lock().await;
        if item.id != id {
            return None;
        }
        let previous = item.state;
        if !f(&mut item) {
            return None;
        }
        let snapshot = item.clone();
        drop(item);
        drop(items);

        if snapshot.state != previous {
            self.emit(JobEvent::StateChanged(snapshot.clone()));
        }
        Some(snapshot)
    }

    /// `Unstarted | Fail -> Processing`. Stale results of a previous attempt are cleared.
    pub(crate) async fn claim(&self, id: u64, source_path: &Path) -> Option<JobItem> {
        self.update(id, source_path, |item| {
            if item.transition(JobState::Processing).is_err() {
                return false;
            }
            item.output_size_bytes = None;
            item.last_error = None;
            true
        })
        .await
    }

    /// Refresh the source size from the bytes the worker actually read
    pub(crate) async fn record_source_size(&self, id: u64, source_path: &Path, size: u64) -> bool {
        self.update(id, source_path, |item| {
            item.source_size_bytes = Some(size);
            true
        })
        .await
        .is_some()
    }

    /// `Processing -> Success | Fail`. `None` when the item was removed in the meantime.
    pub(crate) async fn settle(
        &self,
        id: u64,
        source_path: &Path,
        settlement: Settlement,
    ) -> Option<JobItem> {
        let result = self
            .update(id, source_path, |item| match &settlement {
                Settlement::Success {
                    source_size,
                    output_size,
                } => {
                    if item.transition(JobState::Success).is_err() {
                        return false;
                    }
                    item.source_size_bytes = Some(*source_size);
                    item.output_size_bytes = Some(*output_size);
                    true
                }
                Settlement::Fail(failure) => {
                    if item.transition(JobState::Fail).is_err() {
                        return false;
                    }
                    item.last_error = Some(failure.clone());
                    true
                }
            })
            .await;

        if result.is_none() {
            warn!(
                "Discarding result for {}: item no longer in the job list",
                source_path.display()
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::FailureKind;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    async fn force_state(list: &JobList, path: &str, state: JobState) {
        let path = PathBuf::from(path);
        let item = list.get(&path).await.unwrap();
        list.claim(item.id, &path).await.unwrap();
        let settlement = match state {
            JobState::Success => Settlement::Success {
                source_size: 10,
                output_size: 5,
            },
            _ => Settlement::Fail(JobFailure::new(FailureKind::Encode, "boom")),
        };
        list.settle(item.id, &path, settlement).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_same_path_twice_in_one_call() {
        let list = JobList::new();
        let added = list.add(paths(&["c.png", "c.png"]), AddPolicy::default()).await;
        assert_eq!(added, 1);
        assert_eq!(list.len().await, 1);
    }

    #[tokio::test]
    async fn test_add_is_idempotent_across_calls() {
        let list = JobList::new();
        list.add(paths(&["a.png"]), AddPolicy::default()).await;
        let added = list.add(paths(&["a.png"]), AddPolicy::default()).await;
        assert_eq!(added, 0);
        assert_eq!(list.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_is_sorted_by_path() {
        let list = JobList::new();
        list.add(paths(&["/z/b.png", "/a/c.png"]), AddPolicy::default()).await;
        list.add(paths(&["/m/a.png"]), AddPolicy::default()).await;

        let order: Vec<PathBuf> = list.snapshot().await.into_iter().map(|i| i.source_path).collect();
        assert_eq!(order, paths(&["/a/c.png", "/m/a.png", "/z/b.png"]));
    }

    #[tokio::test]
    async fn test_readd_purges_success_and_inserts_fresh_item() {
        let list = JobList::new();
        list.add(paths(&["c.png"]), AddPolicy::default()).await;
        force_state(&list, "c.png", JobState::Success).await;
        let old = list.get(&PathBuf::from("c.png")).await.unwrap();

        let added = list.add(paths(&["c.png"]), AddPolicy::PurgeSucceeded).await;
        assert_eq!(added, 1);

        let fresh = list.get(&PathBuf::from("c.png")).await.unwrap();
        assert_eq!(fresh.state, JobState::Unstarted);
        assert_ne!(fresh.id, old.id);
        assert_eq!(fresh.output_size_bytes, None);
    }

    #[tokio::test]
    async fn test_purge_keeps_fail_and_processing() {
        let list = JobList::new();
        list.add(paths(&["ok.png", "bad.png", "busy.png"]), AddPolicy::default()).await;
        force_state(&list, "ok.png", JobState::Success).await;
        force_state(&list, "bad.png", JobState::Fail).await;
        let busy = list.get(&PathBuf::from("busy.png")).await.unwrap();
        list.claim(busy.id, &busy.source_path).await.unwrap();

        list.add(paths(&["new.png"]), AddPolicy::PurgeSucceeded).await;

        let names: Vec<PathBuf> = list.snapshot().await.into_iter().map(|i| i.source_path).collect();
        assert_eq!(names, paths(&["bad.png", "busy.png", "new.png"]));
    }

    #[tokio::test]
    async fn test_keep_policy_leaves_success_items() {
        let list = JobList::new();
        list.add(paths(&["c.png"]), AddPolicy::default()).await;
        force_state(&list, "c.png", JobState::Success).await;

        let added = list.add(paths(&["c.png"]), AddPolicy::KeepSucceeded).await;
        assert_eq!(added, 0);
        assert_eq!(
            list.get(&PathBuf::from("c.png")).await.unwrap().state,
            JobState::Success
        );
    }

    #[tokio::test]
    async fn test_eligible_excludes_success_only() {
        let list = JobList::new();
        list.add(paths(&["a.png", "b.png", "c.png"]), AddPolicy::default()).await;
        force_state(&list, "a.png", JobState::Success).await;
        force_state(&list, "b.png", JobState::Fail).await;

        let eligible: Vec<PathBuf> = list
            .eligible_for_conversion()
            .await
            .into_iter()
            .map(|i| i.source_path)
            .collect();
        assert_eq!(eligible, paths(&["b.png", "c.png"]));
    }

    #[tokio::test]
    async fn test_remove_any_state() {
        let list = JobList::new();
        list.add(paths(&["a.png", "b.png"]), AddPolicy::default()).await;
        let a = list.get(&PathBuf::from("a.png")).await.unwrap();
        list.claim(a.id, &a.source_path).await.unwrap();

        let removed = list.remove(paths(&["a.png", "missing.png"])).await;
        assert_eq!(removed, 1);
        assert_eq!(list.len().await, 1);
    }

    #[tokio::test]
    async fn test_settle_after_remove_is_discarded() {
        let list = JobList::new();
        list.add(paths(&["a.png"]), AddPolicy::default()).await;
        let a = list.get(&PathBuf::from("a.png")).await.unwrap();
        list.claim(a.id, &a.source_path).await.unwrap();
        list.remove(paths(&["a.png"])).await;

        let settled = list
            .settle(a.id, &a.source_path, Settlement::Success { source_size: 10, output_size: 4 })
            .await;
        assert!(settled.is_none());
        assert!(list.is_empty().await);
    }

    #[tokio::test]
    async fn test_settle_ignores_readded_item_with_new_id() {
        let list = JobList::new();
        list.add(paths(&["a.png"]), AddPolicy::default()).await;
        let old = list.get(&PathBuf::from("a.png")).await.unwrap();
        list.claim(old.id, &old.source_path).await.unwrap();
        list.remove(paths(&["a.png"])).await;
        list.add(paths(&["a.png"]), AddPolicy::default()).await;

        let settled = list
            .settle(old.id, &old.source_path, Settlement::Success { source_size: 10, output_size: 4 })
            .await;
        assert!(settled.is_none());
        assert_eq!(
            list.get(&PathBuf::from("a.png")).await.unwrap().state,
            JobState::Unstarted
        );
    }

    #[tokio::test]
    async fn test_claim_only_from_unstarted_or_fail() {
        let list = JobList::new();
        list.add(paths(&["a.png"]), AddPolicy::default()).await;
        let a = list.get(&PathBuf::from("a.png")).await.unwrap();

        assert!(list.claim(a.id, &a.source_path).await.is_some());
        assert!(list.claim(a.id, &a.source_path).await.is_none());

        list.settle(
            a.id,
            &a.source_path,
            Settlement::Fail(JobFailure::new(FailureKind::SourceRead, "gone")),
        )
        .await
        .unwrap();

        let retried = list.claim(a.id, &a.source_path).await.unwrap();
        assert_eq!(retried.state, JobState::Processing);
        assert_eq!(retried.last_error, None);
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let list = JobList::new();
        let mut rx = list.subscribe();

        list.add(paths(&["a.png"]), AddPolicy::default()).await;
        assert_eq!(rx.recv().await.unwrap(), JobEvent::Added(paths(&["a.png"])));

        let a = list.get(&PathBuf::from("a.png")).await.unwrap();
        list.claim(a.id, &a.source_path).await.unwrap();
        match rx.recv().await.unwrap() {
            JobEvent::StateChanged(item) => assert_eq!(item.state, JobState::Processing),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_source_size_read_on_add() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.png");
        tokio::fs::write(&path, vec![0u8; 321]).await.unwrap();

        let list = JobList::new();
        list.add(vec![path.clone(), PathBuf::from("/nope/b.png")], AddPolicy::default()).await;

        assert_eq!(list.get(&path).await.unwrap().source_size_bytes, Some(321));
        assert_eq!(
            list.get(&PathBuf::from("/nope/b.png")).await.unwrap().source_size_bytes,
            None
        );
    }
}
