//! Reconciliation store: the single owner of the ordered task collection.
//!
//! Snapshot loads are destructive full replacements (the pull endpoint is
//! the only authoritative source of membership and ordering); push batches
//! are field-level merges that never touch client-local UI state. Nothing
//! else in the crate mutates the collection.

use chrono::Utc;
use downdeck_core::wire::{TaskPage, TaskPatch};
use downdeck_core::{DownloadStatus, Task, UNKNOWN_SIZE};
use tracing::debug;

/// A task plus purely client-local state. Client-local fields survive
/// incremental merges, are reset by snapshot loads, and are never sent back
/// to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewTask {
    pub task: Task,
    /// Whether the per-worker progress grid is expanded in the UI.
    pub show_grid: bool,
}

impl ViewTask {
    fn fresh(task: Task) -> Self {
        Self {
            task,
            show_grid: false,
        }
    }
}

/// Handle for one in-flight snapshot request. Tokens are monotonically
/// increasing; a response presented with anything but the newest token is
/// stale and gets discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotToken(u64);

#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<ViewTask>,
    total: u64,
    issued_seq: u64,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks in snapshot order. Optimistic inserts sit at the front until
    /// the next snapshot re-establishes server ordering.
    pub fn tasks(&self) -> &[ViewTask] {
        &self.tasks
    }

    /// Server-side total across all pages, adjusted by optimistic inserts
    /// and removals between snapshots.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn get(&self, id: &str) -> Option<&ViewTask> {
        self.tasks.iter().find(|view| view.task.id == id)
    }

    /// Toggle the client-local grid expansion for one task. Returns false
    /// when the id is unknown.
    pub fn set_show_grid(&mut self, id: &str, show: bool) -> bool {
        match self.tasks.iter_mut().find(|view| view.task.id == id) {
            Some(view) => {
                view.show_grid = show;
                true
            }
            None => false,
        }
    }

    /// Register a new snapshot request. The returned token must be handed
    /// back to [`load_snapshot`](Self::load_snapshot) with the response.
    pub fn begin_snapshot(&mut self) -> SnapshotToken {
        self.issued_seq += 1;
        SnapshotToken(self.issued_seq)
    }

    /// Replace the whole collection with a fresh snapshot page.
    ///
    /// Every element gets fresh client-local defaults; a snapshot resets
    /// UI state on purpose, so the pull endpoint stays fully authoritative.
    /// Returns false (and changes nothing) when a newer request was issued
    /// after `token`, i.e. the response is stale.
    pub fn load_snapshot(&mut self, token: SnapshotToken, page: TaskPage) -> bool {
        if token.0 != self.issued_seq {
            debug!(
                event = "snapshot_stale",
                token = token.0,
                newest = self.issued_seq
            );
            return false;
        }
        self.tasks = page.content.into_iter().map(ViewTask::fresh).collect();
        self.total = page.total_elements;
        true
    }

    /// Merge an ordered push batch into the collection, field by field.
    ///
    /// Patches for unknown ids are silently dropped; they will arrive via
    /// the next snapshot instead. Later patches for the same id in one
    /// batch win. Element order never changes.
    pub fn apply_incremental(&mut self, batch: Vec<TaskPatch>) {
        for patch in batch {
            match self
                .tasks
                .iter_mut()
                .find(|view| view.task.id == patch.id)
            {
                Some(view) => merge_patch(&mut view.task, patch),
                None => debug!(event = "patch_dropped", id = %patch.id),
            }
        }
    }

    /// Prepend a placeholder for a freshly accepted create request so the
    /// UI reflects it immediately. The next snapshot or push batch carrying
    /// the same id supersedes the placeholder. The store never rolls this
    /// back on its own; a caller whose create request ultimately fails
    /// reverts with [`remove`](Self::remove).
    pub fn insert_optimistic(&mut self, task: Task) {
        self.tasks.insert(0, ViewTask::fresh(task));
        self.total += 1;
    }

    /// Drop a task after a confirmed deletion. Convenience only: the
    /// authoritative removal is re-derived by the next snapshot load.
    /// Returns false when the id is unknown.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|view| view.task.id != id);
        if self.tasks.len() == before {
            return false;
        }
        self.total = self.total.saturating_sub(1);
        true
    }
}

/// The placeholder shape for an optimistic insert: status IDLE, unknown
/// size, nothing downloaded yet.
pub fn placeholder_task(id: impl Into<String>, url: impl Into<String>) -> Task {
    Task {
        id: id.into(),
        file_name: None,
        url: url.into(),
        status: DownloadStatus::Idle,
        total_size: UNKNOWN_SIZE,
        downloaded: 0,
        speed: 0,
        created_time: Some(Utc::now()),
        support_range: false,
        chunks: None,
        extra: Default::default(),
    }
}

fn merge_patch(task: &mut Task, patch: TaskPatch) {
    if let Some(file_name) = patch.file_name {
        task.file_name = Some(file_name);
    }
    if let Some(url) = patch.url {
        task.url = url;
    }
    if let Some(status) = patch.status {
        task.status = status;
    }
    if let Some(total_size) = patch.total_size {
        task.total_size = total_size;
    }
    if let Some(downloaded) = patch.downloaded {
        task.downloaded = downloaded;
    }
    if let Some(speed) = patch.speed {
        task.speed = speed;
    }
    if let Some(created_time) = patch.created_time {
        task.created_time = Some(created_time);
    }
    if let Some(support_range) = patch.support_range {
        task.support_range = support_range;
    }
    if let Some(chunks) = patch.chunks {
        // Chunk tables are replaced wholesale, never merged per entry.
        task.chunks = Some(chunks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use downdeck_core::Chunk;

    fn task(id: &str, downloaded: u64) -> Task {
        Task {
            downloaded,
            total_size: 1000,
            status: DownloadStatus::Downloading,
            ..placeholder_task(id, format!("http://example.com/{id}"))
        }
    }

    fn page(tasks: Vec<Task>, total: u64) -> TaskPage {
        TaskPage {
            content: tasks,
            total_elements: total,
        }
    }

    fn patch(id: &str) -> TaskPatch {
        TaskPatch {
            id: id.to_string(),
            ..TaskPatch::default()
        }
    }

    #[test]
    fn snapshot_replaces_membership_and_order() {
        let mut store = TaskStore::new();
        let token = store.begin_snapshot();
        store.load_snapshot(token, page(vec![task("a", 1), task("b", 2)], 2));

        let token = store.begin_snapshot();
        assert!(store.load_snapshot(token, page(vec![task("c", 3), task("a", 9)], 5)));
        let ids: Vec<&str> = store.tasks().iter().map(|v| v.task.id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
        assert_eq!(store.total(), 5);
        assert_eq!(store.get("a").unwrap().task.downloaded, 9);
        assert!(store.get("b").is_none());
    }

    #[test]
    fn snapshot_authority_overrides_prior_incremental_state() {
        let mut store = TaskStore::new();
        let token = store.begin_snapshot();
        store.load_snapshot(token, page(vec![task("a", 1)], 1));
        store.apply_incremental(vec![TaskPatch {
            downloaded: Some(999),
            speed: Some(77),
            ..patch("a")
        }]);

        let token = store.begin_snapshot();
        store.load_snapshot(token, page(vec![task("a", 42)], 1));
        let merged = &store.get("a").unwrap().task;
        assert_eq!(merged.downloaded, 42);
        assert_eq!(merged.speed, 0);
    }

    #[test]
    fn stale_snapshot_response_is_discarded() {
        let mut store = TaskStore::new();
        let stale = store.begin_snapshot();
        let newest = store.begin_snapshot();

        assert!(!store.load_snapshot(stale, page(vec![task("old", 0)], 1)));
        assert!(store.tasks().is_empty(), "stale response changed nothing");

        assert!(store.load_snapshot(newest, page(vec![task("new", 0)], 1)));
        assert_eq!(store.tasks()[0].task.id, "new");
    }

    #[test]
    fn incremental_merge_touches_only_present_fields() {
        let mut store = TaskStore::new();
        let token = store.begin_snapshot();
        store.load_snapshot(token, page(vec![task("a", 100)], 1));

        store.apply_incremental(vec![TaskPatch {
            downloaded: Some(250),
            ..patch("a")
        }]);
        let merged = &store.get("a").unwrap().task;
        assert_eq!(merged.downloaded, 250);
        assert_eq!(merged.total_size, 1000, "absent field untouched");
        assert_eq!(merged.status, DownloadStatus::Downloading);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut store = TaskStore::new();
        let token = store.begin_snapshot();
        store.load_snapshot(token, page(vec![task("a", 0), task("b", 0)], 2));

        let batch = vec![
            TaskPatch {
                downloaded: Some(10),
                status: Some(DownloadStatus::Downloading),
                ..patch("a")
            },
            TaskPatch {
                status: Some(DownloadStatus::Finished),
                ..patch("b")
            },
        ];
        store.apply_incremental(batch.clone());
        let once: Vec<ViewTask> = store.tasks().to_vec();
        store.apply_incremental(batch);
        assert_eq!(store.tasks(), once.as_slice());
    }

    #[test]
    fn later_patch_for_same_id_wins_within_a_batch() {
        let mut store = TaskStore::new();
        let token = store.begin_snapshot();
        store.load_snapshot(token, page(vec![task("a", 0)], 1));

        store.apply_incremental(vec![
            TaskPatch {
                downloaded: Some(10),
                ..patch("a")
            },
            TaskPatch {
                downloaded: Some(20),
                ..patch("a")
            },
        ]);
        assert_eq!(store.get("a").unwrap().task.downloaded, 20);
    }

    #[test]
    fn unknown_id_patch_is_silently_dropped() {
        let mut store = TaskStore::new();
        let token = store.begin_snapshot();
        store.load_snapshot(token, page(vec![task("a", 0)], 1));

        store.apply_incremental(vec![TaskPatch {
            downloaded: Some(5),
            ..patch("ghost")
        }]);
        assert_eq!(store.tasks().len(), 1);
        assert!(store.get("ghost").is_none());
    }

    #[test]
    fn client_local_field_survives_incremental_merge() {
        let mut store = TaskStore::new();
        let token = store.begin_snapshot();
        store.load_snapshot(token, page(vec![task("a", 0)], 1));
        assert!(store.set_show_grid("a", true));

        store.apply_incremental(vec![TaskPatch {
            downloaded: Some(500),
            chunks: Some(vec![Chunk {
                id: None,
                start: 0,
                end: 999,
                current: 500,
                speed: 0,
                finished: false,
                color_index: 0,
            }]
            .into()),
            ..patch("a")
        }]);
        assert!(store.get("a").unwrap().show_grid);
        assert_eq!(store.get("a").unwrap().task.downloaded, 500);
    }

    #[test]
    fn snapshot_resets_client_local_state() {
        let mut store = TaskStore::new();
        let token = store.begin_snapshot();
        store.load_snapshot(token, page(vec![task("a", 0)], 1));
        store.set_show_grid("a", true);

        let token = store.begin_snapshot();
        store.load_snapshot(token, page(vec![task("a", 1)], 1));
        assert!(
            !store.get("a").unwrap().show_grid,
            "snapshot attaches fresh client-local defaults"
        );
    }

    #[test]
    fn optimistic_insert_prepends_and_counts() {
        let mut store = TaskStore::new();
        let token = store.begin_snapshot();
        store.load_snapshot(token, page(vec![task("a", 0)], 1));

        store.insert_optimistic(placeholder_task("new", "http://example.com/new"));
        assert_eq!(store.tasks()[0].task.id, "new");
        assert_eq!(store.tasks()[0].task.total_size, UNKNOWN_SIZE);
        assert_eq!(store.total(), 2);
    }

    #[test]
    fn optimistic_placeholder_is_superseded_by_matching_patch() {
        let mut store = TaskStore::new();
        store.insert_optimistic(placeholder_task("new", "http://example.com/new"));

        store.apply_incremental(vec![TaskPatch {
            file_name: Some("f.bin".to_string()),
            status: Some(DownloadStatus::Downloading),
            total_size: Some(4096),
            ..patch("new")
        }]);
        let confirmed = &store.get("new").unwrap().task;
        assert_eq!(confirmed.file_name.as_deref(), Some("f.bin"));
        assert_eq!(confirmed.total_size, 4096);
        assert_eq!(confirmed.url, "http://example.com/new");
    }

    #[test]
    fn remove_drops_task_and_decrements_total() {
        let mut store = TaskStore::new();
        let token = store.begin_snapshot();
        store.load_snapshot(token, page(vec![task("a", 0), task("b", 0)], 2));

        assert!(store.remove("a"));
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.total(), 1);
    }

    #[test]
    fn remove_is_a_noop_for_unknown_id() {
        let mut store = TaskStore::new();
        let token = store.begin_snapshot();
        store.load_snapshot(token, page(vec![task("a", 0)], 1));

        assert!(!store.remove("ghost"));
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.total(), 1);
    }

    #[test]
    fn chunk_table_is_replaced_wholesale() {
        let chunk = |start: u64| Chunk {
            id: None,
            start,
            end: start + 99,
            current: start,
            speed: 0,
            finished: false,
            color_index: 0,
        };
        let mut store = TaskStore::new();
        let token = store.begin_snapshot();
        let mut seeded = task("a", 0);
        seeded.chunks = Some(vec![chunk(0), chunk(100), chunk(200)].into());
        store.load_snapshot(token, page(vec![seeded], 1));

        store.apply_incremental(vec![TaskPatch {
            chunks: Some(vec![chunk(500)].into()),
            ..patch("a")
        }]);
        assert_eq!(store.get("a").unwrap().task.chunk_slice().len(), 1);
        assert_eq!(store.get("a").unwrap().task.chunk_slice()[0].start, 500);
    }
}
