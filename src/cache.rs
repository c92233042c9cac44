//! Local task cache
//!
//! Optimistic, client-local mirror of the task board, keyed by task id and
//! backed by an embedded sled tree with JSON values. The cache owns a task
//! until an authoritative chain read replaces it (`replace_all`); everything
//! else is plain CRUD the UI layer reads from.

use crate::error::{MarketplaceError, Result};
use crate::task::{Task, TaskStatus, WorkSubmission};
use chrono::Utc;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

const TASKS_TREE: &str = "tasks";

/// Sled-backed task store.
pub struct TaskCache {
    tree: sled::Tree,
    // Keep the Db alive for as long as the tree is used.
    _db: sled::Db,
}

/// Fields supplied when creating a task; id, status, and creation time are
/// assigned by the cache.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub category: crate::task::Category,
    pub reward: f64,
    pub poster_address: String,
    pub deadline: Option<u64>,
}

impl TaskCache {
    /// Open (or create) the cache at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        let tree = db.open_tree(TASKS_TREE)?;
        Ok(Self { tree, _db: db })
    }

    /// All cached tasks, newest first.
    pub fn load_all(&self) -> Result<Vec<Task>> {
        let mut tasks = Vec::with_capacity(self.tree.len());
        for entry in self.tree.iter() {
            let (_, value) = entry?;
            tasks.push(decode_task(&value)?);
        }
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    /// Fetch a single task by id.
    pub fn get(&self, id: &str) -> Result<Option<Task>> {
        match self.tree.get(id.as_bytes())? {
            Some(value) => Ok(Some(decode_task(&value)?)),
            None => Ok(None),
        }
    }

    /// Insert a freshly posted task. Assigns a UUID id, `Open` status, and
    /// the creation timestamp.
    pub fn add(&self, new: NewTask) -> Result<Task> {
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            description: new.description,
            category: new.category,
            reward: new.reward,
            poster_address: new.poster_address,
            worker_address: None,
            deadline: new.deadline,
            status: TaskStatus::Open,
            created_at: Utc::now(),
            transaction_hash: None,
            submissions: vec![],
        };
        self.put(&task)?;
        debug!(task_id = %task.id, title = %task.title, "task cached");
        Ok(task)
    }

    /// Mark a task as claimed by `worker`.
    pub fn assign(&self, id: &str, worker: &str) -> Result<Task> {
        self.update(id, |task| {
            task.advance(TaskStatus::Assigned)?;
            task.worker_address = Some(worker.to_string());
            Ok(())
        })
    }

    /// Append a work submission to a task.
    pub fn record_submission(&self, id: &str, worker: &str, link: &str) -> Result<Task> {
        self.update(id, |task| {
            task.submissions.push(WorkSubmission {
                worker: worker.to_string(),
                link: link.to_string(),
            });
            Ok(())
        })
    }

    /// Close a task, recording the settlement transaction hash.
    pub fn complete(&self, id: &str, tx_hash: &str) -> Result<Task> {
        self.update(id, |task| {
            task.advance(TaskStatus::Completed)?;
            task.transaction_hash = Some(tx_hash.to_string());
            Ok(())
        })
    }

    /// Replace the whole cache with an authoritative set of tasks from the
    /// ledger. Local-only state is discarded; the chain read wins.
    pub fn replace_all(&self, tasks: &[Task]) -> Result<()> {
        self.tree.clear()?;
        for task in tasks {
            self.put(task)?;
        }
        self.tree.flush()?;
        debug!(count = tasks.len(), "cache replaced from chain read");
        Ok(())
    }

    /// Drop every cached task.
    pub fn clear(&self) -> Result<()> {
        self.tree.clear()?;
        self.tree.flush()?;
        Ok(())
    }

    fn put(&self, task: &Task) -> Result<()> {
        let value = serde_json::to_vec(task)
            .map_err(|e| MarketplaceError::Decode(format!("task encode: {e}")))?;
        self.tree.insert(task.id.as_bytes(), value)?;
        self.tree.flush()?;
        Ok(())
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut Task) -> Result<()>) -> Result<Task> {
        let mut task = self
            .get(id)?
            .ok_or_else(|| MarketplaceError::TaskNotFound(id.to_string()))?;
        f(&mut task)?;
        self.put(&task)?;
        Ok(task)
    }
}

fn decode_task(bytes: &[u8]) -> Result<Task> {
    serde_json::from_slice(bytes).map_err(|e| MarketplaceError::Decode(format!("task decode: {e}")))
}
