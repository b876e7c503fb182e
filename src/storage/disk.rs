use crate::core::{DqlError, Task, TaskKey};
use crate::storage::graph::GraphView;
use crate::storage::wal::{Operation, WalManager};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

const SNAPSHOT_FILE: &str = "tasks.db";
const WAL_FILE: &str = "tasks.wal";
pub const DEFAULT_SNAPSHOT_THRESHOLD: usize = 100;

struct StoreState {
    tasks: BTreeMap<TaskKey, Task>,
    by_object_id: HashMap<String, TaskKey>,
    wal: WalManager,
    /// Operations logged since the last snapshot
    operations_since_snapshot: usize,
    closed: bool,
}

/// Durable task store of one namespace.
///
/// All writers go through a single lock, so check-then-write sequences
/// (duplicate and cycle checks) are atomic with respect to other writers.
/// The graph view is changed while that lock is held.
pub struct TaskStore {
    data_dir: PathBuf,
    snapshot_threshold: usize,
    state: RwLock<StoreState>,
    graph: GraphView,
}

impl TaskStore {
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DqlError> {
        Self::open_with_threshold(data_dir, DEFAULT_SNAPSHOT_THRESHOLD)
    }

    /// Load the snapshot, replay the log on top of it and rebuild indexes.
    pub fn open_with_threshold<P: AsRef<Path>>(
        data_dir: P,
        snapshot_threshold: usize,
    ) -> Result<Self, DqlError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;

        let mut tasks = BTreeMap::new();
        for task in Self::load_snapshot(&data_dir)? {
            tasks.insert(task.key(), task);
        }

        let wal = WalManager::open(data_dir.join(WAL_FILE))?;
        let logs = wal.read_all()?;
        let replayed = logs.len();
        for entry in logs {
            Self::apply(&mut tasks, entry.operation);
        }

        let by_object_id = tasks
            .iter()
            .map(|(key, task)| (task.object_id.clone(), key.clone()))
            .collect();
        let graph = GraphView::from_tasks(tasks.values());

        tracing::info!(
            path = %data_dir.display(),
            tasks = tasks.len(),
            replayed,
            "opened task store"
        );

        Ok(Self {
            data_dir,
            snapshot_threshold: snapshot_threshold.max(1),
            state: RwLock::new(StoreState {
                tasks,
                by_object_id,
                wal,
                operations_since_snapshot: replayed,
                closed: false,
            }),
            graph,
        })
    }

    fn load_snapshot(data_dir: &Path) -> Result<Vec<Task>, DqlError> {
        let path = data_dir.join(SNAPSHOT_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read(path)?;
        Ok(bincode::deserialize(&data)?)
    }

    fn apply(tasks: &mut BTreeMap<TaskKey, Task>, operation: Operation) {
        match operation {
            Operation::Put(task) => {
                tasks.insert(task.key(), task);
            }
            Operation::Delete { key } => {
                tasks.remove(&key);
            }
            Operation::Migrate { old, task } => {
                tasks.remove(&old);
                tasks.insert(task.key(), task);
            }
            Operation::Checkpoint { .. } => {}
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub const fn graph(&self) -> &GraphView {
        &self.graph
    }

    /// Write a final snapshot and refuse further operations.
    pub fn close(&self) -> Result<(), DqlError> {
        let mut state = self.state.write();
        if state.closed {
            return Ok(());
        }
        self.checkpoint(&mut state)?;
        state.wal.sync()?;
        state.closed = true;
        tracing::info!(path = %self.data_dir.display(), "closed task store");
        Ok(())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    fn ensure_open(state: &StoreState) -> Result<(), DqlError> {
        if state.closed {
            Err(DqlError::Store("store is closed".to_string()))
        } else {
            Ok(())
        }
    }

    // ---------- reads ----------

    /// Zero or one task.
    pub fn get_by_object_id(&self, object_id: &str) -> Result<Vec<Task>, DqlError> {
        let state = self.state.read();
        Self::ensure_open(&state)?;
        Ok(state
            .by_object_id
            .get(object_id)
            .and_then(|key| state.tasks.get(key))
            .cloned()
            .into_iter()
            .collect())
    }

    pub fn get(&self, dag_id: &str, id: &str) -> Result<Option<Task>, DqlError> {
        let state = self.state.read();
        Self::ensure_open(&state)?;
        Ok(state.tasks.get(&TaskKey::new(dag_id, id)).cloned())
    }

    /// All tasks of one DAG, ordered by id.
    pub fn get_by_namespace(&self, dag_id: &str) -> Result<Vec<Task>, DqlError> {
        let state = self.state.read();
        Self::ensure_open(&state)?;
        let start = TaskKey::new(dag_id, "");
        Ok(state
            .tasks
            .range(start..)
            .take_while(|(key, _)| key.dag_id == dag_id)
            .map(|(_, task)| task.clone())
            .collect())
    }

    /// Every task, ordered by `(dag_id, id)`.
    pub fn list_all(&self) -> Result<Vec<Task>, DqlError> {
        let state = self.state.read();
        Self::ensure_open(&state)?;
        Ok(state.tasks.values().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.state.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ---------- writes ----------

    /// Insert a new task: rejects duplicate keys and object ids, and
    /// dependency sets that would close a cycle.
    pub fn insert(&self, task: Task) -> Result<(), DqlError> {
        let mut state = self.state.write();
        Self::ensure_open(&state)?;

        let key = task.key();
        if state.tasks.contains_key(&key) {
            return Err(DqlError::Validation(format!(
                "task '{}' already exists in DAG '{}'",
                task.id, task.dag_id
            )));
        }
        if state.by_object_id.contains_key(&task.object_id) {
            return Err(DqlError::Validation(format!(
                "object id '{}' already in use",
                task.object_id
            )));
        }
        Self::check_cycle(&state.tasks, &task, None)?;

        self.write_put(&mut state, task)
    }

    /// Overwrite the task at its key without a cycle check. The key must
    /// still hold the same object id, otherwise `NotFound`.
    pub fn save(&self, task: Task) -> Result<(), DqlError> {
        let mut state = self.state.write();
        Self::ensure_open(&state)?;
        Self::ensure_current(&state, &task)?;
        self.write_put(&mut state, task)
    }

    /// Like [`save`](Self::save), failing with `CycleDetected` if the new
    /// dependencies would close a cycle.
    pub fn save_cycle_checked(&self, task: Task) -> Result<(), DqlError> {
        let mut state = self.state.write();
        Self::ensure_open(&state)?;
        Self::ensure_current(&state, &task)?;
        Self::check_cycle(&state.tasks, &task, None)?;
        self.write_put(&mut state, task)
    }

    /// The stored record at `task`'s key must be the same record.
    fn ensure_current(state: &StoreState, task: &Task) -> Result<(), DqlError> {
        let key = task.key();
        match state.tasks.get(&key) {
            Some(stored) if stored.object_id == task.object_id => Ok(()),
            _ => Err(DqlError::NotFound(format!("task '{key}'"))),
        }
    }

    pub fn delete(&self, dag_id: &str, id: &str) -> Result<(), DqlError> {
        let mut state = self.state.write();
        Self::ensure_open(&state)?;

        let key = TaskKey::new(dag_id, id);
        if !state.tasks.contains_key(&key) {
            return Err(DqlError::NotFound(format!("task '{key}'")));
        }

        state.wal.append(Operation::Delete { key: key.clone() })?;
        if let Some(task) = state.tasks.remove(&key) {
            state.by_object_id.remove(&task.object_id);
        }
        self.graph.remove(dag_id, id);
        self.after_write(&mut state)
    }

    /// Move `old` to the key of `new` as one logged operation.
    pub fn migrate_key(&self, old: &Task, new: Task) -> Result<(), DqlError> {
        let mut state = self.state.write();
        Self::ensure_open(&state)?;

        let old_key = old.key();
        let new_key = new.key();
        Self::ensure_current(&state, old)?;
        if new_key != old_key && state.tasks.contains_key(&new_key) {
            return Err(DqlError::Validation(format!(
                "task '{}' already exists in DAG '{}'",
                new.id, new.dag_id
            )));
        }
        Self::check_cycle(&state.tasks, &new, Some(&old_key))?;

        state.wal.append(Operation::Migrate {
            old: old_key.clone(),
            task: new.clone(),
        })?;
        if let Some(previous) = state.tasks.remove(&old_key) {
            state.by_object_id.remove(&previous.object_id);
        }
        state.by_object_id.insert(new.object_id.clone(), new_key.clone());
        self.graph.remove(&old_key.dag_id, &old_key.id);
        self.graph.update(&new);
        state.tasks.insert(new_key, new);
        self.after_write(&mut state)
    }

    /// Log and apply a put. Callers have checked that the key is free or
    /// holds the same object id. The graph view changes under the same lock.
    fn write_put(&self, state: &mut StoreState, task: Task) -> Result<(), DqlError> {
        state.wal.append(Operation::Put(task.clone()))?;

        let key = task.key();
        self.graph.update(&task);
        state.by_object_id.insert(task.object_id.clone(), key.clone());
        state.tasks.insert(key, task);
        self.after_write(state)
    }

    fn after_write(&self, state: &mut StoreState) -> Result<(), DqlError> {
        state.operations_since_snapshot += 1;
        if state.operations_since_snapshot >= self.snapshot_threshold {
            self.checkpoint(state)?;
        }
        Ok(())
    }

    /// Write the snapshot, then truncate the log it covers.
    fn checkpoint(&self, state: &mut StoreState) -> Result<(), DqlError> {
        let snapshot: Vec<&Task> = state.tasks.values().collect();
        let encoded = bincode::serialize(&snapshot)?;

        // Write-then-rename so a crash never leaves a half-written snapshot
        let tmp = self.data_dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, self.data_dir.join(SNAPSHOT_FILE))?;

        state.wal.checkpoint()?;
        state.operations_since_snapshot = 0;
        tracing::debug!(path = %self.data_dir.display(), tasks = state.tasks.len(), "checkpoint written");
        Ok(())
    }

    /// Fails with `CycleDetected` if `candidate`, placed into its DAG in
    /// place of any task with the same key (and with `removed` taken out),
    /// could reach itself through dependency edges.
    fn check_cycle(
        tasks: &BTreeMap<TaskKey, Task>,
        candidate: &Task,
        removed: Option<&TaskKey>,
    ) -> Result<(), DqlError> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = candidate.dependencies.iter().map(String::as_str).collect();

        while let Some(id) = stack.pop() {
            if id == candidate.id {
                return Err(DqlError::CycleDetected {
                    dag_id: candidate.dag_id.clone(),
                    id: candidate.id.clone(),
                });
            }
            if !visited.insert(id) {
                continue;
            }
            let key = TaskKey::new(candidate.dag_id.as_str(), id);
            if removed == Some(&key) {
                continue;
            }
            if let Some(task) = tasks.get(&key) {
                stack.extend(task.dependencies.iter().map(String::as_str));
            }
        }
        Ok(())
    }
}

impl Drop for TaskStore {
    fn drop(&mut self) {
        if !self.is_closed()
            && let Err(e) = self.close()
        {
            tracing::warn!(path = %self.data_dir.display(), error = %e, "failed to close task store");
        }
    }
}
