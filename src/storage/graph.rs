//! In-memory dependency graph used for traversal.
//!
//! Edges point from a task to the tasks that depend on it, so walks go
//! downstream from a root.

use crate::core::Task;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Default)]
struct DagGraph {
    nodes: HashMap<String, Task>,
    /// id -> ids depending on it, in registration order
    dependents: HashMap<String, Vec<String>>,
}

impl DagGraph {
    fn unlink(&mut self, id: &str) {
        if let Some(old) = self.nodes.get(id) {
            for dep in &old.dependencies {
                if let Some(list) = self.dependents.get_mut(dep) {
                    list.retain(|d| d != id);
                }
            }
        }
    }

    fn upsert(&mut self, task: Task) {
        self.unlink(&task.id);
        for dep in &task.dependencies {
            let list = self.dependents.entry(dep.clone()).or_default();
            if !list.contains(&task.id) {
                list.push(task.id.clone());
            }
        }
        self.nodes.insert(task.id.clone(), task);
    }

    fn remove(&mut self, id: &str) {
        self.unlink(id);
        self.nodes.remove(id);
    }

    fn children(&self, id: &str) -> impl Iterator<Item = &String> {
        self.dependents.get(id).into_iter().flatten()
    }
}

#[derive(Default)]
pub struct GraphView {
    dags: RwLock<HashMap<String, DagGraph>>,
}

impl GraphView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let view = Self::new();
        {
            let mut dags = view.dags.write();
            for task in tasks {
                dags.entry(task.dag_id.clone()).or_default().upsert(task.clone());
            }
        }
        view
    }

    /// Replace the node and its outgoing edges.
    pub(crate) fn update(&self, task: &Task) {
        self.dags
            .write()
            .entry(task.dag_id.clone())
            .or_default()
            .upsert(task.clone());
    }

    pub(crate) fn remove(&self, dag_id: &str, id: &str) {
        let mut dags = self.dags.write();
        if let Some(dag) = dags.get_mut(dag_id) {
            dag.remove(id);
            if dag.nodes.is_empty() && dag.dependents.values().all(Vec::is_empty) {
                dags.remove(dag_id);
            }
        }
    }

    /// Pre-order walk from `root_id` through its dependents.
    #[must_use]
    pub fn depth_first(&self, dag_id: &str, root_id: &str) -> Vec<Task> {
        let dags = self.dags.read();
        let Some(dag) = dags.get(dag_id) else {
            return Vec::new();
        };
        if !dag.nodes.contains_key(root_id) {
            return Vec::new();
        }

        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![root_id.to_string()];
        while let Some(id) = stack.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            if let Some(task) = dag.nodes.get(&id) {
                out.push(task.clone());
            }
            // Reverse so the first dependent is visited first
            let children: Vec<&String> = dag.children(&id).collect();
            for child in children.into_iter().rev() {
                if !visited.contains(child) {
                    stack.push(child.clone());
                }
            }
        }
        out
    }

    /// Level-order walk from `root_id` through its dependents.
    #[must_use]
    pub fn breadth_first(&self, dag_id: &str, root_id: &str) -> Vec<Task> {
        let dags = self.dags.read();
        let Some(dag) = dags.get(dag_id) else {
            return Vec::new();
        };
        if !dag.nodes.contains_key(root_id) {
            return Vec::new();
        }

        let mut out = Vec::new();
        let mut visited = HashSet::from([root_id.to_string()]);
        let mut queue = VecDeque::from([root_id.to_string()]);
        while let Some(id) = queue.pop_front() {
            if let Some(task) = dag.nodes.get(&id) {
                out.push(task.clone());
            }
            for child in dag.children(&id) {
                if visited.insert(child.clone()) {
                    queue.push_back(child.clone());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> Task {
        Task {
            object_id: String::new(),
            dag_id: "d1".to_string(),
            id: id.to_string(),
            name: id.to_string(),
            payload: "{}".to_string(),
            status: "pending".to_string(),
            duration: 0,
            retries: 0,
            dependencies: deps.iter().map(|d| (*d).to_string()).collect(),
        }
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    //   a
    //  / \
    // b   c
    //  \ /
    //   d
    fn diamond() -> GraphView {
        let tasks = [
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["a"]),
            task("d", &["b", "c"]),
        ];
        GraphView::from_tasks(&tasks)
    }

    #[test]
    fn test_depth_first_visits_once() {
        let graph = diamond();
        assert_eq!(ids(&graph.depth_first("d1", "a")), vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn test_breadth_first() {
        let graph = diamond();
        assert_eq!(ids(&graph.breadth_first("d1", "a")), vec!["a", "b", "c", "d"]);
        assert_eq!(ids(&graph.breadth_first("d1", "c")), vec!["c", "d"]);
    }

    #[test]
    fn test_unknown_root_or_dag() {
        let graph = diamond();
        assert!(graph.depth_first("d1", "zz").is_empty());
        assert!(graph.breadth_first("d2", "a").is_empty());
    }

    #[test]
    fn test_update_rewires_edges() {
        let graph = diamond();
        graph.update(&task("d", &["c"]));
        assert_eq!(ids(&graph.breadth_first("d1", "b")), vec!["b"]);

        graph.remove("d1", "c");
        assert_eq!(ids(&graph.depth_first("d1", "a")), vec!["a", "b"]);
    }

    #[test]
    fn test_forward_reference_links_when_target_arrives() {
        let graph = GraphView::new();
        graph.update(&task("child", &["parent"]));
        assert!(graph.depth_first("d1", "parent").is_empty());

        graph.update(&task("parent", &[]));
        assert_eq!(ids(&graph.depth_first("d1", "parent")), vec!["parent", "child"]);
    }
}
