pub mod disk;
pub mod graph;
pub mod registry;
pub mod wal;

pub use disk::TaskStore;
pub use graph::GraphView;
pub use registry::NamespaceRegistry;
