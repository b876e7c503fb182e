// Module declarations
pub mod error;
pub mod field;
pub mod object_id;
pub mod task;
pub mod value;

// Re-exports for convenience
pub use error::DqlError;
pub use field::Field;
pub use object_id::ObjectIdGenerator;
pub use task::{Task, TaskKey};
pub use value::FieldValue;
