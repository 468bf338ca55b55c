//! Reflection entries: immutable weekly records tied to a goal position.

mod model;
mod store;

pub use model::{NewEntry, ReflectionEntry};
pub use store::ReflectionEntryStore;
