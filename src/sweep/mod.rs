//! Deletion engine: age computation, depth-bounded tree walker, free-space
//! evictor, and the scheduling manager.

pub mod age;
pub mod evictor;
pub mod manager;
pub mod walker;
