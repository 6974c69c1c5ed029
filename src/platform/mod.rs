//! Platform abstraction: the filesystem collaborator consumed by the deletion
//! engine.

pub mod pal;
