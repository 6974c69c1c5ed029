//! Deletion rule hierarchy: volumes, folder rules, file rules.

pub mod model;
