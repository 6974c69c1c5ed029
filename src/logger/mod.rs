//! Activity logging: JSONL sink plus the non-blocking logger thread.

pub mod activity;
pub mod jsonl;
