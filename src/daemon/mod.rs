//! Daemon glue: OS signal handling for the foreground `run` command.

pub mod signals;
