//! anydb library - one query interface over heterogeneous databases
//!
//! Routes a query to an engine adapter chosen by the URI scheme, runs it through a
//! connect → execute → close lifecycle and returns the result as JSON records.

pub mod cli;
pub mod config;
pub mod db;
pub mod output;

#[cfg(test)]
pub mod test_utils;
