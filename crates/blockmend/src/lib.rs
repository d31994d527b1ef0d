#![forbid(unsafe_code)]

//! Repair engine for record-block data files.
//!
//! Scans a brace-delimited data file without a full grammar parser,
//! collapses duplicate keys to their first occurrence, and inserts
//! missing required keys at anchor-relative positions, leaving every
//! other byte of the file untouched.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod report;
pub mod rewriter;
pub mod scanner;
pub mod util;

pub use cli::run_from_env;
pub use error::{MendError, Result};
