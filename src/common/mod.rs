//! Common types and utilities shared across pagecache.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration defaults and options
//! - Error types (re-exported from [`crate::error`])
//! - Identifiers (BufferId, PageNumber)
//! - Pin counting and one-shot teardown

pub mod config;
mod buffer_id;
mod page_number;
pub mod usage;

pub use buffer_id::BufferId;
pub use config::{CacheOptions, IntOption};
pub use crate::error::{Error, Result};
pub use page_number::PageNumber;
pub use usage::{DisposeFlag, UsageCounter};
