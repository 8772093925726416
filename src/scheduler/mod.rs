//! Timer scheduling for polls and display refreshes.
//!
//! This module provides:
//! - **Schedule**: initial delay plus an optional repeat interval
//! - **spawn_repeating**: runs a tick body on a tokio timer chain, checking a
//!   `keep_running` predicate before every tick and before rescheduling
//! - **TaskHandle**: cancellation handle; dropping it stops the chain
//!
//! # Example
//!
//! ```ignore
//! use wkbar::scheduler::{Schedule, spawn_repeating};
//!
//! let handle = spawn_repeating(
//!     &tokio::runtime::Handle::current(),
//!     "refresh",
//!     Schedule::repeating(Duration::ZERO, Duration::from_secs(30)),
//!     move || enabled.load(Ordering::SeqCst),
//!     move || tracker.recompute_display(),
//! );
//! handle.cancel();
//! ```

mod repeating;

pub use repeating::{Schedule, TaskHandle, spawn_repeating};
