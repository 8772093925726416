//! Callback guards for asynchronous ordering disciplines.
//!
//! This module provides:
//! - **SwitchLatest**: only the most recently wrapped callback runs; earlier
//!   ones become no-ops. Used for self-rescheduling wake timers.
//! - **OrderedResponseGuard**: a response callback runs only if no response to
//!   a later request has been applied yet. Used for overlapping polls.
//!
//! Both guards return `None` from a guarded callback that was skipped.

mod ordered;
mod switch_latest;

pub use ordered::OrderedResponseGuard;
pub use switch_latest::SwitchLatest;
