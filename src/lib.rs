//! wkbar - WaniKani review queue poller
//!
//! wkbar polls the WaniKani study queue and turns it into one short display
//! line: a loading placeholder, a countdown to the next review, the number of
//! reviews waiting, or a vacation notice. Announcements go to whatever the
//! caller plugs in (a status bar, a terminal, a test recorder).

pub mod clock;
pub mod config;
pub mod credentials;
pub mod display;
pub mod error;
pub mod guard;
pub mod scheduler;
pub mod snapshot;
pub mod source;
pub mod tracker;

pub use error::{Result, WkbarError};
pub use display::{Announcement, Labels, ReviewStatus};
pub use snapshot::{EpochUnit, ReviewSnapshot};
pub use tracker::{Announce, RefreshStrategy, ReviewTracker, TrackerConfig};
