//! Recording sessions over a live document
//!
//! Wraps the snapshot service with the asynchronous half of snapshotting:
//! iframes, stylesheets and images that were still loading when the walk
//! passed them.
//!
//! ## Core Design
//!
//! ```text
//! DomEvent (load) → EventBus (broadcast) → readiness watcher (load | timeout)
//!                                                 ↓ first wins
//!                     SnapshotEvent ← worker ← Task (mpsc)
//! ```
//!
//! - One watcher per live node, at most one callback
//! - The walker runs under one lock, never concurrently
//! - `reset` drops every watcher of the previous recording

pub mod error;
pub mod events;
pub mod readiness;
pub mod session;

pub use error::{RecorderError, Result};
pub use events::{DomEvent, EventBus, SnapshotEvent};
pub use readiness::{wait_for_load, LoadLatch, LoadOutcome};
pub use session::{RecordingSession, SessionConfig};
