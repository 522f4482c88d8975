//! DOM snapshot serializer for session replay
//!
//! Turns a live document into a replayable tree of plain records, each with
//! an id that stays stable for the life of the recording.
//!
//! ## Core Design
//!
//! ```text
//! SnapshotConfig → SnapshotOptions ─┐
//!                                   ↓
//! Dom (live) → Walker → serializer → SerializedNode tree
//!                ↓          ↓
//!             Mirror   rewrite / privacy
//!                ↓
//!            Deferred (iframe, stylesheet, image loads)
//! ```
//!
//! - **Best effort**: unreadable resources skip an enhancement, never the walk
//! - **Privacy first**: blocked subtrees are never visited
//! - **No globals**: ids come from the mirror owned by one recording

pub mod error;
pub mod mirror;
pub mod options;
pub mod privacy;
pub mod rewrite;
pub mod serializer;
pub mod service;
pub mod types;
pub mod walker;

pub use error::{Result, SnapshotError};
pub use mirror::{IdAllocator, Mirror, NodeMeta};
pub use options::{
    ClassRule, MaskAllInputs, MaskInputOptions, SlimDom, SlimDomOptions, SnapshotConfig,
    SnapshotOptions,
};
pub use privacy::{mask_input_value, ClassMatcher, PrivacyRule};
pub use rewrite::{absolute_to_doc, absolute_to_stylesheet, get_absolute_srcset_string, transform_attribute};
pub use serializer::SCRIPT_PLACEHOLDER;
pub use service::{Snapshot, SnapshotService};
pub use types::*;
pub use walker::{Deferred, WaitFor, WalkArgs};
