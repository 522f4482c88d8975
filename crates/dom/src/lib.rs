//! Live DOM access for snapshotting
//!
//! A snapshot never talks to a browser engine directly. It reads the live
//! document through the [`Dom`] trait, which this crate also implements over
//! an in-memory arena so the whole pipeline runs without a browser.
//!
//! ## Core Design
//!
//! ```text
//! CDP JSON / builder calls → DomArena (owned) → Dom trait → snapshot walker
//!                                 ↓
//!                          NodeId (u32 index)
//! ```

pub mod arena;
pub mod canvas;
pub mod cdp;
pub mod document;
pub mod error;
pub mod selector;
pub mod types;

pub use arena::DomArena;
pub use document::Dom;
pub use error::{DomError, Result};
pub use selector::SelectorList;
pub use types::*;
