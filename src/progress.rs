//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::NotecastConfigBuilder::progress_callback`] to hear about
//! each stage as it starts, each note-generation chunk as it is sent and
//! returned, and each stage as it finishes or fails.
//!
//! # Why callbacks instead of channels?
//!
//! The host decides where events go (a terminal progress bar, a log record,
//! a websocket) without the library knowing anything about it. All methods
//! default to no-ops so implementors override only what they need.
//!
//! # Example
//!
//! ```rust
//! use notecast::{NotecastConfig, PipelineProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct ChunkCounter(AtomicUsize);
//!
//! impl PipelineProgressCallback for ChunkCounter {
//!     fn on_chunk_complete(&self, _index: usize, _total: usize, _len: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = NotecastConfig::builder()
//!     .progress_callback(Arc::new(ChunkCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::session::Stage;
use std::sync::Arc;

/// Called by the orchestrator as stages run.
///
/// Stages run one call at a time, but different sessions may run stages
/// concurrently, so implementations must be `Send + Sync` and protect shared
/// state themselves.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called when a stage's preconditions hold and its first call is about to go out.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called before a note-generation chunk is submitted.
    ///
    /// # Arguments
    /// * `index` — 0-based chunk position
    /// * `total` — number of chunks in this run
    fn on_chunk_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a chunk's notes come back.
    ///
    /// # Arguments
    /// * `index`     — 0-based chunk position
    /// * `total`     — number of chunks
    /// * `notes_len` — characters of tidied notes for this chunk
    fn on_chunk_complete(&self, index: usize, total: usize, notes_len: usize) {
        let _ = (index, total, notes_len);
    }

    /// Called after a stage committed its artifact.
    ///
    /// `output_len` is the size of the provider output behind the artifact:
    /// characters of the response for text stages (the raw reply for
    /// classification, the committed text otherwise), bytes for audio.
    fn on_stage_complete(&self, stage: Stage, output_len: usize) {
        let _ = (stage, output_len);
    }

    /// Called when a stage aborts. Nothing was committed.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::NotecastConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
