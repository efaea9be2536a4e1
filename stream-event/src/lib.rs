//! Wire shapes for streamed agent output.
//!
//! This crate defines the serialized form of one chat stream chunk and one
//! A2A task event. It does not depend on the runtime crate; the runtime
//! produces these values and the serve crate writes them as SSE data frames.

pub mod a2a;
pub mod chat;

pub use a2a::{A2aEventType, A2aStreamEvent};
pub use chat::{ChatChunk, FinishReason, Usage};
