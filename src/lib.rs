//! Track chat-service thread links inside fenced markdown blocks.
//!
//! A block opened with ```` ```smart-<platform> ```` holds one line per thread:
//!
//! ```text
//! chat-active:: 1718000000 https://claude.ai/chat/4f1c...
//! chat-done:: 1717000000 https://claude.ai/chat/9ab2...
//! ```
//!
//! [`session::ThreadSession`] drives one such block against an embedded
//! browser: it opens the first unfinished thread, saves new thread URLs as the
//! user navigates, and flips lines between active and done.

pub mod browser;
pub mod classify;
pub mod codec;
pub mod codex;
pub mod config;
pub mod conversations;
pub mod debounce;
pub mod document;
pub mod error;
pub mod fence;
pub mod fuzzy;
pub mod normalize;
pub mod output;
pub mod platform;
pub mod session;

pub use error::{ChatblockError, Result};
pub use platform::Platform;
pub use session::ThreadSession;
