//! Completion endpoint abstraction and HTTP client.
//!
//! The endpoint is stateless: every request carries the full turn history.

mod completion;

pub use completion::{
    CompletionBackend, CompletionClient, CompletionError, Content, Part, Role, FETCH_FAILED,
};
