//! Collections: named arrays of documents.
//!
//! [`Collection<T>`] is the caller-facing view; the `engine` module holds
//! the operations that run inside commit transforms.

mod engine;
mod view;

pub use view::Collection;
