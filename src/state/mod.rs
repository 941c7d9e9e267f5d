//! Locally cached service state.

pub mod cache;

pub use cache::StateCache;
