//! # Infrastructure Adapters
//!
//! Infrastructure implementations of the repository and Shortcut story
//! interfaces.

pub mod memory_repository;
pub mod story_client;

pub use memory_repository::InMemoryRepository;
pub use story_client::HttpStoryClient;
