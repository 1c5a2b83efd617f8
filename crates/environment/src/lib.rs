//! Environment crate for managing named environments of key/value pairs
//!
//! This crate provides:
//! - Environment and value storage on libsql
//! - Transactional create, upsert and delete operations
//! - HTTP API endpoints wrapped in the shared response envelope

pub mod logic;
pub mod repository;
pub mod router;
pub mod service;

// Re-export commonly used types
pub use logic::environment::{Environment, EnvironmentWithValues};
pub use logic::value::{KeyValue, Value};
pub use repository::{
    EnvironmentRepositoryLike, Repository, RepositoryLike, ValueRepositoryLike,
};
pub use router::{create_router, initiate_api_router};
pub use service::{EnvironmentService, EnvironmentServiceParams};
