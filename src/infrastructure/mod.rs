//! Infrastructure module for external services.
//!
//! This module contains the repository abstraction, its in-memory and
//! document store implementations, and the factory that picks one at startup.

pub mod couch;
pub mod document_store;
pub mod factory;
pub mod iam;
pub mod in_memory;
pub mod repository;

pub use document_store::DocumentStoreContactRepository;
pub use factory::{ConfigurationError, FactoryError, RepositoryConfig, RepositoryFactory};
pub use in_memory::InMemoryContactRepository;
pub use repository::{Backend, ContactRepository, RepositoryError};
