//! Contact Management API Library
//!
//! This library provides the core functionality of the contact management
//! service: the domain model, the repository backends and the HTTP API.

pub mod api;
pub mod domain;
pub mod infrastructure;
