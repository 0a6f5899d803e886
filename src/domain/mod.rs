//! Domain module for contact management.
//!
//! This module contains the contact entity and its value objects.

pub mod contact;

pub use contact::{Contact, ContactCandidate, ContactId, Timestamp};
