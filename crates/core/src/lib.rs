//! `storefront-core` — primitives shared by the storefront domain crates.
//!
//! This crate contains **pure domain** primitives (no IO, no HTTP). The
//! client crate addresses every remote collection through the [`Resource`]
//! trait defined here.

pub mod entity;
pub mod error;
pub mod id;
pub mod lenient;
pub mod resource;

pub use entity::Entity;
pub use error::{DomainError, DomainResult, FieldErrors};
pub use id::EntityId;
pub use resource::{Draft, Resource};
