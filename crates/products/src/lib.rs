//! Products domain module.
//!
//! Product entity as exchanged with the inventory API, the add-product form
//! and its validation, and the sample catalogue shown while offline. Pure
//! logic only (no IO, no HTTP).

pub mod product;

pub use product::{NewProduct, Product, ProductDraft, Products};
