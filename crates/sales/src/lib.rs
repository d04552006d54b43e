//! Sales domain module.
//!
//! Sale entity as exchanged with the sales API, the sale cart used to build a
//! new sale from the product catalogue, and the sample sales shown while
//! offline.

pub mod cart;
pub mod sale;

pub use cart::{CartLine, NewSale, SaleDraft};
pub use sale::{PaymentMethod, Sale, SaleLine, SaleStatus, Sales};
