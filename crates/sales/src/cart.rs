//! Sale cart: the add-sale form.
//!
//! Lines are picked from the product catalogue; the total is always derived
//! from the lines so it cannot drift from them.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use storefront_core::{DomainError, DomainResult, Draft, EntityId, FieldErrors};
use storefront_products::Product;

use crate::sale::{PaymentMethod, SaleLine, SaleStatus};

/// One product in the cart. `stock` is the availability observed when the
/// product was picked and caps the quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product_id: EntityId,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
    pub stock: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaleDraft {
    pub customer: String,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    lines: Vec<CartLine>,
}

impl SaleDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a cart preloaded with one product (sell-from-detail flow).
    pub fn with_product(product: &Product) -> Self {
        let mut draft = Self::new();
        draft.lines.push(CartLine::from_product(product));
        draft
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn total(&self) -> f64 {
        self.lines
            .iter()
            .map(|line| line.price * line.quantity as f64)
            .sum()
    }

    /// Add a product with quantity 1. A product can appear only once.
    pub fn add_product(&mut self, product: &Product) -> DomainResult<()> {
        if self.lines.iter().any(|line| line.product_id == product.id) {
            return Err(DomainError::conflict(format!(
                "product {} is already in the sale",
                product.id
            )));
        }
        self.lines.push(CartLine::from_product(product));
        Ok(())
    }

    pub fn remove_product(&mut self, product_id: &EntityId) -> DomainResult<()> {
        let before = self.lines.len();
        self.lines.retain(|line| &line.product_id != product_id);
        if self.lines.len() == before {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    /// Change a line's quantity from user input. The quantity must be a
    /// positive whole number no larger than the product's stock; on error
    /// the line is left unchanged.
    pub fn set_quantity(&mut self, product_id: &EntityId, input: &str) -> DomainResult<()> {
        let line = self
            .lines
            .iter_mut()
            .find(|line| &line.product_id == product_id)
            .ok_or_else(DomainError::not_found)?;

        let quantity = match input.trim().parse::<i64>() {
            Ok(q) if q > 0 => q,
            _ => return Err(DomainError::validation("quantity must be a positive whole number")),
        };

        if quantity > line.stock {
            return Err(DomainError::invariant(format!(
                "insufficient stock: only {} units available",
                line.stock
            )));
        }

        line.quantity = quantity;
        Ok(())
    }
}

impl CartLine {
    fn from_product(product: &Product) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            quantity: 1,
            stock: product.stock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdditionalProduct {
    pub product_id: EntityId,
    pub quantity: i64,
    pub price: f64,
}

/// Validated create payload (`POST {base}/sales`).
///
/// The sales endpoint takes the first product flattened into the sale
/// (`product_id`, `quantity`, `price`) and the rest as
/// `additional_products`. `lines` keeps every line with its name for
/// local-only sales and is not sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSale {
    pub customer: String,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub total: f64,
    /// RFC 3339, stamped when the draft is validated.
    pub date: String,
    pub product_id: EntityId,
    pub quantity: i64,
    pub price: f64,
    pub additional_products: Vec<AdditionalProduct>,
    #[serde(skip)]
    pub lines: Vec<SaleLine>,
}

impl Draft for SaleDraft {
    type Payload = NewSale;

    fn validate(&self) -> Result<NewSale, FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.customer.trim().is_empty() {
            errors.add("customer", "is required");
        }

        let Some((first, rest)) = self.lines.split_first() else {
            errors.add("products", "add at least one product");
            return Err(errors);
        };

        errors.into_result(NewSale {
            customer: self.customer.trim().to_string(),
            payment_method: self.payment_method,
            status: self.status,
            total: self.total(),
            date: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            product_id: first.product_id.clone(),
            quantity: first.quantity,
            price: first.price,
            additional_products: rest
                .iter()
                .map(|line| AdditionalProduct {
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                    price: line.price,
                })
                .collect(),
            lines: self
                .lines
                .iter()
                .map(|line| SaleLine {
                    product_id: line.product_id.clone(),
                    name: Some(line.name.clone()),
                    price: line.price,
                    quantity: line.quantity,
                })
                .collect(),
        })
    }
}
