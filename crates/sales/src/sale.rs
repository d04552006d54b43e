use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use storefront_core::lenient::{f64_from_any, i64_from_any};
use storefront_core::{Entity, EntityId, Resource};

use crate::cart::{NewSale, SaleDraft};

/// How a sale was paid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

/// Sale status lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

/// Sold product line as reported by the sales API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    #[serde(rename = "productId", alias = "product_id")]
    pub product_id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "f64_from_any")]
    pub price: f64,
    #[serde(default = "one", deserialize_with = "i64_from_any")]
    pub quantity: i64,
}

fn one() -> i64 {
    1
}

/// Sale as listed by `GET {base}/sales`.
///
/// Status and payment method stay as raw strings: the API and older
/// records do not agree on a vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: EntityId,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default, deserialize_with = "f64_from_any")]
    pub total: f64,
    #[serde(default)]
    pub products: Vec<SaleLine>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Sale {
    fn id(&self) -> &EntityId {
        &self.id
    }
}

/// The `sales` collection.
#[derive(Debug, Clone, Copy)]
pub struct Sales;

impl Resource for Sales {
    const NAME: &'static str = "sales";

    type Entity = Sale;
    type Draft = SaleDraft;

    fn samples() -> Vec<Sale> {
        let line = |id: i64, price: f64, quantity: i64| SaleLine {
            product_id: EntityId::from(id),
            name: Some(format!("Sample Product {}", id)),
            price,
            quantity,
        };
        let at = |day: u32, hour: u32, minute: u32| {
            NaiveDate::from_ymd_opt(2025, 3, day)
                .and_then(|d| d.and_hms_opt(hour, minute, 0))
                .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        };

        vec![
            Sale {
                id: EntityId::from(1),
                date: at(8, 14, 30),
                customer: Some("Sample Customer 1".to_string()),
                total: 350.0,
                products: vec![line(1, 100.0, 2), line(2, 150.0, 1)],
                status: Some(SaleStatus::Completed.as_str().to_string()),
                payment_method: Some(PaymentMethod::Cash.as_str().to_string()),
                extra: Map::new(),
            },
            Sale {
                id: EntityId::from(2),
                date: at(8, 12, 15),
                customer: Some("Sample Customer 2".to_string()),
                total: 600.0,
                products: vec![line(3, 300.0, 2)],
                status: Some(SaleStatus::Pending.as_str().to_string()),
                payment_method: Some(PaymentMethod::Card.as_str().to_string()),
                extra: Map::new(),
            },
            Sale {
                id: EntityId::from(3),
                date: at(7, 9, 45),
                customer: Some("Sample Customer 3".to_string()),
                total: 450.0,
                products: vec![line(1, 100.0, 1), line(2, 150.0, 1), line(3, 200.0, 1)],
                status: Some(SaleStatus::Completed.as_str().to_string()),
                payment_method: Some(PaymentMethod::Transfer.as_str().to_string()),
                extra: Map::new(),
            },
        ]
    }

    fn local_entity(id: EntityId, payload: &NewSale) -> Sale {
        Sale {
            id,
            date: Some(payload.date.clone()),
            customer: Some(payload.customer.clone()),
            total: payload.total,
            products: payload.lines.clone(),
            status: Some(payload.status.as_str().to_string()),
            payment_method: Some(payload.payment_method.as_str().to_string()),
            extra: Map::new(),
        }
    }
}
