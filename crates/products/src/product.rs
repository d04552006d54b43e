use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use storefront_core::lenient::{f64_from_any, i64_from_any};
use storefront_core::{Draft, Entity, EntityId, FieldErrors, Resource};

/// Product as listed by `GET {base}/products`.
///
/// Fields the client does not know about are kept in `extra` so that a
/// product round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: EntityId,
    pub name: String,
    #[serde(deserialize_with = "f64_from_any")]
    pub price: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(deserialize_with = "i64_from_any")]
    pub stock: i64,
    #[serde(default)]
    pub imageurl: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Product {
    fn id(&self) -> &EntityId {
        &self.id
    }
}

/// Add-product form, exactly as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub price: String,
    pub description: String,
    pub category: String,
    pub stock: String,
    pub imageurl: String,
}

/// Validated create payload (`POST {base}/products`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    pub description: String,
    pub category: String,
    pub stock: i64,
    pub imageurl: Option<String>,
}

impl Draft for ProductDraft {
    type Payload = NewProduct;

    fn validate(&self) -> Result<NewProduct, FieldErrors> {
        let mut errors = FieldErrors::new();

        for (field, value) in [
            ("name", &self.name),
            ("price", &self.price),
            ("description", &self.description),
            ("category", &self.category),
            ("stock", &self.stock),
        ] {
            if value.trim().is_empty() {
                errors.add(field, "is required");
            }
        }

        let price = match self.price.trim().parse::<f64>() {
            Ok(p) if p.is_finite() && p > 0.0 => p,
            _ => {
                if !errors.contains("price") {
                    errors.add("price", "must be a positive number");
                }
                0.0
            }
        };

        let stock = match self.stock.trim().parse::<i64>() {
            Ok(s) if s >= 0 => s,
            _ => {
                if !errors.contains("stock") {
                    errors.add("stock", "must be a whole number, zero or greater");
                }
                0
            }
        };

        let imageurl = Some(self.imageurl.trim())
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        errors.into_result(NewProduct {
            name: self.name.trim().to_string(),
            price,
            description: self.description.trim().to_string(),
            category: self.category.trim().to_string(),
            stock,
            imageurl,
        })
    }
}

/// The `products` collection.
#[derive(Debug, Clone, Copy)]
pub struct Products;

impl Resource for Products {
    const NAME: &'static str = "products";

    type Entity = Product;
    type Draft = ProductDraft;

    fn samples() -> Vec<Product> {
        [
            (1, "Sample Product 1", 100.0, "Electronics", 10),
            (2, "Sample Product 2", 200.0, "Clothing", 5),
            (3, "Sample Product 3", 300.0, "Home", 15),
        ]
        .into_iter()
        .map(|(id, name, price, category, stock)| Product {
            id: EntityId::from(id),
            name: name.to_string(),
            price,
            description: Some(format!("Offline description for {}", name)),
            category: Some(category.to_string()),
            stock,
            imageurl: None,
            extra: Map::new(),
        })
        .collect()
    }

    fn local_entity(id: EntityId, payload: &NewProduct) -> Product {
        Product {
            id,
            name: payload.name.clone(),
            price: payload.price,
            description: Some(payload.description.clone()),
            category: Some(payload.category.clone()),
            stock: payload.stock,
            imageurl: payload.imageurl.clone(),
            extra: Map::new(),
        }
    }
}
