// Wire shapes of the storefront's AJAX endpoints. Only the fields we read are
// modelled; everything else in the payloads is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Bare product identifier found on a category listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStub {
    pub product_id: String,
}

impl ProductStub {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MenuResponse {
    pub data: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListingResponse {
    pub assets: ListingAssets,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListingAssets {
    /// Scripts in page order; relies on serde_json's `preserve_order`.
    #[serde(rename = "inlineJs")]
    pub inline_js: serde_json::Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProductBuyRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub containers: Vec<ProductBuyContainer<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProductBuyContainer<'a> {
    pub id: String,
    pub data: ProductBuyContainerData<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProductBuyContainerData<'a> {
    pub id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductBuyResponse {
    pub data: ProductBuyStates,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductBuyStates {
    pub states: Vec<ProductState>,
}

/// Per-product state returned by the bulk product-buy lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductState {
    pub data: ProductStateData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStateData {
    pub id: String,
    pub name: String,
    pub price: ProductPrice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPrice {
    pub current: f64,
}

impl ProductState {
    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn price(&self) -> f64 {
        self.data.price.current
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImagesResponse {
    pub data: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MicrodataResponse {
    pub data: Microdata,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Microdata {
    pub offers: MicrodataOffers,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MicrodataOffers {
    pub url: String,
}
