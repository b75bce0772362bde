use serde::{Deserialize, Serialize};

/// One node of the storefront's category tree, flattened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub parent_id: Option<String>,
    pub title: String,
    /// Depth in the source tree; roots are level 0.
    pub level: u32,
    pub relative_url: String,
    pub has_children: bool,
}

impl Category {
    /// Only leaves are searched for products.
    pub fn is_leaf(&self) -> bool {
        !self.has_children
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub price: f64,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCategoryRelation {
    pub product_id: String,
    pub category_id: String,
}
