//! The category-by-category harvest loop.
//!
//! Categories are processed strictly in flattened order, one request at a
//! time. Each category row is written before any of its products are looked
//! up. Fetch failures are turned into skip values at two levels: a failed
//! listing, product-info or image lookup skips the category's products, a
//! failed per-product enrichment skips that product only. Store failures are
//! not skipped; they end the harvest.

use crate::category::flatten_categories;
use crate::data::{Database, ProductWrite};
use crate::error::{HarvestError, Result};
use crate::model::{Category, Product};
use crate::report::HarvestSummary;
use shelfscan_scanner::{CatalogClient, ProductState};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_MENU_LEVEL: u8 = 6;

/// Options for configuring a harvest
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub max_menu_level: u8,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            max_menu_level: DEFAULT_MAX_MENU_LEVEL,
        }
    }
}

/// Why a leaf category contributed no products.
#[derive(Debug, Clone, PartialEq)]
pub enum CategorySkip {
    Discovery(String),
    NoProducts,
    ProductInfo(String),
    NoProductInfo,
    Images(String),
}

impl fmt::Display for CategorySkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategorySkip::Discovery(e) => write!(f, "product discovery failed: {e}"),
            CategorySkip::NoProducts => write!(f, "no products found on listing page"),
            CategorySkip::ProductInfo(e) => write!(f, "product info lookup failed: {e}"),
            CategorySkip::NoProductInfo => write!(f, "product info lookup returned nothing"),
            CategorySkip::Images(e) => write!(f, "image lookup failed: {e}"),
        }
    }
}

/// Why a single product was not stored.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductSkip {
    MissingImages,
    NoImages,
    ProductUrl(String),
}

impl fmt::Display for ProductSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductSkip::MissingImages => write!(f, "no image entry in image lookup"),
            ProductSkip::NoImages => write!(f, "image list is empty"),
            ProductSkip::ProductUrl(e) => write!(f, "product URL lookup failed: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CategoryOutcome {
    /// Has children; never searched for products.
    Branch,
    Harvested {
        stored: usize,
        already_present: usize,
        skipped: usize,
    },
    Skipped(CategorySkip),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProductOutcome {
    Stored,
    AlreadyPresent,
    Skipped(ProductSkip),
}

/// Progress notifications emitted while harvesting.
#[derive(Debug, Clone, PartialEq)]
pub enum HarvestEvent {
    CategoryStarted {
        /// Zero-based position in the flattened list.
        index: usize,
        total: usize,
        id: String,
        title: String,
        level: u32,
        is_leaf: bool,
    },
    CategorySkipped {
        title: String,
        reason: CategorySkip,
    },
    CategoryHarvested {
        title: String,
        stored: usize,
        already_present: usize,
        skipped: usize,
    },
    ProductAlreadyPresent {
        product_id: String,
    },
    ProductSkipped {
        product_id: String,
        reason: ProductSkip,
    },
}

impl fmt::Display for HarvestEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarvestEvent::CategoryStarted {
                index,
                total,
                id,
                title,
                level,
                is_leaf,
            } => {
                let kind = if *is_leaf { "leaf" } else { "branch" };
                let position = index + 1;
                write!(f, "[{position}/{total}] {title} ({id}, level {level}, {kind})")
            }
            HarvestEvent::CategorySkipped { title, reason } => {
                write!(f, "Skipping products of '{title}': {reason}")
            }
            HarvestEvent::CategoryHarvested {
                title,
                stored,
                already_present,
                skipped,
            } => write!(
                f,
                "'{title}': {stored} stored, {already_present} already present, {skipped} skipped"
            ),
            HarvestEvent::ProductAlreadyPresent { product_id } => {
                write!(f, "Product {product_id} already exists in the store")
            }
            HarvestEvent::ProductSkipped { product_id, reason } => {
                write!(f, "Skipping product {product_id}: {reason}")
            }
        }
    }
}

/// Callback for reporting harvest progress
pub type HarvestProgressCallback = Arc<dyn Fn(HarvestEvent) + Send + Sync>;

fn emit(progress: &Option<HarvestProgressCallback>, event: HarvestEvent) {
    if let Some(callback) = progress {
        callback(event);
    }
}

/// Fetch the menu, flatten it and harvest every category.
///
/// Menu, flattening and store errors are returned; everything else is
/// recorded in the summary.
pub async fn execute_harvest(
    client: &CatalogClient,
    db: &Database,
    options: &HarvestOptions,
    progress: Option<HarvestProgressCallback>,
) -> Result<HarvestSummary> {
    info!("Fetching category menu (max level {})", options.max_menu_level);
    let menu = client.fetch_menu(options.max_menu_level).await?;
    let categories = flatten_categories(&menu)?;
    info!("Flattened menu into {} categories", categories.len());

    harvest_categories(client, db, &categories, progress).await
}

/// Harvest an already flattened category list, in order.
pub async fn harvest_categories(
    client: &CatalogClient,
    db: &Database,
    categories: &[Category],
    progress: Option<HarvestProgressCallback>,
) -> Result<HarvestSummary> {
    let mut summary = HarvestSummary::start();
    let total = categories.len();

    for (index, category) in categories.iter().enumerate() {
        emit(
            &progress,
            HarvestEvent::CategoryStarted {
                index,
                total,
                id: category.id.clone(),
                title: category.title.clone(),
                level: category.level,
                is_leaf: category.is_leaf(),
            },
        );

        db.insert_category(category).map_err(|source| {
            HarvestError::store(format!("category '{}' ({})", category.title, category.id), source)
        })?;

        let outcome = if category.is_leaf() {
            harvest_category(client, db, category, &progress, &mut summary).await?
        } else {
            CategoryOutcome::Branch
        };

        match &outcome {
            CategoryOutcome::Branch => {}
            CategoryOutcome::Skipped(reason) => {
                warn!("Skipping products of '{}': {}", category.title, reason);
                emit(
                    &progress,
                    HarvestEvent::CategorySkipped {
                        title: category.title.clone(),
                        reason: reason.clone(),
                    },
                );
            }
            CategoryOutcome::Harvested {
                stored,
                already_present,
                skipped,
            } => emit(
                &progress,
                HarvestEvent::CategoryHarvested {
                    title: category.title.clone(),
                    stored: *stored,
                    already_present: *already_present,
                    skipped: *skipped,
                },
            ),
        }

        summary.record_category(category, &outcome);
    }

    summary.finish();
    info!(
        "Harvest complete: {} categories, {} products stored",
        summary.categories, summary.products_stored
    );
    Ok(summary)
}

/// Discover, enrich and store the products of one leaf category.
pub async fn harvest_category(
    client: &CatalogClient,
    db: &Database,
    category: &Category,
    progress: &Option<HarvestProgressCallback>,
    summary: &mut HarvestSummary,
) -> Result<CategoryOutcome> {
    let stubs = match client.fetch_category_products(&category.relative_url).await {
        Ok(Some(stubs)) if !stubs.is_empty() => stubs,
        Ok(_) => return Ok(CategoryOutcome::Skipped(CategorySkip::NoProducts)),
        Err(e) => return Ok(CategoryOutcome::Skipped(CategorySkip::Discovery(e.to_string()))),
    };
    let product_ids: Vec<String> = stubs.into_iter().map(|s| s.product_id).collect();
    debug!("'{}': {} product stubs", category.title, product_ids.len());

    let states = match client.fetch_products_info(&product_ids).await {
        Ok(states) if !states.is_empty() => states,
        Ok(_) => return Ok(CategoryOutcome::Skipped(CategorySkip::NoProductInfo)),
        Err(e) => return Ok(CategoryOutcome::Skipped(CategorySkip::ProductInfo(e.to_string()))),
    };

    let images = match client.fetch_images(&product_ids).await {
        Ok(images) => images,
        Err(e) => return Ok(CategoryOutcome::Skipped(CategorySkip::Images(e.to_string()))),
    };

    let (mut stored, mut already_present, mut skipped) = (0, 0, 0);
    for state in &states {
        let outcome = harvest_product(client, db, category, state, &images).await?;
        match &outcome {
            ProductOutcome::Stored => stored += 1,
            ProductOutcome::AlreadyPresent => {
                already_present += 1;
                emit(
                    progress,
                    HarvestEvent::ProductAlreadyPresent {
                        product_id: state.id().to_string(),
                    },
                );
            }
            ProductOutcome::Skipped(reason) => {
                skipped += 1;
                warn!("Skipping product {}: {}", state.id(), reason);
                emit(
                    progress,
                    HarvestEvent::ProductSkipped {
                        product_id: state.id().to_string(),
                        reason: reason.clone(),
                    },
                );
            }
        }
        summary.record_product(&outcome);
    }

    Ok(CategoryOutcome::Harvested {
        stored,
        already_present,
        skipped,
    })
}

async fn harvest_product(
    client: &CatalogClient,
    db: &Database,
    category: &Category,
    state: &ProductState,
    images: &HashMap<String, Vec<String>>,
) -> Result<ProductOutcome> {
    let product = match enrich_product(client, state, images).await {
        Ok(product) => product,
        Err(reason) => return Ok(ProductOutcome::Skipped(reason)),
    };

    let entity = || format!("product '{}' ({})", product.title, product.id);
    let write = db
        .insert_product(&product)
        .map_err(|source| HarvestError::store(entity(), source))?;
    db.insert_relation(&product.id, &category.id)
        .map_err(|source| {
            HarvestError::store(
                format!("relation {} -> {}", product.id, category.id),
                source,
            )
        })?;

    Ok(match write {
        ProductWrite::Inserted => ProductOutcome::Stored,
        ProductWrite::AlreadyPresent => ProductOutcome::AlreadyPresent,
    })
}

/// Attach the first image and the canonical URL to a product state.
///
/// Images are looked up by product id, never by position in the batch. The
/// URL costs one request per product.
pub async fn enrich_product(
    client: &CatalogClient,
    state: &ProductState,
    images: &HashMap<String, Vec<String>>,
) -> std::result::Result<Product, ProductSkip> {
    let image_url = images
        .get(state.id())
        .ok_or(ProductSkip::MissingImages)?
        .first()
        .cloned()
        .ok_or(ProductSkip::NoImages)?;

    let product_url = client
        .fetch_product_url(state.id())
        .await
        .map_err(|e| ProductSkip::ProductUrl(e.to_string()))?;

    Ok(Product {
        id: state.id().to_string(),
        title: state.name().to_string(),
        price: state.price(),
        image_url: Some(image_url),
        product_url: Some(product_url),
    })
}
