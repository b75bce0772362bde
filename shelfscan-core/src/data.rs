use crate::model::{Category, Product, ProductCategoryRelation};
use rusqlite::{Connection, OptionalExtension, Result, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub struct Database {
    conn: Connection,
}

/// What `insert_product` did with the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductWrite {
    Inserted,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub categories: i64,
    pub products: i64,
    pub relations: i64,
}

/// Price bands offered by the browse query. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceBand {
    Any,
    Low,
    Medium,
    High,
}

impl PriceBand {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "" | "any" => Some(PriceBand::Any),
            "low" => Some(PriceBand::Low),
            "medium" => Some(PriceBand::Medium),
            "high" => Some(PriceBand::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceBand::Any => "any",
            PriceBand::Low => "low",
            PriceBand::Medium => "medium",
            PriceBand::High => "high",
        }
    }

    /// `(min, max)`; `None` means unbounded above.
    pub fn bounds(&self) -> (f64, Option<f64>) {
        match self {
            PriceBand::Any => (0.0, None),
            PriceBand::Low => (0.0, Some(5000.0)),
            PriceBand::Medium => (5000.0, Some(20000.0)),
            PriceBand::High => (20000.0, None),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProductQuery {
    /// Substring of the category title.
    pub category: Option<String>,
    pub price: PriceBand,
    pub limit: usize,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            category: None,
            price: PriceBand::Any,
            limit: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductListing {
    pub id: String,
    pub title: String,
    pub price: f64,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    pub category_title: String,
}

impl Database {
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    // product_categories has no uniqueness constraint. A second harvest over a
    // populated store duplicates edges unless it is cleared first.
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY,
    parent_id TEXT,
    title TEXT NOT NULL,
    level INTEGER NOT NULL,
    relative_url TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_categories_parent ON categories(parent_id);

CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    price REAL NOT NULL,
    image_url TEXT,
    product_url TEXT
);

CREATE INDEX IF NOT EXISTS idx_products_price ON products(price);

CREATE TABLE IF NOT EXISTS product_categories (
    product_id TEXT NOT NULL,
    category_id TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_product_categories_product ON product_categories(product_id);
CREATE INDEX IF NOT EXISTS idx_product_categories_category ON product_categories(category_id);
            ",
        )?;
        Ok(())
    }

    /// Delete every row from all three tables.
    pub fn clear(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            DELETE FROM product_categories;
            DELETE FROM products;
            DELETE FROM categories;
            ",
        )?;
        Ok(())
    }

    // Category operations
    pub fn insert_category(&self, category: &Category) -> Result<()> {
        self.conn.execute(
            "INSERT INTO categories (id, parent_id, title, level, relative_url) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &category.id,
                &category.parent_id,
                &category.title,
                category.level,
                &category.relative_url,
            ],
        )?;
        Ok(())
    }

    pub fn get_categories(&self) -> Result<Vec<(String, Option<String>, String, u32)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, parent_id, title, level FROM categories ORDER BY rowid")?;

        let categories = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(categories)
    }

    // Product operations
    pub fn product_exists(&self, product_id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM products WHERE id = ?1",
            params![product_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert a product unless one with the same id is already stored.
    /// An existing row is left untouched.
    pub fn insert_product(&self, product: &Product) -> Result<ProductWrite> {
        if self.product_exists(&product.id)? {
            return Ok(ProductWrite::AlreadyPresent);
        }

        self.conn.execute(
            "INSERT INTO products (id, title, price, image_url, product_url) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &product.id,
                &product.title,
                product.price,
                &product.image_url,
                &product.product_url,
            ],
        )?;

        Ok(ProductWrite::Inserted)
    }

    pub fn get_product(&self, product_id: &str) -> Result<Option<Product>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, price, image_url, product_url FROM products WHERE id = ?1",
        )?;

        let product = stmt
            .query_row(params![product_id], |row| {
                Ok(Product {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    price: row.get(2)?,
                    image_url: row.get(3)?,
                    product_url: row.get(4)?,
                })
            })
            .optional()?;

        Ok(product)
    }

    // Relation operations. No existence check.
    pub fn insert_relation(&self, product_id: &str, category_id: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO product_categories (product_id, category_id) VALUES (?1, ?2)",
            params![product_id, category_id],
        )?;
        Ok(())
    }

    pub fn get_relations(&self, product_id: &str) -> Result<Vec<ProductCategoryRelation>> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, category_id FROM product_categories WHERE product_id = ?1 ORDER BY rowid",
        )?;

        let relations = stmt
            .query_map(params![product_id], |row| {
                Ok(ProductCategoryRelation {
                    product_id: row.get(0)?,
                    category_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(relations)
    }

    // Query methods
    pub fn counts(&self) -> Result<StoreCounts> {
        let count = |table: &str| -> Result<i64> {
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        };

        Ok(StoreCounts {
            categories: count("categories")?,
            products: count("products")?,
            relations: count("product_categories")?,
        })
    }

    /// Random sample of stored products in a price band, optionally limited
    /// to categories whose title contains `query.category`.
    pub fn search_products(&self, query: &ProductQuery) -> Result<Vec<ProductListing>> {
        let (min_price, max_price) = query.price.bounds();
        let category_pattern = query
            .category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(|c| format!("%{}%", c.trim()));

        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.title, p.price, p.image_url, p.product_url, c.title AS category_title
             FROM products p
             JOIN product_categories pc ON p.id = pc.product_id
             JOIN categories c ON pc.category_id = c.id
             WHERE p.price >= ?1
               AND (?2 IS NULL OR p.price <= ?2)
               AND (?3 IS NULL OR c.title LIKE ?3)
             ORDER BY RANDOM()
             LIMIT ?4",
        )?;

        let listings = stmt
            .query_map(
                params![min_price, max_price, category_pattern, query.limit as i64],
                |row| {
                    Ok(ProductListing {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        price: row.get(2)?,
                        image_url: row.get(3)?,
                        product_url: row.get(4)?,
                        category_title: row.get(5)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>>>()?;

        Ok(listings)
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}
