use crate::ajax_state::extract_product_stubs;
use crate::config::ClientConfig;
use crate::error::{Result, ScanError};
use crate::types::{
    ImagesResponse, ListingResponse, MenuResponse, MicrodataResponse, ProductBuyContainer,
    ProductBuyContainerData, ProductBuyRequest, ProductBuyResponse, ProductState, ProductStub,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const MENU_PATH: &str = "/v1/get-menu";
const PRODUCT_BUY_PATH: &str = "/ajax-state/product-buy/";
const IMAGES_PATH: &str = "/catalog/product/get-images/";
const MICRODATA_PATH: &str = "/product/microdata/";

/// Prefix of the synthetic container ids sent to the product-buy endpoint.
/// The remote validator insists on a '-' inside every container id.
pub const CONTAINER_ID_PREFIX: &str = "product-";

/// Container id for the 0-based `index`-th product of a batch.
pub fn container_id(index: usize) -> String {
    format!("{CONTAINER_ID_PREFIX}{}", index + 1)
}

/// Client for the storefront's AJAX endpoints.
///
/// Every call is a single request; batching exists only where the remote
/// offers it (product-buy states and images). Canonical product URLs have no
/// batch endpoint and cost one round trip per product.
pub struct CatalogClient {
    client: Client,
    config: ClientConfig,
}

impl CatalogClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        if !config.has_csrf() {
            warn!("No CSRF token/cookie configured; listing requests may be rejected");
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.div_ceil(2)))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch the raw category tree, `maxMenuLevel` levels deep.
    pub async fn fetch_menu(&self, max_menu_level: u8) -> Result<Vec<Value>> {
        let mut url = join_url(&self.config.api_url, MENU_PATH)?;
        url.query_pairs_mut()
            .append_pair("maxMenuLevel", &max_menu_level.to_string());
        debug!("Fetching menu {}", url);

        let response = self
            .client
            .get(url.clone())
            .header("Cityid", &self.config.city_id)
            .header(reqwest::header::ORIGIN, &self.config.base_url)
            .send()
            .await?;

        let menu: MenuResponse = read_json(response, &url, "category menu").await?;
        menu.data
            .ok_or_else(|| ScanError::ParseError("menu response has no 'data' field".into()))
    }

    /// Product stubs listed on page 1 of a category.
    ///
    /// Only the first page is requested. `Ok(None)` means the page carries no
    /// available-products section at all.
    pub async fn fetch_category_products(
        &self,
        relative_url: &str,
    ) -> Result<Option<Vec<ProductStub>>> {
        let mut url = join_url(&self.config.base_url, relative_url)?;
        url.query_pairs_mut().append_pair("p", "1");
        debug!("Fetching listing {}", url);

        let request = self
            .ajax_post(url.clone())
            .header(reqwest::header::REFERER, url.as_str());
        let response = self.with_csrf(request).send().await?;

        let listing: ListingResponse = read_json(response, &url, "category listing").await?;
        let scripts = listing.assets.inline_js.values().filter_map(Value::as_str);
        extract_product_stubs(scripts)
    }

    /// Name and price of every product in `product_ids`, in one request.
    ///
    /// The response order is whatever the remote chooses; key by `data.id`.
    pub async fn fetch_products_info(&self, product_ids: &[String]) -> Result<Vec<ProductState>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = join_url(&self.config.base_url, PRODUCT_BUY_PATH)?;
        let payload = product_buy_payload(product_ids)?;
        debug!("Fetching product-buy states for {} products", product_ids.len());

        let response = self
            .ajax_post(url.clone())
            .form(&[("data", payload)])
            .send()
            .await?;

        let body: ProductBuyResponse = read_json(response, &url, "product-buy states").await?;
        Ok(body.data.states)
    }

    /// Image URLs for every product in `product_ids`, keyed by product id.
    pub async fn fetch_images(&self, product_ids: &[String]) -> Result<HashMap<String, Vec<String>>> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = join_url(&self.config.base_url, IMAGES_PATH)?;
        let ids = serde_json::to_string(product_ids).map_err(|source| ScanError::Json {
            context: "image id list".to_string(),
            source,
        })?;
        debug!("Fetching images for {} products", product_ids.len());

        let response = self.ajax_post(url.clone()).form(&[("ids", ids)]).send().await?;

        let body: ImagesResponse = read_json(response, &url, "product images").await?;
        Ok(body.data)
    }

    /// Canonical public URL of a single product.
    pub async fn fetch_product_url(&self, product_id: &str) -> Result<String> {
        let mut url = join_url(&self.config.base_url, MICRODATA_PATH)?;
        url.path_segments_mut()
            .map_err(|_| ScanError::InvalidUrl("storefront URL cannot take a path".into()))?
            .pop_if_empty()
            .push(product_id)
            .push("");
        debug!("Fetching microdata {}", url);

        let response = self.ajax_post(url.clone()).send().await?;

        let body: MicrodataResponse = read_json(response, &url, "product microdata").await?;
        Ok(body.data.offers.url)
    }

    fn ajax_post(&self, url: Url) -> RequestBuilder {
        self.client
            .post(url)
            .header("X-Requested-With", "XMLHttpRequest")
    }

    fn with_csrf(&self, request: RequestBuilder) -> RequestBuilder {
        let mut request = request;
        if let Some(token) = &self.config.csrf_token {
            request = request.header("x-csrf-token", token);
        }
        if let Some(cookie) = &self.config.csrf_cookie {
            request = request.header(reqwest::header::COOKIE, format!("_csrf={cookie}"));
        }
        request
    }
}

/// Form payload for the product-buy endpoint.
pub fn product_buy_payload(product_ids: &[String]) -> Result<String> {
    let request = ProductBuyRequest {
        kind: "product-buy",
        containers: product_ids
            .iter()
            .enumerate()
            .map(|(i, id)| ProductBuyContainer {
                id: container_id(i),
                data: ProductBuyContainerData { id },
            })
            .collect(),
    };

    serde_json::to_string(&request).map_err(|source| ScanError::Json {
        context: "product-buy payload".to_string(),
        source,
    })
}

fn join_url(base: &str, path: &str) -> Result<Url> {
    Url::parse(base)
        .and_then(|b| b.join(path))
        .map_err(|e| ScanError::InvalidUrl(format!("{base} + {path}: {e}")))
}

async fn read_json<T: DeserializeOwned>(response: Response, url: &Url, context: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(ScanError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|source| ScanError::Json {
        context: context.to_string(),
        source,
    })
}
