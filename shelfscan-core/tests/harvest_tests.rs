// End-to-end harvest tests against a mock storefront

use serde_json::{Value, json};
use shelfscan_core::HarvestError;
use shelfscan_core::data::Database;
use shelfscan_core::harvest::{
    CategoryOutcome, CategorySkip, HarvestEvent, HarvestOptions, HarvestProgressCallback,
    ProductSkip, enrich_product, execute_harvest,
};
use shelfscan_core::model::Product;
use shelfscan_scanner::{CatalogClient, ClientConfig, ProductState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("harvest.db")).unwrap();
    (temp_dir, db)
}

fn client_for(server: &MockServer) -> CatalogClient {
    let config = ClientConfig::for_origin(&server.uri()).with_csrf("token", "cookie");
    CatalogClient::new(config).unwrap()
}

fn recorder() -> (Arc<Mutex<Vec<HarvestEvent>>>, HarvestProgressCallback) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let callback: HarvestProgressCallback = Arc::new(move |event| {
        sink.lock().unwrap().push(event);
    });
    (events, callback)
}

fn listing(products: &[&str]) -> Value {
    let items: Vec<Value> = products
        .iter()
        .map(|id| json!({"id": format!("as-{id}"), "data": {"product": id}}))
        .collect();
    let payload = json!([[{"type": "avails-container", "id": "as-root"}, items]]);
    json!({
        "assets": {
            "inlineJs": {
                "a": "window.dataLayer = [];",
                "b": format!("window.AjaxState.register({payload});")
            }
        }
    })
}

fn state(id: &str, name: &str, price: f64) -> Value {
    json!({"id": format!("c-{id}"), "data": {"id": id, "name": name, "price": {"current": price}}})
}

async fn mount_menu(server: &MockServer, tree: Value) {
    Mock::given(method("GET"))
        .and(path("/v1/get-menu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": tree })))
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, url: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path(url))
        .and(query_param("p", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_states(server: &MockServer, states: Vec<Value>) {
    Mock::given(method("POST"))
        .and(path("/ajax-state/product-buy/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"states": states}})),
        )
        .mount(server)
        .await;
}

async fn mount_images(server: &MockServer, images: Value) {
    Mock::given(method("POST"))
        .and(path("/catalog/product/get-images/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": images })))
        .mount(server)
        .await;
}

async fn mount_microdata(server: &MockServer, id: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/product/microdata/{id}/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"offers": {"url": format!("https://shop.example/product/{id}/")}}
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn root_and_leaf() -> Value {
    json!([{
        "id": "1", "title": "Root", "url": "/",
        "childs": [{"id": "2", "title": "Leaf", "url": "/leaf", "childs": []}]
    }])
}

// ============================================================================
// Full pipeline
// ============================================================================

#[tokio::test]
async fn test_harvest_root_and_leaf() {
    let server = MockServer::start().await;
    mount_menu(&server, root_and_leaf()).await;
    mount_listing(&server, "/leaf", listing(&["A", "B"])).await;
    // The branch category must never be searched for products
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    // States come back in reverse order
    mount_states(&server, vec![state("B", "Bee", 20.0), state("A", "Ay", 10.0)]).await;
    mount_images(
        &server,
        json!({
            "A": ["https://cdn.example/a1.jpg", "https://cdn.example/a2.jpg"],
            "B": ["https://cdn.example/b1.jpg"]
        }),
    )
    .await;
    mount_microdata(&server, "A").await;
    mount_microdata(&server, "B").await;

    let (_temp_dir, db) = create_test_db();
    let client = client_for(&server);
    let summary = execute_harvest(&client, &db, &HarvestOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(summary.categories, 2);
    assert_eq!(summary.leaf_categories, 1);
    assert_eq!(summary.harvested_categories, 1);
    assert_eq!(summary.products_stored, 2);
    assert_eq!(summary.relations_written, 2);
    assert!(summary.finished_at.is_some());

    let categories = db.get_categories().unwrap();
    assert_eq!(
        categories,
        vec![
            ("1".to_string(), None, "Root".to_string(), 0),
            ("2".to_string(), Some("1".to_string()), "Leaf".to_string(), 1),
        ]
    );

    let a = db.get_product("A").unwrap().unwrap();
    assert_eq!(
        a,
        Product {
            id: "A".to_string(),
            title: "Ay".to_string(),
            price: 10.0,
            image_url: Some("https://cdn.example/a1.jpg".to_string()),
            product_url: Some("https://shop.example/product/A/".to_string()),
        }
    );
    let b = db.get_product("B").unwrap().unwrap();
    assert_eq!(b.image_url.as_deref(), Some("https://cdn.example/b1.jpg"));
    assert_eq!(b.product_url.as_deref(), Some("https://shop.example/product/B/"));

    let relations = db.get_relations("A").unwrap();
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0].category_id, "2");
}

#[tokio::test]
async fn test_harvest_reports_progress_in_flattened_order() {
    let server = MockServer::start().await;
    mount_menu(&server, root_and_leaf()).await;
    mount_listing(&server, "/leaf", listing(&["A"])).await;
    mount_states(&server, vec![state("A", "Ay", 10.0)]).await;
    mount_images(&server, json!({"A": ["https://cdn.example/a.jpg"]})).await;
    mount_microdata(&server, "A").await;

    let (_temp_dir, db) = create_test_db();
    let (events, callback) = recorder();
    execute_harvest(
        &client_for(&server),
        &db,
        &HarvestOptions::default(),
        Some(callback),
    )
    .await
    .unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[0],
        HarvestEvent::CategoryStarted { index: 0, is_leaf: false, id, .. } if id == "1"
    ));
    assert!(matches!(
        &events[1],
        HarvestEvent::CategoryStarted { index: 1, is_leaf: true, id, .. } if id == "2"
    ));
    assert!(matches!(
        &events[2],
        HarvestEvent::CategoryHarvested { stored: 1, .. }
    ));
    assert_eq!(events[1].to_string(), "[2/2] Leaf (2, level 1, leaf)");
}

// ============================================================================
// Category-level skips
// ============================================================================

#[tokio::test]
async fn test_listing_without_marker_skips_category_and_continues() {
    let server = MockServer::start().await;
    mount_menu(
        &server,
        json!([
            {"id": "1", "title": "Empty", "url": "/empty", "childs": []},
            {"id": "2", "title": "Full", "url": "/full", "childs": []}
        ]),
    )
    .await;
    mount_listing(
        &server,
        "/empty",
        json!({"assets": {"inlineJs": {"a": "window.AjaxState.register([[{\"type\":\"banner\"},[]]]);"}}}),
    )
    .await;
    mount_listing(&server, "/full", listing(&["A"])).await;
    mount_states(&server, vec![state("A", "Ay", 10.0)]).await;
    mount_images(&server, json!({"A": ["https://cdn.example/a.jpg"]})).await;
    mount_microdata(&server, "A").await;

    let (_temp_dir, db) = create_test_db();
    let (events, callback) = recorder();
    let summary = execute_harvest(
        &client_for(&server),
        &db,
        &HarvestOptions::default(),
        Some(callback),
    )
    .await
    .unwrap();

    // Both category rows are written regardless of product outcome
    assert_eq!(db.counts().unwrap().categories, 2);
    assert_eq!(summary.skipped_categories.len(), 1);
    assert_eq!(summary.skipped_categories[0].id, "1");
    assert_eq!(summary.products_stored, 1);

    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        HarvestEvent::CategorySkipped { reason: CategorySkip::NoProducts, .. }
    )));
}

#[tokio::test]
async fn test_listing_http_error_skips_category() {
    let server = MockServer::start().await;
    mount_menu(
        &server,
        json!([{"id": "1", "title": "Broken", "url": "/broken", "childs": []}]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let (_temp_dir, db) = create_test_db();
    let summary = execute_harvest(&client_for(&server), &db, &HarvestOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(summary.skipped_categories.len(), 1);
    assert!(summary.skipped_categories[0].reason.contains("403"));
    assert_eq!(db.counts().unwrap().categories, 1);
    assert_eq!(db.counts().unwrap().products, 0);
}

#[tokio::test]
async fn test_product_info_failure_skips_category() {
    let server = MockServer::start().await;
    mount_menu(
        &server,
        json!([{"id": "1", "title": "Leaf", "url": "/leaf", "childs": []}]),
    )
    .await;
    mount_listing(&server, "/leaf", listing(&["A"])).await;
    Mock::given(method("POST"))
        .and(path("/ajax-state/product-buy/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/catalog/product/get-images/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .expect(0)
        .mount(&server)
        .await;

    let (_temp_dir, db) = create_test_db();
    let (events, callback) = recorder();
    let summary = execute_harvest(
        &client_for(&server),
        &db,
        &HarvestOptions::default(),
        Some(callback),
    )
    .await
    .unwrap();

    assert_eq!(summary.harvested_categories, 0);
    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        HarvestEvent::CategorySkipped { reason: CategorySkip::ProductInfo(_), .. }
    )));
}

#[tokio::test]
async fn test_image_failure_skips_category() {
    let server = MockServer::start().await;
    mount_menu(
        &server,
        json!([{"id": "1", "title": "Leaf", "url": "/leaf", "childs": []}]),
    )
    .await;
    mount_listing(&server, "/leaf", listing(&["A"])).await;
    mount_states(&server, vec![state("A", "Ay", 10.0)]).await;
    Mock::given(method("POST"))
        .and(path("/catalog/product/get-images/"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let (_temp_dir, db) = create_test_db();
    let summary = execute_harvest(&client_for(&server), &db, &HarvestOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(summary.skipped_categories.len(), 1);
    assert!(summary.skipped_categories[0].reason.starts_with("image lookup failed"));
    assert_eq!(db.counts().unwrap().products, 0);
}

// ============================================================================
// Product-level skips
// ============================================================================

#[tokio::test]
async fn test_missing_image_skips_only_that_product() {
    let server = MockServer::start().await;
    mount_menu(
        &server,
        json!([{"id": "1", "title": "Leaf", "url": "/leaf", "childs": []}]),
    )
    .await;
    mount_listing(&server, "/leaf", listing(&["A", "B", "C"])).await;
    mount_states(
        &server,
        vec![
            state("A", "Ay", 10.0),
            state("B", "Bee", 20.0),
            state("C", "Cee", 30.0),
        ],
    )
    .await;
    mount_images(
        &server,
        json!({"A": ["https://cdn.example/a.jpg"], "C": []}),
    )
    .await;
    mount_microdata(&server, "A").await;
    Mock::given(method("POST"))
        .and(path("/product/microdata/B/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (_temp_dir, db) = create_test_db();
    let (events, callback) = recorder();
    let summary = execute_harvest(
        &client_for(&server),
        &db,
        &HarvestOptions::default(),
        Some(callback),
    )
    .await
    .unwrap();

    assert_eq!(summary.products_stored, 1);
    assert_eq!(summary.products_skipped, 2);
    assert!(db.product_exists("A").unwrap());
    assert!(!db.product_exists("B").unwrap());
    assert!(!db.product_exists("C").unwrap());
    assert!(db.get_relations("B").unwrap().is_empty());

    let events = events.lock().unwrap();
    let skips: Vec<(String, ProductSkip)> = events
        .iter()
        .filter_map(|e| match e {
            HarvestEvent::ProductSkipped { product_id, reason } => {
                Some((product_id.clone(), reason.clone()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        skips,
        vec![
            ("B".to_string(), ProductSkip::MissingImages),
            ("C".to_string(), ProductSkip::NoImages),
        ]
    );
}

#[tokio::test]
async fn test_url_failure_skips_only_that_product() {
    let server = MockServer::start().await;
    mount_menu(
        &server,
        json!([{"id": "1", "title": "Leaf", "url": "/leaf", "childs": []}]),
    )
    .await;
    mount_listing(&server, "/leaf", listing(&["A", "B"])).await;
    mount_states(&server, vec![state("A", "Ay", 10.0), state("B", "Bee", 20.0)]).await;
    mount_images(
        &server,
        json!({"A": ["https://cdn.example/a.jpg"], "B": ["https://cdn.example/b.jpg"]}),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/product/microdata/A/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_microdata(&server, "B").await;

    let (_temp_dir, db) = create_test_db();
    let summary = execute_harvest(&client_for(&server), &db, &HarvestOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(summary.harvested_categories, 1);
    assert_eq!(summary.products_stored, 1);
    assert_eq!(summary.products_skipped, 1);
    assert!(!db.product_exists("A").unwrap());
    assert!(db.product_exists("B").unwrap());
}

#[tokio::test]
async fn test_enrich_product_keys_images_by_id() {
    let server = MockServer::start().await;
    mount_microdata(&server, "B").await;

    let state: ProductState = serde_json::from_value(state("B", "Bee", 20.0)).unwrap();
    let images: HashMap<String, Vec<String>> = HashMap::from([
        ("A".to_string(), vec!["https://cdn.example/a.jpg".to_string()]),
        ("B".to_string(), vec!["https://cdn.example/b.jpg".to_string()]),
    ]);

    let product = enrich_product(&client_for(&server), &state, &images)
        .await
        .unwrap();
    assert_eq!(product.image_url.as_deref(), Some("https://cdn.example/b.jpg"));
    assert_eq!(product.title, "Bee");
    assert_eq!(product.price, 20.0);
}

// ============================================================================
// Re-runs against a populated store
// ============================================================================

#[tokio::test]
async fn test_existing_product_is_left_unchanged() {
    let server = MockServer::start().await;
    mount_menu(
        &server,
        json!([{"id": "1", "title": "Leaf", "url": "/leaf", "childs": []}]),
    )
    .await;
    mount_listing(&server, "/leaf", listing(&["A"])).await;
    mount_states(&server, vec![state("A", "New name", 99.0)]).await;
    mount_images(&server, json!({"A": ["https://cdn.example/new.jpg"]})).await;
    mount_microdata(&server, "A").await;

    let (_temp_dir, db) = create_test_db();
    let existing = Product {
        id: "A".to_string(),
        title: "Old name".to_string(),
        price: 10.0,
        image_url: None,
        product_url: None,
    };
    db.insert_product(&existing).unwrap();

    let summary = execute_harvest(&client_for(&server), &db, &HarvestOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(summary.products_already_present, 1);
    assert_eq!(summary.products_stored, 0);
    assert_eq!(db.get_product("A").unwrap().unwrap(), existing);
    assert_eq!(db.counts().unwrap().products, 1);
    // The relation is still written
    assert_eq!(db.get_relations("A").unwrap().len(), 1);
}

#[tokio::test]
async fn test_second_harvest_without_clear_fails_on_category_row() {
    let server = MockServer::start().await;
    mount_menu(
        &server,
        json!([{"id": "1", "title": "Branch", "url": "/b", "childs": [
            {"id": "2", "title": "Empty", "url": "/e"}
        ]}]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/e"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"assets": {"inlineJs": {}}})))
        .mount(&server)
        .await;

    let (_temp_dir, db) = create_test_db();
    let client = client_for(&server);
    execute_harvest(&client, &db, &HarvestOptions::default(), None)
        .await
        .unwrap();

    let err = execute_harvest(&client, &db, &HarvestOptions::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Store { ref entity, .. } if entity.contains("Branch")));

    db.clear().unwrap();
    assert!(
        execute_harvest(&client, &db, &HarvestOptions::default(), None)
            .await
            .is_ok()
    );
}

// ============================================================================
// Fatal errors
// ============================================================================

#[tokio::test]
async fn test_menu_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/get-menu"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (_temp_dir, db) = create_test_db();
    let err = execute_harvest(&client_for(&server), &db, &HarvestOptions::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Scan(ref e) if e.is_fetch()));
}

#[tokio::test]
async fn test_schema_error_writes_nothing() {
    let server = MockServer::start().await;
    mount_menu(
        &server,
        json!([
            {"id": "1", "title": "Fine", "url": "/fine", "childs": []},
            {"id": "2", "url": "/untitled", "childs": []}
        ]),
    )
    .await;

    let (_temp_dir, db) = create_test_db();
    let err = execute_harvest(&client_for(&server), &db, &HarvestOptions::default(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::Schema { ref field, .. } if field == "title"));
    assert_eq!(db.counts().unwrap().categories, 0);
}

#[test]
fn test_category_outcome_equality() {
    assert_ne!(
        CategoryOutcome::Branch,
        CategoryOutcome::Skipped(CategorySkip::NoProducts)
    );
}
