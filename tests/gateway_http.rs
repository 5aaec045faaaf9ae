use std::{net::SocketAddr, sync::Arc};

use pour_cost_gateway::{
    app::build_router,
    config::Config,
    domain::{CocktailPricing, CocktailRecord, Recipe},
    infra::memory::{MemoryCache, MemoryStore, RecordingPublisher, StaticOcr},
    state::AppState,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

struct Gateway {
    addr: SocketAddr,
    store: MemoryStore,
    publisher: RecordingPublisher,
}

async fn spawn_gateway() -> Gateway {
    let config = Config::from_lookup(
        |key: &str| (key == "DATABASE_URL").then(|| "postgres://memory".to_string()),
        |_: &str| None,
    )
    .expect("config");

    let store = MemoryStore::new();
    store
        .put_cocktail(CocktailRecord {
            id: "7".to_string(),
            pricing: CocktailPricing {
                name: "Gin & Tonic".to_string(),
                price: 2.0,
                recipe: Recipe::from([("gin", 2.0), ("tonic", 4.0)]),
            },
        })
        .await;
    store.put_cost("gin", 0.5).await;
    store.put_cost("tonic", 0.1).await;

    let publisher = RecordingPublisher::new();
    let state = AppState::with_collaborators(
        config,
        Arc::new(store.clone()),
        Arc::new(MemoryCache::new()),
        Arc::new(publisher.clone()),
        Some(Arc::new(StaticOcr::new("SOURS\nWhiskey Sour $13"))),
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });

    Gateway {
        addr,
        store,
        publisher,
    }
}

async fn send_raw(addr: SocketAddr, method: &str, path: &str, body: Option<&str>) -> (u16, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let req = match body {
        Some(body) => format!(
            "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        ),
        None => format!(
            "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\nContent-Length: 0\r\n\r\n"
        ),
    };
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("status");
    (status, body.to_string())
}

fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).expect("json body")
}

#[tokio::test]
async fn health_reports_the_service() {
    let gw = spawn_gateway().await;
    let (status, body) = send_raw(gw.addr, "GET", "/health", None).await;
    assert_eq!(status, 200);
    let health = json(&body);
    assert_eq!(health["status"], "ok");
    assert!(health["version"].is_string());
}

#[tokio::test]
async fn calculate_cost_over_http_alerts_on_thin_margin() {
    let gw = spawn_gateway().await;

    let (status, body) = send_raw(
        gw.addr,
        "POST",
        "/api/cocktails/calculate-cost?cocktail_id=7",
        None,
    )
    .await;
    assert_eq!(status, 200, "{body}");
    let priced = json(&body);
    assert_eq!(priced["cocktail"], "Gin & Tonic");
    assert_eq!(priced["should_alert"], true);
    assert_eq!(priced["status"], "over_target");

    let (status, body) = send_raw(
        gw.addr,
        "POST",
        "/api/cocktails/calculate-cost",
        Some(r#"{"cocktail_id": "7"}"#),
    )
    .await;
    assert_eq!(status, 200, "{body}");

    let published = gw.publisher.published().await;
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].channel, "alerts");
    assert_eq!(published[0].event, "low-margin");
}

#[tokio::test]
async fn errors_are_json_with_a_kind() {
    let gw = spawn_gateway().await;

    let (status, body) = send_raw(
        gw.addr,
        "POST",
        "/api/cocktails/calculate-cost?cocktail_id=404",
        None,
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(json(&body)["error"], "not_found");

    let (status, body) = send_raw(gw.addr, "GET", "/api/cocktails/search?q=", None).await;
    assert_eq!(status, 400);
    assert_eq!(json(&body)["error"], "malformed_payload");

    let (status, body) = send_raw(
        gw.addr,
        "GET",
        "/api/cocktails/search?q=gin&limit=many",
        None,
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(json(&body)["error"], "malformed_payload");

    let (status, body) = send_raw(gw.addr, "POST", "/api/86-list/add", Some("{\"name\": 1}")).await;
    assert_eq!(status, 400);
    assert_eq!(json(&body)["error"], "malformed_payload");
}

#[tokio::test]
async fn search_is_cached_between_requests() {
    let gw = spawn_gateway().await;

    for _ in 0..3 {
        let (status, body) = send_raw(gw.addr, "GET", "/api/cocktails/search?q=tonic", None).await;
        assert_eq!(status, 200);
        assert_eq!(json(&body)[0]["name"], "Gin & Tonic");
    }
    assert_eq!(gw.store.search_count(), 1);
}

#[tokio::test]
async fn eighty_six_round_trip() {
    let gw = spawn_gateway().await;

    let (status, body) = send_raw(
        gw.addr,
        "POST",
        "/api/86-list/add",
        Some(r#"{"name": "Fernet", "category": "spirits", "user_id": "u-9"}"#),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(json(&body)["item_name"], "Fernet");

    let (status, body) = send_raw(gw.addr, "GET", "/api/86-list", None).await;
    assert_eq!(status, 200);
    assert_eq!(json(&body)[0]["added_by"], "u-9");

    let published = gw.publisher.published().await;
    assert_eq!(published[0].channel, "86-list");
    assert_eq!(published[0].event, "item-added");
}

#[tokio::test]
async fn menu_ocr_and_summary() {
    let gw = spawn_gateway().await;

    let (status, body) = send_raw(
        gw.addr,
        "POST",
        "/api/ocr/menu?image_url=https://images.example/menu.jpg",
        None,
    )
    .await;
    assert_eq!(status, 200, "{body}");
    let menu = json(&body);
    assert_eq!(menu["parsed_items"][0]["name"], "Whiskey Sour");
    assert_eq!(menu["parsed_items"][0]["section"], "SOURS");

    let (status, body) = send_raw(
        gw.addr,
        "POST",
        "/api/cocktails/cost-summary",
        Some(r#"{"cocktail_ids": ["7"]}"#),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    let summary = json(&body);
    assert_eq!(summary["summary"]["over_target"], 1);
    let item = &summary["items"][0];
    assert_eq!(item["cocktail_id"], "7");
    assert_eq!(item["name"], "Gin & Tonic");
    assert_eq!(item["status"], "over_target");
    assert!(item["result"]["total_cost"].is_number());
    assert!(item.get("cocktail").is_none());
    assert!(gw.publisher.published().await.is_empty());
}
