#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use serde_json::{json, Value as JsonValue};
use url::Url;

use quiz_client::services::api_client::ApiClient;

/// Serves `router` on an ephemeral port and returns the API base URL.
pub async fn spawn_api(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake api");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("fake api");
    });
    Url::parse(&format!("http://{}/api/", addr)).expect("base url")
}

pub async fn client_for(router: Router) -> ApiClient {
    let base = spawn_api(router).await;
    ApiClient::new(base, Duration::from_secs(5)).expect("api client")
}

pub fn user_json(role: &str, token: &str) -> JsonValue {
    json!({
        "_id": format!("{}-1", role),
        "name": format!("Test {}", role),
        "username": role,
        "email": format!("{}@uni.example", role),
        "role": role,
        "token": token,
    })
}
