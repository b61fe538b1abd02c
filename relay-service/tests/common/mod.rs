#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response},
    Router,
};
use http_body_util::BodyExt;
use relay_service::config::RelayConfig;
use relay_service::services::providers::mock::MockChatProvider;
use relay_service::{build_router, AppState};
use service_core::config::Config;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

/// Config with a dummy key, a random port and the given overrides.
pub fn test_config(overrides: &[(&str, &str)]) -> RelayConfig {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("GEMINI_API_KEY".to_string(), "test-api-key".to_string());
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }

    RelayConfig::from_lookup(Config { port: 0 }, |key| vars.get(key).cloned())
        .expect("Failed to build test config")
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub provider: Arc<MockChatProvider>,
}

pub fn spawn_router(provider: MockChatProvider, overrides: &[(&str, &str)]) -> TestApp {
    let provider = Arc::new(provider);
    let state = AppState::new(&test_config(overrides), provider.clone());
    let router = build_router(state.clone());

    TestApp {
        router,
        state,
        provider,
    }
}

/// A GET as if it came from `ip` over a real socket.
pub fn get_from(uri: &str, ip: [u8; 4]) -> Request<Body> {
    let mut req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
    req
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}
