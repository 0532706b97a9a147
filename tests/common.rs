#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, Response};
use axum::Router;
use dumbometrics::config::{extract_config, Config};
use dumbometrics::hooks::Hooks;
use dumbometrics::routes::create_router;
use dumbometrics::startup::build_state;
use dumbometrics::state::AppState;
use figment::{
    providers::{Format, Serialized, Yaml},
    Figment,
};

pub const TEST_CONFIG: &str = r#"
metrics_ip: 127.0.0.1
metrics_port: 9091
metrics_namespace: Test
cache_backend: memory
logging:
  level: debug
  format: console
"#;

/// Parses `yaml` on top of the built-in defaults.
pub fn load_test_config(yaml: &str) -> Config {
    let figment = Figment::from(Serialized::defaults(Config::default())).merge(Yaml::string(yaml));
    extract_config(&figment).expect("Failed to parse test config YAML")
}

pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("dumbometrics-it-{}", uuid::Uuid::new_v4().simple()))
}

pub async fn build_app(config: Config, hooks: Hooks) -> (Router, AppState) {
    let state = build_state(Arc::new(config), hooks)
        .await
        .expect("failed to build state");
    (create_router(state.clone()), state)
}

pub fn request(path: &str, method: Method) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request")
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    String::from_utf8(bytes.to_vec()).expect("body is not UTF-8")
}
