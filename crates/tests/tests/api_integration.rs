
use axum::body::Body;
use axum::http::{Request, StatusCode};
use kisan_api::{build_app, ServerConfig, DEFAULT_API_KEY};
use kisan_core::{Language, Rulebook};
use serde_json::json;
use tower::ServiceExt;

use common::{json_body, post_json};

fn offline_app() -> axum::Router {
    build_app(&ServerConfig::default()).expect("app should build")
}

#[tokio::test]
async fn health_is_public() {
    let response = offline_app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-content-type-options").unwrap(), "nosniff");
    assert!(response.headers().get("x-request-id").is_some());

    let payload = json_body(response).await;
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["capabilities"]["llm_proxy"], false);
    assert_eq!(payload["capabilities"]["remote_backend"], "offline");
    assert!(payload["capabilities"]["intent_rules"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn assistant_requires_api_key() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/assistant/route")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "transcript": "weather" }).to_string()))
        .unwrap();

    let response = offline_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "unauthorized");
}

#[tokio::test]
async fn allowed_origin_needs_no_key() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/assistant/route")
        .header("content-type", "application/json")
        .header("origin", "http://localhost:5173")
        .body(Body::from(json!({ "transcript": "open the marketplace" }).to_string()))
        .unwrap();

    let response = offline_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["route"], "/features/marketplace");
}

#[tokio::test]
async fn route_prefers_specific_phrases() {
    let app = offline_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/assistant/route",
            json!({ "transcript": "  Open WEATHER PREDICTION " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["route"], "/features/weather");

    let response = app
        .oneshot(post_json("/v1/assistant/route", json!({ "transcript": "   " })))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["route"], serde_json::Value::Null);
}

#[tokio::test]
async fn empty_transcript_answers_with_localized_help() {
    let response = offline_app()
        .oneshot(post_json(
            "/v1/assistant/answer",
            json!({ "transcript": "", "language": "hi" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let payload = json_body(response).await;
    let table = Rulebook::builtin().fallback_table();
    assert_eq!(payload["text"], table.lookup("help", Language::Hi).text);
    assert_eq!(payload["source"], "local");
    assert_eq!(payload["keyword"], "help");
    assert_eq!(payload["language"], "hi");
    assert_eq!(payload["locale_tag"], "hi-IN");
    assert_eq!(payload["route"], serde_json::Value::Null);
}

#[tokio::test]
async fn offline_answer_uses_fallback_table() {
    let response = offline_app()
        .oneshot(post_json(
            "/v1/assistant/answer",
            json!({ "transcript": "what's the crop price today", "language": "en" }),
        ))
        .await
        .unwrap();

    let payload = json_body(response).await;
    assert!(payload["text"].as_str().unwrap().contains("Crop Rates"));
    assert_eq!(payload["keyword"], "crop");
    assert_eq!(payload["route"], "/features/crop-prices");
    assert_eq!(payload["locale_tag"], "en-IN");
}

#[tokio::test]
async fn unknown_language_degrades_to_english() {
    let response = offline_app()
        .oneshot(post_json(
            "/v1/assistant/answer",
            json!({ "transcript": "xyz", "language": "fr" }),
        ))
        .await
        .unwrap();

    let payload = json_body(response).await;
    let table = Rulebook::builtin().fallback_table();
    assert_eq!(payload["language"], "en");
    assert_eq!(payload["text"], table.no_match().get(Language::En));
    assert_eq!(payload["keyword"], serde_json::Value::Null);
}

#[tokio::test]
async fn locale_endpoint_resolves_nearest_language() {
    let app = offline_app();

    for (code, tag) in [("te", "te-IN"), ("mr", "hi-IN"), ("kn", "te-IN"), ("fr", "en-US")] {
        let request = Request::builder()
            .uri(format!("/v1/assistant/locale/{code}"))
            .header("x-api-key", DEFAULT_API_KEY)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["locale_tag"], tag, "code {code}");
    }
}

#[tokio::test]
async fn chat_proxy_validates_before_configuration() {
    let app = offline_app();

    let response = app
        .clone()
        .oneshot(post_json("/api/chat", json!({ "query": "  ", "type": "chat" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());

    let response = app
        .oneshot(post_json(
            "/api/chat",
            json!({ "query": "when to sow wheat", "type": "farming-tip", "language": "Hindi" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn chat_proxy_treats_missing_query_as_blank() {
    let app = offline_app();

    for body in [json!({}), json!({ "type": "chat" })] {
        let response = app.clone().oneshot(post_json("/api/chat", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "query is required");
    }
}

#[tokio::test]
async fn chat_proxy_rejects_unknown_type_as_json() {
    let response = offline_app()
        .oneshot(post_json(
            "/api/chat",
            json!({ "query": "rates?", "type": "horoscope" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    let payload = json_body(response).await;
    assert!(payload["error"].as_str().unwrap().contains("horoscope"));
}

#[tokio::test]
async fn answer_rejects_bad_bodies_with_error_json() {
    let app = offline_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/assistant/answer",
            json!({ "transcript": "weather", "type": "horoscope" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = json_body(response).await;
    assert_eq!(payload["error"], "invalid_request");
    assert!(payload["message"].as_str().unwrap().contains("horoscope"));

    let request = Request::builder()
        .method("POST")
        .uri("/v1/assistant/route")
        .header("content-type", "application/json")
        .header("x-api-key", DEFAULT_API_KEY)
        .body(Body::from("{\"transcript\": "))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn answer_accepts_cli_spellings_of_type() {
    let response = offline_app()
        .oneshot(post_json(
            "/v1/assistant/answer",
            json!({ "transcript": "mandi rate", "type": "crop_price" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["route"], "/features/crop-prices");
}

#[tokio::test]
async fn wildcard_origin_is_ignored_by_cors() {
    let config = ServerConfig {
        allowed_origins: vec!["*".to_string(), "https://app.kisan.in".to_string()],
        ..ServerConfig::default()
    };
    let app = build_app(&config).expect("wildcard origin must not abort startup");

    let request = Request::builder()
        .method("POST")
        .uri("/v1/assistant/route")
        .header("content-type", "application/json")
        .header("origin", "https://evil.example")
        .body(Body::from(json!({ "transcript": "news" }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rate_limit_rejects_excess_requests() {
    let config = ServerConfig {
        rate_limit_max: 2,
        ..ServerConfig::default()
    };
    let app = build_app(&config).unwrap();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json("/v1/assistant/route", json!({ "transcript": "news" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(post_json("/v1/assistant/route", json!({ "transcript": "news" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let transcript = "weather ".repeat(4 * 1024);
    let response = offline_app()
        .oneshot(post_json("/v1/assistant/route", json!({ "transcript": transcript })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn custom_rulebook_is_loaded_from_path() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("kisan-rulebook-{}.json", std::process::id()));
    let mut rulebook = Rulebook::builtin();
    rulebook.intent_rules.insert(
        0,
        kisan_core::IntentRule::new("tractor rental", "/features/equipment"),
    );
    std::fs::write(&path, serde_json::to_string(&rulebook)?)?;

    let config = ServerConfig {
        rulebook_path: Some(path.clone()),
        ..ServerConfig::default()
    };
    let response = build_app(&config)?
        .oneshot(post_json(
            "/v1/assistant/route",
            json!({ "transcript": "need a tractor rental" }),
        ))
        .await?;
    assert_eq!(json_body(response).await["route"], "/features/equipment");

    std::fs::remove_file(path)?;
    Ok(())
}

#[tokio::test]
async fn missing_rulebook_fails_to_build() {
    let config = ServerConfig {
        rulebook_path: Some("/nonexistent/kisan/rules.json".into()),
        ..ServerConfig::default()
    };
    let err = build_app(&config).unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/kisan/rules.json"));
}
