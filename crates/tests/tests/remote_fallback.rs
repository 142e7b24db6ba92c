
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use kisan_api::{build_app, OpenAiConfig, ServerConfig};
use kisan_assistant::ResponseResolver;
use kisan_core::{Answer, Language, Rulebook};
use kisan_llm::{
    http_client, AnswerRequest, AnswerService, ChatEndpointClient, RemoteBackend, RemoteError,
};
use kisan_observability::AppMetrics;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{json_body, post_json, spawn_mock};

const ENDPOINT_KEY: &str = "endpoint-secret";

fn responses_mock(text: &'static str) -> Router {
    Router::new().route(
        "/v1/responses",
        post(move |headers: HeaderMap, Json(body): Json<Value>| async move {
            let authorized = headers
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                == Some("Bearer sk-test");
            if !authorized || body["model"] != "gpt-test" {
                return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad key" })));
            }
            let payload = json!({
                "output": [
                    {
                        "type": "message",
                        "content": [{ "type": "output_text", "text": text }]
                    }
                ]
            });
            (StatusCode::OK, Json(payload))
        }),
    )
}

/// A `/api/chat` stand-in that echoes the fixed `reply` to keyed callers.
fn chat_mock(status: StatusCode, reply: Value) -> Router {
    Router::new().route(
        "/api/chat",
        post(move |headers: HeaderMap, Json(_): Json<AnswerRequest>| {
            let reply = reply.clone();
            async move {
                if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some(ENDPOINT_KEY) {
                    return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" })));
                }
                (status, Json(reply))
            }
        }),
    )
}

async fn endpoint_client(status: StatusCode, reply: Value) -> ChatEndpointClient {
    let addr = spawn_mock(chat_mock(status, reply)).await;
    ChatEndpointClient::parse(http_client().unwrap(), &format!("http://{addr}/api/chat"))
        .unwrap()
        .with_api_key(ENDPOINT_KEY)
}

/// Replies 200 with `body` verbatim, whatever it is.
async fn raw_endpoint_client(body: &'static str) -> ChatEndpointClient {
    let router = Router::new().route("/api/chat", post(move || async move { body }));
    let addr = spawn_mock(router).await;
    ChatEndpointClient::parse(http_client().unwrap(), &format!("http://{addr}/api/chat")).unwrap()
}

fn resolver(remote: RemoteBackend) -> ResponseResolver<RemoteBackend> {
    ResponseResolver::new(
        remote,
        Rulebook::builtin().fallback_table(),
        AppMetrics::shared(),
    )
}

#[tokio::test]
async fn chat_proxy_returns_llm_answer() {
    let addr = spawn_mock(responses_mock("  Irrigate early in the morning.  ")).await;
    let config = ServerConfig {
        openai: Some(OpenAiConfig {
            api_key: "sk-test".to_string(),
            model: Some("gpt-test".to_string()),
            base_url: Some(format!("http://{addr}/v1/")),
        }),
        ..ServerConfig::default()
    };
    let app = build_app(&config).unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/chat",
            json!({ "query": "how to water wheat", "type": "farming-tip", "language": "English" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "response": "Irrigate early in the morning." })
    );

    let response = app
        .oneshot(post_json(
            "/v1/assistant/answer",
            json!({ "transcript": "check weather", "language": "te" }),
        ))
        .await
        .unwrap();
    let payload = json_body(response).await;
    assert_eq!(payload["source"], "remote");
    assert_eq!(payload["text"], "Irrigate early in the morning.");
    assert_eq!(payload["route"], "/features/weather");
    assert_eq!(payload["locale_tag"], "te-IN");
}

#[tokio::test]
async fn chat_proxy_maps_upstream_failure_to_bad_gateway() {
    let addr = spawn_mock(responses_mock("unused")).await;
    let config = ServerConfig {
        openai: Some(OpenAiConfig {
            api_key: "sk-wrong".to_string(),
            model: Some("gpt-test".to_string()),
            base_url: Some(format!("http://{addr}/v1")),
        }),
        ..ServerConfig::default()
    };

    let response = build_app(&config)
        .unwrap()
        .oneshot(post_json("/api/chat", json!({ "query": "mandi news" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn endpoint_client_sends_key_and_request_shape() {
    let client = endpoint_client(StatusCode::OK, json!({ "response": " Sow after the first rain. " })).await;
    let request = AnswerRequest::new("when to sow", Default::default(), Language::Hi);
    assert_eq!(client.ask(&request).await.unwrap(), "Sow after the first rain.");

    let unkeyed = ChatEndpointClient::new(http_client().unwrap(), client.endpoint().clone());
    let err = unkeyed.ask(&request).await.unwrap_err();
    assert!(matches!(err, RemoteError::Service(message) if message == "unauthorized"));
}

#[tokio::test]
async fn endpoint_error_payload_is_reported() {
    let client = endpoint_client(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "model overloaded" }),
    )
    .await;
    let request = AnswerRequest::new("price", Default::default(), Language::En);
    let err = client.ask(&request).await.unwrap_err();
    assert!(matches!(err, RemoteError::Service(message) if message == "model overloaded"));
}

#[tokio::test]
async fn blank_remote_response_falls_back_locally() {
    let client = endpoint_client(StatusCode::OK, json!({ "response": "  " })).await;
    let resolver = resolver(RemoteBackend::Endpoint(client));

    let answer = resolver
        .answer("what's the crop price today", Language::En)
        .await;
    assert!(matches!(&answer, Answer::Local { keyword: Some(keyword), .. } if keyword == "crop"));
    assert!(answer.text().contains("Crop Rates"));
}

#[tokio::test]
async fn non_json_success_body_is_malformed_and_falls_back() {
    let client = raw_endpoint_client("<html>upstream gateway</html>").await;
    let request = AnswerRequest::new("weather", Default::default(), Language::En);
    let err = client.ask(&request).await.unwrap_err();
    assert!(matches!(err, RemoteError::Malformed(_)), "got {err:?}");

    let answer = resolver(RemoteBackend::Endpoint(client))
        .answer("weather today", Language::En)
        .await;
    assert!(matches!(&answer, Answer::Local { keyword: Some(keyword), .. } if keyword == "weather"));
}

#[tokio::test]
async fn success_without_response_field_is_malformed_and_falls_back() {
    let client = endpoint_client(StatusCode::OK, json!({})).await;
    let request = AnswerRequest::new("soil", Default::default(), Language::Te);
    let err = client.ask(&request).await.unwrap_err();
    assert!(
        matches!(&err, RemoteError::Malformed(message) if message.contains("response")),
        "got {err:?}"
    );

    let table = Rulebook::builtin().fallback_table();
    let answer = resolver(RemoteBackend::Endpoint(client))
        .answer("soil test", Language::Te)
        .await;
    assert!(matches!(answer, Answer::Local { .. }));
    assert_eq!(answer.text(), table.lookup("soil", Language::Te).text);
}

#[tokio::test]
async fn success_status_with_error_payload_falls_back() {
    let client = endpoint_client(StatusCode::OK, json!({ "error": "quota exhausted" })).await;
    let request = AnswerRequest::new("pest", Default::default(), Language::En);
    let err = client.ask(&request).await.unwrap_err();
    assert!(matches!(err, RemoteError::Service(message) if message == "quota exhausted"));

    let answer = resolver(RemoteBackend::Endpoint(client))
        .answer("pest on my cotton", Language::En)
        .await;
    assert!(matches!(&answer, Answer::Local { keyword: Some(keyword), .. } if keyword == "pest"));
}

#[tokio::test]
async fn remote_error_falls_back_in_requested_language() {
    let client = endpoint_client(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "model overloaded" }),
    )
    .await;
    let resolver = resolver(RemoteBackend::Endpoint(client));
    let table = Rulebook::builtin().fallback_table();

    let answer = resolver.answer("बारिश कब होगी?", Language::Hi).await;
    assert!(matches!(&answer, Answer::Local { keyword: Some(keyword), .. } if keyword == "बारिश"));
    assert_eq!(answer.text(), table.lookup("rain", Language::Hi).text);
}

#[tokio::test]
async fn unreachable_endpoint_falls_back() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        ChatEndpointClient::parse(http_client().unwrap(), &format!("http://{addr}/api/chat")).unwrap();
    let metrics = AppMetrics::shared();
    let resolver = ResponseResolver::new(
        RemoteBackend::Endpoint(client),
        Rulebook::builtin().fallback_table(),
        Arc::clone(&metrics),
    );

    let answer = resolver.answer("hello", Language::Te).await;
    assert!(matches!(answer, Answer::Local { .. }));
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.remote_failures_total, 1);
    assert_eq!(snapshot.fallback_total, 1);
}

#[tokio::test]
async fn assistant_answer_through_keyed_endpoint() {
    let addr = spawn_mock(chat_mock(
        StatusCode::OK,
        json!({ "response": "Tomato prices are rising this week." }),
    ))
    .await;
    let config = ServerConfig {
        chat_endpoint: Some(format!("http://{addr}/api/chat")),
        chat_endpoint_key: Some(ENDPOINT_KEY.to_string()),
        ..ServerConfig::default()
    };

    let response = build_app(&config)
        .unwrap()
        .oneshot(post_json(
            "/v1/assistant/answer",
            json!({ "transcript": "sell my tomatoes", "language": "ta" }),
        ))
        .await
        .unwrap();
    let payload = json_body(response).await;
    assert_eq!(payload["source"], "remote");
    assert_eq!(payload["text"], "Tomato prices are rising this week.");
    assert_eq!(payload["route"], "/features/marketplace");
    assert_eq!(payload["locale_tag"], "ta-IN");
}
