mod config;
mod rate_limit;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use kisan_assistant::VoiceAssistant;
use kisan_core::{AnswerSource, Language, LocaleTag, QueryKind, Route, Rulebook};
use kisan_llm::{AnswerReply, AnswerRequest, ChatEndpointClient, OpenAiResponder, RemoteBackend};
use kisan_observability::{AppMetrics, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::rate_limit::ClientRateLimiter;

pub use config::{OpenAiConfig, ServerConfig, DEFAULT_API_KEY};

const MAX_BODY_BYTES: usize = 16 * 1024;

#[derive(Clone)]
pub struct ApiState {
    pub assistant: Arc<VoiceAssistant<RemoteBackend>>,
    /// Backs `/api/chat`. `None` when no model is configured.
    pub llm: Option<OpenAiResponder>,
    pub remote_backend: &'static str,
    pub metrics: Arc<AppMetrics>,
    pub api_key: String,
    pub limiter: ClientRateLimiter,
    pub allowed_origins: Arc<Vec<String>>,
}

/// Outbound services derived from configuration.
#[derive(Debug, Clone)]
pub struct Backends {
    /// What the assistant's resolver asks first.
    pub remote: RemoteBackend,
    pub llm: Option<OpenAiResponder>,
}

impl Backends {
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let client = kisan_llm::http_client().context("failed to build HTTP client")?;

        let llm = match &config.openai {
            Some(openai) => {
                let mut responder = OpenAiResponder::new(client.clone(), openai.api_key.as_str());
                if let Some(model) = &openai.model {
                    responder = responder.with_model(model.as_str());
                }
                if let Some(base_url) = &openai.base_url {
                    responder = responder
                        .with_base_url(base_url)
                        .with_context(|| format!("invalid KISAN_OPENAI_BASE_URL `{base_url}`"))?;
                }
                Some(responder)
            }
            None => None,
        };

        let remote = match &config.chat_endpoint {
            Some(endpoint) => {
                let mut endpoint_client = ChatEndpointClient::parse(client, endpoint)
                    .with_context(|| format!("invalid KISAN_CHAT_ENDPOINT `{endpoint}`"))?;
                if let Some(key) = &config.chat_endpoint_key {
                    endpoint_client = endpoint_client.with_api_key(key.as_str());
                }
                RemoteBackend::Endpoint(endpoint_client)
            }
            None => llm
                .clone()
                .map(RemoteBackend::OpenAi)
                .unwrap_or(RemoteBackend::Offline),
        };

        Ok(Self { remote, llm })
    }
}

pub fn build_app(config: &ServerConfig) -> Result<Router> {
    let metrics = AppMetrics::shared();
    let rulebook = Rulebook::load(config.rulebook_path.as_deref()).context("failed to load rulebook")?;
    let backends = Backends::from_config(config)?;
    let remote_backend = backends.remote.name();

    let state = ApiState {
        assistant: Arc::new(VoiceAssistant::new(
            &rulebook,
            backends.remote,
            metrics.clone(),
        )),
        llm: backends.llm,
        remote_backend,
        metrics,
        api_key: config.api_key.clone(),
        limiter: ClientRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
        allowed_origins: Arc::new(config.allowed_origins.clone()),
    };

    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_proxy))
        .route("/v1/assistant/route", post(assistant_route))
        .route("/v1/assistant/answer", post(assistant_answer))
        .route("/v1/assistant/locale/:code", get(assistant_locale))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

pub async fn serve(config: ServerConfig) -> Result<()> {
    let app = build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(bind = %config.bind, "kisan assistant api started");

    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    capabilities: HealthCapabilities,
}

#[derive(Debug, Serialize)]
struct HealthCapabilities {
    llm_proxy: bool,
    remote_backend: &'static str,
    intent_rules: usize,
    fallback_entries: usize,
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        capabilities: HealthCapabilities {
            llm_proxy: state.llm.is_some(),
            remote_backend: state.remote_backend,
            intent_rules: state.assistant.router().rules().len(),
            fallback_entries: state.assistant.resolver().table().entries().len(),
        },
    };
    (StatusCode::OK, Json(payload))
}

async fn chat_proxy(
    State(state): State<ApiState>,
    payload: Result<Json<AnswerRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let (status, message) = rejection_parts(&rejection);
            return (status, Json(AnswerReply::error(message))).into_response();
        }
    };

    if request.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(AnswerReply::error("query is required")),
        )
            .into_response();
    }

    let Some(llm) = state.llm.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(AnswerReply::error("conversational service is not configured")),
        )
            .into_response();
    };

    match llm.respond(&request).await {
        Ok(text) => (StatusCode::OK, Json(AnswerReply::response(text))).into_response(),
        Err(err) => {
            warn!(error = %err, kind = request.kind.as_str(), "llm proxy request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(AnswerReply::error("the language model could not answer right now")),
            )
                .into_response()
        }
    }
}

/// Status and message for a body that could not be read as JSON. Bodies that
/// parse but do not fit the request shape are a client error, not 422.
fn rejection_parts(rejection: &JsonRejection) -> (StatusCode, String) {
    let status = match rejection.status() {
        StatusCode::UNPROCESSABLE_ENTITY => StatusCode::BAD_REQUEST,
        status => status,
    };
    (status, rejection.body_text())
}

fn invalid_request(rejection: JsonRejection) -> Response {
    let (status, message) = rejection_parts(&rejection);
    (
        status,
        Json(serde_json::json!({
            "error": "invalid_request",
            "message": message
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct RouteRequest {
    #[serde(default)]
    transcript: String,
}

#[derive(Debug, Serialize)]
struct RouteResponse {
    route: Option<Route>,
}

async fn assistant_route(
    State(state): State<ApiState>,
    payload: Result<Json<RouteRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => return invalid_request(rejection),
    };
    let route = state.assistant.resolve_route(&request.transcript);
    (StatusCode::OK, Json(RouteResponse { route })).into_response()
}

#[derive(Debug, Deserialize)]
struct AnswerBody {
    #[serde(default)]
    transcript: String,
    language: Option<String>,
    #[serde(rename = "type", default)]
    kind: QueryKind,
}

#[derive(Debug, Serialize)]
struct AnswerResponse {
    turn: u64,
    text: String,
    source: AnswerSource,
    keyword: Option<String>,
    language: Language,
    locale_tag: LocaleTag,
    route: Option<Route>,
}

async fn assistant_answer(
    State(state): State<ApiState>,
    payload: Result<Json<AnswerBody>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return invalid_request(rejection),
    };
    let language = Language::from_optional_str(body.language.as_deref());
    let turn = state
        .assistant
        .handle_as(body.kind, &body.transcript, language)
        .await;

    let source = turn.answer.source();
    let keyword = turn.answer.keyword().map(ToString::to_string);
    let payload = AnswerResponse {
        turn: turn.turn,
        text: turn.answer.into_text(),
        source,
        keyword,
        language: turn.language,
        locale_tag: turn.locale,
        route: turn.route,
    };
    (StatusCode::OK, Json(payload)).into_response()
}

#[derive(Debug, Serialize)]
struct LocaleResponse {
    code: String,
    language: Language,
    language_name: &'static str,
    locale_tag: LocaleTag,
}

async fn assistant_locale(Path(code): Path<String>) -> impl IntoResponse {
    let language = Language::from_optional_str(Some(&code));
    let payload = LocaleResponse {
        language,
        language_name: language.display_name(),
        locale_tag: LocaleTag::resolve(&code),
        code,
    };
    (StatusCode::OK, Json(payload))
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health")
}

fn request_origin_is_allowed(state: &ApiState, headers: &HeaderMap) -> bool {
    headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(|origin| origin.trim_end_matches('/'))
        .is_some_and(|origin| state.allowed_origins.iter().any(|allowed| allowed == origin))
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    // Browser requests from first-party origins carry no key.
    if header_key == state.api_key || request_origin_is_allowed(&state, request.headers()) {
        return next.run(request).await;
    }

    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "unauthorized",
            "message": "missing or invalid x-api-key, and request origin is not allowed"
        })),
    )
        .into_response()
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    if !state.limiter.allow(&ip) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "rate_limited",
                "message": "rate limit exceeded for this IP"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );

    response
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    // `AllowOrigin::list` panics on a wildcard entry.
    let origins = allowed_origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
}
