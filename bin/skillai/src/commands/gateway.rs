use crate::app::{Ai, App};
use skillai_agent::PitchRequest;
use skillai_core::types::ChatMessage;
use skillai_core::{Error, Partner, PartnerDraft, ProviderErrorKind};
use skillai_storage::EVOLVED_SLUG_KEY;
use std::sync::Arc;
use tracing::{info, warn};

use axum::{
    extract::{Path as AxumPath, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

// ---------------------------------------------------------------------------
// Shared state passed to HTTP handlers
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct GatewayState {
    app: Arc<App>,
    ai: Arc<Ai>,
    api_token: Option<String>,
}

fn secure_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (&x, &y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ---------------------------------------------------------------------------
// Bearer token authentication middleware
// ---------------------------------------------------------------------------

async fn auth_middleware(
    State(state): State<GatewayState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = match &state.api_token {
        Some(t) if !t.is_empty() => t,
        _ => return next.run(req).await,
    };

    if req.uri().path() == "/v1/health" {
        return next.run(req).await;
    }

    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|presented| secure_eq(presented, token.as_str()))
        .unwrap_or(false);

    if authorized {
        next.run(req).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Unauthorized: invalid or missing Bearer token" })),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Precondition(_) => StatusCode::CONFLICT,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Provider(e) if e.kind == ProviderErrorKind::RateLimited => {
            StatusCode::TOO_MANY_REQUESTS
        }
        Error::RetriesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::Provider(_) | Error::Directory(_) | Error::Tool(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            warn!(error = %self.0, status = status.as_u16(), "Request failed");
        }
        (
            status,
            Json(serde_json::json!({ "error": self.0.user_message() })),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ---------------------------------------------------------------------------
// HTTP request / response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PartnerView {
    #[serde(flatten)]
    partner: Partner,
    xp: u32,
    xp_to_evolve: u32,
    can_evolve: bool,
}

impl PartnerView {
    fn new(app: &App, partner: Partner) -> Self {
        Self {
            xp: app.tracker.xp(&partner.slug),
            xp_to_evolve: app.tracker.xp_to_evolve(),
            can_evolve: app.tracker.can_evolve(&partner),
            partner,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PartnersResponse {
    partners: Vec<PartnerView>,
    /// Slug of the partner evolved since the last listing, handed out once.
    just_evolved: Option<String>,
}

#[derive(Deserialize)]
struct ChatRequest {
    history: Vec<ChatMessage>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    response: String,
    xp: u32,
    can_evolve: bool,
}

#[derive(Deserialize)]
struct FeedbackRequest {
    feedback: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn find_partner(state: &GatewayState, slug: &str) -> ApiResult<Partner> {
    state
        .app
        .directory
        .read()
        .await
        .get(slug)
        .cloned()
        .ok_or_else(|| ApiError(Error::NotFound(format!("Partner '{}' not found", slug))))
}

async fn handle_health(State(state): State<GatewayState>) -> impl IntoResponse {
    let directory = state.app.directory.read().await;
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "partners": directory.list().len(),
        "syncedAt": directory.synced_at(),
    }))
}

async fn handle_partners_list(State(state): State<GatewayState>) -> impl IntoResponse {
    let partners: Vec<Partner> = state.app.directory.read().await.list().to_vec();
    let partners = partners
        .into_iter()
        .map(|p| PartnerView::new(&state.app, p))
        .collect();
    Json(PartnersResponse {
        partners,
        just_evolved: state.app.flags.take(EVOLVED_SLUG_KEY),
    })
}

async fn handle_partner_create(
    State(state): State<GatewayState>,
    Json(draft): Json<PartnerDraft>,
) -> ApiResult<impl IntoResponse> {
    let partner = state.ai.author.create_partner(draft).await?;
    state.app.directory.write().await.add(partner.clone())?;
    Ok((
        StatusCode::CREATED,
        Json(PartnerView::new(&state.app, partner)),
    ))
}

async fn handle_partners_sync(State(state): State<GatewayState>) -> ApiResult<impl IntoResponse> {
    let count = state.app.directory.write().await.sync().await?;
    Ok(Json(serde_json::json!({ "status": "ok", "count": count })))
}

async fn handle_partner_get(
    State(state): State<GatewayState>,
    AxumPath(slug): AxumPath<String>,
) -> ApiResult<impl IntoResponse> {
    let partner = find_partner(&state, &slug).await?;
    Ok(Json(PartnerView::new(&state.app, partner)))
}

async fn handle_partner_delete(
    State(state): State<GatewayState>,
    AxumPath(slug): AxumPath<String>,
) -> ApiResult<impl IntoResponse> {
    state.app.directory.write().await.delete(&slug)?;
    state.app.tracker.reset(&slug);
    Ok(Json(serde_json::json!({ "status": "deleted", "slug": slug })))
}

async fn handle_partner_chat(
    State(state): State<GatewayState>,
    AxumPath(slug): AxumPath<String>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<impl IntoResponse> {
    let partner = find_partner(&state, &slug).await?;
    let turn = state.ai.chat.send(&partner, &req.history).await?;
    Ok(Json(ChatResponse {
        response: turn.response,
        xp: turn.xp,
        can_evolve: state.app.tracker.can_evolve(&partner),
    }))
}

async fn handle_partner_evolve(
    State(state): State<GatewayState>,
    AxumPath(slug): AxumPath<String>,
) -> ApiResult<impl IntoResponse> {
    let mut partner = find_partner(&state, &slug).await?;
    let outcome = state.ai.engine.evolve(&mut partner).await?;
    state.app.directory.write().await.update(partner.clone())?;
    info!(slug = %slug, version = outcome.new_version, "Partner evolved via gateway");
    Ok(Json(PartnerView::new(&state.app, partner)))
}

async fn handle_suggested_prompt(
    State(state): State<GatewayState>,
    AxumPath(slug): AxumPath<String>,
) -> ApiResult<impl IntoResponse> {
    let partner = find_partner(&state, &slug).await?;
    let prompt = state.ai.author.suggest_prompt(&partner.skill).await;
    Ok(Json(serde_json::json!({ "suggestedPrompt": prompt })))
}

async fn handle_feedback(
    State(state): State<GatewayState>,
    Json(req): Json<FeedbackRequest>,
) -> ApiResult<impl IntoResponse> {
    let feedback = req.feedback.trim();
    if feedback.is_empty() {
        return Err(Error::Validation("Feedback cannot be empty".to_string()).into());
    }
    state.app.directory.read().await.log_feedback(feedback).await;
    Ok(Json(serde_json::json!({ "status": "received" })))
}

async fn handle_pitch_ideas(
    State(state): State<GatewayState>,
    Json(req): Json<PitchRequest>,
) -> ApiResult<impl IntoResponse> {
    let ideas = state.ai.author.pitch_ideas(&req).await?;
    Ok(Json(ideas))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

fn build_api_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    if origins.is_empty() {
        return CorsLayer::permissive().allow_credentials(false);
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn build_router(state: GatewayState) -> Router {
    let cors = build_api_cors_layer(&state.app.config.gateway.allowed_origins);
    Router::new()
        .route("/v1/health", get(handle_health))
        .route("/v1/partners", get(handle_partners_list).post(handle_partner_create))
        .route("/v1/partners/sync", post(handle_partners_sync))
        .route(
            "/v1/partners/:slug",
            get(handle_partner_get).delete(handle_partner_delete),
        )
        .route("/v1/partners/:slug/chat", post(handle_partner_chat))
        .route("/v1/partners/:slug/evolve", post(handle_partner_evolve))
        .route(
            "/v1/partners/:slug/suggested-prompt",
            get(handle_suggested_prompt),
        )
        .route("/v1/feedback", post(handle_feedback))
        .route("/v1/pitch-ideas", post(handle_pitch_ideas))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let app = App::start().await?;
    let ai = Ai::from_config(&app)?;

    let host = host.unwrap_or_else(|| app.config.gateway.host.clone());
    let port = port.unwrap_or(app.config.gateway.port);
    let api_token = app
        .config
        .gateway
        .api_token
        .clone()
        .filter(|t| !t.is_empty());
    if api_token.is_none() && host != "127.0.0.1" && host != "localhost" {
        warn!(host = %host, "Gateway exposed without gateway.apiToken");
    }

    let state = GatewayState {
        app: Arc::new(app),
        ai: Arc::new(ai),
        api_token,
    };
    let router = build_router(state);

    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "Gateway listening");
    println!("skillai gateway listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
