//! Penny Web Server
//!
//! Axum-based REST API for transactions and the AI assist engine.
//!
//! Security features:
//! - API key authentication (secure by default, use --no-auth for local dev)
//! - Restrictive CORS policy
//! - Every query scoped to the caller's user id
//! - Sanitized error responses (model failures never reach the client)

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use penny_core::{
    AIAssistEngine, Aggregator, AssistConfig, AuditLog, Database, GatewayClient, ModelGateway,
};

mod handlers;

/// Maximum number of audit records returned per request
pub const MAX_PAGE_LIMIT: i64 = 500;

/// Header carrying the authenticated user's id (set by the auth proxy)
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// API keys accepted as "Bearer <key>" in the Authorization header
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub engine: Arc<AIAssistEngine>,
    pub config: ServerConfig,
}

/// Authentication middleware - validates the bearer API key
///
/// API keys are compared in constant time. The user id itself comes from
/// `x-user-id`, which the handlers require separately.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key, &state.config.api_keys))
        .unwrap_or(false);

    if api_key_valid {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid API key");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Validate an API key against the configured keys using constant-time comparison
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    valid_keys.iter().any(|key| {
        let key_bytes = key.as_bytes();
        // ct_eq is only constant-time for equal lengths
        provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
    })
}

/// Extract the caller's user id from request headers
pub fn get_user_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| AppError::unauthorized("User identity required"))
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Build the assist engine for a database, using it as the audit log
pub fn build_engine(db: &Database, assist: AssistConfig) -> (Arc<AIAssistEngine>, GatewayClient) {
    let gateway = GatewayClient::from_config(&assist.backend);
    info!(
        backend = gateway.backend_name(),
        model = gateway.model(),
        host = gateway.host(),
        "AI backend selected"
    );

    let audit: Arc<dyn AuditLog> = Arc::new(db.clone());
    let engine = AIAssistEngine::new(
        Arc::new(gateway.clone()),
        Aggregator::new(),
        audit,
        assist,
    );
    (Arc::new(engine), gateway)
}

/// Create the application router
pub fn create_router(db: Database, engine: Arc<AIAssistEngine>, config: ServerConfig) -> Router {
    let state = Arc::new(AppState {
        db,
        engine,
        config: config.clone(),
    });

    let api_routes = Router::new()
        // Transactions
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route(
            "/transactions/:id",
            put(handlers::update_transaction).delete(handlers::delete_transaction),
        )
        // AI assist
        .route("/ai/classify", post(handlers::classify_transaction))
        .route("/ai/summary/:year/:month", get(handlers::get_month_summary))
        // Path used by existing web clients
        .route(
            "/ai/month-summary/:year/:month",
            get(handlers::get_month_summary),
        )
        .route("/ai/interactions", get(handlers::list_interactions))
        .route("/ai/status", get(handlers::get_ai_status));

    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let allowed_headers = [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(USER_ID_HEADER),
    ];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(allowed_headers)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(allowed_headers)
    };

    Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(
    db: Database,
    assist: AssistConfig,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    } else if config.api_keys.is_empty() {
        warn!(
            "⚠️  Authentication required but no API keys configured, \
             every request will be rejected"
        );
    }

    let (engine, gateway) = build_engine(&db, assist);
    check_ai_connection(&gateway).await;

    let app = create_router(db, engine, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
///
/// An unreachable backend is not fatal: AI endpoints keep answering with
/// degraded results.
async fn check_ai_connection(gateway: &GatewayClient) {
    if !gateway.is_configured() {
        info!(
            "ℹ️  AI backend not configured \
             (set OPENAI_COMPATIBLE_HOST or OLLAMA_HOST to enable AI features)"
        );
        return;
    }

    if gateway.health_check().await {
        info!(
            "✅ AI backend connected: {} (model: {})",
            gateway.host(),
            gateway.model()
        );
    } else {
        warn!(
            "⚠️  AI backend configured but not responding: {} (model: {})",
            gateway.host(),
            gateway.model()
        );
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<penny_core::Error> for AppError {
    fn from(err: penny_core::Error) -> Self {
        match err {
            penny_core::Error::InvalidInput(msg) => Self::bad_request(&msg),
            penny_core::Error::NotFound(msg) => Self::not_found(&msg),
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(other.into()),
            },
        }
    }
}
