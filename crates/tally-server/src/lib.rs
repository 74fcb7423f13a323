//! Tally Web Server
//!
//! Axum-based REST API for the Tally personal finance backend.
//!
//! Security features:
//! - Bearer token authentication (secure by default, use --no-auth for local dev)
//! - Restrictive CORS policy
//! - Input validation (pagination limits, body size limits)
//! - Audit logging for API reads and writes
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use tally_core::chat::ChatBackend;
use tally_core::{ChatClient, Classifier, Database, TokenSigner};

mod handlers;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Maximum request body size for bank sync payloads (5 MB)
pub const MAX_SYNC_BODY_SIZE: usize = 5 * 1024 * 1024;

/// User every request acts as when authentication is disabled
pub const LOCAL_USER_EMAIL: &str = "local@tally.local";

/// Routes reachable without a session token
const PUBLIC_PATHS: &[&str] = &["/api/auth/register", "/api/auth/login"];

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
    /// HS256 secret for session tokens. Required when `require_auth` is set.
    pub jwt_secret: Option<String>,
    /// Classifier shared by every report and view
    pub classifier: Classifier,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            jwt_secret: None,
            classifier: Classifier::default(),
        }
    }
}

impl ServerConfig {
    /// Refuse configurations that cannot authenticate anyone
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.require_auth {
            let secret = self.jwt_secret.as_deref().unwrap_or("");
            TokenSigner::new(secret).map_err(|_| {
                anyhow::anyhow!(
                    "Authentication is enabled but no JWT secret is configured (set {} or use --no-auth)",
                    tally_core::auth::JWT_SECRET_ENV
                )
            })?;
        }
        Ok(())
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    pub classifier: Classifier,
    pub chat: Option<ChatClient>,
    pub signer: Option<TokenSigner>,
}

/// The user a request acts for, inserted by [`auth_middleware`]
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
}

/// Authentication middleware - validates the bearer session token
///
/// With `require_auth` off, every request acts as the local user.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if PUBLIC_PATHS.contains(&path.as_str()) {
        return next.run(request).await;
    }

    if !state.config.require_auth {
        return match state.db.ensure_local_user(LOCAL_USER_EMAIL) {
            Ok(user) => {
                request.extensions_mut().insert(AuthUser {
                    id: user.id,
                    email: user.email,
                });
                next.run(request).await
            }
            Err(e) => AppError::from(e).into_response(),
        };
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let (Some(token), Some(signer)) = (token, state.signer.as_ref()) else {
        warn!(path = %path, "Unauthorized request - no bearer token");
        return unauthorized();
    };

    let claims = match signer.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(error = %e, path = %path, "Invalid session token");
            return unauthorized();
        }
    };

    // Tokens outlive deleted users
    match state.db.get_user(claims.sub) {
        Ok(Some(user)) => {
            debug!(user = %user.email, path = %path, "Authenticated via bearer token");
            request.extensions_mut().insert(AuthUser {
                id: user.id,
                email: user.email,
            });
            next.run(request).await
        }
        Ok(None) => {
            warn!(user_id = claims.sub, path = %path, "Token for unknown user");
            unauthorized()
        }
        Err(e) => AppError::from(e).into_response(),
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
///
/// `chat` is the assistant backend; `None` stores a fixed not-configured reply.
pub fn create_router(db: Database, config: ServerConfig, chat: Option<ChatClient>) -> Router {
    let signer = config
        .jwt_secret
        .as_deref()
        .and_then(|secret| TokenSigner::new(secret).ok());

    let state = Arc::new(AppState {
        db,
        classifier: config.classifier.clone(),
        config: config.clone(),
        chat,
        signer,
    });

    let api_routes = Router::new()
        // Auth
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/me", get(handlers::get_me))
        // Accounts and bank link
        .route("/accounts", get(handlers::list_accounts))
        .route(
            "/bank/sync",
            post(handlers::sync_bank).layer(DefaultBodyLimit::max(MAX_SYNC_BODY_SIZE)),
        )
        .route(
            "/bank/link",
            get(handlers::get_bank_link).delete(handlers::unlink_bank),
        )
        // Transactions
        .route("/transactions", get(handlers::list_transactions))
        .route("/transactions/:id/tags", put(handlers::set_transaction_tags))
        .route(
            "/transactions/:id/recurring",
            put(handlers::set_transaction_recurring),
        )
        .route(
            "/transactions/:id/classification",
            get(handlers::get_transaction_classification),
        )
        // Reports
        .route("/reports/cashflow", get(handlers::report_cashflow))
        .route("/reports/categories", get(handlers::report_categories))
        .route("/reports/net-worth", get(handlers::report_net_worth))
        .route("/insights", get(handlers::get_insights))
        // Detection
        .route("/anomalies", get(handlers::list_anomalies))
        .route("/anomalies/detect", post(handlers::detect_anomalies))
        .route("/recurring/detect", post(handlers::detect_recurring))
        // Goals
        .route(
            "/goals",
            get(handlers::list_goals).post(handlers::create_goal),
        )
        .route(
            "/goals/:id",
            get(handlers::get_goal)
                .patch(handlers::update_goal)
                .delete(handlers::delete_goal),
        )
        .route("/goals/:id/contribute", post(handlers::contribute_to_goal))
        .route("/goals/:id/projection", get(handlers::get_goal_projection))
        // Chat
        .route(
            "/chats",
            get(handlers::list_chats).post(handlers::create_chat),
        )
        .route(
            "/chats/:id",
            get(handlers::get_chat).delete(handlers::delete_chat),
        )
        .route("/chats/:id/messages", post(handlers::send_chat_message))
        .route("/chats/:id/sharing", put(handlers::set_chat_sharing))
        // Export
        .route("/export/transactions", get(handlers::export_transactions))
        // Audit log
        .route("/audit", get(handlers::list_audit_log));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        // Allow specified origins
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
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
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ))
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    config.validate()?;

    if !config.require_auth {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    }

    let chat = ChatClient::from_env();
    check_chat_connection(chat.as_ref()).await;

    let app = create_router(db, config, chat);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log chat backend connection status
async fn check_chat_connection(chat: Option<&ChatClient>) {
    match chat {
        Some(client) => {
            if client.health_check().await {
                info!(
                    "✅ Chat backend connected: {} (model: {})",
                    client.host(),
                    client.model()
                );
            } else {
                warn!(
                    "⚠️  Chat backend configured but not responding: {} (model: {})",
                    client.host(),
                    client.model()
                );
            }
        }
        None => {
            info!("ℹ️  Chat backend not configured (set OPENAI_COMPATIBLE_HOST to enable replies)");
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
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

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn conflict(msg: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_gateway(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Map domain errors callers can act on; everything else stays a 500
    fn from_core(err: &tally_core::Error) -> Option<Self> {
        use tally_core::Error as CoreError;

        match err {
            CoreError::InvalidData(msg) => Some(Self::bad_request(msg)),
            CoreError::NotFound(what) => Some(Self::not_found(&format!("{} not found", what))),
            CoreError::Auth(msg) => Some(Self::unauthorized(msg)),
            CoreError::Conflict(msg) => Some(Self::conflict(msg)),
            CoreError::Chat(_) => Some(Self::bad_gateway("Chat backend unavailable")),
            _ => None,
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

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();

        if let Some(mapped) = err
            .downcast_ref::<tally_core::Error>()
            .and_then(AppError::from_core)
        {
            if mapped.status == StatusCode::BAD_GATEWAY {
                warn!(error = %err, "Chat backend failed");
            }
            return mapped;
        }

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
