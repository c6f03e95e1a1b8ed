//! Tally Web Server
//!
//! Axum-based REST API for the Tally expense tracker.
//!
//! Security features:
//! - Gateway header or API key authentication (secure by default, use --no-auth for local dev)
//! - Every expense is scoped to the authenticated owner
//! - Restrictive CORS policy
//! - Input validation (pagination limits, upload size limits)
//! - Full audit logging for all API access (reads and writes)
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use tally_core::db::Database;
use tally_core::OwnerId;

mod handlers;

/// Maximum file upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Header carrying the authenticated user ID, set by the auth gateway
pub const USER_ID_HEADER: &str = "x-auth-user-id";

/// Header carrying the authenticated user's roles (comma-separated)
pub const USER_ROLES_HEADER: &str = "x-auth-user-roles";

/// Role that unlocks the full expense listing
pub const ADMIN_ROLE: &str = "admin";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// User that owns requests when authentication is disabled
pub const DEFAULT_DEV_USER: &str = "00000000-0000-0000-0000-000000000001";

/// An API key and the identity it authenticates as
#[derive(Clone, Debug)]
pub struct ApiKey {
    pub key: String,
    pub user_id: String,
    pub is_admin: bool,
}

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
    /// API keys for service authentication (alternative to gateway headers)
    /// Format: "Bearer <key>" in Authorization header
    pub api_keys: Vec<ApiKey>,
    /// Identity used when `require_auth` is off and no identity headers are sent
    pub dev_user_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
            dev_user_id: DEFAULT_DEV_USER.to_string(),
        }
    }
}

/// Parse API keys from `key:user-uuid[:admin]` entries, comma-separated
///
/// Malformed entries are logged and skipped.
pub fn parse_api_keys(input: &str) -> Vec<ApiKey> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|entry| {
            let mut parts = entry.split(':').map(str::trim);
            let key = parts.next().filter(|k| !k.is_empty());
            let user = parts.next().and_then(|u| OwnerId::parse(u).ok());
            let is_admin = match parts.next() {
                None => false,
                Some(role) if role.eq_ignore_ascii_case(ADMIN_ROLE) => true,
                Some(_) => {
                    warn!("Ignoring API key entry with unknown role");
                    return None;
                }
            };

            match (key, user) {
                (Some(key), Some(user)) => Some(ApiKey {
                    key: key.to_string(),
                    user_id: user.to_string(),
                    is_admin,
                }),
                // Never log the entry itself, it contains the key
                _ => {
                    warn!("Ignoring malformed API key entry");
                    None
                }
            }
        })
        .collect()
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
}

impl AppState {
    /// Record an expense access in the audit log
    ///
    /// Called after the change has committed. A failed audit write is
    /// logged, not returned.
    pub fn audit(
        &self,
        owner: &OwnerId,
        action: &str,
        entity_id: Option<i64>,
        details: Option<&str>,
    ) {
        if let Err(e) = self
            .db
            .log_audit(owner.as_str(), action, Some("expense"), entity_id, details)
        {
            warn!(owner = %owner, action, error = %e, "Failed to write audit log entry");
        }
    }
}

/// How a request was authenticated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMethod {
    Gateway,
    ApiKey,
    Development,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::ApiKey => "api_key",
            Self::Development => "none",
        }
    }
}

/// Authenticated identity, stored in request extensions by [`auth_middleware`]
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: String,
    pub is_admin: bool,
    pub method: AuthMethod,
}

/// Identity asserted by the auth gateway headers
fn gateway_user(headers: &HeaderMap) -> Option<AuthUser> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())?;

    let is_admin = headers
        .get(USER_ROLES_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|roles| {
            roles
                .split(',')
                .any(|role| role.trim().eq_ignore_ascii_case(ADMIN_ROLE))
        })
        .unwrap_or(false);

    Some(AuthUser {
        user_id: user_id.to_string(),
        is_admin,
        method: AuthMethod::Gateway,
    })
}

/// Identity of a valid Bearer API key
fn api_key_user(headers: &HeaderMap, keys: &[ApiKey]) -> Option<AuthUser> {
    let provided = headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))?;

    validate_api_key(provided, keys).map(|key| AuthUser {
        user_id: key.user_id.clone(),
        is_admin: key.is_admin,
        method: AuthMethod::ApiKey,
    })
}

/// Authentication middleware - resolves the caller from gateway headers or an API key
///
/// # Security Notes
///
/// **Gateway headers**: `x-auth-user-id` and `x-auth-user-roles` are trusted as
/// set by the authentication gateway in front of this server. Do not expose
/// the server directly to the internet.
///
/// **API keys**: Compared using constant-time comparison to prevent timing attacks.
///
/// With `require_auth` off, requests without identity headers run as the
/// configured development user with admin rights.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let user = gateway_user(headers)
        .or_else(|| api_key_user(headers, &state.config.api_keys))
        .or_else(|| {
            (!state.config.require_auth).then(|| AuthUser {
                user_id: state.config.dev_user_id.clone(),
                is_admin: true,
                method: AuthMethod::Development,
            })
        });

    let Some(user) = user else {
        warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
        return AppError::unauthorized("Authentication required").into_response();
    };

    debug!(
        user = %user.user_id,
        method = user.method.as_str(),
        path = %request.uri().path(),
        "Authenticated request"
    );
    request.extensions_mut().insert(user);
    next.run(request).await
}

/// Reject callers without the admin role
async fn require_admin(request: Request, next: Next) -> Response {
    let is_admin = request
        .extensions()
        .get::<AuthUser>()
        .map(|user| user.is_admin)
        .unwrap_or(false);

    if !is_admin {
        warn!(path = %request.uri().path(), "Forbidden - admin role required");
        return AppError::forbidden("Admin access required").into_response();
    }

    next.run(request).await
}

/// Find the API key matching `provided` using constant-time comparison
/// to prevent timing attacks.
fn validate_api_key<'a>(provided: &str, valid_keys: &'a [ApiKey]) -> Option<&'a ApiKey> {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    valid_keys.iter().find(|key| {
        let key_bytes = key.key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
    })
}

/// The validated owner of the current request
///
/// Rejects with 400 when the authenticated user ID is not a valid owner ID.
pub struct Owner(pub OwnerId);

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthUser>()
            .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

        OwnerId::parse(&user.user_id)
            .map(Owner)
            .map_err(|_| AppError::bad_request("Invalid user ID"))
    }
}

/// Body of `GET /health`
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Create the application router
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
    });

    // Static segments take precedence over `/:id`
    let expense_routes = Router::new()
        .route("/create", post(handlers::create_expense))
        .route(
            "/all",
            get(handlers::list_expenses).route_layer(middleware::from_fn(require_admin)),
        )
        .route("/statistics", get(handlers::expense_statistics))
        .route(
            "/upload-expenses-csv",
            // Leave headroom for multipart framing; the file itself is checked against MAX_UPLOAD_SIZE
            post(handlers::upload_expenses_csv)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE + 64 * 1024)),
        )
        .route("/bulk-delete", delete(handlers::bulk_delete_expenses))
        .route(
            "/:id",
            get(handlers::get_expense)
                .put(handlers::update_expense)
                .delete(handlers::delete_expense),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Build CORS layer
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // Security headers
    let security_headers = ServiceBuilder::new()
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
        ));

    Router::new()
        .nest("/expense", expense_routes)
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(security_headers)
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!(
            dev_user = %config.dev_user_id,
            "⚠️  Authentication disabled - do not expose to network!"
        );
    } else if config.api_keys.is_empty() {
        info!("No API keys configured; only gateway header auth is accepted");
    }

    let app = create_router(db, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    /// Rejected CSV rows, returned alongside the message
    rows: Option<serde_json::Value>,
    internal: Option<anyhow::Error>,
}

impl AppError {
    fn new(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            rows: None,
            internal: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Map a core error onto its HTTP status
    fn from_core(err: tally_core::Error) -> Self {
        use tally_core::Error;

        match err {
            Error::Validation(msg) => Self::bad_request(&msg),
            Error::NotFound(msg) => Self::not_found(&msg),
            Error::InvalidRows(rows) => Self {
                rows: serde_json::to_value(&rows).ok(),
                ..Self::bad_request("Invalid CSV data")
            },
            other => Self {
                internal: Some(other.into()),
                ..Self::internal("An internal error occurred")
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let mut body = serde_json::json!({
            "error": self.message
        });
        if let Some(rows) = self.rows {
            body["rows"] = rows;
        }

        (self.status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        match err.downcast::<tally_core::Error>() {
            Ok(core) => Self::from_core(core),
            Err(err) => Self {
                // Keep full error for logging, return generic message to client
                internal: Some(err),
                ..Self::internal("An internal error occurred")
            },
        }
    }
}
