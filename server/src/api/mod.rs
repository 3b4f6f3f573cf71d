//! API Router and Application State
//!
//! Central routing configuration and shared state.

use std::sync::Arc;

use axum::{extract::State, middleware::from_fn_with_state, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{auth, clubs, config::Config, email::EmailService, export, invites, notes};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,
    /// Server configuration
    pub config: Arc<Config>,
    /// Outbound mail (optional)
    pub email: Option<Arc<EmailService>>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(db: PgPool, config: Config, email: Option<EmailService>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            email: email.map(Arc::new),
        }
    }

    /// Check if outbound mail is configured.
    #[must_use]
    pub const fn has_email(&self) -> bool {
        self.email.is_some()
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .nest("/api/clubs", clubs::router())
        .nest("/api/requests", clubs::requests_router())
        .nest("/api/favorites", clubs::favorites_router())
        .nest("/api/subscriptions", clubs::subscriptions_router())
        .nest("/api/tags", clubs::tags_router())
        .nest("/api/fairs", clubs::fairs_router())
        .nest("/api/reports", export::router());

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Auth routes
        .nest("/auth", auth::router())
        // Directory routes; anonymous callers get read-only access
        .merge(api_routes)
        // API documentation
        .merge(api_docs())
        // Identify the bearer on every request
        .layer(from_fn_with_state(state.clone(), auth::authenticate))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        // State
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Whether invitation emails are delivered
    email: bool,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        email: state.has_email(),
    })
}

/// Registers the bearer token scheme referenced by protected operations.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Clubhub API", description = "Student organization directory"),
    paths(
        auth::handlers::register,
        auth::handlers::login,
        auth::handlers::get_profile,
        auth::handlers::update_profile,
        clubs::handlers::list_clubs,
        clubs::handlers::club_fields,
        clubs::handlers::create_club,
        clubs::handlers::get_club,
        clubs::handlers::update_club,
        clubs::handlers::delete_club,
        clubs::handlers::club_children,
        clubs::handlers::club_parents,
        clubs::members::list_club_members,
        clubs::members::add_club_member,
        clubs::members::get_club_member,
        clubs::members::update_club_member,
        clubs::members::remove_club_member,
        clubs::events::list_events,
        clubs::events::create_event,
        clubs::events::get_event,
        clubs::events::update_event,
        clubs::events::delete_event,
        clubs::bookmarks::list_favorites,
        clubs::bookmarks::add_favorite,
        clubs::bookmarks::remove_favorite,
        clubs::bookmarks::list_subscriptions,
        clubs::bookmarks::subscribe,
        clubs::bookmarks::unsubscribe,
        clubs::bookmarks::club_subscribers,
        clubs::tags::list_tags,
        clubs::tags::get_tag,
        clubs::testimonials::list_testimonials,
        clubs::testimonials::create_testimonial,
        clubs::testimonials::update_testimonial,
        clubs::testimonials::delete_testimonial,
        clubs::questions::list_questions,
        clubs::questions::ask_question,
        clubs::questions::update_question,
        clubs::questions::delete_question,
        clubs::requests::list_club_requests,
        clubs::requests::accept_club_request,
        clubs::requests::delete_club_request,
        clubs::requests::list_my_requests,
        clubs::requests::create_my_request,
        clubs::requests::delete_my_request,
        clubs::fairs::list_fairs,
        clubs::fairs::register_for_fair,
        clubs::fairs::unregister_from_fair,
        notes::handlers::list_notes,
        notes::handlers::notes_about,
        notes::handlers::create_note,
        notes::handlers::delete_note,
        invites::handlers::mass_invite,
        invites::handlers::list_invites,
        invites::handlers::resend_invite,
        invites::handlers::rescind_invite,
        invites::handlers::accept_invite,
        export::reports::list_reports,
        export::reports::delete_report,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration and tokens"),
        (name = "clubs", description = "Club directory"),
        (name = "members", description = "Club rosters"),
        (name = "events", description = "Club events"),
        (name = "requests", description = "Membership applications"),
        (name = "bookmarks", description = "Favorites and subscriptions"),
        (name = "tags", description = "Club tags"),
        (name = "testimonials", description = "Club testimonials"),
        (name = "questions", description = "Questions and answers"),
        (name = "notes", description = "Notes between clubs"),
        (name = "invites", description = "Email invitations"),
        (name = "reports", description = "Saved spreadsheet exports"),
        (name = "fairs", description = "Activities fairs")
    )
)]
pub struct ApiDoc;

/// API documentation routes.
fn api_docs() -> Router<AppState> {
    SwaggerUi::new("/api/docs")
        .url("/api/docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_directory_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/clubs",
            "/api/clubs/{code}",
            "/api/clubs/{code}/members/{username}",
            "/api/clubs/{code}/invite",
            "/api/reports/{id}",
            "/api/favorites/{club_code}",
            "/api/tags",
            "/api/clubs/{code}/questions/{id}",
            "/auth/login",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let schemes = doc.components.as_ref().map(|c| &c.security_schemes);
        assert!(schemes.is_some_and(|s| s.contains_key("bearer_auth")));
    }
}
