//! HTTP front for a film swap: participant and operator routes over
//! [`SwapService`], plus a WebSocket gateway for notifications.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use filmswap_core::SwapService;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::dispatcher::Dispatcher;
use crate::routes::{admin, participants};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SwapService>,
    pub dispatcher: Dispatcher,
    pub operator_token: Arc<str>,
    pub command_token: Arc<str>,
}

pub fn router(state: AppState) -> Router {
    let participant_routes = Router::new()
        .route("/participants/{id}/join", post(participants::join))
        .route("/participants/{id}/leave", post(participants::leave))
        .route("/participants/{id}/active", get(participants::check_active))
        .route(
            "/participants/{id}/letter",
            get(participants::review_letter).put(participants::set_letter),
        )
        .route("/participants/{id}/letterboxd", put(participants::set_letterboxd))
        .route(
            "/participants/{id}/gift",
            get(participants::review_gift).put(participants::set_gift),
        )
        .route("/participants/{id}/giftee/letter", get(participants::read_giftee_letter))
        .route("/participants/{id}/received-gift", get(participants::receive_gift))
        .route("/participants/{id}/watched", post(participants::mark_watched))
        .route("/participants/{id}/messages/santa", post(participants::message_santa))
        .route("/participants/{id}/messages/giftee", post(participants::message_giftee))
        .route("/gateway", get(gateway::ws_upgrade))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::require_command,
        ));

    let admin_routes = Router::new()
        .route(
            "/admin/exchange",
            post(admin::create_exchange).get(admin::get_exchange),
        )
        .route("/admin/summary", get(admin::summary))
        .route("/admin/phase", put(admin::set_phase))
        .route("/admin/channel", put(admin::set_channel))
        .route(
            "/admin/join-message",
            put(admin::set_join_message).get(admin::join_message),
        )
        .route("/admin/match", post(admin::match_now))
        .route("/admin/unmatch", post(admin::unmatch_all))
        .route("/admin/bans", get(admin::list_banned))
        .route("/admin/bans/{id}", post(admin::ban).delete(admin::unban))
        .route("/admin/participants", get(admin::list_participants))
        .route("/admin/participants/{id}/santa", get(admin::get_santa))
        .route("/admin/participants/{id}/giftee", get(admin::get_giftee))
        .route("/admin/participants/{id}/watched", post(admin::mark_watched_for))
        .route("/admin/display-names", post(admin::refresh_display_names))
        .route("/admin/snapshot", post(admin::snapshot))
        .route("/admin/rings", get(admin::verify_rings))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::require_operator,
        ));

    Router::new()
        .merge(participant_routes)
        .merge(admin_routes)
        .route("/health", get(routes::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
