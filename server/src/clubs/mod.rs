//! Club Directory Module
//!
//! Handles clubs, rosters, events, membership requests, relationship trees,
//! bookmarks, tags, testimonials, questions and activities fairs.

pub mod access;
pub mod bookmarks;
pub mod error;
pub mod events;
pub mod fairs;
pub mod handlers;
pub mod members;
pub mod queries;
pub mod questions;
pub mod requests;
pub mod tags;
pub mod testimonials;
pub mod tree;
pub mod types;

use axum::routing::{delete, get, patch, post, put};
use axum::Router;

use crate::api::AppState;
use crate::{invites, notes};

pub use error::{ClubError, FieldErrors};

/// Create the club router, nested at `/api/clubs`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_clubs).post(handlers::create_club))
        .route("/fields", get(handlers::club_fields))
        .route(
            "/{code}",
            get(handlers::get_club)
                .put(handlers::update_club)
                .patch(handlers::update_club)
                .delete(handlers::delete_club),
        )
        .route("/{code}/children", get(handlers::club_children))
        .route("/{code}/parents", get(handlers::club_parents))
        // Roster
        .route(
            "/{code}/members",
            get(members::list_club_members).post(members::add_club_member),
        )
        .route(
            "/{code}/members/{username}",
            get(members::get_club_member)
                .put(members::update_club_member)
                .patch(members::update_club_member)
                .delete(members::remove_club_member),
        )
        // Events
        .route(
            "/{code}/events",
            get(events::list_events).post(events::create_event),
        )
        .route(
            "/{code}/events/{event_code}",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        // Notes
        .route(
            "/{code}/notes",
            get(notes::handlers::list_notes).post(notes::handlers::create_note),
        )
        .route("/{code}/notes/{id}", delete(notes::handlers::delete_note))
        .route("/{code}/notes-about", get(notes::handlers::notes_about))
        // Invitations
        .route("/{code}/invite", post(invites::handlers::mass_invite))
        .route("/{code}/invites", get(invites::handlers::list_invites))
        .route(
            "/{code}/invites/{id}",
            put(invites::handlers::accept_invite)
                .patch(invites::handlers::accept_invite)
                .delete(invites::handlers::rescind_invite),
        )
        .route("/{code}/invites/{id}/resend", put(invites::handlers::resend_invite))
        // Subscribers
        .route("/{code}/subscription", get(bookmarks::club_subscribers))
        // Testimonials
        .route(
            "/{code}/testimonials",
            get(testimonials::list_testimonials).post(testimonials::create_testimonial),
        )
        .route(
            "/{code}/testimonials/{id}",
            put(testimonials::update_testimonial)
                .patch(testimonials::update_testimonial)
                .delete(testimonials::delete_testimonial),
        )
        // Questions
        .route(
            "/{code}/questions",
            get(questions::list_questions).post(questions::ask_question),
        )
        .route(
            "/{code}/questions/{id}",
            patch(questions::update_question).delete(questions::delete_question),
        )
        // Membership requests
        .route("/{code}/requests", get(requests::list_club_requests))
        .route(
            "/{code}/requests/{username}",
            delete(requests::delete_club_request),
        )
        .route(
            "/{code}/requests/{username}/accept",
            post(requests::accept_club_request),
        )
}

/// User-side membership request routes, nested at `/api/requests`.
pub fn requests_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(requests::list_my_requests).post(requests::create_my_request),
        )
        .route("/{club_code}", delete(requests::delete_my_request))
}

/// Favorite routes, nested at `/api/favorites`.
pub fn favorites_router() -> Router<AppState> {
    Router::new()
        .route("/", get(bookmarks::list_favorites).post(bookmarks::add_favorite))
        .route("/{club_code}", delete(bookmarks::remove_favorite))
}

/// Subscription routes, nested at `/api/subscriptions`.
pub fn subscriptions_router() -> Router<AppState> {
    Router::new()
        .route("/", get(bookmarks::list_subscriptions).post(bookmarks::subscribe))
        .route("/{club_code}", delete(bookmarks::unsubscribe))
}

/// Tag routes, nested at `/api/tags`.
pub fn tags_router() -> Router<AppState> {
    Router::new()
        .route("/", get(tags::list_tags))
        .route("/{name}", get(tags::get_tag))
}

/// Activities fair routes, nested at `/api/fairs`.
pub fn fairs_router() -> Router<AppState> {
    Router::new()
        .route("/", get(fairs::list_fairs))
        .route(
            "/{id}/clubs/{code}",
            post(fairs::register_for_fair).delete(fairs::unregister_from_fair),
        )
}
