//! Club Engagement Integration Tests
//!
//! Favorites, subscriptions, tags, testimonials and questions against a
//! real database.
//!
//! Run ignored (integration) tests: `cargo test --test engagement_test -- --ignored`

mod helpers;

use axum::http::{header, Method, StatusCode};
use clubhub_server::permissions::ClubRole;
use helpers::{
    add_membership, body_to_json, create_test_user, insert_club, random_suffix, unique_code,
    TestApp,
};
use serde_json::{json, Value};
use serial_test::serial;

fn find<'a>(items: &'a Value, key: &str, value: &str) -> Option<&'a Value> {
    items.as_array()?.iter().find(|item| item[key] == value)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // Requires PostgreSQL
#[serial]
async fn test_favorites_order_club_list() {
    let app = TestApp::new();
    let mut guard = app.cleanup_guard();
    let (user, _, _) = create_test_user(&app.pool).await;
    guard.delete_user(user);
    let token = app.token_for(user);

    // "aaa" sorts first by name until "zzz" is favorited.
    let first = format!("aaa-{}", random_suffix());
    let second = format!("zzz-{}", random_suffix());
    guard.delete_club(insert_club(&app.pool, &first).await);
    guard.delete_club(insert_club(&app.pool, &second).await);
    let list_uri = format!("/api/clubs?in={first},{second}");

    let body = body_to_json(app.send(Method::GET, &list_uri, None, None).await).await;
    assert_eq!(body[0]["code"], first.as_str());

    let resp = app
        .send(Method::POST, "/api/favorites", Some(&token), Some(json!({"club": second})))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    // Favoriting twice is harmless.
    let resp = app
        .send(Method::POST, "/api/favorites", Some(&token), Some(json!({"club": second})))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body = body_to_json(app.send(Method::GET, &list_uri, None, None).await).await;
    assert_eq!(body[0]["code"], second.as_str());
    assert_eq!(body[0]["favorite_count"], 1);
    assert_eq!(body[1]["favorite_count"], 0);

    let detail = body_to_json(
        app.send(Method::GET, &format!("/api/clubs/{second}"), Some(&token), None)
            .await,
    )
    .await;
    assert_eq!(detail["is_favorite"], true);
    assert_eq!(detail["is_subscribe"], false);
    assert_eq!(detail["favorite_count"], 1);

    let mine = body_to_json(app.send(Method::GET, "/api/favorites", Some(&token), None).await).await;
    assert!(find(&mine, "club_code", &second).is_some());

    let uri = format!("/api/favorites/{second}");
    let resp = app.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = app.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // Requires PostgreSQL
#[serial]
async fn test_officers_see_subscribers() {
    let app = TestApp::new();
    let mut guard = app.cleanup_guard();
    let (fan, _, fan_email) = create_test_user(&app.pool).await;
    let (officer, _, _) = create_test_user(&app.pool).await;
    let (member, _, _) = create_test_user(&app.pool).await;
    for id in [fan, officer, member] {
        guard.delete_user(id);
    }

    let code = unique_code("news");
    let club = insert_club(&app.pool, &code).await;
    guard.delete_club(club);
    add_membership(&app.pool, club, officer, ClubRole::Officer).await;
    add_membership(&app.pool, club, member, ClubRole::Member).await;

    let resp = app
        .send(
            Method::POST,
            "/api/subscriptions",
            Some(&app.token_for(fan)),
            Some(json!({"club": code})),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let uri = format!("/api/clubs/{code}/subscription");
    let resp = app.send(Method::GET, &uri, Some(&app.token_for(member)), None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app.send(Method::GET, &uri, Some(&app.token_for(officer)), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_to_json(resp).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["email"], fan_email.as_str());

    let resp = app
        .send(
            Method::GET,
            &format!("{uri}?format=xlsx"),
            Some(&app.token_for(officer)),
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        clubhub_server::export::xlsx::CONTENT_TYPE
    );

    let resp = app
        .send(
            Method::DELETE,
            &format!("/api/subscriptions/{code}"),
            Some(&app.token_for(fan)),
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // Requires PostgreSQL
#[serial]
async fn test_tags_count_clubs() {
    let app = TestApp::new();
    let mut guard = app.cleanup_guard();
    let (user, _, _) = create_test_user(&app.pool).await;
    guard.delete_user(user);
    let token = app.token_for(user);
    let tag = format!("Tag {}", random_suffix());

    for _ in 0..2 {
        let code = unique_code("tagged");
        let resp = app
            .send(
                Method::POST,
                "/api/clubs",
                Some(&token),
                Some(json!({"code": code, "name": code, "tags": [tag]})),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let (id,): (uuid::Uuid,) = sqlx::query_as("SELECT id FROM clubs WHERE code = $1")
            .bind(&code)
            .fetch_one(&app.pool)
            .await
            .unwrap();
        guard.delete_club(id);
    }
    let tag_name = tag.clone();
    guard.add(move |pool| async move {
        let _ = sqlx::query("DELETE FROM tags WHERE name = $1")
            .bind(tag_name)
            .execute(&pool)
            .await;
    });

    let all = body_to_json(app.send(Method::GET, "/api/tags", None, None).await).await;
    assert_eq!(find(&all, "name", &tag).map(|t| t["clubs"].clone()), Some(json!(2)));

    let uri = format!("/api/tags/{}", tag.replace(' ', "%20"));
    let resp = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_to_json(resp).await["clubs"], 2);

    let resp = app.send(Method::GET, "/api/tags/no-such-tag-here", None, None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // Requires PostgreSQL
#[serial]
async fn test_officers_curate_testimonials() {
    let app = TestApp::new();
    let mut guard = app.cleanup_guard();
    let (officer, _, _) = create_test_user(&app.pool).await;
    let (member, _, _) = create_test_user(&app.pool).await;
    guard.delete_user(officer);
    guard.delete_user(member);

    let code = unique_code("quotes");
    let club = insert_club(&app.pool, &code).await;
    guard.delete_club(club);
    add_membership(&app.pool, club, officer, ClubRole::Officer).await;
    add_membership(&app.pool, club, member, ClubRole::Member).await;

    let uri = format!("/api/clubs/{code}/testimonials");
    let resp = app
        .send(Method::POST, &uri, Some(&app.token_for(member)), Some(json!({"text": "Great"})))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .send(
            Method::POST,
            &uri,
            Some(&app.token_for(officer)),
            Some(json!({"text": "Best club on campus"})),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = body_to_json(resp).await["id"].as_str().unwrap().to_string();

    let listed = body_to_json(app.send(Method::GET, &uri, None, None).await).await;
    assert_eq!(listed[0]["text"], "Best club on campus");

    let resp = app
        .send(
            Method::PUT,
            &format!("{uri}/{id}"),
            Some(&app.token_for(officer)),
            Some(json!({"text": "Still the best"})),
        )
        .await;
    assert_eq!(body_to_json(resp).await["text"], "Still the best");

    let resp = app
        .send(Method::DELETE, &format!("{uri}/{id}"), Some(&app.token_for(officer)), None)
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // Requires PostgreSQL
#[serial]
async fn test_question_visibility_and_moderation() {
    let app = TestApp::new();
    let mut guard = app.cleanup_guard();
    let (asker, _, _) = create_test_user(&app.pool).await;
    let (officer, _, _) = create_test_user(&app.pool).await;
    let (stranger, _, _) = create_test_user(&app.pool).await;
    for id in [asker, officer, stranger] {
        guard.delete_user(id);
    }

    let code = unique_code("qa");
    let club = insert_club(&app.pool, &code).await;
    guard.delete_club(club);
    add_membership(&app.pool, club, officer, ClubRole::Officer).await;

    let uri = format!("/api/clubs/{code}/questions");
    let resp = app
        .send(Method::POST, &uri, None, Some(json!({"question": "Anyone there?"})))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .send(
            Method::POST,
            &uri,
            Some(&app.token_for(asker)),
            Some(json!({"question": "When do you meet?"})),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let question = body_to_json(resp).await;
    assert_eq!(question["approved"], false);
    let item = format!("{uri}/{}", question["id"].as_str().unwrap());

    // Pending questions are visible to their author and officers only.
    let count = |body: Value| body.as_array().map_or(0, Vec::len);
    assert_eq!(count(body_to_json(app.send(Method::GET, &uri, None, None).await).await), 0);
    let stranger_view = app.send(Method::GET, &uri, Some(&app.token_for(stranger)), None).await;
    assert_eq!(count(body_to_json(stranger_view).await), 0);
    let asker_view = app.send(Method::GET, &uri, Some(&app.token_for(asker)), None).await;
    assert_eq!(count(body_to_json(asker_view).await), 1);

    // Authors cannot approve their own question.
    let resp = app
        .send(Method::PATCH, &item, Some(&app.token_for(asker)), Some(json!({"approved": true})))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .send(
            Method::PATCH,
            &item,
            Some(&app.token_for(officer)),
            Some(json!({"answer": "Tuesdays at 7", "approved": true})),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_to_json(resp).await;
    assert_eq!(body["answer"], "Tuesdays at 7");
    assert_eq!(body["approved"], true);
    assert!(body["responder"].is_string());

    let public = body_to_json(app.send(Method::GET, &uri, None, None).await).await;
    assert_eq!(public[0]["answer"], "Tuesdays at 7");

    // Rewording sends the question back for approval.
    let resp = app
        .send(
            Method::PATCH,
            &item,
            Some(&app.token_for(asker)),
            Some(json!({"question": "When and where do you meet?"})),
        )
        .await;
    assert_eq!(body_to_json(resp).await["approved"], false);

    let resp = app.send(Method::DELETE, &item, Some(&app.token_for(stranger)), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = app.send(Method::DELETE, &item, Some(&app.token_for(asker)), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}
