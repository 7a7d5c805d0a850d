//! End-to-end checks of the HTTP surface against a throwaway SQLite file.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use msgr_api::{AppState, AppStateInner, ChatLimits, auth, router};
use msgr_db::Database;
use msgr_types::api::{AuthResponse, ChatListEntry, ChatPageResponse, HistoryResponse, PollResponse, ProfileResponse};

const SECRET: &str = "test-secret";

struct TestApp {
    app: Router,
    state: AppState,
    _dir: TempDir,
}

struct TestUser {
    id: Uuid,
    profile_id: i64,
    token: String,
}

fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(AppStateInner {
        db: Database::open(&dir.path().join("msgr.db")).unwrap(),
        jwt_secret: SECRET.to_string(),
        limits: ChatLimits {
            max_message_len: 50,
            history_page_size: 2,
        },
    });
    TestApp {
        app: router(state.clone()),
        state,
        _dir: dir,
    }
}

impl TestApp {
    fn user(&self, email: &str) -> TestUser {
        let id = Uuid::new_v4();
        let profile_id = self.state.db.create_user(id, email, "hash").unwrap().unwrap();
        let token = auth::create_token(SECRET, id, email).unwrap();
        TestUser { id, profile_id, token }
    }

    async fn call(&self, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, headers, body)
    }

    async fn get(&self, user: &TestUser, uri: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", user.token))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = self.call(req).await;
        (status, body)
    }

    async fn get_json<T: DeserializeOwned>(&self, user: &TestUser, uri: &str) -> T {
        let (status, body) = self.get(user, uri).await;
        assert_eq!(status, StatusCode::OK, "GET {} failed: {}", uri, String::from_utf8_lossy(&body));
        serde_json::from_slice(&body).unwrap()
    }

    async fn post_form(&self, user: &TestUser, uri: &str, form: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", user.token))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap();
        self.call(req).await
    }

    /// Start a chat from `a` to `b` and return its id.
    async fn start_chat(&self, a: &TestUser, b: &TestUser) -> i64 {
        let (status, headers, _) = self.post_form(a, &format!("/users/{}", b.profile_id), "").await;
        assert_eq!(status, StatusCode::FOUND);
        let location = headers.get(header::LOCATION).unwrap().to_str().unwrap();
        location.strip_prefix("/chats/").unwrap().parse().unwrap()
    }

    fn message_count(&self) -> i64 {
        self.state
            .db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?))
            .unwrap()
    }
}

#[tokio::test]
async fn send_then_poll_round_trip() {
    let t = test_app();
    let a = t.user("a@example.com");
    let b = t.user("b@example.com");
    let chat_id = t.start_chat(&a, &b).await;

    let (status, _, _) = t.post_form(&a, &format!("/chats/{}", chat_id), "content=hi").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let for_b: PollResponse = t
        .get_json(&b, &format!("/chats/{}?latest_pk=0&latest_seen_pk=0", chat_id))
        .await;
    assert_eq!(for_b.new_messages.len(), 1);
    let hi = &for_b.new_messages[0];
    assert_eq!(hi.content, "hi");
    assert_eq!(hi.sender_id, a.id);
    assert!(hi.is_seen);
    assert_eq!(for_b.latest_pk, hi.id);

    let for_a: PollResponse = t
        .get_json(&a, &format!("/chats/{}?latest_pk={}&latest_seen_pk=0", chat_id, hi.id))
        .await;
    assert!(for_a.new_messages.is_empty());
    assert_eq!(for_a.seen_message_ids, vec![hi.id]);
    assert_eq!(for_a.latest_seen_pk, hi.id);

    // Same cursors again: nothing new either side.
    let again: PollResponse = t
        .get_json(&a, &format!("/chats/{}?latest_pk={}&latest_seen_pk={}", chat_id, hi.id, hi.id))
        .await;
    assert!(again.new_messages.is_empty());
    assert!(again.seen_message_ids.is_empty());
    assert_eq!(again.latest_pk, hi.id);
    assert_eq!(again.latest_seen_pk, hi.id);
}

#[tokio::test]
async fn starting_a_chat_twice_reuses_it() {
    let t = test_app();
    let a = t.user("a@example.com");
    let b = t.user("b@example.com");

    let first = t.start_chat(&a, &b).await;
    let second = t.start_chat(&b, &a).await;
    assert_eq!(first, second);

    let notes = t.start_chat(&a, &a).await;
    assert_ne!(notes, first);
    assert_eq!(t.start_chat(&a, &a).await, notes);
}

#[tokio::test]
async fn chat_page_marks_everything_seen() {
    let t = test_app();
    let a = t.user("a@example.com");
    let b = t.user("b@example.com");
    t.state.db.update_profile(a.id, "Ada", "Lovelace", Some("countess"), "").unwrap();
    let chat_id = t.start_chat(&a, &b).await;
    t.post_form(&a, &format!("/chats/{}", chat_id), "content=one").await;
    t.post_form(&a, &format!("/chats/{}", chat_id), "content=two").await;

    let page: ChatPageResponse = t.get_json(&b, &format!("/chats/{}", chat_id)).await;
    assert_eq!(page.title, "Ada Lovelace");
    assert_eq!(page.messages.len(), 2);
    assert!(page.messages.iter().all(|m| m.is_seen && !m.is_own));
    assert_eq!(page.latest_pk, page.messages[1].id);

    let for_a: PollResponse = t
        .get_json(&a, &format!("/chats/{}?latest_pk={}", chat_id, page.latest_pk))
        .await;
    assert_eq!(for_a.seen_message_ids.len(), 2);
}

#[tokio::test]
async fn outsiders_are_forbidden_and_cannot_write() {
    let t = test_app();
    let a = t.user("a@example.com");
    let b = t.user("b@example.com");
    let c = t.user("c@example.com");
    let chat_id = t.start_chat(&a, &b).await;
    t.post_form(&a, &format!("/chats/{}", chat_id), "content=private").await;

    let (status, _) = t.get(&c, &format!("/chats/{}", chat_id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t.get(&c, &format!("/chats/{}?latest_pk=0&latest_seen_pk=0", chat_id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t.get(&c, &format!("/chats/{}/messages", chat_id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = t.post_form(&c, &format!("/chats/{}", chat_id), "content=intruder").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _, _) = t.post_form(&c, &format!("/chats/{}", chat_id), "").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(t.message_count(), 1);

    // The outsider's peek did not mark anything seen.
    let for_a: PollResponse = t
        .get_json(&a, &format!("/chats/{}?latest_pk=0&latest_seen_pk=0", chat_id))
        .await;
    assert!(for_a.seen_message_ids.is_empty());
}

#[tokio::test]
async fn unknown_chat_is_not_found() {
    let t = test_app();
    let a = t.user("a@example.com");

    let (status, _) = t.get(&a, "/chats/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = t.post_form(&a, "/chats/9999", "content=hello").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = t.post_form(&a, "/users/9999", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_content_is_rejected_without_side_effects() {
    let t = test_app();
    let a = t.user("a@example.com");
    let b = t.user("b@example.com");
    let chat_id = t.start_chat(&a, &b).await;

    let (status, _, body) = t.post_form(&a, &format!("/chats/{}", chat_id), "content=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8(body).unwrap(), "Message content is empty.");

    let long = "x".repeat(51);
    let (status, _, body) = t
        .post_form(&a, &format!("/chats/{}", chat_id), &format!("content={}", long))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8(body).unwrap(), "Message content is longer than 50 characters.");

    assert_eq!(t.message_count(), 0);
}

#[tokio::test]
async fn deleting_someone_elses_message_is_silently_ignored() {
    let t = test_app();
    let a = t.user("a@example.com");
    let b = t.user("b@example.com");
    let chat_id = t.start_chat(&a, &b).await;
    t.post_form(&a, &format!("/chats/{}", chat_id), "content=keep%20me").await;

    let poll: PollResponse = t
        .get_json(&b, &format!("/chats/{}?latest_pk=0&latest_seen_pk=0", chat_id))
        .await;
    let message_id = poll.new_messages[0].id;
    assert_eq!(poll.new_messages[0].content, "keep me");

    let (status, _, _) = t
        .post_form(&b, "/chats/delete-message", &format!("message={}", message_id))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _, _) = t.post_form(&b, "/chats/delete-message", "message=424242").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let poll: PollResponse = t
        .get_json(&b, &format!("/chats/{}?latest_pk=0&latest_seen_pk=0", chat_id))
        .await;
    assert_eq!(poll.new_messages.len(), 1);

    let (status, _, _) = t
        .post_form(&a, "/chats/delete-message", &format!("message={}", message_id))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(t.message_count(), 0);
}

#[tokio::test]
async fn exit_resets_unread_count_on_chat_list() {
    let t = test_app();
    let a = t.user("a@example.com");
    let b = t.user("b@example.com");
    let chat_id = t.start_chat(&a, &b).await;
    t.post_form(&a, &format!("/chats/{}", chat_id), "content=one").await;
    t.post_form(&a, &format!("/chats/{}", chat_id), "content=two").await;

    let list: Vec<ChatListEntry> = t.get_json(&b, "/chats").await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].chat_id, chat_id);
    assert_eq!(list[0].title, "new user");
    assert_eq!(list[0].unread_count, 2);

    // Empty body: the client left the chat view.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/chats/{}", chat_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", b.token))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = t.call(req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let list: Vec<ChatListEntry> = t.get_json(&b, "/chats").await;
    assert_eq!(list[0].unread_count, 0);

    t.post_form(&a, &format!("/chats/{}", chat_id), "content=three").await;
    let list: Vec<ChatListEntry> = t.get_json(&b, "/chats").await;
    assert_eq!(list[0].unread_count, 1);
}

#[tokio::test]
async fn non_form_send_is_rejected_without_side_effects() {
    let t = test_app();
    let a = t.user("a@example.com");
    let b = t.user("b@example.com");
    let chat_id = t.start_chat(&a, &b).await;
    t.post_form(&a, &format!("/chats/{}", chat_id), "content=ping").await;

    let req = Request::builder()
        .method("POST")
        .uri(format!("/chats/{}", chat_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", b.token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"content":"hi"}"#))
        .unwrap();
    let (status, _, _) = t.call(req).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    // Neither a send nor an exit happened.
    assert_eq!(t.message_count(), 1);
    let list: Vec<ChatListEntry> = t.get_json(&b, "/chats").await;
    assert_eq!(list[0].unread_count, 1);
}

#[tokio::test]
async fn history_is_paginated_newest_first() {
    let t = test_app();
    let a = t.user("a@example.com");
    let notes = t.start_chat(&a, &a).await;
    for i in 0..3 {
        t.post_form(&a, &format!("/chats/{}", notes), &format!("content=note{}", i)).await;
    }

    let first: HistoryResponse = t.get_json(&a, &format!("/chats/{}/messages", notes)).await;
    assert_eq!(first.page, 1);
    assert_eq!(first.messages.len(), 2);
    assert_eq!(first.messages[0].content, "note2");
    assert!(first.has_more);
    assert_eq!(first.first_item_pk, first.messages[0].id);

    let second: HistoryResponse = t.get_json(&a, &format!("/chats/{}/messages?page=2", notes)).await;
    assert_eq!(second.messages.len(), 1);
    assert_eq!(second.messages[0].content, "note0");
    assert!(!second.has_more);
}

#[tokio::test]
async fn search_and_profile_lookup() {
    let t = test_app();
    let a = t.user("a@example.com");
    let b = t.user("b@example.com");
    t.state.db.update_profile(b.id, "Bob", "Builder", Some("bob_the"), "Can we fix it?").unwrap();

    let hits: Vec<ProfileResponse> = t.get_json(&a, "/users?q=build").await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].profile_id, b.profile_id);

    let none: Vec<ProfileResponse> = t.get_json(&a, "/users").await;
    assert!(none.is_empty());

    let profile: ProfileResponse = t.get_json(&a, &format!("/users/{}", b.profile_id)).await;
    assert_eq!(profile.display_name, "Bob Builder");
    assert_eq!(profile.identifier.as_deref(), Some("bob_the"));
    assert_eq!(profile.biography, "Can we fix it?");

    let (status, _) = t.get(&a, "/users/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() {
    let t = test_app();
    let req = Request::builder().uri("/chats").body(Body::empty()).unwrap();
    let (status, _, _) = t.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = TestUser {
        id: Uuid::new_v4(),
        profile_id: 0,
        token: auth::create_token("other-secret", Uuid::new_v4(), "x@example.com").unwrap(),
    };
    let (status, _) = t.get(&forged, "/chats").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_and_login() {
    let t = test_app();
    let body = r#"{"email":"new@example.com","password":"correct horse"}"#;

    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    let (status, _, resp) = t.call(req).await;
    assert_eq!(status, StatusCode::CREATED);
    let registered: AuthResponse = serde_json::from_slice(&resp).unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    let (status, _, _) = t.call(req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    let (status, _, resp) = t.call(req).await;
    assert_eq!(status, StatusCode::OK);
    let logged_in: AuthResponse = serde_json::from_slice(&resp).unwrap();
    assert_eq!(logged_in.user_id, registered.user_id);

    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"email":"new@example.com","password":"wrong password"}"#))
        .unwrap();
    let (status, _, _) = t.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The new account can use the token right away.
    let user = TestUser { id: registered.user_id, profile_id: 0, token: logged_in.token };
    let list: Vec<ChatListEntry> = t.get_json(&user, "/chats").await;
    assert!(list.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_registrations_of_one_email_conflict() {
    let t = test_app();
    let body = r#"{"email":"race@example.com","password":"correct horse"}"#;

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let app = t.app.clone();
            tokio::spawn(async move {
                let req = Request::builder()
                    .method("POST")
                    .uri("/auth/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap();
                app.oneshot(req).await.unwrap().status()
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for task in tasks {
        statuses.push(task.await.unwrap());
    }
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
    assert!(
        statuses
            .iter()
            .all(|s| *s == StatusCode::CREATED || *s == StatusCode::CONFLICT),
        "{:?}",
        statuses
    );
}
