//! Shared harness: a router driven through `oneshot`, plus scenarios that run
//! unchanged against any store.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use phobo::config::{DeletePolicy, Operation};
use phobo::{app, resolve, social_catalog, AppState, FullConfig, MemoryStore, ResolvedModel, RowStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    router: Router,
}

pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}

impl TestApp {
    pub fn new(store: Arc<dyn RowStore>, model: ResolvedModel) -> Self {
        TestApp {
            router: app(AppState::new(store, model), 1024 * 1024),
        }
    }

    pub fn memory() -> Self {
        Self::memory_with(resolve(&social_catalog().unwrap()).unwrap())
    }

    pub fn memory_with(model: ResolvedModel) -> Self {
        Self::new(Arc::new(MemoryStore::new()), model)
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Reply {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        Reply { status, body }
    }

    pub async fn get(&self, uri: &str) -> Reply {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Reply {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> Reply {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> Reply {
        self.request(Method::PATCH, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> Reply {
        self.request(Method::DELETE, uri, None).await
    }

    /// Create a user and return its id.
    pub async fn user(&self, email: &str) -> i64 {
        let r = self
            .post("/users", json!({ "email": email, "password_hash": "secret-hash" }))
            .await;
        assert_eq!(r.status, StatusCode::CREATED, "{}", r.body);
        r.data()["user_id"].as_i64().unwrap()
    }
}

/// The built-in catalog after `edit`, resolved.
pub fn model_with(edit: impl FnOnce(&mut FullConfig)) -> ResolvedModel {
    let mut config = social_catalog().unwrap();
    edit(&mut config);
    resolve(&config).unwrap()
}

/// Catalog edits used by scenarios that need non-default policies.
pub mod catalogs {
    use super::*;

    fn set_relationship_policy(config: &mut FullConfig, id: &str, policy: DeletePolicy) {
        let rel = config.relationships.iter_mut().find(|r| r.id == id).unwrap();
        rel.on_delete = policy;
    }

    pub fn cascade(c: &mut FullConfig) {
        set_relationship_policy(c, "post_files_post", DeletePolicy::Cascade);
        let poly = c.polymorphic.iter_mut().find(|p| p.id == "reaction_target").unwrap();
        poly.on_delete = DeletePolicy::Cascade;
    }

    pub fn restrict(c: &mut FullConfig) {
        set_relationship_policy(c, "user_roles_role", DeletePolicy::Restrict);
    }

    pub fn set_null(c: &mut FullConfig) {
        set_relationship_policy(c, "posts_parent", DeletePolicy::SetNull);
    }

    pub fn verified(c: &mut FullConfig) {
        c.verify_all_polymorphic();
    }

    pub fn read_only_roles(c: &mut FullConfig) {
        let roles = c.api_entities.iter_mut().find(|e| e.entity_id == "roles").unwrap();
        roles.operations = vec![Operation::List, Operation::Read];
    }
}

pub mod scenarios {
    use super::*;

    pub async fn user_lifecycle(app: &TestApp) {
        let created = app
            .post(
                "/users",
                json!({ "email": "ada@example.com", "password_hash": "h1", "phone_number": "555-0100" }),
            )
            .await;
        assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
        let user = created.data().clone();
        let id = user["user_id"].as_i64().unwrap();
        assert_eq!(user["email"], "ada@example.com");
        assert_eq!(user["is_active"], true);
        assert!(user["created_at"].is_string());
        assert!(user["last_login"].is_null());

        let read = app.get(&format!("/users/{}", id)).await;
        assert_eq!(read.status, StatusCode::OK);
        assert_eq!(read.data(), &user);

        let updated = app
            .patch(&format!("/users/{}", id), json!({ "is_active": false }))
            .await;
        assert_eq!(updated.status, StatusCode::OK, "{}", updated.body);
        assert_eq!(updated.data()["is_active"], false);
        assert_eq!(updated.data()["email"], "ada@example.com");
        assert_eq!(updated.data()["phone_number"], "555-0100");

        let put = app
            .put(&format!("/users/{}", id), json!({ "phone_number": null }))
            .await;
        assert_eq!(put.status, StatusCode::OK, "{}", put.body);
        assert!(put.data()["phone_number"].is_null());
        assert_eq!(put.data()["is_active"], false);

        let list = app.get("/users").await;
        assert_eq!(list.status, StatusCode::OK);
        assert_eq!(list.body["meta"]["count"], 1);
        assert_eq!(list.data()[0]["user_id"], id);

        let deleted = app.delete(&format!("/users/{}", id)).await;
        assert_eq!(deleted.status, StatusCode::NO_CONTENT);
        assert!(deleted.body.is_null());
        assert_eq!(app.get(&format!("/users/{}", id)).await.status, StatusCode::NOT_FOUND);
        assert_eq!(app.delete(&format!("/users/{}", id)).await.status, StatusCode::NOT_FOUND);
    }

    pub async fn create_rejections(app: &TestApp) {
        app.user("dup@example.com").await;
        let dup = app
            .post("/users", json!({ "email": "dup@example.com", "password_hash": "x" }))
            .await;
        assert_eq!(dup.status, StatusCode::CONFLICT, "{}", dup.body);
        assert_eq!(dup.body["error"]["code"], "conflict");
        let original = app.get("/users").await;
        assert_eq!(original.data()[0]["password_hash"], "secret-hash");

        let missing = app.post("/users", json!({ "email": "nohash@example.com" })).await;
        assert_eq!(missing.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(missing.body["error"]["code"], "validation_error");

        let bad_enum = app
            .post(
                "/groups",
                json!({ "creator_user_id": 1, "group_name": "g", "privacy_type": "SECRET" }),
            )
            .await;
        assert_eq!(bad_enum.status, StatusCode::UNPROCESSABLE_ENTITY);

        let list = app.get("/users").await;
        assert_eq!(list.body["meta"]["count"], 1);
        assert!(app.get("/groups").await.data().as_array().unwrap().is_empty());
    }

    pub async fn create_ignores_unknown_fields(app: &TestApp) {
        let r = app
            .post(
                "/roles",
                json!({ "role_name": "admin", "description": "all access", "legacy_flag": true, "role_id": 77 }),
            )
            .await;
        assert_eq!(r.status, StatusCode::CREATED, "{}", r.body);
        assert!(r.data().get("legacy_flag").is_none());
        assert_ne!(r.data()["role_id"], 77);
    }

    pub async fn update_rejections(app: &TestApp) {
        let id = app.user("upd@example.com").await;
        let unknown = app
            .patch(&format!("/users/{}", id), json!({ "nickname": "x" }))
            .await;
        assert_eq!(unknown.status, StatusCode::UNPROCESSABLE_ENTITY);

        let readonly = app
            .patch(&format!("/users/{}", id), json!({ "created_at": "2020-01-01T00:00:00Z" }))
            .await;
        assert_eq!(readonly.status, StatusCode::UNPROCESSABLE_ENTITY);

        let not_null = app
            .patch(&format!("/users/{}", id), json!({ "password_hash": null }))
            .await;
        assert_eq!(not_null.status, StatusCode::UNPROCESSABLE_ENTITY);

        let missing = app.patch("/users/999999", json!({ "is_active": false })).await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let bad_key = app.get("/users/abc").await;
        assert_eq!(bad_key.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    pub async fn friendship_lifecycle(app: &TestApp) {
        let a = app.user("one@example.com").await;
        let b = app.user("two@example.com").await;
        let (low, high) = (a.min(b), a.max(b));

        let reversed = app
            .post(
                "/friendships",
                json!({ "user_one_id": high, "user_two_id": low, "status": "PENDING", "action_user_id": high }),
            )
            .await;
        assert_eq!(reversed.status, StatusCode::UNPROCESSABLE_ENTITY);

        let created = app
            .post(
                "/friendships",
                json!({ "user_one_id": low, "user_two_id": high, "status": "PENDING", "action_user_id": low }),
            )
            .await;
        assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
        assert_eq!(created.data()["status"], "PENDING");

        let dup = app
            .post(
                "/friendships",
                json!({ "user_one_id": low, "user_two_id": high, "status": "PENDING", "action_user_id": low }),
            )
            .await;
        assert_eq!(dup.status, StatusCode::CONFLICT);

        let path = format!("/friendships/{}/{}", low, high);
        assert_eq!(app.get(&path).await.data()["status"], "PENDING");
        let accepted = app.put(&path, json!({ "status": "ACCEPTED" })).await;
        assert_eq!(accepted.status, StatusCode::OK, "{}", accepted.body);
        assert_eq!(accepted.data()["status"], "ACCEPTED");
        assert_eq!(accepted.data()["action_user_id"], low);
        assert_eq!(accepted.data()["user_one_id"], low);

        let read = app.get(&path).await;
        assert_eq!(read.data()["status"], "ACCEPTED");

        assert_eq!(app.get(&format!("/friendships/{}", low)).await.status, StatusCode::NOT_FOUND);
        assert_eq!(
            app.get(&format!("/friendships/{}/{}/1", low, high)).await.status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(app.get("/friendships/x/y").await.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(app.get(&format!("/friendships/{}/{}", high, low)).await.status, StatusCode::NOT_FOUND);

        assert_eq!(app.delete(&path).await.status, StatusCode::NO_CONTENT);
        assert_eq!(app.get(&path).await.status, StatusCode::NOT_FOUND);
    }

    pub async fn reaction_lifecycle(app: &TestApp) {
        let u = app.user("reactor@example.com").await;
        let created = app
            .post(
                "/reactions",
                json!({ "reactor_user_id": u, "reactable_id": 12, "reactable_type": "POST", "reaction_type": "LIKE" }),
            )
            .await;
        assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);

        let collision = app
            .post(
                "/reactions",
                json!({ "reactor_user_id": u, "reactable_id": 12, "reactable_type": "POST", "reaction_type": "LOVE" }),
            )
            .await;
        assert_eq!(collision.status, StatusCode::CONFLICT);

        let path = format!("/reactions/{}/12/POST", u);
        assert_eq!(app.get(&path).await.data()["reaction_type"], "LIKE");
        let changed = app.put(&path, json!({ "reaction_type": "LOVE" })).await;
        assert_eq!(changed.status, StatusCode::OK, "{}", changed.body);
        assert_eq!(changed.data()["reaction_type"], "LOVE");
        assert_eq!(app.get(&path).await.data()["reaction_type"], "LOVE");

        let other = format!("/reactions/{}/12/COMMENT", u);
        assert_eq!(app.get(&other).await.status, StatusCode::NOT_FOUND);
        assert_eq!(
            app.get(&format!("/reactions/{}/12/PAGE", u)).await.status,
            StatusCode::UNPROCESSABLE_ENTITY
        );

        assert_eq!(app.delete(&path).await.status, StatusCode::NO_CONTENT);
        assert_eq!(app.get(&path).await.status, StatusCode::NOT_FOUND);
    }

    pub async fn post_file_survives_post_delete(app: &TestApp) {
        let u = app.user("author@example.com").await;
        let post = app
            .post(
                "/posts",
                json!({ "author_id": u, "author_type": "USER", "text_content": "hello" }),
            )
            .await;
        assert_eq!(post.status, StatusCode::CREATED, "{}", post.body);
        assert_eq!(post.data()["privacy_setting"], "FRIENDS");
        assert_eq!(post.data()["post_type"], "ORIGINAL");
        let post_id = post.data()["post_id"].as_i64().unwrap();

        let file = app
            .post(
                "/files",
                json!({
                    "uploader_user_id": u, "file_name": "cat.png", "file_type": "image/png",
                    "file_size": 2048, "file_url": "https://cdn.example.com/cat.png"
                }),
            )
            .await;
        assert_eq!(file.status, StatusCode::CREATED, "{}", file.body);
        let file_id = file.data()["file_id"].as_i64().unwrap();

        let link = app
            .post(
                "/post-files",
                json!({ "post_id": post_id, "file_id": file_id, "display_order": 1 }),
            )
            .await;
        assert_eq!(link.status, StatusCode::CREATED, "{}", link.body);

        let listed = app.get("/post-files").await;
        assert_eq!(listed.body["meta"]["count"], 1);
        assert_eq!(listed.data()[0]["display_order"], 1);

        assert_eq!(app.delete(&format!("/posts/{}", post_id)).await.status, StatusCode::NO_CONTENT);
        let still = app.get(&format!("/post-files/{}/{}", post_id, file_id)).await;
        assert_eq!(still.status, StatusCode::OK);
        assert_eq!(still.data()["display_order"], 1);
    }

    pub async fn post_update_touches_updated_at(app: &TestApp) {
        let u = app.user("editor@example.com").await;
        let post = app
            .post("/posts", json!({ "author_id": u, "author_type": "USER" }))
            .await;
        assert_eq!(post.status, StatusCode::CREATED, "{}", post.body);
        assert!(post.data()["updated_at"].is_null());
        let id = post.data()["post_id"].as_i64().unwrap();

        let edited = app
            .patch(&format!("/posts/{}", id), json!({ "text_content": "edited" }))
            .await;
        assert_eq!(edited.status, StatusCode::OK, "{}", edited.body);
        assert_eq!(edited.data()["text_content"], "edited");
        assert!(edited.data()["updated_at"].is_string());
        assert_eq!(edited.data()["created_at"], post.data()["created_at"]);
    }

    /// Create, read back, and compare against the submitted fields. Returns the new id.
    async fn create_and_read(app: &TestApp, path: &str, id_column: &str, payload: Value) -> i64 {
        let created = app.post(&format!("/{}", path), payload.clone()).await;
        assert_eq!(created.status, StatusCode::CREATED, "{}: {}", path, created.body);
        let id = created.data()[id_column].as_i64().unwrap();
        let read = app.get(&format!("/{}/{}", path, id)).await;
        assert_eq!(read.status, StatusCode::OK, "{}", path);
        for (field, value) in payload.as_object().unwrap() {
            assert_eq!(&read.data()[field], value, "{}.{}", path, field);
        }
        assert_eq!(read.data(), created.data(), "{}", path);
        id
    }

    pub async fn create_then_read_matches_payload(app: &TestApp) {
        let u = create_and_read(
            app,
            "users",
            "user_id",
            json!({ "email": "owner@example.com", "password_hash": "h", "phone_number": "555-0199", "is_active": true }),
        )
        .await;
        create_and_read(
            app,
            "profiles",
            "profile_id",
            json!({
                "user_id": u, "first_name": "Ada", "last_name": "Lovelace", "bio": "analyst",
                "date_of_birth": "1815-12-10", "gender": "FEMALE"
            }),
        )
        .await;
        create_and_read(app, "roles", "role_id", json!({ "role_name": "analyst", "description": "reads dashboards" }))
            .await;
        let post = create_and_read(
            app,
            "posts",
            "post_id",
            json!({ "author_id": u, "author_type": "USER", "text_content": "hi", "privacy_setting": "PUBLIC" }),
        )
        .await;
        create_and_read(
            app,
            "files",
            "file_id",
            json!({
                "uploader_user_id": u, "file_name": "notes.md", "file_type": "text/markdown",
                "file_size": 512, "file_url": "https://cdn.example.com/notes.md"
            }),
        )
        .await;
        create_and_read(
            app,
            "comments",
            "comment_id",
            json!({ "commenter_user_id": u, "commentable_id": post, "commentable_type": "POST", "text_content": "nice" }),
        )
        .await;
        let page = create_and_read(
            app,
            "pages",
            "page_id",
            json!({
                "page_name": "Ferris Fans", "username": "ferris", "category": "Community",
                "contact_info": { "email": "hi@ferris.example", "phones": ["555-0101"] }
            }),
        )
        .await;
        let group = create_and_read(
            app,
            "groups",
            "group_id",
            json!({ "creator_user_id": u, "group_name": "Rustaceans", "privacy_type": "PRIVATE" }),
        )
        .await;
        create_and_read(
            app,
            "group-rules",
            "rule_id",
            json!({ "group_id": group, "title": "Be kind", "details": "No flames", "display_order": 2 }),
        )
        .await;
        create_and_read(
            app,
            "membership-questions",
            "question_id",
            json!({ "group_id": group, "question_text": "Why join?" }),
        )
        .await;
        let event = create_and_read(
            app,
            "events",
            "event_id",
            json!({
                "host_id": page, "host_type": "PAGE", "event_name": "Meetup",
                "start_time": "2025-09-02T16:00:00+00:00", "end_time": "2025-09-02T23:30:00.25+00:00",
                "privacy_setting": "PUBLIC"
            }),
        )
        .await;
        create_and_read(
            app,
            "event-publications",
            "publication_id",
            json!({
                "event_id": event, "publisher_id": u, "publisher_type": "USER",
                "location_id": group, "location_type": "GROUP"
            }),
        )
        .await;
        let reason = create_and_read(
            app,
            "report-reasons",
            "reason_id",
            json!({ "title": "Spam", "description": "Unsolicited promotion" }),
        )
        .await;
        let report = create_and_read(
            app,
            "reports",
            "report_id",
            json!({
                "reporter_user_id": u, "reportable_id": post, "reportable_type": "POST",
                "reason_id": reason, "status": "PENDING"
            }),
        )
        .await;
        create_and_read(
            app,
            "report-actions",
            "action_id",
            json!({ "report_id": report, "reviewer_admin_id": u, "action_taken": "WARN_USER", "notes": "first warning" }),
        )
        .await;
    }

    pub async fn empty_list(app: &TestApp) {
        let r = app.get("/report-actions").await;
        assert_eq!(r.status, StatusCode::OK);
        assert_eq!(r.body, json!({ "data": [], "meta": { "count": 0 } }));
    }

    pub async fn unknown_resource(app: &TestApp) {
        assert_eq!(app.get("/widgets").await.status, StatusCode::NOT_FOUND);
        assert_eq!(app.get("/widgets/1").await.status, StatusCode::NOT_FOUND);
        let r = app.post("/widgets", json!({})).await;
        assert_eq!(r.status, StatusCode::NOT_FOUND);
        assert_eq!(r.body["error"]["code"], "not_found");
    }

    pub async fn text_with_nul_is_rejected(app: &TestApp) {
        let r = app.post("/roles", json!({ "role_name": "a\u{0}b" })).await;
        assert_eq!(r.status, StatusCode::UNPROCESSABLE_ENTITY, "{}", r.body);
        assert_eq!(app.get("/roles").await.body["meta"]["count"], 0);

        let id = app.user("nul@example.com").await;
        let r = app
            .patch(&format!("/users/{}", id), json!({ "phone_number": "555\u{0}" }))
            .await;
        assert_eq!(r.status, StatusCode::UNPROCESSABLE_ENTITY, "{}", r.body);
    }

    pub async fn timestamps_are_normalised_to_utc(app: &TestApp) {
        let id = app.user("clock@example.com").await;
        let whole = app
            .patch(&format!("/users/{}", id), json!({ "last_login": "2024-03-01T12:30:00+02:00" }))
            .await;
        assert_eq!(whole.status, StatusCode::OK, "{}", whole.body);
        assert_eq!(whole.data()["last_login"], "2024-03-01T10:30:00+00:00");

        let fractional = app
            .patch(&format!("/users/{}", id), json!({ "last_login": "2024-03-01T08:00:00.500Z" }))
            .await;
        assert_eq!(fractional.data()["last_login"], "2024-03-01T08:00:00.5+00:00");
        let read = app.get(&format!("/users/{}", id)).await;
        assert_eq!(read.data()["last_login"], "2024-03-01T08:00:00.5+00:00");
        assert!(read.data()["created_at"].as_str().unwrap().ends_with("+00:00"));
    }

    pub async fn link_table_without_update_columns(app: &TestApp) {
        let u = app.user("member@example.com").await;
        let role = app.post("/roles", json!({ "role_name": "moderator" })).await;
        let role_id = role.data()["role_id"].as_i64().unwrap();

        let link = app
            .post("/user-roles", json!({ "user_id": u, "role_id": role_id }))
            .await;
        assert_eq!(link.status, StatusCode::CREATED, "{}", link.body);

        let path = format!("/user-roles/{}/{}", u, role_id);
        let noop = app.put(&path, json!({})).await;
        assert_eq!(noop.status, StatusCode::OK);
        assert_eq!(noop.data(), link.data());

        let rejected = app.put(&path, json!({ "role_id": 99 })).await;
        assert_eq!(rejected.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    /// Expects [`catalogs::cascade`].
    pub async fn cascade_follows_relationships_and_polymorphic_targets(app: &TestApp) {
        let u = app.user("cascade@example.com").await;
        let post = app
            .post("/posts", json!({ "author_id": u, "author_type": "USER" }))
            .await;
        let post_id = post.data()["post_id"].as_i64().unwrap();
        let file = app
            .post(
                "/files",
                json!({
                    "uploader_user_id": u, "file_name": "a.txt", "file_type": "text/plain",
                    "file_size": 1, "file_url": "https://cdn.example.com/a.txt"
                }),
            )
            .await;
        let file_id = file.data()["file_id"].as_i64().unwrap();
        let link = app
            .post("/post-files", json!({ "post_id": post_id, "file_id": file_id }))
            .await;
        assert_eq!(link.status, StatusCode::CREATED, "{}", link.body);
        for (reactable_type, reaction) in [("POST", "LIKE"), ("COMMENT", "SAD")] {
            let r = app
                .post(
                    "/reactions",
                    json!({ "reactor_user_id": u, "reactable_id": post_id, "reactable_type": reactable_type, "reaction_type": reaction }),
                )
                .await;
            assert_eq!(r.status, StatusCode::CREATED, "{}", r.body);
        }

        assert_eq!(app.delete(&format!("/posts/{}", post_id)).await.status, StatusCode::NO_CONTENT);
        assert_eq!(app.get("/post-files").await.body["meta"]["count"], 0);
        let reactions = app.get("/reactions").await;
        assert_eq!(reactions.body["meta"]["count"], 1);
        assert_eq!(reactions.data()[0]["reactable_type"], "COMMENT");
        assert_eq!(app.get(&format!("/files/{}", file_id)).await.status, StatusCode::OK);
    }

    /// Expects [`catalogs::restrict`].
    pub async fn restrict_blocks_delete_while_referenced(app: &TestApp) {
        let u = app.user("restrict@example.com").await;
        let role = app.post("/roles", json!({ "role_name": "editor" })).await;
        let role_id = role.data()["role_id"].as_i64().unwrap();
        let link = app
            .post("/user-roles", json!({ "user_id": u, "role_id": role_id }))
            .await;
        assert_eq!(link.status, StatusCode::CREATED, "{}", link.body);

        let blocked = app.delete(&format!("/roles/{}", role_id)).await;
        assert_eq!(blocked.status, StatusCode::CONFLICT);
        assert_eq!(app.get(&format!("/roles/{}", role_id)).await.status, StatusCode::OK);

        assert_eq!(
            app.delete(&format!("/user-roles/{}/{}", u, role_id)).await.status,
            StatusCode::NO_CONTENT
        );
        assert_eq!(app.delete(&format!("/roles/{}", role_id)).await.status, StatusCode::NO_CONTENT);
    }

    /// Expects [`catalogs::set_null`].
    pub async fn set_null_clears_the_reference(app: &TestApp) {
        let u = app.user("sharer@example.com").await;
        let original = app
            .post("/posts", json!({ "author_id": u, "author_type": "USER", "text_content": "orig" }))
            .await;
        let original_id = original.data()["post_id"].as_i64().unwrap();
        let share = app
            .post(
                "/posts",
                json!({ "author_id": u, "author_type": "USER", "post_type": "SHARE", "parent_post_id": original_id }),
            )
            .await;
        let share_id = share.data()["post_id"].as_i64().unwrap();

        assert_eq!(app.delete(&format!("/posts/{}", original_id)).await.status, StatusCode::NO_CONTENT);
        let after = app.get(&format!("/posts/{}", share_id)).await;
        assert_eq!(after.status, StatusCode::OK);
        assert!(after.data()["parent_post_id"].is_null());
        assert_eq!(after.data()["post_type"], "SHARE");
    }

    /// Expects [`catalogs::verified`].
    pub async fn verified_polymorphic_targets_must_exist(app: &TestApp) {
        let u = app.user("verify@example.com").await;

        let dangling = app
            .post(
                "/reactions",
                json!({ "reactor_user_id": u, "reactable_id": 12, "reactable_type": "POST", "reaction_type": "LIKE" }),
            )
            .await;
        assert_eq!(dangling.status, StatusCode::UNPROCESSABLE_ENTITY);

        let post = app
            .post("/posts", json!({ "author_id": u, "author_type": "USER" }))
            .await;
        assert_eq!(post.status, StatusCode::CREATED, "{}", post.body);
        let post_id = post.data()["post_id"].as_i64().unwrap();

        let ok = app
            .post(
                "/reactions",
                json!({ "reactor_user_id": u, "reactable_id": post_id, "reactable_type": "POST", "reaction_type": "LIKE" }),
            )
            .await;
        assert_eq!(ok.status, StatusCode::CREATED, "{}", ok.body);

        let page_author = app
            .post("/posts", json!({ "author_id": u, "author_type": "PAGE" }))
            .await;
        assert_eq!(page_author.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(app.get("/posts").await.body["meta"]["count"], 1);

        // Unchanged references are not re-checked.
        app.delete(&format!("/users/{}", u)).await;
        let edit = app
            .patch(&format!("/posts/{}", post_id), json!({ "text_content": "still here" }))
            .await;
        assert_eq!(edit.status, StatusCode::OK, "{}", edit.body);
    }

    /// Expects [`catalogs::read_only_roles`].
    pub async fn disabled_operations_answer_method_not_allowed(app: &TestApp) {
        let r = app.post("/roles", json!({ "role_name": "ghost" })).await;
        assert_eq!(r.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(r.body["error"]["code"], "method_not_allowed");
        assert_eq!(app.get("/roles").await.status, StatusCode::OK);
        assert_eq!(app.delete("/roles/1").await.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    pub async fn meta_describes_every_entity(app: &TestApp) {
        let all = app.get("/_meta/entities").await;
        assert_eq!(all.status, StatusCode::OK);
        assert_eq!(all.body["meta"]["count"], 25);

        let friendships = app.get("/_meta/entities/friendships").await;
        assert_eq!(friendships.status, StatusCode::OK);
        assert_eq!(friendships.data()["key_columns"], json!(["user_one_id", "user_two_id"]));
        assert_eq!(friendships.data()["update"], json!(["status", "action_user_id"]));

        let reactions = app.get("/_meta/entities/reactions").await;
        assert_eq!(reactions.data()["polymorphic"][0]["id_column"], "reactable_id");

        assert_eq!(app.get("/_meta/entities/widgets").await.status, StatusCode::NOT_FOUND);
        assert_eq!(app.get("/no/such/route/at/all").await.status, StatusCode::NOT_FOUND);
    }
}
