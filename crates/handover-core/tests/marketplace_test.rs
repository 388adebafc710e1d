#![allow(clippy::unwrap_used)]
// Integration tests for the marketplace facade against a mocked backend.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{
    bearer_token, body_json, body_partial_json, method, path, path_regex, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use handover_core::{
    AppState, BackendConfig, Category, CategoryFilter, Command, CommandResult, Condition,
    CoreError, ListingDraft, ListingId, Marketplace, NotificationKind, PhotoUpload, Role,
    SearchCriteria, SignUpOutcome, SortKey, UploadProgress,
};

// ── Helpers ─────────────────────────────────────────────────────────

struct Fixture {
    server: MockServer,
    marketplace: Marketplace,
}

async fn setup() -> Fixture {
    let server = MockServer::start().await;
    let url = Url::parse(&server.uri()).unwrap();
    let config = BackendConfig::new(url, SecretString::from("anon-key"));
    let marketplace = Marketplace::new(config, Arc::new(AppState::ephemeral()));
    marketplace.connect().await.unwrap();
    Fixture {
        server,
        marketplace,
    }
}

async fn signed_in() -> Fixture {
    let fx = setup().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "jwt-u1",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh",
            "user": { "id": "u1", "email": "donor@example.org", "user_metadata": {} }
        })))
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&fx.server)
        .await;

    fx.marketplace
        .sign_in("donor@example.org", &SecretString::from("hunter22"))
        .await
        .unwrap();
    fx
}

fn row(id: &str, owner: &str) -> Value {
    json!({
        "id": id, "user_id": owner, "title": format!("Item {id}"),
        "description": "Solid and clean", "category": "Furniture",
        "condition": "GOOD", "status": "PENDING", "location": "Leeds",
        "photos": [], "tags": [], "created_at": "2026-03-01T10:00:00Z"
    })
}

fn rows(ids: std::ops::Range<usize>) -> Value {
    Value::Array(ids.map(|i| row(&format!("a{i}"), "u1")).collect())
}

fn draft() -> ListingDraft {
    ListingDraft {
        title: "Oak chair".into(),
        description: "Sturdy".into(),
        category: Some(Category::Furniture),
        location: "Leeds".into(),
        ..ListingDraft::default()
    }
}

fn jpeg(name: &str) -> PhotoUpload {
    PhotoUpload::new(name, vec![0xFF, 0xD8, 0xFF])
}

// ── Search ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fifteen_matches_paginate_twelve_then_three() {
    let fx = setup().await;

    for (offset, body, range) in [("0", rows(0..12), "0-11/15"), ("12", rows(12..15), "12-14/15")] {
        Mock::given(method("GET"))
            .and(path("/rest/v1/announcements"))
            .and(query_param("category", "eq.Furniture"))
            .and(query_param("condition", "eq.GOOD"))
            .and(query_param("order", "title.asc"))
            .and(query_param("offset", offset))
            .and(query_param("limit", "12"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(body)
                    .insert_header("Content-Range", range),
            )
            .mount(&fx.server)
            .await;
    }

    let criteria = SearchCriteria::new()
        .with_category(CategoryFilter::Only(Category::Furniture))
        .with_condition(Some(Condition::Good))
        .with_sort(SortKey::TitleAsc);

    let first = fx.marketplace.search(&criteria).await.unwrap();
    assert_eq!(first.items.len(), 12);
    assert_eq!(first.total, 15);
    assert_eq!(first.page_count(), 2);
    assert!(first.has_next());

    let second = fx.marketplace.search(&criteria.with_page(2)).await.unwrap();
    assert_eq!(second.items.len(), 3);
    assert_eq!(second.total, 15);
    assert!(!second.has_next());
}

#[tokio::test]
async fn test_page_past_the_end_is_empty() {
    let fx = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/announcements"))
        .and(query_param("offset", "48"))
        .respond_with(ResponseTemplate::new(416).insert_header("Content-Range", "*/15"))
        .mount(&fx.server)
        .await;

    let page = fx
        .marketplace
        .search(&SearchCriteria::new().with_page(5))
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 15);
}

#[tokio::test]
async fn test_search_failure_is_retryable() {
    let fx = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/announcements"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&fx.server)
        .await;

    let err = fx.marketplace.search(&SearchCriteria::new()).await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unreadable_row_with_multibyte_title_is_retryable() {
    let fx = setup().await;

    let mut bad = row("a1", "u1");
    bad["title"] = json!("€".repeat(110));
    bad["condition"] = json!("USED");
    Mock::given(method("GET"))
        .and(path("/rest/v1/announcements"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([bad]))
                .insert_header("Content-Range", "0-0/1"),
        )
        .mount(&fx.server)
        .await;

    let err = fx.marketplace.search(&SearchCriteria::new()).await.unwrap_err();
    assert!(matches!(err, CoreError::Remote { .. }), "got: {err:?}");
    assert!(err.is_retryable());
}

// ── Registration ────────────────────────────────────────────────────

async fn mount_sign_up(fx: &Fixture, role: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(body_partial_json(json!({
            "email": "ben@example.org",
            "data": { "full_name": "Ben Ade", "role": role }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "jwt-u9",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh",
            "user": {
                "id": "u9",
                "email": "ben@example.org",
                "user_metadata": { "full_name": "Ben Ade", "role": role }
            }
        })))
        .expect(1)
        .mount(&fx.server)
        .await;
}

#[tokio::test]
async fn test_sign_up_writes_profile_with_role() {
    let fx = setup().await;
    mount_sign_up(&fx, "BENEFICIARY").await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .and(bearer_token("jwt-u9"))
        .and(body_partial_json(json!({
            "id": "u9",
            "username": "ben",
            "full_name": "Ben Ade",
            "role": "BENEFICIARY",
            "visibility": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "id": "u9" }])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let outcome = fx
        .marketplace
        .sign_up(
            "ben@example.org",
            &SecretString::from("hunter22"),
            Some("Ben Ade"),
            Role::Beneficiary,
        )
        .await
        .unwrap();

    let SignUpOutcome::SignedIn(user) = outcome else {
        panic!("expected a signed-in account, got {outcome:?}");
    };
    assert_eq!(user.role, Some(Role::Beneficiary));
    assert_eq!(fx.marketplace.current_user().unwrap().id, user.id);
}

#[tokio::test]
async fn test_sign_up_without_profile_row_is_a_partial_failure() {
    let fx = setup().await;
    mount_sign_up(&fx, "DONOR").await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": "42501",
            "message": "new row violates row-level security policy"
        })))
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(bearer_token("jwt-u9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&fx.server)
        .await;

    let err = fx
        .marketplace
        .sign_up(
            "ben@example.org",
            &SecretString::from("hunter22"),
            Some("Ben Ade"),
            Role::Donor,
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, CoreError::PartialFailure { cleaned_up: false, .. }),
        "got: {err:?}"
    );
    assert!(err.to_string().contains("ben@example.org"));
    assert!(fx.marketplace.current_user().is_none());
}

// ── Reads ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_listing_detail_composes_owner_reviews_and_related() {
    let fx = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/announcements"))
        .and(query_param("id", "eq.a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row("a1", "owner-1")])))
        .mount(&fx.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/announcements"))
        .and(query_param("id", "neq.a1"))
        .and(query_param("category", "eq.Furniture"))
        .and(query_param("limit", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "a2", "title": "Stool", "photos": null, "condition": "WORN", "status": "PENDING" }
        ])))
        .mount(&fx.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", "eq.owner-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "owner-1", "full_name": "Dana", "avatar_url": null }
        ])))
        .mount(&fx.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("reviewed_id", "eq.owner-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "r1", "rating": 5, "comment": "Lovely", "created_at": "2026-02-01T00:00:00Z",
              "profiles": { "full_name": "Sam", "avatar_url": null } },
            { "id": "r2", "rating": 4, "comment": null, "created_at": "2026-01-01T00:00:00Z",
              "profiles": null }
        ])))
        .mount(&fx.server)
        .await;

    let detail = fx
        .marketplace
        .listing_detail(&ListingId::from("a1"))
        .await
        .unwrap();

    assert_eq!(detail.owner.display_name(), "Dana");
    assert_eq!(detail.review_count, 2);
    assert!((detail.owner_rating - 4.5).abs() < f64::EPSILON);
    assert_eq!(detail.related.len(), 1);
    assert!(detail.related[0].photos.is_empty());
    // Signed out: no wishlist lookup.
    assert!(!detail.is_favorite);
}

#[tokio::test]
async fn test_missing_listing_is_not_found() {
    let fx = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/announcements"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fx.server)
        .await;

    let err = fx
        .marketplace
        .listing_detail(&ListingId::from("gone"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_dashboard_counts() {
    let fx = signed_in().await;

    let mut claimed = row("a2", "u1");
    claimed["status"] = json!("CLAIMED");
    claimed["claimed_by"] = json!("b1");
    let mut done = row("a3", "u1");
    done["status"] = json!("COMPLETED");
    done["claimed_by"] = json!("b1");

    Mock::given(method("GET"))
        .and(path("/rest/v1/announcements"))
        .and(query_param("user_id", "eq.u1"))
        .and(query_param("order", "created_at.desc"))
        .and(bearer_token("jwt-u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row("a1", "u1"), claimed, done])))
        .mount(&fx.server)
        .await;

    let dashboard = fx.marketplace.dashboard().await.unwrap();
    assert_eq!(dashboard.stats.total, 3);
    assert_eq!(dashboard.stats.active, 1);
    assert_eq!(dashboard.stats.completed, 1);
    assert_eq!(dashboard.stats.beneficiaries, 1);
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_writes_require_sign_in() {
    let fx = setup().await;

    let err = fx
        .marketplace
        .execute(Command::DeleteListing {
            id: ListingId::from("a1"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotSignedIn));
    assert!(fx.marketplace.dashboard().await.is_err());
}

#[tokio::test]
async fn test_invalid_draft_never_reaches_the_backend() {
    let fx = signed_in().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/announcements"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&fx.server)
        .await;

    let err = fx
        .marketplace
        .execute(Command::CreateListing {
            draft: ListingDraft {
                location: "  ".into(),
                ..draft()
            },
            photos: Vec::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { ref field, .. } if field == "location"));
}

#[tokio::test]
async fn test_create_uploads_then_inserts_with_progress() {
    let fx = signed_in().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/item-photos/u1/[0-9a-f-]+\.jpe?g$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "item-photos/x" })))
        .expect(2)
        .mount(&fx.server)
        .await;

    let mut created = row("new-1", "u1");
    created["title"] = json!("Oak chair");
    Mock::given(method("POST"))
        .and(path("/rest/v1/announcements"))
        .and(bearer_token("jwt-u1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([created])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress = UploadProgress::new(move |pct| sink.lock().unwrap().push(pct));

    let result = fx
        .marketplace
        .execute_with_progress(
            Command::CreateListing {
                draft: draft(),
                photos: vec![jpeg("a.jpg"), jpeg("b.JPEG")],
            },
            Some(progress),
        )
        .await
        .unwrap();

    let CommandResult::Created(listing) = result else {
        panic!("expected Created, got {result:?}");
    };
    assert_eq!(listing.title, "Oak chair");
    assert_eq!(*seen.lock().unwrap(), vec![0, 50, 100]);

    let requests = fx.server.received_requests().await.unwrap();
    let insert = requests
        .iter()
        .find(|r| r.url.path() == "/rest/v1/announcements")
        .unwrap();
    let body: Value = serde_json::from_slice(&insert.body).unwrap();
    assert_eq!(body["user_id"], "u1");
    assert_eq!(body["photos"].as_array().unwrap().len(), 2);
    assert!(
        body["photos"][0]
            .as_str()
            .unwrap()
            .contains("/storage/v1/object/public/item-photos/u1/")
    );

    let notes = fx.marketplace.state().notifications();
    assert_eq!(notes.values().last().unwrap().kind, NotificationKind::Success);
}

#[tokio::test]
async fn test_failed_insert_removes_uploaded_photos() {
    let fx = signed_in().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/item-photos/u1/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "x" })))
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/announcements"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "null value in column \"title\"", "code": "23502"
        })))
        .mount(&fx.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/storage/v1/object/item-photos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let err = fx
        .marketplace
        .execute(Command::CreateListing {
            draft: draft(),
            photos: vec![jpeg("a.jpg"), jpeg("b.png")],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::PartialFailure { cleaned_up: true, .. }));

    let requests = fx.server.received_requests().await.unwrap();
    let removal = requests
        .iter()
        .find(|r| r.method == wiremock::http::Method::DELETE)
        .unwrap();
    let body: Value = serde_json::from_slice(&removal.body).unwrap();
    let prefixes = body["prefixes"].as_array().unwrap();
    assert_eq!(prefixes.len(), 2);
    assert!(prefixes.iter().all(|p| p.as_str().unwrap().starts_with("u1/")));

    let notes = fx.marketplace.state().notifications();
    assert_eq!(notes.values().last().unwrap().kind, NotificationKind::Error);
}

#[tokio::test]
async fn test_upload_failure_midway_removes_earlier_uploads() {
    let fx = signed_in().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/item-photos/u1/.+\.jpg$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "x" })))
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/item-photos/u1/.+\.png$"))
        .respond_with(ResponseTemplate::new(413).set_body_json(json!({ "message": "Payload too large" })))
        .mount(&fx.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/storage/v1/object/item-photos"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/announcements"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&fx.server)
        .await;

    let err = fx
        .marketplace
        .execute(Command::CreateListing {
            draft: draft(),
            photos: vec![jpeg("a.jpg"), jpeg("b.png")],
        })
        .await
        .unwrap_err();

    // Removal failed too, so the leftovers are reported.
    assert!(matches!(err, CoreError::PartialFailure { cleaned_up: false, .. }));
    assert!(err.to_string().ends_with("(cleanup incomplete)"));
}

#[tokio::test]
async fn test_only_the_owner_may_edit() {
    let fx = signed_in().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/announcements"))
        .and(query_param("id", "eq.a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row("a1", "someone-else")])))
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/announcements"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fx.server)
        .await;

    let err = fx
        .marketplace
        .execute(Command::UpdateListing {
            id: ListingId::from("a1"),
            draft: draft(),
            keep_photos: Vec::new(),
            new_photos: Vec::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden { .. }));
}

#[tokio::test]
async fn test_edit_drops_removed_photos_after_saving() {
    let fx = signed_in().await;
    let base = fx.server.uri();
    let keep = format!("{base}/storage/v1/object/public/item-photos/u1/keep.jpg");
    let drop = format!("{base}/storage/v1/object/public/item-photos/u1/drop.jpg");

    let mut existing = row("a1", "u1");
    existing["photos"] = json!([keep, drop]);
    let mut saved = existing.clone();
    saved["photos"] = json!([keep]);
    saved["title"] = json!("Oak chair");

    Mock::given(method("GET"))
        .and(path("/rest/v1/announcements"))
        .and(query_param("id", "eq.a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing])))
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/announcements"))
        .and(query_param("id", "eq.a1"))
        .and(query_param("user_id", "eq.u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([saved])))
        .expect(1)
        .mount(&fx.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/storage/v1/object/item-photos"))
        .and(body_json(json!({ "prefixes": ["u1/drop.jpg"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let result = fx
        .marketplace
        .execute(Command::UpdateListing {
            id: ListingId::from("a1"),
            draft: draft(),
            keep_photos: vec![keep.clone()],
            new_photos: Vec::new(),
        })
        .await
        .unwrap();

    let CommandResult::Updated(listing) = result else {
        panic!("expected Updated, got {result:?}");
    };
    assert_eq!(listing.photos, vec![keep]);

    let requests = fx.server.received_requests().await.unwrap();
    let patch = requests
        .iter()
        .find(|r| r.method == wiremock::http::Method::PATCH)
        .unwrap();
    let body: Value = serde_json::from_slice(&patch.body).unwrap();
    assert!(body.get("updated_at").is_some());
    assert!(body.get("user_id").is_none());
}

#[tokio::test]
async fn test_delete_cascades_to_photos() {
    let fx = signed_in().await;
    let photo = format!(
        "{}/storage/v1/object/public/item-photos/u1/one.jpg",
        fx.server.uri()
    );
    let mut existing = row("a1", "u1");
    existing["photos"] = json!([photo]);

    Mock::given(method("GET"))
        .and(path("/rest/v1/announcements"))
        .and(query_param("id", "eq.a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing.clone()])))
        .mount(&fx.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/announcements"))
        .and(query_param("id", "eq.a1"))
        .and(query_param("user_id", "eq.u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing])))
        .expect(1)
        .mount(&fx.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/storage/v1/object/item-photos"))
        .and(body_json(json!({ "prefixes": ["u1/one.jpg"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let result = fx
        .marketplace
        .execute(Command::DeleteListing {
            id: ListingId::from("a1"),
        })
        .await
        .unwrap();
    assert!(matches!(result, CommandResult::Deleted { photos_removed: 1, .. }));
}

#[tokio::test]
async fn test_toggle_favorite_adds_then_removes() {
    let fx = signed_in().await;

    // Nothing to delete the first time round.
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/wishlists"))
        .and(query_param("user_id", "eq.u1"))
        .and(query_param("announcement_id", "eq.a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&fx.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/wishlists"))
        .and(body_json(json!({ "user_id": "u1", "announcement_id": "a1" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            { "user_id": "u1", "announcement_id": "a1" }
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    assert!(fx.marketplace.toggle_favorite(ListingId::from("a1")).await.unwrap());

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/wishlists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "user_id": "u1", "announcement_id": "a1" }
        ])))
        .mount(&fx.server)
        .await;

    assert!(!fx.marketplace.toggle_favorite(ListingId::from("a1")).await.unwrap());
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_signs_out_and_refuses_commands() {
    let fx = signed_in().await;
    assert!(fx.marketplace.current_user().is_some());

    fx.marketplace.disconnect().await;

    assert!(fx.marketplace.current_user().is_none());
    let err = fx
        .marketplace
        .execute(Command::DeleteListing {
            id: ListingId::from("a1"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Disconnected));
}
