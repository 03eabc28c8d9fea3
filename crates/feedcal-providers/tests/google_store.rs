#![cfg(feature = "google")]

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use feedcal_core::SyncHorizon;
use feedcal_providers::google::{GoogleConfig, GoogleStore, OAuthCredentials, TokenInfo, TokenStorage};
use feedcal_providers::{CalendarStore, NewRemoteEvent, ProviderErrorCode};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NY: Tz = chrono_tz::America::New_York;
const SCOPE: &str = "https://www.googleapis.com/auth/calendar";

fn horizon() -> SyncHorizon {
    SyncHorizon::new(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(), 14, NY)
}

fn new_event(id: &str) -> NewRemoteEvent {
    NewRemoteEvent {
        external_id: id.to_string(),
        title: "Groove Slayers".to_string(),
        location: "Lake Sumter Landing".to_string(),
        description: "Tags: Classic Rock\nCategory: Entertainment".to_string(),
        start: NY.with_ymd_and_hms(2025, 7, 1, 5, 0, 0).unwrap(),
        end: NY.with_ymd_and_hms(2025, 7, 1, 21, 0, 0).unwrap(),
    }
}

fn event_json(id: &str, start: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "summary": "Groove Slayers",
        "status": status,
        "start": {"dateTime": start, "timeZone": "America/New_York"},
        "end": {"dateTime": start, "timeZone": "America/New_York"},
        "extendedProperties": {"private": {"feedcalId": id}}
    })
}

/// Builds a store against the mock server with the given stored token.
fn store_with_token(server: &MockServer, dir: &TempDir, token: TokenInfo) -> GoogleStore {
    let token_path = dir.path().join("tokens.json");
    TokenStorage::new(&token_path).set(token).unwrap();

    let config = GoogleConfig::new(OAuthCredentials::new(
        "test-client.apps.googleusercontent.com",
        "test-secret",
    ))
    .with_token_path(token_path)
    .with_api_base(server.uri())
    .with_token_url(format!("{}/token", server.uri()));

    GoogleStore::new(config).unwrap()
}

fn valid_token() -> TokenInfo {
    TokenInfo::new("valid-token", Some("refresh".into()), Some(3600), vec![SCOPE.into()])
}

#[tokio::test]
async fn finds_calendar_across_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/users/me/calendarList"))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "ent@group", "summary": "all entertainment", "timeZone": "America/New_York"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/me/calendarList"))
        .and(header("authorization", "Bearer valid-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "primary@x", "summary": "me"}],
            "nextPageToken": "p2"
        })))
        .mount(&server)
        .await;

    let store = store_with_token(&server, &dir, valid_token());
    let found = store.find_calendar("all entertainment").await.unwrap().unwrap();
    assert_eq!(found.id, "ent@group");
    assert_eq!(found.timezone.as_deref(), Some("America/New_York"));

    assert!(store.find_calendar("dances").await.unwrap().is_none());
}

#[tokio::test]
async fn creates_missing_calendar_with_timezone() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/users/me/calendarList"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calendars"))
        .and(body_partial_json(json!({"summary": "dances", "timeZone": "America/New_York"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "new@group", "summary": "dances", "timeZone": "America/New_York"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with_token(&server, &dir, valid_token());
    let calendar = store.find_or_create_calendar("dances", NY).await.unwrap();
    assert_eq!(calendar.id, "new@group");
}

#[tokio::test]
async fn lists_only_live_events_starting_in_window() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/calendars/cal1/events"))
        .and(query_param("singleEvents", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                event_json("111111", "2025-07-01T05:00:00-04:00", "confirmed"),
                event_json("222222", "2025-07-02T05:00:00-04:00", "cancelled"),
                // started before the window, still overlapping it
                event_json("333333", "2025-06-30T23:00:00-04:00", "confirmed"),
                {"id": "legacy", "status": "confirmed", "start": {"date": "2025-07-03"}, "end": {"date": "2025-07-04"}}
            ]
        })))
        .mount(&server)
        .await;

    let store = store_with_token(&server, &dir, valid_token());
    let events = store.list_events("cal1", &horizon()).await.unwrap();

    let ids: Vec<_> = events.iter().map(|e| e.external_id.as_str()).collect();
    assert_eq!(ids, vec!["111111", "legacy"]);
    assert_eq!(events[0].start, Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap());
}

#[tokio::test]
async fn creates_event_with_source_id() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/calendars/cal1/events"))
        .and(body_partial_json(json!({
            "id": "123456",
            "summary": "Groove Slayers",
            "start": {"dateTime": "2025-07-01T05:00:00-04:00", "timeZone": "America/New_York"},
            "extendedProperties": {"private": {"feedcalId": "123456"}}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(event_json("123456", "2025-07-01T05:00:00-04:00", "confirmed")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with_token(&server, &dir, valid_token());
    let created = store.create_event("cal1", &new_event("123456")).await.unwrap();
    assert_eq!(created.remote_id, "123456");
    assert_eq!(created.external_id, "123456");
}

#[tokio::test]
async fn conflict_on_cancelled_event_restores_it() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/calendars/cal1/events"))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/calendars/cal1/events/123456"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(event_json("123456", "2025-07-01T05:00:00-04:00", "cancelled")),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/calendars/cal1/events/123456"))
        .and(body_partial_json(json!({"status": "confirmed"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(event_json("123456", "2025-07-01T05:00:00-04:00", "confirmed")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with_token(&server, &dir, valid_token());
    let restored = store.create_event("cal1", &new_event("123456")).await.unwrap();
    assert_eq!(restored.remote_id, "123456");
}

#[tokio::test]
async fn conflict_on_live_event_returns_it() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/calendars/cal1/events"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/calendars/cal1/events/123456"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(event_json("123456", "2025-07-01T05:00:00-04:00", "confirmed")),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let store = store_with_token(&server, &dir, valid_token());
    let existing = store.create_event("cal1", &new_event("123456")).await.unwrap();
    assert_eq!(existing.external_id, "123456");
}

#[tokio::test]
async fn deleting_a_gone_event_succeeds() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("DELETE"))
        .and(path("/calendars/cal1/events/gone1"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/calendars/cal1/events/live1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with_token(&server, &dir, valid_token());
    store.delete_event("cal1", "gone1").await.unwrap();
    store.delete_event("cal1", "live1").await.unwrap();
}

#[tokio::test]
async fn rejected_credentials_are_auth_failures() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/users/me/calendarList"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/calendars/cal1/events"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let store = store_with_token(&server, &dir, valid_token());

    let err = store.find_calendar("music").await.unwrap_err();
    assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
    assert_eq!(err.provider(), Some("google"));

    let err = store.list_events("cal1", &horizon()).await.unwrap_err();
    assert_eq!(err.code(), ProviderErrorCode::AuthorizationFailed);
    assert!(err.is_auth_failure());
}

#[tokio::test]
async fn quota_403_on_insert_is_not_an_auth_failure() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/calendars/cal1/events"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "errors": [{
                    "domain": "usageLimits",
                    "reason": "rateLimitExceeded",
                    "message": "Rate Limit Exceeded"
                }],
                "code": 403,
                "message": "Rate Limit Exceeded"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with_token(&server, &dir, valid_token());
    let err = store.create_event("cal1", &new_event("123456")).await.unwrap_err();

    assert_eq!(err.code(), ProviderErrorCode::RateLimited);
    assert!(!err.is_auth_failure());
    assert!(err.to_string().contains("rateLimitExceeded"));
}

#[tokio::test]
async fn expired_token_is_refreshed_and_persisted() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/me/calendarList"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(2)
        .mount(&server)
        .await;

    let mut token = valid_token();
    token.expires_at = Some(Utc::now() - Duration::minutes(5));
    let store = store_with_token(&server, &dir, token);

    store.find_calendar("music").await.unwrap();
    store.find_calendar("music").await.unwrap();

    let persisted = TokenStorage::new(dir.path().join("tokens.json"));
    persisted.load().unwrap();
    let tokens = persisted.get().unwrap();
    assert_eq!(tokens.access_token, "fresh-token");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh"));
}

#[tokio::test]
async fn missing_tokens_ask_for_login() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let config = GoogleConfig::new(OAuthCredentials::new(
        "test-client.apps.googleusercontent.com",
        "test-secret",
    ))
    .with_token_path(dir.path().join("tokens.json"))
    .with_api_base(server.uri());
    let store = GoogleStore::new(config).unwrap();

    let err = store.find_calendar("music").await.unwrap_err();
    assert!(err.is_auth_failure());
    assert!(err.message().contains("feedcal auth google"));
}
