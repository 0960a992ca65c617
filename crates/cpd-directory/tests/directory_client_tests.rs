//! Directory API client tests
//!
//! Tests for:
//! - Customer lookup and update
//! - Paginated user and group listings
//! - Primary email PATCH bodies and alias inserts
//! - HTTP status mapping
//! - Retry and token refresh behaviour
//! - Installed-app token exchange and refresh

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cpd_common::PrincipalKind;
use cpd_directory::{
    Client, ClientConfig, ClientSecret, CustomerPatch, DirectoryClient, Error, GoogleDirectory,
    InstalledAppFlow, ListQuery, StaticToken, TokenCache, TokenManager, TokenSource,
};

fn directory(server: &MockServer) -> GoogleDirectory {
    let config = ClientConfig::new(server.uri()).with_retry(3, Duration::from_millis(1));
    let client = Client::new(config, Arc::new(StaticToken::new("test-token"))).unwrap();
    GoogleDirectory::new(client)
}

/// Token source that hands out a new token after every invalidation
struct RotatingToken {
    generation: AtomicUsize,
}

#[async_trait]
impl TokenSource for RotatingToken {
    async fn access_token(&self) -> cpd_directory::Result<String> {
        Ok(format!("token-{}", self.generation.load(Ordering::SeqCst)))
    }

    async fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_get_customer() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/customers/my_customer"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "admin#directory#customer",
            "id": "C01abc",
            "customerDomain": "old.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let customer = directory(&server).get_customer("my_customer").await.unwrap();

    assert_eq!(customer.id, "C01abc");
    assert_eq!(customer.primary_domain, "old.com");
}

#[tokio::test]
async fn test_update_customer_sends_domain_patch() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/customers/C01abc"))
        .and(body_json(json!({"customerDomain": "new.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "C01abc",
            "customerDomain": "new.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let customer = directory(&server)
        .update_customer("C01abc", &CustomerPatch::primary_domain("new.com"))
        .await
        .unwrap();

    assert_eq!(customer.primary_domain, "new.com");
}

#[tokio::test]
async fn test_user_listing_follows_page_tokens() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("customer", "my_customer"))
        .and(query_param("maxResults", "2"))
        .and(query_param("orderBy", "email"))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [
                {"id": "3", "primaryEmail": "carol@new.com", "name": {"fullName": "Carol"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("customer", "my_customer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [
                {"id": "1", "primaryEmail": "alice@old.com", "name": {"fullName": "Alice"},
                 "aliases": ["alice@old.com"]},
                {"id": "2", "primaryEmail": "bob@old.com", "name": {"fullName": "Bob"},
                 "aliases": ["robert@old.com"]}
            ],
            "nextPageToken": "p2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let directory = directory(&server);
    let dyn_dir: &dyn DirectoryClient = &directory;
    let users = dyn_dir
        .list_all(PrincipalKind::User, &ListQuery::new("my_customer", 2))
        .await
        .unwrap();

    let emails: Vec<_> = users.iter().map(|u| u.primary_email.as_str()).collect();
    assert_eq!(emails, vec!["alice@old.com", "bob@old.com", "carol@new.com"]);
    assert_eq!(users[1].aliases, vec!["robert@old.com"]);
    assert_eq!(users[2].display_name, "Carol");
}

#[tokio::test]
async fn test_group_listing_uses_customer_id() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/groups"))
        .and(query_param("customer", "C01abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "groups": [
                {"id": "g1", "email": "team@old.com", "name": "Team",
                 "aliases": ["team-alias@old.com", "team-alias@new.com"]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = directory(&server)
        .list_groups(&ListQuery::new("C01abc", 50), None)
        .await
        .unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].kind, PrincipalKind::Group);
    assert_eq!(page.items[0].aliases.len(), 2);
    assert!(page.next_page_token.is_none());
}

#[tokio::test]
async fn test_update_user_email_patch_body() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/users/1"))
        .and(body_json(json!({"primaryEmail": "bob@new.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "1",
            "primaryEmail": "bob@new.com",
            "aliases": ["bob@old.com"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = directory(&server).update_user_email("1", "bob@new.com").await.unwrap();
    assert_eq!(user.primary_email, "bob@new.com");
}

#[tokio::test]
async fn test_update_group_email_patch_body() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/groups/g1"))
        .and(body_json(json!({"email": "team@new.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "g1",
            "email": "team@new.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let group = directory(&server).update_group_email("g1", "team@new.com").await.unwrap();
    assert_eq!(group.primary_email, "team@new.com");
}

#[tokio::test]
async fn test_insert_aliases() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/1/aliases"))
        .and(body_json(json!({"alias": "robert@new.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "admin#directory#alias",
            "alias": "robert@new.com",
            "primaryEmail": "bob@new.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/groups/g1/aliases"))
        .and(body_json(json!({"alias": "team-alias@new.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "alias": "team-alias@new.com",
            "primaryEmail": "team@new.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let directory = directory(&server);
    let confirmation = directory.insert_user_alias("1", "robert@new.com").await.unwrap();
    assert_eq!(confirmation.primary_email, "bob@new.com");

    let confirmation = directory.insert_group_alias("g1", "team-alias@new.com").await.unwrap();
    assert_eq!(confirmation.alias, "team-alias@new.com");
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/customers/my_customer"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "Resource Not Found: customerKey"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = directory(&server).get_customer("my_customer").await.unwrap_err();

    assert!(err.is_not_found());
    assert!(err.to_string().contains("customerKey"));
}

#[tokio::test]
async fn test_conflict_on_existing_alias() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/1/aliases"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {"code": 409, "message": "Entity already exists."}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = directory(&server).insert_user_alias("1", "x@new.com").await.unwrap_err();
    assert!(matches!(err, Error::Conflict(ref m) if m == "Entity already exists."));
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/customers/my_customer"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/customers/my_customer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "C01abc",
            "customerDomain": "old.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let customer = directory(&server).get_customer("my_customer").await.unwrap();
    assert_eq!(customer.id, "C01abc");
}

#[tokio::test]
async fn test_retries_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/customers/my_customer"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = directory(&server).get_customer("my_customer").await.unwrap_err();
    assert!(matches!(err, Error::Server(_)));
}

#[tokio::test]
async fn test_unauthorized_refreshes_token_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/customers/my_customer"))
        .and(header("Authorization", "Bearer token-0"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/customers/my_customer"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "C01abc",
            "customerDomain": "old.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = Arc::new(RotatingToken {
        generation: AtomicUsize::new(0),
    });
    let client = Client::new(ClientConfig::new(server.uri()), tokens).unwrap();
    let customer = GoogleDirectory::new(client).get_customer("my_customer").await.unwrap();

    assert_eq!(customer.primary_domain, "old.com");
}

fn client_secret(server: &MockServer) -> ClientSecret {
    ClientSecret::from_json(
        &json!({
            "installed": {
                "client_id": "cid",
                "client_secret": "csecret",
                "auth_uri": format!("{}/auth", server.uri()),
                "token_uri": format!("{}/token", server.uri()),
                "redirect_uris": ["urn:ietf:wg:oauth:2.0:oob"]
            }
        })
        .to_string(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_authorization_code_exchange_saves_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=4%2Fpasted"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.first",
            "token_type": "Bearer",
            "expires_in": 3599,
            "refresh_token": "1//refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = TokenCache::for_domain(dir.path(), "changeprimarydomain", "new.com");
    let flow = InstalledAppFlow::new(client_secret(&server), reqwest::Client::new());
    let manager = TokenManager::new(flow, cache.clone());

    assert!(manager.needs_authorization().await);
    manager.authorize_with_code("4/pasted\n").await.unwrap();

    assert!(!manager.needs_authorization().await);
    assert_eq!(manager.access_token().await.unwrap(), "ya29.first");
    let saved = cache.load().unwrap().unwrap();
    assert_eq!(saved.refresh_token.as_deref(), Some("1//refresh"));
}

#[tokio::test]
async fn test_expired_cached_token_is_refreshed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.renewed",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = TokenCache::for_domain(dir.path(), "changeprimarydomain", "new.com");
    cache
        .save(&cpd_directory::Token {
            access_token: "ya29.stale".into(),
            token_type: "Bearer".into(),
            refresh_token: Some("1//refresh".into()),
            expiry: Some(chrono::Utc::now() - chrono::Duration::minutes(5)),
        })
        .unwrap();

    let flow = InstalledAppFlow::new(client_secret(&server), reqwest::Client::new());
    let manager = TokenManager::new(flow, cache.clone());

    assert_eq!(manager.access_token().await.unwrap(), "ya29.renewed");
    // A second call is served from memory
    assert_eq!(manager.access_token().await.unwrap(), "ya29.renewed");

    let saved = cache.load().unwrap().unwrap();
    assert_eq!(saved.access_token, "ya29.renewed");
    assert_eq!(saved.refresh_token.as_deref(), Some("1//refresh"));
}
