//! HTTP implementation of [`ShoppingApi`].

use super::error::{ApiError, format_api_error};
use super::types::{NewItem, ShoppingListItem};
use super::ShoppingApi;
use crate::auth::Credential;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the shopping list API.
#[derive(Debug, Clone)]
pub struct HttpShoppingApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpShoppingApi {
    /// Create a new client. `base_url` must not end with a slash.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn build_headers(credential: &Credential) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let value = HeaderValue::from_str(&format!("Bearer {}", credential.token()))
            .map_err(|_| ApiError::Request("credential contains invalid header characters".into()))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        credential: &Credential,
    ) -> Result<RequestBuilder, ApiError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%method, %url, "shopping api request");
        Ok(self
            .client
            .request(method, url)
            .headers(Self::build_headers(credential)?))
    }

    async fn send_json<R: DeserializeOwned>(request: RequestBuilder) -> Result<R, ApiError> {
        let response = check_status(request.send().await?).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::Decode(format!("{e}\nBody: {text}")))
    }

    async fn send_empty(request: RequestBuilder) -> Result<(), ApiError> {
        check_status(request.send().await?).await?;
        Ok(())
    }
}

/// Map non-success responses to errors. 401 is singled out so callers can
/// drop the session.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    tracing::debug!(%status, "shopping api response");
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status,
            message: format_api_error(&text),
        });
    }
    Ok(response)
}

#[async_trait]
impl ShoppingApi for HttpShoppingApi {
    async fn list_items(&self, credential: &Credential) -> Result<Vec<ShoppingListItem>, ApiError> {
        let request = self.request(Method::GET, "/api/items", credential)?;
        Self::send_json(request).await
    }

    async fn create_item(
        &self,
        credential: &Credential,
        item: &NewItem,
    ) -> Result<ShoppingListItem, ApiError> {
        let request = self
            .request(Method::POST, "/api/item", credential)?
            .json(item);
        Self::send_json(request).await
    }

    async fn delete_item(&self, credential: &Credential, id: &str) -> Result<(), ApiError> {
        let path = item_path(id);
        let request = self.request(Method::DELETE, &path, credential)?;
        Self::send_empty(request).await
    }

    async fn delete_all_items(&self, credential: &Credential) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, "/api/items", credential)?;
        Self::send_empty(request).await
    }
}

fn item_path(id: &str) -> String {
    format!("/api/item/{}", urlencoding::encode(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_bearer_header() {
        let headers = HttpShoppingApi::build_headers(&Credential::new("abc123")).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc123");
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");
    }

    #[test]
    fn test_bearer_header_rejects_newline() {
        let result = HttpShoppingApi::build_headers(&Credential::new("abc\n123"));
        assert!(matches!(result, Err(ApiError::Request(_))));
    }

    #[test]
    fn test_item_path_encodes_id() {
        assert_eq!(item_path("42"), "/api/item/42");
        assert_eq!(item_path("a/b c"), "/api/item/a%2Fb%20c");
    }

    #[test]
    fn test_request_url() {
        let api = HttpShoppingApi::new("http://localhost:8080", Duration::from_secs(5));
        let request = api
            .request(Method::DELETE, "/api/items", &Credential::new("t"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:8080/api/items");
        assert_eq!(request.method(), Method::DELETE);
    }

    // --- Round trips against a local server ---

    /// What the server saw.
    #[derive(Debug)]
    struct Seen {
        method: String,
        url: String,
        authorization: Option<String>,
        body: String,
    }

    /// Answer exactly one request with `status` and `body`.
    fn serve_once(status: u16, body: &'static str) -> (HttpShoppingApi, std::thread::JoinHandle<Seen>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let handle = std::thread::spawn(move || {
            let mut request = server.recv().unwrap();
            let mut received = String::new();
            request.as_reader().read_to_string(&mut received).unwrap();
            let seen = Seen {
                method: request.method().to_string(),
                url: request.url().to_string(),
                authorization: request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.to_string()),
                body: received,
            };
            let response =
                tiny_http::Response::from_string(body).with_status_code(tiny_http::StatusCode(status));
            request.respond(response).unwrap();
            seen
        });
        let api = HttpShoppingApi::new(format!("http://127.0.0.1:{port}"), Duration::from_secs(5));
        (api, handle)
    }

    fn credential() -> Credential {
        Credential::new("abc123")
    }

    #[tokio::test]
    async fn test_list_items_round_trip() {
        let (api, server) = serve_once(
            200,
            r#"[{"id":1,"item_name":"Milk","created_at":"2024-03-01T12:30:00Z"},
                {"id":"b","name":"Eggs","created_at":"2024-03-01T12:31:00"}]"#,
        );

        let items = api.list_items(&credential()).await.unwrap();
        let seen = server.join().unwrap();

        assert_eq!(seen.method, "GET");
        assert_eq!(seen.url, "/api/items");
        assert_eq!(seen.authorization.as_deref(), Some("Bearer abc123"));
        let ids: Vec<_> = items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, ["1", "b"]);
        assert_eq!(items[0].name, "Milk");
    }

    #[tokio::test]
    async fn test_list_items_unauthorized() {
        let (api, server) = serve_once(401, r#"{"error":"invalid token"}"#);
        let result = api.list_items(&credential()).await;
        server.join().unwrap();
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_create_item_round_trip() {
        let (api, server) = serve_once(
            201,
            r#"{"id":"42","name":"Eggs","created_at":"2024-03-01T12:30:00Z"}"#,
        );

        let item = api
            .create_item(&credential(), &NewItem { name: "Eggs".into() })
            .await
            .unwrap();
        let seen = server.join().unwrap();

        assert_eq!(seen.method, "POST");
        assert_eq!(seen.url, "/api/item");
        assert_eq!(seen.authorization.as_deref(), Some("Bearer abc123"));
        assert_eq!(seen.body, r#"{"name":"Eggs"}"#);
        assert_eq!(item.id, "42");
        assert_eq!(item.name, "Eggs");
    }

    #[tokio::test]
    async fn test_delete_item_round_trip() {
        let (api, server) = serve_once(204, "");
        api.delete_item(&credential(), "a/b").await.unwrap();
        let seen = server.join().unwrap();

        assert_eq!(seen.method, "DELETE");
        assert_eq!(seen.url, "/api/item/a%2Fb");
        assert_eq!(seen.authorization.as_deref(), Some("Bearer abc123"));
    }

    #[tokio::test]
    async fn test_delete_all_items_server_error() {
        let (api, server) = serve_once(500, r#"{"error":{"message":"database unavailable"}}"#);
        let result = api.delete_all_items(&credential()).await;
        let seen = server.join().unwrap();

        assert_eq!(seen.method, "DELETE");
        assert_eq!(seen.url, "/api/items");
        match result {
            Err(ApiError::Status { status, message }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(message, "database unavailable");
            }
            other => panic!("Expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let (api, server) = serve_once(200, "<html>not json</html>");
        let result = api.list_items(&credential()).await;
        server.join().unwrap();
        match result {
            Err(ApiError::Decode(message)) => assert!(message.contains("<html>not json</html>")),
            other => panic!("Expected decode error, got {other:?}"),
        }
    }
}
