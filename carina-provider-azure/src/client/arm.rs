//! Resource Manager REST implementation of `ManagementApi`

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use carina_core::provider::{ProviderError, ProviderResult};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::models::{
    DatabaseAccount, DatabaseAccountUpdate, ErrorResponse, FailoverPolicies, FailoverPolicy,
    OperationStatus, Page, ResourceGroup, ResourceGroupUpdate,
};
use super::{COSMOSDB_API_VERSION, ManagementApi, RESOURCES_API_VERSION};
use crate::config::AzureConfig;

const ASYNC_OPERATION_HEADER: &str = "Azure-AsyncOperation";
const MAX_POLL_ATTEMPTS: usize = 120;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Azure Resource Manager client
pub struct ArmClient {
    client: reqwest::Client,
    endpoint: String,
    subscription_id: String,
    access_token: String,
    poll_interval: Duration,
}

impl ArmClient {
    pub fn new(config: &AzureConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            subscription_id: config.subscription_id.clone(),
            access_token: config.access_token.clone(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    // =========================================================================
    // URL building
    // =========================================================================

    fn subscription_path(&self) -> String {
        format!("/subscriptions/{}", self.subscription_id)
    }

    fn group_path(&self, resource_group: &str) -> String {
        format!("{}/resourceGroups/{}", self.subscription_path(), resource_group)
    }

    fn account_path(&self, resource_group: &str, name: &str) -> String {
        format!(
            "{}/providers/Microsoft.DocumentDB/databaseAccounts/{}",
            self.group_path(resource_group),
            name
        )
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, api_version)
    }

    // =========================================================================
    // Request helpers
    // =========================================================================

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    /// Send a request; non-success statuses become errors
    async fn send(&self, builder: RequestBuilder) -> ProviderResult<Response> {
        let response = builder.send().await.map_err(|e| {
            ProviderError::new(format!("Request to Resource Manager failed: {}", e)).with_cause(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ProviderResult<T> {
        response.json::<T>().await.map_err(|e| {
            ProviderError::new(format!("Failed to decode response: {}", e)).with_cause(e)
        })
    }

    async fn get_optional<T: DeserializeOwned>(&self, url: &str) -> ProviderResult<Option<T>> {
        log::debug!("GET {}", url);
        match self.send(self.request(Method::GET, url)).await {
            Ok(response) => Self::decode(response).await.map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> ProviderResult<T> {
        log::debug!("GET {}", url);
        let response = self.send(self.request(Method::GET, url)).await?;
        Self::decode(response).await
    }

    /// Collect every page of a list response
    async fn list<T: DeserializeOwned>(&self, url: &str) -> ProviderResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());
        while let Some(url) = next {
            let page: Page<T> = self.get(&url).await?;
            items.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }
        Ok(items)
    }

    /// Send a mutation and wait until the service reports a terminal state
    async fn mutate<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> ProviderResult<()> {
        log::debug!("{} {}", method, url);
        let mut builder = self.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = self.send(builder).await?;

        let async_operation = header(&response, ASYNC_OPERATION_HEADER);
        let location = header(&response, reqwest::header::LOCATION.as_str());
        match (response.status(), async_operation, location) {
            (_, Some(operation_url), _) => self.wait_for_operation(&operation_url).await,
            (StatusCode::ACCEPTED, None, Some(location_url)) => {
                self.wait_for_location(&location_url).await
            }
            _ => Ok(()),
        }
    }

    /// Poll an `Azure-AsyncOperation` status URL
    async fn wait_for_operation(&self, operation_url: &str) -> ProviderResult<()> {
        for _ in 0..MAX_POLL_ATTEMPTS {
            let status: OperationStatus = self.get(operation_url).await?;
            match status.status.as_str() {
                "Succeeded" => return Ok(()),
                "Failed" => {
                    let msg = status
                        .error
                        .map(|e| format!("{}: {}", e.code, e.message))
                        .unwrap_or_else(|| "Unknown error".to_string());
                    return Err(ProviderError::new(format!("Operation failed: {}", msg)));
                }
                "Canceled" => return Err(ProviderError::new("Operation was cancelled")),
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }

        Err(ProviderError::new("Operation timed out"))
    }

    /// Poll a `Location` URL until it stops answering 202
    async fn wait_for_location(&self, location_url: &str) -> ProviderResult<()> {
        for _ in 0..MAX_POLL_ATTEMPTS {
            log::debug!("GET {}", location_url);
            let response = self
                .send(self.request(Method::GET, location_url))
                .await?;
            if response.status() != StatusCode::ACCEPTED {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(ProviderError::new("Operation timed out"))
    }
}

fn header(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Map an error status and its body onto a `ProviderError`
fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let detail = serde_json::from_str::<ErrorResponse>(body)
        .map(|r| format!("{}: {}", r.error.code, r.error.message))
        .unwrap_or_else(|_| body.trim().to_string());

    let message = if detail.is_empty() {
        format!("Resource Manager returned {}", status)
    } else {
        format!("Resource Manager returned {}: {}", status, detail)
    };

    if status == StatusCode::NOT_FOUND {
        ProviderError::not_found(message)
    } else {
        ProviderError::new(message)
    }
}

#[async_trait]
impl ManagementApi for ArmClient {
    async fn get_database_account(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Option<DatabaseAccount>> {
        let url = self.url(&self.account_path(resource_group, name), COSMOSDB_API_VERSION);
        self.get_optional(&url).await
    }

    async fn list_database_accounts(&self) -> ProviderResult<Vec<DatabaseAccount>> {
        let path = format!(
            "{}/providers/Microsoft.DocumentDB/databaseAccounts",
            self.subscription_path()
        );
        self.list(&self.url(&path, COSMOSDB_API_VERSION)).await
    }

    async fn list_database_accounts_by_resource_group(
        &self,
        resource_group: &str,
    ) -> ProviderResult<Vec<DatabaseAccount>> {
        let path = format!(
            "{}/providers/Microsoft.DocumentDB/databaseAccounts",
            self.group_path(resource_group)
        );
        match self.list(&self.url(&path, COSMOSDB_API_VERSION)).await {
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            other => other,
        }
    }

    async fn create_or_update_database_account(
        &self,
        resource_group: &str,
        name: &str,
        account: &DatabaseAccount,
    ) -> ProviderResult<DatabaseAccount> {
        let url = self.url(&self.account_path(resource_group, name), COSMOSDB_API_VERSION);
        self.mutate(Method::PUT, &url, Some(account)).await?;
        self.get(&url).await
    }

    async fn update_database_account(
        &self,
        resource_group: &str,
        name: &str,
        update: &DatabaseAccountUpdate,
    ) -> ProviderResult<DatabaseAccount> {
        let url = self.url(&self.account_path(resource_group, name), COSMOSDB_API_VERSION);
        self.mutate(Method::PATCH, &url, Some(update)).await?;
        self.get(&url).await
    }

    async fn failover_priority_change(
        &self,
        resource_group: &str,
        name: &str,
        policies: &[FailoverPolicy],
    ) -> ProviderResult<()> {
        let path = format!(
            "{}/failoverPriorityChange",
            self.account_path(resource_group, name)
        );
        let body = FailoverPolicies {
            failover_policies: policies.to_vec(),
        };
        self.mutate(Method::POST, &self.url(&path, COSMOSDB_API_VERSION), Some(&body))
            .await
    }

    async fn delete_database_account(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<()> {
        let url = self.url(&self.account_path(resource_group, name), COSMOSDB_API_VERSION);
        self.mutate::<()>(Method::DELETE, &url, None).await
    }

    async fn get_resource_group(&self, name: &str) -> ProviderResult<Option<ResourceGroup>> {
        let url = self.url(&self.group_path(name), RESOURCES_API_VERSION);
        self.get_optional(&url).await
    }

    async fn list_resource_groups(&self) -> ProviderResult<Vec<ResourceGroup>> {
        let path = format!("{}/resourcegroups", self.subscription_path());
        self.list(&self.url(&path, RESOURCES_API_VERSION)).await
    }

    async fn create_or_update_resource_group(
        &self,
        name: &str,
        group: &ResourceGroup,
    ) -> ProviderResult<ResourceGroup> {
        let url = self.url(&self.group_path(name), RESOURCES_API_VERSION);
        self.mutate(Method::PUT, &url, Some(group)).await?;
        self.get(&url).await
    }

    async fn update_resource_group_tags(
        &self,
        name: &str,
        tags: &HashMap<String, String>,
    ) -> ProviderResult<ResourceGroup> {
        let url = self.url(&self.group_path(name), RESOURCES_API_VERSION);
        let body = ResourceGroupUpdate { tags: tags.clone() };
        self.mutate(Method::PATCH, &url, Some(&body)).await?;
        self.get(&url).await
    }

    async fn delete_resource_group(&self, name: &str) -> ProviderResult<()> {
        let url = self.url(&self.group_path(name), RESOURCES_API_VERSION);
        self.mutate::<()>(Method::DELETE, &url, None).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    fn config(endpoint: &str) -> AzureConfig {
        AzureConfig {
            subscription_id: "0000".to_string(),
            region: "eastus".to_string(),
            access_token: "token".to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    fn client() -> ArmClient {
        ArmClient::new(&config("https://management.azure.com"))
    }

    /// Canned HTTP response
    struct Reply {
        status: u16,
        headers: Vec<(&'static str, String)>,
        body: String,
    }

    fn reply(status: u16, body: impl Into<String>) -> Reply {
        Reply {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    impl Reply {
        fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
            self.headers.push((name, value.into()));
            self
        }
    }

    /// Local Resource Manager stand-in answering one request per connection
    struct StubServer {
        listener: TcpListener,
        base: String,
    }

    impl StubServer {
        async fn bind() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            Self { listener, base }
        }

        /// Serve `replies` in order; returns the request heads as received
        fn serve(self, replies: Vec<Reply>) -> Arc<Mutex<Vec<String>>> {
            let requests = Arc::new(Mutex::new(Vec::new()));
            let log = requests.clone();
            tokio::spawn(async move {
                for reply in replies {
                    let (mut stream, _) = self.listener.accept().await.unwrap();
                    let head = read_request(&mut stream).await;
                    log.lock().unwrap().push(head);
                    write_reply(&mut stream, reply).await;
                }
            });
            requests
        }
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let head_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            if n == 0 {
                break buf.len();
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < head_end + content_length {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        head
    }

    async fn write_reply(stream: &mut TcpStream, reply: Reply) {
        let reason = match reply.status {
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            404 => "Not Found",
            _ => "Error",
        };
        let mut response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
            reply.status,
            reason,
            reply.body.len()
        );
        for (name, value) in &reply.headers {
            response.push_str(&format!("{}: {}\r\n", name, value));
        }
        response.push_str("\r\n");
        response.push_str(&reply.body);
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
    }

    /// `METHOD path` of each request
    fn request_lines(requests: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        requests
            .lock()
            .unwrap()
            .iter()
            .map(|head| {
                let line = head.lines().next().unwrap_or_default();
                line.trim_end_matches(" HTTP/1.1").to_string()
            })
            .collect()
    }

    fn stub_client(server: &StubServer) -> ArmClient {
        ArmClient::new(&config(&server.base)).with_poll_interval(Duration::from_millis(1))
    }

    #[test]
    fn account_url() {
        let c = client();
        assert_eq!(
            c.url(&c.account_path("rg-data", "orders"), COSMOSDB_API_VERSION),
            "https://management.azure.com/subscriptions/0000/resourceGroups/rg-data/providers/Microsoft.DocumentDB/databaseAccounts/orders?api-version=2021-04-15"
        );
    }

    #[test]
    fn group_url() {
        let c = client();
        assert_eq!(
            c.url(&c.group_path("rg-data"), RESOURCES_API_VERSION),
            "https://management.azure.com/subscriptions/0000/resourceGroups/rg-data?api-version=2021-04-01"
        );
    }

    #[tokio::test]
    async fn list_follows_next_link() {
        let server = StubServer::bind().await;
        let client = stub_client(&server);
        let next = format!("{}/subscriptions/0000/resourcegroups?api-version=2021-04-01&page=2", server.base);
        let requests = server.serve(vec![
            reply(
                200,
                format!(r#"{{"value":[{{"name":"a","location":"eastus"}}],"nextLink":"{}"}}"#, next),
            ),
            reply(200, r#"{"value":[{"name":"b","location":"westus"}]}"#),
        ]);

        let groups = client.list_resource_groups().await.unwrap();
        let names: Vec<_> = groups.iter().filter_map(|g| g.name.as_deref()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(
            request_lines(&requests),
            vec![
                "GET /subscriptions/0000/resourcegroups?api-version=2021-04-01",
                "GET /subscriptions/0000/resourcegroups?api-version=2021-04-01&page=2",
            ]
        );
    }

    #[tokio::test]
    async fn requests_carry_the_bearer_token() {
        let server = StubServer::bind().await;
        let client = stub_client(&server);
        let requests = server.serve(vec![reply(200, r#"{"value":[]}"#)]);

        assert!(client.list_database_accounts().await.unwrap().is_empty());
        let head = requests.lock().unwrap()[0].to_ascii_lowercase();
        assert!(head.contains("authorization: bearer token"));
    }

    #[tokio::test]
    async fn missing_object_reads_as_none() {
        let server = StubServer::bind().await;
        let client = stub_client(&server);
        let requests = server.serve(vec![reply(
            404,
            r#"{"error":{"code":"ResourceGroupNotFound","message":"missing"}}"#,
        )]);

        assert!(client.get_resource_group("missing").await.unwrap().is_none());
        assert_eq!(
            request_lines(&requests),
            vec!["GET /subscriptions/0000/resourceGroups/missing?api-version=2021-04-01"]
        );
    }

    #[tokio::test]
    async fn delete_waits_for_async_operation() {
        let server = StubServer::bind().await;
        let client = stub_client(&server);
        let operation = format!("{}/operations/1", server.base);
        let requests = server.serve(vec![
            reply(202, "").header("Azure-AsyncOperation", operation),
            reply(200, r#"{"status":"InProgress"}"#),
            reply(200, r#"{"status":"InProgress"}"#),
            reply(200, r#"{"status":"Succeeded"}"#),
        ]);

        client.delete_resource_group("rg-data").await.unwrap();
        assert_eq!(
            request_lines(&requests),
            vec![
                "DELETE /subscriptions/0000/resourceGroups/rg-data?api-version=2021-04-01",
                "GET /operations/1",
                "GET /operations/1",
                "GET /operations/1",
            ]
        );
    }

    #[tokio::test]
    async fn failed_async_operation_is_a_fault() {
        let server = StubServer::bind().await;
        let client = stub_client(&server);
        let operation = format!("{}/operations/2", server.base);
        server.serve(vec![
            reply(202, "").header("Azure-AsyncOperation", operation),
            reply(200, r#"{"status":"InProgress"}"#),
            reply(
                200,
                r#"{"status":"Failed","error":{"code":"Conflict","message":"account is busy"}}"#,
            ),
        ]);

        let err = client
            .delete_database_account("rg-data", "orders")
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
        assert!(err.message.contains("Conflict: account is busy"));
    }

    #[tokio::test]
    async fn accepted_with_location_polls_until_done() {
        let server = StubServer::bind().await;
        let client = stub_client(&server);
        let location = format!("{}/locations/1", server.base);
        let requests = server.serve(vec![
            reply(202, "").header("Location", location),
            reply(202, ""),
            reply(200, ""),
        ]);

        client
            .delete_database_account("rg-data", "orders")
            .await
            .unwrap();
        assert_eq!(
            request_lines(&requests),
            vec![
                "DELETE /subscriptions/0000/resourceGroups/rg-data/providers/Microsoft.DocumentDB/databaseAccounts/orders?api-version=2021-04-15",
                "GET /locations/1",
                "GET /locations/1",
            ]
        );
    }

    #[tokio::test]
    async fn put_then_reads_back_the_object() {
        let server = StubServer::bind().await;
        let client = stub_client(&server);
        let body = r#"{"id":"/subscriptions/0000/resourceGroups/rg-data","name":"rg-data","location":"eastus","properties":{"provisioningState":"Succeeded"}}"#;
        let requests = server.serve(vec![reply(201, body), reply(200, body)]);

        let group = ResourceGroup {
            location: "eastus".to_string(),
            ..Default::default()
        };
        let created = client
            .create_or_update_resource_group("rg-data", &group)
            .await
            .unwrap();
        assert_eq!(
            created.id.as_deref(),
            Some("/subscriptions/0000/resourceGroups/rg-data")
        );
        assert_eq!(
            request_lines(&requests),
            vec![
                "PUT /subscriptions/0000/resourceGroups/rg-data?api-version=2021-04-01",
                "GET /subscriptions/0000/resourceGroups/rg-data?api-version=2021-04-01",
            ]
        );
    }

    #[test]
    fn not_found_status_maps_to_not_found() {
        let body = r#"{"error":{"code":"ResourceNotFound","message":"gone"}}"#;
        let err = status_error(StatusCode::NOT_FOUND, body);
        assert!(err.is_not_found());
        assert!(err.message.contains("ResourceNotFound: gone"));
    }

    #[test]
    fn other_status_is_a_fault() {
        let body = r#"{"error":{"code":"Conflict","message":"busy"}}"#;
        let err = status_error(StatusCode::CONFLICT, body);
        assert!(!err.is_not_found());
        assert!(err.configuration_error().is_none());
        assert!(err.message.contains("Conflict: busy"));
    }

    #[test]
    fn unparsable_body_is_kept_verbatim() {
        let err = status_error(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert!(err.message.ends_with("upstream down"));

        let err = status_error(StatusCode::UNAUTHORIZED, "");
        assert_eq!(err.message, "Resource Manager returned 401 Unauthorized");
    }
}
