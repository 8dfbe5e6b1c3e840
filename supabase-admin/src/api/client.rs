//! HTTP client for the project's data and auth APIs

use log::{debug, info};
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::collection::RecordId;
use super::error::{ApiError, RemoteError};
use super::models::{AuthUser, Session, UserPage};
use super::operations::Operation;
use super::query::{Filter, Query};
use super::resilience::{MonitoringConfig, ResilienceConfig};
use crate::config::{Config, RestOptions, SecretKey};

const REST_PATH: &str = "/rest/v1";
const AUTH_PATH: &str = "/auth/v1";

/// One connection handle to a project, bound to a single API key.
///
/// Admin commands use the service role key; login verification uses the
/// anon key. The handle is never mutated after construction.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    key: SecretKey,
    rest: RestOptions,
    monitoring: MonitoringConfig,
}

impl SupabaseClient {
    pub fn new(
        base_url: impl Into<String>,
        key: SecretKey,
        resilience: &ResilienceConfig,
        rest: RestOptions,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(resilience.request_timeout)
            .connect_timeout(resilience.connect_timeout)
            .user_agent(concat!("supabase-admin/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Supabase client created for {}", base_url);

        Ok(Self {
            http,
            base_url,
            key,
            rest,
            monitoring: resilience.monitoring.clone(),
        })
    }

    /// Build a client from resolved configuration using the given key
    pub fn from_config(config: &Config, key: &SecretKey) -> Result<Self, ApiError> {
        Self::new(
            config.project_url.clone(),
            key.clone(),
            &config.resilience,
            config.rest.clone(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn rest_options(&self) -> &RestOptions {
        &self.rest
    }

    // === Data API ===

    /// `GET /rest/v1/{table}`
    pub async fn list_records(&self, table: &str, query: &Query) -> Result<Vec<Value>, ApiError> {
        self.trace(&Operation::ListRecords {
            table: table.to_string(),
            filter: query.filter.clone(),
        });
        let request = self
            .request(Method::GET, &table_path(table), self.key.expose())
            .query(&query.to_query_pairs());
        self.send_json(request).await
    }

    /// `DELETE /rest/v1/{table}?{filter}`, returning the `returning` column of every deleted row
    pub async fn delete_records(
        &self,
        table: &str,
        filter: &Filter,
        returning: &str,
    ) -> Result<Vec<Value>, ApiError> {
        self.trace(&Operation::bulk_delete(table, filter.clone()));
        let mut pairs = filter.to_query_pairs();
        pairs.push(("select".to_string(), returning.to_string()));

        let request = self
            .request(Method::DELETE, &table_path(table), self.key.expose())
            .header("Prefer", "return=representation")
            .query(&pairs);
        self.send_json(request).await
    }

    /// `DELETE /rest/v1/{table}?{id_column}=eq.{id}`
    pub async fn delete_record_by_id(
        &self,
        table: &str,
        id_column: &str,
        id: &str,
    ) -> Result<(), ApiError> {
        self.trace(&Operation::delete_record(
            table,
            id_column,
            RecordId::new(id),
            None,
        ));
        let filter = Filter::eq(id_column, id);
        let request = self
            .request(Method::DELETE, &table_path(table), self.key.expose())
            .header("Prefer", "return=minimal")
            .query(&filter.to_query_pairs());
        self.send(request).await?;
        Ok(())
    }

    /// Probe a table with a one-row read. Missing tables come back as `Ok(false)`.
    pub async fn table_exists(&self, table: &str) -> Result<bool, ApiError> {
        self.trace(&Operation::ProbeTable {
            table: table.to_string(),
        });
        let request = self
            .request(Method::GET, &table_path(table), self.key.expose())
            .query(&Query::new().limit(1).to_query_pairs());
        match self.send_json::<Vec<Value>>(request).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_missing_table() => {
                debug!("Table {} not found: {}", table, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Run a raw statement through the configured SQL function.
    /// Returns `Value::Null` when the function returns nothing.
    pub async fn execute_sql(&self, statement: &str) -> Result<Value, ApiError> {
        self.trace(&Operation::execute_sql(&self.rest.rpc_function, statement));
        let path = format!(
            "{}/rpc/{}",
            REST_PATH,
            urlencoding::encode(&self.rest.rpc_function)
        );
        let mut body = serde_json::Map::new();
        body.insert(
            self.rest.rpc_argument.clone(),
            Value::String(statement.to_string()),
        );

        let request = self
            .request(Method::POST, &path, self.key.expose())
            .json(&Value::Object(body));
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    // === Auth API ===

    /// Every auth user, fetched page by page until an empty page
    pub async fn list_auth_users(&self) -> Result<Vec<AuthUser>, ApiError> {
        let per_page = self.rest.page_size;
        let mut users = Vec::new();
        let mut page = 1usize;
        self.trace(&Operation::ListAuthUsers);

        loop {
            let request = self
                .request(
                    Method::GET,
                    &format!("{}/admin/users", AUTH_PATH),
                    self.key.expose(),
                )
                .query(&[("page", page.to_string()), ("per_page", per_page.to_string())]);
            let batch: UserPage = self.send_json(request).await?;
            let fetched = batch.users.len();
            debug!("Fetched auth users page {} ({} users)", page, fetched);

            if fetched == 0 {
                break;
            }
            users.extend(batch.users);
            page += 1;
        }

        Ok(users)
    }

    /// `DELETE /auth/v1/admin/users/{id}`
    pub async fn delete_auth_user(&self, id: &str) -> Result<(), ApiError> {
        self.trace(&Operation::DeleteAuthUser {
            id: RecordId::new(id),
            email: None,
        });
        let path = format!("{}/admin/users/{}", AUTH_PATH, urlencoding::encode(id));
        let request = self.request(Method::DELETE, &path, self.key.expose());
        self.send(request).await?;
        Ok(())
    }

    /// Password sign-in. Use a client built with the anon key.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        self.trace(&Operation::SignIn {
            email: email.to_string(),
        });
        let request = self
            .request(
                Method::POST,
                &format!("{}/token", AUTH_PATH),
                self.key.expose(),
            )
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        self.send_json(request).await
    }

    /// Revoke the session's refresh tokens
    pub async fn sign_out(&self, session: &Session) -> Result<(), ApiError> {
        self.trace(&Operation::SignOut);
        let request = self.request(
            Method::POST,
            &format!("{}/logout", AUTH_PATH),
            &session.access_token,
        );
        self.send(request).await?;
        Ok(())
    }

    // === Plumbing ===

    /// Log an outgoing call; state changes at info, reads at debug
    fn trace(&self, operation: &Operation) {
        if !self.monitoring.request_logging {
            return;
        }
        if operation.is_destructive() {
            info!("[{}] {}", operation.operation_type(), operation);
        } else {
            debug!("[{}] {}", operation.operation_type(), operation);
        }
    }

    fn request(&self, method: Method, path: &str, bearer: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", self.key.expose())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .bearer_auth(bearer)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = RemoteError::from_body(status.as_u16(), &body);
        debug!("Request failed: {}", error);
        Err(ApiError::Remote(error))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn table_path(table: &str) -> String {
    format!("{}/{}", REST_PATH, urlencoding::encode(table))
}
