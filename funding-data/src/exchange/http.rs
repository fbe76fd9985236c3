use crate::error::{ConfigError, FetchError};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Maximum number of response body characters included in decode error messages.
const ERROR_BODY_PREVIEW: usize = 100;

/// JSON REST client bound to one exchange base url.
///
/// Every request carries the configured timeout, so no call can block indefinitely.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    base_url: Url,
}

impl RestClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|error| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: error.to_string(),
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ConfigError::HttpClient(error.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET {base_url}{path}?{query}` and deserialize the JSON response.
    pub async fn get<Response>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, FetchError>
    where
        Response: DeserializeOwned,
    {
        let url = self.url(path)?;
        self.execute(self.client.get(url).query(query)).await
    }

    /// `POST {base_url}{path}` with a JSON body and deserialize the JSON response.
    pub async fn post<Body, Response>(&self, path: &str, body: &Body) -> Result<Response, FetchError>
    where
        Body: Serialize + ?Sized,
        Response: DeserializeOwned,
    {
        let url = self.url(path)?;
        self.execute(self.client.post(url).json(body)).await
    }

    fn url(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path)
            .map_err(|error| FetchError::UpstreamUnavailable(format!("invalid path {path}: {error}")))
    }

    async fn execute<Response>(&self, request: RequestBuilder) -> Result<Response, FetchError>
    where
        Response: DeserializeOwned,
    {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited(format!(
                "{} returned {status}",
                response.url()
            )));
        }
        if !status.is_success() {
            return Err(FetchError::UpstreamUnavailable(format!(
                "{} returned {status}",
                response.url()
            )));
        }

        let body = response.text().await?;
        parse_json(&body)
    }
}

/// Deserialize a JSON response body, reporting a truncated preview of the body on failure.
pub fn parse_json<Response>(body: &str) -> Result<Response, FetchError>
where
    Response: DeserializeOwned,
{
    serde_json::from_str(body).map_err(|error| {
        let preview = body.chars().take(ERROR_BODY_PREVIEW).collect::<String>();
        debug!(%error, %preview, "failed to parse response body");
        FetchError::Malformed(format!("{error}: {preview}"))
    })
}
