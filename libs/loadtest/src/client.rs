use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    StatusCode,
};
use serde::Serialize;

use crate::{response::IntoResponse, LoadTestError};

#[derive(Clone, Debug)]
pub struct Client {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self, LoadTestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::ClientBuilder::new()
            .default_headers(headers)
            .build()
            .into_response("failed to build http client")?;

        Ok(Self {
            base_url: base_url.to_string(),
            client,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends `body` as JSON. The status is returned as is; deciding whether
    /// it is acceptable is up to the caller.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<HttpResponse, LoadTestError> {
        let body = serde_json::to_string(body)
            .into_response("failed to serialize request body")?;

        let response = self
            .client
            .post(self.url(path))
            .body(body)
            .send()
            .await
            .into_response("failed to send")?;

        let status = response.status();
        let body = response.text().await.into_response("failed to get text")?;

        Ok(HttpResponse { status, body })
    }
}
