use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use super::{ApiKey, FetchResult, PendingFetch, RandomSource, SourceError};

pub const ENDPOINT: &str = "https://api.random.org/json-rpc/4/invoke";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: DecimalFractionParams<'a>,
    id: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DecimalFractionParams<'a> {
    api_key: &'a str,
    n: usize,
    decimal_places: u32,
    replacement: bool,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<RpcResult>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcResult {
    random: RandomData,
    #[serde(default)]
    requests_left: Option<i64>,
    #[serde(default)]
    bits_left: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RandomData {
    data: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

pub struct RandomOrgSource {
    api_key: ApiKey,
    endpoint: String,
    client: reqwest::blocking::Client,
    next_id: AtomicU64,
}

impl RandomOrgSource {
    pub fn new(api_key: ApiKey) -> Result<Self, SourceError> {
        Self::with_endpoint(api_key, ENDPOINT)
    }

    pub fn with_endpoint(api_key: ApiKey, endpoint: impl Into<String>) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("truerng/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            api_key,
            endpoint: endpoint.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    fn request_body(&self, count: usize, decimal_places: u32) -> Result<String, SourceError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "generateDecimalFractions",
            params: DecimalFractionParams {
                api_key: self.api_key.as_str(),
                n: count,
                decimal_places,
                replacement: true,
            },
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        serde_json::to_string(&request).map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

impl RandomSource for RandomOrgSource {
    fn has_credential(&self) -> bool {
        self.api_key.is_usable()
    }

    fn fetch(&self, count: usize, decimal_places: u32) -> PendingFetch {
        if !self.has_credential() {
            return PendingFetch::ready(count, Err(SourceError::MissingCredential));
        }
        let body = match self.request_body(count, decimal_places) {
            Ok(body) => body,
            Err(e) => return PendingFetch::ready(count, Err(e)),
        };
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        log::debug!("Requesting {count} decimals from {endpoint}");

        PendingFetch::spawn(count, move || {
            let response = client
                .post(&endpoint)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()?
                .error_for_status()?;
            let text = response.text()?;
            parse_response(&text)
        })
    }
}

/// Decodes a JSON-RPC response body into the returned decimals.
pub fn parse_response(body: &str) -> FetchResult {
    let response: RpcResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(SourceError::Service {
            code: error.code,
            message: error.message,
        });
    }

    let Some(result) = response.result else {
        return Err(SourceError::Malformed(
            "response has neither result nor error".to_string(),
        ));
    };

    if let (Some(requests), Some(bits)) = (result.requests_left, result.bits_left) {
        log::debug!("random.org quota: {requests} requests, {bits} bits left");
    }

    Ok(result.random.data)
}
