//! Blocking HTTP transport for the shim gateway.
//!
//! One exchange at a time: build the request, perform it, hand back the
//! body as text or bytes. Digest challenges (401) are answered exactly
//! once; connect failures are retried a bounded number of times with a
//! linearly growing backoff. Any other transport failure surfaces
//! immediately.

use crate::digest::DigestChallenge;
use reqwest::blocking::{multipart, Client, Request, Response};
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use scidb_common::{ConnectionParameters, ShimError, ShimResult};
use std::time::Duration;
use tracing::{debug, warn};

pub const ENDPOINT_VERSION: &str = "/version";
pub const ENDPOINT_NEW_SESSION: &str = "/new_session";
pub const ENDPOINT_RELEASE_SESSION: &str = "/release_session";
pub const ENDPOINT_EXECUTE_QUERY: &str = "/execute_query";
pub const ENDPOINT_READ_BYTES: &str = "/read_bytes";
pub const ENDPOINT_UPLOAD_FILE: &str = "/upload_file";
pub const ENDPOINT_LOGIN: &str = "/login";
pub const ENDPOINT_LOGOUT: &str = "/logout";

/// Connect failures are retried this many times in total.
const CONNECT_RETRIES: u32 = 3;

/// Query parameter list for one request.
pub type Query<'a> = [(&'a str, String)];

/// Owns the underlying connection pool and credentials for one client.
pub struct Transport {
    client: Client,
    base_url: String,
    user: String,
    password: String,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Build a transport from connection parameters.
    ///
    /// No operation-level timeout is configured: a shim query blocks
    /// until the backend answers.
    pub fn new(params: &ConnectionParameters) -> ShimResult<Self> {
        let mut builder = Client::builder()
            .timeout(None)
            .connect_timeout(Duration::from_secs(30));
        if params.ssl && params.ssl_trust {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| ShimError::Transport(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: params.base_url(),
            user: params.user.clone(),
            password: params.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET returning the response body as text.
    pub fn get_text(&self, endpoint: &str, query: &Query<'_>) -> ShimResult<String> {
        let response = self.perform(endpoint, &|| self.build_get(endpoint, query))?;
        response
            .text()
            .map_err(|e| ShimError::Transport(format!("cannot read response body: {e}")))
    }

    /// GET returning the raw response bytes.
    pub fn get_binary(&self, endpoint: &str, query: &Query<'_>) -> ShimResult<Vec<u8>> {
        let response = self.perform(endpoint, &|| self.build_get(endpoint, query))?;
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| ShimError::Transport(format!("cannot read response body: {e}")))
    }

    /// Multipart POST of an in-memory buffer as a form file upload.
    ///
    /// Returns the response body (the shim reports the server-side path
    /// of the uploaded file).
    pub fn post_multipart(
        &self,
        endpoint: &str,
        query: &Query<'_>,
        file_name: &str,
        data: &[u8],
    ) -> ShimResult<String> {
        let make = || -> ShimResult<Request> {
            let part = multipart::Part::bytes(data.to_vec())
                .file_name(file_name.to_string())
                .mime_str("application/octet-stream")
                .map_err(|e| ShimError::Transport(e.to_string()))?;
            let form = multipart::Form::new().part("file", part);
            self.client
                .post(format!("{}{}", self.base_url, endpoint))
                .query(query)
                .multipart(form)
                .build()
                .map_err(|e| ShimError::Transport(e.to_string()))
        };
        let response = self.perform(endpoint, &make)?;
        response
            .text()
            .map_err(|e| ShimError::Transport(format!("cannot read response body: {e}")))
    }

    fn build_get(&self, endpoint: &str, query: &Query<'_>) -> ShimResult<Request> {
        self.client
            .get(format!("{}{}", self.base_url, endpoint))
            .query(query)
            .build()
            .map_err(|e| ShimError::Transport(e.to_string()))
    }

    /// Perform one exchange: bounded connect retry, one digest answer
    /// on 401, non-success status mapped to an error.
    fn perform(
        &self,
        endpoint: &str,
        make: &dyn Fn() -> ShimResult<Request>,
    ) -> ShimResult<Response> {
        let mut attempt: u32 = 0;
        loop {
            let request = make()?;
            match self.client.execute(request) {
                Ok(response) if response.status() == StatusCode::UNAUTHORIZED => {
                    return self.answer_challenge(endpoint, make, response);
                }
                Ok(response) => return check_status(endpoint, response),
                Err(e) if e.is_connect() && attempt + 1 < CONNECT_RETRIES => {
                    attempt += 1;
                    warn!(endpoint, attempt, "Connection error, retrying");
                    std::thread::sleep(Duration::from_millis(u64::from(attempt) * 100));
                }
                Err(e) if e.is_connect() => {
                    return Err(ShimError::ConnectFailed {
                        retries: CONNECT_RETRIES,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(ShimError::Transport(e.to_string())),
            }
        }
    }

    /// Answer a digest challenge exactly once.
    fn answer_challenge(
        &self,
        endpoint: &str,
        make: &dyn Fn() -> ShimResult<Request>,
        response: Response,
    ) -> ShimResult<Response> {
        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(DigestChallenge::parse);

        let Some(challenge) = challenge else {
            return Err(ShimError::HttpStatus {
                status: 401,
                endpoint: endpoint.to_string(),
            });
        };

        let mut request = make()?;
        let uri = request_uri(&request);
        let header = challenge.respond(&self.user, &self.password, request.method().as_str(), &uri);
        let value = header
            .parse()
            .map_err(|_| ShimError::Transport("invalid digest authorization header".into()))?;
        let _ = request.headers_mut().insert(AUTHORIZATION, value);

        debug!(endpoint, "Answering digest challenge");
        match self.client.execute(request) {
            Ok(response) => check_status(endpoint, response),
            Err(e) => Err(ShimError::Transport(e.to_string())),
        }
    }
}

/// Request-URI as used in the digest hash: path plus query string.
fn request_uri(request: &Request) -> String {
    let url = request.url();
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

fn check_status(endpoint: &str, response: Response) -> ShimResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ShimError::HttpStatus {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
        })
    }
}
