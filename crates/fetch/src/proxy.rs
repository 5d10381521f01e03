//! Module proxy client
//!
//! Downloads the `.info`, `.mod` and `.zip` files of a module version from
//! a GOPROXY-style server into the module's `@v` directory.

use crate::{FetchRequest, Fetcher};
use async_trait::async_trait;
use prefetch_errors::{ConfigError, Error, FetchError};
use prefetch_root::{Sandbox, SandboxedPath};
use prefetch_types::escape_module_path;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Public module proxy
pub const DEFAULT_PROXY_URL: &str = "https://proxy.golang.org";

/// Files making up one module version in a module cache
const ARTIFACT_EXTENSIONS: [&str; 3] = ["info", "mod", "zip"];

/// Fetcher backed by a module proxy
#[derive(Clone)]
pub struct ProxyFetcher {
    client: Client,
    base: Url,
    timeout: Duration,
}

impl ProxyFetcher {
    /// Create a fetcher for the proxy at `base`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `base` is not an http(s) URL,
    /// or an internal error if the HTTP client cannot be built.
    pub fn new(base: &str, timeout: Duration) -> Result<Self, Error> {
        let invalid = || ConfigError::InvalidValue {
            field: "proxy".to_string(),
            value: base.to_string(),
        };
        let base = Url::parse(base).map_err(|_| invalid())?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid().into());
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .user_agent(format!("prefetch/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            timeout,
        })
    }

    /// Create a fetcher for the public proxy
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_defaults() -> Result<Self, Error> {
        Self::new(DEFAULT_PROXY_URL, Duration::from_secs(300))
    }

    /// URL of one artifact of `request`
    #[must_use]
    pub fn artifact_url(&self, request: &FetchRequest, extension: &str) -> String {
        format!(
            "{}/{}/@v/{}.{extension}",
            self.base.as_str().trim_end_matches('/'),
            escape_module_path(&request.name),
            request.escaped_version(),
        )
    }

    async fn download(&self, request: &FetchRequest, extension: &str) -> Result<Vec<u8>, Error> {
        let url = self.artifact_url(request, extension);
        tracing::debug!(url = %url, "requesting module artifact");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_error(request, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(request, status).into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.request_error(request, &e))?;
        Ok(body.to_vec())
    }

    fn request_error(&self, request: &FetchRequest, err: &reqwest::Error) -> Error {
        if err.is_timeout() {
            return FetchError::Timeout {
                name: request.name.clone(),
                seconds: self.timeout.as_secs(),
            }
            .into();
        }
        if err.is_connect() || err.is_request() || err.is_body() {
            return FetchError::Transient {
                name: request.name.clone(),
                version: request.version.clone(),
                message: err.to_string(),
            }
            .into();
        }
        FetchError::Failed {
            name: request.name.clone(),
            version: request.version.clone(),
            message: err.to_string(),
        }
        .into()
    }
}

/// Classify an HTTP status: throttling and server errors are transient
fn status_error(request: &FetchRequest, status: StatusCode) -> FetchError {
    let name = request.name.clone();
    let version = request.version.clone();
    let message = format!("proxy responded with {status}");

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        FetchError::Transient {
            name,
            version,
            message,
        }
    } else {
        FetchError::Failed {
            name,
            version,
            message,
        }
    }
}

#[async_trait]
impl Fetcher for ProxyFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        output: &Sandbox,
        destination: &SandboxedPath,
    ) -> Result<(), Error> {
        if request.reference.is_local() {
            return Err(FetchError::Failed {
                name: request.name.clone(),
                version: request.version.clone(),
                message: "project-local modules are not served by a proxy".to_string(),
            }
            .into());
        }

        let version = request.escaped_version();
        for extension in ARTIFACT_EXTENSIONS {
            let body = self.download(request, extension).await?;
            output
                .write(destination.relative().join(format!("{version}.{extension}")), body)
                .await?;
        }

        Ok(())
    }
}
