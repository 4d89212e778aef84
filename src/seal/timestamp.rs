//! Trusted timestamps (RFC 3161)
//!
//! [`HttpTimestampAuthority`] builds the timestamp query with `openssl ts`,
//! sends it to the authority over HTTP, and later verifies the returned
//! token against the authority's certificate chain, again with `openssl`.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::process::{run_with_timeout, ProcessError};
use crate::timeout::TimeoutConfig;

/// FreeTSA endpoints
pub const DEFAULT_TSA_URL: &str = "https://freetsa.org/tsr";
pub const DEFAULT_TSA_CERT_URL: &str = "https://freetsa.org/files/tsa.crt";
pub const DEFAULT_CA_CERT_URL: &str = "https://freetsa.org/files/cacert.pem";

/// Upper bound on any response body read from the authority.
const MAX_RESPONSE_BYTES: u64 = 10 * 1024 * 1024;

/// Errors from a timestamp authority
#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("{url} returned an empty response")]
    EmptyResponse { url: String },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("timestamp token does not verify: {0}")]
    VerificationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Certificates needed to check a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityCertificates {
    /// The authority's signing certificate.
    pub tsa_cert: Vec<u8>,
    /// The root certificate it chains to.
    pub ca_cert: Vec<u8>,
}

/// Issues and verifies timestamp tokens.
pub trait TimestampAuthority {
    /// Obtain a token over `payload`.
    fn request_timestamp(&self, payload: &[u8]) -> Result<Vec<u8>, AuthorityError>;

    fn fetch_certificates(&self) -> Result<AuthorityCertificates, AuthorityError>;

    /// Succeeds only if `token` is a valid timestamp over `payload`.
    fn verify_token(
        &self,
        payload: &[u8],
        token: &[u8],
        certificates: &AuthorityCertificates,
    ) -> Result<(), AuthorityError>;
}

/// Endpoint settings for [`HttpTimestampAuthority`].
#[derive(Debug, Clone)]
pub struct AuthorityEndpoints {
    pub url: String,
    pub tsa_cert_url: String,
    pub ca_cert_url: String,
}

impl Default for AuthorityEndpoints {
    fn default() -> Self {
        Self {
            url: DEFAULT_TSA_URL.to_string(),
            tsa_cert_url: DEFAULT_TSA_CERT_URL.to_string(),
            ca_cert_url: DEFAULT_CA_CERT_URL.to_string(),
        }
    }
}

/// RFC 3161 authority reached over HTTP.
pub struct HttpTimestampAuthority {
    endpoints: AuthorityEndpoints,
    openssl: PathBuf,
    timeouts: TimeoutConfig,
    agent: ureq::Agent,
}

impl HttpTimestampAuthority {
    pub fn new(endpoints: AuthorityEndpoints, openssl: impl Into<PathBuf>, timeouts: TimeoutConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeouts.connect())
            .timeout(timeouts.request())
            .build();
        Self {
            endpoints,
            openssl: openssl.into(),
            timeouts,
            agent,
        }
    }

    fn openssl(&self, args: &[&str]) -> Result<Vec<u8>, ProcessError> {
        let mut command = Command::new(&self.openssl);
        command.args(args);
        Ok(run_with_timeout(command, None, self.timeouts.process())?.check()?.stdout)
    }

    fn get(&self, url: &str) -> Result<Vec<u8>, AuthorityError> {
        tracing::debug!(url, "Fetching");
        let response = self.agent.get(url).call().map_err(|e| AuthorityError::Http {
            url: url.to_string(),
            source: Box::new(e),
        })?;
        read_body(url, response)
    }
}

fn read_body(url: &str, response: ureq::Response) -> Result<Vec<u8>, AuthorityError> {
    let mut body = Vec::new();
    response
        .into_reader()
        .take(MAX_RESPONSE_BYTES)
        .read_to_end(&mut body)?;
    if body.is_empty() {
        return Err(AuthorityError::EmptyResponse { url: url.to_string() });
    }
    Ok(body)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl TimestampAuthority for HttpTimestampAuthority {
    fn request_timestamp(&self, payload: &[u8]) -> Result<Vec<u8>, AuthorityError> {
        let scratch = tempfile::tempdir()?;
        let data = scratch.path().join("payload.json");
        let query = scratch.path().join("request.tsq");
        fs::write(&data, payload)?;

        self.openssl(&[
            "ts",
            "-query",
            "-data",
            &path_arg(&data),
            "-no_nonce",
            "-sha512",
            "-cert",
            "-out",
            &path_arg(&query),
        ])?;
        let query_bytes = fs::read(&query)?;

        let url = &self.endpoints.url;
        tracing::info!(url = %url, "Requesting timestamp");
        let response = self
            .agent
            .post(url)
            .set("Content-Type", "application/timestamp-query")
            .send_bytes(&query_bytes)
            .map_err(|e| AuthorityError::Http {
                url: url.clone(),
                source: Box::new(e),
            })?;
        read_body(url, response)
    }

    fn fetch_certificates(&self) -> Result<AuthorityCertificates, AuthorityError> {
        Ok(AuthorityCertificates {
            tsa_cert: self.get(&self.endpoints.tsa_cert_url)?,
            ca_cert: self.get(&self.endpoints.ca_cert_url)?,
        })
    }

    fn verify_token(
        &self,
        payload: &[u8],
        token: &[u8],
        certificates: &AuthorityCertificates,
    ) -> Result<(), AuthorityError> {
        let scratch = tempfile::tempdir()?;
        let data = scratch.path().join("payload.json");
        let tsr = scratch.path().join("token.tsr");
        let tsa_cert = scratch.path().join("tsa.crt");
        let ca_cert = scratch.path().join("cacert.pem");
        fs::write(&data, payload)?;
        fs::write(&tsr, token)?;
        fs::write(&tsa_cert, &certificates.tsa_cert)?;
        fs::write(&ca_cert, &certificates.ca_cert)?;

        let result = self.openssl(&[
            "ts",
            "-verify",
            "-data",
            &path_arg(&data),
            "-in",
            &path_arg(&tsr),
            "-CAfile",
            &path_arg(&ca_cert),
            "-untrusted",
            &path_arg(&tsa_cert),
        ]);
        match result {
            Ok(_) => Ok(()),
            Err(ProcessError::Failed { stderr, .. }) => Err(AuthorityError::VerificationFailed(stderr)),
            Err(other) => Err(other.into()),
        }
    }
}
