//! Client for the remote attribute-based access-control service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use shared::{
    domain::{AuthorityName, Ciphertext, UserId},
    error::service_message,
    protocol::{
        DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, KeygenRequest,
        KeygenResponse, Route, SetupAuthorityRequest,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub type CredentialRequest = KeygenRequest;

/// Failure of a single remote operation.
///
/// `Transport` means the exchange never completed. `Service` and `Embedded`
/// mean the service answered but reported an application error. `AccessDenied`
/// is the decrypt route's policy verdict and is not a malfunction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("{0}")]
    Transport(String),
    #[error("service responded with status {status}: {message}")]
    Service { status: u16, message: String },
    #[error("{0}")]
    Embedded(String),
    #[error("access denied (status {status}): {message}")]
    AccessDenied { status: u16, message: String },
    #[error("malformed response from {route}: {detail}")]
    MalformedResponse { route: &'static str, detail: String },
}

impl RemoteError {
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, RemoteError::AccessDenied { .. })
    }

    /// The detail worth showing to a user, without the status prefix.
    pub fn detail(&self) -> &str {
        match self {
            RemoteError::Transport(message)
            | RemoteError::Embedded(message)
            | RemoteError::Service { message, .. }
            | RemoteError::AccessDenied { message, .. } => message,
            RemoteError::MalformedResponse { detail, .. } => detail,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialAck {
    /// Hex-serialized user key, when the service returns one.
    pub user_key: Option<String>,
}

#[async_trait]
pub trait AccessControlService: Send + Sync {
    async fn bootstrap_authority(&self, name: &AuthorityName) -> Result<(), RemoteError>;
    async fn issue_credential(
        &self,
        request: &CredentialRequest,
    ) -> Result<CredentialAck, RemoteError>;
    async fn encrypt(&self, policy: &str, payload: &str) -> Result<Ciphertext, RemoteError>;
    async fn decrypt(&self, user_id: &UserId, payload: &Ciphertext)
        -> Result<String, RemoteError>;
}

#[derive(Debug, Error)]
pub enum ClientConfigError {
    #[error("invalid service url '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("unsupported service url scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}

struct Endpoints {
    setup_authority: Url,
    keygen: Url,
    encrypt: Url,
    decrypt: Url,
}

impl Endpoints {
    fn resolve(base_url: &str) -> Result<Self, ClientConfigError> {
        let invalid = |source| ClientConfigError::InvalidUrl {
            url: base_url.to_string(),
            source,
        };
        let mut base = Url::parse(base_url.trim()).map_err(invalid)?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ClientConfigError::UnsupportedScheme(
                base.scheme().to_string(),
            ));
        }
        // Relative joins replace the last path segment unless it ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let join = |route: Route| base.join(route.path()).map_err(invalid);
        Ok(Self {
            setup_authority: join(Route::SetupAuthority)?,
            keygen: join(Route::Keygen)?,
            encrypt: join(Route::Encrypt)?,
            decrypt: join(Route::Decrypt)?,
        })
    }

    fn get(&self, route: Route) -> &Url {
        match route {
            Route::SetupAuthority => &self.setup_authority,
            Route::Keygen => &self.keygen,
            Route::Encrypt => &self.encrypt,
            Route::Decrypt => &self.decrypt,
        }
    }
}

/// [`AccessControlService`] over the service's JSON HTTP API.
pub struct HttpAccessControlClient {
    http: Client,
    endpoints: Endpoints,
}

impl HttpAccessControlClient {
    pub fn new(base_url: &str) -> Result<Self, ClientConfigError> {
        Self::with_timeout(base_url, None)
    }

    /// Builds a client whose requests fail as transport errors after `timeout`.
    pub fn with_timeout(
        base_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, ClientConfigError> {
        let endpoints = Endpoints::resolve(base_url)?;
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            endpoints,
        })
    }

    pub fn endpoint(&self, route: Route) -> &Url {
        self.endpoints.get(route)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        route: Route,
        body: &B,
    ) -> Result<Response, RemoteError> {
        let res = self
            .http
            .post(self.endpoint(route).clone())
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        debug!(
            route = route.path(),
            status = res.status().as_u16(),
            "access-control service responded"
        );
        Ok(res)
    }
}

#[async_trait]
impl AccessControlService for HttpAccessControlClient {
    async fn bootstrap_authority(&self, name: &AuthorityName) -> Result<(), RemoteError> {
        let res = self
            .post(
                Route::SetupAuthority,
                &SetupAuthorityRequest {
                    authority_name: name.clone(),
                },
            )
            .await?;
        let status = res.status();
        if !status.is_success() {
            return Err(service_error(status, res).await);
        }
        Ok(())
    }

    async fn issue_credential(
        &self,
        request: &CredentialRequest,
    ) -> Result<CredentialAck, RemoteError> {
        let res = self.post(Route::Keygen, request).await?;
        let status = res.status();
        if !status.is_success() {
            return Err(service_error(status, res).await);
        }
        let body = res.text().await.map_err(transport_error)?;
        // Any success body counts as an acknowledgement; the key is optional.
        let parsed = serde_json::from_str::<KeygenResponse>(&body).unwrap_or_default();
        Ok(CredentialAck {
            user_key: parsed.user_key,
        })
    }

    async fn encrypt(&self, policy: &str, payload: &str) -> Result<Ciphertext, RemoteError> {
        let res = self
            .post(
                Route::Encrypt,
                &EncryptRequest {
                    policy: policy.to_string(),
                    payload: payload.to_string(),
                },
            )
            .await?;
        let status = res.status();
        if !status.is_success() {
            return Err(service_error(status, res).await);
        }
        let body: EncryptResponse = read_json(Route::Encrypt, res).await?;
        if let Some(error) = body.error {
            return Err(RemoteError::Embedded(error));
        }
        body.result.ok_or_else(|| RemoteError::MalformedResponse {
            route: Route::Encrypt.path(),
            detail: "missing result field".to_string(),
        })
    }

    async fn decrypt(
        &self,
        user_id: &UserId,
        payload: &Ciphertext,
    ) -> Result<String, RemoteError> {
        let res = self
            .post(
                Route::Decrypt,
                &DecryptRequest {
                    user_id: user_id.clone(),
                    payload: payload.clone(),
                },
            )
            .await?;
        let status = res.status();
        if !status.is_success() {
            let message = match res.text().await {
                Ok(body) => service_message(&body),
                Err(err) => err.to_string(),
            };
            return Err(RemoteError::AccessDenied {
                status: status.as_u16(),
                message,
            });
        }
        let body: DecryptResponse = read_json(Route::Decrypt, res).await?;
        body.decrypted_message.ok_or_else(|| RemoteError::MalformedResponse {
            route: Route::Decrypt.path(),
            detail: "missing decrypted_message field".to_string(),
        })
    }
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    let mut message = if err.is_timeout() {
        format!("request timed out: {err}")
    } else {
        err.to_string()
    };
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    RemoteError::Transport(message)
}

async fn service_error(status: StatusCode, res: Response) -> RemoteError {
    match res.text().await {
        Ok(body) => RemoteError::Service {
            status: status.as_u16(),
            message: service_message(&body),
        },
        Err(err) => transport_error(err),
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    route: Route,
    res: Response,
) -> Result<T, RemoteError> {
    let body = res.text().await.map_err(transport_error)?;
    serde_json::from_str(&body).map_err(|err| RemoteError::MalformedResponse {
        route: route.path(),
        detail: err.to_string(),
    })
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
