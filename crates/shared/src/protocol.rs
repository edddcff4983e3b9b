use serde::{Deserialize, Serialize};

use crate::domain::{Attribute, AuthorityName, Ciphertext, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SetupAuthority,
    Keygen,
    Encrypt,
    Decrypt,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::SetupAuthority => "setup_authority",
            Route::Keygen => "keygen",
            Route::Encrypt => "encrypt",
            Route::Decrypt => "decrypt",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupAuthorityRequest {
    pub authority_name: AuthorityName,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetupAuthorityResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub authority_name: Option<AuthorityName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeygenRequest {
    pub authority_name: AuthorityName,
    pub attributes: Vec<Attribute>,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeygenResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub user_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptRequest {
    pub policy: String,
    pub payload: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptResponse {
    #[serde(default)]
    pub result: Option<Ciphertext>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptRequest {
    pub user_id: UserId,
    pub payload: Ciphertext,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecryptResponse {
    #[serde(default)]
    pub decrypted_message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
