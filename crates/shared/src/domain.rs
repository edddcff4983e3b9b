use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! name_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

name_newtype!(AuthorityName);
name_newtype!(UserId);
name_newtype!(Attribute);
name_newtype!(Ciphertext);

pub const HOSPITAL: &str = "HOSPITAL";
pub const INSURANCE_COMPANY: &str = "INSURANCE_COMPANY";

/// Authorities created by the bootstrap action, in creation order.
pub const BOOTSTRAP_AUTHORITIES: [&str; 2] = [HOSPITAL, INSURANCE_COMPANY];

const PREVIEW_CHARS: usize = 60;

impl Ciphertext {
    pub fn preview(&self) -> String {
        preview(&self.0)
    }
}

/// Shortens long opaque strings (ciphertexts, serialized keys) for display.
pub fn preview(value: &str) -> String {
    match value.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}

/// Splits a comma-separated attribute list, dropping blank items.
pub fn parse_attribute_list(raw: &str) -> Vec<Attribute> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(Attribute::from)
        .collect()
}
