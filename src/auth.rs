use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::HeaderValue;

use crate::{CastError, Result};

/// Static HTTP basic credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// `Basic <base64(username:password)>`, marked sensitive.
    pub(crate) fn header_value(&self) -> Result<HeaderValue> {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        let mut value = HeaderValue::try_from(format!("Basic {encoded}"))
            .map_err(|err| CastError::InvalidRequest(format!("invalid basic auth header: {err}")))?;
        value.set_sensitive(true);
        Ok(value)
    }
}
