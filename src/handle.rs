use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// name + email identifying an author or committer
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle {
    pub name: String,
    pub email: String,
}

impl Handle {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// parse `"Name <user@example.com>"` or a bare `"user@example.com"`
    ///
    /// a bare email is used as both name and email.
    pub fn parse(s: &str) -> Result<Self> {
        if looks_like_email(s) {
            return Ok(Self::new(s, s));
        }

        if let Some(rest) = s.strip_suffix('>') {
            if let Some((name, email)) = rest.rsplit_once(" <") {
                if looks_like_email(email) {
                    return Ok(Self::new(name, email));
                }
            }
        }

        Err(Error::InvalidHandle(s.to_string()))
    }

    /// identity used when neither the caller nor the store configured one
    pub fn fallback() -> Self {
        Self::new("multitree", "multitree@localhost.localdomain")
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

impl FromStr for Handle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// local@domain.tld, no whitespace
fn looks_like_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
