//! Identifiers for secrets and secret versions.
//!
//! Both are opaque strings assigned by the secret store: a [`SecretId`] is a
//! secret name or ARN, a [`VersionId`] is the version's id, which for staged
//! rotation equals the `ClientRequestToken` of the rotation attempt.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximum accepted identifier length (the secret store's ARN limit).
const ID_MAX_LEN: usize = 2048;

/// Errors from constructing an identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input was empty or contained only whitespace.
    #[error("identifier cannot be empty or whitespace")]
    Empty,
    /// The input contains whitespace or control characters.
    #[error("identifier contains whitespace or control characters")]
    InvalidCharacters,
    /// The input exceeds [`ID_MAX_LEN`] characters.
    #[error("identifier exceeds maximum length of {ID_MAX_LEN} characters")]
    TooLong,
}

fn validate(raw: &str) -> Result<(), IdError> {
    if raw.trim().is_empty() {
        return Err(IdError::Empty);
    }
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(IdError::InvalidCharacters);
    }
    if raw.len() > ID_MAX_LEN {
        return Err(IdError::TooLong);
    }
    Ok(())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap the raw identifier.
            pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
                let raw = raw.into();
                validate(&raw)?;
                Ok(Self(raw))
            }

            /// Return the inner string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = IdError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

string_id!(
    /// Name or ARN of a secret in the secret store.
    SecretId
);

string_id!(
    /// Version of a secret; during rotation this is the request token.
    VersionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_arns_and_tokens() {
        let id: SecretId = "arn:aws:secretsmanager:us-east-1:533267247980:secret:Usercred-KuxnN4"
            .parse()
            .unwrap();
        assert!(id.as_str().ends_with("Usercred-KuxnN4"));

        let token = VersionId::new("f6c5a2a9-4f2b-4b1e-9a63-8a0b1d8e2f10").unwrap();
        assert_eq!(token, "f6c5a2a9-4f2b-4b1e-9a63-8a0b1d8e2f10");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(SecretId::new(""), Err(IdError::Empty));
        assert_eq!(VersionId::new("   "), Err(IdError::Empty));
    }

    #[test]
    fn rejects_whitespace_inside() {
        assert_eq!(SecretId::new("my secret"), Err(IdError::InvalidCharacters));
        assert_eq!(VersionId::new("t1\n"), Err(IdError::InvalidCharacters));
    }

    #[test]
    fn rejects_too_long() {
        let long = "a".repeat(ID_MAX_LEN + 1);
        assert_eq!(SecretId::new(long), Err(IdError::TooLong));
    }

    #[test]
    fn serde_roundtrips_as_plain_string() {
        let id = SecretId::new("S1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"S1\"");
        assert!(serde_json::from_str::<SecretId>("\"\"").is_err());
    }
}
