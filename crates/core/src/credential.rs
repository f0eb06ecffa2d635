//! Access-key credentials and their secret payload encoding.
//!
//! A staged rotation stores the key as
//! `{"accessKeyId": .., "secretAccessKey": .., "username": ..}`. Secrets
//! maintained by the single-shot procedures use the PascalCase spelling
//! `{"UserName": .., "AccessKeyId": .., "SecretAccessKey": ..}`; both decode
//! to the same [`AccessKeyCredential`].

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Activation status of an access key in the identity directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKeyStatus {
    /// Usable for authentication
    Active,
    /// Retained but rejected at authentication
    Inactive,
}

impl AccessKeyStatus {
    /// Wire name used by the identity directory
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }
}

impl fmt::Display for AccessKeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key listing entry; the secret half is never re-readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKeySummary {
    /// Access key id
    pub access_key_id: String,
    /// Current status
    pub status: AccessKeyStatus,
}

/// An IAM access key pair.
///
/// The secret half is only ever available from the create call and from the
/// secret store payload that captured it.
pub struct AccessKeyCredential {
    /// Public key identifier
    pub access_key_id: String,
    /// Secret half of the key pair
    pub secret_access_key: SecretString,
    /// Owning principal, when recorded
    pub user_name: Option<String>,
}

impl AccessKeyCredential {
    /// Create a credential for `user_name`
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::from(secret_access_key.into()),
            user_name: Some(user_name.into()),
        }
    }

    /// Owning principal, ignoring blank values
    pub fn principal(&self) -> Option<&str> {
        self.user_name.as_deref().filter(|name| !name.trim().is_empty())
    }

    /// Encode as a staged-rotation payload
    pub fn to_payload(&self) -> SecretString {
        self.encode(|c| {
            serde_json::json!({
                "accessKeyId": c.access_key_id,
                "secretAccessKey": c.secret_access_key.expose_secret(),
                "username": c.user_name,
            })
        })
    }

    /// Encode in the PascalCase layout used by single-shot maintenance
    pub fn to_maintenance_payload(&self) -> SecretString {
        self.encode(|c| {
            serde_json::json!({
                "UserName": c.user_name,
                "AccessKeyId": c.access_key_id,
                "SecretAccessKey": c.secret_access_key.expose_secret(),
            })
        })
    }

    fn encode(&self, layout: impl FnOnce(&Self) -> serde_json::Value) -> SecretString {
        SecretString::from(layout(self).to_string())
    }

    /// Decode either payload layout
    pub fn from_payload(payload: &SecretString) -> Result<Self, serde_json::Error> {
        let wire: WireCredential = serde_json::from_str(payload.expose_secret())?;
        Ok(Self {
            access_key_id: wire.access_key_id,
            secret_access_key: SecretString::from(wire.secret_access_key),
            user_name: wire.user_name,
        })
    }
}

impl Clone for AccessKeyCredential {
    fn clone(&self) -> Self {
        Self {
            access_key_id: self.access_key_id.clone(),
            secret_access_key: SecretString::from(self.secret_access_key.expose_secret().to_owned()),
            user_name: self.user_name.clone(),
        }
    }
}

impl fmt::Debug for AccessKeyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKeyCredential")
            .field("access_key_id", &self.access_key_id)
            .field("user_name", &self.user_name)
            .finish()
    }
}

#[derive(Deserialize)]
struct WireCredential {
    #[serde(rename = "accessKeyId", alias = "AccessKeyId")]
    access_key_id: String,
    #[serde(rename = "secretAccessKey", alias = "SecretAccessKey")]
    secret_access_key: String,
    #[serde(default, rename = "username", alias = "UserName")]
    user_name: Option<String>,
}

/// Principal named by an arbitrary JSON secret payload, if any.
///
/// Used on the CURRENT version, which may have been seeded by hand and need
/// not hold a full key pair.
pub fn principal_hint(payload: &SecretString) -> Result<Option<String>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(payload.expose_secret())?;
    Ok(["username", "UserName"]
        .iter()
        .find_map(|field| value.get(field).and_then(serde_json::Value::as_str))
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_staged_payload_layout() {
        let cred = AccessKeyCredential::new("AKIAK2", "s3cr3t", "del-admin1");
        let payload = cred.to_payload();
        let value: serde_json::Value = serde_json::from_str(payload.expose_secret()).unwrap();

        assert_eq!(value["accessKeyId"], "AKIAK2");
        assert_eq!(value["secretAccessKey"], "s3cr3t");
        assert_eq!(value["username"], "del-admin1");
    }

    #[test]
    fn test_decodes_maintenance_layout() {
        let payload = SecretString::from(
            r#"{"UserName":"svc","AccessKeyId":"AKIA1","SecretAccessKey":"x"}"#.to_string(),
        );
        let cred = AccessKeyCredential::from_payload(&payload).unwrap();

        assert_eq!(cred.access_key_id, "AKIA1");
        assert_eq!(cred.principal(), Some("svc"));
        assert_eq!(cred.secret_access_key.expose_secret(), "x");
    }

    #[test]
    fn test_maintenance_payload_roundtrip() {
        let cred = AccessKeyCredential::new("AKIA9", "k", "svc");
        let back = AccessKeyCredential::from_payload(&cred.to_maintenance_payload()).unwrap();
        assert_eq!(back.access_key_id, "AKIA9");
        assert_eq!(back.principal(), Some("svc"));
    }

    #[test]
    fn test_missing_username_is_allowed() {
        let payload =
            SecretString::from(r#"{"accessKeyId":"AKIA1","secretAccessKey":"x"}"#.to_string());
        let cred = AccessKeyCredential::from_payload(&payload).unwrap();
        assert_eq!(cred.principal(), None);
    }

    #[test]
    fn test_missing_key_id_is_rejected() {
        let payload = SecretString::from(r#"{"username":"svc"}"#.to_string());
        assert!(AccessKeyCredential::from_payload(&payload).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let cred = AccessKeyCredential::new("AKIA1", "do-not-print", "svc");
        let rendered = format!("{cred:?}");
        assert!(rendered.contains("AKIA1"));
        assert!(!rendered.contains("do-not-print"));
    }

    #[test]
    fn test_principal_hint() {
        let hint = |raw: &str| principal_hint(&SecretString::from(raw.to_string()));

        assert_eq!(hint(r#"{"username":"a"}"#).unwrap(), Some("a".into()));
        assert_eq!(hint(r#"{"UserName":"b"}"#).unwrap(), Some("b".into()));
        assert_eq!(hint(r#"{"username":"  "}"#).unwrap(), None);
        assert_eq!(hint(r#"{"other":1}"#).unwrap(), None);
        assert!(hint("not json").is_err());
    }
}
