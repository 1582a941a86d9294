//! Bind credentials.
//!
//! A credential pair is a distinguished name (or UPN) plus a secret. Secrets are held in
//! [`SecretString`] so they never appear in `Debug` output or logs.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

/// Credentials used to authenticate ("bind") a directory session.
///
/// An empty DN together with an empty secret is an anonymous bind.
#[derive(Debug, Deserialize)]
pub struct BindCredentials {
    /// Bind DN or user principal name
    pub dn: String,

    /// Bind password
    #[serde(deserialize_with = "deserialize_secret")]
    pub secret: SecretString,
}

impl BindCredentials {
    /// Create a new credential pair.
    ///
    /// # Arguments
    ///
    /// * `dn` - The bind DN (or `user@domain` principal for Active Directory)
    /// * `secret` - The bind password
    #[must_use]
    pub fn new(dn: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    /// Credentials for an anonymous bind.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(String::new(), String::new())
    }

    /// Get the bind DN.
    #[must_use]
    pub fn bind_dn(&self) -> &str {
        &self.dn
    }

    /// Get the bind password.
    #[must_use]
    pub fn bind_password(&self) -> &str {
        self.secret.expose_secret()
    }

    /// Returns true when both the DN and the secret are empty.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.dn.is_empty() && self.secret.expose_secret().is_empty()
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_secret() {
        let creds = BindCredentials::new("cn=svc,dc=corp,dc=example,dc=com", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("cn=svc"));
        assert!(!rendered.contains("hunter2"));
        assert_eq!(creds.bind_password(), "hunter2");
    }

    #[test]
    fn anonymous_detection() {
        assert!(BindCredentials::anonymous().is_anonymous());
        assert!(!BindCredentials::new("svc@corp.example.com", "").is_anonymous());
    }

    #[test]
    fn deserializes_from_json() {
        let creds: BindCredentials =
            serde_json::from_str(r#"{"dn":"svc@corp.example.com","secret":"pw"}"#).unwrap();
        assert_eq!(creds.bind_dn(), "svc@corp.example.com");
        assert_eq!(creds.bind_password(), "pw");
    }
}
