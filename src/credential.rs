//! Credential types and providers.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::{Context, Error, Result};

/// An immutable access-key-id / secret-key pair.
///
/// Resolved once per client context and shared by every invocation.
#[derive(Clone)]
pub struct Credential {
    /// Access key id for the account.
    pub access_key_id: String,
    /// Secret access key for the account.
    pub secret_access_key: String,
}

impl Credential {
    /// Create a credential from a key pair.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Check that both halves of the key pair are present.
    pub fn is_valid(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// ProvideCredential is the trait used to resolve a credential from the
/// environment a client runs in.
#[async_trait]
pub trait ProvideCredential: Debug + Send + Sync + 'static {
    /// Resolve a credential, or `None` if this provider has nothing.
    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Credential>>;
}

/// A provider that always returns the same, preconfigured credential.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credential: Credential,
}

impl StaticCredentialProvider {
    /// Create a provider around a fixed key pair.
    pub fn new(access_key_id: &str, secret_access_key: &str) -> Self {
        Self {
            credential: Credential::new(access_key_id, secret_access_key),
        }
    }
}

#[async_trait]
impl ProvideCredential for StaticCredentialProvider {
    async fn provide_credential(&self, _: &Context) -> Result<Option<Credential>> {
        if !self.credential.is_valid() {
            return Err(Error::auth_config("static credential is incomplete"));
        }
        Ok(Some(self.credential.clone()))
    }
}

/// A provider that reads `CLOUD_ACCESS_KEY_ID` / `CLOUD_SECRET_ACCESS_KEY`
/// from the context's environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialProvider;

/// Env key for the access key id.
pub const ENV_ACCESS_KEY_ID: &str = "CLOUD_ACCESS_KEY_ID";
/// Env key for the secret access key.
pub const ENV_SECRET_ACCESS_KEY: &str = "CLOUD_SECRET_ACCESS_KEY";

#[async_trait]
impl ProvideCredential for EnvCredentialProvider {
    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Credential>> {
        let (Some(ak), Some(sk)) = (
            ctx.env_var(ENV_ACCESS_KEY_ID),
            ctx.env_var(ENV_SECRET_ACCESS_KEY),
        ) else {
            return Ok(None);
        };

        let cred = Credential::new(ak, sk);
        if !cred.is_valid() {
            return Ok(None);
        }
        Ok(Some(cred))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticEnv;

    #[test]
    fn test_validity() {
        assert!(Credential::new("ak", "sk").is_valid());
        assert!(!Credential::new("", "sk").is_valid());
        assert!(!Credential::new("ak", "").is_valid());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let repr = format!("{:?}", Credential::new("ak", "very-secret"));
        assert!(!repr.contains("very-secret"));
    }

    #[tokio::test]
    async fn test_env_provider() {
        let ctx = Context::new().with_env(StaticEnv {
            envs: [
                (ENV_ACCESS_KEY_ID.to_string(), "ak".to_string()),
                (ENV_SECRET_ACCESS_KEY.to_string(), "sk".to_string()),
            ]
            .into_iter()
            .collect(),
        });

        let cred = EnvCredentialProvider
            .provide_credential(&ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cred.access_key_id, "ak");

        let empty = Context::new();
        assert!(EnvCredentialProvider
            .provide_credential(&empty)
            .await
            .unwrap()
            .is_none());
    }
}
