//! Request signing: scheme dispatch plus the scheme implementations.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::credential::{Credential, ProvideCredential};
use crate::variant::{ProviderVariant, SigningScheme};
use crate::{Context, Error, Result};

mod legacy;
mod v4;

pub use legacy::HeaderSigner;
pub use legacy::QuerySigner;
pub use v4::V4Signer;

/// SignRequest is the trait implemented by each signing scheme.
///
/// Signing is a pure transformation of the request parts: a signer never
/// sends anything and never retries.
#[async_trait]
pub trait SignRequest: Debug + Send + Sync + 'static {
    /// Canonicalize and sign the request in place.
    ///
    /// `body` is the exact payload that will be transmitted; V4 hashes it
    /// into the canonical request.
    async fn sign_request(
        &self,
        ctx: &Context,
        parts: &mut http::request::Parts,
        body: &[u8],
        credential: &Credential,
    ) -> Result<()>;
}

/// Signer resolves the credential once and dispatches each request to the
/// scheme its variant and service require.
#[derive(Clone, Debug)]
pub struct Signer {
    ctx: Context,
    variant: ProviderVariant,
    provider: Arc<dyn ProvideCredential>,
    credential: Arc<Mutex<Option<Credential>>>,
}

impl Signer {
    /// Create a signer for one provider variant.
    pub fn new(
        ctx: Context,
        variant: ProviderVariant,
        provider: impl ProvideCredential,
    ) -> Self {
        Self {
            ctx,
            variant,
            provider: Arc::new(provider),
            credential: Arc::new(Mutex::new(None)),
        }
    }

    /// The variant this signer serves.
    pub fn variant(&self) -> ProviderVariant {
        self.variant
    }

    /// Resolve the credential, loading it on first use.
    ///
    /// The loaded pair is cached; a concurrent duplicate load is benign and
    /// stores the same value.
    pub async fn credential(&self) -> Result<Credential> {
        if let Some(cred) = self.credential.lock().expect("lock poisoned").clone() {
            return Ok(cred);
        }

        let cred = self
            .provider
            .provide_credential(&self.ctx)
            .await?
            .ok_or_else(|| Error::auth_config("no credential available"))?;
        if !cred.is_valid() {
            return Err(Error::auth_config("resolved credential is incomplete"));
        }

        *self.credential.lock().expect("lock poisoned") = Some(cred.clone());
        Ok(cred)
    }

    /// Sign request parts for one call to `service`, selecting the scheme
    /// from the variant.
    pub async fn sign_parts(
        &self,
        service: &str,
        region: Option<&str>,
        parts: &mut http::request::Parts,
        body: &[u8],
    ) -> Result<SigningScheme> {
        let cred = self.credential().await?;
        let scheme = self.variant.signing_scheme(service);

        match scheme {
            SigningScheme::V4 => {
                let region = region.ok_or_else(|| {
                    Error::request_construction(format!(
                        "service `{service}` requires a region for V4 signing"
                    ))
                })?;
                V4Signer::new(service, region)
                    .sign_request(&self.ctx, parts, body, &cred)
                    .await?;
            }
            SigningScheme::LegacyQuery => {
                QuerySigner::new()
                    .sign_request(&self.ctx, parts, body, &cred)
                    .await?;
            }
            SigningScheme::LegacyHeader => {
                HeaderSigner::new(self.variant)
                    .sign_request(&self.ctx, parts, body, &cred)
                    .await?;
            }
        }

        Ok(scheme)
    }
}
