//! Client configuration.

use crate::context::{Context, ReqwestHttpSend};
use crate::variant::ProviderVariant;
use crate::Result;

/// Env key for the provider variant name.
pub const ENV_PROVIDER_VARIANT: &str = "CLOUD_PROVIDER_VARIANT";
/// Env key for the region.
pub const ENV_REGION: &str = "CLOUD_REGION";
/// Env key for the configured endpoint (may be a comma-separated bootstrap
/// list).
pub const ENV_ENDPOINT: &str = "CLOUD_ENDPOINT";

/// Config carries everything resolved once at client construction: the
/// provider variant, the region, an optional preconfigured endpoint and
/// optional proxy settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// The provider variant this client talks to.
    pub variant: ProviderVariant,
    /// The region requests are bound to. Required for the AWS variant.
    pub region: Option<String>,
    /// A configured base endpoint, used by non-AWS variants. May be a
    /// comma-separated bootstrap list.
    pub endpoint: Option<String>,
    /// Optional HTTP proxy host.
    pub proxy_host: Option<String>,
    /// Optional HTTP proxy port.
    pub proxy_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            variant: ProviderVariant::Aws,
            region: None,
            endpoint: None,
            proxy_host: None,
            proxy_port: None,
        }
    }
}

impl Config {
    /// Create a config for the given variant.
    pub fn new(variant: ProviderVariant) -> Self {
        Self {
            variant,
            ..Default::default()
        }
    }

    /// Set the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the configured endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the HTTP proxy.
    pub fn with_proxy(mut self, host: impl Into<String>, port: u16) -> Self {
        self.proxy_host = Some(host.into());
        self.proxy_port = Some(port);
        self
    }

    /// Build the HTTP transport this config describes, routed through the
    /// configured proxy when one is set.
    pub fn http_send(&self) -> Result<ReqwestHttpSend> {
        match (self.proxy_host.as_deref(), self.proxy_port) {
            (Some(host), Some(port)) => ReqwestHttpSend::with_proxy(host, port),
            _ => Ok(ReqwestHttpSend::default()),
        }
    }

    /// Fill unset fields from the context's environment.
    pub fn from_env(ctx: &Context) -> Self {
        let variant = ctx
            .env_var(ENV_PROVIDER_VARIANT)
            .and_then(|v| ProviderVariant::from_name(&v).ok())
            .unwrap_or(ProviderVariant::Aws);

        Self {
            variant,
            region: ctx.env_var(ENV_REGION),
            endpoint: ctx.env_var(ENV_ENDPOINT),
            proxy_host: None,
            proxy_port: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticEnv;

    #[test]
    fn test_from_env() {
        let ctx = Context::new().with_env(StaticEnv {
            envs: [
                (ENV_PROVIDER_VARIANT.to_string(), "eucalyptus".to_string()),
                (ENV_REGION.to_string(), "cluster01".to_string()),
                (
                    ENV_ENDPOINT.to_string(),
                    "https://cloud.example.com:8773".to_string(),
                ),
            ]
            .into_iter()
            .collect(),
        });

        let cfg = Config::from_env(&ctx);
        assert_eq!(cfg.variant, ProviderVariant::Eucalyptus);
        assert_eq!(cfg.region.as_deref(), Some("cluster01"));
        assert!(cfg.endpoint.is_some());
    }

    #[test]
    fn test_http_send_honors_proxy() {
        let direct = Config::new(ProviderVariant::Aws);
        assert!(direct.http_send().is_ok());

        let proxied = Config::new(ProviderVariant::Aws).with_proxy("proxy.internal", 3128);
        assert!(proxied.http_send().is_ok());

        // An unusable proxy address surfaces at construction, not send time.
        let broken = Config::new(ProviderVariant::Aws).with_proxy("not a host", 3128);
        assert!(broken.http_send().is_err());
    }
}
