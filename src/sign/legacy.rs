//! Legacy HMAC signing: the query form used by the older Query APIs and the
//! header form used by the storage and CDN REST APIs.

use async_trait::async_trait;
use http::header;
use http::HeaderValue;
use log::debug;

use crate::credential::Credential;
use crate::encode::encode;
use crate::hash::{base64_hmac_sha1, base64_hmac_sha256};
use crate::request::SigningRequest;
use crate::sign::SignRequest;
use crate::time::{format_http_date, format_timestamp, now, DateTime};
use crate::variant::ProviderVariant;
use crate::{Context, Result};

/// QuerySigner implements the legacy HMAC-SHA256 query scheme
/// (SignatureVersion 2).
///
/// The signature is carried as a `Signature` query parameter next to the
/// common parameters the scheme requires.
#[derive(Debug, Default)]
pub struct QuerySigner {
    time: Option<DateTime>,
}

impl QuerySigner {
    /// Create a query signer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    #[cfg(test)]
    pub(crate) fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }
}

#[async_trait]
impl SignRequest for QuerySigner {
    async fn sign_request(
        &self,
        _: &Context,
        parts: &mut http::request::Parts,
        _body: &[u8],
        cred: &Credential,
    ) -> Result<()> {
        let now = self.time.unwrap_or_else(now);
        let mut ctx = SigningRequest::build(parts)?;

        // Common parameters of the scheme. Timestamp is taken fresh on
        // every call, so a rebuilt retry never replays an old one.
        ctx.query_push("AWSAccessKeyId", &cred.access_key_id);
        ctx.query_push("SignatureVersion", "2");
        ctx.query_push("SignatureMethod", "HmacSHA256");
        ctx.query_push("Timestamp", format_timestamp(now));

        // Encode both halves, then sort lexicographically by encoded key.
        let mut query = ctx
            .query
            .iter()
            .map(|(k, v)| (encode(k, false), encode(v, false)))
            .collect::<Vec<_>>();
        query.sort();

        let canonical_query = query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        // METHOD
        // lowercase host
        // encoded path (default "/")
        // sorted key=value pairs
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ctx.method,
            ctx.authority.as_str().to_lowercase(),
            encode_path_or_root(&ctx.path),
            canonical_query
        );
        debug!("calculated string to sign: {string_to_sign}");

        let signature =
            base64_hmac_sha256(cred.secret_access_key.as_bytes(), string_to_sign.as_bytes());

        query.push(("Signature".to_string(), encode(&signature, false)));
        ctx.query = query;

        ctx.apply(parts)
    }
}

fn encode_path_or_root(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        encode(path, true)
    }
}

/// HeaderSigner implements the legacy HMAC-SHA1 REST scheme used by the
/// storage and CDN services.
///
/// The signature lands in the Authorization header with the variant's
/// prefix: `AWS {key}:{sig}` or `GOOG1 {key}:{sig}`.
#[derive(Debug)]
pub struct HeaderSigner {
    auth_prefix: &'static str,
    header_prefix: &'static str,
    service_path: Option<String>,

    time: Option<DateTime>,
}

impl HeaderSigner {
    /// Create a header signer for the given variant.
    pub fn new(variant: ProviderVariant) -> Self {
        let header_prefix = match variant {
            ProviderVariant::GoogleStorage => "x-goog-",
            _ => "x-amz-",
        };
        Self {
            auth_prefix: variant.auth_header_prefix(),
            header_prefix,
            service_path: None,
            time: None,
        }
    }

    /// Prepend a fixed service path to the canonical resource, for variants
    /// that route storage under a dispatcher path.
    pub fn with_service_path(mut self, path: impl Into<String>) -> Self {
        self.service_path = Some(path.into());
        self
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    #[cfg(test)]
    pub(crate) fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// The canonical resource: optional service path, then the bucket
    /// segment as given, then the object key lowercased.
    fn canonical_resource(&self, path: &str) -> String {
        let service_path = self.service_path.as_deref().unwrap_or("");

        let path = if path.is_empty() { "/" } else { path };
        let resource = match path[1..].find('/') {
            // "/bucket/Object/Key" - bucket keeps its case, the key folds.
            Some(idx) => {
                let (bucket, key) = path.split_at(idx + 1);
                format!("{}{}", bucket, key.to_lowercase())
            }
            None => path.to_string(),
        };

        format!("{service_path}{resource}")
    }
}

#[async_trait]
impl SignRequest for HeaderSigner {
    async fn sign_request(
        &self,
        _: &Context,
        parts: &mut http::request::Parts,
        _body: &[u8],
        cred: &Credential,
    ) -> Result<()> {
        let now = self.time.unwrap_or_else(now);
        let mut ctx = SigningRequest::build(parts)?;

        if ctx.headers.get(header::DATE).is_none() {
            ctx.headers
                .insert(header::DATE, HeaderValue::try_from(format_http_date(now))?);
        }

        let content_md5 = ctx.header_get_or_default(&"content-md5".parse()?)?.to_string();
        let content_type = ctx.header_get_or_default(&header::CONTENT_TYPE)?.to_string();

        // The date line goes empty when a scheme-prefixed date header is
        // signed instead.
        let date_header = format!("{}date", self.header_prefix);
        let date_line = if ctx.headers.contains_key(date_header.as_str()) {
            String::new()
        } else {
            ctx.header_get_or_default(&header::DATE)?.to_string()
        };

        let prefixed = ctx.header_to_vec_with_prefix(self.header_prefix);
        let mut canonical_headers = SigningRequest::header_to_string(prefixed, ":", "\n");
        if !canonical_headers.is_empty() {
            canonical_headers.push('\n');
        }

        // VERB
        // Content-MD5
        // Content-Type
        // Date
        // CanonicalizedHeaders
        // CanonicalizedResource
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}\n{}{}",
            ctx.method,
            content_md5,
            content_type,
            date_line,
            canonical_headers,
            self.canonical_resource(&ctx.path)
        );
        debug!("calculated string to sign: {string_to_sign}");

        let signature =
            base64_hmac_sha1(cred.secret_access_key.as_bytes(), string_to_sign.as_bytes());

        let mut authorization = HeaderValue::from_str(&format!(
            "{} {}:{}",
            self.auth_prefix, cred.access_key_id, signature
        ))?;
        authorization.set_sensitive(true);
        ctx.headers.insert(header::AUTHORIZATION, authorization);

        ctx.apply(parts)
    }
}
