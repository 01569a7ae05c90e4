//! AWS Signature Version 4.

use std::fmt::Write;

use async_trait::async_trait;
use http::header;
use http::HeaderValue;
use log::debug;
use percent_encoding::percent_decode_str;
use percent_encoding::utf8_percent_encode;

use crate::credential::Credential;
use crate::encode::encode;
use crate::encode::URI_ENCODE_SET;
use crate::hash::{hex_hmac_sha256, hex_sha256, hmac_sha256};
use crate::request::SigningRequest;
use crate::sign::SignRequest;
use crate::time::{format_date, format_iso8601, parse_http_date, parse_iso8601, DateTime};
use crate::{Context, Error, Result};

/// Header carrying the 16-character request date.
const X_AMZ_DATE: &str = "x-amz-date";

/// V4Signer implements AWS Signature Version 4, header form.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
#[derive(Debug)]
pub struct V4Signer {
    service: String,
    region: String,

    time: Option<DateTime>,
}

impl V4Signer {
    /// Create a V4 signer bound to one service and region.
    pub fn new(service: &str, region: &str) -> Self {
        Self {
            service: service.into(),
            region: region.into(),

            time: None,
        }
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

    /// Determine the request date.
    ///
    /// A present `x-amz-date` header must be a valid 16-character timestamp;
    /// failing that, an RFC1123 `date` header is parsed and reformatted.
    /// With neither present the request is rejected before any network
    /// call; stamping a date onto the request is the invoker's job, done
    /// per attempt so retries never replay a stale timestamp.
    fn resolve_date(&self, ctx: &mut SigningRequest) -> Result<DateTime> {
        if let Some(v) = ctx.headers.get(X_AMZ_DATE) {
            return parse_iso8601(v.to_str()?);
        }

        if let Some(v) = ctx.headers.get(header::DATE) {
            let t = parse_http_date(v.to_str()?)?;
            ctx.headers
                .insert(X_AMZ_DATE, HeaderValue::try_from(format_iso8601(t))?);
            return Ok(t);
        }

        let Some(t) = self.time else {
            return Err(Error::auth_config("request carries no date header to sign"));
        };
        ctx.headers
            .insert(X_AMZ_DATE, HeaderValue::try_from(format_iso8601(t))?);
        Ok(t)
    }
}

#[async_trait]
impl SignRequest for V4Signer {
    async fn sign_request(
        &self,
        _: &Context,
        parts: &mut http::request::Parts,
        body: &[u8],
        cred: &Credential,
    ) -> Result<()> {
        let mut ctx = SigningRequest::build(parts)?;

        // Header names and values need to be normalized according to Step 4
        // of https://docs.aws.amazon.com/general/latest/gr/sigv4-create-canonical-request.html
        for (_, value) in ctx.headers.iter_mut() {
            SigningRequest::header_value_normalize(value)
        }

        // Insert HOST header if not present.
        if ctx.headers.get(header::HOST).is_none() {
            ctx.headers
                .insert(header::HOST, ctx.authority.as_str().parse()?);
        }

        let now = self.resolve_date(&mut ctx)?;

        canonicalize_query(&mut ctx);

        // Build canonical request and string to sign.
        let creq = canonical_request_string(&ctx, body)?;
        let encoded_req = hex_sha256(creq.as_bytes());
        debug!("calculated canonical request: {creq}");

        // Scope: "20220313/<region>/<service>/aws4_request"
        let scope = format!(
            "{}/{}/{}/aws4_request",
            format_date(now),
            self.region,
            self.service
        );
        debug!("calculated scope: {scope}");

        // StringToSign:
        //
        // AWS4-HMAC-SHA256
        // 20220313T072004Z
        // 20220313/<region>/<service>/aws4_request
        // <hashed_canonical_request>
        let mut string_to_sign = String::new();
        writeln!(string_to_sign, "AWS4-HMAC-SHA256")?;
        writeln!(string_to_sign, "{}", format_iso8601(now))?;
        writeln!(string_to_sign, "{}", &scope)?;
        write!(string_to_sign, "{}", &encoded_req)?;
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key =
            generate_signing_key(&cred.secret_access_key, now, &self.region, &self.service);
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let mut authorization = HeaderValue::from_str(&format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            cred.access_key_id,
            scope,
            ctx.header_name_to_vec_sorted().join(";"),
            signature
        ))?;
        authorization.set_sensitive(true);

        ctx.headers.insert(header::AUTHORIZATION, authorization);

        // Apply to the request.
        ctx.apply(parts)
    }
}

/// Percent-encode both halves of every query pair, then sort by encoded key
/// and encoded value. The canonical query string is therefore invariant
/// under permutation of the input parameter order.
fn canonicalize_query(ctx: &mut SigningRequest) {
    let mut query = ctx
        .query
        .iter()
        .map(|(k, v)| (encode(k, false), encode(v, false)))
        .collect::<Vec<_>>();
    query.sort();

    ctx.query = query;
}

fn canonical_request_string(ctx: &SigningRequest, body: &[u8]) -> Result<String> {
    // 256 is specially chosen to avoid reallocation for most requests.
    let mut f = String::with_capacity(256);

    // Insert method
    writeln!(f, "{}", ctx.method)?;
    // Insert encoded path
    let path = percent_decode_str(&ctx.path)
        .decode_utf8()
        .map_err(|e| Error::request_construction("failed to decode path").with_source(e))?;
    writeln!(f, "{}", utf8_percent_encode(&path, &URI_ENCODE_SET))?;
    // Insert query
    writeln!(
        f,
        "{}",
        ctx.query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    )?;
    // Insert canonical headers, sorted by name.
    let signed_headers = ctx.header_name_to_vec_sorted();
    for name in signed_headers.iter() {
        let value = ctx.headers[*name].to_str()?;
        writeln!(f, "{name}:{value}")?;
    }
    writeln!(f)?;
    writeln!(f, "{}", signed_headers.join(";"))?;

    // Payload hash: the body that will be transmitted, or the hash of the
    // empty string for bodiless requests.
    write!(f, "{}", hex_sha256(body))?;

    Ok(f)
}

/// Derive the scope-bound signing key.
///
/// Four nested HMAC applications; recomputed for every request so a changed
/// date, region or service can never reuse a stale key.
fn generate_signing_key(secret: &str, time: DateTime, region: &str, service: &str) -> Vec<u8> {
    // Sign secret
    let secret = format!("AWS4{secret}");
    // Sign date
    let sign_date = hmac_sha256(secret.as_bytes(), format_date(time).as_bytes());
    // Sign region
    let sign_region = hmac_sha256(sign_date.as_slice(), region.as_bytes());
    // Sign service
    let sign_service = hmac_sha256(sign_region.as_slice(), service.as_bytes());
    // Sign request
    hmac_sha256(sign_service.as_slice(), "aws4_request".as_bytes())
}
