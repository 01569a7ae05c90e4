//! The method invoker: endpoint resolution, signing, transmission, retry.

use std::sync::Arc;

use bytes::Bytes;
use http::header;
use http::HeaderValue;
use http::StatusCode;
use http::Uri;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio::time::Duration;
use tokio::time::Instant;

use crate::classify::error_from_response;
use crate::config::Config;
use crate::paginate::Paginator;
use crate::request::{RequestDescriptor, SignedRequest};
use crate::response::ParsedResponse;
use crate::sign::Signer;
use crate::time::{format_iso8601, now};
use crate::variant::SigningScheme;
use crate::{Context, Error, Result};

/// Attempt budget and inter-attempt delay for one class of call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Budget for read-style calls.
    pub fn read() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
        }
    }

    /// Budget for tag writes, which race eventual consistency after a
    /// create and need a much longer runway.
    pub fn tag_write() -> Self {
        Self {
            max_attempts: 20,
            delay: Duration::from_secs(10),
        }
    }

    /// Budget for teardown calls.
    pub fn teardown() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(10),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::read()
    }
}

/// Invoker executes one described call end to end: resolve the endpoint,
/// sign, transmit, classify the outcome and retry transient failures.
///
/// Cloning is cheap; clones share the config and the signer's cached
/// credential.
#[derive(Debug, Clone)]
pub struct Invoker {
    ctx: Context,
    config: Arc<Config>,
    signer: Signer,
    retry: RetryPolicy,
}

impl Invoker {
    /// Create an invoker with the default read retry budget.
    pub fn new(ctx: Context, config: Config, signer: Signer) -> Self {
        Self {
            ctx,
            config: Arc::new(config),
            signer,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry budget.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The configuration this invoker was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn effective_region<'a>(&'a self, desc: &'a RequestDescriptor) -> Option<&'a str> {
        desc.region().or(self.config.region.as_deref())
    }

    fn resolve_endpoint(&self, desc: &RequestDescriptor) -> Result<Uri> {
        self.config.variant.endpoint(
            desc.service(),
            self.effective_region(desc),
            self.config.endpoint.as_deref(),
        )
    }

    /// Materialize the descriptor and stamp the request date.
    ///
    /// V4 signing requires a date header and refuses to invent one; since
    /// parts are rebuilt here for every attempt, a descriptor without an
    /// explicit date gets a fresh timestamp on each retry.
    fn build_parts(
        &self,
        desc: &RequestDescriptor,
        endpoint: &Uri,
    ) -> Result<(http::request::Parts, Bytes)> {
        let (mut parts, body) = desc.to_http_parts(endpoint)?;
        if self.config.variant.signing_scheme(desc.service()) == SigningScheme::V4
            && !parts.headers.contains_key("x-amz-date")
            && !parts.headers.contains_key(header::DATE)
        {
            parts
                .headers
                .insert("x-amz-date", HeaderValue::try_from(format_iso8601(now()))?);
        }
        Ok((parts, body))
    }

    /// Materialize and sign the descriptor without transmitting it.
    ///
    /// The returned request is final; callers hand it to their own
    /// transport verbatim.
    pub async fn sign(&self, desc: &RequestDescriptor) -> Result<SignedRequest> {
        let endpoint = self.resolve_endpoint(desc)?;
        let (mut parts, body) = self.build_parts(desc, &endpoint)?;
        let scheme = self
            .signer
            .sign_parts(
                desc.service(),
                self.effective_region(desc),
                &mut parts,
                &body,
            )
            .await?;
        Ok(SignedRequest::new(
            http::Request::from_parts(parts, body),
            scheme,
        ))
    }

    /// Execute the call, retrying transient failures up to the budget.
    pub async fn invoke(&self, desc: &RequestDescriptor) -> Result<ParsedResponse> {
        self.invoke_inner(desc, None).await
    }

    /// Execute the call, giving up once a retry would cross `deadline`.
    ///
    /// The in-flight attempt is not interrupted; the deadline is checked
    /// before each retry sleep.
    pub async fn invoke_with_deadline(
        &self,
        desc: &RequestDescriptor,
        deadline: Instant,
    ) -> Result<ParsedResponse> {
        self.invoke_inner(desc, Some(deadline)).await
    }

    /// Execute the call on a background task with the tag-write budget.
    ///
    /// Used for best-effort writes the caller does not wait on; failures
    /// are logged, not returned. Abort the handle to cancel pending
    /// retries.
    pub fn invoke_detached(&self, desc: RequestDescriptor) -> JoinHandle<()> {
        let invoker = self.clone().with_retry_policy(RetryPolicy::tag_write());
        tokio::spawn(async move {
            if let Err(err) = invoker.invoke(&desc).await {
                log::warn!(
                    "detached {} call to `{}` failed: {err}",
                    desc.method(),
                    desc.service()
                );
            }
        })
    }

    /// Drive a marker-paginated listing built from this descriptor.
    pub fn paginate<T, F, M>(
        &self,
        desc: RequestDescriptor,
        marker_param: impl Into<String>,
        extract_items: F,
        extract_marker: M,
    ) -> Paginator<T, F, M>
    where
        F: Fn(&ParsedResponse) -> Vec<T>,
        M: Fn(&ParsedResponse) -> Option<String>,
    {
        Paginator::new(
            self.clone(),
            desc,
            marker_param.into(),
            extract_items,
            extract_marker,
        )
    }

    async fn invoke_inner(
        &self,
        desc: &RequestDescriptor,
        deadline: Option<Instant>,
    ) -> Result<ParsedResponse> {
        let mut endpoint = self.resolve_endpoint(desc)?;
        let mut redirected = false;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            // Re-sign from the descriptor every attempt so the signature
            // carries a fresh timestamp.
            let (mut parts, body) = self.build_parts(desc, &endpoint)?;
            self.signer
                .sign_parts(
                    desc.service(),
                    self.effective_region(desc),
                    &mut parts,
                    &body,
                )
                .await?;
            let req = http::Request::from_parts(parts, body);

            let resp = match self.ctx.http_send(req).await {
                Ok(resp) => resp,
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    log::warn!(
                        "attempt {attempt} to `{}` failed in transport: {err}",
                        desc.service()
                    );
                    self.backoff(deadline, err).await?;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let (parts, body) = resp.into_parts();
            match parts.status {
                StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => {
                    return ParsedResponse::parse(parts.status, parts.headers, &body);
                }
                StatusCode::NO_CONTENT => {
                    return Ok(ParsedResponse::empty(parts.status, parts.headers));
                }
                StatusCode::TEMPORARY_REDIRECT => {
                    if redirected {
                        return Err(Error::permanent(format!(
                            "`{}` redirected twice, refusing to follow",
                            desc.service()
                        ))
                        .with_status(parts.status));
                    }
                    endpoint = redirect_target(&parts.headers, &body)?;
                    log::debug!("`{}` redirected to {endpoint}", desc.service());
                    redirected = true;
                    // A redirect is not a failed attempt.
                    attempt -= 1;
                }
                status => {
                    let parsed = ParsedResponse::parse(status, parts.headers.clone(), &body)
                        .unwrap_or_else(|_| ParsedResponse::empty(status, parts.headers));
                    let err = error_from_response(&parsed);
                    if err.is_transient() && attempt < self.retry.max_attempts {
                        log::warn!(
                            "attempt {attempt} to `{}` failed with {status}: {err}",
                            desc.service()
                        );
                        self.backoff(deadline, err).await?;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Sleep before the next attempt, unless that would cross the deadline.
    async fn backoff(&self, deadline: Option<Instant>, err: Error) -> Result<()> {
        if let Some(deadline) = deadline {
            if Instant::now() + self.retry.delay >= deadline {
                return Err(err);
            }
        }
        sleep(self.retry.delay).await;
        Ok(())
    }
}

/// Extract the replacement endpoint from a 307 response.
///
/// Storage services put the bare host in an `<Endpoint>` element; fall back
/// to the Location header.
fn redirect_target(headers: &http::HeaderMap, body: &Bytes) -> Result<Uri> {
    if let Ok(parsed) = ParsedResponse::parse(StatusCode::TEMPORARY_REDIRECT, headers.clone(), body)
    {
        if let Some(host) = parsed.text_of("Endpoint") {
            let url = if host.contains("://") {
                host.to_string()
            } else {
                format!("https://{host}")
            };
            return url.parse().map_err(Error::from);
        }
    }

    if let Some(location) = headers.get(http::header::LOCATION) {
        return location.to_str()?.parse().map_err(Error::from);
    }

    Err(Error::malformed_response(
        "redirect response names no endpoint",
    ))
}
