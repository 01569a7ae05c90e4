//! Request descriptors and the signing workspace derived from them.

use std::mem;
use std::str::FromStr;

use bytes::Bytes;
use http::header::HeaderName;
use http::uri::Authority;
use http::uri::PathAndQuery;
use http::uri::Scheme;
use http::HeaderMap;
use http::HeaderValue;
use http::Method;
use http::Uri;

use crate::encode::encode;
use crate::variant::SigningScheme;
use crate::{Error, Result};

/// The body a request carries.
#[derive(Debug, Clone, Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// A textual body (XML or JSON payload).
    Text {
        /// The payload.
        content: String,
        /// The declared content type.
        content_type: String,
    },
    /// A raw binary upload.
    Binary {
        /// The payload.
        content: Bytes,
        /// The declared content type.
        content_type: String,
    },
}

impl Body {
    /// The body as bytes; empty for [`Body::Empty`].
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Body::Empty => Bytes::new(),
            Body::Text { content, .. } => Bytes::copy_from_slice(content.as_bytes()),
            Body::Binary { content, .. } => content.clone(),
        }
    }

    /// The declared content type, if any.
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Body::Empty => None,
            Body::Text { content_type, .. } | Body::Binary { content_type, .. } => {
                Some(content_type)
            }
        }
    }
}

/// A description of one service call, built by a collaborator and handed to
/// the invoker.
///
/// Mutated only through the builder methods; once signing starts the
/// descriptor is read-only.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    service: String,
    region: Option<String>,
    path: String,
    params: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Body,
}

impl RequestDescriptor {
    /// Start a descriptor for one call to `service`.
    pub fn new(method: Method, service: impl Into<String>) -> Self {
        Self {
            method,
            service: service.into(),
            region: None,
            path: "/".to_string(),
            params: Vec::new(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    /// Override the client's region for this call.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the request path. Segments are kept as given; they are encoded
    /// during canonicalization.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        self
    }

    /// Append one path segment.
    pub fn push_path_segment(mut self, segment: &str) -> Self {
        if !self.path.ends_with('/') {
            self.path.push('/');
        }
        self.path.push_str(segment);
        self
    }

    /// Set a query parameter. Keys are unique; setting an existing key
    /// replaces its value.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_param(key, value);
        self
    }

    /// Replace or insert a query parameter in place.
    ///
    /// The pagination driver uses this to inject continuation markers.
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.params.push((key, value)),
        }
    }

    /// Set a header. Names fold case-insensitively; setting an existing
    /// name replaces its value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Attach a body.
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// The HTTP verb.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target service id.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The per-call region override, if any.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// The request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Materialize the descriptor against a resolved endpoint.
    ///
    /// Returns request parts plus the body bytes, ready for signing. Query
    /// parameters and path are percent-encoded here, so the signer observes
    /// exactly what goes on the wire.
    pub fn to_http_parts(&self, endpoint: &Uri) -> Result<(http::request::Parts, Bytes)> {
        let scheme = endpoint.scheme().cloned().unwrap_or(Scheme::HTTPS);
        let authority = endpoint
            .authority()
            .cloned()
            .ok_or_else(|| Error::request_construction("endpoint has no host"))?;

        let base_path = endpoint.path().trim_end_matches('/');
        let mut paq = format!("{}{}", base_path, encode(&self.path, true));
        if !self.params.is_empty() {
            paq.push('?');
            for (i, (k, v)) in self.params.iter().enumerate() {
                if i > 0 {
                    paq.push('&');
                }
                paq.push_str(&encode(k, false));
                if !v.is_empty() {
                    paq.push('=');
                    paq.push_str(&encode(v, false));
                }
            }
        }

        let uri = Uri::builder()
            .scheme(scheme)
            .authority(authority)
            .path_and_query(paq)
            .build()?;

        let mut builder = http::Request::builder().method(self.method.clone()).uri(uri);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ct) = self.body.content_type() {
            builder = builder.header(http::header::CONTENT_TYPE, ct);
        }

        let body = self.body.to_bytes();
        let (parts, _) = builder.body(())?.into_parts();
        Ok((parts, body))
    }
}

/// A fully signed request, ready for transmission.
///
/// Signing is the last transformation before the wire: nothing may change
/// on the request after this wrapper is produced.
#[derive(Debug)]
pub struct SignedRequest {
    request: http::Request<Bytes>,
    scheme: SigningScheme,
}

impl SignedRequest {
    pub(crate) fn new(request: http::Request<Bytes>, scheme: SigningScheme) -> Self {
        Self { request, scheme }
    }

    /// The scheme this request was signed under.
    pub fn scheme(&self) -> SigningScheme {
        self.scheme
    }

    /// Borrow the underlying request.
    pub fn request(&self) -> &http::Request<Bytes> {
        &self.request
    }

    /// Consume the wrapper, yielding the transmittable request.
    pub fn into_request(self) -> http::Request<Bytes> {
        self.request
    }
}

/// Signing workspace for a request.
///
/// Derived from request parts, canonicalized in place by a signer, then
/// applied back. The same parts always yield the same workspace, which is
/// what makes the canonical form reproducible byte for byte.
#[derive(Debug)]
pub struct SigningRequest {
    /// HTTP method.
    pub method: Method,
    /// HTTP scheme.
    pub scheme: Scheme,
    /// HTTP authority.
    pub authority: Authority,
    /// HTTP path.
    pub path: String,
    /// HTTP query parameters.
    pub query: Vec<(String, String)>,
    /// HTTP headers.
    pub headers: HeaderMap,
}

impl SigningRequest {
    /// Build a signing workspace from http::request::Parts.
    pub fn build(parts: &mut http::request::Parts) -> Result<Self> {
        let uri = mem::take(&mut parts.uri).into_parts();
        let paq = uri
            .path_and_query
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        Ok(SigningRequest {
            method: parts.method.clone(),
            scheme: uri.scheme.unwrap_or(Scheme::HTTPS),
            authority: uri.authority.ok_or_else(|| {
                Error::request_construction("request without authority is invalid for signing")
            })?,
            path: paq.path().to_string(),
            query: paq
                .query()
                .map(|v| {
                    form_urlencoded::parse(v.as_bytes())
                        .map(|(k, v)| (k.into_owned(), v.into_owned()))
                        .collect()
                })
                .unwrap_or_default(),

            // Take the headers out of the request to avoid copy.
            // We will return it back when apply the workspace.
            headers: mem::take(&mut parts.headers),
        })
    }

    /// Apply the signing workspace back to http::request::Parts.
    pub fn apply(mut self, parts: &mut http::request::Parts) -> Result<()> {
        let query_size = self
            .query
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum::<usize>();

        // Return headers back.
        mem::swap(&mut parts.headers, &mut self.headers);
        parts.method = self.method;
        parts.uri = {
            let mut uri_parts = mem::take(&mut parts.uri).into_parts();
            uri_parts.scheme = Some(self.scheme);
            uri_parts.authority = Some(self.authority);
            uri_parts.path_and_query = {
                let paq = if query_size == 0 {
                    self.path
                } else {
                    let mut s = self.path;
                    s.reserve(query_size + 1);

                    s.push('?');
                    for (i, (k, v)) in self.query.iter().enumerate() {
                        if i > 0 {
                            s.push('&');
                        }

                        s.push_str(k);
                        if !v.is_empty() {
                            s.push('=');
                            s.push_str(v);
                        }
                    }

                    s
                };

                Some(PathAndQuery::from_str(&paq)?)
            };
            Uri::from_parts(uri_parts)?
        };

        Ok(())
    }

    /// Push a new query pair into the query list.
    #[inline]
    pub fn query_push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }

    /// Get header value by name.
    ///
    /// Returns empty string if header not found.
    #[inline]
    pub fn header_get_or_default(&self, key: &HeaderName) -> Result<&str> {
        match self.headers.get(key) {
            Some(v) => Ok(v.to_str()?),
            None => Ok(""),
        }
    }

    /// Normalize a header value: trim surrounding spaces and collapse
    /// internal runs of whitespace to single spaces, as the canonical
    /// header form requires.
    pub fn header_value_normalize(v: &mut HeaderValue) {
        let s = String::from_utf8_lossy(v.as_bytes()).to_string();
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");

        // This can't fail because we started with a valid HeaderValue and
        // only removed whitespace.
        *v = HeaderValue::from_bytes(normalized.as_bytes()).expect("invalid header value")
    }

    /// Get header names as a sorted vector of lowercase names.
    pub fn header_name_to_vec_sorted(&self) -> Vec<&str> {
        let mut h = self
            .headers
            .keys()
            .map(|k| k.as_str())
            .collect::<Vec<&str>>();
        h.sort_unstable();

        h
    }

    /// Get headers whose name starts with `prefix`, lowercased.
    pub fn header_to_vec_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter(|(k, _)| k.as_str().starts_with(prefix))
            .map(|(k, v)| {
                (
                    k.as_str().to_lowercase(),
                    v.to_str().expect("must be valid header").to_string(),
                )
            })
            .collect()
    }

    /// Convert sorted headers to string.
    ///
    /// ```shell
    /// [(a, b), (c, d)] => "a:b\nc:d"
    /// ```
    pub fn header_to_string(mut headers: Vec<(String, String)>, sep: &str, join: &str) -> String {
        let mut s = String::with_capacity(16);

        // Sort via header name.
        headers.sort();

        for (idx, (k, v)) in headers.into_iter().enumerate() {
            if idx != 0 {
                s.push_str(join);
            }

            s.push_str(&k);
            s.push_str(sep);
            s.push_str(&v);
        }

        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_keys_unique() {
        let desc = RequestDescriptor::new(Method::GET, "ec2")
            .with_param("Action", "DescribeInstances")
            .with_param("Action", "DescribeRegions");

        let (parts, _) = desc
            .to_http_parts(&Uri::from_static("https://ec2.us-east-1.amazonaws.com"))
            .unwrap();
        assert_eq!(parts.uri.query(), Some("Action=DescribeRegions"));
    }

    #[test]
    fn test_header_names_fold() {
        let desc = RequestDescriptor::new(Method::GET, "ec2")
            .with_header("X-Custom", "a")
            .with_header("x-custom", "b");

        let (parts, _) = desc
            .to_http_parts(&Uri::from_static("https://ec2.us-east-1.amazonaws.com"))
            .unwrap();
        assert_eq!(parts.headers.get("x-custom").unwrap(), "b");
        assert_eq!(parts.headers.len(), 1);
    }

    #[test]
    fn test_params_are_encoded() {
        let desc = RequestDescriptor::new(Method::GET, "ec2")
            .with_param("Timestamp", "2015-01-01T00:00:00Z");

        let (parts, _) = desc
            .to_http_parts(&Uri::from_static("https://ec2.us-east-1.amazonaws.com"))
            .unwrap();
        assert_eq!(
            parts.uri.query(),
            Some("Timestamp=2015-01-01T00%3A00%3A00Z")
        );
    }

    #[test]
    fn test_endpoint_base_path_is_kept() {
        let desc = RequestDescriptor::new(Method::GET, "ec2");
        let (parts, _) = desc
            .to_http_parts(&Uri::from_static("https://cloud.example.com/Eucalyptus"))
            .unwrap();
        assert_eq!(parts.uri.path(), "/Eucalyptus/");
    }

    #[test]
    fn test_header_value_normalize_collapses_whitespace() {
        let mut v = HeaderValue::from_static("  a   b\t c  ");
        SigningRequest::header_value_normalize(&mut v);
        assert_eq!(v, "a b c");
    }
}
