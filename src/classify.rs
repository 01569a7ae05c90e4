//! Error classification: (HTTP status, provider error code) to the closed
//! error taxonomy.
//!
//! Matching is typed and happens up front, so callers branch on an
//! [`ErrorKind`] instead of catching and re-parsing message strings.

use http::StatusCode;

use crate::response::ParsedResponse;
use crate::{Error, ErrorKind};

/// Codes that mean the caller's identity or entitlement was rejected.
/// Capability probes map these to "not entitled" instead of failing.
const UNAUTHENTICATED_CODES: &[&str] = &[
    "AuthFailure",
    "SignatureDoesNotMatch",
    "InvalidClientTokenId",
    "OptInRequired",
    "SubscriptionCheckFailed",
];

/// Code prefixes that mean the addressed resource does not exist.
const NOT_FOUND_PREFIXES: &[&str] = &[
    "InvalidZone",
    "DBInstanceNotFound",
    "NoSuchDomain",
    "NoSuchBucket",
];

/// Codes raised by idempotent creates hitting an existing resource.
const ALREADY_EXISTS_CODES: &[&str] = &[
    "BucketAlreadyOwnedByYou",
    "DBSecurityGroupAlreadyExists",
    "AuthorizationAlreadyExists",
];

/// Codes that signal throttling; retried like any other transient fault.
const THROTTLING_CODES: &[&str] = &["Throttling", "RequestLimitExceeded", "SlowDown"];

/// Classify a service failure into the closed taxonomy.
pub fn classify(status: StatusCode, provider_code: Option<&str>) -> ErrorKind {
    if matches!(
        status,
        StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE
    ) {
        return ErrorKind::Transient;
    }

    if let Some(code) = provider_code {
        if THROTTLING_CODES.contains(&code) {
            return ErrorKind::Transient;
        }
        if ALREADY_EXISTS_CODES.contains(&code) {
            return ErrorKind::AlreadyExists;
        }
        if UNAUTHENTICATED_CODES.contains(&code) {
            return ErrorKind::Unauthenticated;
        }
        if NOT_FOUND_PREFIXES.iter().any(|p| code.starts_with(p)) || code.ends_with(".NotFound") {
            return ErrorKind::NotFound;
        }
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Unauthenticated,
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::CONFLICT => ErrorKind::AlreadyExists,
        _ => ErrorKind::Permanent,
    }
}

/// Build a classified [`Error`] from a parsed non-2xx response.
///
/// Understands both AWS error body shapes, `<ErrorResponse><Error>...` and
/// `<Response><Errors><Error>...`, plus the JSON `__type`/`message` shape.
pub fn error_from_response(resp: &ParsedResponse) -> Error {
    let (code, message, request_id) = extract_error_fields(resp);

    let kind = classify(resp.status(), code.as_deref());
    let mut err = Error::new(
        kind,
        message.unwrap_or_else(|| format!("service returned {}", resp.status())),
    )
    .with_status(resp.status());

    if let Some(code) = code {
        err = err.with_provider_code(code);
    }
    if let Some(id) = request_id {
        err = err.with_request_id(id);
    }
    err
}

fn extract_error_fields(
    resp: &ParsedResponse,
) -> (Option<String>, Option<String>, Option<String>) {
    if let Some(json) = resp.json() {
        let code = json
            .get("__type")
            .or_else(|| json.get("code"))
            .and_then(|v| v.as_str())
            // "namespace#Code" keeps only the code.
            .map(|s| s.rsplit('#').next().unwrap_or(s).to_string());
        let message = json
            .get("message")
            .or_else(|| json.get("Message"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        return (code, message, None);
    }

    let code = resp.text_of("Code").map(str::to_string);
    let message = resp.text_of("Message").map(str::to_string);
    let request_id = resp
        .text_of("RequestId")
        .or_else(|| resp.text_of("RequestID"))
        .map(str::to_string);
    (code, message, request_id)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::HeaderMap;
    use test_case::test_case;

    use super::*;

    #[test_case(StatusCode::INTERNAL_SERVER_ERROR, None => ErrorKind::Transient)]
    #[test_case(StatusCode::SERVICE_UNAVAILABLE, None => ErrorKind::Transient)]
    #[test_case(StatusCode::BAD_REQUEST, Some("Throttling") => ErrorKind::Transient)]
    #[test_case(StatusCode::FORBIDDEN, None => ErrorKind::Unauthenticated)]
    #[test_case(StatusCode::UNAUTHORIZED, None => ErrorKind::Unauthenticated)]
    #[test_case(StatusCode::BAD_REQUEST, Some("AuthFailure") => ErrorKind::Unauthenticated)]
    #[test_case(StatusCode::BAD_REQUEST, Some("OptInRequired") => ErrorKind::Unauthenticated)]
    #[test_case(StatusCode::NOT_FOUND, None => ErrorKind::NotFound)]
    #[test_case(StatusCode::BAD_REQUEST, Some("DBInstanceNotFound") => ErrorKind::NotFound)]
    #[test_case(StatusCode::BAD_REQUEST, Some("InvalidZone.NotFound") => ErrorKind::NotFound)]
    #[test_case(StatusCode::BAD_REQUEST, Some("NoSuchBucket") => ErrorKind::NotFound)]
    #[test_case(StatusCode::BAD_REQUEST, Some("InvalidAMIID.NotFound") => ErrorKind::NotFound)]
    #[test_case(StatusCode::CONFLICT, Some("BucketAlreadyOwnedByYou") => ErrorKind::AlreadyExists)]
    #[test_case(StatusCode::BAD_REQUEST, Some("AuthorizationAlreadyExists") => ErrorKind::AlreadyExists)]
    #[test_case(StatusCode::BAD_REQUEST, Some("InvalidParameterValue") => ErrorKind::Permanent)]
    fn test_classify(status: StatusCode, code: Option<&str>) -> ErrorKind {
        classify(status, code)
    }

    #[test]
    fn test_error_from_xml_response() {
        let body = br#"<ErrorResponse>
            <Error>
              <Code>DBInstanceNotFound</Code>
              <Message>DBInstance db-1 not found.</Message>
            </Error>
            <RequestId>req-123</RequestId>
        </ErrorResponse>"#;
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, "text/xml".parse().unwrap());
        let resp = ParsedResponse::parse(
            StatusCode::NOT_FOUND,
            headers,
            &Bytes::from_static(body),
        )
        .unwrap();

        let err = error_from_response(&resp);
        assert!(err.is_not_found());
        assert_eq!(err.provider_code(), Some("DBInstanceNotFound"));
        assert_eq!(err.request_id(), Some("req-123"));
        assert_eq!(err.to_string(), "DBInstance db-1 not found.");
    }

    #[test]
    fn test_error_from_legacy_xml_shape() {
        let body = br#"<Response>
            <Errors><Error><Code>AuthFailure</Code><Message>no</Message></Error></Errors>
            <RequestID>req-9</RequestID>
        </Response>"#;
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, "text/xml".parse().unwrap());
        let resp = ParsedResponse::parse(
            StatusCode::UNAUTHORIZED,
            headers,
            &Bytes::from_static(body),
        )
        .unwrap();

        let err = error_from_response(&resp);
        assert!(err.is_unauthenticated());
        assert_eq!(err.request_id(), Some("req-9"));
    }

    #[test]
    fn test_error_from_json_response() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            "application/json".parse().unwrap(),
        );
        let resp = ParsedResponse::parse(
            StatusCode::BAD_REQUEST,
            headers,
            &Bytes::from_static(
                br#"{"__type":"com.amazonaws#ThrottlingException","message":"slow down"}"#,
            ),
        )
        .unwrap();

        let err = error_from_response(&resp);
        assert_eq!(err.provider_code(), Some("ThrottlingException"));
        assert_eq!(err.to_string(), "slow down");
    }
}
