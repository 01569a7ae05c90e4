//! End-to-end invoker behavior over a scripted transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use tokio::time::{Duration, Instant};

use cloudcall::{
    Config, Context, Error, HttpSend, Invoker, ProviderVariant, RequestDescriptor, Result,
    RetryPolicy, Signer, StaticCredentialProvider,
};

/// A transport that replays a scripted queue of responses and records every
/// request it sees.
#[derive(Debug, Clone, Default)]
struct ScriptedHttp {
    responses: Arc<Mutex<VecDeque<http::Response<Bytes>>>>,
    requests: Arc<Mutex<Vec<(Method, Uri, HeaderMap)>>>,
}

impl ScriptedHttp {
    fn push(&self, resp: http::Response<Bytes>) {
        self.responses.lock().unwrap().push_back(resp);
    }

    fn requests(&self) -> Vec<(Method, Uri, HeaderMap)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpSend for ScriptedHttp {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let (parts, _) = req.into_parts();
        self.requests
            .lock()
            .unwrap()
            .push((parts.method, parts.uri, parts.headers));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::unexpected("no scripted response left"))
    }
}

fn response(status: StatusCode, body: &str) -> http::Response<Bytes> {
    http::Response::builder()
        .status(status)
        .body(Bytes::copy_from_slice(body.as_bytes()))
        .unwrap()
}

fn service_error(status: StatusCode, code: &str) -> http::Response<Bytes> {
    response(
        status,
        &format!(
            "<ErrorResponse><Error><Code>{code}</Code><Message>{code}</Message></Error>\
             <RequestId>req-1</RequestId></ErrorResponse>"
        ),
    )
}

fn setup() -> (Invoker, ScriptedHttp) {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = ScriptedHttp::default();
    let ctx = Context::new().with_http_send(http.clone());
    let config = Config::new(ProviderVariant::Aws).with_region("us-east-1");
    let signer = Signer::new(
        ctx.clone(),
        config.variant,
        StaticCredentialProvider::new("AKIDEXAMPLE", "test-secret-key"),
    );
    let invoker = Invoker::new(ctx, config, signer).with_retry_policy(RetryPolicy {
        max_attempts: 5,
        delay: Duration::from_millis(1),
    });
    (invoker, http)
}

fn describe_regions() -> RequestDescriptor {
    RequestDescriptor::new(Method::GET, "ec2")
        .with_param("Action", "DescribeRegions")
        .with_param("Version", "2014-06-15")
}

#[tokio::test]
async fn test_success_after_transient_failures() {
    let (invoker, http) = setup();
    for _ in 0..4 {
        http.push(response(StatusCode::SERVICE_UNAVAILABLE, ""));
    }
    http.push(response(
        StatusCode::OK,
        "<DescribeRegionsResponse><requestId>ok</requestId></DescribeRegionsResponse>",
    ));

    let resp = invoker.invoke(&describe_regions()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text_of("requestId"), Some("ok"));
    assert_eq!(http.requests().len(), 5);
}

#[tokio::test]
async fn test_attempt_budget_exhausted() {
    let (invoker, http) = setup();
    for _ in 0..5 {
        http.push(response(StatusCode::SERVICE_UNAVAILABLE, ""));
    }

    let err = invoker.invoke(&describe_regions()).await.unwrap_err();
    assert!(err.is_transient());
    // The budget is five attempts; the scripted queue must be drained and
    // no sixth request sent.
    assert_eq!(http.requests().len(), 5);
}

#[tokio::test]
async fn test_each_attempt_is_signed() {
    let (invoker, http) = setup();
    http.push(response(StatusCode::SERVICE_UNAVAILABLE, ""));
    http.push(response(StatusCode::OK, "<R><ok>1</ok></R>"));

    invoker.invoke(&describe_regions()).await.unwrap();

    for (_, _, headers) in http.requests() {
        assert!(headers.contains_key("authorization"));
        assert!(headers.contains_key("x-amz-date"));
    }
}

#[tokio::test]
async fn test_redirect_followed_once() {
    let (invoker, http) = setup();
    http.push(response(
        StatusCode::TEMPORARY_REDIRECT,
        "<Error><Endpoint>ec2.eu-west-1.amazonaws.com</Endpoint></Error>",
    ));
    http.push(response(StatusCode::OK, "<R><ok>1</ok></R>"));

    let resp = invoker.invoke(&describe_regions()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let requests = http.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].1.host(), Some("ec2.us-east-1.amazonaws.com"));
    assert_eq!(requests[1].1.host(), Some("ec2.eu-west-1.amazonaws.com"));
}

#[tokio::test]
async fn test_second_redirect_refused() {
    let (invoker, http) = setup();
    http.push(response(
        StatusCode::TEMPORARY_REDIRECT,
        "<Error><Endpoint>a.example.com</Endpoint></Error>",
    ));
    http.push(response(
        StatusCode::TEMPORARY_REDIRECT,
        "<Error><Endpoint>b.example.com</Endpoint></Error>",
    ));

    let err = invoker.invoke(&describe_regions()).await.unwrap_err();
    assert!(!err.is_transient());
    assert!(err.to_string().contains("redirected twice"));
    assert_eq!(http.requests().len(), 2);
}

#[tokio::test]
async fn test_already_exists_not_retried() {
    let (invoker, http) = setup();
    http.push(service_error(
        StatusCode::CONFLICT,
        "BucketAlreadyOwnedByYou",
    ));

    let err = invoker.invoke(&describe_regions()).await.unwrap_err();
    assert!(err.is_already_exists());
    assert_eq!(err.provider_code(), Some("BucketAlreadyOwnedByYou"));
    assert_eq!(http.requests().len(), 1);
}

#[tokio::test]
async fn test_not_found_classified() {
    let (invoker, http) = setup();
    http.push(service_error(StatusCode::BAD_REQUEST, "DBInstanceNotFound"));

    let err = invoker.invoke(&describe_regions()).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.request_id(), Some("req-1"));
}

#[tokio::test]
async fn test_throttling_code_retried() {
    let (invoker, http) = setup();
    http.push(service_error(StatusCode::BAD_REQUEST, "Throttling"));
    http.push(response(StatusCode::OK, "<R><ok>1</ok></R>"));

    let resp = invoker.invoke(&describe_regions()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(http.requests().len(), 2);
}

#[tokio::test]
async fn test_no_content_yields_empty_response() {
    let (invoker, http) = setup();
    http.push(response(StatusCode::NO_CONTENT, ""));

    let resp = invoker.invoke(&describe_regions()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(resp.xml().is_none());
}

#[tokio::test]
async fn test_deadline_stops_retries() {
    let (invoker, http) = setup();
    http.push(response(StatusCode::SERVICE_UNAVAILABLE, ""));

    let err = invoker
        .invoke_with_deadline(&describe_regions(), Instant::now())
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(http.requests().len(), 1);
}

#[tokio::test]
async fn test_detached_failure_is_logged_not_surfaced() {
    let (invoker, http) = setup();
    http.push(service_error(StatusCode::BAD_REQUEST, "InvalidParameterValue"));

    let handle = invoker.invoke_detached(describe_regions());
    // The task completes normally even though the call failed.
    handle.await.unwrap();
    assert_eq!(http.requests().len(), 1);
}

#[tokio::test]
async fn test_detached_handle_is_abortable() {
    let (invoker, http) = setup();
    // Transient failures keep the detached task sleeping under its long
    // tag-write budget, so aborting is the only way it ends here.
    for _ in 0..3 {
        http.push(response(StatusCode::SERVICE_UNAVAILABLE, ""));
    }

    let handle = invoker.invoke_detached(describe_regions());
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_sign_resolves_endpoint_and_scheme() {
    let (invoker, _) = setup();

    let signed = invoker.sign(&describe_regions()).await.unwrap();
    assert_eq!(signed.scheme(), cloudcall::SigningScheme::V4);
    let req = signed.request();
    assert_eq!(req.uri().host(), Some("ec2.us-east-1.amazonaws.com"));
    assert!(req.headers().contains_key("authorization"));
}
