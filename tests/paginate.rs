//! Pagination driver behavior over a scripted transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode, Uri};
use tokio::time::Duration;

use cloudcall::{
    Config, Context, Error, HttpSend, Invoker, ParsedResponse, ProviderVariant,
    RequestDescriptor, Result, RetryPolicy, Signer, StaticCredentialProvider,
};

#[derive(Debug, Clone, Default)]
struct ScriptedHttp {
    responses: Arc<Mutex<VecDeque<http::Response<Bytes>>>>,
    uris: Arc<Mutex<Vec<Uri>>>,
}

impl ScriptedHttp {
    fn push_page(&self, items: &[&str], marker: Option<&str>) {
        let mut body = String::from("<ListResponse><Items>");
        for item in items {
            body.push_str(&format!("<Item>{item}</Item>"));
        }
        body.push_str("</Items>");
        if let Some(marker) = marker {
            body.push_str(&format!("<Marker>{marker}</Marker>"));
        }
        body.push_str("</ListResponse>");

        let resp = http::Response::builder()
            .status(StatusCode::OK)
            .body(Bytes::from(body))
            .unwrap();
        self.responses.lock().unwrap().push_back(resp);
    }

    fn uris(&self) -> Vec<Uri> {
        self.uris.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpSend for ScriptedHttp {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        self.uris.lock().unwrap().push(req.uri().clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::unexpected("no scripted response left"))
    }
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
        max_attempts: 2,
        delay: Duration::from_millis(1),
    });
    (invoker, http)
}

fn extract_items(resp: &ParsedResponse) -> Vec<String> {
    resp.xml()
        .and_then(|root| root.find("Items"))
        .map(|items| {
            items
                .children_named("Item")
                .map(|n| n.text.clone())
                .collect()
        })
        .unwrap_or_default()
}

fn extract_marker(resp: &ParsedResponse) -> Option<String> {
    resp.text_of("Marker").map(str::to_string)
}

fn listing() -> RequestDescriptor {
    RequestDescriptor::new(Method::GET, "ec2")
        .with_param("Action", "DescribeSnapshots")
        .with_param("Version", "2014-06-15")
}

#[tokio::test]
async fn test_walks_marker_chain() {
    let (invoker, http) = setup();
    http.push_page(&["a", "b"], Some("m1"));
    http.push_page(&["c", "d"], Some("m2"));
    http.push_page(&["e"], None);

    let all = invoker
        .paginate(listing(), "Marker", extract_items, extract_marker)
        .collect()
        .await
        .unwrap();
    assert_eq!(all, ["a", "b", "c", "d", "e"]);

    let uris = http.uris();
    assert_eq!(uris.len(), 3);
    assert!(!uris[0].query().unwrap().contains("Marker="));
    assert!(uris[1].query().unwrap().contains("Marker=m1"));
    assert!(uris[2].query().unwrap().contains("Marker=m2"));
}

#[tokio::test]
async fn test_page_at_a_time() {
    let (invoker, http) = setup();
    http.push_page(&["a"], Some("m1"));
    http.push_page(&["b"], None);

    let mut pages = invoker.paginate(listing(), "Marker", extract_items, extract_marker);
    assert_eq!(pages.next_page().await.unwrap(), Some(vec!["a".to_string()]));
    assert_eq!(pages.next_page().await.unwrap(), Some(vec!["b".to_string()]));
    assert_eq!(pages.next_page().await.unwrap(), None);
    // Exhaustion is sticky; no further requests go out.
    assert_eq!(pages.next_page().await.unwrap(), None);
    assert_eq!(http.uris().len(), 2);
}

#[tokio::test]
async fn test_repeated_marker_terminates() {
    let (invoker, http) = setup();
    http.push_page(&["a"], Some("m1"));
    http.push_page(&["b"], Some("m1"));

    let all = invoker
        .paginate(listing(), "Marker", extract_items, extract_marker)
        .collect()
        .await
        .unwrap();
    assert_eq!(all, ["a", "b"]);
    assert_eq!(http.uris().len(), 2);
}

#[tokio::test]
async fn test_single_page_listing() {
    let (invoker, http) = setup();
    http.push_page(&[], None);

    let all = invoker
        .paginate(listing(), "Marker", extract_items, extract_marker)
        .collect()
        .await
        .unwrap();
    assert!(all.is_empty());
    assert_eq!(http.uris().len(), 1);
}

#[tokio::test]
async fn test_page_failure_propagates() {
    let (invoker, http) = setup();
    http.push_page(&["a"], Some("m1"));
    // Second page: the scripted queue is empty, so the transport errors.

    let mut pages = invoker.paginate(listing(), "Marker", extract_items, extract_marker);
    assert!(pages.next_page().await.unwrap().is_some());
    assert!(pages.next_page().await.is_err());
}
