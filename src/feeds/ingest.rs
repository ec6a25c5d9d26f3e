//! Pulling subscribed feeds into local shares.

use super::transport::Transport;
use crate::error::{Result, StoreError};
use crate::sharing::SharingEngine;
use crate::subscriptions::SubscriptionRegistry;
use crate::types::{ExternalMessage, Message};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A feed item that could not be shared.
#[derive(Debug)]
pub struct ItemFailure {
    /// Position of the item in the feed's `posts`.
    pub index: usize,
    pub error: StoreError,
}

/// Outcome of pulling one feed.
#[derive(Debug)]
pub struct PullReport {
    pub url: String,
    /// Shares created by this pull, in feed order.
    pub shared: Vec<Message>,
    /// Items skipped because they were already shared.
    pub duplicates: usize,
    pub failures: Vec<ItemFailure>,
}

impl PullReport {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            shared: Vec::new(),
            duplicates: 0,
            failures: Vec::new(),
        }
    }

    /// True if every item was either shared or already present.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fetches subscribed feeds and shares their posts.
pub struct FeedIngestor {
    subscriptions: Arc<SubscriptionRegistry>,
    sharing: Arc<SharingEngine>,
    transport: Arc<dyn Transport>,
}

impl FeedIngestor {
    pub fn new(
        subscriptions: Arc<SubscriptionRegistry>,
        sharing: Arc<SharingEngine>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            subscriptions,
            sharing,
            transport,
        }
    }

    /// Pull one subscribed feed.
    ///
    /// Items already shared from this feed are counted as duplicates; any
    /// other per-item error is collected in the report and the pull goes on.
    pub fn pull(&self, url: &str) -> Result<PullReport> {
        let url = url.trim();
        if !self.subscriptions.contains(url) {
            return Err(StoreError::NotSubscribed(url.to_string()));
        }

        let body = fetch_body(self.transport.as_ref(), url)?;
        self.ingest(url, &body)
    }

    /// Pull every subscription.
    ///
    /// Fetches run concurrently; each feed's posts are shared as soon as its
    /// body arrives, so a slow feed doesn't hold back the others. Results are
    /// returned in subscription order.
    pub fn pull_all(&self) -> Vec<(String, Result<PullReport>)> {
        let urls = self.subscriptions.list();
        let mut results: Vec<Option<Result<PullReport>>> = urls.iter().map(|_| None).collect();

        let (tx, rx) = crossbeam_channel::unbounded();
        std::thread::scope(|scope| {
            for (slot, url) in urls.iter().enumerate() {
                let tx = tx.clone();
                let transport = self.transport.as_ref();
                scope.spawn(move || {
                    let _ = tx.send((slot, fetch_body(transport, url)));
                });
            }
            drop(tx);

            for (slot, fetched) in rx.iter() {
                let url = &urls[slot];
                results[slot] = Some(fetched.and_then(|body| self.ingest(url, &body)));
            }
        });

        urls.into_iter()
            .zip(results)
            .map(|(url, result)| {
                let result = result.unwrap_or_else(|| {
                    Err(StoreError::Fetch {
                        url: url.clone(),
                        reason: "fetch worker exited without a result".into(),
                    })
                });
                (url, result)
            })
            .collect()
    }

    /// Share every post of an already-fetched feed body.
    fn ingest(&self, url: &str, body: &[u8]) -> Result<PullReport> {
        let posts = parse_feed(url, body)?;
        let mut report = PullReport::new(url);

        // In feed order: later items must see shares written by earlier ones
        for (index, raw) in posts.into_iter().enumerate() {
            let external: ExternalMessage = match serde_json::from_value(raw) {
                Ok(external) => external,
                Err(e) => {
                    warn!(url, index, error = %e, "Skipping malformed feed item");
                    report.failures.push(ItemFailure {
                        index,
                        error: StoreError::Parse {
                            url: url.to_string(),
                            reason: format!("post {}: {}", index, e),
                        },
                    });
                    continue;
                }
            };

            match self.sharing.share(&external, url) {
                Ok(message) => report.shared.push(message),
                Err(e) if e.is_duplicate_share() => report.duplicates += 1,
                Err(e) => {
                    warn!(url, index, error = %e, "Failed to share feed item");
                    report.failures.push(ItemFailure { index, error: e });
                }
            }
        }

        info!(
            url,
            shared = report.shared.len(),
            duplicates = report.duplicates,
            failures = report.failures.len(),
            "Pulled feed"
        );
        Ok(report)
    }
}

/// Decode a feed body into its raw posts.
///
/// Anything but a JSON object with a `posts` array is rejected. Posts are
/// returned undecoded so a single malformed item doesn't sink the whole pull.
pub fn parse_feed(url: &str, body: &[u8]) -> Result<Vec<Value>> {
    let parse_error = |reason: String| StoreError::Parse {
        url: url.to_string(),
        reason,
    };

    let value: Value = serde_json::from_slice(body).map_err(|e| parse_error(e.to_string()))?;
    match value {
        Value::Object(mut feed) => match feed.remove("posts") {
            Some(Value::Array(posts)) => Ok(posts),
            Some(_) => Err(parse_error("`posts` is not an array".into())),
            None => Err(parse_error("missing `posts`".into())),
        },
        _ => Err(parse_error("feed is not a JSON object".into())),
    }
}

fn fetch_body(transport: &dyn Transport, url: &str) -> Result<Vec<u8>> {
    let response = transport.fetch(url).map_err(|e| match e {
        fetch @ StoreError::Fetch { .. } => fetch,
        other => StoreError::Fetch {
            url: url.to_string(),
            reason: other.to_string(),
        },
    });

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            warn!(url, error = %e, "Feed fetch failed");
            return Err(e);
        }
    };

    if !response.is_success() {
        warn!(url, status = response.status, "Feed returned non-success status");
        return Err(StoreError::Fetch {
            url: url.to_string(),
            reason: format!("HTTP status {}", response.status),
        });
    }

    debug!(url, bytes = response.body.len(), "Fetched feed");
    Ok(response.body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OwnerIdentity;
    use crate::feeds::FetchResponse;
    use crate::messages::MessageStore;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    const SUB_URL: &str = "http://feed.example/recent.json";

    /// Serves canned responses and counts requests.
    #[derive(Default)]
    struct CannedTransport {
        responses: Mutex<HashMap<String, FetchResponse>>,
        requests: Mutex<usize>,
    }

    impl CannedTransport {
        fn serve(&self, url: &str, response: FetchResponse) {
            self.responses.lock().insert(url.to_string(), response);
        }
    }

    impl Transport for CannedTransport {
        fn fetch(&self, url: &str) -> Result<FetchResponse> {
            *self.requests.lock() += 1;
            self.responses
                .lock()
                .get(url)
                .cloned()
                .ok_or_else(|| StoreError::Fetch {
                    url: url.to_string(),
                    reason: "connection refused".into(),
                })
        }
    }

    struct Fixture {
        messages: Arc<MessageStore>,
        subscriptions: Arc<SubscriptionRegistry>,
        transport: Arc<CannedTransport>,
        ingestor: FeedIngestor,
    }

    fn fixture() -> Fixture {
        let messages = Arc::new(MessageStore::in_memory(OwnerIdentity::new(
            "test name",
            "test",
            "http://test.com/recent.json",
        )));
        let subscriptions = Arc::new(SubscriptionRegistry::in_memory());
        let sharing = Arc::new(SharingEngine::new(Arc::clone(&messages)));
        let transport = Arc::new(CannedTransport::default());
        let ingestor = FeedIngestor::new(
            Arc::clone(&subscriptions),
            sharing,
            Arc::clone(&transport) as Arc<dyn Transport>,
        );
        Fixture {
            messages,
            subscriptions,
            transport,
            ingestor,
        }
    }

    #[test]
    fn test_pull_shares_posts_once() {
        let f = fixture();
        f.subscriptions.subscribe(SUB_URL).unwrap();
        f.transport.serve(
            SUB_URL,
            FetchResponse::ok(format!(
                r#"{{"posts":[{{"content":{{"message":"hi"}},"meta":{{"originUrl":"{}"}}}}]}}"#,
                SUB_URL
            )),
        );

        let first = f.ingestor.pull(SUB_URL).unwrap();
        assert_eq!(first.shared.len(), 1);
        assert_eq!(first.shared[0].shares, vec![SUB_URL.to_string()]);
        assert!(first.shared[0].meta.is_shared);

        let second = f.ingestor.pull(SUB_URL).unwrap();
        assert!(second.shared.is_empty());
        assert_eq!(second.duplicates, 1);
        assert!(second.is_clean());
        assert_eq!(f.messages.len(), 1);
    }

    #[test]
    fn test_pull_unsubscribed() {
        let f = fixture();
        let result = f.ingestor.pull("http://some.other.url.unsub/recent.json");

        assert!(matches!(result, Err(StoreError::NotSubscribed(_))));
        assert_eq!(*f.transport.requests.lock(), 0);
        assert!(f.messages.is_empty());
    }

    #[test]
    fn test_pull_plain_string_body() {
        let f = fixture();
        f.subscriptions.subscribe(SUB_URL).unwrap();
        f.transport.serve(SUB_URL, FetchResponse::ok("uh oh"));

        assert!(matches!(f.ingestor.pull(SUB_URL), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn test_pull_rejects_wrong_shapes() {
        for body in [r#""uh oh""#, "{}", r#"{"posts":null}"#, r#"[{"posts":[]}]"#, "[[]]"] {
            let f = fixture();
            f.subscriptions.subscribe(SUB_URL).unwrap();
            f.transport.serve(SUB_URL, FetchResponse::ok(body));
            assert!(
                matches!(f.ingestor.pull(SUB_URL), Err(StoreError::Parse { .. })),
                "body {} should not parse",
                body
            );
        }
    }

    #[test]
    fn test_pull_non_success_status() {
        let f = fixture();
        f.subscriptions.subscribe(SUB_URL).unwrap();
        f.transport.serve(
            SUB_URL,
            FetchResponse {
                status: 500,
                body: b"{\"posts\":[]}".to_vec(),
            },
        );

        assert!(matches!(f.ingestor.pull(SUB_URL), Err(StoreError::Fetch { .. })));
    }

    #[test]
    fn test_malformed_item_does_not_abort_pull() {
        let f = fixture();
        f.subscriptions.subscribe(SUB_URL).unwrap();
        f.transport.serve(
            SUB_URL,
            FetchResponse::ok(
                r#"{"posts":[
                    {"content":{"message":"first"},"meta":{"originUrl":"http://a"}, "id": 1},
                    {"content":{},"meta":{"originUrl":"http://a"}},
                    {"content":{"message":"third"},"meta":{"originUrl":"http://a"}, "id": 3}
                ]}"#,
            ),
        );

        let report = f.ingestor.pull(SUB_URL).unwrap();
        assert_eq!(report.shared.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.shared[0].content.message, "first");
        assert_eq!(report.shared[1].content.message, "third");
    }

    #[test]
    fn test_loose_optional_fields_still_share() {
        let f = fixture();
        f.subscriptions.subscribe(SUB_URL).unwrap();
        f.transport.serve(
            SUB_URL,
            FetchResponse::ok(
                r#"{"posts":[
                    {"id":"abc","content":{"message":"string id"},"meta":{"originUrl":"http://o"}},
                    {"id":2,"content":{"message":"null location"},"meta":{"originUrl":"http://o","location":null}}
                ]}"#,
            ),
        );

        let report = f.ingestor.pull(SUB_URL).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.shared.len(), 2);
        assert_eq!(report.shared[0].meta.remote_id, None);
        assert_eq!(report.shared[1].meta.remote_id, Some(crate::types::MessageId(2)));
        assert_eq!(report.shared[1].meta.location, "");
    }

    #[test]
    fn test_repeated_item_within_one_feed() {
        let f = fixture();
        f.subscriptions.subscribe(SUB_URL).unwrap();
        let post = r#"{"content":{"message":"hi"},"meta":{"originUrl":"http://a"}}"#;
        f.transport
            .serve(SUB_URL, FetchResponse::ok(format!(r#"{{"posts":[{0},{0}]}}"#, post)));

        let report = f.ingestor.pull(SUB_URL).unwrap();
        assert_eq!(report.shared.len(), 1);
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn test_pull_all_reports_each_feed() {
        let f = fixture();
        let good = "http://good.example/recent.json";
        let down = "http://down.example/recent.json";
        f.subscriptions.subscribe(good).unwrap();
        f.subscriptions.subscribe(down).unwrap();
        f.transport.serve(
            good,
            FetchResponse::ok(r#"{"posts":[{"content":{"message":"hi"},"meta":{"originUrl":"http://good.example/recent.json"}}]}"#),
        );

        let results = f.ingestor.pull_all();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, good);
        assert_eq!(results[0].1.as_ref().unwrap().shared.len(), 1);
        assert_eq!(results[1].0, down);
        assert!(matches!(results[1].1, Err(StoreError::Fetch { .. })));
    }
}
