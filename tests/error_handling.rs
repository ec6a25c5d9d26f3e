//! Error handling and edge case tests.

use murmur::{
    FetchResponse, Instance, InstanceConfig, MessageDraft, MessageId, OwnerIdentity, Result,
    StoreError, Transport,
};
use std::sync::Arc;
use tempfile::TempDir;

/// Transport that always answers with the same response.
struct StaticTransport(FetchResponse);

impl Transport for StaticTransport {
    fn fetch(&self, _url: &str) -> Result<FetchResponse> {
        Ok(self.0.clone())
    }
}

fn test_config(dir: &TempDir) -> InstanceConfig {
    InstanceConfig {
        path: dir.path().join("instance"),
        identity: OwnerIdentity::new("test name", "test", "http://test.com/recent.json"),
        ..Default::default()
    }
}

fn instance_serving(dir: &TempDir, response: FetchResponse) -> Instance {
    Instance::open_or_create_with_transport(test_config(dir), Arc::new(StaticTransport(response)))
        .unwrap()
}

fn test_instance(dir: &TempDir) -> Instance {
    instance_serving(dir, FetchResponse::ok(r#"{"posts":[]}"#))
}

// --- Message Errors ---

#[test]
fn test_get_never_issued_id() {
    let dir = TempDir::new().unwrap();
    let instance = test_instance(&dir);

    let result = instance.get(MessageId(1111));
    assert!(matches!(result, Err(StoreError::NotFound(MessageId(1111)))));
}

#[test]
fn test_delete_missing() {
    let dir = TempDir::new().unwrap();
    let instance = test_instance(&dir);

    assert!(matches!(
        instance.delete(MessageId(3)),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn test_each_identity_field_required() {
    let dir = TempDir::new().unwrap();
    let instance = test_instance(&dir);

    for identity in [
        OwnerIdentity::new("", "test", "http://test.com/recent.json"),
        OwnerIdentity::new("test name", "", "http://test.com/recent.json"),
        OwnerIdentity::new("test name", "test", ""),
    ] {
        instance.set_identity(identity);
        let result = instance.create(MessageDraft::new("hello"));
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    assert!(instance.list_all(0).unwrap().is_empty());
}

#[test]
fn test_private_is_not_not_found() {
    let dir = TempDir::new().unwrap();
    let instance = test_instance(&dir);

    let private = instance.create(MessageDraft::new("secret").private()).unwrap();
    assert!(matches!(
        instance.one(private.id),
        Err(StoreError::PrivateMessage(_))
    ));

    // Flipping back makes it visible again
    let mut public = private.clone();
    public.meta.is_private = false;
    instance.update(public).unwrap();
    assert!(instance.one(private.id).is_ok());
}

// --- Feed Errors ---

#[test]
fn test_pull_unsubscribed_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let instance = instance_serving(
        &dir,
        FetchResponse::ok(r#"{"posts":[{"content":{"message":"hi"},"meta":{"originUrl":"http://x"}}]}"#),
    );

    let result = instance.pull("http://x/recent.json");
    assert!(matches!(result, Err(StoreError::NotSubscribed(_))));
    assert!(instance.list_all(0).unwrap().is_empty());
}

#[test]
fn test_pull_not_found_status() {
    let dir = TempDir::new().unwrap();
    let instance = instance_serving(
        &dir,
        FetchResponse {
            status: 404,
            body: b"not here".to_vec(),
        },
    );
    instance.subscribe("http://x/recent.json").unwrap();

    let result = instance.pull("http://x/recent.json");
    assert!(matches!(result, Err(StoreError::Fetch { .. })));
}

#[test]
fn test_pull_plain_string() {
    let dir = TempDir::new().unwrap();
    let instance = instance_serving(&dir, FetchResponse::ok("uh oh"));
    instance.subscribe("http://x/recent.json").unwrap();

    let result = instance.pull("http://x/recent.json");
    assert!(matches!(result, Err(StoreError::Parse { .. })));
}

#[test]
fn test_pull_item_without_origin() {
    let dir = TempDir::new().unwrap();
    let instance = instance_serving(
        &dir,
        FetchResponse::ok(r#"{"posts":[{"content":{"message":"hi"},"meta":{"originUrl":""}}]}"#),
    );
    instance.subscribe("http://x/recent.json").unwrap();

    let report = instance.pull("http://x/recent.json").unwrap();
    assert!(report.shared.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, StoreError::Validation(_)));
}

#[test]
fn test_pull_without_identity_reports_items() {
    let dir = TempDir::new().unwrap();
    let instance = instance_serving(
        &dir,
        FetchResponse::ok(r#"{"posts":[{"content":{"message":"hi"},"meta":{"originUrl":"http://x"}}]}"#),
    );
    instance.subscribe("http://x/recent.json").unwrap();
    instance.set_identity(OwnerIdentity::default());

    let report = instance.pull("http://x/recent.json").unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(!report.is_clean());
}

#[test]
fn test_empty_subscription_url() {
    let dir = TempDir::new().unwrap();
    let instance = test_instance(&dir);

    assert!(matches!(instance.subscribe(""), Err(StoreError::Validation(_))));
}

// --- Instance Errors ---

#[test]
fn test_instance_locked() {
    let dir = TempDir::new().unwrap();
    let _instance = test_instance(&dir);

    let result = Instance::open_or_create_with_transport(
        test_config(&dir),
        Arc::new(StaticTransport(FetchResponse::ok("{}"))),
    );
    assert!(matches!(result, Err(StoreError::Locked)));
}

#[test]
fn test_open_missing_without_create() {
    let dir = TempDir::new().unwrap();
    let config = InstanceConfig {
        create_if_missing: false,
        ..test_config(&dir)
    };

    let result = Instance::open_or_create_with_transport(
        config,
        Arc::new(StaticTransport(FetchResponse::ok("{}"))),
    );
    assert!(matches!(result, Err(StoreError::NotInitialized)));
}

#[test]
fn test_corrupt_manifest() {
    let dir = TempDir::new().unwrap();
    drop(test_instance(&dir));

    std::fs::write(dir.path().join("instance").join("MANIFEST"), b"XXXX\x01").unwrap();

    let result = Instance::open_or_create_with_transport(
        test_config(&dir),
        Arc::new(StaticTransport(FetchResponse::ok("{}"))),
    );
    assert!(matches!(result, Err(StoreError::InvalidFormat(_))));
}
