//! End-to-end repository policy scenario: a namespace outside the current
//! policy is rejected, then admitted once a newer-versioned policy update
//! is applied.

use bytes::Bytes;
use ccnd_common::name::{Component, Name};
use ccnd_common::packet::{self, ContentObject, ContentType, Interest, SignedInfo};
use ccnr::{Policy, RepositoryEngine};

fn content(name: &str, body: &'static [u8]) -> ContentObject {
    ContentObject::new_signed(Name::from_uri(name), SignedInfo::new(ContentType::Data), Bytes::from_static(body))
}

#[tokio::test]
async fn policy_update_admits_a_previously_rejected_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = RepositoryEngine::open(
        dir.path(),
        Name::from_uri("ccnx:/ccnr/local"),
        Name::from_uri("ccnx:/ccnr"),
    )
    .unwrap();

    let mut policy = Policy::empty(Name::from_uri("ccnx:/ccnr/local"), Name::from_uri("ccnx:/ccnr"));
    policy.version = 1;
    policy.allowed_prefixes.push(Name::from_uri("ccnx:/ns1"));
    repo.set_policy(policy).unwrap();

    assert!(repo.save_content(content("ccnx:/ns1/data/a", b"hello")).unwrap());
    assert!(!repo.save_content(content("ccnx:/ns2/data/b", b"world")).unwrap());

    let miss = Interest::new(Name::from_uri("ccnx:/ns2/data/b"));
    assert!(repo.get_content(&miss).is_none());

    let mut update = Policy::empty(Name::from_uri("ccnx:/ccnr/local"), Name::from_uri("ccnx:/ccnr"));
    update.version = 2;
    update.allowed_prefixes = vec![Name::from_uri("ccnx:/ns1"), Name::from_uri("ccnx:/ns2")];
    repo.set_policy(update).unwrap();

    assert!(repo.save_content(content("ccnx:/ns2/data/b", b"world")).unwrap());

    let hit = Interest::new(Name::from_uri("ccnx:/ns2/data/b"));
    let found = repo.get_content(&hit).unwrap();
    assert_eq!(found.content, Bytes::from_static(b"world"));
}

#[tokio::test]
async fn signed_policy_update_object_is_applied_and_not_stored_as_content() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = RepositoryEngine::open(
        dir.path(),
        Name::from_uri("ccnx:/ccnr/local"),
        Name::from_uri("ccnx:/ccnr"),
    )
    .unwrap();

    let mut update = Policy::empty(Name::from_uri("ccnx:/ccnr/local"), Name::from_uri("ccnx:/ccnr"));
    update.version = 1;
    update.allowed_prefixes.push(Name::from_uri("ccnx:/ns1"));
    let xml = quick_xml::se::to_string(&update_document(&update)).unwrap();

    let co = content("ccnx:/ccnr/local/policy-update/v1", Box::leak(xml.into_bytes().into_boxed_slice()));
    assert!(repo.save_content(co).unwrap());
    assert_eq!(repo.policy().version, 1);
    assert!(repo.policy().admits(&Name::from_uri("ccnx:/ns1/x")));

    let lookup = Interest::new(Name::from_uri("ccnx:/ccnr/local/policy-update/v1"));
    assert!(repo.get_content(&lookup).is_none());
}

#[tokio::test]
async fn enumeration_interest_answers_immediately_when_children_exist() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = RepositoryEngine::open(
        dir.path(),
        Name::from_uri("ccnx:/ccnr/local"),
        Name::from_uri("ccnx:/ccnr"),
    )
    .unwrap();
    let mut policy = Policy::empty(Name::from_uri("ccnx:/ccnr/local"), Name::from_uri("ccnx:/ccnr"));
    policy.version = 1;
    policy.allowed_prefixes.push(Name::from_uri("ccnx:/ns1"));
    repo.set_policy(policy).unwrap();

    assert!(repo.save_content(content("ccnx:/ns1/a", b"x")).unwrap());

    let marked = Name::from_uri("ccnx:/ns1").append(Component::new(packet::NAME_ENUMERATION_MARKER));
    let children = repo.get_names_with_prefix(Interest::new(marked)).unwrap();
    assert_eq!(children, vec![Component::new("a")]);
}

#[tokio::test]
async fn enumeration_interest_is_deferred_until_a_matching_child_is_saved() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = RepositoryEngine::open(
        dir.path(),
        Name::from_uri("ccnx:/ccnr/local"),
        Name::from_uri("ccnx:/ccnr"),
    )
    .unwrap();
    let mut policy = Policy::empty(Name::from_uri("ccnx:/ccnr/local"), Name::from_uri("ccnx:/ccnr"));
    policy.version = 1;
    policy.allowed_prefixes.push(Name::from_uri("ccnx:/ns1"));
    repo.set_policy(policy).unwrap();

    let marked = Name::from_uri("ccnx:/ns1").append(Component::new(packet::NAME_ENUMERATION_MARKER));
    assert!(repo.get_names_with_prefix(Interest::new(marked.clone())).is_none());
    assert!(repo.drain_ready_enumerations().is_empty());

    assert!(repo.save_content(content("ccnx:/ns1/b", b"y")).unwrap());

    let ready = repo.drain_ready_enumerations();
    assert_eq!(ready.len(), 1);
    let (reply_interest, children) = &ready[0];
    assert_eq!(reply_interest.name, marked);
    assert_eq!(children, &vec![Component::new("b")]);
}

// Mirrors `Policy::to_document`'s private shape just enough to build a
// signable XML payload from a test; `ccnr` keeps that conversion private
// since only `Policy` itself needs to round-trip through it.
#[derive(serde::Serialize)]
#[serde(rename = "Policy")]
struct TestPolicyDocument {
    #[serde(rename = "Version")]
    version: u64,
    #[serde(rename = "LocalName")]
    local_name: String,
    #[serde(rename = "GlobalPrefix")]
    global_prefix: String,
    #[serde(rename = "Namespace")]
    namespace: TestNamespaceList,
}

#[derive(serde::Serialize)]
struct TestNamespaceList {
    #[serde(rename = "URI")]
    uri: Vec<String>,
}

fn update_document(policy: &Policy) -> TestPolicyDocument {
    TestPolicyDocument {
        version: policy.version,
        local_name: policy.local_name.to_string(),
        global_prefix: policy.global_prefix.to_string(),
        namespace: TestNamespaceList { uri: policy.allowed_prefixes.iter().map(|n| n.to_string()).collect() },
    }
}
