//! Namespace admission policy (§4.9, §6): the on-disk `policy.xml` document
//! and the in-process predicate it compiles into.

use ccnd_common::name::Name;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed policy.xml: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("policy update version {update} does not strictly exceed current version {current}")]
    StaleVersion { current: u64, update: u64 },
}

/// On-disk shape of `policy.xml`, per §6's element list: `Version`,
/// `LocalName`, `GlobalPrefix`, and one or more `Namespace/URI` children.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Policy")]
struct PolicyDocument {
    #[serde(rename = "Version")]
    version: u64,
    #[serde(rename = "LocalName")]
    local_name: String,
    #[serde(rename = "GlobalPrefix")]
    global_prefix: String,
    #[serde(rename = "Namespace")]
    namespace: NamespaceList,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NamespaceList {
    #[serde(rename = "URI")]
    uri: Vec<String>,
}

/// The policy predicate controlling namespace admission, plus the identity
/// fields a repository advertises to the forwarder.
#[derive(Debug, Clone)]
pub struct Policy {
    pub version: u64,
    pub local_name: Name,
    pub global_prefix: Name,
    pub allowed_prefixes: Vec<Name>,
}

impl Policy {
    /// A permissive starting policy for a repository with no `policy.xml`
    /// yet on disk: version 0, trusting nothing until a real policy lands.
    pub fn empty(local_name: Name, global_prefix: Name) -> Self {
        Self { version: 0, local_name, global_prefix, allowed_prefixes: Vec::new() }
    }

    /// `true` if `name` falls under any allowed prefix or the repository's
    /// own global prefix.
    pub fn admits(&self, name: &Name) -> bool {
        self.global_prefix.is_prefix_of(name)
            || self.allowed_prefixes.iter().any(|p| p.is_prefix_of(name))
    }

    fn from_document(doc: PolicyDocument) -> Self {
        Self {
            version: doc.version,
            local_name: Name::from_uri(&doc.local_name),
            global_prefix: Name::from_uri(&doc.global_prefix),
            allowed_prefixes: doc.namespace.uri.iter().map(|u| Name::from_uri(u)).collect(),
        }
    }

    fn to_document(&self) -> PolicyDocument {
        PolicyDocument {
            version: self.version,
            local_name: self.local_name.to_string(),
            global_prefix: self.global_prefix.to_string(),
            namespace: NamespaceList {
                uri: self.allowed_prefixes.iter().map(|n| n.to_string()).collect(),
            },
        }
    }

    /// Parses a policy document from its XML text, e.g. the payload of a
    /// signed policy-update Content Object.
    pub fn from_xml_str(xml: &str) -> Result<Self, PolicyError> {
        let doc: PolicyDocument = quick_xml::de::from_str(xml)?;
        Ok(Self::from_document(doc))
    }

    /// Reads `<data>/policy.xml`.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let xml = std::fs::read_to_string(path)?;
        Self::from_xml_str(&xml)
    }

    /// Writes `<data>/policy.xml` durably: serialize to a sibling temp file,
    /// then rename over the target so a crash mid-write never leaves a
    /// truncated policy file in place.
    pub fn save(&self, path: &Path) -> Result<(), PolicyError> {
        let xml = quick_xml::se::to_string(&self.to_document())?;
        let tmp = path.with_extension("xml.tmp");
        std::fs::write(&tmp, xml)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Accepts `update` only if its version strictly exceeds this policy's,
    /// writing it durably before the in-memory swap (§4.9's `set_policy`).
    pub fn apply_update(&mut self, update: Policy, path: &Path) -> Result<(), PolicyError> {
        if update.version <= self.version {
            return Err(PolicyError::StaleVersion { current: self.version, update: update.version });
        }
        update.save(path)?;
        *self = update;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_under_global_prefix_and_allowed_namespaces() {
        let mut policy = Policy::empty(Name::from_uri("ccnx:/ccnr/local"), Name::from_uri("ccnx:/ccnr"));
        policy.allowed_prefixes.push(Name::from_uri("ccnx:/ns1"));

        assert!(policy.admits(&Name::from_uri("ccnx:/ns1/data/a")));
        assert!(policy.admits(&Name::from_uri("ccnx:/ccnr/anything")));
        assert!(!policy.admits(&Name::from_uri("ccnx:/ns2/data/b")));
    }

    #[test]
    fn xml_round_trips_through_document_shape() {
        let mut policy = Policy::empty(Name::from_uri("ccnx:/ccnr/local"), Name::from_uri("ccnx:/ccnr"));
        policy.version = 3;
        policy.allowed_prefixes = vec![Name::from_uri("ccnx:/ns1"), Name::from_uri("ccnx:/ns2")];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.xml");
        policy.save(&path).unwrap();

        let loaded = Policy::load(&path).unwrap();
        assert_eq!(loaded.version, 3);
        assert_eq!(loaded.global_prefix, policy.global_prefix);
        assert_eq!(loaded.allowed_prefixes, policy.allowed_prefixes);
    }

    #[test]
    fn stale_version_update_is_rejected_and_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.xml");
        let mut policy = Policy::empty(Name::from_uri("ccnx:/ccnr/local"), Name::from_uri("ccnx:/ccnr"));
        policy.version = 5;
        policy.save(&path).unwrap();

        let stale = Policy::empty(Name::from_uri("ccnx:/ccnr/local"), Name::from_uri("ccnx:/ccnr"));
        let err = policy.apply_update(stale, &path).unwrap_err();
        assert!(matches!(err, PolicyError::StaleVersion { current: 5, update: 0 }));
        assert_eq!(policy.version, 5);
    }
}
