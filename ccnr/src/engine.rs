//! Repository engine core (§4.9): the operations a repository presents to
//! whatever talks to it over a face — `save_content`, `get_content`,
//! `get_names_with_prefix`, `set_policy`, `check_policy_update`.

use crate::policy::{Policy, PolicyError};
use crate::store::{Persistence, StoreError};
use ccnd_common::name::{Component, Name};
use ccnd_common::packet::{self, ContentObject, Interest};
use log::{info, warn};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A marker component distinguishing a policy-update Content Object from
/// ordinary published content under a repository's local name.
const POLICY_UPDATE_COMPONENT: &str = "policy-update";

pub struct RepositoryEngine {
    policy: Policy,
    policy_path: PathBuf,
    store: Persistence,
    /// Enumeration Interests that found no children at request time,
    /// waiting for `save_content` to store something under their prefix.
    pending_enumerations: Vec<Interest>,
}

impl RepositoryEngine {
    /// Opens the repository rooted at `data_dir`: loads `policy.xml` if
    /// present (starting from an empty, nothing-admitted policy otherwise)
    /// and opens the persistent object store.
    pub fn open(
        data_dir: impl Into<PathBuf>,
        local_name: Name,
        global_prefix: Name,
    ) -> Result<Self, EngineError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(StoreError::Io)?;
        let policy_path = data_dir.join("policy.xml");
        let policy = Policy::load(&policy_path)
            .unwrap_or_else(|_| Policy::empty(local_name, global_prefix));
        let store = Persistence::open(&data_dir)?;
        Ok(Self { policy, policy_path, store, pending_enumerations: Vec::new() })
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Persists `co` if it passes namespace admission; otherwise drops it
    /// silently (§7: policy rejection has no explicit negative response).
    /// Storing content doesn't itself produce an enumeration response — call
    /// [`Self::drain_ready_enumerations`] afterward to collect any deferred
    /// enumeration Interests `co.name` just satisfied.
    pub fn save_content(&mut self, co: ContentObject) -> Result<bool, EngineError> {
        if self.check_policy_update(&co)? {
            return Ok(true);
        }
        if !self.policy.admits(&co.name) {
            warn!("repository: {} rejected by policy", co.name);
            return Ok(false);
        }
        self.store.insert(&co)?;
        info!("repository: stored {}", co.name);
        Ok(true)
    }

    /// Best-match lookup within the persistent store, per §4.3's ordering.
    pub fn get_content(&self, interest: &Interest) -> Option<ContentObject> {
        self.store.lookup_prefix(interest).ok().flatten()
    }

    /// Immediate child components under the prefix `interest` names (its
    /// [`packet::enumeration_prefix`] if it carries the enumeration marker,
    /// its plain name otherwise), excluding those whose latest version is
    /// not strictly newer than the version carried there, if any. Returns
    /// `None` and defers `interest` itself (marker and all, so a caller can
    /// still address a reply to it later) if there are currently no
    /// children to report; a later `save_content` under this prefix surfaces
    /// it through `drain_ready_enumerations`.
    pub fn get_names_with_prefix(&mut self, interest: Interest) -> Option<Vec<Component>> {
        let children = self.children_for(&interest);
        if children.is_empty() {
            self.pending_enumerations.push(interest);
            None
        } else {
            Some(children)
        }
    }

    fn children_for(&self, interest: &Interest) -> Vec<Component> {
        let prefix = if packet::is_enumeration_interest(interest) {
            packet::enumeration_prefix(interest)
        } else {
            interest.name.clone()
        };
        let children = self.store.names_with_prefix(&prefix);
        let Some(last) = prefix.components().last() else {
            return children;
        };
        let Some(min_version) = last.version_value() else {
            return children;
        };
        children
            .into_iter()
            .filter(|c| c.version_value().map_or(true, |v| v > min_version))
            .collect()
    }

    /// Re-evaluates every deferred enumeration Interest and returns, removing
    /// from the pending set, each one that now has at least one matching
    /// child — paired with its freshly computed response (§4.9).
    pub fn drain_ready_enumerations(&mut self) -> Vec<(Interest, Vec<Component>)> {
        let mut ready = Vec::new();
        let mut still_pending = Vec::new();
        for interest in self.pending_enumerations.drain(..) {
            let children = self.children_for(&interest);
            if children.is_empty() {
                still_pending.push(interest);
            } else {
                ready.push((interest, children));
            }
        }
        self.pending_enumerations = still_pending;
        ready
    }

    /// Atomically replaces the admission policy, writing the new document
    /// durably before it takes effect.
    pub fn set_policy(&mut self, update: Policy) -> Result<(), EngineError> {
        self.policy.apply_update(update, &self.policy_path)?;
        Ok(())
    }

    /// If `co` is a signed policy-update object for this repository (named
    /// under the repository's local name with the policy-update marker),
    /// decode and apply it. Returns `true` if `co` was a policy update
    /// (handled either way, admitted or rejected for staleness).
    pub fn check_policy_update(&mut self, co: &ContentObject) -> Result<bool, EngineError> {
        let marker = self.policy.local_name.append(Component::new(POLICY_UPDATE_COMPONENT));
        if !marker.is_prefix_of(&co.name) {
            return Ok(false);
        }
        if !packet::digest_verify(co) {
            warn!("repository: policy update {} failed signature check", co.name);
            return Ok(true);
        }
        let update_xml = std::str::from_utf8(&co.content).unwrap_or_default();
        let update = match Policy::from_xml_str(update_xml) {
            Ok(policy) => policy,
            Err(e) => {
                warn!("repository: policy update {} failed to parse: {}", co.name, e);
                return Ok(true);
            }
        };
        match self.set_policy(update) {
            Ok(()) => info!("repository: applied policy update from {}", co.name),
            Err(e) => warn!("repository: policy update from {} rejected: {}", co.name, e),
        }
        Ok(true)
    }
}
