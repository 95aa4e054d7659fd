//! Pending Interest Table: per-prefix Interest aggregation, nonce-based
//! loop suppression, and expiry/retransmission bookkeeping (§4.4).
//!
//! The fingerprint/nonce-ring/retransmission-gating approach here follows
//! `fidinda-reto::tables::Tables::register_interest` and `satisfy_interests`,
//! reimplemented over `HashMap`/`VecDeque` instead of a fixed-capacity
//! const-generic arena since this store must grow and shrink freely.

use bytes::Bytes;
use ccnd_common::name::Name;
use ccnd_common::packet::{matches, ContentObject, Interest, Selectors};
use ccnd_common::types::FaceId;
use std::collections::{HashMap, HashSet, VecDeque};

/// Default bound on the number of live PIT entries (§9 open question:
/// no default was pinned down in the source; this one is configurable).
pub const DEFAULT_PIT_CAPACITY: usize = 65_536;

/// Per-fingerprint nonce ring size.
const PER_ENTRY_NONCE_RING: usize = 16;

/// Size of the cross-fingerprint global nonce LRU used for aggressive loop
/// suppression even across entries that have already been satisfied.
const GLOBAL_NONCE_CACHE_CAPACITY: usize = 65_536;

/// The PIT key: a canonical `(name, selectors)` pair, excluding nonce and
/// lifetime, so that differently-nonced Interests for the same content
/// aggregate onto one entry.
pub type Fingerprint = (Name, Selectors);

fn fingerprint_of(interest: &Interest) -> Fingerprint {
    (interest.name.clone(), interest.selectors.clone())
}

struct PitEntry {
    name: Name,
    selectors: Selectors,
    arrivals: Vec<(FaceId, u64)>,
    nonces: VecDeque<Bytes>,
    expiry_ms: u64,
    lifetime_ms: u32,
    outgoing: HashSet<FaceId>,
    retransmit_count: u32,
    /// Earliest time at which another arrival is even eligible to trigger
    /// re-forwarding; distinct from `expiry_ms`, which governs deletion.
    next_transmission_ms: u64,
}

/// A global ring of `(fingerprint, nonce)` pairs, bounded in size, used to
/// detect loops even after the originating PIT entry has been satisfied
/// and removed.
struct NonceCache {
    order: VecDeque<(Fingerprint, Bytes)>,
    seen: HashSet<(Fingerprint, Bytes)>,
    capacity: usize,
}

impl NonceCache {
    fn new(capacity: usize) -> Self {
        Self { order: VecDeque::new(), seen: HashSet::new(), capacity }
    }

    fn contains(&self, fp: &Fingerprint, nonce: &Bytes) -> bool {
        self.seen.contains(&(fp.clone(), nonce.clone()))
    }

    fn insert(&mut self, fp: Fingerprint, nonce: Bytes) {
        let key = (fp, nonce);
        if self.seen.insert(key.clone()) {
            self.order.push_back(key);
            if self.order.len() > self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.seen.remove(&evicted);
                }
            }
        }
    }
}

/// Result of [`Pit::on_interest_arrival`].
#[derive(Debug, PartialEq, Eq)]
pub enum ArrivalOutcome {
    /// The nonce was already observed for this fingerprint: drop, no
    /// further forwarding.
    LoopDetected,
    /// An existing entry absorbed this arrival (new face added, or a
    /// repeat on an already-tracked face).
    Aggregated,
    /// No entry existed; the caller must now consult the FIB/strategy and
    /// call [`Pit::record_outgoing`].
    New,
}

/// What to do with an entry the scheduler found past its expiry.
pub enum ExpiryAction {
    /// Re-forward with a fresh nonce; the entry survives with its counter
    /// incremented and a new expiry computed from its original lifetime.
    Retransmit { name: Name, selectors: Selectors },
    /// The entry was removed.
    Deleted,
}

pub struct Pit {
    entries: HashMap<Fingerprint, PitEntry>,
    global_nonces: NonceCache,
    capacity: usize,
    max_retransmits: u32,
}

impl Pit {
    pub fn new(capacity: usize, max_retransmits: u32) -> Self {
        Self {
            entries: HashMap::new(),
            global_nonces: NonceCache::new(GLOBAL_NONCE_CACHE_CAPACITY),
            capacity,
            max_retransmits,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Total pending-interest count across all entries' arrival faces,
    /// invariant-checked against the face table's own counters in tests.
    pub fn total_pending_count(&self) -> usize {
        self.entries.values().map(|e| e.arrivals.len()).sum()
    }

    /// Steps 1/3/4 of §4.4's `on_interest_arrival`: loop check, aggregation,
    /// or signal that a new entry needs FIB lookup. The content-store check
    /// (step 2) is the forwarder's responsibility and runs before this call.
    pub fn on_interest_arrival(
        &mut self,
        interest: &Interest,
        face: FaceId,
        now_ms: u64,
    ) -> ArrivalOutcome {
        let fp = fingerprint_of(interest);

        if let Some(nonce) = &interest.nonce {
            if self.global_nonces.contains(&fp, nonce) {
                return ArrivalOutcome::LoopDetected;
            }
        }

        if let Some(entry) = self.entries.get_mut(&fp) {
            if let Some(nonce) = &interest.nonce {
                if entry.nonces.contains(nonce) {
                    return ArrivalOutcome::LoopDetected;
                }
                entry.nonces.push_back(nonce.clone());
                if entry.nonces.len() > PER_ENTRY_NONCE_RING {
                    entry.nonces.pop_front();
                }
                self.global_nonces.insert(fp, nonce.clone());
            }
            if !entry.arrivals.iter().any(|(f, _)| *f == face) {
                entry.arrivals.push((face, now_ms));
            }
            let lifetime = interest.lifetime_ms.unwrap_or(entry.lifetime_ms) as u64;
            entry.expiry_ms = entry.expiry_ms.max(now_ms + lifetime);
            return ArrivalOutcome::Aggregated;
        }

        if self.entries.len() >= self.capacity {
            self.evict_earliest_expiry();
        }

        let lifetime_ms = interest.lifetime_ms.unwrap_or(4000);
        let mut nonces = VecDeque::new();
        if let Some(nonce) = &interest.nonce {
            nonces.push_back(nonce.clone());
            self.global_nonces.insert(fp.clone(), nonce.clone());
        }
        self.entries.insert(
            fp,
            PitEntry {
                name: interest.name.clone(),
                selectors: interest.selectors.clone(),
                arrivals: vec![(face, now_ms)],
                nonces,
                expiry_ms: now_ms + lifetime_ms as u64,
                lifetime_ms,
                outgoing: HashSet::new(),
                retransmit_count: 0,
                next_transmission_ms: now_ms,
            },
        );
        ArrivalOutcome::New
    }

    /// Records which faces a newly-created entry's Interest was forwarded to.
    pub fn record_outgoing(&mut self, interest: &Interest, faces: &[FaceId]) {
        let fp = fingerprint_of(interest);
        if let Some(entry) = self.entries.get_mut(&fp) {
            entry.outgoing.extend(faces.iter().copied());
        }
    }

    /// §4.4's `on_content_arrival`: finds every entry whose `(name,
    /// selectors)` the object satisfies, removes them, and returns the set
    /// of faces to reply to — every arrival face except `from_face`
    /// (strict no-echo-to-arrival-face, per the resolved open question).
    pub fn satisfy(&mut self, co: &ContentObject, from_face: Option<FaceId>) -> Vec<FaceId> {
        let mut reply_faces: HashSet<FaceId> = HashSet::new();
        let mut satisfied = Vec::new();

        for (fp, entry) in self.entries.iter() {
            let synthetic = Interest {
                name: entry.name.clone(),
                selectors: entry.selectors.clone(),
                nonce: None,
                lifetime_ms: None,
            };
            if matches(&synthetic, co) {
                satisfied.push(fp.clone());
                for &(face, _) in &entry.arrivals {
                    if Some(face) != from_face {
                        reply_faces.insert(face);
                    }
                }
            }
        }
        for fp in satisfied {
            self.entries.remove(&fp);
        }
        reply_faces.into_iter().collect()
    }

    /// Removes every arrival-set reference to `face` (face went down); an
    /// entry whose arrival set becomes empty is deleted outright.
    pub fn remove_face(&mut self, face: FaceId) {
        self.entries.retain(|_, entry| {
            entry.arrivals.retain(|(f, _)| *f != face);
            entry.outgoing.remove(&face);
            !entry.arrivals.is_empty()
        });
    }

    /// Drives §4.4's `on_expiry`: entries whose deadline has passed either
    /// get a fresh nonce and another attempt (if the strategy still has
    /// retransmits to spend) or are deleted.
    pub fn sweep_expired(&mut self, now_ms: u64) -> Vec<ExpiryAction> {
        let expired: Vec<Fingerprint> = self
            .entries
            .iter()
            .filter(|(_, e)| e.expiry_ms <= now_ms)
            .map(|(fp, _)| fp.clone())
            .collect();

        let mut actions = Vec::with_capacity(expired.len());
        for fp in expired {
            let mut entry = self.entries.remove(&fp).expect("key came from this map");
            if entry.retransmit_count < self.max_retransmits {
                entry.retransmit_count += 1;
                entry.expiry_ms = now_ms + entry.lifetime_ms as u64;
                entry.next_transmission_ms = now_ms;
                let name = entry.name.clone();
                let selectors = entry.selectors.clone();
                self.entries.insert(fp, entry);
                actions.push(ExpiryAction::Retransmit { name, selectors });
            } else {
                actions.push(ExpiryAction::Deleted);
            }
        }
        actions
    }

    fn evict_earliest_expiry(&mut self) {
        if let Some(fp) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.expiry_ms)
            .map(|(fp, _)| fp.clone())
        {
            self.entries.remove(&fp);
        }
    }
}
