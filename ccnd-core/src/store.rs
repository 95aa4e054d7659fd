//! In-memory content store: a name-component trie indexed by accession and
//! by freshness deadline, per §4.3.

use bytes::Bytes;
use ccnd_common::name::{Component, Name};
use ccnd_common::packet::{matches, ContentObject, Interest};
use ccnd_common::types::Accession;
use std::collections::{BTreeMap, HashMap};

/// Default byte budget before oldest-accession entries are evicted.
pub const DEFAULT_BYTE_BUDGET: usize = 64 * 1024 * 1024;

struct Entry {
    accession: Accession,
    object: ContentObject,
    encoded: Bytes,
}

#[derive(Default)]
struct TrieNode {
    children: HashMap<Component, TrieNode>,
    /// At most one live entry per exact name (identical bytes are deduped
    /// on insert; distinct objects at the same name never coexist).
    entry: Option<Entry>,
}

impl TrieNode {
    fn collect_matches(&self, interest: &Interest, now_ms: u64, out: &mut Vec<(Name, Accession)>) {
        if let Some(entry) = &self.entry {
            let stale_ok = interest
                .selectors
                .answer_origin_kind
                .map(|aok| aok.allow_stale)
                .unwrap_or(false);
            let fresh = entry.object.is_fresh(now_ms);
            if (fresh || stale_ok) && matches(interest, &entry.object) {
                out.push((entry.object.name.clone(), entry.accession));
            }
        }
        for child in self.children.values() {
            child.collect_matches(interest, now_ms, out);
        }
    }
}

/// In-memory cache of Content Objects, keyed by fully-qualified name.
pub struct ContentStore {
    root: TrieNode,
    by_accession: BTreeMap<Accession, Vec<Component>>,
    next_accession: u64,
    byte_budget: usize,
    current_bytes: usize,
}

pub enum InsertOutcome {
    Inserted(Accession),
    DuplicateDropped,
}

impl ContentStore {
    pub fn new(byte_budget: usize) -> Self {
        Self {
            root: TrieNode::default(),
            by_accession: BTreeMap::new(),
            next_accession: 1,
            byte_budget,
            current_bytes: 0,
        }
    }

    /// Inserts a Content Object. An exact-name duplicate (identical encoded
    /// bytes already present) increments no accession and is dropped.
    pub fn insert(&mut self, object: ContentObject, encoded: Bytes) -> InsertOutcome {
        let path: Vec<Component> = object.name.components().to_vec();
        let node = self.node_mut(&path);
        if let Some(existing) = &node.entry {
            if existing.encoded == encoded {
                return InsertOutcome::DuplicateDropped;
            }
        }
        let accession = Accession(self.next_accession);
        self.next_accession += 1;
        self.current_bytes += encoded.len();
        if let Some(old) = node.entry.replace(Entry { accession, object, encoded }) {
            self.current_bytes = self.current_bytes.saturating_sub(old.encoded.len());
            self.by_accession.remove(&old.accession);
        }
        self.by_accession.insert(accession, path);
        self.evict_by_budget();
        InsertOutcome::Inserted(accession)
    }

    /// Returns the earliest (smallest-name, then smallest-accession) object
    /// satisfying `interest`, if any.
    pub fn lookup(&self, interest: &Interest, now_ms: u64) -> Option<(&ContentObject, &Bytes)> {
        let node = self.node(interest.name.components())?;
        let mut candidates = Vec::new();
        node.collect_matches(interest, now_ms, &mut candidates);
        candidates.sort();
        let (name, accession) = candidates.into_iter().next()?;
        let path = self.by_accession.get(&accession)?;
        debug_assert_eq!(&name, &Name::from_components(path.clone()));
        let node = self.node(path)?;
        let entry = node.entry.as_ref()?;
        Some((&entry.object, &entry.encoded))
    }

    /// Lazily purges entries whose freshness window has elapsed.
    pub fn purge_stale(&mut self, now_ms: u64) {
        let stale: Vec<Accession> = self
            .by_accession
            .iter()
            .filter_map(|(acc, path)| {
                let node = self.node(path)?;
                let entry = node.entry.as_ref()?;
                if !entry.object.is_fresh(now_ms) {
                    Some(*acc)
                } else {
                    None
                }
            })
            .collect();
        for acc in stale {
            self.remove(acc);
        }
    }

    fn evict_by_budget(&mut self) {
        while self.current_bytes > self.byte_budget {
            let Some((&oldest, _)) = self.by_accession.iter().next() else { break };
            self.remove(oldest);
        }
    }

    fn remove(&mut self, accession: Accession) {
        let Some(path) = self.by_accession.remove(&accession) else { return };
        if let Some(node) = self.node_mut_existing(&path) {
            if let Some(entry) = node.entry.take() {
                self.current_bytes = self.current_bytes.saturating_sub(entry.encoded.len());
            }
        }
    }

    fn node(&self, path: &[Component]) -> Option<&TrieNode> {
        let mut node = &self.root;
        for c in path {
            node = node.children.get(c)?;
        }
        Some(node)
    }

    fn node_mut(&mut self, path: &[Component]) -> &mut TrieNode {
        let mut node = &mut self.root;
        for c in path {
            node = node.children.entry(c.clone()).or_default();
        }
        node
    }

    fn node_mut_existing(&mut self, path: &[Component]) -> Option<&mut TrieNode> {
        let mut node = &mut self.root;
        for c in path {
            node = node.children.get_mut(c)?;
        }
        Some(node)
    }

    pub fn len(&self) -> usize {
        self.by_accession.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccnd_common::packet::{ContentType, SignedInfo};

    fn object(uri: &str, payload: &[u8]) -> (ContentObject, Bytes) {
        let co = ContentObject::new_signed(
            Name::from_uri(uri),
            SignedInfo::new(ContentType::Data),
            Bytes::copy_from_slice(payload),
        );
        let encoded = ccnd_common::packet::encode_content_object(&co);
        (co, encoded)
    }

    #[test]
    fn insert_and_lookup_by_prefix() {
        let mut store = ContentStore::new(DEFAULT_BYTE_BUDGET);
        let (co, encoded) = object("ccnx:/x/y", b"hello");
        store.insert(co.clone(), encoded);

        let interest = Interest::new(Name::from_uri("ccnx:/x"));
        let (found, _) = store.lookup(&interest, 0).unwrap();
        assert_eq!(found.name, co.name);
    }

    #[test]
    fn exact_duplicate_is_dropped_without_new_accession() {
        let mut store = ContentStore::new(DEFAULT_BYTE_BUDGET);
        let (co, encoded) = object("ccnx:/x/y", b"hello");
        store.insert(co.clone(), encoded.clone());
        let outcome = store.insert(co, encoded);
        assert!(matches!(outcome, InsertOutcome::DuplicateDropped));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn accession_strictly_increases() {
        let mut store = ContentStore::new(DEFAULT_BYTE_BUDGET);
        let (co1, enc1) = object("ccnx:/a", b"1");
        let (co2, enc2) = object("ccnx:/b", b"2");
        let InsertOutcome::Inserted(a1) = store.insert(co1, enc1) else { panic!() };
        let InsertOutcome::Inserted(a2) = store.insert(co2, enc2) else { panic!() };
        assert!(a2.0 > a1.0);
    }

    #[test]
    fn earliest_name_wins_on_ambiguous_prefix_match() {
        let mut store = ContentStore::new(DEFAULT_BYTE_BUDGET);
        let (co_b, enc_b) = object("ccnx:/x/b", b"b");
        let (co_a, enc_a) = object("ccnx:/x/a", b"a");
        store.insert(co_b, enc_b);
        store.insert(co_a.clone(), enc_a);

        let interest = Interest::new(Name::from_uri("ccnx:/x"));
        let (found, _) = store.lookup(&interest, 0).unwrap();
        assert_eq!(found.name, co_a.name);
    }
}
