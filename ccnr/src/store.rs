//! Persistent, content-addressed storage for the repository engine (§4.9,
//! §6): objects are written once under a hash-sharded directory tree, and an
//! append-only index maps names to their hash so the tree can be searched
//! without re-hashing every object on every lookup.

use bytes::Bytes;
use ccnd_common::name::Name;
use ccnd_common::packet::{self, matches, ContentObject, Interest};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("stored object failed to decode: {0}")]
    Decode(String),
}

type Hash = [u8; 32];

fn hash_of(encoded: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(encoded);
    hasher.finalize().into()
}

fn hash_hex(hash: &Hash) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Content-addressed object store rooted at `<data>/objects`, with a
/// rebuildable `<data>/index` log mapping names to hashes.
pub struct Persistence {
    root: PathBuf,
    by_name: BTreeMap<Name, Hash>,
}

impl Persistence {
    /// Opens (creating if absent) the store at `root`, replaying `<root>/index`
    /// or, if that file is missing or malformed, rebuilding the index by
    /// scanning every object on disk.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(root.join("objects"))?;
        let mut store = Self { root, by_name: BTreeMap::new() };
        if store.replay_index().is_err() {
            store.rebuild_index_by_scan()?;
            store.write_index()?;
        }
        Ok(store)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index")
    }

    fn object_path(&self, hash: &Hash) -> PathBuf {
        let hex = hash_hex(hash);
        self.root.join("objects").join(&hex[..2]).join(&hex)
    }

    /// Replays `<root>/index`: each record is `name_len:u32 | name utf-8 | hash:32`.
    fn replay_index(&mut self) -> Result<(), StoreError> {
        let mut file = std::fs::File::open(self.index_path())?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        let mut cursor = 0usize;
        let mut entries = BTreeMap::new();
        while cursor < buf.len() {
            if cursor + 4 > buf.len() {
                return Err(StoreError::Decode("truncated index record length".into()));
            }
            let len = u32::from_be_bytes(buf[cursor..cursor + 4].try_into().unwrap()) as usize;
            cursor += 4;
            if cursor + len + 32 > buf.len() {
                return Err(StoreError::Decode("truncated index record body".into()));
            }
            let name_uri = std::str::from_utf8(&buf[cursor..cursor + len])
                .map_err(|e| StoreError::Decode(e.to_string()))?;
            cursor += len;
            let hash: Hash = buf[cursor..cursor + 32].try_into().unwrap();
            cursor += 32;
            entries.insert(Name::from_uri(name_uri), hash);
        }
        self.by_name = entries;
        Ok(())
    }

    fn rebuild_index_by_scan(&mut self) -> Result<(), StoreError> {
        self.by_name.clear();
        let objects_dir = self.root.join("objects");
        for shard in std::fs::read_dir(&objects_dir)?.filter_map(|e| e.ok()) {
            if !shard.path().is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(shard.path())?.filter_map(|e| e.ok()) {
                let bytes = std::fs::read(entry.path())?;
                let encoded = strip_length_prefix(&bytes)?;
                let (co, _, _) = packet::parse_content_object(encoded)
                    .map_err(|e| StoreError::Decode(format!("{:?}", e)))?;
                self.by_name.insert(co.name, hash_of(encoded));
            }
        }
        Ok(())
    }

    fn write_index(&self) -> Result<(), StoreError> {
        let tmp = self.index_path().with_extension("tmp");
        let mut file = std::fs::File::create(&tmp)?;
        for (name, hash) in &self.by_name {
            let uri = name.to_string();
            file.write_all(&(uri.len() as u32).to_be_bytes())?;
            file.write_all(uri.as_bytes())?;
            file.write_all(hash)?;
        }
        file.flush()?;
        std::fs::rename(&tmp, self.index_path())?;
        Ok(())
    }

    /// Persists `co` (already policy-admitted by the caller) and updates the
    /// name index. Identical-bytes re-insertion at the same name is a no-op.
    pub fn insert(&mut self, co: &ContentObject) -> Result<(), StoreError> {
        let encoded = packet::encode_content_object(co);
        let hash = hash_of(&encoded);
        if self.by_name.get(&co.name) == Some(&hash) {
            return Ok(());
        }
        let path = self.object_path(&hash);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            let mut file = std::fs::File::create(&path)?;
            file.write_all(&(encoded.len() as u32).to_be_bytes())?;
            file.write_all(&encoded)?;
        }
        self.by_name.insert(co.name.clone(), hash);
        self.write_index()
    }

    fn load(&self, hash: &Hash) -> Result<ContentObject, StoreError> {
        let bytes = std::fs::read(self.object_path(hash))?;
        let encoded = strip_length_prefix(&bytes)?;
        let (co, _, _) = packet::parse_content_object(encoded)
            .map_err(|e| StoreError::Decode(format!("{:?}", e)))?;
        Ok(co)
    }

    /// Returns the first stored object under `interest.name` that satisfies
    /// `interest`'s selectors (§4.3), trying candidates in name order. The
    /// repository is not on the forwarder's hot path (§5 runs it on a
    /// dedicated thread), so a linear scan over the relevant name range is
    /// acceptable in place of `ccnd-core::store`'s trie, but every candidate
    /// in range still has to be tried — an Exclude can rule out the
    /// lexicographically-first name and leave a later one as the best match.
    pub fn lookup_prefix(&self, interest: &Interest) -> Result<Option<ContentObject>, StoreError> {
        for (name, hash) in self.by_name.range(interest.name.clone()..) {
            if !interest.name.is_prefix_of(name) {
                break;
            }
            let co = self.load(hash)?;
            if matches(interest, &co) {
                return Ok(Some(co));
            }
        }
        Ok(None)
    }

    /// Immediate child components appearing under `prefix` among stored names.
    pub fn names_with_prefix(&self, prefix: &Name) -> Vec<ccnd_common::name::Component> {
        let mut children = Vec::new();
        for name in self.by_name.keys() {
            if prefix.is_prefix_of(name) && name.len() > prefix.len() {
                if let Some(child) = name.get(prefix.len()) {
                    if !children.contains(child) {
                        children.push(child.clone());
                    }
                }
            }
        }
        children
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }
}

fn strip_length_prefix(bytes: &[u8]) -> Result<&[u8], StoreError> {
    if bytes.len() < 4 {
        return Err(StoreError::Decode("object file shorter than its length prefix".into()));
    }
    let len = u32::from_be_bytes(bytes[..4].try_into().unwrap()) as usize;
    bytes.get(4..4 + len).ok_or_else(|| StoreError::Decode("object file truncated".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccnd_common::packet::{ContentType, Exclude, ExcludeElement, SignedInfo};

    fn object(uri: &str, payload: &[u8]) -> ContentObject {
        ContentObject::new_signed(Name::from_uri(uri), SignedInfo::new(ContentType::Data), Bytes::copy_from_slice(payload))
    }

    #[test]
    fn insert_and_lookup_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Persistence::open(dir.path()).unwrap();
        store.insert(&object("ccnx:/ns1/data/a", b"hello")).unwrap();

        let interest = Interest::new(Name::from_uri("ccnx:/ns1"));
        let found = store.lookup_prefix(&interest).unwrap().unwrap();
        assert_eq!(found.name, Name::from_uri("ccnx:/ns1/data/a"));
    }

    #[test]
    fn excluded_first_candidate_falls_through_to_the_next_match() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Persistence::open(dir.path()).unwrap();
        store.insert(&object("ccnx:/a/1", b"one")).unwrap();
        store.insert(&object("ccnx:/a/2", b"two")).unwrap();

        let mut interest = Interest::new(Name::from_uri("ccnx:/a"));
        interest.selectors.exclude =
            Some(Exclude(vec![ExcludeElement::Component(ccnd_common::name::Component::new("1"))]));

        let found = store.lookup_prefix(&interest).unwrap().unwrap();
        assert_eq!(found.name, Name::from_uri("ccnx:/a/2"));
    }

    #[test]
    fn index_rebuilds_from_disk_scan_when_index_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = Persistence::open(dir.path()).unwrap();
            store.insert(&object("ccnx:/ns1/data/a", b"hello")).unwrap();
        }
        std::fs::remove_file(dir.path().join("index")).unwrap();

        let store = Persistence::open(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        let interest = Interest::new(Name::from_uri("ccnx:/ns1"));
        assert!(store.lookup_prefix(&interest).unwrap().is_some());
    }

    #[test]
    fn names_with_prefix_returns_immediate_children_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Persistence::open(dir.path()).unwrap();
        store.insert(&object("ccnx:/ns1/a/x", b"1")).unwrap();
        store.insert(&object("ccnx:/ns1/b/y", b"2")).unwrap();

        let children = store.names_with_prefix(&Name::from_uri("ccnx:/ns1"));
        assert_eq!(children.len(), 2);
    }
}
