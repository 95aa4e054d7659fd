//! Hierarchical names: ordered sequences of opaque byte components.
//!
//! Components carry no semantic escaping at the protocol level. A small set
//! of marker bytes (version, segment) give certain components conventional
//! meaning, but comparison and prefix-matching never inspect them.

use bytes::Bytes;
use std::cmp::Ordering;
use std::fmt;

/// Marker byte prefixing a version component (`%FD` in URI form).
pub const VERSION_MARKER: u8 = 0xFD;
/// Marker byte prefixing a segment component (`%00` in URI form).
pub const SEGMENT_MARKER: u8 = 0x00;

/// A single opaque name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Component(pub Bytes);

impl Component {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// A version component is a marker byte followed by a big-endian
    /// timestamp; `binary_time` is that timestamp value.
    pub fn version(binary_time: u64) -> Self {
        let mut buf = Vec::with_capacity(9);
        buf.push(VERSION_MARKER);
        buf.extend_from_slice(&binary_time.to_be_bytes());
        Self(Bytes::from(buf))
    }

    /// A segment component is a marker byte followed by a big-endian segment number.
    pub fn segment(number: u64) -> Self {
        let mut buf = Vec::with_capacity(9);
        buf.push(SEGMENT_MARKER);
        buf.extend_from_slice(&number.to_be_bytes());
        Self(Bytes::from(buf))
    }

    pub fn is_version(&self) -> bool {
        self.0.first() == Some(&VERSION_MARKER) && self.0.len() == 9
    }

    pub fn is_segment(&self) -> bool {
        self.0.first() == Some(&SEGMENT_MARKER) && self.0.len() == 9
    }

    /// The big-endian integer following the version marker, if this is one.
    pub fn version_value(&self) -> Option<u64> {
        if self.is_version() {
            Some(u64::from_be_bytes(self.0[1..9].try_into().ok()?))
        } else {
            None
        }
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_ref().cmp(other.0.as_ref())
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0.iter() {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{:02X}", b)?;
            }
        }
        Ok(())
    }
}

/// An ordered sequence of name components.
///
/// Names are compared componentwise, bytewise within a component, with a
/// shorter name that is a prefix of a longer one sorting smaller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    pub fn root() -> Self {
        Self { components: Vec::new() }
    }

    pub fn from_components(components: Vec<Component>) -> Self {
        Self { components }
    }

    /// Parses `ccnx:/comp1/comp2/...` URI form, percent-decoding each component.
    pub fn from_uri(uri: &str) -> Self {
        let rest = uri.strip_prefix("ccnx:").unwrap_or(uri);
        let components = rest
            .split('/')
            .filter(|s| !s.is_empty())
            .map(percent_decode_component)
            .collect();
        Self { components }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn get(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    pub fn append(&self, component: Component) -> Self {
        let mut components = self.components.clone();
        components.push(component);
        Self { components }
    }

    pub fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    /// Returns the prefix consisting of the first `len` components.
    pub fn truncate_at_index(&self, len: usize) -> Self {
        Self {
            components: self.components.iter().take(len).cloned().collect(),
        }
    }

    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.components.len() > other.components.len() {
            return false;
        }
        self.components.iter().zip(other.components.iter()).all(|(a, b)| a == b)
    }

    /// `true` if `a` and `b` share a prefix, both end in a version component,
    /// and `a`'s version strictly exceeds `b`'s.
    pub fn is_later_version_of(a: &Self, b: &Self) -> bool {
        if a.components.len() != b.components.len() || a.components.is_empty() {
            return false;
        }
        let prefix_len = a.components.len() - 1;
        if a.components[..prefix_len] != b.components[..prefix_len] {
            return false;
        }
        match (a.components.last(), b.components.last()) {
            (Some(va), Some(vb)) if va.is_version() && vb.is_version() => {
                va.version_value() > vb.version_value()
            }
            _ => false,
        }
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.components.len().cmp(&other.components.len())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "ccnx:/");
        }
        write!(f, "ccnx:")?;
        for c in &self.components {
            write!(f, "/{}", c)?;
        }
        Ok(())
    }
}

fn percent_decode_component(s: &str) -> Component {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(v) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                out.push(v);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    Component::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_round_trip() {
        let name = Name::from_uri("ccnx:/a/b/c");
        assert_eq!(name.len(), 3);
        assert_eq!(name.to_string(), "ccnx:/a/b/c");
    }

    #[test]
    fn ordering_is_total_and_prefix_respects_it() {
        let a = Name::from_uri("ccnx:/a/b");
        let b = Name::from_uri("ccnx:/a/b/c");
        let c = Name::from_uri("ccnx:/a/c");

        assert!(a < b);
        assert!(a.is_prefix_of(&b));
        assert!(!b.is_prefix_of(&a));
        assert!(a < c);
        assert_ne!(a, c);
    }

    #[test]
    fn version_and_segment_markers() {
        let base = Name::from_uri("ccnx:/a/b");
        let v1 = base.append(Component::version(100));
        let v2 = base.append(Component::version(200));
        assert!(Name::is_later_version_of(&v2, &v1));
        assert!(!Name::is_later_version_of(&v1, &v2));

        let seg = v2.append(Component::segment(0));
        assert!(seg.get(3).unwrap().is_segment());
    }

    #[test]
    fn percent_encoding_round_trips_nonprintable_bytes() {
        let name = Name::from_components(vec![Component::new(vec![0x00, 0xFF, b'a'])]);
        let uri = name.to_string();
        let parsed = Name::from_uri(&uri);
        assert_eq!(parsed, name);
    }
}
