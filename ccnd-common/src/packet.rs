//! Interests, Content Objects, and the registration-entry payload, encoded
//! as ccnb token streams over the primitives in [`crate::wire`].

use crate::dtag;
use crate::error::WireError;
use crate::name::{Component, Name};
use crate::wire::{self, Cursor};
use bytes::{Bytes, BytesMut};
use sha2::{Digest, Sha256};
use std::ops::Range;
use std::time::{SystemTime, UNIX_EPOCH};

/// Content type carried in a Content Object's SignedInfo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Data,
    Encr,
    Gone,
    Key,
    Link,
    Nack,
}

impl ContentType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Data => "DATA",
            Self::Encr => "ENCR",
            Self::Gone => "GONE",
            Self::Key => "KEY",
            Self::Link => "LINK",
            Self::Nack => "NACK",
        }
    }

    fn from_str(s: &str) -> Result<Self, WireError> {
        Ok(match s {
            "DATA" => Self::Data,
            "ENCR" => Self::Encr,
            "GONE" => Self::Gone,
            "KEY" => Self::Key,
            "LINK" => Self::Link,
            "NACK" => Self::Nack,
            other => return Err(WireError::Malformed(format!("unknown content type {other}"))),
        })
    }
}

/// Where a Content Object's key may be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLocator {
    Name(Name),
    KeyDigest(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInfo {
    pub publisher_key_id: Option<Bytes>,
    /// Binary timestamp (arbitrary monotonic unit, big-endian on the wire).
    pub timestamp: u64,
    pub content_type: ContentType,
    pub freshness_seconds: Option<u32>,
    pub final_block_id: Option<Component>,
    pub key_locator: Option<KeyLocator>,
}

impl SignedInfo {
    pub fn new(content_type: ContentType) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            publisher_key_id: None,
            timestamp,
            content_type,
            freshness_seconds: None,
            final_block_id: None,
            key_locator: None,
        }
    }
}

/// A signed, named data unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentObject {
    pub name: Name,
    pub signed_info: SignedInfo,
    pub content: Bytes,
    pub signature: Bytes,
}

impl ContentObject {
    /// Builds an unsigned object and immediately applies the default
    /// digest-based signature (see [`digest_sign`]).
    pub fn new_signed(name: Name, signed_info: SignedInfo, content: impl Into<Bytes>) -> Self {
        let mut co = Self {
            name,
            signed_info,
            content: content.into(),
            signature: Bytes::new(),
        };
        co.signature = digest_sign(&co);
        co
    }

    /// Whether the freshness window (if any) has elapsed as of `now_ms`
    /// since the object's timestamp.
    pub fn is_fresh(&self, now_ms: u64) -> bool {
        match self.signed_info.freshness_seconds {
            None => true,
            Some(secs) => now_ms.saturating_sub(self.signed_info.timestamp) < (secs as u64) * 1000,
        }
    }
}

/// Computes the default `DigestSha256`-style signature: a hash over the
/// name, signed-info fields, and payload. There is no PKI trust evaluation
/// here — only enough to detect accidental mutation after signing.
pub fn digest_sign(co: &ContentObject) -> Bytes {
    let mut hasher = Sha256::new();
    hasher.update(co.name.to_string().as_bytes());
    hasher.update(co.signed_info.timestamp.to_be_bytes());
    hasher.update(co.signed_info.content_type.as_str().as_bytes());
    hasher.update(&co.content);
    Bytes::copy_from_slice(&hasher.finalize())
}

pub fn digest_verify(co: &ContentObject) -> bool {
    digest_sign(co) == co.signature
}

/// One element of an Interest's Exclude filter: either a bookend component
/// or an `Any` gap between two bookends.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExcludeElement {
    Component(Component),
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Exclude(pub Vec<ExcludeElement>);

impl Exclude {
    /// `true` if `component` is excluded: it matches a listed bookend, or
    /// it falls strictly between two bookends flanking an `Any` marker.
    pub fn excludes(&self, component: &Component) -> bool {
        for (i, el) in self.0.iter().enumerate() {
            match el {
                ExcludeElement::Component(c) if c == component => return true,
                ExcludeElement::Any => {
                    let lower = i.checked_sub(1).and_then(|j| self.0.get(j)).and_then(as_component);
                    let upper = self.0.get(i + 1).and_then(as_component);
                    let above_lower = lower.map_or(true, |l| component > l);
                    let below_upper = upper.map_or(true, |u| component < u);
                    if above_lower && below_upper {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }
}

fn as_component(el: &ExcludeElement) -> Option<&Component> {
    match el {
        ExcludeElement::Component(c) => Some(c),
        ExcludeElement::Any => None,
    }
}

/// Which sources of content may satisfy an Interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnswerOriginKind {
    pub allow_content_store: bool,
    pub allow_generated: bool,
    pub allow_stale: bool,
    pub allow_expired: bool,
}

impl Default for AnswerOriginKind {
    fn default() -> Self {
        Self {
            allow_content_store: true,
            allow_generated: true,
            allow_stale: false,
            allow_expired: false,
        }
    }
}

impl AnswerOriginKind {
    fn to_bits(self) -> u8 {
        (self.allow_content_store as u8)
            | (self.allow_generated as u8) << 1
            | (self.allow_stale as u8) << 2
            | (self.allow_expired as u8) << 3
    }

    fn from_bits(bits: u8) -> Self {
        Self {
            allow_content_store: bits & 1 != 0,
            allow_generated: bits & 2 != 0,
            allow_stale: bits & 4 != 0,
            allow_expired: bits & 8 != 0,
        }
    }
}

/// Fields narrowing which Content Object may satisfy an Interest beyond
/// name-prefix match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Selectors {
    pub publisher_key_id: Option<Bytes>,
    pub min_suffix_components: Option<u32>,
    pub max_suffix_components: Option<u32>,
    pub scope: Option<u8>,
    pub answer_origin_kind: Option<AnswerOriginKind>,
    pub exclude: Option<Exclude>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    pub selectors: Selectors,
    /// Up to 12 bytes; uniquely identifies this Interest instance for loop
    /// suppression when present.
    pub nonce: Option<Bytes>,
    pub lifetime_ms: Option<u32>,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            selectors: Selectors::default(),
            nonce: None,
            lifetime_ms: Some(4000),
        }
    }

    pub fn with_nonce(mut self, nonce: impl Into<Bytes>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn with_lifetime_ms(mut self, lifetime_ms: u32) -> Self {
        self.lifetime_ms = Some(lifetime_ms);
        self
    }
}

/// Matching predicate: does `co` satisfy `interest`?
///
/// Exclude is evaluated before the min/max suffix-count constraints (the
/// documented consensus order where the source left precedence unspecified).
pub fn matches(interest: &Interest, co: &ContentObject) -> bool {
    if !interest.name.is_prefix_of(&co.name) {
        return false;
    }
    let sel = &interest.selectors;
    if let Some(key_id) = &sel.publisher_key_id {
        if co.signed_info.publisher_key_id.as_ref() != Some(key_id) {
            return false;
        }
    }
    if let Some(exclude) = &sel.exclude {
        if let Some(next) = co.name.get(interest.name.len()) {
            if exclude.excludes(next) {
                return false;
            }
        }
    }
    let suffix_len = co.name.len() - interest.name.len();
    if let Some(min) = sel.min_suffix_components {
        if (suffix_len as u32) < min {
            return false;
        }
    }
    if let Some(max) = sel.max_suffix_components {
        if (suffix_len as u32) > max {
            return false;
        }
    }
    true
}

/// Byte ranges (relative to the start of the encoded message) of the
/// structural elements the forwarder needs for byte-exact re-emission
/// without re-parsing or re-signing.
#[derive(Debug, Clone, Default)]
pub struct ParseOffsets {
    pub name: Option<Range<usize>>,
    pub signed_info: Option<Range<usize>>,
    pub final_block_id: Option<Range<usize>>,
    /// Content Objects carry no nonce; kept for symmetry with the field
    /// list forwarders consult regardless of message kind.
    pub nonce: Option<Range<usize>>,
    pub signature: Option<Range<usize>>,
}

fn encode_name(name: &Name, out: &mut BytesMut) {
    wire::start_dtag(dtag::NAME, out);
    for c in name.components() {
        wire::write_tagged_blob(dtag::COMPONENT, c.as_bytes(), out);
    }
    wire::end_tag(out);
}

fn decode_name(cur: &mut Cursor) -> Result<Name, WireError> {
    cur.expect_dtag(dtag::NAME)?;
    let mut components = Vec::new();
    while cur.try_dtag(dtag::COMPONENT)? {
        let bytes = cur.read_blob()?;
        cur.expect_close()?;
        components.push(Component::new(bytes));
    }
    cur.expect_close()?;
    Ok(Name::from_components(components))
}

fn encode_exclude(exclude: &Exclude, out: &mut BytesMut) {
    wire::start_dtag(dtag::EXCLUDE, out);
    for el in &exclude.0 {
        match el {
            ExcludeElement::Component(c) => {
                wire::write_tagged_blob(dtag::COMPONENT, c.as_bytes(), out)
            }
            ExcludeElement::Any => {
                wire::start_dtag(dtag::EXCLUDE_ANY, out);
                wire::end_tag(out);
            }
        }
    }
    wire::end_tag(out);
}

fn decode_exclude(cur: &mut Cursor) -> Result<Exclude, WireError> {
    cur.expect_dtag(dtag::EXCLUDE)?;
    let mut elements = Vec::new();
    loop {
        if cur.try_dtag(dtag::COMPONENT)? {
            let bytes = cur.read_blob()?;
            cur.expect_close()?;
            elements.push(ExcludeElement::Component(Component::new(bytes)));
        } else if cur.try_dtag(dtag::EXCLUDE_ANY)? {
            cur.expect_close()?;
            elements.push(ExcludeElement::Any);
        } else {
            break;
        }
    }
    cur.expect_close()?;
    Ok(Exclude(elements))
}

/// Encodes an Interest as a ccnb token stream.
pub fn encode_interest(interest: &Interest) -> Bytes {
    let mut out = BytesMut::new();
    wire::start_dtag(dtag::INTEREST, &mut out);
    encode_name(&interest.name, &mut out);

    let sel = &interest.selectors;
    if let Some(key_id) = &sel.publisher_key_id {
        wire::write_tagged_blob(dtag::PUBLISHER_PUBLICKEY_DIGEST, key_id, &mut out);
    }
    if let Some(min) = sel.min_suffix_components {
        wire::write_tagged_udata(dtag::MIN_SUFFIX_COMPONENTS, &min.to_string(), &mut out);
    }
    if let Some(max) = sel.max_suffix_components {
        wire::write_tagged_udata(dtag::MAX_SUFFIX_COMPONENTS, &max.to_string(), &mut out);
    }
    if let Some(exclude) = &sel.exclude {
        encode_exclude(exclude, &mut out);
    }
    if let Some(scope) = sel.scope {
        wire::write_tagged_udata(dtag::SCOPE, &scope.to_string(), &mut out);
    }
    if let Some(aok) = sel.answer_origin_kind {
        wire::write_tagged_udata(dtag::ANSWER_ORIGIN_KIND, &aok.to_bits().to_string(), &mut out);
    }
    if let Some(lifetime) = interest.lifetime_ms {
        wire::write_tagged_udata(dtag::INTEREST_LIFETIME, &lifetime.to_string(), &mut out);
    }
    if let Some(nonce) = &interest.nonce {
        wire::write_tagged_blob(dtag::NONCE, nonce, &mut out);
    }
    wire::end_tag(&mut out);
    out.freeze()
}

/// Parses an Interest, returning the value and the number of bytes consumed.
///
/// Unknown non-critical elements between the Name and the closing tag are
/// skipped; an unrecognized `Dtag`/`Tag` cannot be told apart from a
/// critical one at this layer, so any unexpected tag is treated as
/// critical and rejected (conservative, matching §4.1's failure-mode list).
pub fn parse_interest(bytes: &[u8]) -> Result<(Interest, usize), WireError> {
    let mut cur = Cursor::new(bytes);
    cur.expect_dtag(dtag::INTEREST)?;
    let name = decode_name(&mut cur)?;

    let mut selectors = Selectors::default();
    selectors.publisher_key_id = cur.try_tagged_blob(dtag::PUBLISHER_PUBLICKEY_DIGEST)?;
    if let Some(s) = cur.try_tagged_udata(dtag::MIN_SUFFIX_COMPONENTS)? {
        selectors.min_suffix_components = s.parse().ok();
    }
    if let Some(s) = cur.try_tagged_udata(dtag::MAX_SUFFIX_COMPONENTS)? {
        selectors.max_suffix_components = s.parse().ok();
    }
    if cur.peek_dtag(dtag::EXCLUDE)? {
        selectors.exclude = Some(decode_exclude(&mut cur)?);
    }
    if let Some(s) = cur.try_tagged_udata(dtag::SCOPE)? {
        selectors.scope = s.parse().ok();
    }
    if let Some(s) = cur.try_tagged_udata(dtag::ANSWER_ORIGIN_KIND)? {
        selectors.answer_origin_kind = s.parse::<u8>().ok().map(AnswerOriginKind::from_bits);
    }
    let lifetime_ms = match cur.try_tagged_udata(dtag::INTEREST_LIFETIME)? {
        Some(s) => s.parse().ok(),
        None => None,
    };
    let nonce = cur.try_tagged_blob(dtag::NONCE)?;
    cur.expect_close()?;

    Ok((
        Interest { name, selectors, nonce, lifetime_ms },
        cur.position(),
    ))
}

/// Encodes a Content Object as a ccnb token stream.
pub fn encode_content_object(co: &ContentObject) -> Bytes {
    let mut out = BytesMut::new();
    wire::start_dtag(dtag::CONTENT_OBJECT, &mut out);
    encode_name(&co.name, &mut out);

    wire::start_dtag(dtag::SIGNED_INFO, &mut out);
    if let Some(key_id) = &co.signed_info.publisher_key_id {
        wire::write_tagged_blob(dtag::PUBLISHER_KEY_ID, key_id, &mut out);
    }
    wire::write_tagged_udata(dtag::TIMESTAMP, &co.signed_info.timestamp.to_string(), &mut out);
    wire::write_tagged_udata(dtag::TYPE, co.signed_info.content_type.as_str(), &mut out);
    if let Some(fresh) = co.signed_info.freshness_seconds {
        wire::write_tagged_udata(dtag::FRESHNESS_SECONDS, &fresh.to_string(), &mut out);
    }
    if let Some(fbid) = &co.signed_info.final_block_id {
        wire::write_tagged_blob(dtag::FINAL_BLOCK_ID, fbid.as_bytes(), &mut out);
    }
    if let Some(locator) = &co.signed_info.key_locator {
        wire::start_dtag(dtag::KEY_LOCATOR, &mut out);
        match locator {
            KeyLocator::Name(name) => {
                wire::start_dtag(dtag::KEY_LOCATOR_NAME, &mut out);
                encode_name(name, &mut out);
                wire::end_tag(&mut out);
            }
            KeyLocator::KeyDigest(digest) => {
                wire::write_tagged_blob(dtag::KEY_LOCATOR_DIGEST, digest, &mut out);
            }
        }
        wire::end_tag(&mut out);
    }
    wire::end_tag(&mut out); // SignedInfo

    wire::write_tagged_blob(dtag::CONTENT, &co.content, &mut out);
    wire::write_tagged_blob(dtag::SIGNATURE, &co.signature, &mut out);
    wire::end_tag(&mut out); // ContentObject
    out.freeze()
}

/// Parses a Content Object, returning the value, bytes consumed, and the
/// structural offsets needed for byte-exact re-emission.
pub fn parse_content_object(
    bytes: &[u8],
) -> Result<(ContentObject, usize, ParseOffsets), WireError> {
    let mut offsets = ParseOffsets::default();
    let mut cur = Cursor::new(bytes);
    cur.expect_dtag(dtag::CONTENT_OBJECT)?;

    let name_start = cur.position();
    let name = decode_name(&mut cur)?;
    offsets.name = Some(name_start..cur.position());

    let si_start = cur.position();
    cur.expect_dtag(dtag::SIGNED_INFO)?;
    let publisher_key_id = cur.try_tagged_blob(dtag::PUBLISHER_KEY_ID)?;
    let timestamp = cur
        .try_tagged_udata(dtag::TIMESTAMP)?
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let content_type = match cur.try_tagged_udata(dtag::TYPE)? {
        Some(s) => ContentType::from_str(&s)?,
        None => ContentType::Data,
    };
    let freshness_seconds = match cur.try_tagged_udata(dtag::FRESHNESS_SECONDS)? {
        Some(s) => s.parse().ok(),
        None => None,
    };
    let final_block_start = cur.position();
    let final_block_id = cur.try_tagged_blob(dtag::FINAL_BLOCK_ID)?.map(Component::new);
    if final_block_id.is_some() {
        offsets.final_block_id = Some(final_block_start..cur.position());
    }
    let key_locator = if cur.try_dtag(dtag::KEY_LOCATOR)? {
        let locator = if cur.try_dtag(dtag::KEY_LOCATOR_NAME)? {
            let name = decode_name(&mut cur)?;
            cur.expect_close()?;
            KeyLocator::Name(name)
        } else {
            let digest = cur.read_tagged_blob(dtag::KEY_LOCATOR_DIGEST)?;
            KeyLocator::KeyDigest(digest)
        };
        cur.expect_close()?;
        Some(locator)
    } else {
        None
    };
    cur.expect_close()?; // SignedInfo
    offsets.signed_info = Some(si_start..cur.position());

    let content = cur.read_tagged_blob(dtag::CONTENT)?;

    let sig_start = cur.position();
    let signature = cur.read_tagged_blob(dtag::SIGNATURE)?;
    offsets.signature = Some(sig_start..cur.position());

    cur.expect_close()?; // ContentObject

    let co = ContentObject {
        name,
        signed_info: SignedInfo {
            publisher_key_id,
            timestamp,
            content_type,
            freshness_seconds,
            final_block_id,
            key_locator,
        },
        content,
        signature,
    };
    Ok((co, cur.position(), offsets))
}

/// Which table operation a registration Interest requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationAction {
    Register,
    SelfRegister,
    Unregister,
}

impl RegistrationAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::SelfRegister => "selfreg",
            Self::Unregister => "unregister",
        }
    }

    fn from_str(s: &str) -> Result<Self, WireError> {
        Ok(match s {
            "register" => Self::Register,
            "selfreg" => Self::SelfRegister,
            "unregister" => Self::Unregister,
            other => return Err(WireError::Malformed(format!("unknown registration action {other}"))),
        })
    }
}

/// Bits carried in `ForwardingEntry::flags` and stored per FIB entry (§4.5/§4.10).
pub const FIB_FLAG_ACTIVE: u32 = 0x1;
pub const FIB_FLAG_CHILD_INHERIT: u32 = 0x2;
pub const FIB_FLAG_ADVERTISE: u32 = 0x4;

/// Decoded payload of a FIB registration Interest/reply (§4.10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingEntry {
    pub action: RegistrationAction,
    pub prefix: Name,
    pub publisher_key_digest: Option<Bytes>,
    pub face_id: Option<u32>,
    pub flags: u32,
    pub lifetime_seconds: u32,
}

pub fn encode_forwarding_entry(entry: &ForwardingEntry) -> Bytes {
    let mut out = BytesMut::new();
    wire::start_dtag(dtag::FORWARDING_ENTRY, &mut out);
    wire::write_tagged_udata(dtag::ACTION, entry.action.as_str(), &mut out);
    wire::start_dtag(dtag::PREFIX, &mut out);
    encode_name(&entry.prefix, &mut out);
    wire::end_tag(&mut out);
    if let Some(digest) = &entry.publisher_key_digest {
        wire::write_tagged_blob(dtag::PUBLISHER_KEY_DIGEST, digest, &mut out);
    }
    if let Some(face_id) = entry.face_id {
        wire::write_tagged_udata(dtag::FACE_ID, &face_id.to_string(), &mut out);
    }
    wire::write_tagged_udata(dtag::FLAGS, &entry.flags.to_string(), &mut out);
    wire::write_tagged_udata(
        dtag::LIFETIME_SECONDS,
        &entry.lifetime_seconds.to_string(),
        &mut out,
    );
    wire::end_tag(&mut out);
    out.freeze()
}

pub fn parse_forwarding_entry(bytes: &[u8]) -> Result<(ForwardingEntry, usize), WireError> {
    let mut cur = Cursor::new(bytes);
    cur.expect_dtag(dtag::FORWARDING_ENTRY)?;
    let action = RegistrationAction::from_str(
        &cur.try_tagged_udata(dtag::ACTION)?
            .ok_or(WireError::UnknownCriticalTag(dtag::ACTION))?,
    )?;
    cur.expect_dtag(dtag::PREFIX)?;
    let prefix = decode_name(&mut cur)?;
    cur.expect_close()?;
    let publisher_key_digest = cur.try_tagged_blob(dtag::PUBLISHER_KEY_DIGEST)?;
    let face_id = match cur.try_tagged_udata(dtag::FACE_ID)? {
        Some(s) => s.parse().ok(),
        None => None,
    };
    let flags = cur
        .try_tagged_udata(dtag::FLAGS)?
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let lifetime_seconds = cur
        .try_tagged_udata(dtag::LIFETIME_SECONDS)?
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    cur.expect_close()?;

    Ok((
        ForwardingEntry {
            action,
            prefix,
            publisher_key_digest,
            face_id,
            flags,
            lifetime_seconds,
        },
        cur.position(),
    ))
}

/// Marker component appended to the prefix being enumerated: an Interest
/// whose name ends in this component requests a name-enumeration response
/// (§4.9) rather than a content fetch, the same convention CCNx's repository
/// enumeration protocol uses.
pub const NAME_ENUMERATION_MARKER: &str = "%C1.E.by";

/// `true` if `interest.name`'s last component is the enumeration marker.
pub fn is_enumeration_interest(interest: &Interest) -> bool {
    interest
        .name
        .components()
        .last()
        .is_some_and(|c| c.as_bytes() == NAME_ENUMERATION_MARKER.as_bytes())
}

/// The prefix an enumeration Interest is asking about: its name with the
/// trailing marker component stripped. Panics if `interest` is not an
/// enumeration Interest; callers must check [`is_enumeration_interest`] first.
pub fn enumeration_prefix(interest: &Interest) -> Name {
    interest.name.truncate_at_index(interest.name.len() - 1)
}

/// Encodes a name-enumeration response body: the set of immediate child
/// components found under the enumerated prefix.
pub fn encode_name_enumeration_response(children: &[Component]) -> Bytes {
    let mut out = BytesMut::new();
    wire::start_dtag(dtag::NAME_ENUMERATION_RESPONSE, &mut out);
    for child in children {
        wire::write_tagged_blob(dtag::COMPONENT, child.as_bytes(), &mut out);
    }
    wire::end_tag(&mut out);
    out.freeze()
}

pub fn parse_name_enumeration_response(bytes: &[u8]) -> Result<Vec<Component>, WireError> {
    let mut cur = Cursor::new(bytes);
    cur.expect_dtag(dtag::NAME_ENUMERATION_RESPONSE)?;
    let mut children = Vec::new();
    while cur.try_dtag(dtag::COMPONENT)? {
        let bytes = cur.read_blob()?;
        cur.expect_close()?;
        children.push(Component::new(bytes));
    }
    cur.expect_close()?;
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_round_trips() {
        let interest = Interest::new(Name::from_uri("ccnx:/a/b"))
            .with_nonce(Bytes::from_static(b"abcd"))
            .with_lifetime_ms(4000);
        let encoded = encode_interest(&interest);
        let (decoded, consumed) = parse_interest(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, interest);
    }

    #[test]
    fn interest_with_selectors_round_trips() {
        let mut interest = Interest::new(Name::from_uri("ccnx:/a/b"));
        interest.selectors.min_suffix_components = Some(1);
        interest.selectors.max_suffix_components = Some(3);
        interest.selectors.exclude = Some(Exclude(vec![
            ExcludeElement::Component(Component::new(b"x".to_vec())),
            ExcludeElement::Any,
            ExcludeElement::Component(Component::new(b"z".to_vec())),
        ]));
        let encoded = encode_interest(&interest);
        let (decoded, _) = parse_interest(&encoded).unwrap();
        assert_eq!(decoded, interest);
    }

    #[test]
    fn content_object_round_trips_and_verifies() {
        let name = Name::from_uri("ccnx:/a/b").append(Component::version(1)).append(Component::segment(0));
        let mut info = SignedInfo::new(ContentType::Data);
        info.freshness_seconds = Some(10);
        let co = ContentObject::new_signed(name, info, Bytes::from_static(b"payload"));
        let encoded = encode_content_object(&co);
        let (decoded, consumed, offsets) = parse_content_object(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, co);
        assert!(digest_verify(&decoded));
        assert!(offsets.name.is_some());
        assert!(offsets.signature.is_some());
    }

    #[test]
    fn mutated_content_object_fails_digest_verify() {
        let name = Name::from_uri("ccnx:/a/b");
        let co = ContentObject::new_signed(name, SignedInfo::new(ContentType::Data), Bytes::from_static(b"x"));
        let mut mutated = co.clone();
        mutated.content = Bytes::from_static(b"y");
        assert!(!digest_verify(&mutated));
    }

    #[test]
    fn matching_predicate_honors_prefix_and_exclude() {
        let mut interest = Interest::new(Name::from_uri("ccnx:/a"));
        interest.selectors.exclude = Some(Exclude(vec![ExcludeElement::Component(Component::new(b"b".to_vec()))]));
        let excluded = ContentObject::new_signed(
            Name::from_uri("ccnx:/a/b"),
            SignedInfo::new(ContentType::Data),
            Bytes::new(),
        );
        let allowed = ContentObject::new_signed(
            Name::from_uri("ccnx:/a/c"),
            SignedInfo::new(ContentType::Data),
            Bytes::new(),
        );
        assert!(!matches(&interest, &excluded));
        assert!(matches(&interest, &allowed));
    }

    #[test]
    fn forwarding_entry_round_trips() {
        let entry = ForwardingEntry {
            action: RegistrationAction::SelfRegister,
            prefix: Name::from_uri("ccnx:/a"),
            publisher_key_digest: Some(Bytes::from_static(b"digest")),
            face_id: Some(7),
            flags: 3,
            lifetime_seconds: 300,
        };
        let encoded = encode_forwarding_entry(&entry);
        let (decoded, consumed) = parse_forwarding_entry(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, entry);
    }

    #[test]
    fn enumeration_interest_is_recognized_and_stripped_of_its_marker() {
        let plain = Interest::new(Name::from_uri("ccnx:/a/b"));
        assert!(!is_enumeration_interest(&plain));

        let enumeration = Interest::new(Name::from_uri("ccnx:/a/b").append(Component::new(NAME_ENUMERATION_MARKER)));
        assert!(is_enumeration_interest(&enumeration));
        assert_eq!(enumeration_prefix(&enumeration), Name::from_uri("ccnx:/a/b"));
    }

    #[test]
    fn name_enumeration_response_round_trips() {
        let children = vec![Component::new("x"), Component::new("y")];
        let encoded = encode_name_enumeration_response(&children);
        let decoded = parse_name_enumeration_response(&encoded).unwrap();
        assert_eq!(decoded, children);
    }
}
