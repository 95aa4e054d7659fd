//! Forwarding Information Base and pluggable forwarding strategy (§4.5).
//!
//! The longest-prefix-match walk and depth-ordered face collection follow
//! `fidinda-reto::tables::Tables::hops_for_name`: every trie node on the
//! path from the root to the Interest's name can contribute registered
//! faces, and faces registered deeper in the tree take priority. A node
//! exactly at the Interest's name always contributes; a node that is only
//! a strict ancestor of it contributes only if its own entries carry
//! CHILD_INHERIT (§4.10) — a registration that omits the flag is a
//! precise, non-inheriting next hop and answers nothing more specific than
//! its own exact name.

use ccnd_common::name::{Component, Name};
use ccnd_common::packet::FIB_FLAG_CHILD_INHERIT;
use ccnd_common::types::FaceId;
use std::collections::HashMap;

/// A single face registered at a FIB node, with the flags and optional
/// expiry carried by the registration protocol (§4.10). `expiry_ms` is an
/// absolute epoch-millisecond deadline, matching the `now_ms: u64`
/// convention used by `Pit`/`ContentStore`; `None` means the registration
/// never expires on its own (e.g. the internal `RegisterPrefix` command
/// used outside the wire protocol).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FibEntry {
    pub face: FaceId,
    pub flags: u32,
    pub expiry_ms: Option<u64>,
}

impl FibEntry {
    fn child_inherit(&self) -> bool {
        self.flags & FIB_FLAG_CHILD_INHERIT != 0
    }
}

#[derive(Default)]
struct FibNode {
    children: HashMap<Component, FibNode>,
    entries: Vec<FibEntry>,
}

/// Longest-prefix-match routing table from name prefixes to candidate
/// next-hop faces.
pub struct Fib {
    root: FibNode,
}

impl Default for Fib {
    fn default() -> Self {
        Self::new()
    }
}

impl Fib {
    pub fn new() -> Self {
        Self { root: FibNode::default() }
    }

    /// Registers `face` at `prefix` with `flags`/`expiry_ms`, refreshing the
    /// existing entry for that face at this prefix if one is already
    /// present rather than duplicating it.
    pub fn register(&mut self, prefix: &Name, face: FaceId, flags: u32, expiry_ms: Option<u64>) {
        let node = self.node_mut(prefix.components());
        if let Some(existing) = node.entries.iter_mut().find(|e| e.face == face) {
            existing.flags = flags;
            existing.expiry_ms = expiry_ms;
        } else {
            node.entries.push(FibEntry { face, flags, expiry_ms });
        }
    }

    /// Returns `true` if a registration existed and was removed.
    pub fn unregister(&mut self, prefix: &Name, face: FaceId) -> bool {
        let Some(node) = self.node_mut_existing(prefix.components()) else { return false };
        let before = node.entries.len();
        node.entries.retain(|e| e.face != face);
        node.entries.len() != before
    }

    pub fn remove_face(&mut self, face: FaceId) {
        Self::remove_face_from(&mut self.root, face);
    }

    fn remove_face_from(node: &mut FibNode, face: FaceId) {
        node.entries.retain(|e| e.face != face);
        for child in node.children.values_mut() {
            Self::remove_face_from(child, face);
        }
    }

    /// Removes every entry whose `expiry_ms` is at or before `now_ms`.
    /// Entries with no expiry (`None`) never get swept here.
    pub fn sweep_expired(&mut self, now_ms: u64) {
        Self::sweep_node(&mut self.root, now_ms);
    }

    fn sweep_node(node: &mut FibNode, now_ms: u64) {
        node.entries.retain(|e| e.expiry_ms.map_or(true, |exp| exp > now_ms));
        for child in node.children.values_mut() {
            Self::sweep_node(child, now_ms);
        }
    }

    /// Faces for `name`'s longest matching registered prefix, ordered by
    /// depth descending (deepest/most specific first) and deduplicated by
    /// keeping the deepest occurrence.
    ///
    /// The walk visits every trie node from the root down to wherever
    /// `name`'s components stop matching. A node registered at exactly
    /// `name`'s own depth always contributes its faces: it's a direct hit,
    /// not an inherited one. A node registered at a shallower depth — a
    /// strict ancestor of `name` — only contributes if its own entries
    /// carry CHILD_INHERIT; without the flag that registration answers
    /// nothing more specific than its own exact name.
    pub fn hops_for_name(&self, name: &Name) -> Vec<FaceId> {
        let total = name.components().len();
        let mut path = vec![&self.root];
        let mut node = &self.root;
        for component in name.components() {
            let Some(next) = node.children.get(component) else { break };
            node = next;
            path.push(node);
        }

        let mut by_face: HashMap<FaceId, usize> = HashMap::new();
        for (depth, node) in path.iter().enumerate() {
            let exact = depth == total;
            for entry in &node.entries {
                if exact || entry.child_inherit() {
                    by_face.entry(entry.face).and_modify(|d| *d = depth.max(*d)).or_insert(depth);
                }
            }
        }

        let mut faces: Vec<(FaceId, usize)> = by_face.into_iter().collect();
        faces.sort_by(|a, b| b.1.cmp(&a.1));
        faces.into_iter().map(|(f, _)| f).collect()
    }

    fn node_mut(&mut self, path: &[Component]) -> &mut FibNode {
        let mut node = &mut self.root;
        for c in path {
            node = node.children.entry(c.clone()).or_default();
        }
        node
    }

    fn node_mut_existing(&mut self, path: &[Component]) -> Option<&mut FibNode> {
        let mut node = &mut self.root;
        for c in path {
            node = node.children.get_mut(c)?;
        }
        Some(node)
    }
}

/// Decides which faces an Interest should be sent out on, and reacts to
/// satisfaction/timeout events for the entry it chose faces for. The
/// default strategy simply floods every FIB next-hop except the arrival
/// face and never retransmits on timeout.
pub trait ForwardingStrategy: Send {
    fn select_outgoing(
        &self,
        name: &Name,
        arrival_face: FaceId,
        fib: &Fib,
        already_tried: &[FaceId],
    ) -> Vec<FaceId>;

    fn on_satisfied(&self, _name: &Name, _face: FaceId) {}

    /// Whether a PIT entry past its deadline should be retransmitted.
    fn on_timeout(&self, _name: &Name, _attempt: u32) -> bool {
        false
    }
}

/// Forwards to every FIB next-hop not already tried and not the arrival
/// face; never retransmits.
pub struct FloodStrategy;

impl ForwardingStrategy for FloodStrategy {
    fn select_outgoing(
        &self,
        name: &Name,
        arrival_face: FaceId,
        fib: &Fib,
        already_tried: &[FaceId],
    ) -> Vec<FaceId> {
        fib.hops_for_name(name)
            .into_iter()
            .filter(|f| *f != arrival_face && !already_tried.contains(f))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccnd_common::packet::{FIB_FLAG_ACTIVE, FIB_FLAG_ADVERTISE};

    const INHERIT: u32 = FIB_FLAG_ACTIVE | FIB_FLAG_CHILD_INHERIT;
    const NO_INHERIT: u32 = FIB_FLAG_ACTIVE;

    #[test]
    fn longest_prefix_wins_ordering_when_both_levels_inherit() {
        let mut fib = Fib::new();
        fib.register(&Name::from_uri("ccnx:/a"), FaceId(1), INHERIT, None);
        fib.register(&Name::from_uri("ccnx:/a/b"), FaceId(2), INHERIT, None);

        let hops = fib.hops_for_name(&Name::from_uri("ccnx:/a/b/c"));
        assert_eq!(hops, vec![FaceId(2), FaceId(1)]);
    }

    #[test]
    fn non_inheriting_registration_only_answers_its_own_exact_name() {
        let mut fib = Fib::new();
        fib.register(&Name::from_uri("ccnx:/a"), FaceId(1), INHERIT, None);
        fib.register(&Name::from_uri("ccnx:/a/b"), FaceId(2), NO_INHERIT, None);

        // /a/b's own flag doesn't gate whether it matches /a/b/c; it always
        // would via CHILD_INHERIT if set, but here it's NOT set, so /a/b
        // never applies to anything but an exact "/a/b" Interest. The
        // surviving route comes from /a instead, which does inherit.
        let hops = fib.hops_for_name(&Name::from_uri("ccnx:/a/b/c"));
        assert_eq!(hops, vec![FaceId(1)]);
    }

    #[test]
    fn non_inheriting_registration_does_not_answer_more_specific_names() {
        let mut fib = Fib::new();
        fib.register(&Name::from_uri("ccnx:/a"), FaceId(1), NO_INHERIT, None);

        assert!(fib.hops_for_name(&Name::from_uri("ccnx:/a/b/c")).is_empty());
        assert_eq!(fib.hops_for_name(&Name::from_uri("ccnx:/a")), vec![FaceId(1)]);
    }

    #[test]
    fn unregister_removes_only_the_named_face() {
        let mut fib = Fib::new();
        fib.register(&Name::from_uri("ccnx:/a"), FaceId(1), NO_INHERIT, None);
        fib.register(&Name::from_uri("ccnx:/a"), FaceId(2), NO_INHERIT, None);
        assert!(fib.unregister(&Name::from_uri("ccnx:/a"), FaceId(1)));

        let hops = fib.hops_for_name(&Name::from_uri("ccnx:/a"));
        assert_eq!(hops, vec![FaceId(2)]);
    }

    #[test]
    fn re_registering_the_same_face_refreshes_flags_instead_of_duplicating() {
        let mut fib = Fib::new();
        fib.register(&Name::from_uri("ccnx:/a"), FaceId(1), NO_INHERIT, Some(100));
        fib.register(&Name::from_uri("ccnx:/a"), FaceId(1), FIB_FLAG_ADVERTISE, Some(200));

        let hops = fib.hops_for_name(&Name::from_uri("ccnx:/a"));
        assert_eq!(hops, vec![FaceId(1)]);
    }

    #[test]
    fn sweep_expired_drops_only_entries_past_their_deadline() {
        let mut fib = Fib::new();
        fib.register(&Name::from_uri("ccnx:/a"), FaceId(1), NO_INHERIT, Some(100));
        fib.register(&Name::from_uri("ccnx:/a"), FaceId(2), NO_INHERIT, None);

        fib.sweep_expired(150);

        let hops = fib.hops_for_name(&Name::from_uri("ccnx:/a"));
        assert_eq!(hops, vec![FaceId(2)]);
    }

    #[test]
    fn flood_strategy_excludes_arrival_face_and_already_tried() {
        let mut fib = Fib::new();
        fib.register(&Name::from_uri("ccnx:/a"), FaceId(1), NO_INHERIT, None);
        fib.register(&Name::from_uri("ccnx:/a"), FaceId(2), NO_INHERIT, None);
        fib.register(&Name::from_uri("ccnx:/a"), FaceId(3), NO_INHERIT, None);

        let strategy = FloodStrategy;
        let out = strategy.select_outgoing(
            &Name::from_uri("ccnx:/a"),
            FaceId(1),
            &fib,
            &[FaceId(3)],
        );
        assert_eq!(out, vec![FaceId(2)]);
    }
}
