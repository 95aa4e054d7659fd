//! Registration entries for the repository's self-presentation as a FIB
//! next hop (§4.10). Building the entry is factored out of the connection
//! handling in [`crate::worker`] so a one-shot caller and the long-lived
//! worker loop share the exact same self-registration shape.

use ccnd_common::name::Name;
use ccnd_common::packet::{ForwardingEntry, RegistrationAction, FIB_FLAG_ACTIVE, FIB_FLAG_CHILD_INHERIT};

/// Default lifetime a repository requests for its own self-registration;
/// the forwarder clamps this to its own configured maximum regardless.
const SELF_REGISTRATION_LIFETIME_SECONDS: u32 = 3600;

pub fn build_registration_entry(prefix: Name) -> ForwardingEntry {
    ForwardingEntry {
        action: RegistrationAction::SelfRegister,
        prefix,
        publisher_key_digest: None,
        face_id: None,
        flags: FIB_FLAG_ACTIVE | FIB_FLAG_CHILD_INHERIT,
        lifetime_seconds: SELF_REGISTRATION_LIFETIME_SECONDS,
    }
}
