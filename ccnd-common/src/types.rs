//! Small identifier types shared between the forwarder, transport, and
//! repository crates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable integer identifying a face for the lifetime of the process.
///
/// PIT and FIB entries reference faces only by id (a "weak reference" per
/// the ownership model) so that a closed face can be cleaned up without
/// walking every table looking for a shared handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaceId(pub u32);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "face#{}", self.0)
    }
}

/// Monotonically increasing accession number assigned to content-store entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Accession(pub u64);

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque token returned by the scheduler, used to cancel a pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerToken(pub u64);
