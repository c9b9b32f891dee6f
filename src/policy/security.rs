//! Process identity snapshot and the privilege-drift guard.
//!
//! The shell refuses to start as root and refuses to execute anything once
//! the process credentials differ from those captured at startup. The
//! executor consults [`SecurityPolicy::identity_unchanged`] before every
//! external spawn, every filesystem-touching builtin, and every background
//! unit.

use nix::unistd::{getegid, geteuid, getgid, getuid};

/// Exit status used for all security refusals.
pub const SECURITY_EXIT: i32 = 125;

/// Real and effective user/group ids at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentitySnapshot {
    pub uid: u32,
    pub euid: u32,
    pub gid: u32,
    pub egid: u32,
}

/// Take a fresh snapshot of the current process credentials.
pub fn snapshot_identity() -> IdentitySnapshot {
    IdentitySnapshot {
        uid: getuid().as_raw(),
        euid: geteuid().as_raw(),
        gid: getgid().as_raw(),
        egid: getegid().as_raw(),
    }
}

/// Holds the startup identity; immutable after construction.
#[derive(Debug, Clone, Copy)]
pub struct SecurityPolicy {
    start: IdentitySnapshot,
}

impl SecurityPolicy {
    /// Capture the current process identity as the startup baseline.
    pub fn capture_startup_identity() -> Self {
        Self { start: snapshot_identity() }
    }

    /// Build a policy from an explicit snapshot.
    pub fn from_snapshot(start: IdentitySnapshot) -> Self {
        Self { start }
    }

    /// Returns a nonzero exit code when the startup identity is root.
    /// Call once, very early.
    pub fn refuse_root_start(&self) -> i32 {
        if self.start.uid == 0 || self.start.euid == 0 {
            SECURITY_EXIT
        } else {
            0
        }
    }

    /// Field-wise compare a fresh snapshot against the startup identity.
    pub fn identity_unchanged(&self) -> bool {
        snapshot_identity() == self.start
    }

    pub fn startup(&self) -> IdentitySnapshot {
        self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_unchanged_within_process() {
        let policy = SecurityPolicy::capture_startup_identity();
        assert!(policy.identity_unchanged());
    }

    #[test]
    fn test_refuse_root_start_for_root_snapshot() {
        let root = IdentitySnapshot { uid: 0, euid: 0, gid: 0, egid: 0 };
        assert_eq!(SecurityPolicy::from_snapshot(root).refuse_root_start(), SECURITY_EXIT);

        let setuid_root = IdentitySnapshot { uid: 1000, euid: 0, gid: 1000, egid: 1000 };
        assert_eq!(SecurityPolicy::from_snapshot(setuid_root).refuse_root_start(), SECURITY_EXIT);
    }

    #[test]
    fn test_refuse_root_start_for_regular_user() {
        let user = IdentitySnapshot { uid: 1000, euid: 1000, gid: 1000, egid: 1000 };
        assert_eq!(SecurityPolicy::from_snapshot(user).refuse_root_start(), 0);
    }

    #[test]
    fn test_drift_detected_against_foreign_snapshot() {
        let mut other = snapshot_identity();
        other.euid = other.euid.wrapping_add(1);
        let policy = SecurityPolicy::from_snapshot(other);
        assert!(!policy.identity_unchanged());
    }
}
