//! Retention policy
//!
//! `prune` only decides. It never touches the filesystem; the backup
//! orchestrator deletes whatever it returns.

use std::num::NonZeroUsize;
use std::path::Path;

use crate::artifact::{sort_newest_first, Artifact};
use crate::errors::{OpsError, OpsResult};

pub const DEFAULT_KEEP_COUNT: usize = 7;

/// How many artifacts survive a backup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    keep_count: NonZeroUsize,
}

impl RetentionPolicy {
    pub fn new(keep_count: usize) -> OpsResult<Self> {
        NonZeroUsize::new(keep_count)
            .map(|keep_count| Self { keep_count })
            .ok_or_else(|| OpsError::Configuration("keep_count must be at least 1".to_string()))
    }

    pub fn keep_count(&self) -> usize {
        self.keep_count.get()
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_KEEP_COUNT).expect("default keep count is non-zero")
    }
}

/// Artifacts to delete so that exactly `min(len, keep_count)` survive.
///
/// Survivors are the newest by embedded timestamp; ties are broken by file
/// name, so the choice is the same regardless of input order.
pub fn prune(all: &[Artifact], policy: &RetentionPolicy) -> Vec<Artifact> {
    let mut ordered = all.to_vec();
    sort_newest_first(&mut ordered);
    ordered.into_iter().skip(policy.keep_count()).collect()
}

/// Like `prune`, but `protected` always survives and takes one of the
/// `keep_count` slots. The remaining slots go to the newest of the others.
///
/// A backup run protects the artifact it just wrote, so a future-dated file
/// already in the store can never push the new dump out.
pub fn prune_protecting(
    all: &[Artifact],
    policy: &RetentionPolicy,
    protected: &Path,
) -> Vec<Artifact> {
    let mut others: Vec<Artifact> = all.iter().filter(|a| a.path != protected).cloned().collect();
    if others.len() == all.len() {
        return prune(all, policy);
    }
    sort_newest_first(&mut others);
    others.into_iter().skip(policy.keep_count() - 1).collect()
}
