//! In-progress generation tracking
//!
//! `InProgressMethods` is an immutable value: `with_added` and `with_removed`
//! return a new value and never touch the receiver, so a copy handed to an
//! event handler cannot change underneath it.
//!
//! A signature is owned by at most one package at a time.

use crate::error::ConflictError;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Signatures currently being generated, per package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InProgressMethods {
    packages: BTreeMap<String, BTreeSet<String>>,
    /// signature -> owning package, for O(1) membership checks
    owners: HashMap<String, String>,
}

impl InProgressMethods {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_progress(&self, signature: &str) -> bool {
        self.owners.contains_key(signature)
    }

    pub fn package_of(&self, signature: &str) -> Option<&str> {
        self.owners.get(signature).map(String::as_str)
    }

    pub fn signatures(&self, package: &str) -> Option<&BTreeSet<String>> {
        self.packages.get(package)
    }

    pub fn packages(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.packages
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// First signature owned by a package other than `package`
    pub fn check_available<'a, I>(&self, package: &str, signatures: I) -> Result<(), ConflictError>
    where
        I: IntoIterator<Item = &'a String>,
    {
        for signature in signatures {
            if let Some(owner) = self.owners.get(signature) {
                if owner != package {
                    return Err(ConflictError {
                        signature: signature.clone(),
                        requested_package: package.to_string(),
                        owning_package: owner.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// New value with `signatures` added to `package`
    ///
    /// Re-adding signatures the package already owns is a no-op.
    pub fn with_added(&self, package: &str, signatures: &[String]) -> Result<Self, ConflictError> {
        self.check_available(package, signatures)?;

        let mut next = self.clone();
        if signatures.is_empty() {
            return Ok(next);
        }

        let entry = next.packages.entry(package.to_string()).or_default();
        for signature in signatures {
            entry.insert(signature.clone());
            next.owners.insert(signature.clone(), package.to_string());
        }
        Ok(next)
    }

    /// New value without any of `package`'s signatures
    pub fn with_removed(&self, package: &str) -> Self {
        let mut next = self.clone();
        if let Some(signatures) = next.packages.remove(package) {
            for signature in &signatures {
                next.owners.remove(signature);
            }
        }
        next
    }
}

/// Session-scoped tracker over the current `InProgressMethods` value
#[derive(Debug, Default)]
pub struct InProgressTracker {
    current: InProgressMethods,
}

impl InProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `signatures` to `package`'s in-progress set
    ///
    /// Fails without any change if a signature is in progress for another package.
    pub fn start(&mut self, package: &str, signatures: &[String]) -> Result<(), ConflictError> {
        self.current = self.current.with_added(package, signatures)?;
        Ok(())
    }

    /// Drop every in-progress signature of `package`
    ///
    /// Returns whether anything was removed; unknown packages are a no-op.
    pub fn stop(&mut self, package: &str) -> bool {
        if self.current.signatures(package).is_none() {
            return false;
        }
        self.current = self.current.with_removed(package);
        true
    }

    pub fn is_in_progress(&self, signature: &str) -> bool {
        self.current.is_in_progress(signature)
    }

    pub fn current(&self) -> &InProgressMethods {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sigs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_conflict_across_packages_leaves_owner_unchanged() {
        let mut tracker = InProgressTracker::new();
        tracker.start("pkgA", &sigs(&["sigX"])).unwrap();
        let before = tracker.current().clone();

        let err = tracker.start("pkgB", &sigs(&["sigY", "sigX"])).unwrap_err();
        assert_eq!(err.signature, "sigX");
        assert_eq!(err.owning_package, "pkgA");
        assert_eq!(err.requested_package, "pkgB");

        assert_eq!(tracker.current(), &before);
        assert!(!tracker.is_in_progress("sigY"));
        assert_eq!(tracker.current().package_of("sigX"), Some("pkgA"));
    }

    #[test]
    fn test_start_is_idempotent_for_same_package() {
        let mut tracker = InProgressTracker::new();
        tracker.start("pkgA", &sigs(&["s1", "s2"])).unwrap();
        tracker.start("pkgA", &sigs(&["s2", "s3"])).unwrap();

        let set = tracker.current().signatures("pkgA").unwrap();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_stop_frees_signatures_and_is_safe_when_absent() {
        let mut tracker = InProgressTracker::new();
        assert!(!tracker.stop("nobody"));

        tracker.start("pkgA", &sigs(&["s1"])).unwrap();
        assert!(tracker.stop("pkgA"));
        assert!(!tracker.is_in_progress("s1"));
        assert!(tracker.current().is_empty());

        // Freed signature can move to another package
        tracker.start("pkgB", &sigs(&["s1"])).unwrap();
        assert_eq!(tracker.current().package_of("s1"), Some("pkgB"));
    }

    #[test]
    fn test_values_are_not_aliased() {
        let empty = InProgressMethods::new();
        let added = empty.with_added("pkg", &sigs(&["s"])).unwrap();
        let removed = added.with_removed("pkg");

        assert!(empty.is_empty());
        assert!(added.is_in_progress("s"));
        assert!(!removed.is_in_progress("s"));
    }

    #[test]
    fn test_empty_start_creates_no_entry() {
        let mut tracker = InProgressTracker::new();
        tracker.start("pkg", &[]).unwrap();
        assert!(tracker.current().packages().is_empty());
    }
}
