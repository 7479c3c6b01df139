//! backend registry
//!
//! An ordered list of backends, each declaring which requests it can serve.
//! Lookup returns the first entry whose filters all match, so a specialised
//! backend registered ahead of the generic one shadows it for the requests it
//! covers.

use core::fmt;

use crate::backend::{BigUintBackend, FieldBackend, FieldStrategy, Gf256Backend};
use crate::{Result, ShareError};

/// Applicability of a registered backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendDescriptor {
    /// identifying name
    pub name: &'static str,
    /// field the backend computes in
    pub strategy: FieldStrategy,
    /// supported secret/prime bit length; 0 for any
    pub max_bits: u16,
    /// supported share count; 0 for any
    pub share_count: u8,
}

impl BackendDescriptor {
    /// Whether this backend serves `(strategy, bits, share_count)`.
    pub fn matches(&self, strategy: FieldStrategy, bits: u16, share_count: u8) -> bool {
        self.strategy == strategy
            && (self.max_bits == 0 || self.max_bits == bits)
            && (self.share_count == 0 || self.share_count == share_count)
    }
}

/// A registered backend: its filters and a constructor for a fresh instance.
#[derive(Clone, Copy)]
pub struct BackendEntry {
    pub descriptor: BackendDescriptor,
    pub create: fn() -> Box<dyn FieldBackend>,
}

impl BackendEntry {
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }
}

impl fmt::Debug for BackendEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendEntry")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

fn create_biguint() -> Box<dyn FieldBackend> {
    Box::new(BigUintBackend::new())
}

fn create_gf256() -> Box<dyn FieldBackend> {
    Box::new(Gf256Backend::new())
}

/// Generic prime field backend, unrestricted.
pub const BIGUINT_ENTRY: BackendEntry = BackendEntry {
    descriptor: BackendDescriptor {
        name: BigUintBackend::NAME,
        strategy: FieldStrategy::Prime,
        max_bits: 0,
        share_count: 0,
    },
    create: create_biguint,
};

/// Table-driven GF(2^8) backend, unrestricted.
pub const GF256_ENTRY: BackendEntry = BackendEntry {
    descriptor: BackendDescriptor {
        name: Gf256Backend::NAME,
        strategy: FieldStrategy::Gf256,
        max_bits: 0,
        share_count: 0,
    },
    create: create_gf256,
};

/// Ordered set of backends.
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    entries: Vec<BackendEntry>,
}

impl BackendRegistry {
    /// A registry with no backends.
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Append a backend; it is consulted after every existing entry.
    pub fn register(&mut self, entry: BackendEntry) {
        self.entries.push(entry);
    }

    /// Prepend a backend; it is consulted before every existing entry.
    pub fn register_first(&mut self, entry: BackendEntry) {
        self.entries.insert(0, entry);
    }

    pub fn entries(&self) -> &[BackendEntry] {
        &self.entries
    }

    /// First backend serving `(strategy, bits, share_count)`.
    pub fn get_backend(
        &self,
        strategy: FieldStrategy,
        bits: u16,
        share_count: u8,
    ) -> Result<&BackendEntry> {
        self.entries
            .iter()
            .find(|e| e.descriptor.matches(strategy, bits, share_count))
            .ok_or(ShareError::NotFound)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self {
            entries: vec![BIGUINT_ENTRY, GF256_ENTRY],
        }
    }
}
