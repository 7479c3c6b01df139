//! Field backend abstraction
//!
//! A backend supplies the numeric operations a split/join session needs,
//! allowing the session to run over different field strategies:
//! - prime field: residues modulo a catalog prime (`bignum`)
//! - GF(2^8): one independent polynomial per secret byte (`gf256`)
//!
//! Elements live in an arena owned by the backend instance and are addressed
//! by [`ElementId`] handles. A backend instance belongs to exactly one session;
//! dropping it releases every element it created.

use core::fmt;

use crate::Result;

pub mod bignum;
pub mod gf256;

pub use bignum::BigUintBackend;
pub use gf256::Gf256Backend;

/// Handle to an element inside one backend's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub(crate) u32);

impl ElementId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Field in which the sharing polynomial is evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FieldStrategy {
    /// integers modulo a catalog prime; the secret is one field element
    #[default]
    Prime,
    /// GF(2^8); every secret byte is shared independently
    Gf256,
}

impl FieldStrategy {
    /// Wire layout of a share for a secret of `secret_len` bytes.
    ///
    /// `prime_len` is the byte length of the session prime and is only
    /// consulted by the prime strategy.
    pub fn share_layout(self, secret_len: usize, prime_len: usize) -> ShareLayout {
        match self {
            Self::Prime => ShareLayout {
                x_len: prime_len,
                field_len: prime_len,
                x_sample_len: secret_len,
                masked: true,
            },
            Self::Gf256 => ShareLayout {
                x_len: 1,
                field_len: secret_len,
                x_sample_len: 1,
                masked: false,
            },
        }
    }
}

impl fmt::Display for FieldStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prime => write!(f, "prime"),
            Self::Gf256 => write!(f, "gf256"),
        }
    }
}

/// Byte layout of an encoded share: `x (x_len) || y (field_len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareLayout {
    /// width of the encoded x ordinate
    pub x_len: usize,
    /// width of an encoded field value (y, coefficients, reconstructed secret)
    pub field_len: usize,
    /// number of random bytes drawn for a fresh x
    pub x_sample_len: usize,
    /// random coefficients and x are masked to the secret's bit length
    pub masked: bool,
}

impl ShareLayout {
    /// Total length of an encoded share.
    pub fn share_len(&self) -> usize {
        self.x_len + self.field_len
    }
}

/// Numeric operations a field strategy must supply.
pub trait FieldBackend: Send {
    /// Identifying name of the implementation.
    fn name(&self) -> &'static str;

    /// Allocate a zero-valued element able to hold `byte_len` bytes.
    fn new_element(&mut self, byte_len: usize) -> Result<ElementId>;

    /// Wipe an element and return its slot to the arena.
    fn free_element(&mut self, elem: ElementId) -> Result<()>;

    /// Load big-endian `bytes` into `elem`.
    fn decode(&mut self, bytes: &[u8], elem: ElementId) -> Result<()>;

    /// Write `elem` into exactly `out.len()` big-endian bytes, left-padded with
    /// zero. Fails with `BadLength` if the value does not fit.
    fn encode(&self, elem: ElementId, out: &mut [u8]) -> Result<()>;

    /// y = coeffs[0] + x·(coeffs[1] + x·(coeffs[2] + …))
    fn evaluate_polynomial(
        &mut self,
        modulus: Option<ElementId>,
        coeffs: &[ElementId],
        x: ElementId,
        y: ElementId,
    ) -> Result<()>;

    /// secret = Σ_i y_i · Π_{j≠i} x_j / (x_j − x_i)
    ///
    /// Fails with `ModularInverseUndefined` when two x coincide.
    fn interpolate_at_zero(
        &mut self,
        modulus: Option<ElementId>,
        xs: &[ElementId],
        ys: &[ElementId],
        secret: ElementId,
    ) -> Result<()>;
}
