//! # shamir-share
//!
//! threshold secret sharing: split a secret into N shares so that any K of
//! them reconstruct it and fewer than K reveal nothing.
//!
//! ## fields
//!
//! - **prime**: the secret is one residue modulo the smallest catalog prime
//!   (2^129−25, 2^193−31, 2^257−93) that fits it. shares are
//!   `x || y`, both as wide as the prime.
//! - **gf256**: every secret byte is shared over GF(2^8) with a common x.
//!   shares are `x (1 byte) || y (secret length)`.
//!
//! ## usage
//!
//! ```rust
//! use rand::rngs::OsRng;
//! use shamir_share::{SessionParams, ShareSession};
//!
//! let secret = [0x42u8; 16];
//! let params = SessionParams::for_secret(&secret, 3, 5)?;
//!
//! let mut splitter = ShareSession::splitter(params)?;
//! splitter.split_init(&mut OsRng, &secret)?;
//! let shares: Vec<Vec<u8>> = (0..5)
//!     .map(|_| splitter.split(&mut OsRng))
//!     .collect::<Result<_, _>>()?;
//! splitter.close();
//!
//! let mut joiner = ShareSession::joiner(params)?;
//! joiner.join_init()?;
//! for share in &shares[1..4] {
//!     joiner.join_update(share)?;
//! }
//! assert_eq!(joiner.join_final()?, secret);
//! # Ok::<(), shamir_share::ShareError>(())
//! ```
//!
//! ## backends
//!
//! field arithmetic goes through [`FieldBackend`]. the [`BackendRegistry`]
//! picks the first registered backend whose filters match the request, so a
//! specialised implementation can be put in front of the generic ones.

pub mod backend;
pub mod error;
pub mod prime;
pub mod registry;
pub mod scheme;
pub mod session;

pub use backend::{ElementId, FieldBackend, FieldStrategy, ShareLayout};
pub use error::{Result, ShareError};
pub use prime::{get_prime, Prime, PRIMES};
pub use registry::{BackendDescriptor, BackendEntry, BackendRegistry, BIGUINT_ENTRY, GF256_ENTRY};
pub use scheme::{combine_shares, random_bytes, split_secret};
pub use session::{Mode, SessionParams, ShareSession, MAX_SHARES, MIN_THRESHOLD};
