//! Split/join session
//!
//! A [`ShareSession`] owns one split or one join across many calls:
//!
//! ```text
//! split:  new ─► split_init ─► split × N ─► close
//! join:   new ─► join_init ─► join_update × K (extras ignored) ─► join_final ─► close
//! ```
//!
//! The session is bound to its mode at construction. Calling an operation of
//! the other mode fails with `BadValue`; calling one out of order fails with
//! `InvalidData`. Every field element and scratch buffer is allocated up front
//! and wiped when the session is dropped.

use rand_core::{CryptoRng, RngCore};
use tracing::{debug, trace, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::backend::{ElementId, FieldBackend, FieldStrategy, ShareLayout};
use crate::prime::{get_prime, Prime};
use crate::registry::BackendRegistry;
use crate::{Result, ShareError};

/// Largest threshold and share count a session accepts.
pub const MAX_SHARES: u8 = 16;

/// Smallest threshold; a one-share threshold would hand out the secret.
pub const MIN_THRESHOLD: u8 = 2;

/// Expected draws per acceptable x allowed before the random source is
/// deemed broken.
const X_DRAW_FACTOR: u64 = 128;

/// Session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionParams {
    /// field strategy
    #[cfg_attr(feature = "serde", serde(default))]
    pub strategy: FieldStrategy,
    /// secret length in bits
    pub secret_bits: u16,
    /// shares required to reconstruct (K)
    pub threshold: u8,
    /// shares a split produces (N)
    pub share_count: u8,
    /// re-draw x values already issued by this session
    #[cfg_attr(feature = "serde", serde(default = "default_distinct_x"))]
    pub distinct_x: bool,
}

#[cfg(feature = "serde")]
fn default_distinct_x() -> bool {
    true
}

impl SessionParams {
    pub fn new(secret_bits: u16, threshold: u8, share_count: u8) -> Self {
        Self {
            strategy: FieldStrategy::Prime,
            secret_bits,
            threshold,
            share_count,
            distinct_x: true,
        }
    }

    /// Parameters for sharing `secret` as a whole number of bytes.
    pub fn for_secret(secret: &[u8], threshold: u8, share_count: u8) -> Result<Self> {
        let bits = secret
            .len()
            .checked_mul(8)
            .and_then(|b| u16::try_from(b).ok())
            .ok_or(ShareError::BadValue)?;
        Ok(Self::new(bits, threshold, share_count))
    }

    pub fn with_strategy(mut self, strategy: FieldStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_distinct_x(mut self, distinct_x: bool) -> Self {
        self.distinct_x = distinct_x;
        self
    }

    /// Secret length in bytes.
    pub fn secret_len(&self) -> usize {
        usize::from(self.secret_bits).div_ceil(8)
    }

    /// Mask of the bits used in the secret's first byte.
    pub fn mask(&self) -> u8 {
        match self.secret_bits % 8 {
            0 => 0xff,
            r => (1u8 << r) - 1,
        }
    }

    /// Check bounds: secret non-empty, 2 ≤ K ≤ N ≤ 16.
    pub fn validate(&self) -> Result<()> {
        if self.secret_bits == 0
            || self.threshold < MIN_THRESHOLD
            || self.share_count > MAX_SHARES
            || self.threshold > self.share_count
        {
            return Err(ShareError::BadValue);
        }
        Ok(())
    }
}

/// Which half of the protocol a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Split,
    Join,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Splitting { produced: usize },
    Collecting { collected: usize },
    Joined,
}

/// Stateful split or join of one secret.
pub struct ShareSession {
    backend: Box<dyn FieldBackend>,
    params: SessionParams,
    mode: Mode,
    state: State,
    prime_bits: Option<u16>,
    layout: ShareLayout,
    secret_len: usize,
    mask: u8,
    /// session prime (prime strategy only)
    prime: Option<ElementId>,
    /// coefficients when splitting, collected x when joining
    num: Vec<ElementId>,
    /// collected y when joining
    y: Vec<ElementId>,
    x: ElementId,
    res: ElementId,
    /// (de)serialization buffer, `layout.field_len` bytes
    scratch: Zeroizing<Vec<u8>>,
    /// significant bits of a drawn x
    x_bits: u32,
    issued_x: Vec<Vec<u8>>,
}

impl ShareSession {
    /// Session over the default backends.
    pub fn new(params: SessionParams, mode: Mode) -> Result<Self> {
        Self::with_registry(&BackendRegistry::default(), params, mode)
    }

    pub fn splitter(params: SessionParams) -> Result<Self> {
        Self::new(params, Mode::Split)
    }

    pub fn joiner(params: SessionParams) -> Result<Self> {
        Self::new(params, Mode::Join)
    }

    /// Session over the first backend in `registry` serving `params`.
    pub fn with_registry(
        registry: &BackendRegistry,
        params: SessionParams,
        mode: Mode,
    ) -> Result<Self> {
        params.validate()?;

        let prime: Option<&'static Prime> = match params.strategy {
            FieldStrategy::Prime => Some(get_prime(params.secret_bits)?),
            FieldStrategy::Gf256 => None,
        };
        let lookup_bits = prime.map_or(params.secret_bits, Prime::max_bits);
        let entry = registry.get_backend(params.strategy, lookup_bits, params.share_count)?;

        let secret_len = params.secret_len();
        let layout = params
            .strategy
            .share_layout(secret_len, prime.map_or(0, Prime::byte_len));

        let x_bits = if layout.masked {
            u32::from(params.secret_bits)
        } else {
            8 * layout.x_sample_len as u32
        };
        if params.distinct_x && mode == Mode::Split {
            let x_space = (1u32 << x_bits.min(16)) - 1;
            if u32::from(params.share_count) > x_space {
                return Err(ShareError::BadValue);
            }
        }

        // everything below is dropped, and wiped, with the backend on error
        let mut backend = (entry.create)();
        let k = usize::from(params.threshold);

        let prime_elem = match prime {
            Some(p) => {
                let id = backend.new_element(p.byte_len())?;
                backend.decode(p.data(), id)?;
                Some(id)
            }
            None => None,
        };

        let mut num = Vec::new();
        let mut y = Vec::new();
        num.try_reserve_exact(k)?;
        y.try_reserve_exact(k)?;
        for _ in 0..k {
            num.push(backend.new_element(layout.field_len)?);
        }
        for _ in 0..k {
            y.push(backend.new_element(layout.field_len)?);
        }
        let x = backend.new_element(layout.x_len)?;
        let res = backend.new_element(layout.field_len)?;

        let mut scratch = Vec::new();
        scratch.try_reserve_exact(layout.field_len)?;
        scratch.resize(layout.field_len, 0);

        let mut issued_x = Vec::new();
        if params.distinct_x {
            issued_x.try_reserve_exact(usize::from(params.share_count))?;
        }

        debug!(
            backend = backend.name(),
            strategy = %params.strategy,
            secret_bits = params.secret_bits,
            threshold = params.threshold,
            share_count = params.share_count,
            ?mode,
            "share session created"
        );

        Ok(Self {
            backend,
            params,
            mode,
            state: State::Idle,
            prime_bits: prime.map(Prime::max_bits),
            layout,
            secret_len,
            mask: params.mask(),
            prime: prime_elem,
            num,
            y,
            x,
            res,
            scratch: Zeroizing::new(scratch),
            x_bits,
            issued_x,
        })
    }

    /// Length of one encoded share in bytes.
    pub fn share_len(&self) -> usize {
        self.layout.share_len()
    }

    /// Shares produced since `split_init`, or accepted since `join_init`.
    pub fn num_shares(&self) -> usize {
        match self.state {
            State::Splitting { produced } => produced,
            State::Collecting { collected } => collected,
            State::Joined => usize::from(self.params.threshold),
            State::Idle => 0,
        }
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn threshold(&self) -> u8 {
        self.params.threshold
    }

    /// Secret length in bytes.
    pub fn secret_len(&self) -> usize {
        self.secret_len
    }

    /// Capacity of the session prime, if the strategy uses one.
    pub fn prime_bits(&self) -> Option<u16> {
        self.prime_bits
    }

    fn expect_mode(&self, mode: Mode) -> Result<()> {
        if self.mode != mode {
            return Err(ShareError::BadValue);
        }
        Ok(())
    }

    fn padding(&self) -> usize {
        self.layout.field_len - self.secret_len
    }

    /// Fix the polynomial: coefficient 0 is `secret`, the other K-1 are random.
    pub fn split_init<R>(&mut self, rng: &mut R, secret: &[u8]) -> Result<()>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        self.expect_mode(Mode::Split)?;
        if secret.is_empty() {
            return Err(ShareError::NullParam);
        }
        if secret.len() != self.secret_len {
            return Err(ShareError::BadLength);
        }
        if secret[0] & !self.mask != 0 {
            return Err(ShareError::BadValue);
        }

        let len = self.secret_len;
        let mut random = Vec::new();
        random.try_reserve_exact(len * (self.num.len() - 1))?;
        random.resize(len * (self.num.len() - 1), 0);
        let mut random = Zeroizing::new(random);
        rng.try_fill_bytes(&mut random)?;

        let pad = self.padding();
        self.scratch[..pad].fill(0);
        self.scratch[pad..].copy_from_slice(secret);
        let result = self.load_coefficients(&random, pad);
        self.scratch.as_mut_slice().zeroize();
        result?;

        self.issued_x.clear();
        self.state = State::Splitting { produced: 0 };
        debug!(backend = self.backend.name(), "split initialised");
        Ok(())
    }

    /// Decode scratch as coefficient 0, then each random chunk as the rest.
    fn load_coefficients(&mut self, random: &[u8], pad: usize) -> Result<()> {
        self.backend.decode(&self.scratch, self.num[0])?;
        for (i, chunk) in random.chunks_exact(self.secret_len).enumerate() {
            self.scratch[pad..].copy_from_slice(chunk);
            if self.layout.masked {
                self.scratch[pad] &= self.mask;
            }
            self.backend.decode(&self.scratch, self.num[i + 1])?;
        }
        Ok(())
    }

    /// Draws allowed for the next x: `X_DRAW_FACTOR` times the expected
    /// number of draws until an acceptable value, so a healthy source fails
    /// with probability about e^-128 however full the x space is.
    fn x_draw_limit(&self) -> u64 {
        let raw = 1u64 << self.x_bits.min(32);
        let taken = if self.params.distinct_x {
            1 + self.issued_x.len() as u64
        } else {
            1
        };
        let free = raw.saturating_sub(taken).max(1);
        X_DRAW_FACTOR.saturating_mul(raw.div_ceil(free))
    }

    /// Draw a non-zero x, distinct from earlier ones when configured, into
    /// the head of scratch.
    fn sample_x<R>(&mut self, rng: &mut R) -> Result<usize>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let n = self.layout.x_sample_len;
        for _ in 0..self.x_draw_limit() {
            let sample = &mut self.scratch[..n];
            rng.try_fill_bytes(sample)?;
            if self.layout.masked {
                sample[0] &= self.mask;
            }
            if sample.iter().all(|&b| b == 0) {
                continue;
            }
            if self.params.distinct_x {
                if self.issued_x.iter().any(|x| x.as_slice() == &*sample) {
                    trace!("x collision, redrawing");
                    continue;
                }
            }
            return Ok(n);
        }
        Err(ShareError::RandomSourceFailure)
    }

    /// Produce the next share into `out`, which must be `share_len()` bytes.
    pub fn split_into<R>(&mut self, rng: &mut R, out: &mut [u8]) -> Result<()>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        self.expect_mode(Mode::Split)?;
        let State::Splitting { produced } = self.state else {
            return Err(ShareError::InvalidData);
        };
        if produced >= usize::from(self.params.share_count) {
            return Err(ShareError::InvalidData);
        }
        if out.len() != self.share_len() {
            return Err(ShareError::BadLength);
        }

        let n = self.sample_x(rng)?;
        let x = self.params.distinct_x.then(|| self.scratch[..n].to_vec());
        self.backend.decode(&self.scratch[..n], self.x)?;
        self.scratch.as_mut_slice().zeroize();

        self.backend
            .evaluate_polynomial(self.prime, &self.num, self.x, self.res)?;

        let (x_out, y_out) = out.split_at_mut(self.layout.x_len);
        self.backend.encode(self.x, x_out)?;
        self.backend.encode(self.res, y_out)?;

        // only a written share uses up its x
        if let Some(x) = x {
            self.issued_x.push(x);
        }
        self.state = State::Splitting {
            produced: produced + 1,
        };
        trace!(produced = produced + 1, "share produced");
        Ok(())
    }

    /// Produce the next share.
    pub fn split<R>(&mut self, rng: &mut R) -> Result<Vec<u8>>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let mut out = Vec::new();
        out.try_reserve_exact(self.share_len())?;
        out.resize(self.share_len(), 0);
        self.split_into(rng, &mut out)?;
        Ok(out)
    }

    /// Start collecting shares.
    pub fn join_init(&mut self) -> Result<()> {
        self.expect_mode(Mode::Join)?;
        self.state = State::Collecting { collected: 0 };
        debug!(backend = self.backend.name(), "join initialised");
        Ok(())
    }

    /// Add a share. Shares beyond the threshold are ignored.
    pub fn join_update(&mut self, share: &[u8]) -> Result<()> {
        self.expect_mode(Mode::Join)?;
        let State::Collecting { collected } = self.state else {
            return Err(ShareError::InvalidData);
        };
        if share.is_empty() {
            return Err(ShareError::NullParam);
        }
        if share.len() != self.share_len() {
            return Err(ShareError::BadLength);
        }
        if collected == self.num.len() {
            trace!("threshold reached, ignoring share");
            return Ok(());
        }

        let (x, y) = share.split_at(self.layout.x_len);
        self.backend.decode(x, self.num[collected])?;
        self.backend.decode(y, self.y[collected])?;

        self.state = State::Collecting {
            collected: collected + 1,
        };
        trace!(collected = collected + 1, "share accepted");
        Ok(())
    }

    /// Reconstruct the secret into `out`, which must be `secret_len()` bytes.
    pub fn join_final_into(&mut self, out: &mut [u8]) -> Result<()> {
        self.expect_mode(Mode::Join)?;
        let State::Collecting { collected } = self.state else {
            return Err(ShareError::InvalidData);
        };
        if collected < self.num.len() {
            return Err(ShareError::InvalidData);
        }
        if out.len() != self.secret_len {
            return Err(ShareError::BadLength);
        }

        self.backend
            .interpolate_at_zero(self.prime, &self.num, &self.y, self.res)?;
        self.backend.encode(self.res, &mut self.scratch)?;

        let pad = self.padding();
        let in_range = self.scratch[..pad].iter().all(|&b| b == 0)
            && self.scratch[pad] & !self.mask == 0;
        if !in_range {
            self.scratch.as_mut_slice().zeroize();
            warn!(backend = self.backend.name(), "reconstructed value out of range");
            return Err(ShareError::Failed);
        }

        out.copy_from_slice(&self.scratch[pad..]);
        self.scratch.as_mut_slice().zeroize();
        self.state = State::Joined;
        debug!(backend = self.backend.name(), "secret reconstructed");
        Ok(())
    }

    /// Reconstruct the secret.
    pub fn join_final(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.try_reserve_exact(self.secret_len)?;
        out.resize(self.secret_len, 0);
        self.join_final_into(&mut out)?;
        Ok(out)
    }

    /// End the session, wiping every element it holds.
    pub fn close(self) {}
}

impl Drop for ShareSession {
    fn drop(&mut self) {
        let elems = self
            .prime
            .iter()
            .chain(self.num.iter())
            .chain(self.y.iter())
            .chain([&self.x, &self.res]);
        for &elem in elems {
            // every handle came from this backend
            let _ = self.backend.free_element(elem);
        }
    }
}

impl core::fmt::Debug for ShareSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShareSession")
            .field("backend", &self.backend.name())
            .field("params", &self.params)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(7)
    }

    #[test]
    fn test_params_mask_and_len() {
        let p = SessionParams::new(12, 2, 3);
        assert_eq!(p.secret_len(), 2);
        assert_eq!(p.mask(), 0x0f);
        assert_eq!(SessionParams::new(128, 2, 3).mask(), 0xff);
        assert_eq!(SessionParams::new(1, 2, 3).mask(), 0x01);
    }

    #[test]
    fn test_params_bounds() {
        assert!(SessionParams::new(8, 2, 2).validate().is_ok());
        assert!(SessionParams::new(8, 16, 16).validate().is_ok());
        assert_eq!(SessionParams::new(0, 2, 3).validate(), Err(ShareError::BadValue));
        assert_eq!(SessionParams::new(8, 1, 3).validate(), Err(ShareError::BadValue));
        assert_eq!(SessionParams::new(8, 4, 3).validate(), Err(ShareError::BadValue));
        assert_eq!(SessionParams::new(8, 2, 17).validate(), Err(ShareError::BadValue));
    }

    #[test]
    fn test_for_secret_too_long() {
        let long = vec![0u8; 8192];
        assert_eq!(
            SessionParams::for_secret(&long, 2, 3),
            Err(ShareError::BadValue)
        );
    }

    #[test]
    fn test_state_transitions() {
        let mut rng = rng();
        let params = SessionParams::new(64, 2, 2);
        let mut s = ShareSession::splitter(params).unwrap();
        assert_eq!(s.num_shares(), 0);
        assert_eq!(s.split(&mut rng).unwrap_err(), ShareError::InvalidData);

        s.split_init(&mut rng, &[1u8; 8]).unwrap();
        s.split(&mut rng).unwrap();
        assert_eq!(s.num_shares(), 1);
        s.split(&mut rng).unwrap();
        assert_eq!(s.split(&mut rng).unwrap_err(), ShareError::InvalidData);

        // restart is allowed
        s.split_init(&mut rng, &[2u8; 8]).unwrap();
        assert_eq!(s.num_shares(), 0);
    }

    #[test]
    fn test_mode_is_fixed() {
        let mut rng = rng();
        let params = SessionParams::new(64, 2, 3);
        let mut splitter = ShareSession::splitter(params).unwrap();
        assert_eq!(splitter.join_init(), Err(ShareError::BadValue));
        assert_eq!(splitter.join_update(&[0u8; 18]), Err(ShareError::BadValue));
        assert_eq!(splitter.join_final().unwrap_err(), ShareError::BadValue);

        let mut joiner = ShareSession::joiner(params).unwrap();
        assert_eq!(
            joiner.split_init(&mut rng, &[0u8; 8]),
            Err(ShareError::BadValue)
        );
        assert_eq!(joiner.split(&mut rng).unwrap_err(), ShareError::BadValue);
    }

    #[test]
    fn test_join_requires_init() {
        let mut s = ShareSession::joiner(SessionParams::new(64, 2, 2)).unwrap();
        assert_eq!(s.join_update(&[0u8; 34]), Err(ShareError::InvalidData));
        assert_eq!(s.join_final().unwrap_err(), ShareError::InvalidData);
    }

    #[test]
    fn test_x_never_zero_in_tiny_field() {
        let mut rng = rng();
        // one secret bit leaves exactly one non-zero x
        let params = SessionParams::new(1, 2, 2).with_distinct_x(false);
        let mut s = ShareSession::splitter(params).unwrap();
        s.split_init(&mut rng, &[1]).unwrap();
        let share = s.split(&mut rng).unwrap();
        let x_len = s.share_len() / 2;
        assert_eq!(share[x_len - 1], 1);
        assert!(share[..x_len - 1].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_distinct_x_needs_room() {
        // two secret bits give three non-zero x values
        let params = SessionParams::new(2, 2, 4);
        assert_eq!(
            ShareSession::splitter(params).unwrap_err(),
            ShareError::BadValue
        );
        assert!(ShareSession::splitter(SessionParams::new(2, 2, 3)).is_ok());
        // joiners never draw x
        assert!(ShareSession::joiner(params).is_ok());
    }

    #[test]
    fn test_distinct_x_issued() {
        let mut rng = rng();
        let params = SessionParams::new(2, 2, 3);
        let mut s = ShareSession::splitter(params).unwrap();
        s.split_init(&mut rng, &[0x03]).unwrap();
        let mut xs: Vec<Vec<u8>> = (0..3)
            .map(|_| s.split(&mut rng).unwrap()[..17].to_vec())
            .collect();
        xs.sort();
        xs.dedup();
        assert_eq!(xs.len(), 3);
    }

    #[test]
    fn test_draw_limit_grows_as_x_space_fills() {
        let mut rng = rng();
        let mut s = ShareSession::splitter(SessionParams::new(4, 2, 15)).unwrap();
        s.split_init(&mut rng, &[0x05]).unwrap();
        assert_eq!(s.x_draw_limit(), 128 * 2);
        for _ in 0..14 {
            s.split(&mut rng).unwrap();
        }
        // one free value out of 16 raw draws
        assert_eq!(s.x_draw_limit(), 128 * 16);
        s.split(&mut rng).unwrap();
    }

    #[test]
    fn test_secret_outside_mask() {
        let mut rng = rng();
        let mut s = ShareSession::splitter(SessionParams::new(12, 2, 3)).unwrap();
        assert_eq!(
            s.split_init(&mut rng, &[0x10, 0x00]),
            Err(ShareError::BadValue)
        );
        assert!(s.split_init(&mut rng, &[0x0f, 0xff]).is_ok());
    }

    #[test]
    fn test_split_into_wrong_buffer() {
        let mut rng = rng();
        let mut s = ShareSession::splitter(SessionParams::new(128, 2, 3)).unwrap();
        s.split_init(&mut rng, &[9u8; 16]).unwrap();
        let mut out = [0u8; 33];
        assert_eq!(
            s.split_into(&mut rng, &mut out),
            Err(ShareError::BadLength)
        );
        assert_eq!(s.num_shares(), 0);
    }
}
