//! one-shot split and combine over a whole share set

use rand_core::{CryptoRng, RngCore};

use crate::session::{Mode, SessionParams, ShareSession};
use crate::{Result, ShareError};

/// split `secret` into `params.share_count` shares
pub fn split_secret<R>(rng: &mut R, params: &SessionParams, secret: &[u8]) -> Result<Vec<Vec<u8>>>
where
    R: RngCore + CryptoRng + ?Sized,
{
    let mut session = ShareSession::new(*params, Mode::Split)?;
    session.split_init(rng, secret)?;

    let n = usize::from(params.share_count);
    let mut shares = Vec::new();
    shares.try_reserve_exact(n)?;
    for _ in 0..n {
        shares.push(session.split(rng)?);
    }
    session.close();
    Ok(shares)
}

/// reconstruct a secret from the first `params.threshold` shares
pub fn combine_shares<S: AsRef<[u8]>>(params: &SessionParams, shares: &[S]) -> Result<Vec<u8>> {
    if let Some((first, rest)) = shares.split_first() {
        let len = first.as_ref().len();
        if rest.iter().any(|s| s.as_ref().len() != len) {
            return Err(ShareError::BadLength);
        }
    }

    let mut session = ShareSession::new(*params, Mode::Join)?;
    session.join_init()?;
    for share in shares.iter().take(usize::from(params.threshold)) {
        session.join_update(share.as_ref())?;
    }
    let secret = session.join_final()?;
    session.close();
    Ok(secret)
}

/// `len` bytes from the random source
pub fn random_bytes<R>(rng: &mut R, len: usize) -> Result<Vec<u8>>
where
    R: RngCore + CryptoRng + ?Sized,
{
    let mut out = Vec::new();
    out.try_reserve_exact(len)?;
    out.resize(len, 0);
    rng.try_fill_bytes(&mut out)?;
    Ok(out)
}
