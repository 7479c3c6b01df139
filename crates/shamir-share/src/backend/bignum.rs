//! prime field backend over num-bigint
//!
//! Elements are residues held as `BigUint`. All arithmetic is reduced modulo
//! the session prime, which is itself an element of the same arena.

use num_bigint::BigUint;
use num_traits::Zero;
use zeroize::Zeroizing;

use super::{ElementId, FieldBackend};
use crate::{Result, ShareError};

/// Generic prime field backend.
#[derive(Default)]
pub struct BigUintBackend {
    slots: Vec<Option<BigUint>>,
    free: Vec<u32>,
}

impl BigUintBackend {
    pub const NAME: &'static str = "num-bigint generic";

    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, elem: ElementId) -> Result<&BigUint> {
        self.slots
            .get(elem.index())
            .and_then(Option::as_ref)
            .ok_or(ShareError::BadValue)
    }

    fn get_mut(&mut self, elem: ElementId) -> Result<&mut BigUint> {
        self.slots
            .get_mut(elem.index())
            .and_then(Option::as_mut)
            .ok_or(ShareError::BadValue)
    }

    fn modulus(&self, modulus: Option<ElementId>) -> Result<&BigUint> {
        let p = self.get(modulus.ok_or(ShareError::BadValue)?)?;
        if p.is_zero() {
            return Err(ShareError::BadValue);
        }
        Ok(p)
    }
}

/// a^-1 mod p via Fermat's little theorem; p must be prime.
fn mod_inverse(a: &BigUint, p: &BigUint) -> Result<BigUint> {
    if a.is_zero() {
        return Err(ShareError::ModularInverseUndefined);
    }
    Ok(a.modpow(&(p - BigUint::from(2u32)), p))
}

impl FieldBackend for BigUintBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn new_element(&mut self, _byte_len: usize) -> Result<ElementId> {
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(BigUint::zero());
            return Ok(ElementId(index));
        }

        let index = u32::try_from(self.slots.len()).map_err(|_| ShareError::Alloc)?;
        self.slots.try_reserve(1)?;
        self.free
            .try_reserve((self.slots.len() + 1).saturating_sub(self.free.len()))?;
        self.slots.push(Some(BigUint::zero()));
        Ok(ElementId(index))
    }

    fn free_element(&mut self, elem: ElementId) -> Result<()> {
        self.get_mut(elem)?.set_zero();
        self.slots[elem.index()] = None;
        // capacity for every slot was reserved in new_element
        self.free.push(elem.0);
        Ok(())
    }

    fn decode(&mut self, bytes: &[u8], elem: ElementId) -> Result<()> {
        *self.get_mut(elem)? = BigUint::from_bytes_be(bytes);
        Ok(())
    }

    fn encode(&self, elem: ElementId, out: &mut [u8]) -> Result<()> {
        let value = self.get(elem)?;
        let len = value.bits().div_ceil(8) as usize;
        if len > out.len() {
            return Err(ShareError::BadLength);
        }

        let offset = out.len() - len;
        out[..offset].fill(0);
        if len > 0 {
            let bytes = Zeroizing::new(value.to_bytes_be());
            out[offset..].copy_from_slice(&bytes);
        }
        Ok(())
    }

    fn evaluate_polynomial(
        &mut self,
        modulus: Option<ElementId>,
        coeffs: &[ElementId],
        x: ElementId,
        y: ElementId,
    ) -> Result<()> {
        let (last, rest) = coeffs.split_last().ok_or(ShareError::BadValue)?;
        let p = self.modulus(modulus)?;
        let x = self.get(x)?;

        // horner from the highest coefficient down
        let mut acc = self.get(*last)? % p;
        for c in rest.iter().rev() {
            acc = (acc * x + self.get(*c)?) % p;
        }

        *self.get_mut(y)? = acc;
        Ok(())
    }

    fn interpolate_at_zero(
        &mut self,
        modulus: Option<ElementId>,
        xs: &[ElementId],
        ys: &[ElementId],
        secret: ElementId,
    ) -> Result<()> {
        let k = xs.len();
        if k == 0 || k != ys.len() {
            return Err(ShareError::BadValue);
        }
        let p = self.modulus(modulus)?;

        let x: Vec<BigUint> = xs
            .iter()
            .map(|&id| self.get(id).map(|v| v % p))
            .collect::<Result<_>>()?;

        // numerators Π_{j≠i} x_j and denominators Π_{j≠i} (x_j - x_i)
        let mut nums = Vec::with_capacity(k);
        let mut dens = Vec::with_capacity(k);
        for i in 0..k {
            let mut num = BigUint::from(1u32);
            let mut den = BigUint::from(1u32);
            for j in 0..k {
                if i == j {
                    continue;
                }
                let diff = (p + &x[j] - &x[i]) % p;
                if diff.is_zero() {
                    return Err(ShareError::ModularInverseUndefined);
                }
                num = num * &x[j] % p;
                den = den * diff % p;
            }
            nums.push(num);
            dens.push(den);
        }

        // one inversion for all denominators: prefix[i] = Π_{j<i} d_j
        let mut prefix = Vec::with_capacity(k);
        let mut acc = BigUint::from(1u32);
        for d in &dens {
            prefix.push(acc.clone());
            acc = acc * d % p;
        }
        let mut inv = mod_inverse(&acc, p)?;

        let mut sum = BigUint::zero();
        for i in (0..k).rev() {
            let den_inv = &inv * &prefix[i] % p;
            inv = inv * &dens[i] % p;

            let y = self.get(ys[i])?;
            sum = (sum + y * &nums[i] % p * den_inv) % p;
        }

        *self.get_mut(secret)? = sum;
        Ok(())
    }
}

impl Drop for BigUintBackend {
    fn drop(&mut self) {
        for value in self.slots.iter_mut().flatten() {
            value.set_zero();
        }
    }
}
