//! GF(2^8) backend
//!
//! An element is a vector of lanes, one byte per lane, each lane an
//! independent member of GF(2^8) reduced by x^8 + x^4 + x^3 + x + 1 (0x11b).
//! A secret of L bytes is therefore shared with L polynomials evaluated at a
//! single x, which is why x is a one-lane element and y has L lanes.
//!
//! Division goes through a 256×256 table built once per process: row `a`
//! indexed by `a·c` yields `c`, so `a^-1 = TABLE[a][1]`.

use std::sync::OnceLock;

use zeroize::{Zeroize, Zeroizing};

use super::{ElementId, FieldBackend};
use crate::{Result, ShareError};

/// x^8 + x^4 + x^3 + x + 1
pub const IRREDUCIBLE: u16 = 0x11b;

/// Field multiplication: double-and-add over the bits of `b`, reducing each
/// time the top bit of `a` falls off.
pub fn mul(a: u8, b: u8) -> u8 {
    let mut a = a;
    let mut b = b;
    let mut result = 0u8;

    while b != 0 {
        if b & 1 != 0 {
            result ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= (IRREDUCIBLE & 0xff) as u8;
        }
        b >>= 1;
    }
    result
}

struct DivTable(Box<[[u8; 256]]>);

static DIV_TABLE: OnceLock<DivTable> = OnceLock::new();

fn div_table() -> &'static DivTable {
    DIV_TABLE.get_or_init(|| {
        let mut rows = vec![[0u8; 256]; 256].into_boxed_slice();
        for a in 0..=255u8 {
            for c in 0..=255u8 {
                rows[a as usize][mul(a, c) as usize] = c;
            }
        }
        DivTable(rows)
    })
}

/// `a / b`, or `None` when `b` is zero.
pub fn div(a: u8, b: u8) -> Option<u8> {
    if b == 0 {
        return None;
    }
    Some(div_table().0[b as usize][a as usize])
}

/// Multiplicative inverse, or `None` for zero.
pub fn inverse(a: u8) -> Option<u8> {
    div(1, a)
}

type Lanes = Zeroizing<Vec<u8>>;

/// Byte-parallel GF(2^8) backend.
#[derive(Default)]
pub struct Gf256Backend {
    slots: Vec<Option<Lanes>>,
    free: Vec<u32>,
}

impl Gf256Backend {
    pub const NAME: &'static str = "gf256 table";

    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, elem: ElementId) -> Result<&Lanes> {
        self.slots
            .get(elem.index())
            .and_then(Option::as_ref)
            .ok_or(ShareError::BadValue)
    }

    fn get_mut(&mut self, elem: ElementId) -> Result<&mut Lanes> {
        self.slots
            .get_mut(elem.index())
            .and_then(Option::as_mut)
            .ok_or(ShareError::BadValue)
    }

    /// Read an element as a single field value.
    fn scalar(&self, elem: ElementId) -> Result<u8> {
        match significant(self.get(elem)?) {
            [] => Ok(0),
            [b] => Ok(*b),
            _ => Err(ShareError::BadValue),
        }
    }

    fn store(&mut self, elem: ElementId, lanes: &[u8]) -> Result<()> {
        let slot = self.get_mut(elem)?;
        slot.zeroize();
        slot.clear();
        slot.try_reserve_exact(lanes.len())?;
        slot.extend_from_slice(lanes);
        Ok(())
    }
}

/// Lanes without leading zeros.
fn significant(lanes: &[u8]) -> &[u8] {
    let start = lanes.iter().position(|&b| b != 0).unwrap_or(lanes.len());
    &lanes[start..]
}

impl FieldBackend for Gf256Backend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn new_element(&mut self, byte_len: usize) -> Result<ElementId> {
        let mut lanes = Vec::new();
        lanes.try_reserve_exact(byte_len)?;
        lanes.resize(byte_len, 0);
        let lanes = Zeroizing::new(lanes);

        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(lanes);
            return Ok(ElementId(index));
        }

        let index = u32::try_from(self.slots.len()).map_err(|_| ShareError::Alloc)?;
        self.slots.try_reserve(1)?;
        self.free
            .try_reserve((self.slots.len() + 1).saturating_sub(self.free.len()))?;
        self.slots.push(Some(lanes));
        Ok(ElementId(index))
    }

    fn free_element(&mut self, elem: ElementId) -> Result<()> {
        // Zeroizing wipes the lanes on drop
        self.get(elem)?;
        self.slots[elem.index()] = None;
        self.free.push(elem.0);
        Ok(())
    }

    fn decode(&mut self, bytes: &[u8], elem: ElementId) -> Result<()> {
        self.store(elem, bytes)
    }

    fn encode(&self, elem: ElementId, out: &mut [u8]) -> Result<()> {
        let lanes = significant(self.get(elem)?);
        if lanes.len() > out.len() {
            return Err(ShareError::BadLength);
        }
        let offset = out.len() - lanes.len();
        out[..offset].fill(0);
        out[offset..].copy_from_slice(lanes);
        Ok(())
    }

    fn evaluate_polynomial(
        &mut self,
        _modulus: Option<ElementId>,
        coeffs: &[ElementId],
        x: ElementId,
        y: ElementId,
    ) -> Result<()> {
        let (last, rest) = coeffs.split_last().ok_or(ShareError::BadValue)?;
        let x = self.scalar(x)?;

        let mut acc: Lanes = Zeroizing::new(self.get(*last)?.to_vec());
        for c in rest.iter().rev() {
            let c = self.get(*c)?;
            if c.len() != acc.len() {
                return Err(ShareError::BadLength);
            }
            for (a, &ci) in acc.iter_mut().zip(c.iter()) {
                *a = mul(*a, x) ^ ci;
            }
        }

        self.store(y, &acc)
    }

    fn interpolate_at_zero(
        &mut self,
        _modulus: Option<ElementId>,
        xs: &[ElementId],
        ys: &[ElementId],
        secret: ElementId,
    ) -> Result<()> {
        let k = xs.len();
        if k == 0 || k != ys.len() {
            return Err(ShareError::BadValue);
        }

        let x: Vec<u8> = xs
            .iter()
            .map(|&id| self.scalar(id))
            .collect::<Result<_>>()?;

        // basis at zero is shared by every lane: Π_{j≠i} x_j / (x_j − x_i)
        let mut basis = Vec::with_capacity(k);
        for i in 0..k {
            let mut num = 1u8;
            let mut den = 1u8;
            for j in 0..k {
                if i == j {
                    continue;
                }
                // subtraction is xor in characteristic 2
                num = mul(num, x[j]);
                den = mul(den, x[j] ^ x[i]);
            }
            basis.push(div(num, den).ok_or(ShareError::ModularInverseUndefined)?);
        }

        let width = self.get(ys[0])?.len();
        let mut acc: Lanes = Zeroizing::new(vec![0u8; width]);
        for (&yi, &li) in ys.iter().zip(basis.iter()) {
            let y = self.get(yi)?;
            if y.len() != width {
                return Err(ShareError::BadLength);
            }
            for (a, &b) in acc.iter_mut().zip(y.iter()) {
                *a ^= mul(li, b);
            }
        }

        self.store(secret, &acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_known_values() {
        assert_eq!(mul(0, 0), 0);
        assert_eq!(mul(1, 1), 1);
        assert_eq!(mul(2, 2), 4);
        // FIPS-197 §4.2
        assert_eq!(mul(0x57, 0x83), 0xc1);
        assert_eq!(mul(0x57, 0x13), 0xfe);
    }

    #[test]
    fn test_mul_commutes() {
        for a in 0..=255u8 {
            for b in [0u8, 1, 3, 0x53, 0xca, 0xff] {
                assert_eq!(mul(a, b), mul(b, a));
            }
        }
    }

    #[test]
    fn test_inverse_table() {
        assert_eq!(inverse(0), None);
        assert_eq!(inverse(1), Some(1));
        assert_eq!(inverse(0x53), Some(0xca));
        for a in 1..=255u8 {
            let inv = inverse(a).unwrap();
            assert_eq!(mul(a, inv), 1, "inverse failed for {a}");
        }
    }

    #[test]
    fn test_div_inverts_mul() {
        for a in 1..=255u8 {
            for c in [0u8, 1, 7, 0x80, 0xfe] {
                assert_eq!(div(mul(a, c), a), Some(c));
            }
        }
        assert_eq!(div(5, 0), None);
    }

    #[test]
    fn test_table_built_once_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| div_table() as *const DivTable as usize))
            .collect();
        let addrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_encode_strips_and_pads() {
        let mut b = Gf256Backend::new();
        let id = b.new_element(3).unwrap();
        b.decode(&[0, 0x12, 0x34], id).unwrap();

        let mut out = [0xffu8; 4];
        b.encode(id, &mut out).unwrap();
        assert_eq!(out, [0, 0, 0x12, 0x34]);

        let mut short = [0u8; 1];
        assert_eq!(b.encode(id, &mut short), Err(ShareError::BadLength));
    }

    #[test]
    fn test_split_and_interpolate_lanes() {
        let mut b = Gf256Backend::new();
        let secret = [0x01, 0x02, 0x03, 0x04];
        let c0 = b.new_element(4).unwrap();
        let c1 = b.new_element(4).unwrap();
        b.decode(&secret, c0).unwrap();
        b.decode(&[0xa5, 0x5a, 0xff, 0x10], c1).unwrap();

        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for xv in [3u8, 200] {
            let x = b.new_element(1).unwrap();
            let y = b.new_element(4).unwrap();
            b.decode(&[xv], x).unwrap();
            b.evaluate_polynomial(None, &[c0, c1], x, y).unwrap();
            xs.push(x);
            ys.push(y);
        }

        let out = b.new_element(4).unwrap();
        b.interpolate_at_zero(None, &xs, &ys, out).unwrap();
        let mut recovered = [0u8; 4];
        b.encode(out, &mut recovered).unwrap();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn test_evaluate_at_zero_is_constant_term() {
        let mut b = Gf256Backend::new();
        let c0 = b.new_element(2).unwrap();
        let c1 = b.new_element(2).unwrap();
        b.decode(&[0x11, 0x22], c0).unwrap();
        b.decode(&[0x33, 0x44], c1).unwrap();
        let x = b.new_element(1).unwrap();
        let y = b.new_element(2).unwrap();

        b.evaluate_polynomial(None, &[c0, c1], x, y).unwrap();
        let mut out = [0u8; 2];
        b.encode(y, &mut out).unwrap();
        assert_eq!(out, [0x11, 0x22]);
    }

    #[test]
    fn test_duplicate_x_rejected() {
        let mut b = Gf256Backend::new();
        let x0 = b.new_element(1).unwrap();
        let x1 = b.new_element(1).unwrap();
        b.decode(&[9], x0).unwrap();
        b.decode(&[9], x1).unwrap();
        let y0 = b.new_element(2).unwrap();
        let y1 = b.new_element(2).unwrap();
        let out = b.new_element(2).unwrap();

        assert_eq!(
            b.interpolate_at_zero(None, &[x0, x1], &[y0, y1], out),
            Err(ShareError::ModularInverseUndefined)
        );
    }

    #[test]
    fn test_mismatched_lanes() {
        let mut b = Gf256Backend::new();
        let c0 = b.new_element(2).unwrap();
        let c1 = b.new_element(3).unwrap();
        let x = b.new_element(1).unwrap();
        b.decode(&[5], x).unwrap();
        let y = b.new_element(2).unwrap();
        assert_eq!(
            b.evaluate_polynomial(None, &[c0, c1], x, y),
            Err(ShareError::BadLength)
        );
    }

    #[test]
    fn test_wide_x_rejected() {
        let mut b = Gf256Backend::new();
        let c = b.new_element(1).unwrap();
        let x = b.new_element(2).unwrap();
        b.decode(&[1, 2], x).unwrap();
        let y = b.new_element(1).unwrap();
        assert_eq!(
            b.evaluate_polynomial(None, &[c], x, y),
            Err(ShareError::BadValue)
        );
    }
}
