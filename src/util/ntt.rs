use super::dwthandler::{Arithmetic, DWTHandler};
use crate::{util, Modulus};

#[derive(Clone, Copy, Default)]
struct ModArith {
    modulus: Modulus,
}
type NTTHandler = DWTHandler<ModArith>;

impl Arithmetic for ModArith {
    type Value = u64;
    type Root = u64;
    type Scalar = u64;

    #[inline]
    fn add(&self, a: &Self::Value, b: &Self::Value) -> Self::Value {
        self.modulus.add(*a, *b)
    }

    #[inline]
    fn sub(&self, a: &Self::Value, b: &Self::Value) -> Self::Value {
        self.modulus.sub(*a, *b)
    }

    #[inline]
    fn mul_root(&self, a: &Self::Value, r: &Self::Root) -> Self::Value {
        self.modulus.mul(*a, *r)
    }

    #[inline]
    fn mul_scalar(&self, a: &Self::Value, s: &Self::Scalar) -> Self::Value {
        self.modulus.mul(*a, *s)
    }
}

/// Precomputed powers of a primitive 2n-th root of unity for the negacyclic
/// number theoretic transform over Z_q\[X\]/(X^n + 1).
#[derive(Clone, Default)]
pub struct NTTTables {
    root: u64,
    coeff_count_power: usize,
    coeff_count: usize,
    modulus: Modulus,
    inv_degree_modulo: u64,
    root_powers: Vec<u64>,
    inv_root_powers: Vec<u64>,
    ntt_handler: NTTHandler,
}

impl NTTTables {

    pub fn new(coeff_count_power: usize, modulus: &Modulus) -> Result<Self, String> {
        let coeff_count = 1usize << coeff_count_power;
        let modulus = *modulus;
        let root = util::try_minimal_primitive_root(2 * coeff_count as u64, &modulus)
            .ok_or_else(|| format!("modulus {} has no primitive {}-th root of unity", modulus, 2 * coeff_count))?;
        let inv_root = modulus.invert(root)
            .ok_or_else(|| format!("unable to invert root modulo {}", modulus))?;

        // Populate tables with powers of root in specific orders.
        let mut root_powers = vec![0; coeff_count];
        root_powers[0] = 1;
        let mut power = root;
        for i in 1..coeff_count {
            root_powers[util::reverse_bits_u64(i as u64, coeff_count_power) as usize] = power;
            power = modulus.mul(power, root);
        }

        let mut inv_root_powers = vec![0; coeff_count];
        inv_root_powers[0] = 1;
        let mut power = inv_root;
        for i in 1..coeff_count {
            inv_root_powers[util::reverse_bits_u64((i - 1) as u64, coeff_count_power) as usize + 1] = power;
            power = modulus.mul(power, inv_root);
        }

        let inv_degree_modulo = modulus.invert(coeff_count as u64)
            .ok_or_else(|| format!("unable to invert degree modulo {}", modulus))?;

        Ok(NTTTables {
            root,
            coeff_count_power,
            coeff_count,
            modulus,
            inv_degree_modulo,
            root_powers,
            inv_root_powers,
            ntt_handler: NTTHandler::new(&ModArith { modulus }),
        })
    }

    // get members
    pub fn root(&self) -> u64 {self.root}
    pub fn get_root_powers(&self) -> &[u64] {&self.root_powers}
    pub fn get_inv_root_powers(&self) -> &[u64] {&self.inv_root_powers}
    pub fn modulus(&self) -> &Modulus {&self.modulus}
    pub fn coeff_count_power(&self) -> usize {self.coeff_count_power}
    pub fn coeff_count(&self) -> usize {self.coeff_count}

    pub fn ntt_negacyclic(&self, operand: &mut [u64]) {
        debug_assert_eq!(operand.len(), self.coeff_count);
        self.ntt_handler.transform_to_rev(operand, self.coeff_count_power, &self.root_powers, None);
    }

    pub fn inverse_ntt_negacyclic(&self, operand: &mut [u64]) {
        debug_assert_eq!(operand.len(), self.coeff_count);
        self.ntt_handler.transform_from_rev(operand, self.coeff_count_power, &self.inv_root_powers,
            Some(&self.inv_degree_modulo));
    }

}
