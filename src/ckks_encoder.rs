use std::sync::Arc;

use num_complex::Complex;

use crate::{
    util::{self, dwthandler::{Arithmetic, DWTHandler}, GALOIS_GENERATOR},
    Error, HeContext, Plaintext, Result,
};

#[derive(Clone, Copy, Default)]
struct ComplexArith {}
type FFTHandler = DWTHandler<ComplexArith>;

impl Arithmetic for ComplexArith {
    type Value = Complex<f64>;
    type Root = Complex<f64>;
    type Scalar = f64;

    #[inline]
    fn add(&self, a: &Self::Value, b: &Self::Value) -> Self::Value {
        a + b
    }

    #[inline]
    fn sub(&self, a: &Self::Value, b: &Self::Value) -> Self::Value {
        a - b
    }

    #[inline]
    fn mul_root(&self, a: &Self::Value, r: &Self::Root) -> Self::Value {
        a * r
    }

    #[inline]
    fn mul_scalar(&self, a: &Self::Value, s: &Self::Scalar) -> Self::Value {
        a * s
    }
}

#[inline]
fn complex_root(index: usize, degree_of_roots: usize) -> Complex<f64> {
    Complex::from_polar(1.0, 2.0 * std::f64::consts::PI * (index as f64) / (degree_of_roots as f64))
}

/// Provides SIMD encoding and decoding functionality for CKKS.
///
/// If the polynomial modulus degree is N, then CKKSEncoder converts vectors of
/// up to N/2 real numbers into plaintext polynomials to be encrypted. Homomorphic
/// operations performed on such encrypted vectors are applied slot-wise.
///
/// ## Mathematical Background
/// If the polynomial modulus is X^N+1, N a power of two, the CKKSEncoder
/// implements an approximation of the canonical embedding of the ring of
/// integers Z\[X\]/(X^N+1) into C^(N/2). Slot i holds the evaluation at the
/// primitive 2N-th root of unity indexed by 3^i, and its conjugate slot the
/// evaluation at -3^i, which keeps encoded polynomials real.
pub struct CKKSEncoder {
    context: Arc<HeContext>,
    slots: usize,
    root_powers: Vec<Complex<f64>>,
    inv_root_powers: Vec<Complex<f64>>,
    matrix_reps_index_map: Vec<usize>,
    fft_handler: FFTHandler,
}

impl CKKSEncoder {

    /// Creates a CKKSEncoder initialized with the specified [HeContext].
    pub fn new(context: Arc<HeContext>) -> Self {
        let coeff_count = context.coeff_count();
        let slots = coeff_count / 2;
        let logn = util::get_power_of_two(coeff_count as u64) as usize;
        let m = coeff_count * 2;

        // Position of every slot (and of its conjugate) in bit-reversed evaluation order.
        let mut matrix_reps_index_map = vec![0; coeff_count];
        let mut pos = 1;
        for i in 0..slots {
            let index1 = (pos - 1) >> 1;
            let index2 = (m - pos - 1) >> 1;
            matrix_reps_index_map[i] = util::reverse_bits_u64(index1 as u64, logn) as usize;
            matrix_reps_index_map[i | slots] = util::reverse_bits_u64(index2 as u64, logn) as usize;
            pos = (pos * GALOIS_GENERATOR) & (m - 1);
        }

        // We need 1~(n-1)-th powers of the primitive 2n-th root, m = 2n
        let mut root_powers = vec![Complex::default(); coeff_count];
        let mut inv_root_powers = vec![Complex::default(); coeff_count];
        for i in 1..coeff_count {
            root_powers[i] = complex_root(util::reverse_bits_u64(i as u64, logn) as usize, m);
            inv_root_powers[i] = complex_root(util::reverse_bits_u64((i - 1) as u64, logn) as usize + 1, m).conj();
        }

        Self {
            context,
            slots,
            root_powers,
            inv_root_powers,
            matrix_reps_index_map,
            fft_handler: FFTHandler::new(&ComplexArith::default()),
        }
    }

    /// Return the number of slots that are available for batching.
    pub fn slot_count(&self) -> usize {
        self.slots
    }

    /// Encodes real values into a plaintext polynomial at the given scale.
    /// The length of the slice must be at most [Self::slot_count()];
    /// missing slots are zero.
    pub fn encode_f64_array(&self, values: &[f64], scale: f64) -> Result<Plaintext> {
        if values.len() > self.slots {
            return Err(Error::Argument(format!("{} values do not fit into {} slots", values.len(), self.slots)));
        }
        let modulus = self.context.coeff_modulus();
        let modulus_bits = modulus.bit_count() as f64;
        if !(scale > 0.0) || scale.log2() + 1.0 >= modulus_bits {
            return Err(Error::Argument(format!("scale {} out of bounds", scale)));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(Error::Argument(format!("cannot encode non-finite value {}", bad)));
        }

        let n = self.slots * 2;
        let logn = util::get_power_of_two(n as u64) as usize;
        let mut conj_values = vec![Complex::default(); n];
        for (i, value) in values.iter().enumerate() {
            conj_values[self.matrix_reps_index_map[i]] = Complex::new(*value, 0.0);
            conj_values[self.matrix_reps_index_map[i + self.slots]] = Complex::new(*value, 0.0);
        }

        let fix = scale / (n as f64);
        self.fft_handler.transform_from_rev(&mut conj_values, logn, &self.inv_root_powers, Some(&fix));

        // Verify that the values are not too large to fit in coeff_modulus.
        // Note that we have an extra + 1 for the sign bit.
        let max_coeff = conj_values.iter()
            .map(|x| x.re.abs())
            .fold(0.0, f64::max);
        let max_coeff_bit_count = max_coeff.max(1.0).log2().ceil();
        if max_coeff_bit_count + 1.0 >= modulus_bits {
            return Err(Error::Argument("values are too large to encode".to_string()));
        }

        let mut data: Vec<u64> = conj_values.iter()
            .map(|c| modulus.from_i64(c.re.round() as i64))
            .collect();
        self.context.ntt_tables().ntt_negacyclic(&mut data);

        Ok(Plaintext::from_raw_parts(data, *self.context.parms_id(), scale))
    }

    /// Decodes a plaintext polynomial into [Self::slot_count()] complex values.
    pub fn decode(&self, plain: &Plaintext) -> Result<Vec<Complex<f64>>> {
        if !plain.is_valid_for(&self.context) {
            return Err(Error::Decode("plaintext is not valid for encryption parameters".to_string()));
        }
        if !(plain.scale() > 0.0) {
            return Err(Error::Decode(format!("plaintext scale {} is invalid", plain.scale())));
        }
        let modulus = self.context.coeff_modulus();
        let upper_half_threshold = self.context.upper_half_threshold();
        let coeff_count = self.context.coeff_count();
        let logn = util::get_power_of_two(coeff_count as u64) as usize;
        let inv_scale = 1.0 / plain.scale();

        let mut coeffs = plain.data().to_vec();
        self.context.ntt_tables().inverse_ntt_negacyclic(&mut coeffs);

        let mut res: Vec<Complex<f64>> = coeffs.iter()
            .map(|c| {
                let signed = if *c >= upper_half_threshold {
                    -((modulus.value() - c) as f64)
                } else {
                    *c as f64
                };
                Complex::new(signed * inv_scale, 0.0)
            })
            .collect();

        self.fft_handler.transform_to_rev(&mut res, logn, &self.root_powers, None);
        Ok((0..self.slots).map(|i| res[self.matrix_reps_index_map[i]]).collect())
    }

}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use super::*;
    use crate::EncryptionParameters;

    fn encoder(poly_modulus_degree: usize) -> CKKSEncoder {
        let parms = EncryptionParameters::inference_default()
            .set_poly_modulus_degree(poly_modulus_degree);
        CKKSEncoder::new(HeContext::new(parms).unwrap())
    }

    #[test]
    fn test_vector() {
        let encoder = encoder(64);
        assert_eq!(32, encoder.slot_count());

        let zeros = vec![0.0; 32];
        let plain = encoder.encode_f64_array(&zeros, 2.0_f64.powi(16)).unwrap();
        let result = encoder.decode(&plain).unwrap();
        assert!(result.iter().all(|x| x.re.abs() < 0.5));

        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(11);
        let values: Vec<f64> = (0..32).map(|_| rng.gen_range(-10.0..10.0)).collect();
        let delta = 2.0_f64.powi(30);
        let plain = encoder.encode_f64_array(&values, delta).unwrap();
        let result = encoder.decode(&plain).unwrap();
        for (a, b) in result.iter().zip(values.iter()) {
            assert!((a.re - b).abs() < 1e-6);
            assert!(a.im.abs() < 1e-6);
        }
    }

    #[test]
    fn test_partial_vector_pads_with_zero() {
        let encoder = encoder(64);
        let values = [1.5, -2.25, 3.0];
        let plain = encoder.encode_f64_array(&values, 2.0_f64.powi(30)).unwrap();
        let result = encoder.decode(&plain).unwrap();
        assert_eq!(32, result.len());
        for (i, x) in result.iter().enumerate() {
            let expected = values.get(i).copied().unwrap_or(0.0);
            assert!((x.re - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_encode_rejects_bad_input() {
        let encoder = encoder(64);
        assert!(matches!(encoder.encode_f64_array(&[0.0; 33], 2.0_f64.powi(30)), Err(Error::Argument(_))));
        assert!(matches!(encoder.encode_f64_array(&[1.0], -1.0), Err(Error::Argument(_))));
        assert!(matches!(encoder.encode_f64_array(&[1.0], 2.0_f64.powi(59)), Err(Error::Argument(_))));
        assert!(matches!(encoder.encode_f64_array(&[f64::NAN], 2.0_f64.powi(30)), Err(Error::Argument(_))));
        assert!(matches!(encoder.encode_f64_array(&[1e12], 2.0_f64.powi(50)), Err(Error::Argument(_))));
    }

    #[test]
    fn test_decode_rejects_foreign_plaintext() {
        let encoder = encoder(64);
        let other = self::encoder(128);
        let plain = other.encode_f64_array(&[1.0], 2.0_f64.powi(30)).unwrap();
        assert!(matches!(encoder.decode(&plain), Err(Error::Decode(_))));
    }
}
