use serde::{Deserialize, Serialize};

use crate::{util, Error, Modulus, Result};

/// A unique identifier for a set of encryption parameters.
pub type ParmsID = util::hash::HashBlock;

/// The default zero ParmsID, carried by objects not bound to any parameters.
pub const PARMS_ID_ZERO: ParmsID = util::hash::HASH_ZERO_BLOCK;

/// The prime used by [EncryptionParameters::inference_default]. It is NTT
/// friendly for every power-of-two degree up to 2^17.
pub const DEFAULT_COEFF_MODULUS: u64 = 0xffffffffffc0001;

/// A set of parameters defining the CKKS instance.
///
/// It includes the polynomial modulus degree N, a single prime coefficient
/// modulus q and the scale at which real values are encoded. Every party of
/// an exchange must hold identical parameters; the derived [ParmsID] is
/// stamped on keys and ciphertexts so mismatches are caught on load.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "ParametersRepr", into = "ParametersRepr")]
pub struct EncryptionParameters {
    poly_modulus_degree: usize,
    coeff_modulus: Modulus,
    scale: f64,
    parms_id: ParmsID,
}

#[derive(Serialize, Deserialize)]
struct ParametersRepr {
    poly_modulus_degree: usize,
    coeff_modulus: Modulus,
    scale: f64,
}

impl From<EncryptionParameters> for ParametersRepr {
    fn from(parms: EncryptionParameters) -> Self {
        ParametersRepr {
            poly_modulus_degree: parms.poly_modulus_degree,
            coeff_modulus: parms.coeff_modulus,
            scale: parms.scale,
        }
    }
}

impl TryFrom<ParametersRepr> for EncryptionParameters {
    type Error = Error;
    fn try_from(repr: ParametersRepr) -> Result<Self> {
        let parms = EncryptionParameters::new()
            .set_poly_modulus_degree(repr.poly_modulus_degree)
            .set_coeff_modulus(repr.coeff_modulus)
            .set_scale(repr.scale);
        parms.validate()?;
        Ok(parms)
    }
}

impl Default for EncryptionParameters {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for EncryptionParameters {
    fn eq(&self, other: &Self) -> bool {
        self.parms_id == other.parms_id
    }
}

impl EncryptionParameters {

    /// Polynomial modulus degree N. The scheme operates
    /// on the polynomial ring Z_q\[X\]/(X^N + 1) and packs N/2 slots.
    pub fn poly_modulus_degree(&self) -> usize {self.poly_modulus_degree}

    /// Coefficient modulus q.
    pub fn coeff_modulus(&self) -> &Modulus {&self.coeff_modulus}

    /// Scale applied to real values before rounding them into the ring.
    pub fn scale(&self) -> f64 {self.scale}

    /// Number of CKKS slots, N/2.
    pub fn slot_count(&self) -> usize {self.poly_modulus_degree / 2}

    /// The unique identifier for the encryption parameters.
    pub fn parms_id(&self) -> &ParmsID {&self.parms_id}

    /// Creates an empty parameter set. Usually the user sets
    /// the fields right after creating an instance.
    /// ```rust
    /// # use heathcliff_infer::*;
    /// let parms = EncryptionParameters::new()
    ///     .set_poly_modulus_degree(4096)
    ///     .set_coeff_modulus(Modulus::new(DEFAULT_COEFF_MODULUS))
    ///     .set_scale(2.0_f64.powi(40));
    /// assert!(parms.validate().is_ok());
    /// ```
    pub fn new() -> Self {
        let mut ret = EncryptionParameters {
            poly_modulus_degree: 0,
            coeff_modulus: Modulus::default(),
            scale: 1.0,
            parms_id: PARMS_ID_ZERO,
        };
        ret.compute_parms_id();
        ret
    }

    /// Parameters used by the inference pipeline: 2048 slots, a 60-bit prime
    /// and a 40-bit scale.
    pub fn inference_default() -> Self {
        Self::new()
            .set_poly_modulus_degree(4096)
            .set_coeff_modulus(Modulus::new(DEFAULT_COEFF_MODULUS))
            .set_scale(2.0_f64.powi(40))
    }

    /// See [EncryptionParameters::new] for an example.
    pub fn set_poly_modulus_degree(mut self, poly_modulus_degree: usize) -> Self {
        self.poly_modulus_degree = poly_modulus_degree;
        self.compute_parms_id();
        self
    }

    /// See [EncryptionParameters::new] for an example.
    pub fn set_coeff_modulus(mut self, coeff_modulus: Modulus) -> Self {
        self.coeff_modulus = coeff_modulus;
        self.compute_parms_id();
        self
    }

    /// See [EncryptionParameters::new] for an example.
    pub fn set_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self.compute_parms_id();
        self
    }

    /// Check that the parameters describe a usable ring.
    pub fn validate(&self) -> Result<()> {
        let n = self.poly_modulus_degree;
        if util::get_power_of_two(n as u64) < 1
            || !(util::HE_POLY_MOD_DEGREE_MIN..=util::HE_POLY_MOD_DEGREE_MAX).contains(&n)
        {
            return Err(Error::Config(format!("poly_modulus_degree {} is not a supported power of two", n)));
        }
        let q = &self.coeff_modulus;
        if q.bit_count() > util::HE_MOD_BIT_COUNT_MAX || !q.is_prime() {
            return Err(Error::Config(format!("coeff_modulus {} must be a prime of at most {} bits", q, util::HE_MOD_BIT_COUNT_MAX)));
        }
        if (q.value() - 1) % (2 * n as u64) != 0 {
            return Err(Error::Config(format!("coeff_modulus {} is not congruent to 1 modulo {}", q, 2 * n)));
        }
        if !(self.scale > 0.0) || self.scale.log2() + 1.0 >= q.bit_count() as f64 {
            return Err(Error::Config(format!("scale {} out of bounds for a {}-bit modulus", self.scale, q.bit_count())));
        }
        Ok(())
    }

    fn compute_parms_id(&mut self) {
        let words = [
            self.poly_modulus_degree as u64,
            self.coeff_modulus.value(),
            self.scale.to_bits(),
        ];
        self.parms_id = util::hash::hash(&words);
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters_are_valid() {
        let parms = EncryptionParameters::inference_default();
        assert!(parms.validate().is_ok());
        assert_eq!(2048, parms.slot_count());
        assert_ne!(PARMS_ID_ZERO, *parms.parms_id());
    }

    #[test]
    fn test_parms_id_tracks_fields() {
        let a = EncryptionParameters::inference_default();
        let b = a.clone().set_scale(2.0_f64.powi(30));
        let c = b.clone().set_scale(2.0_f64.powi(40));
        assert_ne!(a.parms_id(), b.parms_id());
        assert_eq!(a.parms_id(), c.parms_id());
        assert_eq!(a, c);
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let good = EncryptionParameters::inference_default();
        assert!(matches!(good.clone().set_poly_modulus_degree(3000).validate(), Err(Error::Config(_))));
        assert!(matches!(good.clone().set_coeff_modulus(Modulus::new(1 << 40)).validate(), Err(Error::Config(_))));
        // 31 is prime but 31 - 1 is not divisible by 2N.
        assert!(matches!(good.clone().set_coeff_modulus(Modulus::new(31)).validate(), Err(Error::Config(_))));
        assert!(matches!(good.clone().set_scale(0.0).validate(), Err(Error::Config(_))));
        assert!(matches!(good.set_scale(2.0_f64.powi(60)).validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_serde_recomputes_parms_id() {
        let parms = EncryptionParameters::inference_default();
        let bytes = bincode::serialize(&parms).unwrap();
        let back: EncryptionParameters = bincode::deserialize(&bytes).unwrap();
        assert_eq!(parms.parms_id(), back.parms_id());
    }

    #[test]
    fn test_serde_rejects_invalid_parameters() {
        let parms = EncryptionParameters::inference_default().set_poly_modulus_degree(3000);
        let bytes = bincode::serialize(&parms).unwrap();
        assert!(bincode::deserialize::<EncryptionParameters>(&bytes).is_err());
    }
}
