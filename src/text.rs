use serde::{Deserialize, Serialize};

use crate::{HeContext, ParmsID, PARMS_ID_ZERO};

/// Struct to store a plaintext element.
///
/// The data for the plaintext is a polynomial with coefficients modulo the
/// coefficient modulus. A CKKS plaintext is always stored in NTT form and
/// carries the parms_id of the parameters it was encoded under, together
/// with the scale its values were multiplied by.
///
/// See [Ciphertext] for the struct that stores ciphertexts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plaintext {
    data: Vec<u64>,
    parms_id: ParmsID,
    scale: f64,
}

impl Default for Plaintext {
    fn default() -> Self {
        Plaintext { data: vec![], parms_id: PARMS_ID_ZERO, scale: 1.0 }
    }
}

impl Plaintext {

    /// Creates an empty plaintext.
    pub fn new() -> Self {
        Plaintext::default()
    }

    pub(crate) fn from_raw_parts(data: Vec<u64>, parms_id: ParmsID, scale: f64) -> Self {
        Plaintext { data, parms_id, scale }
    }

    /// The [ParmsID] of the plaintext.
    pub fn parms_id(&self) -> &ParmsID {&self.parms_id}

    /// The scale of the plaintext.
    pub fn scale(&self) -> f64 {self.scale}

    /// The number of coefficients in the plaintext.
    pub fn coeff_count(&self) -> usize {self.data.len()}

    /// Returns a reference to the underlying data.
    pub fn data(&self) -> &[u64] {&self.data}

    /// Is the plaintext shaped for the given context?
    pub fn is_valid_for(&self, context: &HeContext) -> bool {
        self.parms_id == *context.parms_id() && self.data.len() == context.coeff_count()
    }

}

/// Struct to store a ciphertext element.
///
/// A fresh ciphertext consists of two polynomials (c0, c1) in NTT form,
/// laid out back to back in a single backing vector, so that
/// c0 + c1 * s decrypts to the encoded plaintext. The ciphertext records the
/// parms_id and scale it was produced under; both travel with it through
/// serialization so that a decrypting party can refuse foreign ciphertexts.
///
/// Ciphertexts are treated as opaque by everything outside the scheme core:
/// the exchange layer only stores, loads and forwards their bytes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ciphertext {
    coeff_count: usize,
    data: Vec<u64>,
    parms_id: ParmsID,
    scale: f64,
}

impl Default for Ciphertext {
    fn default() -> Self {
        Ciphertext { coeff_count: 0, data: vec![], parms_id: PARMS_ID_ZERO, scale: 1.0 }
    }
}

impl Ciphertext {

    /// Creates an empty ciphertext.
    pub fn new() -> Self {
        Ciphertext::default()
    }

    pub(crate) fn from_polys(c0: Vec<u64>, c1: Vec<u64>, parms_id: ParmsID, scale: f64) -> Self {
        debug_assert_eq!(c0.len(), c1.len());
        let coeff_count = c0.len();
        let mut data = c0;
        data.extend(c1);
        Ciphertext { coeff_count, data, parms_id, scale }
    }

    /// Number of polynomials.
    pub fn size(&self) -> usize {
        if self.coeff_count == 0 {0} else {self.data.len() / self.coeff_count}
    }

    /// Degree of each polynomial.
    pub fn coeff_count(&self) -> usize {self.coeff_count}

    /// The [ParmsID] of the ciphertext.
    pub fn parms_id(&self) -> &ParmsID {&self.parms_id}

    /// The scale of the encrypted values.
    pub fn scale(&self) -> f64 {self.scale}

    /// Returns a reference to the underlying data.
    pub fn data(&self) -> &[u64] {&self.data}

    /// The i-th polynomial of the ciphertext.
    pub fn poly(&self, index: usize) -> &[u64] {
        &self.data[index * self.coeff_count..(index + 1) * self.coeff_count]
    }

    /// Mutable access to the i-th polynomial of the ciphertext.
    pub fn poly_mut(&mut self, index: usize) -> &mut [u64] {
        &mut self.data[index * self.coeff_count..(index + 1) * self.coeff_count]
    }

    /// Is the ciphertext well formed for the given context?
    pub fn is_valid_for(&self, context: &HeContext) -> bool {
        self.parms_id == *context.parms_id()
            && self.coeff_count == context.coeff_count()
            && self.size() == 2
            && self.data.len() == 2 * self.coeff_count
            && self.data.iter().all(|x| *x < context.coeff_modulus().value())
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EncryptionParameters;

    #[test]
    fn test_ciphertext_layout() {
        let cipher = Ciphertext::from_polys(vec![1, 2, 3, 4], vec![5, 6, 7, 8], PARMS_ID_ZERO, 2.0);
        assert_eq!(2, cipher.size());
        assert_eq!(4, cipher.coeff_count());
        assert_eq!(&[1, 2, 3, 4], cipher.poly(0));
        assert_eq!(&[5, 6, 7, 8], cipher.poly(1));
        assert_eq!(0, Ciphertext::new().size());
    }

    #[test]
    fn test_validity() {
        let context = HeContext::new(EncryptionParameters::inference_default().set_poly_modulus_degree(8)).unwrap();
        let parms_id = *context.parms_id();
        let good = Ciphertext::from_polys(vec![0; 8], vec![1; 8], parms_id, 1.0);
        assert!(good.is_valid_for(&context));
        let short = Ciphertext::from_polys(vec![0; 4], vec![1; 4], parms_id, 1.0);
        assert!(!short.is_valid_for(&context));
        let foreign = Ciphertext::from_polys(vec![0; 8], vec![1; 8], PARMS_ID_ZERO, 1.0);
        assert!(!foreign.is_valid_for(&context));
        let unreduced = Ciphertext::from_polys(vec![u64::MAX; 8], vec![1; 8], parms_id, 1.0);
        assert!(!unreduced.is_valid_for(&context));

        let plain = Plaintext::from_raw_parts(vec![0; 8], parms_id, 1.0);
        assert!(plain.is_valid_for(&context));
        assert!(!Plaintext::new().is_valid_for(&context));
    }
}
