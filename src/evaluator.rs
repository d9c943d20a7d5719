use std::sync::Arc;

use crate::{
    util, Ciphertext, Error, HeContext, Plaintext, Result,
};

/// Provides operations on [Ciphertext] objects.
///
/// Arithmetic on ciphertexts passes through the encryption layer to the
/// encoded slots: adding two ciphertexts adds their slot vectors, adding a
/// plaintext shifts every slot by the encoded value. With a single prime
/// modulus there is no rescaling, so the supported operations are those that
/// leave the scale unchanged: addition, subtraction and negation of
/// ciphertexts, and addition or subtraction of plaintexts.
///
/// ## Inplace and new variants
/// Every operation comes in two variants: one that overwrites its first
/// operand, suffixed `_inplace`, and one that returns a new object,
/// suffixed `_new`.
pub struct Evaluator {
    context: Arc<HeContext>,
}

impl Evaluator {

    /// Creates an Evaluator for the given context.
    pub fn new(context: Arc<HeContext>) -> Self {
        Self { context }
    }

    /// The context used by the evaluator.
    pub fn context(&self) -> &Arc<HeContext> {&self.context}

    fn check_ciphertext(&self, ciphertext: &Ciphertext) -> Result<()> {
        self.context.check_parms_id(ciphertext.parms_id(), "ciphertext")?;
        if !ciphertext.is_valid_for(&self.context) {
            return Err(Error::Argument("ciphertext is not valid for encryption parameters".to_string()));
        }
        Ok(())
    }

    fn check_plaintext(&self, plain: &Plaintext) -> Result<()> {
        self.context.check_parms_id(plain.parms_id(), "plaintext")?;
        if !plain.is_valid_for(&self.context) {
            return Err(Error::Argument("plaintext is not valid for encryption parameters".to_string()));
        }
        Ok(())
    }

    fn check_same_scale(a: f64, b: f64) -> Result<()> {
        if !util::are_close_f64(a, b) {
            return Err(Error::Argument(format!("scale mismatch: {} and {}", a, b)));
        }
        Ok(())
    }

    /// Negates a ciphertext.
    pub fn negate_inplace(&self, ciphertext: &mut Ciphertext) -> Result<()> {
        self.check_ciphertext(ciphertext)?;
        let modulus = self.context.coeff_modulus();
        for i in 0..ciphertext.size() {
            ciphertext.poly_mut(i).iter_mut().for_each(|x| *x = modulus.negate(*x));
        }
        Ok(())
    }

    /// See [Evaluator::negate_inplace].
    pub fn negate_new(&self, ciphertext: &Ciphertext) -> Result<Ciphertext> {
        let mut destination = ciphertext.clone();
        self.negate_inplace(&mut destination)?;
        Ok(destination)
    }

    /// Adds `ciphertext2` to `ciphertext1`. Both must share parameters and scale.
    pub fn add_inplace(&self, ciphertext1: &mut Ciphertext, ciphertext2: &Ciphertext) -> Result<()> {
        self.check_ciphertext(ciphertext1)?;
        self.check_ciphertext(ciphertext2)?;
        Self::check_same_scale(ciphertext1.scale(), ciphertext2.scale())?;
        let modulus = self.context.coeff_modulus();
        for i in 0..ciphertext1.size() {
            ciphertext1.poly_mut(i).iter_mut()
                .zip(ciphertext2.poly(i))
                .for_each(|(x, y)| *x = modulus.add(*x, *y));
        }
        Ok(())
    }

    /// See [Evaluator::add_inplace].
    pub fn add_new(&self, ciphertext1: &Ciphertext, ciphertext2: &Ciphertext) -> Result<Ciphertext> {
        let mut destination = ciphertext1.clone();
        self.add_inplace(&mut destination, ciphertext2)?;
        Ok(destination)
    }

    /// Sums a non-empty list of ciphertexts.
    pub fn add_many_new(&self, operands: &[Ciphertext]) -> Result<Ciphertext> {
        let (first, rest) = operands.split_first()
            .ok_or_else(|| Error::Argument("operands must be non-empty".to_string()))?;
        let mut destination = first.clone();
        for operand in rest {
            self.add_inplace(&mut destination, operand)?;
        }
        Ok(destination)
    }

    /// Subtracts `ciphertext2` from `ciphertext1`.
    pub fn sub_inplace(&self, ciphertext1: &mut Ciphertext, ciphertext2: &Ciphertext) -> Result<()> {
        self.check_ciphertext(ciphertext1)?;
        self.check_ciphertext(ciphertext2)?;
        Self::check_same_scale(ciphertext1.scale(), ciphertext2.scale())?;
        let modulus = self.context.coeff_modulus();
        for i in 0..ciphertext1.size() {
            ciphertext1.poly_mut(i).iter_mut()
                .zip(ciphertext2.poly(i))
                .for_each(|(x, y)| *x = modulus.sub(*x, *y));
        }
        Ok(())
    }

    /// See [Evaluator::sub_inplace].
    pub fn sub_new(&self, ciphertext1: &Ciphertext, ciphertext2: &Ciphertext) -> Result<Ciphertext> {
        let mut destination = ciphertext1.clone();
        self.sub_inplace(&mut destination, ciphertext2)?;
        Ok(destination)
    }

    /// Adds a plaintext to a ciphertext. Only c0 changes.
    pub fn add_plain_inplace(&self, ciphertext: &mut Ciphertext, plain: &Plaintext) -> Result<()> {
        self.check_ciphertext(ciphertext)?;
        self.check_plaintext(plain)?;
        Self::check_same_scale(ciphertext.scale(), plain.scale())?;
        let modulus = self.context.coeff_modulus();
        ciphertext.poly_mut(0).iter_mut()
            .zip(plain.data())
            .for_each(|(x, y)| *x = modulus.add(*x, *y));
        Ok(())
    }

    /// See [Evaluator::add_plain_inplace].
    pub fn add_plain_new(&self, ciphertext: &Ciphertext, plain: &Plaintext) -> Result<Ciphertext> {
        let mut destination = ciphertext.clone();
        self.add_plain_inplace(&mut destination, plain)?;
        Ok(destination)
    }

    /// Subtracts a plaintext from a ciphertext.
    pub fn sub_plain_inplace(&self, ciphertext: &mut Ciphertext, plain: &Plaintext) -> Result<()> {
        self.check_ciphertext(ciphertext)?;
        self.check_plaintext(plain)?;
        Self::check_same_scale(ciphertext.scale(), plain.scale())?;
        let modulus = self.context.coeff_modulus();
        ciphertext.poly_mut(0).iter_mut()
            .zip(plain.data())
            .for_each(|(x, y)| *x = modulus.sub(*x, *y));
        Ok(())
    }

    /// See [Evaluator::sub_plain_inplace].
    pub fn sub_plain_new(&self, ciphertext: &Ciphertext, plain: &Plaintext) -> Result<Ciphertext> {
        let mut destination = ciphertext.clone();
        self.sub_plain_inplace(&mut destination, plain)?;
        Ok(destination)
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CKKSEncoder, Decryptor, EncryptionParameters, Encryptor, KeyGenerator};

    struct Fixture {
        context: Arc<HeContext>,
        encoder: CKKSEncoder,
        encryptor: Encryptor,
        decryptor: Decryptor,
        evaluator: Evaluator,
    }

    impl Fixture {
        fn new() -> Self {
            let context = HeContext::new(
                EncryptionParameters::inference_default().set_poly_modulus_degree(64)
            ).unwrap();
            let mut keygen = KeyGenerator::new(context.clone());
            Fixture {
                encoder: CKKSEncoder::new(context.clone()),
                encryptor: Encryptor::new(context.clone(), keygen.create_public_key()).unwrap(),
                decryptor: Decryptor::new(context.clone(), keygen.secret_key().clone()).unwrap(),
                evaluator: Evaluator::new(context.clone()),
                context,
            }
        }

        fn plain(&self, values: &[f64]) -> Plaintext {
            self.encoder.encode_f64_array(values, self.context.parms().scale()).unwrap()
        }

        fn encrypt(&self, values: &[f64]) -> Ciphertext {
            self.encryptor.encrypt(&self.plain(values)).unwrap()
        }

        fn decrypt(&self, cipher: &Ciphertext) -> Vec<f64> {
            let plain = self.decryptor.decrypt(cipher).unwrap();
            self.encoder.decode(&plain).unwrap().iter().map(|x| x.re).collect()
        }
    }

    fn assert_close(expected: &[f64], actual: &[f64]) {
        for (i, e) in expected.iter().enumerate() {
            assert!((e - actual[i]).abs() < 1e-4, "slot {}: {} vs {}", i, e, actual[i]);
        }
    }

    #[test]
    fn test_add_sub_negate() {
        let f = Fixture::new();
        let a = f.encrypt(&[1.0, 2.0, 3.0]);
        let b = f.encrypt(&[0.5, -1.0, 4.0]);
        assert_close(&[1.5, 1.0, 7.0], &f.decrypt(&f.evaluator.add_new(&a, &b).unwrap()));
        assert_close(&[0.5, 3.0, -1.0], &f.decrypt(&f.evaluator.sub_new(&a, &b).unwrap()));
        assert_close(&[-1.0, -2.0, -3.0], &f.decrypt(&f.evaluator.negate_new(&a).unwrap()));
        let sum = f.evaluator.add_many_new(&[a.clone(), b, a]).unwrap();
        assert_close(&[2.5, 3.0, 10.0], &f.decrypt(&sum));
        assert!(matches!(f.evaluator.add_many_new(&[]), Err(Error::Argument(_))));
    }

    #[test]
    fn test_plain_operations() {
        let f = Fixture::new();
        let a = f.encrypt(&[1.0, 2.0]);
        let p = f.plain(&[10.0, -20.0]);
        assert_close(&[11.0, -18.0], &f.decrypt(&f.evaluator.add_plain_new(&a, &p).unwrap()));
        assert_close(&[-9.0, 22.0], &f.decrypt(&f.evaluator.sub_plain_new(&a, &p).unwrap()));
    }

    #[test]
    fn test_scale_mismatch() {
        let f = Fixture::new();
        let a = f.encrypt(&[1.0]);
        let p = f.encoder.encode_f64_array(&[1.0], 2.0_f64.powi(20)).unwrap();
        assert!(matches!(f.evaluator.add_plain_new(&a, &p), Err(Error::Argument(_))));
    }
}
