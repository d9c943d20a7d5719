use std::sync::{Arc, Mutex};

use crate::{
    util::{rlwe, BlakeRNG, BlakeRNGFactory},
    Ciphertext, Error, HeContext, Plaintext, PublicKey, Result, SecretKey,
};

/// Encrypts [Plaintext] objects into [Ciphertext] objects with a [PublicKey].
///
/// Encryption is probabilistic: every call samples a fresh ephemeral ternary
/// polynomial u and two noise polynomials, then outputs
/// (u * pk0 + e0 + m, u * pk1 + e1). Plaintexts and ciphertexts stay in NTT
/// form throughout.
///
/// The encryptor may be shared between threads; the random stream is guarded
/// by a mutex.
pub struct Encryptor {
    context: Arc<HeContext>,
    public_key: PublicKey,
    rng: Mutex<BlakeRNG>,
}

impl Encryptor {

    /// Creates an Encryptor bound to `public_key`.
    /// ```rust
    /// # use heathcliff_infer::*;
    /// let context = HeContext::new(EncryptionParameters::inference_default()).unwrap();
    /// let mut keygen = KeyGenerator::new(context.clone());
    /// let encryptor = Encryptor::new(context.clone(), keygen.create_public_key()).unwrap();
    /// let decryptor = Decryptor::new(context.clone(), keygen.secret_key().clone()).unwrap();
    /// let encoder = CKKSEncoder::new(context.clone());
    /// let plain = encoder.encode_f64_array(&[1.0, 2.0, 3.0], context.parms().scale()).unwrap();
    /// let decrypted = decryptor.decrypt(&encryptor.encrypt(&plain).unwrap()).unwrap();
    /// let values = encoder.decode(&decrypted).unwrap();
    /// assert!((values[1].re - 2.0).abs() < 1e-3);
    /// ```
    pub fn new(context: Arc<HeContext>, public_key: PublicKey) -> Result<Self> {
        Self::with_rng_factory(context, public_key, BlakeRNGFactory::new())
    }

    /// Like [Encryptor::new], drawing randomness from the given factory.
    pub fn with_rng_factory(context: Arc<HeContext>, public_key: PublicKey, rng_factory: BlakeRNGFactory) -> Result<Self> {
        context.check_parms_id(public_key.parms_id(), "public key")?;
        if !public_key.is_valid_for(&context) {
            return Err(Error::Decode("public key is not valid for encryption parameters".to_string()));
        }
        Ok(Self { context, public_key, rng: Mutex::new(rng_factory.get_rng()) })
    }

    /// The public key used by the encryptor.
    pub fn public_key(&self) -> &PublicKey {&self.public_key}

    /// Encrypts a plaintext and returns the ciphertext.
    pub fn encrypt(&self, plain: &Plaintext) -> Result<Ciphertext> {
        self.context.check_parms_id(plain.parms_id(), "plaintext")?;
        if !plain.is_valid_for(&self.context) {
            return Err(Error::Argument("plaintext is not valid for encryption parameters".to_string()));
        }
        let context = &self.context;
        let modulus = context.coeff_modulus();
        let coeff_count = context.coeff_count();
        let ntt_tables = context.ntt_tables();

        let mut u = vec![0; coeff_count];
        let mut e0 = vec![0; coeff_count];
        let mut e1 = vec![0; coeff_count];
        {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            rlwe::sample::ternary(&mut *rng, modulus, &mut u);
            rlwe::sample::normal(&mut *rng, modulus, &mut e0);
            rlwe::sample::normal(&mut *rng, modulus, &mut e1);
        }
        ntt_tables.ntt_negacyclic(&mut u);
        ntt_tables.ntt_negacyclic(&mut e0);
        ntt_tables.ntt_negacyclic(&mut e1);

        let pk = self.public_key.as_ciphertext();
        let c0 = itertools::izip!(pk.poly(0), &u, &e0, plain.data())
            .map(|(p, u, e, m)| modulus.add(modulus.add(modulus.mul(*p, *u), *e), *m))
            .collect();
        let c1 = itertools::izip!(pk.poly(1), &u, &e1)
            .map(|(p, u, e)| modulus.add(modulus.mul(*p, *u), *e))
            .collect();
        Ok(Ciphertext::from_polys(c0, c1, *context.parms_id(), plain.scale()))
    }

}

/// Decrypts [Ciphertext] objects into [Plaintext] objects with a [SecretKey].
pub struct Decryptor {
    context: Arc<HeContext>,
    secret_key: SecretKey,
}

impl Decryptor {

    /// Creates a Decryptor bound to `secret_key`.
    pub fn new(context: Arc<HeContext>, secret_key: SecretKey) -> Result<Self> {
        context.check_parms_id(secret_key.parms_id(), "secret key")?;
        if !secret_key.is_valid_for(&context) {
            return Err(Error::Decode("secret key is not valid for encryption parameters".to_string()));
        }
        Ok(Self { context, secret_key })
    }

    /// Computes c0 + c1 * s. The result keeps the scale of the ciphertext.
    pub fn decrypt(&self, encrypted: &Ciphertext) -> Result<Plaintext> {
        self.context.check_parms_id(encrypted.parms_id(), "ciphertext")?;
        if !encrypted.is_valid_for(&self.context) {
            return Err(Error::Decode("ciphertext is not valid for encryption parameters".to_string()));
        }
        let modulus = self.context.coeff_modulus();
        let data = itertools::izip!(encrypted.poly(0), encrypted.poly(1), self.secret_key.data())
            .map(|(c0, c1, s)| modulus.add(*c0, modulus.mul(*c1, *s)))
            .collect();
        Ok(Plaintext::from_raw_parts(data, *self.context.parms_id(), encrypted.scale()))
    }

}
