use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    util::{rlwe, BlakeRNG, BlakeRNGFactory},
    Ciphertext, HeContext, ParmsID,
};

/// Class to store a secret key.
///
/// The key is a ternary polynomial kept in NTT form. It never leaves the
/// client: the exchange layer only writes it under the secret root.
#[derive(Clone, Serialize, Deserialize)]
pub struct SecretKey {
    data: Vec<u64>,
    parms_id: ParmsID,
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey").field("coeff_count", &self.data.len()).finish_non_exhaustive()
    }
}

impl SecretKey {

    /// The [ParmsID] the key was generated under.
    pub fn parms_id(&self) -> &ParmsID {&self.parms_id}

    pub(crate) fn data(&self) -> &[u64] {&self.data}

    /// Is the key shaped for the given context?
    pub fn is_valid_for(&self, context: &HeContext) -> bool {
        self.parms_id == *context.parms_id() && self.data.len() == context.coeff_count()
    }

}

/// Class to store a public key.
///
/// Internally an encryption of zero, (-(a * s + e), a), under the secret key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublicKey {
    data: Ciphertext,
}

impl PublicKey {

    /// The [ParmsID] the key was generated under.
    pub fn parms_id(&self) -> &ParmsID {self.data.parms_id()}

    pub(crate) fn as_ciphertext(&self) -> &Ciphertext {&self.data}

    /// Is the key shaped for the given context?
    pub fn is_valid_for(&self, context: &HeContext) -> bool {
        self.data.is_valid_for(context)
    }

}

/// Generates matching secret and public keys.
///
/// A KeyGenerator always owns a secret key, either freshly sampled or handed
/// in through [KeyGenerator::from_secret_key]. Every call to
/// [KeyGenerator::create_public_key] draws new randomness from the same
/// stream, so distinct public keys for the same secret key are expected.
pub struct KeyGenerator {
    context: Arc<HeContext>,
    secret_key: SecretKey,
    rng: BlakeRNG,
}

impl KeyGenerator {

    /// Creates a KeyGenerator with a freshly sampled secret key.
    pub fn new(context: Arc<HeContext>) -> Self {
        Self::with_rng_factory(context, BlakeRNGFactory::new())
    }

    /// Creates a KeyGenerator whose randomness comes from the given factory.
    /// A seeded factory makes key generation reproducible.
    pub fn with_rng_factory(context: Arc<HeContext>, rng_factory: BlakeRNGFactory) -> Self {
        let mut rng = rng_factory.get_rng();
        let secret_key = Self::sample_secret_key(&context, &mut rng);
        Self { context, secret_key, rng }
    }

    /// Creates a KeyGenerator around an existing secret key.
    pub fn from_secret_key(context: Arc<HeContext>, secret_key: SecretKey) -> Self {
        Self { context, secret_key, rng: BlakeRNGFactory::new().get_rng() }
    }

    /// The secret key owned by the generator.
    pub fn secret_key(&self) -> &SecretKey {&self.secret_key}

    fn sample_secret_key(context: &HeContext, rng: &mut BlakeRNG) -> SecretKey {
        let mut data = vec![0; context.coeff_count()];
        rlwe::sample::ternary(rng, context.coeff_modulus(), &mut data);
        context.ntt_tables().ntt_negacyclic(&mut data);
        SecretKey { data, parms_id: *context.parms_id() }
    }

    /// Create a public key for the owned secret key.
    pub fn create_public_key(&mut self) -> PublicKey {
        let context = &self.context;
        let modulus = context.coeff_modulus();
        let coeff_count = context.coeff_count();
        let rng = &mut self.rng;

        // A uniform polynomial is uniform in either domain, sample it directly in NTT form.
        let mut a = vec![0; coeff_count];
        rlwe::sample::uniform(rng, modulus, &mut a);
        let mut e = vec![0; coeff_count];
        rlwe::sample::normal(rng, modulus, &mut e);
        context.ntt_tables().ntt_negacyclic(&mut e);

        let c0 = a.iter()
            .zip(self.secret_key.data.iter())
            .zip(e.iter())
            .map(|((a, s), e)| modulus.negate(modulus.add(modulus.mul(*a, *s), *e)))
            .collect();
        PublicKey {
            data: Ciphertext::from_polys(c0, a, *context.parms_id(), 1.0),
        }
    }

}
