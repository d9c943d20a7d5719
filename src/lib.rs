//! Confidential inference over an approximate homomorphic encryption scheme.
//!
//! The crate has two layers.
//!
//! The scheme core is a compact CKKS instance over a single prime modulus:
//! [EncryptionParameters] and [HeContext] fix the ring, [KeyGenerator]
//! produces keys, [CKKSEncoder] maps real vectors to plaintext polynomials,
//! [Encryptor] and [Decryptor] move between plaintexts and ciphertexts, and
//! [Evaluator] offers the slot-wise operations that keep the scale unchanged.
//! Every object carries the [ParmsID] of the parameters it was created under,
//! and the byte format in [serialize] refuses foreign objects.
//!
//! The [app] layer runs the two-party inference exchange on top: a client
//! encodes and encrypts samples, a server evaluates a circuit on the
//! ciphertexts, and the client decrypts and classifies the results. Artifacts
//! move through an [app::store::ArtifactStore] addressed by role directory,
//! kind and batch index.
//!
//! ```rust
//! # use heathcliff_infer::*;
//! let parms = EncryptionParameters::inference_default();
//! let context = HeContext::new(parms).unwrap();
//! let mut keygen = KeyGenerator::new(context.clone());
//! let encryptor = Encryptor::new(context.clone(), keygen.create_public_key()).unwrap();
//! let decryptor = Decryptor::new(context.clone(), keygen.secret_key().clone()).unwrap();
//! let evaluator = Evaluator::new(context.clone());
//! let encoder = CKKSEncoder::new(context.clone());
//!
//! let scale = context.parms().scale();
//! let a = encryptor.encrypt(&encoder.encode_f64_array(&[1.0, 2.0], scale).unwrap()).unwrap();
//! let b = encryptor.encrypt(&encoder.encode_f64_array(&[0.5, 0.25], scale).unwrap()).unwrap();
//! let sum = evaluator.add_new(&a, &b).unwrap();
//! let values = encoder.decode(&decryptor.decrypt(&sum).unwrap()).unwrap();
//! assert!((values[0].re - 1.5).abs() < 1e-3);
//! assert!((values[1].re - 2.25).abs() < 1e-3);
//! ```

#![warn(missing_docs)]

mod error;
mod modulus;
mod encryption_parameters;
mod context;
mod text;
mod key;
mod ckks_encoder;
mod encryptor;
mod evaluator;

pub mod util;
pub mod serialize;
pub mod app;

pub use error::{Error, Result};
pub use modulus::Modulus;
pub use encryption_parameters::{EncryptionParameters, ParmsID, PARMS_ID_ZERO, DEFAULT_COEFF_MODULUS};
pub use context::HeContext;
pub use text::{Plaintext, Ciphertext};
pub use key::{SecretKey, PublicKey, KeyGenerator};
pub use ckks_encoder::CKKSEncoder;
pub use encryptor::{Encryptor, Decryptor};
pub use evaluator::Evaluator;
pub use serialize::{Serializable, SerializableWithHeContext};
