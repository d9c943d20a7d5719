//! Packing of feature vectors into ciphertext slots and back.

use std::sync::Arc;

use crate::{
    CKKSEncoder, Ciphertext, Decryptor, Encryptor, Error, HeContext, Result,
};

/// Cyclically replicate `input` over `slots` lanes, `result[i] = input[i % input.len()]`.
pub fn replicate(input: &[f32], slots: usize) -> Result<Vec<f64>> {
    if input.is_empty() {
        return Err(Error::Argument("cannot replicate an empty vector".to_string()));
    }
    if slots == 0 {
        return Err(Error::Argument("slot count must be positive".to_string()));
    }
    Ok(input.iter()
        .cycle()
        .take(slots)
        .map(|x| *x as f64)
        .collect())
}

/// Encodes, encrypts and decrypts score-width vectors under one context.
pub struct Packer {
    context: Arc<HeContext>,
    encoder: CKKSEncoder,
    score_width: usize,
}

impl Packer {

    /// `score_width` is the number of leading slots kept on decryption.
    pub fn new(context: Arc<HeContext>, score_width: usize) -> Self {
        let encoder = CKKSEncoder::new(context.clone());
        Packer { context, encoder, score_width }
    }

    /// The context used for encoding.
    pub fn context(&self) -> &Arc<HeContext> {&self.context}

    /// Number of slots of a ciphertext.
    pub fn slot_count(&self) -> usize {self.encoder.slot_count()}

    /// Number of values kept on decryption.
    pub fn score_width(&self) -> usize {self.score_width}

    /// Replicate `input` over every slot of a ciphertext.
    pub fn fill(&self, input: &[f32]) -> Result<Vec<f64>> {
        replicate(input, self.slot_count())
    }

    /// Encode a filled vector at the context scale and encrypt it.
    pub fn encrypt(&self, filled: &[f64], encryptor: &Encryptor) -> Result<Ciphertext> {
        let plain = self.encoder.encode_f64_array(filled, self.context.parms().scale())?;
        encryptor.encrypt(&plain)
    }

    /// Decrypt and keep the real part of the first `score_width` slots.
    pub fn decrypt(&self, encrypted: &Ciphertext, decryptor: &Decryptor) -> Result<Vec<f32>> {
        let values = self.encoder.decode(&decryptor.decrypt(encrypted)?)?;
        if values.len() < self.score_width {
            return Err(Error::Length { expected: self.score_width, actual: values.len() });
        }
        Ok(values[..self.score_width].iter().map(|x| x.re as f32).collect())
    }

}
