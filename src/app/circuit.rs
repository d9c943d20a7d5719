//! The homomorphic circuit run by the evaluating party.
//!
//! The pipeline only relies on the shape of the result: a ciphertext under
//! the same parameters whose leading slots hold the score vector.

use std::sync::Arc;

use crate::{CKKSEncoder, Ciphertext, Evaluator, HeContext, Plaintext, Result};

/// Maps an encrypted input to an encrypted score vector.
pub trait CircuitEvaluator: Send + Sync {
    /// Evaluate the circuit on one encrypted input.
    fn evaluate(&self, input: &Ciphertext) -> Result<Ciphertext>;
}

impl<F> CircuitEvaluator for F
where
    F: Fn(&Ciphertext) -> Result<Ciphertext> + Send + Sync,
{
    fn evaluate(&self, input: &Ciphertext) -> Result<Ciphertext> {
        self(input)
    }
}

/// Returns its input unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityCircuit;

impl CircuitEvaluator for IdentityCircuit {
    fn evaluate(&self, input: &Ciphertext) -> Result<Ciphertext> {
        Ok(input.clone())
    }
}

/// Adds a fixed plaintext vector to every input.
pub struct BiasCircuit {
    evaluator: Evaluator,
    bias: Plaintext,
}

impl BiasCircuit {

    /// Encode `bias` at the context scale. Missing slots are zero.
    pub fn new(context: Arc<HeContext>, bias: &[f64]) -> Result<Self> {
        let encoder = CKKSEncoder::new(context.clone());
        let bias = encoder.encode_f64_array(bias, context.parms().scale())?;
        Ok(BiasCircuit { evaluator: Evaluator::new(context), bias })
    }

}

impl CircuitEvaluator for BiasCircuit {
    fn evaluate(&self, input: &Ciphertext) -> Result<Ciphertext> {
        self.evaluator.add_plain_new(input, &self.bias)
    }
}
