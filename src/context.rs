use std::sync::Arc;

use crate::{
    util::{self, NTTTables},
    EncryptionParameters, Error, Modulus, ParmsID, Result,
};

/// Performs sanity checks (validation) and pre-computations for a given set of
/// encryption parameters.
///
/// While the [EncryptionParameters] struct is intended to be a light-weight
/// representation of the parameters, the HeContext is heavy-weight: it owns
/// the NTT tables every other object needs. A context is created once per
/// run, wrapped in an [Arc] and handed to each encoder, encryptor and
/// decryptor explicitly; it is never mutated after construction.
pub struct HeContext {
    parms: EncryptionParameters,
    ntt_tables: NTTTables,
    upper_half_threshold: u64,
}

impl HeContext {

    /// Validate the parameters and precompute the NTT tables.
    pub fn new(parms: EncryptionParameters) -> Result<Arc<Self>> {
        parms.validate()?;
        let log_n = util::get_power_of_two(parms.poly_modulus_degree() as u64) as usize;
        let ntt_tables = NTTTables::new(log_n, parms.coeff_modulus())
            .map_err(Error::Config)?;
        let upper_half_threshold = (parms.coeff_modulus().value() + 1) >> 1;
        Ok(Arc::new(HeContext { parms, ntt_tables, upper_half_threshold }))
    }

    /// The parameters this context was built from.
    pub fn parms(&self) -> &EncryptionParameters {&self.parms}

    /// Shortcut for the identifier of [Self::parms].
    pub fn parms_id(&self) -> &ParmsID {self.parms.parms_id()}

    /// Polynomial modulus degree N.
    pub fn coeff_count(&self) -> usize {self.parms.poly_modulus_degree()}

    /// Number of CKKS slots, N/2.
    pub fn slot_count(&self) -> usize {self.parms.slot_count()}

    /// The coefficient modulus q.
    pub fn coeff_modulus(&self) -> &Modulus {self.parms.coeff_modulus()}

    /// Residues at or above this value represent negative integers.
    pub fn upper_half_threshold(&self) -> u64 {self.upper_half_threshold}

    pub(crate) fn ntt_tables(&self) -> &NTTTables {&self.ntt_tables}

    /// Checks that an object stamped with `parms_id` belongs to this context.
    pub(crate) fn check_parms_id(&self, parms_id: &ParmsID, what: &str) -> Result<()> {
        if parms_id != self.parms_id() {
            return Err(Error::Decode(format!("{} was created under different encryption parameters", what)));
        }
        Ok(())
    }

}
