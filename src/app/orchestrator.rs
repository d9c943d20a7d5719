//! Sequencing of a batch through encode, encrypt, evaluate, decrypt and classify.
//!
//! Every stage reads the artifacts of the previous stage at the same index
//! and writes its own, so item `i` of any stage is derived from item `i` of
//! the input and nothing else. Items are independent; a bounded worker pool
//! processes several of them at once and a shared [AbortHandle] stops the
//! run between items.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use rayon::prelude::*;

use super::{
    circuit::CircuitEvaluator,
    classify::argmax,
    dataset::Sample,
    instance::{DirectoryRoot, InstanceParams},
    packing::Packer,
    store::{ArtifactKind, ArtifactStore},
};
use crate::{
    serialize::{Serializable, SerializableWithHeContext},
    util::BlakeRNGFactory,
    Ciphertext, Decryptor, EncryptionParameters, Encryptor, Error, HeContext, KeyGenerator,
    PublicKey, Result, SecretKey,
};

/// Cancels a running batch. Items already in flight complete; no new item starts.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
}

impl AbortHandle {
    /// A handle that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the run before its next item.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Whether [Self::abort] was called.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Accuracy of a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QualityReport {
    /// Number of classified samples.
    pub batch_size: usize,
    /// Number of samples classified as their label.
    pub correct: usize,
}

impl QualityReport {

    /// Fraction of correct classifications.
    pub fn accuracy(&self) -> f32 {
        self.correct as f32 / self.batch_size as f32
    }

    /// The two-line text report.
    pub fn render(&self) -> String {
        format!("batch_size: {}\naccuracy: {}\n", self.batch_size, self.accuracy())
    }

}

/// Drives one instance through the exchange.
pub struct BatchOrchestrator<S: ArtifactStore> {
    params: InstanceParams,
    context: Arc<HeContext>,
    store: S,
    max_in_flight: usize,
    abort: AbortHandle,
}

impl<S: ArtifactStore> BatchOrchestrator<S> {

    /// Creates an orchestrator around an existing context.
    pub fn new(params: InstanceParams, context: Arc<HeContext>, store: S) -> Result<Self> {
        let width = params.dimensions().normalized();
        if width > context.slot_count() {
            return Err(Error::Config(format!(
                "score width {} exceeds the {} available slots", width, context.slot_count()
            )));
        }
        Ok(BatchOrchestrator { params, context, store, max_in_flight: 1, abort: AbortHandle::new() })
    }

    /// Creates an orchestrator from the parameters published under the public root.
    pub fn open(params: InstanceParams, store: S) -> Result<Self> {
        let bytes = store.load(DirectoryRoot::Public, ArtifactKind::Parameters, None)?;
        let context = HeContext::new(EncryptionParameters::from_bytes(&bytes)?)?;
        Self::new(params, context, store)
    }

    /// Bound the number of items processed at once.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Result<Self> {
        if max_in_flight == 0 {
            return Err(Error::Config("max_in_flight must be positive".to_string()));
        }
        self.max_in_flight = max_in_flight;
        Ok(self)
    }

    /// Use an external handle, e.g. one wired to a signal handler.
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    /// Parameters of the run.
    pub fn params(&self) -> &InstanceParams {&self.params}

    /// The shared scheme context.
    pub fn context(&self) -> &Arc<HeContext> {&self.context}

    /// The artifact store.
    pub fn store(&self) -> &S {&self.store}

    /// A handle that stops this orchestrator.
    pub fn abort_handle(&self) -> AbortHandle {self.abort.clone()}

    fn packer(&self) -> Packer {
        Packer::new(self.context.clone(), self.params.dimensions().normalized())
    }

    /// Generate fresh keys; publish the parameters and the public key, keep the secret key.
    pub fn keygen(&self) -> Result<()> {
        self.keygen_with_rng_factory(BlakeRNGFactory::new())
    }

    /// Like [Self::keygen], drawing randomness from the given factory.
    pub fn keygen_with_rng_factory(&self, rng_factory: BlakeRNGFactory) -> Result<()> {
        let mut keygen = KeyGenerator::with_rng_factory(self.context.clone(), rng_factory);
        let public_key = keygen.create_public_key();
        self.store.store(DirectoryRoot::Public, ArtifactKind::Parameters, None, &self.context.parms().to_bytes()?)?;
        self.store.store(DirectoryRoot::Public, ArtifactKind::PublicKey, None, &public_key.to_bytes(&self.context)?)?;
        self.store.store(DirectoryRoot::Secret, ArtifactKind::SecretKey, None, &keygen.secret_key().to_bytes(&self.context)?)?;
        tracing::info!(instance = %self.params.size(), "generated keys");
        Ok(())
    }

    fn public_key(&self) -> Result<PublicKey> {
        let bytes = self.store.load(DirectoryRoot::Public, ArtifactKind::PublicKey, None)?;
        PublicKey::from_bytes(&self.context, &bytes)
    }

    fn secret_key(&self) -> Result<SecretKey> {
        let bytes = self.store.load(DirectoryRoot::Secret, ArtifactKind::SecretKey, None)?;
        SecretKey::from_bytes(&self.context, &bytes)
    }

    fn require_samples<'a>(&self, samples: &'a [Sample]) -> Result<&'a [Sample]> {
        let batch_size = self.params.batch_size();
        if samples.len() < batch_size {
            return Err(Error::Config(format!(
                "dataset holds {} samples, batch needs {}", samples.len(), batch_size
            )));
        }
        Ok(&samples[..batch_size])
    }

    /// Run `op` for every batch index on a pool of `max_in_flight` workers.
    /// Results come back in index order.
    fn map_indices<T, F>(&self, op: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Send + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_in_flight)
            .build()
            .map_err(|e| Error::Config(format!("cannot start worker pool: {}", e)))?;
        pool.install(|| {
            (0..self.params.batch_size())
                .into_par_iter()
                .map(|i| {
                    if self.abort.is_aborted() {
                        return Err(Error::Aborted(i));
                    }
                    op(i)
                })
                .collect()
        })
    }

    /// Encrypt the first batch-size samples into the upload root.
    pub fn encrypt_inputs(&self, samples: &[Sample]) -> Result<usize> {
        let samples = self.require_samples(samples)?;
        let packer = self.packer();
        let encryptor = Encryptor::new(self.context.clone(), self.public_key()?)?;
        tracing::info!(instance = %self.params.size(), count = samples.len(), "encrypting inputs");
        self.map_indices(|i| {
            let filled = packer.fill(&samples[i].image)?;
            let cipher = packer.encrypt(&filled, &encryptor)?;
            self.store.store(
                DirectoryRoot::CiphertextUp, ArtifactKind::CipherInput,
                self.params.artifact_index(i), &cipher.to_bytes(&self.context)?,
            )
        })?;
        Ok(samples.len())
    }

    /// Run the circuit over every uploaded input and publish the results.
    pub fn evaluate<C: CircuitEvaluator + ?Sized>(&self, circuit: &C) -> Result<usize> {
        tracing::info!(
            instance = %self.params.size(), count = self.params.batch_size(),
            max_in_flight = self.max_in_flight, "evaluating"
        );
        let done = self.map_indices(|i| {
            let index = self.params.artifact_index(i);
            let bytes = self.store.load(DirectoryRoot::CiphertextUp, ArtifactKind::CipherInput, index)?;
            let input = Ciphertext::from_bytes(&self.context, &bytes)?;
            let output = circuit.evaluate(&input)?;
            self.store.store(
                DirectoryRoot::CiphertextDown, ArtifactKind::CipherResult,
                index, &output.to_bytes(&self.context)?,
            )?;
            tracing::debug!(item = i, "evaluated");
            Ok(())
        })?;
        Ok(done.len())
    }

    /// Decrypt and classify every result; write one label file per item.
    pub fn decrypt_results(&self) -> Result<Vec<usize>> {
        let packer = self.packer();
        let decryptor = Decryptor::new(self.context.clone(), self.secret_key()?)?;
        tracing::info!(instance = %self.params.size(), count = self.params.batch_size(), "decrypting results");
        self.map_indices(|i| {
            let index = self.params.artifact_index(i);
            let bytes = self.store.load(DirectoryRoot::CiphertextDown, ArtifactKind::CipherResult, index)?;
            let result = Ciphertext::from_bytes(&self.context, &bytes)?;
            let label = argmax(&packer.decrypt(&result, &decryptor)?)?;
            self.store.store(DirectoryRoot::Io, ArtifactKind::Prediction, index, format!("{}\n", label).as_bytes())?;
            Ok(label)
        })
    }

    /// Encrypt, evaluate, decrypt and classify every sample in one process,
    /// then write the quality report.
    pub fn quality<C: CircuitEvaluator + ?Sized>(&self, samples: &[Sample], circuit: &C) -> Result<QualityReport> {
        let samples = self.require_samples(samples)?;
        let packer = self.packer();
        let encryptor = Encryptor::new(self.context.clone(), self.public_key()?)?;
        let decryptor = Decryptor::new(self.context.clone(), self.secret_key()?)?;
        let correct = AtomicUsize::new(0);
        self.map_indices(|i| {
            let sample = &samples[i];
            let input = packer.encrypt(&packer.fill(&sample.image)?, &encryptor)?;
            let output = circuit.evaluate(&input)?;
            let predicted = argmax(&packer.decrypt(&output, &decryptor)?)?;
            tracing::debug!(item = i, predicted, expected = sample.label, "classified");
            if predicted as i64 == sample.label {
                correct.fetch_add(1, Ordering::Relaxed);
            }
            Ok(())
        })?;
        let report = QualityReport { batch_size: samples.len(), correct: correct.into_inner() };
        self.write_report(&report)?;
        Ok(report)
    }

    /// Compare the written label files against ground truth and write the quality report.
    pub fn score_predictions(&self, labels: &[i64]) -> Result<QualityReport> {
        let batch_size = self.params.batch_size();
        if labels.len() < batch_size {
            return Err(Error::Config(format!("{} labels for a batch of {}", labels.len(), batch_size)));
        }
        let hits = self.map_indices(|i| {
            let bytes = self.store.load(DirectoryRoot::Io, ArtifactKind::Prediction, self.params.artifact_index(i))?;
            let text = String::from_utf8_lossy(&bytes);
            let predicted = text.trim().parse::<i64>()
                .map_err(|_| Error::Decode(format!("prediction {} is not a label: {:?}", i, text.trim())))?;
            Ok(predicted == labels[i])
        })?;
        let report = QualityReport { batch_size, correct: hits.into_iter().filter(|hit| *hit).count() };
        self.write_report(&report)?;
        Ok(report)
    }

    fn write_report(&self, report: &QualityReport) -> Result<()> {
        self.store.store(DirectoryRoot::Io, ArtifactKind::Quality, None, report.render().as_bytes())?;
        tracing::info!(
            instance = %self.params.size(), batch_size = report.batch_size,
            correct = report.correct, accuracy = report.accuracy(), "quality"
        );
        Ok(())
    }

}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, thread, time::Duration};

    use super::*;
    use crate::app::{
        circuit::IdentityCircuit,
        instance::{Dimensions, InstanceSize},
        store::MemoryArtifactStore,
    };

    const CLASSES: usize = 16;

    fn orchestrator(size: InstanceSize, batch_size: usize) -> BatchOrchestrator<Arc<MemoryArtifactStore>> {
        let context = HeContext::new(EncryptionParameters::inference_default().set_poly_modulus_degree(64)).unwrap();
        let mut params = InstanceParams::new(size, "unused")
            .with_dimensions(Dimensions::new(6, CLASSES).unwrap());
        if batch_size != size.batch_size() {
            params = params.with_batch_size(batch_size).unwrap();
        }
        let orchestrator = BatchOrchestrator::new(params, context, Arc::new(MemoryArtifactStore::new())).unwrap();
        orchestrator.keygen().unwrap();
        orchestrator
    }

    /// Sample `i` carries its own index in the first pixel.
    fn samples(count: usize, label: impl Fn(usize) -> i64) -> Vec<Sample> {
        (0..count).map(|i| {
            let mut image = vec![0.0; CLASSES];
            image[0] = i as f32;
            Sample { label: label(i), image }
        }).collect()
    }

    /// A stand-in for the real circuit: it reads the index hidden in the
    /// input and answers with a one-hot score vector for `class_of(index)`.
    /// Higher indices finish first.
    fn stub_circuit<S: ArtifactStore>(
        orchestrator: &BatchOrchestrator<S>,
        batch_size: usize,
        class_of: impl Fn(usize) -> usize + Send + Sync,
        finished: Arc<Mutex<Vec<usize>>>,
    ) -> impl CircuitEvaluator {
        let context = orchestrator.context().clone();
        let packer = Packer::new(context.clone(), CLASSES);
        let encryptor = Encryptor::new(context.clone(), orchestrator.public_key().unwrap()).unwrap();
        let decryptor = Decryptor::new(context, orchestrator.secret_key().unwrap()).unwrap();
        move |input: &Ciphertext| -> Result<Ciphertext> {
            let index = packer.decrypt(input, &decryptor)?[0].round() as usize;
            thread::sleep(Duration::from_millis(20 * (batch_size - index) as u64));
            let mut scores = vec![0.0; CLASSES];
            scores[class_of(index)] = 1.0;
            let output = packer.encrypt(&packer.fill(&scores)?, &encryptor)?;
            finished.lock().unwrap().push(index);
            Ok(output)
        }
    }

    #[test]
    fn test_index_correspondence() {
        let orchestrator = orchestrator(InstanceSize::Small, 5).with_max_in_flight(5).unwrap();
        let class_of = |i: usize| (3 * i + 1) % CLASSES;
        let finished = Arc::new(Mutex::new(Vec::new()));
        let circuit = stub_circuit(&orchestrator, 5, class_of, finished.clone());

        assert_eq!(5, orchestrator.encrypt_inputs(&samples(5, |i| i as i64)).unwrap());
        assert_eq!(5, orchestrator.evaluate(&circuit).unwrap());
        let predictions = orchestrator.decrypt_results().unwrap();
        assert_eq!((0..5).map(class_of).collect::<Vec<_>>(), predictions);
        let finished = finished.lock().unwrap();
        assert_eq!(5, finished.len());
        // All five items run at once and the later ones sleep less.
        let position = |index: usize| finished.iter().position(|i| *i == index).unwrap();
        assert!(position(4) < position(0), "completion order {:?}", *finished);

        let store = orchestrator.store();
        for i in 0..5 {
            assert!(store.contains(DirectoryRoot::CiphertextUp, ArtifactKind::CipherInput, Some(i)));
            let text = store.load(DirectoryRoot::Io, ArtifactKind::Prediction, Some(i)).unwrap();
            assert_eq!(format!("{}\n", class_of(i)).into_bytes(), text);
        }
    }

    #[test]
    fn test_accuracy_report() {
        let orchestrator = orchestrator(InstanceSize::Small, 10).with_max_in_flight(4).unwrap();
        let label = |i: usize| (i % 10) as i64;
        let class_of = |i: usize| if i < 7 { i % 10 } else { (i + 1) % 10 };
        let circuit = stub_circuit(&orchestrator, 10, class_of, Arc::new(Mutex::new(Vec::new())));
        let samples = samples(10, label);

        let report = orchestrator.quality(&samples, &circuit).unwrap();
        assert_eq!(QualityReport { batch_size: 10, correct: 7 }, report);
        assert_eq!(0.7, report.accuracy());
        let written = orchestrator.store().load(DirectoryRoot::Io, ArtifactKind::Quality, None).unwrap();
        assert_eq!(b"batch_size: 10\naccuracy: 0.7\n".to_vec(), written);

        // The staged path agrees with the in-process one.
        orchestrator.encrypt_inputs(&samples).unwrap();
        orchestrator.evaluate(&circuit).unwrap();
        orchestrator.decrypt_results().unwrap();
        let labels: Vec<i64> = (0..10).map(label).collect();
        assert_eq!(report, orchestrator.score_predictions(&labels).unwrap());
    }

    #[test]
    fn test_single_mode_omits_index() {
        let orchestrator = orchestrator(InstanceSize::Single, 1);
        let mut image = vec![0.0; CLASSES];
        image[5] = 2.0;
        orchestrator.encrypt_inputs(&[Sample { label: 5, image }]).unwrap();
        orchestrator.evaluate(&IdentityCircuit).unwrap();
        let store = orchestrator.store();
        assert!(store.contains(DirectoryRoot::CiphertextUp, ArtifactKind::CipherInput, None));
        assert!(!store.contains(DirectoryRoot::CiphertextUp, ArtifactKind::CipherInput, Some(0)));
        assert!(store.contains(DirectoryRoot::CiphertextDown, ArtifactKind::CipherResult, None));
        assert_eq!(vec![5], orchestrator.decrypt_results().unwrap());
        assert!(store.contains(DirectoryRoot::Io, ArtifactKind::Prediction, None));
    }

    #[test]
    fn test_dataset_smaller_than_batch() {
        let orchestrator = orchestrator(InstanceSize::Small, 10);
        assert!(matches!(orchestrator.encrypt_inputs(&samples(9, |_| 0)), Err(Error::Config(_))));
        assert!(matches!(orchestrator.quality(&samples(3, |_| 0), &IdentityCircuit), Err(Error::Config(_))));
        assert!(matches!(orchestrator.score_predictions(&[0; 9]), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_artifacts() {
        let orchestrator = orchestrator(InstanceSize::Small, 2);
        assert!(matches!(orchestrator.evaluate(&IdentityCircuit), Err(Error::NotFound(_))));
        assert!(matches!(orchestrator.decrypt_results(), Err(Error::NotFound(_))));

        orchestrator.store().store(DirectoryRoot::CiphertextUp, ArtifactKind::CipherInput, Some(0), b"junk").unwrap();
        orchestrator.store().store(DirectoryRoot::CiphertextUp, ArtifactKind::CipherInput, Some(1), b"junk").unwrap();
        assert!(matches!(orchestrator.evaluate(&IdentityCircuit), Err(Error::Decode(_))));
    }

    #[test]
    fn test_abort_between_items() {
        let orchestrator = orchestrator(InstanceSize::Small, 3);
        orchestrator.encrypt_inputs(&samples(3, |_| 0)).unwrap();
        let abort = orchestrator.abort_handle();
        let calls = AtomicUsize::new(0);
        let circuit = |input: &Ciphertext| -> Result<Ciphertext> {
            calls.fetch_add(1, Ordering::SeqCst);
            abort.abort();
            Ok(input.clone())
        };
        assert!(matches!(orchestrator.evaluate(&circuit), Err(Error::Aborted(_))));
        assert_eq!(1, calls.load(Ordering::SeqCst));
        assert!(!orchestrator.store().contains(DirectoryRoot::CiphertextDown, ArtifactKind::CipherResult, Some(2)));
    }

    #[test]
    fn test_open_reads_published_parameters() {
        let first = orchestrator(InstanceSize::Small, 2);
        let store = first.store().clone();
        let second = BatchOrchestrator::open(first.params().clone(), store).unwrap();
        assert_eq!(first.context().parms_id(), second.context().parms_id());
        assert!(matches!(
            BatchOrchestrator::open(first.params().clone(), Arc::new(MemoryArtifactStore::new())),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(first.with_max_in_flight(0), Err(Error::Config(_))));
    }

    #[test]
    fn test_score_width_must_fit() {
        let context = HeContext::new(EncryptionParameters::inference_default().set_poly_modulus_degree(64)).unwrap();
        let params = InstanceParams::new(InstanceSize::Single, "unused");
        assert!(matches!(
            BatchOrchestrator::new(params, context, MemoryArtifactStore::new()),
            Err(Error::Config(_))
        ));
    }
}
