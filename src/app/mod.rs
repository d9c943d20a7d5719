//! The two-party inference pipeline.
//! Check the submodules for the individual stages.

pub mod instance;
pub mod dataset;
pub mod packing;
pub mod classify;
pub mod store;
pub mod circuit;
pub mod orchestrator;

pub use instance::{Dimensions, DirectoryRoot, InstanceParams, InstanceSize};
pub use dataset::{DatasetLoader, LoadMode, Sample};
pub use packing::{replicate, Packer};
pub use classify::argmax;
pub use store::{ArtifactKind, ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use circuit::{BiasCircuit, CircuitEvaluator, IdentityCircuit};
pub use orchestrator::{AbortHandle, BatchOrchestrator, QualityReport};
