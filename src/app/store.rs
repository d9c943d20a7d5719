//! Exchange of opaque artifacts between the client and the evaluating party.
//!
//! Artifacts are addressed by a role directory, a kind and an optional
//! batch index. The store never looks inside the bytes it moves.

use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::PathBuf,
    sync::RwLock,
};

use super::instance::{DirectoryRoot, DirectoryRoots};
use crate::{Error, Result};

/// Kinds of exchanged artifacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Serialized encryption parameters, `cc.bin`.
    Parameters,
    /// `pk.bin`.
    PublicKey,
    /// `sk.bin`.
    SecretKey,
    /// An encrypted input, `cipher_input[_i].bin`.
    CipherInput,
    /// An evaluated result, `cipher_result[_i].bin`.
    CipherResult,
    /// A predicted label in text, `result[_i].txt`.
    Prediction,
    /// The accuracy report, `quality.txt`.
    Quality,
}

impl ArtifactKind {

    fn stem(&self) -> &'static str {
        match self {
            ArtifactKind::Parameters => "cc",
            ArtifactKind::PublicKey => "pk",
            ArtifactKind::SecretKey => "sk",
            ArtifactKind::CipherInput => "cipher_input",
            ArtifactKind::CipherResult => "cipher_result",
            ArtifactKind::Prediction => "result",
            ArtifactKind::Quality => "quality",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Prediction | ArtifactKind::Quality => "txt",
            _ => "bin",
        }
    }

    /// Directory the kind is exchanged through.
    pub fn root(&self) -> DirectoryRoot {
        match self {
            ArtifactKind::Parameters | ArtifactKind::PublicKey => DirectoryRoot::Public,
            ArtifactKind::SecretKey => DirectoryRoot::Secret,
            ArtifactKind::CipherInput => DirectoryRoot::CiphertextUp,
            ArtifactKind::CipherResult => DirectoryRoot::CiphertextDown,
            ArtifactKind::Prediction | ArtifactKind::Quality => DirectoryRoot::Io,
        }
    }

    /// File name, `stem.ext` or `stem_<index>.ext`.
    pub fn file_name(&self, index: Option<usize>) -> String {
        match index {
            Some(i) => format!("{}_{}.{}", self.stem(), i, self.extension()),
            None => format!("{}.{}", self.stem(), self.extension()),
        }
    }

}

fn check_placement(root: DirectoryRoot, kind: ArtifactKind) -> Result<()> {
    if kind == ArtifactKind::SecretKey && root.is_shared() {
        return Err(Error::Storage(format!("refusing to place the secret key under shared root {:?}", root)));
    }
    Ok(())
}

/// Persists and retrieves artifacts.
///
/// Implementations are shared between the workers of a batch, so every
/// method takes `&self`.
pub trait ArtifactStore: Send + Sync {
    /// Write an artifact, replacing any previous one at the same address.
    fn store(&self, root: DirectoryRoot, kind: ArtifactKind, index: Option<usize>, bytes: &[u8]) -> Result<()>;

    /// Read an artifact back. Fails with [Error::NotFound] if it was never stored.
    fn load(&self, root: DirectoryRoot, kind: ArtifactKind, index: Option<usize>) -> Result<Vec<u8>>;

    /// Whether an artifact exists.
    fn contains(&self, root: DirectoryRoot, kind: ArtifactKind, index: Option<usize>) -> bool {
        self.load(root, kind, index).is_ok()
    }
}

/// Artifacts as files under the directories of an instance.
#[derive(Clone, Debug)]
pub struct FsArtifactStore {
    roots: DirectoryRoots,
}

impl FsArtifactStore {

    /// A store rooted at the directories of one instance.
    pub fn new(roots: DirectoryRoots) -> Self {
        FsArtifactStore { roots }
    }

    /// Location of an artifact.
    pub fn path(&self, root: DirectoryRoot, kind: ArtifactKind, index: Option<usize>) -> PathBuf {
        self.roots.get(root).join(kind.file_name(index))
    }

}

impl ArtifactStore for FsArtifactStore {

    fn store(&self, root: DirectoryRoot, kind: ArtifactKind, index: Option<usize>, bytes: &[u8]) -> Result<()> {
        check_placement(root, kind)?;
        let path = self.path(root, kind, index);
        let dir = self.roots.get(root);
        fs::create_dir_all(dir)
            .map_err(|e| Error::Storage(format!("cannot create {}: {}", dir.display(), e)))?;
        // Readers never observe a partially written artifact.
        let partial = path.with_extension("partial");
        fs::write(&partial, bytes)
            .and_then(|_| fs::rename(&partial, &path))
            .map_err(|e| Error::Storage(format!("cannot write {}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "stored artifact");
        Ok(())
    }

    fn load(&self, root: DirectoryRoot, kind: ArtifactKind, index: Option<usize>) -> Result<Vec<u8>> {
        let path = self.path(root, kind, index);
        match fs::read(&path) {
            Ok(bytes) => {
                tracing::debug!(path = %path.display(), bytes = bytes.len(), "loaded artifact");
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(path.display().to_string()))
            }
            Err(e) => Err(Error::io(path, e)),
        }
    }

    fn contains(&self, root: DirectoryRoot, kind: ArtifactKind, index: Option<usize>) -> bool {
        self.path(root, kind, index).is_file()
    }

}

impl<T: ArtifactStore + ?Sized> ArtifactStore for &T {
    fn store(&self, root: DirectoryRoot, kind: ArtifactKind, index: Option<usize>, bytes: &[u8]) -> Result<()> {
        (**self).store(root, kind, index, bytes)
    }
    fn load(&self, root: DirectoryRoot, kind: ArtifactKind, index: Option<usize>) -> Result<Vec<u8>> {
        (**self).load(root, kind, index)
    }
    fn contains(&self, root: DirectoryRoot, kind: ArtifactKind, index: Option<usize>) -> bool {
        (**self).contains(root, kind, index)
    }
}

impl<T: ArtifactStore + ?Sized> ArtifactStore for std::sync::Arc<T> {
    fn store(&self, root: DirectoryRoot, kind: ArtifactKind, index: Option<usize>, bytes: &[u8]) -> Result<()> {
        (**self).store(root, kind, index, bytes)
    }
    fn load(&self, root: DirectoryRoot, kind: ArtifactKind, index: Option<usize>) -> Result<Vec<u8>> {
        (**self).load(root, kind, index)
    }
    fn contains(&self, root: DirectoryRoot, kind: ArtifactKind, index: Option<usize>) -> bool {
        (**self).contains(root, kind, index)
    }
}

type ArtifactAddress = (DirectoryRoot, ArtifactKind, Option<usize>);

/// Artifacts kept in memory, for tests and single-process pipelines.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<HashMap<ArtifactAddress, Vec<u8>>>,
}

impl MemoryArtifactStore {

    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> Result<usize> {
        let artifacts = self.artifacts.read()
            .map_err(|_| Error::Storage("artifact map poisoned".to_string()))?;
        Ok(artifacts.len())
    }

    /// Whether nothing was stored yet.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

}

impl ArtifactStore for MemoryArtifactStore {

    fn store(&self, root: DirectoryRoot, kind: ArtifactKind, index: Option<usize>, bytes: &[u8]) -> Result<()> {
        check_placement(root, kind)?;
        let mut artifacts = self.artifacts.write()
            .map_err(|_| Error::Storage("artifact map poisoned".to_string()))?;
        artifacts.insert((root, kind, index), bytes.to_vec());
        Ok(())
    }

    fn load(&self, root: DirectoryRoot, kind: ArtifactKind, index: Option<usize>) -> Result<Vec<u8>> {
        let artifacts = self.artifacts.read()
            .map_err(|_| Error::Storage("artifact map poisoned".to_string()))?;
        artifacts.get(&(root, kind, index))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{:?}/{}", root, kind.file_name(index))))
    }

}
