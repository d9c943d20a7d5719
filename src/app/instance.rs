//! Instance tiers and the directory layout of an inference run.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::{Error, Result};

/// Width of a raw input vector and of the vector after zero padding.
///
/// The padded width is also the width of the score vector the circuit
/// returns, so it doubles as the number of decrypted values that are kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    raw: usize,
    normalized: usize,
}

impl Default for Dimensions {
    /// 28x28 images padded to 1024.
    fn default() -> Self {
        Dimensions { raw: 784, normalized: 1024 }
    }
}

impl Dimensions {

    /// Creates dimensions; `normalized` must be at least `raw`.
    pub fn new(raw: usize, normalized: usize) -> Result<Self> {
        if raw == 0 || normalized < raw {
            return Err(Error::Config(format!("cannot pad {} raw values to width {}", raw, normalized)));
        }
        Ok(Dimensions { raw, normalized })
    }

    /// Number of values in a raw record.
    pub fn raw(&self) -> usize {self.raw}

    /// Number of values after padding, and width of the score vector.
    pub fn normalized(&self) -> usize {self.normalized}

}

/// Sizing tier of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstanceSize {
    /// One sample, exchanged without index suffixes.
    Single,
    /// Ten samples.
    Small,
    /// A thousand samples.
    Medium,
    /// Ten thousand samples.
    Large,
}

impl InstanceSize {

    /// All tiers, ordered by their numeric code.
    pub const ALL: [InstanceSize; 4] = [
        InstanceSize::Single, InstanceSize::Small, InstanceSize::Medium, InstanceSize::Large,
    ];

    /// Resolve a numeric tier code, 0 to 3.
    pub fn from_code(code: i64) -> Result<Self> {
        usize::try_from(code).ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| Error::Config(format!("invalid instance size {}, expected 0-3", code)))
    }

    /// Numeric tier code.
    pub fn code(&self) -> usize {
        *self as usize
    }

    /// Directory name of the tier.
    pub fn name(&self) -> &'static str {
        match self {
            InstanceSize::Single => "single",
            InstanceSize::Small => "small",
            InstanceSize::Medium => "medium",
            InstanceSize::Large => "large",
        }
    }

    /// Number of samples in a batch of this tier.
    pub fn batch_size(&self) -> usize {
        match self {
            InstanceSize::Single => 1,
            InstanceSize::Small => 10,
            InstanceSize::Medium => 1000,
            InstanceSize::Large => 10000,
        }
    }

}

impl fmt::Display for InstanceSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InstanceSize {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().parse::<i64>()
            .map_err(|_| Error::Argument(format!("instance size must be a number, got {:?}", s)))?;
        Self::from_code(code)
    }
}

/// Role of a directory in the exchange.
///
/// | Root | Contents | Crosses |
/// |---|---|---|
/// | [DirectoryRoot::Public] | parameters, public key | client and server |
/// | [DirectoryRoot::Secret] | secret key | never |
/// | [DirectoryRoot::CiphertextUp] | encrypted inputs | client to server |
/// | [DirectoryRoot::CiphertextDown] | evaluated results | server to client |
/// | [DirectoryRoot::Io] | labels and reports | never |
/// | [DirectoryRoot::Data], [DirectoryRoot::DataInterm] | plaintext datasets | never |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirectoryRoot {
    /// `io/<tier>/public_keys`
    Public,
    /// `io/<tier>/secret_key`
    Secret,
    /// `io/<tier>/ciphertexts_upload`
    CiphertextUp,
    /// `io/<tier>/ciphertexts_download`
    CiphertextDown,
    /// `io/<tier>`
    Io,
    /// `datasets/<tier>`
    Data,
    /// `datasets/<tier>/intermediate`
    DataInterm,
}

impl DirectoryRoot {
    /// Whether artifacts under this root are handed to the other party.
    pub fn is_shared(&self) -> bool {
        matches!(self, DirectoryRoot::Public | DirectoryRoot::CiphertextUp | DirectoryRoot::CiphertextDown)
    }
}

/// Resolved directories of one instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryRoots {
    public: PathBuf,
    secret: PathBuf,
    ciphertext_up: PathBuf,
    ciphertext_down: PathBuf,
    io: PathBuf,
    data: PathBuf,
    data_interm: PathBuf,
}

impl DirectoryRoots {

    /// Lay out the directories of tier `size` under `root`.
    pub fn new(root: &Path, size: InstanceSize) -> Self {
        let io = root.join("io").join(size.name());
        let data = root.join("datasets").join(size.name());
        DirectoryRoots {
            public: io.join("public_keys"),
            secret: io.join("secret_key"),
            ciphertext_up: io.join("ciphertexts_upload"),
            ciphertext_down: io.join("ciphertexts_download"),
            data_interm: data.join("intermediate"),
            io,
            data,
        }
    }

    /// Path of a role directory.
    pub fn get(&self, root: DirectoryRoot) -> &Path {
        match root {
            DirectoryRoot::Public => &self.public,
            DirectoryRoot::Secret => &self.secret,
            DirectoryRoot::CiphertextUp => &self.ciphertext_up,
            DirectoryRoot::CiphertextDown => &self.ciphertext_down,
            DirectoryRoot::Io => &self.io,
            DirectoryRoot::Data => &self.data,
            DirectoryRoot::DataInterm => &self.data_interm,
        }
    }

}

/// Parameters of a run, fixed once parsed from the command line.
#[derive(Clone, Debug)]
pub struct InstanceParams {
    size: InstanceSize,
    batch_size: usize,
    dimensions: Dimensions,
    roots: DirectoryRoots,
}

impl InstanceParams {

    /// Parameters of tier `size` with directories under `root`.
    pub fn new(size: InstanceSize, root: impl AsRef<Path>) -> Self {
        InstanceParams {
            size,
            batch_size: size.batch_size(),
            dimensions: Dimensions::default(),
            roots: DirectoryRoots::new(root.as_ref(), size),
        }
    }

    /// Replace the vector dimensions.
    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Process only the first `count` items instead of the whole tier.
    /// `count` must be between 1 and the tier batch size.
    pub fn with_batch_size(mut self, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::Config("batch size must be positive".to_string()));
        }
        if count > self.size.batch_size() {
            return Err(Error::Config(format!(
                "batch size {} exceeds the {} items of tier {}", count, self.size.batch_size(), self.size
            )));
        }
        self.batch_size = count;
        Ok(self)
    }

    /// Tier of the run.
    pub fn size(&self) -> InstanceSize {self.size}

    /// Number of items processed by every stage.
    pub fn batch_size(&self) -> usize {self.batch_size}

    /// Vector dimensions.
    pub fn dimensions(&self) -> Dimensions {self.dimensions}

    /// All role directories.
    pub fn roots(&self) -> &DirectoryRoots {&self.roots}

    /// Path of a role directory.
    pub fn dir(&self, root: DirectoryRoot) -> &Path {
        self.roots.get(root)
    }

    /// Single-item runs address artifacts without an index suffix.
    pub fn is_single(&self) -> bool {
        self.size == InstanceSize::Single && self.batch_size == 1
    }

    /// Index under which item `i` is exchanged.
    pub fn artifact_index(&self, i: usize) -> Option<usize> {
        if self.is_single() {None} else {Some(i)}
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_size() {
        assert_eq!(InstanceSize::Single, "0".parse().unwrap());
        assert_eq!(InstanceSize::Large, " 3".parse().unwrap());
        assert!(matches!("4".parse::<InstanceSize>(), Err(Error::Config(_))));
        assert!(matches!("-1".parse::<InstanceSize>(), Err(Error::Config(_))));
        assert!(matches!("two".parse::<InstanceSize>(), Err(Error::Argument(_))));
        let sizes: Vec<usize> = InstanceSize::ALL.iter().map(|s| s.batch_size()).collect();
        assert_eq!(vec![1, 10, 1000, 10000], sizes);
        assert_eq!(2, InstanceSize::Medium.code());
    }

    #[test]
    fn test_directory_layout() {
        let params = InstanceParams::new(InstanceSize::Small, "/work");
        assert_eq!(Path::new("/work/io/small/public_keys"), params.dir(DirectoryRoot::Public));
        assert_eq!(Path::new("/work/io/small/secret_key"), params.dir(DirectoryRoot::Secret));
        assert_eq!(Path::new("/work/io/small/ciphertexts_upload"), params.dir(DirectoryRoot::CiphertextUp));
        assert_eq!(Path::new("/work/io/small/ciphertexts_download"), params.dir(DirectoryRoot::CiphertextDown));
        assert_eq!(Path::new("/work/io/small"), params.dir(DirectoryRoot::Io));
        assert_eq!(Path::new("/work/datasets/small"), params.dir(DirectoryRoot::Data));
        assert_eq!(Path::new("/work/datasets/small/intermediate"), params.dir(DirectoryRoot::DataInterm));
        assert!(!DirectoryRoot::Secret.is_shared());
        assert!(DirectoryRoot::CiphertextUp.is_shared());
    }

    #[test]
    fn test_artifact_index() {
        let single = InstanceParams::new(InstanceSize::Single, ".");
        assert!(single.is_single());
        assert_eq!(None, single.artifact_index(0));
        let small = InstanceParams::new(InstanceSize::Small, ".").with_batch_size(1).unwrap();
        assert_eq!(Some(0), small.artifact_index(0));
        assert!(matches!(InstanceParams::new(InstanceSize::Small, ".").with_batch_size(0), Err(Error::Config(_))));
        assert_eq!(10, InstanceParams::new(InstanceSize::Small, ".").with_batch_size(10).unwrap().batch_size());
        assert!(matches!(InstanceParams::new(InstanceSize::Small, ".").with_batch_size(25), Err(Error::Config(_))));
        assert!(matches!(InstanceParams::new(InstanceSize::Single, ".").with_batch_size(3), Err(Error::Config(_))));
        let single = InstanceParams::new(InstanceSize::Single, ".").with_batch_size(1).unwrap();
        assert!(single.is_single());
    }

    #[test]
    fn test_dimensions() {
        assert_eq!(784, Dimensions::default().raw());
        assert_eq!(1024, Dimensions::default().normalized());
        assert!(Dimensions::new(4, 8).is_ok());
        assert!(matches!(Dimensions::new(8, 4), Err(Error::Config(_))));
        assert!(matches!(Dimensions::new(0, 4), Err(Error::Config(_))));
    }
}
