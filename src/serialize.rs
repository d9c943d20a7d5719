//! Byte format of the artifacts exchanged between the client and the
//! evaluating party.
//!
//! Every artifact starts with a small header (magic, format version and a
//! kind tag) followed by the bincode encoding of the object. Objects bound to
//! encryption parameters are checked against the loading [HeContext], so a
//! key or ciphertext produced under other parameters is refused with
//! [Error::Decode] instead of silently decrypting to garbage.

use std::io::{Read, Write};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    Ciphertext, EncryptionParameters, Error, HeContext, PublicKey, Result, SecretKey,
};

/// First bytes of every artifact.
pub const ARTIFACT_MAGIC: [u8; 4] = *b"HCIF";

/// Version of the artifact byte format.
pub const ARTIFACT_VERSION: u16 = 1;

/// What an artifact contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactTag {
    /// [EncryptionParameters]
    Parameters,
    /// [PublicKey]
    PublicKey,
    /// [SecretKey]
    SecretKey,
    /// [Ciphertext]
    Ciphertext,
}

#[derive(Serialize, Deserialize)]
struct Header {
    magic: [u8; 4],
    version: u16,
    tag: ArtifactTag,
}

impl Header {
    fn new(tag: ArtifactTag) -> Self {
        Header { magic: ARTIFACT_MAGIC, version: ARTIFACT_VERSION, tag }
    }

    fn check(&self, expected: ArtifactTag) -> Result<()> {
        if self.magic != ARTIFACT_MAGIC {
            return Err(Error::Decode("not an artifact of this format".to_string()));
        }
        if self.version != ARTIFACT_VERSION {
            return Err(Error::Decode(format!("unsupported artifact version {}", self.version)));
        }
        if self.tag != expected {
            return Err(Error::Decode(format!("expected {:?} artifact, found {:?}", expected, self.tag)));
        }
        Ok(())
    }
}

fn storage_error(e: impl std::fmt::Display) -> Error {
    Error::Storage(e.to_string())
}

fn write_artifact<W: Write, T: Serialize>(stream: &mut W, tag: ArtifactTag, value: &T) -> Result<usize> {
    let mut bytes = bincode::serialize(&Header::new(tag)).map_err(storage_error)?;
    bincode::serialize_into(&mut bytes, value).map_err(storage_error)?;
    stream.write_all(&bytes).map_err(storage_error)?;
    Ok(bytes.len())
}

fn read_artifact<R: Read, T: DeserializeOwned>(stream: &mut R, tag: ArtifactTag) -> Result<T> {
    let header: Header = bincode::deserialize_from(&mut *stream)?;
    header.check(tag)?;
    Ok(bincode::deserialize_from(stream)?)
}

fn artifact_size<T: Serialize>(tag: ArtifactTag, value: &T) -> Result<usize> {
    let header = bincode::serialized_size(&Header::new(tag)).map_err(storage_error)?;
    let body = bincode::serialized_size(value).map_err(storage_error)?;
    Ok((header + body) as usize)
}

/// Provide serialization and deserialization methods for
/// HE objects without context information.
pub trait Serializable: Sized {
    /// Serialize the object into a stream. Returns the number of bytes written.
    fn serialize<T: Write>(&self, stream: &mut T) -> Result<usize>;
    /// Deserialize the object from a stream.
    fn deserialize<T: Read>(stream: &mut T) -> Result<Self>;
    /// Get the size (bytes) of the object if serialized.
    fn serialized_size(&self) -> Result<usize>;

    /// Serialize into a fresh buffer.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.serialize(&mut bytes)?;
        Ok(bytes)
    }

    /// Deserialize from a buffer holding exactly one object.
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut stream = bytes;
        let value = Self::deserialize(&mut stream)?;
        if !stream.is_empty() {
            return Err(Error::Decode(format!("{} trailing bytes after artifact", stream.len())));
        }
        Ok(value)
    }
}

/// Provide serialization and deserialization methods for
/// HE objects relative to an HE context.
pub trait SerializableWithHeContext: Sized {
    /// Serialize the object into a stream. Returns the number of bytes written.
    fn serialize<T: Write>(&self, context: &HeContext, stream: &mut T) -> Result<usize>;
    /// Deserialize the object from a stream and check it against the context.
    fn deserialize<T: Read>(context: &HeContext, stream: &mut T) -> Result<Self>;
    /// Get the size (bytes) of the object if serialized.
    fn serialized_size(&self, context: &HeContext) -> Result<usize>;

    /// Serialize into a fresh buffer.
    fn to_bytes(&self, context: &HeContext) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.serialize(context, &mut bytes)?;
        Ok(bytes)
    }

    /// Deserialize from a buffer holding exactly one object.
    fn from_bytes(context: &HeContext, bytes: &[u8]) -> Result<Self> {
        let mut stream = bytes;
        let value = Self::deserialize(context, &mut stream)?;
        if !stream.is_empty() {
            return Err(Error::Decode(format!("{} trailing bytes after artifact", stream.len())));
        }
        Ok(value)
    }
}

impl Serializable for EncryptionParameters {
    fn serialize<T: Write>(&self, stream: &mut T) -> Result<usize> {
        write_artifact(stream, ArtifactTag::Parameters, self)
    }
    fn deserialize<T: Read>(stream: &mut T) -> Result<Self> {
        read_artifact(stream, ArtifactTag::Parameters)
    }
    fn serialized_size(&self) -> Result<usize> {
        artifact_size(ArtifactTag::Parameters, self)
    }
}

macro_rules! impl_serializable_with_context {
    ($type:ty, $tag:expr, $what:literal) => {
        impl SerializableWithHeContext for $type {
            fn serialize<T: Write>(&self, _context: &HeContext, stream: &mut T) -> Result<usize> {
                write_artifact(stream, $tag, self)
            }
            fn deserialize<T: Read>(context: &HeContext, stream: &mut T) -> Result<Self> {
                let value: $type = read_artifact(stream, $tag)?;
                context.check_parms_id(value.parms_id(), $what)?;
                if !value.is_valid_for(context) {
                    return Err(Error::Decode(format!("{} is not valid for encryption parameters", $what)));
                }
                Ok(value)
            }
            fn serialized_size(&self, _context: &HeContext) -> Result<usize> {
                artifact_size($tag, self)
            }
        }
    };
}

impl_serializable_with_context!(PublicKey, ArtifactTag::PublicKey, "public key");
impl_serializable_with_context!(SecretKey, ArtifactTag::SecretKey, "secret key");
impl_serializable_with_context!(Ciphertext, ArtifactTag::Ciphertext, "ciphertext");

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{CKKSEncoder, Encryptor, KeyGenerator};

    fn context(poly_modulus_degree: usize) -> Arc<HeContext> {
        HeContext::new(EncryptionParameters::inference_default().set_poly_modulus_degree(poly_modulus_degree)).unwrap()
    }

    #[test]
    fn test_parameters() {
        let parms = EncryptionParameters::inference_default();
        let bytes = parms.to_bytes().unwrap();
        assert_eq!(bytes.len(), parms.serialized_size().unwrap());
        assert_eq!(&ARTIFACT_MAGIC, &bytes[..4]);
        let back = EncryptionParameters::from_bytes(&bytes).unwrap();
        assert_eq!(parms, back);
    }

    #[test]
    fn test_keys_and_ciphertext() {
        let context = context(64);
        let mut keygen = KeyGenerator::new(context.clone());
        let public_key = keygen.create_public_key();

        let bytes = public_key.to_bytes(&context).unwrap();
        assert_eq!(bytes.len(), public_key.serialized_size(&context).unwrap());
        let pk = PublicKey::from_bytes(&context, &bytes).unwrap();
        assert_eq!(public_key.as_ciphertext().data(), pk.as_ciphertext().data());

        let bytes = keygen.secret_key().to_bytes(&context).unwrap();
        let sk = SecretKey::from_bytes(&context, &bytes).unwrap();
        assert_eq!(keygen.secret_key().data(), sk.data());

        let plain = CKKSEncoder::new(context.clone()).encode_f64_array(&[1.0, 2.0], context.parms().scale()).unwrap();
        let cipher = Encryptor::new(context.clone(), pk).unwrap().encrypt(&plain).unwrap();
        let bytes = cipher.to_bytes(&context).unwrap();
        let back = Ciphertext::from_bytes(&context, &bytes).unwrap();
        assert_eq!(cipher.data(), back.data());
        assert_eq!(cipher.scale(), back.scale());
    }

    #[test]
    fn test_rejects_wrong_kind() {
        let context = context(64);
        let mut keygen = KeyGenerator::new(context.clone());
        let bytes = keygen.create_public_key().to_bytes(&context).unwrap();
        assert!(matches!(Ciphertext::from_bytes(&context, &bytes), Err(Error::Decode(_))));
        assert!(matches!(SecretKey::from_bytes(&context, &bytes), Err(Error::Decode(_))));
    }

    #[test]
    fn test_rejects_corrupted_bytes() {
        let context = context(64);
        let mut keygen = KeyGenerator::new(context.clone());
        let bytes = keygen.create_public_key().to_bytes(&context).unwrap();

        assert!(matches!(PublicKey::from_bytes(&context, &bytes[..bytes.len() / 2]), Err(Error::Decode(_))));
        assert!(matches!(PublicKey::from_bytes(&context, &[]), Err(Error::Decode(_))));

        let mut bad_magic = bytes.clone();
        bad_magic[0] ^= 0xff;
        assert!(matches!(PublicKey::from_bytes(&context, &bad_magic), Err(Error::Decode(_))));

        let mut trailing = bytes;
        trailing.push(0);
        assert!(matches!(PublicKey::from_bytes(&context, &trailing), Err(Error::Decode(_))));
    }

    #[test]
    fn test_rejects_foreign_parameters() {
        let context = context(64);
        let other = self::context(128);
        let mut keygen = KeyGenerator::new(other.clone());
        let bytes = keygen.create_public_key().to_bytes(&other).unwrap();
        assert!(matches!(PublicKey::from_bytes(&context, &bytes), Err(Error::Decode(_))));
    }
}
