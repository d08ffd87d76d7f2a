//! Algorithm identifiers used on the OpenID wire.
//!
//! Association types name the MAC used to sign assertions; session types
//! name how the MAC secret is transported during association.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Digest algorithms backing the association MACs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-1, kept for protocol compatibility only.
    #[serde(rename = "SHA1")]
    Sha1,

    /// SHA-256.
    #[serde(rename = "SHA256")]
    Sha256,
}

impl HashAlgorithm {
    /// Returns the output length in bytes.
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    /// Returns the algorithm name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
        }
    }
}

/// Association (MAC) types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AssociationType {
    /// HMAC-SHA1 with a 20 byte secret.
    #[default]
    #[serde(rename = "HMAC-SHA1")]
    HmacSha1,

    /// HMAC-SHA256 with a 32 byte secret.
    #[serde(rename = "HMAC-SHA256")]
    HmacSha256,
}

impl AssociationType {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HmacSha1 => "HMAC-SHA1",
            Self::HmacSha256 => "HMAC-SHA256",
        }
    }

    /// Returns the digest used by the MAC.
    #[must_use]
    pub const fn hash_algorithm(self) -> HashAlgorithm {
        match self {
            Self::HmacSha1 => HashAlgorithm::Sha1,
            Self::HmacSha256 => HashAlgorithm::Sha256,
        }
    }

    /// Returns the exact secret length this type requires.
    #[must_use]
    pub const fn secret_len(self) -> usize {
        self.hash_algorithm().output_len()
    }
}

impl fmt::Display for AssociationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssociationType {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HMAC-SHA1" => Ok(Self::HmacSha1),
            "HMAC-SHA256" => Ok(Self::HmacSha256),
            _ => Err(CryptoError::UnknownAssociationType(s.to_string())),
        }
    }
}

/// Association session types (secret transport).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionType {
    /// Secret sent in the clear. Only safe over a secure channel.
    #[serde(rename = "no-encryption")]
    NoEncryption,

    /// Diffie-Hellman, secret masked with SHA-1 of the shared value.
    #[default]
    #[serde(rename = "DH-SHA1")]
    DhSha1,

    /// Diffie-Hellman, secret masked with SHA-256 of the shared value.
    #[serde(rename = "DH-SHA256")]
    DhSha256,
}

impl SessionType {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoEncryption => "no-encryption",
            Self::DhSha1 => "DH-SHA1",
            Self::DhSha256 => "DH-SHA256",
        }
    }

    /// Returns the masking digest, or `None` for plaintext sessions.
    #[must_use]
    pub const fn hash_algorithm(self) -> Option<HashAlgorithm> {
        match self {
            Self::NoEncryption => None,
            Self::DhSha1 => Some(HashAlgorithm::Sha1),
            Self::DhSha256 => Some(HashAlgorithm::Sha256),
        }
    }

    /// Returns whether this session performs key agreement.
    #[must_use]
    pub const fn is_diffie_hellman(self) -> bool {
        !matches!(self, Self::NoEncryption)
    }

    /// Returns whether secrets for `assoc_type` can travel in this session.
    ///
    /// DH sessions mask with a digest of the same width as the secret, so
    /// each DH variant pairs with exactly one association type.
    #[must_use]
    pub fn supports(self, assoc_type: AssociationType) -> bool {
        match self.hash_algorithm() {
            None => true,
            Some(hash) => hash == assoc_type.hash_algorithm(),
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = CryptoError;

    /// Parses a wire name. The empty string is the OpenID 1.x spelling of
    /// a plaintext session.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "no-encryption" => Ok(Self::NoEncryption),
            "DH-SHA1" => Ok(Self::DhSha1),
            "DH-SHA256" => Ok(Self::DhSha256),
            _ => Err(CryptoError::UnknownSessionType(s.to_string())),
        }
    }
}
