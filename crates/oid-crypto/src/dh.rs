//! Diffie-Hellman key agreement for association secrets.
//!
//! Integers travel as base64 of their big-endian two's complement encoding
//! ("btwoc"): positive values whose top bit is set gain a leading zero
//! byte. The shared value is hashed and XORed over the MAC secret, so the
//! same operation masks (provider side) and unmasks (consumer side).

use base64::Engine;
use num_bigint::BigUint;
use num_traits::One;

use crate::algorithm::HashAlgorithm;
use crate::error::{CryptoError, CryptoResult};
use crate::hash::hash;
use crate::random::random_bytes;

/// The well-known 1024-bit OpenID modulus.
const DEFAULT_MODULUS_HEX: &str = "\
    DCF93A0B883972EC0E19989AC5A2CE310E1D37717E8D9571BB7623731866E61E\
    F75A2E27898B057F9891C2E27A639C3F29B60814581CD3B2CA3986D268370557\
    7D45C2E7E52DC81C7A171876E5CEA74B1448BFDFAF18828EFD2519F14E45E382\
    6634AF1949E5B535CC829A483B8A76223E5D490A257F05BDFF16F2FB22C583AB";

/// The OpenID default generator.
const DEFAULT_GENERATOR: u32 = 2;

/// A prime-modulus group: modulus and generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhGroup {
    modulus: BigUint,
    generator: BigUint,
}

impl DhGroup {
    /// Creates a group from explicit parameters.
    #[must_use]
    pub const fn new(modulus: BigUint, generator: BigUint) -> Self {
        Self { modulus, generator }
    }

    /// Returns the modulus.
    #[must_use]
    pub const fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Returns the generator.
    #[must_use]
    pub const fn generator(&self) -> &BigUint {
        &self.generator
    }

    /// Returns whether these are the protocol default parameters.
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl Default for DhGroup {
    fn default() -> Self {
        let modulus = BigUint::parse_bytes(DEFAULT_MODULUS_HEX.as_bytes(), 16)
            .unwrap_or_else(|| unreachable!("default modulus is valid hex"));
        Self {
            modulus,
            generator: BigUint::from(DEFAULT_GENERATOR),
        }
    }
}

/// One side of a Diffie-Hellman exchange.
///
/// Holds an ephemeral private exponent; lives for a single associate round
/// trip and is never persisted.
#[derive(Clone)]
pub struct DiffieHellman {
    group: DhGroup,
    private_key: BigUint,
}

impl std::fmt::Debug for DiffieHellman {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffieHellman")
            .field("group", &self.group)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl DiffieHellman {
    /// Creates an exchange with a random private exponent in `[1, p - 1)`.
    #[must_use]
    pub fn new(group: DhGroup) -> Self {
        let byte_len = usize::try_from(group.modulus.bits().div_ceil(8)).unwrap_or(128) + 8;
        let sample = BigUint::from_bytes_be(&random_bytes(byte_len));
        let bound = &group.modulus - BigUint::one();
        let private_key = sample % &bound + BigUint::one();
        Self::with_private_key(group, private_key)
    }

    /// Creates an exchange with a fixed private exponent.
    #[must_use]
    pub const fn with_private_key(group: DhGroup, private_key: BigUint) -> Self {
        Self { group, private_key }
    }

    /// Returns the group parameters.
    #[must_use]
    pub const fn group(&self) -> &DhGroup {
        &self.group
    }

    /// Returns `g^x mod p`, the value sent to the peer.
    #[must_use]
    pub fn public_key(&self) -> BigUint {
        self.group
            .generator
            .modpow(&self.private_key, &self.group.modulus)
    }

    /// Computes the shared value from the peer's public value.
    ///
    /// # Errors
    ///
    /// Returns an error if the peer's value is not in `(1, p - 1)`.
    pub fn shared_secret(&self, peer_public: &BigUint) -> CryptoResult<BigUint> {
        let one = BigUint::one();
        let upper = &self.group.modulus - &one;
        if *peer_public <= one || *peer_public >= upper {
            return Err(CryptoError::PublicValueOutOfRange);
        }
        Ok(peer_public.modpow(&self.private_key, &self.group.modulus))
    }

    /// XORs `secret` with `H(btwoc(shared))`.
    ///
    /// Applied by the provider to mask a MAC key and by the consumer to
    /// recover it.
    ///
    /// # Errors
    ///
    /// Returns an error if the peer value is out of range or `secret` is
    /// not exactly one digest long.
    pub fn xor_secret(
        &self,
        peer_public: &BigUint,
        secret: &[u8],
        algorithm: HashAlgorithm,
    ) -> CryptoResult<Vec<u8>> {
        let shared = self.shared_secret(peer_public)?;
        let mask = hash(algorithm, &btwoc(&shared));
        if mask.len() != secret.len() {
            return Err(CryptoError::LengthMismatch {
                expected: mask.len(),
                actual: secret.len(),
            });
        }
        Ok(xor(&mask, secret))
    }
}

/// Encodes a non-negative integer as big-endian two's complement.
#[must_use]
pub fn btwoc(value: &BigUint) -> Vec<u8> {
    let mut bytes = value.to_bytes_be();
    if bytes.first().is_some_and(|b| b & 0x80 != 0) {
        bytes.insert(0, 0);
    }
    bytes
}

/// Decodes a big-endian two's complement integer that must be non-negative.
///
/// # Errors
///
/// Returns an error for empty input or a negative encoding.
pub fn from_btwoc(bytes: &[u8]) -> CryptoResult<BigUint> {
    match bytes.first() {
        None => Err(CryptoError::InvalidInteger("empty encoding".to_string())),
        Some(b) if b & 0x80 != 0 => Err(CryptoError::InvalidInteger(
            "negative value".to_string(),
        )),
        Some(_) => Ok(BigUint::from_bytes_be(bytes)),
    }
}

/// Encodes an integer as base64 btwoc, the form used in protocol fields.
#[must_use]
pub fn to_base64(value: &BigUint) -> String {
    base64::engine::general_purpose::STANDARD.encode(btwoc(value))
}

/// Decodes an integer from base64 btwoc.
///
/// # Errors
///
/// Returns an error if the text is not base64 or encodes a negative value.
pub fn from_base64(encoded: &str) -> CryptoResult<BigUint> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::InvalidInteger(e.to_string()))?;
    from_btwoc(&bytes)
}

/// XORs two equal-length byte strings.
fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}
