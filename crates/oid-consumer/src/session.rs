//! Consumer side of association sessions.
//!
//! A session exists for one associate round trip. It contributes the
//! request parameters and recovers the MAC secret from the response.

use base64::Engine;

use oid_crypto::dh::{from_base64, to_base64};
use oid_crypto::{AssociationType, DhGroup, DiffieHellman, SessionType};

use crate::error::{ConsumerError, ConsumerResult};
use crate::message::Message;

/// How the MAC secret travels in an associate response.
#[derive(Debug, Clone)]
pub enum ConsumerSession {
    /// The secret is sent in the clear as `mac_key`. Only safe over TLS.
    Plaintext,
    /// The secret is XOR-masked with a hash of a Diffie-Hellman value.
    DiffieHellman {
        /// `DH-SHA1` or `DH-SHA256`.
        session_type: SessionType,
        /// Ephemeral key pair.
        dh: DiffieHellman,
    },
}

impl ConsumerSession {
    /// Creates a session of the given type. `group` is ignored for
    /// plaintext sessions.
    #[must_use]
    pub fn new(session_type: SessionType, group: DhGroup) -> Self {
        if session_type.is_diffie_hellman() {
            Self::DiffieHellman {
                session_type,
                dh: DiffieHellman::new(group),
            }
        } else {
            Self::Plaintext
        }
    }

    /// Returns the session type.
    #[must_use]
    pub fn session_type(&self) -> SessionType {
        match self {
            Self::Plaintext => SessionType::NoEncryption,
            Self::DiffieHellman { session_type, .. } => *session_type,
        }
    }

    /// Parameters this session adds to an associate request, without the
    /// `openid.` prefix.
    ///
    /// Plaintext sends none: an absent `session_type` asks for the secret
    /// in the clear.
    #[must_use]
    pub fn request_args(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Plaintext => Vec::new(),
            Self::DiffieHellman { session_type, dh } => vec![
                ("session_type", session_type.as_str().to_string()),
                ("dh_modulus", to_base64(dh.group().modulus())),
                ("dh_gen", to_base64(dh.group().generator())),
                ("dh_consumer_public", to_base64(&dh.public_key())),
            ],
        }
    }

    /// Recovers the MAC secret from an associate response.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or malformed, or if
    /// the secret does not have the length `assoc_type` requires.
    pub fn extract_secret(
        &self,
        response: &Message,
        assoc_type: AssociationType,
    ) -> ConsumerResult<Vec<u8>> {
        let secret = match self {
            Self::Plaintext => decode_field(response, "mac_key")?,
            Self::DiffieHellman { session_type, dh } => {
                let server_public = from_base64(response.required_arg("dh_server_public")?)?;
                let enc_mac_key = decode_field(response, "enc_mac_key")?;
                let algorithm = session_type.hash_algorithm().ok_or_else(|| {
                    ConsumerError::Association(format!("{session_type} has no hash"))
                })?;
                dh.xor_secret(&server_public, &enc_mac_key, algorithm)?
            }
        };

        if secret.len() != assoc_type.secret_len() {
            return Err(ConsumerError::Association(format!(
                "{assoc_type} needs a {}-byte secret, got {}",
                assoc_type.secret_len(),
                secret.len()
            )));
        }
        Ok(secret)
    }
}

fn decode_field(message: &Message, key: &str) -> ConsumerResult<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(message.required_arg(key)?)
        .map_err(|e| ConsumerError::Association(format!("{key} is not base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Namespace;
    use num_bigint::BigUint;
    use oid_crypto::HashAlgorithm;

    const SECRET: &[u8] = b"another 20-byte key.";

    fn weak_group() -> DhGroup {
        DhGroup::new(BigUint::from(1_235_514_290_909_u64), BigUint::from(2u8))
    }

    fn b64(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    /// Answers the session the way a provider would.
    fn provider_answer(session: &ConsumerSession) -> Message {
        let ConsumerSession::DiffieHellman { dh, .. } = session else {
            panic!("expected a DH session");
        };
        let provider = DiffieHellman::new(dh.group().clone());
        let masked = provider
            .xor_secret(&dh.public_key(), SECRET, HashAlgorithm::Sha1)
            .unwrap();
        Message::from_openid_args([
            ("dh_server_public", to_base64(&provider.public_key())),
            ("enc_mac_key", b64(&masked)),
        ])
        .unwrap()
    }

    #[test]
    fn plaintext_sends_no_parameters() {
        let session = ConsumerSession::new(SessionType::NoEncryption, DhGroup::default());
        assert!(session.request_args().is_empty());
        assert_eq!(session.session_type(), SessionType::NoEncryption);
    }

    #[test]
    fn dh_request_carries_group_and_public_value() {
        let session = ConsumerSession::new(SessionType::DhSha1, DhGroup::default());
        let args = session.request_args();
        let keys: Vec<_> = args.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, ["session_type", "dh_modulus", "dh_gen", "dh_consumer_public"]);
        assert_eq!(args[0].1, "DH-SHA1");
        assert!(args[1].1.starts_with("ANz5OguIOXLsDhmYmsWi"));
        assert_eq!(args[2].1, "Ag==");
    }

    #[test]
    fn plaintext_secret_is_decoded() {
        let session = ConsumerSession::Plaintext;
        let response = Message::from_openid_args([("mac_key", "AAAAAAAAAAAAAAAAAAAAAAAAAAA=")]).unwrap();
        let secret = session.extract_secret(&response, AssociationType::HmacSha1).unwrap();
        assert_eq!(secret, vec![0u8; 20]);
    }

    #[test]
    fn plaintext_secret_length_is_checked() {
        let session = ConsumerSession::Plaintext;
        let response = Message::from_openid_args([("mac_key", "AAAAAAAAAAAAAAAAAAAAAAAAAAA=")]).unwrap();
        assert!(session.extract_secret(&response, AssociationType::HmacSha256).is_err());
    }

    #[test]
    fn dh_secret_is_unmasked() {
        let session = ConsumerSession::new(SessionType::DhSha1, weak_group());
        let response = provider_answer(&session);
        let secret = session.extract_secret(&response, AssociationType::HmacSha1).unwrap();
        assert_eq!(secret, SECRET);
    }

    #[test]
    fn truncated_dh_payload_fails() {
        let session = ConsumerSession::new(SessionType::DhSha1, weak_group());
        let mut response = provider_answer(&session);
        response.set_arg(Namespace::OpenId, "enc_mac_key", b64(&[0, 0, 0]));
        assert!(session.extract_secret(&response, AssociationType::HmacSha1).is_err());
    }

    #[test]
    fn missing_dh_fields_fail() {
        let session = ConsumerSession::new(SessionType::DhSha1, weak_group());
        let mut response = provider_answer(&session);
        response.del_arg(Namespace::OpenId, "dh_server_public");
        assert!(matches!(
            session.extract_secret(&response, AssociationType::HmacSha1),
            Err(ConsumerError::MissingField(_))
        ));
    }
}
