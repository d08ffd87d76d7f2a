//! Message signatures under an association.
//!
//! The signed text is the key-value form of the fields listed in
//! `openid.signed`, in that order, keys without the `openid.` prefix.

use base64::Engine;

use oid_store::Association;

use crate::error::{ConsumerError, ConsumerResult};
use crate::kvform;
use crate::message::{Message, Namespace, OPENID_PREFIX};

/// Signing and verification of protocol messages.
pub trait MessageSigning {
    /// Computes the MAC over `fields` of `message`, in the given order.
    ///
    /// # Errors
    ///
    /// Returns an error if a listed field is absent or cannot be expressed
    /// in key-value form.
    fn sign(&self, message: &Message, fields: &[&str]) -> ConsumerResult<Vec<u8>>;

    /// Returns a copy of `message` carrying this association's handle and
    /// `signed`/`sig` arguments over every OpenID field it contains.
    ///
    /// # Errors
    ///
    /// Returns an error if a field cannot be expressed in key-value form.
    fn sign_message(&self, message: &Message) -> ConsumerResult<Message>;

    /// Verifies `openid.sig` over the fields named in `openid.signed`.
    ///
    /// # Errors
    ///
    /// Returns an error if `sig`, `signed` or a listed field is absent.
    fn check_message_signature(&self, message: &Message) -> ConsumerResult<bool>;
}

impl MessageSigning for Association {
    fn sign(&self, message: &Message, fields: &[&str]) -> ConsumerResult<Vec<u8>> {
        let text = signed_text(message, fields)?;
        Ok(self.mac(text.as_bytes()))
    }

    fn sign_message(&self, message: &Message) -> ConsumerResult<Message> {
        let mut signed = message.clone();
        signed.del_arg(Namespace::OpenId, "sig");
        signed.del_arg(Namespace::OpenId, "signed");
        signed.set_arg(Namespace::OpenId, "assoc_handle", self.handle.as_str());

        let mut fields: Vec<&str> = signed
            .iter()
            .filter_map(|(key, _)| key.strip_prefix(OPENID_PREFIX))
            .collect();
        fields.push("signed");
        let field_list = fields.join(",");

        signed.set_arg(Namespace::OpenId, "signed", field_list.as_str());
        let fields: Vec<&str> = field_list.split(',').collect();
        let sig = self.sign(&signed, &fields)?;
        signed.set_arg(
            Namespace::OpenId,
            "sig",
            base64::engine::general_purpose::STANDARD.encode(sig),
        );
        Ok(signed)
    }

    fn check_message_signature(&self, message: &Message) -> ConsumerResult<bool> {
        let sig = message
            .get_arg(Namespace::OpenId, "sig")
            .ok_or_else(|| ConsumerError::MissingField("sig".to_string()))?;
        let field_list = message
            .get_arg(Namespace::OpenId, "signed")
            .ok_or_else(|| ConsumerError::MissingField("signed".to_string()))?;
        let fields: Vec<&str> = field_list.split(',').map(str::trim).collect();

        let Ok(tag) = base64::engine::general_purpose::STANDARD.decode(sig) else {
            return Ok(false);
        };
        let text = signed_text(message, &fields)?;
        Ok(self.verify_mac(text.as_bytes(), &tag))
    }
}

fn signed_text(message: &Message, fields: &[&str]) -> ConsumerResult<String> {
    let pairs = fields
        .iter()
        .map(|field| {
            message
                .get_aliased_arg(field)
                .map(|value| (*field, value))
                .ok_or_else(|| ConsumerError::MissingField((*field).to_string()))
        })
        .collect::<ConsumerResult<Vec<_>>>()?;
    kvform::to_kv(pairs)
}
