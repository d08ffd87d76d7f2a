//! Engine-level authentication flows.

use oid_consumer::message::SREG_URI;
use oid_consumer::nonce::make_nonce;
use oid_consumer::{ConsumerConfig, Endpoint, Message, Response, Status};
use oid_crypto::SessionType;
use oid_store::AssociationStore;

use crate::common::{AssociateMode, RelyingParty, CLAIMED_ID, OP_URL, RETURN_TO, TRUST_ROOT};

fn endpoint() -> Endpoint {
    Endpoint::new(CLAIMED_ID, OP_URL)
}

async fn complete(rp: &RelyingParty, query: Vec<(String, String)>, endpoint: &Endpoint) -> anyhow::Result<Response> {
    let message = Message::from_post_args(query)?;
    Ok(rp.engine.complete(&message, endpoint).await?)
}

/// Smart mode: associate once, verify locally.
#[tokio::test]
async fn test_smart_mode_success() -> anyhow::Result<()> {
    let rp = RelyingParty::new(ConsumerConfig::default(), AssociateMode::Honour);

    let request = rp.engine.begin(endpoint()).await?;
    let assoc = request.assoc.clone().expect("association negotiated");
    assert_eq!(assoc.handle, "handle-1");
    assert_eq!(rp.provider.associate_requests(), 1);

    let redirect = request.redirect_url(TRUST_ROOT, RETURN_TO, false);
    assert!(redirect.contains("openid.assoc_handle=handle-1"));

    let query = rp.provider.approve(&redirect)?;
    let response = complete(&rp, query, &request.endpoint).await?;

    let Response::Success(success) = response else {
        panic!("expected success, got {response:?}");
    };
    assert_eq!(success.identity_url(), Some(CLAIMED_ID));
    assert_eq!(rp.provider.check_auth_requests(), 0);

    let sreg = success.extension_response(SREG_URI, true).expect("sreg signed");
    assert_eq!(sreg["nickname"], "jane");
    Ok(())
}

/// Associations are reused until removed.
#[tokio::test]
async fn test_association_reuse() -> anyhow::Result<()> {
    let rp = RelyingParty::new(ConsumerConfig::default(), AssociateMode::Honour);

    rp.engine.begin(endpoint()).await?;
    rp.engine.begin(endpoint()).await?;
    assert_eq!(rp.provider.associate_requests(), 1);

    assert!(rp.associations.remove_association(OP_URL, "handle-1").await?);
    let request = rp.engine.begin(endpoint()).await?;
    assert_eq!(rp.provider.associate_requests(), 2);
    assert_eq!(request.assoc.map(|a| a.handle), Some("handle-2".to_string()));
    Ok(())
}

/// With associations disabled, the provider confirms each response.
#[tokio::test]
async fn test_dumb_mode_success() -> anyhow::Result<()> {
    let config = ConsumerConfig {
        use_associations: false,
        ..ConsumerConfig::default()
    };
    let rp = RelyingParty::new(config, AssociateMode::Honour);

    let request = rp.engine.begin(endpoint()).await?;
    assert!(request.assoc.is_none());
    assert_eq!(rp.provider.associate_requests(), 0);

    let query = rp.provider.approve(&request.redirect_url(TRUST_ROOT, RETURN_TO, false))?;
    let response = complete(&rp, query, &request.endpoint).await?;
    assert!(response.is_success(), "{response:?}");
    assert_eq!(rp.provider.check_auth_requests(), 1);
    Ok(())
}

/// A refused association degrades to dumb mode.
#[tokio::test]
async fn test_refused_association() -> anyhow::Result<()> {
    let rp = RelyingParty::new(ConsumerConfig::default(), AssociateMode::Refuse);

    let request = rp.engine.begin(endpoint()).await?;
    assert!(request.assoc.is_none());
    assert_eq!(rp.provider.associate_requests(), 1);

    let query = rp.provider.approve(&request.redirect_url(TRUST_ROOT, RETURN_TO, false))?;
    let response = complete(&rp, query, &request.endpoint).await?;
    assert!(response.is_success(), "{response:?}");
    assert_eq!(rp.provider.check_auth_requests(), 1);
    Ok(())
}

/// A DH request answered in plaintext is refused unless allowed.
#[tokio::test]
async fn test_plaintext_downgrade() -> anyhow::Result<()> {
    let strict = RelyingParty::new(ConsumerConfig::default(), AssociateMode::Plaintext);
    assert!(strict.engine.begin(endpoint()).await?.assoc.is_none());

    let config = ConsumerConfig {
        allow_plaintext_fallback: true,
        ..ConsumerConfig::default()
    };
    let lenient = RelyingParty::new(config, AssociateMode::Plaintext);
    assert!(lenient.engine.begin(endpoint()).await?.assoc.is_some());
    Ok(())
}

/// A plaintext session is honoured when asked for.
#[tokio::test]
async fn test_plaintext_session() -> anyhow::Result<()> {
    let config = ConsumerConfig {
        session_type: SessionType::NoEncryption,
        ..ConsumerConfig::default()
    };
    let rp = RelyingParty::new(config, AssociateMode::Honour);

    let request = rp.engine.begin(endpoint()).await?;
    assert!(request.assoc.is_some());

    let query = rp.provider.approve(&request.redirect_url(TRUST_ROOT, RETURN_TO, false))?;
    let response = complete(&rp, query, &request.endpoint).await?;
    assert!(response.is_success(), "{response:?}");
    Ok(())
}

/// The same response cannot be used twice.
#[tokio::test]
async fn test_replay_rejected() -> anyhow::Result<()> {
    let rp = RelyingParty::new(ConsumerConfig::default(), AssociateMode::Honour);
    let request = rp.engine.begin(endpoint()).await?;
    let query = rp.provider.approve(&request.redirect_url(TRUST_ROOT, RETURN_TO, false))?;

    let first = complete(&rp, query.clone(), &request.endpoint).await?;
    assert!(first.is_success());

    let replay = complete(&rp, query, &request.endpoint).await?;
    assert_eq!(replay.status(), Status::Failure);
    assert!(replay.reason().unwrap_or_default().starts_with("Nonce missing from store"));
    Ok(())
}

/// Appending an unsigned provider nonce does not make a used response new.
#[tokio::test]
async fn test_replay_with_injected_nonce_rejected() -> anyhow::Result<()> {
    let rp = RelyingParty::new(ConsumerConfig::default(), AssociateMode::Honour);
    let request = rp.engine.begin(endpoint()).await?;
    let mut query = rp.provider.approve(&request.redirect_url(TRUST_ROOT, RETURN_TO, false))?;
    assert!(complete(&rp, query.clone(), &request.endpoint).await?.is_success());

    query.push(("openid.response_nonce".to_string(), make_nonce()));
    let replay = complete(&rp, query, &request.endpoint).await?;
    assert_eq!(replay.status(), Status::Failure);
    assert!(replay.reason().unwrap_or_default().starts_with("Nonce missing from store"));
    Ok(())
}

/// Changing a signed field breaks the signature.
#[tokio::test]
async fn test_tampered_response() -> anyhow::Result<()> {
    let rp = RelyingParty::new(ConsumerConfig::default(), AssociateMode::Honour);
    let request = rp.engine.begin(endpoint()).await?;
    let query = rp.provider.approve(&request.redirect_url(TRUST_ROOT, RETURN_TO, false))?;

    let tampered: Vec<(String, String)> = query
        .into_iter()
        .map(|(key, value)| {
            if key == "openid.sreg.nickname" {
                (key, "mallory".to_string())
            } else {
                (key, value)
            }
        })
        .collect();
    let response = complete(&rp, tampered, &request.endpoint).await?;
    assert_eq!(response.reason(), Some("bad signature"));
    Ok(())
}

/// Immediate mode surfaces the provider's setup URL.
#[tokio::test]
async fn test_immediate_setup_needed() -> anyhow::Result<()> {
    let rp = RelyingParty::new(ConsumerConfig::default(), AssociateMode::Honour);
    let request = rp.engine.begin(endpoint()).await?;
    let redirect = request.redirect_url(TRUST_ROOT, RETURN_TO, true);
    assert!(redirect.contains("openid.mode=checkid_immediate"));

    let query = rp.provider.needs_setup(&redirect)?;
    let response = complete(&rp, query, &request.endpoint).await?;
    assert_eq!(
        response,
        Response::SetupNeeded {
            claimed_id: Some(CLAIMED_ID.to_string()),
            setup_url: format!("{OP_URL}/setup"),
        }
    );
    Ok(())
}

/// A delegated identifier is asserted by the provider and the claimed one
/// is reported.
#[tokio::test]
async fn test_delegated_identity() -> anyhow::Result<()> {
    let rp = RelyingParty::new(ConsumerConfig::default(), AssociateMode::Honour);
    let delegated = endpoint().with_local_id("http://op.example/users/jane");

    let request = rp.engine.begin(delegated.clone()).await?;
    let redirect = request.redirect_url(TRUST_ROOT, RETURN_TO, false);
    assert!(redirect.contains("openid.identity=http%3A%2F%2Fop.example%2Fusers%2Fjane"));

    let query = rp.provider.approve(&redirect)?;
    let response = complete(&rp, query.clone(), &delegated).await?;
    assert!(response.is_success(), "{response:?}");
    assert_eq!(response.claimed_id(), Some(CLAIMED_ID));

    // The same assertion against the undelegated endpoint names the wrong identity.
    let mismatch = complete(&rp, query, &endpoint()).await?;
    assert!(mismatch.reason().unwrap_or_default().contains("delegate"));
    Ok(())
}

/// A provider that lost an association invalidates it through
/// check_authentication.
#[tokio::test]
async fn test_invalidated_handle() -> anyhow::Result<()> {
    let rp = RelyingParty::new(ConsumerConfig::default(), AssociateMode::Honour);
    let request = rp.engine.begin(endpoint()).await?;
    assert_eq!(rp.associations.count(OP_URL), 1);

    rp.provider.forget_associations();
    let query = rp.provider.approve(&request.redirect_url(TRUST_ROOT, RETURN_TO, false))?;
    let response = complete(&rp, query, &request.endpoint).await?;

    assert!(response.is_success(), "{response:?}");
    assert_eq!(rp.provider.check_auth_requests(), 1);
    assert_eq!(rp.associations.count(OP_URL), 0);
    Ok(())
}

/// The user cancelled at the provider.
#[tokio::test]
async fn test_cancel() -> anyhow::Result<()> {
    let rp = RelyingParty::new(ConsumerConfig::default(), AssociateMode::Honour);
    let request = rp.engine.begin(endpoint()).await?;
    let query = vec![("openid.mode".to_string(), "cancel".to_string())];
    let response = complete(&rp, query, &request.endpoint).await?;
    assert_eq!(response.status(), Status::Cancel);
    assert_eq!(response.claimed_id(), Some(CLAIMED_ID));
    Ok(())
}
