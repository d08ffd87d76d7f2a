//! Session-aware flows through the [`Consumer`] facade.

use std::sync::Arc;

use oid_consumer::{Consumer, ConsumerConfig, Endpoint, Status, StaticDiscovery};
use oid_store::MemorySession;

use crate::common::{AssociateMode, RelyingParty, CLAIMED_ID, OP_URL, RETURN_TO, TRUST_ROOT};

struct Site {
    consumer: Consumer,
    session: Arc<MemorySession>,
    provider: Arc<crate::common::FakeProvider>,
}

fn site(endpoints: Vec<Endpoint>) -> Site {
    let rp = RelyingParty::new(ConsumerConfig::default(), AssociateMode::Honour);
    let discovery = Arc::new(StaticDiscovery::new());
    discovery.insert(CLAIMED_ID, endpoints);
    let session = Arc::new(MemorySession::new());
    Site {
        consumer: Consumer::new(rp.engine, session.clone(), discovery),
        session,
        provider: rp.provider,
    }
}

/// Discover, redirect, come back, succeed; the session is left clean.
#[tokio::test]
async fn test_login_through_facade() -> anyhow::Result<()> {
    let site = site(vec![Endpoint::new(CLAIMED_ID, OP_URL)]);

    let request = site.consumer.begin(CLAIMED_ID).await?;
    assert!(request.assoc.is_some());
    assert!(!site.session.is_empty());

    let query = site
        .provider
        .approve(&request.redirect_url(TRUST_ROOT, RETURN_TO, false))?;
    let response = site.consumer.complete(query).await?;

    assert!(response.is_success(), "{response:?}");
    assert_eq!(response.claimed_id(), Some(CLAIMED_ID));
    assert!(site.session.is_empty());
    Ok(())
}

/// A failed endpoint leaves the next one for the following attempt.
#[tokio::test]
async fn test_fallback_to_next_endpoint() -> anyhow::Result<()> {
    let site = site(vec![
        Endpoint::new(CLAIMED_ID, "http://broken.example/server"),
        Endpoint::new(CLAIMED_ID, OP_URL),
    ]);

    let first = site.consumer.begin(CLAIMED_ID).await?;
    assert_eq!(first.endpoint.server_url, "http://broken.example/server");
    assert!(first.assoc.is_none());

    let response = site
        .consumer
        .complete([("openid.mode", "error"), ("openid.error", "server down")])
        .await?;
    assert_eq!(response.status(), Status::Failure);
    assert_eq!(response.reason(), Some("server down"));

    let second = site.consumer.begin(CLAIMED_ID).await?;
    assert_eq!(second.endpoint.server_url, OP_URL);

    let query = site
        .provider
        .approve(&second.redirect_url(TRUST_ROOT, RETURN_TO, false))?;
    assert!(site.consumer.complete(query).await?.is_success());
    assert!(site.session.is_empty());
    Ok(())
}

/// Completing twice: the second call finds no pending authentication.
#[tokio::test]
async fn test_second_completion_has_no_state() -> anyhow::Result<()> {
    let site = site(vec![Endpoint::new(CLAIMED_ID, OP_URL)]);
    let request = site.consumer.begin(CLAIMED_ID).await?;
    let query = site
        .provider
        .approve(&request.redirect_url(TRUST_ROOT, RETURN_TO, false))?;

    assert!(site.consumer.complete(query.clone()).await?.is_success());
    let again = site.consumer.complete(query).await?;
    assert_eq!(again.status(), Status::Failure);
    assert_eq!(again.claimed_id(), None);
    Ok(())
}
