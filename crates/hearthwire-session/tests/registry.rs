//! Concurrency tests for the redirect registry: many connection tasks
//! racing on the same handoff.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use hearthwire_protocol::{CipherParameters, RedirectKind};
use hearthwire_session::{RedirectRegistry, RedirectToken, Serial, SessionError};

// =========================================================================
// Helpers
// =========================================================================

fn issue(registry: &RedirectRegistry, username: &str) -> RedirectToken {
    let token = RedirectToken::issue(
        Serial::random(),
        username,
        &CipherParameters::default(),
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, 2611),
        RedirectKind::LoginHandoff,
    );
    registry.insert(token.clone());
    token
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_consume_concurrent_replays_exactly_one_wins() {
    let registry = Arc::new(RedirectRegistry::default());
    let token = issue(&registry, "ayla");

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let registry = Arc::clone(&registry);
        let claim = token.credentials.clone();
        tasks.push(tokio::spawn(async move {
            registry.consume_if_present(&claim)
        }));
    }

    let mut admitted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(redeemed) => {
                assert_eq!(redeemed.serial(), token.serial());
                admitted += 1;
            }
            Err(e) => assert!(matches!(e, SessionError::NoPendingRedirect(_))),
        }
    }

    assert_eq!(admitted, 1, "a token must redeem exactly once");
    assert!(registry.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_consume_independent_users_do_not_interfere() {
    let registry = Arc::new(RedirectRegistry::default());
    let tokens: Vec<RedirectToken> = (0..32)
        .map(|i| issue(&registry, &format!("player{i}")))
        .collect();

    let mut tasks = Vec::new();
    for token in tokens {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            registry.consume_if_present(&token.credentials).is_ok()
        }));
    }

    for task in tasks {
        assert!(task.await.unwrap());
    }
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_reissue_after_redeem_is_redeemable_again() {
    let registry = RedirectRegistry::default();
    let first = issue(&registry, "ayla");
    registry.consume_if_present(&first.credentials).unwrap();

    // Returning to the login role mints a fresh token for the same name.
    let second = issue(&registry, "Ayla");

    assert!(registry.consume_if_present(&second.credentials).is_ok());
    assert!(registry.consume_if_present(&first.credentials).is_err());
}
