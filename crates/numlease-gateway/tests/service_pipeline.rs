//! End-to-end tests through the async service: credentials, rate limiting,
//! admission, and the outcome envelope.

use std::sync::Arc;

use chrono::Duration;
use numlease_core::{Delivery, FixedDelivery, InMemoryCatalog, LeaseManager};
use numlease_gateway::{LeaseService, SessionTable};
use numlease_phone::FixedCandidates;
use numlease_types::{AccountId, LeaseConfig, Project, RateLimitConfig};
use rust_decimal::Decimal;

struct Fixture {
    service: LeaseService,
    sessions: Arc<SessionTable>,
}

impl Fixture {
    fn new(config: LeaseConfig, numbers: &[&str], delivery: FixedDelivery) -> Self {
        let catalog = Arc::new(
            InMemoryCatalog::with_projects([
                Project::new("kg", "KuGou Music", Decimal::new(10, 2)),
                Project::new("wx", "WeChat", Decimal::new(25, 2)),
            ])
            .unwrap(),
        );
        let manager = LeaseManager::new(config, catalog.clone())
            .with_candidates(Arc::new(FixedCandidates::new(numbers.iter().copied())))
            .with_delivery(Arc::new(delivery));
        let sessions = Arc::new(SessionTable::new());
        let service = LeaseService::new(Arc::new(manager), catalog, sessions.clone());
        Self { service, sessions }
    }

    fn default_with(numbers: &[&str]) -> Self {
        Self::new(LeaseConfig::default(), numbers, FixedDelivery::never())
    }

    async fn funded_token(&self, amount: Decimal) -> String {
        let token = self
            .sessions
            .issue(AccountId::new(), Duration::hours(1))
            .unwrap();
        assert!(self.service.recharge(&token, amount).await.is_ok());
        token
    }
}

#[tokio::test]
async fn lease_then_code_spends_the_price() {
    let fx = Fixture::new(
        LeaseConfig::default(),
        &["13800000001"],
        FixedDelivery::always("424242"),
    );
    let token = fx.funded_token(Decimal::ONE).await;

    let leased = fx.service.get_phone(&token, "kg", 0, 0).await;
    assert!(leased.is_ok(), "{}", leased.message);
    assert_eq!(leased.code, 1);
    let allocation = leased.data.unwrap();
    assert_eq!(allocation.phone.as_str(), "13800000001");
    assert_eq!(allocation.balance, Decimal::new(90, 2));

    let polled = fx
        .service
        .get_sms_code(&token, "kg", "13800000001")
        .await;
    assert_eq!(polled.data.as_ref().and_then(Delivery::code), Some("424242"));

    let balance = fx.service.balance(&token).await.data.unwrap();
    assert_eq!(balance.available, Decimal::new(90, 2));
    assert_eq!(balance.reserved, Decimal::ZERO);
}

#[tokio::test]
async fn pending_code_keeps_reservation() {
    let fx = Fixture::default_with(&["13800000001"]);
    let token = fx.funded_token(Decimal::ONE).await;
    fx.service.get_phone(&token, "kg", 1, 1).await;

    let polled = fx
        .service
        .get_sms_code(&token, "kg", "13800000001")
        .await;
    assert!(polled.is_ok());
    assert_eq!(polled.data, Some(Delivery::Pending));
    let balance = fx.service.balance(&token).await.data.unwrap();
    assert_eq!(balance.reserved, Decimal::new(10, 2));
}

#[tokio::test]
async fn bad_credential_is_401_and_touches_nothing() {
    let fx = Fixture::default_with(&["13800000001"]);
    let out = fx.service.get_phone("not-a-token", "kg", 0, 0).await;
    assert!(!out.is_ok());
    assert_eq!(out.http_status, 401);
    assert_eq!(out.code, -1);
    assert!(fx.service.manager().book().export().unwrap().0.is_empty());
}

#[tokio::test]
async fn out_of_range_filter_code_is_400() {
    let fx = Fixture::default_with(&["13800000001"]);
    let token = fx.funded_token(Decimal::ONE).await;
    let out = fx.service.get_phone(&token, "kg", 9, 0).await;
    assert_eq!(out.http_status, 400);
    assert!(out.message.starts_with("NL_ERR_301"));
    let out = fx.service.get_phone(&token, "kg", 0, 7).await;
    assert_eq!(out.http_status, 400);
}

#[tokio::test]
async fn business_refusals_use_negative_codes() {
    let fx = Fixture::default_with(&["13800000001"]);
    let poor = fx
        .sessions
        .issue(AccountId::new(), Duration::hours(1))
        .unwrap();
    let out = fx.service.get_phone(&poor, "kg", 0, 0).await;
    assert_eq!(out.code, -2);
    assert_eq!(out.http_status, 200);

    let a = fx.funded_token(Decimal::ONE).await;
    let b = fx.funded_token(Decimal::ONE).await;
    assert!(fx.service.get_phone(&a, "kg", 0, 0).await.is_ok());
    let out = fx.service.get_phone(&b, "kg", 0, 0).await;
    assert_eq!(out.code, -3);
    assert_eq!(out.http_status, 200);
}

#[tokio::test]
async fn unknown_project_is_404() {
    let fx = Fixture::default_with(&["13800000001"]);
    let token = fx.funded_token(Decimal::ONE).await;
    let out = fx.service.get_phone(&token, "nope", 0, 0).await;
    assert_eq!(out.http_status, 404);
    assert!(out.message.starts_with("NL_ERR_200"));
}

#[tokio::test]
async fn full_gate_sheds_load_and_recovers() {
    let config = LeaseConfig {
        admission_permits: 2,
        ..LeaseConfig::default()
    };
    let fx = Fixture::new(config, &["13800000001"], FixedDelivery::never());
    let token = fx.funded_token(Decimal::ONE).await;

    let gate = fx.service.gate();
    let held: Vec<_> = (0..2).map(|_| gate.try_admit().unwrap()).collect();
    let out = fx.service.get_phone(&token, "kg", 0, 0).await;
    assert_eq!(out.http_status, 503);
    assert!(out.message.starts_with("NL_ERR_800"));
    assert_eq!(fx.service.balance(&token).await.http_status, 503);

    drop(held);
    let out = fx.service.get_phone(&token, "kg", 0, 0).await;
    assert!(out.is_ok(), "{}", out.message);
    assert_eq!(gate.available(), 2);
}

#[tokio::test]
async fn rate_limit_applies_per_account() {
    let config = LeaseConfig {
        rate_limit: Some(RateLimitConfig {
            max_calls: 3,
            window_ms: 60_000,
        }),
        ..LeaseConfig::default()
    };
    let fx = Fixture::new(config, &["13800000001"], FixedDelivery::never());
    // Funding uses one call of the window.
    let a = fx.funded_token(Decimal::ONE).await;
    let b = fx.funded_token(Decimal::ONE).await;

    assert!(fx.service.balance(&a).await.is_ok());
    assert!(fx.service.balance(&a).await.is_ok());
    let out = fx.service.balance(&a).await;
    assert_eq!(out.http_status, 429);
    assert!(out.message.starts_with("NL_ERR_101"));

    assert!(fx.service.balance(&b).await.is_ok());
}

#[tokio::test]
async fn disabled_rate_limit_never_refuses() {
    let config = LeaseConfig {
        rate_limit: None,
        ..LeaseConfig::default()
    };
    let fx = Fixture::new(config, &["13800000001"], FixedDelivery::never());
    let token = fx.funded_token(Decimal::ONE).await;
    for _ in 0..500 {
        assert!(fx.service.balance(&token).await.is_ok());
    }
}

#[tokio::test]
async fn release_and_blacklist_round_trip() {
    let fx = Fixture::default_with(&["13800000001", "13800000002"]);
    let token = fx.funded_token(Decimal::ONE).await;

    let phone = fx.service.get_phone(&token, "kg", 0, 0).await.data.unwrap().phone;
    assert_eq!(phone.as_str(), "13800000001");
    assert!(fx.service.blacklist_phone(&token, "kg", phone.as_str()).await.is_ok());
    let out = fx.service.blacklist_phone(&token, "kg", phone.as_str()).await;
    assert_eq!(out.http_status, 409);

    let next = fx.service.get_phone(&token, "kg", 0, 0).await.data.unwrap().phone;
    assert_eq!(next.as_str(), "13800000002");
    assert!(fx.service.release_phone(&token, "kg", next.as_str()).await.is_ok());
    let out = fx.service.release_phone(&token, "kg", next.as_str()).await;
    assert_eq!(out.http_status, 404);

    let balance = fx.service.balance(&token).await.data.unwrap();
    assert_eq!(balance.available, Decimal::ONE);
}

#[tokio::test]
async fn specified_phone_and_recharge_validation() {
    let fx = Fixture::default_with(&["13800000001"]);
    let token = fx.funded_token(Decimal::ONE).await;

    let out = fx
        .service
        .get_specified_phone(&token, "wx", "13400000000", 2, 0)
        .await;
    assert_eq!(out.http_status, 400);
    assert!(out.message.starts_with("NL_ERR_302"));

    let out = fx
        .service
        .get_specified_phone(&token, "wx", "13400000000", 1, 0)
        .await;
    assert!(out.is_ok(), "{}", out.message);
    assert_eq!(out.data.unwrap().reserved_amount, Decimal::new(25, 2));

    let out = fx.service.recharge(&token, Decimal::ZERO).await;
    assert_eq!(out.http_status, 400);
    assert!(out.message.starts_with("NL_ERR_202"));
}

#[tokio::test]
async fn search_requires_credential() {
    let fx = Fixture::default_with(&["13800000001"]);
    let token = fx.funded_token(Decimal::ONE).await;

    let found = fx.service.search_projects(&token, None, Some("music")).await;
    let ids: Vec<String> = found
        .data
        .unwrap()
        .into_iter()
        .map(|p| p.id.as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["kg"]);

    let out = fx.service.search_projects("bogus", None, None).await;
    assert_eq!(out.http_status, 401);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_for_one_number() {
    let fx = Fixture::default_with(&["13800000001"]);
    let a = fx.funded_token(Decimal::ONE).await;
    let b = fx.funded_token(Decimal::ONE).await;

    let (ra, rb) = tokio::join!(
        fx.service.get_phone(&a, "kg", 0, 0),
        fx.service.get_phone(&b, "kg", 0, 0)
    );
    let wins = [ra.is_ok(), rb.is_ok()].iter().filter(|w| **w).count();
    assert_eq!(wins, 1);
    let loser = if ra.is_ok() { rb } else { ra };
    assert_eq!(loser.code, -3);

    assert_eq!(fx.service.gate().available(), fx.service.gate().capacity());
    fx.service.snapshot().await.unwrap().audit().unwrap();
}

#[tokio::test]
async fn oversized_recharge_is_refused_and_account_keeps_working() {
    let fx = Fixture::default_with(&["13800000001"]);
    let token = fx.funded_token(Decimal::MAX).await;

    let second = fx.service.recharge(&token, Decimal::MAX).await;
    assert!(!second.is_ok());
    assert_eq!(second.http_status, 400);
    assert!(second.message.starts_with("NL_ERR_202"), "{}", second.message);

    let balance = fx.service.balance(&token).await;
    assert!(balance.is_ok(), "{}", balance.message);
    assert_eq!(balance.data.unwrap().available, Decimal::MAX);

    let leased = fx.service.get_phone(&token, "kg", 0, 0).await;
    assert!(leased.is_ok(), "{}", leased.message);
    fx.service.snapshot().await.unwrap().audit().unwrap();
}
