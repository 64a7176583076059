use cookbook_auth::auth::{AuthService, PasswordHasher, Permission, Role};
use cookbook_auth::db::{Account, AccountStatus, Linkage};
use cookbook_auth::error::AuthError;
use cookbook_auth::{InMemoryCredentialStore, MemoryAuditSink, Settings};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_test::{assert_err, assert_ok};

const ID: &str = "DK-000001";
const SECRET: &str = "password123";

async fn service_with(settings: &Settings) -> (AuthService, Arc<InMemoryCredentialStore>) {
    let hasher = PasswordHasher::new(settings.auth.password_hash_cost).unwrap();
    let store = Arc::new(InMemoryCredentialStore::new());
    store
        .insert(Account {
            payroll_id: ID.to_string(),
            email_work: "chef@example.com".to_string(),
            password_hash: hasher.hash(SECRET).unwrap(),
            name_first: "Sam".to_string(),
            name_preferred: None,
            role: Role::Owner,
            permissions: None,
            linked: Linkage {
                business_id: "BIZ-42".to_string(),
                venue_id: "VEN-1".to_string(),
                work_area_id: "WA-K".to_string(),
            },
            status: AccountStatus::Active,
            last_login: None,
        })
        .await;

    let service =
        AuthService::from_settings(settings, store.clone(), Arc::new(MemoryAuditSink::new()))
            .expect("Failed to build auth service");
    (service, store)
}

#[tokio::test]
async fn test_lockout_then_recovery() {
    let mut settings = Settings::new_for_test().unwrap();
    settings.rate_limit.block_seconds = 1;
    let (service, _) = service_with(&settings).await;

    for _ in 0..5 {
        let err = service.login(Some(ID), Some("wrong"), "127.0.0.1").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    let err = service.login(Some(ID), Some(SECRET), "127.0.0.1").await.unwrap_err();
    assert_eq!(err, AuthError::RateLimited);

    // Wait for block to pass
    sleep(Duration::from_millis(1100)).await;

    let outcome = assert_ok!(service.login(Some(ID), Some(SECRET), "127.0.0.1").await);
    let claims = assert_ok!(service.tokens().verify(&outcome.token));
    assert_eq!(claims.role, Role::Owner);
    assert_eq!(claims.business_id, "BIZ-42");
    assert_eq!(claims.work_area_id, "WA-K");
}

#[tokio::test]
async fn test_guarded_user_carries_live_permissions() {
    let settings = Settings::new_for_test().unwrap();
    let (service, store) = service_with(&settings).await;

    let token = service.login(Some(ID), Some(SECRET), "127.0.0.1").await.unwrap().token;
    let user = service.authorize(Some(&token)).await.unwrap();
    assert!(user.require_permission(&Permission::Delete).is_ok());

    let mut account = store.get(ID).await.unwrap();
    account.role = Role::Employee;
    store.insert(account).await;

    let user = service.authorize(Some(&token)).await.unwrap();
    // Claims still say owner until the token is reissued; permissions follow the account.
    assert_eq!(user.claims.role, Role::Owner);
    assert_eq!(
        user.require_permission(&Permission::Write),
        Err(AuthError::PermissionDenied)
    );
}

#[tokio::test]
async fn test_malformed_ids_lock_out_too() {
    let settings = Settings::new_for_test().unwrap();
    let (service, _) = service_with(&settings).await;

    for _ in 0..5 {
        let err = assert_err!(service.login(Some("admin"), Some(SECRET), "127.0.0.1").await);
        assert_eq!(err, AuthError::InvalidFormat);
    }

    let err = assert_err!(service.login(Some("admin"), Some(SECRET), "127.0.0.1").await);
    assert_eq!(err, AuthError::RateLimited);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_guesses_stay_within_budget() {
    let settings = Settings::new_for_test().unwrap();
    let (service, _) = service_with(&settings).await;
    let service = Arc::new(service);

    let handles: Vec<_> = (0..30)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let guess = format!("guess-{}", i);
                service.login(Some(ID), Some(&guess), "127.0.0.1").await
            })
        })
        .collect();

    let mut invalid = 0;
    let mut limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Err(AuthError::InvalidCredentials) => invalid += 1,
            Err(AuthError::RateLimited) => limited += 1,
            other => panic!("unexpected login result: {:?}", other.map(|o| o.token)),
        }
    }

    assert_eq!(invalid, settings.rate_limit.max_attempts as usize);
    assert_eq!(limited, 30 - invalid);

    // The right secret no longer gets a password check.
    let err = assert_err!(service.login(Some(ID), Some(SECRET), "127.0.0.1").await);
    assert_eq!(err, AuthError::RateLimited);
}
