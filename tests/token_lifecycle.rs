//! Refresh-token lifecycle properties, exercised through the public API
//! against the in-memory store.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::Secret;
use std::sync::Arc;
use uuid::Uuid;

use trainer_auth::auth::{
    hash_token, KeyRing, PrincipalKeys, PrincipalType, Role, TokenCodec, TokenError, TokenKind,
    TokenPair, TokenService, TokenSubject,
};
use trainer_auth::store::{
    MemoryRefreshTokenStore, NewRefreshToken, RefreshTokenRecord, RefreshTokenStore, StoreError,
};

const ISSUER: &str = "trainer-test";

fn principal_keys(prefix: &str, refresh_days: i64) -> PrincipalKeys {
    PrincipalKeys {
        access_secret: Secret::new(format!("{}-access-secret-{}", prefix, Uuid::new_v4())),
        refresh_secret: Secret::new(format!("{}-refresh-secret-{}", prefix, Uuid::new_v4())),
        refresh_ttl: Duration::days(refresh_days),
    }
}

/// Fresh per-test secrets
fn key_ring() -> KeyRing {
    KeyRing::new(
        Duration::hours(1),
        principal_keys("player", 7),
        principal_keys("admin", 30),
    )
}

struct TestTokens {
    service: TokenService,
    store: Arc<MemoryRefreshTokenStore>,
    keys: KeyRing,
    codec: TokenCodec,
}

impl TestTokens {
    fn new() -> Self {
        let store = Arc::new(MemoryRefreshTokenStore::new());
        let keys = key_ring();
        let codec = TokenCodec::new(ISSUER);
        let service = TokenService::new(store.clone(), codec.clone(), keys.clone());
        Self {
            service,
            store,
            keys,
            codec,
        }
    }

    async fn login(&self, user_id: Uuid) -> TokenPair {
        self.service
            .create_token_pair(user_id, "player1@example.com", Role::Player, PrincipalType::Player)
            .await
            .expect("Failed to create token pair")
    }

    async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        self.service
            .refresh_token_pair(refresh_token, PrincipalType::Player)
            .await
    }

    fn family(&self, refresh_token: &str) -> String {
        self.codec
            .verify(refresh_token, &self.keys.keys(PrincipalType::Player).refresh_secret)
            .expect("Failed to verify refresh token")
            .family
            .expect("refresh token carries a family")
    }

    async fn record(&self, refresh_token: &str) -> RefreshTokenRecord {
        self.store
            .find_by_hash(&hash_token(refresh_token))
            .await
            .unwrap()
            .expect("record exists")
    }

    async fn live_records(&self, family: &str) -> Vec<RefreshTokenRecord> {
        let now = Utc::now();
        self.store
            .find_family(family)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.is_live_at(now))
            .collect()
    }
}

/// Any contact with storage fails the test
struct PanickingStore;

#[async_trait]
impl RefreshTokenStore for PanickingStore {
    async fn create(&self, _: NewRefreshToken) -> Result<RefreshTokenRecord, StoreError> {
        panic!("store touched: create")
    }
    async fn find_by_hash(&self, _: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        panic!("store touched: find_by_hash")
    }
    async fn revoke(&self, _: Uuid) -> Result<bool, StoreError> {
        panic!("store touched: revoke")
    }
    async fn revoke_family(&self, _: &str) -> Result<u64, StoreError> {
        panic!("store touched: revoke_family")
    }
    async fn revoke_all_for_subject(&self, _: Uuid) -> Result<u64, StoreError> {
        panic!("store touched: revoke_all_for_subject")
    }
    async fn find_family(&self, _: &str) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        panic!("store touched: find_family")
    }
}

#[tokio::test]
async fn login_starts_family_with_one_live_record() {
    let tokens = TestTokens::new();

    let pair = tokens.login(Uuid::new_v4()).await;
    let family = tokens.family(&pair.refresh_token);

    let live = tokens.live_records(&family).await;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].token_hash, hash_token(&pair.refresh_token));
}

#[tokio::test]
async fn separate_logins_get_separate_families() {
    let tokens = TestTokens::new();
    let user_id = Uuid::new_v4();

    let phone = tokens.login(user_id).await;
    let tablet = tokens.login(user_id).await;

    assert_ne!(tokens.family(&phone.refresh_token), tokens.family(&tablet.refresh_token));
}

#[tokio::test]
async fn rotation_preserves_family() {
    let tokens = TestTokens::new();
    let mut current = tokens.login(Uuid::new_v4()).await;
    let family = tokens.family(&current.refresh_token);

    for _ in 0..3 {
        let next = tokens.rotate(&current.refresh_token).await.unwrap();

        assert_eq!(tokens.family(&next.refresh_token), family);
        assert!(tokens.record(&current.refresh_token).await.is_revoked());
        let live = tokens.live_records(&family).await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].token_hash, hash_token(&next.refresh_token));

        current = next;
    }

    assert_eq!(tokens.store.find_family(&family).await.unwrap().len(), 4);
}

#[tokio::test]
async fn reuse_revokes_every_record_in_family() {
    let tokens = TestTokens::new();
    let first = tokens.login(Uuid::new_v4()).await;
    let family = tokens.family(&first.refresh_token);
    let second = tokens.rotate(&first.refresh_token).await.unwrap();

    let replay = tokens.rotate(&first.refresh_token).await;

    assert_eq!(replay, Err(TokenError::TokenReuseDetected));
    assert!(tokens.live_records(&family).await.is_empty());
    assert!(tokens.record(&second.refresh_token).await.is_revoked());
}

#[tokio::test]
async fn reuse_after_two_rotations_revokes_latest() {
    let tokens = TestTokens::new();
    let login = tokens.login(Uuid::new_v4()).await;
    let family = tokens.family(&login.refresh_token);
    let first_rotation = tokens.rotate(&login.refresh_token).await.unwrap();
    let latest = tokens.rotate(&first_rotation.refresh_token).await.unwrap();

    // Replay the first rotation's output instead of the latest
    let replay = tokens.rotate(&first_rotation.refresh_token).await;

    assert_eq!(replay, Err(TokenError::TokenReuseDetected));
    assert!(tokens.record(&latest.refresh_token).await.is_revoked());
    assert!(tokens.live_records(&family).await.is_empty());
    // The never-reused latest token is dead too
    assert_eq!(
        tokens.rotate(&latest.refresh_token).await,
        Err(TokenError::TokenReuseDetected)
    );
}

#[tokio::test]
async fn secrets_do_not_cross_principals_or_kinds() {
    let tokens = TestTokens::new();
    let subject = TokenSubject {
        id: Uuid::new_v4(),
        email: "player1@example.com".to_string(),
        role: Role::Player,
    };
    let player = tokens.keys.keys(PrincipalType::Player);
    let admin = tokens.keys.keys(PrincipalType::Admin);

    let sign = |kind, secret| {
        tokens
            .codec
            .sign(kind, &subject, Some("family"), secret, Duration::hours(1))
            .unwrap()
            .token
    };
    let player_refresh = sign(TokenKind::Refresh, &player.refresh_secret);
    let admin_refresh = sign(TokenKind::Refresh, &admin.refresh_secret);
    let player_access = sign(TokenKind::Access, &player.access_secret);
    let admin_access = sign(TokenKind::Access, &admin.access_secret);

    assert!(tokens.codec.verify(&player_refresh, &admin.refresh_secret).is_err());
    assert!(tokens.codec.verify(&admin_refresh, &player.refresh_secret).is_err());
    assert!(tokens.codec.verify(&player_access, &player.refresh_secret).is_err());
    assert!(tokens.codec.verify(&player_refresh, &player.access_secret).is_err());
    assert!(tokens.codec.verify(&admin_access, &admin.refresh_secret).is_err());
    assert!(tokens.codec.verify(&admin_refresh, &admin.access_secret).is_err());

    assert!(tokens.codec.verify(&player_refresh, &player.refresh_secret).is_ok());
    assert!(tokens.codec.verify(&admin_access, &admin.access_secret).is_ok());
}

#[tokio::test]
async fn player_refresh_token_rejected_by_admin_before_store_lookup() {
    let tokens = TestTokens::new();
    let pair = tokens.login(Uuid::new_v4()).await;

    let admin_side = TokenService::new(
        Arc::new(PanickingStore),
        tokens.codec.clone(),
        tokens.keys.clone(),
    );
    let result = admin_side
        .refresh_token_pair(&pair.refresh_token, PrincipalType::Admin)
        .await;

    assert_eq!(result, Err(TokenError::InvalidSignature));
}

#[tokio::test]
async fn stored_expiry_rejects_untouched_token() {
    let tokens = TestTokens::new();
    let user_id = Uuid::new_v4();
    let subject = TokenSubject {
        id: user_id,
        email: "player1@example.com".to_string(),
        role: Role::Player,
    };
    let signed = tokens
        .codec
        .sign(
            TokenKind::Refresh,
            &subject,
            Some("expired-family"),
            &tokens.keys.keys(PrincipalType::Player).refresh_secret,
            Duration::days(7),
        )
        .unwrap();
    let now = Utc::now();
    tokens
        .store
        .insert_record(RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash_token(&signed.token),
            family_id: "expired-family".to_string(),
            expires_at: now - Duration::seconds(1),
            revoked_at: None,
            created_at: now - Duration::days(8),
        })
        .unwrap();

    assert_eq!(tokens.rotate(&signed.token).await, Err(TokenError::TokenExpired));
    // Expiry does not revoke
    assert!(!tokens.record(&signed.token).await.is_revoked());
}

#[tokio::test]
async fn logout_revokes_family_including_siblings() {
    let tokens = TestTokens::new();
    let user_id = Uuid::new_v4();
    let pair = tokens.login(user_id).await;
    let family = tokens.family(&pair.refresh_token);

    // A second live token in the same family
    let sibling = tokens
        .codec
        .sign(
            TokenKind::Refresh,
            &TokenSubject {
                id: user_id,
                email: "player1@example.com".to_string(),
                role: Role::Player,
            },
            Some(&family),
            &tokens.keys.keys(PrincipalType::Player).refresh_secret,
            Duration::days(7),
        )
        .unwrap();
    tokens
        .store
        .create(NewRefreshToken {
            user_id,
            token_hash: hash_token(&sibling.token),
            family_id: family.clone(),
            expires_at: sibling.expires_at,
        })
        .await
        .unwrap();

    tokens.service.revoke_family_by_token(&pair.refresh_token).await.unwrap();

    assert!(tokens.live_records(&family).await.is_empty());
    assert!(tokens.rotate(&pair.refresh_token).await.is_err());
    assert!(tokens.rotate(&sibling.token).await.is_err());
}

#[tokio::test]
async fn logout_leaves_other_families_alone() {
    let tokens = TestTokens::new();
    let user_id = Uuid::new_v4();
    let phone = tokens.login(user_id).await;
    let tablet = tokens.login(user_id).await;

    tokens.service.revoke_family_by_token(&phone.refresh_token).await.unwrap();

    assert!(tokens.rotate(&tablet.refresh_token).await.is_ok());
}

#[tokio::test]
async fn revoke_all_for_subject_kills_every_family() {
    let tokens = TestTokens::new();
    let user_id = Uuid::new_v4();
    let other_user = tokens.login(Uuid::new_v4()).await;
    let phone = tokens.login(user_id).await;
    let tablet = tokens.login(user_id).await;
    let rotated = tokens.rotate(&tablet.refresh_token).await.unwrap();

    let revoked = tokens.service.revoke_all_for_subject(user_id).await.unwrap();

    assert_eq!(revoked, 2);
    for token in [&phone.refresh_token, &tablet.refresh_token, &rotated.refresh_token] {
        assert!(tokens.rotate(token).await.is_err());
    }
    assert!(tokens.rotate(&other_user.refresh_token).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_rotation_of_same_token_has_one_winner() {
    for _ in 0..20 {
        let tokens = TestTokens::new();
        let pair = tokens.login(Uuid::new_v4()).await;

        let a = {
            let service = tokens.service.clone();
            let token = pair.refresh_token.clone();
            tokio::spawn(async move { service.refresh_token_pair(&token, PrincipalType::Player).await })
        };
        let b = {
            let service = tokens.service.clone();
            let token = pair.refresh_token.clone();
            tokio::spawn(async move { service.refresh_token_pair(&token, PrincipalType::Player).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        let winners = results.iter().filter(|r| r.is_ok()).count();
        let reuse = results
            .iter()
            .filter(|r| **r == Err(TokenError::TokenReuseDetected))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(reuse, 1);
        assert!(tokens.record(&pair.refresh_token).await.is_revoked());
    }
}
