//! Principal-keyed secret lookup.

use chrono::Duration;
use secrecy::Secret;

use crate::auth::claims::PrincipalType;
use crate::configuration::JwtSettings;

/// Secret pair and refresh lifetime for one principal type
#[derive(Clone)]
pub struct PrincipalKeys {
    pub access_secret: Secret<String>,
    pub refresh_secret: Secret<String>,
    pub refresh_ttl: Duration,
}

/// Every signing secret the service knows, keyed by principal type
#[derive(Clone)]
pub struct KeyRing {
    access_ttl: Duration,
    player: PrincipalKeys,
    admin: PrincipalKeys,
}

impl KeyRing {
    pub fn new(access_ttl: Duration, player: PrincipalKeys, admin: PrincipalKeys) -> Self {
        Self {
            access_ttl,
            player,
            admin,
        }
    }

    pub fn from_settings(settings: &JwtSettings) -> Self {
        let keys = |secrets: &crate::configuration::PrincipalSecrets| PrincipalKeys {
            access_secret: secrets.access_secret.clone(),
            refresh_secret: secrets.refresh_secret.clone(),
            refresh_ttl: Duration::seconds(secrets.refresh_token_expiry),
        };

        Self::new(
            Duration::seconds(settings.access_token_expiry),
            keys(&settings.player),
            keys(&settings.admin),
        )
    }

    pub fn keys(&self, principal: PrincipalType) -> &PrincipalKeys {
        match principal {
            PrincipalType::Player => &self.player,
            PrincipalType::Admin => &self.admin,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("access_ttl", &self.access_ttl)
            .field("player_refresh_ttl", &self.player.refresh_ttl)
            .field("admin_refresh_ttl", &self.admin.refresh_ttl)
            .finish()
    }
}
