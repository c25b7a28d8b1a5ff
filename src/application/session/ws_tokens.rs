//! Short-lived, single-use bootstrap tokens for the real-time channel.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::foundation::OwnerId;

/// Default lifetime of a bootstrap token.
pub const DEFAULT_WS_TOKEN_TTL: Duration = Duration::from_secs(30);

struct IssuedToken {
    owner: OwnerId,
    expires_at: Instant,
}

/// Issues tokens bound to an identity; redeeming one deletes it.
pub struct WsTokenStore {
    ttl: Duration,
    tokens: Mutex<HashMap<String, IssuedToken>>,
}

impl WsTokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Mints a token for `owner`. Expired tokens are purged on the way.
    pub async fn issue(&self, owner: OwnerId) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let now = Instant::now();
        let mut tokens = self.tokens.lock().await;
        tokens.retain(|_, issued| issued.expires_at > now);
        tokens.insert(
            token.clone(),
            IssuedToken {
                owner,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    /// Consumes a token, returning its owner if it was valid and unexpired.
    pub async fn redeem(&self, token: &str) -> Option<OwnerId> {
        let issued = self.tokens.lock().await.remove(token)?;
        (issued.expires_at > Instant::now()).then_some(issued.owner)
    }

    pub async fn outstanding(&self) -> usize {
        self.tokens.lock().await.len()
    }
}

impl Default for WsTokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_WS_TOKEN_TTL)
    }
}
