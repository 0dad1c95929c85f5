use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// The authenticated identity attached to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Ulid,
    pub role: Role,
}

/// Resolves a bearer token to the actor it authenticates. Token issuance
/// lives outside this service; the engine only ever sees an `Actor`.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Option<Actor>;
}

/// Static token registry loaded from configuration at startup.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    tokens: HashMap<String, Actor>,
}

impl TokenRegistry {
    pub fn new(entries: impl IntoIterator<Item = (String, Actor)>) -> Self {
        Self {
            tokens: entries.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Authenticator for TokenRegistry {
    async fn authenticate(&self, token: &str) -> Option<Actor> {
        self.tokens.get(token).copied()
    }
}
