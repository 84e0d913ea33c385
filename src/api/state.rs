use std::sync::Arc;

use crate::{
    auth::{AuthGate, PasswordHasher, TokenIssuer},
    store::Store,
};

/// Everything a handler needs, shared through an `Extension` layer.
#[derive(Clone, Debug)]
pub struct AuthState {
    store: Arc<dyn Store>,
    hasher: PasswordHasher,
    tokens: Arc<TokenIssuer>,
    gate: AuthGate,
}

impl AuthState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, hasher: PasswordHasher, tokens: TokenIssuer) -> Self {
        let tokens = Arc::new(tokens);
        let gate = AuthGate::new(store.clone(), tokens.clone());

        Self {
            store,
            hasher,
            tokens,
            gate,
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    #[must_use]
    pub const fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    #[must_use]
    pub const fn gate(&self) -> &AuthGate {
        &self.gate
    }
}
