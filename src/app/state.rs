//! Application state shared across routes and sessions

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::config::Config;
use crate::game::{GameKind, MatchRegistry};
use crate::store::{KeyValueStore, MemoryStore, ProfileStore, SupabaseClient};
use crate::util::rate_limit::{create_limiter, Limiter, MATCH_CREATE_RATE_LIMIT};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Replicated match records
    pub store: Arc<dyn KeyValueStore>,
    memory: Arc<MemoryStore>,
    /// Names and ratings; `None` when Supabase is not configured
    pub profile_store: Option<ProfileStore>,
    pub match_registry: Arc<MatchRegistry>,
    pub create_limiter: Arc<Limiter>,
    seed_secret: u64,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let profile_store = config.supabase.as_ref().map(|supabase| {
            ProfileStore::new(SupabaseClient::new(&supabase.url, &supabase.service_role_key))
        });
        if profile_store.is_none() {
            info!("Supabase not configured, names and ratings are disabled");
        }

        let seed_secret = config.match_seed.unwrap_or_else(rand::random);

        let memory = Arc::new(MemoryStore::new());

        Self {
            config,
            store: memory.clone(),
            memory,
            profile_store,
            match_registry: Arc::new(MatchRegistry::new()),
            create_limiter: create_limiter(MATCH_CREATE_RATE_LIMIT),
            seed_secret,
        }
    }

    /// Match records with at least one live subscriber
    pub fn watched_paths(&self) -> usize {
        self.memory.watched_paths()
    }

    /// Deterministic RNG for one random draw of a match. `salt` separates
    /// draws within the same match (deal, each new target).
    pub fn match_rng(&self, game: GameKind, match_id: &str, salt: u64) -> ChaCha8Rng {
        let mut hasher = Sha256::new();
        hasher.update(game.store_key().as_bytes());
        hasher.update([0]);
        hasher.update(match_id.as_bytes());
        hasher.update(salt.to_le_bytes());
        hasher.update(self.seed_secret.to_le_bytes());
        ChaCha8Rng::from_seed(hasher.finalize().into())
    }
}
