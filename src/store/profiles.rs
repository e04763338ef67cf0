//! User profiles: display names at match start, rating deltas at match end

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};
use crate::game::{rating, GameKind, UNKNOWN_PLAYER};

/// User profile row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: Option<String>,
    pub uno_elo: Option<i32>,
    pub aow_elo: Option<i32>,
    pub stt_elo: Option<i32>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl UserProfile {
    /// Username, falling back to email, then to the placeholder
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| UNKNOWN_PLAYER.to_string())
    }

    /// Stored rating for a game, default when never played
    pub fn rating(&self, game: GameKind) -> i32 {
        let stored = match game {
            GameKind::Cards => self.uno_elo,
            GameKind::Skirmish => self.aow_elo,
            GameKind::Archery => self.stt_elo,
        };
        stored.unwrap_or(rating::DEFAULT_RATING)
    }
}

/// Rating write for one game column
#[derive(Debug, Clone, Serialize)]
struct RatingUpsert {
    id: Uuid,
    #[serde(flatten)]
    column: RatingColumn,
}

#[derive(Debug, Clone, Serialize)]
struct RatingColumn {
    #[serde(skip_serializing_if = "Option::is_none")]
    uno_elo: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aow_elo: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stt_elo: Option<i32>,
}

impl RatingColumn {
    fn for_game(game: GameKind, value: i32) -> Self {
        let mut column = Self {
            uno_elo: None,
            aow_elo: None,
            stt_elo: None,
        };
        match game {
            GameKind::Cards => column.uno_elo = Some(value),
            GameKind::Skirmish => column.aow_elo = Some(value),
            GameKind::Archery => column.stt_elo = Some(value),
        }
        column
    }
}

/// Profile store operations
#[derive(Clone)]
pub struct ProfileStore {
    client: SupabaseClient,
}

impl ProfileStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Get a user profile by ID
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, SupabaseError> {
        let query = format!("id=eq.{}", user_id);
        self.client.get_one("profiles", &query).await
    }

    /// Display name for a participant; lookup failures degrade to the placeholder
    pub async fn display_name(&self, user_id: Uuid) -> String {
        match self.get_profile(user_id).await {
            Ok(Some(profile)) => profile.display_name(),
            Ok(None) => UNKNOWN_PLAYER.to_string(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to fetch profile");
                UNKNOWN_PLAYER.to_string()
            }
        }
    }

    /// Read-modify-write a rating column. Returns the new rating.
    pub async fn apply_rating_change(
        &self,
        user_id: Uuid,
        game: GameKind,
        change: i32,
    ) -> Result<i32, SupabaseError> {
        let current = self
            .get_profile(user_id)
            .await?
            .map(|p| p.rating(game))
            .unwrap_or(rating::DEFAULT_RATING);
        let updated = rating::apply_change(game, current, change);

        let row = RatingUpsert {
            id: user_id,
            column: RatingColumn::for_game(game, updated),
        };
        self.client.upsert("profiles", &row, "id").await?;

        info!(
            user_id = %user_id,
            game = %game,
            from = current,
            to = updated,
            "Rating updated"
        );
        Ok(updated)
    }
}
