//! Profile repository

use serde::{Deserialize, Serialize};

use super::DbPool;
use crate::Result;

/// What we know about a user, upserted by operators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Preferred language tag (e.g. "en", "ja")
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// What the user is trying to achieve (e.g. "cast a commercial")
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub updated_at_ms: i64,
}

impl Profile {
    /// Create an empty profile for a user
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }
}

/// Profile repository
#[derive(Debug, Clone)]
pub struct ProfileRepo {
    pool: DbPool,
}

impl ProfileRepo {
    /// Create a new profile repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fetch a profile by user id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, user_id: &str) -> Result<Option<Profile>> {
        let conn = super::conn(&self.pool)?;
        let result = conn.query_row(
            "SELECT user_id, display_name, language, interests, location, goal, updated_at_ms FROM profiles WHERE user_id = ?1",
            [user_id],
            |row| {
                let interests: String = row.get(3)?;
                Ok(Profile {
                    user_id: row.get(0)?,
                    display_name: row.get(1)?,
                    language: row.get(2)?,
                    interests: serde_json::from_str(&interests).unwrap_or_default(),
                    location: row.get(4)?,
                    goal: row.get(5)?,
                    updated_at_ms: row.get(6)?,
                })
            },
        );

        match result {
            Ok(profile) => Ok(Some(profile)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert or replace a profile
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn upsert(&self, profile: &Profile) -> Result<()> {
        let conn = super::conn(&self.pool)?;
        let interests = serde_json::to_string(&profile.interests)?;

        conn.execute(
            r"INSERT INTO profiles (user_id, display_name, language, interests, location, goal, updated_at_ms)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
              ON CONFLICT(user_id) DO UPDATE SET
                display_name = excluded.display_name,
                language = excluded.language,
                interests = excluded.interests,
                location = excluded.location,
                goal = excluded.goal,
                updated_at_ms = excluded.updated_at_ms",
            rusqlite::params![
                profile.user_id,
                profile.display_name,
                profile.language,
                interests,
                profile.location,
                profile.goal,
                profile.updated_at_ms,
            ],
        )?;

        Ok(())
    }
}
