use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The key addressing one persona's tokens, mapping, and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonaScope {
    pub user_id: i64,
    pub persona_num: i32,
}

impl PersonaScope {
    pub fn new(user_id: i64, persona_num: i32) -> Self {
        Self {
            user_id,
            persona_num,
        }
    }
}

impl std::fmt::Display for PersonaScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user {} persona {}", self.user_id, self.persona_num)
    }
}

/// Whose token a row belongs to. Tokens never move between scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerScope {
    /// Legacy user-wide scope, kept for accounts linked before personas.
    User(i64),
    Persona(PersonaScope),
}

impl OwnerScope {
    pub fn user_id(&self) -> i64 {
        match self {
            OwnerScope::User(user_id) => *user_id,
            OwnerScope::Persona(scope) => scope.user_id,
        }
    }
}

/// A stored long-lived credential. Expiry is advisory metadata; real
/// invalidity is reported by the remote API and handled reactively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The persona → external business account binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMapping {
    pub account_id: String,
    pub username: Option<String>,
    /// The parent page the business account hangs off.
    pub page_id: String,
}

/// One harvested analytics row; unique per `(user, persona, date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySnapshot {
    #[serde(flatten)]
    pub scope: PersonaScope,
    pub account_id: String,
    pub date: NaiveDate,
    pub followers_count: i64,
    pub total_likes: i64,
    pub profile_views: i64,
    pub reach: i64,
    pub impressions: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaPoint {
    pub date: NaiveDate,
    pub value: i64,
}

/// Day-over-day movement for the two headline counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyDeltas {
    pub followers: Vec<DeltaPoint>,
    pub likes: Vec<DeltaPoint>,
}

/// A linkable account surfaced by the page listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub page_id: String,
    pub page_name: Option<String>,
    pub account_id: String,
    pub username: Option<String>,
}

/// What the persona directory exposes about a persona. CRUD lives in a
/// different subsystem; this is read-only context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaSummary {
    pub persona_num: i32,
    pub display_name: Option<String>,
    pub personality: Option<String>,
}
