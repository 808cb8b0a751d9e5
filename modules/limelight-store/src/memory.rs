//! In-memory store implementations for tests. No database required.
//! Thread-safe; shared behind `Arc` so tests can assert on state after
//! driving the code under test.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use limelight_common::{
    AccountMapping, AuthToken, DailySnapshot, OwnerScope, PersonaScope, PersonaSummary, Result,
};
use serde_json::Value;

use crate::accounts::MappingStore;
use crate::legacy::parse_legacy_mapping;
use crate::personas::PersonaDirectory;
use crate::seen::SeenEventStore;
use crate::snapshots::SnapshotStore;
use crate::tokens::{TokenLookup, TokenStore};

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum PersonaEntry {
    Active(AuthToken),
    Revoked,
}

#[derive(Default)]
pub struct MemoryTokenStore {
    users: Mutex<HashMap<i64, AuthToken>>,
    personas: Mutex<HashMap<(i64, i32), PersonaEntry>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn store(
        &self,
        scope: &OwnerScope,
        token: &str,
        expires_in: Option<i64>,
    ) -> Result<()> {
        let auth = AuthToken {
            token: token.to_string(),
            expires_at: expires_in
                .filter(|secs| *secs > 0)
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        };
        match scope {
            OwnerScope::User(user_id) => {
                self.users.lock().unwrap().insert(*user_id, auth);
            }
            OwnerScope::Persona(scope) => {
                self.personas
                    .lock()
                    .unwrap()
                    .insert((scope.user_id, scope.persona_num), PersonaEntry::Active(auth));
            }
        }
        Ok(())
    }

    async fn lookup(&self, scope: &OwnerScope) -> Result<TokenLookup> {
        Ok(match scope {
            OwnerScope::User(user_id) => match self.users.lock().unwrap().get(user_id) {
                Some(token) => TokenLookup::Found(token.clone()),
                None => TokenLookup::Missing,
            },
            OwnerScope::Persona(scope) => {
                match self
                    .personas
                    .lock()
                    .unwrap()
                    .get(&(scope.user_id, scope.persona_num))
                {
                    Some(PersonaEntry::Active(token)) => TokenLookup::Found(token.clone()),
                    Some(PersonaEntry::Revoked) => TokenLookup::Revoked,
                    None => TokenLookup::Missing,
                }
            }
        })
    }

    async fn revoke_persona(&self, scope: &PersonaScope) -> Result<()> {
        self.personas
            .lock()
            .unwrap()
            .insert((scope.user_id, scope.persona_num), PersonaEntry::Revoked);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mappings
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryMappingStore {
    rows: Mutex<HashMap<(i64, i32), AccountMapping>>,
    legacy_docs: Mutex<HashMap<(i64, i32), Value>>,
}

impl MemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a pre-migration persona document for legacy-read tests.
    pub fn seed_legacy(&self, scope: &PersonaScope, parameters: Value) {
        self.legacy_docs
            .lock()
            .unwrap()
            .insert((scope.user_id, scope.persona_num), parameters);
    }
}

#[async_trait]
impl MappingStore for MemoryMappingStore {
    async fn link(&self, scope: &PersonaScope, mapping: &AccountMapping) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .insert((scope.user_id, scope.persona_num), mapping.clone());
        Ok(())
    }

    async fn resolve(&self, scope: &PersonaScope) -> Result<Option<AccountMapping>> {
        let key = (scope.user_id, scope.persona_num);
        if let Some(mapping) = self.rows.lock().unwrap().get(&key) {
            return Ok(Some(mapping.clone()));
        }
        Ok(self
            .legacy_docs
            .lock()
            .unwrap()
            .get(&key)
            .and_then(parse_legacy_mapping))
    }

    async fn unlink(&self, scope: &PersonaScope) -> Result<()> {
        let key = (scope.user_id, scope.persona_num);
        self.rows.lock().unwrap().remove(&key);
        if let Some(doc) = self.legacy_docs.lock().unwrap().get_mut(&key) {
            if let Some(map) = doc.as_object_mut() {
                map.remove(crate::legacy::LEGACY_ACCOUNT_KEY);
            }
        }
        Ok(())
    }

    async fn linked_scopes(&self) -> Result<Vec<PersonaScope>> {
        let mut keys: Vec<(i64, i32)> = self.rows.lock().unwrap().keys().copied().collect();
        keys.sort_unstable();
        Ok(keys
            .into_iter()
            .map(|(user_id, persona_num)| PersonaScope::new(user_id, persona_num))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemorySnapshotStore {
    rows: Mutex<BTreeMap<(i64, i32, NaiveDate), DailySnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn get(&self, scope: &PersonaScope, date: NaiveDate) -> Option<DailySnapshot> {
        self.rows
            .lock()
            .unwrap()
            .get(&(scope.user_id, scope.persona_num, date))
            .cloned()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn upsert(&self, snapshot: &DailySnapshot) -> Result<()> {
        self.rows.lock().unwrap().insert(
            (
                snapshot.scope.user_id,
                snapshot.scope.persona_num,
                snapshot.date,
            ),
            snapshot.clone(),
        );
        Ok(())
    }

    async fn range(&self, scope: &PersonaScope, since: NaiveDate) -> Result<Vec<DailySnapshot>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.scope == *scope && s.date >= since)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Seen events
// ---------------------------------------------------------------------------

struct SeenRow {
    #[allow(dead_code)]
    user_id: i64,
    #[allow(dead_code)]
    persona_num: Option<i32>,
    touches: u32,
}

#[derive(Default)]
pub struct MemorySeenStore {
    rows: Mutex<HashMap<String, SeenRow>>,
}

impl MemorySeenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// How many times an id has been acknowledged (for idempotency tests).
    pub fn touches(&self, id: &str) -> u32 {
        self.rows
            .lock()
            .unwrap()
            .get(id)
            .map(|row| row.touches)
            .unwrap_or(0)
    }
}

#[async_trait]
impl SeenEventStore for MemorySeenStore {
    async fn ack(
        &self,
        ids: &[String],
        user_id: i64,
        persona_num: Option<i32>,
    ) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut acknowledged = 0u64;
        for id in ids.iter().filter(|id| !id.is_empty()) {
            rows.entry(id.clone())
                .and_modify(|row| row.touches += 1)
                .or_insert(SeenRow {
                    user_id,
                    persona_num,
                    touches: 1,
                });
            acknowledged += 1;
        }
        Ok(acknowledged)
    }

    async fn seen_set(&self, ids: &[String]) -> Result<HashSet<String>> {
        let rows = self.rows.lock().unwrap();
        Ok(ids
            .iter()
            .filter(|id| rows.contains_key(*id))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Persona directory
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryPersonaDirectory {
    personas: Mutex<HashMap<i64, Vec<PersonaSummary>>>,
}

impl MemoryPersonaDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, user_id: i64, summary: PersonaSummary) {
        self.personas
            .lock()
            .unwrap()
            .entry(user_id)
            .or_default()
            .push(summary);
    }
}

#[async_trait]
impl PersonaDirectory for MemoryPersonaDirectory {
    async fn resolve_ref(&self, user_id: i64, persona_ref: &str) -> Result<Option<i32>> {
        let Ok(persona_num) = persona_ref.trim().parse::<i32>() else {
            return Ok(None);
        };
        Ok(self
            .personas
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|list| list.iter().any(|p| p.persona_num == persona_num))
            .unwrap_or(false)
            .then_some(persona_num))
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<PersonaSummary>> {
        Ok(self
            .personas
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}
