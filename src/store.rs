use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::PredictionResult;

pub const RESULT_KEY: &str = "formData";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    #[error("could not serialise prediction result: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    #[error("session {0} already has a submission in flight")]
    InFlight(SessionId),
}

#[derive(Debug)]
struct Entry {
    text: String,
    written_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Session {
    entries: HashMap<String, Entry>,
    in_flight: bool,
    last_seen: DateTime<Utc>,
}

impl Session {
    fn opened_at(now: DateTime<Utc>) -> Self {
        Self {
            entries: HashMap::new(),
            in_flight: false,
            last_seen: now,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Purged {
    pub results: usize,
    pub sessions: usize,
}

impl Purged {
    pub fn is_empty(&self) -> bool {
        self.results == 0 && self.sessions == 0
    }
}

/// Values are kept as serialised text; one that no longer parses reads back as absent.
#[derive(Debug)]
pub struct ResultStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    ttl: Option<Duration>,
    session_idle: Duration,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new(None, Duration::hours(1))
    }
}

impl ResultStore {
    pub fn new(ttl: Option<Duration>, session_idle: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            session_idle,
        }
    }

    pub fn create_session(&self) -> SessionId {
        let id = SessionId::new();
        self.sessions.lock().insert(id, Session::opened_at(Utc::now()));
        id
    }

    pub fn contains(&self, session: SessionId) -> bool {
        match self.sessions.lock().get_mut(&session) {
            Some(slot) => {
                slot.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn end_session(&self, session: SessionId) -> bool {
        self.sessions.lock().remove(&session).is_some()
    }

    pub fn put(&self, session: SessionId, result: &PredictionResult) -> Result<(), StoreError> {
        let text = serde_json::to_string(result)?;
        self.put_text(session, text)
    }

    fn put_text(&self, session: SessionId, text: String) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock();
        let slot = sessions
            .get_mut(&session)
            .ok_or(StoreError::UnknownSession(session))?;
        slot.last_seen = now;
        slot.entries.insert(
            RESULT_KEY.to_string(),
            Entry {
                text,
                written_at: now,
            },
        );
        Ok(())
    }

    pub fn get(&self, session: SessionId) -> Option<PredictionResult> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock();
        let slot = sessions.get_mut(&session)?;
        slot.last_seen = now;
        let entry = slot.entries.get(RESULT_KEY)?;

        if !self.is_expired(entry, now) {
            return match serde_json::from_str(&entry.text) {
                Ok(result) => Some(result),
                Err(err) => {
                    tracing::warn!(%session, error = %err, "stored prediction result is unreadable");
                    None
                }
            };
        }

        slot.entries.remove(RESULT_KEY);
        None
    }

    /// Drops expired results, then whole sessions idle past `session_idle`.
    /// A session with a submission in flight is never dropped.
    pub fn purge_expired(&self) -> Purged {
        let now = Utc::now();
        let mut purged = Purged::default();
        let mut sessions = self.sessions.lock();

        for slot in sessions.values_mut() {
            let before = slot.entries.len();
            slot.entries.retain(|_, entry| !self.is_expired(entry, now));
            purged.results += before - slot.entries.len();
        }

        let before = sessions.len();
        sessions.retain(|_, slot| slot.in_flight || now - slot.last_seen < self.session_idle);
        purged.sessions = before - sessions.len();
        purged
    }

    pub fn begin_submission(
        self: &Arc<Self>,
        session: SessionId,
    ) -> Result<InFlightGuard, GuardError> {
        let mut sessions = self.sessions.lock();
        let slot = sessions
            .get_mut(&session)
            .ok_or(GuardError::UnknownSession(session))?;
        if slot.in_flight {
            return Err(GuardError::InFlight(session));
        }
        slot.in_flight = true;
        slot.last_seen = Utc::now();

        Ok(InFlightGuard {
            store: Arc::clone(self),
            session,
        })
    }

    fn is_expired(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => now - entry.written_at >= ttl,
            None => false,
        }
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    store: Arc<ResultStore>,
    session: SessionId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(slot) = self.store.sessions.lock().get_mut(&self.session) {
            slot.in_flight = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Prediction;

    fn result_of(entries: &[(&str, u8, f64)]) -> PredictionResult {
        let mut result = PredictionResult::default();
        for (model, label, probability) in entries {
            result
                .insert(
                    *model,
                    Prediction {
                        label: *label,
                        probability: *probability,
                    },
                )
                .unwrap();
        }
        result
    }

    #[test]
    fn get_is_absent_before_any_put() {
        let store = ResultStore::default();
        let session = store.create_session();
        assert_eq!(store.get(session), None);
        assert_eq!(store.get(SessionId::new()), None);
    }

    #[test]
    fn put_overwrites_the_previous_result() {
        let store = ResultStore::default();
        let session = store.create_session();
        let first = result_of(&[("modelA", 1, 0.9)]);
        let second = result_of(&[("modelB", 0, 0.1), ("modelC", 1, 0.6)]);

        store.put(session, &first).unwrap();
        assert_eq!(store.get(session), Some(first));
        store.put(session, &second).unwrap();
        assert_eq!(store.get(session), Some(second.clone()));
        assert_eq!(store.get(session), Some(second));
    }

    #[test]
    fn sessions_do_not_see_each_other() {
        let store = ResultStore::default();
        let a = store.create_session();
        let b = store.create_session();
        store.put(a, &result_of(&[("modelA", 1, 0.5)])).unwrap();
        assert!(store.get(a).is_some());
        assert_eq!(store.get(b), None);
    }

    #[test]
    fn put_into_unknown_session_fails() {
        let store = ResultStore::default();
        let err = store.put(SessionId::new(), &PredictionResult::default());
        assert!(matches!(err, Err(StoreError::UnknownSession(_))));
    }

    #[test]
    fn unparseable_value_reads_as_absent() {
        let store = ResultStore::default();
        let session = store.create_session();
        store.put_text(session, "{not json".to_string()).unwrap();
        assert_eq!(store.get(session), None);
        store
            .put_text(session, r#"{"modelA":[3,0.5]}"#.to_string())
            .unwrap();
        assert_eq!(store.get(session), None);
    }

    #[test]
    fn ending_a_session_discards_its_result() {
        let store = ResultStore::default();
        let session = store.create_session();
        store.put(session, &result_of(&[("modelA", 1, 0.5)])).unwrap();
        assert!(store.end_session(session));
        assert!(!store.end_session(session));
        assert_eq!(store.get(session), None);
    }

    #[test]
    fn expired_results_are_absent_and_purged() {
        let store = ResultStore::new(Some(Duration::zero()), Duration::hours(1));
        let session = store.create_session();
        store.put(session, &result_of(&[("modelA", 1, 0.5)])).unwrap();
        assert_eq!(
            store.purge_expired(),
            Purged {
                results: 1,
                sessions: 0
            }
        );
        store.put(session, &result_of(&[("modelA", 1, 0.5)])).unwrap();
        assert_eq!(store.get(session), None);
        assert!(store.purge_expired().is_empty());
        assert!(store.contains(session));
    }

    #[test]
    fn fresh_results_survive_a_ttl() {
        let store = ResultStore::new(Some(Duration::hours(1)), Duration::hours(1));
        let session = store.create_session();
        store.put(session, &result_of(&[("modelA", 1, 0.5)])).unwrap();
        assert!(store.purge_expired().is_empty());
        assert!(store.get(session).is_some());
    }

    #[test]
    fn idle_sessions_are_dropped_whole() {
        let store = ResultStore::new(Some(Duration::zero()), Duration::zero());
        for _ in 0..1000 {
            let session = store.create_session();
            store.put(session, &result_of(&[("modelA", 1, 0.5)])).unwrap();
        }

        let purged = store.purge_expired();

        assert_eq!(purged.results, 1000);
        assert_eq!(purged.sessions, 1000);
        assert_eq!(store.sessions.lock().len(), 0);
    }

    #[test]
    fn idle_sessions_go_even_without_a_result_ttl() {
        let store = ResultStore::new(None, Duration::zero());
        let session = store.create_session();
        store.put(session, &result_of(&[("modelA", 1, 0.5)])).unwrap();

        assert_eq!(store.purge_expired().sessions, 1);
        assert!(!store.contains(session));
        assert_eq!(store.sessions.lock().len(), 0);
    }

    #[test]
    fn recently_used_sessions_survive_the_purge() {
        let store = ResultStore::default();
        let session = store.create_session();
        store.put(session, &result_of(&[("modelA", 1, 0.5)])).unwrap();
        assert!(store.purge_expired().is_empty());
        assert!(store.get(session).is_some());
    }

    #[test]
    fn a_pending_submission_keeps_an_idle_session() {
        let store = Arc::new(ResultStore::new(None, Duration::zero()));
        let session = store.create_session();
        let guard = store.begin_submission(session).unwrap();

        assert_eq!(store.purge_expired().sessions, 0);
        drop(guard);
        assert_eq!(store.purge_expired().sessions, 1);
    }

    #[test]
    fn overlapping_submissions_are_rejected_until_the_guard_drops() {
        let store = Arc::new(ResultStore::default());
        let session = store.create_session();

        let guard = store.begin_submission(session).unwrap();
        assert!(matches!(
            store.begin_submission(session),
            Err(GuardError::InFlight(_))
        ));
        let other = store.create_session();
        assert!(store.begin_submission(other).is_ok());

        drop(guard);
        assert!(store.begin_submission(session).is_ok());
        assert!(matches!(
            store.begin_submission(SessionId::new()),
            Err(GuardError::UnknownSession(_))
        ));
    }

    #[test]
    fn session_ids_parse_from_their_display_form() {
        let id = SessionId::new();
        assert_eq!(id.to_string().parse::<SessionId>().unwrap(), id);
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }
}
