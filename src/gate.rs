use crate::error::{DashboardError, Result};
use crate::record::RecordTable;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// Password check that precedes everything else on the page
///
/// The shared secret is hashed with Argon2 at construction, so the plaintext
/// is not held after startup and comparisons go through the hash verifier.
pub struct Gatekeeper {
    secret_hash: String,
}

impl Gatekeeper {
    /// # Errors
    /// * Returns an error if the secret is empty or hashing fails
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(DashboardError::Gate("secret cannot be empty".to_string()));
        }
        let salt = SaltString::generate(&mut OsRng);
        let secret_hash = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| DashboardError::Gate(e.to_string()))?
            .to_string();
        Ok(Gatekeeper { secret_hash })
    }

    /// Exact, case-sensitive comparison of `candidate` against the secret
    pub fn check(&self, candidate: &str) -> Result<()> {
        let parsed = PasswordHash::new(&self.secret_hash)
            .map_err(|e| DashboardError::Gate(e.to_string()))?;

        match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
            Ok(()) => {
                info!("password accepted");
                Ok(())
            }
            Err(_) => {
                warn!("password rejected");
                Err(DashboardError::Rejected)
            }
        }
    }
}

/// Per-visitor state behind the session cookie
#[derive(Debug, Clone)]
pub struct Session {
    /// Time when the session expires
    pub expires_at: SystemTime,

    /// Dataset uploaded in this session, if any
    pub dataset: Option<Arc<RecordTable>>,
}

/// Sessions opened by a successful password check
///
/// Lives inside the application state and is handed to each request, so
/// there is no process-wide "authenticated" flag.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(SESSION_DURATION))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Open a session and return its id
    pub fn create(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        let now = SystemTime::now();
        let session = Session {
            expires_at: now + self.ttl,
            dataset: None,
        };

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(session_id.clone(), session);
        debug!("{} active session(s)", sessions.len());

        session_id
    }

    /// The session for `session_id`, if it exists and has not expired
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(session_id)
            .filter(|s| s.expires_at > SystemTime::now())
            .cloned()
    }

    pub fn is_valid(&self, session_id: &str) -> bool {
        self.get(session_id).is_some()
    }

    /// Attach an uploaded dataset to a live session
    ///
    /// Returns false when the session is unknown or expired.
    pub fn attach_dataset(&self, session_id: &str, table: RecordTable) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        match sessions.get_mut(session_id) {
            Some(session) if session.expires_at > SystemTime::now() => {
                session.dataset = Some(Arc::new(table));
                true
            }
            _ => false,
        }
    }

    pub fn remove(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    #[test]
    fn correct_secret_passes() {
        let gate = Gatekeeper::new("msba").unwrap();
        assert!(gate.check("msba").is_ok());
    }

    #[test]
    fn comparison_is_exact_and_case_sensitive() {
        let gate = Gatekeeper::new("msba").unwrap();
        for wrong in ["MSBA", "msba ", "msb", "", "wrong"] {
            assert!(matches!(gate.check(wrong), Err(DashboardError::Rejected)));
        }
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(Gatekeeper::new(""), Err(DashboardError::Gate(_))));
    }

    #[test]
    fn plaintext_is_not_kept() {
        let gate = Gatekeeper::new("msba").unwrap();
        assert!(!gate.secret_hash.contains("msba"));
        assert!(gate.secret_hash.starts_with("$argon2"));
    }

    #[test]
    fn sessions_are_independent() {
        let store = SessionStore::new();
        let a = store.create();
        let b = store.create();
        assert_ne!(a, b);
        assert!(store.is_valid(&a));
        assert!(!store.is_valid("not-a-session"));

        let table = RecordTable::new(vec![Record {
            gender: "Male".to_string(),
            year: 2020,
            age_group: "18-25".to_string(),
            vehicle_type: "Car".to_string(),
            death_rate: Some(1.0),
            injury_rate: Some(2.0),
        }]);
        assert!(store.attach_dataset(&a, table));
        assert!(store.get(&a).unwrap().dataset.is_some());
        assert!(store.get(&b).unwrap().dataset.is_none());

        store.remove(&a);
        assert!(!store.is_valid(&a));
        assert!(!store.attach_dataset(&a, RecordTable::default()));
    }

    #[test]
    fn expired_sessions_are_treated_as_absent() {
        let store = SessionStore::with_ttl(Duration::ZERO);
        let id = store.create();
        assert!(!store.is_valid(&id));
    }
}
