//! Session store
//!
//! Sessions are stored as `serial -> session_key -> session`. Keys for a
//! serial are unique; a new key is allocated inside the same locked update
//! that inserts the session.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::core::session::{allocate_session_key, ProvisioningSession};
use crate::error::SessionError;

use super::document::JsonDocument;

/// On-disk shape of the session store
pub type SessionMap = BTreeMap<String, BTreeMap<String, ProvisioningSession>>;

/// Durable provisioning history
#[derive(Debug)]
pub struct SessionStore {
    doc: JsonDocument<SessionMap>,
}

impl SessionStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        Ok(Self {
            doc: JsonDocument::open(path)?,
        })
    }

    /// Insert a new session for `serial`
    ///
    /// `build` receives the allocated session key. `committed` sees the
    /// stored session while the store is still locked.
    pub fn insert_new(
        &self,
        serial: &str,
        now: DateTime<Utc>,
        build: impl FnOnce(String) -> ProvisioningSession,
        committed: impl FnOnce(&ProvisioningSession),
    ) -> Result<ProvisioningSession, SessionError> {
        let (key, sessions) = self.doc.update_then(
            |sessions| {
                let entry = sessions.entry(serial.to_string()).or_default();
                let key = allocate_session_key(now, |k| entry.contains_key(k));
                entry.insert(key.clone(), build(key.clone()));
                Ok::<_, SessionError>(key)
            },
            |key, sessions| notify(sessions, serial, key, committed),
        )?;

        tracing::debug!(serial = %serial, session_key = %key, "Session stored");
        lookup(&sessions, serial, &key)
    }

    /// Apply `f` to an existing session and persist it
    ///
    /// The store is untouched when the session is missing or `f` fails, and
    /// `committed` is not called.
    pub fn update(
        &self,
        serial: &str,
        session_key: &str,
        f: impl FnOnce(&mut ProvisioningSession) -> Result<(), SessionError>,
        committed: impl FnOnce(&ProvisioningSession),
    ) -> Result<ProvisioningSession, SessionError> {
        let ((), sessions) = self.doc.update_then(
            |sessions| {
                let session = sessions
                    .get_mut(serial)
                    .and_then(|by_key| by_key.get_mut(session_key))
                    .ok_or_else(|| not_found(serial, session_key))?;
                f(session)
            },
            |_, sessions| notify(sessions, serial, session_key, committed),
        )?;

        lookup(&sessions, serial, session_key)
    }

    pub fn get(&self, serial: &str, session_key: &str) -> Result<ProvisioningSession, SessionError> {
        lookup(&self.doc.read()?, serial, session_key)
    }

    /// Sessions for one serial in key order; empty if the serial is unknown
    pub fn by_serial(&self, serial: &str) -> Result<Vec<ProvisioningSession>, SessionError> {
        Ok(self
            .doc
            .read()?
            .remove(serial)
            .map(|by_key| by_key.into_values().collect())
            .unwrap_or_default())
    }

    /// The full history
    pub fn all(&self) -> Result<SessionMap, SessionError> {
        Ok(self.doc.read()?)
    }
}

fn notify(
    sessions: &SessionMap,
    serial: &str,
    session_key: &str,
    committed: impl FnOnce(&ProvisioningSession),
) {
    if let Some(session) = sessions.get(serial).and_then(|by_key| by_key.get(session_key)) {
        committed(session);
    }
}

fn not_found(serial: &str, session_key: &str) -> SessionError {
    SessionError::NotFound {
        serial: serial.to_string(),
        session_key: session_key.to_string(),
    }
}

fn lookup(
    sessions: &SessionMap,
    serial: &str,
    session_key: &str,
) -> Result<ProvisioningSession, SessionError> {
    sessions
        .get(serial)
        .and_then(|by_key| by_key.get(session_key))
        .cloned()
        .ok_or_else(|| not_found(serial, session_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{CompletionReport, DeviceInfo, SessionState};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn open_store(temp: &TempDir) -> SessionStore {
        SessionStore::open(temp.path().join("results.json")).unwrap()
    }

    fn insert(store: &SessionStore, serial: &str, now: DateTime<Utc>) -> ProvisioningSession {
        store
            .insert_new(
                serial,
                now,
                |key| {
                    ProvisioningSession::start(
                        serial,
                        key,
                        DeviceInfo::default(),
                        "prod",
                        "base.img",
                        None,
                        now,
                    )
                },
                |_| {},
            )
            .unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let session = insert(&store, "SN1", t0());
        assert_eq!(session.session_key, "1714564800000");
        assert_eq!(store.get("SN1", "1714564800000").unwrap(), session);
    }

    #[test]
    fn test_same_instant_gets_distinct_keys() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let first = insert(&store, "SN1", t0());
        let second = insert(&store, "SN1", t0());
        assert_ne!(first.session_key, second.session_key);
        assert_eq!(store.by_serial("SN1").unwrap().len(), 2);

        // Other serials are unaffected by collisions
        assert_eq!(insert(&store, "SN2", t0()).session_key, "1714564800000");
    }

    #[test]
    fn test_by_serial_unknown_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        assert!(store.by_serial("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_get_missing_reports_serial_and_key() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        insert(&store, "SN1", t0());

        let err = store.get("SN1", "1").unwrap_err();
        assert!(matches!(
            err,
            SessionError::NotFound { ref serial, ref session_key } if serial == "SN1" && session_key == "1"
        ));
        assert!(store.get("SN9", "1714564800000").is_err());
    }

    #[test]
    fn test_update_persists() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let session = insert(&store, "SN1", t0());

        let updated = store
            .update(
                "SN1",
                &session.session_key,
                |s| s.complete(CompletionReport::default(), t0()),
                |_| {},
            )
            .unwrap();
        assert_eq!(updated.provision.state, SessionState::Completed);

        let reopened = open_store(&temp);
        assert_eq!(
            reopened
                .get("SN1", &session.session_key)
                .unwrap()
                .provision
                .state,
            SessionState::Completed
        );
    }

    #[test]
    fn test_update_rejected_leaves_store_unchanged() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let session = insert(&store, "SN1", t0());
        store
            .update(
                "SN1",
                &session.session_key,
                |s| s.complete(CompletionReport::default(), t0()),
                |_| {},
            )
            .unwrap();
        let before = store.all().unwrap();

        let err = store
            .update(
                "SN1",
                &session.session_key,
                |s| {
                    s.complete(
                        CompletionReport {
                            success: true,
                            ..CompletionReport::default()
                        },
                        t0(),
                    )
                },
                |_| panic!("rejected update must not be reported as committed"),
            )
            .unwrap_err();
        assert!(matches!(err, SessionError::AlreadyCompleted { .. }));
        assert_eq!(store.all().unwrap(), before);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let err = store.update("SN1", "1", |_| Ok(()), |_| {}).unwrap_err();
        assert!(matches!(err, SessionError::NotFound { .. }));
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn test_commit_hook_sees_stored_session() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let session = insert(&store, "SN1", t0());

        let mut seen = None;
        let updated = store
            .update(
                "SN1",
                &session.session_key,
                |s| s.complete(CompletionReport::default(), t0()),
                |committed| seen = Some(committed.clone()),
            )
            .unwrap();
        assert_eq!(seen, Some(updated));
    }
}
