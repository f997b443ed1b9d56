//! Session state machine
//!
//! Creates sessions from device script requests and applies the device's
//! follow-up reports. Every successful transition is written to the session
//! store first and published to the live hub before the store lock is
//! released, so observers see durable states in commit order.

use std::sync::Arc;

use chrono::Utc;

use crate::core::image;
use crate::core::project::Project;
use crate::core::session::{
    CompletionReport, DeviceInfo, ErrorReport, FirmwareReport, ProvisioningSession,
};
use crate::error::SessionError;
use crate::store::sessions::SessionMap;
use crate::store::{ProjectCatalog, SessionStore};

use super::hub::{LiveUpdateHub, SessionUpdate, UpdateKind};

/// A freshly created session and the project it was created for
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session: ProvisioningSession,
    pub project: Project,
}

/// Provisioning session orchestrator
#[derive(Debug, Clone)]
pub struct Provisioner {
    catalog: Arc<ProjectCatalog>,
    sessions: Arc<SessionStore>,
    hub: LiveUpdateHub,
}

impl Provisioner {
    pub fn new(catalog: Arc<ProjectCatalog>, sessions: Arc<SessionStore>, hub: LiveUpdateHub) -> Self {
        Self {
            catalog,
            sessions,
            hub,
        }
    }

    pub fn catalog(&self) -> &Arc<ProjectCatalog> {
        &self.catalog
    }

    pub fn hub(&self) -> &LiveUpdateHub {
        &self.hub
    }

    /// Start a session for a device requesting its script
    ///
    /// Nothing is stored when there is no active project or the project has
    /// no image for the device.
    pub fn create(&self, serial: &str, device: DeviceInfo) -> Result<NewSession, SessionError> {
        let project = self
            .catalog
            .active()?
            .ok_or_else(|| SessionError::NoActiveProject {
                serial: serial.to_string(),
            })?;

        let selected = image::select(Some(&project), device.storage_size);
        if selected.is_empty() {
            return Err(SessionError::NoImage {
                project: project.name.clone(),
                capacity_gib: image::capacity_gib(device.storage_size),
            });
        }
        let firmware = image::firmware(Some(&project));

        let now = Utc::now();
        let session = self.sessions.insert_new(
            serial,
            now,
            |key| ProvisioningSession::start(serial, key, device, &project.name, selected, firmware, now),
            |stored| self.publish(UpdateKind::Created, stored),
        )?;

        tracing::info!(
            serial = %serial,
            session_key = %session.session_key,
            project = %project.name,
            image = %session.provision.image,
            "Provisioning session started"
        );

        Ok(NewSession { session, project })
    }

    /// Record the bootloader version reported by the device
    pub fn attach_firmware_report(
        &self,
        serial: &str,
        session_key: &str,
        report: FirmwareReport,
    ) -> Result<ProvisioningSession, SessionError> {
        let session = self
            .sessions
            .update(serial, session_key, |s| s.attach_firmware(report), |stored| {
                self.publish(UpdateKind::FirmwareReported, stored);
            })?;

        tracing::info!(
            serial = %serial,
            session_key = %session_key,
            version = session.device.firmware_version.as_deref().unwrap_or_default(),
            "Firmware version reported"
        );
        Ok(session)
    }

    /// Close a session as failed
    pub fn record_error(
        &self,
        serial: &str,
        session_key: &str,
        report: ErrorReport,
    ) -> Result<ProvisioningSession, SessionError> {
        let now = Utc::now();
        let session = self
            .sessions
            .update(serial, session_key, |s| s.fail(report, now), |stored| {
                self.publish(UpdateKind::Failed, stored);
            })?;

        tracing::warn!(
            serial = %serial,
            session_key = %session_key,
            phase = session.provision.error_phase.as_deref().unwrap_or("unknown"),
            retcode = ?session.provision.error_code,
            "Provisioning failed"
        );
        Ok(session)
    }

    /// Close a session with the device's verdict
    pub fn record_completion(
        &self,
        serial: &str,
        session_key: &str,
        report: CompletionReport,
    ) -> Result<ProvisioningSession, SessionError> {
        let now = Utc::now();
        let session = self
            .sessions
            .update(serial, session_key, |s| s.complete(report, now), |stored| {
                self.publish(UpdateKind::Completed, stored);
            })?;

        tracing::info!(
            serial = %serial,
            session_key = %session_key,
            result = session.provision.result,
            duration_ms = session.provision.duration_ms.unwrap_or_default(),
            "Provisioning completed"
        );
        Ok(session)
    }

    pub fn get(&self, serial: &str, session_key: &str) -> Result<ProvisioningSession, SessionError> {
        self.sessions.get(serial, session_key)
    }

    pub fn by_serial(&self, serial: &str) -> Result<Vec<ProvisioningSession>, SessionError> {
        self.sessions.by_serial(serial)
    }

    pub fn all(&self) -> Result<SessionMap, SessionError> {
        self.sessions.all()
    }

    fn publish(&self, kind: UpdateKind, session: &ProvisioningSession) {
        self.hub.publish(SessionUpdate {
            kind,
            session: session.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::project::ImageTier;
    use crate::core::session::SessionState;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        catalog: Arc<ProjectCatalog>,
        provisioner: Provisioner,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let catalog = Arc::new(ProjectCatalog::open(temp.path().join("projects.json")).unwrap());
        let sessions = Arc::new(SessionStore::open(temp.path().join("results.json")).unwrap());
        let provisioner = Provisioner::new(catalog.clone(), sessions, LiveUpdateHub::new());
        Fixture {
            _temp: temp,
            catalog,
            provisioner,
        }
    }

    fn device(sectors: u64) -> DeviceInfo {
        DeviceInfo {
            model: "CM4".to_string(),
            storage_size: sectors,
            ..DeviceInfo::default()
        }
    }

    fn activate_prod(catalog: &ProjectCatalog) {
        catalog
            .create(
                Project::new("prod")
                    .with_image(ImageTier::Small, "base.img")
                    .with_firmware("pieeprom.bin")
                    .with_active(true),
            )
            .unwrap();
    }

    #[test]
    fn test_create_without_active_project_stores_nothing() {
        let fx = fixture();
        let mut sub = fx.provisioner.hub().subscribe();

        let err = fx.provisioner.create("SN1", device(15_000_000)).unwrap_err();
        assert!(matches!(err, SessionError::NoActiveProject { .. }));
        assert!(fx.provisioner.all().unwrap().is_empty());
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_create_without_image_stores_nothing() {
        let fx = fixture();
        fx.catalog
            .create(Project::new("empty").with_active(true))
            .unwrap();

        let err = fx.provisioner.create("SN1", device(15_000_000)).unwrap_err();
        assert!(matches!(err, SessionError::NoImage { ref project, .. } if project == "empty"));
        assert!(fx.provisioner.by_serial("SN1").unwrap().is_empty());
    }

    #[test]
    fn test_create_resolves_image_and_firmware() {
        let fx = fixture();
        activate_prod(&fx.catalog);

        let created = fx.provisioner.create("SN1", device(15_000_000)).unwrap();
        let session = created.session;
        assert_eq!(created.project.name, "prod");
        assert_eq!(session.provision.state, SessionState::Started);
        assert!(!session.provision.result);
        assert_eq!(session.provision.image, "base.img");
        assert_eq!(session.provision.firmware.as_deref(), Some("pieeprom.bin"));
        assert_eq!(
            fx.provisioner.get("SN1", &session.session_key).unwrap(),
            session
        );
    }

    #[test]
    fn test_each_transition_publishes_once() {
        let fx = fixture();
        activate_prod(&fx.catalog);
        let mut sub = fx.provisioner.hub().subscribe();

        let key = fx
            .provisioner
            .create("SN1", device(15_000_000))
            .unwrap()
            .session
            .session_key;
        fx.provisioner
            .attach_firmware_report(
                "SN1",
                &key,
                FirmwareReport {
                    version: "2024/04/17".to_string(),
                    checksum: None,
                },
            )
            .unwrap();
        fx.provisioner
            .record_completion(
                "SN1",
                &key,
                CompletionReport {
                    success: true,
                    temperature: Some(45.0),
                    verify: None,
                },
            )
            .unwrap();

        let kinds: Vec<UpdateKind> = std::iter::from_fn(|| sub.try_recv())
            .map(|u| u.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                UpdateKind::Created,
                UpdateKind::FirmwareReported,
                UpdateKind::Completed
            ]
        );
    }

    #[test]
    fn test_published_record_matches_stored_record() {
        let fx = fixture();
        activate_prod(&fx.catalog);
        let key = fx
            .provisioner
            .create("SN1", device(15_000_000))
            .unwrap()
            .session
            .session_key;

        let mut sub = fx.provisioner.hub().subscribe();
        fx.provisioner
            .record_error(
                "SN1",
                &key,
                ErrorReport {
                    retcode: Some(1),
                    phase: Some("dd".to_string()),
                    log: "write error".to_string(),
                },
            )
            .unwrap();

        let published = sub.try_recv().unwrap();
        assert_eq!(published.kind, UpdateKind::Failed);
        assert_eq!(published.session, fx.provisioner.get("SN1", &key).unwrap());
        assert!(!published.session.provision.result);
        assert!(published.session.provision.duration_ms.unwrap() >= 0);
    }

    #[test]
    fn test_concurrent_reports_publish_in_commit_order() {
        let fx = fixture();
        activate_prod(&fx.catalog);
        let key = fx
            .provisioner
            .create("SN1", device(15_000_000))
            .unwrap()
            .session
            .session_key;
        let mut sub = fx.provisioner.hub().subscribe();

        std::thread::scope(|scope| {
            for i in 0..16 {
                let provisioner = &fx.provisioner;
                let key = &key;
                scope.spawn(move || {
                    provisioner
                        .attach_firmware_report(
                            "SN1",
                            key,
                            FirmwareReport {
                                version: format!("v{i}"),
                                checksum: None,
                            },
                        )
                        .unwrap();
                });
            }
        });

        let updates: Vec<SessionUpdate> = std::iter::from_fn(|| sub.try_recv()).collect();
        assert_eq!(updates.len(), 16);
        let last = updates.last().unwrap();
        assert_eq!(last.session, fx.provisioner.get("SN1", &key).unwrap());
    }

    #[test]
    fn test_unknown_session_is_not_found_and_silent() {
        let fx = fixture();
        activate_prod(&fx.catalog);
        let mut sub = fx.provisioner.hub().subscribe();

        let err = fx
            .provisioner
            .record_completion("SN1", "42", CompletionReport::default())
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound { .. }));
        assert!(fx.provisioner.all().unwrap().is_empty());
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_report_after_completion_is_rejected_and_silent() {
        let fx = fixture();
        activate_prod(&fx.catalog);
        let key = fx
            .provisioner
            .create("SN1", device(15_000_000))
            .unwrap()
            .session
            .session_key;
        let done = fx
            .provisioner
            .record_completion("SN1", &key, CompletionReport::default())
            .unwrap();

        let mut sub = fx.provisioner.hub().subscribe();
        let err = fx
            .provisioner
            .record_error("SN1", &key, ErrorReport::default())
            .unwrap_err();
        assert!(matches!(err, SessionError::AlreadyCompleted { .. }));
        assert_eq!(fx.provisioner.get("SN1", &key).unwrap(), done);
        assert!(sub.try_recv().is_none());
    }
}
