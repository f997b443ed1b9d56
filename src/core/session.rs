//! Provisioning sessions
//!
//! A session is one device's provisioning attempt, keyed by serial and the
//! session-start timestamp. It starts in [`SessionState::Started`] when the
//! device fetches its script and ends in [`SessionState::Completed`] after an
//! error or completion report. Completed sessions are immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Script handed out, device working
    Started,
    /// Terminal; see `result`
    Completed,
}

/// What the device reported about itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub model: String,
    /// Flash size in 512-byte sectors
    pub storage_size: u64,
    pub mac: String,
    pub inverse_jumper: bool,
    pub memory_size: u64,
    pub temperature: f64,
    /// SD/eMMC card identification register
    pub cid: String,
    /// SD/eMMC card specific data register
    pub csd: String,
    pub boot_mode: u32,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub firmware_checksum: Option<String>,
}

/// Server-side provisioning progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionInfo {
    pub project: String,
    pub image: String,
    #[serde(default)]
    pub firmware: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// `end_time - start_time` in milliseconds
    #[serde(default)]
    pub duration_ms: Option<i64>,
    pub state: SessionState,
    pub result: bool,
    #[serde(default)]
    pub error_log: Option<String>,
    #[serde(default)]
    pub error_code: Option<i32>,
    #[serde(default)]
    pub error_phase: Option<String>,
    #[serde(default)]
    pub final_temperature: Option<f64>,
    #[serde(default)]
    pub verify: Option<String>,
}

/// A device provisioning session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningSession {
    pub serial: String,
    pub session_key: String,
    pub device: DeviceInfo,
    pub provision: ProvisionInfo,
}

/// Bootloader version report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareReport {
    /// Output of the bootloader version query
    pub version: String,
    /// SHA-256 of the bootloader image, if reported
    pub checksum: Option<String>,
}

/// Failure report from the script
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorReport {
    pub retcode: Option<i32>,
    pub phase: Option<String>,
    pub log: String,
}

/// Final report from the script
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionReport {
    pub success: bool,
    pub temperature: Option<f64>,
    pub verify: Option<String>,
}

impl ProvisioningSession {
    /// Start a new session
    pub fn start(
        serial: impl Into<String>,
        session_key: impl Into<String>,
        device: DeviceInfo,
        project: impl Into<String>,
        image: impl Into<String>,
        firmware: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            serial: serial.into(),
            session_key: session_key.into(),
            device,
            provision: ProvisionInfo {
                project: project.into(),
                image: image.into(),
                firmware,
                start_time: now,
                end_time: None,
                duration_ms: None,
                state: SessionState::Started,
                result: false,
                error_log: None,
                error_code: None,
                error_phase: None,
                final_temperature: None,
                verify: None,
            },
        }
    }

    /// Whether the session reached its terminal state
    pub fn is_completed(&self) -> bool {
        self.provision.state == SessionState::Completed
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_completed() {
            return Err(SessionError::AlreadyCompleted {
                serial: self.serial.clone(),
                session_key: self.session_key.clone(),
            });
        }
        Ok(())
    }

    /// Record the bootloader version; state is unchanged
    pub fn attach_firmware(&mut self, report: FirmwareReport) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.device.firmware_version = Some(report.version);
        self.device.firmware_checksum = report.checksum;
        Ok(())
    }

    /// Close the session as failed
    pub fn fail(&mut self, report: ErrorReport, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.finish(now, false);
        self.provision.error_log = Some(report.log);
        self.provision.error_code = report.retcode;
        self.provision.error_phase = report.phase;
        Ok(())
    }

    /// Close the session with the device's verdict
    pub fn complete(
        &mut self,
        report: CompletionReport,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.finish(now, report.success);
        self.provision.final_temperature = report.temperature;
        self.provision.verify = report.verify;
        Ok(())
    }

    fn finish(&mut self, now: DateTime<Utc>, result: bool) {
        // Wall clock may step backwards between start and end.
        let end = now.max(self.provision.start_time);
        self.provision.end_time = Some(end);
        self.provision.duration_ms =
            Some((end - self.provision.start_time).num_milliseconds());
        self.provision.state = SessionState::Completed;
        self.provision.result = result;
    }
}

/// Allocate a session key for `now`, unique among keys rejected by `taken`
pub fn allocate_session_key(now: DateTime<Utc>, taken: impl Fn(&str) -> bool) -> String {
    let mut millis = now.timestamp_millis();
    loop {
        let key = millis.to_string();
        if !taken(&key) {
            return key;
        }
        millis += 1;
    }
}
