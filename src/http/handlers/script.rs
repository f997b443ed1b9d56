//! Device-facing endpoints
//!
//! The device fetches `/scriptexecute` once at boot, then reports back from
//! inside the script. All callbacks identify the session by `serial` and
//! `start` (the session key handed out in the script).

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::core::script::{self, ScriptParams};
use crate::core::session::{
    CompletionReport, DeviceInfo, ErrorReport, FirmwareReport, ProvisioningSession,
};
use crate::error::SessionError;
use crate::http::error::ApiError;
use crate::http::state::AppState;

use super::run_blocking;

/// Query sent by the netboot image (see `cmdline.txt`)
#[derive(Debug, Default, Deserialize)]
pub struct ScriptQuery {
    pub serial: String,
    pub model: Option<String>,
    pub storagesize: Option<String>,
    pub mac: Option<String>,
    pub inversejumper: Option<String>,
    pub memorysize: Option<String>,
    pub temp: Option<String>,
    pub cid: Option<String>,
    pub csd: Option<String>,
    pub bootmode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FirmwareQuery {
    pub serial: String,
    pub start: String,
    pub eepromsha: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorQuery {
    pub serial: String,
    pub start: String,
    pub retcode: Option<String>,
    pub phase: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AllDoneQuery {
    pub serial: String,
    pub start: String,
    pub alldone: Option<String>,
    pub temp: Option<String>,
    pub verify: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse a decimal or `0x`-prefixed integer
fn parse_int(value: Option<&str>) -> Option<u64> {
    let value = value?.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

/// Parse the leading number of values like `45.2'C`
fn parse_temperature(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    let end = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(str::trim),
        Some("1" | "true" | "True" | "yes" | "on")
    )
}

impl ScriptQuery {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            model: self.model.clone().unwrap_or_default(),
            storage_size: parse_int(self.storagesize.as_deref()).unwrap_or(0),
            mac: self.mac.clone().unwrap_or_default(),
            inverse_jumper: parse_flag(self.inversejumper.as_deref()),
            memory_size: parse_int(self.memorysize.as_deref()).unwrap_or(0),
            temperature: parse_temperature(self.temp.as_deref()).unwrap_or(0.0),
            cid: self.cid.clone().unwrap_or_default(),
            csd: self.csd.clone().unwrap_or_default(),
            boot_mode: parse_int(self.bootmode.as_deref())
                .and_then(|m| u32::try_from(m).ok())
                .unwrap_or(0),
            firmware_version: None,
            firmware_checksum: None,
        }
    }
}

fn shell_script(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

fn require_serial(serial: &str) -> Result<(), ApiError> {
    if serial.trim().is_empty() {
        return Err(ApiError::bad_request("serial must not be empty"));
    }
    Ok(())
}

/// `GET /scriptexecute`
pub async fn scriptexecute(
    State(state): State<AppState>,
    Query(query): Query<ScriptQuery>,
) -> Result<Response, ApiError> {
    require_serial(&query.serial)?;

    let provisioner = state.provisioner.clone();
    let serial = query.serial.clone();
    let device = query.device_info();
    let created = match run_blocking(move || provisioner.create(&serial, device)).await? {
        Ok(created) => created,
        Err(e @ (SessionError::NoActiveProject { .. } | SessionError::NoImage { .. })) => {
            tracing::warn!(serial = %query.serial, error = %e, "Refusing to provision");
            return Ok(shell_script(
                StatusCode::SERVICE_UNAVAILABLE,
                script::render_failure(&query.serial, &e.to_string()),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let session = &created.session;
    let project = &created.project;
    let body = script::render(&ScriptParams {
        serial: &session.serial,
        server: &state.public_address,
        session_key: &session.session_key,
        image: &session.provision.image,
        firmware: session.provision.firmware.as_deref(),
        status_led: project
            .has_status_led()
            .then_some((project.status_led_id, project.status_led_active_high)),
    });
    Ok(shell_script(StatusCode::OK, body))
}

/// Text of a report body, raw or `multipart/form-data`
async fn report_body(req: Request) -> Result<String, ApiError> {
    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if !is_multipart {
        let bytes = Bytes::from_request(req, &())
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        return Ok(String::from_utf8_lossy(&bytes).into_owned());
    }

    let mut multipart = Multipart::from_request(req, &())
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?;
    let mut text = String::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let chunk = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        text.push_str(&chunk);
    }
    Ok(text)
}

/// `POST /scriptexecute/eeprom-version`
pub async fn eeprom_version(
    State(state): State<AppState>,
    Query(query): Query<FirmwareQuery>,
    req: Request,
) -> Result<Json<ProvisioningSession>, ApiError> {
    let version = report_body(req).await?;
    let report = FirmwareReport {
        version: version.trim().to_string(),
        checksum: non_empty(query.eepromsha),
    };
    let provisioner = state.provisioner;
    let session = run_blocking(move || {
        provisioner.attach_firmware_report(&query.serial, &query.start, report)
    })
    .await??;
    Ok(Json(session))
}

/// `POST /scriptexecute/error`
pub async fn error_report(
    State(state): State<AppState>,
    Query(query): Query<ErrorQuery>,
    req: Request,
) -> Result<Json<ProvisioningSession>, ApiError> {
    let log = report_body(req).await?;
    let report = ErrorReport {
        retcode: query
            .retcode
            .as_deref()
            .and_then(|r| r.trim().parse().ok()),
        phase: non_empty(query.phase),
        log,
    };
    let provisioner = state.provisioner;
    let session =
        run_blocking(move || provisioner.record_error(&query.serial, &query.start, report))
            .await??;
    Ok(Json(session))
}

/// `GET /scriptexecute/alldone`
pub async fn alldone(
    State(state): State<AppState>,
    Query(query): Query<AllDoneQuery>,
) -> Result<Json<ProvisioningSession>, ApiError> {
    let report = CompletionReport {
        success: query.alldone.as_deref().map(str::trim) == Some("1"),
        temperature: parse_temperature(query.temp.as_deref()),
        verify: non_empty(query.verify),
    };
    let provisioner = state.provisioner;
    let session = run_blocking(move || {
        provisioner.record_completion(&query.serial, &query.start, report)
    })
    .await??;
    Ok(Json(session))
}
