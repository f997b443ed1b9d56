//! Provisioning script rendering
//!
//! Devices fetch `/scriptexecute` and pipe the result into `sh`. The script
//! writes the selected image to the on-board flash and calls back into the
//! server with the bootloader version, any failure log, and a final verdict.
//! Every callback carries `serial` and `start` so the server can find the
//! session again.

use std::fmt::Write as _;

/// Inputs for a provisioning script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptParams<'a> {
    pub serial: &'a str,
    /// Host (and optional port) devices use to reach this server
    pub server: &'a str,
    pub session_key: &'a str,
    /// Artifact name under `/uploads/`
    pub image: &'a str,
    /// Bootloader firmware artifact name
    pub firmware: Option<&'a str>,
    /// `(gpio, active_high)`
    pub status_led: Option<(i32, bool)>,
}

/// Target block device on compute modules
const STORAGE_DEVICE: &str = "/dev/mmcblk0";

/// Escape a value for use inside double quotes
fn sh_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Percent-encode an artifact name as one URL path segment
///
/// Only unreserved characters pass through, so the result is also inert
/// inside double quotes.
fn url_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

/// Decompression stage for an image name
fn decompressor(image: &str) -> &'static str {
    if image.ends_with(".xz") {
        "xz -dc | "
    } else if image.ends_with(".gz") {
        "gunzip -c | "
    } else if image.ends_with(".zst") {
        "zstd -dc | "
    } else {
        ""
    }
}

/// Render the provisioning script
pub fn render(params: &ScriptParams<'_>) -> String {
    let mut script = String::new();
    let _ = write!(
        script,
        r#"#!/bin/sh
set -o pipefail

export SERIAL="{serial}"
export SERVER="{server}"
export START="{start}"
export STORAGE="{storage}"

report_error() {{
    curl --retry 10 -g -F "log=@$2" "http://$SERVER/scriptexecute/error?serial=$SERIAL&retcode=$1&phase=$3&start=$START"
    exit 1
}}

# Make sure we have random entropy
echo "OM7WfoL5UW24E1cO2B66wuMvZVVAn2yoiZI2bX1ydJqEhPXibBBhZuRFtJWrRKuR" >/dev/urandom

"#,
        serial = sh_escape(params.serial),
        server = sh_escape(params.server),
        start = sh_escape(params.session_key),
        storage = STORAGE_DEVICE,
    );

    script.push_str("EEPROMSHA=\"\"\n");
    if let Some(firmware) = params.firmware {
        let _ = write!(
            script,
            r#"echo Writing bootloader firmware {name}
curl --retry 10 -g -o /tmp/pieeprom.bin "http://$SERVER/uploads/{path}" >/tmp/eeprom.log 2>&1 || report_error $? /tmp/eeprom.log eeprom-download
EEPROMSHA=$(sha256sum /tmp/pieeprom.bin | cut -d ' ' -f 1)
flashrom -p linux_spi:dev=/dev/spidev0.0,spispeed=16000 -w /tmp/pieeprom.bin >>/tmp/eeprom.log 2>&1 || report_error $? /tmp/eeprom.log eeprom

"#,
            name = sh_escape(firmware),
            path = url_segment(firmware),
        );
    }

    let _ = write!(
        script,
        r#"echo Querying and registering EEPROM version
vcgencmd bootloader_version >/tmp/eeprom_version 2>&1 || true
if [ -f /tmp/eeprom_version ]; then
    curl --retry 10 -g -F 'eeprom_version=@/tmp/eeprom_version' "http://$SERVER/scriptexecute/eeprom-version?serial=$SERIAL&eepromsha=$EEPROMSHA&start=$START"
fi

echo Sending BLKDISCARD to $STORAGE
blkdiscard -v $STORAGE || true

echo Writing image {image} to $STORAGE
curl --retry 10 -g "http://$SERVER/uploads/{path}" \
 | {decompress}dd of=$STORAGE conv=fsync obs=1M >/tmp/dd.log 2>&1
RETCODE=$?
if [ $RETCODE -ne 0 ]; then
    echo Writing image failed.
    report_error $RETCODE /tmp/dd.log dd
fi

partprobe $STORAGE
sleep 0.1

TEMP=$(vcgencmd measure_temp)
curl --retry 10 -g "http://$SERVER/scriptexecute/alldone?serial=$SERIAL&alldone=1&temp=${{TEMP:5:4}}&verify=&start=$START"

echo ""
echo "====="
echo "Provisioning completed successfully!"
"#,
        image = sh_escape(params.image),
        path = url_segment(params.image),
        decompress = decompressor(params.image),
    );

    if let Some((gpio, active_high)) = params.status_led.filter(|(gpio, _)| *gpio >= 0) {
        let on = if active_high { "dh" } else { "dl" };
        let _ = write!(
            script,
            "\nraspi-gpio set {gpio} op {on} || true\n"
        );
    }

    script
}

/// Script handed out when no session could be created
///
/// Prints the reason on the device console and exits non-zero so the boot
/// image's own error handling kicks in.
pub fn render_failure(serial: &str, reason: &str) -> String {
    format!(
        "#!/bin/sh\necho \"Provisioning of {serial} refused: {reason}\" >&2\nexit 1\n",
        serial = sh_escape(serial),
        reason = sh_escape(reason),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ScriptParams<'static> {
        ScriptParams {
            serial: "SN1",
            server: "172.20.0.1",
            session_key: "1714564800000",
            image: "base.img.xz",
            firmware: None,
            status_led: None,
        }
    }

    #[test]
    fn test_callbacks_carry_session_key() {
        let script = render(&params());
        assert!(script.contains("export START=\"1714564800000\""));
        assert!(script.contains("/scriptexecute/eeprom-version?serial=$SERIAL&eepromsha=$EEPROMSHA&start=$START"));
        assert!(script.contains("/scriptexecute/alldone?serial=$SERIAL&alldone=1"));
        assert!(script.contains("/scriptexecute/error?serial=$SERIAL&retcode=$1&phase=$3&start=$START"));
    }

    #[test]
    fn test_xz_image_is_decompressed() {
        let script = render(&params());
        assert!(script.contains("\"http://$SERVER/uploads/base.img.xz\""));
        assert!(script.contains("| xz -dc | dd of=$STORAGE"));
    }

    #[test]
    fn test_raw_image_is_written_directly() {
        let script = render(&ScriptParams {
            image: "base.img",
            ..params()
        });
        assert!(script.contains(" | dd of=$STORAGE"));
        assert!(!script.contains("xz -dc"));
    }

    #[test]
    fn test_firmware_block_only_when_configured() {
        assert!(!render(&params()).contains("flashrom"));
        let script = render(&ScriptParams {
            firmware: Some("pieeprom-2024.bin"),
            ..params()
        });
        assert!(script.contains("/uploads/pieeprom-2024.bin"));
        assert!(script.contains("flashrom"));
    }

    #[test]
    fn test_status_led_polarity() {
        let high = render(&ScriptParams {
            status_led: Some((21, true)),
            ..params()
        });
        assert!(high.contains("raspi-gpio set 21 op dh"));

        let low = render(&ScriptParams {
            status_led: Some((21, false)),
            ..params()
        });
        assert!(low.contains("raspi-gpio set 21 op dl"));

        let none = render(&ScriptParams {
            status_led: Some((-1, true)),
            ..params()
        });
        assert!(!none.contains("raspi-gpio"));
    }

    #[test]
    fn test_serial_is_escaped() {
        let script = render(&ScriptParams {
            serial: "a\"$(reboot)",
            ..params()
        });
        assert!(script.contains("export SERIAL=\"a\\\"\\$(reboot)\""));
    }

    #[test]
    fn test_artifact_urls_are_percent_encoded() {
        let script = render(&ScriptParams {
            image: "release 2#final?.img.xz",
            firmware: Some("eeprom 100%.bin"),
            ..params()
        });
        assert!(script.contains("\"http://$SERVER/uploads/release%202%23final%3F.img.xz\""));
        assert!(script.contains("\"http://$SERVER/uploads/eeprom%20100%25.bin\""));
        assert!(script.contains("echo Writing image release 2#final?.img.xz to $STORAGE"));
        assert!(script.contains("| xz -dc | dd of=$STORAGE"));
    }

    #[test]
    fn test_url_segment_encodes_utf8_bytes() {
        assert_eq!(url_segment("base-1.0_x~.img"), "base-1.0_x~.img");
        assert_eq!(url_segment("é$`\""), "%C3%A9%24%60%22");
    }

    #[test]
    fn test_failure_script_exits_non_zero() {
        let script = render_failure("SN1", "No active project");
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("No active project"));
        assert!(script.trim_end().ends_with("exit 1"));
    }
}
