//! Boot responder configuration
//!
//! Renders the dnsmasq configuration that answers the compute modules' DHCP
//! and TFTP requests, and the `cmdline.txt` that tells the netboot image
//! where to fetch its provisioning script from.

/// Parameters for the responder configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootConfig<'a> {
    pub host_iface: &'a str,
    pub dhcp_range: &'a str,
    pub tftp_root: &'a str,
}

/// Render `dnsmasq.conf`
pub fn render_dnsmasq_conf(config: &BootConfig<'_>) -> String {
    format!(
        r#"
# No DNS
port=0

# tftp
enable-tftp
tftp-root={tftp_root}

# dhcp
interface={iface}
dhcp-match=set:client_is_a_pi,97,0:52:50:69:34
dhcp-match=set:client_is_a_pi,97,0:34:69:50:52
bind-interfaces

log-dhcp
dhcp-range={range}
pxe-service=tag:client_is_a_pi,0,"Raspberry Pi Boot"
no-ping
"#,
        tftp_root = config.tftp_root,
        iface = config.host_iface,
        range = config.dhcp_range,
    )
}

/// Render the netboot kernel command line
///
/// The `{serial}`-style placeholders are expanded on the device by the
/// netboot image, not here.
pub fn render_cmdline(server_host: &str) -> String {
    format!(
        "readjumper script=http://{server_host}/scriptexecute?serial={{serial}}&model={{model}}\
         &storagesize={{storagesize}}&mac={{mac}}&inversejumper={{jumper}}&memorysize={{memorysize}}\
         &temp={{temp}}&cid={{cid}}&csd={{csd}}&bootmode={{bootmode}}\n"
    )
}
