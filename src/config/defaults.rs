//! Default configuration values

/// Default HTTP bind address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:80";

/// Default provisioning interface
pub const DEFAULT_HOST_IFACE: &str = "eth0";

/// Default server address (CIDR notation, as passed to `ip addr add`)
pub const DEFAULT_SERVER_IP: &str = "172.20.0.1/16";

/// Default DHCP range handed to the boot responder
pub const DEFAULT_DHCP_RANGE: &str = "172.20.0.2,172.20.255.255,255.255.0.0,6h";

/// Boot responder executable
pub const DEFAULT_BOOT_BINARY: &str = "dnsmasq";

/// Boot responder configuration file
pub const DEFAULT_BOOT_CONF_PATH: &str = "/etc/dnsmasq.conf";

/// TFTP root served by the boot responder
pub const DEFAULT_TFTP_ROOT: &str = "/tftpboot";

/// Interval between active-project checks while the responder is gated
pub const BOOT_POLL_INTERVAL_MS: u64 = 500;

/// Upper bound on how long `stop` waits for the supervisor to wind down
pub const BOOT_STOP_TIMEOUT_MS: u64 = 5_000;

/// Per-subscriber queue depth for live session updates
pub const SUBSCRIBER_QUEUE_DEPTH: usize = 64;

/// Project catalog document name
pub const PROJECTS_FILE: &str = "projects.json";

/// Session store document name
pub const RESULTS_FILE: &str = "results.json";

/// Uploaded artifact directory name
pub const UPLOADS_DIR: &str = "uploads";

/// Bytes per flash sector reported by devices
pub const SECTOR_SIZE: u64 = 512;

/// Upper bound (inclusive, GiB) of the small image tier
pub const SMALL_TIER_MAX_GIB: f64 = 8.0;

/// Upper bound (inclusive, GiB) of the medium image tier
pub const MEDIUM_TIER_MAX_GIB: f64 = 16.0;
