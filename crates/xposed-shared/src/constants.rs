/// Application name
pub const APP_NAME: &str = "xPosed";

/// Review count at which a report becomes publicly listed.
pub const PUBLIC_THRESHOLD: u32 = 50;

/// Review count at which a report is classified as medium risk.
pub const MEDIUM_RISK_THRESHOLD: u32 = 50;

/// Review count at which a report is classified as high risk.
pub const HIGH_RISK_THRESHOLD: u32 = 100;

/// Review count at which a report is automatically verified.
pub const AUTO_VERIFY_THRESHOLD: u32 = 200;

/// Default page for public listings (1-based).
pub const DEFAULT_PAGE: u32 = 1;

/// Default page size for public listings.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Upper bound for a requested page size unless configured otherwise.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Longest instrument string accepted, in bytes.
pub const MAX_INSTRUMENT_LEN: usize = 2048;
