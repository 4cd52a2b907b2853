use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Runtime configuration — env vars only, read at startup by the shell and
// injected into the client. No implicit global state beyond the environment.
// ---------------------------------------------------------------------------

pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";
pub const ENV_HEADLESS: &str = "ADILET_HEADLESS";
pub const ENV_SUBMIT_TIMEOUT_SECS: &str = "ADILET_SUBMIT_TIMEOUT_SECS";
pub const ENV_TABLE_TIMEOUT_SECS: &str = "ADILET_TABLE_TIMEOUT_SECS";
pub const ENV_POLL_INTERVAL_MS: &str = "ADILET_POLL_INTERVAL_MS";
pub const ENV_SETTLE_DELAY_MS: &str = "ADILET_SETTLE_DELAY_MS";

/// Optional override for the Chromium-family browser executable.
///
/// Default behavior is auto-discovery (see `scraping::browser_manager::find_chrome_executable()`).
/// This function only returns a value when `CHROME_EXECUTABLE` is set to an existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = std::env::var(ENV_CHROME_EXECUTABLE).ok()?;
    let p = p.trim();
    if p.is_empty() {
        return None;
    }
    if Path::new(p).exists() {
        Some(p.to_string())
    } else {
        None
    }
}

/// Headless toggle for the browser session.
///
/// Default: headless. Set `ADILET_HEADLESS=0` (or `false`/`no`/`off`) to watch
/// the session in a visible window while debugging selector breakage.
pub fn headless() -> bool {
    let Ok(v) = std::env::var(ENV_HEADLESS) else {
        return true;
    };
    let v = v.trim().to_ascii_lowercase();
    if v.is_empty() {
        return true;
    }
    !matches!(v.as_str(), "0" | "false" | "no" | "off")
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

/// Bounds for every polling wait the client performs. All waits are bounded;
/// nothing in the client blocks indefinitely.
#[derive(Clone, Copy, Debug)]
pub struct WaitBounds {
    /// Dual-condition wait after clicking submit (table changed or notice shown).
    pub submit_timeout: Duration,
    /// Wait for the table wrapper to appear and contain at least one row.
    pub table_timeout: Duration,
    /// Polling cadence for both waits above.
    pub poll_interval: Duration,
    /// Fixed settle delay for pages whose table-replacement signal is unreliable.
    pub settle_delay: Duration,
}

impl Default for WaitBounds {
    fn default() -> Self {
        Self {
            submit_timeout: Duration::from_secs(15),
            table_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
            settle_delay: Duration::from_millis(1500),
        }
    }
}

impl WaitBounds {
    /// Defaults overridable through `ADILET_*` env vars.
    pub fn from_env() -> Self {
        Self {
            submit_timeout: Duration::from_secs(env_u64(ENV_SUBMIT_TIMEOUT_SECS, 15)),
            table_timeout: Duration::from_secs(env_u64(ENV_TABLE_TIMEOUT_SECS, 30)),
            poll_interval: Duration::from_millis(env_u64(ENV_POLL_INTERVAL_MS, 250)),
            settle_delay: Duration::from_millis(env_u64(ENV_SETTLE_DELAY_MS, 1500)),
        }
    }
}
