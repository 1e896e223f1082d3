//! Default value functions for configuration.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

pub fn default_bot_name() -> String {
    "subhuti".to_string()
}

pub fn default_trigger() -> String {
    "?".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

// =============================================================================
// Network Defaults
// =============================================================================

pub fn default_port() -> u16 {
    6667
}

pub fn default_username() -> String {
    "subhuti".to_string()
}

pub fn default_realname() -> String {
    "Subhuti Bot".to_string()
}

pub fn default_reconnect_delay_ms() -> u64 {
    10_000
}

pub fn default_ping_interval_ms() -> u64 {
    30_000
}

pub fn default_max_line_len() -> usize {
    subhuti_proto::MAX_LINE_LEN
}
