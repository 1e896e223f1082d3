//! Bot identity strings.

/// Name reported in CTCP VERSION and the `version` command.
pub const NAME: &str = "Subhuti";

/// Crate version, from the manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Where the source lives.
pub const SOURCE_URL: &str = "http://github.com/fluter01/subhuti";

/// `"Subhuti version 0.1.1"`.
pub fn version_string() -> String {
    format!("{NAME} version {VERSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_names_the_bot() {
        assert_eq!(version_string(), "Subhuti version 0.1.1");
    }
}
