//! Human-readable session report.

use std::fmt::Write;

use crate::roster::Roster;

use super::shared::SessionShared;

/// ```text
/// Server: irc.example.org ircd-2.11
/// State: Running
/// Lag: 41.2ms
/// Channels(2): #a 3[x y z], #b 1[Subhuti]
/// ```
pub fn render_status(shared: &SessionShared, roster: &Roster) -> String {
    let server = shared.server();
    let host = if server.host.is_empty() {
        shared.settings().server.as_str()
    } else {
        server.host.as_str()
    };

    let mut out = String::new();
    let _ = writeln!(out, "Server: {} {}", host, server.version);
    let _ = writeln!(out, "State: {}", shared.state());
    match shared.lag() {
        Some(lag) => {
            let _ = writeln!(out, "Lag: {lag:?}");
        }
        None => out.push_str("Lag: unknown\n"),
    }

    let summaries = roster.summaries();
    let listed = summaries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let _ = write!(out, "Channels({}): {}", summaries.len(), listed);
    out
}
