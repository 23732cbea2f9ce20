//! Dev-server URL detection in process output.

use once_cell::sync::Lazy;
use regex::Regex;

/// Most specific first; the generic localhost patterns come last.
static PORT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"Local:\s+https?://(?:localhost|127\.0\.0\.1|\[::1\]):(\d+)", // Vite: "Local:   http://localhost:5173/"
        r"Local server:\s+https?://localhost:(\d+)",
        r"ready - started server on.*:(\d+)", // Next.js: "ready - started server on 0.0.0.0:3000"
        r"Server ready at https?://localhost:(\d+)",
        r"Running at https?://localhost:(\d+)",
        r"server running on port (\d+)",
        r"https?://localhost:(\d+)",
        r"https?://127\.0\.0\.1:(\d+)",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Extract the port a dev server announced in a log line, if any
pub fn extract_port_from_log(line: &str) -> Option<u16> {
    PORT_PATTERNS.iter().find_map(|regex| {
        regex
            .captures(line)
            .and_then(|captures| captures.get(1))
            .and_then(|port| port.as_str().parse::<u16>().ok())
            .filter(|port| *port != 0)
    })
}

pub fn localhost_url(port: u16) -> String {
    format!("http://localhost:{}", port)
}
