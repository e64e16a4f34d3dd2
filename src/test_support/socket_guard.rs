//! Skips wiremock-backed tests where localhost sockets cannot be bound.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

/// Set to `1` to turn a socket-less environment into a test failure.
const REQUIRE_SOCKETS_ENV: &str = "SITE_MIRROR_REQUIRE_SOCKET_TESTS";

/// Starts a mock server, or returns `None` when the sandbox forbids binding
/// a localhost port.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl Future<Output = Option<MockServer>> {
    let location = Location::caller();
    let can_bind = TcpListener::bind("127.0.0.1:0").is_ok();

    async move {
        if can_bind {
            return Some(MockServer::start().await);
        }

        let required = std::env::var(REQUIRE_SOCKETS_ENV)
            .is_ok_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
        let message = format!(
            "[socket-bound-test] cannot bind localhost socket at {}:{}",
            location.file(),
            location.line()
        );
        assert!(!required, "{message}; {REQUIRE_SOCKETS_ENV} is set");
        eprintln!("{message}; skipping");
        None
    }
}
