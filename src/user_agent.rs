//! User-Agent string sent with every mirror request.

/// Product token used in the User-Agent.
const PRODUCT: &str = env!("CARGO_PKG_NAME");

/// Default User-Agent for mirror requests (identifies the tool and version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("{PRODUCT}/{version}")
}
