//! CLI subcommand implementations.

pub mod admin_token;
pub mod bump;
pub mod seed;
pub mod show;

/// Strip a trailing slash so joined paths never double up.
pub(crate) fn base(url: &str) -> &str {
    url.trim_end_matches('/')
}
