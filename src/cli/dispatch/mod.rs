//! Map parsed CLI arguments to the action to run.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::gate;
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let gate_opts = gate::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        agents_file: gate_opts.agents_file,
        docs_dir: gate_opts.docs_dir,
        public_url: gate_opts.public_url,
        trust_forwarded_headers: gate_opts.trust_forwarded_headers,
        session_ttl_seconds: gate_opts.session_ttl_seconds,
        max_login_attempts: gate_opts.max_login_attempts,
        lockout_seconds: gate_opts.lockout_seconds,
        lockout_scope: gate_opts.lockout_scope,
        sweep_interval_seconds: gate_opts.sweep_interval_seconds,
    }))
}
