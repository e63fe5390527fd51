use crate::gate::LockoutScope;
use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_AGENTS_FILE: &str = "agents-file";
pub const ARG_DOCS_DIR: &str = "docs-dir";
pub const ARG_PUBLIC_URL: &str = "public-url";
pub const ARG_TRUST_FORWARDED_HEADERS: &str = "trust-forwarded-headers";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_MAX_LOGIN_ATTEMPTS: &str = "max-login-attempts";
pub const ARG_LOCKOUT_SECONDS: &str = "lockout-seconds";
pub const ARG_LOCKOUT_SCOPE: &str = "lockout-scope";
pub const ARG_SWEEP_INTERVAL_SECONDS: &str = "sweep-interval-seconds";

/// Upper bound for session and lockout durations: one year.
pub const MAX_DURATION_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug)]
pub struct Options {
    pub agents_file: String,
    pub docs_dir: String,
    pub public_url: String,
    pub trust_forwarded_headers: bool,
    pub session_ttl_seconds: i64,
    pub max_login_attempts: u32,
    pub lockout_seconds: i64,
    pub lockout_scope: LockoutScope,
    pub sweep_interval_seconds: u64,
}

impl Options {
    /// Parse gate arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let read_required = |id: &str| -> Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            agents_file: read_required(ARG_AGENTS_FILE)?,
            docs_dir: read_required(ARG_DOCS_DIR)?,
            public_url: read_required(ARG_PUBLIC_URL)?,
            trust_forwarded_headers: matches.get_flag(ARG_TRUST_FORWARDED_HEADERS),
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(86_400),
            max_login_attempts: matches
                .get_one::<u32>(ARG_MAX_LOGIN_ATTEMPTS)
                .copied()
                .unwrap_or(5),
            lockout_seconds: matches
                .get_one::<i64>(ARG_LOCKOUT_SECONDS)
                .copied()
                .unwrap_or(900),
            lockout_scope: matches
                .get_one::<LockoutScope>(ARG_LOCKOUT_SCOPE)
                .copied()
                .unwrap_or_default(),
            sweep_interval_seconds: matches
                .get_one::<u64>(ARG_SWEEP_INTERVAL_SECONDS)
                .copied()
                .unwrap_or(60),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_access_args(command);
    with_lockout_args(command)
}

fn with_access_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AGENTS_FILE)
                .long(ARG_AGENTS_FILE)
                .help("Path to the agents JSON file")
                .env("DOCGATE_AGENTS_FILE")
                .required(true),
        )
        .arg(
            Arg::new(ARG_DOCS_DIR)
                .long(ARG_DOCS_DIR)
                .help("Directory holding the whitelisted documents")
                .env("DOCGATE_DOCS_DIR")
                .default_value("."),
        )
        .arg(
            Arg::new(ARG_PUBLIC_URL)
                .long(ARG_PUBLIC_URL)
                .help("Public base URL; cookies are marked Secure when it is https")
                .env("DOCGATE_PUBLIC_URL")
                .default_value("https://localhost"),
        )
        .arg(
            Arg::new(ARG_TRUST_FORWARDED_HEADERS)
                .long(ARG_TRUST_FORWARDED_HEADERS)
                .help("Take the client address from x-forwarded-for / x-real-ip")
                .env("DOCGATE_TRUST_FORWARDED_HEADERS")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session lifetime in seconds")
                .env("DOCGATE_SESSION_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_DURATION_SECONDS)),
        )
}

fn with_lockout_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MAX_LOGIN_ATTEMPTS)
                .long(ARG_MAX_LOGIN_ATTEMPTS)
                .help("Failed logins allowed before the caller is locked out")
                .env("DOCGATE_MAX_LOGIN_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_SECONDS)
                .long(ARG_LOCKOUT_SECONDS)
                .help("Lockout window in seconds, measured from the last failure")
                .env("DOCGATE_LOCKOUT_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_DURATION_SECONDS)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_SCOPE)
                .long(ARG_LOCKOUT_SCOPE)
                .help("What failed logins are counted against")
                .env("DOCGATE_LOCKOUT_SCOPE")
                .default_value("caller-session")
                .value_parser(|value: &str| value.parse::<LockoutScope>()),
        )
        .arg(
            Arg::new(ARG_SWEEP_INTERVAL_SECONDS)
                .long(ARG_SWEEP_INTERVAL_SECONDS)
                .help("How often expired sessions and lockouts are purged")
                .env("DOCGATE_SWEEP_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> Command {
        with_args(Command::new("docgate"))
    }

    #[test]
    fn defaults() -> Result<()> {
        temp_env::with_vars(
            [
                ("DOCGATE_DOCS_DIR", None::<&str>),
                ("DOCGATE_PUBLIC_URL", None),
                ("DOCGATE_TRUST_FORWARDED_HEADERS", None),
                ("DOCGATE_SESSION_TTL_SECONDS", None),
                ("DOCGATE_MAX_LOGIN_ATTEMPTS", None),
                ("DOCGATE_LOCKOUT_SECONDS", None),
                ("DOCGATE_LOCKOUT_SCOPE", None),
                ("DOCGATE_SWEEP_INTERVAL_SECONDS", None),
            ],
            || {
                let matches = command().try_get_matches_from([
                    "docgate",
                    "--agents-file",
                    "/etc/docgate/agents.json",
                ])?;
                let options = Options::parse(&matches)?;
                assert_eq!(options.agents_file, "/etc/docgate/agents.json");
                assert_eq!(options.docs_dir, ".");
                assert_eq!(options.public_url, "https://localhost");
                assert!(!options.trust_forwarded_headers);
                assert_eq!(options.session_ttl_seconds, 86_400);
                assert_eq!(options.max_login_attempts, 5);
                assert_eq!(options.lockout_seconds, 900);
                assert_eq!(options.lockout_scope, LockoutScope::CallerSession);
                assert_eq!(options.sweep_interval_seconds, 60);
                Ok(())
            },
        )
    }

    #[test]
    fn env_overrides() -> Result<()> {
        temp_env::with_vars(
            [
                ("DOCGATE_AGENTS_FILE", Some("/srv/agents.json")),
                ("DOCGATE_DOCS_DIR", Some("/srv/docs")),
                ("DOCGATE_PUBLIC_URL", Some("http://localhost:8080")),
                ("DOCGATE_TRUST_FORWARDED_HEADERS", Some("true")),
                ("DOCGATE_SESSION_TTL_SECONDS", Some("3600")),
                ("DOCGATE_MAX_LOGIN_ATTEMPTS", Some("3")),
                ("DOCGATE_LOCKOUT_SECONDS", Some("60")),
                ("DOCGATE_LOCKOUT_SCOPE", Some("client-address")),
                ("DOCGATE_SWEEP_INTERVAL_SECONDS", Some("5")),
            ],
            || {
                let matches = command().try_get_matches_from(["docgate"])?;
                let options = Options::parse(&matches)?;
                assert_eq!(options.agents_file, "/srv/agents.json");
                assert_eq!(options.docs_dir, "/srv/docs");
                assert_eq!(options.public_url, "http://localhost:8080");
                assert!(options.trust_forwarded_headers);
                assert_eq!(options.session_ttl_seconds, 3600);
                assert_eq!(options.max_login_attempts, 3);
                assert_eq!(options.lockout_seconds, 60);
                assert_eq!(options.lockout_scope, LockoutScope::ClientAddress);
                assert_eq!(options.sweep_interval_seconds, 5);
                Ok(())
            },
        )
    }

    #[test]
    fn invalid_values_are_rejected() {
        temp_env::with_vars(
            [
                ("DOCGATE_AGENTS_FILE", Some("/srv/agents.json")),
                ("DOCGATE_LOCKOUT_SCOPE", None::<&str>),
                ("DOCGATE_MAX_LOGIN_ATTEMPTS", None),
                ("DOCGATE_SESSION_TTL_SECONDS", None),
                ("DOCGATE_LOCKOUT_SECONDS", None),
            ],
            || {
                let result =
                    command().try_get_matches_from(["docgate", "--lockout-scope", "galaxy"]);
                assert_eq!(
                    result.map(|_| ()).map_err(|e| e.kind()),
                    Err(clap::error::ErrorKind::ValueValidation)
                );

                let result =
                    command().try_get_matches_from(["docgate", "--max-login-attempts", "0"]);
                assert_eq!(
                    result.map(|_| ()).map_err(|e| e.kind()),
                    Err(clap::error::ErrorKind::ValueValidation)
                );

                for arg in ["--session-ttl-seconds", "--lockout-seconds"] {
                    let result = command().try_get_matches_from([
                        "docgate",
                        arg,
                        "9000000000000",
                    ]);
                    assert_eq!(
                        result.map(|_| ()).map_err(|e| e.kind()),
                        Err(clap::error::ErrorKind::ValueValidation)
                    );
                }
            },
        );
    }

    #[test]
    fn one_year_durations_are_accepted() -> Result<()> {
        temp_env::with_vars(
            [
                ("DOCGATE_AGENTS_FILE", Some("/srv/agents.json")),
                ("DOCGATE_SESSION_TTL_SECONDS", None::<&str>),
                ("DOCGATE_LOCKOUT_SECONDS", None),
            ],
            || {
                let max = MAX_DURATION_SECONDS.to_string();
                let matches = command().try_get_matches_from([
                    "docgate",
                    "--session-ttl-seconds",
                    max.as_str(),
                    "--lockout-seconds",
                    max.as_str(),
                ])?;
                let options = Options::parse(&matches)?;
                assert_eq!(options.session_ttl_seconds, 31_536_000);
                assert_eq!(options.lockout_seconds, 31_536_000);
                Ok(())
            },
        )
    }

    #[test]
    fn agents_file_is_required() {
        temp_env::with_vars([("DOCGATE_AGENTS_FILE", None::<&str>)], || {
            let result = command().try_get_matches_from(["docgate"]);
            assert_eq!(
                result.map(|_| ()).map_err(|e| e.kind()),
                Err(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }
}
