use crate::cli::{
    actions::{server::Args, Action},
    commands::{auth, ARG_PORT, ARG_SITE_ADDR},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;

fn many(matches: &clap::ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| {
            values
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn private_key(matches: &clap::ArgMatches) -> Result<Option<SecretString>> {
    if let Some(pem) = matches.get_one::<String>(auth::ARG_PRIVATE_KEY) {
        return Ok(Some(SecretString::from(pem.clone())));
    }
    let Some(path) = matches.get_one::<String>(auth::ARG_PRIVATE_KEY_PATH) else {
        return Ok(None);
    };
    let pem = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read private key from {path}"))?;
    Ok(Some(SecretString::from(pem)))
}

/// # Errors
/// Returns an error if required arguments are missing or the private key file
/// cannot be read.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let site_addr = matches
        .get_one::<String>(ARG_SITE_ADDR)
        .cloned()
        .context("missing required argument: --site-addr")?;

    Ok(Action::Server(Args {
        port,
        site_addr,
        base_path: matches.get_one::<String>(auth::ARG_BASE_PATH).cloned(),
        token_ttl: Duration::from_secs(
            matches
                .get_one::<u64>(auth::ARG_TOKEN_TTL)
                .copied()
                .unwrap_or(86_400),
        ),
        csrf: matches.get_one::<bool>(auth::ARG_CSRF).copied().unwrap_or(true),
        short: matches.get_one::<bool>(auth::ARG_SHORT).copied().unwrap_or(true),
        short_ttl: Duration::from_secs(
            matches
                .get_one::<u64>(auth::ARG_SHORT_TTL)
                .copied()
                .unwrap_or(60),
        ),
        short_length: matches
            .get_one::<u16>(auth::ARG_SHORT_LENGTH)
            .map_or(80, |&length| usize::from(length)),
        resources: many(matches, auth::ARG_RESOURCE),
        handles: many(matches, auth::ARG_HANDLE),
        protected_resources: many(matches, auth::ARG_PROTECTED_RESOURCE),
        private_key: private_key(matches)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    fn dispatch(args: &[&str]) -> Result<Args> {
        let matches = commands::new().try_get_matches_from(args)?;
        match handler(&matches)? {
            Action::Server(args) => Ok(args),
        }
    }

    #[test]
    fn test_handler_builds_server_args() -> Result<()> {
        let args = dispatch(&[
            "multipass",
            "--site-addr",
            "http://localhost:8080",
            "--port",
            "9000",
            "--resource",
            "/private, ,/secret",
            "--handle",
            "leeloo@dallas",
            "--private-key",
            "pem-data",
        ])?;

        assert_eq!(args.port, 9000);
        assert_eq!(args.site_addr, "http://localhost:8080");
        assert_eq!(args.resources, vec!["/private", "/secret"]);
        assert_eq!(args.handles, vec!["leeloo@dallas"]);
        assert_eq!(
            args.private_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("pem-data".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_handler_reads_private_key_path() -> Result<()> {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/signing_key.pem");
        let args = dispatch(&[
            "multipass",
            "--site-addr",
            "http://localhost",
            "--private-key-path",
            path,
        ])?;
        let pem = args
            .private_key
            .as_ref()
            .map(|k| k.expose_secret().to_string())
            .unwrap_or_default();
        assert!(pem.contains("PRIVATE KEY"));
        Ok(())
    }

    #[test]
    fn test_handler_missing_private_key_path() {
        let result = dispatch(&[
            "multipass",
            "--site-addr",
            "http://localhost",
            "--private-key-path",
            "/nonexistent/multipass.pem",
        ]);
        assert!(result.is_err());
    }
}
