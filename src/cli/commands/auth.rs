use clap::{builder::BoolishValueParser, Arg, ArgAction, Command};

pub const ARG_BASE_PATH: &str = "base-path";
pub const ARG_TOKEN_TTL: &str = "token-ttl-seconds";
pub const ARG_CSRF: &str = "csrf";
pub const ARG_SHORT: &str = "short";
pub const ARG_SHORT_TTL: &str = "short-ttl-seconds";
pub const ARG_SHORT_LENGTH: &str = "short-length";
pub const ARG_RESOURCE: &str = "resource";
pub const ARG_HANDLE: &str = "handle";
pub const ARG_PROTECTED_RESOURCE: &str = "protected-resource";
pub const ARG_PRIVATE_KEY: &str = "private-key";
pub const ARG_PRIVATE_KEY_PATH: &str = "private-key-path";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BASE_PATH)
                .long(ARG_BASE_PATH)
                .help("Path the login routes are served under")
                .default_value("/multipass")
                .env("MULTIPASS_BASE_PATH"),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL)
                .long(ARG_TOKEN_TTL)
                .help("Lifetime of issued tokens in seconds")
                .default_value("86400")
                .env("MULTIPASS_TOKEN_TTL_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_CSRF)
                .long(ARG_CSRF)
                .help("Require a CSRF token on login and sign out forms")
                .default_value("true")
                .env("MULTIPASS_CSRF")
                .action(ArgAction::Set)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_SHORT)
                .long(ARG_SHORT)
                .help("Deliver single-use short links instead of full login URLs")
                .default_value("true")
                .env("MULTIPASS_SHORT")
                .action(ArgAction::Set)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_SHORT_TTL)
                .long(ARG_SHORT_TTL)
                .help("Lifetime of short links in seconds")
                .default_value("60")
                .env("MULTIPASS_SHORT_TTL_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SHORT_LENGTH)
                .long(ARG_SHORT_LENGTH)
                .help("Number of characters in a short link code")
                .default_value("80")
                .env("MULTIPASS_SHORT_LENGTH")
                .value_parser(clap::value_parser!(u16).range(1..=1024)),
        )
        .arg(
            Arg::new(ARG_RESOURCE)
                .long(ARG_RESOURCE)
                .help("Resource path prefix granted to new tokens (repeatable)")
                .env("MULTIPASS_RESOURCES")
                .action(ArgAction::Append)
                .value_delimiter(','),
        )
        .arg(
            Arg::new(ARG_HANDLE)
                .long(ARG_HANDLE)
                .help("Handle allowed to log in (repeatable)")
                .env("MULTIPASS_HANDLES")
                .action(ArgAction::Append)
                .value_delimiter(','),
        )
        .arg(
            Arg::new(ARG_PROTECTED_RESOURCE)
                .long(ARG_PROTECTED_RESOURCE)
                .help("Resource path prefix only listed handles may reach (repeatable)")
                .env("MULTIPASS_PROTECTED_RESOURCES")
                .action(ArgAction::Append)
                .value_delimiter(','),
        )
        .arg(
            Arg::new(ARG_PRIVATE_KEY)
                .long(ARG_PRIVATE_KEY)
                .help("RSA private key (PEM); a key is generated when absent")
                .env("MULTIPASS_PRIVATE_KEY")
                .hide_env_values(true)
                .conflicts_with(ARG_PRIVATE_KEY_PATH),
        )
        .arg(
            Arg::new(ARG_PRIVATE_KEY_PATH)
                .long(ARG_PRIVATE_KEY_PATH)
                .help("Path to an RSA private key (PEM)")
                .env("MULTIPASS_PRIVATE_KEY_PATH"),
        )
}
