pub mod auth;

use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_SITE_ADDR: &str = "site-addr";
pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names in `-v` count order.
const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// `MULTIPASS_LOG_LEVEL` takes either a `-v` count or a level name.
fn parse_verbosity(level: &str) -> Result<u8, String> {
    let level = level.trim();
    let index = match level.parse::<usize>() {
        Ok(count) => Some(count).filter(|count| *count < LOG_LEVELS.len()),
        Err(_) => LOG_LEVELS
            .iter()
            .position(|name| name.eq_ignore_ascii_case(level)),
    };
    index
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level: {level}"))
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("multipass")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("MULTIPASS_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SITE_ADDR)
                .short('s')
                .long(ARG_SITE_ADDR)
                .help("Public address of the site, used to build login links")
                .env("MULTIPASS_SITE_ADDR")
                .required(true),
        );

    auth::with_args(command).arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("MULTIPASS_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(ValueParser::new(parse_verbosity)),
    )
}
