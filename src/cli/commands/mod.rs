use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

/// Pure clap command definitions with zero business logic
///
/// Probe settings carry no clap defaults; unset values fall back to the
/// defaults of `ProbeConfig`.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new(env!("CARGO_PKG_NAME"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("hostnames")
                .help("Hostnames to check")
                .value_name("HOSTNAME")
                .num_args(0..)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("input")
                .env("TLSPULSE_INPUT")
                .help("JSON file holding an array of hostnames, '-' reads stdin")
                .long("input")
                .short('f')
                .value_name("FILE"),
        )
        .arg(
            Arg::new("timeout")
                .env("TLSPULSE_TIMEOUT")
                .help("Connect and handshake timeout in milliseconds [default: 1000]")
                .long("timeout")
                .short('t')
                .value_name("MS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("dns-timeout")
                .env("TLSPULSE_DNS_TIMEOUT")
                .help("DNS lookup timeout in milliseconds [default: 1000]")
                .long("dns-timeout")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("port")
                .env("TLSPULSE_PORT")
                .help("TLS port to connect to [default: 443]")
                .long("port")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("verify")
                .env("TLSPULSE_VERIFY")
                .help("Fail hosts whose certificate does not verify")
                .long("verify")
                .long_help(
                    "Fail hosts whose certificate does not verify against the\n\
                    Mozilla roots (plus --ca-file when given).\n\n\
                    Without it every certificate is accepted and the verdict\n\
                    is only reported as tls.authorized."
                )
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ca-file")
                .env("TLSPULSE_CA_FILE")
                .help("PEM bundle added to the trusted roots")
                .long("ca-file")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("concurrency")
                .env("TLSPULSE_CONCURRENCY")
                .help("Maximum hosts checked at once [default: 20]")
                .long("concurrency")
                .short('c')
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("retries")
                .env("TLSPULSE_RETRIES")
                .help("Extra attempts per host after a failure [default: 1]")
                .long("retries")
                .short('r')
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("retry-delay")
                .env("TLSPULSE_RETRY_DELAY")
                .help("Fixed delay between attempts in milliseconds [default: 100]")
                .long("retry-delay")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("interval")
                .env("TLSPULSE_INTERVAL")
                .help("Keep checking every N seconds and serve /metrics")
                .long("interval")
                .short('i')
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(u16).range(1..)),
        )
        .arg(
            Arg::new("listen")
                .env("TLSPULSE_LISTEN")
                .help("IP address to bind to (default: [::]:port, accepts both IPv6 and IPv4)")
                .long("listen")
                .long_help(
                    "IP address the /metrics endpoint binds to in monitor mode.\n\
                    Not specified (default) binds to [::]:port which accepts both IPv6 and IPv4 connections.\n\
                    Falls back to 0.0.0.0:port if IPv6 is unavailable.\n\n\
                    Usage examples:\n\
                    - `--listen 0.0.0.0` binds IPv4 only\n\
                    - `--listen ::1` binds IPv6 loopback"
                )
                .short('l')
                .value_name("IP")
                .requires("interval"),
        )
        .arg(
            Arg::new("metrics-port")
                .default_value("9300")
                .env("TLSPULSE_METRICS_PORT")
                .help("listening port for /metrics")
                .long("metrics-port")
                .short('p')
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("verbose")
                .help("Increase log verbosity (-v info, -vv debug, -vvv trace)")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count),
        )
}
