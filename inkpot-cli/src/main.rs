use anyhow::Result;
use clap::{Arg, ArgAction, Command};

mod cmd;
mod config;

fn cli() -> Command {
    Command::new("inkpot")
        .about("Turn a tree of markdown posts and a theme into a static blog")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log every rendered item"),
        )
        .subcommand(cmd::build::make_subcommand())
        .subcommand(cmd::clean::make_subcommand())
        .subcommand(cmd::new::make_subcommand())
}

fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("inkpot={},inkpot_core={}", log_level, log_level))
    });
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    match matches.subcommand() {
        Some(("build", args)) => cmd::build::execute(args),
        Some(("clean", args)) => cmd::clean::execute(args),
        Some(("new", args)) => cmd::new::execute(args),
        _ => unreachable!("subcommand_required is set"),
    }
}
