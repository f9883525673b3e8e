mod parse;

use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use log::LevelFilter;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const PKG_NAME: &str = "cvingest";
    pub const BIN_NAME: &str = "cvingest";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .about("Streaming ingestion of ClinVar release XML into flat, ordered entity records.")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Log at debug level."),
        )
        .subcommand(parse::cli::create_parse_cli())
}

/// `info` unless `--verbose`, RUST_LOG wins over both.
fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    pretty_env_logger::formatted_builder()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .init();
}

fn main() -> Result<()> {
    let app = build_parser();
    let matches = app.get_matches();

    init_logging(matches.get_flag("verbose"));

    match matches.subcommand() {
        //
        // PARSE
        //
        Some((parse::consts::PARSE_CMD, matches)) => {
            parse::handlers::run_parse(matches)?;
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}
