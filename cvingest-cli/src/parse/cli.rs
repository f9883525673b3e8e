use clap::{Arg, ArgAction, Command, arg, value_parser};

pub use super::consts::*;

pub fn create_parse_cli() -> Command {
    Command::new(PARSE_CMD)
        .about("Parse a ClinVar release (plain or gzipped) into one NDJSON file per entity type.")
        .arg(
            Arg::new("input")
                .required(true)
                .help("Path to a ClinVarVariationRelease or ClinVarRCVRelease XML file."),
        )
        .arg(arg!(--output <output> "Directory the <entity_type>.ndjson files are written to."))
        .arg(arg!(--config <config> "TOML file with ingest settings. Flags override it."))
        .arg(
            Arg::new("no-flatten")
                .long("no-flatten")
                .action(ArgAction::SetTrue)
                .help("Emit one nested record per archive instead of disassembling it."),
        )
        .arg(
            Arg::new("stringify")
                .long("stringify")
                .action(ArgAction::SetTrue)
                .help("Encode nested content fields as JSON strings."),
        )
        .arg(arg!(--limit <limit> "Stop after this many records.").value_parser(value_parser!(u64)))
        .arg(
            arg!(--"queue-capacity" <capacity> "Records buffered between reader and pipeline.")
                .value_parser(value_parser!(usize)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn test_parse_args() {
        let matches = create_parse_cli()
            .try_get_matches_from([
                "parse",
                "release.xml.gz",
                "--output",
                "out",
                "--no-flatten",
                "--limit",
                "10",
                "--queue-capacity",
                "4",
            ])
            .unwrap();
        assert_eq!(matches.get_one::<String>("input").unwrap(), "release.xml.gz");
        assert_eq!(matches.get_one::<String>("output").unwrap(), "out");
        assert_eq!(matches.get_flag("no-flatten"), true);
        assert_eq!(matches.get_flag("stringify"), false);
        assert_eq!(matches.get_one::<u64>("limit"), Some(&10));
        assert_eq!(matches.get_one::<usize>("queue-capacity"), Some(&4));
        assert_eq!(matches.get_one::<String>("config"), None);
    }

    #[rstest]
    fn test_input_required() {
        assert!(create_parse_cli().try_get_matches_from(["parse"]).is_err());
    }

    #[rstest]
    #[case("--limit", "ten")]
    #[case("--queue-capacity", "-1")]
    fn test_numeric_args_rejected(#[case] flag: &str, #[case] value: &str) {
        let result = create_parse_cli().try_get_matches_from(["parse", "release.xml", flag, value]);
        assert!(result.is_err());
    }
}
