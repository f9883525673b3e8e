pub mod cli;
pub mod handlers;

pub mod consts {
    pub const PARSE_CMD: &str = "parse";
    pub const DEFAULT_OUT: &str = "cvingest_out";
}
