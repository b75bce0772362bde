use crate::CLAP_STYLING;
use clap::{Arg, arg, command};
use shelfscan_core::harvest::DEFAULT_MAX_MENU_LEVEL;
use shelfscan_scanner::config::{
    DEFAULT_API_URL, DEFAULT_BASE_URL, DEFAULT_CITY_ID, DEFAULT_TIMEOUT_SECS,
};

pub const DEFAULT_DB_PATH: &str = "~/.config/shelfscan/shelfscan.db";

/// Arguments of the harvest pipeline. Also accepted at the top level, so a
/// bare `shelfscan` runs a harvest.
fn harvest_args() -> Vec<Arg> {
    vec![
        arg!(--"base-url" <URL>)
            .required(false)
            .help("Storefront origin")
            .env("SHELFSCAN_BASE_URL")
            .default_value(DEFAULT_BASE_URL),
        arg!(--"api-url" <URL>)
            .required(false)
            .help("Origin of the category menu API")
            .env("SHELFSCAN_API_URL")
            .default_value(DEFAULT_API_URL),
        arg!(--"city-id" <UUID>)
            .required(false)
            .help("City whose assortment and prices are harvested")
            .env("SHELFSCAN_CITY_ID")
            .default_value(DEFAULT_CITY_ID),
        arg!(--"csrf-token" <TOKEN>)
            .required(false)
            .help("Value of the x-csrf-token header sent with listing requests")
            .env("SHELFSCAN_CSRF_TOKEN")
            .hide_env_values(true),
        arg!(--"csrf-cookie" <VALUE>)
            .required(false)
            .help("Value of the _csrf cookie sent with listing requests")
            .env("SHELFSCAN_CSRF_COOKIE")
            .hide_env_values(true),
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help(format!("Request timeout in seconds [default: {DEFAULT_TIMEOUT_SECS}]"))
            .env("SHELFSCAN_TIMEOUT")
            .value_parser(clap::value_parser!(u64).range(1..)),
        arg!(--"max-menu-level" <LEVEL>)
            .required(false)
            .help(format!(
                "Depth of the category menu to request [default: {DEFAULT_MAX_MENU_LEVEL}]"
            ))
            .env("SHELFSCAN_MAX_MENU_LEVEL")
            .value_parser(clap::value_parser!(u8).range(1..)),
        arg!(--"reset")
            .required(false)
            .help("Delete all stored categories, products and relations before harvesting")
            .action(clap::ArgAction::SetTrue),
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Save the harvest summary to a file (default: display to screen)")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
        arg!(-f --"format" <FORMAT>)
            .required(false)
            .help("Summary format: text, json")
            .value_parser(["text", "json"])
            .default_value("text"),
    ]
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("shelfscan")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("shelfscan")
        .about("Harvests a storefront's category tree and products into SQLite")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and progress output").required(false))
        .arg(
            arg!(-v --"verbose" "Log every request")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(--"db" <PATH>)
                .required(false)
                .help("Location of the SQLite database")
                .env("SHELFSCAN_DB")
                .default_value(DEFAULT_DB_PATH)
                .global(true),
        )
        .args(harvest_args())
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Creates the database and its tables")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location of the database file (default: --db)"),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Deletes any existing database at the location first")
                        .required(false),
                ),
        )
        .subcommand(
            command!("harvest")
                .about("Fetches the category tree and every leaf category's products (default)")
                .args(harvest_args()),
        )
        .subcommand(
            command!("products")
                .about("Lists a random sample of harvested products")
                .arg(
                    arg!(-c --"category" <TEXT>)
                        .required(false)
                        .help("Only products in categories whose title contains TEXT"),
                )
                .arg(
                    arg!(-p --"price" <BAND>)
                        .required(false)
                        .help("Price band, bounds inclusive: low (0-5000), medium (5000-20000), high (20000+), any")
                        .value_parser(["low", "medium", "high", "any"])
                        .default_value("any"),
                )
                .arg(
                    arg!(-l --"limit" <N>)
                        .required(false)
                        .help("Number of products to list")
                        .value_parser(clap::value_parser!(u32).range(1..))
                        .default_value("5"),
                )
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print the products as JSON")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(command!("stats").about("Shows how many rows each table holds"))
}
