use colored::Colorize;
use shelfscan::commands::command_argument_builder;
use shelfscan::handlers::{
    handle_harvest, handle_init, handle_products, handle_stats, init_logging,
};
use shelfscan_core::banner;

#[tokio::main]
async fn main() {
    // A missing .env file is fine; flags and the process environment still apply
    dotenvy::dotenv().ok();

    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    init_logging(chosen_command.get_flag("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        println!("{}", banner().bright_cyan());
    }

    let result = match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("harvest", primary_command)) => handle_harvest(primary_command, quiet).await,
        Some(("products", primary_command)) => handle_products(primary_command),
        Some(("stats", primary_command)) => handle_stats(primary_command),
        // No subcommand: the harvest arguments live on the top-level command too
        None => handle_harvest(&chosen_command, quiet).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
