pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "agentpay",
    about = "AgentPay operator CLI",
    long_about = "Inspect configuration, check readiness, preview quotes, and provision Circle wallets.",
    after_help = "Examples:\n  agentpay doctor --json\n  agentpay quote \"summarize this contract\"\n  agentpay init-wallets --name demo-set"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config and collaborator credential readiness without network calls")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Classify text and print the guarded price without moving funds")]
    Quote {
        #[arg(help = "Task text to classify")]
        text: String,
    },
    #[command(about = "Print a fresh entity secret ciphertext for console registration")]
    EntityCiphertext,
    #[command(about = "Create a wallet set with agent and merchant wallets")]
    InitWallets {
        #[arg(long, default_value = commands::init_wallets::DEFAULT_WALLET_SET_NAME)]
        name: String,
    },
}

pub fn run() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Quote { text } => commands::quote::run(&text),
        Command::EntityCiphertext => commands::entity_ciphertext::run(),
        Command::InitWallets { name } => commands::init_wallets::run(&name),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
