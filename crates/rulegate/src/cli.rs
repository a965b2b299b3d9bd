use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rulegate", version, about = "Check requests against access rules")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "rulegate.yaml")]
    pub config: PathBuf,

    /// Path to the rules file (overrides config file setting)
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate one request and exit 0 on allow, 1 on deny
    Check {
        /// HTTP verb of the request
        #[arg(long)]
        verb: String,

        /// Source address of the request
        #[arg(long)]
        address: String,

        /// Authenticated user name; omit for an anonymous request
        #[arg(short, long)]
        user: Option<String>,

        /// Role held by the user (repeatable)
        #[arg(long = "role", requires = "user")]
        roles: Vec<String>,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the loaded rules in evaluation order, defaults omitted
    Show,
}
