mod cli;
mod config;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use access_rules::{
    loader, Decision, DefaultAction, RuleCollection, RulesFile, StaticPrincipal, Verdict,
};

use crate::cli::{Cli, Command};

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Load the rules file and build the collection it describes.
fn load_rules(path: &Path) -> Result<(RuleCollection, DefaultAction)> {
    let file = loader::load_rules(path).context("failed to load rules file")?;
    let rules = loader::build_collection(&file)
        .with_context(|| format!("failed to build rules from {}", path.display()))?;

    info!(
        rules_file = %path.display(),
        rules = rules.len(),
        default_action = ?file.default_action,
        "rules loaded"
    );

    Ok((rules, file.default_action))
}

fn principal_for(user: Option<String>, roles: Vec<String>) -> StaticPrincipal {
    match user {
        Some(name) => StaticPrincipal::user(name).with_roles(roles),
        None => StaticPrincipal::anonymous(),
    }
}

/// Format a resolved decision for stdout.
fn render_decision(decision: &Decision, json: bool) -> Result<String> {
    if json {
        let value = serde_json::json!({
            "verdict": decision.verdict,
            "matched_rule": decision.rule_name,
            "rule_index": decision.rule_index,
            "reason": decision.reason(),
        });
        serde_json::to_string(&value).context("failed to encode decision")
    } else {
        Ok(format!("{} ({})", decision.verdict, decision.reason()))
    }
}

fn exit_code(verdict: Verdict) -> ExitCode {
    if verdict.is_allow() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge CLI overrides.
    let (mut cfg, missing_config) = config::load(&cli.config)?;

    if let Some(ref rules) = cli.rules {
        cfg.rules_file = rules.clone();
    }

    // 3. Init tracing-subscriber with JSON format on stderr.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    config::report(missing_config);

    info!(
        config_file = %cli.config.display(),
        rules_file = %cfg.rules_file.display(),
        "rulegate starting"
    );

    // 4. Load rules.
    let (rules, default_action) = load_rules(&cfg.rules_file)?;

    // 5. Run the command.
    match cli.command {
        Command::Check {
            verb,
            address,
            user,
            roles,
            json,
        } => {
            let principal = principal_for(user, roles);
            let decision = rules
                .decide(&principal, &verb, &address)
                .resolve(default_action.verdict());

            info!(
                verb = verb.as_str(),
                address = address.as_str(),
                verdict = %decision.verdict,
                matched_rule = decision.rule_name.as_deref(),
                "request evaluated"
            );

            println!("{}", render_decision(&decision, json)?);
            Ok(exit_code(decision.verdict))
        }
        Command::Show => {
            let compact = RulesFile::from_collection(&rules, default_action);
            print!("{}", loader::render_rules(&compact)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
