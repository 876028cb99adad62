use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};

use suitcast_core::{ManualRule, ModeTransition, Rule};
use suitcast_relay::config::RelayConfig;
use suitcast_relay::feed::write_feed;
use suitcast_relay::logging::init_logging;
use suitcast_relay::relay::Relay;
use suitcast_relay::simulate::{SimulationConfig, generate};

/// Suit prediction relay for a live card-game channel.
#[derive(Debug, Parser)]
#[command(
    name = "suitcast",
    author,
    version,
    about = "Suit prediction relay for a live card-game channel"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "relay.yaml")]
    config: PathBuf,

    /// Override the instance name (substitutes {instance} templates).
    #[arg(long, value_name = "NAME")]
    instance: Option<String>,

    /// Override the snapshot file location.
    #[arg(long, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and validate the configuration, then exit.
    Validate,
    /// Feed a recorded JSONL channel log through the engine.
    Replay {
        #[arg(long, value_name = "FILE")]
        feed: PathBuf,
    },
    /// Write a synthetic JSONL feed for the source channel.
    Simulate {
        #[arg(long, default_value_t = 100)]
        games: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Print regime, rules and ledger counts.
    Status,
    /// Switch INTER mode.
    Inter {
        #[arg(value_enum)]
        action: InterAction,
    },
    /// Rebuild learned rules from collected samples now.
    Learn,
    /// Submit a batch of eight manual rules from a YAML list.
    Manual {
        #[arg(long, value_name = "FILE")]
        rules: PathBuf,
    },
    /// Drop every recorded prediction.
    ResetStock,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InterAction {
    Activate,
    Default,
    Toggle,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = RelayConfig::from_path(&cli.config)?;

    if let Some(instance) = cli.instance {
        config.instance = instance;
    }

    if let Some(snapshot) = cli.snapshot {
        config.storage.snapshot = snapshot.display().to_string();
    }

    config.validate()?;

    let paths = config.resolved_paths();
    let instance = config.instance.clone();
    println!(
        "Loaded configuration '{instance}' (source {}, prediction {})",
        config.channels.source, config.channels.prediction
    );

    let _logging_guard = init_logging(&config.logging, &paths, &instance)?;

    match cli.command {
        Command::Validate => {
            println!("Configuration is valid.");
            println!("Snapshot: {}", paths.snapshot.display());
            println!("Outbox: {}", paths.outbox.display());
        }
        Command::Simulate { games, seed, out } => {
            let sim = SimulationConfig::new(config.channels.source, games, seed, Utc::now());
            let records = generate(&sim);
            write_feed(&out, &records)
                .with_context(|| format!("writing feed to {}", out.display()))?;
            println!(
                "Wrote {} posts for {games} games to {}",
                records.len(),
                out.display()
            );
        }
        command => run_engine_command(&config, command)?,
    }

    Ok(())
}

fn run_engine_command(config: &RelayConfig, command: Command) -> anyhow::Result<()> {
    let relay = Relay::open(config).context("opening relay")?;

    match command {
        Command::Replay { feed } => {
            let summary = relay
                .replay_file(&feed)
                .with_context(|| format!("replaying {}", feed.display()))?;
            println!(
                "Replayed {} posts ({} foreign, {} duplicate)",
                summary.posts, summary.foreign_posts, summary.duplicates
            );
            println!(
                "Predictions: {} created, {} won, {} lost",
                summary.predictions, summary.won, summary.lost
            );
            println!(
                "Learning passes: {}, daily resets: {}",
                summary.learning_passes, summary.resets
            );
            println!("Outbox: {}", relay.paths().outbox.display());
        }
        Command::Status => {
            let status = relay.status();
            println!("Regime: {}", status.regime);
            println!(
                "Static failure streak: {}",
                status.mode.consecutive_static_failures
            );
            if let Some(date) = status.last_reset_date {
                println!("Last daily reset: {date}");
            }
            println!(
                "Ledger: {} total, {} pending, {} won, {} lost",
                status.ledger.total, status.ledger.pending, status.ledger.won, status.ledger.lost
            );
            println!(
                "History: {} games, {} samples, last predicted game {}",
                status.history_len, status.samples, status.last_predicted_game
            );
            print_rules("Manual rules", &status.manual_rules);
            print_rules("Learned rules", &status.learned_rules);
            println!("Static rules: {}", status.static_rules);
        }
        Command::Inter { action } => {
            let transition = match action {
                InterAction::Activate => relay.activate_inter(),
                InterAction::Default => relay.deactivate_inter(),
                InterAction::Toggle => Some(relay.toggle_inter()),
            };
            print_transition(transition, &relay);
        }
        Command::Learn => {
            let report = relay.force_learning(Utc::now());
            if report.replaced {
                println!(
                    "Learned {} rules from {} samples",
                    report.learned_rules, report.samples
                );
            } else {
                println!("No samples collected; learned rules kept");
            }
            print_transition(report.transition, &relay);
        }
        Command::Manual { rules } => {
            let file = File::open(&rules)
                .with_context(|| format!("opening manual rules at {}", rules.display()))?;
            let batch: Vec<ManualRule> = serde_yaml::from_reader(BufReader::new(file))
                .with_context(|| format!("parsing manual rules at {}", rules.display()))?;
            let merge = relay
                .submit_manual_rules(&batch)
                .context("manual batch rejected")?;
            println!(
                "Merged {} manual rules ({} added, {} replaced, {} discarded)",
                merge.merged, merge.added, merge.replaced, merge.discarded
            );
            println!("Regime: {}", relay.status().regime);
        }
        Command::ResetStock => {
            let cleared = relay.reset_predictions();
            println!("Cleared {cleared} predictions");
        }
        Command::Validate | Command::Simulate { .. } => {}
    }

    Ok(())
}

fn print_rules(label: &str, rules: &[Rule]) {
    println!("{label}: {}", rules.len());
    for rule in rules {
        println!(
            "  {} -> {} (weight {})",
            rule.trigger, rule.predict_suit, rule.weight
        );
    }
}

fn print_transition(transition: Option<ModeTransition>, relay: &Relay) {
    match transition {
        Some(transition) => println!("Regime: {} -> {}", transition.from, transition.to),
        None => println!("Regime unchanged: {}", relay.status().regime),
    }
}
