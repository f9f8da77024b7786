use crate::cli::commands::{Cli, Commands, ConfigCommands, KbCommands};
use anyhow::{Context, Result};
use helpline::Config;
use helpline::gateway::run_gateway;
use helpline::knowledge::KnowledgeBase;

pub async fn dispatch(cli: Cli, mut config: Config) -> Result<()> {
    match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(host) = host {
                config.gateway.host = host;
            }
            let host = config.gateway.host.clone();
            let port = config.gateway.port;
            run_gateway(&host, port, config).await
        }
        Commands::Kb { kb_command } => {
            let knowledge = KnowledgeBase::load(config.knowledge.path.as_deref())?;
            run_kb_command(&knowledge, kb_command)
        }
        Commands::Config {
            config_command: ConfigCommands::Show,
        } => {
            let shown = toml::to_string_pretty(&config.redacted())
                .context("Failed to serialize config")?;
            println!("# {}", config.config_path.display());
            println!("{shown}");
            Ok(())
        }
    }
}

fn run_kb_command(knowledge: &KnowledgeBase, command: KbCommands) -> Result<()> {
    match command {
        KbCommands::Stats => {
            let stats = knowledge.stats();
            println!("Entries:    {}", stats.total_entries);
            println!("Categories: {}", stats.categories);
            println!("Keywords:   {}", stats.total_keywords);
        }
        KbCommands::Match { query } => match knowledge.find_match(&query) {
            Some(hit) => {
                println!("✓ {} ({})", hit.key, hit.category);
                println!();
                println!("{}", hit.response);
            }
            None => println!("! no knowledge-base entry matches; the AI fallback would answer"),
        },
        KbCommands::Categories => {
            for (category, keys) in knowledge.categories() {
                println!("{category}: {}", keys.join(", "));
            }
        }
    }
    Ok(())
}
