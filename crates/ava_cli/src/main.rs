use anyhow::Context;
use ava_core::{AvaConfig, EmotionPort, EmotionalSnapshot};
use ava_gateway::GatewayServer;
use ava_limbic::EmotionalSystem;
use ava_runtime::{build_subsystems, Orchestrator};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

mod logging;

#[derive(Parser, Debug)]
#[command(name = "ava", author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file (missing file falls back to defaults)
    #[arg(short, long, env = "AVA_CONFIG", default_value = "ava.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Talk to Ava in the terminal
    Chat,
    /// Print the emotional reading of a piece of text
    Analyze {
        /// Text to analyze
        text: String,
    },
    /// Start, print the system status as JSON, then shut down
    Status,
    /// Run the HTTP gateway until Ctrl-C
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = AvaConfig::load_or_default(&args.config);
    let _log_guard = logging::init(&config.logging, &config.log_dir());
    info!("Ava starting (env {})", config.env);

    match args.command {
        Command::Analyze { text } => analyze(&config, &text).await,
        Command::Chat => chat(&config).await,
        Command::Status => status(&config).await,
        Command::Serve => serve(&config).await,
    }
}

async fn boot(config: &AvaConfig) -> anyhow::Result<Arc<Orchestrator>> {
    config.setup_directories()?;
    let subsystems = build_subsystems(config)?;
    let orchestrator = Arc::new(Orchestrator::new(config, subsystems));
    orchestrator.start().await.context("Ava failed to start")?;
    Ok(orchestrator)
}

fn print_analysis(snapshot: &EmotionalSnapshot) {
    println!("Primary Emotion: {}", snapshot.primary);
    println!("Intensity: {:.2}", snapshot.intensity);
    println!("Valence: {:+.2}", snapshot.valence);
    println!("Arousal: {:.2}", snapshot.arousal);
}

async fn analyze(config: &AvaConfig, text: &str) -> anyhow::Result<()> {
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("nothing to analyze: text is empty");
    }
    let emotion = EmotionalSystem::new(config.emotional.clone());
    let snapshot = emotion.analyze_text(text).await?;
    print_analysis(&snapshot);
    Ok(())
}

async fn chat(config: &AvaConfig) -> anyhow::Result<()> {
    let orchestrator = boot(config).await?;
    let emotion = orchestrator.subsystems().emotion.clone();

    println!("Welcome to Ava. Type 'exit' or 'quit' to leave.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                println!("\nChat session interrupted");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        match emotion.analyze_text(input).await {
            Ok(snapshot) => println!(
                "[{} | intensity {:.2} | valence {:+.2}]",
                snapshot.primary, snapshot.intensity, snapshot.valence
            ),
            Err(e) => error!("Emotional analysis failed: {:#}", e),
        }
        let response = orchestrator.process_message(input).await;
        println!("\nAva: {}\n", response);
    }

    println!("\nGoodbye");
    if let Some(summary) = orchestrator.end_conversation().await {
        info!("Conversation summary: {}", summary);
    }
    orchestrator.shutdown().await?;
    Ok(())
}

async fn status(config: &AvaConfig) -> anyhow::Result<()> {
    let orchestrator = boot(config).await?;
    orchestrator.check_system_health().await;
    let status = orchestrator.get_system_status().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    orchestrator.shutdown().await?;
    Ok(())
}

async fn serve(config: &AvaConfig) -> anyhow::Result<()> {
    let orchestrator = boot(config).await?;
    let server = GatewayServer::new(orchestrator.clone(), &config.gateway);

    let served = server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Ctrl-C received, shutting down");
        })
        .await;

    orchestrator.shutdown().await?;
    served
}
