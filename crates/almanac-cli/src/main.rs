//! almanac - terminal schedule-analysis chat assistant

mod commands;
mod config;
mod ui;

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use almanac_ai::models::{DEFAULT_FALLBACK_MODEL, DEFAULT_MODEL, resolve_model};
use almanac_ai::providers::google::GoogleProvider;
use almanac_chat::{
    Attachment, Chat, ChatConfig, ChatEvent, Delivery, ModelChain, ProviderClient,
};
use clap::Parser;

/// Fixed persona sent with every request
pub(crate) const SYSTEM_INSTRUCTION: &str = "\
You are a professional secretary and time-management expert. For every schedule the user \
shares:\n\
1. Lay the entries out as a clear, chronological timetable.\n\
2. Detect overlapping or conflicting entries and warn about each conflict in **bold**.\n\
3. Answer in the user's language, with a friendly and professional tone.";

/// Opening assistant turn seeded into every interactive session
pub(crate) const GREETING: &str = "\
Hi! Paste your schedule as text (for example: Monday 10:00 team sync...) and I'll lay it \
out and check for time conflicts. You can also attach a calendar image with /attach <path>.";

/// almanac - schedule analysis chat assistant
#[derive(Parser, Debug)]
#[command(name = "almanac")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Primary model to use (default: gemini-1.5-flash)
    #[arg(short, long)]
    model: Option<String>,

    /// Fallback model tried once when the primary is unavailable
    #[arg(long)]
    fallback_model: Option<String>,

    /// Retrieve replies in one piece instead of streaming
    #[arg(long)]
    no_stream: bool,

    /// Disable TUI mode (use simple stdin/stdout)
    #[arg(long)]
    no_tui: bool,

    /// Run in non-interactive mode with a single prompt
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Attach a calendar image (JPEG or PNG) before the first turn
    #[arg(short, long)]
    attach: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// List models available to this API key
    #[arg(long)]
    list_models: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("almanac=debug")
            .init();
    }

    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();

    // Missing credential is fatal before any call is attempted
    let Some(api_key) = cfg.get_api_key() else {
        eprintln!("Error: no API key found for the Generative Language API");
        eprintln!();
        eprintln!("Options:");
        eprintln!("  1. Set the environment variable: export GOOGLE_API_KEY=your-key");
        eprintln!("  2. Add it to the config file: almanac --init-config");
        std::process::exit(1);
    };

    if args.list_models {
        return list_models(&api_key).await;
    }

    let primary_id = args
        .model
        .or(cfg.model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let fallback_id = args
        .fallback_model
        .or(cfg.fallback_model.clone())
        .unwrap_or_else(|| DEFAULT_FALLBACK_MODEL.to_string());

    let primary = resolve_model(&primary_id);
    let chain = if fallback_id == primary_id {
        ModelChain::single(primary)
    } else {
        ModelChain::new(primary, resolve_model(&fallback_id))
    };

    let delivery = if args.no_stream || cfg.stream == Some(false) {
        Delivery::Complete
    } else {
        Delivery::Streaming
    };

    let chat_config = ChatConfig {
        system_instruction: load_system_instruction(&cfg),
        chain,
        delivery,
        request_timeout: cfg
            .request_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(ChatConfig::DEFAULT_TIMEOUT),
    };

    let mut chat = Chat::new(chat_config, Arc::new(ProviderClient::new(Some(api_key))));

    if let Some(ref path) = args.attach {
        match Attachment::load(path) {
            Ok(attachment) => chat.attach(attachment),
            Err(e) => {
                eprintln!("Error attaching {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    }

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&mut chat, &command).await;
    }

    chat.push_assistant(GREETING);

    let use_tui = !args.no_tui && cfg.tui.unwrap_or(true);
    if use_tui {
        return ui::run_tui(&mut chat).await;
    }

    run_interactive(&mut chat).await
}

/// Read the system instruction from the configured file, if any
fn load_system_instruction(cfg: &config::Config) -> String {
    let Some(ref path) = cfg.system_instruction_file else {
        return SYSTEM_INSTRUCTION.to_string();
    };

    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Warning: failed to read system instruction file {}: {}", path, e);
            SYSTEM_INSTRUCTION.to_string()
        }
    }
}

/// Spawn a task that prints chat events to the terminal.
/// Used by the non-TUI modes.
fn spawn_event_printer(chat: &Chat) -> tokio::task::JoinHandle<()> {
    let mut receiver = chat.subscribe();
    let is_tty = io::stdout().is_terminal();

    tokio::spawn(async move {
        let mut printed_chars = 0usize;
        while let Ok(event) = receiver.recv().await {
            match event {
                ChatEvent::ReplyUpdate { text } => {
                    // Print only what arrived since the last update
                    let chars: Vec<char> = text.chars().collect();
                    if chars.len() > printed_chars {
                        let new_text: String = chars[printed_chars..].iter().collect();
                        print!("{}", new_text);
                        io::stdout().flush().ok();
                        printed_chars = chars.len();
                    }
                }
                ChatEvent::ReplyEnd { turn, usage } => {
                    // One-shot delivery produces no updates along the way
                    if printed_chars == 0 {
                        print!("{}", turn.text());
                    }
                    println!();
                    if is_tty {
                        println!("[{} in, {} out]", usage.input, usage.output);
                    }
                    printed_chars = 0;
                }
                ChatEvent::FallbackStart { from, to } => {
                    eprintln!("[{} unavailable, retrying with {}]", from, to);
                }
                ChatEvent::Error { message } => {
                    eprintln!("\nError: {}", message);
                }
                _ => {}
            }
        }
    })
}

async fn run_command(chat: &mut Chat, command: &str) -> anyhow::Result<()> {
    println!("almanac> {}", command);
    println!();

    let printer = spawn_event_printer(chat);
    let result = chat.send(command).await;

    // Let the printer drain the final events
    tokio::time::sleep(Duration::from_millis(100)).await;
    printer.abort();

    result.map_err(|e| anyhow::anyhow!("{}", e))
}

async fn run_interactive(chat: &mut Chat) -> anyhow::Result<()> {
    if io::stderr().is_terminal() {
        eprintln!("almanac ({})", chat.config().chain.primary.id);
        eprintln!("{}", GREETING);
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(result) = commands::parse_command(input) {
            use commands::CommandResult;
            match result {
                CommandResult::Help => println!("{}", commands::help_text()),
                CommandResult::Clear => {
                    chat.clear();
                    chat.push_assistant(GREETING);
                    println!("Cleared conversation.");
                }
                CommandResult::Exit => break,
                CommandResult::Attach(path) => match Attachment::load(&path) {
                    Ok(attachment) => {
                        println!("Attached {} ({})", attachment.label(), attachment.mime_type());
                        chat.attach(attachment);
                    }
                    Err(e) => println!("Could not attach {}: {}", path.display(), e),
                },
                CommandResult::Detach => {
                    if chat.detach() {
                        println!("Attachment removed.");
                    } else {
                        println!("No attachment to remove.");
                    }
                }
                CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            println!();
            continue;
        }

        println!();

        let printer = spawn_event_printer(chat);
        if let Err(e) = chat.send(input).await {
            tracing::debug!(error = %e, "turn failed");
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        printer.abort();

        println!();
    }

    Ok(())
}

async fn list_models(api_key: &str) -> anyhow::Result<()> {
    let provider = GoogleProvider::new(api_key);
    let models = provider.list_models().await?;

    if models.is_empty() {
        println!("No chat-capable models available to this API key.");
        return Ok(());
    }

    println!("{:<36} {:<28} {:>10} {:>8}", "ID", "Name", "Input", "Output");
    println!("{}", "-".repeat(86));
    for m in models {
        println!(
            "{:<36} {:<28} {:>10} {:>8}",
            m.id(),
            m.display_name,
            m.input_token_limit
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            m.output_token_limit
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }

    Ok(())
}
