use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use vocalis::cli::{Cli, Commands};
use vocalis::audit::ExecutionLog;
use vocalis::core::voice::{ElevenLabsClient, SpeechSynthesizer};
use vocalis::tools::registry::ToolRegistry;
use vocalis::{audit, utils, Assistant, AssistantReply, AuditBackend, Parameters, Settings, ToolCallRequest, Turn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat { prompt, speak, yes } => handle_chat(&settings, prompt, speak, yes).await,
        Commands::Interactive => handle_interactive(&settings).await,
        Commands::Tools => handle_tools(&settings),
        Commands::Exec {
            tool_id,
            params,
            confirm,
        } => handle_exec(&settings, tool_id, params, confirm).await,
        Commands::Audit { limit } => handle_audit(&settings, limit).await,
        Commands::Speak { text, out } => handle_speak(&settings, text, out).await,
    }
}

async fn handle_chat(
    settings: &Settings,
    prompt: String,
    speak: Option<std::path::PathBuf>,
    yes: bool,
) -> Result<()> {
    let assistant = Assistant::from_settings(settings, Settings::api_key()?)?;
    utils::print_info("Sending request...");

    let mut reply = assistant.respond(&prompt, &[], speak.is_some()).await;

    if let Some(call) = reply.turn.pending_call().cloned() {
        if yes {
            let history = reply.exchange(prompt.as_str());
            utils::print_info(&format!("Confirming {}...", call.tool_id));
            reply = assistant.confirm(call, &history, speak.is_some()).await;
        } else {
            utils::print_warning(&format!(
                "Tool '{}' needs confirmation; rerun with --yes to approve it",
                call.tool_id
            ));
        }
    }

    print_reply(&reply);
    if let Some(path) = speak {
        save_audio(&reply, &path).await?;
    }
    Ok(())
}

async fn handle_interactive(settings: &Settings) -> Result<()> {
    let assistant = Assistant::from_settings(settings, Settings::api_key()?)?;

    utils::print_header("Interactive Mode");
    utils::print_info("Type your messages (Ctrl+C to exit, /help for commands)\n");

    let mut history: Vec<Turn> = Vec::new();
    let mut pending: Option<ToolCallRequest> = None;

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin);

    loop {
        utils::print_prompt("You: ");
        let mut input = String::new();
        if reader.read_line(&mut input).await? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/help" => {
                println!("Special commands:");
                println!("  /confirm - Run the tool call awaiting confirmation");
                println!("  /cancel  - Discard the pending tool call");
                println!("  /clear   - Clear conversation history");
                println!("  /tools   - List enabled tools");
                println!("  /help    - Show this help");
                println!("  Ctrl+C   - Exit\n");
                continue;
            }
            "/clear" => {
                history.clear();
                pending = None;
                utils::print_success("Conversation cleared\n");
                continue;
            }
            "/tools" => {
                for summary in assistant.dispatcher().registry().list_enabled() {
                    utils::print_tool(&summary);
                }
                println!();
                continue;
            }
            "/cancel" => {
                match pending.take() {
                    Some(call) => utils::print_info(&format!("Discarded pending {} call\n", call.tool_id)),
                    None => utils::print_info("Nothing to cancel\n"),
                }
                continue;
            }
            "/confirm" => {
                let Some(call) = pending.take() else {
                    utils::print_info("No tool call is waiting for confirmation\n");
                    continue;
                };
                let approval = vocalis::approval_message(&call);
                let reply = assistant.confirm(call, &history, false).await;
                print_reply(&reply);
                history.extend(reply.exchange(approval));
                continue;
            }
            _ => {}
        }

        let reply = assistant.respond(input, &history, false).await;
        print_reply(&reply);

        pending = reply.turn.pending_call().cloned();
        if let Some(call) = &pending {
            utils::print_warning(&format!("Type /confirm to run {} or /cancel to skip\n", call.tool_id));
        }

        history.extend(reply.exchange(input));
    }

    Ok(())
}

fn handle_tools(settings: &Settings) -> Result<()> {
    let registry = ToolRegistry::from_config_path(&settings.tools.config_path);

    utils::print_header("Tools");
    if !registry.tools_enabled() {
        utils::print_warning("Tools are disabled in configuration");
    }

    let tools = registry.list_enabled();
    if tools.is_empty() {
        utils::print_info("No enabled tools");
    }
    for summary in &tools {
        utils::print_tool(summary);
    }
    Ok(())
}

async fn handle_exec(settings: &Settings, tool_id: String, params: String, confirm: bool) -> Result<()> {
    let parameters: Parameters =
        serde_json::from_str(&params).context("--params must be a JSON object")?;

    let dispatcher = vocalis::build_dispatcher(settings)?;
    let document = dispatcher.execute_tool(&tool_id, parameters, confirm).await;

    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

async fn handle_audit(settings: &Settings, limit: Option<usize>) -> Result<()> {
    if settings.audit.backend == AuditBackend::Memory {
        utils::print_warning("The in-memory audit log does not outlive a process; set audit.backend = \"sqlite\"");
    }

    let log = audit::open(&settings.audit)?;
    let entries = match limit {
        Some(n) => log.recent(n).await?,
        None => log.entries().await?,
    };

    utils::print_header(&format!("Audit log ({} entries)", entries.len()));
    for entry in &entries {
        utils::print_audit_entry(entry);
    }
    Ok(())
}

async fn handle_speak(settings: &Settings, text: String, out: std::path::PathBuf) -> Result<()> {
    let key = Settings::voice_api_key()
        .context("ELEVENLABS_API_KEY environment variable not set")?;
    let voice = ElevenLabsClient::new(key, settings.voice.clone())?;

    let audio = voice.synthesize(&text).await?;
    tokio::fs::write(&out, &audio)
        .await
        .with_context(|| format!("Failed to write audio to {:?}", out))?;

    utils::print_success(&format!("Wrote {} bytes to {}", audio.len(), out.display()));
    Ok(())
}

fn print_reply(reply: &AssistantReply) {
    if let Some(execution) = &reply.turn.tool_execution {
        utils::print_tool_result(&execution.call.tool_id, &execution.result);
    }

    if reply.turn.success {
        println!("\n{}\n", reply.turn.response);
    } else {
        utils::print_error(&reply.turn.response);
        if let Some(error) = &reply.turn.error {
            utils::print_error(error);
        }
    }
}

async fn save_audio(reply: &AssistantReply, path: &Path) -> Result<()> {
    match (&reply.audio, &reply.audio_error) {
        (Some(audio), _) => {
            tokio::fs::write(path, audio)
                .await
                .with_context(|| format!("Failed to write audio to {:?}", path))?;
            utils::print_success(&format!("Wrote {} bytes to {}", audio.len(), path.display()));
        }
        (None, Some(error)) => utils::print_error(&format!("Speech synthesis failed: {}", error)),
        (None, None) => {}
    }
    Ok(())
}
