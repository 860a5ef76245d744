//! Interactive chat loop
//!
//! Runs a readline-based loop that submits user input to the message
//! pipeline and prints the assistant reply. Slash commands manage the
//! conversation collection without leaving the loop.

use crate::engine::Engine;
use crate::error::Result;
use crate::export::ExportFormat;
use crate::types::SettingsUpdate;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Slash commands recognized by the chat loop
#[derive(Debug, Clone, PartialEq)]
enum ChatCommand {
    /// `/new [title]` - create a conversation and switch to it
    New(Option<String>),
    /// `/list` - list conversations
    List,
    /// `/switch <id>` - change the active conversation
    Switch(String),
    /// `/delete <id>` - remove a conversation
    Delete(String),
    /// `/export [format]` - print the active conversation
    Export(String),
    /// `/settings key value` - update a generation setting
    Settings(Option<(String, String)>),
    /// `/help` - show the command list
    Help,
    /// `/quit` - leave the loop
    Quit,
    /// Unknown slash command
    Unknown(String),
    /// Not a command; send as a message
    None,
}

fn parse_command(input: &str) -> ChatCommand {
    let Some(rest) = input.strip_prefix('/') else {
        return ChatCommand::None;
    };
    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("");
    let argument = parts.next().map(str::trim).filter(|a| !a.is_empty());

    match command {
        "new" => ChatCommand::New(argument.map(String::from)),
        "list" => ChatCommand::List,
        "switch" => match argument {
            Some(id) => ChatCommand::Switch(id.to_string()),
            None => ChatCommand::Unknown("/switch needs a conversation id".to_string()),
        },
        "delete" => match argument {
            Some(id) => ChatCommand::Delete(id.to_string()),
            None => ChatCommand::Unknown("/delete needs a conversation id".to_string()),
        },
        "export" => ChatCommand::Export(argument.unwrap_or("json").to_string()),
        "settings" => {
            let pair = argument.and_then(|a| {
                let mut kv = a.splitn(2, char::is_whitespace);
                Some((kv.next()?.to_string(), kv.next()?.trim().to_string()))
            });
            ChatCommand::Settings(pair)
        }
        "help" => ChatCommand::Help,
        "quit" | "exit" => ChatCommand::Quit,
        other => ChatCommand::Unknown(format!("unknown command: /{}", other)),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /new [title]          create a conversation and switch to it");
    println!("  /list                 list conversations");
    println!("  /switch <id>          change the active conversation");
    println!("  /delete <id>          remove a conversation");
    println!("  /export [format]      print the active conversation (json/markdown/text)");
    println!("  /settings key value   update model, temperature, max_tokens, or system_prompt");
    println!("  /settings             show current settings");
    println!("  /quit                 leave");
}

async fn show_settings(engine: &Engine) {
    if let Some(conversation) = engine.store.get_conversation(None).await {
        let settings = &conversation.settings;
        println!("model: {}", settings.model);
        println!("temperature: {}", settings.temperature);
        println!("max_tokens: {}", settings.max_tokens);
        println!(
            "system_prompt: {}",
            settings.system_prompt.as_deref().unwrap_or("(none)")
        );
    }
}

async fn apply_setting(engine: &Engine, key: &str, value: &str) -> Result<()> {
    let mut update = SettingsUpdate::default();
    match key {
        "model" => update.model = Some(value.to_string()),
        "temperature" => match value.parse::<f64>() {
            Ok(temperature) => update.temperature = Some(temperature),
            Err(_) => {
                println!("{}", "temperature must be a number".red());
                return Ok(());
            }
        },
        "max_tokens" => match value.parse::<u64>() {
            Ok(max_tokens) => update.max_tokens = Some(max_tokens),
            Err(_) => {
                println!("{}", "max_tokens must be an integer".red());
                return Ok(());
            }
        },
        "system_prompt" => {
            update.system_prompt = if value == "none" {
                Some(None)
            } else {
                Some(Some(value.to_string()))
            };
        }
        other => {
            println!("{}", format!("unknown setting: {}", other).red());
            return Ok(());
        }
    }

    let id = engine.store.active_id().await;
    engine.store.update_settings(&id, &update).await?;
    println!("{}", "settings updated".green());
    Ok(())
}

async fn list_conversations(engine: &Engine) {
    for summary in engine.store.list_conversations().await {
        let marker = if summary.active { "*" } else { " " };
        let mut flags = String::new();
        if summary.starred {
            flags.push('★');
        }
        if summary.archived {
            flags.push('▣');
        }
        println!(
            "{} {}  {:>3} msgs  {}  {}",
            marker,
            summary.id,
            summary.message_count,
            summary.updated_at.format("%Y-%m-%d %H:%M"),
            format!("{} {}", summary.title, flags).trim()
        );
    }
}

/// Run the interactive chat loop until `/quit` or EOF
///
/// # Arguments
///
/// * `engine` - Wired engine (consumed for the duration of the loop)
/// * `resume` - Optional conversation id to switch to before the loop
///
/// # Errors
///
/// Returns an error if the terminal cannot be initialized or a store
/// operation fails. Send failures are printed, not propagated.
pub async fn run_chat(engine: Engine, resume: Option<String>) -> Result<()> {
    if let Some(id) = resume {
        if engine.store.switch_conversation(&id).await? {
            println!("Resumed conversation {}", id);
        } else {
            println!("{}", format!("No conversation {}; using active", id).yellow());
        }
    }

    let mut rl = DefaultEditor::new()?;
    println!("{}", "convoke".bold());
    println!("Type a message, or /help for commands.\n");

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed)?;

                match parse_command(trimmed) {
                    ChatCommand::New(title) => {
                        let conversation = engine.store.create_conversation(title).await?;
                        println!("Created and switched to {}", conversation.id);
                        continue;
                    }
                    ChatCommand::List => {
                        list_conversations(&engine).await;
                        continue;
                    }
                    ChatCommand::Switch(id) => {
                        if engine.store.switch_conversation(&id).await? {
                            println!("Switched to {}", id);
                        } else {
                            println!("{}", format!("no conversation {}", id).red());
                        }
                        continue;
                    }
                    ChatCommand::Delete(id) => {
                        if engine.store.delete_conversation(&id).await? {
                            println!("Deleted {}", id);
                        } else {
                            println!("{}", format!("no conversation {}", id).red());
                        }
                        continue;
                    }
                    ChatCommand::Export(format) => {
                        match format.parse::<ExportFormat>() {
                            Ok(format) => {
                                let id = engine.store.active_id().await;
                                let rendered =
                                    engine.store.export_conversation(&id, format).await?;
                                println!("{}", rendered);
                            }
                            Err(err) => println!("{}", err.to_string().red()),
                        }
                        continue;
                    }
                    ChatCommand::Settings(Some((key, value))) => {
                        apply_setting(&engine, &key, &value).await?;
                        continue;
                    }
                    ChatCommand::Settings(None) => {
                        show_settings(&engine).await;
                        continue;
                    }
                    ChatCommand::Help => {
                        print_help();
                        continue;
                    }
                    ChatCommand::Unknown(message) => {
                        println!("{}", message.yellow());
                        continue;
                    }
                    ChatCommand::Quit => break,
                    ChatCommand::None => {}
                }

                match engine.pipeline.send_message(None, trimmed).await {
                    Ok(reply) => {
                        println!("\n{}\n", reply.content);
                        if let Some(model) = &reply.metadata.model {
                            tracing::debug!(model, "reply received");
                        }
                    }
                    Err(err) => {
                        println!("{}", err.to_string().red());
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                tracing::error!(error = %err, "readline failed");
                break;
            }
        }
    }

    println!("bye");
    Ok(())
}
