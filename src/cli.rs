use crate::constants::{LANGUAGE_OPTIONS, OCR_MODE_OPTIONS};
use crate::errors::AppError;
use crate::history::Candidate;
use crate::openai::OpenAiClient;
use crate::pipeline::App;
use crate::platform::desktop::{create_platform, FileStorage};
use crate::prompt::PromptSource;
use crate::settings::{OcrMode, SlotUpdate, UiLanguage};
use crate::status::TracingStatusSink;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "agentype", version, about)]
struct Cli {
    /// Load prompt templates from this JSON file (created with defaults when missing)
    #[arg(long, global = true, env = "AGENTYPE_PROMPT_FILE", value_name = "PATH")]
    prompt_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate reply drafts for a message passed as text
    Generate {
        /// The message to reply to
        text: Option<String>,

        /// Read the message from a PNG file instead of the argument
        #[arg(long, value_name = "PATH", conflicts_with = "text")]
        image: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Capture a screen region interactively and reply to what it shows
    Capture {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Generate reply drafts for the text currently on the clipboard
    Clipboard {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// List the models the configured API key can use
    Models {
        /// Query the API again instead of showing the saved list
        #[arg(long)]
        refresh: bool,
    },

    /// Inspect or prune past generation runs
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        command: KeyCommand,
    },

    /// Inspect or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Print candidates as JSON
    #[arg(long)]
    json: bool,

    /// Select the candidate with this slot id instead of the first one
    #[arg(long, value_name = "SLOT_ID")]
    pick: Option<String>,

    /// Type the selected candidate into the focused control
    #[arg(long, conflicts_with = "copy")]
    insert: bool,

    /// Copy the selected candidate to the clipboard
    #[arg(long)]
    copy: bool,
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// Print the ledger, newest first
    List {
        #[arg(long)]
        json: bool,
    },

    /// Delete one entry by id
    Remove { id: String },

    /// Delete every entry
    Clear,
}

#[derive(Subcommand)]
enum KeyCommand {
    /// Store a new API key (reads standard input when KEY is omitted)
    Set { key: Option<String> },

    /// Delete the stored key and clear the model selection
    Clear,

    /// Report whether a key is stored, without printing it
    Status,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the active settings as JSON
    Show,

    /// Change one setting
    Set {
        #[command(subcommand)]
        field: ConfigField,
    },

    /// Append a style slot cloned from the last one
    AddSlot,

    /// Remove a style slot by id
    RemoveSlot { id: String },

    /// Edit one style slot; omitted flags keep their current value
    EditSlot {
        /// Slot id, e.g. slot1
        id: String,

        /// Display name shown in history
        #[arg(long)]
        name: Option<String>,

        /// Free-form note appended to the slot's style line
        #[arg(long)]
        description: Option<String>,

        /// formal, concise, warm, professional, humorous or friendly
        #[arg(long, value_name = "TONE")]
        tone: Option<String>,

        /// zh or en
        #[arg(long, value_name = "LANG")]
        language: Option<String>,

        /// short, medium or long
        #[arg(long, value_name = "LENGTH")]
        length: Option<String>,

        /// Shape the reply like a short email (true/false)
        #[arg(long, value_name = "BOOL")]
        email_format: Option<bool>,
    },
}

#[derive(Subcommand)]
enum ConfigField {
    /// Model id used for completions
    Model { value: String },

    /// How screenshots are read: system, vision or system_fallback_vision
    OcrMode {
        #[arg(value_parser = parse_ocr_mode, value_name = "MODE")]
        value: OcrMode,
    },

    /// Interface language: en or zh
    Language {
        #[arg(value_parser = parse_ui_language, value_name = "LANG")]
        value: UiLanguage,
    },

    /// Most history entries kept
    HistoryLimit { value: usize },

    /// Global shortcut in Modifier+Key form
    Hotkey { value: String },
}

fn parse_ocr_mode(value: &str) -> Result<OcrMode, String> {
    OcrMode::parse(value).ok_or_else(|| format!("expected one of: {}", OCR_MODE_OPTIONS.join(", ")))
}

fn parse_ui_language(value: &str) -> Result<UiLanguage, String> {
    UiLanguage::parse(value)
        .ok_or_else(|| format!("expected one of: {}", LANGUAGE_OPTIONS.join(", ")))
}

/// Parses the command line, assembles the platform and runs one command.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let prompt_source = prompt_source_for(cli.prompt_file);
    let api = OpenAiClient::from_env()?;
    let mut app = App::bootstrap(
        create_platform(),
        Box::new(api),
        Box::new(TracingStatusSink),
        &prompt_source,
    );

    match cli.command {
        Command::Generate { text, image, output } => {
            let candidates = match image {
                Some(path) => app.image_generate_from_path(&path)?,
                None => app.manual_generate(&text.unwrap_or_default())?,
            };
            emit_candidates(&app, &candidates, &output)
        }
        Command::Capture { output } => {
            let candidates = app.capture_and_generate()?;
            emit_candidates(&app, &candidates, &output)
        }
        Command::Clipboard { output } => {
            let candidates = app.clipboard_generate()?;
            emit_candidates(&app, &candidates, &output)
        }
        Command::Models { refresh } => {
            let models = if refresh || app.settings().model_options.is_empty() {
                app.refresh_models()?
            } else {
                app.settings().model_options.clone()
            };
            for model in &models {
                println!("{}", model);
            }
            Ok(())
        }
        Command::History { command } => run_history(&mut app, command),
        Command::Key { command } => run_key(&mut app, command),
        Command::Config { command } => run_config(&mut app, command),
    }
}

/// Without the flag, a previously written prompt file wins over the
/// built-in templates; with it, the named file is used and seeded if absent.
fn prompt_source_for(flag: Option<PathBuf>) -> PromptSource {
    match flag {
        Some(path) => PromptSource::File(path),
        None => {
            let default_path = FileStorage::new().prompt_path();
            if default_path.exists() {
                PromptSource::File(default_path)
            } else {
                PromptSource::Builtin
            }
        }
    }
}

fn emit_candidates(app: &App, candidates: &[Candidate], output: &OutputArgs) -> Result<(), AppError> {
    let picked = match &output.pick {
        Some(id) => Some(
            candidates
                .iter()
                .find(|candidate| candidate.id == *id)
                .ok_or_else(|| AppError::Other(format!("no candidate with id {}", id)))?,
        ),
        None => None,
    };

    if output.json {
        match picked {
            Some(candidate) => {
                println!("{}", serde_json::to_string_pretty(candidate).unwrap_or_default())
            }
            None => println!("{}", serde_json::to_string_pretty(candidates).unwrap_or_default()),
        }
    } else {
        match picked {
            Some(candidate) => println!("{}", candidate.text),
            None => {
                for candidate in candidates {
                    println!("[{}]", candidate.id);
                    println!("{}", candidate.text);
                    println!();
                }
            }
        }
    }

    if output.insert || output.copy {
        let chosen = match picked {
            Some(candidate) => candidate,
            None => candidates.first().ok_or(AppError::NoCandidates)?,
        };
        if output.insert {
            app.insert_or_copy(&chosen.text)?;
        } else {
            app.copy_text(&chosen.text)?;
        }
    }
    Ok(())
}

fn run_history(app: &mut App, command: HistoryCommand) -> Result<(), AppError> {
    match command {
        HistoryCommand::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(app.history()).unwrap_or_default());
            } else {
                for entry in app.history() {
                    println!(
                        "{}  {}  [{}] {}",
                        entry.id,
                        entry.created_at,
                        entry.source.as_str(),
                        summarize(&entry.input)
                    );
                }
            }
            Ok(())
        }
        HistoryCommand::Remove { id } => {
            if app.remove_history_entry(&id)? {
                Ok(())
            } else {
                Err(AppError::Other(format!("no history entry with id {}", id)))
            }
        }
        HistoryCommand::Clear => app.clear_history(),
    }
}

/// First line only, cut to a fixed width on a character boundary.
fn summarize(input: &str) -> String {
    let first_line = input.lines().next().unwrap_or_default();
    let mut summary: String = first_line.chars().take(60).collect();
    if first_line.chars().count() > 60 {
        summary.push_str("...");
    }
    summary
}

fn run_key(app: &mut App, command: KeyCommand) -> Result<(), AppError> {
    match command {
        KeyCommand::Set { key } => {
            let key = match key {
                Some(key) => key,
                None => read_key_from_stdin()?,
            };
            app.set_api_key(&key)
        }
        KeyCommand::Clear => app.set_api_key(""),
        KeyCommand::Status => {
            if app.has_api_key() {
                println!("API key: stored");
            } else {
                println!("API key: not set");
            }
            Ok(())
        }
    }
}

fn read_key_from_stdin() -> Result<String, AppError> {
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|error| AppError::Other(format!("could not read the key from stdin: {}", error)))?;
    Ok(line.trim().to_string())
}

fn run_config(app: &mut App, command: ConfigCommand) -> Result<(), AppError> {
    match command {
        ConfigCommand::Show => {
            println!("{}", serde_json::to_string_pretty(app.settings()).unwrap_or_default());
            Ok(())
        }
        ConfigCommand::Set { field } => match field {
            ConfigField::Model { value } => app.set_model(&value),
            ConfigField::OcrMode { value } => app.set_ocr_mode(value),
            ConfigField::Language { value } => app.set_ui_language(value),
            ConfigField::HistoryLimit { value } => app.set_history_limit(value),
            ConfigField::Hotkey { value } => {
                let formatted = app.set_hotkey(&value)?;
                println!("{}", formatted);
                Ok(())
            }
        },
        ConfigCommand::AddSlot => {
            let id = app.add_slot()?;
            println!("{}", id);
            Ok(())
        }
        ConfigCommand::RemoveSlot { id } => app.remove_slot(&id),
        ConfigCommand::EditSlot {
            id,
            name,
            description,
            tone,
            language,
            length,
            email_format,
        } => app.update_slot(
            &id,
            SlotUpdate {
                name,
                description,
                tone_class: tone,
                language,
                length,
                email_format,
            },
        ),
    }
}
