use crate::settings::Slot;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const SYSTEM_PROMPT: &str = r#"You are a reply assistant. The user gives you a message they received and a list of reply styles. Write one reply draft per style, in the style's language, tone and length. When email_format is yes, shape the reply like a short email with a greeting and sign-off; otherwise write plain message text.

Respond with a JSON array only, no prose and no code fences:
[{"id": "slot1", "text": "..."}]

One object per requested style, "id" matching the style id, "text" holding the finished reply."#;

pub const IMAGE_SYSTEM_PROMPT: &str = r#"You are a reply assistant. The message to reply to is shown in the attached screenshot. Read the conversation from the image, then write one reply draft per requested style, in the style's language, tone and length. When email_format is yes, shape the reply like a short email with a greeting and sign-off; otherwise write plain message text.

Respond with a JSON array only, no prose and no code fences:
[{"id": "slot1", "text": "..."}]

One object per requested style, "id" matching the style id, "text" holding the finished reply."#;

pub const USER_TEMPLATE: &str = r#"Message to reply to:
{{input}}

Write {{count}} reply drafts, one per style:
{{styles}}

Return only the JSON array."#;

/// The instruction set actually used for a run. `template` carries the
/// `{{input}}`, `{{count}}` and `{{styles}}` tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PromptConfig {
    pub system: String,
    pub image_system: String,
    pub template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            image_system: IMAGE_SYSTEM_PROMPT.to_string(),
            template: USER_TEMPLATE.to_string(),
        }
    }
}

/// Where the prompt text comes from, decided once at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptSource {
    Builtin,
    File(PathBuf),
}

impl PromptSource {
    /// Never fails. A file source that is missing gets seeded with the
    /// defaults; one that does not parse falls back to them.
    pub fn resolve(&self) -> PromptConfig {
        match self {
            PromptSource::Builtin => PromptConfig::default(),
            PromptSource::File(path) => load_prompt_file(path),
        }
    }
}

fn load_prompt_file(path: &Path) -> PromptConfig {
    if !path.exists() {
        let defaults = PromptConfig::default();
        if let Ok(raw) = serde_json::to_string_pretty(&defaults) {
            if let Err(error) = fs::write(path, raw) {
                warn!("Failed to seed prompt file {}: {}", path.display(), error);
            }
        }
        return defaults;
    }
    let raw = fs::read_to_string(path).unwrap_or_default();
    serde_json::from_str(&raw).unwrap_or_default()
}

/// One line per slot, in slot order. Unknown tone or length values pass
/// through as-is so a hand-edited store still produces a usable listing.
pub fn build_style_lines(slots: &[Slot]) -> String {
    slots.iter().map(style_line).collect::<Vec<_>>().join("\n")
}

fn style_line(slot: &Slot) -> String {
    let email = if slot.email_format { "yes" } else { "no" };
    let mut line = format!(
        "{}: tone={}, language={}, length={}, email_format={}",
        slot.id,
        tone_label(&slot.tone_class),
        language_label(&slot.language),
        length_label(&slot.length),
        email
    );
    let note = slot.description.trim();
    if !note.is_empty() {
        line.push_str(", note=");
        line.push_str(note);
    }
    line
}

fn tone_label(tone: &str) -> &str {
    match tone {
        "formal" => "Formal",
        "concise" => "Concise",
        "warm" => "Warm",
        "professional" => "Professional",
        "humorous" => "Humorous",
        "friendly" => "Friendly",
        other => other,
    }
}

fn language_label(language: &str) -> &'static str {
    if language == "zh" {
        "Chinese"
    } else {
        "English"
    }
}

fn length_label(length: &str) -> &str {
    match length {
        "short" => "Short",
        "medium" => "Medium",
        "long" => "Long",
        other => other,
    }
}

/// Substitutes each template token at most once. A token that is absent
/// from the template is simply skipped.
pub fn render_prompt(template: &str, input: &str, count: usize, styles: &str) -> String {
    template
        .replacen("{{input}}", input, 1)
        .replacen("{{count}}", &count.to_string(), 1)
        .replacen("{{styles}}", styles, 1)
}
