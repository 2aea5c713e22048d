use serde::{Deserialize, Serialize};

const MODIFIERS: [&str; 12] = [
    "CommandOrControl", "CmdOrCtrl", "Command", "Cmd", "Control", "Ctrl",
    "Alt", "Option", "AltGr", "Shift", "Super", "Meta",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
    pub formatted: Option<String>,
}

impl ValidationResult {
    fn rejected(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            formatted: None,
        }
    }
}

/// Validates the capture hotkey string before it is persisted.
pub fn validate_hotkey_format(key: &str) -> ValidationResult {
    let key = key.trim();
    if key.is_empty() {
        return ValidationResult::rejected("Hotkey cannot be empty");
    }

    let parts: Vec<&str> = key.split('+').map(str::trim).collect();
    let (key_part, modifiers) = match parts.split_last() {
        Some((last, rest)) if !rest.is_empty() => (last, rest),
        _ => {
            return ValidationResult::rejected(
                "Hotkey must include at least one modifier (e.g., Ctrl, Shift, Alt)",
            )
        }
    };

    if let Some(unknown) = modifiers.iter().find(|part| !is_modifier(part)) {
        return ValidationResult::rejected(format!(
            "Invalid modifier: '{}'. Valid modifiers: Ctrl, Shift, Alt, Command, etc.",
            unknown
        ));
    }

    if key_part.is_empty() {
        return ValidationResult::rejected("Missing key after modifiers");
    }

    ValidationResult {
        valid: true,
        error: None,
        formatted: Some(format_hotkey(key)),
    }
}

fn is_modifier(part: &str) -> bool {
    MODIFIERS.iter().any(|known| known.eq_ignore_ascii_case(part))
}

/// Rewrites a hotkey into its canonical spelling, part by part.
pub fn format_hotkey(key: &str) -> String {
    key.split('+')
        .map(|part| canonical_part(part.trim()))
        .collect::<Vec<_>>()
        .join("+")
}

fn canonical_part(part: &str) -> String {
    match part.to_lowercase().as_str() {
        "ctrl" | "control" => "Ctrl".to_string(),
        "cmdorctrl" | "commandorcontrol" => "CommandOrControl".to_string(),
        "cmd" | "command" => "Command".to_string(),
        "alt" | "option" => "Alt".to_string(),
        "shift" => "Shift".to_string(),
        "meta" | "super" => "Meta".to_string(),
        _ => capitalize(part),
    }
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}
