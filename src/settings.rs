use crate::constants::{
  DEFAULT_HISTORY_LIMIT, DEFAULT_HOTKEY_MAC, DEFAULT_HOTKEY_OTHER, LANGUAGE_OPTIONS,
  LENGTH_OPTIONS, MAX_SLOTS, TONE_OPTIONS,
};
use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrMode {
  System,
  Vision,
  SystemFallbackVision,
}

impl OcrMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      OcrMode::System => "system",
      OcrMode::Vision => "vision",
      OcrMode::SystemFallbackVision => "system_fallback_vision",
    }
  }

  pub fn parse(value: &str) -> Option<OcrMode> {
    match value {
      "system" => Some(OcrMode::System),
      "vision" => Some(OcrMode::Vision),
      "system_fallback_vision" => Some(OcrMode::SystemFallbackVision),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiLanguage {
  En,
  Zh,
}

impl UiLanguage {
  pub fn as_str(&self) -> &'static str {
    match self {
      UiLanguage::En => "en",
      UiLanguage::Zh => "zh",
    }
  }

  pub fn parse(value: &str) -> Option<UiLanguage> {
    match value {
      "en" => Some(UiLanguage::En),
      "zh" => Some(UiLanguage::Zh),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: String,
  pub tone_class: String,
  pub language: String,
  pub length: String,
  pub email_format: bool,
}

/// Slot as it may appear in a persisted store of any schema age.
/// `greeting`/`closing` predate the single `emailFormat` flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoredSlot {
  pub id: Option<String>,
  pub name: Option<String>,
  pub description: Option<String>,
  pub tone_class: Option<String>,
  pub language: Option<String>,
  pub length: Option<String>,
  pub email_format: Option<bool>,
  pub greeting: Option<bool>,
  pub closing: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
  pub ocr_mode: OcrMode,
  pub history_limit: usize,
  pub model: String,
  pub model_options: Vec<String>,
  pub hotkey: String,
  pub ui_language: UiLanguage,
  pub slots: Vec<Slot>,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      ocr_mode: OcrMode::System,
      history_limit: DEFAULT_HISTORY_LIMIT,
      model: String::new(),
      model_options: Vec::new(),
      hotkey: String::new(),
      ui_language: UiLanguage::En,
      slots: default_slots(),
    }
  }
}

/// Persisted settings of any schema age. `modelText` and `candidateCount`
/// only exist in stores written by earlier versions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoredSettings {
  pub ocr_mode: Option<String>,
  pub history_limit: Option<i64>,
  pub model: Option<String>,
  pub model_text: Option<String>,
  pub model_options: Option<Vec<String>>,
  pub hotkey: Option<String>,
  pub ui_language: Option<String>,
  pub candidate_count: Option<i64>,
  pub slots: Option<Vec<StoredSlot>>,
}

pub fn default_slots() -> Vec<Slot> {
  vec![
    Slot {
      id: "slot1".to_string(),
      name: "正式".to_string(),
      description: String::new(),
      tone_class: "formal".to_string(),
      language: "zh".to_string(),
      length: "medium".to_string(),
      email_format: true,
    },
    Slot {
      id: "slot2".to_string(),
      name: "简短".to_string(),
      description: String::new(),
      tone_class: "concise".to_string(),
      language: "zh".to_string(),
      length: "short".to_string(),
      email_format: false,
    },
    Slot {
      id: "slot3".to_string(),
      name: "热情".to_string(),
      description: String::new(),
      tone_class: "warm".to_string(),
      language: "zh".to_string(),
      length: "medium".to_string(),
      email_format: true,
    },
  ]
}

pub fn default_hotkey() -> String {
  if cfg!(target_os = "macos") {
    DEFAULT_HOTKEY_MAC.to_string()
  } else {
    DEFAULT_HOTKEY_OTHER.to_string()
  }
}

/// Merge a possibly-absent, possibly-legacy persisted settings value against
/// the compiled defaults into a complete `Settings`. Never fails, and
/// re-merging its own output is a no-op.
pub fn merge_settings(stored: Option<StoredSettings>) -> Settings {
  let mut settings = Settings::default();
  let stored = match stored {
    Some(stored) => stored,
    None => {
      settings.hotkey = default_hotkey();
      return settings;
    }
  };

  if let Some(mode) = stored.ocr_mode.as_deref().and_then(OcrMode::parse) {
    settings.ocr_mode = mode;
  }
  if let Some(limit) = stored.history_limit {
    if limit >= 1 {
      settings.history_limit = limit as usize;
    }
  }
  // The current model field wins; fall back to the legacy single-purpose one.
  let model = stored.model.unwrap_or_default();
  let model = if model.is_empty() {
    stored.model_text.unwrap_or_default()
  } else {
    model
  };
  if !model.is_empty() {
    settings.model = model;
  }
  if let Some(options) = stored.model_options {
    settings.model_options = options;
  }
  if let Some(language) = stored.ui_language.as_deref().and_then(UiLanguage::parse) {
    settings.ui_language = language;
  }

  let defaults = default_slots();
  if let Some(stored_slots) = stored.slots.filter(|slots| !slots.is_empty()) {
    settings.slots = stored_slots
      .into_iter()
      .enumerate()
      .map(|(index, slot)| merge_slot(slot, &defaults[index % defaults.len()]))
      .collect();
  }
  // Earlier schemas treated only the first candidateCount slots as active.
  if let Some(count) = stored.candidate_count {
    let count = count.clamp(1, defaults.len() as i64) as usize;
    settings.slots.truncate(count);
  }
  if settings.slots.len() > MAX_SLOTS {
    settings.slots.truncate(MAX_SLOTS);
  }

  let hotkey = stored.hotkey.unwrap_or_default();
  settings.hotkey = if hotkey.trim().is_empty() {
    default_hotkey()
  } else {
    hotkey
  };

  settings
}

fn merge_slot(stored: StoredSlot, fallback: &Slot) -> Slot {
  // Fields introduced after the stored slot was written are backfilled from
  // the default slot at the same position.
  let email_format = match stored.email_format {
    Some(value) => value,
    None => stored.greeting.unwrap_or(false) || stored.closing.unwrap_or(false),
  };
  Slot {
    id: stored.id.unwrap_or_else(|| fallback.id.clone()),
    name: stored.name.unwrap_or_else(|| fallback.name.clone()),
    description: stored.description.unwrap_or_default(),
    tone_class: stored.tone_class.unwrap_or_else(|| fallback.tone_class.clone()),
    language: stored.language.unwrap_or_else(|| fallback.language.clone()),
    length: stored.length.unwrap_or_else(|| fallback.length.clone()),
    email_format,
  }
}

/// Append a new slot cloned from the last one, with a fresh unique `slotN`
/// id. `name_label` is the localized word used in the generated name.
pub fn add_slot(settings: &mut Settings, name_label: &str) -> Result<String, AppError> {
  if settings.slots.len() >= MAX_SLOTS {
    return Err(AppError::Other(format!("slot limit reached ({})", MAX_SLOTS)));
  }
  let existing: HashSet<String> = settings.slots.iter().map(|slot| slot.id.clone()).collect();
  let mut next_index = settings.slots.len() + 1;
  while existing.contains(&format!("slot{}", next_index)) {
    next_index += 1;
  }
  let base = settings
    .slots
    .last()
    .cloned()
    .unwrap_or_else(|| default_slots()[0].clone());
  let id = format!("slot{}", next_index);
  settings.slots.push(Slot {
    id: id.clone(),
    name: format!("{} {}", name_label, next_index),
    description: String::new(),
    ..base
  });
  Ok(id)
}

pub fn remove_slot(settings: &mut Settings, slot_id: &str) -> Result<(), AppError> {
  if settings.slots.len() <= 1 {
    return Err(AppError::Other("at least one slot is required".to_string()));
  }
  let before = settings.slots.len();
  settings.slots.retain(|slot| slot.id != slot_id);
  if settings.slots.len() == before {
    return Err(AppError::Other(format!("no slot with id '{}'", slot_id)));
  }
  Ok(())
}

/// Partial slot edit. `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct SlotUpdate {
  pub name: Option<String>,
  pub description: Option<String>,
  pub tone_class: Option<String>,
  pub language: Option<String>,
  pub length: Option<String>,
  pub email_format: Option<bool>,
}

/// Apply a partial edit to the slot with the given id. Enumerated fields
/// are validated, and a rejected update leaves the slot untouched.
pub fn update_slot(settings: &mut Settings, slot_id: &str, update: SlotUpdate) -> Result<(), AppError> {
  if let Some(tone) = update.tone_class.as_deref() {
    if !TONE_OPTIONS.contains(&tone) {
      return Err(AppError::Other(format!(
        "unknown tone '{}', expected one of: {}",
        tone,
        TONE_OPTIONS.join(", ")
      )));
    }
  }
  if let Some(language) = update.language.as_deref() {
    if !LANGUAGE_OPTIONS.contains(&language) {
      return Err(AppError::Other(format!(
        "unknown language '{}', expected one of: {}",
        language,
        LANGUAGE_OPTIONS.join(", ")
      )));
    }
  }
  if let Some(length) = update.length.as_deref() {
    if !LENGTH_OPTIONS.contains(&length) {
      return Err(AppError::Other(format!(
        "unknown length '{}', expected one of: {}",
        length,
        LENGTH_OPTIONS.join(", ")
      )));
    }
  }

  let slot = settings
    .slots
    .iter_mut()
    .find(|slot| slot.id == slot_id)
    .ok_or_else(|| AppError::Other(format!("no slot with id '{}'", slot_id)))?;
  if let Some(name) = update.name {
    slot.name = name;
  }
  if let Some(description) = update.description {
    slot.description = description;
  }
  if let Some(tone) = update.tone_class {
    slot.tone_class = tone;
  }
  if let Some(language) = update.language {
    slot.language = language;
  }
  if let Some(length) = update.length {
    slot.length = length;
  }
  if let Some(email_format) = update.email_format {
    slot.email_format = email_format;
  }
  Ok(())
}
