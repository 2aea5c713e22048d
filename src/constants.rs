pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const HISTORY_FILE_NAME: &str = "history.json";
pub const PROMPT_FILE_NAME: &str = "prompts.json";
pub const KEY_FALLBACK_FILE_NAME: &str = "credentials.json";

pub const KEYRING_SERVICE: &str = "com.agentype.app";
pub const KEYRING_USER: &str = "openai_api_key";
pub const API_KEY_ENV: &str = "AGENTYPE_API_KEY";
pub const API_BASE_ENV: &str = "AGENTYPE_API_BASE";

pub const DEFAULT_API_BASE: &str = "https://api.openai.com";
pub const COMPLETION_TEMPERATURE: f64 = 0.7;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_SLOTS: usize = 8;

pub const DEFAULT_HOTKEY_MAC: &str = "Ctrl+Shift+S";
pub const DEFAULT_HOTKEY_OTHER: &str = "Alt+Shift+S";

pub const OCR_MODE_OPTIONS: [&str; 3] = ["system", "vision", "system_fallback_vision"];
pub const TONE_OPTIONS: [&str; 6] = [
  "formal",
  "concise",
  "warm",
  "professional",
  "humorous",
  "friendly",
];
pub const LANGUAGE_OPTIONS: [&str; 2] = ["zh", "en"];
pub const LENGTH_OPTIONS: [&str; 3] = ["short", "medium", "long"];

pub const SCREENSHOT_WAIT_TIMEOUT_MS: u64 = 12_000;
pub const SCREENSHOT_POLL_INTERVAL_MS: u64 = 350;
