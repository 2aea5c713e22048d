use crate::settings::UiLanguage;

/// Resolve a message key for the given UI language. Unknown keys fall back
/// to the English table and finally to the key itself.
pub fn translate(language: UiLanguage, key: &str) -> String {
  let text = match language {
    UiLanguage::Zh => zh(key).or_else(|| en(key)),
    UiLanguage::En => en(key),
  };
  text.unwrap_or(key).to_string()
}

fn en(key: &str) -> Option<&'static str> {
  let text = match key {
    "status.ready" => "Ready",
    "status.apiKeySaved" => "API key saved",
    "status.modelsUpdated" => "Model list updated",
    "status.modelsFailed" => "Could not load the model list",
    "status.hotkeyFailed" => "Hotkey registration failed, check the format",
    "status.waitingScreenshot" => "Waiting for the screenshot...",
    "status.screenshotFailed" => "Screenshot failed",
    "status.clipboardReading" => "Reading clipboard text...",
    "status.clipboardEmpty" => "Clipboard has no text",
    "status.clipboardFailed" => "Could not read the clipboard",
    "status.clipboardFilled" => "Clipboard text filled in",
    "status.readingImage" => "Reading image...",
    "status.imageReadFailed" => "Could not read the image",
    "status.noApiKey" => "Set your OpenAI API key in settings first",
    "status.noModel" => "Choose a model first",
    "status.noContent" => "No text or image to process",
    "status.needInput" => "Enter the message to reply to",
    "status.generating" => "Generating replies...",
    "status.requestFailed" => "Request failed",
    "status.parseFailed" => "Could not parse the response, adjust the prompt template",
    "status.noCandidates" => "No usable replies were generated",
    "status.candidatesReady" => "Candidate replies ready",
    "status.copied" => "Copied to clipboard",
    "status.inserting" => "Inserting...",
    "status.inserted" => "Inserted into the active input",
    "status.insertFailedCopied" => "Insert failed, copied to clipboard instead",
    "status.ocrEmpty" => "System OCR returned no text, continuing with the vision model",
    "status.ocrUnavailable" => "System OCR unavailable, continuing with the vision model",
    "status.ocrFailed" => "System OCR failed, continuing with the vision model",
    "label.screenshotContent" => "[screenshot content]",
    "label.slot" => "Style",
    _ => return None,
  };
  Some(text)
}

fn zh(key: &str) -> Option<&'static str> {
  let text = match key {
    "status.ready" => "准备就绪",
    "status.apiKeySaved" => "API Key 已保存",
    "status.modelsUpdated" => "模型列表已更新",
    "status.modelsFailed" => "获取模型列表失败",
    "status.hotkeyFailed" => "快捷键注册失败，请检查格式",
    "status.waitingScreenshot" => "等待截图完成...",
    "status.screenshotFailed" => "截图失败",
    "status.clipboardReading" => "读取剪贴板文本...",
    "status.clipboardEmpty" => "剪贴板没有文本内容",
    "status.clipboardFailed" => "读取剪贴板失败",
    "status.clipboardFilled" => "已填入剪贴板文本",
    "status.readingImage" => "读取图片...",
    "status.imageReadFailed" => "图片读取失败",
    "status.noApiKey" => "请先在设置中填写 OpenAI API Key",
    "status.noModel" => "请先选择模型",
    "status.noContent" => "没有可处理的文本或图片",
    "status.needInput" => "请输入需要回复的内容",
    "status.generating" => "生成回复中...",
    "status.requestFailed" => "请求失败",
    "status.parseFailed" => "返回格式解析失败，请调整 prompt 模板",
    "status.noCandidates" => "未生成可用回复",
    "status.candidatesReady" => "候选回复已生成",
    "status.copied" => "已复制到剪贴板",
    "status.inserting" => "正在插入...",
    "status.inserted" => "已插入到当前输入框",
    "status.insertFailedCopied" => "插入失败，已复制到剪贴板",
    "status.ocrEmpty" => "系统 OCR 未返回文本，使用视觉模型继续",
    "status.ocrUnavailable" => "系统 OCR 不可用，使用视觉模型继续",
    "status.ocrFailed" => "系统 OCR 失败，使用视觉模型继续",
    "label.screenshotContent" => "[图片内容]",
    "label.slot" => "风格",
    _ => return None,
  };
  Some(text)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn translates_per_language() {
    assert_eq!(translate(UiLanguage::En, "status.copied"), "Copied to clipboard");
    assert_eq!(translate(UiLanguage::Zh, "status.copied"), "已复制到剪贴板");
  }

  #[test]
  fn unknown_key_falls_back_to_the_key() {
    assert_eq!(translate(UiLanguage::En, "status.doesNotExist"), "status.doesNotExist");
    assert_eq!(translate(UiLanguage::Zh, "status.doesNotExist"), "status.doesNotExist");
  }

  #[test]
  fn screenshot_placeholder_is_localized() {
    assert_eq!(translate(UiLanguage::En, "label.screenshotContent"), "[screenshot content]");
    assert_eq!(translate(UiLanguage::Zh, "label.screenshotContent"), "[图片内容]");
  }
}
