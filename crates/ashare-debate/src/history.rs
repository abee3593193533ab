pub const MAX_HISTORY_CHARS: usize = 8000;
pub const KEEP_RECENT_CHARS: usize = 3000;
pub const SUMMARY_PREFIX: &str = "[历史摘要]\n";

const SPEAKER_TAGS: &[(&str, &str)] = &[
    ("Bull", "Bull观点"),
    ("Bear", "Bear观点"),
    ("Risky", "激进观点"),
    ("Aggressive", "激进观点"),
    ("Safe", "保守观点"),
    ("Conservative", "保守观点"),
    ("Neutral", "中立观点"),
];

const STRIP_PREFIXES: &[&str] = &[
    "Bull Analyst:",
    "Bear Analyst:",
    "Risky Analyst:",
    "Safe Analyst:",
    "Neutral Analyst:",
    "激进方:",
    "保守方:",
    "中立方:",
];

/// Reduces `history` once it exceeds `max_chars`: the most recent
/// `keep_recent` characters are kept verbatim, older content is reduced to
/// per-speaker key points (rule-based; no LLM summarizer is wired in this
/// crate since none of the orchestrator's bounded debates need one to stay
/// under the cap in practice).
pub fn summarize_history(history: &str, max_chars: usize, keep_recent: usize) -> String {
    if history.is_empty() || history.chars().count() <= max_chars {
        return history.to_string();
    }

    let chars: Vec<char> = history.chars().collect();
    let split_point = chars.len().saturating_sub(keep_recent);
    let old_content: String = chars[..split_point].iter().collect();
    let recent_content: String = chars[split_point..].iter().collect();

    simple_truncate(&old_content, &recent_content)
}

fn simple_truncate(old_content: &str, recent_content: &str) -> String {
    let mut key_points = Vec::new();
    let mut current_speaker: Option<&str> = None;
    let mut last_line: Option<String> = None;

    for raw_line in old_content.trim().lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let detected = SPEAKER_TAGS.iter().find(|(tag, _)| {
            line.starts_with(&format!("{tag} ")) || line.chars().take(20).collect::<String>().contains(tag)
        });

        if let Some((tag, label)) = detected {
            if let (Some(_prev_speaker), Some(prev_line)) = (current_speaker, &last_line) {
                let prev_label = SPEAKER_TAGS
                    .iter()
                    .find(|(t, _)| Some(*t) == current_speaker)
                    .map(|(_, l)| *l)
                    .unwrap_or(_prev_speaker);
                key_points.push(format!("- {prev_label}: {}", extract_key_point(prev_line, 150)));
            }
            current_speaker = Some(tag);
            last_line = Some(line.to_string());
            let _ = label;
        } else {
            last_line = Some(line.to_string());
        }
    }

    if let (Some(speaker), Some(line)) = (current_speaker, &last_line) {
        let label = SPEAKER_TAGS.iter().find(|(t, _)| *t == speaker).map(|(_, l)| *l).unwrap_or(speaker);
        key_points.push(format!("- {label}: {}", extract_key_point(line, 150)));
    }

    if key_points.is_empty() {
        let summary = if old_content.chars().count() > 300 {
            let truncated: String = old_content.chars().take(300).collect();
            format!("{truncated}...")
        } else {
            old_content.to_string()
        };
        return format!("{SUMMARY_PREFIX}{summary}\n\n[最近对话]\n{recent_content}");
    }

    let start = key_points.len().saturating_sub(5);
    let summary = key_points[start..].join("\n");
    format!("{SUMMARY_PREFIX}{summary}\n\n[最近对话]\n{recent_content}")
}

fn extract_key_point(text: &str, max_length: usize) -> String {
    let mut text = text;
    for prefix in STRIP_PREFIXES {
        if let Some(stripped) = text.strip_prefix(prefix) {
            text = stripped.trim();
            break;
        }
    }

    if text.chars().count() <= max_length {
        return text.to_string();
    }

    let normalized = text.replace('。', ".").replace('；', ";");
    let sentences: Vec<&str> = normalized.split('.').map(|s| s.trim()).filter(|s| !s.is_empty()).collect();

    if !sentences.is_empty() {
        let start = sentences.len().saturating_sub(2);
        let result = sentences[start..].join(". ");
        if result.chars().count() > max_length {
            let truncated: String = result.chars().take(max_length).collect();
            return format!("{truncated}...");
        }
        return result;
    }

    let truncated: String = text.chars().take(max_length).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_history_is_untouched() {
        let history = "Bull Analyst: 看好。\nBear Analyst: 谨慎。";
        assert_eq!(summarize_history(history, MAX_HISTORY_CHARS, KEEP_RECENT_CHARS), history);
    }

    #[test]
    fn long_history_gets_prefixed_summary() {
        let mut history = String::new();
        for i in 0..200 {
            history.push_str(&format!("Bull Analyst: 观点第{i}条，营收增长显著。\n"));
            history.push_str(&format!("Bear Analyst: 风险第{i}条，估值偏高。\n"));
        }
        let result = summarize_history(&history, MAX_HISTORY_CHARS, KEEP_RECENT_CHARS);
        assert!(result.starts_with(SUMMARY_PREFIX));
        assert!(result.contains("[最近对话]"));
        assert!(result.chars().count() < history.chars().count());
    }

    #[test]
    fn falls_back_to_truncation_without_speaker_structure() {
        let old = "毫无结构的长文本。".repeat(100);
        let result = simple_truncate(&old, "最近内容");
        assert!(result.starts_with(SUMMARY_PREFIX));
        assert!(result.contains("最近内容"));
    }
}
