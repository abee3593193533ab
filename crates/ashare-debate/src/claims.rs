use regex::Regex;
use std::sync::OnceLock;

fn number_assertion_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(\.\d+)?[%倍元亿万美元美金]").unwrap())
}

fn conclusion_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(因此|所以|表明|说明|意味着|可见|综上|由此可见)").unwrap())
}

fn risk_keywords_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(风险|压力|下跌|减持|减仓|警惕|注意|泡沫|高估|危险|隐患)").unwrap())
}

fn opportunity_keywords_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(机会|潜力|增长|买入|加仓|看好|低估|安全边际|上涨空间)").unwrap())
}

fn sentence_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[。！？\n;]").unwrap())
}

fn chinese_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[一-鿿]{2,4}").unwrap())
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").unwrap())
}

/// Rule-based claim extraction: no LLM call, zero latency. Priority order is
/// numeric assertions ("PE reached 200x"), then conclusion-marker sentences
/// ("therefore", "thus"), then risk/opportunity keyword sentences.
pub fn extract_claims_simple(response: &str, max_claims: usize) -> Vec<String> {
    let mut claims = Vec::new();
    let mut seen = std::collections::HashSet::new();

    let sentences: Vec<&str> = sentence_split_re()
        .split(response)
        .map(|s| s.trim())
        .filter(|s| s.chars().count() > 10)
        .collect();

    let mut push_if_match = |claims: &mut Vec<String>, seen: &mut std::collections::HashSet<String>, s: &str| -> bool {
        if seen.contains(s) {
            return false;
        }
        let claim: String = if s.chars().count() > 200 {
            s.chars().take(200).collect()
        } else {
            s.to_string()
        };
        claims.push(claim);
        seen.insert(s.to_string());
        claims.len() >= max_claims
    };

    for s in &sentences {
        if number_assertion_re().is_match(s) && push_if_match(&mut claims, &mut seen, s) {
            return claims;
        }
    }
    for s in &sentences {
        if conclusion_marker_re().is_match(s) && push_if_match(&mut claims, &mut seen, s) {
            return claims;
        }
    }
    for s in &sentences {
        if (risk_keywords_re().is_match(s) || opportunity_keywords_re().is_match(s))
            && push_if_match(&mut claims, &mut seen, s)
        {
            return claims;
        }
    }

    claims.truncate(max_claims);
    claims
}

/// Splits `pending` into (still_pending, newly_addressed) by testing whether
/// each claim's extracted keywords (numbers + 2-4 char CJK words) reach
/// `threshold` coverage inside `response`. A claim with no extractable
/// keywords is conservatively kept pending.
pub fn mark_claims_addressed(pending: &[String], response: &str, threshold: f64) -> (Vec<String>, Vec<String>) {
    let mut still_pending = Vec::new();
    let mut newly_addressed = Vec::new();

    for claim in pending {
        let numbers: Vec<&str> = number_re().find_iter(claim).map(|m| m.as_str()).collect();
        let words: Vec<&str> = chinese_word_re().find_iter(claim).map(|m| m.as_str()).collect();
        let keywords: Vec<&str> = numbers.into_iter().chain(words).collect();

        if keywords.is_empty() {
            still_pending.push(claim.clone());
            continue;
        }

        let match_count = keywords.iter().filter(|kw| response.contains(*kw)).count();
        let match_ratio = match_count as f64 / keywords.len() as f64;

        if match_ratio >= threshold {
            newly_addressed.push(claim.clone());
        } else {
            still_pending.push(claim.clone());
        }
    }

    (still_pending, newly_addressed)
}

/// Renders a boxed "mandatory rebuttal" block to inject into the opposing
/// side's prompt. Returns an empty string when there is nothing pending.
pub fn format_rebuttal_section(pending_claims: &[String], opponent: &str) -> String {
    if pending_claims.is_empty() {
        return String::new();
    }

    let claims_text = pending_claims
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\n═══════════════════════════════════════════════════════════════\n\
         【必答项 - 锁定回应】MANDATORY REBUTTAL\n\
         ═══════════════════════════════════════════════════════════════\n\n\
         {opponent}提出以下论点，你必须逐一回应：\n\n\
         {claims_text}\n\n\
         **回应要求**：\n\
         - 承认风险/观点（若合理）并说明应对策略\n\
         - 或反驳（必须有数据/逻辑支撑）\n\
         - 不得忽略任何一条\n\n\
         ⚠️ 未明确回应的论点将被视为你承认其成立。\n\n\
         ═══════════════════════════════════════════════════════════════\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_numeric_assertion_first() {
        let response = "这家公司增长很快。PE达到了200倍，显著高于行业均值。市场情绪乐观。";
        let claims = extract_claims_simple(response, 3);
        assert!(claims.iter().any(|c| c.contains("200倍")));
    }

    #[test]
    fn extracts_conclusion_marker_when_no_numbers() {
        let response = "公司治理结构发生了重大变化这件事情很值得关注。因此我们认为风险敞口有所扩大这一点毋庸置疑。";
        let claims = extract_claims_simple(response, 3);
        assert!(claims.iter().any(|c| c.contains("因此")));
    }

    #[test]
    fn caps_at_max_claims_and_dedups() {
        let response = "PE达到了50倍这件事情很重要。PE达到了50倍这件事情很重要。PB达到了10倍也值得注意。营收增长了30%非常显著。";
        let claims = extract_claims_simple(response, 2);
        assert_eq!(claims.len(), 2);
    }

    #[test]
    fn addressed_when_keywords_overlap_sufficiently() {
        let pending = vec!["PE达到了200倍，显著高于行业均值".to_string()];
        let response = "关于200倍的担忧，我们认为行业均值本身也在抬升，不必过度担忧。";
        let (still_pending, addressed) = mark_claims_addressed(&pending, response, 0.4);
        assert!(still_pending.is_empty());
        assert_eq!(addressed.len(), 1);
    }

    #[test]
    fn claim_without_keywords_stays_pending() {
        let pending = vec!["这一点是".to_string()];
        let response = "完全不相关的内容";
        let (still_pending, addressed) = mark_claims_addressed(&pending, response, 0.4);
        assert_eq!(still_pending.len(), 1);
        assert!(addressed.is_empty());
    }

    #[test]
    fn rebuttal_section_empty_when_no_pending() {
        assert_eq!(format_rebuttal_section(&[], "空方"), "");
    }
}
