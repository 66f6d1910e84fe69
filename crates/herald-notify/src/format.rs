//! Markdown-to-card translation for chat destinations.
//!
//! Card bodies render a constrained markdown dialect: no headings, no
//! horizontal rules, and blockquotes display poorly. Each pass is a
//! function `&str -> String` applied in sequence; structure is decided
//! by classifying whole lines first, regexes only rewrite inline spans.

use std::sync::LazyLock;

use regex::Regex;

/// Separator emitted above section headings.
pub const SECTION_DIVIDER: &str = "━━━━━━━━━━━━━━";
/// Prefix replacing the `>` blockquote marker.
pub const QUOTE_GLYPH: &str = "▎";
/// Prefix for topic headings.
pub const TOPIC_GLYPH: &str = "🔹";

/// Tunable formatting knobs. Defaults match the report templates the
/// analysis side produces.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Section heading that introduces per-topic reference lists.
    pub further_reading_heading: String,
    /// Section heading that keeps its place without a divider above it.
    pub issue_summary_heading: String,
    /// Maximum reference bullets kept per topic sub-heading.
    pub max_refs_per_topic: usize,
    /// "Read original" links into these domains are dropped wholesale
    /// since the destination cannot open them.
    pub denied_domains: Vec<String>,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            further_reading_heading: "延伸阅读".to_string(),
            issue_summary_heading: "本期摘要".to_string(),
            max_refs_per_topic: 5,
            denied_domains: vec!["mp.weixin.qq.com".to_string()],
        }
    }
}

/// Rewrite a heading-structured report into card-safe markdown.
pub fn format_markdown(content: &str, opts: &FormatOptions) -> String {
    let mut result = content.to_string();

    result = truncate_reference_sections(&result, opts);
    result = rewrite_blocks(&result, opts);
    result = collapse_blank_runs(&result);

    result.trim().to_string()
}

/// One classified source line. Classification looks only at the line
/// itself, which is all the card dialect needs.
enum Line<'a> {
    Heading { level: usize, text: &'a str },
    Blockquote(&'a str),
    ListItem(&'a str),
    HorizontalRule,
    Blank,
    Text(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    if line.trim().is_empty() {
        return Line::Blank;
    }
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        let level = trimmed.chars().take_while(|c| *c == '#').count();
        if level <= 6 {
            if let Some(text) = trimmed[level..].strip_prefix(' ') {
                return Line::Heading { level, text: text.trim() };
            }
        }
        return Line::Text(line);
    }
    if let Some(rest) = trimmed.strip_prefix('>') {
        return Line::Blockquote(rest.strip_prefix(' ').unwrap_or(rest));
    }
    let rule_body = trimmed.trim_end();
    if rule_body.len() >= 3 && rule_body.chars().all(|c| matches!(c, '-' | '*' | '_')) {
        return Line::HorizontalRule;
    }
    if trimmed.starts_with("- ") || trimmed.starts_with("* ") {
        return Line::ListItem(line);
    }
    Line::Text(line)
}

// ---------------------------------------------------------------------------
// Pass 1: Truncate reference lists
// ---------------------------------------------------------------------------

/// Cap the bullet count under each topic of the "further reading"
/// section. Everything outside that section, and every non-bullet line
/// inside it, passes through verbatim.
fn truncate_reference_sections(content: &str, opts: &FormatOptions) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut in_refs = false;
    let mut kept = 0usize;

    for line in content.lines() {
        match classify(line) {
            Line::Heading { level, text } if level <= 2 => {
                in_refs = level == 2 && text.contains(&opts.further_reading_heading);
                kept = 0;
                out.push(line);
            }
            Line::Heading { level: 3, .. } if in_refs => {
                kept = 0;
                out.push(line);
            }
            Line::ListItem(_) if in_refs => {
                if kept < opts.max_refs_per_topic {
                    kept += 1;
                    out.push(line);
                }
            }
            _ => out.push(line),
        }
    }
    out.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Rewrite structural blocks
// ---------------------------------------------------------------------------

/// Map each block type to its card rendering.
///
/// The leading top-level heading duplicates the card title supplied out
/// of band, so it is dropped together with the blank lines under it.
/// Remaining headings flatten to bold text, section headings gain a
/// divider, topic headings gain a glyph, rules vanish, and blockquotes
/// swap their marker for [`QUOTE_GLYPH`]. The link rules run on quote,
/// list, and plain lines alike.
fn rewrite_blocks(content: &str, opts: &FormatOptions) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut out: Vec<String> = Vec::new();

    let mut i = 0;
    while i < lines.len() && lines[i].trim().is_empty() {
        i += 1;
    }
    if i < lines.len() && matches!(classify(lines[i]), Line::Heading { level: 1, .. }) {
        i += 1;
        while i < lines.len() && lines[i].trim().is_empty() {
            i += 1;
        }
    }

    while i < lines.len() {
        let line = lines[i];
        match classify(line) {
            Line::Heading { level: 1, text } => out.push(format!("**{text}**")),
            Line::Heading { level: 2, text } => {
                if !text.contains(&opts.issue_summary_heading) {
                    out.push(SECTION_DIVIDER.to_string());
                }
                out.push(format!("**{text}**"));
            }
            Line::Heading { level: 3, text } => {
                if out.last().is_some_and(|prev| !prev.is_empty()) {
                    out.push(String::new());
                }
                out.push(format!("{TOPIC_GLYPH} **{text}**"));
            }
            Line::Heading { text, .. } => out.push(format!("**{text}**")),
            Line::HorizontalRule => {}
            Line::Blockquote(_) => {
                if out.last().is_some_and(|prev| !prev.is_empty()) {
                    out.push(String::new());
                }
                while i < lines.len() {
                    let Line::Blockquote(text) = classify(lines[i]) else {
                        break;
                    };
                    if let Some(kept) = apply_link_rules(text, opts) {
                        out.push(format!("{QUOTE_GLYPH}{}", normalize_summary_label(&kept)));
                    }
                    i += 1;
                }
                continue;
            }
            Line::Blank => out.push(String::new()),
            Line::ListItem(_) | Line::Text(_) => {
                if let Some(rewritten) = apply_link_rules(line, opts) {
                    out.push(rewritten);
                }
            }
        }
        i += 1;
    }

    out.join("\n")
}

/// Force the leading summary label of a blockquote line into one
/// canonical bold form, whatever emphasis the author used around it.
fn normalize_summary_label(text: &str) -> String {
    static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[\s*_]*摘要[\s*_]*[:：][\s*_]*").expect("valid regex")
    });

    LABEL_RE.replace(text, "**摘要**：").into_owned()
}

/// Drop lines whose "read original" link points into a denied domain,
/// and strip the bracketed date some templates append after the link.
fn apply_link_rules(line: &str, opts: &FormatOptions) -> Option<String> {
    static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\[阅读原文\]\(([^)]*)\)").expect("valid regex")
    });
    static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(\[阅读原文\]\([^)]*\))\s*\[\d{4}-\d{2}-\d{2}\]").expect("valid regex")
    });

    if let Some(caps) = LINK_RE.captures(line) {
        let url = &caps[1];
        if opts.denied_domains.iter().any(|domain| url.contains(domain.as_str())) {
            return None;
        }
    }
    Some(DATE_RE.replace_all(line, "$1").into_owned())
}

// ---------------------------------------------------------------------------
// Pass 3: Collapse blank runs
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ blank lines into exactly 1.
fn collapse_blank_runs(content: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\n{4,}").expect("valid regex")
    });

    MULTI_BLANK_RE.replace_all(content, "\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> FormatOptions {
        FormatOptions::default()
    }

    #[test]
    fn leading_top_level_heading_is_stripped() {
        let input = "# AI 前沿动态速报\n\n\n正文第一行";
        assert_eq!(format_markdown(input, &opts()), "正文第一行");
    }

    #[test]
    fn later_top_level_heading_becomes_bold() {
        let input = "# 标题\n\n正文\n\n# 附录";
        let result = format_markdown(input, &opts());
        assert!(result.contains("**附录**"));
        assert!(!result.contains("# 附录"));
    }

    #[test]
    fn section_heading_gets_divider_above() {
        let input = "# 标题\n\n## 今日要闻\n\n正文";
        let result = format_markdown(input, &opts());
        let expected = format!("{SECTION_DIVIDER}\n**今日要闻**\n\n正文");
        assert_eq!(result, expected);
    }

    #[test]
    fn issue_summary_heading_has_no_divider() {
        let input = "# 标题\n\n## 本期摘要\n\n正文";
        let result = format_markdown(input, &opts());
        assert!(result.contains("**本期摘要**"));
        assert!(!result.contains(SECTION_DIVIDER));
    }

    #[test]
    fn topic_heading_gets_glyph_and_spacing() {
        let input = "正文\n### 新模型发布";
        let result = format_markdown(input, &opts());
        assert_eq!(result, format!("正文\n\n{TOPIC_GLYPH} **新模型发布**"));
    }

    #[test]
    fn deep_headings_become_plain_bold() {
        let input = "#### 附注\n\n##### 更深";
        let result = format_markdown(input, &opts());
        assert!(result.contains("**附注**"));
        assert!(result.contains("**更深**"));
        assert!(!result.contains('#'));
    }

    #[test]
    fn horizontal_rules_are_removed() {
        let input = "上文\n\n---\n\n下文\n\n***\n";
        let result = format_markdown(input, &opts());
        assert!(!result.contains("---"));
        assert!(!result.contains("***"));
        assert!(result.contains("上文"));
        assert!(result.contains("下文"));
    }

    #[test]
    fn blockquote_marker_becomes_glyph() {
        let input = "正文\n> 引用内容";
        let result = format_markdown(input, &opts());
        assert_eq!(result, format!("正文\n\n{QUOTE_GLYPH}引用内容"));
    }

    #[test]
    fn blockquote_run_stays_contiguous() {
        let input = "> 第一行\n> 第二行";
        let result = format_markdown(input, &opts());
        assert_eq!(result, format!("{QUOTE_GLYPH}第一行\n{QUOTE_GLYPH}第二行"));
    }

    #[test]
    fn summary_label_is_force_bolded() {
        for input in ["> 摘要: 内容", "> **摘要:** 内容", "> **摘要**: 内容", "> _摘要_：内容"] {
            let result = format_markdown(input, &opts());
            assert_eq!(result, format!("{QUOTE_GLYPH}**摘要**：内容"), "input: {input}");
        }
    }

    #[test]
    fn denied_domain_link_line_is_dropped() {
        let input = "前文\n[阅读原文](https://mp.weixin.qq.com/s/abc123)\n后文";
        let result = format_markdown(input, &opts());
        assert!(!result.contains("阅读原文"));
        assert!(result.contains("前文"));
        assert!(result.contains("后文"));
    }

    #[test]
    fn allowed_domain_link_is_kept() {
        let input = "[阅读原文](https://example.com/post/1)";
        let result = format_markdown(input, &opts());
        assert_eq!(result, input);
    }

    #[test]
    fn trailing_date_after_link_is_stripped() {
        let input = "- 要点 [阅读原文](https://example.com/a) [2025-08-20]";
        let result = format_markdown(input, &opts());
        assert_eq!(result, "- 要点 [阅读原文](https://example.com/a)");
    }

    #[test]
    fn denied_link_inside_blockquote_drops_the_line() {
        let input =
            "- 正文 [阅读原文](https://example.com/a)\n\n> 摘要：详见 [阅读原文](https://mp.weixin.qq.com/s/abc)";
        let result = format_markdown(input, &opts());
        assert_eq!(result, "- 正文 [阅读原文](https://example.com/a)");
    }

    #[test]
    fn trailing_date_inside_blockquote_is_stripped() {
        let input = "> 来源 [阅读原文](https://example.com/a) [2025-08-20]";
        let result = format_markdown(input, &opts());
        assert_eq!(result, format!("{QUOTE_GLYPH}来源 [阅读原文](https://example.com/a)"));
    }

    #[test]
    fn blockquote_run_keeps_allowed_lines_when_one_is_dropped() {
        let input = "> 第一行\n> 详见 [阅读原文](https://mp.weixin.qq.com/s/x)\n> 第三行";
        let result = format_markdown(input, &opts());
        assert_eq!(result, format!("{QUOTE_GLYPH}第一行\n{QUOTE_GLYPH}第三行"));
    }

    #[test]
    fn blank_runs_collapse_to_one() {
        let input = "上段\n\n\n\n\n\n下段";
        let result = format_markdown(input, &opts());
        assert_eq!(result, "上段\n\n下段");
    }

    #[test]
    fn double_blank_is_untouched_inside() {
        let input = "上段\n\n下段";
        assert_eq!(format_markdown(input, &opts()), input);
    }

    #[test]
    fn reference_lists_truncate_per_topic() {
        let mut doc = String::from("# 报告\n\n## 延伸阅读\n\n### 主题A\n");
        for i in 0..8 {
            doc.push_str(&format!("- [链接{i}](https://example.com/{i})\n"));
        }
        doc.push_str("\n### 主题B\n- [b1](https://example.com/b1)\n- [b2](https://example.com/b2)\n");

        let result = format_markdown(&doc, &opts());
        let topic_a_links = result.matches("https://example.com/0").count()
            + (1..8).filter(|i| result.contains(&format!("https://example.com/{i}"))).count();
        assert_eq!(topic_a_links, 5);
        assert!(result.contains("b1"));
        assert!(result.contains("b2"));
    }

    #[test]
    fn truncation_ignores_lists_outside_reference_section() {
        let mut doc = String::from("## 今日要闻\n");
        for i in 0..8 {
            doc.push_str(&format!("- 要点{i}\n"));
        }
        let result = format_markdown(&doc, &opts());
        for i in 0..8 {
            assert!(result.contains(&format!("要点{i}")), "missing bullet {i}");
        }
    }

    #[test]
    fn non_list_lines_inside_reference_section_survive() {
        let input = "## 延伸阅读\n\n### 主题\n说明文字\n- [a](https://example.com/a)";
        let result = format_markdown(input, &opts());
        assert!(result.contains("说明文字"));
    }

    #[test]
    fn formatting_is_idempotent() {
        let input = "# 标题\n\n## 本期摘要\n\n> **摘要:** 本期看点\n> 详见 [阅读原文](https://mp.weixin.qq.com/s/abc)\n> 来源 [阅读原文](https://example.com/ok) [2025-08-19]\n\n## 今日要闻\n\n### 主题\n\n内容 [阅读原文](https://example.com/a) [2025-08-20]\n\n---\n\n## 延伸阅读\n\n### 主题\n- [a](https://example.com/a)\n- [b](https://example.com/b)\n";
        let once = format_markdown(input, &opts());
        let twice = format_markdown(&once, &opts());
        assert_eq!(once, twice);
    }
}
