use crate::llm::extract_json_value;
use crate::traits::ChatModel;
use crate::timeline::{find_time_range, months_between};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// One structured work/internship/project entry. `end` is `None` for
/// positions held to the present day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceItem {
    pub start: Option<String>,
    pub end: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_months: Option<i64>,
    /// Pre-localization values; populated only when localization rewrote the
    /// field.
    pub original_title: Option<String>,
    pub original_description: Option<String>,
}

fn format_month(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

fn contains_cjk(text: &str) -> bool {
    text.chars().any(|ch| ('\u{4e00}'..='\u{9fa5}').contains(&ch))
}

const ROLE_KEYWORDS: &[&str] = &[
    "工程师", "经理", "总监", "主管", "专员", "顾问", "设计师", "架构师", "实习生", "负责人",
    "Engineer", "Manager", "Director", "Developer", "Designer", "Architect", "Analyst",
    "Consultant", "Intern", "Lead",
];

fn split_double_space(header: &str) -> Option<(String, String)> {
    let segments: Vec<&str> = header
        .split("  ")
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.len() < 2 {
        return None;
    }
    Some((
        segments[0].to_string(),
        segments[segments.len() - 1].to_string(),
    ))
}

fn split_at_sign(header: &str) -> Option<(String, String)> {
    let (title, company) = header.split_once('@')?;
    let title = title.trim();
    let company = company.trim();
    if title.is_empty() || company.is_empty() {
        return None;
    }
    Some((company.to_string(), title.to_string()))
}

fn split_role_keyword(header: &str) -> Option<(String, String)> {
    let earliest = ROLE_KEYWORDS
        .iter()
        .filter_map(|keyword| header.find(keyword).map(|position| (position, *keyword)))
        .min_by_key(|(position, _)| *position)?;

    let (keyword_at, _) = earliest;
    let boundary = header[..keyword_at]
        .char_indices()
        .rev()
        .find(|(_, ch)| ch.is_whitespace())
        .map(|(position, ch)| position + ch.len_utf8())
        .unwrap_or(keyword_at);
    let company = header[..boundary].trim();
    let title = header[boundary..].trim();
    if title.is_empty() {
        return None;
    }
    Some((company.to_string(), title.to_string()))
}

fn split_last_space(header: &str) -> Option<(String, String)> {
    let position = header.rfind(char::is_whitespace)?;
    let company = header[..position].trim();
    let title = header[position..].trim();
    if company.is_empty() || title.is_empty() {
        return None;
    }
    Some((company.to_string(), title.to_string()))
}

/// Rule-based structuring of one free-text entry: first line is the header,
/// the remainder is the description. The header yields an optional leading or
/// parenthetical time range, then a company/title split tried in order:
/// double-space, "title @ company", earliest role-keyword boundary, last
/// space. Ambiguous headers degrade to an untitled item carrying the whole
/// line as description.
pub fn structure_entry(entry: &str, today: NaiveDate) -> ExperienceItem {
    let mut lines = entry.trim().splitn(2, '\n');
    let header = lines.next().unwrap_or_default().trim().to_string();
    let body = lines.next().map(|rest| rest.trim().to_string());

    let mut item = ExperienceItem {
        description: body.filter(|text| !text.is_empty()),
        ..Default::default()
    };

    let mut remainder = header.clone();
    if let Some(range) = find_time_range(&header) {
        item.start = Some(format_month(range.start));
        item.end = range.end.map(format_month);
        let effective_end = range.end.unwrap_or(today);
        item.duration_months = Some(months_between(range.start, effective_end));

        let mut stripped = String::new();
        stripped.push_str(&header[..range.span.start]);
        stripped.push(' ');
        stripped.push_str(&header[range.span.end..]);
        // Drop paired parentheses the range was wrapped in.
        remainder = stripped
            .replace("()", " ")
            .replace("( )", " ")
            .replace("（）", " ")
            .replace("（ ）", " ")
            .trim()
            .to_string();
    }

    let remainder = remainder.trim_matches(|ch: char| "，,、-·| ".contains(ch)).to_string();
    if remainder.is_empty() {
        return item;
    }

    let split = split_double_space(&remainder)
        .or_else(|| split_at_sign(&remainder))
        .or_else(|| split_role_keyword(&remainder))
        .or_else(|| split_last_space(&remainder));

    match split {
        Some((company, title)) => {
            item.company = Some(company).filter(|value| !value.is_empty());
            item.title = Some(title);
        }
        None => {
            // Title unknown; keep the whole line as description context.
            item.description = match item.description.take() {
                Some(existing) => Some(format!("{remainder}\n{existing}")),
                None => Some(remainder),
            };
        }
    }

    item
}

const STRUCTURE_PROMPT: &str = concat!(
    "任务：将输入的经历条目数组解析为结构化 JSON 数组（仅 JSON，不要输出解释或 markdown）。\n",
    "输入为 JSON 字符串数组，每个元素是一段完整经历条目。\n",
    "输出数组长度与输入一致，元素结构：\n",
    "{\"start\": \"YYYY-MM\"|null, \"end\": \"YYYY-MM\"|null, \"company\": string|null, ",
    "\"title\": string|null, \"description\": string|null}\n",
    "规则：\n",
    "- end 为 null 表示至今仍在职。\n",
    "- company/title 取不到时填 null，不要杜撰。\n",
    "- description 为条目除时间/公司/职位外的剩余内容。\n",
);

fn item_from_value(value: &Value, today: NaiveDate) -> Option<ExperienceItem> {
    let object = value.as_object()?;
    let field = |name: &str| {
        object
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    };

    let mut item = ExperienceItem {
        start: field("start"),
        end: field("end"),
        company: field("company"),
        title: field("title"),
        description: field("description"),
        ..Default::default()
    };

    let parse_month = |text: &str| {
        crate::timeline::parse_year_month(text)
            .ok()
            .and_then(|(year, month)| NaiveDate::from_ymd_opt(year, month, 1))
    };
    if let Some(start) = item.start.as_deref().and_then(parse_month) {
        let end = item.end.as_deref().and_then(parse_month).unwrap_or(today);
        if end >= start {
            item.duration_months = Some(months_between(start, end));
        }
    }
    Some(item)
}

/// LLM-first structuring over a batch of entries; `None` when the oracle is
/// unavailable or its output does not line up with the input.
pub async fn structure_entries_llm(
    llm: &dyn ChatModel,
    entries: &[String],
    today: NaiveDate,
) -> Option<Vec<ExperienceItem>> {
    if entries.is_empty() {
        return Some(Vec::new());
    }
    let payload = serde_json::to_string(entries).ok()?;
    let content = llm.complete(STRUCTURE_PROMPT, &payload, Some(2000)).await?;
    let parsed = extract_json_value(&content)?;
    let array = parsed.as_array()?;
    if array.len() != entries.len() {
        debug!(
            expected = entries.len(),
            got = array.len(),
            "experience structuring output misaligned"
        );
        return None;
    }
    array
        .iter()
        .map(|value| item_from_value(value, today))
        .collect()
}

/// Structure every entry, preferring the oracle and falling back to rules
/// per batch.
pub async fn structure_entries(
    llm: Option<&dyn ChatModel>,
    entries: &[String],
    today: NaiveDate,
) -> Vec<ExperienceItem> {
    if let Some(llm) = llm {
        if let Some(items) = structure_entries_llm(llm, entries, today).await {
            return items;
        }
    }
    entries
        .iter()
        .map(|entry| structure_entry(entry, today))
        .collect()
}

const TRANSLATE_PROMPT: &str = concat!(
    "任务：将输入 JSON 对象中的 title 和 description 翻译为中文，返回相同结构的 JSON（仅 JSON）。\n",
    "- 专有名词（公司/产品/技术名）保持原文。\n",
    "- 缺失字段保持 null。\n",
    "输出结构：{\"title\": string|null, \"description\": string|null}\n",
);

/// Machine-translate non-Chinese titles and descriptions, preserving the
/// original text alongside. Items already in Chinese pass through untouched.
pub async fn localize_items(llm: Option<&dyn ChatModel>, items: &mut [ExperienceItem]) {
    let Some(llm) = llm else {
        return;
    };

    for item in items.iter_mut() {
        let title_needs = item.title.as_deref().is_some_and(|text| !contains_cjk(text));
        let description_needs = item
            .description
            .as_deref()
            .is_some_and(|text| !contains_cjk(text));
        if !title_needs && !description_needs {
            continue;
        }

        let payload = serde_json::json!({
            "title": if title_needs { item.title.clone() } else { None },
            "description": if description_needs { item.description.clone() } else { None },
        });
        let Ok(payload) = serde_json::to_string(&payload) else {
            continue;
        };
        let Some(content) = llm.complete(TRANSLATE_PROMPT, &payload, Some(800)).await else {
            continue;
        };
        let Some(translated) = extract_json_value(&content) else {
            continue;
        };

        if title_needs {
            if let Some(translation) = translated
                .get("title")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
            {
                item.original_title = item.title.replace(translation.to_string());
            }
        }
        if description_needs {
            if let Some(translation) = translated
                .get("description")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
            {
                item.original_description = item.description.replace(translation.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[test]
    fn double_space_header_structures_fully() {
        let entry = "2024.07 - 2024.10  Acme Inc  Backend Engineer\n负责后端迭代";
        let item = structure_entry(entry, today());
        assert_eq!(item.start.as_deref(), Some("2024-07"));
        assert_eq!(item.end.as_deref(), Some("2024-10"));
        assert_eq!(item.company.as_deref(), Some("Acme Inc"));
        assert_eq!(item.title.as_deref(), Some("Backend Engineer"));
        assert_eq!(item.duration_months, Some(4));
        assert_eq!(item.description.as_deref(), Some("负责后端迭代"));
    }

    #[test]
    fn parenthetical_range_and_open_end() {
        let item = structure_entry("Bitget 交易所（2024.07 - 至今）", today());
        assert_eq!(item.start.as_deref(), Some("2024-07"));
        assert_eq!(item.end, None);
        // 2024-07 through 2025-01 inclusive.
        assert_eq!(item.duration_months, Some(7));
    }

    #[test]
    fn at_sign_split_swaps_title_and_company() {
        let item = structure_entry("Backend Engineer @ Acme", today());
        assert_eq!(item.company.as_deref(), Some("Acme"));
        assert_eq!(item.title.as_deref(), Some("Backend Engineer"));
    }

    #[test]
    fn role_keyword_boundary_split() {
        let item = structure_entry("字节跳动 后端开发工程师", today());
        assert_eq!(item.company.as_deref(), Some("字节跳动"));
        assert_eq!(item.title.as_deref(), Some("后端开发工程师"));
    }

    #[test]
    fn ambiguous_header_degrades_to_description() {
        let item = structure_entry("独立项目", today());
        assert_eq!(item.title, None);
        assert_eq!(item.company, None);
        assert_eq!(item.description.as_deref(), Some("独立项目"));
    }

    #[tokio::test]
    async fn misaligned_model_output_falls_back_to_rules() {
        struct ShortModel;

        #[async_trait::async_trait]
        impl ChatModel for ShortModel {
            async fn complete(
                &self,
                _prompt: &str,
                _text: &str,
                _max_tokens: Option<u32>,
            ) -> Option<String> {
                Some(
                    r#"[{"start": "2020-01", "end": "2020-12", "company": "甲", "title": "工程师", "description": null}]"#
                        .to_string(),
                )
            }
        }

        let entries = vec![
            "2024.07 - 2024.10  Acme Inc  Backend Engineer".to_string(),
            "字节跳动 后端开发工程师".to_string(),
        ];
        let items = structure_entries(Some(&ShortModel), &entries, today()).await;

        // One answer for two entries cannot be trusted, so the rule-based
        // pass structures both.
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].company.as_deref(), Some("Acme Inc"));
        assert_eq!(items[1].company.as_deref(), Some("字节跳动"));
    }

    #[test]
    fn llm_item_duration_is_recomputed() {
        let value = serde_json::json!({
            "start": "2024-07", "end": "2024-10",
            "company": "Acme Inc", "title": "Backend Engineer",
            "description": null,
        });
        let item = item_from_value(&value, today()).unwrap();
        assert_eq!(item.duration_months, Some(4));
    }
}
