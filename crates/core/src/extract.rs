use crate::education::{
    highest_degree_level, DegreeLevel, UniversityClassifier,
};
use crate::experience::{localize_items, structure_entries};
use crate::fields;
use crate::llm::{extract_json_object, extract_json_value};
use crate::traits::ChatModel;
use crate::models::{ExtractedResume, ResumeCategory, TagCatalog};
use crate::timeline::compute_work_years_at;
use crate::IntakeError;
use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Full-document input cap for the structured extraction prompt.
const EXTRACTION_INPUT_CHARS: usize = 20_000;
/// Input cap for the category prompt.
const CATEGORY_INPUT_CHARS: usize = 10_000;
/// Input cap for the tag gap-filling prompt.
const TAG_INPUT_CHARS: usize = 20_000;
/// Characters kept on each side of a school keyword hit.
const SCHOOL_WINDOW_RADIUS: usize = 20;
const MAX_SCHOOL_SNIPPETS: usize = 200;
const MAX_LIST_ITEMS: usize = 50;
const UNKNOWN_NAME: &str = "未知";

const EXTRACTION_PROMPT: &str = concat!(
    "任务：从简历全文中抽取结构化信息，仅返回一个 JSON 对象，不要任何解释。\n",
    "字段（缺失填 null，列表字段缺失填 []）：\n",
    "- name: 候选人姓名\n",
    "- contact_info: 联系方式原文\n",
    "- education_degree: 最高学历（如 本科/硕士/博士）\n",
    "- education_school: 就读学校全称列表\n",
    "- education_major: 专业\n",
    "- skills: 技能列表\n",
    "- work_experience: 工作经历条目列表，每条为原文片段\n",
    "- internship_experience: 实习经历条目列表\n",
    "- project_experience: 项目经历条目列表\n",
    "- self_evaluation: 自我评价\n",
    "- other: 其余无法归类的内容\n",
    "示例输出：\n",
    "{\"name\": \"张三\", \"contact_info\": \"13800138000\", ",
    "\"education_degree\": \"硕士\", \"education_school\": [\"清华大学\"], ",
    "\"education_major\": \"计算机科学\", \"skills\": [\"Java\", \"MySQL\"], ",
    "\"work_experience\": [\"2020.01 - 2023.06 某公司 后端工程师 负责订单系统\"], ",
    "\"internship_experience\": [], \"project_experience\": [], ",
    "\"self_evaluation\": null, \"other\": null}\n",
);

const SCHOOL_PROMPT: &str = concat!(
    "任务：以下是简历中与教育相关的文本片段。",
    "找出其中出现的学校全称，仅返回 JSON：{\"schools\": [string]}。\n",
    "- 只输出学校名称，不要专业、学历或时间。\n",
    "- 没有学校时返回 {\"schools\": []}。\n",
);

const CATEGORY_PROMPT: &str = concat!(
    "任务：判断这份简历属于技术类还是非技术类岗位。\n",
    "技术类指软件开发、算法、测试、运维、数据等工程岗位。\n",
    "仅返回 JSON：{\"category\": \"技术类\"} 或 {\"category\": \"非技术类\"}。\n",
);

const TAG_PROMPT: &str = concat!(
    "任务：输入包含候选标签列表和简历文本。",
    "从候选标签中选出简历明确体现的标签，仅返回 JSON：{\"tags\": [string]}。\n",
    "- 只能从候选列表中选择，不得自创标签。\n",
    "- 没有适用标签时返回 {\"tags\": []}。\n",
);

/// Unvalidated model output for one document. Every accessor validates the
/// shape of the field it reads; malformed fields read as absent.
pub struct RawExtraction {
    fields: Map<String, Value>,
}

impl RawExtraction {
    pub fn from_model_output(content: &str) -> Option<Self> {
        extract_json_object(content).map(|fields| Self { fields })
    }

    pub fn text(&self, key: &str) -> Option<String> {
        let value = self.fields.get(key)?.as_str()?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    /// Reads a list of strings; a bare string is treated as a one-element
    /// list. Non-string elements are dropped.
    pub fn text_list(&self, key: &str) -> Vec<String> {
        match self.fields.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::String(single)) if !single.trim().is_empty() => {
                vec![single.trim().to_string()]
            }
            _ => Vec::new(),
        }
    }
}

/// Trim, drop empties, deduplicate case-insensitively preserving first
/// occurrence, and cap the list length.
pub fn normalize_string_list(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for value in values {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            result.push(trimmed);
        }
        if result.len() >= MAX_LIST_ITEMS {
            break;
        }
    }
    result
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => &text[..byte_offset],
        None => text,
    }
}

const SCHOOL_KEYWORDS: &[&str] = &[
    "大学",
    "学院",
    "学校",
    "学历",
    "教育经历",
    "毕业",
    "University",
    "College",
    "Institute",
    "Academy",
];

/// Short text windows around every school keyword hit, with overlapping
/// windows merged. Keeps the oracle input small on long documents.
pub fn school_snippets(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut intervals: Vec<(usize, usize)> = Vec::new();

    for keyword in SCHOOL_KEYWORDS {
        let keyword_chars: Vec<char> = keyword.chars().collect();
        if keyword_chars.is_empty() || keyword_chars.len() > chars.len() {
            continue;
        }
        for (index, window) in chars.windows(keyword_chars.len()).enumerate() {
            if window == keyword_chars.as_slice() {
                let start = index.saturating_sub(SCHOOL_WINDOW_RADIUS);
                let end = (index + keyword_chars.len() + SCHOOL_WINDOW_RADIUS).min(chars.len());
                intervals.push((start, end));
            }
        }
    }

    intervals.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (start, end) in intervals {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged.truncate(MAX_SCHOOL_SNIPPETS);

    let mut seen = HashSet::new();
    merged
        .into_iter()
        .map(|(start, end)| chars[start..end].iter().collect::<String>())
        .filter(|snippet| !snippet.trim().is_empty())
        .filter(|snippet| seen.insert(snippet.split_whitespace().collect::<String>()))
        .collect()
}

/// Hybrid extraction over one document's text: a model pass for structure,
/// rule-based passes as baseline and fallback, and catalog-driven
/// classification for tiers and tags.
pub struct ExtractionEngine {
    llm: Option<Arc<dyn ChatModel>>,
    classifier: UniversityClassifier,
    tags: TagCatalog,
    strict: bool,
}

impl ExtractionEngine {
    pub fn new(
        llm: Option<Arc<dyn ChatModel>>,
        classifier: UniversityClassifier,
        tags: TagCatalog,
        strict: bool,
    ) -> Self {
        Self {
            llm,
            classifier,
            tags,
            strict,
        }
    }

    pub async fn parse_resume(
        &self,
        text: &str,
        file_name: &str,
    ) -> Result<ExtractedResume, IntakeError> {
        self.parse_resume_at(text, file_name, Utc::now().date_naive())
            .await
    }

    pub async fn parse_resume_at(
        &self,
        text: &str,
        file_name: &str,
        today: NaiveDate,
    ) -> Result<ExtractedResume, IntakeError> {
        let raw = self.model_extraction(text).await;
        if raw.is_none() && self.llm.is_some() {
            if self.strict {
                return Err(IntakeError::BackendResponse {
                    backend: "llm".to_string(),
                    details: "structured extraction output was unusable".to_string(),
                });
            }
            warn!(file_name, "model extraction unusable, rule-based passes only");
        }

        let mut resume = ExtractedResume::default();

        resume.name = Some(self.resolve_name(raw.as_ref(), text, file_name));
        // Regex-extracted contact wins over the model field, which may invent
        // digits that are not in the document.
        resume.contact_info = fields::extract_contact_info(text)
            .or_else(|| raw.as_ref().and_then(|fields| fields.text("contact_info")));
        resume.education_degree = resolve_degree(raw.as_ref(), text);
        resume.education_major = raw.as_ref().and_then(|fields| fields.text("education_major"));
        resume.self_evaluation = raw.as_ref().and_then(|fields| fields.text("self_evaluation"));
        resume.other = raw.as_ref().and_then(|fields| fields.text("other"));
        resume.skills = {
            let skills = normalize_string_list(
                raw.as_ref().map(|fields| fields.text_list("skills")).unwrap_or_default(),
            );
            (!skills.is_empty()).then_some(skills)
        };

        let schools = self.resolve_schools(raw.as_ref(), text).await;
        if !schools.is_empty() {
            let background = self.classifier.classify_background(&schools).await;
            resume.education_tier = Some(background.highest_education_level);
            resume.education_tiers = Some(background.education_levels);
            resume.education_school = Some(schools);
        }

        resume.category = self.resolve_category(text).await;
        let tags = self.select_tags(text, resume.category).await;
        resume.tag_names = (!tags.is_empty()).then_some(tags);

        let work_entries = raw
            .as_ref()
            .map(|fields| fields.text_list("work_experience"))
            .unwrap_or_default();
        let internship_entries = raw
            .as_ref()
            .map(|fields| fields.text_list("internship_experience"))
            .unwrap_or_default();
        let project_entries = raw
            .as_ref()
            .map(|fields| fields.text_list("project_experience"))
            .unwrap_or_default();

        resume.work_items = structure_entries(self.llm.as_deref(), &work_entries, today).await;
        resume.internship_items =
            structure_entries(self.llm.as_deref(), &internship_entries, today).await;
        resume.project_items = structure_entries(self.llm.as_deref(), &project_entries, today).await;
        localize_items(self.llm.as_deref(), &mut resume.work_items).await;
        localize_items(self.llm.as_deref(), &mut resume.internship_items).await;
        localize_items(self.llm.as_deref(), &mut resume.project_items).await;

        resume.work_experience = (!work_entries.is_empty()).then_some(work_entries);
        resume.internship_experience =
            (!internship_entries.is_empty()).then_some(internship_entries);
        resume.project_experience = (!project_entries.is_empty()).then_some(project_entries);

        resume.work_years = compute_work_years_at(text, today);

        info!(
            file_name,
            has_name = resume.name.as_deref() != Some(UNKNOWN_NAME),
            schools = resume.education_school.as_ref().map_or(0, Vec::len),
            tags = resume.tag_names.as_ref().map_or(0, Vec::len),
            "resume parsed"
        );
        Ok(resume)
    }

    async fn model_extraction(&self, text: &str) -> Option<RawExtraction> {
        let llm = self.llm.as_ref()?;
        let input = truncate_chars(text, EXTRACTION_INPUT_CHARS);
        let content = llm.complete(EXTRACTION_PROMPT, input, Some(3000)).await?;
        let raw = RawExtraction::from_model_output(&content);
        if raw.is_none() {
            debug!("extraction output did not contain a JSON object");
        }
        raw
    }

    fn resolve_name(&self, raw: Option<&RawExtraction>, text: &str, file_name: &str) -> String {
        raw.and_then(|fields| fields.text("name"))
            .or_else(|| fields::extract_name_from_text(text))
            .or_else(|| fields::extract_name_from_filename(file_name))
            .unwrap_or_else(|| UNKNOWN_NAME.to_string())
    }

    /// School source chain: windowed model pass, then the general extraction
    /// field, then the rule-based scan.
    async fn resolve_schools(&self, raw: Option<&RawExtraction>, text: &str) -> Vec<String> {
        if let Some(llm) = self.llm.as_ref() {
            let snippets = school_snippets(text);
            if !snippets.is_empty() {
                let joined = snippets.join("\n---\n");
                if let Some(content) = llm.complete(SCHOOL_PROMPT, &joined, Some(500)).await {
                    if let Some(object) = extract_json_object(&content) {
                        let schools: Vec<String> = object
                            .get("schools")
                            .and_then(Value::as_array)
                            .map(|items| {
                                items
                                    .iter()
                                    .filter_map(Value::as_str)
                                    .map(str::to_string)
                                    .collect()
                            })
                            .unwrap_or_default();
                        let schools = normalize_string_list(schools);
                        if !schools.is_empty() {
                            return schools;
                        }
                    }
                }
            }
        }

        if let Some(raw) = raw {
            let schools = normalize_string_list(raw.text_list("education_school"));
            if !schools.is_empty() {
                return schools;
            }
        }

        normalize_string_list(fields::extract_schools(text).unwrap_or_default())
    }

    async fn resolve_category(&self, text: &str) -> Option<ResumeCategory> {
        let llm = self.llm.as_ref()?;
        let input = truncate_chars(text, CATEGORY_INPUT_CHARS);
        let content = llm.complete(CATEGORY_PROMPT, input, Some(30)).await?;
        let object = extract_json_object(&content)?;
        object
            .get("category")
            .and_then(Value::as_str)
            .and_then(ResumeCategory::from_label)
    }

    /// Closed-world tag selection: direct case-insensitive matching against
    /// the catalog, then a model pass over the tags the direct scan missed.
    /// Model answers outside the catalog are discarded, and the final set is
    /// filtered to the resume's category when one is known.
    async fn select_tags(&self, text: &str, category: Option<ResumeCategory>) -> Vec<String> {
        let catalog_names = self.tags.all_names();
        if catalog_names.is_empty() {
            return Vec::new();
        }

        let lowered_text = text.to_lowercase();
        let mut matched: Vec<String> = Vec::new();
        let mut unmatched: Vec<String> = Vec::new();
        for name in catalog_names {
            if lowered_text.contains(&name.to_lowercase()) {
                matched.push(name);
            } else {
                unmatched.push(name);
            }
        }

        if let Some(llm) = self.llm.as_ref() {
            if !unmatched.is_empty() {
                let input = format!(
                    "候选标签：{}\n\n简历文本：\n{}",
                    unmatched.join("、"),
                    truncate_chars(text, TAG_INPUT_CHARS)
                );
                if let Some(content) = llm.complete(TAG_PROMPT, &input, Some(500)).await {
                    if let Some(parsed) = extract_json_value(&content) {
                        let selected: Vec<&str> = parsed
                            .get("tags")
                            .and_then(Value::as_array)
                            .map(|items| items.iter().filter_map(Value::as_str).collect())
                            .unwrap_or_default();
                        for answer in selected {
                            let canonical = unmatched
                                .iter()
                                .find(|name| name.eq_ignore_ascii_case(answer.trim()));
                            if let Some(canonical) = canonical {
                                matched.push(canonical.clone());
                            }
                        }
                    }
                }
            }
        }

        if let Some(category) = category {
            // Tags carrying the opposite category are dropped; uncategorized
            // catalog tags stay regardless of the resolved category.
            let opposite = self.tags.names_in_category(category.opposite());
            matched.retain(|name| !opposite.contains(name));
        }

        normalize_string_list(matched)
    }
}

/// Degree found in the document text wins; the model field is only consulted
/// when the local scan finds nothing.
fn resolve_degree(raw: Option<&RawExtraction>, text: &str) -> Option<String> {
    let candidates = match fields::extract_degree(text) {
        Some(value) => vec![value],
        None => raw
            .and_then(|fields| fields.text("education_degree"))
            .map(|value| vec![value])?,
    };

    let level = highest_degree_level(&candidates);
    if level == DegreeLevel::Unspecified {
        candidates.into_iter().next()
    } else {
        Some(level.label_zh().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TagEntry, UniversityCatalog};

    const SAMPLE: &str = "个人简历\n\
        张伟\n\
        邮箱：zhangwei@example.com 电话：13812345678\n\
        教育经历：清华大学 计算机科学 本科 2018年毕业\n\
        工作经历：2018.07 - 2023.06 某科技公司 后端工程师，使用 Java 和 MySQL。\n";

    fn engine() -> ExtractionEngine {
        let catalog = UniversityCatalog {
            universities_985: vec!["清华大学".to_string()],
            ..Default::default()
        };
        let tags = TagCatalog {
            entries: vec![
                TagEntry {
                    tag_name: "Java".to_string(),
                    category: Some("技术类".to_string()),
                },
                TagEntry {
                    tag_name: "Rust".to_string(),
                    category: Some("技术类".to_string()),
                },
            ],
        };
        ExtractionEngine::new(None, UniversityClassifier::new(catalog, None), tags, false)
    }

    #[test]
    fn raw_extraction_validates_field_shapes() {
        let raw = RawExtraction::from_model_output(
            r#"{"name": " 李雷 ", "skills": ["Go", 42, ""], "education_school": "北京大学"}"#,
        )
        .unwrap();

        assert_eq!(raw.text("name").as_deref(), Some("李雷"));
        assert_eq!(raw.text("missing"), None);
        assert_eq!(raw.text_list("skills"), vec!["Go".to_string()]);
        assert_eq!(raw.text_list("education_school"), vec!["北京大学".to_string()]);
    }

    #[test]
    fn string_lists_dedupe_case_insensitively() {
        let normalized = normalize_string_list(vec![
            " Java ".to_string(),
            "java".to_string(),
            String::new(),
            "MySQL".to_string(),
        ]);
        assert_eq!(normalized, vec!["Java".to_string(), "MySQL".to_string()]);
    }

    #[test]
    fn snippet_windows_merge_when_overlapping() {
        let text = "这里提到清华大学以及北京大学两所学校的教育经历。";
        let snippets = school_snippets(text);
        // Hits are close together, so one merged window covers them all.
        assert_eq!(snippets.len(), 1);
        assert!(snippets[0].contains("清华大学"));
        assert!(snippets[0].contains("北京大学"));
    }

    #[tokio::test]
    async fn rule_based_parse_fills_core_fields() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let resume = engine()
            .parse_resume_at(SAMPLE, "张伟_简历.pdf", today)
            .await
            .unwrap();

        assert_eq!(resume.name.as_deref(), Some("张伟"));
        let contact = resume.contact_info.unwrap();
        assert!(contact.contains("zhangwei@example.com"));
        assert!(contact.contains("13812345678"));
        assert_eq!(resume.education_degree.as_deref(), Some("本科"));
        assert_eq!(
            resume.education_school.as_deref(),
            Some(&["清华大学".to_string()][..])
        );
        assert_eq!(
            resume.education_tier,
            Some(crate::education::UniversityTier::Tier985)
        );
        // Direct catalog matching picks up Java but not Rust.
        assert_eq!(resume.tag_names.as_deref(), Some(&["Java".to_string()][..]));
        assert_eq!(resume.work_years, Some(5));
    }

    struct ScriptedModel {
        prompt: &'static str,
        reply: &'static str,
    }

    #[async_trait::async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            prompt: &str,
            _text: &str,
            _max_tokens: Option<u32>,
        ) -> Option<String> {
            (prompt == self.prompt).then(|| self.reply.to_string())
        }
    }

    #[tokio::test]
    async fn uncategorized_tags_survive_the_category_filter() {
        let tags = TagCatalog {
            entries: vec![
                TagEntry {
                    tag_name: "Java".to_string(),
                    category: Some("技术类".to_string()),
                },
                TagEntry {
                    tag_name: "品牌运营".to_string(),
                    category: Some("非技术类".to_string()),
                },
                TagEntry {
                    tag_name: "英语沟通".to_string(),
                    category: None,
                },
            ],
        };
        let engine = ExtractionEngine::new(
            None,
            UniversityClassifier::new(UniversityCatalog::default(), None),
            tags,
            false,
        );

        let selected = engine
            .select_tags(
                "精通 Java，英语沟通流利，也了解品牌运营。",
                Some(ResumeCategory::Technical),
            )
            .await;

        assert!(selected.contains(&"Java".to_string()));
        assert!(selected.contains(&"英语沟通".to_string()));
        assert!(!selected.contains(&"品牌运营".to_string()));
    }

    #[tokio::test]
    async fn model_tag_answers_outside_the_catalog_are_discarded() {
        let model = ScriptedModel {
            prompt: TAG_PROMPT,
            reply: r#"{"tags": ["Rust", "量子炼金"]}"#,
        };
        let tags = TagCatalog {
            entries: vec![
                TagEntry {
                    tag_name: "Java".to_string(),
                    category: None,
                },
                TagEntry {
                    tag_name: "Rust".to_string(),
                    category: None,
                },
            ],
        };
        let engine = ExtractionEngine::new(
            Some(Arc::new(model)),
            UniversityClassifier::new(UniversityCatalog::default(), None),
            tags,
            false,
        );

        let selected = engine.select_tags("后端开发，精通 Java。", None).await;
        assert_eq!(selected, vec!["Java".to_string(), "Rust".to_string()]);
    }

    #[tokio::test]
    async fn document_text_beats_model_contact_and_degree() {
        let model = ScriptedModel {
            prompt: EXTRACTION_PROMPT,
            reply: r#"{"name": "张伟", "contact_info": "邮箱: fake@model.invalid", "education_degree": "博士"}"#,
        };
        let engine = ExtractionEngine::new(
            Some(Arc::new(model)),
            UniversityClassifier::new(UniversityCatalog::default(), None),
            TagCatalog::default(),
            false,
        );

        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let resume = engine
            .parse_resume_at(SAMPLE, "张伟.pdf", today)
            .await
            .unwrap();

        let contact = resume.contact_info.unwrap();
        assert!(contact.contains("zhangwei@example.com"));
        assert!(!contact.contains("fake@model.invalid"));
        assert_eq!(resume.education_degree.as_deref(), Some("本科"));
    }

    #[tokio::test]
    async fn name_falls_back_to_filename_then_placeholder() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let engine = engine();

        let from_filename = engine
            .parse_resume_at("plain text with no usable name", "王芳_后端.pdf", today)
            .await
            .unwrap();
        assert_eq!(from_filename.name.as_deref(), Some("王芳"));

        let placeholder = engine
            .parse_resume_at("plain text with no usable name", "resume-2024-final.pdf", today)
            .await
            .unwrap();
        assert_eq!(placeholder.name.as_deref(), Some(UNKNOWN_NAME));
    }
}
