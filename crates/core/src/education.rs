use crate::llm::extract_json_object;
use crate::models::UniversityCatalog;
use crate::traits::ChatModel;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Canonical degree level. Weight orders seniority: postdoctoral ranks above
/// doctorate, unspecified sorts last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegreeLevel {
    Postdoctoral,
    Doctorate,
    Master,
    Bachelor,
    Associate,
    SeniorSecondary,
    Unspecified,
}

impl DegreeLevel {
    pub fn weight(&self) -> u16 {
        match self {
            DegreeLevel::Postdoctoral => 0,
            DegreeLevel::Doctorate => 1,
            DegreeLevel::Master => 2,
            DegreeLevel::Bachelor => 3,
            DegreeLevel::Associate => 4,
            DegreeLevel::SeniorSecondary => 5,
            DegreeLevel::Unspecified => 999,
        }
    }

    pub fn label_zh(&self) -> &'static str {
        match self {
            DegreeLevel::Postdoctoral => "博士后",
            DegreeLevel::Doctorate => "博士",
            DegreeLevel::Master => "硕士",
            DegreeLevel::Bachelor => "本科",
            DegreeLevel::Associate => "专科",
            DegreeLevel::SeniorSecondary => "高中",
            DegreeLevel::Unspecified => "未知",
        }
    }
}

const DEGREE_DICTIONARY: &[(&str, DegreeLevel)] = &[
    ("博士后", DegreeLevel::Postdoctoral),
    ("博士", DegreeLevel::Doctorate),
    ("博士研究生", DegreeLevel::Doctorate),
    ("PhD", DegreeLevel::Doctorate),
    ("Ph.D", DegreeLevel::Doctorate),
    ("Ph.D.", DegreeLevel::Doctorate),
    ("Doctor", DegreeLevel::Doctorate),
    ("Doctorate", DegreeLevel::Doctorate),
    ("DPhil", DegreeLevel::Doctorate),
    ("Doctoral", DegreeLevel::Doctorate),
    ("硕士", DegreeLevel::Master),
    ("硕士研究生", DegreeLevel::Master),
    ("研究生", DegreeLevel::Master),
    ("Master", DegreeLevel::Master),
    ("Masters", DegreeLevel::Master),
    ("Master's", DegreeLevel::Master),
    ("MS", DegreeLevel::Master),
    ("M.S.", DegreeLevel::Master),
    ("MA", DegreeLevel::Master),
    ("M.A.", DegreeLevel::Master),
    ("MBA", DegreeLevel::Master),
    ("MEng", DegreeLevel::Master),
    ("MSc", DegreeLevel::Master),
    ("MFA", DegreeLevel::Master),
    ("MPH", DegreeLevel::Master),
    ("MPA", DegreeLevel::Master),
    ("本科", DegreeLevel::Bachelor),
    ("学士", DegreeLevel::Bachelor),
    ("学士学位", DegreeLevel::Bachelor),
    ("Bachelor", DegreeLevel::Bachelor),
    ("Bachelors", DegreeLevel::Bachelor),
    ("Bachelor's", DegreeLevel::Bachelor),
    ("BS", DegreeLevel::Bachelor),
    ("B.S.", DegreeLevel::Bachelor),
    ("BA", DegreeLevel::Bachelor),
    ("B.A.", DegreeLevel::Bachelor),
    ("BEng", DegreeLevel::Bachelor),
    ("BSc", DegreeLevel::Bachelor),
    ("BFA", DegreeLevel::Bachelor),
    ("BBA", DegreeLevel::Bachelor),
    ("专科", DegreeLevel::Associate),
    ("大专", DegreeLevel::Associate),
    ("高职", DegreeLevel::Associate),
    ("大学专科", DegreeLevel::Associate),
    ("Associate", DegreeLevel::Associate),
    ("Associates", DegreeLevel::Associate),
    ("Associate's", DegreeLevel::Associate),
    ("AA", DegreeLevel::Associate),
    ("AS", DegreeLevel::Associate),
    ("AAS", DegreeLevel::Associate),
    ("高中", DegreeLevel::SeniorSecondary),
    ("中专", DegreeLevel::SeniorSecondary),
    ("技校", DegreeLevel::SeniorSecondary),
    ("职高", DegreeLevel::SeniorSecondary),
    ("高中毕业", DegreeLevel::SeniorSecondary),
    ("High School", DegreeLevel::SeniorSecondary),
];

static DEGREE_PATTERNS: LazyLock<Vec<(Regex, DegreeLevel)>> = LazyLock::new(|| {
    let patterns: &[(&str, DegreeLevel)] = &[
        (r"博士后", DegreeLevel::Postdoctoral),
        (r"博士研究生|博士学位|博士", DegreeLevel::Doctorate),
        (r"硕士研究生|硕士学位|研究生|硕士", DegreeLevel::Master),
        (r"学士学位|本科学历|本科|学士", DegreeLevel::Bachelor),
        (r"大学专科|专科学历|专科|大专|高职", DegreeLevel::Associate),
        (r"高中毕业|高中学历|高中|中专|技校|职高", DegreeLevel::SeniorSecondary),
        (r"(?i)Ph\.?D\.?|Doctorate?|Doctoral", DegreeLevel::Doctorate),
        (
            r"(?i)Master'?s?|M\.?S\.?c?|M\.?A\.?|MBA|MEng|MFA|MPH|MPA",
            DegreeLevel::Master,
        ),
        (
            r"(?i)Bachelor'?s?|B\.?S\.?c?|B\.?A\.?|BEng|BFA|BBA",
            DegreeLevel::Bachelor,
        ),
        (r"(?i)Associate'?s?|A\.?A\.?S?\.?", DegreeLevel::Associate),
        (r"(?i)High\s+School|Secondary\s+School", DegreeLevel::SeniorSecondary),
    ];
    patterns
        .iter()
        .map(|(pattern, level)| (Regex::new(pattern).expect("valid regex"), *level))
        .collect()
});

/// Map a raw degree string to a canonical level: exact dictionary lookup,
/// then the seniority-ordered pattern list, then substring keywords.
pub fn normalize_degree(raw: &str) -> DegreeLevel {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return DegreeLevel::Unspecified;
    }

    if let Some((_, level)) = DEGREE_DICTIONARY
        .iter()
        .find(|(keyword, _)| keyword.eq_ignore_ascii_case(&normalized) || *keyword == normalized)
    {
        return *level;
    }

    for (pattern, level) in DEGREE_PATTERNS.iter() {
        if pattern.is_match(&normalized) {
            return *level;
        }
    }

    let lowered = normalized.to_lowercase();
    let keyword_tiers: &[(&[&str], DegreeLevel)] = &[
        (&["博士", "phd", "ph.d", "doctor"], DegreeLevel::Doctorate),
        (&["硕士", "研究生", "master", "mba", "msc"], DegreeLevel::Master),
        (&["本科", "学士", "bachelor", "bsc"], DegreeLevel::Bachelor),
        (&["专科", "大专", "associate"], DegreeLevel::Associate),
        (&["高中", "high school"], DegreeLevel::SeniorSecondary),
    ];
    for (keywords, level) in keyword_tiers {
        if keywords.iter().any(|keyword| lowered.contains(keyword)) {
            return *level;
        }
    }

    DegreeLevel::Unspecified
}

/// Entry with the numerically lowest weight wins.
pub fn highest_degree_level(degrees: &[String]) -> DegreeLevel {
    degrees
        .iter()
        .map(|degree| normalize_degree(degree))
        .min_by_key(DegreeLevel::weight)
        .unwrap_or(DegreeLevel::Unspecified)
}

/// University prestige classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UniversityTier {
    #[serde(rename = "985")]
    Tier985,
    #[serde(rename = "211")]
    Tier211,
    #[serde(rename = "double_first_class")]
    DoubleFirstClass,
    #[serde(rename = "overseas")]
    Overseas,
    #[serde(rename = "regular")]
    Regular,
    #[serde(rename = "unknown")]
    Unknown,
}

impl UniversityTier {
    pub fn code(&self) -> &'static str {
        match self {
            UniversityTier::Tier985 => "985",
            UniversityTier::Tier211 => "211",
            UniversityTier::DoubleFirstClass => "double_first_class",
            UniversityTier::Overseas => "overseas",
            UniversityTier::Regular => "regular",
            UniversityTier::Unknown => "unknown",
        }
    }

    pub fn label_zh(&self) -> &'static str {
        match self {
            UniversityTier::Tier985 => "985",
            UniversityTier::Tier211 => "211",
            UniversityTier::DoubleFirstClass => "双一流",
            UniversityTier::Overseas => "海外",
            UniversityTier::Regular => "普通本科",
            UniversityTier::Unknown => "未知",
        }
    }
}

const UNIVERSITY_ALIASES: &[(&str, &str)] = &[
    ("清华", "清华大学"),
    ("北大", "北京大学"),
    ("人大", "中国人民大学"),
    ("北航", "北京航空航天大学"),
    ("北师大", "北京师范大学"),
    ("北理工", "北京理工大学"),
    ("中科大", "中国科学技术大学"),
    ("科大", "中国科学技术大学"),
    ("复旦", "复旦大学"),
    ("上交", "上海交通大学"),
    ("上海交大", "上海交通大学"),
    ("浙大", "浙江大学"),
    ("南大", "南京大学"),
    ("中大", "中山大学"),
    ("华科", "华中科技大学"),
    ("华中科大", "华中科技大学"),
    ("西交", "西安交通大学"),
    ("西安交大", "西安交通大学"),
    ("哈工大", "哈尔滨工业大学"),
    ("武大", "武汉大学"),
    ("川大", "四川大学"),
    ("电子科大", "电子科技大学"),
    ("成电", "电子科技大学"),
    ("UESTC", "电子科技大学"),
    ("北邮", "北京邮电大学"),
    ("北科", "北京科技大学"),
    ("北交", "北京交通大学"),
    ("华理", "华东理工大学"),
    ("东华", "东华大学"),
    ("上财", "上海财经大学"),
    ("上外", "上海外国语大学"),
    ("华电", "华北电力大学"),
    ("石油大学", "中国石油大学"),
    ("地质大学", "中国地质大学"),
    ("矿业大学", "中国矿业大学"),
    ("传媒大学", "中国传媒大学"),
    ("政法大学", "中国政法大学"),
    ("农业大学", "中国农业大学"),
    ("Harvard", "Harvard University"),
    ("哈佛", "Harvard University"),
    ("Stanford", "Stanford University"),
    ("斯坦福", "Stanford University"),
    ("MIT", "Massachusetts Institute of Technology"),
    ("麻省理工", "Massachusetts Institute of Technology"),
    ("Cambridge", "University of Cambridge"),
    ("剑桥", "University of Cambridge"),
    ("Oxford", "University of Oxford"),
    ("牛津", "University of Oxford"),
    ("Berkeley", "University of California, Berkeley"),
    ("UCLA", "University of California, Los Angeles"),
    ("Yale", "Yale University"),
    ("耶鲁", "Yale University"),
    ("Princeton", "Princeton University"),
    ("普林斯顿", "Princeton University"),
    ("Columbia", "Columbia University"),
    ("哥伦比亚", "Columbia University"),
    ("Caltech", "California Institute of Technology"),
    ("加州理工", "California Institute of Technology"),
    ("Penn", "University of Pennsylvania"),
    ("Cornell", "Cornell University"),
    ("康奈尔", "Cornell University"),
    ("UCL", "University College London"),
    ("帝国理工", "Imperial College London"),
    ("LSE", "London School of Economics"),
    ("伦敦政经", "London School of Economics"),
    ("爱丁堡", "University of Edinburgh"),
    ("曼彻斯特", "University of Manchester"),
    ("东京大学", "University of Tokyo"),
    ("京都大学", "Kyoto University"),
    ("早稻田", "Waseda University"),
    ("首尔大学", "Seoul National University"),
    ("KAIST", "KAIST"),
    ("新加坡国立", "National University of Singapore"),
    ("NUS", "National University of Singapore"),
    ("南洋理工", "Nanyang Technological University"),
    ("NTU", "Nanyang Technological University"),
    ("港大", "University of Hong Kong"),
    ("多伦多大学", "University of Toronto"),
    ("UBC", "University of British Columbia"),
    ("McGill", "McGill University"),
    ("墨尔本大学", "University of Melbourne"),
    ("悉尼大学", "University of Sydney"),
    ("ANU", "Australian National University"),
];

fn normalize_university_name(name: &str) -> String {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    UNIVERSITY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == collapsed)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(collapsed)
}

/// Similarity ratio in [0, 1]: twice the longest common subsequence over the
/// combined length, case-insensitive.
pub fn similarity_ratio(left: &str, right: &str) -> f64 {
    let left: Vec<char> = left.to_lowercase().chars().collect();
    let right: Vec<char> = right.to_lowercase().chars().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let mut previous = vec![0usize; right.len() + 1];
    let mut current = vec![0usize; right.len() + 1];
    for l in &left {
        for (j, r) in right.iter().enumerate() {
            current[j + 1] = if l == r {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    let lcs = previous[right.len()] as f64;
    2.0 * lcs / (left.len() + right.len()) as f64
}

const FUZZY_THRESHOLD: f64 = 0.8;

fn fuzzy_match<'a>(target: &str, candidates: &'a [String]) -> Option<&'a str> {
    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let ratio = similarity_ratio(target, candidate);
        if ratio >= FUZZY_THRESHOLD && best.map_or(true, |(_, best_ratio)| ratio > best_ratio) {
            best = Some((candidate, ratio));
        }
    }
    best.map(|(candidate, _)| candidate)
}

const OVERSEAS_PROMPT: &str = concat!(
    "判断给定的院校名称是否属于海外大学。仅输出 JSON，不要解释。\n",
    "输出格式：{\"overseas\": true|false|null}\n",
    "规则：\n",
    "- overseas=true 表示海外大学；false 表示非海外（国内）。\n",
    "- 无法判断时 overseas=null。\n",
    "- 严格只返回一个 JSON 对象。\n",
    "\n",
    "示例：\n",
    "输入: 'Harvard University'\n输出: {\"overseas\": true}\n\n",
    "输入: '清华大学'\n输出: {\"overseas\": false}\n\n",
    "输入: '北京邮电大学'\n输出: {\"overseas\": false}\n\n",
    "输入: 'University of Cambridge'\n输出: {\"overseas\": true}\n",
);

/// Ordered fallback chain for tier classification. The order is load-bearing
/// and tested; later strategies only run when earlier ones abstain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierStrategy {
    ExactMembership,
    FuzzyMembership,
    LlmOverseas,
    Heuristic,
}

pub const TIER_STRATEGIES: &[TierStrategy] = &[
    TierStrategy::ExactMembership,
    TierStrategy::FuzzyMembership,
    TierStrategy::LlmOverseas,
    TierStrategy::Heuristic,
];

pub struct UniversityClassifier {
    catalog: UniversityCatalog,
    llm: Option<Arc<dyn ChatModel>>,
}

#[derive(Debug, Clone)]
pub struct BackgroundClassification {
    /// Deduplicated tiers across all schools, unknowns excluded.
    pub education_levels: Vec<UniversityTier>,
    pub highest_education_level: UniversityTier,
}

impl UniversityClassifier {
    pub fn new(catalog: UniversityCatalog, llm: Option<Arc<dyn ChatModel>>) -> Self {
        Self { catalog, llm }
    }

    /// Never fails: any internal extraction or oracle failure degrades to the
    /// next strategy or to `Unknown`.
    pub async fn classify_university(&self, name: &str) -> UniversityTier {
        let name = normalize_university_name(name);
        if name.is_empty() {
            return UniversityTier::Unknown;
        }

        for strategy in TIER_STRATEGIES {
            if let Some(tier) = self.attempt(*strategy, &name).await {
                debug!(school = %name, strategy = ?strategy, tier = tier.code(), "tier resolved");
                return tier;
            }
        }
        UniversityTier::Unknown
    }

    async fn attempt(&self, strategy: TierStrategy, name: &str) -> Option<UniversityTier> {
        match strategy {
            TierStrategy::ExactMembership => {
                let lists = [
                    (&self.catalog.universities_985, UniversityTier::Tier985),
                    (&self.catalog.universities_211, UniversityTier::Tier211),
                    (
                        &self.catalog.universities_double_first_class,
                        UniversityTier::DoubleFirstClass,
                    ),
                ];
                lists
                    .iter()
                    .find(|(list, _)| list.iter().any(|entry| entry == name))
                    .map(|(_, tier)| *tier)
            }
            TierStrategy::FuzzyMembership => {
                let lists = [
                    (&self.catalog.universities_985, UniversityTier::Tier985),
                    (&self.catalog.universities_211, UniversityTier::Tier211),
                    (
                        &self.catalog.universities_double_first_class,
                        UniversityTier::DoubleFirstClass,
                    ),
                ];
                lists
                    .iter()
                    .find(|(list, _)| fuzzy_match(name, list).is_some())
                    .map(|(_, tier)| *tier)
            }
            TierStrategy::LlmOverseas => {
                let llm = self.llm.as_ref()?;
                let content = llm.complete(OVERSEAS_PROMPT, name, Some(30)).await?;
                let object = extract_json_object(&content)?;
                match object.get("overseas") {
                    Some(serde_json::Value::Bool(true)) => Some(UniversityTier::Overseas),
                    Some(serde_json::Value::Bool(false)) => Some(UniversityTier::Regular),
                    _ => None,
                }
            }
            TierStrategy::Heuristic => {
                const OVERSEAS_KEYWORDS: &[&str] = &[
                    "University",
                    "College",
                    "Institute",
                    "School",
                    "Universität",
                    "Université",
                    "Universidad",
                    "Università",
                    "Universidade",
                    "Universiteit",
                ];
                const DOMESTIC_KEYWORDS: &[&str] = &["大学", "学院", "职业技术学院", "高等专科学校"];

                let ascii_ratio = name.chars().filter(char::is_ascii).count() as f64
                    / name.chars().count().max(1) as f64;
                if ascii_ratio > 0.5 && OVERSEAS_KEYWORDS.iter().any(|keyword| name.contains(keyword))
                {
                    return Some(UniversityTier::Overseas);
                }
                if DOMESTIC_KEYWORDS.iter().any(|keyword| name.contains(keyword)) {
                    return Some(UniversityTier::Regular);
                }
                None
            }
        }
    }

    /// Classify every school, deduplicate tiers, and derive the single
    /// highest level by fixed priority: 985 > overseas > 211 >
    /// double-first-class > regular > unknown.
    pub async fn classify_background(&self, schools: &[String]) -> BackgroundClassification {
        let mut levels: Vec<UniversityTier> = Vec::new();
        for school in schools {
            let tier = self.classify_university(school).await;
            if tier != UniversityTier::Unknown && !levels.contains(&tier) {
                levels.push(tier);
            }
        }

        const PRIORITY: &[UniversityTier] = &[
            UniversityTier::Tier985,
            UniversityTier::Overseas,
            UniversityTier::Tier211,
            UniversityTier::DoubleFirstClass,
            UniversityTier::Regular,
        ];
        let highest = PRIORITY
            .iter()
            .find(|tier| levels.contains(tier))
            .copied()
            .unwrap_or(UniversityTier::Unknown);

        BackgroundClassification {
            education_levels: levels,
            highest_education_level: highest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> UniversityCatalog {
        UniversityCatalog {
            universities_985: vec![
                "清华大学".to_string(),
                "Tsinghua University".to_string(),
            ],
            universities_211: vec!["北京邮电大学".to_string()],
            universities_double_first_class: vec!["宁波大学".to_string()],
        }
    }

    fn classifier() -> UniversityClassifier {
        UniversityClassifier::new(catalog(), None)
    }

    #[test]
    fn doctorate_spellings_normalize_identically() {
        assert_eq!(normalize_degree("Ph.D."), DegreeLevel::Doctorate);
        assert_eq!(normalize_degree("博士"), DegreeLevel::Doctorate);
        assert_eq!(normalize_degree("Doctoral"), DegreeLevel::Doctorate);
    }

    #[test]
    fn highest_level_prefers_lowest_weight() {
        let degrees = vec!["硕士".to_string(), "博士".to_string()];
        assert_eq!(highest_degree_level(&degrees), DegreeLevel::Doctorate);

        let with_postdoc = vec!["博士".to_string(), "博士后".to_string()];
        assert_eq!(highest_degree_level(&with_postdoc), DegreeLevel::Postdoctoral);
    }

    #[test]
    fn unmatched_degree_is_unspecified() {
        assert_eq!(normalize_degree("级别保密"), DegreeLevel::Unspecified);
        assert_eq!(normalize_degree(""), DegreeLevel::Unspecified);
    }

    #[tokio::test]
    async fn exact_membership_wins_after_alias_normalization() {
        assert_eq!(
            classifier().classify_university("清华").await,
            UniversityTier::Tier985
        );
        assert_eq!(
            classifier().classify_university("北京邮电大学").await,
            UniversityTier::Tier211
        );
    }

    #[tokio::test]
    async fn fuzzy_membership_tolerates_typos() {
        assert_eq!(
            classifier().classify_university("Tsinghua Universty").await,
            UniversityTier::Tier985
        );
    }

    #[tokio::test]
    async fn heuristic_fallback_without_oracle() {
        assert_eq!(
            classifier().classify_university("Ludwig Maximilian University").await,
            UniversityTier::Overseas
        );
        assert_eq!(
            classifier().classify_university("某地职业技术学院").await,
            UniversityTier::Regular
        );
        assert_eq!(
            classifier().classify_university("???").await,
            UniversityTier::Unknown
        );
    }

    #[tokio::test]
    async fn background_priority_puts_overseas_above_211() {
        let classification = classifier()
            .classify_background(&[
                "北京邮电大学".to_string(),
                "Ludwig Maximilian University".to_string(),
            ])
            .await;
        assert_eq!(
            classification.highest_education_level,
            UniversityTier::Overseas
        );
        assert_eq!(classification.education_levels.len(), 2);
    }
}
