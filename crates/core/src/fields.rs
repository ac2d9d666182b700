use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex")
});
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\+?86[- ]?)?(1[3-9]\d{9})").expect("valid regex"));

fn is_cjk(ch: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&ch)
}

pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_RE.find(text).map(|found| found.as_str().to_string())
}

/// First CN-style 11-digit mobile not embedded in a longer digit run.
pub fn extract_phone(text: &str) -> Option<String> {
    for captures in PHONE_RE.captures_iter(text) {
        let Some(number) = captures.get(1) else {
            continue;
        };
        let before = text[..number.start()].chars().next_back();
        let after = text[number.end()..].chars().next();
        if before.is_some_and(|ch| ch.is_ascii_digit()) {
            continue;
        }
        if after.is_some_and(|ch| ch.is_ascii_digit()) {
            continue;
        }
        return Some(number.as_str().to_string());
    }
    None
}

pub fn extract_contact_info(text: &str) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(email) = extract_email(text) {
        parts.push(format!("邮箱: {email}"));
    }
    if let Some(phone) = extract_phone(text) {
        parts.push(format!("电话: {phone}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

/// First literal hit scanning in descending-seniority keyword order.
pub fn extract_degree(text: &str) -> Option<String> {
    const DEGREE_KEYWORDS: &[&str] = &[
        "博士后", "博士", "研究生", "硕士", "本科", "大专", "专科", "PhD", "Master", "Bachelor",
    ];
    DEGREE_KEYWORDS
        .iter()
        .find(|keyword| text.contains(*keyword))
        .map(|keyword| keyword.to_string())
}

static LATIN_SCHOOL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[A-Za-z][A-Za-z .&\-]{1,60}?(?:University|College|Institute|Polytechnic|Academy)\b")
        .expect("valid regex")
});
static CJK_SCHOOL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x{4e00}-\x{9fa5}A-Za-z·\-（）() ]{1,40}?(?:大学|学院|学校)").expect("valid regex")
});
static PARENTHETICAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[\(（\[【].*$").expect("valid regex"));
static LEADING_ORDINAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{1,3}|[一二三四五六七八九十]{1,3}|[A-Za-z])[\.)、\-\s]+").expect("valid regex")
});
static CJK_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(大学|学院|学校)$").expect("valid regex"));
static LATIN_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(University|College|Institute|Polytechnic|Academy)$").expect("valid regex")
});

fn title_case(value: &str) -> String {
    const SMALL_WORDS: &[&str] = &["of", "the", "and", "in", "for", "at"];
    let words: Vec<String> = value
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect();
    let last = words.len().saturating_sub(1);
    words
        .iter()
        .enumerate()
        .map(|(index, word)| {
            if index > 0 && index < last && SMALL_WORDS.contains(&word.as_str()) {
                word.clone()
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn clean_school(candidate: &str) -> Option<String> {
    let mut value = candidate.trim().to_string();
    if value.is_empty() {
        return None;
    }
    value = PARENTHETICAL_RE.replace(&value, "").trim().to_string();
    value = LEADING_ORDINAL_RE.replace(&value, "").to_string();
    value = value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|ch: char| "-·、，,；;.:：()（） ".contains(ch))
        .to_string();

    if let Some(suffix) = CJK_SUFFIX_RE.find(&value) {
        let stem = &value[..suffix.start()];
        if !stem.chars().any(is_cjk) {
            return None;
        }
        let length = value.chars().count();
        if !(2..=30).contains(&length) {
            return None;
        }
        return Some(value);
    }

    if LATIN_SUFFIX_RE.is_match(&value) {
        if !(3..=60).contains(&value.chars().count()) {
            return None;
        }
        return Some(title_case(&value));
    }

    None
}

/// Regex-only school extraction: Latin names ending in an institution-type
/// suffix and CJK names ending in 大学/学院/学校, cleaned and deduplicated by
/// a whitespace/case-normalized key.
pub fn extract_schools(text: &str) -> Option<Vec<String>> {
    let candidates = LATIN_SCHOOL_RE
        .find_iter(text)
        .chain(CJK_SCHOOL_RE.find_iter(text))
        .map(|found| found.as_str());

    let mut cleaned = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for candidate in candidates {
        let Some(value) = clean_school(candidate) else {
            continue;
        };
        let key: String = value
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if seen.insert(key) {
            cleaned.push(value);
        }
    }

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

static NAME_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:姓名|name)[:：]\s*([\x{4e00}-\x{9fa5}·]{2,10})").expect("valid regex")
});
static CJK_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\x{4e00}-\x{9fa5}·]{2,10}$").expect("valid regex"));
static LATIN_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z][a-z]+)(?:\s+[A-Z][a-z]+){0,2}$").expect("valid regex"));

fn document_head(text: &str) -> &str {
    match text.char_indices().nth(1200) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

/// Explicit "姓名/name:" label, else the first short CJK-only line in the
/// document head that is not a generic title.
pub fn extract_name_from_text(text: &str) -> Option<String> {
    const TITLE_BLACKLIST: &[&str] = &[
        "个人简历",
        "简历",
        "RESUME",
        "CV",
        "Curriculum Vitae",
        "个人信息",
        "基本信息",
        "求职意向",
        "教育经历",
        "教育背景",
        "工作经历",
        "工作经验",
        "实习经历",
        "项目经历",
        "项目经验",
        "专业技能",
        "技能特长",
        "自我评价",
        "荣誉奖项",
    ];
    let head = document_head(text);

    if let Some(captures) = NAME_LABEL_RE.captures(head) {
        return Some(captures[1].trim().to_string());
    }

    head.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(10)
        .find(|line| !TITLE_BLACKLIST.contains(line) && CJK_NAME_RE.is_match(line))
        .map(|line| line.to_string())
}

/// CJK token or a 2-3 word capitalized English token parsed from the file name.
pub fn extract_name_from_filename(file_name: &str) -> Option<String> {
    let base = match file_name.rfind('.') {
        Some(position) if position > 0 => &file_name[..position],
        _ => file_name,
    };

    for part in base.split(|ch: char| ch.is_whitespace() || ch == '_' || ch == '-') {
        let part = part.trim();
        if !part.is_empty() && CJK_NAME_RE.is_match(part) {
            return Some(part.to_string());
        }
    }

    LATIN_NAME_RE
        .find(base.trim())
        .map(|found| found.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_joins_first_email_and_phone() {
        let text = "联系方式 someone@example.com 备用 other@example.com\n电话 +86 13812345678";
        assert_eq!(
            extract_contact_info(text),
            Some("邮箱: someone@example.com | 电话: 13812345678".to_string())
        );
    }

    #[test]
    fn phone_rejects_longer_digit_runs() {
        assert_eq!(extract_phone("编号 913812345678999"), None);
        assert_eq!(
            extract_phone("手机：13812345678"),
            Some("13812345678".to_string())
        );
    }

    #[test]
    fn degree_ladder_prefers_seniority() {
        let text = "本科毕业后攻读博士学位";
        assert_eq!(extract_degree(text), Some("博士".to_string()));
        assert_eq!(extract_degree("amateur cook"), None);
    }

    #[test]
    fn schools_are_cleaned_and_deduplicated() {
        let text = "03 清华大学（QS前50） 计算机系\nstanford university\n清华 大学";
        let schools = extract_schools(text).unwrap();
        assert!(schools.contains(&"清华大学".to_string()));
        assert!(schools.contains(&"Stanford University".to_string()));
        assert_eq!(
            schools
                .iter()
                .filter(|name| name.contains("清华"))
                .count(),
            1
        );
    }

    #[test]
    fn latin_title_case_keeps_small_words() {
        let schools = extract_schools("school of the art institute").unwrap();
        assert_eq!(schools[0], "School of the Art Institute");
    }

    #[test]
    fn name_from_labeled_head() {
        assert_eq!(
            extract_name_from_text("姓名：王小明\n电话 13812345678"),
            Some("王小明".to_string())
        );
    }

    #[test]
    fn name_from_short_line_skips_titles() {
        let text = "个人简历\n李雷\n教育经历";
        assert_eq!(extract_name_from_text(text), Some("李雷".to_string()));
    }

    #[test]
    fn section_headers_are_not_names() {
        let text = "教育经历\n清华大学 本科\n工作经历\n某公司 工程师";
        assert_eq!(extract_name_from_text(text), None);
    }

    #[test]
    fn name_from_filename_prefers_cjk_tokens() {
        assert_eq!(
            extract_name_from_filename("简历_张伟_2024.pdf"),
            Some("张伟".to_string())
        );
        assert_eq!(
            extract_name_from_filename("John Smith.pdf"),
            Some("John Smith".to_string())
        );
        assert_eq!(extract_name_from_filename("scan0001.pdf"), None);
    }
}
