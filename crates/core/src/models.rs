use crate::education::UniversityTier;
use crate::experience::ExperienceItem;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

/// Lifecycle of one intake document as tracked by the relational store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Pulling,
    Processing,
    Processed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Pulling => "pulling",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(DocumentStatus::Pending),
            "pulling" => Some(DocumentStatus::Pulling),
            "processing" => Some(DocumentStatus::Processing),
            "processed" => Some(DocumentStatus::Processed),
            "failed" => Some(DocumentStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub file_name: String,
    /// Local path or remote URL the document came from; empty until known.
    #[serde(default)]
    pub source_location: Option<String>,
    pub status: DocumentStatus,
    #[serde(default)]
    pub uploaded_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResumeCategory {
    Technical,
    NonTechnical,
}

impl ResumeCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ResumeCategory::Technical => "技术类",
            ResumeCategory::NonTechnical => "非技术类",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "技术类" => Some(ResumeCategory::Technical),
            "非技术类" => Some(ResumeCategory::NonTechnical),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            ResumeCategory::Technical => ResumeCategory::NonTechnical,
            ResumeCategory::NonTechnical => ResumeCategory::Technical,
        }
    }
}

/// Structured output of parsing one document's text. All fields are
/// best-effort; absent evidence stays `None` rather than failing the parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedResume {
    pub document_id: Option<i64>,
    pub name: Option<String>,
    pub contact_info: Option<String>,
    pub education_degree: Option<String>,
    pub education_school: Option<Vec<String>>,
    pub education_major: Option<String>,
    pub education_tier: Option<UniversityTier>,
    pub education_tiers: Option<Vec<UniversityTier>>,
    pub category: Option<ResumeCategory>,
    pub tag_names: Option<Vec<String>>,
    pub skills: Option<Vec<String>>,
    pub work_experience: Option<Vec<String>>,
    pub internship_experience: Option<Vec<String>>,
    pub project_experience: Option<Vec<String>>,
    pub work_items: Vec<ExperienceItem>,
    pub internship_items: Vec<ExperienceItem>,
    pub project_items: Vec<ExperienceItem>,
    pub self_evaluation: Option<String>,
    pub other: Option<String>,
    /// Derived from document text only, never user-supplied.
    pub work_years: Option<i64>,
}

impl ExtractedResume {
    /// Row payload for the resumes table. Empty strings and empty lists are
    /// persisted as nulls.
    pub fn to_row(&self) -> Value {
        fn opt_str(value: &Option<String>) -> Value {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => json!(v),
                _ => Value::Null,
            }
        }
        fn opt_list(value: &Option<Vec<String>>) -> Value {
            match value {
                Some(items) if !items.is_empty() => json!(items),
                _ => Value::Null,
            }
        }
        fn items(value: &[ExperienceItem]) -> Value {
            if value.is_empty() {
                Value::Null
            } else {
                json!(value)
            }
        }

        json!({
            "resume_file_id": self.document_id,
            "name": opt_str(&self.name),
            "contact_info": opt_str(&self.contact_info),
            "education_degree": opt_str(&self.education_degree),
            "education_school": opt_list(&self.education_school),
            "education_major": opt_str(&self.education_major),
            "education_tier": self.education_tier.map(|tier| tier.code()),
            "education_tiers": self.education_tiers.as_ref().map(|tiers| {
                tiers.iter().map(|tier| tier.code()).collect::<Vec<_>>()
            }),
            "category": self.category.map(|category| category.label()),
            "tag_names": opt_list(&self.tag_names),
            "skills": opt_list(&self.skills),
            "work_experience": opt_list(&self.work_experience),
            "internship_experience": opt_list(&self.internship_experience),
            "project_experience": opt_list(&self.project_experience),
            "work_experience_items": items(&self.work_items),
            "internship_experience_items": items(&self.internship_items),
            "project_experience_items": items(&self.project_items),
            "self_evaluation": opt_str(&self.self_evaluation),
            "other": opt_str(&self.other),
            "work_years": self.work_years,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagEntry {
    pub tag_name: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Read-only tag catalog snapshot used for closed-world tag selection.
#[derive(Debug, Clone, Default)]
pub struct TagCatalog {
    pub entries: Vec<TagEntry>,
}

impl TagCatalog {
    pub fn all_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.tag_name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn names_in_category(&self, category: ResumeCategory) -> HashSet<String> {
        self.entries
            .iter()
            .filter(|entry| {
                entry
                    .category
                    .as_deref()
                    .and_then(ResumeCategory::from_label)
                    == Some(category)
            })
            .map(|entry| entry.tag_name.trim().to_string())
            .collect()
    }
}

/// University tier reference lists, treated as an immutable snapshot for the
/// duration of one classification call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UniversityCatalog {
    #[serde(default)]
    pub universities_985: Vec<String>,
    #[serde(default)]
    pub universities_211: Vec<String>,
    #[serde(default)]
    pub universities_double_first_class: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_persist_as_nulls() {
        let resume = ExtractedResume {
            document_id: Some(7),
            name: Some("张三".to_string()),
            contact_info: Some("  ".to_string()),
            skills: Some(Vec::new()),
            ..Default::default()
        };

        let row = resume.to_row();
        assert_eq!(row["resume_file_id"], json!(7));
        assert_eq!(row["name"], json!("张三"));
        assert_eq!(row["contact_info"], Value::Null);
        assert_eq!(row["skills"], Value::Null);
        assert_eq!(row["work_years"], Value::Null);
    }

    #[test]
    fn tag_catalog_filters_by_category() {
        let catalog = TagCatalog {
            entries: vec![
                TagEntry {
                    tag_name: "Java".to_string(),
                    category: Some("技术类".to_string()),
                },
                TagEntry {
                    tag_name: "品牌运营".to_string(),
                    category: Some("非技术类".to_string()),
                },
            ],
        };

        let technical = catalog.names_in_category(ResumeCategory::Technical);
        assert!(technical.contains("Java"));
        assert!(!technical.contains("品牌运营"));
    }
}
