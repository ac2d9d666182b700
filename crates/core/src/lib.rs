pub mod config;
pub mod education;
pub mod error;
pub mod experience;
pub mod extract;
pub mod fields;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod orchestrator;
pub mod stores;
pub mod timeline;
pub mod traits;

pub use config::Settings;
pub use education::{
    highest_degree_level, normalize_degree, BackgroundClassification, DegreeLevel,
    UniversityClassifier, UniversityTier,
};
pub use error::{ExtractError, IntakeError, Result};
pub use experience::{structure_entries, ExperienceItem};
pub use extract::{normalize_string_list, ExtractionEngine, RawExtraction};
pub use fields::{extract_contact_info, extract_degree, extract_schools};
pub use llm::LlmClient;
pub use models::{
    DocumentRecord, DocumentStatus, ExtractedResume, ResumeCategory, TagCatalog, TagEntry,
    UniversityCatalog,
};
pub use ocr::OcrEngine;
pub use orchestrator::IntakeCoordinator;
pub use stores::{BucketObjectStore, RestStore};
pub use timeline::{compute_work_years, extract_periods, merge_periods};
pub use traits::{CatalogStore, ChatModel, DocumentStore, ObjectStore};
