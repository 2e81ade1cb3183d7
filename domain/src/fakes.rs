//! Deterministic stand-ins for the AI collaborators, shared by the domain tests.
use crate::{embeddings, policies, policy_rules, Id};
use async_trait::async_trait;
use chrono::Utc;
use entity::content_type::ContentType;
use entity::keywords::Keywords;
use entity::policy_type::PolicyType;
use entity::rule_type::RuleType;
use entity::severity::Severity;
use review_ai::traits::{analysis, embedding, extraction};
use review_ai::{DocumentAnalysis, Error, FileHandle, Question, Upload};
use sea_orm::DatabaseConnection;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

pub const DIMENSIONS: usize = 32;

/// Embeds text as word counts hashed into [`DIMENSIONS`] buckets, so texts
/// sharing words are similar and texts sharing none are orthogonal.
pub struct BagOfWords {
    /// Texts mapped to a fixed vector instead of being hashed
    pub fixed: HashMap<String, Vec<f32>>,
}

impl BagOfWords {
    pub fn new() -> Self {
        Self {
            fixed: HashMap::new(),
        }
    }

    pub fn with_fixed(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.to_string(), vector);
        self
    }
}

fn bucket(word: &str) -> usize {
    // FNV-1a
    let hash = word.bytes().fold(0xcbf29ce484222325u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    });
    (hash % DIMENSIONS as u64) as usize
}

#[async_trait]
impl embedding::Provider for BagOfWords {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        if let Some(vector) = self.fixed.get(text) {
            return Ok(vector.clone());
        }
        let mut vector = vec![0.0; DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[bucket(&word.to_lowercase())] += 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn provider_id(&self) -> &str {
        "bag-of-words"
    }
}

/// Analyzer keeping uploads in memory and answering with canned text.
#[derive(Default)]
pub struct FakeAnalyzer {
    pub files: Mutex<HashSet<String>>,
    pub uploads: Mutex<Vec<Upload>>,
    pub analyzed_with: Mutex<Vec<String>>,
    pub questions: Mutex<Vec<Question>>,
    pub analysis: DocumentAnalysis,
}

impl FakeAnalyzer {
    pub fn holding(names: &[&str]) -> Self {
        let analyzer = Self::default();
        analyzer
            .files
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| n.to_string()));
        analyzer
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl analysis::Provider for FakeAnalyzer {
    async fn upload(&self, upload: Upload) -> Result<FileHandle, Error> {
        let mut uploads = self.uploads.lock().unwrap();
        let name = format!("files/upload-{}", uploads.len() + 1);
        self.files.lock().unwrap().insert(name.clone());
        let handle = FileHandle {
            uri: format!("https://files.test/{name}"),
            name,
            mime_type: upload.mime_type.clone(),
        };
        uploads.push(upload);
        Ok(handle)
    }

    async fn find_file(&self, name: &str) -> Result<Option<FileHandle>, Error> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(name)
            .map(|name| FileHandle {
                name: name.clone(),
                uri: format!("https://files.test/{name}"),
                mime_type: "text/plain".to_string(),
            }))
    }

    async fn analyze(
        &self,
        _file: &FileHandle,
        rules_text: &str,
    ) -> Result<DocumentAnalysis, Error> {
        self.analyzed_with
            .lock()
            .unwrap()
            .push(rules_text.to_string());
        Ok(self.analysis.clone())
    }

    async fn ask(&self, question: Question) -> Result<String, Error> {
        let answer = format!("Answer to: {}", question.question);
        self.questions.lock().unwrap().push(question);
        Ok(answer)
    }

    fn provider_id(&self) -> &str {
        "fake"
    }
}

/// Extractor returning the same text for every file.
pub struct FixedText(pub Option<String>);

#[async_trait]
impl extraction::Extractor for FixedText {
    async fn extract_text(&self, path: &Path, _content_type: &str) -> Result<String, Error> {
        self.0
            .clone()
            .ok_or_else(|| Error::NoTextExtracted(path.display().to_string()))
    }
}

pub fn new_policy(name: &str, policy_type: PolicyType) -> policies::Model {
    let now = Utc::now();
    policies::Model {
        id: 0,
        name: name.to_string(),
        description: Some(format!("{name} policy")),
        policy_type,
        source_url: None,
        is_active: true,
        company_id: None,
        is_deleted: false,
        created_at: now.into(),
        updated_at: now.into(),
    }
}

pub fn new_rule(policy_id: Id, description: &str) -> policy_rules::Model {
    let now = Utc::now();
    policy_rules::Model {
        id: 0,
        policy_id,
        rule_type: RuleType::Requirement,
        description: Some(description.to_string()),
        severity: Severity::Medium,
        keywords: Keywords::default(),
        is_deleted: false,
        created_at: now.into(),
        updated_at: now.into(),
    }
}

/// Waits for a background upsert to leave a live embedding that `accept` takes.
pub async fn wait_for_embedding(
    db: &DatabaseConnection,
    content_type: ContentType,
    content_id: Id,
    accept: impl Fn(&embeddings::Model) -> bool,
) -> Option<embeddings::Model> {
    for _ in 0..200 {
        let live = entity_api::embedding::find_live(db, content_type, content_id)
            .await
            .unwrap();
        if let Some(live) = live.filter(|row| accept(row)) {
            return Some(live);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}
