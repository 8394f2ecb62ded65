// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types persisted by the storage layer.
//!
//! Enum columns are stored as snake_case text via strum; list columns as
//! JSON arrays; embeddings as little-endian `f32` BLOBs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Kind of recorded experience a memory block holds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Message,
    JournalEntry,
    Goal,
    ActionPlan,
    Exercise,
    Reflection,
    MoodCheckin,
    Insight,
}

/// Who may see a block's content.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    Public,
    #[default]
    Private,
    AiOnly,
}

/// Enrichment lifecycle of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    PendingEnrichment,
    Active,
    Failed,
}

/// A persisted, enrichable unit of user experience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub id: String,
    pub owner: String,
    pub block_type: BlockType,
    /// Feature that produced the block (e.g. "journal", "chat", "tools").
    pub source_feature: String,
    pub source_id: Option<String>,
    pub content: String,
    pub summary: Option<String>,
    pub sentiment: Option<String>,
    pub emotional_tone: Option<String>,
    pub themes: Vec<String>,
    pub tags: Vec<String>,
    pub privacy_level: PrivacyLevel,
    pub is_crisis: bool,
    pub is_sensitive: bool,
    pub exclude_from_memory: bool,
    pub relevance_score: f32,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub status: BlockStatus,
    pub retrieval_count: u32,
    pub last_retrieved_at: Option<String>,
    pub created_at: String,
}

/// Minimal fields supplied at ingestion time.
#[derive(Debug, Clone)]
pub struct NewMemoryBlock {
    pub owner: String,
    pub block_type: BlockType,
    pub source_feature: String,
    pub source_id: Option<String>,
    pub content: String,
    /// `None` resolves to the owner's default privacy level.
    pub privacy_level: Option<PrivacyLevel>,
    pub exclude_from_memory: bool,
}

impl NewMemoryBlock {
    pub fn new(
        owner: impl Into<String>,
        block_type: BlockType,
        source_feature: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            block_type,
            source_feature: source_feature.into(),
            source_id: None,
            content: content.into(),
            privacy_level: None,
            exclude_from_memory: false,
        }
    }

    pub fn source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn privacy(mut self, level: PrivacyLevel) -> Self {
        self.privacy_level = Some(level);
        self
    }

    pub fn excluded(mut self, exclude: bool) -> Self {
        self.exclude_from_memory = exclude;
        self
    }
}

/// Language-model-derived metadata written back by the enrichment job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Enrichment {
    pub summary: Option<String>,
    pub sentiment: Option<String>,
    pub emotional_tone: Option<String>,
    pub themes: Vec<String>,
    pub tags: Vec<String>,
    pub is_crisis: bool,
    pub is_sensitive: bool,
    pub relevance_score: Option<f32>,
}

/// Typed edge between two blocks of the same owner.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Supports,
    Addresses,
    FollowsUpOn,
    DerivedFrom,
    ConnectedTo,
    Contradicts,
    Reinforces,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRelation {
    pub id: String,
    pub owner: String,
    pub source_block_id: String,
    pub target_block_id: String,
    pub relation_type: RelationType,
    pub strength: f32,
    pub auto_generated: bool,
    pub created_at: String,
}

/// Operation recorded in the memory ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LedgerOp {
    Create,
    Retrieve,
    Exclude,
    Delete,
    ChangePrivacy,
}

/// Append-only audit record of one memory operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub owner: String,
    pub block_id: String,
    pub operation: LedgerOp,
    /// Who triggered the operation ("user", "system", "retrieval:<feature>").
    pub actor: String,
    pub context: Option<String>,
    pub relevance_score: Option<f32>,
    pub created_at: String,
}

/// Closed set of background job kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    EnrichAndEmbed,
    DetectRelations,
    SynthesizeContext,
    WeeklySummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A durable unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub job_type: JobType,
    pub owner: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub priority: i32,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub created_at: String,
    /// Earliest time the job may be claimed.
    pub available_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub duration_ms: Option<i64>,
}

impl Job {
    /// Whether another attempt is allowed.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Reads a string field from the payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }
}

/// Parameters for enqueueing a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: JobType,
    pub owner: String,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub max_attempts: u32,
}

impl NewJob {
    pub fn new(job_type: JobType, owner: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            job_type,
            owner: owner.into(),
            payload,
            priority: 0,
            max_attempts: 3,
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Job counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    /// Failed jobs with no attempts left.
    pub exhausted: u64,
}

impl QueueStats {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }
}

/// Per-user memory capability settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySettings {
    pub owner: String,
    pub memory_enabled: bool,
    pub default_privacy: PrivacyLevel,
    /// Features the user switched memory off for.
    pub disabled_features: Vec<String>,
}

impl MemorySettings {
    /// Settings assumed for a user with no settings row.
    pub fn defaults_for(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            memory_enabled: true,
            default_privacy: PrivacyLevel::default(),
            disabled_features: Vec::new(),
        }
    }

    /// Whether memory may be recorded for `feature`.
    pub fn allows(&self, feature: &str) -> bool {
        self.memory_enabled && !self.disabled_features.iter().any(|f| f == feature)
    }
}

/// Per-user personalization profile row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub owner: String,
    pub empathy: f64,
    pub formality: f64,
    pub brevity: f64,
    pub daily_nudge_budget: u32,
    pub energy_bias: f64,
    pub cadence_bias: f64,
    pub quiet_start_hour: u8,
    pub quiet_end_hour: u8,
    pub utc_offset_minutes: i32,
}

impl UserProfile {
    /// Profile assumed for a user with no profile row.
    pub fn defaults_for(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            empathy: 0.70,
            formality: 0.30,
            brevity: 0.50,
            daily_nudge_budget: 2,
            energy_bias: 0.0,
            cadence_bias: 0.0,
            quiet_start_hour: 22,
            quiet_end_hour: 7,
            utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodCheckin {
    pub id: String,
    pub owner: String,
    /// 1 (lowest) to 6 (highest).
    pub mood: f64,
    pub note: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub status: GoalStatus,
    /// Fraction complete, 0 to 1.
    pub progress: f64,
    pub created_at: String,
    pub last_activity_at: Option<String>,
}

/// Completed vs. total goal actions for an owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionCounts {
    pub completed: u64,
    pub total: u64,
}

/// What a nudge suggests.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, AsRefStr, EnumIter,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum NudgeKind {
    JournalPrompt,
    CopingTool,
    MoodCheckin,
    Celebration,
    GoalCheckin,
    GoalReview,
    Reflection,
    Rest,
    Reengagement,
    Suggestion,
}

/// Where a nudge is displayed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Home,
    Journal,
    Goals,
    Tools,
    Chat,
    Mood,
}

/// Structured value carried by nudge payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for PayloadValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for PayloadValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for PayloadValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Map of string keys to [`PayloadValue`]s, ordered for stable serialization.
pub type Payload = BTreeMap<String, PayloadValue>;

/// A persisted nudge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nudge {
    pub id: String,
    pub owner: String,
    pub kind: NudgeKind,
    pub surface: Surface,
    pub title: String,
    pub message: String,
    pub cta_label: Option<String>,
    pub cta_payload: Payload,
    pub priority: u8,
    /// Stable identifier of the rule that produced the nudge, or "llm-fallback".
    pub source_rule: String,
    pub explanation: String,
    pub context_snapshot: Payload,
    pub created_at: String,
    pub shown_at: Option<String>,
    pub accepted_at: Option<String>,
    pub dismissed_at: Option<String>,
    pub completed_at: Option<String>,
    pub expires_at: String,
}

/// Convert f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert a SQLite BLOB back to an f32 vector. Trailing partial chunks are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity of two vectors. Mismatched lengths or zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn enum_text_forms_are_snake_case() {
        assert_eq!(BlockType::JournalEntry.to_string(), "journal_entry");
        assert_eq!(BlockStatus::PendingEnrichment.as_ref(), "pending_enrichment");
        assert_eq!(RelationType::FollowsUpOn.to_string(), "follows_up_on");
        assert_eq!(JobType::from_str("weekly_summary").unwrap(), JobType::WeeklySummary);
        assert_eq!(PrivacyLevel::AiOnly.to_string(), "ai_only");
    }

    #[test]
    fn relation_type_parse_is_case_insensitive() {
        assert_eq!(RelationType::from_str("SUPPORTS").unwrap(), RelationType::Supports);
    }

    #[test]
    fn blob_conversion_preserves_values() {
        let v = vec![0.25_f32, -1.5, 3.0];
        assert_eq!(blob_to_vec(&vec_to_blob(&v)), v);
        assert!(blob_to_vec(&[1, 2, 3]).is_empty());
    }

    #[test]
    fn cosine_similarity_bounds() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn memory_settings_feature_gate() {
        let mut settings = MemorySettings::defaults_for("u1");
        assert!(settings.allows("journal"));
        settings.disabled_features.push("chat".into());
        assert!(!settings.allows("chat"));
        settings.memory_enabled = false;
        assert!(!settings.allows("journal"));
    }

    #[test]
    fn payload_serializes_untagged() {
        let mut payload = Payload::new();
        payload.insert("route".into(), "journal/new".into());
        payload.insert("streak".into(), 5_u32.into());
        payload.insert("themes".into(), vec!["sleep".to_string()].into());
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"route":"journal/new","streak":5.0,"themes":["sleep"]}"#);
        let back: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn job_retry_predicate() {
        let mut job = Job {
            id: "j".into(),
            job_type: JobType::EnrichAndEmbed,
            owner: "u".into(),
            payload: serde_json::json!({"block_id": "b1"}),
            status: JobStatus::Failed,
            priority: 0,
            attempts: 2,
            max_attempts: 3,
            last_error: None,
            created_at: String::new(),
            available_at: String::new(),
            started_at: None,
            completed_at: None,
            duration_ms: None,
        };
        assert!(job.can_retry());
        assert_eq!(job.payload_str("block_id"), Some("b1"));
        job.attempts = 3;
        assert!(!job.can_retry());
    }
}
