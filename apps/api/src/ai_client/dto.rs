//! Wire types for the AI inference service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::resume::ResumeAnswer;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumeQaItem {
    pub num: String,
    pub question: String,
    pub answer: String,
    pub content: String,
}

impl ResumeQaItem {
    /// Numbers resume answers from "1" in the order given.
    pub fn numbered(answers: &[ResumeAnswer]) -> Vec<ResumeQaItem> {
        answers
            .iter()
            .enumerate()
            .map(|(i, a)| ResumeQaItem {
                num: (i + 1).to_string(),
                question: a.question.clone(),
                answer: a.answer.clone(),
                content: a.answer.clone(),
            })
            .collect()
    }
}

/// One prior question/answer pair supplied as conversation context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QnaTurn {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterviewInput {
    #[serde(rename = "jd_presigned_url")]
    pub jd_url: String,
    pub resume: Vec<ResumeQaItem>,
    pub qna_history: Vec<QnaTurn>,
    pub latest_wav_file_url: String,
    /// Upload URLs the service writes synthesized question audio to.
    #[serde(rename = "saved_tts_file_url")]
    pub tts_upload_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterviewResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub converted_text_with_stt: Option<String>,
    #[serde(default)]
    pub text_from_tts: Vec<String>,
    #[serde(default)]
    pub talker: Vec<i32>,
}

impl InterviewResponse {
    /// Speaker code for the n-th generated question, if the service sent one.
    pub fn talker_at(&self, index: usize) -> Option<i32> {
        self.talker.get(index).copied()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EndInterviewInput {
    #[serde(rename = "jd_presigned_url")]
    pub jd_url: String,
    pub resume: Vec<ResumeQaItem>,
    pub qna_history: Vec<QnaTurn>,
    pub preflight_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndInterviewResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub scores: Option<BTreeMap<String, i32>>,
    /// Flat per-sentence labels for every answer, in Q&A order.
    #[serde(default)]
    pub labels: Option<Vec<i32>>,
    #[serde(default)]
    pub report: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OcrInput {
    pub pre_signed_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SttRequest {
    pub stt_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SttResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub converted_text: Option<String>,
}
