//! Conversation context handed to the AI service.

use crate::ai_client::dto::{QnaTurn, ResumeQaItem};
use crate::errors::AppError;
use crate::interview::tree::{replies_by_question, QuestionTree};
use crate::models::interview::{Interview, InterviewQuestion, Reply};
use crate::resume::repository::ResumeRepository;

/// Root questions in creation order with their answer, or "" when
/// unanswered. Follow-ups are never part of the history.
pub fn root_history(
    questions: &[InterviewQuestion],
    replies: &[Reply],
    exclude: Option<i64>,
) -> Vec<QnaTurn> {
    let tree = QuestionTree::build(questions);
    let answers = replies_by_question(replies);
    tree.roots()
        .iter()
        .filter(|q| Some(q.id) != exclude)
        .map(|q| QnaTurn {
            question: q.content.clone(),
            answer: answers
                .get(&q.id)
                .map(|r| r.content.clone())
                .unwrap_or_default(),
        })
        .collect()
}

/// Numbered resume Q&A of the interview's resume; empty for a demo.
pub async fn resume_qa(
    resumes: &dyn ResumeRepository,
    interview: &Interview,
) -> Result<Vec<ResumeQaItem>, AppError> {
    match interview.resume_id {
        Some(resume_id) => Ok(ResumeQaItem::numbered(
            &resumes.answers_for_resume(resume_id).await?,
        )),
        None => Ok(Vec::new()),
    }
}
