//! Maps heart-rate samples onto the time each root question was on screen.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::interview::tree::{replies_by_question, QuestionTree};
use crate::models::heartbeat::HeartbeatSample;
use crate::models::interview::{InterviewQuestion, Reply};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionHeartbeat {
    pub question_id: i64,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub avg_bpm: Option<i32>,
}

/// One entry per root question, in creation order.
///
/// The interval starts when the question was created (never before the first
/// sample) and ends at the reply, else at the earliest follow-up, else at the
/// last sample. Samples are matched inclusively on both ends.
pub fn map_question_heartbeats(
    questions: &[InterviewQuestion],
    replies: &[Reply],
    samples: &[HeartbeatSample],
) -> Vec<QuestionHeartbeat> {
    let mut samples: Vec<&HeartbeatSample> = samples.iter().collect();
    samples.sort_by_key(|s| s.measured_at);
    let first = samples.first().map(|s| s.measured_at);
    let last = samples.last().map(|s| s.measured_at);

    let tree = QuestionTree::build(questions);
    let replies = replies_by_question(replies);

    tree.roots()
        .iter()
        .map(|question| {
            let start = match first {
                Some(first) if question.created_at < first => first,
                _ => question.created_at,
            };
            let end = replies
                .get(&question.id)
                .map(|reply| reply.created_at)
                .or_else(|| {
                    tree.follow_ups(question.id)
                        .iter()
                        .map(|child| child.created_at)
                        .min()
                })
                .or(last);

            let avg_bpm = match end {
                Some(end) if end >= start => average_bpm(&samples, start, end),
                _ => None,
            };

            QuestionHeartbeat {
                question_id: question.id,
                start_at: Some(start),
                end_at: end,
                avg_bpm,
            }
        })
        .collect()
}

fn average_bpm(
    samples: &[&HeartbeatSample],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Option<i32> {
    let in_range: Vec<i32> = samples
        .iter()
        .filter(|s| s.measured_at >= start && s.measured_at <= end)
        .map(|s| s.bpm)
        .collect();
    if in_range.is_empty() {
        return None;
    }
    let sum: i64 = in_range.iter().map(|&bpm| i64::from(bpm)).sum();
    Some((sum as f64 / in_range.len() as f64).round() as i32)
}
