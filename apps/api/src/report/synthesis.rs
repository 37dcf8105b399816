//! Pure report-building logic: Q&A assembly, sentence counting, label
//! alignment and cohort averaging.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::interview::tree::{replies_by_question, QuestionTree};
use crate::models::interview::{InterviewQuestion, Reply};
use crate::models::report::{QnaItem, QnaPrompt};

/// Label assigned where the AI service sent none.
pub const NEUTRAL_LABEL: i32 = 0;

// ────────────────────────────────────────────────────────────────────────────
// Q&A assembly
// ────────────────────────────────────────────────────────────────────────────

/// Roots in creation order, each followed by its follow-ups, paired with the
/// recorded reply text (empty when unanswered).
pub fn build_qna_list(questions: &[InterviewQuestion], replies: &[Reply]) -> Vec<QnaItem> {
    let tree = QuestionTree::build(questions);
    let replies = replies_by_question(replies);

    tree.walk()
        .map(|question| {
            let prompt = if question.is_root() {
                QnaPrompt::Question(question.content.clone())
            } else {
                QnaPrompt::RelatedQuestion(question.content.clone())
            };
            QnaItem {
                prompt,
                answer: replies
                    .get(&question.id)
                    .map(|r| r.content.clone())
                    .unwrap_or_default(),
                labels: Vec::new(),
            }
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Sentence counting
// ────────────────────────────────────────────────────────────────────────────

/// Sentence boundary used by the scoring service: whitespace after `.`, `!`,
/// `?` or `,`. The Korean endings `다.` and `요.` end in `.` and are covered.
fn boundary() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    BOUNDARY.get_or_init(|| Regex::new(r"[.!?,]\s+").expect("sentence boundary regex is valid"))
}

/// Number of sentences in an answer, split the same way the scoring service
/// splits before labelling: by line, then after sentence punctuation.
pub fn count_sentences(paragraph: &str) -> usize {
    paragraph
        .trim()
        .split(is_line_break)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(count_line_sentences)
        .sum()
}

/// The scoring service's line breaks. `\r\n` splits twice, leaving an
/// empty piece that is skipped.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\u{000B}'
            | '\u{000C}'
            | '\u{001C}'..='\u{001E}'
            | '\u{0085}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

fn count_line_sentences(line: &str) -> usize {
    let mut count = 0;
    let mut start = 0;
    for boundary in boundary().find_iter(line) {
        // the punctuation stays with the piece before the whitespace
        let end = boundary.start() + 1;
        if !line[start..end].trim().is_empty() {
            count += 1;
        }
        start = boundary.end();
    }
    if !line[start..].trim().is_empty() {
        count += 1;
    }
    count
}

// ────────────────────────────────────────────────────────────────────────────
// Label alignment
// ────────────────────────────────────────────────────────────────────────────

/// Slices a flat per-sentence label stream back onto the Q&A items.
///
/// Each item takes as many consecutive labels as its answer has sentences.
/// A short stream is padded with [`NEUTRAL_LABEL`], a long one is truncated.
/// Items without sentences, or every item when no labels or no sentences
/// exist at all, get a single neutral label.
pub fn align_labels(items: &mut [QnaItem], labels: &[i32]) {
    if labels.is_empty() {
        warn!(items = items.len(), "No sentence labels received, using neutral labels");
        fill_neutral(items);
        return;
    }

    let counts: Vec<usize> = items.iter().map(|i| count_sentences(&i.answer)).collect();
    let total: usize = counts.iter().sum();
    if total == 0 {
        fill_neutral(items);
        return;
    }

    if labels.len() < total {
        warn!(
            expected = total,
            received = labels.len(),
            "Fewer labels than sentences, padding with neutral labels"
        );
    }

    let mut cursor = 0;
    for (item, count) in items.iter_mut().zip(counts) {
        if count == 0 {
            item.labels = vec![NEUTRAL_LABEL];
            continue;
        }
        let from = cursor.min(labels.len());
        let to = (cursor + count).min(labels.len());
        let mut slice = labels[from..to].to_vec();
        slice.resize(count, NEUTRAL_LABEL);
        item.labels = slice;
        cursor += count;
    }

    if labels.len() > total {
        warn!(
            expected = total,
            discarded = labels.len() - total,
            "More labels than sentences, discarding the excess"
        );
    }
}

fn fill_neutral(items: &mut [QnaItem]) {
    for item in items {
        item.labels = vec![NEUTRAL_LABEL];
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Cohort averaging
// ────────────────────────────────────────────────────────────────────────────

/// Per-category integer mean (truncating) over the given score maps.
/// A category is averaged over the reports that carry it.
pub fn cohort_average<'a, I>(score_maps: I) -> BTreeMap<String, i32>
where
    I: IntoIterator<Item = &'a BTreeMap<String, i32>>,
{
    let mut sums: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for scores in score_maps {
        for (category, value) in scores {
            let entry = sums.entry(category.as_str()).or_insert((0, 0));
            entry.0 += i64::from(*value);
            entry.1 += 1;
        }
    }

    sums.into_iter()
        .map(|(category, (sum, n))| (category.to_string(), (sum / n) as i32))
        .collect()
}
