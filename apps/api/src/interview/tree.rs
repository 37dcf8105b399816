use std::collections::HashMap;

use crate::models::interview::{InterviewQuestion, Reply};

/// Read view over an interview's flat question records.
///
/// Root questions and their follow-ups are grouped by parent id; both levels
/// are ordered by creation time, ties broken by id.
pub struct QuestionTree<'a> {
    roots: Vec<&'a InterviewQuestion>,
    children: HashMap<i64, Vec<&'a InterviewQuestion>>,
}

impl<'a> QuestionTree<'a> {
    pub fn build(questions: &'a [InterviewQuestion]) -> Self {
        let mut roots = Vec::new();
        let mut children: HashMap<i64, Vec<&'a InterviewQuestion>> = HashMap::new();

        for question in questions {
            match question.parent_id {
                None => roots.push(question),
                Some(parent) => children.entry(parent).or_default().push(question),
            }
        }

        roots.sort_by_key(|q| (q.created_at, q.id));
        for list in children.values_mut() {
            list.sort_by_key(|q| (q.created_at, q.id));
        }

        Self { roots, children }
    }

    pub fn roots(&self) -> &[&'a InterviewQuestion] {
        &self.roots
    }

    pub fn follow_ups(&self, root_id: i64) -> &[&'a InterviewQuestion] {
        self.children
            .get(&root_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Roots in order, each immediately followed by its follow-ups.
    pub fn walk(&self) -> impl Iterator<Item = &'a InterviewQuestion> + '_ {
        self.roots.iter().flat_map(move |root| {
            std::iter::once(*root).chain(self.follow_ups(root.id).iter().copied())
        })
    }
}

/// Replies keyed by the question they answer.
pub fn replies_by_question(replies: &[Reply]) -> HashMap<i64, &Reply> {
    replies.iter().map(|r| (r.question_id, r)).collect()
}
