//! Fuzzy search over lectures, tasks and materials.
//!
//! A field matches when the query can be aligned against a stretch of it
//! starting near its beginning with few edits. The score of an alignment is
//! `edits / query_len + start / DISTANCE`; lower is better and anything above
//! [`THRESHOLD`] is not a match.

use serde::Serialize;

use crate::models::{EntityId, Lecture, Material, Task};

pub const THRESHOLD: f64 = 0.3;

/// How far into a field a match may start before it costs a full point.
const DISTANCE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "item", rename_all = "lowercase")]
pub enum SearchItem {
    Lecture(Lecture),
    Task(Task),
    Material(Material),
}

impl SearchItem {
    pub fn id(&self) -> EntityId {
        match self {
            SearchItem::Lecture(l) => l.id,
            SearchItem::Task(t) => t.id,
            SearchItem::Material(m) => m.id,
        }
    }

    /// Title where the entity has one, otherwise its subject.
    pub fn label(&self) -> &str {
        match self {
            SearchItem::Lecture(l) => &l.subject,
            SearchItem::Task(t) if !t.title.is_empty() => &t.title,
            SearchItem::Task(t) => &t.subject,
            SearchItem::Material(m) => &m.subject,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Subject,
    Title,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub score: f64,
    pub field: Field,
    pub item: SearchItem,
}

struct IndexEntry {
    item: SearchItem,
    fields: Vec<(Field, Vec<char>)>,
}

impl IndexEntry {
    fn new(item: SearchItem, fields: &[(Field, &str)]) -> Self {
        let fields = fields
            .iter()
            .filter(|(_, text)| !text.is_empty())
            .map(|(field, text)| (*field, text.to_lowercase().chars().collect()))
            .collect();
        Self { item, fields }
    }
}

/// Throwaway index over point-in-time snapshots; build one per query.
pub struct SearchIndex {
    entries: Vec<IndexEntry>,
}

impl SearchIndex {
    pub fn build(lectures: &[Lecture], tasks: &[Task], materials: &[Material]) -> Self {
        let mut entries = Vec::with_capacity(lectures.len() + tasks.len() + materials.len());
        entries.extend(lectures.iter().map(|l| {
            IndexEntry::new(SearchItem::Lecture(l.clone()), &[(Field::Subject, &l.subject)])
        }));
        entries.extend(tasks.iter().map(|t| {
            IndexEntry::new(
                SearchItem::Task(t.clone()),
                &[(Field::Subject, &t.subject), (Field::Title, &t.title)],
            )
        }));
        entries.extend(materials.iter().map(|m| {
            IndexEntry::new(SearchItem::Material(m.clone()), &[(Field::Subject, &m.subject)])
        }));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best matches first; equal scores keep index order. Only the empty
    /// string matches nothing; whitespace is part of the query.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        if query.is_empty() {
            return Vec::new();
        }
        let pattern: Vec<char> = query.to_lowercase().chars().collect();

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let mut best: Option<(f64, Field)> = None;
                for (field, text) in &entry.fields {
                    if let Some(score) = match_score(&pattern, text) {
                        if best.is_none_or(|(current, _)| score < current) {
                            best = Some((score, *field));
                        }
                    }
                }
                best.map(|(score, field)| SearchHit {
                    score,
                    field,
                    item: entry.item.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| a.score.total_cmp(&b.score));
        hits
    }
}

/// Lowest score of `pattern` against `text`, if it is within the threshold.
fn match_score(pattern: &[char], text: &[char]) -> Option<f64> {
    let m = pattern.len();
    if m == 0 {
        return None;
    }
    let max_edits = (THRESHOLD * m as f64).floor() as usize;
    let window = m + max_edits;

    let mut best: Option<f64> = None;
    for start in 0..text.len().max(1) {
        let proximity = start as f64 / DISTANCE;
        if proximity > THRESHOLD {
            break;
        }
        let end = (start + window).min(text.len());
        let edits = prefix_edit_distance(pattern, &text[start.min(end)..end]);
        let score = edits as f64 / m as f64 + proximity;
        if score <= THRESHOLD && best.is_none_or(|b| score < b) {
            best = Some(score);
            if score == 0.0 {
                break;
            }
        }
    }
    best
}

/// Fewest edits turning `pattern` into some prefix of `text`.
fn prefix_edit_distance(pattern: &[char], text: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=text.len()).collect();
    let mut curr = vec![0; text.len() + 1];

    for (i, p) in pattern.iter().enumerate() {
        curr[0] = i + 1;
        for (j, t) in text.iter().enumerate() {
            let substitution = prev[j] + usize::from(p != t);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev.into_iter().min().unwrap_or(pattern.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn lecture(id: i64, subject: &str) -> Lecture {
        Lecture {
            id,
            owner_id: Uuid::nil(),
            subject: subject.to_string(),
            day: "الأحد".to_string(),
            time: "10:00".to_string(),
            location: None,
        }
    }

    fn task(id: i64, title: &str, subject: &str) -> Task {
        Task {
            id,
            owner_id: Uuid::nil(),
            title: title.to_string(),
            subject: subject.to_string(),
            due_date: "2024-01-01".to_string(),
            priority: "منخفضة".to_string(),
            completed: false,
        }
    }

    fn material(id: i64, subject: &str) -> Material {
        Material {
            id,
            owner_id: Uuid::nil(),
            subject: subject.to_string(),
            file_url: format!("https://files.example/{}.pdf", id),
        }
    }

    fn sample_index() -> SearchIndex {
        SearchIndex::build(
            &[lecture(1, "Mathematics"), lecture(2, "فيزياء")],
            &[task(3, "Homework sheet", "Chemistry"), task(4, "", "Biology")],
            &[material(5, "Math notes")],
        )
    }

    #[test]
    fn blank_query_matches_nothing() {
        let index = sample_index();
        assert!(!index.is_empty());
        assert!(index.search("").is_empty());
    }

    #[test]
    fn whitespace_query_is_matched_as_written() {
        let index = SearchIndex::build(&[lecture(1, "  "), lecture(2, "Algebra")], &[], &[]);
        let hits = index.search("  ");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item.id(), 1);
        assert_eq!(hits[0].score, 0.0);
    }

    #[test]
    fn exact_subject_and_title_are_found() {
        let index = sample_index();
        let hits = index.search("فيزياء");
        assert_eq!(hits[0].item.id(), 2);
        assert_eq!(hits[0].score, 0.0);

        let hits = index.search("Homework sheet");
        assert_eq!(hits[0].item.id(), 3);
        assert_eq!(hits[0].field, Field::Title);
    }

    #[test]
    fn tolerates_a_typo_proportionally() {
        let index = sample_index();
        let hits = index.search("Chemistyr");
        assert!(hits.iter().any(|h| h.item.id() == 3));

        assert!(index.search("Xyzzyq").is_empty());
    }

    #[test]
    fn prefix_matches_rank_by_quality() {
        let index = sample_index();
        let hits = index.search("math");
        let ids: Vec<i64> = hits.iter().map(|h| h.item.id()).collect();
        assert_eq!(ids, vec![1, 5]);
    }

    #[test]
    fn matches_far_into_a_field_are_penalized() {
        let long = format!("{}math", "x".repeat(40));
        let index = SearchIndex::build(&[lecture(1, &long)], &[], &[]);
        assert!(index.search("math").is_empty());
    }

    #[test]
    fn empty_fields_never_match() {
        let index = SearchIndex::build(&[], &[task(4, "", "Biology")], &[]);
        let hits = index.search("Biology");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].field, Field::Subject);
    }

    #[test]
    fn rebuilding_gives_identical_results() {
        let a = sample_index().search("mat");
        let b = sample_index().search("mat");
        assert_eq!(a, b);
    }

    #[test]
    fn prefix_edit_distance_counts_edits() {
        let p: Vec<char> = "kitten".chars().collect();
        let t: Vec<char> = "sitting".chars().collect();
        assert_eq!(prefix_edit_distance(&p, &t), 2);
        assert_eq!(prefix_edit_distance(&p, &[]), 6);
    }
}
