use crate::store::DocumentStore;
use crate::{DocumentRecord, SearchField, SearchHit, StoreError, TermMatch};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

pub const EXACT_PHRASE_SCORE: u32 = 1000;
pub const ALL_TERMS_SCORE: u32 = 500;
pub const SOME_TERMS_SCORE: u32 = 100;
pub const ONE_TERM_SCORE: u32 = 50;
pub const FUZZY_SCORE: u32 = 1;

// Minimum normalized Levenshtein similarity for a fuzzy hit.
pub const FUZZY_THRESHOLD: f64 = 0.7;

pub struct SearchEngine {
    store: Arc<DocumentStore>,
    limit: Option<usize>,
}

impl SearchEngine {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store, limit: None }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>, StoreError> {
        let mut hits = rank(self.store.list()?, query);
        if let Some(limit) = self.limit {
            hits.truncate(limit);
        }
        Ok(hits)
    }
}

pub fn tokenize(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in query.split_whitespace() {
        let term = token.to_lowercase();
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

pub fn rank(records: Vec<DocumentRecord>, query: &str) -> Vec<SearchHit> {
    let terms = tokenize(query);

    if terms.is_empty() {
        let mut hits = records
            .into_iter()
            .map(|record| SearchHit {
                record,
                relevance_score: 0,
                matched_terms_by_field: Vec::new(),
            })
            .collect::<Vec<_>>();
        hits.sort_by(|left, right| left.record.content_hash.cmp(&right.record.content_hash));
        return hits;
    }

    let phrase = query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");

    let mut hits = records
        .into_iter()
        .filter_map(|record| {
            let (relevance_score, matched_terms_by_field) = score_record(&record, &phrase, &terms)?;
            Some(SearchHit {
                record,
                relevance_score,
                matched_terms_by_field,
            })
        })
        .collect::<Vec<_>>();

    hits.sort_by(compare_hits);
    hits
}

fn compare_hits(left: &SearchHit, right: &SearchHit) -> Ordering {
    right
        .relevance_score
        .cmp(&left.relevance_score)
        .then_with(|| left.record.file_path.cmp(&right.record.file_path))
        .then_with(|| left.record.content_hash.cmp(&right.record.content_hash))
}

fn searchable_fields(record: &DocumentRecord) -> Vec<(SearchField, Vec<String>)> {
    SearchField::ALL
        .iter()
        .filter_map(|field| {
            let values = match field {
                SearchField::Filename => vec![record.file_name().to_lowercase()],
                SearchField::Subject => lowered(&record.subject),
                SearchField::Sender => lowered(&record.sender),
                SearchField::Recipient => lowered(&record.recipient),
                SearchField::DocumentType => lowered(&record.document_type),
                SearchField::Tags => record.tags.iter().map(|tag| tag.to_lowercase()).collect(),
                SearchField::Summary => lowered(&record.summary),
            };
            let values = values
                .into_iter()
                .filter(|value| !value.is_empty())
                .collect::<Vec<_>>();
            if values.is_empty() {
                None
            } else {
                Some((*field, values))
            }
        })
        .collect()
}

fn lowered(value: &Option<String>) -> Vec<String> {
    value.iter().map(|text| text.to_lowercase()).collect()
}

pub fn score_record(
    record: &DocumentRecord,
    phrase: &str,
    terms: &[String],
) -> Option<(u32, Vec<TermMatch>)> {
    let fields = searchable_fields(record);

    let matches = terms
        .iter()
        .filter_map(|term| {
            let hit_fields = fields
                .iter()
                .filter(|(_, values)| values.iter().any(|value| value.contains(term.as_str())))
                .map(|(field, _)| *field)
                .collect::<Vec<_>>();
            if hit_fields.is_empty() {
                None
            } else {
                Some(TermMatch {
                    term: term.clone(),
                    fields: hit_fields,
                })
            }
        })
        .collect::<Vec<_>>();

    let matched_fields = matches
        .iter()
        .flat_map(|found| found.fields.iter().copied())
        .collect::<BTreeSet<_>>();
    let weight_sum = matched_fields.iter().map(|field| field.weight()).sum::<u32>();
    let matched = matches.len() as u32;
    let total = terms.len() as u32;

    let phrase_found = fields
        .iter()
        .any(|(_, values)| values.iter().any(|value| value.contains(phrase)));

    let score = if phrase_found {
        EXACT_PHRASE_SCORE
    } else if matched == total && total > 1 {
        ALL_TERMS_SCORE + (30 * weight_sum).min(EXACT_PHRASE_SCORE - ALL_TERMS_SCORE - 1)
    } else if matched > 1 {
        let coverage = 300 * matched / total;
        let spread = (6 * weight_sum).min(99);
        (SOME_TERMS_SCORE + coverage + spread).min(ALL_TERMS_SCORE - 1)
    } else if matched == 1 {
        let best = matched_fields
            .iter()
            .map(|field| field.weight())
            .max()
            .unwrap_or(0);
        (ONE_TERM_SCORE + 10 * best).min(SOME_TERMS_SCORE - 1)
    } else {
        return fuzzy_score(&fields, terms).map(|score| (score, Vec::new()));
    };

    Some((score, matches))
}

fn fuzzy_score(fields: &[(SearchField, Vec<String>)], terms: &[String]) -> Option<u32> {
    let mut best: Option<u32> = None;

    for (field, values) in fields {
        for word in values
            .iter()
            .flat_map(|value| value.split(|c: char| !c.is_alphanumeric()))
            .filter(|word| !word.is_empty())
        {
            for term in terms {
                let similarity = similarity(term, word);
                if similarity < FUZZY_THRESHOLD {
                    continue;
                }
                let score = (FUZZY_SCORE + (36.0 * similarity).floor() as u32 + field.weight())
                    .min(ONE_TERM_SCORE - 1);
                best = Some(best.map_or(score, |current| current.max(score)));
            }
        }
    }

    best
}

pub fn similarity(left: &str, right: &str) -> f64 {
    let left_len = left.chars().count();
    let right_len = right.chars().count();
    let longest = left_len.max(right_len);
    if longest == 0 {
        return 1.0;
    }

    // The length gap alone bounds the distance from below.
    let gap = left_len.abs_diff(right_len) as f64 / longest as f64;
    if 1.0 - gap < FUZZY_THRESHOLD {
        return 1.0 - gap;
    }

    1.0 - levenshtein_distance(left, right) as f64 / longest as f64
}

pub fn levenshtein_distance(left: &str, right: &str) -> usize {
    let left = left.chars().collect::<Vec<_>>();
    let right = right.chars().collect::<Vec<_>>();

    if left.is_empty() {
        return right.len();
    }
    if right.is_empty() {
        return left.len();
    }

    let mut previous = (0..=right.len()).collect::<Vec<_>>();
    let mut current = vec![0usize; right.len() + 1];

    for (i, left_char) in left.iter().enumerate() {
        current[0] = i + 1;
        for (j, right_char) in right.iter().enumerate() {
            let cost = usize::from(left_char != right_char);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[right.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(hash: &str, path: &str) -> DocumentRecord {
        DocumentRecord::new(hash, path)
    }

    fn score(record: &DocumentRecord, query: &str) -> u32 {
        rank(vec![record.clone()], query)
            .first()
            .map(|hit| hit.relevance_score)
            .unwrap_or(0)
    }

    #[test]
    fn exact_phrase_scores_1000_and_ranks_first() {
        let mut phrase = doc("h1", "/docs/zz.pdf");
        phrase.summary = Some("Invoice for consulting services in March".to_string());
        let mut scattered = doc("h2", "/docs/aa.pdf");
        scattered.subject = Some("Consulting".to_string());
        scattered.tags = vec!["services".to_string()];

        let hits = rank(vec![scattered, phrase], "Consulting Services");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.content_hash, "h1");
        assert_eq!(hits[0].relevance_score, 1000);
        assert!(hits[1].relevance_score < 1000);
    }

    #[test]
    fn all_terms_in_separate_fields_land_in_500_band() {
        let mut record = doc("h1", "/docs/scan.pdf");
        record.document_type = Some("Invoice".to_string());
        record.date = Some("2024-01-05".to_string());
        record.tags = vec!["2024".to_string(), "utilities".to_string()];

        let value = score(&record, "invoice 2024");
        assert!((500..=999).contains(&value), "score {value}");
    }

    #[test]
    fn single_term_hit_lands_in_50_band() {
        let mut record = doc("h1", "/docs/scan.pdf");
        record.summary = Some("Electricity invoice".to_string());

        let value = score(&record, "invoice 2024");
        assert!((50..=99).contains(&value), "score {value}");
    }

    #[test]
    fn some_terms_land_in_100_band() {
        let mut record = doc("h1", "/docs/scan.pdf");
        record.subject = Some("Water invoice 2024".to_string());

        let value = score(&record, "water 2024 refund");
        assert!((100..=499).contains(&value), "score {value}");
    }

    #[test]
    fn fuzzy_hits_land_below_50() {
        let mut record = doc("h1", "/docs/scan.pdf");
        record.sender = Some("Jonathan Smith".to_string());

        let value = score(&record, "jonathon");
        assert!((1..=49).contains(&value), "score {value}");
        assert_eq!(score(&record, "xylophone"), 0);
    }

    #[test]
    fn heavier_fields_never_score_lower() {
        let mut in_subject = doc("h1", "/a.pdf");
        in_subject.subject = Some("Lease contract".to_string());
        let mut in_summary = doc("h2", "/b.pdf");
        in_summary.summary = Some("Lease contract".to_string());

        for query in ["lease tax", "lease contract", "leese"] {
            assert!(score(&in_subject, query) >= score(&in_summary, query), "{query}");
        }
    }

    #[test]
    fn annotations_follow_fixed_field_order() {
        let mut record = doc("h1", "/docs/tax-return.pdf");
        record.summary = Some("Tax return".to_string());
        record.tags = vec!["tax".to_string()];
        record.subject = Some("Income tax".to_string());

        let hits = rank(vec![record], "tax missing");
        assert_eq!(hits.len(), 1);
        assert_eq!(
            hits[0].matched_terms_by_field,
            vec![TermMatch {
                term: "tax".to_string(),
                fields: vec![
                    SearchField::Filename,
                    SearchField::Subject,
                    SearchField::Tags,
                    SearchField::Summary
                ],
            }]
        );
    }

    #[test]
    fn ties_break_on_file_path() {
        let mut second = doc("h1", "/b/report.pdf");
        second.subject = Some("report".to_string());
        let mut first = doc("h2", "/a/report.pdf");
        first.subject = Some("report".to_string());

        let hits = rank(vec![second, first], "report");
        let paths = hits
            .iter()
            .map(|hit| hit.record.file_path.as_str())
            .collect::<Vec<_>>();
        assert_eq!(paths, vec!["/a/report.pdf", "/b/report.pdf"]);
    }

    #[test]
    fn empty_query_returns_everything_by_hash() {
        let hits = rank(vec![doc("b", "/1.pdf"), doc("a", "/2.pdf")], "   ");
        let hashes = hits
            .iter()
            .map(|hit| hit.record.content_hash.as_str())
            .collect::<Vec<_>>();
        assert_eq!(hashes, vec!["a", "b"]);
        assert!(hits.iter().all(|hit| hit.relevance_score == 0));
        assert!(hits.iter().all(|hit| hit.matched_terms_by_field.is_empty()));
    }

    #[test]
    fn non_matching_records_are_excluded() {
        let hits = rank(vec![doc("h1", "/letter.pdf")], "mortgage");
        assert!(hits.is_empty());
    }

    #[test]
    fn duplicate_terms_collapse() {
        assert_eq!(tokenize("Tax  tax TAX\treturn"), vec!["tax", "return"]);
    }

    #[test]
    fn levenshtein_distances() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", "abc"), 0);
        assert_eq!(levenshtein_distance("abc", "abd"), 1);
        assert_eq!(levenshtein_distance("abc", "abcd"), 1);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }
}
