use std::collections::HashSet;

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

/// Wrong meanings offered alongside the correct one in a quiz question.
pub const CHOICE_DISTRACTORS: usize = 3;

/// A word eligible for the due-review queue. `next_review_date` is `None`
/// when the user has no progress row for the word yet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueWord {
    pub word_id: String,
    pub spelling: String,
    pub part_of_speech: Option<String>,
    pub meaning: String,
    pub interval_days: Option<i64>,
    pub ease_factor: Option<f64>,
    pub next_review_date: Option<NaiveDate>,
}

/// A word eligible for the free-drill queue, with the global counters the
/// prioritization policy sorts on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillWord {
    pub word_id: String,
    pub spelling: String,
    pub part_of_speech: Option<String>,
    pub meaning: String,
    pub correct_times: i64,
    pub wrong_times: i64,
}

/// Orders the due queue: words never reviewed come first, then due words by
/// ascending next review date. Candidates not yet due are dropped. At most
/// `limit` entries, no word twice.
pub fn due_queue(mut candidates: Vec<DueWord>, today: NaiveDate, limit: usize) -> Vec<DueWord> {
    candidates.retain(|c| c.next_review_date.map_or(true, |due| due <= today));
    candidates.sort_by(|a, b| match (a.next_review_date, b.next_review_date) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    });

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(limit.min(candidates.len()));
    for candidate in candidates {
        if out.len() >= limit {
            break;
        }
        if seen.insert(candidate.word_id.clone()) {
            out.push(candidate);
        }
    }
    out
}

/// Free-drill policy: unmastered words ordered by global wrong count
/// descending, backfilled with randomly chosen words from `backfill` until
/// `limit` or exhaustion. Deterministic for a fixed `rng` seed.
pub fn drill_queue<R: Rng + ?Sized>(
    mut unmastered: Vec<DrillWord>,
    mut backfill: Vec<DrillWord>,
    limit: usize,
    rng: &mut R,
) -> Vec<DrillWord> {
    // Stable sort keeps the caller's tie order reproducible.
    unmastered.sort_by(|a, b| b.wrong_times.cmp(&a.wrong_times));

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(limit.min(unmastered.len()));
    for word in unmastered {
        if out.len() >= limit {
            break;
        }
        if seen.insert(word.word_id.clone()) {
            out.push(word);
        }
    }

    if out.len() < limit {
        backfill.retain(|w| !seen.contains(&w.word_id));
        backfill.shuffle(rng);
        for word in backfill {
            if out.len() >= limit {
                break;
            }
            if seen.insert(word.word_id.clone()) {
                out.push(word);
            }
        }
    }

    out
}

/// A word the quiz builder may pick as the answer or mine for distractors.
#[derive(Debug, Clone)]
pub struct ChoiceWord {
    pub word_id: String,
    pub spelling: String,
    pub meaning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceQuestion {
    pub word_id: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChoiceError {
    #[error("词库中没有单词")]
    EmptyWordBank,
    #[error("词库中单词数量不足")]
    InsufficientWords,
}

/// Builds a four-option quiz question: one randomly picked word, its meaning
/// shuffled in among meanings drawn from other words. Deterministic for a
/// fixed `rng` seed.
pub fn choice_question<R: Rng + ?Sized>(
    mut words: Vec<ChoiceWord>,
    rng: &mut R,
) -> Result<ChoiceQuestion, ChoiceError> {
    if words.is_empty() {
        return Err(ChoiceError::EmptyWordBank);
    }
    if words.len() < CHOICE_DISTRACTORS + 1 {
        return Err(ChoiceError::InsufficientWords);
    }

    let answer = words.swap_remove(rng.random_range(0..words.len()));

    words.shuffle(rng);
    let mut options: Vec<String> = words
        .into_iter()
        .take(CHOICE_DISTRACTORS)
        .map(|word| word.meaning)
        .collect();
    options.push(answer.meaning.clone());
    options.shuffle(rng);

    Ok(ChoiceQuestion {
        word_id: answer.word_id,
        question: answer.spelling,
        options,
        correct_answer: answer.meaning,
    })
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn due(word_id: &str, next_review_date: Option<NaiveDate>) -> DueWord {
        DueWord {
            word_id: word_id.to_string(),
            spelling: word_id.to_string(),
            part_of_speech: None,
            meaning: String::new(),
            interval_days: next_review_date.map(|_| 1),
            ease_factor: next_review_date.map(|_| 2.5),
            next_review_date,
        }
    }

    fn drill(word_id: &str, wrong_times: i64) -> DrillWord {
        DrillWord {
            word_id: word_id.to_string(),
            spelling: word_id.to_string(),
            part_of_speech: None,
            meaning: String::new(),
            correct_times: 0,
            wrong_times,
        }
    }

    #[test]
    fn unreviewed_words_come_first() {
        let today = date(2024, 5, 10);
        let queue = due_queue(
            vec![
                due("a", Some(date(2024, 5, 8))),
                due("b", None),
                due("c", Some(date(2024, 5, 9))),
            ],
            today,
            10,
        );
        let ids: Vec<&str> = queue.iter().map(|w| w.word_id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }

    #[test]
    fn undue_words_are_dropped() {
        let today = date(2024, 5, 10);
        let queue = due_queue(
            vec![
                due("a", Some(date(2024, 5, 10))),
                due("b", Some(date(2024, 5, 11))),
            ],
            today,
            10,
        );
        let ids: Vec<&str> = queue.iter().map(|w| w.word_id.as_str()).collect();
        assert_eq!(ids, ["a"]);
    }

    #[test]
    fn due_queue_respects_limit_and_dedups() {
        let today = date(2024, 5, 10);
        let queue = due_queue(
            vec![
                due("a", None),
                due("a", None),
                due("b", Some(date(2024, 5, 1))),
                due("c", Some(date(2024, 5, 2))),
            ],
            today,
            2,
        );
        let ids: Vec<&str> = queue.iter().map(|w| w.word_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn drill_orders_by_wrong_times_desc() {
        let mut rng = StdRng::seed_from_u64(7);
        let queue = drill_queue(
            vec![drill("a", 1), drill("b", 5), drill("c", 3)],
            Vec::new(),
            10,
            &mut rng,
        );
        let ids: Vec<&str> = queue.iter().map(|w| w.word_id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn drill_backfills_up_to_limit_without_duplicates() {
        let mut rng = StdRng::seed_from_u64(7);
        let queue = drill_queue(
            vec![drill("a", 2)],
            vec![drill("a", 0), drill("b", 0), drill("c", 0), drill("d", 0)],
            3,
            &mut rng,
        );
        assert_eq!(queue.len(), 3);
        assert_eq!(queue[0].word_id, "a");
        let ids: HashSet<&str> = queue.iter().map(|w| w.word_id.as_str()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn drill_is_deterministic_for_a_fixed_seed() {
        let candidates = vec![drill("a", 1)];
        let pool: Vec<DrillWord> = (0..20).map(|i| drill(&format!("w{i}"), 0)).collect();

        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let first = drill_queue(candidates.clone(), pool.clone(), 5, &mut rng_a);
        let second = drill_queue(candidates, pool, 5, &mut rng_b);

        let ids_a: Vec<&str> = first.iter().map(|w| w.word_id.as_str()).collect();
        let ids_b: Vec<&str> = second.iter().map(|w| w.word_id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn drill_stops_when_pool_exhausted() {
        let mut rng = StdRng::seed_from_u64(7);
        let queue = drill_queue(vec![drill("a", 1)], vec![drill("b", 0)], 10, &mut rng);
        assert_eq!(queue.len(), 2);
    }

    fn choice(word_id: &str) -> ChoiceWord {
        ChoiceWord {
            word_id: word_id.to_string(),
            spelling: format!("spelling-{word_id}"),
            meaning: format!("meaning-{word_id}"),
        }
    }

    #[test]
    fn choice_question_needs_a_word_bank() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(
            choice_question(Vec::new(), &mut rng),
            Err(ChoiceError::EmptyWordBank)
        );
    }

    #[test]
    fn choice_question_needs_enough_distractors() {
        let mut rng = StdRng::seed_from_u64(7);
        let words = vec![choice("a"), choice("b"), choice("c")];
        assert_eq!(
            choice_question(words, &mut rng),
            Err(ChoiceError::InsufficientWords)
        );
    }

    #[test]
    fn choice_question_hides_the_answer_among_distractors() {
        let mut rng = StdRng::seed_from_u64(7);
        let words: Vec<ChoiceWord> = (0..6).map(|i| choice(&format!("w{i}"))).collect();
        let all_meanings: HashSet<String> = words.iter().map(|w| w.meaning.clone()).collect();

        let question = choice_question(words, &mut rng).unwrap();

        assert_eq!(question.options.len(), CHOICE_DISTRACTORS + 1);
        assert!(question.options.contains(&question.correct_answer));
        assert_eq!(question.correct_answer, format!("meaning-{}", question.word_id));
        assert_eq!(question.question, format!("spelling-{}", question.word_id));
        for option in &question.options {
            assert!(all_meanings.contains(option));
        }
        // The answer's meaning appears once, so distractors all came from
        // other words.
        let answer_count = question
            .options
            .iter()
            .filter(|o| **o == question.correct_answer)
            .count();
        assert_eq!(answer_count, 1);
    }

    #[test]
    fn choice_question_is_deterministic_for_a_fixed_seed() {
        let words: Vec<ChoiceWord> = (0..10).map(|i| choice(&format!("w{i}"))).collect();

        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let first = choice_question(words.clone(), &mut rng_a).unwrap();
        let second = choice_question(words, &mut rng_b).unwrap();

        assert_eq!(first.word_id, second.word_id);
        assert_eq!(first.options, second.options);
    }
}
