use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Fixed pass/fail cutoff, applied to the exact percentage.
pub(crate) const PASS_THRESHOLD: f64 = 70.0;

/// A submitted or correct answer: one option for single-choice questions,
/// several for multi-select ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum AnswerValue {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AnswerResult {
    pub(crate) is_correct: bool,
    pub(crate) user_answer: AnswerValue,
    pub(crate) correct_answer: AnswerValue,
    pub(crate) explanation: String,
}

impl AnswerValue {
    fn letters(&self) -> BTreeSet<String> {
        match self {
            AnswerValue::Single(label) => std::iter::once(option_letter(label)).collect(),
            AnswerValue::Multiple(labels) => {
                labels.iter().map(|label| option_letter(label)).collect()
            }
        }
    }
}

/// Reduce an option label to its letter: `"B) Amazon S3"`, `"b."` and `"B"`
/// all normalize to `"B"`. Labels without a recognizable letter prefix are
/// compared as whole uppercased strings.
fn option_letter(label: &str) -> String {
    let trimmed = label.trim();
    let mut chars = trimmed.chars();

    if let Some(first) = chars.next() {
        if first.is_ascii_alphabetic() {
            match chars.next() {
                None => return first.to_ascii_uppercase().to_string(),
                Some(')') | Some('.') | Some(':') => {
                    return first.to_ascii_uppercase().to_string()
                }
                _ => {}
            }
        }
    }

    trimmed.to_uppercase()
}

/// Compare the submitted answer to the correct one as sets of option
/// letters: order-insensitive and case-insensitive, so a multi-select
/// answer picked in a different order than generated still scores correct.
pub(crate) fn check_answer(
    user_answer: AnswerValue,
    correct_answer: AnswerValue,
    explanation: &str,
) -> AnswerResult {
    let is_correct = user_answer.letters() == correct_answer.letters();

    AnswerResult {
        is_correct,
        user_answer,
        correct_answer,
        explanation: explanation.to_string(),
    }
}

pub(crate) fn score_percentage(score: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(score) / f64::from(total) * 100.0
}

/// Display value: round half up to the nearest whole percent (2/3 -> 67).
/// Pass/fail uses the exact percentage, not the rounded one.
pub(crate) fn rounded_percentage(score: u32, total: u32) -> u32 {
    (score_percentage(score, total) + 0.5).floor() as u32
}

pub(crate) fn is_passing(percentage: f64) -> bool {
    percentage >= PASS_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(value: &str) -> AnswerValue {
        AnswerValue::Single(value.to_string())
    }

    fn multiple(values: &[&str]) -> AnswerValue {
        AnswerValue::Multiple(values.iter().map(|value| value.to_string()).collect())
    }

    #[test]
    fn full_label_matches_bare_letter() {
        let result = check_answer(single("B) Amazon S3"), single("B"), "S3 is object storage");
        assert!(result.is_correct);
        assert_eq!(result.explanation, "S3 is object storage");
    }

    #[test]
    fn multi_select_is_order_insensitive() {
        let result =
            check_answer(multiple(&["A) Lambda", "C) Fargate"]), multiple(&["C", "A"]), "");
        assert!(result.is_correct);
    }

    #[test]
    fn wrong_letter_is_incorrect() {
        assert!(!check_answer(single("A"), single("B"), "").is_correct);
    }

    #[test]
    fn comparison_is_case_insensitive() {
        assert!(check_answer(single("b) Amazon S3"), single("B"), "").is_correct);
    }

    #[test]
    fn partial_multi_select_is_incorrect() {
        let result = check_answer(multiple(&["A) Lambda"]), multiple(&["A", "C"]), "");
        assert!(!result.is_correct);
    }

    #[test]
    fn duplicate_picks_collapse_to_one_letter() {
        let result = check_answer(multiple(&["A) Lambda", "a"]), multiple(&["A"]), "");
        assert!(result.is_correct);
    }

    #[test]
    fn labels_without_letter_prefix_compare_as_text() {
        assert!(check_answer(single("true"), single("TRUE"), "").is_correct);
        assert!(!check_answer(single("true"), single("false"), "").is_correct);
    }

    #[test]
    fn option_letter_variants() {
        assert_eq!(option_letter(" B) Amazon S3"), "B");
        assert_eq!(option_letter("c. Fargate"), "C");
        assert_eq!(option_letter("D: RDS"), "D");
        assert_eq!(option_letter("a"), "A");
    }

    #[test]
    fn two_of_three_rounds_up_to_67_and_fails() {
        assert_eq!(rounded_percentage(2, 3), 67);
        assert!(!is_passing(score_percentage(2, 3)));
    }

    #[test]
    fn seven_of_ten_passes_exactly() {
        assert_eq!(rounded_percentage(7, 10), 70);
        assert!(is_passing(score_percentage(7, 10)));
    }

    #[test]
    fn rounding_below_the_cutoff_does_not_pass() {
        // 69.5 rounds up to 70 for display, but the exact value decides.
        assert_eq!(rounded_percentage(139, 200), 70);
        assert!(!is_passing(score_percentage(139, 200)));
    }

    #[test]
    fn zero_totals_do_not_divide_by_zero() {
        assert_eq!(score_percentage(0, 0), 0.0);
        assert_eq!(rounded_percentage(0, 0), 0);
    }
}
