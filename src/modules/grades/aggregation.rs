//! Weighted final grades, cohort ranking and statistics.
//!
//! A final score is the weight-normalised average of the assessments a
//! student actually has a grade for, on a 0..=100 scale:
//!
//! ```text
//! final = Σ(score / max_score * weight) / Σ(weight) * 100
//! ```
//!
//! Ungraded assessments are skipped rather than counted as zero. With no
//! weight seen at all the result is not computable.

use std::collections::HashMap;

use campusdesk_models::grades::{Assessment, FinalGrade, Grade, GradeStatistics, LetterGrade};
use campusdesk_models::ids::{AssessmentId, FinalGradeId};

pub fn compute_final(assessments: &[Assessment], grades: &[Grade]) -> Option<(f64, LetterGrade)> {
    let by_assessment: HashMap<AssessmentId, &Grade> = grades
        .iter()
        .filter_map(|g| g.assessment_id.map(|id| (id, g)))
        .collect();

    let mut total_weighted = 0.0;
    let mut total_weight = 0.0;

    for assessment in assessments {
        let Some(grade) = by_assessment.get(&assessment.id) else {
            continue;
        };
        total_weighted += grade.score / assessment.max_score * assessment.weight;
        total_weight += assessment.weight;
    }

    if total_weight == 0.0 {
        return None;
    }

    let final_score = total_weighted / total_weight * 100.0;
    Some((final_score, LetterGrade::from_score(final_score)))
}

/// Dense ranks 1..=N by final score descending.
///
/// Equal scores are ordered by student id ascending, so every run over the
/// same data yields the same ranks.
pub fn rank_cohort(grades: &[FinalGrade]) -> Vec<(FinalGradeId, i32)> {
    let mut ordered: Vec<&FinalGrade> = grades.iter().collect();
    ordered.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });

    ordered
        .into_iter()
        .zip(1..)
        .map(|(grade, rank)| (grade.id, rank))
        .collect()
}

/// Applies [`rank_cohort`] in place.
pub fn apply_ranks(grades: &mut [FinalGrade]) {
    let ranks: HashMap<FinalGradeId, i32> = rank_cohort(grades).into_iter().collect();
    for grade in grades.iter_mut() {
        grade.rank = ranks.get(&grade.id).copied();
    }
}

pub fn cohort_statistics(grades: &[FinalGrade]) -> GradeStatistics {
    if grades.is_empty() {
        return GradeStatistics {
            average_score: None,
            highest_score: None,
            lowest_score: None,
            total_students: 0,
            pass_rate: 0.0,
        };
    }

    let count = grades.len();
    let sum: f64 = grades.iter().map(|g| g.final_score).sum();
    let highest = grades
        .iter()
        .map(|g| g.final_score)
        .fold(f64::NEG_INFINITY, f64::max);
    let lowest = grades
        .iter()
        .map(|g| g.final_score)
        .fold(f64::INFINITY, f64::min);
    let passed = grades.iter().filter(|g| g.letter_grade.is_passing()).count();

    GradeStatistics {
        average_score: Some(round2(sum / count as f64)),
        highest_score: Some(highest),
        lowest_score: Some(lowest),
        total_students: count,
        pass_rate: round2(passed as f64 / count as f64 * 100.0),
    }
}

/// Letter for a raw assessment score, judged as a percentage of its maximum.
pub fn letter_for_score(score: f64, max_score: f64) -> LetterGrade {
    LetterGrade::from_score(score / max_score * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
