//! Assessments, grades and final grades.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ids::{AssessmentId, ClassId, FinalGradeId, GradeId, StudentId, SubjectId};
use crate::value_types::text_enum;

/// Upper bound for scores that are not tied to an assessment.
pub const UNLINKED_MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
pub enum AssessmentType {
    #[default]
    Exam,
    Quiz,
    Assignment,
    Project,
    Other,
}

text_enum!(AssessmentType, "assessment type", {
    Exam => "Exam",
    Quiz => "Quiz",
    Assignment => "Assignment",
    Project => "Project",
    Other => "Other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

text_enum!(LetterGrade, "letter grade", {
    A => "A",
    B => "B",
    C => "C",
    D => "D",
    F => "F",
});

impl LetterGrade {
    /// Maps a percentage score to a letter. Thresholds are inclusive lower bounds.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            LetterGrade::A
        } else if score >= 80.0 {
            LetterGrade::B
        } else if score >= 70.0 {
            LetterGrade::C
        } else if score >= 60.0 {
            LetterGrade::D
        } else {
            LetterGrade::F
        }
    }

    pub fn is_passing(self) -> bool {
        self != LetterGrade::F
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Assessment {
    pub id: AssessmentId,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub assessment_type: AssessmentType,
    pub subject_id: SubjectId,
    pub class_id: ClassId,
    /// Relative weight in percent
    pub weight: f64,
    pub max_score: f64,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Grade {
    pub id: GradeId,
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub assessment_id: Option<AssessmentId>,
    pub score: f64,
    #[sqlx(try_from = "String")]
    pub letter_grade: LetterGrade,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct FinalGrade {
    pub id: FinalGradeId,
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub semester: String,
    pub year: i32,
    pub final_score: f64,
    #[sqlx(try_from = "String")]
    pub letter_grade: LetterGrade,
    pub rank: Option<i32>,
}

/// Identifies one ranking cohort.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct CohortKey {
    pub subject_id: SubjectId,
    pub semester: String,
    pub year: i32,
}

impl CohortKey {
    pub fn new(subject_id: SubjectId, semester: impl Into<String>, year: i32) -> Self {
        Self {
            subject_id,
            semester: semester.into(),
            year,
        }
    }
}

impl std::fmt::Display for CohortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.subject_id, self.semester, self.year)
    }
}

/// A computed final grade ready to be upserted under its cohort key.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalGradeUpsert {
    pub student_id: StudentId,
    pub final_score: f64,
    pub letter_grade: LetterGrade,
}

/// A grade write keyed on (student, assessment).
#[derive(Debug, Clone, PartialEq)]
pub struct GradeUpsert {
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub assessment_id: AssessmentId,
    pub score: f64,
    pub letter_grade: LetterGrade,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GradeStatistics {
    pub average_score: Option<f64>,
    pub highest_score: Option<f64>,
    pub lowest_score: Option<f64>,
    pub total_students: usize,
    /// Percentage of final grades from A through D
    pub pass_rate: f64,
}

// DTOs

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAssessmentDto {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters"
    ))]
    pub name: String,
    #[serde(default)]
    pub assessment_type: AssessmentType,
    pub subject_id: SubjectId,
    pub class_id: ClassId,
    #[validate(range(min = 0.0, max = 100.0, message = "Weight must be between 0 and 100"))]
    pub weight: f64,
    #[serde(default = "default_max_score")]
    #[validate(range(exclusive_min = 0.0, message = "Max score must be greater than 0"))]
    pub max_score: f64,
    pub date: Option<NaiveDate>,
}

fn default_max_score() -> f64 {
    100.0
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AssessmentListParams {
    pub subject_id: Option<SubjectId>,
    pub class_id: Option<ClassId>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateGradeDto {
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub assessment_id: Option<AssessmentId>,
    #[validate(range(min = 0.0, message = "Score must not be negative"))]
    pub score: f64,
    #[validate(length(max = 500, message = "Remark must not exceed 500 characters"))]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GridEntry {
    pub student_id: StudentId,
    pub assessment_id: AssessmentId,
    pub score: f64,
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GridUpdateDto {
    #[validate(length(min = 1, message = "At least one update is required"))]
    pub updates: Vec<GridEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SkippedEntry {
    pub student_id: StudentId,
    pub assessment_id: AssessmentId,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GridUpdateResponse {
    pub updated: Vec<Grade>,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CalculateFinalGradesDto {
    pub subject_id: SubjectId,
    #[validate(length(min = 1, max = 20, message = "Semester must be between 1 and 20 characters"))]
    pub semester: String,
    #[validate(range(min = 1900, max = 3000, message = "Year is out of range"))]
    pub year: i32,
}

impl CalculateFinalGradesDto {
    pub fn cohort(&self) -> CohortKey {
        CohortKey::new(self.subject_id, self.semester.clone(), self.year)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CalculateFinalGradesResponse {
    pub message: String,
    pub grades: Vec<FinalGrade>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FinalGradeFilter {
    pub subject_id: Option<SubjectId>,
    pub semester: Option<String>,
    pub year: Option<i32>,
}

impl FinalGradeFilter {
    pub fn matches(&self, grade: &FinalGrade) -> bool {
        self.subject_id.is_none_or(|s| s == grade.subject_id)
            && self.semester.as_deref().is_none_or(|s| s == grade.semester)
            && self.year.is_none_or(|y| y == grade.year)
    }
}
