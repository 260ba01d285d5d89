use std::collections::HashMap;

use anyhow::anyhow;
use campusdesk_core::AppError;
use campusdesk_models::audit::ActionKind;
use campusdesk_models::grades::{
    Assessment, AssessmentListParams, CalculateFinalGradesDto, CalculateFinalGradesResponse,
    CohortKey, CreateAssessmentDto, CreateGradeDto, FinalGrade, FinalGradeFilter,
    FinalGradeUpsert, Grade, GradeStatistics, GradeUpsert, GridUpdateDto, GridUpdateResponse,
    LetterGrade, SkippedEntry, UNLINKED_MAX_SCORE,
};
use campusdesk_models::ids::ClassId;
use tracing::{info, instrument, warn};

use crate::metrics::{track_final_grades_computed, track_grid_entries_skipped};
use crate::middleware::auth::Actor;
use crate::modules::audit::recorder::{AuditEvent, record};
use crate::store::CampusStore;

use super::aggregation::{cohort_statistics, compute_final, letter_for_score};

#[instrument(skip(store))]
pub async fn list_assessments(
    store: &dyn CampusStore,
    params: AssessmentListParams,
) -> Result<Vec<Assessment>, AppError> {
    store
        .list_assessments(params.subject_id, params.class_id)
        .await
}

#[instrument(skip(store, actor, dto))]
pub async fn create_assessment(
    store: &dyn CampusStore,
    actor: &Actor,
    dto: CreateAssessmentDto,
) -> Result<Assessment, AppError> {
    store
        .find_subject(dto.subject_id)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Subject not found")))?;
    store
        .find_class(dto.class_id)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Class not found")))?;

    let assessment = store.insert_assessment(&dto).await?;

    let event = AuditEvent::new(ActionKind::Create, "Assessment")
        .object(assessment.id)
        .details(format!(
            "{} ({}) weight {} max {}",
            assessment.name, assessment.assessment_type, assessment.weight, assessment.max_score
        ));
    record(store, Some(&actor.actor_ref()), event, &actor.context).await;

    Ok(assessment)
}

fn check_score(score: f64, max_score: f64) -> Result<(), String> {
    if !(0.0..=max_score).contains(&score) {
        return Err(format!("Score must be between 0 and {}", max_score));
    }
    Ok(())
}

#[instrument(skip(store, actor, dto))]
pub async fn create_grade(
    store: &dyn CampusStore,
    actor: &Actor,
    dto: CreateGradeDto,
) -> Result<Grade, AppError> {
    store
        .find_student(dto.student_id)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Student not found")))?;
    store
        .find_subject(dto.subject_id)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Subject not found")))?;

    let letter = match dto.assessment_id {
        Some(assessment_id) => {
            let assessment = store
                .find_assessment(assessment_id)
                .await?
                .ok_or_else(|| AppError::not_found(anyhow!("Assessment not found")))?;
            if assessment.subject_id != dto.subject_id {
                return Err(AppError::unprocessable(anyhow!(
                    "Assessment belongs to a different subject"
                )));
            }
            check_score(dto.score, assessment.max_score)
                .map_err(|m| AppError::unprocessable(anyhow!(m)))?;
            letter_for_score(dto.score, assessment.max_score)
        }
        None => {
            check_score(dto.score, UNLINKED_MAX_SCORE)
                .map_err(|m| AppError::unprocessable(anyhow!(m)))?;
            LetterGrade::from_score(dto.score)
        }
    };

    let grade = store.insert_grade(&dto, letter).await?;

    let event = AuditEvent::new(ActionKind::Create, "Grade")
        .object(grade.id)
        .details(format!(
            "Student {} scored {} ({})",
            grade.student_id, grade.score, grade.letter_grade
        ));
    record(store, Some(&actor.actor_ref()), event, &actor.context).await;

    Ok(grade)
}

/// Upserts a batch of (student, assessment) scores.
///
/// Entries that cannot be applied are reported back and the rest of the
/// batch still goes through.
#[instrument(skip(store, actor, dto), fields(entries = dto.updates.len()))]
pub async fn update_grid(
    store: &dyn CampusStore,
    actor: &Actor,
    dto: GridUpdateDto,
) -> Result<GridUpdateResponse, AppError> {
    let mut updated = Vec::new();
    let mut skipped = Vec::new();

    for entry in dto.updates {
        let skip = |reason: String| SkippedEntry {
            student_id: entry.student_id,
            assessment_id: entry.assessment_id,
            reason,
        };

        if store.find_student(entry.student_id).await?.is_none() {
            skipped.push(skip("Student not found".to_string()));
            continue;
        }
        let Some(assessment) = store.find_assessment(entry.assessment_id).await? else {
            skipped.push(skip("Assessment not found".to_string()));
            continue;
        };
        if let Err(reason) = check_score(entry.score, assessment.max_score) {
            skipped.push(skip(reason));
            continue;
        }

        let grade = store
            .upsert_grade(&GradeUpsert {
                student_id: entry.student_id,
                subject_id: assessment.subject_id,
                assessment_id: assessment.id,
                score: entry.score,
                letter_grade: letter_for_score(entry.score, assessment.max_score),
                remark: entry.remark.clone(),
            })
            .await?;
        updated.push(grade);
    }

    if !skipped.is_empty() {
        warn!(skipped = skipped.len(), "Some grid entries were skipped");
        track_grid_entries_skipped(skipped.len());
    }

    let event = AuditEvent::new(ActionKind::Update, "Grade").details(format!(
        "Grid update: {} saved, {} skipped",
        updated.len(),
        skipped.len()
    ));
    record(store, Some(&actor.actor_ref()), event, &actor.context).await;

    Ok(GridUpdateResponse { updated, skipped })
}

/// Recomputes every computable final grade of a cohort, then re-ranks it.
///
/// Students with nothing computable keep whatever row they already had.
#[instrument(skip(store, key), fields(cohort = %key))]
pub async fn recalculate_cohort(
    store: &dyn CampusStore,
    key: &CohortKey,
) -> Result<Vec<FinalGrade>, AppError> {
    store
        .find_subject(key.subject_id)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Subject not found")))?;

    let students = store.students_for_subject(key.subject_id).await?;
    let mut assessments_by_class: HashMap<ClassId, Vec<Assessment>> = HashMap::new();
    let mut results = Vec::new();

    for student in &students {
        if !assessments_by_class.contains_key(&student.class_id) {
            let assessments = store
                .list_assessments(Some(key.subject_id), Some(student.class_id))
                .await?;
            assessments_by_class.insert(student.class_id, assessments);
        }
        let assessments = assessments_by_class
            .get(&student.class_id)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let grades = store
            .grades_for_student(student.id, key.subject_id)
            .await?;

        if let Some((final_score, letter_grade)) = compute_final(assessments, &grades) {
            results.push(FinalGradeUpsert {
                student_id: student.id,
                final_score,
                letter_grade,
            });
        }
    }

    let stored = store.store_cohort_results(key, &results).await?;
    track_final_grades_computed(stored.len());
    info!(
        students = students.len(),
        computed = stored.len(),
        "Final grades recalculated"
    );

    Ok(stored)
}

/// Re-ranks the stored rows of a cohort without recomputing their scores.
#[instrument(skip(store, key), fields(cohort = %key))]
pub async fn rerank_cohort(
    store: &dyn CampusStore,
    key: &CohortKey,
) -> Result<Vec<FinalGrade>, AppError> {
    let ranked = store.rerank_cohort(key).await?;
    info!(ranked = ranked.len(), "Cohort re-ranked");
    Ok(ranked)
}

#[instrument(skip(store, actor, dto))]
pub async fn calculate_final_grades(
    store: &dyn CampusStore,
    actor: &Actor,
    dto: CalculateFinalGradesDto,
) -> Result<CalculateFinalGradesResponse, AppError> {
    let key = dto.cohort();
    let grades = recalculate_cohort(store, &key).await?;

    let message = format!("Calculated final grades for {} students", grades.len());
    let event = AuditEvent::new(ActionKind::Update, "FinalGrade")
        .object(key.subject_id)
        .details(format!("{} ({} {})", message, key.semester, key.year));
    record(store, Some(&actor.actor_ref()), event, &actor.context).await;

    Ok(CalculateFinalGradesResponse { message, grades })
}

#[instrument(skip(store))]
pub async fn list_final_grades(
    store: &dyn CampusStore,
    filter: FinalGradeFilter,
) -> Result<Vec<FinalGrade>, AppError> {
    store.list_final_grades(&filter).await
}

#[instrument(skip(store))]
pub async fn statistics(
    store: &dyn CampusStore,
    filter: FinalGradeFilter,
) -> Result<GradeStatistics, AppError> {
    let grades = store.list_final_grades(&filter).await?;
    Ok(cohort_statistics(&grades))
}
