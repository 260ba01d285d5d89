//! Academic records read by the grade engine.
//!
//! These are reference data: the API never edits them, the CLI seeds them.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::ids::{ClassId, StudentId, SubjectId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Student {
    pub id: StudentId,
    pub full_name: String,
    pub class_id: ClassId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Class {
    pub id: ClassId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub credit: i32,
}
