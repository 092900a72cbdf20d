use axum::{extract::State, response::IntoResponse, Extension, Json};
use common::{error::AppError, storage::types::course::Course};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{api_state::ApiState, error::ApiError, middleware_owner::OwnerId};

#[derive(Debug, Deserialize)]
pub struct CourseIn {
    pub name: String,
    #[serde(default)]
    pub term: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseOut {
    pub id: String,
    pub name: String,
    pub term: Option<String>,
}

impl From<Course> for CourseOut {
    fn from(course: Course) -> Self {
        Self {
            id: course.id,
            name: course.name,
            term: course.term,
        }
    }
}

pub async fn list_courses(
    State(state): State<ApiState>,
    Extension(owner): Extension<OwnerId>,
) -> Result<impl IntoResponse, ApiError> {
    let courses = state
        .store
        .list_courses(&owner.0)
        .await
        .map_err(AppError::from)?;

    Ok(Json(
        courses.into_iter().map(CourseOut::from).collect::<Vec<_>>(),
    ))
}

pub async fn create_course(
    State(state): State<ApiState>,
    Extension(owner): Extension<OwnerId>,
    Json(input): Json<CourseIn>,
) -> Result<impl IntoResponse, ApiError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ApiError::ValidationError(
            "Course name must not be empty".to_string(),
        ));
    }
    let term = input
        .term
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let course = state
        .store
        .get_or_create_course(&owner.0, name, term)
        .await
        .map_err(AppError::from)?;
    info!(owner_id = %owner.0, course_id = %course.id, "Course resolved");

    Ok(Json(CourseOut::from(course)))
}
