use serde::{Deserialize, Serialize};

use crate::domain::{AuthTokens, Course, CourseId, Faq, Sprint, SprintId, UserId, UserProfile};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub tokens: AuthTokens,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education_background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub career_goals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedStudent {
    pub student_id: UserId,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_joined: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignupResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CreatedStudent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateCourseRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frequently_asked_questions: Vec<Faq>,
}

/// `POST courses/create/` answers either `{ "course": {...} }` or the bare
/// record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CourseCreated {
    Wrapped { course: Course },
    Bare(Course),
}

impl CourseCreated {
    pub fn into_course(self) -> Course {
        match self {
            Self::Wrapped { course } | Self::Bare(course) => course,
        }
    }
}

/// `GET courses/get/` answers either an array or `{ "courses": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CourseList {
    Bare(Vec<Course>),
    Wrapped { courses: Vec<Course> },
}

impl CourseList {
    pub fn into_courses(self) -> Vec<Course> {
        match self {
            Self::Bare(courses) | Self::Wrapped { courses } => courses,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateSprintRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
}

impl CreateSprintRequest {
    pub fn into_sprint(self, course_id: CourseId, sprint_id: Option<SprintId>) -> Sprint {
        Sprint {
            id: sprint_id,
            course_id: Some(course_id),
            name: self.name,
            duration: self.duration,
            start_date: self.start_date,
            description: self.description,
            is_active: self.is_active,
        }
    }
}

/// The sprint endpoint returns the full record on some deployments and only
/// an acknowledgement carrying the new id on others.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SprintCreated {
    Record(Sprint),
    Ack { sprint_id: SprintId },
}

/// A course without sprints answers `{ "message": ... }`, hence the default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SprintList {
    #[serde(default)]
    pub sprints: Vec<Sprint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCheckRequest {
    pub task_name: String,
    pub repo_url: String,
}

/// Output of the repository checker run by `POST validate/`. A non-zero
/// `exit_code` means the repository did not pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCheckResult {
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub repo_url: String,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

impl TaskCheckResult {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}
