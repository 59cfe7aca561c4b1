//! Client-side form checks. A form that fails here is never dispatched.

use std::collections::BTreeMap;

use shared::protocol::{
    CreateCourseRequest, CreateSprintRequest, LoginRequest, SignupRequest, TaskCheckRequest,
};

pub type FieldErrors = BTreeMap<String, String>;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<LoginRequest, FieldErrors> {
        let mut errors = FieldErrors::new();
        check_email(&self.email, &mut errors);
        if self.password.is_empty() {
            errors.insert("password".into(), "Password is required".into());
        }
        finish(errors, || LoginRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub current_level: Option<String>,
    pub education_background: Option<String>,
    pub career_goals: Option<String>,
    pub skills: Option<String>,
    pub preferred_language: Option<String>,
}

impl SignupForm {
    pub fn validate(&self) -> Result<SignupRequest, FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.full_name.trim().is_empty() {
            errors.insert("full_name".into(), "Full name is required".into());
        }
        check_email(&self.email, &mut errors);
        if self.password.is_empty() {
            errors.insert("password".into(), "Password is required".into());
        } else if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.insert(
                "password".into(),
                format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
            );
        }
        if self.confirm_password != self.password {
            errors.insert("confirm_password".into(), "Passwords do not match".into());
        }
        finish(errors, || SignupRequest {
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            current_level: non_blank(&self.current_level),
            education_background: non_blank(&self.education_background),
            career_goals: non_blank(&self.career_goals),
            skills: non_blank(&self.skills),
            preferred_language: non_blank(&self.preferred_language),
        })
    }
}

pub fn validate_course(input: &CreateCourseRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if input.name.trim().is_empty() {
        errors.insert("name".into(), "Course name is required".into());
    }
    if input.duration == Some(0) {
        errors.insert("duration".into(), "Duration must be a positive number of weeks".into());
    }
    if input.commitment_time == Some(0) {
        errors.insert(
            "commitment_time".into(),
            "Commitment time must be a positive number of hours".into(),
        );
    }
    finish(errors, || ())
}

pub fn validate_sprint(input: &CreateSprintRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if input.name.trim().is_empty() {
        errors.insert("name".into(), "Sprint name is required".into());
    }
    if input
        .start_date
        .as_deref()
        .map_or(true, |date| date.trim().is_empty())
    {
        errors.insert("start_date".into(), "Start date is required".into());
    }
    finish(errors, || ())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskCheckForm {
    pub task_name: String,
    pub repo_url: String,
}

impl TaskCheckForm {
    pub fn validate(&self) -> Result<TaskCheckRequest, FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.task_name.trim().is_empty() {
            errors.insert("task_name".into(), "Task name is required".into());
        }
        if self.repo_url.trim().is_empty() {
            errors.insert("repo_url".into(), "Repository URL is required".into());
        }
        finish(errors, || TaskCheckRequest {
            task_name: self.task_name.trim().to_string(),
            repo_url: self.repo_url.trim().to_string(),
        })
    }
}

/// Same acceptance as the pattern `\S+@\S+\.\S+` searched anywhere in
/// the input.
pub fn looks_like_email(text: &str) -> bool {
    text.char_indices().any(|(at, c)| {
        if c != '@' || !text[..at].chars().next_back().is_some_and(|c| !c.is_whitespace()) {
            return false;
        }
        let domain: String = text[at + 1..]
            .chars()
            .take_while(|c| !c.is_whitespace())
            .collect();
        domain
            .char_indices()
            .any(|(dot, c)| c == '.' && dot > 0 && dot + 1 < domain.len())
    })
}

fn check_email(email: &str, errors: &mut FieldErrors) {
    if email.trim().is_empty() {
        errors.insert("email".into(), "Email is required".into());
    } else if !looks_like_email(email) {
        errors.insert("email".into(), "Please enter a valid email".into());
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn finish<T>(errors: FieldErrors, ok: impl FnOnce() -> T) -> Result<T, FieldErrors> {
    if errors.is_empty() {
        Ok(ok())
    } else {
        Err(errors)
    }
}
