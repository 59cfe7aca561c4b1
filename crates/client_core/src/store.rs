use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::{AuthTokens, Course, CourseId, Sprint, UserId},
    error::ErrorPayload,
    protocol::{
        CourseCreated, CourseList, CreateCourseRequest, CreateSprintRequest, CreatedStudent,
        LoginResponse, SignupResponse, SprintCreated, SprintList, TaskCheckResult,
    },
};
use storage::{SessionStore, Storage};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    auth::{AuthSession, AuthState},
    dispatcher::{Attachment, DispatchError, Dispatcher, Operation},
    resource::{Lifecycle, ResourceContainer, ResourceKind, ResourceState, StoreEvent},
    settings::Settings,
    validation::{
        validate_course, validate_sprint, FieldErrors, LoginForm, SignupForm, TaskCheckForm,
    },
};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error(transparent)]
    Request(ErrorPayload),
    #[error("request cancelled")]
    Cancelled,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ActionError {
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            Self::Request(payload) => payload.field_errors.as_ref(),
            _ => None,
        }
    }
}

/// All resource containers plus the dispatcher and auth session they share.
/// Cloning is cheap and every clone observes the same state.
#[derive(Clone)]
pub struct Store {
    dispatcher: Dispatcher,
    auth: AuthState,
    events: broadcast::Sender<StoreEvent>,
    courses: ResourceContainer<Vec<Course>>,
    sprints: ResourceContainer<Vec<Sprint>>,
    login: ResourceContainer<Option<LoginResponse>>,
    signup: ResourceContainer<Option<CreatedStudent>>,
    checker: ResourceContainer<Option<TaskCheckResult>>,
}

impl Store {
    pub fn new(settings: &Settings, session_store: Arc<dyn SessionStore>) -> anyhow::Result<Self> {
        let auth = AuthState::new(session_store);
        let dispatcher = Dispatcher::new(settings, auth.clone())?;
        let (events, _) = broadcast::channel(256);
        let policy = settings.rollback_policy;
        Ok(Self {
            dispatcher,
            auth,
            courses: ResourceContainer::new(ResourceKind::Courses, events.clone(), policy),
            sprints: ResourceContainer::new(ResourceKind::Sprints, events.clone(), policy),
            login: ResourceContainer::new(ResourceKind::Login, events.clone(), policy),
            signup: ResourceContainer::new(ResourceKind::Signup, events.clone(), policy),
            checker: ResourceContainer::new(ResourceKind::Checker, events.clone(), policy),
            events,
        })
    }

    /// Opens the SQLite session database named in `settings`.
    pub async fn open(settings: &Settings) -> anyhow::Result<Self> {
        let storage = Storage::new(&settings.session_db_url)
            .await
            .context("failed to open session storage")?;
        Self::new(settings, Arc::new(storage))
    }

    /// A handle whose requests give up when `token` is cancelled. The
    /// affected resource then moves to `Cancelled` instead of settling.
    pub fn scoped(&self, token: CancellationToken) -> Self {
        Self {
            dispatcher: self.dispatcher.with_cancellation(token),
            ..self.clone()
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn courses(&self) -> &ResourceContainer<Vec<Course>> {
        &self.courses
    }

    pub fn sprints(&self) -> &ResourceContainer<Vec<Sprint>> {
        &self.sprints
    }

    pub fn login(&self) -> &ResourceContainer<Option<LoginResponse>> {
        &self.login
    }

    pub fn signup(&self) -> &ResourceContainer<Option<CreatedStudent>> {
        &self.signup
    }

    pub fn checker(&self) -> &ResourceContainer<Option<TaskCheckResult>> {
        &self.checker
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated().await
    }

    pub async fn create_course(&self, input: CreateCourseRequest) -> Result<Course, ActionError> {
        validate_course(&input).map_err(ActionError::Validation)?;
        let operation = encode(Operation::post("courses/create/").json(&input))?;

        let body = self.dispatch(&self.courses, operation).await?;
        let course = self
            .decode::<CourseCreated, _>(&self.courses, body)
            .await?
            .into_course();
        info!(name = %course.name, "course created");
        self.courses
            .settle_with(|courses| courses.push(course.clone()))
            .await;
        Ok(course)
    }

    /// Shows the new course in the list before the server confirms it. The
    /// placeholder is swapped for the stored record on success; on failure
    /// the container's rollback policy decides whether it stays.
    pub async fn create_course_optimistic(
        &self,
        input: CreateCourseRequest,
    ) -> Result<Course, ActionError> {
        validate_course(&input).map_err(ActionError::Validation)?;
        let operation = encode(Operation::post("courses/create/").json(&input))?;
        let placeholder = pending_course(&input);

        self.courses.apply(Lifecycle::Started).await;
        let checkpoint = self
            .courses
            .optimistic(|courses| courses.push(placeholder.clone()))
            .await;

        let outcome = match self.execute(operation).await {
            Ok(body) => serde_json::from_value::<CourseCreated>(body)
                .map(CourseCreated::into_course)
                .map_err(|e| DispatchError::Failed(unexpected_body(e))),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(course) => {
                self.courses
                    .settle_with(|courses| {
                        match courses
                            .iter()
                            .rposition(|c| c.id.is_none() && *c == placeholder)
                        {
                            Some(index) => courses[index] = course.clone(),
                            None => courses.push(course.clone()),
                        }
                    })
                    .await;
                Ok(course)
            }
            Err(DispatchError::Cancelled) => {
                self.courses.cancel_optimistic(checkpoint).await;
                Err(ActionError::Cancelled)
            }
            Err(DispatchError::Failed(payload)) => {
                self.courses
                    .fail_optimistic(checkpoint, payload.clone())
                    .await;
                Err(ActionError::Request(payload))
            }
        }
    }

    pub async fn list_courses(&self) -> Result<Vec<Course>, ActionError> {
        let body = self
            .dispatch(&self.courses, Operation::get("courses/get/"))
            .await?;
        let courses = self
            .decode::<CourseList, _>(&self.courses, body)
            .await?
            .into_courses();
        self.courses
            .settle_with(|current| *current = courses.clone())
            .await;
        Ok(courses)
    }

    pub async fn create_sprint(
        &self,
        course_id: CourseId,
        input: CreateSprintRequest,
    ) -> Result<Sprint, ActionError> {
        validate_sprint(&input).map_err(ActionError::Validation)?;
        let operation = encode(
            Operation::post(format!("courses/{course_id}/sprints/create/")).form_from(&input),
        )?;

        let body = self.dispatch(&self.sprints, operation).await?;
        let sprint = match self.decode::<SprintCreated, _>(&self.sprints, body).await? {
            SprintCreated::Record(sprint) => sprint,
            SprintCreated::Ack { sprint_id } => input.into_sprint(course_id, Some(sprint_id)),
        };
        self.sprints
            .settle_with(|sprints| sprints.push(sprint.clone()))
            .await;
        Ok(sprint)
    }

    pub async fn get_sprints_by_course(&self, course_id: CourseId) -> Result<Vec<Sprint>, ActionError> {
        let body = self
            .dispatch(&self.sprints, Operation::get(format!("courses/{course_id}/sprints/")))
            .await?;
        let sprints = if body.is_null() {
            Vec::new()
        } else {
            self.decode::<SprintList, _>(&self.sprints, body).await?.sprints
        };
        self.sprints
            .settle_with(|current| *current = sprints.clone())
            .await;
        Ok(sprints)
    }

    pub async fn login_user(&self, form: &LoginForm) -> Result<LoginResponse, ActionError> {
        let credentials = form.validate().map_err(ActionError::Validation)?;
        let operation = encode(Operation::post("auth/login/").json(&credentials))?;

        let body = self.dispatch(&self.login, operation).await?;
        let response = self.decode::<LoginResponse, _>(&self.login, body).await?;

        if let Err(err) = self
            .auth
            .set_auth(response.user.clone(), response.tokens.clone())
            .await
        {
            self.login
                .apply(Lifecycle::Failed(ErrorPayload::new(format!(
                    "failed to persist session: {err}"
                ))))
                .await;
            return Err(ActionError::Storage(err));
        }

        self.login
            .settle_with(|current| *current = Some(response.clone()))
            .await;
        Ok(response)
    }

    pub async fn signup_user(
        &self,
        form: &SignupForm,
        profile_picture: Option<Attachment>,
    ) -> Result<CreatedStudent, ActionError> {
        let request = form.validate().map_err(ActionError::Validation)?;
        let mut operation = encode(Operation::post("users/students/create/").form_from(&request))?;
        if let Some(picture) = profile_picture {
            operation = operation.with_file("profile_picture", picture);
        }

        let body = self.dispatch(&self.signup, operation).await?;
        let response = self.decode::<SignupResponse, _>(&self.signup, body).await?;
        let student = response.data.unwrap_or_else(|| CreatedStudent {
            student_id: response.user_id.unwrap_or_else(|| UserId(String::new())),
            email: request.email.clone(),
            full_name: request.full_name.clone(),
            date_joined: None,
        });
        info!(email = %student.email, "student account created");
        self.signup
            .settle_with(|current| *current = Some(student.clone()))
            .await;
        Ok(student)
    }

    /// Runs the repository checker for one task. A repository that fails the
    /// check is still a successful request; inspect `exit_code`.
    pub async fn validate_task(&self, form: &TaskCheckForm) -> Result<TaskCheckResult, ActionError> {
        let request = form.validate().map_err(ActionError::Validation)?;
        let operation = encode(Operation::post("validate/").json(&request))?;

        let body = self.dispatch(&self.checker, operation).await?;
        let mut result = self.decode::<TaskCheckResult, _>(&self.checker, body).await?;
        if result.task_name.is_empty() {
            result.task_name = request.task_name;
        }
        if result.repo_url.is_empty() {
            result.repo_url = request.repo_url;
        }
        info!(task = %result.task_name, exit_code = result.exit_code, "repository checked");
        self.checker
            .settle_with(|current| *current = Some(result.clone()))
            .await;
        Ok(result)
    }

    pub async fn logout(&self) -> Result<(), ActionError> {
        self.auth.logout().await?;
        self.login.apply(Lifecycle::Reset).await;
        Ok(())
    }

    /// Restores a persisted session. The login resource is hydrated only
    /// when both a token and a user were stored.
    pub async fn load_auth_from_storage(&self) -> Result<AuthSession, ActionError> {
        let session = self.auth.load_from_storage().await?;
        if let (Some(token), Some(user)) = (&session.token, &session.user) {
            let restored = LoginResponse {
                user: user.clone(),
                tokens: AuthTokens {
                    access: token.clone(),
                    refresh: session.refresh.clone().unwrap_or_default(),
                },
                message: None,
            };
            self.login.apply(Lifecycle::Hydrated(Some(restored))).await;
        } else if session.token.is_some() {
            warn!("stored token has no matching user; login state not restored");
        }
        Ok(session)
    }

    pub async fn reset_courses(&self) {
        self.courses.apply(Lifecycle::Reset).await;
    }

    pub async fn reset_sprints(&self) {
        self.sprints.apply(Lifecycle::Reset).await;
    }

    pub async fn reset_login(&self) {
        self.login.apply(Lifecycle::Reset).await;
    }

    pub async fn reset_signup(&self) {
        self.signup.apply(Lifecycle::Reset).await;
    }

    pub async fn reset_checker(&self) {
        self.checker.apply(Lifecycle::Reset).await;
    }

    pub async fn courses_snapshot(&self) -> ResourceState<Vec<Course>> {
        self.courses.snapshot().await
    }

    pub async fn sprints_snapshot(&self) -> ResourceState<Vec<Sprint>> {
        self.sprints.snapshot().await
    }

    /// Moves `container` to loading, runs the request and records a failure
    /// or cancellation. Success is left to the caller to settle.
    async fn dispatch<T>(
        &self,
        container: &ResourceContainer<T>,
        operation: Operation,
    ) -> Result<Value, ActionError>
    where
        T: Clone + Default + Send + Sync + 'static,
    {
        container.apply(Lifecycle::Started).await;
        match self.execute(operation).await {
            Ok(body) => Ok(body),
            Err(DispatchError::Cancelled) => {
                container.apply(Lifecycle::Cancelled).await;
                Err(ActionError::Cancelled)
            }
            Err(DispatchError::Failed(payload)) => {
                container.apply(Lifecycle::Failed(payload.clone())).await;
                Err(ActionError::Request(payload))
            }
        }
    }

    /// A response that lands after the token fired is treated as cancelled.
    async fn execute(&self, operation: Operation) -> Result<Value, DispatchError> {
        let body = self.dispatcher.execute(operation).await?;
        if self.dispatcher.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }
        Ok(body)
    }

    async fn decode<R, T>(&self, container: &ResourceContainer<T>, body: Value) -> Result<R, ActionError>
    where
        R: DeserializeOwned,
        T: Clone + Default + Send + Sync + 'static,
    {
        match serde_json::from_value(body) {
            Ok(decoded) => Ok(decoded),
            Err(err) => {
                let payload = unexpected_body(err);
                container.apply(Lifecycle::Failed(payload.clone())).await;
                Err(ActionError::Request(payload))
            }
        }
    }
}

fn encode(operation: serde_json::Result<Operation>) -> Result<Operation, ActionError> {
    operation.map_err(|e| ActionError::Request(ErrorPayload::new(format!("failed to encode request: {e}"))))
}

fn unexpected_body(err: serde_json::Error) -> ErrorPayload {
    ErrorPayload::new(format!("unexpected response body: {err}"))
}

fn pending_course(input: &CreateCourseRequest) -> Course {
    Course {
        id: None,
        name: input.name.clone(),
        code: None,
        description: input.description.clone(),
        duration: input.duration,
        commitment_time: input.commitment_time,
        mode_of_learning: None,
        requirements: input.requirements.clone(),
        start_date: input.start_date.clone(),
        end_date: None,
        is_published: false,
        frequently_asked_questions: input.frequently_asked_questions.clone(),
        created_at: None,
        updated_at: None,
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
