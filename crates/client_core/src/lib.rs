//! Client-side state for the course checker: per-resource containers, the
//! HTTP dispatcher that feeds them, and the persisted auth session.

pub mod auth;
pub mod dispatcher;
pub mod resource;
pub mod settings;
pub mod store;
pub mod validation;

pub use auth::{AuthSession, AuthState};
pub use dispatcher::{
    normalize_error, Attachment, DispatchError, Dispatcher, FormValue, Method, Operation,
    RequestBody,
};
pub use resource::{
    Checkpoint, Lifecycle, Phase, ResourceContainer, ResourceKind, ResourceState, RollbackPolicy,
    StoreEvent,
};
pub use settings::{load_settings, load_settings_from, Settings};
pub use store::{ActionError, Store};
pub use validation::{FieldErrors, LoginForm, SignupForm, TaskCheckForm};
