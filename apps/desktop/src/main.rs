mod render;

use std::{fs, path::PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    load_settings, ActionError, Attachment, LoginForm, Settings, SignupForm, Store, TaskCheckForm,
};
use serde_json::Value;
use shared::{
    domain::CourseId,
    protocol::{CreateCourseRequest, CreateSprintRequest},
};
use table_engine::{to_rows, ColumnDescriptor, TableIntent, TableModel, ViewState};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::render::{
    column_ids, course_columns, describe_check, describe_course, describe_sprint, render_table,
    sprint_columns,
};

#[derive(Parser, Debug)]
#[command(name = "course-checker", about = "Course administration client")]
struct Cli {
    /// Overrides `api_base_url` from the settings file.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Signup {
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[arg(long)]
        profile_picture: Option<PathBuf>,
    },
    Logout,
    /// Shows who is signed in.
    Whoami,
    #[command(subcommand)]
    Courses(CoursesCommand),
    #[command(subcommand)]
    Sprints(SprintsCommand),
    /// Runs the repository checker for a task.
    Check {
        #[arg(long)]
        task: String,
        /// Git URL of the repository to check.
        #[arg(long)]
        repo: String,
    },
}

#[derive(Subcommand, Debug)]
enum CoursesCommand {
    List {
        #[command(flatten)]
        view: ViewArgs,
        /// Only published courses.
        #[arg(long)]
        published: bool,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        start_date: Option<String>,
        /// Weeks.
        #[arg(long)]
        duration: Option<u32>,
        /// Hours per week.
        #[arg(long)]
        commitment_time: Option<u32>,
        #[arg(long)]
        requirements: Option<String>,
        /// Show the course locally before the server confirms it.
        #[arg(long)]
        optimistic: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SprintsCommand {
    List {
        course_id: i64,
        #[command(flatten)]
        view: ViewArgs,
    },
    Create {
        course_id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long)]
        duration: Option<u32>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        inactive: bool,
    },
}

#[derive(Args, Debug)]
struct ViewArgs {
    /// Case-insensitive text matched against every filterable column.
    #[arg(long)]
    filter: Option<String>,
    /// `column=value` equality filter; repeatable.
    #[arg(long = "where", value_name = "COLUMN=VALUE")]
    column_filters: Vec<String>,
    /// Column id to sort by; repeat for secondary keys.
    #[arg(long)]
    sort: Vec<String>,
    /// Sort descending instead of ascending.
    #[arg(long)]
    desc: bool,
    /// 1-based page number.
    #[arg(long, default_value_t = 1)]
    page: usize,
    #[arg(long)]
    page_size: Option<usize>,
}

impl ViewArgs {
    fn intents(&self, columns: &[ColumnDescriptor]) -> Result<Vec<TableIntent>> {
        let known = column_ids(columns);
        let mut intents = Vec::new();

        for (position, column_id) in self.sort.iter().enumerate() {
            if !known.contains(&column_id.as_str()) {
                bail!("unknown sort column '{column_id}', expected one of {known:?}");
            }
            let toggle = TableIntent::SortToggled {
                column_id: column_id.clone(),
                multi: position > 0,
            };
            intents.push(toggle.clone());
            if self.desc {
                intents.push(toggle);
            }
        }

        for filter in &self.column_filters {
            let (column_id, raw) = filter
                .split_once('=')
                .ok_or_else(|| anyhow!("filter '{filter}' must look like column=value"))?;
            intents.push(TableIntent::ColumnFilterChanged {
                column_id: column_id.to_string(),
                value: Some(filter_value(raw)),
            });
        }

        if let Some(text) = &self.filter {
            intents.push(TableIntent::GlobalFilterChanged(text.clone()));
        }
        intents.push(TableIntent::PageChanged(self.page.saturating_sub(1)));
        Ok(intents)
    }
}

/// `true`, `false` and numbers compare by value; anything else as text.
fn filter_value(raw: &str) -> Value {
    serde_json::from_str::<Value>(raw)
        .ok()
        .filter(|value| value.is_boolean() || value.is_number())
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings().context("failed to load settings")?;
    if let Some(url) = cli.api_url {
        settings.api_base_url = url;
    }
    debug!(api = %settings.api_base_url, "starting course-checker");

    let store = Store::open(&settings).await?;
    store
        .load_auth_from_storage()
        .await
        .map_err(explain)?;

    run(cli.command, &store, &settings).await
}

async fn run(command: Command, store: &Store, settings: &Settings) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let response = store
                .login_user(&LoginForm { email, password })
                .await
                .map_err(explain)?;
            let message = response.message.unwrap_or_else(|| "Login successful".into());
            println!("{message} ({})", response.user.email);
        }
        Command::Signup {
            full_name,
            email,
            password,
            confirm_password,
            profile_picture,
        } => {
            let picture = profile_picture.map(read_attachment).transpose()?;
            let form = SignupForm {
                full_name,
                email,
                password,
                confirm_password,
                ..SignupForm::default()
            };
            let student = store.signup_user(&form, picture).await.map_err(explain)?;
            println!("created student {} <{}>", student.student_id, student.email);
        }
        Command::Logout => {
            store.logout().await.map_err(explain)?;
            println!("signed out");
        }
        Command::Whoami => match store.auth().session().await.user {
            Some(user) => println!(
                "{} ({})",
                user.email,
                if user.is_admin() { "admin" } else { "student" }
            ),
            None => println!("not signed in"),
        },
        Command::Courses(CoursesCommand::List { view, published }) => {
            require_session(store).await?;
            let courses = store.list_courses().await.map_err(explain)?;
            let mut table = TableModel::new(course_columns(), to_rows(&courses)?)
                .with_state(ViewState::with_page_size(view.page_size.unwrap_or(settings.page_size)));
            if published {
                table.dispatch(TableIntent::ColumnFilterChanged {
                    column_id: "is_published".into(),
                    value: Some(Value::Bool(true)),
                });
            }
            for intent in view.intents(table.columns())? {
                table.dispatch(intent);
            }
            print!("{}", render_table(&table.view()));
        }
        Command::Courses(CoursesCommand::Create {
            name,
            description,
            start_date,
            duration,
            commitment_time,
            requirements,
            optimistic,
        }) => {
            require_session(store).await?;
            let input = CreateCourseRequest {
                name,
                description,
                start_date,
                duration,
                commitment_time,
                requirements,
                frequently_asked_questions: Vec::new(),
            };
            let course = if optimistic {
                store.create_course_optimistic(input).await
            } else {
                store.create_course(input).await
            }
            .map_err(explain)?;
            println!("created {}", describe_course(&course));
        }
        Command::Sprints(SprintsCommand::List { course_id, view }) => {
            require_session(store).await?;
            let sprints = store
                .get_sprints_by_course(CourseId(course_id))
                .await
                .map_err(explain)?;
            let mut table = TableModel::new(sprint_columns(), to_rows(&sprints)?)
                .with_state(ViewState::with_page_size(view.page_size.unwrap_or(settings.page_size)));
            for intent in view.intents(table.columns())? {
                table.dispatch(intent);
            }
            print!("{}", render_table(&table.view()));
        }
        Command::Sprints(SprintsCommand::Create {
            course_id,
            name,
            start_date,
            duration,
            description,
            inactive,
        }) => {
            require_session(store).await?;
            let sprint = store
                .create_sprint(
                    CourseId(course_id),
                    CreateSprintRequest {
                        name,
                        duration,
                        start_date,
                        description,
                        is_active: !inactive,
                    },
                )
                .await
                .map_err(explain)?;
            println!("created {}", describe_sprint(&sprint));
        }
        Command::Check { task, repo } => {
            let result = store
                .validate_task(&TaskCheckForm {
                    task_name: task,
                    repo_url: repo,
                })
                .await
                .map_err(explain)?;
            print!("{}", describe_check(&result));
            if !result.passed() {
                bail!("repository did not pass the check (exit code {})", result.exit_code);
            }
        }
    }
    Ok(())
}

async fn require_session(store: &Store) -> Result<()> {
    if store.is_authenticated().await {
        Ok(())
    } else {
        bail!("not signed in; run `course-checker login` first")
    }
}

fn read_attachment(path: PathBuf) -> Result<Attachment> {
    let bytes = fs::read(&path).with_context(|| format!("failed to read '{}'", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let mime_type = match path.extension().and_then(|ext| ext.to_str()) {
        Some("png") => Some("image/png".to_string()),
        Some("jpg" | "jpeg") => Some("image/jpeg".to_string()),
        Some("gif") => Some("image/gif".to_string()),
        _ => None,
    };
    Ok(Attachment {
        filename,
        mime_type,
        bytes,
    })
}

/// Spells out per-field messages, which the error's `Display` leaves out.
fn explain(err: ActionError) -> anyhow::Error {
    match err.field_errors() {
        Some(fields) if !fields.is_empty() => {
            let details: Vec<String> = fields
                .iter()
                .map(|(field, message)| format!("  {field}: {message}"))
                .collect();
            anyhow!("{err}\n{}", details.join("\n"))
        }
        _ => anyhow::Error::new(err),
    }
}
