//! Functions the model can call
//!
//! The [`FunctionRegistry`] validates arguments against each function's
//! declared schema before running its handler. Built-in leaf actions are
//! wired up by [`builtin_registry`].

mod browser;
mod calendar;
mod clock;
mod files;
mod registry;
mod schema;

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

pub use browser::{OpenBrowserArgs, normalize_url, open_detached};
pub use calendar::{CalendarEvent, CancelEventArgs, CreateEventArgs, LocalCalendar};
pub use clock::describe as describe_time;
pub use files::{DeleteFileArgs, FileActionError, FileActions, WriteFileArgs};
pub use registry::{DispatchError, FunctionRegistry, FunctionSpec, ToolDefinition};
pub use schema::{ParamKind, Parameter, ParameterSchema};

/// Registry with every built-in function, file actions scoped to `scratch_dir`
#[must_use]
pub fn builtin_registry(scratch_dir: &Path) -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    register_file_actions(&mut registry, FileActions::new(scratch_dir));
    register_calendar(&mut registry, LocalCalendar::in_dir(scratch_dir));

    registry.register(
        FunctionSpec::new(
            "open_browser",
            "Open a web page in the user's default browser",
            ParameterSchema::new().param(
                Parameter::string("url", "The URL or domain to open, e.g. https://example.com")
                    .required(),
            ),
        ),
        browser::handle_open,
    );

    registry.register(
        FunctionSpec::new(
            "get_current_time",
            "Get the current local date, time and weekday",
            ParameterSchema::new(),
        ),
        clock::handle_now,
    );

    tracing::debug!(
        functions = ?registry.names().collect::<Vec<_>>(),
        scratch_dir = %scratch_dir.display(),
        "built-in functions registered"
    );
    registry
}

fn register_file_actions(registry: &mut FunctionRegistry, files: FileActions) {
    let files = Arc::new(files);
    let file_name = || {
        Parameter::string(
            "file_name",
            "Path of the file relative to the scratch directory, e.g. notes/todo.md",
        )
        .required()
    };

    let create = Arc::clone(&files);
    registry.register(
        FunctionSpec::new(
            "create_file",
            "Create a new file with the given content. Fails if the file exists",
            ParameterSchema::new()
                .param(file_name())
                .param(Parameter::string("content", "Full content of the file").required()),
        ),
        move |args: WriteFileArgs| {
            let files = Arc::clone(&create);
            async move { files.handle_create(args).await }
        },
    );

    let update = Arc::clone(&files);
    registry.register(
        FunctionSpec::new(
            "update_file",
            "Replace the content of an existing file",
            ParameterSchema::new()
                .param(file_name())
                .param(Parameter::string("content", "New content of the file").required()),
        ),
        move |args: WriteFileArgs| {
            let files = Arc::clone(&update);
            async move { files.handle_update(args).await }
        },
    );

    registry.register(
        FunctionSpec::new(
            "delete_file",
            "Delete an existing file",
            ParameterSchema::new().param(file_name()),
        ),
        move |args: DeleteFileArgs| {
            let files = Arc::clone(&files);
            async move { files.handle_delete(args).await }
        },
    );
}

fn register_calendar(registry: &mut FunctionRegistry, calendar: LocalCalendar) {
    let store = Arc::new(calendar);
    let date = || {
        Parameter::string("date", "Date of the meeting (YYYY-MM-DD). Defaults to today")
    };

    let create = Arc::clone(&store);
    registry.register(
        FunctionSpec::new(
            "create_calendar_event",
            "Schedule a meeting in the local calendar",
            ParameterSchema::new()
                .param(Parameter::string("title", "Title of the meeting").required())
                .param(date())
                .param(
                    Parameter::string("time", "Start time of the meeting (HH:MM, 24-hour)")
                        .required(),
                )
                .param(
                    Parameter::integer("duration_minutes", "Duration of the meeting in minutes")
                        .range(1.0, f64::from(calendar::MAX_DURATION_MINUTES))
                        .default_value(json!(calendar::DEFAULT_DURATION_MINUTES)),
                )
                .param(
                    Parameter::string("description", "Optional description")
                        .default_value(json!("")),
                ),
        ),
        move |args: CreateEventArgs| {
            let calendar = Arc::clone(&create);
            async move { calendar.create(args).await }
        },
    );

    registry.register(
        FunctionSpec::new(
            "cancel_calendar_event",
            "Cancel meetings matching a title on a date, optionally at a specific time",
            ParameterSchema::new()
                .param(Parameter::string("title", "Title of the meeting to cancel").required())
                .param(date())
                .param(Parameter::string(
                    "time",
                    "Start time (HH:MM, 24-hour). If omitted, matches by title and date",
                )),
        ),
        move |args: CancelEventArgs| {
            let calendar = Arc::clone(&store);
            async move { calendar.cancel(args).await }
        },
    );
}
