use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use loggable::*;
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{net::TcpListener, time::sleep};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
struct Task {
    id: u32,
    title: String,
}

#[derive(Debug, Deserialize)]
struct NewTask {
    title: String,
}

#[derive(Debug, thiserror::Error)]
enum TaskError {
    #[error("Task title must not be blank")]
    BlankTitle,
    #[error("Task {0} not found")]
    NotFound(u32),
}

impl IntoResponse for TaskError {
    fn into_response(self) -> Response {
        let status = match self {
            TaskError::BlankTitle => StatusCode::BAD_REQUEST,
            TaskError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, self.to_string()).into_response()
    }
}

/// In-memory task store whose operations are logged by an [`Interceptor`].
#[derive(Debug, Clone)]
struct TaskService {
    interceptor: Interceptor,
    tasks: Arc<Mutex<Vec<Task>>>,
}

impl TaskService {
    fn new(interceptor: Interceptor) -> Self {
        Self {
            interceptor,
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn list(&self) -> Result<Vec<Task>, TaskError> {
        self.interceptor
            .invoke(&Invocation::named("TaskService::list"), || {
                Ok(self.tasks.lock().unwrap().clone())
            })
    }

    fn find(&self, id: u32) -> Result<Task, TaskError> {
        let args: [&dyn Debug; 1] = [&id];
        self.interceptor
            .invoke(&Invocation::new("TaskService::find", &args), || {
                let tasks = self.tasks.lock().unwrap();
                tasks
                    .iter()
                    .find(|task| task.id == id)
                    .cloned()
                    .ok_or(TaskError::NotFound(id))
            })
    }

    fn create(&self, title: &str) -> Result<Task, TaskError> {
        let args: [&dyn Debug; 1] = [&title];
        self.interceptor
            .invoke(&Invocation::new("TaskService::create", &args), || {
                if title.trim().is_empty() {
                    return Err(TaskError::BlankTitle);
                }
                let mut tasks = self.tasks.lock().unwrap();
                let task = Task {
                    id: tasks.len() as u32 + 1,
                    title: title.to_string(),
                };
                tasks.push(task.clone());
                Ok(task)
            })
    }

    async fn report(&self) -> Result<String, TaskError> {
        let timed = self
            .interceptor
            .timed_async(&Invocation::named("TaskService::report"), async {
                sleep(Duration::from_millis(100)).await; // Simulate some work
                let count = self.tasks.lock().unwrap().len();
                Ok(format!("{count} tasks on record"))
            });
        timed.await
    }
}

#[derive(Debug, Clone)]
struct AppState {
    tasks: TaskService,
    policy: SharedPolicy,
}

async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>, TaskError> {
    state.tasks.list().map(Json)
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Task>, TaskError> {
    state.tasks.find(id).map(Json)
}

async fn create_task(
    State(state): State<AppState>,
    Json(input): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), TaskError> {
    let task = state.tasks.create(&input.title)?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn report(State(state): State<AppState>) -> Result<String, TaskError> {
    state.tasks.report().await
}

async fn set_level(State(state): State<AppState>, Path(level): Path<String>) -> Response {
    match LoggingPolicy::new(true, &level) {
        Ok(policy) => {
            state.policy.replace(policy);
            info!(level = %policy.minimum_severity(), "Logging level changed");
            (StatusCode::OK, format!("Logging from {}", policy.minimum_severity())).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    info!("Starting loggable demo server");

    // Defaults to disabled; LOGGABLE_ENABLED=true LOGGABLE_LEVEL=debug turns it on
    let config = LoggableConfig::load()?;
    let policy = SharedPolicy::new(config.policy()?);
    let sink = LogSink::tracing(policy.clone());

    let state = AppState {
        tasks: TaskService::new(Interceptor::new(sink.clone())),
        policy,
    };
    let instrumentation =
        HttpInstrumentation::new(sink).with_list_item_limit(config.list_item_limit);

    let app = Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", get(get_task))
        .route("/report", get(report))
        .route("/admin/logging/{level}", put(set_level))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(HttpLogLayer::new(instrumentation))
                .into_inner(),
        );

    info!("Demo server endpoints:");
    info!("  GET  /tasks                  - List tasks");
    info!("  POST /tasks                  - Create a task");
    info!("  GET  /tasks/{{id}}             - Fetch one task");
    info!("  GET  /report                 - Timed report");
    info!("  PUT  /admin/logging/{{level}}  - Change the logging level at runtime");
    info!("");
    info!("Try these commands:");
    info!("  curl -X POST -H 'content-type: application/json' -d '{{\"title\":\"ship\"}}' http://localhost:3000/tasks");
    info!("  curl http://localhost:3000/tasks");
    info!("  curl http://localhost:3000/tasks/7");
    info!("  curl http://localhost:3000/report");
    info!("  curl -X PUT http://localhost:3000/admin/logging/debug");

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    info!("Demo server listening on http://localhost:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
