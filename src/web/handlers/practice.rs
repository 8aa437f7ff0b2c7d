use actix_web::{web, HttpResponse, Responder};
use log::error;
use serde_json::{json, Value};

use crate::core::Result;
use crate::services::sandbox::{ExecOutcome, SqlSandbox, TableSchema, EXAMPLES, INITIAL_QUERY};
use crate::web::handlers::blocking;
use crate::web::handlers::pages::{base_context, render};
use crate::web::models::{ErrorResponse, PracticeQuery, RunRequest};
use crate::web::server::AppState;
use crate::web::session::Session;

/// Run `f` against the session's sandbox on the blocking pool
async fn on_sandbox<T, F>(data: &web::Data<AppState>, session: &Session, f: F) -> Result<T>
where
    F: FnOnce(&mut SqlSandbox) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let data = data.clone();
    let id = session.id().to_string();
    blocking(move || data.sandboxes.with_sandbox(&id, f)).await
}

fn practice_context(
    data: &AppState,
    session: &Session,
    sql: &str,
    schemas: &[TableSchema],
    outcome: Option<&ExecOutcome>,
) -> Value {
    let store = data.client(session);
    let tables: Vec<Value> = outcome
        .map(|o| {
            o.results
                .iter()
                .map(|set| {
                    let rows: Vec<Vec<String>> = set
                        .values
                        .iter()
                        .map(|row| row.iter().map(ToString::to_string).collect())
                        .collect();
                    json!({ "columns": set.columns, "rows": rows, "truncated": set.truncated })
                })
                .collect()
        })
        .unwrap_or_default();

    let mut context = base_context(data, &store, "Pratique SQL");
    context["sql"] = json!(sql);
    context["schemas"] = json!(schemas);
    context["examples"] = json!(EXAMPLES);
    context["outcome"] = json!(outcome);
    context["tables"] = json!(tables);
    context["max_rows"] = json!(data.config.sandbox.max_rows);
    context
}

/// Render the editor, keeping the pane usable when the schema cannot be read
async fn practice_response(
    data: &web::Data<AppState>,
    session: &Session,
    sql: &str,
    outcome: Option<ExecOutcome>,
) -> HttpResponse {
    let schemas = match on_sandbox(data, session, |sb| sb.schemas()).await {
        Ok(schemas) => schemas,
        Err(e) => {
            error!("Failed to read sandbox schema: {}", e);
            Vec::new()
        }
    };
    render("practice", &practice_context(data, session, sql, &schemas, outcome.as_ref()))
}

fn failed(e: crate::core::DataSphereError) -> ExecOutcome {
    error!("Sandbox failure: {}", e);
    ExecOutcome {
        error: Some(e.message().to_string()),
        ..Default::default()
    }
}

/// Serve the SQL practice page
pub async fn practice_page(
    data: web::Data<AppState>,
    session: Session,
    query: web::Query<PracticeQuery>,
) -> impl Responder {
    let sql = query
        .example
        .and_then(|idx| EXAMPLES.get(idx).map(|example| example.query))
        .unwrap_or(INITIAL_QUERY);
    practice_response(&data, &session, sql, None).await
}

/// Run the editor content
pub async fn run_from_page(
    data: web::Data<AppState>,
    session: Session,
    form: web::Form<RunRequest>,
) -> impl Responder {
    let sql = form.into_inner().sql;
    let script = sql.clone();
    let outcome = on_sandbox(&data, &session, move |sb| Ok(sb.execute(&script)))
        .await
        .unwrap_or_else(failed);
    practice_response(&data, &session, &sql, Some(outcome)).await
}

/// Drop everything and reseed the session's database
pub async fn reset_from_page(data: web::Data<AppState>, session: Session) -> impl Responder {
    let outcome = on_sandbox(&data, &session, |sb| sb.reset())
        .await
        .unwrap_or_else(failed);
    practice_response(&data, &session, INITIAL_QUERY, Some(outcome)).await
}

/// Tables and columns of the session's database
pub async fn get_schema(data: web::Data<AppState>, session: Session) -> impl Responder {
    match on_sandbox(&data, &session, |sb| sb.schemas()).await {
        Ok(schemas) => HttpResponse::Ok().json(schemas),
        Err(e) => {
            error!("Failed to read sandbox schema: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::from_error(&e))
        }
    }
}

pub async fn get_examples() -> impl Responder {
    HttpResponse::Ok().json(EXAMPLES)
}

/// Execute a script; SQL errors are reported inside the outcome
pub async fn run_query(
    data: web::Data<AppState>,
    session: Session,
    request: web::Json<RunRequest>,
) -> impl Responder {
    let sql = request.into_inner().sql;
    match on_sandbox(&data, &session, move |sb| Ok(sb.execute(&sql))).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => {
            error!("Sandbox failure: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::from_error(&e))
        }
    }
}

pub async fn reset_database(data: web::Data<AppState>, session: Session) -> impl Responder {
    match on_sandbox(&data, &session, |sb| sb.reset()).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => {
            error!("Sandbox reset failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::from_error(&e))
        }
    }
}
