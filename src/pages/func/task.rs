use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use super::{actor, render};
use crate::{
    database::{fetch, Ref, Store},
    error::CrmResult,
    model::{Customer, Deal, Lead, NewTask, Related, Task, TaskPatch},
    pages::body,
    workflow::records,
    AppState, Response, ResponseResult,
};

const REFS: &[Ref] = &[Ref::ASSIGNED_TO, Ref::CREATED_BY];

pub fn task_router() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
}

/// 关联对象的显示名称，对象已删除时为 None
fn related_name(store: &dyn Store, related: &Related) -> CrmResult<Option<String>> {
    Ok(match related {
        Related::Lead(id) => fetch::<Lead>(store, id)?.map(|lead| lead.name),
        Related::Customer(id) => fetch::<Customer>(store, id)?.map(|customer| customer.name),
        Related::Deal(id) => fetch::<Deal>(store, id)?.map(|deal| deal.title),
    })
}

fn render_tasks(state: &AppState, tasks: &[Task]) -> Result<Vec<Value>, Response> {
    let mut docs = render(state, tasks, REFS)?;
    for (doc, task) in docs.iter_mut().zip(tasks) {
        let name = related_name(state.store.as_ref(), &task.related)?;
        if let Value::Object(map) = doc {
            map.insert("relatedName".into(), json!(name));
        }
    }
    Ok(docs)
}

async fn list_tasks(State(state): State<AppState>, headers: HeaderMap) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let mut tasks = records::list::<Task>(state.store.as_ref(), &actor)?;
    records::sort_desc(&mut tasks, |t| t.due_date);
    Ok(Response::ok(json!(render_tasks(&state, &tasks)?)))
}

async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let task = records::get::<Task>(state.store.as_ref(), &actor, &id)?;
    let mut docs = render_tasks(&state, std::slice::from_ref(&task))?;
    Ok(Response::ok(docs.pop().unwrap_or(Value::Null)))
}

async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let draft: NewTask = body(payload)?;
    let task = records::create(state.store.as_ref(), &actor, draft)?;
    Ok(Response::created(json!(task)))
}

async fn update_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let patch: TaskPatch = body(payload)?;
    let task = records::update(state.store.as_ref(), &actor, &id, patch)?;
    Ok(Response::ok(json!(task)))
}

async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    records::remove::<Task>(state.store.as_ref(), &actor, &id)?;
    Ok(Response::message("Task deleted"))
}
