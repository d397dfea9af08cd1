use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use log::info;
use serde_json::json;
use sqlx::{MySqlConnection, MySqlPool};

use super::task_models::{
    CreateTaskRequest, MoveTaskRequest, SubtaskSummary, TaskListQuery, TaskListResponse,
    TaskResponse, TaskView, UpdateTaskRequest,
};
use crate::{
    auth::AuthUser,
    config::AppConfig,
    dates::{due_label, due_state, parse_due_date},
    error::ApiError,
    models::{
        activity::NewActivity,
        assignee::{Assignment, TaskAssignee},
        category::Category,
        member::Membership,
        onboarding::{Onboarding, OnboardingStep},
        subscription::{Subscription, Usage},
        task::{NewTask, Task, TaskChanges, TaskFilter},
        user::User,
        workspace::Workspace,
    },
    ordering,
    routes::common_models::DefaultResponse,
    services::email_templates,
    validation,
};

const MAX_TITLE_LEN: usize = 200;

/// Attaches assignees, subtask totals and due-date presentation.
async fn task_views(
    pool: &MySqlPool,
    tasks: Vec<Task>,
    today: NaiveDate,
) -> Result<Vec<TaskView>, ApiError> {
    let ids: Vec<i64> = tasks.iter().map(|t| t.task_id).collect();

    let mut assignees: HashMap<i64, Vec<TaskAssignee>> = HashMap::new();
    for assignee in Assignment::for_tasks(pool, &ids).await? {
        assignees.entry(assignee.task_id).or_default().push(assignee);
    }
    let subtasks: HashMap<i64, SubtaskSummary> = Task::subtask_counts(pool, &ids)
        .await?
        .into_iter()
        .map(|count| {
            (
                count.parent_task_id,
                SubtaskSummary {
                    total: count.total,
                    completed: count.completed,
                },
            )
        })
        .collect();

    Ok(tasks
        .into_iter()
        .map(|task| TaskView {
            priority_color: task.priority.color(),
            due_state: due_state(task.due_date, today, task.is_done()),
            due_label: task
                .due_date
                .filter(|_| !task.is_done())
                .map(|due| due_label(due, today)),
            assignees: assignees.remove(&task.task_id).unwrap_or_default(),
            subtasks: subtasks.get(&task.task_id).copied().unwrap_or_default(),
            task,
        })
        .collect())
}

async fn task_response(
    pool: &MySqlPool,
    workspace_id: i64,
    task_id: i64,
) -> Result<TaskResponse, ApiError> {
    let task = Task::find(pool, workspace_id, task_id)
        .await?
        .ok_or(ApiError::NotFound("Task"))?;
    let mut views = task_views(pool, vec![task], Utc::now().date_naive()).await?;
    let task = views.pop().ok_or(ApiError::NotFound("Task"))?;
    Ok(TaskResponse {
        success: true,
        task,
    })
}

async fn require_category(
    conn: &mut MySqlConnection,
    workspace_id: i64,
    category_id: Option<i64>,
) -> Result<(), ApiError> {
    if let Some(category_id) = category_id {
        Category::find(&mut *conn, workspace_id, category_id)
            .await?
            .ok_or(ApiError::NotFound("Category"))?;
    }
    Ok(())
}

async fn require_task(
    conn: &mut MySqlConnection,
    workspace_id: i64,
    task_id: i64,
) -> Result<Task, ApiError> {
    Task::find(&mut *conn, workspace_id, task_id)
        .await?
        .ok_or(ApiError::NotFound("Task"))
}

/// Shared by top-level task and subtask creation.
async fn insert_task(
    pool: &MySqlPool,
    user: &AuthUser,
    workspace_id: i64,
    parent: Option<&Task>,
    req: CreateTaskRequest,
) -> Result<i64, ApiError> {
    let title = validation::name(&req.title, "Title", MAX_TITLE_LEN)?;
    let description = validation::description(req.description.as_deref())?;
    let due_date = req.due_date.as_deref().map(parse_due_date).transpose()?;
    let category_id = match parent {
        Some(parent) => parent.category_id,
        None => req.category_id,
    };

    let mut tx = pool.begin().await?;
    require_category(&mut tx, workspace_id, category_id).await?;

    let plan = Subscription::lock_plan(&mut tx, workspace_id).await?.details();
    let usage = Usage::load(&mut tx, workspace_id, Utc::now()).await?;
    if !plan.allows_another_task(&usage) {
        return Err(ApiError::PlanLimit(format!(
            "The {} plan allows {} tasks per workspace",
            plan.name,
            plan.max_tasks.unwrap_or_default()
        )));
    }

    let parent_task_id = parent.map(|p| p.task_id);
    let task_id = Task::create(
        &mut tx,
        NewTask {
            workspace_id,
            category_id,
            parent_task_id,
            title: &title,
            description: description.as_deref(),
            status: req.status,
            priority: req.priority,
            due_date,
            created_by: user.user_id,
        },
    )
    .await?;
    let action = if parent.is_some() { "subtask.created" } else { "task.created" };
    NewActivity::new(workspace_id, user.user_id, action)
        .entity(task_id)
        .details(json!({ "title": title, "parent_task_id": parent_task_id }))
        .record(&mut *tx)
        .await?;
    Onboarding::complete(&mut *tx, user.user_id, OnboardingStep::CreateTask).await?;
    tx.commit().await?;

    info!("Task {} created in workspace {}", task_id, workspace_id);
    Ok(task_id)
}

pub async fn list_tasks(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
    query: web::Query<TaskListQuery>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let query = query.into_inner();
    let filter = TaskFilter {
        category_id: query.category_id,
        status: query.status,
        assignee_id: query.assignee_id,
        parent_id: query.parent_id,
        search: query.q.map(|q| q.trim().to_string()),
    };
    let tasks = Task::list(pool.get_ref(), workspace_id, &filter).await?;
    let tasks = task_views(pool.get_ref(), tasks, Utc::now().date_naive()).await?;
    Ok(HttpResponse::Ok().json(TaskListResponse {
        success: true,
        tasks,
    }))
}

pub async fn create_task(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<i64>,
    req: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let workspace_id = path.into_inner();
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let task_id = insert_task(pool.get_ref(), &user, workspace_id, None, req.into_inner()).await?;
    let response = task_response(pool.get_ref(), workspace_id, task_id).await?;
    Ok(HttpResponse::Created().json(response))
}

pub async fn get_task(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, task_id) = path.into_inner();
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;
    let response = task_response(pool.get_ref(), workspace_id, task_id).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn update_task(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64)>,
    req: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, task_id) = path.into_inner();
    let req = req.into_inner();
    let changes = TaskChanges {
        title: req
            .title
            .as_deref()
            .map(|title| validation::name(title, "Title", MAX_TITLE_LEN))
            .transpose()?,
        description: req
            .description
            .map(|d| validation::description(d.as_deref()))
            .transpose()?,
        status: req.status,
        priority: req.priority,
        due_date: req
            .due_date
            .map(|d| d.as_deref().map(parse_due_date).transpose())
            .transpose()?,
        category_id: req.category_id,
    };
    if changes.is_empty() {
        return Err(ApiError::bad_request("Nothing to update"));
    }
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let mut tx = pool.begin().await?;
    let mut task = require_task(&mut tx, workspace_id, task_id).await?;
    if let Some(category_id) = changes.category_id {
        if task.parent_task_id.is_some() && category_id != task.category_id {
            return Err(ApiError::conflict("Subtasks stay in their parent's category"));
        }
        require_category(&mut tx, workspace_id, category_id).await?;
    }

    let previous_category = task.category_id;
    let changed = changes.apply(&mut task, Utc::now());
    if !changed.is_empty() {
        if changed.contains(&"category_id") {
            let source =
                Task::column_ids_for_update(&mut tx, workspace_id, previous_category).await?;
            let target =
                Task::column_ids_for_update(&mut tx, workspace_id, task.category_id).await?;
            let (source_after, target_after) =
                ordering::plan_move(&source, Some(target.as_slice()), task_id, target.len());
            Task::save(&mut *tx, &task).await?;
            Task::set_column(&mut tx, previous_category, &source_after).await?;
            if let Some(target_after) = target_after {
                Task::set_column(&mut tx, task.category_id, &target_after).await?;
            }
            Task::move_subtasks(&mut *tx, task_id, task.category_id).await?;
        } else {
            Task::save(&mut *tx, &task).await?;
        }
        NewActivity::new(workspace_id, user.user_id, "task.updated")
            .entity(task_id)
            .details(json!({ "fields": changed, "status": task.status }))
            .record(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let response = task_response(pool.get_ref(), workspace_id, task_id).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Subtasks are removed with their parent.
pub async fn delete_task(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, task_id) = path.into_inner();
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let mut tx = pool.begin().await?;
    let task = require_task(&mut tx, workspace_id, task_id).await?;
    Task::delete(&mut *tx, task_id).await?;
    NewActivity::new(workspace_id, user.user_id, "task.deleted")
        .entity(task_id)
        .details(json!({ "title": task.title }))
        .record(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Task {} deleted from workspace {}", task_id, workspace_id);
    Ok(HttpResponse::Ok().json(DefaultResponse::ok("Task deleted")))
}

/// Drag-and-drop: the task leaves its column and is inserted into the target
/// column at `index`. Both columns are renumbered from 0.
pub async fn move_task(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64)>,
    req: web::Json<MoveTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, task_id) = path.into_inner();
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let mut tx = pool.begin().await?;
    let task = require_task(&mut tx, workspace_id, task_id).await?;
    if task.parent_task_id.is_some() {
        return Err(ApiError::conflict("Subtasks move with their parent"));
    }
    require_category(&mut tx, workspace_id, req.category_id).await?;

    let source = Task::column_ids_for_update(&mut tx, workspace_id, task.category_id).await?;
    let target = if req.category_id == task.category_id {
        None
    } else {
        Some(Task::column_ids_for_update(&mut tx, workspace_id, req.category_id).await?)
    };
    let (source_after, target_after) =
        ordering::plan_move(&source, target.as_deref(), task_id, req.index);
    Task::set_column(&mut tx, task.category_id, &source_after).await?;
    if let Some(target_after) = target_after {
        Task::set_column(&mut tx, req.category_id, &target_after).await?;
        Task::move_subtasks(&mut *tx, task_id, req.category_id).await?;
    }
    NewActivity::new(workspace_id, user.user_id, "task.moved")
        .entity(task_id)
        .details(json!({
            "from_category_id": task.category_id,
            "to_category_id": req.category_id,
            "index": req.index,
        }))
        .record(&mut *tx)
        .await?;
    tx.commit().await?;

    let response = task_response(pool.get_ref(), workspace_id, task_id).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn list_subtasks(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, task_id) = path.into_inner();
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;
    Task::find(pool.get_ref(), workspace_id, task_id)
        .await?
        .ok_or(ApiError::NotFound("Task"))?;

    let filter = TaskFilter {
        parent_id: Some(task_id),
        ..TaskFilter::default()
    };
    let tasks = Task::list(pool.get_ref(), workspace_id, &filter).await?;
    let tasks = task_views(pool.get_ref(), tasks, Utc::now().date_naive()).await?;
    Ok(HttpResponse::Ok().json(TaskListResponse {
        success: true,
        tasks,
    }))
}

pub async fn create_subtask(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64)>,
    req: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, parent_id) = path.into_inner();
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let parent = Task::find(pool.get_ref(), workspace_id, parent_id)
        .await?
        .ok_or(ApiError::NotFound("Task"))?;
    if parent.parent_task_id.is_some() {
        return Err(ApiError::conflict("Subtasks cannot have subtasks"));
    }

    let task_id =
        insert_task(pool.get_ref(), &user, workspace_id, Some(&parent), req.into_inner()).await?;
    let response = task_response(pool.get_ref(), workspace_id, task_id).await?;
    Ok(HttpResponse::Created().json(response))
}

/// Idempotent. Assigning someone else notifies them by email.
pub async fn add_assignee(
    pool: web::Data<MySqlPool>,
    config: web::Data<AppConfig>,
    user: AuthUser,
    path: web::Path<(i64, i64, i64)>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, task_id, assignee_id) = path.into_inner();
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;
    if Membership::role_of(pool.get_ref(), workspace_id, assignee_id)
        .await?
        .is_none()
    {
        return Err(ApiError::bad_request("Assignee must be a member of the workspace"));
    }

    let mut tx = pool.begin().await?;
    let task = require_task(&mut tx, workspace_id, task_id).await?;
    let added = Assignment::add(&mut *tx, task_id, assignee_id).await?;
    if added {
        NewActivity::new(workspace_id, user.user_id, "task.assigned")
            .entity(task_id)
            .details(json!({ "user_id": assignee_id }))
            .record(&mut *tx)
            .await?;

        if assignee_id != user.user_id {
            let assigner = User::find(pool.get_ref(), user.user_id)
                .await?
                .ok_or(ApiError::Unauthorized)?;
            let assignee = User::find(pool.get_ref(), assignee_id)
                .await?
                .ok_or(ApiError::NotFound("User"))?;
            let workspace = Workspace::find(&mut *tx, workspace_id)
                .await?
                .ok_or(ApiError::NotFound("Workspace"))?;
            email_templates::task_assigned(
                &assignee.user_email,
                assigner.shown_name(),
                &task.title,
                &workspace.workspace_name,
                &config.task_url(workspace_id, task_id),
            )
            .enqueue(&mut *tx)
            .await?;
        }
    }
    tx.commit().await?;

    let response = task_response(pool.get_ref(), workspace_id, task_id).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn remove_assignee(
    pool: web::Data<MySqlPool>,
    user: AuthUser,
    path: web::Path<(i64, i64, i64)>,
) -> Result<HttpResponse, ApiError> {
    let (workspace_id, task_id, assignee_id) = path.into_inner();
    Membership::require(pool.get_ref(), workspace_id, user.user_id).await?;

    let mut tx = pool.begin().await?;
    require_task(&mut tx, workspace_id, task_id).await?;
    if Assignment::remove(&mut *tx, task_id, assignee_id).await? {
        NewActivity::new(workspace_id, user.user_id, "task.unassigned")
            .entity(task_id)
            .details(json!({ "user_id": assignee_id }))
            .record(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let response = task_response(pool.get_ref(), workspace_id, task_id).await?;
    Ok(HttpResponse::Ok().json(response))
}
