//! Generic REST surface over a [`ResourceHooks`] implementation.
//!
//! Every registered resource gets the same five routes:
//!
//! | Method | Path                          | Hook        | Success |
//! |--------|-------------------------------|-------------|---------|
//! | POST   | `/{r}`                        | `create`    | 201     |
//! | GET    | `/{r}`                        | `enumerate` | 200     |
//! | GET    | `/{r}/{id}`                   | `retrieve`  | 200     |
//! | PUT    | `/{r}/{id}`                   | `update`    | 200     |
//! | POST   | `/{r}/{id}/attach/{next_id}`  | `attach`    | 200     |
//!
//! Each request passes the gate (401/403) before its body is parsed (400),
//! and a hook answering `None` becomes 404.

pub mod info;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use fusion_core::{
    ApiResponse, AttachContext, AuthorizeHook, CreateContext, EnumerateContext,
    Identity, Operation, RequestMetadata, ResourceConfig, ResourceHooks,
    RetrieveContext, UpdateContext,
};
use serde::Serialize;
use serde_json::Value;
use std::{fmt, sync::Arc};
use tracing::{debug, info};

use crate::auth::middleware::admit;
use crate::infra::app_state::AppState;
use crate::infra::errors::{AppError, AppResult};

/// Registration of one resource: its name, access policy and hooks.
pub struct ResourceApi<H> {
    name: String,
    config: ResourceConfig,
    authorize: Vec<AuthorizeHook>,
    hooks: Arc<H>,
}

impl<H> fmt::Debug for ResourceApi<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceApi")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("authorize_hooks", &self.authorize.len())
            .finish()
    }
}

impl<H: ResourceHooks> ResourceApi<H> {
    pub fn new(name: impl Into<String>, hooks: Arc<H>) -> Self {
        Self {
            name: name.into(),
            config: ResourceConfig::default(),
            authorize: Vec::new(),
            hooks,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_config(mut self, config: ResourceConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a resource-level hook, AND-ed with the global ones.
    pub fn with_authorize_hook(mut self, hook: AuthorizeHook) -> Self {
        self.authorize.push(hook);
        self
    }

    pub fn into_router(self, state: AppState) -> Router {
        let base_path = format!("/{}", self.name);
        let item_path = format!("{base_path}/{{id}}");
        let attach_path = format!("{item_path}/attach/{{next_id}}");

        let resource_state = ResourceState {
            app: state,
            descriptor: Arc::new(Descriptor {
                name: self.name,
                config: self.config,
                authorize: self.authorize,
            }),
            hooks: self.hooks,
        };

        Router::new()
            .route(&base_path, get(enumerate::<H>).post(create::<H>))
            .route(&item_path, get(retrieve::<H>).put(update::<H>))
            .route(&attach_path, post(attach::<H>))
            .with_state(resource_state)
    }
}

struct Descriptor {
    name: String,
    config: ResourceConfig,
    authorize: Vec<AuthorizeHook>,
}

struct ResourceState<H> {
    app: AppState,
    descriptor: Arc<Descriptor>,
    hooks: Arc<H>,
}

impl<H> Clone for ResourceState<H> {
    fn clone(&self) -> Self {
        Self {
            app: self.app.clone(),
            descriptor: Arc::clone(&self.descriptor),
            hooks: Arc::clone(&self.hooks),
        }
    }
}

impl<H> ResourceState<H> {
    fn meta(
        &self,
        method: &Method,
        uri: &Uri,
        operation: Operation,
        resource_id: Option<&str>,
    ) -> RequestMetadata {
        let meta = RequestMetadata::new(
            method.as_str(),
            uri.path(),
            self.descriptor.name.as_str(),
            operation,
        );
        match resource_id {
            Some(id) => meta.with_resource_id(id),
            None => meta,
        }
    }

    async fn admit(&self, headers: &HeaderMap, meta: &RequestMetadata) -> AppResult<Identity> {
        admit(
            &self.app,
            headers,
            &self.descriptor.config,
            meta,
            &self.descriptor.authorize,
        )
        .await
    }
}

fn parse_body(body: &Bytes) -> AppResult<Value> {
    if body.is_empty() {
        return Err(AppError::bad_request("Request body must be JSON"));
    }
    serde_json::from_slice(body)
        .map_err(|err| AppError::bad_request(format!("Malformed JSON body: {err}")))
}

fn respond<T: Serialize>(
    status: StatusCode,
    resource: Option<T>,
    meta: &RequestMetadata,
) -> AppResult<Response> {
    match resource {
        Some(resource) => Ok((status, Json(ApiResponse::success(resource))).into_response()),
        None => {
            debug!(resource = %meta.resource, operation = %meta.operation, id = ?meta.resource_id, "hook returned nothing");
            Err(AppError::not_found(format!("{} not found", meta.resource)))
        }
    }
}

async fn create<H: ResourceHooks>(
    State(rs): State<ResourceState<H>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let meta = rs.meta(&method, &uri, Operation::Create, None);
    let identity = rs.admit(&headers, &meta).await?;
    let body = parse_body(&body)?;

    let subject = identity.subject.clone();
    let created = rs.hooks.create(CreateContext { identity, body }).await?;
    if created.is_some() {
        info!(resource = %meta.resource, subject = %subject, "resource created");
    }
    respond(StatusCode::CREATED, created, &meta)
}

async fn enumerate<H: ResourceHooks>(
    State(rs): State<ResourceState<H>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> AppResult<Response> {
    let meta = rs.meta(&method, &uri, Operation::Enumerate, None);
    let identity = rs.admit(&headers, &meta).await?;

    let listed = rs.hooks.enumerate(EnumerateContext { identity }).await?;
    respond(StatusCode::OK, listed, &meta)
}

async fn retrieve<H: ResourceHooks>(
    State(rs): State<ResourceState<H>>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> AppResult<Response> {
    let meta = rs.meta(&method, &uri, Operation::Retrieve, Some(&id));
    let identity = rs.admit(&headers, &meta).await?;

    let found = rs
        .hooks
        .retrieve(RetrieveContext {
            identity,
            resource_id: id,
        })
        .await?;
    respond(StatusCode::OK, found, &meta)
}

async fn update<H: ResourceHooks>(
    State(rs): State<ResourceState<H>>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let meta = rs.meta(&method, &uri, Operation::Update, Some(&id));
    let identity = rs.admit(&headers, &meta).await?;
    let body = parse_body(&body)?;

    let updated = rs
        .hooks
        .update(UpdateContext {
            identity,
            resource_id: id,
            body,
        })
        .await?;
    respond(StatusCode::OK, updated, &meta)
}

async fn attach<H: ResourceHooks>(
    State(rs): State<ResourceState<H>>,
    Path((id, next_id)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> AppResult<Response> {
    let meta = rs.meta(&method, &uri, Operation::Attach, Some(&id));
    let identity = rs.admit(&headers, &meta).await?;

    let attached = rs
        .hooks
        .attach(AttachContext {
            identity,
            resource_id: id.clone(),
            next_id: next_id.clone(),
        })
        .await?;
    if attached.is_some() {
        info!(resource = %meta.resource, from = %id, to = %next_id, "resource attached");
    }
    respond(StatusCode::OK, attached, &meta)
}
