//! Reference case service.
//!
//! Cases live in an in-memory store shared through an explicit `Arc` handle.
//! Attach re-keys a case under a new guid; source removal and target
//! insertion happen under one lock so concurrent attaches of the same source
//! cannot both succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fusion_core::{
    AttachContext, CreateContext, EnumerateContext, HookError, HookResult,
    ResourceHooks, RetrieveContext, UpdateContext,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

pub const RESOURCE_NAME: &str = "case";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub guid: String,
    pub managed: bool,
    pub tsid: Option<String>,
    pub name: String,
    pub description: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Body accepted by `POST /case`.
#[derive(Debug, Deserialize)]
pub struct NewCase {
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub tsid: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Body accepted by `PUT /case/{id}`; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct CaseUpdate {
    pub managed: Option<bool>,
    pub tsid: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Case {
    fn apply(&mut self, update: CaseUpdate) {
        if let Some(managed) = update.managed {
            self.managed = managed;
        }
        if let Some(tsid) = update.tsid {
            self.tsid = Some(tsid);
        }
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        self.updated = Utc::now();
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCaseStore {
    cases: Arc<Mutex<HashMap<String, Case>>>,
}

impl InMemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.cases.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn insert(&self, new: NewCase) -> Result<Case, HookError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(HookError::BadRequest("case name must not be empty".into()));
        }
        let guid = match new.guid {
            Some(guid) if !guid.trim().is_empty() => guid.trim().to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        let now = Utc::now();
        let case = Case {
            guid: guid.clone(),
            managed: new.managed,
            tsid: new.tsid,
            name: name.to_string(),
            description: new.description,
            created: now,
            updated: now,
        };

        let mut cases = self.cases.lock().await;
        if cases.contains_key(&guid) {
            return Err(HookError::Conflict(format!("case {guid} already exists")));
        }
        cases.insert(guid, case.clone());
        Ok(case)
    }

    pub async fn get(&self, guid: &str) -> Option<Case> {
        self.cases.lock().await.get(guid).cloned()
    }

    pub async fn update(&self, guid: &str, update: CaseUpdate) -> Result<Option<Case>, HookError> {
        if matches!(update.name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(HookError::BadRequest("case name must not be empty".into()));
        }
        let mut cases = self.cases.lock().await;
        Ok(cases.get_mut(guid).map(|case| {
            case.apply(update);
            case.clone()
        }))
    }

    pub async fn list(&self) -> Vec<Case> {
        let mut cases: Vec<Case> = self.cases.lock().await.values().cloned().collect();
        cases.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.guid.cmp(&b.guid)));
        cases
    }

    /// Move the case at `guid` to `next_guid`.
    ///
    /// `Ok(None)` when the source is gone (including a lost race with a
    /// concurrent attach); conflict when the target guid is taken. A case
    /// cannot be attached to its own guid.
    pub async fn attach(&self, guid: &str, next_guid: &str) -> Result<Option<Case>, HookError> {
        let next_guid = next_guid.trim();
        if next_guid.is_empty() {
            return Err(HookError::BadRequest("target guid must not be empty".into()));
        }
        if next_guid == guid {
            return Err(HookError::BadRequest("target guid must differ from the source".into()));
        }

        let mut cases = self.cases.lock().await;
        if !cases.contains_key(guid) {
            return Ok(None);
        }
        if cases.contains_key(next_guid) {
            return Err(HookError::Conflict(format!("case {next_guid} already exists")));
        }
        let Some(mut case) = cases.remove(guid) else {
            return Ok(None);
        };
        case.guid = next_guid.to_string();
        case.updated = Utc::now();
        cases.insert(case.guid.clone(), case.clone());
        Ok(Some(case))
    }
}

/// Hooks exposing an [`InMemoryCaseStore`] as the `case` resource.
#[derive(Debug, Clone)]
pub struct CaseHooks {
    store: InMemoryCaseStore,
}

impl CaseHooks {
    pub fn new(store: InMemoryCaseStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &InMemoryCaseStore {
        &self.store
    }
}

#[async_trait]
impl ResourceHooks for CaseHooks {
    type Resource = Case;

    async fn create(&self, ctx: CreateContext) -> HookResult<Case> {
        let new: NewCase = ctx.parse()?;
        let case = self.store.insert(new).await?;
        debug!(guid = %case.guid, subject = %ctx.identity, "case created");
        Ok(Some(case))
    }

    async fn retrieve(&self, ctx: RetrieveContext) -> HookResult<Case> {
        Ok(self.store.get(&ctx.resource_id).await)
    }

    async fn update(&self, ctx: UpdateContext) -> HookResult<Case> {
        let update: CaseUpdate = ctx.parse()?;
        self.store.update(&ctx.resource_id, update).await
    }

    async fn attach(&self, ctx: AttachContext) -> HookResult<Case> {
        self.store.attach(&ctx.resource_id, &ctx.next_id).await
    }

    async fn enumerate(&self, _ctx: EnumerateContext) -> HookResult<Vec<Case>> {
        Ok(Some(self.store.list().await))
    }
}
