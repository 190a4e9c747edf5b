//! Scripted in-memory persistence double shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;

use curator_core::{
    EntityId, FieldSnapshot, OrderAssignment, OrderableEntity, PersistError, Persistence, ScopeId,
};

#[derive(Default)]
pub struct ScriptedPersistence {
    scopes: Mutex<HashMap<ScopeId, Vec<OrderableEntity>>>,
    document: Mutex<Option<Value>>,
    load_error: Mutex<Option<PersistError>>,
    save_error: Mutex<Option<PersistError>>,
    /// Popped per call; an empty script means success.
    reorder_script: Mutex<VecDeque<Result<(), PersistError>>>,
    update_script: Mutex<VecDeque<Result<(), PersistError>>>,
    /// When set, every `reorder` and `update` waits for one permit after
    /// being recorded.
    gate: Option<Arc<Semaphore>>,
    pub reorders: Mutex<Vec<(ScopeId, Vec<OrderAssignment>)>>,
    pub updates: Mutex<Vec<(EntityId, FieldSnapshot)>>,
    pub saved: Mutex<Vec<Value>>,
}

impl ScriptedPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// A double whose `reorder`/`update` calls block until the returned
    /// semaphore gets permits.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let double = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (double, gate)
    }

    pub fn with_scope(self, scope: &str, entities: Vec<OrderableEntity>) -> Self {
        self.scopes
            .lock()
            .unwrap()
            .insert(ScopeId::from(scope), entities);
        self
    }

    pub fn with_document(self, document: Value) -> Self {
        *self.document.lock().unwrap() = Some(document);
        self
    }

    pub fn with_load_error(self, error: PersistError) -> Self {
        *self.load_error.lock().unwrap() = Some(error);
        self
    }

    pub fn fail_saves(&self, error: PersistError) {
        *self.save_error.lock().unwrap() = Some(error);
    }

    pub fn script_reorder(&self, result: Result<(), PersistError>) {
        self.reorder_script.lock().unwrap().push_back(result);
    }

    pub fn script_update(&self, result: Result<(), PersistError>) {
        self.update_script.lock().unwrap().push_back(result);
    }

    pub fn reorder_count(&self) -> usize {
        self.reorders.lock().unwrap().len()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn stored_document(&self) -> Option<Value> {
        self.document.lock().unwrap().clone()
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
    }
}

#[async_trait]
impl Persistence for ScriptedPersistence {
    async fn fetch(&self, scope: &ScopeId) -> Result<Vec<OrderableEntity>, PersistError> {
        self.scopes
            .lock()
            .unwrap()
            .get(scope)
            .cloned()
            .ok_or_else(|| PersistError::Rejected(format!("scope '{scope}' not found")))
    }

    async fn reorder(
        &self,
        scope: &ScopeId,
        assignments: &[OrderAssignment],
    ) -> Result<(), PersistError> {
        self.reorders
            .lock()
            .unwrap()
            .push((scope.clone(), assignments.to_vec()));
        self.wait_for_gate().await;
        self.reorder_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn update(
        &self,
        entity: &EntityId,
        fields: &FieldSnapshot,
    ) -> Result<Value, PersistError> {
        self.updates
            .lock()
            .unwrap()
            .push((entity.clone(), fields.clone()));
        self.wait_for_gate().await;
        let scripted = self.update_script.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(()))?;
        Ok(Value::Object(fields.clone()))
    }

    async fn load_document(&self) -> Result<Option<Value>, PersistError> {
        if let Some(err) = self.load_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.document.lock().unwrap().clone())
    }

    async fn save_document(&self, document: &Value) -> Result<(), PersistError> {
        if let Some(err) = self.save_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.saved.lock().unwrap().push(document.clone());
        *self.document.lock().unwrap() = Some(document.clone());
        Ok(())
    }
}

/// `count` entities `A`, `B`, ... under `scope`, ordered 1..=count.
pub fn lettered(scope: &str, count: usize) -> Vec<OrderableEntity> {
    (0..count)
        .map(|i| {
            let id = char::from(b'A' + i as u8).to_string();
            OrderableEntity::new(id.as_str(), scope, i as u32 + 1)
        })
        .collect()
}

pub fn ids(entities: &[OrderableEntity]) -> Vec<String> {
    entities.iter().map(|e| e.id.to_string()).collect()
}

pub fn orders(entities: &[OrderableEntity]) -> Vec<u32> {
    entities.iter().map(|e| e.order).collect()
}

/// Let spawned tasks run until `done` holds.
pub async fn yield_until(mut done: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
