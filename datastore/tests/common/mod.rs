#![allow(dead_code)]

use async_trait::async_trait;
use datastore::{prelude::*, serde_json::{Map, Value, json}};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::Semaphore;

pub fn p1() -> Value {
    json!({ "author": "John", "age": 30, "id": 5 })
}

pub fn p2() -> Value {
    json!({ "author": "Sally", "age": 31, "id": 6 })
}

pub fn p3() -> Value {
    json!({ "author": "Mike", "age": 32, "id": 7 })
}

pub fn p4() -> Value {
    json!({ "author": "Adam", "age": 33, "id": 8 })
}

pub fn p5() -> Value {
    json!({ "author": "Adam", "age": 33, "id": 9 })
}

pub fn records(values: &[Value]) -> Vec<Record> {
    values
        .iter()
        .map(|value| value.as_object().cloned().unwrap())
        .collect()
}

#[derive(Debug)]
struct MockState {
    gate: Semaphore,
    find_all_calls: AtomicUsize,
    find_calls: AtomicUsize,
    write_calls: AtomicUsize,
    find_all_response: Mutex<DataStoreResult<Value>>,
    find_response: Mutex<DataStoreResult<Value>>,
    last_params: Mutex<Option<Map<String, Value>>>,
    last_write: Mutex<Option<Value>>,
}

/// Scriptable adapter that counts calls. Clones share state.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    state: Arc<MockState>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::with_permits(Semaphore::MAX_PERMITS)
    }

    /// An adapter whose fetches block until [`release`](Self::release) is called.
    pub fn gated() -> Self {
        Self::with_permits(0)
    }

    fn with_permits(permits: usize) -> Self {
        Self {
            state: Arc::new(MockState {
                gate: Semaphore::new(permits),
                find_all_calls: AtomicUsize::new(0),
                find_calls: AtomicUsize::new(0),
                write_calls: AtomicUsize::new(0),
                find_all_response: Mutex::new(Ok(json!([]))),
                find_response: Mutex::new(Ok(Value::Null)),
                last_params: Mutex::new(None),
                last_write: Mutex::new(None),
            }),
        }
    }

    pub fn respond_find_all(&self, response: DataStoreResult<Value>) {
        *self.state.find_all_response.lock().unwrap() = response;
    }

    pub fn respond_find(&self, response: DataStoreResult<Value>) {
        *self.state.find_response.lock().unwrap() = response;
    }

    pub fn release(&self) {
        self.state.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    pub fn find_all_calls(&self) -> usize {
        self.state.find_all_calls.load(Ordering::SeqCst)
    }

    pub fn find_calls(&self) -> usize {
        self.state.find_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.state.write_calls.load(Ordering::SeqCst)
    }

    pub fn last_params(&self) -> Option<Map<String, Value>> {
        self.state.last_params.lock().unwrap().clone()
    }

    pub fn last_write(&self) -> Option<Value> {
        self.state.last_write.lock().unwrap().clone()
    }

    async fn pass_gate(&self) -> DataStoreResult<()> {
        self.state
            .gate
            .acquire()
            .await
            .map(drop)
            .map_err(|err| DataStoreError::Runtime(err.to_string()))
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    async fn find(&self, _resource: &ResourceDefinition, _id: &RecordId, _options: &AdapterOptions) -> DataStoreResult<Value> {
        self.state.find_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await?;
        self.state.find_response.lock().unwrap().clone()
    }

    async fn find_all(
        &self,
        _resource: &ResourceDefinition,
        params: &Map<String, Value>,
        _options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        self.state.find_all_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.last_params.lock().unwrap() = Some(params.clone());
        self.pass_gate().await?;
        self.state.find_all_response.lock().unwrap().clone()
    }

    async fn create(&self, _resource: &ResourceDefinition, attrs: Value, _options: &AdapterOptions) -> DataStoreResult<Value> {
        self.state.write_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.last_write.lock().unwrap() = Some(attrs.clone());
        Ok(attrs)
    }

    async fn update(
        &self,
        resource: &ResourceDefinition,
        id: &RecordId,
        attrs: Value,
        _options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        self.state.write_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.last_write.lock().unwrap() = Some(attrs.clone());

        let mut response = attrs.as_object().cloned().unwrap_or_default();
        response.insert(resource.id_attribute.clone(), id.to_value());
        Ok(Value::Object(response))
    }

    async fn update_all(
        &self,
        _resource: &ResourceDefinition,
        _attrs: Value,
        _params: &Map<String, Value>,
        _options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        Err(DataStoreError::Unsupported("update_all".into()))
    }

    async fn destroy(&self, _resource: &ResourceDefinition, _id: &RecordId, _options: &AdapterOptions) -> DataStoreResult<Value> {
        self.state.write_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    }

    async fn destroy_all(
        &self,
        _resource: &ResourceDefinition,
        _params: &Map<String, Value>,
        _options: &AdapterOptions,
    ) -> DataStoreResult<Value> {
        Err(DataStoreError::Unsupported("destroy_all".into()))
    }
}

/// Lifecycle hooks that count their invocations.
#[derive(Debug, Default)]
pub struct CountingHooks {
    pub serialize: AtomicUsize,
    pub deserialize: AtomicUsize,
    pub before_inject: AtomicUsize,
    pub after_inject: AtomicUsize,
}

impl CountingHooks {
    /// `(before_inject, after_inject, serialize, deserialize)`
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.before_inject.load(Ordering::SeqCst),
            self.after_inject.load(Ordering::SeqCst),
            self.serialize.load(Ordering::SeqCst),
            self.deserialize.load(Ordering::SeqCst),
        )
    }
}

impl LifecycleHooks for CountingHooks {
    fn serialize(&self, _resource: &ResourceDefinition, data: Value) -> Value {
        self.serialize.fetch_add(1, Ordering::SeqCst);
        data
    }

    fn deserialize(&self, _resource: &ResourceDefinition, data: Value) -> Value {
        self.deserialize.fetch_add(1, Ordering::SeqCst);
        data
    }

    fn before_inject(&self, _resource: &ResourceDefinition, _record: &mut Record) {
        self.before_inject.fetch_add(1, Ordering::SeqCst);
    }

    fn after_inject(&self, _resource: &ResourceDefinition, _record: &Record) {
        self.after_inject.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Fixture {
    pub store: DataStore,
    pub adapter: MockAdapter,
    pub hooks: Arc<CountingHooks>,
}

/// A store with a `post` resource backed by `adapter`.
pub async fn setup_with(adapter: MockAdapter) -> Fixture {
    let store = DataStore::with_config(DataStoreConfig::default().with_base_url("http://test.local"));
    let hooks = Arc::new(CountingHooks::default());

    store.register_adapter("mock", adapter.clone(), true).await;
    store
        .define_resource(ResourceDefinition::builder("post").endpoint("posts").hooks(hooks.clone()))
        .await
        .unwrap();

    Fixture { store, adapter, hooks }
}

pub async fn setup() -> Fixture {
    setup_with(MockAdapter::new()).await
}
