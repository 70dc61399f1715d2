//! Effect executor.
//!
//! The evaluator only describes effects. This executor runs the queued
//! descriptions: it schedules the `async/*` combinators on tokio, applies
//! state writes to an in-memory copy of the context, keeps a small in-memory
//! entity store for `persist`/`fetch`, and collects client-side effects
//! (`emit`, `navigate`, `notify`, ...) for the caller to forward.

use orbital_runtime::value::{get_path, number, set_path, to_number, to_text};
use orbital_runtime::{EffectError, EffectRequest};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};

type EffectFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, EffectError>> + Send + 'a>>;

/// Default first backoff delay for `async/retry`.
const RETRY_BACKOFF_MS: u64 = 100;
const RETRY_FACTOR: f64 = 2.0;

/// Effects that only the client can perform.
const CLIENT_EFFECTS: &[&str] = &["emit", "navigate", "notify", "render-ui", "spawn", "despawn"];

/// Everything an execution produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// One result per top-level effect, in order.
    pub results: Vec<Value>,
    /// Client effects as `[op, ...args]` descriptions, in execution order.
    pub client_effects: Vec<Value>,
    /// Binding roots after every `set`/`increment`/`decrement`.
    pub state: Value,
}

#[derive(Default)]
struct Store {
    entities: BTreeMap<String, Vec<Value>>,
    next_id: u64,
}

pub struct Executor {
    state: Mutex<Value>,
    client_effects: Mutex<Vec<Value>>,
    store: Mutex<Store>,
    throttled: Mutex<HashMap<String, Instant>>,
    debounced: Mutex<HashMap<String, u64>>,
}

impl Executor {
    /// Starts from the evaluation context's roots, as a JSON object.
    pub fn new(state: Value) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            client_effects: Mutex::new(Vec::new()),
            store: Mutex::new(Store::default()),
            throttled: Mutex::new(HashMap::new()),
            debounced: Mutex::new(HashMap::new()),
        })
    }

    /// Runs requests one after another. The first failure stops the run.
    pub async fn run(self: &Arc<Self>, requests: Vec<EffectRequest>) -> Result<Outcome, EffectError> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.execute(request).await?);
        }
        Ok(Outcome {
            results,
            client_effects: self.client_effects.lock().await.clone(),
            state: self.state.lock().await.clone(),
        })
    }

    pub fn execute(self: &Arc<Self>, request: EffectRequest) -> EffectFuture<'_> {
        Box::pin(async move {
            tracing::debug!(operator = %request.operator, "executing effect");
            match request.operator.as_str() {
                "set" => self.write(&request, |_, value| Ok(value.clone())).await,
                "increment" => self.write(&request, |old, by| add(old, by, 1.0)).await,
                "decrement" => self.write(&request, |old, by| add(old, by, -1.0)).await,
                "persist" => self.persist(&request).await,
                "fetch" => self.fetch(&request).await,
                "call-service" => Ok(call_service(&request)),
                "log" => {
                    tracing::info!(target: "orbital::effects", text = %to_text(arg(&request, 0)), "log effect");
                    Ok(Value::Null)
                }
                op if CLIENT_EFFECTS.contains(&op) => {
                    self.client_effects.lock().await.push(request.to_value());
                    Ok(Value::Null)
                }
                "async/delay" => {
                    time::sleep(millis(arg(&request, 0))).await;
                    self.run_nested(arg(&request, 1)).await
                }
                "async/timeout" => self.timeout(&request).await,
                "async/retry" => self.retry(&request).await,
                "async/debounce" => self.debounce(&request).await,
                "async/throttle" => self.throttle(&request).await,
                "async/all" => self.all(request.args).await,
                "async/race" => self.race(request.args).await,
                other => Err(EffectError::Unsupported(other.to_string())),
            }
        })
    }

    /// Runs a nested effect description; `null` is a no-op.
    async fn run_nested(self: &Arc<Self>, description: &Value) -> Result<Value, EffectError> {
        if description.is_null() {
            return Ok(Value::Null);
        }
        self.execute(EffectRequest::from_value(description)?).await
    }

    async fn write(
        &self,
        request: &EffectRequest,
        update: impl FnOnce(&Value, &Value) -> Result<Value, EffectError>,
    ) -> Result<Value, EffectError> {
        let target = arg(request, 0)
            .as_str()
            .and_then(|t| t.strip_prefix('@'))
            .ok_or_else(|| EffectError::Malformed(format!("{} needs a binding target", request.operator)))?;
        let mut state = self.state.lock().await;
        let old = get_path(&state, target).cloned().unwrap_or(Value::Null);
        let new = update(&old, arg(request, 1)).map_err(|e| match e {
            EffectError::Malformed(message) => EffectError::Failed {
                operator: request.operator.clone(),
                message,
            },
            other => other,
        })?;
        *state = set_path(&state, target, new.clone());
        Ok(new)
    }

    async fn persist(&self, request: &EffectRequest) -> Result<Value, EffectError> {
        let action = to_text(arg(request, 0));
        let kind = to_text(arg(request, 1));
        let data = arg(request, 2).clone();
        let mut store = self.store.lock().await;
        match action.as_str() {
            "create" => {
                store.next_id += 1;
                let mut record = match data {
                    Value::Object(map) => map,
                    Value::Null => Map::new(),
                    other => return Err(EffectError::Malformed(format!("cannot persist {other}"))),
                };
                let id = json!(format!("{kind}-{}", store.next_id));
                record.entry("id").or_insert(id);
                let record = Value::Object(record);
                store.entities.entry(kind).or_default().push(record.clone());
                Ok(record)
            }
            "update" => {
                let id = data.get("id").cloned().unwrap_or(Value::Null);
                let records = store.entities.entry(kind).or_default();
                let Some(existing) = records.iter_mut().find(|r| r.get("id") == Some(&id)) else {
                    return Ok(Value::Null);
                };
                if let (Some(existing), Value::Object(changes)) = (existing.as_object_mut(), data) {
                    existing.extend(changes);
                }
                Ok(existing.clone())
            }
            "delete" => {
                let id = match data {
                    Value::Object(map) => map.get("id").cloned().unwrap_or(Value::Null),
                    other => other,
                };
                let records = store.entities.entry(kind).or_default();
                let before = records.len();
                records.retain(|r| r.get("id") != Some(&id));
                Ok(json!({"deleted": records.len() < before, "id": id}))
            }
            other => Err(EffectError::Malformed(format!("unknown persist action {other:?}"))),
        }
    }

    async fn fetch(&self, request: &EffectRequest) -> Result<Value, EffectError> {
        let kind = to_text(arg(request, 0));
        let store = self.store.lock().await;
        let records = store.entities.get(&kind).map(Vec::as_slice).unwrap_or_default();
        match arg(request, 1).get("id") {
            Some(id) => Ok(records
                .iter()
                .find(|r| r.get("id") == Some(id))
                .cloned()
                .unwrap_or(Value::Null)),
            None => Ok(Value::Array(records.to_vec())),
        }
    }

    async fn timeout(self: &Arc<Self>, request: &EffectRequest) -> Result<Value, EffectError> {
        let limit = millis(arg(request, 1));
        let inner = EffectRequest::from_value(arg(request, 0))?;
        let operator = inner.operator.clone();
        match time::timeout(limit, self.execute(inner)).await {
            Ok(result) => result,
            Err(_) => Err(EffectError::TimedOut {
                operator,
                ms: limit.as_millis() as u64,
            }),
        }
    }

    /// Retries with exponential backoff. Options: `{backoff, factor, maxDelay}`.
    async fn retry(self: &Arc<Self>, request: &EffectRequest) -> Result<Value, EffectError> {
        let description = arg(request, 0);
        let attempts = to_number(arg(request, 1)).map_or(1, |n| n.max(1.0) as u32);
        let options = arg(request, 2);
        let option = |name: &str| options.get(name).and_then(to_number);
        let mut delay = option("backoff").unwrap_or(RETRY_BACKOFF_MS as f64);
        let factor = option("factor").unwrap_or(RETRY_FACTOR);
        let max_delay = option("maxDelay").unwrap_or(f64::INFINITY);

        let mut attempt = 1;
        loop {
            match self.run_nested(description).await {
                Ok(value) => return Ok(value),
                Err(error) if attempt >= attempts => return Err(error),
                Err(error) => {
                    tracing::warn!(attempt, %error, "effect failed, retrying");
                    time::sleep(Duration::from_millis(delay.min(max_delay).max(0.0) as u64)).await;
                    delay *= factor;
                    attempt += 1;
                }
            }
        }
    }

    /// Runs the effect after `ms` of quiet per key; superseded calls yield null.
    async fn debounce(self: &Arc<Self>, request: &EffectRequest) -> Result<Value, EffectError> {
        let key = effect_key(request);
        let generation = {
            let mut debounced = self.debounced.lock().await;
            let generation = debounced.entry(key.clone()).or_insert(0);
            *generation += 1;
            *generation
        };
        time::sleep(millis(arg(request, 0))).await;
        if self.debounced.lock().await.get(&key) != Some(&generation) {
            tracing::debug!(key, "debounced effect superseded");
            return Ok(Value::Null);
        }
        self.run_nested(arg(request, 1)).await
    }

    /// Runs the effect at most once per `ms` per key; skipped calls yield null.
    async fn throttle(self: &Arc<Self>, request: &EffectRequest) -> Result<Value, EffectError> {
        let key = effect_key(request);
        let window = millis(arg(request, 0));
        {
            let mut throttled = self.throttled.lock().await;
            let now = Instant::now();
            if throttled.get(&key).is_some_and(|last| now.duration_since(*last) < window) {
                tracing::debug!(key, "throttled effect skipped");
                return Ok(Value::Null);
            }
            throttled.insert(key, now);
        }
        self.run_nested(arg(request, 1)).await
    }

    fn spawn_all(self: &Arc<Self>, descriptions: Vec<Value>) -> JoinSet<(usize, Result<Value, EffectError>)> {
        let mut set = JoinSet::new();
        for (i, description) in descriptions.into_iter().enumerate() {
            let this = Arc::clone(self);
            set.spawn(async move { (i, this.run_nested(&description).await) });
        }
        set
    }

    /// Runs every effect concurrently; results keep argument order.
    async fn all(self: &Arc<Self>, descriptions: Vec<Value>) -> Result<Value, EffectError> {
        let mut results = vec![Value::Null; descriptions.len()];
        let mut set = self.spawn_all(descriptions);
        while let Some(joined) = set.join_next().await {
            let (i, result) = joined.map_err(|e| failed("async/all", e))?;
            results[i] = result?;
        }
        Ok(Value::Array(results))
    }

    /// The first effect to finish wins; the others are cancelled.
    async fn race(self: &Arc<Self>, descriptions: Vec<Value>) -> Result<Value, EffectError> {
        let mut set = self.spawn_all(descriptions);
        let first = set.join_next().await;
        set.abort_all();
        match first {
            Some(joined) => joined.map_err(|e| failed("async/race", e))?.1,
            None => Ok(Value::Null),
        }
    }
}

fn arg(request: &EffectRequest, index: usize) -> &Value {
    static NULL: Value = Value::Null;
    request.arg(index).unwrap_or(&NULL)
}

fn millis(value: &Value) -> Duration {
    Duration::from_millis(to_number(value).map_or(0, |ms| ms.max(0.0) as u64))
}

fn failed(operator: &str, error: impl std::fmt::Display) -> EffectError {
    EffectError::Failed {
        operator: operator.to_string(),
        message: error.to_string(),
    }
}

/// Explicit key argument, else the effect description itself.
fn effect_key(request: &EffectRequest) -> String {
    match arg(request, 2) {
        Value::Null => arg(request, 1).to_string(),
        key => to_text(key),
    }
}

fn add(old: &Value, by: &Value, sign: f64) -> Result<Value, EffectError> {
    let by = match by {
        Value::Null => 1.0,
        other => to_number(other).ok_or_else(|| EffectError::Malformed(format!("{other} is not a number")))?,
    };
    let current = match old {
        Value::Null => 0.0,
        other => to_number(other).ok_or_else(|| EffectError::Malformed(format!("{other} is not a number")))?,
    };
    Ok(number(current + sign * by))
}

fn call_service(request: &EffectRequest) -> Value {
    let (service, method) = (arg(request, 0), arg(request, 1));
    tracing::warn!(service = %to_text(service), method = %to_text(method), "no service registry configured");
    json!({"service": service, "method": method, "status": "not_implemented"})
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(value: Value) -> EffectRequest {
        EffectRequest::from_value(&value).unwrap()
    }

    fn executor() -> Arc<Executor> {
        Executor::new(json!({"entity": {"hp": 3, "name": "Ada"}}))
    }

    #[tokio::test]
    async fn test_state_writes() {
        let exec = executor();
        let outcome = exec
            .run(vec![
                request(json!(["increment", "@entity.hp", 2])),
                request(json!(["decrement", "@entity.hp"])),
                request(json!(["set", "@entity.status", "ok"])),
                request(json!(["increment", "@state.count"])),
            ])
            .await
            .unwrap();
        assert_eq!(outcome.results, vec![json!(5), json!(4), json!("ok"), json!(1)]);
        assert_eq!(outcome.state["entity"], json!({"hp": 4, "name": "Ada", "status": "ok"}));
        assert_eq!(outcome.state["state"]["count"], json!(1));
    }

    #[tokio::test]
    async fn test_increment_non_number_fails() {
        let err = executor()
            .execute(request(json!(["increment", "@entity.name"])))
            .await
            .unwrap_err();
        assert!(matches!(err, EffectError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_client_effects_are_collected() {
        let outcome = executor()
            .run(vec![
                request(json!(["emit", "SAVED", {"id": 1}])),
                request(json!(["navigate", "/home"])),
            ])
            .await
            .unwrap();
        assert_eq!(
            outcome.client_effects,
            vec![json!(["emit", "SAVED", {"id": 1}]), json!(["navigate", "/home"])]
        );
    }

    #[tokio::test]
    async fn test_persist_and_fetch() {
        let exec = executor();
        let created = exec
            .execute(request(json!(["persist", "create", "Task", {"title": "a"}])))
            .await
            .unwrap();
        assert_eq!(created, json!({"id": "Task-1", "title": "a"}));
        exec.execute(request(json!(["persist", "update", "Task", {"id": "Task-1", "done": true}])))
            .await
            .unwrap();
        let fetched = exec
            .execute(request(json!(["fetch", "Task", {"id": "Task-1"}])))
            .await
            .unwrap();
        assert_eq!(fetched, json!({"id": "Task-1", "title": "a", "done": true}));
        let deleted = exec
            .execute(request(json!(["persist", "delete", "Task", "Task-1"])))
            .await
            .unwrap();
        assert_eq!(deleted, json!({"deleted": true, "id": "Task-1"}));
        assert_eq!(exec.execute(request(json!(["fetch", "Task"]))).await.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn test_delay_runs_nested_effect() {
        let exec = executor();
        let started = Instant::now();
        exec.execute(request(json!(["async/delay", 20, ["notify", "done"]])))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(*exec.client_effects.lock().await, vec![json!(["notify", "done"])]);
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = executor()
            .execute(request(json!(["async/timeout", ["async/delay", 1000], 10])))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EffectError::TimedOut {
                operator: "async/delay".to_string(),
                ms: 10
            }
        );
        let ok = executor()
            .execute(request(json!(["async/timeout", ["set", "@entity.hp", 9], 1000])))
            .await
            .unwrap();
        assert_eq!(ok, json!(9));
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_attempts() {
        let started = Instant::now();
        let err = executor()
            .execute(request(json!(["async/retry", ["train/step", {}, {}, {}], 3, {"backoff": 5, "factor": 2}])))
            .await
            .unwrap_err();
        assert_eq!(err, EffectError::Unsupported("train/step".to_string()));
        // Two waits: 5ms then 10ms.
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn test_all_keeps_order() {
        let out = executor()
            .execute(request(json!(["async/all",
                ["async/delay", 30, ["set", "@entity.a", 1]],
                ["set", "@entity.b", 2]
            ])))
            .await
            .unwrap();
        assert_eq!(out, json!([1, 2]));
    }

    #[tokio::test]
    async fn test_race_takes_first() {
        let exec = executor();
        let out = exec
            .execute(request(json!(["async/race",
                ["async/delay", 500, ["set", "@entity.slow", true]],
                ["set", "@entity.fast", true]
            ])))
            .await
            .unwrap();
        assert_eq!(out, json!(true));
        assert_eq!(exec.state.lock().await["entity"].get("slow"), None);
    }

    #[tokio::test]
    async fn test_debounce_runs_last_call_only() {
        let exec = executor();
        let out = exec
            .execute(request(json!(["async/all",
                ["async/debounce", 20, ["increment", "@entity.hp"], "hp"],
                ["async/debounce", 20, ["increment", "@entity.hp"], "hp"],
                ["async/debounce", 20, ["increment", "@entity.hp"], "hp"]
            ])))
            .await
            .unwrap();
        let ran = out.as_array().unwrap().iter().filter(|v| !v.is_null()).count();
        assert_eq!(ran, 1);
        assert_eq!(exec.state.lock().await["entity"]["hp"], json!(4));
    }

    #[tokio::test]
    async fn test_throttle_skips_within_window() {
        let exec = executor();
        let throttled = json!(["async/throttle", 1000, ["increment", "@entity.hp"]]);
        exec.execute(request(throttled.clone())).await.unwrap();
        let second = exec.execute(request(throttled)).await.unwrap();
        assert_eq!(second, Value::Null);
        assert_eq!(exec.state.lock().await["entity"]["hp"], json!(4));
    }

    #[tokio::test]
    async fn test_training_is_unsupported() {
        let err = executor()
            .execute(request(json!(["train/loop", {}, [], {}])))
            .await
            .unwrap_err();
        assert_eq!(err, EffectError::Unsupported("train/loop".to_string()));
    }

    #[tokio::test]
    async fn test_call_service_is_not_implemented() {
        let out = executor()
            .execute(request(json!(["call-service", "mail", "send", {}])))
            .await
            .unwrap();
        assert_eq!(out["status"], json!("not_implemented"));
    }
}
