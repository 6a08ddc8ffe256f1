use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use streamline::pipeline::{
    BoundedExecutor, ExecutorProgress, Handle, PipelineContext, ProgressHook, Stage, apply_handler,
    static_stream,
};
use streamline::{Entry, EntryFactory, ErrorRendering};

fn entries(values: Vec<Value>) -> Vec<Entry> {
    let mut factory = EntryFactory::new(json!("ERR"));
    values.into_iter().map(|v| factory.make(v)).collect()
}

fn run(executor: &BoundedExecutor, values: Vec<Value>) -> Vec<Entry> {
    let out: anyhow::Result<Vec<Entry>> = executor.stream(static_stream(entries(values))).collect();
    out.unwrap()
}

fn sorted_values(out: &[Entry]) -> Vec<i64> {
    let mut values: Vec<i64> = out.iter().filter_map(|e| e.value().as_i64()).collect();
    values.sort();
    values
}

fn jittered_double() -> Arc<dyn Handle> {
    Arc::new(|v: Value| -> anyhow::Result<Value> {
        let n = v.as_i64().unwrap_or(0);
        std::thread::sleep(Duration::from_millis(((n * 37) % 11) as u64));
        Ok(json!(n * 2))
    })
}

// --- ordering ---

#[test]
fn test_single_worker_preserves_order() {
    let ctx = PipelineContext::new(1).unwrap();
    let executor = BoundedExecutor::new(jittered_double(), &ctx);
    let inputs: Vec<Value> = (0..12).map(|n| json!(n)).collect();
    let out = run(&executor, inputs);
    let values: Vec<i64> = out.iter().map(|e| e.value().as_i64().unwrap()).collect();
    assert_eq!(values, (0..12).map(|n| n * 2).collect::<Vec<i64>>());
}

#[test]
fn test_many_workers_same_multiset() {
    let ctx = PipelineContext::new(4).unwrap();
    let executor = BoundedExecutor::new(jittered_double(), &ctx);
    let inputs: Vec<Value> = (0..40).map(|n| json!(n)).collect();
    let out = run(&executor, inputs);
    assert_eq!(out.len(), 40);
    assert_eq!(sorted_values(&out), (0..40).map(|n| n * 2).collect::<Vec<i64>>());
}

#[test]
fn test_parse_and_increment() {
    let ctx = PipelineContext::new(5).unwrap();
    let handler: Arc<dyn Handle> = Arc::new(|v: Value| -> anyhow::Result<Value> {
        let n: i64 = v.as_str().unwrap_or_default().parse()?;
        Ok(json!(n + 1))
    });
    let executor = BoundedExecutor::new(handler, &ctx);
    let out = run(&executor, vec![json!("1"), json!("2"), json!("3")]);
    assert_eq!(sorted_values(&out), vec![2, 3, 4]);
}

#[test]
fn test_empty_upstream() {
    let ctx = PipelineContext::new(2).unwrap();
    let executor = BoundedExecutor::new(jittered_double(), &ctx);
    assert!(run(&executor, Vec::new()).is_empty());
}

// --- bounds ---

#[test]
fn test_in_flight_never_exceeds_workers() {
    let ctx = PipelineContext::new(6).unwrap();
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (cur, pk) = (Arc::clone(&current), Arc::clone(&peak));
    let handler: Arc<dyn Handle> = Arc::new(move |v: Value| -> anyhow::Result<Value> {
        let now = cur.fetch_add(1, Ordering::SeqCst) + 1;
        pk.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(15));
        cur.fetch_sub(1, Ordering::SeqCst);
        Ok(v)
    });
    let executor = BoundedExecutor::new(handler, &ctx).with_workers(2);
    assert_eq!(executor.workers(), 2);
    let out = run(&executor, (0..10).map(|n| json!(n)).collect());
    assert_eq!(out.len(), 10);
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[test]
fn test_progress_accounting_balanced() {
    let reports: Arc<Mutex<Vec<ExecutorProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let hook: ProgressHook = Arc::new(move |p: ExecutorProgress| sink.lock().unwrap().push(p));
    let ctx = PipelineContext::new(3).unwrap().with_progress(hook);
    let handler: Arc<dyn Handle> = Arc::new(|v: Value| -> anyhow::Result<Value> {
        if v == json!(2) {
            anyhow::bail!("two is not allowed");
        }
        Ok(v)
    });
    let executor = BoundedExecutor::new(handler, &ctx);
    let out = run(&executor, (0..5).map(|n| json!(n)).collect());
    assert_eq!(out.len(), 5);

    let reports = reports.lock().unwrap();
    // One report per admission and one per completion.
    assert_eq!(reports.len(), 10);
    assert!(reports.iter().all(|p| p.in_flight <= 3));
    let last = reports.last().unwrap();
    assert_eq!(last.admitted, 5);
    assert_eq!(last.completed, 5);
    assert_eq!(last.in_flight, 0);
}

// --- failures ---

#[test]
fn test_handler_error_recorded_and_stream_continues() {
    let ctx = PipelineContext::new(2).unwrap();
    let handler: Arc<dyn Handle> = Arc::new(|v: Value| -> anyhow::Result<Value> {
        match v.as_i64() {
            Some(2) => anyhow::bail!("boom"),
            Some(n) => Ok(json!(n * 10)),
            None => Ok(v),
        }
    });
    let executor = BoundedExecutor::new(handler, &ctx);
    let out = run(&executor, vec![json!(1), json!(2), json!(3)]);
    assert_eq!(out.len(), 3);

    let failed: Vec<&Entry> = out.iter().filter(|e| e.has_errors()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].original_value(), &json!(2));
    assert_eq!(failed[0].value(), &json!("ERR"));
    assert_eq!(sorted_values(&out), vec![10, 30]);
}

#[test]
fn test_handler_panic_is_recorded() {
    let ctx = PipelineContext::new(2).unwrap();
    let handler: Arc<dyn Handle> = Arc::new(|v: Value| -> anyhow::Result<Value> {
        if v == json!("bad") {
            panic!("handler exploded");
        }
        Ok(v)
    });
    let executor = BoundedExecutor::new(handler, &ctx);
    let out = run(&executor, vec![json!("ok"), json!("bad"), json!("fine")]);
    assert_eq!(out.len(), 3);
    let failed: Vec<&Entry> = out.iter().filter(|e| e.has_errors()).collect();
    assert_eq!(failed.len(), 1);
    assert!(format!("{}", failed[0].last_error().unwrap()).contains("handler exploded"));
}

#[test]
fn test_message_rendering_replaces_value() {
    let ctx = PipelineContext::new(1)
        .unwrap()
        .with_error_rendering(ErrorRendering::Message);
    let handler: Arc<dyn Handle> =
        Arc::new(|_: Value| -> anyhow::Result<Value> { anyhow::bail!("no luck") });
    let executor = BoundedExecutor::new(handler, &ctx);
    let out = run(&executor, vec![json!(1)]);
    assert!(out[0].has_errors());
    assert_eq!(out[0].value(), &json!("no luck"));
}

#[test]
fn test_apply_handler_directly() {
    let double = |v: Value| -> anyhow::Result<Value> { Ok(json!(v.as_i64().unwrap_or(0) * 2)) };
    let entry = apply_handler(&double, Entry::new(json!(21)), ErrorRendering::Substitute);
    assert_eq!(entry.value(), &json!(42));
    assert_eq!(entry.history(), &[json!(21), json!(42)]);
}

// --- context ---

#[test]
fn test_zero_workers_is_config_error() {
    assert!(PipelineContext::new(0).is_err());
}
