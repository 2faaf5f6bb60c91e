use super::*;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

#[test]
fn test_post_runs_in_order() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let ctx = ExecutionContext::new("worker")?;
    let seen = Arc::new(Mutex::new(vec![]));
    for i in 0..10 {
        let seen = Arc::clone(&seen);
        ctx.post(move |_| seen.lock().unwrap().push(i))?;
    }
    ctx.invoke(|_| ())?;

    assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_invoke_runs_on_context() -> Result<()> {
    let ctx = ExecutionContext::new("network")?;
    assert!(!ctx.is_current());
    assert_eq!(ctx.name(), "network");

    let inner = ctx.clone();
    let (name, current, owned) = ctx.invoke(move |token| {
        inner.check(token);
        (token.name().to_owned(), inner.is_current(), inner.owns(token))
    })?;

    assert_eq!(name, "network");
    assert!(current);
    assert!(owned);
    Ok(())
}

#[test]
fn test_invoke_on_own_context_panics() -> Result<()> {
    let ctx = ExecutionContext::new("signaling")?;
    let inner = ctx.clone();

    let panicked = ctx.invoke(move |_| {
        catch_unwind(AssertUnwindSafe(|| inner.invoke(|_| 1))).is_err()
    })?;
    assert!(panicked);
    Ok(())
}

#[test]
fn test_invoke_reports_panicking_task() -> Result<()> {
    let ctx = ExecutionContext::new("worker")?;

    let result: Result<u32> = ctx.invoke(|_| panic!("task failure"));
    assert_eq!(result, Err(Error::ErrContextTaskPanicked("worker".to_owned())));

    // the context keeps running
    assert_eq!(ctx.invoke(|_| 7)?, 7);
    Ok(())
}

#[test]
fn test_token_of_other_context_is_rejected() -> Result<()> {
    let network = ExecutionContext::new("network")?;
    let worker = ExecutionContext::new("worker")?;

    let n = network.clone();
    let rejected = worker.invoke(move |token| {
        !n.owns(token) && catch_unwind(AssertUnwindSafe(|| n.check(token))).is_err()
    })?;
    assert!(rejected);
    Ok(())
}

#[test]
fn test_drop_drains_queue() -> Result<()> {
    let ctx = ExecutionContext::new("worker")?;
    let done = Arc::new(AtomicBool::new(false));

    let d = Arc::clone(&done);
    ctx.post(move |_| {
        thread::sleep(Duration::from_millis(20));
        d.store(true, Ordering::SeqCst);
    })?;
    drop(ctx);

    assert!(done.load(Ordering::SeqCst));
    Ok(())
}
