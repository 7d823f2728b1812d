use lighter_resilience::resilience::Fallback;
use lighter_resilience::resilience::fallback::{run, run_async, run_with};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type Action = Box<dyn Fn() -> Result<&'static str, String>>;

#[test]
fn test_tries_actions_in_order() {
    super::init_tracing();

    let trail = Arc::new(Mutex::new(Vec::new()));
    let step = |name: &'static str, ok: bool| -> Action {
        let trail = trail.clone();
        Box::new(move || {
            trail.lock().push(name);
            if ok {
                Ok(name)
            } else {
                Err(format!("{name} failed"))
            }
        })
    };

    let result = run(vec![
        step("primary", false),
        step("replica", false),
        step("cache", true),
        step("default", true),
    ]);

    assert_eq!(result, Ok(Some("cache")));
    assert_eq!(*trail.lock(), vec!["primary", "replica", "cache"]);
}

#[test]
fn test_only_last_failure_is_reported() {
    let result = run(vec![
        Box::new(|| -> Result<&'static str, String> {
            Err("primary failed".to_string())
        }) as Action,
        Box::new(|| -> Result<&'static str, String> { Err("replica failed".to_string()) }),
    ]);

    assert_eq!(result, Err("replica failed".to_string()));
}

#[test]
fn test_no_actions_is_success() {
    assert_eq!(run(Vec::<Action>::new()), Ok(None));
}

#[test]
fn test_reusable_chain_with_context() {
    let cache: HashMap<String, u32> = HashMap::from([("eu".to_string(), 7)]);
    let chain = Fallback::<u32, String, String>::new()
        .or_with(|region: &String| Err(format!("{region}: origin unreachable")))
        .or_with(move |region: &String| {
            cache
                .get(region)
                .copied()
                .ok_or_else(|| format!("{region}: not cached"))
        });

    assert_eq!(chain.len(), 2);
    assert_eq!(chain.run_with(&"eu".to_string()), Ok(Some(7)));
    assert_eq!(
        chain.run_with(&"us".to_string()),
        Err("us: not cached".to_string())
    );
}

#[test]
fn test_free_run_with_context() {
    let tenants = ["acme", "globex"];

    let result = run_with(&"globex".to_string(), tenants.map(|tenant| {
        move |requested: &String| {
            if *requested == tenant {
                Ok(tenant.len())
            } else {
                Err(tenant)
            }
        }
    }));

    assert_eq!(result, Ok(Some(6)));
}

#[tokio::test]
async fn test_async_chain_creates_futures_lazily() {
    let created = Arc::new(Mutex::new(Vec::new()));

    let actions = (1..=3u32).map(|n| {
        let created = created.clone();
        move || {
            created.lock().push(n);
            async move {
                if n == 2 {
                    Ok(n * 10)
                } else {
                    Err(n)
                }
            }
        }
    });

    assert_eq!(run_async(actions).await, Ok(Some(20)));
    assert_eq!(*created.lock(), vec![1, 2]);
}
