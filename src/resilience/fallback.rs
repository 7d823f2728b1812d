//! Fallback chains: try alternative actions in order until one succeeds.

use std::fmt;
use std::future::Future;
use tracing::debug;

use crate::metrics::record_fallback_handoff;

type Action<T, E, C> = Box<dyn Fn(&C) -> Result<T, E> + Send + Sync>;

/// A reusable, ordered chain of alternative actions.
///
/// Building the chain runs nothing. Each [`run`](Fallback::run) walks the
/// actions from the first: the first success wins, and if every action
/// fails the last failure is returned as is. An empty chain succeeds with
/// `None`.
///
/// ```rust
/// use lighter_resilience::resilience::Fallback;
///
/// let lookup: Fallback<&str, &str> = Fallback::new()
///     .or(|| Err("primary replica down"))
///     .or(|| Ok("from cache"));
///
/// assert_eq!(lookup.run(), Ok(Some("from cache")));
/// ```
pub struct Fallback<T, E, C = ()> {
    actions: Vec<Action<T, E, C>>,
}

impl<T, E, C> Default for Fallback<T, E, C> {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
        }
    }
}

impl<T, E, C> Fallback<T, E, C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action that ignores the context
    pub fn or(self, action: impl Fn() -> Result<T, E> + Send + Sync + 'static) -> Self {
        self.or_with(move |_: &C| action())
    }

    /// Append an action that receives the context passed to `run_with`
    pub fn or_with(mut self, action: impl Fn(&C) -> Result<T, E> + Send + Sync + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn run_with(&self, context: &C) -> Result<Option<T>, E> {
        first_success(self.actions.iter().map(|action| move || action(context)))
    }
}

impl<T, E> Fallback<T, E, ()> {
    pub fn run(&self) -> Result<Option<T>, E> {
        self.run_with(&())
    }
}

impl<T, E, C> fmt::Debug for Fallback<T, E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fallback")
            .field("actions", &self.actions.len())
            .finish()
    }
}

/// Run `actions` in order and return the first success
pub fn run<I, F, T, E>(actions: I) -> Result<Option<T>, E>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Result<T, E>,
{
    first_success(actions.into_iter())
}

/// Like [`run`], passing `context` to every action
pub fn run_with<C, I, F, T, E>(context: &C, actions: I) -> Result<Option<T>, E>
where
    I: IntoIterator<Item = F>,
    F: FnOnce(&C) -> Result<T, E>,
{
    first_success(actions.into_iter().map(|action| move || action(context)))
}

/// Async counterpart of [`run`]; each future is created only when its turn comes
pub async fn run_async<I, F, Fut, T, E>(actions: I) -> Result<Option<T>, E>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut actions = actions.into_iter().enumerate().peekable();

    while let Some((index, action)) = actions.next() {
        match action().await {
            Ok(value) => return Ok(Some(value)),
            Err(err) if actions.peek().is_none() => return Err(err),
            Err(_) => hand_off(index),
        }
    }

    Ok(None)
}

fn first_success<I, F, T, E>(actions: I) -> Result<Option<T>, E>
where
    I: Iterator<Item = F>,
    F: FnOnce() -> Result<T, E>,
{
    let mut actions = actions.enumerate().peekable();

    while let Some((index, action)) = actions.next() {
        match action() {
            Ok(value) => return Ok(Some(value)),
            Err(err) if actions.peek().is_none() => return Err(err),
            Err(_) => hand_off(index),
        }
    }

    Ok(None)
}

fn hand_off(failed: usize) {
    debug!(action = failed, next = failed + 1, "Fallback action failed, trying next");
    record_fallback_handoff(failed);
}
