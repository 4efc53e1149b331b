// Post-commit side effects
//
// Once the primary transaction has committed, the reservation and its outbox
// row are durably correct. Everything that follows (room status flips, guest
// statistics, commissions, hold release) is a derived projection: failures
// are logged and the command still succeeds. Modeled as an explicit ordered
// list so the best-effort contract stays auditable.

use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

type EffectFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// One named best-effort task to run after commit
pub struct SideEffect {
    pub name: &'static str,
    task: EffectFuture,
}

impl SideEffect {
    /// Wrap a future as a named side effect
    pub fn new<F>(name: &'static str, task: F) -> Self
    where
        F: Future<Output = Result<(), String>> + Send + 'static,
    {
        Self {
            name,
            task: Box::pin(task),
        }
    }
}

/// Run the side-effect list in order, each inside its own error boundary
///
/// A failing effect is logged at warning level and never stops the effects
/// behind it; the command outcome was decided at commit time.
pub async fn run_post_commit(command: &str, reservation_id: Uuid, effects: Vec<SideEffect>) {
    for effect in effects {
        match effect.task.await {
            Ok(()) => {
                tracing::debug!(
                    reservation_id = %reservation_id,
                    "{}: post-commit step '{}' completed",
                    command,
                    effect.name
                );
            }
            Err(e) => {
                tracing::warn!(
                    reservation_id = %reservation_id,
                    "{}: post-commit step '{}' failed (will self-heal or be reconciled): {}",
                    command,
                    effect.name,
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_effect(
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        outcome: Result<(), String>,
    ) -> SideEffect {
        SideEffect::new(name, async move {
            log.lock().unwrap().push(name);
            outcome
        })
    }

    #[tokio::test]
    async fn test_effects_run_in_declared_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let effects = vec![
            recording_effect("first", log.clone(), Ok(())),
            recording_effect("second", log.clone(), Ok(())),
            recording_effect("third", log.clone(), Ok(())),
        ];

        run_post_commit("check_out", Uuid::new_v4(), effects).await;

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_effects() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let effects = vec![
            recording_effect("flip_room", log.clone(), Err("room gone".to_string())),
            recording_effect("stay_stats", log.clone(), Ok(())),
            recording_effect("commission", log.clone(), Err("rule scan failed".to_string())),
            recording_effect("release_hold", log.clone(), Ok(())),
        ];

        run_post_commit("check_out", Uuid::new_v4(), effects).await;

        // Every effect ran despite two failures
        assert_eq!(
            *log.lock().unwrap(),
            vec!["flip_room", "stay_stats", "commission", "release_hold"]
        );
    }

    #[tokio::test]
    async fn test_empty_effect_list_is_a_no_op() {
        run_post_commit("check_in", Uuid::new_v4(), Vec::new()).await;
    }
}
