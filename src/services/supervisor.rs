/// Restarts long-lived tasks that exit or panic, within a retry budget
use std::future::Future;
use tracing::{error, info, warn};

pub struct Supervisor {
    name: String,
    max_restarts: u32,
}

impl Supervisor {
    pub fn new(name: impl Into<String>, max_restarts: u32) -> Self {
        Self {
            name: name.into(),
            max_restarts,
        }
    }

    /// Run the task produced by `start` until it has been restarted
    /// `max_restarts` times. Each attempt starts from scratch.
    /// Returns the number of restarts used.
    pub async fn supervise<F, Fut>(&self, mut start: F) -> u32
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut restarts = 0;
        info!("Starting {} task", self.name);

        loop {
            match tokio::spawn(start()).await {
                Ok(()) => warn!("{} task exited unexpectedly", self.name),
                Err(e) if e.is_panic() => error!("{} task panicked", self.name),
                Err(e) => warn!("{} task was cancelled: {}", self.name, e),
            }

            if restarts >= self.max_restarts {
                error!(
                    "{} task failed after {} restarts, giving up",
                    self.name, restarts
                );
                return restarts;
            }

            restarts += 1;
            warn!(
                "Restarting {} task after crash, {} tries remaining",
                self.name,
                self.max_restarts - restarts
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_restarts_panicking_task_until_budget_spent() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let supervisor = Supervisor::new("flaky", 3);

        let counter = attempts.clone();
        let used = supervisor
            .supervise(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    panic!("boom");
                }
            })
            .await;

        assert_eq!(used, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_exited_task_is_also_restarted() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let supervisor = Supervisor::new("short-lived", 1);

        let counter = attempts.clone();
        supervisor
            .supervise(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_budget_runs_once() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let used = Supervisor::new("once", 0)
            .supervise(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        assert_eq!(used, 0);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
