use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use tourlead_core::domain::session::SessionId;

/// One async mutex per session id. Holding the guard makes the caller the only writer
/// of that session until it is dropped.
#[derive(Default)]
pub struct SessionLocks {
    entries: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub async fn acquire(&self, session_id: &SessionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut entries = self.entries.lock().await;
            // Entries only referenced by the map have no holder or waiter.
            entries.retain(|id, lock| id == session_id || Arc::strong_count(lock) > 1);
            entries.entry(session_id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub async fn tracked(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Mutex;

    use tourlead_core::domain::session::SessionId;

    use super::SessionLocks;

    #[tokio::test]
    async fn same_session_is_serialized() {
        let locks = Arc::new(SessionLocks::default());
        let order = Arc::new(Mutex::new(Vec::new()));
        let id = SessionId("S-1".to_string());

        let guard = locks.acquire(&id).await;
        let waiter = {
            let locks = Arc::clone(&locks);
            let order = Arc::clone(&order);
            let id = id.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&id).await;
                order.lock().await.push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        order.lock().await.push("first");
        drop(guard);
        waiter.await.expect("waiter");

        assert_eq!(*order.lock().await, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = SessionLocks::default();
        for index in 0..10 {
            let _guard = locks.acquire(&SessionId(format!("S-{index}"))).await;
        }
        let _held = locks.acquire(&SessionId("S-last".to_string())).await;

        assert_eq!(locks.tracked().await, 1);
    }
}
