//! Debounced persistence of the file tree.
//!
//! Every change to the tree (or an explicit save request) restarts a quiet
//! period; once it elapses without further changes the tree is written and the
//! session is marked saved.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::io::persistence::{KeyValueStore, save_files};
use crate::session::{SaveStatus, SessionEvent, SessionStore};

/// Write the current tree now and mark the session saved.
pub fn save_now(store: &SessionStore, kv: &dyn KeyValueStore) -> Result<()> {
    save_files(kv, &store.files())?;
    store.mark_saved();
    Ok(())
}

/// Start the autosaver. It runs until the session store is dropped.
pub fn spawn_autosave(
    store: Arc<SessionStore>,
    kv: Arc<dyn KeyValueStore>,
    debounce: Duration,
) -> JoinHandle<()> {
    // Subscribe before spawning so no change made after this call is missed.
    let rx = store.subscribe();
    let weak = Arc::downgrade(&store);
    drop(store);
    tokio::spawn(async move {
        let mut rx = rx;
        let mut dirty = weak
            .upgrade()
            .is_some_and(|store| store.save_status() == SaveStatus::Saving);
        loop {
            if !dirty && !wait_for_change(&mut rx).await {
                return;
            }
            if !quiet_period(&mut rx, debounce).await {
                return;
            }
            let Some(store) = weak.upgrade() else {
                return;
            };
            match save_now(&store, kv.as_ref()) {
                Ok(()) => debug!("file tree autosaved"),
                Err(err) => warn!(error = %format!("{err:#}"), "autosave failed"),
            }
            dirty = false;
        }
    })
}

fn marks_dirty(event: &SessionEvent) -> bool {
    matches!(
        event,
        SessionEvent::Files
            | SessionEvent::SaveStatus {
                status: SaveStatus::Saving
            }
    )
}

/// Wait for the next change. `false` once the channel closes.
async fn wait_for_change(rx: &mut Receiver<SessionEvent>) -> bool {
    loop {
        match rx.recv().await {
            Ok(event) if marks_dirty(&event) => return true,
            Ok(_) => {}
            // Missed events may have been changes.
            Err(RecvError::Lagged(_)) => return true,
            Err(RecvError::Closed) => return false,
        }
    }
}

/// Sleep until `debounce` passes without a change. `false` once the channel closes.
async fn quiet_period(rx: &mut Receiver<SessionEvent>, debounce: Duration) -> bool {
    let sleep = tokio::time::sleep(debounce);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = &mut sleep => return true,
            event = rx.recv() => match event {
                Ok(event) if marks_dirty(&event) => {
                    sleep.as_mut().reset(Instant::now() + debounce);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    sleep.as_mut().reset(Instant::now() + debounce);
                }
                Err(RecvError::Closed) => return false,
            }
        }
    }
}
