use tokio::task::JoinHandle;

use crate::error::StoreError;

/// Handle to an intercepted write running in the background.
///
/// Returned as soon as the write is enqueued. Dropping it detaches the write;
/// it still runs to completion and failures are only logged.
#[derive(Debug)]
#[must_use = "dropping a PendingWrite detaches it; call `wait` to observe failures"]
pub struct PendingWrite {
    property: String,
    state: State,
}

#[derive(Debug)]
enum State {
    Spawned(JoinHandle<Result<(), StoreError>>),
    /// Never started, e.g. no runtime to spawn on.
    Failed(StoreError),
}

impl PendingWrite {
    pub(crate) fn spawned(property: String, handle: JoinHandle<Result<(), StoreError>>) -> Self {
        Self {
            property,
            state: State::Spawned(handle),
        }
    }

    pub(crate) fn failed(property: String, err: StoreError) -> Self {
        Self {
            property,
            state: State::Failed(err),
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    /// True once the write committed or failed.
    pub fn is_finished(&self) -> bool {
        match &self.state {
            State::Spawned(handle) => handle.is_finished(),
            State::Failed(_) => true,
        }
    }

    /// Abort the write. Has no effect after the ciphertext was committed.
    pub fn abort(&self) {
        if let State::Spawned(handle) = &self.state {
            handle.abort();
        }
    }

    /// Wait for the commit and surface encryption or delegate failures.
    pub async fn wait(self) -> Result<(), StoreError> {
        let handle = match self.state {
            State::Spawned(handle) => handle,
            State::Failed(err) => return Err(err),
        };
        match handle.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(StoreError::Storage {
                reason: format!("write to {} was aborted", self.property),
            }),
            Err(err) => Err(StoreError::Storage {
                reason: format!("write to {} panicked: {err}", self.property),
            }),
        }
    }
}
