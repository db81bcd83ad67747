//====================================================================

use std::sync::Arc;

use parking_lot::Mutex;

use crate::services::LoadedValue;

//====================================================================

pub(crate) type Sender = crossbeam::channel::Sender<ReferenceSignal>;
pub(crate) type Receiver = crossbeam::channel::Receiver<ReferenceSignal>;

pub(crate) enum ReferenceSignal {
    Increase(ProviderId),
    Decrease(ProviderId),
}

//====================================================================

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderId(pub(crate) u32);

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ID: {}", self.0)
    }
}

impl std::fmt::Debug for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

//====================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Clone)]
pub struct LoadOutcome {
    pub status: LoadStatus,
    pub value: Option<LoadedValue>,
    pub error: String,
}

pub type CompletionCallback = Box<dyn FnOnce(&LoadOutcome) + Send>;

//====================================================================

struct SharedState {
    status: LoadStatus,
    value: Option<LoadedValue>,
    error: String,
    callbacks: Vec<CompletionCallback>,
}

// The completion cell shared between one provider and all of its handles.
pub(crate) struct ProviderShared {
    provider_id: ProviderId,
    asset_path: String,
    state: Mutex<SharedState>,
}

impl ProviderShared {
    pub(crate) fn new(provider_id: ProviderId, asset_path: String) -> Self {
        Self {
            provider_id,
            asset_path,
            state: Mutex::new(SharedState {
                status: LoadStatus::Pending,
                value: None,
                error: String::new(),
                callbacks: Vec::new(),
            }),
        }
    }

    #[inline]
    pub(crate) fn provider_id(&self) -> ProviderId {
        self.provider_id
    }

    #[inline]
    pub(crate) fn asset_path(&self) -> &str {
        &self.asset_path
    }

    pub(crate) fn outcome(&self) -> LoadOutcome {
        let state = self.state.lock();
        LoadOutcome {
            status: state.status,
            value: state.value.clone(),
            error: state.error.clone(),
        }
    }

    // Fires the queued callbacks exactly once. Later completions are ignored.
    pub(crate) fn complete(&self, status: LoadStatus, value: Option<LoadedValue>, error: String) {
        let callbacks = {
            let mut state = self.state.lock();
            if state.status != LoadStatus::Pending {
                return;
            }

            state.status = status;
            state.value = value;
            state.error = error;
            std::mem::take(&mut state.callbacks)
        };

        if callbacks.is_empty() {
            return;
        }

        // Invoked outside the lock: a callback may inspect the handle again.
        let outcome = self.outcome();
        for callback in callbacks {
            callback(&outcome);
        }
    }
}

//====================================================================

pub struct AssetHandle {
    shared: Arc<ProviderShared>,
    sender: Sender,
}

impl AssetHandle {
    pub(crate) fn new(shared: Arc<ProviderShared>, sender: Sender) -> Self {
        log::trace!("Creating new handle '{}'", shared.asset_path());

        if sender
            .send(ReferenceSignal::Increase(shared.provider_id()))
            .is_err()
        {
            log::warn!(
                "Failed to send increase signal for handle '{}'",
                shared.asset_path()
            );
        }

        Self { shared, sender }
    }

    #[inline]
    pub fn asset_path(&self) -> &str {
        self.shared.asset_path()
    }

    #[inline]
    pub(crate) fn provider_id(&self) -> ProviderId {
        self.shared.provider_id()
    }

    #[inline]
    pub fn status(&self) -> LoadStatus {
        self.shared.state.lock().status
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.status() != LoadStatus::Pending
    }

    pub fn asset(&self) -> Option<crate::services::AssetObject> {
        self.shared.state.lock().value.as_ref()?.asset()
    }

    pub fn sub_assets(&self) -> Option<Vec<crate::services::AssetObject>> {
        self.shared.state.lock().value.as_ref()?.sub_assets()
    }

    pub fn error(&self) -> String {
        self.shared.state.lock().error.clone()
    }

    // Registered after completion, the callback runs immediately on the
    // calling thread instead of being queued.
    pub fn on_completed<F>(&self, callback: F)
    where
        F: FnOnce(&LoadOutcome) + Send + 'static,
    {
        {
            let mut state = self.shared.state.lock();
            if state.status == LoadStatus::Pending {
                state.callbacks.push(Box::new(callback));
                return;
            }
        }

        let outcome = self.shared.outcome();
        callback(&outcome);
    }
}

impl Clone for AssetHandle {
    #[inline]
    fn clone(&self) -> Self {
        Self::new(self.shared.clone(), self.sender.clone())
    }
}

impl Drop for AssetHandle {
    fn drop(&mut self) {
        log::trace!("Dropping handle '{}'", self.shared.asset_path());

        if self
            .sender
            .send(ReferenceSignal::Decrease(self.shared.provider_id()))
            .is_err()
        {
            log::warn!(
                "Failed to send decrease signal on destruction of handle '{}'",
                self.shared.asset_path()
            );
        }
    }
}

impl std::fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetHandle")
            .field("asset_path", &self.asset_path())
            .field("status", &self.status())
            .finish()
    }
}

//====================================================================
