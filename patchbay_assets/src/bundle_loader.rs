//====================================================================

use std::sync::Arc;

use crate::services::{BundleBackend, BundleInfo, BundleOpenRequest, OpenBundle, OpenPoll};

//====================================================================

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoaderId(pub(crate) u32);

impl std::fmt::Display for LoaderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ID: {}", self.0)
    }
}

impl std::fmt::Debug for LoaderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

//====================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    Loading,
    Ready,
    Failed,
}

//====================================================================

// Owns the open handle of exactly one physical bundle file. Providers refer
// to loaders by id; the registry alone decides when one is destroyed.
pub struct BundleFileLoader {
    bundle_info: BundleInfo,
    state: LoaderState,
    open_request: Option<Box<dyn BundleOpenRequest>>,
    contents: Option<Arc<dyn OpenBundle>>,
    error: String,
}

impl BundleFileLoader {
    pub(crate) fn new(bundle_info: BundleInfo) -> Self {
        log::trace!("Creating bundle loader '{}'", bundle_info.bundle_name);

        Self {
            bundle_info,
            state: LoaderState::Idle,
            open_request: None,
            contents: None,
            error: String::new(),
        }
    }

    #[inline]
    pub fn bundle_info(&self) -> &BundleInfo {
        &self.bundle_info
    }

    #[inline]
    pub fn state(&self) -> LoaderState {
        self.state
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        matches!(self.state, LoaderState::Ready | LoaderState::Failed)
    }

    #[inline]
    pub fn contents(&self) -> Option<&Arc<dyn OpenBundle>> {
        self.contents.as_ref()
    }

    #[inline]
    pub fn error(&self) -> &str {
        &self.error
    }

    pub(crate) fn update(&mut self, backend: &dyn BundleBackend) {
        match self.state {
            LoaderState::Idle => {
                if !self.begin_open(backend) {
                    return;
                }
                self.poll_open();
            }
            LoaderState::Loading => self.poll_open(),
            LoaderState::Ready | LoaderState::Failed => {}
        }
    }

    // The blocking escape hatch: drives the open request to completion on
    // the calling thread.
    pub(crate) fn wait_for_done(&mut self, backend: &dyn BundleBackend) {
        if self.is_done() {
            return;
        }

        log::warn!(
            "Blocking the caller thread until bundle '{}' finishes loading.",
            self.bundle_info.bundle_name
        );

        if self.state == LoaderState::Idle && !self.begin_open(backend) {
            return;
        }

        let Some(request) = self.open_request.as_mut() else {
            return;
        };

        match request.wait() {
            Ok(contents) => {
                self.contents = Some(contents);
                self.state = LoaderState::Ready;
            }
            Err(error) => self.fail(format!(
                "Failed to open bundle '{}': {}",
                self.bundle_info.bundle_name, error
            )),
        }
        self.open_request = None;
    }

    //--------------------------------------------------

    fn begin_open(&mut self, backend: &dyn BundleBackend) -> bool {
        if !self.bundle_info.is_valid() {
            self.fail(format!(
                "Bundle '{}' has no local file path",
                self.bundle_info.bundle_name
            ));
            return false;
        }

        self.open_request = Some(backend.open_bundle(&self.bundle_info));
        self.state = LoaderState::Loading;
        true
    }

    fn poll_open(&mut self) {
        let Some(request) = self.open_request.as_mut() else {
            return;
        };

        match request.poll() {
            OpenPoll::Pending => {}
            OpenPoll::Done(Ok(contents)) => {
                self.contents = Some(contents);
                self.state = LoaderState::Ready;
                self.open_request = None;

                log::trace!("Bundle loader '{}' is ready", self.bundle_info.bundle_name);
            }
            OpenPoll::Done(Err(error)) => {
                let message = format!(
                    "Failed to open bundle '{}': {}",
                    self.bundle_info.bundle_name, error
                );
                self.open_request = None;
                self.fail(message);
            }
        }
    }

    fn fail(&mut self, error: String) {
        log::warn!("{}", error);
        self.state = LoaderState::Failed;
        self.error = error;
    }
}

impl Drop for BundleFileLoader {
    fn drop(&mut self) {
        log::trace!("Dropping bundle loader '{}'", self.bundle_info.bundle_name);
    }
}

//====================================================================
