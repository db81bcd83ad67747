//====================================================================

use std::{any::TypeId, collections::HashMap, sync::Arc};

use crate::{
    bundle_loader::{BundleFileLoader, LoaderId},
    handle::{LoadStatus, ProviderId, ProviderShared},
    services::{AssetLoadRequest, LoadPoll, LoadedValue, SceneLoadParams},
    system::SystemMode,
    Hasher,
};

//====================================================================

type LoaderMap = HashMap<LoaderId, BundleFileLoader, Hasher>;

//====================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    None,
    CheckBundle,
    Loading,
    Checking,
    Success,
    Fail,
}

//--------------------------------------------------

pub(crate) enum RequestKind {
    Asset { asset_type: Option<TypeId> },
    SubAssets { asset_type: Option<TypeId> },
    Scene { params: SceneLoadParams },
}

pub(crate) enum ProviderSource {
    Bundled {
        owner: LoaderId,
        depends: Vec<LoaderId>,
    },
    Database,
}

//====================================================================

// One provider per distinct requested path, reference counted across every
// outstanding request for that path.
pub(crate) struct Provider {
    asset_path: String,
    kind: RequestKind,
    source: ProviderSource,
    state: ProviderState,
    ref_count: u32,
    sync_request: bool,
    load_request: Option<Box<dyn AssetLoadRequest>>,
    shared: Arc<ProviderShared>,
}

impl Provider {
    pub(crate) fn new(
        id: ProviderId,
        asset_path: String,
        kind: RequestKind,
        source: ProviderSource,
    ) -> Self {
        log::trace!("Creating provider '{}'", asset_path);

        let shared = Arc::new(ProviderShared::new(id, asset_path.clone()));

        Self {
            asset_path,
            kind,
            source,
            state: ProviderState::None,
            ref_count: 0,
            sync_request: false,
            load_request: None,
            shared,
        }
    }

    #[inline]
    pub(crate) fn asset_path(&self) -> &str {
        &self.asset_path
    }

    #[inline]
    pub(crate) fn shared(&self) -> Arc<ProviderShared> {
        self.shared.clone()
    }

    #[inline]
    pub(crate) fn state(&self) -> ProviderState {
        self.state
    }

    #[inline]
    pub(crate) fn is_done(&self) -> bool {
        matches!(self.state, ProviderState::Success | ProviderState::Fail)
    }

    #[inline]
    pub(crate) fn is_scene(&self) -> bool {
        matches!(self.kind, RequestKind::Scene { .. })
    }

    #[inline]
    pub(crate) fn ref_count(&self) -> u32 {
        self.ref_count
    }

    #[inline]
    pub(crate) fn reference(&mut self) {
        self.ref_count += 1;
    }

    #[inline]
    pub(crate) fn release(&mut self) {
        self.ref_count = self.ref_count.saturating_sub(1);
    }

    #[inline]
    pub(crate) fn can_destroy(&self) -> bool {
        self.ref_count == 0 && self.is_done()
    }

    #[inline]
    pub(crate) fn set_sync_request(&mut self) {
        self.sync_request = true;
    }

    pub(crate) fn referenced_loaders(&self) -> impl Iterator<Item = LoaderId> + '_ {
        let (owner, depends) = match &self.source {
            ProviderSource::Bundled { owner, depends } => (Some(*owner), depends.as_slice()),
            ProviderSource::Database => (None, [].as_slice()),
        };

        owner.into_iter().chain(depends.iter().copied())
    }

    //--------------------------------------------------

    // A provider may legitimately pass through several states in one tick;
    // the loop stops once a step blocks without transitioning.
    pub(crate) fn update(&mut self, loaders: &mut LoaderMap, mode: &SystemMode) {
        if self.is_done() {
            return;
        }

        loop {
            let before = self.state;
            self.step(loaders, mode);

            if self.state == before || self.is_done() {
                break;
            }
        }
    }

    fn step(&mut self, loaders: &mut LoaderMap, mode: &SystemMode) {
        match self.state {
            ProviderState::None => self.state = ProviderState::CheckBundle,
            ProviderState::CheckBundle => self.check_bundle(loaders, mode),
            ProviderState::Loading => self.begin_load(loaders, mode),
            ProviderState::Checking => self.check_result(loaders),
            ProviderState::Success | ProviderState::Fail => {}
        }
    }

    fn check_bundle(&mut self, loaders: &mut LoaderMap, mode: &SystemMode) {
        match &self.source {
            ProviderSource::Database => {
                let SystemMode::Simulation { database } = mode else {
                    unreachable!("database provider outside simulation mode");
                };

                match database.contains(&self.asset_path) {
                    true => self.state = ProviderState::Loading,
                    false => {
                        self.fail(format!("Asset not found in database: '{}'", self.asset_path))
                    }
                }
            }

            ProviderSource::Bundled { owner, depends } => {
                let SystemMode::Bundled { backend, .. } = mode else {
                    unreachable!("bundled provider outside bundled mode");
                };

                let owner = *owner;

                if self.sync_request {
                    for id in depends.clone() {
                        if let Some(loader) = loaders.get_mut(&id) {
                            loader.wait_for_done(backend.as_ref());
                        }
                    }
                    if let Some(loader) = loaders.get_mut(&owner) {
                        loader.wait_for_done(backend.as_ref());
                    }
                }

                // Blocked until every dependency and the owner are terminal.
                let pending = |id: &LoaderId| loaders.get(id).is_some_and(|l| !l.is_done());
                if depends.iter().any(pending) {
                    return;
                }

                let Some(owner_loader) = loaders.get(&owner) else {
                    self.fail(format!(
                        "Owning bundle loader is missing for asset '{}'",
                        self.asset_path
                    ));
                    return;
                };

                if !owner_loader.is_done() {
                    return;
                }

                match owner_loader.contents() {
                    Some(_) => self.state = ProviderState::Loading,
                    None => self.fail(format!(
                        "Failed to open bundle '{}' for asset '{}'",
                        owner_loader.bundle_info().bundle_name,
                        self.asset_path
                    )),
                }
            }
        }
    }

    fn begin_load(&mut self, loaders: &mut LoaderMap, mode: &SystemMode) {
        let request = match &self.source {
            ProviderSource::Database => {
                let SystemMode::Simulation { database } = mode else {
                    unreachable!("database provider outside simulation mode");
                };

                match &self.kind {
                    RequestKind::Asset { asset_type } => {
                        database.load_asset(&self.asset_path, *asset_type)
                    }
                    RequestKind::SubAssets { asset_type } => {
                        database.load_sub_assets(&self.asset_path, *asset_type)
                    }
                    RequestKind::Scene { params } => database.load_scene(&self.asset_path, params),
                }
            }

            ProviderSource::Bundled { owner, .. } => {
                let Some(contents) = loaders.get(owner).and_then(|l| l.contents()).cloned() else {
                    self.fail(format!(
                        "Owning bundle is no longer open for asset '{}'",
                        self.asset_path
                    ));
                    return;
                };

                match &self.kind {
                    RequestKind::Asset { asset_type } => {
                        contents.load_asset(&self.asset_path, *asset_type)
                    }
                    RequestKind::SubAssets { asset_type } => {
                        contents.load_sub_assets(&self.asset_path, *asset_type)
                    }
                    RequestKind::Scene { params } => contents.load_scene(&self.asset_path, params),
                }
            }
        };

        self.load_request = Some(request);
        self.state = ProviderState::Checking;
    }

    fn check_result(&mut self, loaders: &LoaderMap) {
        let Some(request) = self.load_request.as_mut() else {
            self.fail(format!("Load request vanished for asset '{}'", self.asset_path));
            return;
        };

        let value = match self.sync_request {
            true => {
                // Suspends the caller until the backend finishes. Costly.
                log::warn!(
                    "Suspending the caller thread to load asset '{}'.",
                    self.asset_path
                );
                request.wait()
            }
            false => match request.poll() {
                LoadPoll::Pending => return,
                LoadPoll::Done(value) => value,
            },
        };

        self.load_request = None;

        match value {
            Some(value) => self.succeed(value),
            None => {
                let origin = match &self.source {
                    ProviderSource::Database => "database".to_string(),
                    ProviderSource::Bundled { owner, .. } => loaders
                        .get(owner)
                        .map(|l| format!("bundle '{}'", l.bundle_info().bundle_name))
                        .unwrap_or_else(|| "bundle".to_string()),
                };

                self.fail(format!(
                    "Failed to load asset '{}' from {}",
                    self.asset_path, origin
                ));
            }
        }
    }

    fn succeed(&mut self, value: LoadedValue) {
        self.state = ProviderState::Success;
        self.shared
            .complete(LoadStatus::Success, Some(value), String::new());
    }

    fn fail(&mut self, error: String) {
        log::warn!("{}", error);
        self.state = ProviderState::Fail;
        self.shared.complete(LoadStatus::Failed, None, error);
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        log::trace!("Dropping provider '{}'", self.asset_path);
    }
}

//====================================================================
