//====================================================================

use std::{any::TypeId, collections::HashMap, sync::Arc};

use crate::{
    bundle_loader::{BundleFileLoader, LoaderId},
    handle::{AssetHandle, ProviderId, Receiver, ReferenceSignal, Sender},
    paths,
    provider::{Provider, ProviderSource, ProviderState, RequestKind},
    services::{
        AssetDatabase, BundleBackend, BundleInfo, BundleServices, DecryptServices,
        SceneLoadParams,
    },
    Hasher,
};

//====================================================================

#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    #[error("operation '{0}' is not supported in the current run mode")]
    NotSupported(&'static str),

    #[error("invalid system descriptor: {0}")]
    InvalidDescriptor(String),
}

//====================================================================

pub enum SystemMode {
    Simulation {
        database: Box<dyn AssetDatabase>,
    },
    Bundled {
        services: Arc<dyn BundleServices>,
        backend: Box<dyn BundleBackend>,
    },
}

pub struct SystemDescriptor {
    pub location_root: String,
    pub asset_loading_max_number: usize,
    pub mode: SystemMode,
    // Overrides the manifest's encryption flag when present. Bundled mode only.
    pub decrypt_services: Option<Box<dyn DecryptServices>>,
}

//====================================================================

// The process-wide registry of loaders and providers. Explicitly owned by
// the caller; every state machine advances only inside `update`.
pub struct AssetSystem {
    mode: SystemMode,
    location_root: String,
    loading_max_number: usize,
    decrypt_services: Option<Box<dyn DecryptServices>>,

    loaders: HashMap<LoaderId, BundleFileLoader, Hasher>,
    loader_lookup: HashMap<String, LoaderId, Hasher>,
    loader_order: Vec<LoaderId>,
    next_loader_id: u32,

    providers: HashMap<ProviderId, Provider, Hasher>,
    provider_lookup: HashMap<String, ProviderId, Hasher>,
    provider_order: Vec<ProviderId>,
    next_provider_id: u32,

    sender: Sender,
    receiver: Receiver,
}

impl AssetSystem {
    pub fn new(descriptor: SystemDescriptor) -> Result<Self, AssetError> {
        if descriptor.asset_loading_max_number == 0 {
            return Err(AssetError::InvalidDescriptor(
                "asset_loading_max_number must be at least 1".to_string(),
            ));
        }

        let (sender, receiver) = crossbeam::channel::unbounded();

        Ok(Self {
            mode: descriptor.mode,
            location_root: paths::regular_path(&descriptor.location_root),
            loading_max_number: descriptor.asset_loading_max_number,
            decrypt_services: descriptor.decrypt_services,

            loaders: HashMap::default(),
            loader_lookup: HashMap::default(),
            loader_order: Vec::new(),
            next_loader_id: 0,

            providers: HashMap::default(),
            provider_lookup: HashMap::default(),
            provider_order: Vec::new(),
            next_provider_id: 0,

            sender,
            receiver,
        })
    }

    #[inline]
    pub fn is_simulation(&self) -> bool {
        matches!(self.mode, SystemMode::Simulation { .. })
    }

    #[inline]
    pub fn location_root(&self) -> &str {
        &self.location_root
    }

    //--------------------------------------------------
    // Requests

    pub fn load_asset(&mut self, location: &str, asset_type: Option<TypeId>) -> AssetHandle {
        self.request(location, RequestKind::Asset { asset_type })
    }

    pub fn load_sub_assets(&mut self, location: &str, asset_type: Option<TypeId>) -> AssetHandle {
        self.request(location, RequestKind::SubAssets { asset_type })
    }

    pub fn load_scene(&mut self, location: &str, params: SceneLoadParams) -> AssetHandle {
        self.request(location, RequestKind::Scene { params })
    }

    fn request(&mut self, location: &str, kind: RequestKind) -> AssetHandle {
        let asset_path = paths::combine_asset_path(&self.location_root, location);

        // At most one in-flight provider per distinct path.
        if let Some(id) = self.provider_lookup.get(&asset_path) {
            if let Some(provider) = self.providers.get(id) {
                return AssetHandle::new(provider.shared(), self.sender.clone());
            }
        }

        let services = match &self.mode {
            SystemMode::Simulation { .. } => None,
            SystemMode::Bundled { services, .. } => Some(services.clone()),
        };

        let source = match services {
            None => ProviderSource::Database,
            Some(services) => self.materialize_bundled_source(&services, &asset_path),
        };

        let id = ProviderId(self.next_provider_id);
        self.next_provider_id += 1;

        let provider = Provider::new(id, asset_path.clone(), kind, source);
        let handle = AssetHandle::new(provider.shared(), self.sender.clone());

        self.providers.insert(id, provider);
        self.provider_lookup.insert(asset_path, id);
        self.provider_order.push(id);

        handle
    }

    // The owner loader plus one loader per dependency bundle, created before
    // the provider ever reaches CheckBundle. Live loaders are reused by name.
    fn materialize_bundled_source(
        &mut self,
        services: &Arc<dyn BundleServices>,
        asset_path: &str,
    ) -> ProviderSource {
        let owner_name = services
            .bundle_name_for_asset(asset_path)
            .unwrap_or_default();
        let owner = self.loader_for_bundle(services, &owner_name);

        let depends = services
            .dependencies_for_asset(asset_path)
            .iter()
            .map(|name| self.loader_for_bundle(services, name))
            .collect();

        ProviderSource::Bundled { owner, depends }
    }

    fn loader_for_bundle(
        &mut self,
        services: &Arc<dyn BundleServices>,
        bundle_name: &str,
    ) -> LoaderId {
        if let Some(id) = self.loader_lookup.get(bundle_name) {
            return *id;
        }

        let mut info = match bundle_name.is_empty() {
            true => BundleInfo::unresolved(bundle_name),
            false => services.bundle_info(bundle_name),
        };

        if let Some(decrypt) = &self.decrypt_services {
            info.is_encrypted = decrypt.is_encrypted(&info.bundle_name);
        }

        let id = LoaderId(self.next_loader_id);
        self.next_loader_id += 1;

        self.loaders.insert(id, BundleFileLoader::new(info));
        self.loader_lookup.insert(bundle_name.to_string(), id);
        self.loader_order.push(id);

        id
    }

    //--------------------------------------------------
    // Polling

    pub fn update(&mut self) {
        self.drain_reference_signals();

        // Loaders always advance before providers so a provider observing a
        // ready loader sees a consistent view within the tick.
        let loader_ids = self.loader_order.clone();
        for id in loader_ids {
            if let SystemMode::Bundled { backend, .. } = &self.mode {
                if let Some(loader) = self.loaders.get_mut(&id) {
                    loader.update(backend.as_ref());
                }
            }
        }

        // Snapshot: requests issued while the tick runs may grow the list.
        let provider_ids = self.provider_order.clone();
        let mut loading_count = 0;

        for id in provider_ids {
            let Some(provider) = self.providers.get_mut(&id) else {
                continue;
            };

            // Scene loads are never throttled.
            match provider.is_scene() {
                true => provider.update(&mut self.loaders, &self.mode),
                false => {
                    if loading_count < self.loading_max_number {
                        provider.update(&mut self.loaders, &self.mode);
                    }
                    if !provider.is_done() {
                        loading_count += 1;
                    }
                }
            }
        }

        // Stale scene objects must never linger in a simulated session.
        if self.is_simulation() {
            let dead: Vec<ProviderId> = self
                .provider_order
                .iter()
                .copied()
                .filter(|id| {
                    self.providers
                        .get(id)
                        .is_some_and(|p| p.is_scene() && p.can_destroy())
                })
                .collect();

            self.destroy_providers(&dead);
        }
    }

    //--------------------------------------------------
    // Collection

    pub fn unload_unused(&mut self) {
        self.drain_reference_signals();

        // Providers first, then any loader no remaining provider references;
        // teardown order stays dependency safe.
        let dead: Vec<ProviderId> = self
            .provider_order
            .iter()
            .copied()
            .filter(|id| self.providers.get(id).is_some_and(|p| p.can_destroy()))
            .collect();

        self.destroy_providers(&dead);
        self.destroy_unreferenced_loaders();
    }

    pub fn force_unload_all(&mut self) {
        log::warn!("Force unloading all providers and loaders.");

        self.providers.clear();
        self.provider_lookup.clear();
        self.provider_order.clear();

        self.loaders.clear();
        self.loader_lookup.clear();
        self.loader_order.clear();
    }

    fn destroy_providers(&mut self, ids: &[ProviderId]) {
        if ids.is_empty() {
            return;
        }

        for id in ids {
            if let Some(provider) = self.providers.remove(id) {
                self.provider_lookup.remove(provider.asset_path());
            }
        }

        let providers = &self.providers;
        self.provider_order.retain(|id| providers.contains_key(id));
    }

    fn destroy_unreferenced_loaders(&mut self) {
        let mut live: std::collections::HashSet<LoaderId, Hasher> = Default::default();
        for provider in self.providers.values() {
            live.extend(provider.referenced_loaders());
        }

        let dead: Vec<LoaderId> = self
            .loader_order
            .iter()
            .copied()
            .filter(|id| !live.contains(id))
            .collect();

        if dead.is_empty() {
            return;
        }

        for id in dead {
            if let Some(loader) = self.loaders.remove(&id) {
                self.loader_lookup.remove(&loader.bundle_info().bundle_name);
            }
        }

        let loaders = &self.loaders;
        self.loader_order.retain(|id| loaders.contains_key(id));
    }

    fn drain_reference_signals(&mut self) {
        loop {
            let signal = match self.receiver.try_recv() {
                Ok(signal) => signal,
                Err(crossbeam::channel::TryRecvError::Empty) => break,
                Err(crossbeam::channel::TryRecvError::Disconnected) => {
                    unreachable!("reference signal channel disconnected")
                }
            };

            match signal {
                ReferenceSignal::Increase(id) => {
                    if let Some(provider) = self.providers.get_mut(&id) {
                        provider.reference();
                    }
                }
                ReferenceSignal::Decrease(id) => {
                    // The provider may already be gone after a forced unload.
                    if let Some(provider) = self.providers.get_mut(&id) {
                        provider.release();
                    }
                }
            }
        }
    }

    //--------------------------------------------------
    // The blocking escape hatch. Never called by the scheduler itself.

    pub fn wait_for_done(&mut self, handle: &AssetHandle) {
        let id = handle.provider_id();

        let Some(provider) = self.providers.get_mut(&id) else {
            return;
        };

        if provider.is_done() {
            return;
        }

        log::warn!(
            "Waiting for asset '{}' to finish loading on the caller thread.",
            provider.asset_path()
        );

        provider.set_sync_request();
        loop {
            provider.update(&mut self.loaders, &self.mode);
            if provider.is_done() {
                break;
            }
        }
    }

    //--------------------------------------------------
    // Queries

    pub fn bundle_info_for_asset(&self, location: &str) -> Result<BundleInfo, AssetError> {
        match &self.mode {
            SystemMode::Simulation { .. } => {
                log::warn!("Simulation mode cannot resolve bundle info.");
                Err(AssetError::NotSupported("bundle_info_for_asset"))
            }
            SystemMode::Bundled { services, .. } => {
                let asset_path = paths::combine_asset_path(&self.location_root, location);
                let bundle_name = services
                    .bundle_name_for_asset(&asset_path)
                    .unwrap_or_default();
                Ok(services.bundle_info(&bundle_name))
            }
        }
    }

    #[inline]
    pub fn loader_count(&self) -> usize {
        self.loaders.len()
    }

    #[inline]
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn provider_state(&self, location: &str) -> Option<ProviderState> {
        let asset_path = paths::combine_asset_path(&self.location_root, location);
        let id = self.provider_lookup.get(&asset_path)?;
        self.providers.get(id).map(|provider| provider.state())
    }

    pub fn provider_ref_count(&self, location: &str) -> Option<u32> {
        let asset_path = paths::combine_asset_path(&self.location_root, location);
        let id = self.provider_lookup.get(&asset_path)?;
        self.providers.get(id).map(|provider| provider.ref_count())
    }
}

//====================================================================


//====================================================================
