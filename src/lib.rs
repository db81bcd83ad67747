//====================================================================

pub mod manifest {
    pub use patchbay_manifest::{
        remove_extension, split_tags, ManifestError, PatchAsset, PatchBundle, PatchManifest,
        ResourceSettings,
    };
}

pub mod builder {
    pub use patchbay_builder::{
        build_manifest, load_manifest_file, make_bundle_name, write_manifest_files,
        AssetBuildInfo, BuildError, BuildParameters, BundleBuildInfo, FileHashServices,
        HashServices,
    };
}

pub mod assets {
    pub use patchbay_assets::{
        AssetData, AssetDatabase, AssetError, AssetHandle, AssetLoadRequest, AssetObject,
        AssetSystem, BundleBackend, BundleFileLoader, BundleInfo, BundleOpenRequest,
        BundleServices, CacheError, DecryptServices, HostPlayMode, LoadOutcome, LoadPoll,
        LoadStatus, LoadedValue, LoaderState, OfflinePlayMode, OpenBundle, OpenPoll,
        OperationStatus, PatchCache, ProviderState, SceneLoadParams, SystemDescriptor,
        SystemMode,
    };
}

//====================================================================

#[cfg(test)]
mod tests {
    use std::{any::TypeId, sync::Arc};

    use crate::{
        assets::{
            AssetLoadRequest, AssetSystem, BundleBackend, BundleInfo, BundleOpenRequest,
            LoadPoll, LoadStatus, LoadedValue, OfflinePlayMode, OpenBundle, OpenPoll,
            OperationStatus, SceneLoadParams, SystemDescriptor, SystemMode,
        },
        builder::{
            build_manifest, write_manifest_files, AssetBuildInfo, BuildParameters,
            BundleBuildInfo, FileHashServices,
        },
        manifest::ResourceSettings,
    };

    //--------------------------------------------------
    // A backend that reads published bundle files straight off the disk.

    struct FsBackend;

    struct FsOpenRequest {
        result: Option<anyhow::Result<Arc<dyn OpenBundle>>>,
    }

    struct FsBundle {
        bytes: Vec<u8>,
    }

    struct FsLoadRequest {
        value: Option<LoadedValue>,
    }

    impl BundleBackend for FsBackend {
        fn open_bundle(&self, info: &BundleInfo) -> Box<dyn BundleOpenRequest> {
            let result = std::fs::read(&info.local_path)
                .map(|bytes| Arc::new(FsBundle { bytes }) as Arc<dyn OpenBundle>)
                .map_err(anyhow::Error::from);

            Box::new(FsOpenRequest {
                result: Some(result),
            })
        }
    }

    impl BundleOpenRequest for FsOpenRequest {
        fn poll(&mut self) -> OpenPoll {
            match self.result.take() {
                Some(result) => OpenPoll::Done(result),
                None => OpenPoll::Pending,
            }
        }

        fn wait(&mut self) -> anyhow::Result<Arc<dyn OpenBundle>> {
            self.result
                .take()
                .unwrap_or_else(|| Err(anyhow::anyhow!("already resolved")))
        }
    }

    impl OpenBundle for FsBundle {
        fn load_asset(
            &self,
            _asset_name: &str,
            _asset_type: Option<TypeId>,
        ) -> Box<dyn AssetLoadRequest> {
            Box::new(FsLoadRequest {
                value: Some(LoadedValue::Asset(Arc::new(self.bytes.clone()))),
            })
        }

        fn load_sub_assets(
            &self,
            _asset_name: &str,
            _asset_type: Option<TypeId>,
        ) -> Box<dyn AssetLoadRequest> {
            Box::new(FsLoadRequest {
                value: Some(LoadedValue::SubAssets(vec![Arc::new(self.bytes.clone())])),
            })
        }

        fn load_scene(
            &self,
            _scene_path: &str,
            _params: &SceneLoadParams,
        ) -> Box<dyn AssetLoadRequest> {
            Box::new(FsLoadRequest {
                value: Some(LoadedValue::Asset(Arc::new(self.bytes.clone()))),
            })
        }
    }

    impl AssetLoadRequest for FsLoadRequest {
        fn poll(&mut self) -> LoadPoll {
            LoadPoll::Done(self.value.take())
        }

        fn wait(&mut self) -> Option<LoadedValue> {
            self.value.take()
        }
    }

    //--------------------------------------------------

    // Publish a build, bootstrap the offline play mode from it, then load an
    // asset through the full registry stack.
    #[test]
    fn publish_and_load_round_trip() {
        let _ = env_logger::builder().is_test(true).try_init();

        let output = tempfile::tempdir().unwrap();
        let settings = ResourceSettings::default();
        let hasher = FileHashServices;

        std::fs::write(output.path().join("base.bundle"), b"base-payload").unwrap();
        std::fs::write(output.path().join("units.bundle"), b"units-payload").unwrap();

        let params = BuildParameters {
            build_version: 1,
            buildin_tags: String::new(),
            force_rebuild: true,
            append_hash_extension: false,
            output_dir: output.path().to_path_buf(),
            settings: settings.clone(),
        };

        let bundles = vec![
            BundleBuildInfo {
                bundle_name: "base.bundle".to_string(),
                is_raw_file: false,
                is_encrypted: false,
                tags: Vec::new(),
                assets: Vec::new(),
            },
            BundleBuildInfo {
                bundle_name: "units.bundle".to_string(),
                is_raw_file: false,
                is_encrypted: false,
                tags: Vec::new(),
                assets: vec![AssetBuildInfo {
                    asset_path: "char/hero.prefab".to_string(),
                    depend_bundles: vec!["base.bundle".to_string()],
                }],
            },
        ];

        let manifest = build_manifest(&params, &bundles, &hasher).unwrap();
        write_manifest_files(&manifest, &params, &hasher).unwrap();

        // Packaging names every published file after its content hash.
        for bundle in &manifest.bundle_list {
            std::fs::copy(
                output.path().join(&bundle.bundle_name),
                output.path().join(&bundle.hash),
            )
            .unwrap();
        }

        let mut play_mode = OfflinePlayMode::new(output.path(), settings);
        play_mode.initialize();
        while !play_mode.is_done() {
            play_mode.update();
        }
        assert_eq!(play_mode.status(), OperationStatus::Succeed);

        let mut system = AssetSystem::new(SystemDescriptor {
            location_root: String::new(),
            asset_loading_max_number: 8,
            mode: SystemMode::Bundled {
                services: Arc::new(play_mode),
                backend: Box::new(FsBackend),
            },
            decrypt_services: None,
        })
        .unwrap();

        let handle = system.load_asset("char/hero.prefab", None);

        // Owner and dependency loaders both materialize.
        assert_eq!(system.loader_count(), 2);

        while !handle.is_done() {
            system.update();
        }

        assert_eq!(handle.status(), LoadStatus::Success);
        let bytes = handle.asset().unwrap().downcast_arc::<Vec<u8>>().ok().unwrap();
        assert_eq!(*bytes, b"units-payload");

        drop(handle);
        system.unload_unused();
        assert_eq!(system.provider_count(), 0);
        assert_eq!(system.loader_count(), 0);
    }
}
