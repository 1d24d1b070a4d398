//! Where the controller and each camera live.
//!
//! Defaults come from configuration; addresses persisted in the settings store (by a
//! previous Wi-Fi setup) override them. Camera addresses follow the controller:
//! camera `N` sits at the controller's last octet plus `N`, on port 80.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use log::{info, warn};

use crate::camera::types::CameraId;
use crate::error_handling::types::StorageError;
use crate::gateway::EndpointAddress;
use crate::storage::settings_store::{SettingsStore, KEY_CAM_IPS, KEY_MAIN_IP};

pub const CAMERA_PORT: u16 = 80;

#[derive(Debug, Clone, PartialEq)]
pub struct Addresses {
    pub controller: EndpointAddress,
    pub cameras: BTreeMap<CameraId, EndpointAddress>,
}

impl Addresses {
    /// Controller plus the four cameras at `a.b.c.(d+N):80`. Cameras whose last
    /// octet would overflow are left unconfigured.
    pub fn derived_from(controller: EndpointAddress) -> Self {
        let cameras = CameraId::ALL
            .into_iter()
            .filter_map(|cam| {
                controller
                    .neighbour(cam.get(), CAMERA_PORT)
                    .map(|address| (cam, address))
            })
            .collect();
        Self {
            controller,
            cameras,
        }
    }

    pub fn camera(&self, cam: CameraId) -> Option<EndpointAddress> {
        self.cameras.get(&cam).copied()
    }
}

pub struct AddressBook {
    settings: Arc<dyn SettingsStore>,
    current: RwLock<Addresses>,
}

impl AddressBook {
    pub fn load(settings: Arc<dyn SettingsStore>, defaults: Addresses) -> Self {
        let mut addresses = defaults;

        if let Some(raw) = settings.get(KEY_MAIN_IP) {
            match EndpointAddress::parse(&raw) {
                Ok(controller) => addresses.controller = controller,
                Err(e) => warn!("Ignoring persisted controller address: {}", e),
            }
        }

        if let Some(raw) = settings.get(KEY_CAM_IPS) {
            match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(persisted) => {
                    for (id, address) in persisted {
                        let cam = id.parse::<i64>().ok().and_then(|id| CameraId::new(id).ok());
                        match (cam, EndpointAddress::parse(&address)) {
                            (Some(cam), Ok(address)) => {
                                addresses.cameras.insert(cam, address);
                            }
                            _ => warn!("Ignoring persisted camera address {} = {}", id, address),
                        }
                    }
                }
                Err(e) => warn!("Ignoring persisted camera addresses: {}", e),
            }
        }

        Self {
            settings,
            current: RwLock::new(addresses),
        }
    }

    pub fn controller(&self) -> EndpointAddress {
        self.snapshot().controller
    }

    pub fn camera(&self, cam: CameraId) -> Option<EndpointAddress> {
        self.snapshot().camera(cam)
    }

    pub fn snapshot(&self) -> Addresses {
        match self.current.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replaces every address and persists the new book.
    pub fn update(&self, addresses: Addresses) -> Result<(), StorageError> {
        let cameras: BTreeMap<String, String> = addresses
            .cameras
            .iter()
            .map(|(cam, address)| (cam.to_string(), address.to_string()))
            .collect();
        let cameras = serde_json::to_string(&cameras).map_err(|_| StorageError::WriteFailed)?;

        info!("Controller address set to {}", addresses.controller);
        if let Ok(mut current) = self.current.write() {
            *current = addresses.clone();
        }
        self.settings
            .set(KEY_MAIN_IP, &addresses.controller.to_string())?;
        self.settings.set(KEY_CAM_IPS, &cameras)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::settings_store::MemorySettings;

    fn addr(raw: &str) -> EndpointAddress {
        EndpointAddress::parse(raw).unwrap()
    }

    fn cam(id: i64) -> CameraId {
        CameraId::new(id).unwrap()
    }

    #[test]
    fn derives_cameras_from_controller() {
        let book = Addresses::derived_from(addr("10.0.0.20"));
        assert_eq!(book.camera(cam(1)), Some(addr("10.0.0.21:80")));
        assert_eq!(book.camera(cam(4)), Some(addr("10.0.0.24:80")));

        let edge = Addresses::derived_from(addr("10.0.0.253"));
        assert_eq!(edge.camera(cam(2)), Some(addr("10.0.0.255:80")));
        assert_eq!(edge.camera(cam(3)), None);
    }

    #[test]
    fn persisted_addresses_override_defaults() {
        let settings = Arc::new(MemorySettings::new());
        settings.set(KEY_MAIN_IP, "http://192.168.1.50/").unwrap();
        settings
            .set(KEY_CAM_IPS, r#"{"2":"192.168.1.99:8080","7":"1.2.3.4","3":"nope"}"#)
            .unwrap();

        let book = AddressBook::load(settings, Addresses::derived_from(addr("192.168.4.1")));
        assert_eq!(book.controller(), addr("192.168.1.50"));
        assert_eq!(book.camera(cam(2)), Some(addr("192.168.1.99:8080")));
        assert_eq!(book.camera(cam(3)), Some(addr("192.168.4.4:80")));
    }

    #[test]
    fn update_round_trips_through_settings() {
        let settings = Arc::new(MemorySettings::new());
        let book = AddressBook::load(settings.clone(), Addresses::derived_from(addr("192.168.4.1")));
        book.update(Addresses::derived_from(addr("172.16.0.10"))).unwrap();

        assert_eq!(settings.get(KEY_MAIN_IP).as_deref(), Some("172.16.0.10"));
        let reloaded = AddressBook::load(settings, Addresses::derived_from(addr("192.168.4.1")));
        assert_eq!(reloaded.snapshot(), Addresses::derived_from(addr("172.16.0.10")));
    }
}
