//! Storage capabilities and the OS-version policy that decides which ones are needed.

mod probe;
mod requester;
mod table;

pub use probe::{CapabilityPlatform, CapabilityProbe};
pub use requester::{CapabilityRequester, RequestOutcome};
pub use table::{CapabilityRule, CapabilityTable, RequestStrategy, TableError};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// An OS-granted permission relevant to storage outside the app sandbox.
///
/// Serialized as the platform identifier so capability tables read like the
/// platform's own manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "android.permission.READ_EXTERNAL_STORAGE")]
    ReadExternalStorage,
    #[serde(rename = "android.permission.WRITE_EXTERNAL_STORAGE")]
    WriteExternalStorage,
    #[serde(rename = "android.permission.MANAGE_EXTERNAL_STORAGE")]
    ManageExternalStorage,
    #[serde(rename = "android.permission.READ_MEDIA_AUDIO")]
    ReadMediaAudio,
    #[serde(rename = "android.permission.READ_MEDIA_IMAGES")]
    ReadMediaImages,
    #[serde(rename = "android.permission.READ_MEDIA_VIDEO")]
    ReadMediaVideo,
    #[serde(rename = "android.permission.REQUEST_INSTALL_PACKAGES")]
    RequestInstallPackages,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::ReadExternalStorage,
        Capability::WriteExternalStorage,
        Capability::ManageExternalStorage,
        Capability::ReadMediaAudio,
        Capability::ReadMediaImages,
        Capability::ReadMediaVideo,
        Capability::RequestInstallPackages,
    ];

    pub fn identifier(&self) -> &'static str {
        match self {
            Capability::ReadExternalStorage => "android.permission.READ_EXTERNAL_STORAGE",
            Capability::WriteExternalStorage => "android.permission.WRITE_EXTERNAL_STORAGE",
            Capability::ManageExternalStorage => "android.permission.MANAGE_EXTERNAL_STORAGE",
            Capability::ReadMediaAudio => "android.permission.READ_MEDIA_AUDIO",
            Capability::ReadMediaImages => "android.permission.READ_MEDIA_IMAGES",
            Capability::ReadMediaVideo => "android.permission.READ_MEDIA_VIDEO",
            Capability::RequestInstallPackages => "android.permission.REQUEST_INSTALL_PACKAGES",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown capability identifier: {0}")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|capability| capability.identifier() == s)
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

/// Result of a capability probe or request round.
///
/// Derived fresh every time; never cached across flow passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageCapabilityState {
    #[default]
    Unknown,
    Granted,
    PartiallyGranted,
    Denied,
}

impl StorageCapabilityState {
    /// Only a full grant lets the flow proceed; partial grants count as denial.
    pub fn is_granted(&self) -> bool {
        matches!(self, StorageCapabilityState::Granted)
    }
}

/// Reduce per-capability grant results over the requested set.
///
/// A requested capability missing from `results` counts as denied.
pub fn reduce_grants(
    requested: &[Capability],
    results: &HashMap<Capability, bool>,
) -> StorageCapabilityState {
    let granted = requested
        .iter()
        .filter(|capability| results.get(capability).copied().unwrap_or(false))
        .count();

    if granted == requested.len() {
        StorageCapabilityState::Granted
    } else if granted > 0 {
        StorageCapabilityState::PartiallyGranted
    } else {
        StorageCapabilityState::Denied
    }
}
