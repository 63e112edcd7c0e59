use super::{
    Capability, CapabilityTable, RequestStrategy, StorageCapabilityState, reduce_grants,
};
use std::collections::HashMap;

/// OS permission primitives the engine needs. Implemented by each host.
pub trait CapabilityPlatform {
    /// Running OS version, as used for capability table lookup
    fn sdk_version(&self) -> u32;

    /// Whether `capability` is currently held
    fn is_granted(&self, capability: Capability) -> bool;

    /// Show the system multi-permission prompt. The result is delivered later
    /// through `Orchestrator::on_permission_result`.
    fn launch_permission_prompt(&mut self, capabilities: &[Capability]);

    /// Open the system settings surface for the broad-access toggle. No result is
    /// delivered; the host reports the next lifecycle resume instead.
    fn open_broad_access_settings(&mut self);

    /// Whether the app still runs under the legacy (pre-scoped) storage model
    fn is_legacy_storage(&self) -> bool;
}

/// Queries the capability state for the running OS version. Side-effect free.
#[derive(Debug, Clone)]
pub struct CapabilityProbe {
    table: CapabilityTable,
}

impl CapabilityProbe {
    pub fn new(table: CapabilityTable) -> Self {
        Self { table }
    }

    pub fn probe<P: CapabilityPlatform + ?Sized>(&self, platform: &P) -> StorageCapabilityState {
        let sdk_version = platform.sdk_version();
        let Some(rule) = self.table.rule_for(sdk_version) else {
            log::debug!("No capability rule for SDK {sdk_version}, nothing required");
            return StorageCapabilityState::Granted;
        };

        let state = match rule.strategy {
            // One toggle covers the whole set
            RequestStrategy::BroadAccess => {
                if rule
                    .capabilities
                    .iter()
                    .all(|capability| platform.is_granted(*capability))
                {
                    StorageCapabilityState::Granted
                } else {
                    StorageCapabilityState::Denied
                }
            }
            RequestStrategy::Itemized => {
                let results: HashMap<Capability, bool> = rule
                    .capabilities
                    .iter()
                    .map(|capability| (*capability, platform.is_granted(*capability)))
                    .collect();
                reduce_grants(&rule.capabilities, &results)
            }
        };

        log::debug!("Capability probe on SDK {sdk_version}: {state:?}");
        state
    }
}
