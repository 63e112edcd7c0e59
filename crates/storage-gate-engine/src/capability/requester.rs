use super::{Capability, CapabilityPlatform, CapabilityTable, RequestStrategy};

/// What a request round did. None of the variants carry a grant result; results
/// arrive later as host callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The multi-permission prompt is showing for these capabilities
    PromptShown(Vec<Capability>),
    /// The user was sent to the broad-access settings surface
    RedirectedToSettings,
    /// The running OS version requires nothing
    NothingToRequest,
}

/// Starts the interactive grant flow using the strategy the table assigns to the OS version.
#[derive(Debug, Clone)]
pub struct CapabilityRequester {
    table: CapabilityTable,
}

impl CapabilityRequester {
    pub fn new(table: CapabilityTable) -> Self {
        Self { table }
    }

    /// Never blocks: both strategies hand control to the platform and return.
    pub fn request_all<P: CapabilityPlatform + ?Sized>(&self, platform: &mut P) -> RequestOutcome {
        let sdk_version = platform.sdk_version();
        let Some(rule) = self.table.rule_for(sdk_version) else {
            return RequestOutcome::NothingToRequest;
        };

        match rule.strategy {
            RequestStrategy::Itemized => {
                log::info!(
                    "Requesting {} capabilities on SDK {sdk_version}",
                    rule.capabilities.len()
                );
                platform.launch_permission_prompt(&rule.capabilities);
                RequestOutcome::PromptShown(rule.capabilities.clone())
            }
            RequestStrategy::BroadAccess => {
                if rule
                    .capabilities
                    .iter()
                    .all(|capability| platform.is_granted(*capability))
                {
                    return RequestOutcome::NothingToRequest;
                }
                log::info!("Opening broad-access settings on SDK {sdk_version}");
                platform.open_broad_access_settings();
                RequestOutcome::RedirectedToSettings
            }
        }
    }
}
