//! Recovery dialogs: which choices each failure branch offers and where each choice leads.

use crate::error::FlowError;
use std::path::{Path, PathBuf};

/// Named failure state that determines the offered choice set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryBranch {
    CapabilityDenied,
    /// Workdir is missing but could be created (also the first-run case)
    Creatable(PathBuf),
    Unusable(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryChoice {
    /// Validate the same path again
    Retry,
    RetryPermissions,
    PickOther,
    CreateHere,
    Exit,
}

const CREATABLE_CHOICES: &[RecoveryChoice] = &[
    RecoveryChoice::Retry,
    RecoveryChoice::PickOther,
    RecoveryChoice::CreateHere,
    RecoveryChoice::Exit,
];
const UNUSABLE_CHOICES: &[RecoveryChoice] = &[RecoveryChoice::PickOther, RecoveryChoice::Exit];
const DENIED_CHOICES: &[RecoveryChoice] =
    &[RecoveryChoice::RetryPermissions, RecoveryChoice::Exit];

impl RecoveryBranch {
    pub fn choices(&self) -> &'static [RecoveryChoice] {
        match self {
            RecoveryBranch::CapabilityDenied => DENIED_CHOICES,
            RecoveryBranch::Creatable(_) => CREATABLE_CHOICES,
            RecoveryBranch::Unusable(_) => UNUSABLE_CHOICES,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            RecoveryBranch::CapabilityDenied => None,
            RecoveryBranch::Creatable(path) | RecoveryBranch::Unusable(path) => Some(path),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RecoveryBranch::CapabilityDenied => "RecoveringDenied",
            RecoveryBranch::Creatable(_) => "RecoveringCreatable",
            RecoveryBranch::Unusable(_) => "RecoveringUnusable",
        }
    }
}

/// The single next step a recovery choice leads to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    RequestCapabilities,
    Revalidate(PathBuf),
    OpenPicker { hint: Option<PathBuf> },
    Initialize(PathBuf),
    Exit,
}

/// Everything a host needs to render a recovery dialog.
///
/// Titles and messages are string keys; localization is up to the host. Dialogs are
/// modal and have no cancel action: the host must not dismiss them on back navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryDialog {
    pub branch: RecoveryBranch,
    pub title_key: &'static str,
    pub message_key: &'static str,
    pub choices: Vec<RecoveryChoice>,
}

impl RecoveryDialog {
    pub fn for_branch(branch: &RecoveryBranch) -> Self {
        let (title_key, message_key) = match branch {
            RecoveryBranch::CapabilityDenied => ("alert", "permission_request_failed"),
            RecoveryBranch::Creatable(_) => ("alert", "workdir_not_exists"),
            RecoveryBranch::Unusable(_) => ("error", "workdir_cannot_create"),
        };
        Self {
            branch: branch.clone(),
            title_key,
            message_key,
            choices: branch.choices().to_vec(),
        }
    }

    pub fn is_cancellable(&self) -> bool {
        false
    }
}

/// Map a user choice in `branch` to the next flow action.
///
/// Choices that the branch does not offer are rejected.
pub fn resolve_choice(
    branch: &RecoveryBranch,
    choice: RecoveryChoice,
) -> Result<NextAction, FlowError> {
    if !branch.choices().contains(&choice) {
        return Err(FlowError::InvalidChoice {
            choice,
            branch: branch.clone(),
        });
    }

    let action = match (branch, choice) {
        (_, RecoveryChoice::Exit) => NextAction::Exit,
        (_, RecoveryChoice::RetryPermissions) => NextAction::RequestCapabilities,
        (RecoveryBranch::Creatable(path), RecoveryChoice::Retry) => {
            NextAction::Revalidate(path.clone())
        }
        (RecoveryBranch::Creatable(path), RecoveryChoice::CreateHere) => {
            NextAction::Initialize(path.clone())
        }
        // Start the picker at the missing path so "create a folder there" is one step away
        (RecoveryBranch::Creatable(path), RecoveryChoice::PickOther) => NextAction::OpenPicker {
            hint: Some(path.clone()),
        },
        (_, RecoveryChoice::PickOther) => NextAction::OpenPicker { hint: None },
        (branch, choice) => {
            return Err(FlowError::InvalidChoice {
                choice,
                branch: branch.clone(),
            });
        }
    };
    Ok(action)
}
