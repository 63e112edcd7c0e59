mod common;

use common::{LEGACY, Platform, flow, pump};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::fs;
use storage_gate_engine::{
    FlowState, PickerOutcome, RecoveryBranch, RecoveryChoice, Trigger, ValidationResult,
};
use tempfile::TempDir;

#[test]
fn creatable_workdir_is_created_on_request() {
    // Given a granted platform and a missing workdir under a writable parent
    let storage = TempDir::new().unwrap();
    fs::create_dir_all(storage.path().join("storage/app")).unwrap();
    let workdir = storage.path().join("storage/app/dir");
    let (mut flow, rx) = flow(Platform::itemized(&LEGACY), Some(workdir.clone()));

    // When the app launches
    flow.trigger(Trigger::Launch).unwrap();
    pump(&mut flow, &rx);

    // Then the creatable dialog is shown
    assert_eq!(
        flow.state(),
        &FlowState::Recovering {
            entry: storage_gate_engine::Entry::Startup {
                workdir: workdir.clone()
            },
            branch: RecoveryBranch::Creatable(workdir.clone())
        }
    );
    assert_eq!(
        flow.ui().dialogs[0].choices,
        vec![
            RecoveryChoice::Retry,
            RecoveryChoice::PickOther,
            RecoveryChoice::CreateHere,
            RecoveryChoice::Exit
        ]
    );

    // When the user creates it here
    flow.on_choice(RecoveryChoice::CreateHere).unwrap();
    pump(&mut flow, &rx);

    // Then it exists with its layout and is the persisted workdir
    assert_eq!(
        flow.state(),
        &FlowState::Ready {
            workdir: workdir.clone()
        }
    );
    assert!(workdir.join("data").is_dir());
    assert_eq!(
        storage_gate_engine::workdir::validate(&workdir),
        ValidationResult::Ready(workdir.clone())
    );
    assert_eq!(flow.reader().workdir(), Some(workdir));
}

#[test]
fn granted_request_proceeds_to_validation() {
    let storage = TempDir::new().unwrap();
    let workdir = storage.path().to_path_buf();
    let (mut flow, rx) = flow(Platform::itemized(&[]), Some(workdir.clone()));

    flow.trigger(Trigger::Launch).unwrap();
    assert_eq!(flow.platform_mut().prompts, 1);

    // The user grants everything in the system prompt
    flow.platform_mut().granted.extend(LEGACY);
    flow.on_permission_result(&HashMap::from(LEGACY.map(|capability| (capability, true))))
        .unwrap();
    assert!(matches!(
        flow.state(),
        FlowState::ValidatingWorkdir { .. }
    ));
    pump(&mut flow, &rx);

    assert!(flow.ui().dialogs.is_empty());
    assert_eq!(flow.state(), &FlowState::Ready { workdir });
}

#[test]
fn file_in_the_way_is_replaced_by_picked_folder() {
    let storage = TempDir::new().unwrap();
    let workdir = storage.path().join("dir");
    fs::write(&workdir, "not a directory").unwrap();
    let picked = storage.path().join("dir2");
    fs::create_dir(&picked).unwrap();
    let (mut flow, rx) = flow(Platform::itemized(&LEGACY), Some(workdir.clone()));

    flow.trigger(Trigger::Launch).unwrap();
    pump(&mut flow, &rx);
    assert_eq!(
        flow.ui().dialogs[0].branch,
        RecoveryBranch::Unusable(workdir.clone())
    );

    flow.on_choice(RecoveryChoice::PickOther).unwrap();
    assert_eq!(flow.ui().pickers, vec![None]);
    flow.on_folder_picked(PickerOutcome::Picked(picked.display().to_string()))
        .unwrap();
    pump(&mut flow, &rx);

    assert_eq!(
        flow.state(),
        &FlowState::Ready {
            workdir: picked.clone()
        }
    );
    assert_eq!(flow.reader().workdir(), Some(picked.clone()));
    assert_eq!(flow.ui().ready, vec![(picked, true)]);
}

#[test]
fn denied_twice_then_exit_leaves_workdir_unset() {
    let (mut flow, _rx) = flow(Platform::itemized(&[]), None);
    let reader = flow.reader();

    flow.trigger(Trigger::Launch).unwrap();
    flow.on_permission_result(&HashMap::new()).unwrap();
    assert_eq!(
        flow.ui().dialogs.last().unwrap().branch,
        RecoveryBranch::CapabilityDenied
    );

    // One retry round, still denied
    flow.on_choice(RecoveryChoice::RetryPermissions).unwrap();
    assert_eq!(flow.platform_mut().prompts, 2);
    flow.on_permission_result(&HashMap::new()).unwrap();
    assert_eq!(flow.ui().dialogs.len(), 2);

    flow.on_choice(RecoveryChoice::Exit).unwrap();

    assert_eq!(flow.state(), &FlowState::Exited);
    assert!(flow.ui().exited);
    assert_eq!(reader.workdir(), None);
    assert_eq!(reader.generation(), 0);
}

#[test]
fn cancelled_pick_represents_same_dialog() {
    let storage = TempDir::new().unwrap();
    let workdir = storage.path().join("dir");
    let (mut flow, rx) = flow(Platform::itemized(&LEGACY), Some(workdir.clone()));
    let reader = flow.reader();

    flow.trigger(Trigger::Launch).unwrap();
    pump(&mut flow, &rx);
    flow.on_choice(RecoveryChoice::PickOther).unwrap();
    assert_eq!(flow.ui().pickers, vec![Some(workdir.clone())]);

    flow.on_folder_picked(PickerOutcome::Cancelled).unwrap();

    let dialogs = &flow.ui().dialogs;
    assert_eq!(dialogs.len(), 2);
    assert_eq!(dialogs[0], dialogs[1]);
    assert_eq!(reader.workdir(), Some(workdir));
    assert_eq!(reader.generation(), 0);
}

#[test]
fn retry_revalidates_after_external_fix() {
    let storage = TempDir::new().unwrap();
    let workdir = storage.path().join("dir");
    let (mut flow, rx) = flow(Platform::itemized(&LEGACY), Some(workdir.clone()));

    flow.trigger(Trigger::Launch).unwrap();
    pump(&mut flow, &rx);

    // Created by someone else while the dialog was up
    fs::create_dir(&workdir).unwrap();
    flow.on_choice(RecoveryChoice::Retry).unwrap();
    pump(&mut flow, &rx);

    assert_eq!(flow.state(), &FlowState::Ready { workdir });
    assert_eq!(flow.ui().dialogs.len(), 1);
}

#[test]
fn creation_race_enters_unusable_branch() {
    let storage = TempDir::new().unwrap();
    let parent = storage.path().join("parent");
    fs::create_dir(&parent).unwrap();
    let workdir = parent.join("dir");
    let (mut flow, rx) = flow(Platform::itemized(&LEGACY), Some(workdir.clone()));

    flow.trigger(Trigger::Launch).unwrap();
    pump(&mut flow, &rx);
    fs::remove_dir(&parent).unwrap();
    flow.on_choice(RecoveryChoice::CreateHere).unwrap();
    pump(&mut flow, &rx);

    assert_eq!(
        flow.ui().dialogs.last().unwrap().branch,
        RecoveryBranch::Unusable(workdir.clone())
    );
    assert_eq!(flow.reader().workdir(), Some(workdir));
    assert_eq!(flow.reader().generation(), 0);
}

#[test]
fn change_folder_from_settings_notifies_readers() {
    let storage = TempDir::new().unwrap();
    let current = storage.path().join("current");
    let next = storage.path().join("next");
    fs::create_dir(&current).unwrap();
    fs::create_dir(&next).unwrap();
    let (mut flow, rx) = flow(Platform::itemized(&LEGACY), Some(current.clone()));
    let changes = flow.reader().watch();

    flow.trigger(Trigger::Launch).unwrap();
    pump(&mut flow, &rx);
    flow.trigger(Trigger::ChangeFolder).unwrap();
    assert_eq!(flow.ui().pickers, vec![Some(current)]);

    flow.on_folder_picked(PickerOutcome::Picked(format!("file://{}", next.display())))
        .unwrap();
    pump(&mut flow, &rx);

    assert_eq!(changes.try_recv().unwrap(), next);
    assert_eq!(flow.reader().workdir(), Some(next));
}
