use std::fs;
use std::path::PathBuf;

use pathwiz_core::{
    CheckState, CompletedStep, FsError, Operation, PermissionSpec, Resolution, RootPath,
    StepAction,
};
use pathwiz_ops::{FilesystemManager, PermissionsManager, Subfolder};
use tempfile::TempDir;

fn sandbox() -> (TempDir, RootPath) {
    let temp = TempDir::new().unwrap();
    let root = RootPath::new(temp.path()).unwrap();
    (temp, root)
}

fn spec(bits: u32) -> PermissionSpec {
    PermissionSpec::new(bits).unwrap()
}

#[cfg(unix)]
fn mode_of(path: &std::path::Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).unwrap().permissions().mode() & 0o777
}

#[cfg(unix)]
#[tokio::test]
async fn test_create_folder_with_permissions_and_subfolders() {
    let (_temp, root) = sandbox();
    let target = root.resolve("p").unwrap();

    let entry = FilesystemManager::new()
        .create_folder(&target, false, Some(spec(0o755)), &["a".into(), "b".into()])
        .await
        .unwrap();

    assert_eq!(entry.subfolders, vec![PathBuf::from("p/a"), PathBuf::from("p/b")]);
    assert_eq!(mode_of(target.absolute()), 0o755);
    assert_eq!(mode_of(&target.absolute().join("a")), 0o755);
    assert_eq!(mode_of(&target.absolute().join("b")), 0o755);
    assert_eq!(entry.permissions, Some(spec(0o755)));
}

#[cfg(unix)]
#[tokio::test]
async fn test_requested_mode_wins_over_umask() {
    let (_temp, root) = sandbox();
    let target = root.resolve("wide").unwrap();

    FilesystemManager::new()
        .create_folder(&target, false, Some(spec(0o777)), &[])
        .await
        .unwrap();

    assert_eq!(mode_of(target.absolute()), 0o777);
}

#[tokio::test]
async fn test_nested_layout_is_depth_first() {
    let (_temp, root) = sandbox();
    let target = root.resolve("project").unwrap();
    let layout = vec![
        Subfolder::with_children("src", vec!["bin".into(), "lib".into()]),
        Subfolder::new("docs"),
    ];

    let entry = FilesystemManager::new()
        .create_folder(&target, false, None, &layout)
        .await
        .unwrap();

    assert_eq!(
        entry.subfolders,
        vec![
            PathBuf::from("project/src"),
            PathBuf::from("project/src/bin"),
            PathBuf::from("project/src/lib"),
            PathBuf::from("project/docs"),
        ]
    );
    assert!(target.absolute().join("src/lib").is_dir());
}

#[tokio::test]
async fn test_overwrite_replaces_contents() {
    let (_temp, root) = sandbox();
    let target = root.resolve("p").unwrap();
    fs::create_dir(target.absolute()).unwrap();
    fs::write(target.absolute().join("old.txt"), "old").unwrap();

    let err = FilesystemManager::new()
        .create_folder(&target, false, None, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, FsError::AlreadyExists { .. }));
    assert!(target.absolute().join("old.txt").exists());

    let entry = FilesystemManager::new()
        .create_folder(&target, true, None, &["fresh".into()])
        .await
        .unwrap();
    assert!(!target.absolute().join("old.txt").exists());
    assert!(target.absolute().join("fresh").is_dir());

    assert_eq!(
        entry.steps,
        vec![
            CompletedStep::new(target.absolute(), StepAction::RemovedExisting),
            CompletedStep::new(target.absolute(), StepAction::CreatedFolder),
            CompletedStep::new(target.absolute().join("fresh"), StepAction::CreatedSubfolder),
        ]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_interrupted_overwrite_is_partial() {
    use std::os::unix::fs::PermissionsExt;
    use std::process::Command;

    let (_temp, root) = sandbox();
    let target = root.resolve("p").unwrap();
    let locked = target.absolute().join("locked");
    let pinned = locked.join("pinned.txt");
    fs::create_dir_all(&locked).unwrap();
    fs::write(target.absolute().join("loose.txt"), "x").unwrap();
    fs::write(&pinned, "x").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

    // The superuser ignores mode bits, so pin the file with the immutable
    // flag instead where the filesystem supports it.
    let privileged = fs::File::create(locked.join("writable")).is_ok();
    if privileged {
        let pinned_ok = Command::new("chattr")
            .arg("+i")
            .arg(&pinned)
            .status()
            .is_ok_and(|status| status.success());
        if !pinned_ok {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }
    }

    let result = FilesystemManager::new()
        .create_folder(&target, true, None, &[])
        .await;

    if privileged {
        let _ = Command::new("chattr").arg("-i").arg(&pinned).status();
    }
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    let err = result.unwrap_err();
    assert!(err.is_partial());
    assert_eq!(
        err.completed_steps(),
        &[CompletedStep::new(target.absolute(), StepAction::RemovalStarted)]
    );
    assert!(matches!(err.root_cause(), FsError::PermissionDenied { .. }));
    assert!(pinned.exists());
}

#[tokio::test]
async fn test_overwrite_never_replaces_a_file() {
    let (_temp, root) = sandbox();
    let target = root.resolve("plain.txt").unwrap();
    fs::write(target.absolute(), "data").unwrap();

    let err = FilesystemManager::new()
        .create_folder(&target, true, None, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, FsError::AlreadyExists { .. }));
    assert_eq!(fs::read_to_string(target.absolute()).unwrap(), "data");
}

#[tokio::test]
async fn test_subfolder_failure_is_partial() {
    let (_temp, root) = sandbox();
    let target = root.resolve("p").unwrap();

    let err = FilesystemManager::new()
        .create_folder(&target, false, None, &["a".into(), "a".into()])
        .await
        .unwrap_err();

    let FsError::PartialFailure {
        operation,
        completed,
        source,
        ..
    } = &err
    else {
        panic!("expected partial failure, got {err:?}");
    };
    assert_eq!(*operation, Operation::CreateFolder);
    assert!(matches!(**source, FsError::AlreadyExists { .. }));

    let actions: Vec<_> = completed.iter().map(|s| s.action).collect();
    assert_eq!(actions, vec![StepAction::CreatedFolder, StepAction::CreatedSubfolder]);
    assert!(completed[0].touches(target.absolute()));

    // No rollback.
    assert!(target.absolute().join("a").is_dir());
}

#[tokio::test]
async fn test_create_file_requires_parent() {
    let (_temp, root) = sandbox();
    let target = root.resolve("missing/f.txt").unwrap();

    let err = FilesystemManager::new()
        .create_file(&target, false)
        .await
        .unwrap_err();
    assert!(matches!(err, FsError::NotFound { .. }));
}

#[tokio::test]
async fn test_create_file_overwrite_truncates() {
    let (_temp, root) = sandbox();
    let target = root.resolve("f.txt").unwrap();
    fs::write(target.absolute(), "content").unwrap();

    let err = FilesystemManager::new()
        .create_file(&target, false)
        .await
        .unwrap_err();
    assert!(matches!(err, FsError::AlreadyExists { .. }));

    let entry = FilesystemManager::new()
        .create_file(&target, true)
        .await
        .unwrap();
    assert_eq!(entry.path, PathBuf::from("f.txt"));
    assert_eq!(fs::metadata(target.absolute()).unwrap().len(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_check_permissions_states() {
    use std::os::unix::fs::PermissionsExt;

    let (_temp, root) = sandbox();
    let target = root.resolve("f.txt").unwrap();
    fs::write(target.absolute(), "x").unwrap();
    fs::set_permissions(target.absolute(), fs::Permissions::from_mode(0o644)).unwrap();

    let manager = PermissionsManager::new();

    let matched = manager.check_permissions(&target, spec(0o644), false).await;
    assert_eq!(CheckState::of(&matched), CheckState::Matched);

    let reported = manager.check_permissions(&target, spec(0o600), false).await;
    assert_eq!(CheckState::of(&reported), CheckState::MismatchReported);
    let report = reported.unwrap().unwrap();
    assert_eq!(report.observed, spec(0o644));
    assert_eq!(mode_of(target.absolute()), 0o644);

    let resolved = manager.check_permissions(&target, spec(0o600), true).await;
    assert_eq!(CheckState::of(&resolved), CheckState::MismatchResolved);
    assert_eq!(mode_of(target.absolute()), 0o600);

    let again = manager.check_permissions(&target, spec(0o600), false).await;
    assert!(again.unwrap().is_none());
}

#[tokio::test]
async fn test_check_permissions_missing_path() {
    let (_temp, root) = sandbox();
    let target = root.resolve("missing").unwrap();

    let result = PermissionsManager::new()
        .check_permissions(&target, spec(0o644), true)
        .await;
    assert!(matches!(result, Err(FsError::NotFound { .. })));
    assert_eq!(CheckState::of(&result), CheckState::Unchecked);
}

#[cfg(unix)]
#[tokio::test]
async fn test_get_file_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let (_temp, root) = sandbox();
    let target = root.resolve("f.txt").unwrap();
    fs::write(target.absolute(), "x").unwrap();
    fs::set_permissions(target.absolute(), fs::Permissions::from_mode(0o640)).unwrap();

    let observed = PermissionsManager::new()
        .get_file_permissions(&target)
        .await
        .unwrap();
    assert_eq!(observed, spec(0o640));
    assert_eq!(observed.to_rwx(), "rw-r-----");
}

#[cfg(unix)]
#[tokio::test]
async fn test_check_permissions_recursive() {
    use std::os::unix::fs::PermissionsExt;

    let (_temp, root) = sandbox();
    let base = root.as_path();
    for dir in ["tree", "tree/b", "tree/a", "tree/a/deep"] {
        fs::create_dir(base.join(dir)).unwrap();
        fs::set_permissions(base.join(dir), fs::Permissions::from_mode(0o755)).unwrap();
    }
    fs::set_permissions(base.join("tree/a/deep"), fs::Permissions::from_mode(0o700)).unwrap();
    fs::set_permissions(base.join("tree/b"), fs::Permissions::from_mode(0o711)).unwrap();
    fs::write(base.join("tree/file.txt"), "x").unwrap();

    let target = root.resolve("tree").unwrap();
    let manager = PermissionsManager::new();

    let reported = manager
        .check_permissions_recursive(&target, spec(0o755), false)
        .await
        .unwrap();
    let paths: Vec<_> = reported.iter().map(|m| m.path.clone()).collect();
    assert_eq!(paths, vec![base.join("tree/a/deep"), base.join("tree/b")]);
    assert!(reported.iter().all(|m| m.resolution == Resolution::NotAttempted));

    let resolved = manager
        .check_permissions_recursive(&target, spec(0o755), true)
        .await
        .unwrap();
    assert_eq!(resolved.len(), 2);
    assert_eq!(mode_of(&base.join("tree/a/deep")), 0o755);

    let clean = manager
        .check_permissions_recursive(&target, spec(0o755), false)
        .await
        .unwrap();
    assert!(clean.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_recursive_check_error_keeps_earlier_reports() {
    use std::os::unix::fs::PermissionsExt;

    let (_temp, root) = sandbox();
    let base = root.as_path();
    for dir in ["tree", "tree/a", "tree/b", "tree/b/inner"] {
        fs::create_dir(base.join(dir)).unwrap();
        fs::set_permissions(base.join(dir), fs::Permissions::from_mode(0o755)).unwrap();
    }
    // Listable by nobody but the superuser, so the walk stops here.
    fs::set_permissions(base.join("tree/b"), fs::Permissions::from_mode(0o311)).unwrap();

    let privileged = fs::read_dir(base.join("tree/b")).is_ok();
    let target = root.resolve("tree").unwrap();
    let result = PermissionsManager::new()
        .check_permissions_recursive(&target, spec(0o700), false)
        .await;
    fs::set_permissions(base.join("tree/b"), fs::Permissions::from_mode(0o755)).unwrap();

    if privileged {
        assert_eq!(result.unwrap().len(), 4);
        return;
    }

    let err = result.unwrap_err();
    assert!(err.is_partial());
    assert!(matches!(err.root_cause(), FsError::PermissionDenied { .. }));

    let paths: Vec<_> = err.mismatches().iter().map(|m| m.path.clone()).collect();
    assert_eq!(
        paths,
        vec![base.join("tree"), base.join("tree/a"), base.join("tree/b")]
    );
    assert_eq!(err.mismatch().unwrap().observed, spec(0o311));
    assert_eq!(CheckState::of(&Err(err)), CheckState::MismatchReported);
}

#[test]
fn test_permissions_to_rwx_table() {
    let cases = [
        (0o755, "rwxr-xr-x"),
        (0o644, "rw-r--r--"),
        (0o700, "rwx------"),
        (0o000, "---------"),
    ];
    for (bits, text) in cases {
        assert_eq!(PermissionsManager::permissions_to_rwx(bits).unwrap(), text);
    }
    assert!(PermissionsManager::permissions_to_rwx(0o777 + 1).is_err());
}
