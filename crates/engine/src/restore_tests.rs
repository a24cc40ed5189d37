// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

struct Fixture {
    dir: tempfile::TempDir,
    manager: RestoreManager,
    settings: Settings,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.backup_root = dir.path().join("backup");
    settings.run_dir = dir.path().join("run");
    settings.log_dir = dir.path().join("log");
    settings.config_dir = dir.path().join("etc");
    let store = StateStore::open(settings.state_dir()).unwrap();
    let manager = RestoreManager::new(Arc::new(Mutex::new(settings.clone())), store);
    Fixture { dir, manager, settings }
}

fn seed_snapshot(fx: &Fixture, host: &str, snapshot: &str) {
    let root = fx.settings.host_root(host).join(snapshot);
    std::fs::create_dir_all(root.join("files/etc")).unwrap();
    std::fs::write(root.join("files/etc/hostname"), format!("{host}\n")).unwrap();
    std::fs::create_dir_all(root.join("sql")).unwrap();
    std::fs::write(root.join("sql/mysql-app.sql.gz"), b"dump").unwrap();
}

fn request(host: &str, snapshot: &str) -> RestoreRequest {
    RestoreRequest {
        hostname: host.to_string(),
        snapshot: snapshot.to_string(),
        path: None,
        target: None,
        mode: RestoreMode::Files,
        format: ArchiveFormat::TarGz,
        decrypt: false,
    }
}

async fn wait_terminal(manager: &RestoreManager, id: &str) -> TaskStatus {
    for _ in 0..100 {
        let records = manager.list_restores().unwrap();
        if let Some(record) = records.iter().find(|r| r.id == id) {
            if record.status != TaskStatus::Running {
                return record.status;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("restore never finished");
}

#[tokio::test]
async fn unknown_snapshot_is_rejected() {
    let fx = fixture();
    let err = fx.manager.start_restore(request("web1", "2026-02-08")).unwrap_err();
    assert!(matches!(err, EngineError::UnknownSnapshot { .. }));
}

#[tokio::test]
async fn file_restore_copies_subtree_to_target() {
    let fx = fixture();
    seed_snapshot(&fx, "web1", "2026-02-08");
    let target = fx.dir.path().join("out");
    let mut req = request("web1", "2026-02-08");
    req.target = Some(target.clone());

    let record = fx.manager.start_restore(req).unwrap();
    assert_eq!(record.status, TaskStatus::Running);
    assert_eq!(wait_terminal(&fx.manager, &record.id).await, TaskStatus::Completed);
    assert_eq!(std::fs::read_to_string(target.join("etc/hostname")).unwrap(), "web1\n");
}

#[tokio::test]
async fn path_scoped_restore_copies_single_file() {
    let fx = fixture();
    seed_snapshot(&fx, "web1", "2026-02-08");
    let target = fx.dir.path().join("hostname.copy");
    let mut req = request("web1", "2026-02-08");
    req.path = Some("etc/hostname".to_string());
    req.target = Some(target.clone());

    let record = fx.manager.start_restore(req).unwrap();
    assert_eq!(wait_terminal(&fx.manager, &record.id).await, TaskStatus::Completed);
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "web1\n");
}

#[tokio::test]
async fn db_restore_copies_sql_dumps() {
    let fx = fixture();
    seed_snapshot(&fx, "db1", "2026-02-08");
    let target = fx.dir.path().join("sqlout");
    let mut req = request("db1", "2026-02-08");
    req.mode = RestoreMode::Db;
    req.target = Some(target.clone());

    let record = fx.manager.start_restore(req).unwrap();
    assert_eq!(wait_terminal(&fx.manager, &record.id).await, TaskStatus::Completed);
    assert!(target.join("mysql-app.sql.gz").exists());
}

#[tokio::test]
async fn archive_restore_writes_an_archive_file() {
    let fx = fixture();
    seed_snapshot(&fx, "web1", "2026-02-08");
    let target = fx.dir.path().join("archives");
    let mut req = request("web1", "2026-02-08");
    req.mode = RestoreMode::Archive;
    req.target = Some(target.clone());

    let record = fx.manager.start_restore(req).unwrap();
    assert_eq!(wait_terminal(&fx.manager, &record.id).await, TaskStatus::Completed);
    assert!(target.join("web1-2026-02-08.tar.gz").exists());
}

#[tokio::test]
async fn missing_restore_path_fails_the_task() {
    let fx = fixture();
    seed_snapshot(&fx, "web1", "2026-02-08");
    let mut req = request("web1", "2026-02-08");
    req.path = Some("no/such/path".to_string());
    let record = fx.manager.start_restore(req).unwrap();
    assert_eq!(wait_terminal(&fx.manager, &record.id).await, TaskStatus::Failed);
}

#[tokio::test]
async fn encrypted_only_snapshot_requires_opt_in() {
    let fx = fixture();
    let snapshot_dir = fx.settings.host_root("web1").join("2026-02-08");
    std::fs::create_dir_all(&snapshot_dir).unwrap();
    std::fs::write(snapshot_dir.join("files.tar.gz.gpg"), b"sealed").unwrap();

    let err = fx.manager.start_restore(request("web1", "2026-02-08")).unwrap_err();
    assert!(matches!(err, EngineError::EncryptedSnapshot));
}

#[tokio::test]
async fn delete_restore_removes_record_and_log() {
    let fx = fixture();
    seed_snapshot(&fx, "web1", "2026-02-08");
    let record = fx.manager.start_restore(request("web1", "2026-02-08")).unwrap();
    wait_terminal(&fx.manager, &record.id).await;

    fx.manager.delete_restore(&record.id).unwrap();
    assert!(fx.manager.list_restores().unwrap().is_empty());
    assert!(!fx.settings.log_dir.join(&record.logfile).exists());

    let err = fx.manager.delete_restore(&record.id).unwrap_err();
    assert!(matches!(err, EngineError::RestoreNotFound(_)));
}

#[tokio::test]
async fn clear_restores_drops_terminal_records() {
    let fx = fixture();
    seed_snapshot(&fx, "web1", "2026-02-08");
    let record = fx.manager.start_restore(request("web1", "2026-02-08")).unwrap();
    wait_terminal(&fx.manager, &record.id).await;
    assert_eq!(fx.manager.clear_restores().unwrap(), 1);
    assert!(fx.manager.list_restores().unwrap().is_empty());
}

#[tokio::test]
async fn restore_log_reports_tail_and_running_flag() {
    let fx = fixture();
    seed_snapshot(&fx, "web1", "2026-02-08");
    let record = fx.manager.start_restore(request("web1", "2026-02-08")).unwrap();
    wait_terminal(&fx.manager, &record.id).await;
    let (tail, running) = fx.manager.restore_log(&record.logfile).unwrap();
    assert!(!running);
    assert!(tail.iter().any(|line| line.contains("restore finished")));
}

#[tokio::test]
async fn delete_task_removes_host_tree_and_completes() {
    let fx = fixture();
    seed_snapshot(&fx, "old-host", "2026-01-01");
    let record = fx.manager.start_delete("old-host").unwrap();
    assert_eq!(record.status, TaskStatus::Running);

    for _ in 0..100 {
        let deletes = fx.manager.list_deletes().unwrap();
        if deletes.iter().any(|d| d.hostname == "old-host" && d.status == TaskStatus::Completed) {
            assert!(!fx.settings.host_root("old-host").exists());
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("delete task never completed");
}
