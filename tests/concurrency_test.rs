//! Concurrency tests for Folio.
//!
//! These tests verify that concurrent writes into the same parent never
//! produce two siblings with the same name. They run against an on-disk
//! database with several pooled connections so the writers really race.

mod common;

use std::collections::HashSet;

use common::{disk_manager, NO_TAGS};
use folio::{Caller, NewFolder, Upload};
use tempfile::TempDir;

/// Test concurrent folder creation with the same name.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_folder_creation() {
    let temp = TempDir::new().unwrap();
    let manager = disk_manager(&temp).await;

    const NUM_FOLDERS: usize = 10;

    let mut handles = Vec::new();
    for _ in 0..NUM_FOLDERS {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager.create_folder(&NewFolder::new("Lecture", "root")).await
        }));
    }

    let mut names = HashSet::new();
    for handle in handles {
        let folder = handle.await.unwrap().unwrap();
        assert!(names.insert(folder.name.clone()), "duplicate {}", folder.name);
    }

    assert_eq!(names.len(), NUM_FOLDERS);
    assert!(names.contains("Lecture"));
    for n in 1..NUM_FOLDERS {
        assert!(names.contains(&format!("Lecture ({n})")));
    }
}

/// Test concurrent uploads with the same file name.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_uploads() {
    let temp = TempDir::new().unwrap();
    let manager = disk_manager(&temp).await;
    let folder = manager
        .create_folder(&NewFolder::new("Uploads", "root"))
        .await
        .unwrap()
        .id
        .to_string();

    const NUM_UPLOADS: usize = 8;

    let mut handles = Vec::new();
    for i in 0..NUM_UPLOADS {
        let manager = manager.clone();
        let folder = folder.clone();
        handles.push(tokio::spawn(async move {
            let upload = Upload::new("sheet.csv", format!("row,{i}").into_bytes());
            manager
                .create_document(&upload, &folder, NO_TAGS, &Caller::anonymous())
                .await
        }));
    }

    let mut names = HashSet::new();
    for handle in handles {
        let doc = handle.await.unwrap().unwrap();
        assert_eq!(manager.get_payload(&doc.id.to_string()).await.unwrap().len() as i64, doc.size);
        names.insert(doc.name);
    }
    assert_eq!(names.len(), NUM_UPLOADS);
    assert!(names.contains("sheet.csv"));
    for n in 1..NUM_UPLOADS {
        assert!(names.contains(&format!("sheet ({n}).csv")));
    }
}
