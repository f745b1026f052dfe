//! JSON file storage implementation.
//!
//! Stores one JSON file per record under `bookings/`, `milestones/` and
//! `tasks/`. Writes go through a temp file and a rename so a reader never sees
//! a half-written record, and a process-wide write lock makes the
//! compare-and-set on `version` atomic for this process.

use std::path::{Path, PathBuf};
use bookwork_core::{
    Booking, BookingId, Milestone, MilestoneId, Task, TaskCounts, TaskId,
};
use serde::{de::DeserializeOwned, Serialize};
use super::{Storage, StorageError, Result};
use crate::trait_::{check_version, keep_booking_progress, keep_milestone_progress};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStorage {
    /// Create storage, creating the record directories under `root` if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("bookings")).await?;
        fs::create_dir_all(root.join("milestones")).await?;
        fs::create_dir_all(root.join("tasks")).await?;

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn booking_path(&self, id: BookingId) -> PathBuf {
        self.root.join("bookings").join(format!("{}.json", id))
    }
    fn milestone_path(&self, id: MilestoneId) -> PathBuf {
        self.root.join("milestones").join(format!("{}.json", id))
    }
    fn task_path(&self, id: TaskId) -> PathBuf {
        self.root.join("tasks").join(format!("{}.json", id))
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_booking(&self, booking: &Booking) -> Result<u64> {
        let path = self.booking_path(booking.id);
        let _guard = self.write_lock.lock().await;

        let existing = read_json::<Booking>(&path).await?;
        check_version("booking", booking.id, booking.version, existing.as_ref().map(|b| b.version))?;

        let mut stored = booking.clone();
        if let Some(existing) = &existing {
            keep_booking_progress(&mut stored, existing);
        }
        stored.version += 1;
        write_json(&path, &stored).await?;
        Ok(stored.version)
    }

    async fn load_booking(&self, id: BookingId) -> Result<Option<Booking>> {
        read_json(&self.booking_path(id)).await
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>> {
        let mut bookings: Vec<Booking> = list_dir(&self.root.join("bookings")).await?;
        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(bookings)
    }

    async fn write_booking_progress(&self, id: BookingId, percentage: u8) -> Result<()> {
        let path = self.booking_path(id);
        let _guard = self.write_lock.lock().await;

        let mut booking: Booking = read_json(&path)
            .await?
            .ok_or_else(|| StorageError::not_found("booking", id))?;
        booking.progress_percentage = percentage;
        booking.updated_at = chrono::Utc::now();
        write_json(&path, &booking).await
    }

    async fn save_milestone(&self, milestone: &Milestone) -> Result<u64> {
        let path = self.milestone_path(milestone.id);
        let _guard = self.write_lock.lock().await;

        let existing = read_json::<Milestone>(&path).await?;
        check_version(
            "milestone",
            milestone.id,
            milestone.version,
            existing.as_ref().map(|m| m.version),
        )?;

        let mut stored = milestone.clone();
        if let Some(existing) = &existing {
            keep_milestone_progress(&mut stored, existing);
        }
        stored.version += 1;
        write_json(&path, &stored).await?;
        Ok(stored.version)
    }

    async fn load_milestone(&self, id: MilestoneId) -> Result<Option<Milestone>> {
        read_json(&self.milestone_path(id)).await
    }

    async fn list_milestones(&self, booking_id: BookingId) -> Result<Vec<Milestone>> {
        let all: Vec<Milestone> = list_dir(&self.root.join("milestones")).await?;
        let mut milestones: Vec<Milestone> = all
            .into_iter()
            .filter(|m| m.booking_id == booking_id)
            .collect();
        milestones.sort_by(|a, b| (a.position, a.id).cmp(&(b.position, b.id)));
        Ok(milestones)
    }

    async fn delete_milestone(&self, id: MilestoneId) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let owned: Vec<Task> = list_dir(&self.root.join("tasks")).await?;
        for task in owned.into_iter().filter(|t| t.milestone_id == id) {
            remove_if_exists(&self.task_path(task.id)).await?;
        }
        remove_if_exists(&self.milestone_path(id)).await?;
        debug!("Deleted milestone {} and its tasks", id);
        Ok(())
    }

    async fn write_milestone_progress(
        &self,
        id: MilestoneId,
        percentage: u8,
        counts: TaskCounts,
    ) -> Result<()> {
        let path = self.milestone_path(id);
        let _guard = self.write_lock.lock().await;

        let mut milestone: Milestone = read_json(&path)
            .await?
            .ok_or_else(|| StorageError::not_found("milestone", id))?;
        milestone.progress_percentage = percentage;
        milestone.completed_tasks = counts.completed;
        milestone.total_tasks = counts.total;
        milestone.updated_at = chrono::Utc::now();
        write_json(&path, &milestone).await
    }

    async fn save_task(&self, task: &Task) -> Result<u64> {
        let path = self.task_path(task.id);
        let _guard = self.write_lock.lock().await;

        let found = read_json::<Task>(&path).await?.map(|t| t.version);
        check_version("task", task.id, task.version, found)?;

        let mut stored = task.clone();
        stored.version += 1;
        write_json(&path, &stored).await?;
        Ok(stored.version)
    }

    async fn load_task(&self, id: TaskId) -> Result<Option<Task>> {
        read_json(&self.task_path(id)).await
    }

    async fn list_tasks(&self, milestone_id: MilestoneId) -> Result<Vec<Task>> {
        let all: Vec<Task> = list_dir(&self.root.join("tasks")).await?;
        let mut tasks: Vec<Task> = all
            .into_iter()
            .filter(|t| t.milestone_id == milestone_id)
            .collect();
        tasks.sort_by(|a, b| (a.position, a.id).cmp(&(b.position, b.id)));
        Ok(tasks)
    }

    async fn delete_task(&self, id: TaskId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        remove_if_exists(&self.task_path(id)).await
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json.as_bytes()).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    fs::remove_file(path).await.or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }
    })?;
    Ok(())
}

async fn list_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        match read_json(&path).await {
            Ok(Some(item)) => items.push(item),
            Ok(None) => {}
            Err(e) => warn!("Skipping unreadable record {}: {}", path.display(), e),
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();

        let booking = Booking::new("Website redesign");
        storage.save_booking(&booking).await.unwrap();

        let milestone = Milestone::new(booking.id, "Wireframes");
        storage.save_milestone(&milestone).await.unwrap();

        let task = Task::new(milestone.id, "Homepage");
        storage.save_task(&task).await.unwrap();

        // A second handle on the same directory sees everything.
        let reopened = JsonStorage::new(dir.path()).await.unwrap();
        let loaded = reopened.load_task(task.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Homepage");
        assert_eq!(loaded.version, 1);
        assert_eq!(reopened.list_milestones(booking.id).await.unwrap().len(), 1);
        assert_eq!(reopened.list_bookings().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_save_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();

        let task = Task::new(MilestoneId::new(), "Logo");
        storage.save_task(&task).await.unwrap();

        let mut a = storage.load_task(task.id).await.unwrap().unwrap();
        let mut b = a.clone();
        a.title = "Logo v2".to_string();
        b.title = "Logo v3".to_string();

        storage.save_task(&a).await.unwrap();
        let err = storage.save_task(&b).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { kind: "task", .. }));

        let stored = storage.load_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Logo v2");
    }

    #[tokio::test]
    async fn test_milestone_progress_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();

        let milestone = Milestone::new(BookingId::new(), "Build");
        storage.save_milestone(&milestone).await.unwrap();
        storage
            .write_milestone_progress(milestone.id, 83, TaskCounts { completed: 2, total: 3 })
            .await
            .unwrap();

        let loaded = storage.load_milestone(milestone.id).await.unwrap().unwrap();
        assert_eq!(loaded.progress_percentage, 83);
        assert_eq!(loaded.completed_tasks, 2);
        assert_eq!(loaded.total_tasks, 3);
    }

    #[tokio::test]
    async fn test_save_keeps_upserted_progress() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();

        let milestone = Milestone::new(BookingId::new(), "Build");
        storage.save_milestone(&milestone).await.unwrap();
        let mut snapshot = storage.load_milestone(milestone.id).await.unwrap().unwrap();

        // A cascade lands between the read and the save.
        storage
            .write_milestone_progress(milestone.id, 75, TaskCounts { completed: 3, total: 4 })
            .await
            .unwrap();

        snapshot.weight = Some(2.0);
        assert_eq!(storage.save_milestone(&snapshot).await.unwrap(), 2);

        let reopened = JsonStorage::new(dir.path()).await.unwrap();
        let loaded = reopened.load_milestone(milestone.id).await.unwrap().unwrap();
        assert_eq!(loaded.weight, Some(2.0));
        assert_eq!(loaded.progress_percentage, 75);
        assert_eq!((loaded.completed_tasks, loaded.total_tasks), (3, 4));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();

        let milestone = Milestone::new(BookingId::new(), "Ship");
        storage.save_milestone(&milestone).await.unwrap();
        let task = Task::new(milestone.id, "Deploy");
        storage.save_task(&task).await.unwrap();

        storage.delete_task(task.id).await.unwrap();
        storage.delete_task(task.id).await.unwrap();
        storage.delete_milestone(milestone.id).await.unwrap();

        assert!(storage.load_task(task.id).await.unwrap().is_none());
        assert!(storage.load_milestone(milestone.id).await.unwrap().is_none());
    }
}
