//! End-to-end progress scenarios through the work service.

use std::sync::Arc;
use async_trait::async_trait;
use bookwork_core::{BookingId, MilestoneId, TaskStatus};
use bookwork_progress::{
    booking_progress_of, milestone_progress, CascadeOrchestrator, NoopSink, RecomputeError,
    RemoteRecompute, Source,
};
use bookwork_storage::{MemoryStorage, Storage};
use bookwork_work::{
    BookingWorkManager, NewBooking, NewMilestone, NewTask, TaskUpdate, WorkError, WorkManager,
};

struct Unreachable;

#[async_trait]
impl RemoteRecompute for Unreachable {
    async fn recompute_milestone(&self, _id: MilestoneId) -> Result<u8, RecomputeError> {
        Err(RecomputeError::Unavailable("connection refused".into()))
    }

    async fn recompute_booking(&self, _id: BookingId) -> Result<u8, RecomputeError> {
        Err(RecomputeError::Unavailable("connection refused".into()))
    }
}

fn local_manager() -> (BookingWorkManager, Arc<dyn Storage>) {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let orchestrator = CascadeOrchestrator::new(storage.clone()).with_sink(Arc::new(NoopSink));
    (BookingWorkManager::new(Arc::new(orchestrator)), storage)
}

fn failing_remote_manager() -> (BookingWorkManager, Arc<dyn Storage>) {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let orchestrator = CascadeOrchestrator::new(storage.clone())
        .with_remote(Arc::new(Unreachable))
        .with_sink(Arc::new(NoopSink));
    (BookingWorkManager::new(Arc::new(orchestrator)), storage)
}

async fn booking(manager: &BookingWorkManager) -> BookingId {
    manager
        .create_booking(NewBooking {
            title: "Office move".into(),
            ..NewBooking::default()
        })
        .await
        .unwrap()
        .id
}

async fn milestone(manager: &BookingWorkManager, booking_id: BookingId, weight: f64) -> MilestoneId {
    manager
        .create_milestone(booking_id, NewMilestone::titled("Stage").weighted(weight))
        .await
        .unwrap()
        .record
        .id
}

fn with_status(title: &str, status: TaskStatus, progress: Option<u8>) -> NewTask {
    NewTask {
        status: Some(status),
        progress_percentage: progress,
        ..NewTask::titled(title)
    }
}

#[tokio::test]
async fn test_two_completed_and_one_half_done_is_83() {
    let (manager, _) = local_manager();
    let booking_id = booking(&manager).await;
    let milestone_id = milestone(&manager, booking_id, 1.0).await;

    manager
        .create_task(milestone_id, with_status("Pack", TaskStatus::Completed, None))
        .await
        .unwrap();
    manager
        .create_task(milestone_id, with_status("Label", TaskStatus::Completed, None))
        .await
        .unwrap();
    let last = manager
        .create_task(milestone_id, with_status("Load van", TaskStatus::InProgress, Some(50)))
        .await
        .unwrap();

    assert_eq!(last.cascade.milestone_progress(), Some(83));
    assert_eq!(last.cascade.booking_progress(), 83);

    let stored = manager.get_milestone(milestone_id).await.unwrap();
    assert_eq!(stored.progress_percentage, 83);
    assert_eq!((stored.completed_tasks, stored.total_tasks), (2, 3));
    assert_eq!(manager.get_booking(booking_id).await.unwrap().progress_percentage, 83);
}

#[tokio::test]
async fn test_weighted_milestones_80_and_40_give_50() {
    let (manager, _) = local_manager();
    let booking_id = booking(&manager).await;
    let light = milestone(&manager, booking_id, 1.0).await;
    let heavy = milestone(&manager, booking_id, 3.0).await;

    manager
        .create_task(light, with_status("Survey", TaskStatus::InProgress, Some(80)))
        .await
        .unwrap();
    let result = manager
        .create_task(heavy, with_status("Build", TaskStatus::InProgress, Some(40)))
        .await
        .unwrap();

    assert_eq!(result.cascade.milestone_progress(), Some(40));
    assert_eq!(result.cascade.booking_progress(), 50);
}

#[tokio::test]
async fn test_completing_last_task_reaches_100() {
    let (manager, _) = local_manager();
    let booking_id = booking(&manager).await;
    let milestone_id = milestone(&manager, booking_id, 1.0).await;

    for title in ["Book van", "Notify staff"] {
        manager
            .create_task(milestone_id, with_status(title, TaskStatus::Completed, None))
            .await
            .unwrap();
    }
    let last = manager
        .create_task(milestone_id, NewTask::titled("Hand over keys"))
        .await
        .unwrap();
    assert_eq!(last.cascade.milestone_progress(), Some(67));

    manager
        .update_task(last.record.id, TaskUpdate::status(TaskStatus::InProgress))
        .await
        .unwrap();
    let done = manager
        .update_task(last.record.id, TaskUpdate::status(TaskStatus::Completed))
        .await
        .unwrap();

    assert_eq!(done.record.progress_percentage, 100);
    assert_eq!(done.cascade.milestone_progress(), Some(100));
    assert_eq!(done.cascade.booking_progress(), 100);
}

#[tokio::test]
async fn test_repeated_update_is_idempotent() {
    let (manager, _) = local_manager();
    let booking_id = booking(&manager).await;
    let milestone_id = milestone(&manager, booking_id, 1.0).await;
    let task = manager
        .create_task(milestone_id, with_status("Wire desks", TaskStatus::InProgress, Some(10)))
        .await
        .unwrap()
        .record;
    manager
        .create_task(milestone_id, NewTask::titled("Test network"))
        .await
        .unwrap();

    let update = TaskUpdate::progress(70);
    let first = manager.update_task(task.id, update.clone()).await.unwrap();
    let second = manager.update_task(task.id, update).await.unwrap();

    assert_eq!(first.cascade.milestone_progress(), Some(35));
    assert_eq!(first.cascade.milestone_progress(), second.cascade.milestone_progress());
    assert_eq!(first.cascade.booking_progress(), second.cascade.booking_progress());
    assert_eq!(first.record.version, second.record.version);
}

#[tokio::test]
async fn test_reopening_completed_task_is_rejected() {
    let (manager, _) = local_manager();
    let booking_id = booking(&manager).await;
    let milestone_id = milestone(&manager, booking_id, 1.0).await;
    let task = manager
        .create_task(milestone_id, with_status("Return keys", TaskStatus::Completed, None))
        .await
        .unwrap()
        .record;
    manager
        .create_task(milestone_id, NewTask::titled("Final invoice"))
        .await
        .unwrap();

    let before_milestone = manager.get_milestone(milestone_id).await.unwrap();
    let before_booking = manager.get_booking(booking_id).await.unwrap();

    let err = manager
        .update_task(task.id, TaskUpdate::status(TaskStatus::InProgress))
        .await
        .unwrap_err();

    match err {
        WorkError::InvalidTransition(e) => {
            assert_eq!(e.from, TaskStatus::Completed);
            assert_eq!(e.to, TaskStatus::InProgress);
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }

    let after_milestone = manager.get_milestone(milestone_id).await.unwrap();
    let after_booking = manager.get_booking(booking_id).await.unwrap();
    assert_eq!(after_milestone.progress_percentage, before_milestone.progress_percentage);
    assert_eq!(after_booking.progress_percentage, before_booking.progress_percentage);
    assert_eq!(manager.get_task(task.id).await.unwrap().status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_failing_remote_matches_pure_functions() {
    let (manager, storage) = failing_remote_manager();
    let booking_id = booking(&manager).await;
    let first = milestone(&manager, booking_id, 2.0).await;
    let second = milestone(&manager, booking_id, 0.5).await;

    manager
        .create_task(first, with_status("A", TaskStatus::InProgress, Some(33)))
        .await
        .unwrap();
    manager
        .create_task(first, with_status("B", TaskStatus::Cancelled, None))
        .await
        .unwrap();
    manager
        .create_task(second, with_status("C", TaskStatus::Completed, None))
        .await
        .unwrap();
    let result = manager
        .create_task(second, with_status("D", TaskStatus::OnHold, Some(25)))
        .await
        .unwrap();

    let tasks = storage.list_tasks(second).await.unwrap();
    let milestones = storage.list_milestones(booking_id).await.unwrap();

    let milestone_level = result.cascade.milestone.unwrap();
    assert_eq!(milestone_level.source, Source::Local);
    assert_eq!(milestone_level.progress, milestone_progress(&tasks));
    assert_eq!(result.cascade.booking.source, Source::Local);
    assert_eq!(result.cascade.booking_progress(), booking_progress_of(&milestones));
}

#[tokio::test]
async fn test_deleting_only_task_resets_milestone() {
    let (manager, _) = local_manager();
    let booking_id = booking(&manager).await;
    let done = milestone(&manager, booking_id, 1.0).await;
    let emptied = milestone(&manager, booking_id, 1.0).await;

    manager
        .create_task(done, with_status("Sign lease", TaskStatus::Completed, None))
        .await
        .unwrap();
    let only = manager
        .create_task(emptied, with_status("Paint", TaskStatus::InProgress, Some(60)))
        .await
        .unwrap();
    assert_eq!(only.cascade.booking_progress(), 80);

    let cascade = manager.delete_task(only.record.id).await.unwrap();

    assert_eq!(cascade.milestone_progress(), Some(0));
    assert_eq!(cascade.booking_progress(), 50);

    let stored = manager.get_milestone(emptied).await.unwrap();
    assert_eq!((stored.completed_tasks, stored.total_tasks), (0, 0));
}

#[tokio::test]
async fn test_concurrent_sibling_updates_settle_after_recompute() {
    let (manager, storage) = local_manager();
    let manager = Arc::new(manager);
    let booking_id = booking(&manager).await;
    let milestone_id = milestone(&manager, booking_id, 1.0).await;

    let mut ids = Vec::new();
    for title in ["North wing", "South wing", "Basement"] {
        let task = manager
            .create_task(milestone_id, with_status(title, TaskStatus::InProgress, Some(0)))
            .await
            .unwrap();
        ids.push(task.record.id);
    }

    let handles: Vec<_> = ids
        .iter()
        .zip([30u8, 60, 90])
        .map(|(&id, pct)| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.update_task(id, TaskUpdate::progress(pct)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let settled = manager.recompute_milestone(milestone_id).await.unwrap();
    let tasks = storage.list_tasks(milestone_id).await.unwrap();
    assert_eq!(settled.milestone_progress(), Some(milestone_progress(&tasks)));
    assert_eq!(settled.milestone_progress(), Some(60));
    assert_eq!(settled.booking_progress(), 60);
}
