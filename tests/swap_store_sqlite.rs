use std::time::Duration;

use anyhow::{Context as _, Result};

use highload_swap::assets::AssetId;
use highload_swap::swap::SwapState;
use highload_swap::swap::status::StatusMask;
use highload_swap::swap::store::SqliteSwapStore;

fn offer() -> AssetId {
    AssetId::from_symbol("TON")
}

fn ask() -> AssetId {
    AssetId::from_symbol("USDT")
}

#[test]
fn create_list_transition_lifecycle() -> Result<()> {
    let dir = tempfile::tempdir().context("create tempdir")?;
    let path = dir.path().join("swap_tasks.sqlite3");

    let mut store = SqliteSwapStore::open(path).context("open store")?;

    let id = store
        .create_task(offer(), ask(), 1_500_000_000, None)
        .context("create task")?;

    let task = store
        .get_task(id)
        .context("get task")?
        .context("task missing")?;
    assert_eq!(task.state, SwapState::Pending);
    assert_eq!(task.created_at, task.updated_at);
    assert_eq!(task.asset_offer, offer());
    assert_eq!(task.asset_ask, ask());
    assert_eq!(task.amount, 1_500_000_000);
    assert!(task.route_id.is_none());
    assert!(task.query_id.is_none());
    assert_eq!(task.status_mask, 0);
    assert!(task.price_snapshot.is_none());

    let pending = store
        .list_by_state(SwapState::Pending, None)
        .context("list pending")?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);

    store.mark_sent(id, 777, 42 << 32).context("mark sent")?;
    let task = store.get_task(id)?.context("task missing after send")?;
    assert_eq!(task.state, SwapState::Sent);
    assert_eq!(task.route_id, Some(777));
    assert_eq!(task.query_id, Some(42 << 32));
    assert_eq!(task.status_mask, StatusMask::PENDING.bits());
    assert!(task.updated_at >= task.created_at);

    // identity fields are set exactly once
    let err = store.mark_sent(id, 999, 1).unwrap_err();
    assert!(err.to_string().contains("not pending or already sent"));

    let sent_updated_at = task.updated_at;
    store
        .finish(id, SwapState::Success, StatusMask::SUCCEEDED)
        .context("finish task")?;
    let task = store.get_task(id)?.context("task missing after finish")?;
    assert_eq!(task.state, SwapState::Success);
    assert_eq!(task.status_mask, StatusMask::SUCCEEDED.bits());
    assert_eq!(task.route_id, Some(777));
    assert_eq!(task.query_id, Some(42 << 32));
    assert!(task.updated_at >= sent_updated_at);

    let processed = store.list_processed(None).context("list processed")?;
    assert_eq!(processed.len(), 1);

    Ok(())
}

#[test]
fn listing_is_oldest_first_and_bounded() -> Result<()> {
    let dir = tempfile::tempdir().context("create tempdir")?;
    let mut store = SqliteSwapStore::open(dir.path().join("s.sqlite3")).context("open store")?;

    let a = store.create_task(offer(), ask(), 1, None)?;
    let b = store.create_task(offer(), ask(), 2, None)?;
    let c = store.create_task(offer(), ask(), 3, None)?;

    let all = store.list_by_state(SwapState::Pending, None)?;
    assert_eq!(all.iter().map(|t| t.id).collect::<Vec<_>>(), vec![a, b, c]);

    let bounded = store.list_by_state(SwapState::Pending, Some(2))?;
    assert_eq!(bounded.iter().map(|t| t.id).collect::<Vec<_>>(), vec![a, b]);

    Ok(())
}

#[test]
fn finish_guards_states_and_ids() -> Result<()> {
    let dir = tempfile::tempdir().context("create tempdir")?;
    let mut store = SqliteSwapStore::open(dir.path().join("s.sqlite3")).context("open store")?;

    let id = store.create_task(offer(), ask(), 1, None)?;

    let err = store
        .finish(id, SwapState::Pending, StatusMask::NEW)
        .unwrap_err();
    assert!(err.to_string().contains("not terminal"));

    let err = store
        .finish(9999, SwapState::Failed, StatusMask::FAILED)
        .unwrap_err();
    assert!(err.to_string().contains("task not found"));

    store.finish(id, SwapState::Canceled, StatusMask::NEW)?;
    let task = store.get_task(id)?.context("task missing")?;
    assert_eq!(task.state, SwapState::Canceled);

    Ok(())
}

#[test]
fn snapshot_and_states_round_trip() -> Result<()> {
    let dir = tempfile::tempdir().context("create tempdir")?;
    let mut store = SqliteSwapStore::open(dir.path().join("s.sqlite3")).context("open store")?;

    let snapshot = vec![7u8; 40];
    let id = store.create_task(offer(), ask(), 10, Some(snapshot.as_slice()))?;
    let task = store.get_task(id)?.context("task missing")?;
    assert_eq!(task.price_snapshot.as_deref(), Some(snapshot.as_slice()));

    let other = store.create_task(offer(), ask(), 11, None)?;
    store.mark_sent(other, 1, 2)?;

    assert_eq!(store.states()?, vec!["pending", "sent"]);

    Ok(())
}

#[test]
fn tasks_survive_reopen() -> Result<()> {
    let dir = tempfile::tempdir().context("create tempdir")?;
    let path = dir.path().join("s.sqlite3");

    let (pending_id, sent_id) = {
        let mut store = SqliteSwapStore::open(path.clone()).context("open store")?;
        let pending_id = store.create_task(offer(), ask(), 5, None)?;
        let sent_id = store.create_task(offer(), ask(), 6, None)?;
        store.mark_sent(sent_id, 123, 456)?;
        (pending_id, sent_id)
    };

    let store = SqliteSwapStore::open(path).context("reopen store")?;
    let pending = store.list_by_state(SwapState::Pending, None)?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, pending_id);

    let sent = store.list_by_state(SwapState::Sent, None)?;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, sent_id);
    assert_eq!(sent[0].route_id, Some(123));
    assert_eq!(sent[0].query_id, Some(456));

    Ok(())
}

#[test]
fn retention_sweep_deletes_old_tasks() -> Result<()> {
    let dir = tempfile::tempdir().context("create tempdir")?;
    let mut store = SqliteSwapStore::open(dir.path().join("s.sqlite3")).context("open store")?;

    store.create_task(offer(), ask(), 1, None)?;
    store.create_task(offer(), ask(), 2, None)?;

    let kept = store.delete_older_than(Duration::from_secs(24 * 60 * 60))?;
    assert_eq!(kept, 0);

    std::thread::sleep(Duration::from_millis(10));
    let deleted = store.delete_older_than(Duration::ZERO)?;
    assert_eq!(deleted, 2);
    assert!(store.list_by_state(SwapState::Pending, None)?.is_empty());

    Ok(())
}
