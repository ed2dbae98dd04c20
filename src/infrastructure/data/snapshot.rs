// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::AppError;
use crate::data::schema::Snapshot;
use crate::domain::constants::STATE_VERSION;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub fn serialize(snapshot: &Snapshot) -> Result<String, AppError> {
    if snapshot.version != STATE_VERSION {
        return Err(AppError::Invariant(format!(
            "cannot serialize snapshot version {} (expected {})",
            snapshot.version, STATE_VERSION
        )));
    }
    serde_json::to_string(snapshot)
        .map_err(|e| AppError::Persistence(format!("snapshot encode failed: {e}")))
}

/// Decode a snapshot blob. `Ok(None)` means the blob carries another version.
pub fn deserialize(blob: &str) -> Result<Option<Snapshot>, AppError> {
    let value: serde_json::Value = serde_json::from_str(blob)
        .map_err(|e| AppError::Persistence(format!("snapshot is not valid JSON: {e}")))?;
    let version = value.get("version").and_then(serde_json::Value::as_u64);
    if version != Some(STATE_VERSION as u64) {
        tracing::warn!(
            target: "state",
            found = ?version,
            expected = STATE_VERSION,
            "Snapshot has unknown version, discarding"
        );
        return Ok(None);
    }

    let snapshot: Snapshot = serde_json::from_value(value)
        .map_err(|e| AppError::Persistence(format!("snapshot decode failed: {e}")))?;
    if serialize(&snapshot)? != blob {
        return Err(AppError::Invariant(
            "snapshot does not re-serialize to its source blob".into(),
        ));
    }
    Ok(Some(snapshot))
}

/// Load the snapshot at `path`, falling back to the initial snapshot when the
/// file is missing, unreadable, undecodable or of another version.
pub async fn load(path: &Path) -> Result<Snapshot, AppError> {
    match tokio::fs::read_to_string(path).await {
        Ok(blob) => match deserialize(&blob) {
            Ok(Some(snapshot)) => return Ok(snapshot),
            Ok(None) => {}
            Err(e) if e.is_invariant() => return Err(e),
            Err(e) => {
                tracing::warn!(target: "state", path = %path.display(), error = %e, "Snapshot unreadable");
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(target: "state", path = %path.display(), "No snapshot on disk");
        }
        Err(e) => {
            tracing::warn!(target: "state", path = %path.display(), error = %e, "Snapshot read failed");
        }
    }
    tracing::info!(target: "state", "Falling back to initial snapshot");
    Ok(Snapshot::initial())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(".tmp");
    PathBuf::from(raw)
}

/// Write to `<path>.tmp` and rename over `path`.
pub async fn save(snapshot: &Snapshot, path: &Path) -> Result<(), AppError> {
    let blob = serialize(snapshot)?;
    write_atomic(path, blob.as_bytes()).await
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::Persistence(format!("create {}: {e}", parent.display())))?;
    }
    let tmp = tmp_path(path);
    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(|e| AppError::Persistence(format!("create {}: {e}", tmp.display())))?;
    file.write_all(bytes)
        .await
        .map_err(|e| AppError::Persistence(format!("write {}: {e}", tmp.display())))?;
    file.sync_all()
        .await
        .map_err(|e| AppError::Persistence(format!("sync {}: {e}", tmp.display())))?;
    drop(file);
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| AppError::Persistence(format!("rename onto {}: {e}", path.display())))
}

/// Persists snapshots at a fixed path, skipping writes that would not change the file.
pub struct SnapshotStore {
    path: PathBuf,
    last_persisted: Option<String>,
}

impl SnapshotStore {
    pub async fn open(path: PathBuf) -> Result<(Self, Snapshot), AppError> {
        let snapshot = load(&path).await?;
        let last_persisted = Some(serialize(&snapshot)?);
        tracing::info!(target: "state", path = %path.display(), "Loaded snapshot, {}", snapshot.summary());
        Ok((
            Self {
                path,
                last_persisted,
            },
            snapshot,
        ))
    }

    /// Returns `true` when the file was rewritten.
    pub async fn persist(&mut self, snapshot: &Snapshot) -> Result<bool, AppError> {
        let blob = serialize(snapshot)?;
        if self.last_persisted.as_deref() == Some(blob.as_str()) {
            return Ok(false);
        }
        write_atomic(&self.path, blob.as_bytes()).await?;
        tracing::info!(target: "state", "Persisted snapshot, {}", snapshot.summary());
        self.last_persisted = Some(blob);
        Ok(true)
    }

    pub async fn reset(path: &Path) -> Result<Snapshot, AppError> {
        let snapshot = Snapshot::initial();
        save(&snapshot, path).await?;
        tracing::info!(target: "state", path = %path.display(), "Reset snapshot, {}", snapshot.summary());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::{Market, Pool};
    use alloy::primitives::Address;

    fn temp_state_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "pool-disputer-{tag}-{}-{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    fn populated(order: &[u8]) -> Snapshot {
        let mut snapshot = Snapshot::initial();
        for marker in order {
            let market = Address::from([*marker; 20]);
            snapshot.insert_market(Market::new(market, 2));
            snapshot
                .insert_pool(
                    market,
                    Pool::new(
                        *marker as u64,
                        false,
                        vec![10_000, 0],
                        Address::from([marker + 100; 20]),
                        Address::from([marker + 150; 20]),
                    ),
                )
                .expect("insert pool");
            snapshot
                .insert_pool(
                    market,
                    Pool::new(
                        *marker as u64,
                        true,
                        vec![5_000, 5_000],
                        Address::from([marker + 50; 20]),
                        Address::from([marker + 60; 20]),
                    ),
                )
                .expect("insert pool");
        }
        snapshot
    }

    #[test]
    fn initial_snapshot_round_trips() {
        let initial = Snapshot::initial();
        let blob = serialize(&initial).expect("serialize");
        assert_eq!(blob, r#"{"version":1,"markets":[]}"#);
        let decoded = deserialize(&blob).expect("decode").expect("same version");
        assert_eq!(decoded, initial);
    }

    #[test]
    fn populated_snapshot_round_trips() {
        let mut snapshot = populated(&[3, 1, 2]);
        let market = Address::from([1u8; 20]);
        let key = *snapshot.markets[&market].pools.keys().next().expect("pool");
        snapshot.pool_mut(&market, &key).expect("pool").we_funded = true;
        snapshot.markets.get_mut(&market).expect("market").is_over = true;

        let blob = serialize(&snapshot).expect("serialize");
        let decoded = deserialize(&blob).expect("decode").expect("same version");
        assert_eq!(decoded, snapshot);
        assert_eq!(serialize(&decoded).expect("serialize"), blob);
    }

    #[test]
    fn serialization_ignores_insertion_order() {
        let a = serialize(&populated(&[1, 2, 3])).expect("serialize");
        let b = serialize(&populated(&[3, 2, 1])).expect("serialize");
        assert_eq!(a, b);
    }

    #[test]
    fn other_versions_are_discarded() {
        assert!(
            deserialize(r#"{"version":2,"markets":[]}"#)
                .expect("decode")
                .is_none()
        );
        assert!(deserialize(r#"{"markets":{}}"#).expect("decode").is_none());
    }

    #[test]
    fn non_canonical_blob_is_an_invariant_violation() {
        let err = deserialize(r#"{ "version": 1, "markets": [] }"#).expect_err("not canonical");
        assert!(err.is_invariant());
    }

    #[tokio::test]
    async fn load_falls_back_for_missing_and_garbage_files() {
        let missing = temp_state_path("missing");
        assert_eq!(load(&missing).await.expect("load"), Snapshot::initial());

        let garbage = temp_state_path("garbage");
        std::fs::write(&garbage, "not json").expect("write");
        assert_eq!(load(&garbage).await.expect("load"), Snapshot::initial());
        std::fs::remove_file(&garbage).ok();

        let old = temp_state_path("old");
        std::fs::write(&old, r#"{"version":0,"markets":{"x":1}}"#).expect("write");
        assert_eq!(load(&old).await.expect("load"), Snapshot::initial());
        std::fs::remove_file(&old).ok();
    }

    #[tokio::test]
    async fn save_replaces_atomically_and_leaves_no_tmp() {
        let path = temp_state_path("save");
        let snapshot = populated(&[7]);
        save(&snapshot, &path).await.expect("save");
        assert!(!tmp_path(&path).exists());
        assert_eq!(load(&path).await.expect("load"), snapshot);
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn store_skips_unchanged_snapshots() {
        let path = temp_state_path("store");
        let (mut store, snapshot) = SnapshotStore::open(path.clone()).await.expect("open");
        assert!(!store.persist(&snapshot).await.expect("persist"));
        assert!(!path.exists());

        let changed = populated(&[4]);
        assert!(store.persist(&changed).await.expect("persist"));
        assert!(!store.persist(&changed).await.expect("persist"));
        assert_eq!(load(&path).await.expect("load"), changed);
        std::fs::remove_file(&path).ok();
    }
}
