use std::io;
use std::path::PathBuf;

use missions_core::{GameError, Round, StateError};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::AppError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reading {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("writing {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("parsing {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("encoding round: {0}")]
    Encode(serde_json::Error),
    #[error("inconsistent round state: {0}")]
    Inconsistent(#[from] StateError),
}

/// Holds the round behind one lock. Every mutation runs load, modify and
/// flush under the same guard, so concurrent requests never interleave.
pub struct RoundStore {
    round: Mutex<Round>,
    path: Option<PathBuf>,
}

impl Default for RoundStore {
    fn default() -> Self {
        Self {
            round: Mutex::new(Round::default()),
            path: None,
        }
    }
}

impl RoundStore {
    /// Loads the round from `path`. A missing file means no round has been
    /// played yet; anything unreadable is an error rather than a silent reset.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let round = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let round: Round =
                    serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
                        path: path.clone(),
                        source,
                    })?;
                round.check()?;
                info!(path = %path.display(), active = round.active, "loaded round state");
                round
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Round::default(),
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        Ok(Self {
            round: Mutex::new(round),
            path: Some(path),
        })
    }

    pub async fn snapshot(&self) -> Round {
        self.round.lock().await.clone()
    }

    pub async fn read<T>(&self, f: impl FnOnce(&Round) -> T) -> T {
        let round = self.round.lock().await;
        f(&*round)
    }

    /// Applies `f` and flushes the result. On a failed flush the in-memory
    /// round is restored so memory and disk stay in step.
    pub async fn update<T>(
        &self,
        f: impl FnOnce(&mut Round) -> Result<T, GameError>,
    ) -> Result<T, AppError> {
        let mut round = self.round.lock().await;
        let before = round.clone();
        let value = f(&mut *round)?;

        if let Err(err) = self.persist(&round).await {
            error!(error = %err, "persist failed, rolling back");
            *round = before;
            return Err(err.into());
        }

        Ok(value)
    }

    async fn persist(&self, round: &Round) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(round).map_err(StoreError::Encode)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| StoreError::Write {
                path: tmp.clone(),
                source,
            })?;
        if let Err(source) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::Write {
                path: path.clone(),
                source,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use missions_core::{register, start_round, Catalog, RoundOptions};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("sm_state_{}.json", Uuid::new_v4()))
    }

    async fn start(store: &RoundStore) {
        let catalog = Catalog::new(["north", "south"], ["say okay"]).unwrap();
        store
            .update(|round| {
                start_round(
                    round,
                    &catalog,
                    RoundOptions {
                        id: "r1".into(),
                        started_at: 1,
                        roster_size: None,
                    },
                    &mut ChaCha8Rng::seed_from_u64(1),
                )
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_file_starts_idle() {
        let path = temp_path();
        let store = RoundStore::open(&path).await.unwrap();
        assert!(store.snapshot().await.is_idle());
        assert!(tokio::fs::metadata(&path).await.is_err());
    }

    #[tokio::test]
    async fn updates_are_flushed_and_reloaded() {
        let path = temp_path();
        let store = RoundStore::open(&path).await.unwrap();
        start(&store).await;
        store
            .update(|round| register(round, "Ana", 5, &mut ChaCha8Rng::seed_from_u64(2)))
            .await
            .unwrap();

        let reloaded = RoundStore::open(&path).await.unwrap();
        assert_eq!(reloaded.snapshot().await, store.snapshot().await);
        assert!(tokio::fs::metadata(path.with_extension("json.tmp")).await.is_err());
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn failed_operation_writes_nothing() {
        let path = temp_path();
        let store = RoundStore::open(&path).await.unwrap();
        let err = store
            .update(|round| register(round, "Ana", 5, &mut ChaCha8Rng::seed_from_u64(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Game(GameError::NoActiveRound)));
        assert!(tokio::fs::metadata(&path).await.is_err());
    }

    #[tokio::test]
    async fn failed_flush_rolls_back() {
        let dir = std::env::temp_dir().join(format!("sm_missing_{}", Uuid::new_v4()));
        let store = RoundStore::open(dir.join("state.json")).await.unwrap();
        let catalog = Catalog::new(["north"], ["say okay"]).unwrap();

        let err = store
            .update(|round| {
                start_round(
                    round,
                    &catalog,
                    RoundOptions::default(),
                    &mut ChaCha8Rng::seed_from_u64(1),
                )
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Write { .. })));
        assert!(store.snapshot().await.is_idle());
    }

    #[tokio::test]
    async fn failed_rename_cleans_up_temp_file() {
        let path = temp_path();
        let store = RoundStore::open(&path).await.unwrap();
        // A directory in the way makes the rename fail after the temp write.
        tokio::fs::create_dir(&path).await.unwrap();
        tokio::fs::write(path.join("keep"), b"x").await.unwrap();

        let catalog = Catalog::new(["north"], ["say okay"]).unwrap();
        let err = store
            .update(|round| {
                start_round(
                    round,
                    &catalog,
                    RoundOptions::default(),
                    &mut ChaCha8Rng::seed_from_u64(1),
                )
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Write { .. })));
        assert!(store.snapshot().await.is_idle());
        assert!(tokio::fs::metadata(path.with_extension("json.tmp")).await.is_err());
        let _ = tokio::fs::remove_dir_all(&path).await;
    }

    #[tokio::test]
    async fn rejects_corrupt_and_inconsistent_files() {
        let path = temp_path();
        tokio::fs::write(&path, b"{ not json").await.unwrap();
        assert!(matches!(
            RoundStore::open(&path).await,
            Err(StoreError::Parse { .. })
        ));

        tokio::fs::write(
            &path,
            br#"{ "active": false, "agents": {}, "players": { "Ana": "north" } }"#,
        )
        .await
        .unwrap();
        assert!(matches!(
            RoundStore::open(&path).await,
            Err(StoreError::Inconsistent(StateError::InactiveNotEmpty))
        ));
        let _ = tokio::fs::remove_file(&path).await;
    }
}
