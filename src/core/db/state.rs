use sqlx::{
    Sqlite,
    pool::PoolConnection,
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
    },
};
use tempdir::TempDir;
use tokio::sync::{RwLock, RwLockReadGuard};

use std::{
    fs::{self, File},
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
};
use anyhow::Context;
use tracing::{debug, info, warn};

use tar::{Archive, Builder};
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

const DB_FILE_NAME: &str = "board.db";
const ZSTD_LEVEL: i32 = 3;

/// An open board file: the archive on disk, its unpacked working copy and the
/// connection pool over the working copy's database.
pub(super) struct BoardState {
    board_file: PathBuf,
    working_dir: TempDir,
    pool: RwLock<SqlitePool>,
}

impl std::fmt::Debug for BoardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardState")
            .field("board_file", &self.board_file)
            .field("working_dir", &self.working_dir.path())
            .finish()
    }
}

impl BoardState {
    /// Acquire a pooled connection. The pool read lock stays held for the
    /// lifetime of the guard so a concurrent save cannot close the pool under it.
    pub(super) async fn conn(&self) -> anyhow::Result<DbConnGuard<'_>> {
        let pool_guard = self.pool.read().await;
        let conn = pool_guard.acquire().await?;
        Ok(DbConnGuard {
            _pool_guard: pool_guard,
            conn,
        })
    }

    pub(super) fn board_file(&self) -> &Path {
        &self.board_file
    }

    pub(super) async fn open<P: AsRef<Path>>(board_file: P) -> anyhow::Result<Self> {
        let board_file = board_file.as_ref().to_path_buf();

        if !board_file.is_file() {
            match board_file.parent() {
                Some(parent) if parent.as_os_str().is_empty() || parent.is_dir() => {
                    write_empty_archive(&board_file)?;
                    info!("Created new board file {:?}", board_file);
                }
                _ => anyhow::bail!("Board file parent does not exist: {:?}", board_file),
            }
        }

        let working_dir = TempDir::new("taskboard")?;
        {
            let f = File::open(&board_file)
                .with_context(|| format!("Failed to open board archive {:?}", board_file))?;
            let decoder = ZstdDecoder::new(f)
                .with_context(|| format!("Invalid zstd stream in {:?}", board_file))?;
            Archive::new(decoder)
                .unpack(working_dir.path())
                .with_context(|| {
                    format!(
                        "Failed to extract {:?} into {:?}",
                        board_file,
                        working_dir.path()
                    )
                })?;
        }

        let db_file = working_dir.path().join(DB_FILE_NAME);
        if !db_file.is_file() {
            File::create(&db_file)?;
        }

        let pool = connect(&db_file).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("Board {:?} unpacked into {:?}", board_file, working_dir.path());

        Ok(Self {
            board_file,
            working_dir,
            pool: RwLock::new(pool),
        })
    }

    /// Write the working copy back into the board file.
    pub(super) async fn save(&self) -> anyhow::Result<()> {
        self.close_and_pack(true).await
    }

    async fn close_and_pack(&self, reopen: bool) -> anyhow::Result<()> {
        // Exclusive for the whole checkpoint/close/pack cycle.
        let mut pool_guard = self.pool.write().await;

        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE);")
            .execute(&*pool_guard)
            .await?;
        pool_guard.close().await;

        self.pack()?;
        info!("Saved board {:?}", self.board_file);

        if reopen {
            *pool_guard = connect(&self.working_dir.path().join(DB_FILE_NAME)).await?;
        }
        Ok(())
    }

    fn pack(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.board_file.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        // Pack next to the target and rename, so a failed save keeps the old board.
        let partial = self.board_file.with_extension("partial");
        let out = File::create(&partial)
            .with_context(|| format!("Failed to create board archive {:?}", partial))?;
        let encoder = ZstdEncoder::new(out, ZSTD_LEVEL)
            .with_context(|| format!("Failed to create zstd encoder for {:?}", partial))?;
        let mut tar = Builder::new(encoder);
        tar.append_path_with_name(self.working_dir.path().join(DB_FILE_NAME), DB_FILE_NAME)
            .with_context(|| format!("Failed to add database to {:?}", partial))?;
        tar.into_inner()
            .with_context(|| format!("Failed to finalize tar for {:?}", partial))?
            .finish()
            .with_context(|| format!("Failed to finalize zstd stream for {:?}", partial))?;

        fs::rename(&partial, &self.board_file)
            .with_context(|| format!("Failed to replace board file {:?}", self.board_file))?;
        Ok(())
    }
}

fn write_empty_archive(path: &Path) -> anyhow::Result<()> {
    let out = File::create(path)
        .with_context(|| format!("Failed to create board archive {:?}", path))?;
    let encoder = ZstdEncoder::new(out, ZSTD_LEVEL)
        .with_context(|| format!("Failed to create zstd encoder for {:?}", path))?;
    Builder::new(encoder)
        .into_inner()
        .with_context(|| format!("Failed to finalize empty tar {:?}", path))?
        .finish()
        .with_context(|| format!("Failed to finalize empty zstd stream {:?}", path))?;
    Ok(())
}

async fn connect(db_file: &Path) -> anyhow::Result<SqlitePool> {
    let connect_opts = SqliteConnectOptions::new()
        .filename(db_file)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    Ok(SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_opts)
        .await?)
}

pub struct DbConnGuard<'a> {
    _pool_guard: RwLockReadGuard<'a, SqlitePool>,
    conn: PoolConnection<Sqlite>,
}

impl<'a> Deref for DbConnGuard<'a> {
    type Target = PoolConnection<Sqlite>;
    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<'a> DerefMut for DbConnGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl Drop for BoardState {
    fn drop(&mut self) {
        // Blocking on the current runtime from inside it would deadlock, so async
        // callers have to save explicitly before dropping the board.
        if tokio::runtime::Handle::try_current().is_ok() {
            return;
        }
        let result = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(self.close_and_pack(false)),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!("Failed to save board on drop: {}", e);
        }
    }
}
