//! SQLite-backed application config, inference model registry and the
//! X-ray work list.

use std::path::PathBuf;

use rusqlite::Connection;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn app_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dental-xray-ai")
}

fn db_path() -> PathBuf {
    app_dir().join("database.db")
}

/// Where annotated output lands when the configuration does not say.
pub const DEFAULT_ANALYZED_DIR: &str = "uploads/analyzed";

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct AppConfig {
    pub analyzed_dir: String,
    pub jpeg_quality: String,
    pub confidence: String,
    pub save_legends: String,
    pub last_folder_path: Option<String>,
    pub active_model_id: Option<i64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            analyzed_dir: DEFAULT_ANALYZED_DIR.into(),
            jpeg_quality: "98".into(),
            confidence: "1".into(),
            save_legends: "true".into(),
            last_folder_path: None,
            active_model_id: None,
        }
    }
}

impl AppConfig {
    pub fn jpeg_quality_value(&self) -> u8 {
        self.jpeg_quality.parse().unwrap_or(98)
    }

    pub fn save_legends_enabled(&self) -> bool {
        self.save_legends != "false"
    }
}

/// One registered inference model version on the hosted service.
#[derive(Debug, serde::Serialize)]
pub struct InferenceModel {
    pub id: i64,
    pub name: String,
    pub project: String,
    pub version: i64,
    pub is_active: bool,
}

/// Handle over the application database.
pub struct ConfigStore {
    conn: Connection,
}

impl ConfigStore {
    /// Open (and initialize) the per-user application database.
    pub fn open() -> Result<Self, BoxError> {
        let p = db_path();
        if let Some(parent) = p.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        Self::from_connection(Connection::open(&p)?)
    }

    /// An in-memory store, used by tests and one-off tooling.
    pub fn open_in_memory() -> Result<Self, BoxError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, BoxError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self { conn };
        store.setup()?;
        Ok(store)
    }

    fn setup(&self) -> Result<(), BoxError> {
        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS configuration (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                analyzed_dir TEXT,
                jpeg_quality TEXT,
                confidence TEXT,
                save_legends TEXT,
                last_folder_path TEXT,
                active_model_id INTEGER
            )
            "#,
            [],
        )?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS inference_models (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                project TEXT NOT NULL,
                version INTEGER NOT NULL,
                created_at TEXT DEFAULT (datetime('now'))
            )
            "#,
            [],
        )?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS xray_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT UNIQUE NOT NULL,
                created_at TEXT DEFAULT (datetime('now'))
            )
            "#,
            [],
        )?;

        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM configuration", [], |r| r.get(0))?;
        if count == 0 {
            self.save_config(&AppConfig::default())?;
        }
        Ok(())
    }

    /// Latest configuration row; defaults when the table is empty.
    pub fn load_config(&self) -> Result<AppConfig, BoxError> {
        let mut stmt = self.conn.prepare(
            "SELECT analyzed_dir, jpeg_quality, confidence, save_legends,
                    last_folder_path, active_model_id
             FROM configuration ORDER BY id DESC LIMIT 1",
        )?;
        let row = stmt.query_row([], |r| {
            Ok(AppConfig {
                analyzed_dir: r
                    .get::<_, String>(0)
                    .unwrap_or_else(|_| DEFAULT_ANALYZED_DIR.into()),
                jpeg_quality: r.get::<_, String>(1).unwrap_or_else(|_| "98".into()),
                confidence: r.get::<_, String>(2).unwrap_or_else(|_| "1".into()),
                save_legends: r.get::<_, String>(3).unwrap_or_else(|_| "true".into()),
                last_folder_path: r.get(4).ok(),
                active_model_id: r.get(5).ok().and_then(|x: Option<i64>| x),
            })
        });

        match row {
            Ok(c) => Ok(c),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(AppConfig::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Append a new configuration row; the latest row wins on load.
    pub fn save_config(&self, c: &AppConfig) -> Result<(), BoxError> {
        self.conn.execute(
            r#"
            INSERT INTO configuration (
                analyzed_dir, jpeg_quality, confidence, save_legends,
                last_folder_path, active_model_id
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
            rusqlite::params![
                &c.analyzed_dir,
                &c.jpeg_quality,
                &c.confidence,
                &c.save_legends,
                c.last_folder_path.as_deref(),
                c.active_model_id,
            ],
        )?;
        Ok(())
    }

    pub fn list_models(&self) -> Result<Vec<InferenceModel>, BoxError> {
        let active = self.load_config()?.active_model_id;
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, project, version FROM inference_models ORDER BY id")?;
        let rows = stmt.query_map([], |r| {
            let id: i64 = r.get(0)?;
            Ok(InferenceModel {
                id,
                name: r.get(1)?,
                project: r.get(2)?,
                version: r.get(3)?,
                is_active: active == Some(id),
            })
        })?;
        let out: Result<Vec<_>, _> = rows.collect();
        Ok(out?)
    }

    pub fn add_model(
        &self,
        name: &str,
        project: &str,
        version: i64,
    ) -> Result<InferenceModel, BoxError> {
        self.conn.execute(
            "INSERT INTO inference_models (name, project, version) VALUES (?1, ?2, ?3)",
            rusqlite::params![name, project, version],
        )?;
        let id = self.conn.last_insert_rowid();
        let active = self.load_config()?.active_model_id;
        Ok(InferenceModel {
            id,
            name: name.to_string(),
            project: project.to_string(),
            version,
            is_active: active == Some(id),
        })
    }

    pub fn remove_model(&self, id: i64) -> Result<(), BoxError> {
        self.conn
            .execute("DELETE FROM inference_models WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn set_active_model(&self, id: i64) -> Result<(), BoxError> {
        let mut c = self.load_config()?;
        c.active_model_id = Some(id);
        self.save_config(&c)
    }

    /// The model the next prediction run would use, if one is selected.
    pub fn active_model(&self) -> Result<Option<InferenceModel>, BoxError> {
        let aid = match self.load_config()?.active_model_id {
            Some(x) => x,
            None => return Ok(None),
        };
        let row = self.conn.query_row(
            "SELECT id, name, project, version FROM inference_models WHERE id = ?1",
            [aid],
            |r| {
                Ok(InferenceModel {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    project: r.get(2)?,
                    version: r.get(3)?,
                    is_active: true,
                })
            },
        );
        match row {
            Ok(m) => Ok(Some(m)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store X-ray paths for later processing. Duplicates are ignored.
    pub fn add_xray_paths(&self, paths: Vec<String>) -> Result<usize, BoxError> {
        let mut added = 0_usize;
        for p in paths {
            if p.trim().is_empty() {
                continue;
            }
            if let Ok(1) = self
                .conn
                .execute("INSERT OR IGNORE INTO xray_files (path) VALUES (?1)", [&p])
            {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn list_xray_paths(&self) -> Result<Vec<String>, BoxError> {
        let mut stmt = self
            .conn
            .prepare("SELECT path FROM xray_files ORDER BY created_at ASC, id ASC")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let out: Result<Vec<_>, _> = rows.collect();
        Ok(out?)
    }

    pub fn remove_xray_path(&self, path: &str) -> Result<(), BoxError> {
        self.conn
            .execute("DELETE FROM xray_files WHERE path = ?1", [path])?;
        Ok(())
    }
}
