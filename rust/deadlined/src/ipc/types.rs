use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Config;
use crate::db;
use crate::model::{Identity, UserId};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Token handed out by `auth.login`; absent for anonymous callers.
    #[serde(default)]
    pub session: Option<String>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub config: Config,
    pub sessions: HashMap<String, UserId>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            workspace: None,
            db: None,
            config,
            sessions: HashMap::new(),
        }
    }

    /// Sessions belong to one store, so switching workspaces logs everyone out.
    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let conn = db::open_db(path)?;
        self.workspace = Some(path.to_path_buf());
        self.db = Some(conn);
        self.sessions.clear();
        log::info!("opened workspace {}", path.display());
        Ok(())
    }

    pub fn identity(&self, req: &Request) -> Identity {
        req.session
            .as_deref()
            .and_then(|token| self.sessions.get(token))
            .map(|id| Identity::User(*id))
            .unwrap_or(Identity::Anonymous)
    }
}
