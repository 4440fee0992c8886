// Copyright 2025 ScreenGraph Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::{Arc, OnceLock};

use log::{error, info};
use surrealdb::engine::local::Mem;
use surrealdb::engine::remote::http::{Http, Https};
use surrealdb::Surreal;
use tokio::runtime::Runtime;

use crate::errors::EtlError;

// The embedded instance is stored together with the runtime that services
// it: that runtime must live for the lifetime of the process. Phases and
// re-runs create their own runtimes; if the Mem instance were created on one
// of them, dropping that runtime would leave Surreal's internal channels
// pointing at a closed runtime. Storing the pair in one cell keeps instance
// and runtime from ever coming from different bootstrap threads.
type SharedMem = (Arc<Surreal<surrealdb::engine::local::Db>>, Arc<Runtime>);
pub static SHARED_MEM: OnceLock<SharedMem> = OnceLock::new();

/// Handle over either the embedded in-memory engine or a remote HTTP
/// endpoint. The embedded instance is process-shared so that sequential
/// phases (and a re-run inside the same process) observe the same store.
#[derive(Clone)]
pub enum SurrealConnection {
    Local(Arc<Surreal<surrealdb::engine::local::Db>>),
    RemoteHttp(Surreal<surrealdb::engine::remote::http::Client>),
}

impl SurrealConnection {
    pub async fn use_ns(&self, namespace: &str) -> Result<(), surrealdb::Error> {
        match self {
            Self::Local(db) => db.use_ns(namespace).await,
            Self::RemoteHttp(db) => db.use_ns(namespace).await,
        }
    }

    pub async fn use_db(&self, database: &str) -> Result<(), surrealdb::Error> {
        match self {
            Self::Local(db) => db.use_db(database).await,
            Self::RemoteHttp(db) => db.use_db(database).await,
        }
    }

    pub async fn query(&self, sql: &str) -> Result<surrealdb::Response, surrealdb::Error> {
        match self {
            Self::Local(db) => db.query(sql).await,
            Self::RemoteHttp(db) => db.query(sql).await,
        }
    }

    /// Like [`query`](Self::query) but surfaces per-statement errors too.
    pub async fn query_checked(&self, sql: &str) -> Result<surrealdb::Response, surrealdb::Error> {
        self.query(sql).await.and_then(|resp| resp.check())
    }
}

/// Establish a store connection.
/// Precedence for selecting connection parameters:
/// 1. Explicit values passed by the caller (`Some(..)`)
/// 2. Environment variables: SURREALDB_URL, SURREALDB_USERNAME, SURREALDB_PASSWORD
/// 3. Embedded in-memory engine (Mem)
///
/// Tests can force ignoring the env-based fallback by setting
/// SG_DISABLE_STORE_ENV=1.
pub async fn connect(
    url: &Option<String>,
    user: &Option<String>,
    pass: &Option<String>,
    ns: &str,
    db: &str,
) -> Result<SurrealConnection, EtlError> {
    let allow_env = std::env::var("SG_DISABLE_STORE_ENV").ok().as_deref() != Some("1");
    let resolved_url = if url.is_some() {
        url.clone()
    } else if allow_env {
        std::env::var("SURREALDB_URL").ok()
    } else {
        None
    };
    let resolved_user = if user.is_some() {
        user.clone()
    } else if allow_env {
        std::env::var("SURREALDB_USERNAME").ok()
    } else {
        None
    };
    let resolved_pass = if pass.is_some() {
        pass.clone()
    } else if allow_env {
        std::env::var("SURREALDB_PASSWORD").ok()
    } else {
        None
    };

    let conn = if let Some(url) = resolved_url {
        let secure = url.starts_with("https://") || url.starts_with("wss://");
        // The HTTP client expects a scheme-less host:port target.
        let target = url
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .trim_start_matches("ws://")
            .trim_start_matches("wss://")
            .trim_end_matches('/')
            .to_string();
        let connection = if secure {
            Surreal::new::<Https>(&target).await?
        } else {
            Surreal::new::<Http>(&target).await?
        };
        if let (Some(u), Some(p)) = (resolved_user.as_ref(), resolved_pass.as_ref()) {
            connection
                .signin(surrealdb::opt::auth::Root {
                    username: u,
                    password: p,
                })
                .await?;
        }
        info!("connected to remote store at {}", target);
        SurrealConnection::RemoteHttp(connection)
    } else {
        info!("no store URL configured, using embedded Mem ns={} db={}", ns, db);
        if let Some((existing, _)) = SHARED_MEM.get() {
            SurrealConnection::Local(existing.clone())
        } else {
            // Create the Mem instance on a dedicated bootstrap thread whose
            // runtime goes into SHARED_MEM alongside it (see note above).
            use std::sync::mpsc::channel as std_channel;
            type MemHandle = Arc<Surreal<surrealdb::engine::local::Db>>;
            let (tx, rx) = std_channel::<Result<MemHandle, String>>();
            // The OnceLock write happens on the bootstrap thread so that a
            // concurrent connect that loses the race drops its instance and
            // runtime there, off any async context, and every caller ends
            // up holding whichever instance won.
            std::thread::spawn(move || match Runtime::new() {
                Ok(rt) => {
                    let res = rt.block_on(async { Surreal::new::<Mem>(()).await });
                    match res {
                        Ok(s) => {
                            let _ = SHARED_MEM.set((Arc::new(s), Arc::new(rt)));
                            let shared = SHARED_MEM
                                .get()
                                .map(|(s, _)| s.clone())
                                .ok_or_else(|| "shared store unset".to_string());
                            let _ = tx.send(shared);
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e.to_string()));
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(format!("failed to start Mem runtime: {e}")));
                }
            });
            let res = tokio::task::spawn_blocking(move || rx.recv())
                .await
                .map_err(|e| EtlError::Config(format!("Mem bootstrap task failed: {e}")))?;
            match res {
                Ok(Ok(s)) => SurrealConnection::Local(s),
                Ok(Err(e)) => {
                    error!("failed to start embedded store: {}", e);
                    return Err(EtlError::Config(format!("embedded store failed: {e}")));
                }
                Err(e) => {
                    error!("failed to receive embedded store handle: {}", e);
                    return Err(EtlError::Config(
                        "failed to create embedded store".to_string(),
                    ));
                }
            }
        }
    };
    conn.use_ns(ns).await?;
    conn.use_db(db).await?;
    Ok(conn)
}
