// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Content-addressed storage is an external collaborator, not part of the
//! core: the core only ever sees an opaque `Cid` string. This trait is the
//! seam, modeled the same way the node treats its blockchain client as a
//! swappable async trait behind a thin interface.

use crate::types::Cid;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>) -> anyhow::Result<Cid>;
    async fn get(&self, cid: &Cid) -> anyhow::Result<Vec<u8>>;
}

/// In-memory store for tests and for single-process deployments that don't
/// need durability across restarts.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    objects: Arc<RwLock<HashMap<Cid, Vec<u8>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn put(&self, bytes: Vec<u8>) -> anyhow::Result<Cid> {
        use sha2::{Digest, Sha256};
        let cid = hex::encode(Sha256::digest(&bytes));
        self.objects.write().await.insert(cid.clone(), bytes);
        Ok(cid)
    }

    async fn get(&self, cid: &Cid) -> anyhow::Result<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(cid)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("object not found for cid {}", cid))
    }
}
