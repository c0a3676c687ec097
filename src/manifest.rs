//! Definitions loader
//!
//! Fetches the manifest index, then each included table for the configured
//! language. Tables are cached in SQLite under the manifest version, so a
//! restart with an unchanged manifest downloads nothing but the index.

use anyhow::{anyhow, Context, Result};

use crate::bungie_api::BungieClient;
use crate::defs::{DefTable, Definitions};
use crate::storage::Store;

pub struct DefsLoader {
    client: BungieClient,
    store: Store,
    lang: String,
    tables: Vec<DefTable>,
}

impl DefsLoader {
    pub fn new(client: BungieClient, store: Store, lang: impl Into<String>) -> Self {
        Self {
            client,
            store,
            lang: lang.into(),
            tables: DefTable::ALL.to_vec(),
        }
    }

    /// Restrict which tables get downloaded; anything else stays empty
    pub fn include_tables(mut self, tables: &[DefTable]) -> Self {
        self.tables = tables.to_vec();
        self
    }

    pub async fn load_defs(&self) -> Result<Definitions> {
        let manifest = self
            .client
            .get_destiny_manifest()
            .await
            .context("Failed to fetch manifest index")?;
        let version = manifest.version;
        log::info!("[manifest] version {version}");

        let paths = manifest
            .json_world_component_content_paths
            .get(&self.lang)
            .ok_or_else(|| anyhow!("manifest {version} has no '{}' content", self.lang))?;

        let mut defs = Definitions::new(version.clone());
        for table in &self.tables {
            let def_name = table.definition_name();
            let path = paths
                .get(&def_name)
                .ok_or_else(|| anyhow!("manifest {version} lists no {def_name}"))?;

            let count = match self.cached(&version, *table).await {
                Some(raw) => match defs.insert_table_json(*table, &raw) {
                    Ok(n) => {
                        log::info!("[manifest] {}: {n} definitions (cached)", table.name());
                        Some(n)
                    }
                    Err(e) => {
                        log::warn!("[manifest] discarding cached {}: {e:#}", table.name());
                        None
                    }
                },
                None => None,
            };

            if count.is_none() {
                log::info!("[manifest] downloading {} from {path}", table.name());
                let raw = self
                    .client
                    .fetch_text(path)
                    .await
                    .with_context(|| format!("Failed to download {def_name}"))?;
                let n = defs.insert_table_json(*table, &raw)?;
                log::info!("[manifest] {}: {n} definitions", table.name());
                self.remember(&version, *table, raw).await;
            }
        }

        let keep = version.clone();
        match self.store.call(move |s| s.prune_definitions(&keep)).await {
            Ok(0) => {}
            Ok(n) => log::info!("[manifest] pruned {n} stale cached tables"),
            Err(e) => log::warn!("[manifest] prune failed: {e:#}"),
        }
        Ok(defs)
    }

    /// Cache read failures degrade to a download
    async fn cached(&self, version: &str, table: DefTable) -> Option<String> {
        let (v, l) = (version.to_string(), self.lang.clone());
        match self
            .store
            .call(move |s| s.get_table(&v, &l, table.name()))
            .await
        {
            Ok(hit) => hit,
            Err(e) => {
                log::warn!("[manifest] cache read failed: {e:#}");
                None
            }
        }
    }

    async fn remember(&self, version: &str, table: DefTable, raw: String) {
        let (v, l) = (version.to_string(), self.lang.clone());
        if let Err(e) = self
            .store
            .call(move |s| s.put_table(&v, &l, table.name(), &raw))
            .await
        {
            log::warn!("[manifest] cache write failed: {e:#}");
        }
    }
}
