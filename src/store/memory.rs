use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use super::DataStore;
use crate::composer::types::{FilterBounds, SummaryTable, VariantSelector};

/// A [`DataStore`] backed by in-memory maps.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: HashMap<VariantSelector, SummaryTable>,
    filters: HashMap<u32, FilterBounds>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_table(&mut self, selector: VariantSelector, table: SummaryTable) {
        self.tables.insert(selector, table);
    }

    pub fn insert_filter(&mut self, filter_id: u32, bounds: FilterBounds) {
        self.filters.insert(filter_id, bounds);
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn fetch_summary_table(
        &self,
        components: &str,
        filter_id: u32,
        mov_stack: u32,
    ) -> Result<Option<SummaryTable>> {
        let selector = VariantSelector {
            components: components.to_string(),
            filter_id,
            mov_stack,
        };
        Ok(self.tables.get(&selector).cloned())
    }

    async fn fetch_filter_bounds(&self, filter_id: u32) -> Result<Option<FilterBounds>> {
        Ok(self.filters.get(&filter_id).copied())
    }
}
