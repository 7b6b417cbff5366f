//! Access to precomputed dv/v summary tables and the filter registry.
//!
//! [`DataStore`] is the async trait the composer fetches through.
//! [`CsvStore`] reads tables from a directory tree, [`MemoryStore`] keeps
//! them in memory.

mod csv;
mod memory;

pub use self::csv::CsvStore;
pub use memory::MemoryStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::composer::types::{FilterBounds, SummaryTable};

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Returns `Ok(None)` when no table exists for this combination.
    async fn fetch_summary_table(
        &self,
        components: &str,
        filter_id: u32,
        mov_stack: u32,
    ) -> Result<Option<SummaryTable>>;

    /// Returns `Ok(None)` when the filter id is not registered.
    async fn fetch_filter_bounds(&self, filter_id: u32) -> Result<Option<FilterBounds>>;
}
