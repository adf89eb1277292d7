use serde::Serialize;
use std::sync::Arc;

use crate::error::GameResult;
use crate::models::MoveRecord;
use crate::store::Store;

pub const PAGE_SIZE: usize = 10;

/// One page of the ledger, newest move first
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MovePage {
    pub page: usize,
    pub total_pages: usize,
    pub total_moves: usize,
    pub moves: Vec<MoveRecord>,
}

/// Read side of the per-game move ledger; appends happen inside move commits
#[derive(Clone)]
pub struct MoveLedger {
    store: Arc<dyn Store>,
}

impl MoveLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list_descending(&self, limit: usize) -> GameResult<Vec<MoveRecord>> {
        Ok(self.store.moves_desc(0, limit).await?)
    }

    pub async fn len(&self) -> GameResult<usize> {
        Ok(self.store.ledger_len().await?)
    }

    /// 1-indexed; page 0 is treated as page 1
    pub async fn page(&self, page: usize) -> GameResult<MovePage> {
        let page = page.max(1);
        let total_moves = self.store.ledger_len().await?;
        let total_pages = total_moves.div_ceil(PAGE_SIZE).max(1);
        let moves = match (page - 1).checked_mul(PAGE_SIZE) {
            Some(offset) if offset < total_moves => {
                self.store.moves_desc(offset, PAGE_SIZE).await?
            }
            _ => Vec::new(),
        };
        Ok(MovePage {
            page,
            total_pages,
            total_moves,
            moves,
        })
    }
}
