// ── Shared resource pools ──
//
// The master owns one worker pool and one multicast address allocator.
// Products borrow from both; every mutation happens under the pool's own
// mutex, acquired after the product's state lock and never before.

mod address_pool;
mod worker_pool;

use thiserror::Error;
use tokio::sync::Mutex;

pub use address_pool::{AddressBlock, AddressRangeAllocator};
pub use worker_pool::WorkerPool;

use crate::model::AddressRange;

/// Allocation failures raised by the pools.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("requested {requested} worker server(s) but only {available} available")]
    InsufficientWorkers { requested: usize, available: usize },

    #[error("no free block of {requested} contiguous address(es) in {range}")]
    AddressExhausted { requested: u32, range: String },

    #[error("worker server {endpoint} is allocated to a product")]
    WorkerBusy { endpoint: String },

    #[error("worker server {endpoint} is not registered")]
    UnknownWorker { endpoint: String },

    #[error("worker server {endpoint} is not allocated")]
    NotAllocated { endpoint: String },

    #[error("address block {block} was not issued by this allocator")]
    UnknownBlock { block: String },
}

/// The two pools, each behind its own lock.
pub struct ResourcePools {
    pub workers: Mutex<WorkerPool>,
    pub addresses: Mutex<AddressRangeAllocator>,
}

impl ResourcePools {
    pub fn new(multicast_range: AddressRange) -> Self {
        Self {
            workers: Mutex::new(WorkerPool::new()),
            addresses: Mutex::new(AddressRangeAllocator::new(multicast_range)),
        }
    }
}
