use indexmap::IndexMap;
use tracing::debug;

use super::PoolError;
use crate::model::WorkerEndpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Available,
    Allocated,
}

/// Registered worker servers and their allocation state.
///
/// A single ordered map holds every endpoint exactly once, so an endpoint
/// can never be both free and allocated, and allocation always hands out
/// the earliest-registered free servers first.
#[derive(Debug, Default)]
pub struct WorkerPool {
    workers: IndexMap<WorkerEndpoint, Slot>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a server. Returns `false` if it was already registered, in
    /// which case nothing changes.
    pub fn register(&mut self, endpoint: WorkerEndpoint) -> bool {
        if self.workers.contains_key(&endpoint) {
            return false;
        }
        debug!(worker = %endpoint, "registered worker server");
        self.workers.insert(endpoint, Slot::Available);
        true
    }

    /// Remove a free server.
    pub fn deregister(&mut self, endpoint: &WorkerEndpoint) -> Result<(), PoolError> {
        match self.workers.get(endpoint) {
            None => Err(PoolError::UnknownWorker {
                endpoint: endpoint.to_string(),
            }),
            Some(Slot::Allocated) => Err(PoolError::WorkerBusy {
                endpoint: endpoint.to_string(),
            }),
            Some(Slot::Available) => {
                self.workers.shift_remove(endpoint);
                debug!(worker = %endpoint, "deregistered worker server");
                Ok(())
            }
        }
    }

    /// Allocate `count` free servers in registration order. All or nothing.
    pub fn allocate(&mut self, count: usize) -> Result<Vec<WorkerEndpoint>, PoolError> {
        let available = self.available_count();
        if count > available {
            return Err(PoolError::InsufficientWorkers {
                requested: count,
                available,
            });
        }

        let mut taken = Vec::with_capacity(count);
        for (endpoint, slot) in &mut self.workers {
            if taken.len() == count {
                break;
            }
            if *slot == Slot::Available {
                *slot = Slot::Allocated;
                taken.push(endpoint.clone());
            }
        }
        debug!(count, "allocated worker servers");
        Ok(taken)
    }

    /// Return servers to the free set. Fails without changing anything if
    /// any of them is not currently allocated.
    pub fn deallocate(&mut self, endpoints: &[WorkerEndpoint]) -> Result<(), PoolError> {
        for endpoint in endpoints {
            match self.workers.get(endpoint) {
                Some(Slot::Allocated) => {}
                Some(Slot::Available) => {
                    return Err(PoolError::NotAllocated {
                        endpoint: endpoint.to_string(),
                    });
                }
                None => {
                    return Err(PoolError::UnknownWorker {
                        endpoint: endpoint.to_string(),
                    });
                }
            }
        }
        for endpoint in endpoints {
            if let Some(slot) = self.workers.get_mut(endpoint) {
                *slot = Slot::Available;
            }
        }
        debug!(count = endpoints.len(), "released worker servers");
        Ok(())
    }

    pub fn available(&self) -> Vec<WorkerEndpoint> {
        self.with_slot(Slot::Available)
    }

    pub fn allocated(&self) -> Vec<WorkerEndpoint> {
        self.with_slot(Slot::Allocated)
    }

    pub fn available_count(&self) -> usize {
        self.workers
            .values()
            .filter(|s| **s == Slot::Available)
            .count()
    }

    /// Every registered server with its allocation flag, in registration order.
    pub fn entries(&self) -> Vec<(WorkerEndpoint, bool)> {
        self.workers
            .iter()
            .map(|(e, s)| (e.clone(), *s == Slot::Allocated))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    fn with_slot(&self, wanted: Slot) -> Vec<WorkerEndpoint> {
        self.workers
            .iter()
            .filter(|(_, s)| **s == wanted)
            .map(|(e, _)| e.clone())
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ep(port: u16) -> WorkerEndpoint {
        WorkerEndpoint::new("192.168.1.150", port).unwrap()
    }

    fn pool_of(n: u16) -> WorkerPool {
        let mut pool = WorkerPool::new();
        for port in 0..n {
            pool.register(ep(5000 + port));
        }
        pool
    }

    #[test]
    fn register_twice_keeps_one_entry() {
        let mut pool = WorkerPool::new();
        assert!(pool.register(ep(5000)));
        assert!(!pool.register(ep(5000)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn register_allocated_endpoint_is_noop() {
        let mut pool = pool_of(1);
        pool.allocate(1).unwrap();
        assert!(!pool.register(ep(5000)));
        assert_eq!(pool.allocated(), vec![ep(5000)]);
        assert!(pool.available().is_empty());
    }

    #[test]
    fn allocate_then_deallocate_restores_available_set() {
        let mut pool = pool_of(4);
        let before = pool.available();
        let taken = pool.allocate(3).unwrap();
        assert_eq!(taken, vec![ep(5000), ep(5001), ep(5002)]);
        assert_eq!(pool.available(), vec![ep(5003)]);
        pool.deallocate(&taken).unwrap();
        assert_eq!(pool.available(), before);
        assert!(pool.allocated().is_empty());
    }

    #[test]
    fn allocate_more_than_available_changes_nothing() {
        let mut pool = pool_of(2);
        let err = pool.allocate(3).unwrap_err();
        assert_eq!(
            err,
            PoolError::InsufficientWorkers {
                requested: 3,
                available: 2
            }
        );
        assert_eq!(pool.available().len(), 2);
    }

    #[test]
    fn deregister_allocated_fails() {
        let mut pool = pool_of(1);
        pool.allocate(1).unwrap();
        assert!(matches!(
            pool.deregister(&ep(5000)),
            Err(PoolError::WorkerBusy { .. })
        ));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn deregister_unknown_reports_not_found() {
        let mut pool = WorkerPool::new();
        assert!(matches!(
            pool.deregister(&ep(60000)),
            Err(PoolError::UnknownWorker { .. })
        ));
    }

    #[test]
    fn deallocate_is_all_or_nothing() {
        let mut pool = pool_of(2);
        let taken = pool.allocate(1).unwrap();
        let mixed = vec![taken[0].clone(), ep(5001)];
        assert!(pool.deallocate(&mixed).is_err());
        assert_eq!(pool.allocated(), taken);
    }

    #[test]
    fn entries_report_allocation_flag() {
        let mut pool = pool_of(2);
        pool.allocate(1).unwrap();
        assert_eq!(pool.entries(), vec![(ep(5000), true), (ep(5001), false)]);
    }
}
