use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::{Result, Route, WebhookHttpError};

/// Connections allowed per route.
pub const MAX_CONNECTIONS_PER_ROUTE: usize = 100;
/// Connections allowed in total: two targets at full per-route capacity.
pub const MAX_TOTAL_CONNECTIONS: usize = 2 * MAX_CONNECTIONS_PER_ROUTE;
/// Pooled connections idle longer than this are not reused as-is.
pub const VALIDATE_AFTER_INACTIVITY: Duration = Duration::from_millis(10_000);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PoolLimits {
    pub max_per_route: usize,
    pub max_total: usize,
    pub validate_after_inactivity: Duration,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_per_route: MAX_CONNECTIONS_PER_ROUTE,
            max_total: MAX_TOTAL_CONNECTIONS,
            validate_after_inactivity: VALIDATE_AFTER_INACTIVITY,
        }
    }
}

/// Arbitrates connection slots per route and in total.
///
/// Callers wait for a free slot up to the acquisition timeout. Slots are
/// handed out in FIFO order per semaphore.
#[derive(Debug)]
pub(crate) struct ConnectionPool {
    limits: PoolLimits,
    acquire_timeout: Duration,
    total: Arc<Semaphore>,
    routes: RouteSlots,
}

type RouteSlots = Arc<Mutex<HashMap<Route, Arc<Semaphore>>>>;

/// Holds one route slot and one global slot until dropped.
///
/// Dropping the last lease of a route with no waiters forgets the route.
#[derive(Debug)]
pub(crate) struct ConnectionLease {
    route_permit: Option<OwnedSemaphorePermit>,
    _total: OwnedSemaphorePermit,
    route: Route,
    routes: RouteSlots,
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        drop(self.route_permit.take());
        forget_idle_route(&self.routes, &self.route);
    }
}

/// Removes `route` once the map holds the only handle to its semaphore, that
/// is, no lease and no waiter refers to it.
fn forget_idle_route(routes: &RouteSlots, route: &Route) {
    let mut routes = routes.lock().unwrap_or_else(PoisonError::into_inner);
    if routes
        .get(route)
        .is_some_and(|slots| Arc::strong_count(slots) == 1)
    {
        routes.remove(route);
    }
}

impl ConnectionPool {
    pub(crate) fn new(limits: PoolLimits, acquire_timeout: Duration) -> Self {
        Self {
            limits,
            acquire_timeout,
            total: Arc::new(Semaphore::new(limits.max_total)),
            routes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn limits(&self) -> PoolLimits {
        self.limits
    }

    pub(crate) async fn acquire(&self, route: &Route) -> Result<ConnectionLease> {
        let route_slots = self.route_slots(route)?;
        let total = Arc::clone(&self.total);
        let routes = Arc::clone(&self.routes);
        let lease_route = route.clone();

        let acquire = async move {
            let route_permit = route_slots.acquire_owned().await?;
            let total_permit = total.acquire_owned().await?;
            Ok::<_, tokio::sync::AcquireError>(ConnectionLease {
                route_permit: Some(route_permit),
                _total: total_permit,
                route: lease_route,
                routes,
            })
        };

        let outcome = tokio::time::timeout(self.acquire_timeout, acquire).await;
        let err = match outcome {
            Ok(Ok(lease)) => return Ok(lease),
            Ok(Err(_)) => WebhookHttpError::Closed,
            Err(_) => WebhookHttpError::PoolTimeout {
                route: route.clone(),
                waited_ms: u64::try_from(self.acquire_timeout.as_millis()).unwrap_or(u64::MAX),
            },
        };
        forget_idle_route(&self.routes, route);
        Err(err)
    }

    /// Fails pending and future acquisitions with [`WebhookHttpError::Closed`].
    pub(crate) fn close(&self) {
        self.total.close();
        let routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        for slots in routes.values() {
            slots.close();
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.total.is_closed()
    }

    #[cfg(test)]
    fn tracked_routes(&self) -> usize {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn route_slots(&self, route: &Route) -> Result<Arc<Semaphore>> {
        if self.is_closed() {
            return Err(WebhookHttpError::Closed);
        }
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let slots = routes
            .entry(route.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(self.limits.max_per_route)));
        Ok(Arc::clone(slots))
    }
}
