//! Health probe strategies.
//!
//! The monitor only knows [`HealthProbe`]; how a service is actually probed
//! (adapter call, raw HTTP, TCP connect) is up to the implementation.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ServiceResult;
use crate::services::{ServiceAdapters, ServiceHealth, ServiceKind};

#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Key under which the result is reported.
    fn service_name(&self) -> &str;

    async fn probe(&self) -> ServiceResult<ServiceHealth>;
}

/// Probes a service through its adapter's `health_check`.
#[derive(Debug, Clone)]
pub struct AdapterProbe {
    service: ServiceKind,
    adapters: ServiceAdapters,
}

impl AdapterProbe {
    pub fn new(service: ServiceKind, adapters: ServiceAdapters) -> Self {
        Self { service, adapters }
    }

    /// One probe per service domain.
    pub fn for_all(adapters: &ServiceAdapters) -> Vec<Arc<dyn HealthProbe>> {
        ServiceKind::ALL
            .iter()
            .map(|kind| Arc::new(Self::new(*kind, adapters.clone())) as Arc<dyn HealthProbe>)
            .collect()
    }
}

#[async_trait]
impl HealthProbe for AdapterProbe {
    fn service_name(&self) -> &str {
        self.service.as_str()
    }

    async fn probe(&self) -> ServiceResult<ServiceHealth> {
        self.adapters.health_check(self.service).await
    }
}
