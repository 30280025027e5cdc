//! Cross-tenant leak detection.

use pipeline_core::Result;
use serde::Serialize;
use tracing::{error, info};

use crate::LogStore;

/// Result of checking one tenant's view of the store.
#[derive(Debug, Clone, Serialize)]
pub struct IsolationReport {
    pub tenant_id: String,
    pub records_checked: usize,
    /// `tenant_id/log_id` of every foreign record that was visible
    pub leaked: Vec<String>,
}

impl IsolationReport {
    pub fn is_isolated(&self) -> bool {
        self.leaked.is_empty()
    }
}

/// Read up to `sample` of a tenant's records through `list` and `get` and report any
/// record that belongs to another tenant.
pub async fn verify_tenant_isolation(
    store: &dyn LogStore,
    tenant_id: &str,
    sample: usize,
) -> Result<IsolationReport> {
    let listed = store.list(tenant_id, sample).await?;
    let mut leaked = Vec::new();

    for record in &listed {
        if record.tenant_id != tenant_id {
            leaked.push(format!("{}/{}", record.tenant_id, record.log_id));
            continue;
        }
        if let Some(fetched) = store.get(tenant_id, &record.log_id).await? {
            if fetched.tenant_id != tenant_id {
                leaked.push(format!("{}/{}", fetched.tenant_id, fetched.log_id));
            }
        }
    }

    let report = IsolationReport {
        tenant_id: tenant_id.to_string(),
        records_checked: listed.len(),
        leaked,
    };

    if report.is_isolated() {
        info!(tenant_id, checked = report.records_checked, "Tenant isolation verified");
    } else {
        error!(tenant_id, leaked = ?report.leaked, "Tenant isolation violated");
    }

    Ok(report)
}
