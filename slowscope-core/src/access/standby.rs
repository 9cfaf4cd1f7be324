//! Standby resolution.

use super::AccessLayer;
use super::config::MASTER_PLACEHOLDER;
use super::connector::{QueryParam, row_str};
use crate::models::HostRole;
use crate::Result;

impl AccessLayer {
    /// Finds the standby of `master`.
    ///
    /// Sources in order: the static map (host names compared without case),
    /// the naming convention, then the cluster registry. Registry lookups
    /// that fail are logged and treated as "no standby". A standby equal to
    /// the master is ignored.
    pub async fn resolve_standby(&self, master: &str) -> Option<String> {
        let topology = &self.config.topology;

        let candidate = if let Some(standby) = topology
            .static_map
            .iter()
            .find(|(m, _)| m.eq_ignore_ascii_case(master))
            .map(|(_, s)| s.clone())
        {
            Some(standby)
        } else if let Some(template) = &topology.convention {
            Some(template.replace(MASTER_PLACEHOLDER, master))
        } else if topology.registry.is_some() {
            match self.lookup_registry(master).await {
                Ok(found) => found,
                Err(error) => {
                    tracing::warn!("Cluster registry lookup for {} failed: {}", master, error);
                    None
                }
            }
        } else {
            None
        };

        candidate
            .map(|standby| standby.trim().to_string())
            .filter(|standby| !standby.is_empty() && !standby.eq_ignore_ascii_case(master))
    }

    /// Reads the registry on the business host, without fallback.
    async fn lookup_registry(&self, master: &str) -> Result<Option<String>> {
        let Some(registry) = &self.config.topology.registry else {
            return Ok(None);
        };
        let registry_host = self.config.business.host.clone();
        let connection = self
            .open_session(&registry_host, HostRole::Master, Some(&registry.database))
            .await?;

        let cluster_sql = format!(
            "SELECT cluster_name FROM {} WHERE ip = ? AND instance_role = 'M'",
            registry.table
        );
        let standby_sql = format!(
            "SELECT ip FROM {} WHERE cluster_name = ? AND instance_role = 'S' ORDER BY ip",
            registry.table
        );

        let result: Result<Option<String>> = async {
            let rows = connection
                .fetch_all(&cluster_sql, &[QueryParam::from(master)])
                .await?;
            let Some(cluster) = rows.first().and_then(|row| row_str(row, "cluster_name")) else {
                tracing::debug!("{} is not registered as a master", master);
                return Ok(None);
            };
            let rows = connection
                .fetch_all(&standby_sql, &[QueryParam::from(cluster.as_str())])
                .await?;
            Ok(rows.first().and_then(|row| row_str(row, "ip")))
        }
        .await;

        if let Err(error) = connection.release().await {
            tracing::debug!("Releasing registry connection failed: {}", error);
        }
        result
    }
}
