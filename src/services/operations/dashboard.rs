//! `dashboardData`: headline sales metrics for the dashboard view.

use async_trait::async_trait;
use serde::Serialize;

use crate::services::auth::principal::Principal;
use crate::services::operations::{Resolver, ResolverError};

pub const OPERATION: &str = "dashboardData";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub date: &'static str,
    pub amount: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub sales_volume: u32,
    pub new_customers: u32,
    pub refunds: u32,
    pub graph_data: Vec<Sale>,
}

impl DashboardData {
    pub fn sample() -> Self {
        let graph_data = [
            ("Jan", 2100),
            ("Feb", 1850),
            ("Mar", 2600),
            ("Apr", 2300),
            ("May", 3100),
            ("Jun", 2950),
            ("Jul", 3400),
        ]
        .into_iter()
        .map(|(date, amount)| Sale { date, amount })
        .collect::<Vec<_>>();

        Self {
            sales_volume: graph_data.iter().map(|s| s.amount).sum(),
            new_customers: 48,
            refunds: 3,
            graph_data,
        }
    }
}

pub struct DashboardResolver;

#[async_trait]
impl Resolver for DashboardResolver {
    async fn resolve(
        &self,
        _principal: Option<&Principal>,
        _variables: &serde_json::Value,
    ) -> Result<serde_json::Value, ResolverError> {
        serde_json::to_value(DashboardData::sample())
            .map_err(|e| ResolverError::Internal(e.to_string()))
    }
}
