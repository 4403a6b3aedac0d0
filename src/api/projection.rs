//! Projection lifecycle: create from template, configure, run, wait, read status

use super::types::{
    remote_date, CreateProjectionRequest, ModelPointFileRef, ProjectionDataTable, ProjectionPortfolio,
    ProjectionProduct, RunProjectionRequest, UpdateProjectionPortfoliosRequest, UpdateProjectionRequest,
    UpdateProjectionTablesRequest,
};
use super::ApiClient;
use crate::poll::{poll_until, Check, PollConfig, PollError};
use crate::transport::{ApiRequest, Envelope, Processed, Transport};
use chrono::NaiveDate;
use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

impl<T: Transport> ApiClient<T> {
    /// Returns the new projection id
    pub async fn create_projection_from_template(&self, template_id: i64, name: &str) -> Processed<i64> {
        let envelope = self
            .transport
            .call(ApiRequest::post("/Projections").json(&CreateProjectionRequest { template_id, name }))
            .await;
        let processed = Processed::extract(envelope, |e| e.field_i64("id"));
        match processed.value() {
            Some(id) => info!("Created projection {} from template {}", id, template_id),
            None => error!("Failed to create projection: {}", processed.envelope().describe()),
        }
        processed
    }

    /// Set the start date and scenario table of a projection
    pub async fn update_projection(&self, projection_id: i64, start_date: NaiveDate, scenario_table_id: i64) -> Processed<()> {
        let body = UpdateProjectionRequest {
            start_date: remote_date(start_date),
            scenario_table_id,
        };
        self.patch_projection(projection_id, ApiRequest::patch(format!("/Projections/{}", projection_id)).json(&body))
            .await
    }

    /// Point a projection's table structure at a data table
    pub async fn update_projection_table(&self, projection_id: i64, table_structure_name: &str, data_table_id: i64) -> Processed<()> {
        let body = UpdateProjectionTablesRequest {
            data_tables: vec![ProjectionDataTable {
                table_structure_name,
                data_table_id,
            }],
        };
        self.patch_projection(projection_id, ApiRequest::patch(format!("/Projections/{}", projection_id)).json(&body))
            .await
    }

    /// Attach a model-point file to one product of one portfolio
    pub async fn update_projection_model_point_file(
        &self,
        projection_id: i64,
        portfolio_name: &str,
        product_name: &str,
        file_id: i64,
    ) -> Processed<()> {
        let body = UpdateProjectionPortfoliosRequest {
            portfolios: vec![ProjectionPortfolio {
                portfolio_name,
                products: vec![ProjectionProduct {
                    product_name,
                    model_point_file: ModelPointFileRef { file_id },
                }],
            }],
        };
        self.patch_projection(projection_id, ApiRequest::patch(format!("/Projections/{}", projection_id)).json(&body))
            .await
    }

    async fn patch_projection(&self, projection_id: i64, request: ApiRequest) -> Processed<()> {
        let processed = Processed::acknowledged(self.transport.call(request).await);
        if !processed.is_success() {
            error!("Failed to update projection {}: {}", projection_id, processed.envelope().describe());
        }
        processed
    }

    pub async fn run_projection(&self, projection_id: i64) -> Processed<()> {
        let request = ApiRequest::post(format!("/Projections/{}/run", projection_id))
            .json(&RunProjectionRequest { projection_id });
        let processed = Processed::acknowledged(self.transport.call(request).await);
        if processed.is_success() {
            info!("Started projection {}", projection_id);
        } else {
            error!("Failed to start projection {}: {}", projection_id, processed.envelope().describe());
        }
        processed
    }

    pub async fn is_projection_running(&self, projection_id: i64) -> Processed<bool> {
        let envelope = self
            .transport
            .call(ApiRequest::get(format!("/Projections/{}", projection_id)))
            .await;
        Processed::extract(envelope, |e| e.field_bool("isRunning"))
    }

    pub async fn get_projection_status(&self, projection_id: i64) -> Processed<String> {
        let envelope = self
            .transport
            .call(ApiRequest::get(format!("/Projections/{}?Fields=status", projection_id)))
            .await;
        Processed::extract(envelope, |e| e.field_str("status"))
    }

    /// Wait until the projection reports it is no longer running
    ///
    /// A status check that fails ends the wait with that check's envelope rather than being read
    /// as "not running".
    pub async fn wait_for_projection(
        &self,
        projection_id: i64,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> Result<(), PollError<Envelope>> {
        let result = poll_until(config, cancel, |attempt| async move {
            match self.is_projection_running(projection_id).await.into_parts() {
                (_, Some(true)) => {
                    debug!("Projection {} still running (check {})", projection_id, attempt);
                    Ok(Check::Pending)
                }
                (_, Some(false)) => Ok(Check::Ready(())),
                (envelope, None) => Err(envelope),
            }
        })
        .await;

        match &result {
            Ok(()) => info!("Projection {} finished running", projection_id),
            Err(PollError::Check(envelope)) => {
                error!("Lost track of projection {}: {}", projection_id, envelope.describe())
            }
            Err(e) => error!("Stopped waiting for projection {}: {}", projection_id, e),
        }
        result
    }
}
