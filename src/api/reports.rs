//! Report retrieval
//!
//! Reports come either straight back from a single request or from a generation job that is
//! started, polled until it reports `Completed` or `Failed`, and then downloaded from the URL it
//! hands out.

use super::types::{ReportBody, ReportRequest};
use super::ApiClient;
use crate::config::ReportDelivery;
use crate::poll::{poll_until, Check, PollConfig, PollError};
use crate::transport::{ApiRequest, BinaryEnvelope, Processed, Transport};
use log::{debug, error, info};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, PartialEq)]
pub enum ReportError {
    #[error("failed to start report generation: {0}")]
    StartFailed(String),

    #[error("failed to get report status: {0}")]
    StatusUnavailable(String),

    #[error("report generation failed: {0}")]
    JobFailed(String),

    #[error("timed out waiting for report generation after {elapsed:?} ({attempts} checks)")]
    TimedOut { elapsed: Duration, attempts: u32 },

    #[error("report retrieval cancelled")]
    Cancelled,

    #[error("no download URL returned")]
    MissingDownloadUrl,

    #[error("failed to download report: {0}")]
    DownloadFailed(String),
}

impl From<PollError<ReportError>> for ReportError {
    fn from(e: PollError<ReportError>) -> Self {
        match e {
            PollError::Check(e) => e,
            PollError::TimedOut { elapsed, attempts } => ReportError::TimedOut { elapsed, attempts },
            PollError::Cancelled { .. } => ReportError::Cancelled,
        }
    }
}

impl<T: Transport> ApiClient<T> {
    /// Render a workbook element and return the report bytes in one request
    pub async fn download_report(&self, request: &ReportRequest) -> Processed<Vec<u8>, BinaryEnvelope> {
        let api_request = ApiRequest::post(format!("/Reports/Workbooks/{}", request.workbook_id))
            .json(&ReportBody::from(request));
        let mut envelope = self.transport.call_binary(api_request).await;

        match envelope.data.take() {
            Some(bytes) => {
                info!("Downloaded {} report ({} bytes)", request.format, bytes.len());
                Processed::success(envelope, bytes)
            }
            None => {
                error!("Failed to download {} report: {}", request.format, envelope.describe());
                Processed::failure(envelope)
            }
        }
    }

    /// Start a generation job for a workbook element, wait for it, then fetch the result
    ///
    /// `config` bounds the wait; a job the server marks `Failed` ends the wait immediately with
    /// the server's message.
    pub async fn generate_report(
        &self,
        request: &ReportRequest,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ReportError> {
        let start = ApiRequest::post(format!("/Reports/Workbooks/{}/Generate", request.workbook_id))
            .json(&ReportBody::from(request));
        let envelope = self.transport.call(start).await;
        let generation_id = match envelope.field_str("generationId") {
            Some(id) if !envelope.has_error => id,
            _ => return Err(ReportError::StartFailed(envelope.describe())),
        };
        info!("Generating {} report ({})", request.format, generation_id);

        let status_path = format!("/Reports/Workbooks/Status/{}", generation_id);
        let download_url = poll_until(config, cancel, |attempt| {
            let status_path = status_path.clone();
            async move {
                let envelope = self.transport.call(ApiRequest::get(status_path)).await;
                if envelope.has_error || envelope.parsed.is_none() {
                    return Err(ReportError::StatusUnavailable(envelope.describe()));
                }

                match envelope.field_str("status").as_deref() {
                    Some("Completed") => match envelope.field_str("downloadUrl") {
                        Some(url) if !url.is_empty() => Ok(Check::Ready(url)),
                        _ => Err(ReportError::MissingDownloadUrl),
                    },
                    Some("Failed") => Err(ReportError::JobFailed(envelope.field_str("message").unwrap_or_default())),
                    status => {
                        debug!("Report status {:?} (check {})", status, attempt);
                        Ok(Check::Pending)
                    }
                }
            }
        })
        .await
        .map_err(ReportError::from)?;

        let download = self.transport.get_object(&download_url).await;
        match download.data {
            Some(bytes) => {
                info!("Downloaded generated {} report ({} bytes)", request.format, bytes.len());
                Ok(bytes)
            }
            None => Err(ReportError::DownloadFailed(download.describe())),
        }
    }

    /// Fetch a report using the configured delivery
    pub async fn fetch_report(
        &self,
        request: &ReportRequest,
        delivery: ReportDelivery,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ReportError> {
        if cancel.is_cancelled() {
            return Err(ReportError::Cancelled);
        }
        match delivery {
            ReportDelivery::Direct => match self.download_report(request).await {
                Processed::Success { value, .. } => Ok(value),
                Processed::Failure { envelope } => Err(ReportError::DownloadFailed(envelope.describe())),
            },
            ReportDelivery::Generated => self.generate_report(request, config, cancel).await,
        }
    }
}
