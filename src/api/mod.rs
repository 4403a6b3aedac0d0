//! Remote API operations
//!
//! Every operation returns a [`Processed`] value: the envelope of the last call it made and, on
//! success, the field(s) the caller needs. Listings return plain collections because a failed
//! page ends the listing rather than failing it.

mod paginate;
mod projection;
mod reports;
pub mod types;
mod upload;

pub use paginate::{PageCursor, PAGE_LIMIT};
pub use reports::ReportError;
pub use types::{
    DataTableParams, DataTableSummary, DecrementTableParams, DecrementTableSummary, ReportFormat, ReportRequest,
    ScenarioTableParams, TableStructure,
};
pub use upload::UploadHandle;

use crate::transport::{ApiRequest, Envelope, Processed, Transport};
use log::{error, info};
use types::AuthorizeRequest;

/// Client for the remote modeling API
///
/// Owns its transport exclusively. Authorization replaces the transport with one that carries
/// the bearer token; nothing else about the client changes after that.
#[derive(Debug)]
pub struct ApiClient<T: Transport> {
    transport: T,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Exchange API credentials for an access token and attach it to all later calls
    pub async fn authorize(&mut self, api_key: &str, api_secret_key: &str) -> Processed<()> {
        let request = ApiRequest::post("/Authorize").json(&AuthorizeRequest {
            api_key,
            api_secret_key,
        });
        let envelope = self.transport.call(request).await;

        let token = match envelope.field_str("accessToken") {
            Some(token) if !envelope.has_error => token,
            _ => {
                error!("Authorization failed: {}", envelope.describe());
                return Processed::failure(envelope);
            }
        };

        match self.transport.with_bearer_token(&token) {
            Ok(transport) => {
                self.transport = transport;
                info!("Authorized");
                Processed::success(envelope, ())
            }
            Err(e) => {
                error!("Access token could not be used as a header: {}", e);
                Processed::failure(Envelope::failure(e.to_string()))
            }
        }
    }
}
