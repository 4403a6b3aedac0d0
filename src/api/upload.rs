//! Two-phase file upload and the resources created from uploaded files
//!
//! 1. ask the API for a pre-signed location for a remote path
//! 2. PUT the raw bytes straight to that location
//! 3. confirm the upload with the API, which returns the file id
//!
//! A failure at any step returns immediately; later steps are never attempted.

use super::types::{DataTableParams, DecrementTableParams, DownloadFileRequest, FilePathRequest, ScenarioTableParams};
use super::ApiClient;
use crate::transport::{ApiRequest, BinaryEnvelope, Envelope, Processed, Transport, TransportError};
use log::{error, info};
use std::path::{Path, PathBuf};

/// A confirmed upload: local source, remote logical path, the location the bytes went to and
/// the id the service assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadHandle {
    pub local_path: PathBuf,
    pub remote_path: String,
    pub upload_url: String,
    pub file_id: i64,
}

impl<T: Transport> ApiClient<T> {
    pub async fn upload_file(&self, local_path: &Path, remote_path: &str) -> Processed<UploadHandle> {
        let body = FilePathRequest { file_path: remote_path };

        let location = self
            .transport
            .call(ApiRequest::post("/Files/GetUploadUrl").json(&body))
            .await;
        let upload_url = match location.field_str("uploadUrl") {
            Some(url) if !location.has_error => url,
            _ => {
                error!("No upload location for {}: {}", remote_path, location.describe());
                return Processed::failure(location);
            }
        };

        let content_length = match tokio::fs::metadata(local_path).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                error!("Could not read {}: {}", local_path.display(), e);
                return Processed::failure(Envelope::failure("Could not read file from filepath."));
            }
        };

        match self.transport.put_object(&upload_url, local_path, content_length).await {
            Ok(200) => {}
            Ok(status) => {
                error!("Upload of {} rejected with HTTP {}", local_path.display(), status);
                return Processed::failure(Envelope::failure("Failed to upload file to upload URL."));
            }
            Err(TransportError::Io(e)) => {
                error!("Could not read {}: {}", local_path.display(), e);
                return Processed::failure(Envelope::failure("Could not read file from filepath."));
            }
            Err(e) => {
                error!("Upload of {} failed: {}", local_path.display(), e);
                return Processed::failure(Envelope::failure("Failed to upload file to upload URL."));
            }
        }

        let confirmation = self
            .transport
            .call(ApiRequest::post("/Files/SaveUpload").json(&body))
            .await;

        let processed = Processed::extract(confirmation, |e| e.field_i64("fileId")).map(|file_id| UploadHandle {
            local_path: local_path.to_path_buf(),
            remote_path: remote_path.to_string(),
            upload_url,
            file_id,
        });
        match processed.value() {
            Some(handle) => info!("Uploaded {} as file {}", remote_path, handle.file_id),
            None => error!("Upload of {} was not confirmed: {}", remote_path, processed.envelope().describe()),
        }
        processed
    }

    /// Upload the scenario file and create the scenario table from it. Returns the table id.
    pub async fn create_scenario_table(&self, local_path: &Path, params: &ScenarioTableParams) -> Processed<i64> {
        if let (envelope, None) = self.upload_file(local_path, &params.file_path).await.into_parts() {
            return Processed::failure(envelope);
        }

        let envelope = self
            .transport
            .call(ApiRequest::post("/ScenarioTables").json(params))
            .await;
        created(envelope, "scenario table")
    }

    /// Upload the table file and create a data table from it. Returns the table id.
    pub async fn create_data_table(&self, local_path: &Path, params: &DataTableParams) -> Processed<i64> {
        if let (envelope, None) = self.upload_file(local_path, &params.file_path).await.into_parts() {
            return Processed::failure(envelope);
        }

        let envelope = self
            .transport
            .call(ApiRequest::post("/DataTables").json(params))
            .await;
        created(envelope, "data table")
    }

    /// Upload a new file for an existing data table. Returns the table id.
    pub async fn update_data_table(&self, local_path: &Path, params: &DataTableParams) -> Processed<i64> {
        if let (envelope, None) = self.upload_file(local_path, &params.file_path).await.into_parts() {
            return Processed::failure(envelope);
        }

        let envelope = self
            .transport
            .call(ApiRequest::patch("/DataTables").json(params))
            .await;
        created(envelope, "data table update")
    }

    /// Upload a decrement table file and create the table from it. Returns the table id.
    pub async fn create_decrement_table(&self, local_path: &Path, params: &DecrementTableParams) -> Processed<i64> {
        if let (envelope, None) = self.upload_file(local_path, &params.file_path).await.into_parts() {
            return Processed::failure(envelope);
        }

        let envelope = self
            .transport
            .call(ApiRequest::post("/DecrementTables").json(params))
            .await;
        created(envelope, "decrement table")
    }

    /// Fetch a previously uploaded file by its remote path
    pub async fn download_file(&self, remote_path: &str, version: Option<u32>) -> Processed<Vec<u8>, BinaryEnvelope> {
        let request = ApiRequest::post("/Files/GetDownloadUrl").json(&DownloadFileRequest {
            file_path: remote_path,
            version,
        });
        let envelope = self.transport.call(request).await;
        let url = match envelope.field_str("downloadUrl") {
            Some(url) if !envelope.has_error => url,
            _ => {
                error!("No download location for {}: {}", remote_path, envelope.describe());
                return Processed::failure(BinaryEnvelope::failure(envelope.describe()));
            }
        };

        let mut download = self.transport.get_object(&url).await;
        match download.data.take() {
            Some(bytes) => Processed::success(download, bytes),
            None => {
                error!("Download of {} failed: {}", remote_path, download.describe());
                Processed::failure(download)
            }
        }
    }
}

fn created(envelope: Envelope, what: &str) -> Processed<i64> {
    let processed = Processed::extract(envelope, |e| e.field_i64("id"));
    match processed.value() {
        Some(id) => info!("Created {} {}", what, id),
        None => error!("Failed to create {}: {}", what, processed.envelope().describe()),
    }
    processed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::{FakeTransport, Reply};
    use crate::transport::Method;
    use serde_json::json;
    use std::io::Write;

    fn source_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    fn upload_routes(fake: &FakeTransport) {
        fake.json(Method::POST, "/Files/GetUploadUrl", json!({"uploadUrl": "https://bucket/signed?sig=1"}));
        fake.json(Method::POST, "/Files/SaveUpload", json!({"fileId": 99}));
    }

    #[tokio::test]
    async fn test_upload_runs_all_three_steps() {
        let fake = FakeTransport::new();
        upload_routes(&fake);
        let file = source_file(b"policy,age\n1,65\n");

        let client = ApiClient::new(fake.clone());
        let processed = client.upload_file(file.path(), "Inforce/Inforce.csv").await;

        let handle = processed.into_value().unwrap();
        assert_eq!(handle.file_id, 99);
        assert_eq!(handle.upload_url, "https://bucket/signed?sig=1");
        assert_eq!(handle.remote_path, "Inforce/Inforce.csv");

        let puts = fake.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].content_length, 16);
        assert_eq!(fake.call_log(), vec!["POST /Files/GetUploadUrl", "POST /Files/SaveUpload"]);
        assert_eq!(fake.calls()[1].body, Some(json!({"filePath": "Inforce/Inforce.csv"})));
    }

    #[tokio::test]
    async fn test_failed_location_request_skips_put_and_confirm() {
        let fake = FakeTransport::new();
        fake.on(Method::POST, "/Files/GetUploadUrl", Reply::Json(403, json!({"message": "nope"})));
        let file = source_file(b"x");

        let client = ApiClient::new(fake.clone());
        let processed = client.upload_file(file.path(), "Inforce/x.csv").await;

        assert!(!processed.is_success());
        assert_eq!(processed.envelope().status, Some(403));
        assert!(fake.puts().is_empty());
        assert_eq!(fake.count(Method::POST, "/Files/SaveUpload"), 0);
    }

    #[tokio::test]
    async fn test_rejected_put_skips_confirm() {
        let fake = FakeTransport::new();
        upload_routes(&fake);
        fake.set_put_status(403);
        let file = source_file(b"x");

        let client = ApiClient::new(fake.clone());
        let processed = client.upload_file(file.path(), "Inforce/x.csv").await;

        assert!(!processed.is_success());
        assert_eq!(
            processed.envelope().raw_response.as_deref(),
            Some("Failed to upload file to upload URL.")
        );
        assert_eq!(fake.count(Method::POST, "/Files/SaveUpload"), 0);
    }

    #[tokio::test]
    async fn test_missing_local_file_skips_put() {
        let fake = FakeTransport::new();
        upload_routes(&fake);

        let client = ApiClient::new(fake.clone());
        let processed = client.upload_file(Path::new("/no/such/file.csv"), "Inforce/x.csv").await;

        assert_eq!(
            processed.envelope().raw_response.as_deref(),
            Some("Could not read file from filepath.")
        );
        assert!(fake.puts().is_empty());
        assert_eq!(fake.count(Method::POST, "/Files/SaveUpload"), 0);
    }

    #[tokio::test]
    async fn test_file_unreadable_at_put_time() {
        let fake = FakeTransport::new();
        upload_routes(&fake);
        fake.fail_put_open();
        let file = source_file(b"x");

        let client = ApiClient::new(fake.clone());
        let processed = client.upload_file(file.path(), "Inforce/x.csv").await;

        assert!(!processed.is_success());
        assert_eq!(
            processed.envelope().raw_response.as_deref(),
            Some("Could not read file from filepath.")
        );
        assert_eq!(fake.count(Method::POST, "/Files/SaveUpload"), 0);
    }

    #[tokio::test]
    async fn test_confirmation_without_file_id_fails() {
        let fake = FakeTransport::new();
        fake.json(Method::POST, "/Files/GetUploadUrl", json!({"uploadUrl": "https://bucket/signed"}));
        fake.json(Method::POST, "/Files/SaveUpload", json!({"saved": true}));
        let file = source_file(b"x");

        let client = ApiClient::new(fake.clone());
        let processed = client.upload_file(file.path(), "Inforce/x.csv").await;

        assert_eq!(fake.puts().len(), 1);
        assert!(!processed.is_success());
        assert!(!processed.envelope().has_error);
    }

    #[tokio::test]
    async fn test_scenario_table_created_after_upload() {
        let fake = FakeTransport::new();
        upload_routes(&fake);
        fake.json(Method::POST, "/ScenarioTables", json!({"id": 42}));
        let file = source_file(b"month,rate\n1,0.02\n");

        let params = ScenarioTableParams {
            model_id: 9999,
            name: "Scenarios 2021-01".to_string(),
            start_date: "2021-01-31T00:00:00".to_string(),
            yield_curve_rate_type: "BondEquivalent".to_string(),
            file_path: "Scenario Files/Scenarios 2021-01.csv".to_string(),
            delimiter: ",".to_string(),
        };
        let client = ApiClient::new(fake.clone());
        let processed = client.create_scenario_table(file.path(), &params).await;

        assert_eq!(processed.value(), Some(&42));
        assert_eq!(
            fake.call_log(),
            vec!["POST /Files/GetUploadUrl", "POST /Files/SaveUpload", "POST /ScenarioTables"]
        );
        assert_eq!(
            fake.calls()[0].body,
            Some(json!({"filePath": "Scenario Files/Scenarios 2021-01.csv"}))
        );
    }

    #[tokio::test]
    async fn test_data_table_not_created_when_upload_fails() {
        let fake = FakeTransport::new();
        fake.on(Method::POST, "/Files/GetUploadUrl", Reply::NetworkError);
        fake.json(Method::POST, "/DataTables", json!({"id": 7}));
        let file = source_file(b"x");

        let params = DataTableParams {
            table_structure_id: 77,
            name: "Assumptions 2021-01".to_string(),
            file_path: "Assumptions/a.xlsx".to_string(),
            excel_sheet_name: Some("Assumptions".to_string()),
            delimiter: None,
        };
        let client = ApiClient::new(fake.clone());

        assert!(!client.create_data_table(file.path(), &params).await.is_success());
        assert!(!client.update_data_table(file.path(), &params).await.is_success());
        assert_eq!(fake.count(Method::POST, "/DataTables"), 0);
        assert_eq!(fake.count(Method::PATCH, "/DataTables"), 0);
    }

    #[tokio::test]
    async fn test_update_data_table_patches() {
        let fake = FakeTransport::new();
        upload_routes(&fake);
        fake.json(Method::PATCH, "/DataTables", json!({"id": "8"}));
        let file = source_file(b"x");

        let params = DataTableParams {
            table_structure_id: 77,
            name: "Assumptions 2021-01".to_string(),
            file_path: "Assumptions/a.csv".to_string(),
            excel_sheet_name: None,
            delimiter: Some(",".to_string()),
        };
        let client = ApiClient::new(fake);
        assert_eq!(client.update_data_table(file.path(), &params).await.value(), Some(&8));
    }

    #[tokio::test]
    async fn test_download_file_uses_signed_url() {
        let fake = FakeTransport::new();
        fake.json(Method::POST, "/Files/GetDownloadUrl", json!({"downloadUrl": "https://bucket/get?sig=2"}));
        fake.on(Method::GET, "https://bucket/get?sig=2", Reply::Bytes(200, b"a,b\n".to_vec()));

        let client = ApiClient::new(fake.clone());
        let processed = client.download_file("Inforce/Inforce.csv", Some(2)).await;

        assert_eq!(processed.value().map(Vec::as_slice), Some(&b"a,b\n"[..]));
        assert_eq!(fake.object_gets(), vec!["https://bucket/get?sig=2"]);
        assert_eq!(fake.calls()[0].body, Some(json!({"filePath": "Inforce/Inforce.csv", "version": 2})));
    }

    fn decrement_params() -> DecrementTableParams {
        DecrementTableParams {
            model_id: 9999,
            name: "VBT 2015".to_string(),
            file_path: "api/VBT 2015".to_string(),
            decrement_table_type: "Mortality".to_string(),
            delimiter: Some(",".to_string()),
            excel_sheet_name: None,
            improvement_base_year: Some(2015),
            select_period_frequency: Some("Annual".to_string()),
        }
    }

    #[tokio::test]
    async fn test_decrement_table_created_after_upload() {
        let fake = FakeTransport::new();
        upload_routes(&fake);
        fake.json(Method::POST, "/DecrementTables", json!({"id": 314}));
        let file = source_file(b"age,qx\n65,0.01\n");

        let client = ApiClient::new(fake.clone());
        let processed = client.create_decrement_table(file.path(), &decrement_params()).await;

        assert_eq!(processed.value(), Some(&314));
        assert_eq!(
            fake.call_log(),
            vec!["POST /Files/GetUploadUrl", "POST /Files/SaveUpload", "POST /DecrementTables"]
        );
        assert_eq!(fake.calls()[0].body, Some(json!({"filePath": "api/VBT 2015"})));
        assert_eq!(fake.calls()[2].body.as_ref().unwrap()["decrementTableType"], "Mortality");
    }

    #[tokio::test]
    async fn test_decrement_table_not_created_when_upload_fails() {
        let fake = FakeTransport::new();
        upload_routes(&fake);
        fake.set_put_status(500);
        fake.json(Method::POST, "/DecrementTables", json!({"id": 314}));
        let file = source_file(b"x");

        let client = ApiClient::new(fake.clone());
        let processed = client.create_decrement_table(file.path(), &decrement_params()).await;

        assert!(!processed.is_success());
        assert_eq!(fake.count(Method::POST, "/DecrementTables"), 0);
        assert_eq!(fake.count(Method::POST, "/Files/SaveUpload"), 0);
    }
}
