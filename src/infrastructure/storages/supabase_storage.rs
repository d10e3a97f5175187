use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{
    error::{ProvideErrorMetadata, SdkError},
    operation::put_object::PutObjectError,
    primitives::ByteStream,
};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    repositories::slip_storage::SlipStorage,
    value_objects::slips::{SlipReference, SlipUpload},
};

use super::s3::{S3Config, build_s3_client};

#[derive(Debug, Clone)]
pub struct SupabaseStorageConfig {
    pub project_url: String,
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

pub struct SupabaseSlipStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base: String,
}

impl SupabaseSlipStorage {
    pub async fn new(config: SupabaseStorageConfig) -> Result<Self> {
        let client = build_s3_client(&S3Config {
            endpoint: config.endpoint,
            region: config.region,
            access_key: config.access_key,
            secret_key: config.secret_key,
            force_path_style: true,
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
        })
        .await
        .context("failed to build Supabase s3 client")?;

        let public_base = format!(
            "{}/storage/v1/object/public/{}",
            config.project_url.trim_end_matches('/'),
            config.bucket
        );

        Ok(Self {
            client,
            bucket: config.bucket,
            public_base,
        })
    }
}

#[async_trait]
impl SlipStorage for SupabaseSlipStorage {
    async fn upload_slip(&self, transaction_id: &str, slip: SlipUpload) -> Result<SlipReference> {
        let object_key = slip_object_key(transaction_id, &slip.filename, &slip.content_type);
        let size = slip.bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(slip.bytes))
            .content_type(&slip.content_type)
            .send()
            .await
            .map_err(|err| map_put_object_error(err, &self.bucket, &object_key))?;

        info!(%transaction_id, object_key = %object_key, size, "slips: uploaded");

        Ok(SlipReference {
            url: format!("{}/{}", self.public_base, object_key),
            filename: slip.filename,
        })
    }
}

/// `slips/<transaction id>/<random>.<ext>`
pub fn slip_object_key(transaction_id: &str, filename: &str, content_type: &str) -> String {
    format!(
        "slips/{}/{}.{}",
        transaction_id,
        Uuid::new_v4().simple(),
        slip_extension(filename, content_type)
    )
}

fn slip_extension(filename: &str, content_type: &str) -> String {
    let from_filename = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| {
            mime_guess::from_ext(ext)
                .first()
                .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE)
        });
    if let Some(ext) = from_filename {
        return ext;
    }

    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/png" => "png".to_string(),
        "image/jpeg" | "image/jpg" => "jpg".to_string(),
        "image/webp" => "webp".to_string(),
        "image/heic" => "heic".to_string(),
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first())
            .map(|ext| ext.to_string())
            .unwrap_or_else(|| "img".to_string()),
    }
}

fn map_put_object_error(
    err: SdkError<PutObjectError>,
    bucket: &str,
    object_key: &str,
) -> anyhow::Error {
    if let SdkError::ServiceError(service_err) = &err {
        let status = service_err.raw().status().as_u16();
        let code = service_err.err().code().unwrap_or("unknown");
        let message = service_err.err().message().unwrap_or_default();

        let mut detail = format!(
            "failed to upload slip to Supabase Storage (status {}, code {})",
            status, code
        );
        if !message.is_empty() {
            detail.push_str(&format!(": {}", message));
        }
        detail.push_str(&format!(" [bucket={}, key={}]", bucket, object_key));

        return anyhow::anyhow!(detail);
    }

    anyhow::Error::new(err).context("failed to upload slip to Supabase Storage")
}
