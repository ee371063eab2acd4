use std::io::Read;

use aws_sdk_s3::primitives::ByteStream;
use chrono::Utc;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use search_revenue_lambda::adapters::object_store::{ObjectSource, ReportStore};
use search_revenue_lambda::handlers::report::{handle_s3_event, ReportHandlerConfig};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio_util::io::SyncIoBridge;

/// Streams input objects; reads block on the captured runtime handle.
struct S3ObjectSource {
    s3_client: aws_sdk_s3::Client,
    handle: Handle,
}

impl ObjectSource for S3ObjectSource {
    fn open_object(&self, bucket: &str, key: &str) -> Result<Box<dyn Read + Send>, String> {
        let bucket = bucket.to_string();
        let object_key = key.to_string();
        let client = self.s3_client.clone();

        let output = self
            .handle
            .block_on(async move {
                client
                    .get_object()
                    .bucket(bucket)
                    .key(object_key)
                    .send()
                    .await
            })
            .map_err(|error| format!("failed to read object from s3: {error}"))?;

        Ok(Box::new(SyncIoBridge::new_with_handle(
            Box::pin(output.body.into_async_read()),
            self.handle.clone(),
        )))
    }
}

struct S3ReportStore {
    bucket: String,
    s3_client: aws_sdk_s3::Client,
    handle: Handle,
}

impl ReportStore for S3ReportStore {
    fn write_object(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), String> {
        let bucket = self.bucket.clone();
        let object_key = key.to_string();
        let body_bytes = body.to_vec();
        let content_type = content_type.to_string();
        let client = self.s3_client.clone();

        self.handle.block_on(async move {
            client
                .put_object()
                .bucket(bucket)
                .key(object_key)
                .content_type(content_type)
                .body(ByteStream::from(body_bytes))
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to write object to s3: {error}"))
        })
    }
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let config = ReportHandlerConfig::from_lookup(|name| std::env::var(name).ok(), Utc::now())
        .map_err(|error| Error::from(error.message))?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let s3_client = aws_sdk_s3::Client::new(&aws_config);
    let handle = Handle::current();

    let source = S3ObjectSource {
        s3_client: s3_client.clone(),
        handle: handle.clone(),
    };
    let store = S3ReportStore {
        bucket: config.output_bucket.clone(),
        s3_client,
        handle,
    };

    // The attribution pass reads synchronously, so the whole handler runs
    // outside the async worker.
    let response = tokio::task::block_in_place(|| {
        handle_s3_event(&event.payload, &config, &source, &store)
    })
    .map_err(|error| Error::from(error.message))?;

    serde_json::to_value(response)
        .map_err(|error| Error::from(format!("failed to serialize response: {error}")))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
