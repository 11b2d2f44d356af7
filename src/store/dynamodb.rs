//! DynamoDB-backed KV storage backend.
//!
//! Buckets map to tables. Every table has a string hash key `k` and a binary
//! attribute `v`. The configured table is created on connect when missing
//! and is used whenever an operation passes an empty bucket.

use super::backend::KvBackend;
use crate::config::DynamoDbOptions;
use crate::error::{Error, Result};
use crate::types::ScanOutput;
use crate::validation::{check_bucket_name, check_key};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    PutRequest, ScalarAttributeType, TableStatus, WriteRequest,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const KEY_ATTR: &str = "k";
const VALUE_ATTR: &str = "v";

/// Maximum number of requests DynamoDB accepts in one `BatchWriteItem`.
const BATCH_WRITE_LIMIT: usize = 25;

const TABLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

type Item = HashMap<String, AttributeValue>;

/// DynamoDB-backed key-value storage backend.
#[derive(Clone)]
pub struct DynamoDbBackend {
    inner: Arc<Inner>,
}

struct Inner {
    client: RwLock<Option<Client>>,
    table_name: String,
}

impl DynamoDbBackend {
    /// Connects to DynamoDB and makes sure the configured table exists.
    ///
    /// Credentials and region fall back to the default AWS provider chain
    /// when not set in `options`. A missing table is created with the
    /// configured capacity and polled until it becomes active.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingTableName`] before any request if no table is
    /// configured, [`Error::TableNotReady`] if the table stays inactive past
    /// the timeout, or the service error.
    pub async fn connect(options: &DynamoDbOptions) -> Result<Self> {
        if options.table_name.is_empty() {
            return Err(Error::MissingTableName);
        }

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &options.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let (Some(id), Some(secret)) = (&options.access_key_id, &options.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                id.clone(),
                secret.clone(),
                None,
                None,
                "unikv",
            ));
        }
        if let Some(endpoint) = &options.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let sdk_config = loader.load().await;

        let backend = Self::with_client(Client::new(&sdk_config), options.table_name.clone());
        backend.ensure_table(options).await?;

        tracing::debug!(
            table = %options.table_name,
            endpoint = ?options.endpoint,
            "Connected DynamoDB KV backend"
        );
        Ok(backend)
    }

    /// Wraps an existing client without touching the service.
    pub fn with_client(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                client: RwLock::new(Some(client)),
                table_name: table_name.into(),
            }),
        }
    }

    /// The configured default table.
    pub fn table_name(&self) -> &str {
        &self.inner.table_name
    }

    fn client(&self) -> Result<Client> {
        self.inner.client.read().clone().ok_or(Error::Closed)
    }

    fn table<'a>(&'a self, bucket: &'a str) -> &'a str {
        if bucket.is_empty() {
            &self.inner.table_name
        } else {
            bucket
        }
    }

    async fn ensure_table(&self, options: &DynamoDbOptions) -> Result<()> {
        let client = self.client()?;
        let table = options.table_name.as_str();

        match client.describe_table().table_name(table).send().await {
            Ok(_) => return Ok(()),
            Err(err) => match table_error(table, err) {
                Error::BucketNotFound { .. } => {},
                other => return Err(other),
            },
        }

        tracing::info!(table, "Creating DynamoDB table");
        client
            .create_table()
            .table_name(table)
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(KEY_ATTR)
                    .attribute_type(ScalarAttributeType::S)
                    .build()?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(KEY_ATTR)
                    .key_type(KeyType::Hash)
                    .build()?,
            )
            .provisioned_throughput(
                ProvisionedThroughput::builder()
                    .read_capacity_units(options.read_capacity_units)
                    .write_capacity_units(options.write_capacity_units)
                    .build()?,
            )
            .send()
            .await?;

        let timeout = Duration::from_secs(options.table_creation_timeout_secs);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let described = client.describe_table().table_name(table).send().await?;
            let status = described.table().and_then(|t| t.table_status());
            if status == Some(&TableStatus::Active) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::TableNotReady {
                    table: table.to_string(),
                    timeout_secs: options.table_creation_timeout_secs,
                });
            }
            tokio::time::sleep(TABLE_POLL_INTERVAL).await;
        }
    }
}

/// Maps a missing-table service error onto [`Error::BucketNotFound`].
fn table_error<E>(table: &str, err: E) -> Error
where
    Error: From<E>,
{
    match Error::from(err) {
        Error::DynamoDb(e)
            if matches!(*e, aws_sdk_dynamodb::Error::ResourceNotFoundException(_)) =>
        {
            Error::bucket_not_found(table)
        },
        other => other,
    }
}

fn key_value(key: &str) -> AttributeValue {
    AttributeValue::S(key.to_string())
}

fn write_request(key: String, value: Vec<u8>) -> Result<WriteRequest> {
    let put = PutRequest::builder()
        .item(KEY_ATTR, AttributeValue::S(key))
        .item(VALUE_ATTR, AttributeValue::B(Blob::new(value)))
        .build()?;
    Ok(WriteRequest::builder().put_request(put).build())
}

fn item_key<'a>(table: &str, item: &'a Item) -> Result<&'a String> {
    match item.get(KEY_ATTR).map(AttributeValue::as_s) {
        Some(Ok(key)) => Ok(key),
        _ => Err(Error::MalformedItem {
            table: table.to_string(),
            key: format!("<no string '{KEY_ATTR}'>"),
        }),
    }
}

fn item_value(table: &str, key: &str, item: &Item) -> Result<Vec<u8>> {
    match item.get(VALUE_ATTR).map(AttributeValue::as_b) {
        Some(Ok(blob)) => Ok(blob.as_ref().to_vec()),
        _ => Err(Error::MalformedItem {
            table: table.to_string(),
            key: key.to_string(),
        }),
    }
}

#[async_trait]
impl KvBackend for DynamoDbBackend {
    fn name(&self) -> &'static str {
        "dynamodb"
    }

    async fn set(&self, bucket: &str, key: &str, value: Vec<u8>) -> Result<()> {
        check_key(key)?;
        let table = self.table(bucket);
        self.client()?
            .put_item()
            .table_name(table)
            .item(KEY_ATTR, key_value(key))
            .item(VALUE_ATTR, AttributeValue::B(Blob::new(value)))
            .send()
            .await
            .map_err(|e| table_error(table, e))?;
        Ok(())
    }

    async fn batch_set(&self, bucket: &str, items: Vec<(String, Vec<u8>)>) -> Result<()> {
        for (key, _) in &items {
            check_key(key)?;
        }
        let client = self.client()?;
        let table = self.table(bucket);

        let mut items = items.into_iter().peekable();
        while items.peek().is_some() {
            let requests = items
                .by_ref()
                .take(BATCH_WRITE_LIMIT)
                .map(|(key, value)| write_request(key, value))
                .collect::<Result<Vec<_>>>()?;

            let output = client
                .batch_write_item()
                .request_items(table, requests)
                .send()
                .await
                .map_err(|e| table_error(table, e))?;

            let count: usize = output
                .unprocessed_items()
                .map(|pending| pending.values().map(Vec::len).sum())
                .unwrap_or(0);
            if count > 0 {
                tracing::warn!(table, count, "DynamoDB left batch items unprocessed");
                return Err(Error::UnprocessedItems { count });
            }
        }
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        check_key(key)?;
        let table = self.table(bucket);
        let output = self
            .client()?
            .get_item()
            .table_name(table)
            .key(KEY_ATTR, key_value(key))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| table_error(table, e))?;

        output
            .item()
            .map(|item| item_value(table, key, item))
            .transpose()
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        check_key(key)?;
        let table = self.table(bucket);
        self.client()?
            .delete_item()
            .table_name(table)
            .key(KEY_ATTR, key_value(key))
            .send()
            .await
            .map_err(|e| table_error(table, e))?;
        Ok(())
    }

    async fn scan(&self, bucket: &str) -> Result<ScanOutput> {
        check_bucket_name(bucket)?;
        let client = self.client()?;
        let mut output = ScanOutput::default();
        let mut start_key: Option<Item> = None;

        loop {
            let page = client
                .scan()
                .table_name(bucket)
                .consistent_read(true)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| table_error(bucket, e))?;

            for item in page.items() {
                let key = item_key(bucket, item)?;
                output.push(key.clone(), item_value(bucket, key, item)?);
            }

            match page.last_evaluated_key() {
                Some(next) if !next.is_empty() => start_key = Some(next.clone()),
                _ => break,
            }
        }

        Ok(output)
    }

    async fn close(&self) -> Result<()> {
        if self.inner.client.write().take().is_some() {
            tracing::debug!(table = %self.inner.table_name, "Closed DynamoDB KV backend");
        }
        Ok(())
    }
}
