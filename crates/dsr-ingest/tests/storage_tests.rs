//! Bucket integration tests
//!
//! **Requirements**:
//! - MinIO or S3 must be running and accessible
//! - S3_ENDPOINT environment variable must be set (e.g., "http://localhost:9000")
//! - Tests will be skipped if S3_ENDPOINT is not configured
//!
//! Credentials come from AKID/KEY (or AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY)
//! and default to MinIO's stock ones. The bucket (S3_BUCKET, default
//! `dsr-test-metadata`) is created if missing; every test writes under its
//! own random prefix.
//!
//! **Running tests**:
//! ```bash
//! S3_ENDPOINT=http://localhost:9000 cargo test --test storage_tests
//! ```

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{config::Credentials, primitives::ByteStream, Client};
use dsr_ingest::{
    fetcher::DocumentFetcher, IngestError, MetadataKey, ObjectCatalog, ObjectSource, S3Catalog,
    StorageConfig,
};
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_TEST_BUCKET: &str = "dsr-test-metadata";

struct TestBucket {
    client: Client,
    config: StorageConfig,
}

impl TestBucket {
    async fn put(&self, key: &str, body: &[u8]) {
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(ByteStream::from(body.to_vec()))
            .send()
            .await
            .expect("Upload should succeed");
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.config.prefix.as_deref().unwrap_or_default(), name)
    }

    async fn catalog(&self) -> S3Catalog {
        S3Catalog::new(self.config.clone())
            .await
            .expect("Catalog should be created")
    }
}

/// Setup helper that prepares a bucket and a unique prefix if MinIO is available
async fn setup_bucket(test_name: &str) -> Option<TestBucket> {
    let endpoint = std::env::var("S3_ENDPOINT").ok()?;
    let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| DEFAULT_TEST_BUCKET.to_string());

    let mut config = StorageConfig::for_minio(endpoint, bucket);
    let env_config = StorageConfig::from_env();
    if env_config.static_credentials().is_some() {
        config.access_key = env_config.access_key;
        config.secret_key = env_config.secret_key;
    }
    config.prefix = Some(format!("test/{}/{}/", test_name, Uuid::new_v4()));

    let (access, secret) = config.static_credentials()?;
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .credentials_provider(Credentials::new(access, secret, None, None, "dsr-test"))
        .load()
        .await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .endpoint_url(config.endpoint.clone().unwrap_or_default())
        .force_path_style(true)
        .build();
    let client = Client::from_conf(s3_config);

    if client.head_bucket().bucket(&config.bucket).send().await.is_err() {
        if let Err(e) = client.create_bucket().bucket(&config.bucket).send().await {
            eprintln!("Failed to create test bucket: {}", e);
            return None;
        }
    }

    Some(TestBucket { client, config })
}

fn document(table_name: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "administrative_dependency": "Estadual",
        "exhibition_name": format!("Tabela {table_name}"),
        "last_data_collection": "2024-05-10 08:00:00",
        "last_update": "10/05/2024",
        "source": "SEADE",
        "table_name": table_name,
        "update_frequency": "Semanal"
    }))
    .expect("Document should serialize")
}

#[tokio::test]
async fn test_list_keys_under_prefix() {
    let Some(bucket) = setup_bucket("list").await else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    bucket.put(&bucket.key("a.json"), &document("a")).await;
    bucket.put(&bucket.key("b.json"), &document("b")).await;
    bucket.put(&bucket.key("nested/"), b"").await;

    let keys = bucket.catalog().await.list_keys().await.expect("Listing should succeed");

    let mut names: Vec<_> = keys.iter().map(|k| k.as_str().to_string()).collect();
    names.sort();
    assert_eq!(names, vec![bucket.key("a.json"), bucket.key("b.json")]);
}

#[tokio::test]
async fn test_list_keys_follows_continuation_tokens() {
    let Some(bucket) = setup_bucket("paginate").await else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    // One more than a single ListObjectsV2 page
    for i in 0..1_001 {
        bucket.put(&bucket.key(&format!("doc-{i:04}.json")), b"{}").await;
    }

    let keys = bucket.catalog().await.list_keys().await.expect("Listing should succeed");
    assert_eq!(keys.len(), 1_001);
}

#[tokio::test]
async fn test_fetch_and_decode_document() {
    let Some(bucket) = setup_bucket("fetch").await else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let key = bucket.key("tabela.json");
    bucket.put(&key, &document("tabela_estadual")).await;

    let catalog = Arc::new(bucket.catalog().await);
    let fetcher = DocumentFetcher::new(catalog);
    let raw = fetcher
        .fetch(&MetadataKey::from(key))
        .await
        .expect("Fetch should succeed");

    assert_eq!(raw.table_name, "tabela_estadual");
    assert_eq!(raw.last_update, "10/05/2024");
}

#[tokio::test]
async fn test_missing_object_is_fetch_error() {
    let Some(bucket) = setup_bucket("missing").await else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let key = MetadataKey::from(bucket.key("nao-existe.json"));
    let result = bucket.catalog().await.get_object(&key).await;

    assert!(matches!(result, Err(IngestError::Fetch { .. })));
}

#[tokio::test]
async fn test_unknown_bucket_is_catalog_error() {
    let Some(bucket) = setup_bucket("unknown").await else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let mut config = bucket.config.clone();
    config.bucket = format!("dsr-missing-{}", Uuid::new_v4());
    let catalog = S3Catalog::new(config).await.expect("Catalog should be created");

    let result = catalog.list_keys().await;
    assert!(matches!(result, Err(IngestError::CatalogUnavailable { .. })));
}
