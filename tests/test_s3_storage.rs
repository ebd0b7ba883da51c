//! Integration tests for the signed S3 storage backend against a mock endpoint

use bytes::Bytes;
use s4_gateway::{
    ByteRange, Gateway, GatewayConfig, GatewayError, ReadSource, S3Storage, StorageBackend,
    StorageConfig,
};
use wiremock::matchers::{header, header_exists, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SIGNED: &str = "^AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/[0-9]{8}/us-east-1/s3/aws4_request";

fn storage_config(server: &MockServer) -> StorageConfig {
    StorageConfig {
        backend: "s3".to_string(),
        endpoint: Some(server.uri()),
        access_key_id: Some("AKIDEXAMPLE".to_string()),
        secret_access_key: Some("wJalrXUtnFEMI/K7MDENG".to_string()),
        ..StorageConfig::default()
    }
}

async fn storage(server: &MockServer) -> S3Storage {
    S3Storage::from_config(&storage_config(server)).await.unwrap()
}

fn error_xml(code: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>{}</Code><Message>mock</Message><RequestId>1</RequestId></Error>"#,
        code
    )
}

#[tokio::test]
async fn test_put_is_signed_and_path_style() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/bucket/dir/file.parquet"))
        .and(header_regex("authorization", SIGNED))
        .and(header_exists("x-amz-date"))
        .and(header_exists("x-amz-content-sha256"))
        .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"abc\""))
        .expect(1)
        .mount(&server)
        .await;

    storage(&server)
        .await
        .put("bucket", "dir/file.parquet", Bytes::from_static(b"payload"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_ranged_get_uses_content_range_total() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket/key"))
        .and(header("range", "bytes=2-5"))
        .and(header_regex("authorization", SIGNED))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 2-5/100")
                .set_body_bytes(b"2345".to_vec()),
        )
        .mount(&server)
        .await;

    let data = storage(&server)
        .await
        .get("bucket", "key", Some(ByteRange::new(2, Some(5)).unwrap()))
        .await
        .unwrap();
    assert_eq!(&data.data[..], b"2345");
    assert_eq!(data.total, 100);
}

#[tokio::test]
async fn test_ranged_get_slices_when_range_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket/key"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"0123456789".to_vec()))
        .mount(&server)
        .await;

    let data = storage(&server)
        .await
        .get("bucket", "key", Some(ByteRange::new(6, None).unwrap()))
        .await
        .unwrap();
    assert_eq!(&data.data[..], b"6789");
    assert_eq!(data.total, 10);
}

#[tokio::test]
async fn test_head_reads_length_and_etag() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/bucket/key"))
        .and(header_regex("authorization", SIGNED))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "\"65a8e27d8879283831b664bd8b7f0ad4\"")
                .insert_header("content-length", "13"),
        )
        .mount(&server)
        .await;

    let meta = storage(&server).await.head("bucket", "key").await.unwrap();
    assert_eq!(meta.etag, "65a8e27d8879283831b664bd8b7f0ad4");
    assert_eq!(meta.total, 13);
}

#[tokio::test]
async fn test_missing_objects_map_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string(error_xml("NoSuchKey")))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/bucket/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let storage = storage(&server).await;
    let err = storage.get("bucket", "missing", None).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound { .. }), "{:?}", err);
    let err = storage.head("bucket", "missing").await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_denied_and_unsatisfiable_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket/locked"))
        .respond_with(ResponseTemplate::new(403).set_body_string(error_xml("AccessDenied")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bucket/short"))
        .respond_with(ResponseTemplate::new(416).set_body_string(error_xml("InvalidRange")))
        .mount(&server)
        .await;

    let storage = storage(&server).await;
    let err = storage.get("bucket", "locked", None).await.unwrap_err();
    assert!(
        matches!(err, GatewayError::OriginClientError { status: 403, .. }),
        "{:?}",
        err
    );

    let range = ByteRange::new(50, None).unwrap();
    let err = storage.get("bucket", "short", Some(range)).await.unwrap_err();
    assert!(matches!(err, GatewayError::UnsatisfiableRange(_)), "{:?}", err);
}

#[tokio::test]
async fn test_delete_is_signed() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/bucket/key"))
        .and(header_regex("authorization", SIGNED))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    storage(&server).await.delete("bucket", "key").await.unwrap();
}

#[tokio::test]
async fn test_list_follows_continuation_tokens() {
    let server = MockServer::start().await;
    // more specific mock first, it wins when both match
    Mock::given(method("GET"))
        .and(path("/bucket"))
        .and(query_param("continuation-token", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>bucket</Name><Prefix>data/</Prefix><KeyCount>1</KeyCount><MaxKeys>1000</MaxKeys><IsTruncated>false</IsTruncated><Contents><Key>data/c.arrow</Key><Size>3</Size></Contents></ListBucketResult>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bucket"))
        .and(query_param("list-type", "2"))
        .and(query_param("prefix", "data/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>bucket</Name><Prefix>data/</Prefix><KeyCount>2</KeyCount><MaxKeys>1000</MaxKeys><IsTruncated>true</IsTruncated><NextContinuationToken>page-2</NextContinuationToken><Contents><Key>data/a.parquet</Key><Size>1</Size></Contents><Contents><Key>data/b.parquet</Key><Size>2</Size></Contents></ListBucketResult>"#,
        ))
        .mount(&server)
        .await;

    let keys = storage(&server)
        .await
        .list_objects("bucket", "data/")
        .await
        .unwrap();
    assert_eq!(keys, vec!["data/a.parquet", "data/b.parquet", "data/c.arrow"]);
}

#[tokio::test]
async fn test_gateway_from_config_uses_s3_backend() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/bucket/table.parquet"))
        .and(header_regex("authorization", SIGNED))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = GatewayConfig::default();
    config.storage = storage_config(&server);
    let gateway = Gateway::from_config(&config).await.unwrap();

    let mut body = b"PAR1".to_vec();
    body.extend_from_slice(&[7u8; 64]);
    body.extend_from_slice(b"footer-metadata");
    body.extend_from_slice(&15u32.to_le_bytes());
    body.extend_from_slice(b"PAR1");
    let total = body.len() as u64;

    gateway
        .put_object("127.0.0.1", "bucket/table.parquet", None, Bytes::from(body))
        .await
        .unwrap();

    // the footer is answered from the range cache, no GET reaches the store
    let footer_start = total - 23;
    let read = gateway
        .get_object(
            "127.0.0.1",
            "bucket/table.parquet",
            Some(&format!("bytes={}-", footer_start)),
        )
        .await
        .unwrap();
    assert_eq!(read.source, ReadSource::Cache);
    assert_eq!(read.data.total, total);
    assert_eq!(&read.data.data[15..], &[15, 0, 0, 0, b'P', b'A', b'R', b'1']);
}
