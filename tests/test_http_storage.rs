//! Integration tests for the HTTP storage backend against a mock S3 endpoint

use bytes::Bytes;
use s4_gateway::{ByteRange, GatewayError, HttpStorage, StorageBackend};
use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_put_forwards_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/bucket/dir/file.parquet"))
        .and(body_bytes(b"payload".to_vec()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let storage = HttpStorage::new(&server.uri()).unwrap();
    storage
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
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 2-5/100")
                .set_body_bytes(b"2345".to_vec()),
        )
        .mount(&server)
        .await;

    let storage = HttpStorage::new(&server.uri()).unwrap();
    let data = storage
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

    let storage = HttpStorage::new(&server.uri()).unwrap();
    let data = storage
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
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "\"65a8e27d8879283831b664bd8b7f0ad4\"")
                .insert_header("content-length", "13"),
        )
        .mount(&server)
        .await;

    let storage = HttpStorage::new(&server.uri()).unwrap();
    let metadata = storage.head("bucket", "key").await.unwrap();
    assert_eq!(metadata.etag, "65a8e27d8879283831b664bd8b7f0ad4");
    assert_eq!(metadata.total, 13);
}

#[tokio::test]
async fn test_status_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bucket/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/bucket/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let storage = HttpStorage::new(&server.uri()).unwrap();

    let err = storage.get("bucket", "missing", None).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound { .. }));

    let err = storage.get("bucket", "forbidden", None).await.unwrap_err();
    assert_eq!(err.to_http_status(), 403);

    let err = storage.delete("bucket", "broken").await.unwrap_err();
    assert!(matches!(err, GatewayError::OriginServerError { status: 503, .. }));
    assert_eq!(err.to_http_status(), 502);
}

#[tokio::test]
async fn test_list_objects_parses_listing() {
    let server = MockServer::start().await;
    let listing = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>bucket</Name>
  <Prefix>data/</Prefix>
  <KeyCount>2</KeyCount>
  <Contents><Key>data/a.parquet</Key><Size>10</Size></Contents>
  <Contents><Key>data/b.parquet</Key><Size>20</Size></Contents>
</ListBucketResult>"#;
    Mock::given(method("GET"))
        .and(path("/bucket/"))
        .and(query_param("list-type", "2"))
        .and(query_param("prefix", "data/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing))
        .mount(&server)
        .await;

    let storage = HttpStorage::new(&server.uri()).unwrap();
    let keys = storage.list_objects("bucket", "data/").await.unwrap();
    assert_eq!(keys, vec!["data/a.parquet", "data/b.parquet"]);
}

#[test]
fn test_rejects_invalid_endpoint() {
    assert!(matches!(
        HttpStorage::new("not a url"),
        Err(GatewayError::ConfigError(_))
    ));
}
