//! Request paths of the service API, relative to [`API_ROOT`](crate::transport::API_ROOT)

use crate::transport::api_path;
use popstore_common::ChecksumAlgorithm;

pub fn create_bucket(bucket: &str) -> String {
    api_path(&["buckets", "create-bucket", bucket])
}

pub fn list_buckets() -> String {
    api_path(&["buckets", "list-buckets"])
}

pub fn delete_bucket(bucket: &str) -> String {
    api_path(&["buckets", "delete-bucket", bucket])
}

pub fn create_multipart_object(bucket: &str, key: &str) -> String {
    api_path(&["objects", "create-multipart-object", bucket, key])
}

pub fn upload_object_part(upload_id: &str, part_index: u64, length: u64) -> String {
    api_path(&[
        "objects",
        "upload-object-part",
        upload_id,
        &part_index.to_string(),
        &length.to_string(),
    ])
}

pub fn list_objects(bucket: &str) -> String {
    api_path(&["objects", "list-objects", bucket])
}

pub fn object_checksum(algorithm: ChecksumAlgorithm, bucket: &str, key: &str) -> String {
    api_path(&["objects", "get-object-checksum", algorithm.as_str(), bucket, key])
}

pub fn object_data(bucket: &str, key: &str) -> String {
    api_path(&["objects", "get-object-data", bucket, key])
}

pub fn status(node_only: bool) -> String {
    format!("status?node_only={node_only}")
}
