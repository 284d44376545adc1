use crate::configuration::Configuration;

use derive_more::{Display, Error, From};
use rand::Rng;
use rusoto_core::{credential::StaticProvider, HttpClient, Region, RusotoError};
use rusoto_s3::{PutObjectError, PutObjectRequest, S3Client, S3};

#[derive(Debug, Display, From, Error)]
pub enum Error {
    Put(RusotoError<PutObjectError>),
}

#[derive(Debug, Clone)]
pub struct StoredCover {
    pub key: String,
    pub url: String,
}

/// Cover images live in one S3-compatible bucket under randomized keys;
/// the public URL is assembled from a configured base rather than asked
/// of the storage API.
#[derive(Clone)]
pub struct CoverStore {
    s3: S3Client,
    bucket: String,
    public_base_url: String,
}

impl CoverStore {
    pub fn new(config: &Configuration) -> CoverStore {
        let s3 = S3Client::new_with(
            HttpClient::new().expect("failed to create request dispatcher"),
            StaticProvider::new_minimal(config.spaces_key.clone(), config.spaces_secret.clone()),
            Region::Custom {
                name: "SPACES".to_string(),
                endpoint: config.spaces_endpoint.clone(),
            },
        );
        CoverStore {
            s3,
            bucket: config.covers_bucket.clone(),
            public_base_url: config.spaces_public_url.clone(),
        }
    }

    #[tracing::instrument(name = "Storing a cover image.", err, level = "info", skip(self, body_bytes))]
    pub async fn store_cover(&self, body_bytes: Vec<u8>) -> Result<StoredCover, Error> {
        let file_name: String = rand::thread_rng()
            .sample_iter(rand::distributions::Alphanumeric)
            .take(30)
            .map(char::from)
            .collect();
        let key = format!("cover-{}.png", file_name);
        self.s3
            .put_object(PutObjectRequest {
                bucket: self.bucket.clone(),
                key: key.clone(),
                body: Some(body_bytes.into()),
                content_type: Some("image/png".into()),
                cache_control: Some("max-age=3600".into()),
                acl: Some("public-read".into()),
                ..Default::default()
            })
            .await?;
        let url = build_public_url(&self.public_base_url, &self.bucket, &key);
        Ok(StoredCover { key, url })
    }
}

pub fn build_public_url(base: &str, bucket: &str, key: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    // Some providers serve bucket.host, others host/bucket.
    if trimmed.contains(bucket) {
        format!("{}/{}", trimmed, key)
    } else {
        format!("{}/{}/{}", trimmed, bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_without_bucket_gains_the_bucket_segment() {
        assert_eq!(
            build_public_url("https://cdn.example.com/", "covers", "cover-abc.png"),
            "https://cdn.example.com/covers/cover-abc.png"
        );
    }

    #[test]
    fn base_already_naming_the_bucket_is_left_alone() {
        assert_eq!(
            build_public_url("https://covers.cdn.example.com", "covers", "cover-abc.png"),
            "https://covers.cdn.example.com/cover-abc.png"
        );
    }
}
