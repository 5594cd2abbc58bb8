use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    AWS,
    GCS,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    #[error("failed to parse provider of: {0}")]
    UnknownProvider(String),

    #[error("no bucket in: {0}")]
    MissingBucket(String),
}

/// Bucket and key prefix a repository URL points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryLocation {
    pub provider: Provider,
    pub bucket: String,
    pub base_directory: String,
}

pub fn parse_provider_from_uri(bucket_uri: &str) -> Result<Provider, LocatorError> {
    if bucket_uri.starts_with("s3://") {
        Ok(Provider::AWS)
    } else if bucket_uri.starts_with("gs://") || bucket_uri.starts_with("gcloud://") {
        Ok(Provider::GCS)
    } else {
        Err(LocatorError::UnknownProvider(bucket_uri.to_string()))
    }
}

pub fn parse_bucket_from_uri(bucket_uri: &str) -> &str {
    let rest = bucket_uri.split_once("://").map(|(_, rest)| rest).unwrap_or("");
    rest.split_once('/').map(|(bucket, _)| bucket).unwrap_or(rest)
}

/// The base directory always ends with `/` unless it is empty, so that
/// `base_directory + resource` addresses a key inside it.
pub fn parse_base_directory_from_uri(bucket_uri: &str) -> String {
    let rest = bucket_uri.split_once("://").map(|(_, rest)| rest).unwrap_or("");
    let dir = match rest.split_once('/') {
        Some((_, dir)) => dir.trim_start_matches('/'),
        None => "",
    };

    if dir.is_empty() || dir.ends_with('/') {
        dir.to_string()
    } else {
        format!("{}/", dir)
    }
}

pub fn parse_location(bucket_uri: &str) -> Result<RepositoryLocation, LocatorError> {
    let provider = parse_provider_from_uri(bucket_uri)?;

    let bucket = parse_bucket_from_uri(bucket_uri);
    if bucket.is_empty() {
        return Err(LocatorError::MissingBucket(bucket_uri.to_string()));
    }

    Ok(RepositoryLocation {
        provider,
        bucket: bucket.to_string(),
        base_directory: parse_base_directory_from_uri(bucket_uri),
    })
}
