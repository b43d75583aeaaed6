use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;

use crate::config::TargetConfig;
use crate::TargetError;

/// Object key for `file_name` under `prefix`. The prefix is used verbatim, so `exports/`
/// yields `exports/<file>` while `exports-` yields `exports-<file>`.
pub fn object_key(prefix: &str, file_name: &str) -> ObjectPath {
    ObjectPath::from(format!("{prefix}{file_name}"))
}

/// Builds the S3 client for `config.s3_bucket`.
///
/// Credentials and any unset region come from the standard `AWS_*` environment variables.
pub fn s3_store(config: &TargetConfig) -> Result<Arc<dyn ObjectStore>, TargetError> {
    let mut builder = AmazonS3Builder::from_env().with_bucket_name(&config.s3_bucket);
    if let Some(region) = &config.s3_region {
        builder = builder.with_region(region);
    }
    if let Some(endpoint) = &config.s3_endpoint {
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(endpoint.starts_with("http://"));
    }

    let store = builder.build().map_err(|e| {
        TargetError::Configuration(format!(
            "failed to create S3 client for bucket `{}`: {e}",
            config.s3_bucket
        ))
    })?;
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_concatenated_verbatim() {
        assert_eq!(
            object_key("exports/", "users.json").as_ref(),
            "exports/users.json"
        );
        assert_eq!(
            object_key("daily/exports-", "users.json").as_ref(),
            "daily/exports-users.json"
        );
    }
}
