/*!
Shared AWS SDK plumbing for the S3 and SQS adapters.
*/

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::ProvideCredentials;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_smithy_runtime_api::client::result::SdkError;
use tracing::info;

use crate::{BackupError, Result};

/// Load the AWS configuration from the standard provider chain
///
/// Credentials come from, in order: environment variables, the shared
/// credentials file, then the container or instance role.
pub async fn load_sdk_config() -> Result<SdkConfig> {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    check_credentials(&sdk_config).await?;

    let region = sdk_config
        .region()
        .map(|r| r.to_string())
        .unwrap_or_else(|| "unset".to_string());
    info!(region = %region, "Loaded AWS configuration");
    Ok(sdk_config)
}

/// Resolve credentials once, failing if the provider chain yields none
pub async fn check_credentials(sdk_config: &SdkConfig) -> Result<()> {
    let provider = sdk_config
        .credentials_provider()
        .ok_or_else(|| BackupError::config("no AWS credentials provider configured"))?;

    provider.provide_credentials().await.map_err(|e| {
        BackupError::config(format!("AWS credentials could not be resolved: {e}"))
    })?;
    Ok(())
}

/// Error code reported by the service, if the request reached it
pub(crate) fn service_error_code<E, R>(error: &SdkError<E, R>) -> Option<&str>
where
    E: ProvideErrorMetadata,
{
    match error {
        SdkError::ServiceError(service_err) => service_err.err().code(),
        _ => None,
    }
}

/// Render an SDK error as a single line naming the service and operation
pub(crate) fn describe_sdk_error<E, R>(service: &str, op: &str, error: &SdkError<E, R>) -> String
where
    E: ProvideErrorMetadata + std::error::Error,
    R: std::fmt::Debug,
{
    match error {
        SdkError::ConstructionFailure(_) => {
            format!("{service} {op} request could not be constructed: {error}")
        }
        SdkError::DispatchFailure(dispatch_err) => {
            format!("{service} {op} request failed to dispatch: {dispatch_err:?}")
        }
        SdkError::TimeoutError(_) => format!("{service} {op} request timed out"),
        SdkError::ResponseError(response_err) => {
            format!("{service} {op} response error: {response_err:?}")
        }
        SdkError::ServiceError(service_err) => {
            let err = service_err.err();
            match err.code() {
                Some(code) => format!(
                    "{service} {op} service error ({code}): {}",
                    err.message().unwrap_or("Unknown error")
                ),
                None => format!("{service} {op} service error: {err}"),
            }
        }
        _ => format!("{service} {op} error: {error}"),
    }
}
