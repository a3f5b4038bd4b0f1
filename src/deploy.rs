use aws_config::meta::region::RegionProviderChain;
use aws_sdk_ecs::types::SdkError;
use aws_sdk_ecs::Region;

use crate::config::{ServiceTarget, TaskDefinitionRequest};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Service error ocurred: {0}.")]
    ServiceError(String),

    #[error("Unknown error ocurred: {0}.")]
    UnknownError(String),

    #[error("Task definition ARN missing from the registration response")]
    MissingArn,
}

pub struct Deployer {
    client: aws_sdk_ecs::Client,
}

impl Deployer {
    pub async fn new(region: Option<String>) -> Self {
        let region = match region {
            Some(provided_region) => RegionProviderChain::first_try(Region::new(provided_region)),
            None => RegionProviderChain::default_provider(),
        }
        .or_else(Region::new("us-east-1"));

        let sdk_config = aws_config::from_env().region(region).load().await;
        let client = aws_sdk_ecs::Client::new(&sdk_config);

        return Self { client };
    }

    /// Registers a new revision of the task definition and returns its ARN.
    pub async fn register_task_definition(
        &self,
        request: &TaskDefinitionRequest,
    ) -> Result<String, Error> {
        let result = self
            .client
            .register_task_definition()
            .family(&request.family)
            .set_container_definitions(Some(request.container_definitions.clone()))
            .set_volumes(Some(request.volumes.clone()))
            .set_network_mode(request.network_mode.clone())
            .send()
            .await;

        let output = match result {
            Ok(data) => data,
            Err(SdkError::ServiceError { err, .. }) => {
                return Err(Error::ServiceError(err.to_string()));
            }
            Err(err) => return Err(Error::UnknownError(err.to_string())),
        };

        let arn = output
            .task_definition()
            .and_then(|task_definition| task_definition.task_definition_arn())
            .ok_or(Error::MissingArn)?;

        return Ok(arn.to_string());
    }

    /// Points the service at the given task-definition revision and sets its
    /// desired count.
    pub async fn update_service(
        &self,
        target: &ServiceTarget,
        task_definition_arn: &str,
    ) -> Result<(), Error> {
        let result = self
            .client
            .update_service()
            .cluster(&target.cluster)
            .service(&target.service)
            .desired_count(target.desired_count)
            .task_definition(task_definition_arn)
            .send()
            .await;

        match result {
            Ok(_) => {}
            Err(SdkError::ServiceError { err, .. }) => {
                return Err(Error::ServiceError(err.to_string()));
            }
            Err(err) => return Err(Error::UnknownError(err.to_string())),
        };

        return Ok(());
    }
}
