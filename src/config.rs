use aws_sdk_ecs::model;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, io, path::Path};
use validator::Validate;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("File {0} not found")]
    FileNotFound(String),

    #[error("Parsing error: {0}")]
    ParsingError(String),

    #[error("Validation errors: {0}")]
    ValidationError(String),

    #[error("Unknown error occurred: {0}")]
    Unknown(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Deployment {
    pub cluster: String,
    pub service: String,
    pub desired_count: i32,
    pub name: String,
    pub network_mode: String,
    pub task: HashMap<String, ContainerSpec>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainerSpec {
    pub cpu: i32,
    pub essential: bool,
    pub image: String,
    pub memory: i32,
    pub port_mappings: Vec<PortMappingSpec>,
    pub health_check: HealthCheckSpec,
    pub command: Vec<String>,
    #[serde(rename = "entrypoint")]
    pub entry_point: Vec<String>,
    pub environment: Vec<EnvironmentSpec>,
    pub links: Vec<String>,
    #[serde(rename = "mountPoint")]
    pub mount_points: Vec<MountPointSpec>,
    pub volumes_from: Vec<VolumeFromSpec>,
    pub volumes: Vec<VolumeSpec>,
    pub log_configuration: LogConfigurationSpec,
    pub docker_labels: HashMap<String, String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PortMappingSpec {
    pub container_port: i32,
    pub host_port: i32,
    pub protocol: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthCheckSpec {
    pub command: Vec<String>,
    pub interval: i32,
    pub retries: i32,
    pub start_period: i32,
    pub timeout: i32,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSpec {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MountPointSpec {
    pub container_path: String,
    pub read_only: bool,
    // the key is misspelled in the descriptor format; existing files depend on it
    #[serde(rename = "souceVolume")]
    pub source_volume: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VolumeFromSpec {
    pub read_only: bool,
    pub source_container: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSpec {
    pub host: VolumeHostSpec,
    pub name: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VolumeHostSpec {
    pub source_path: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfigurationSpec {
    pub log_driver: String,
    pub options: HashMap<String, String>,
}

#[derive(Debug, Default, PartialEq, Validate)]
pub struct ServiceTarget {
    #[validate(length(min = 1, message = "cluster must not be empty"))]
    pub cluster: String,

    #[validate(length(min = 1, message = "service must not be empty"))]
    pub service: String,

    pub desired_count: i32,
}

#[derive(Debug, Clone, Validate)]
pub struct TaskDefinitionRequest {
    #[validate(length(min = 1, message = "task definition family must not be empty"))]
    pub family: String,

    pub container_definitions: Vec<model::ContainerDefinition>,
    pub volumes: Vec<model::Volume>,
    pub network_mode: Option<model::NetworkMode>,
}

#[derive(Debug)]
pub struct Translation {
    pub target: ServiceTarget,
    pub request: TaskDefinitionRequest,

    /// The descriptor after tag overrides, as it was translated.
    pub descriptor: Deployment,

    /// A decode failure does not stop the translation: the outputs above are
    /// built from a zero-valued descriptor and this error is handed back with
    /// them. Check it before trusting anything else in this struct.
    pub decode_error: Option<Error>,
}

/// Reads the deployment descriptor at `path`, applies `tags` (container name
/// to replacement image tag), and translates it into the service target and
/// the task-definition registration request.
///
/// `task` is an unordered mapping, so containers are processed in an
/// unspecified order that can differ between runs.
pub fn load(path: &Path, tags: &HashMap<String, String>) -> Result<Translation, Error> {
    let contents = match fs::read_to_string(path) {
        Ok(raw_contents) => Ok(raw_contents),
        Err(error) => match error.kind() {
            io::ErrorKind::NotFound => Err(Error::FileNotFound(path.display().to_string())),
            _ => Err(Error::Unknown(error.to_string())),
        },
    }?;

    let (mut deployment, decode_error) = match serde_yaml::from_str::<Deployment>(&contents) {
        Ok(data) => (data, None),
        Err(error) => (Deployment::default(), Some(Error::ParsingError(error.to_string()))),
    };

    apply_tag_overrides(&mut deployment, tags);

    let target = ServiceTarget {
        cluster: deployment.cluster.clone(),
        service: deployment.service.clone(),
        desired_count: deployment.desired_count,
    };

    let mut definitions = Vec::new();
    let mut volumes = Vec::new();

    for (name, spec) in &deployment.task {
        definitions.push(container_definition(name, spec));

        // only the volumes of the container processed last are kept
        volumes = spec.volumes.iter().map(volume).collect();
    }

    let network_mode = if deployment.network_mode.is_empty() {
        None
    } else {
        Some(model::NetworkMode::from(deployment.network_mode.as_str()))
    };

    let request = TaskDefinitionRequest {
        family: deployment.name.clone(),
        container_definitions: definitions,
        volumes,
        network_mode,
    };

    return Ok(Translation {
        target,
        request,
        descriptor: deployment,
        decode_error,
    });
}

fn apply_tag_overrides(deployment: &mut Deployment, tags: &HashMap<String, String>) {
    for (name, spec) in deployment.task.iter_mut() {
        if let Some(tag) = tags.get(name) {
            if !tag.is_empty() {
                spec.image = override_image_tag(&spec.image, tag);
            }
        }
    }
}

// Replaces the last colon-delimited segment of the image reference. An image
// with no tag has its whole value replaced, not a tag appended.
fn override_image_tag(image: &str, tag: &str) -> String {
    let mut segments: Vec<&str> = image.split(':').collect();
    if let Some(last) = segments.last_mut() {
        *last = tag;
    }
    return segments.join(":");
}

fn container_definition(name: &str, spec: &ContainerSpec) -> model::ContainerDefinition {
    let mut builder = model::ContainerDefinition::builder()
        .name(name)
        .cpu(spec.cpu)
        .essential(spec.essential)
        .image(&spec.image)
        .memory(spec.memory)
        .set_port_mappings(Some(spec.port_mappings.iter().map(port_mapping).collect()))
        .set_command(Some(spec.command.clone()))
        .set_entry_point(Some(spec.entry_point.clone()))
        .set_environment(Some(spec.environment.iter().map(key_value_pair).collect()))
        .set_links(Some(spec.links.clone()))
        .set_mount_points(Some(spec.mount_points.iter().map(mount_point).collect()))
        .set_volumes_from(Some(spec.volumes_from.iter().map(volume_from).collect()))
        .set_docker_labels(Some(spec.docker_labels.clone()));

    if !spec.health_check.command.is_empty() {
        builder = builder.health_check(health_check(&spec.health_check));
    }

    if !spec.log_configuration.log_driver.is_empty() {
        builder = builder.log_configuration(log_configuration(&spec.log_configuration));
    }

    return builder.build();
}

fn port_mapping(spec: &PortMappingSpec) -> model::PortMapping {
    return model::PortMapping::builder()
        .container_port(spec.container_port)
        .host_port(spec.host_port)
        .protocol(model::TransportProtocol::from(spec.protocol.as_str()))
        .build();
}

fn health_check(spec: &HealthCheckSpec) -> model::HealthCheck {
    return model::HealthCheck::builder()
        .set_command(Some(spec.command.clone()))
        .interval(spec.interval)
        .retries(spec.retries)
        .start_period(spec.start_period)
        .timeout(spec.timeout)
        .build();
}

fn key_value_pair(spec: &EnvironmentSpec) -> model::KeyValuePair {
    return model::KeyValuePair::builder()
        .name(&spec.name)
        .value(&spec.value)
        .build();
}

fn mount_point(spec: &MountPointSpec) -> model::MountPoint {
    return model::MountPoint::builder()
        .container_path(&spec.container_path)
        .read_only(spec.read_only)
        .source_volume(&spec.source_volume)
        .build();
}

fn volume_from(spec: &VolumeFromSpec) -> model::VolumeFrom {
    return model::VolumeFrom::builder()
        .read_only(spec.read_only)
        .source_container(&spec.source_container)
        .build();
}

fn volume(spec: &VolumeSpec) -> model::Volume {
    return model::Volume::builder()
        .host(
            model::HostVolumeProperties::builder()
                .source_path(&spec.host.source_path)
                .build(),
        )
        .name(&spec.name)
        .build();
}

fn log_configuration(spec: &LogConfigurationSpec) -> model::LogConfiguration {
    return model::LogConfiguration::builder()
        .log_driver(model::LogDriver::from(spec.log_driver.as_str()))
        .set_options(Some(spec.options.clone()))
        .build();
}
