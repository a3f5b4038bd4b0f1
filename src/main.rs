use std::collections::HashMap;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use validator::Validate;

pub mod config;
pub mod deploy;

#[derive(Parser)]
#[command(name = "ecs-task-deployer", version)]
#[command(about = "Deploy YAML-described task definitions to ECS services")]
struct Cli {
    /// Path to the deployment descriptor
    #[arg(short, long, default_value = "deploy.yaml")]
    conf: PathBuf,

    /// Override a container image tag (repeatable)
    #[arg(short, long = "tag", value_name = "CONTAINER=TAG")]
    tags: Vec<String>,

    /// AWS region, defaults to the ambient configuration
    #[arg(long)]
    region: Option<String>,

    /// Translate the descriptor and print it without calling AWS
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(error) = run(cli).await {
        eprintln!("Error: {}", error);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let tags = parse_tag_overrides(&cli.tags)?;

    let translation = config::load(&cli.conf, &tags)?;
    if let Some(decode_error) = translation.decode_error {
        return Err(decode_error.into());
    }

    if cli.dry_run {
        println!("{}", serde_json::to_string_pretty(&translation.descriptor)?);
        return Ok(());
    }

    translation
        .target
        .validate()
        .map_err(|error| config::Error::ValidationError(error.to_string()))?;
    translation
        .request
        .validate()
        .map_err(|error| config::Error::ValidationError(error.to_string()))?;

    let deployer = deploy::Deployer::new(cli.region).await;

    tracing::info!(family = %translation.request.family, "registering task definition");
    let arn = deployer
        .register_task_definition(&translation.request)
        .await?;
    tracing::info!(%arn, "registered task definition");

    tracing::info!(
        cluster = %translation.target.cluster,
        service = %translation.target.service,
        desired_count = translation.target.desired_count,
        "updating service"
    );
    deployer.update_service(&translation.target, &arn).await?;
    tracing::info!("service updated");

    return Ok(());
}

fn parse_tag_overrides(raw: &[String]) -> Result<HashMap<String, String>, config::Error> {
    let mut tags = HashMap::new();
    for entry in raw {
        match entry.split_once('=') {
            Some((name, tag)) if !name.is_empty() && !tag.is_empty() => {
                tags.insert(name.to_string(), tag.to_string());
            }
            _ => {
                return Err(config::Error::ValidationError(format!(
                    "Tag override `{}` is not of the form CONTAINER=TAG",
                    entry
                )));
            }
        }
    }
    return Ok(tags);
}
