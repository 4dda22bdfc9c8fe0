//! GKE networking recipes e2e harness
//!
//! Provisions a test cluster and its cloud infrastructure, runs the recipe
//! suites against it and tears everything down again.
//!
//! ## Usage
//!
//! ```bash
//! # Run every suite in a zone, creating the cluster if needed
//! gke-recipes-e2e run --location us-west1-a --test-project-id my-project
//!
//! # In Prow, lease the project from Boskos and delete the cluster afterwards
//! gke-recipes-e2e run --location us-west1-a --run-in-prow --delete-cluster
//!
//! # Only the recipe scripts, JSON report on disk
//! gke-recipes-e2e recipes --location us-west1-a --output report.json
//!
//! # Decode a manifest the way the suites do
//! gke-recipes-e2e parse ingress/single-cluster/ingress-basic/basic-ingress.yaml
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use std::path::PathBuf;
use tracing::{error, info, warn};

mod boskos;
mod cli;
mod compute;
mod config;
mod framework;
mod gcloud;
mod k8s;
mod models;
mod output;
mod tests;
mod utils;

use boskos::ProjectHolder;
use cli::{Args, ClusterAction, ConfigAction, HarnessArgs, RunArgs};
use compute::{
    build_test_network, build_test_subnet, delete_network, delete_subnet, region_from_zone,
    ComputeClient,
};
use config::{EnvConfig, HarnessConfig};
use framework::{Framework, FrameworkOptions, TestNetwork};
use gcloud::{current_project, set_project, ClusterConfig, ClusterManager, GcloudCli};
use gcloud::{VmSshClient, VmSshConfig};
use k8s::{parse_k8s_yaml_file, replace_backend_config_namespace, replace_namespace, K8sClient};
use models::{SuiteSummary, TestResult};
use output::{write_report, OutputFormat, ResultFormatter};
use tests::{hello_world, IngressTestSuite, RecipeTestSuite, Suite};
use utils::logger::{init_logger, parse_level};

const CLUSTER_NAME_PREFIX: &str = "gke-networking-recipes-";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env_config = EnvConfig::load();

    let level = args
        .log_level
        .as_deref()
        .or(env_config.log_level.as_deref())
        .and_then(parse_level)
        .unwrap_or(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        });
    init_logger(level);

    let config_path = args.config.clone().or(env_config.config_file.clone());
    let (mut config, source) = config::load_or_default(config_path.as_deref())?;
    if let Some(source) = &source {
        info!("Loaded config from {}", source.display());
    }
    env_config.apply_to(&mut config);

    match args.command {
        cli::Command::Run(run_args) => {
            let suites = select_suites(&run_args.suites)?;
            run_suites(run_args, &suites, config).await?;
        }
        cli::Command::Ingress(run_args) => {
            run_suites(run_args, &[Suite::Ingress], config).await?;
        }
        cli::Command::Recipes(run_args) => {
            run_suites(run_args, &[Suite::Recipes], config).await?;
        }
        cli::Command::Parse(parse_args) => {
            parse_manifest(parse_args)?;
        }
        cli::Command::Cluster(cluster_args) => {
            manage_cluster(cluster_args, config).await?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &config, &env_config)?;
        }
    }

    Ok(())
}

/// Settings every suite command needs, with defaults filled in
#[derive(Clone, Debug)]
struct RunSettings {
    kubeconfig: PathBuf,
    cluster: ClusterConfig,
}

impl RunSettings {
    fn resolve(config: &HarnessConfig) -> Result<Self> {
        let kubeconfig = match &config.cluster.kubeconfig {
            Some(path) => path.clone(),
            None => dirs::home_dir()
                .map(|home| home.join(".kube").join("config"))
                .context("kubeconfig path required but not provided")?,
        };

        let location = config
            .cluster
            .location
            .clone()
            .context("--location must be set to run the test")?;

        let name = config
            .cluster
            .name
            .clone()
            .unwrap_or_else(generate_cluster_name);

        Ok(Self {
            kubeconfig,
            cluster: ClusterConfig {
                name,
                zone: location,
                num_nodes: config.cluster.num_nodes,
                network_name: config.cluster.network_name.clone(),
                subnet_name: config.cluster.subnet_name.clone(),
            },
        })
    }
}

/// Every suite when `names` is empty
fn select_suites(names: &[String]) -> Result<Vec<Suite>> {
    if names.is_empty() {
        return Ok(Suite::all());
    }
    names
        .iter()
        .map(|name| {
            Suite::from_str(name).ok_or_else(|| {
                anyhow::anyhow!("Unknown suite: {name}. Valid: hello-world, ingress, recipes")
            })
        })
        .collect()
}

fn generate_cluster_name() -> String {
    let suffix: u32 = rand::rng().random_range(0..0x100_0000);
    format!("{CLUSTER_NAME_PREFIX}{suffix:06x}")
}

async fn run_suites(args: RunArgs, suites: &[Suite], mut config: HarnessConfig) -> Result<()> {
    args.harness.apply_to(&mut config);
    config.validate()?;

    let format = OutputFormat::from_str(&args.format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", args.format))?;
    let settings = RunSettings::resolve(&config)?;
    info!(
        "Running {:?} on cluster {} in {}",
        suites.iter().map(Suite::name).collect::<Vec<_>>(),
        settings.cluster.name,
        settings.cluster.zone
    );

    let gcloud = GcloudCli::new(config.tools.gcloud.as_str());

    let mut holder = None;
    let project = if config.boskos.enabled {
        let mut ph = ProjectHolder::new(&config.boskos.url)?;
        let project = ph.acquire(&config.boskos.resource_type).await?;
        holder = Some(ph);

        if std::env::var_os("USER").is_none() {
            std::env::set_var("USER", "prow");
        }
        project
    } else {
        config
            .cluster
            .project_id
            .clone()
            .context("--test-project-id must be set unless running in Prow")?
    };

    let old_project = match current_project(&gcloud).await {
        Ok(project) => project,
        Err(e) => {
            warn!("Failed to read the current gcloud project: {:#}", e);
            String::new()
        }
    };
    info!(
        "Using project {} for testing. Restore to existing project {:?} after testing.",
        project, old_project
    );

    let outcome = match set_project(&gcloud, &project).await {
        Ok(()) => run_in_project(&config, &settings, &gcloud, &project, suites).await,
        Err(e) => Err(e.context(format!("failed to set project environment to {project:?}"))),
    };

    if old_project.is_empty() {
        info!("No previous gcloud project to restore");
    } else if let Err(e) = set_project(&gcloud, &old_project).await {
        error!("failed to set project environment to {}: {:#}", old_project, e);
    }

    if let Some(mut ph) = holder {
        if let Err(e) = ph.release().await {
            error!("Failed to release boskos project {}: {:#}", project, e);
        }
    }

    let summary = outcome?;
    let mut formatter = ResultFormatter::new(format);
    if args.no_color {
        formatter = formatter.no_color();
    }
    println!("{}", formatter.format_summary(&summary)?);

    if let Some(path) = &args.output {
        write_report(path, &summary)?;
        info!("Report written to {}", path.display());
    }

    if summary.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_in_project(
    config: &HarnessConfig,
    settings: &RunSettings,
    gcloud: &GcloudCli,
    project: &str,
    suites: &[Suite],
) -> Result<SuiteSummary> {
    let cluster = &settings.cluster;
    let cloud = ComputeClient::new(project, gcloud.clone())
        .with_context(|| format!("Error creating compute client for project {project:?}"))?
        .operation_poll(config.polling.operation.to_poll_config());

    let test_network = TestNetwork::ensure(
        &cloud,
        &cluster.zone,
        &cluster.network_name,
        &cluster.subnet_name,
    )
    .await?;

    let manager = ClusterManager::new(gcloud.clone()).with_policy(config.reconcile_policy());
    info!(
        "setupCluster({:?}, {:?}, {})",
        cluster.zone, cluster.name, cluster.num_nodes
    );
    manager.ensure(cluster).await?;
    info!("getCredential({:?}, {:?})", cluster.zone, cluster.name);
    manager.get_credentials(cluster).await?;

    let results = run_with_cluster(config, settings, gcloud, cloud, test_network, suites).await;

    if config.cluster.delete_after {
        info!("deleteCluster({:?}, {:?})", cluster.zone, cluster.name);
        if let Err(e) = manager.delete(cluster).await {
            error!("deleteCluster({:?}, {:?}) = {:#}", cluster.zone, cluster.name, e);
        }
    }

    Ok(SuiteSummary::new(project, cluster.name.as_str(), results?))
}

async fn run_with_cluster(
    config: &HarnessConfig,
    settings: &RunSettings,
    gcloud: &GcloudCli,
    cloud: ComputeClient,
    test_network: TestNetwork,
    suites: &[Suite],
) -> Result<Vec<TestResult>> {
    info!("Using kubeconfig {:?}", settings.kubeconfig);
    let k8s = K8sClient::from_kubeconfig(&settings.kubeconfig)
        .await
        .with_context(|| {
            format!(
                "Error creating kubernetes clients from {:?}",
                settings.kubeconfig
            )
        })?;

    let ssh = VmSshClient::new(
        gcloud.clone(),
        VmSshConfig::default()
            .tunnel_through_iap(config.tools.tunnel_through_iap)
            .poll(config.polling.http_via_vm.to_poll_config()),
    );

    let framework = Framework::new(
        k8s,
        cloud,
        ssh,
        test_network,
        FrameworkOptions {
            zone: settings.cluster.zone.clone(),
            destroy_sandboxes: config.destroy_sandboxes,
            kubectl: config.tools.kubectl.clone(),
            ingress_poll: config.polling.ingress.to_poll_config(),
        },
    );

    let mut results = Vec::new();
    for suite in suites {
        match suite {
            Suite::HelloWorld => results.push(hello_world()),
            Suite::Ingress => {
                let suite = IngressTestSuite::new(&framework, &config.recipes.dir);
                results.extend(suite.run_all().await);
            }
            Suite::Recipes => {
                let suite = RecipeTestSuite::new(&config.recipes.dir)
                    .roots(config.recipes.roots.clone())
                    .stagger(config.recipes.stagger())
                    .shell(config.recipes.shell.as_str());
                results.extend(suite.run_all().await);
            }
        }
    }

    let namespaces = framework.sandbox_namespaces().await;
    if !namespaces.is_empty() {
        info!("Sandboxes used: {}", namespaces.join(", "));
    }

    Ok(results)
}

fn parse_manifest(args: cli::ParseArgs) -> Result<()> {
    let parsed = parse_k8s_yaml_file(&args.file)
        .with_context(|| format!("Failed to parse {}", args.file.display()))?;

    let (objects, backend_configs) = match &args.namespace {
        Some(ns) => (
            replace_namespace(ns, &parsed.k8s_objects),
            replace_backend_config_namespace(ns, &parsed.backend_configs),
        ),
        None => (parsed.k8s_objects, parsed.backend_configs),
    };

    match args.format.to_lowercase().as_str() {
        "json" => {
            let doc = serde_json::json!({
                "objects": objects,
                "backend_configs": backend_configs,
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        "yaml" => {
            let mut docs = Vec::new();
            for object in &objects {
                docs.push(format!("# {object}\n{}", serde_yaml::to_string(object)?));
            }
            for backend_config in &backend_configs {
                docs.push(serde_yaml::to_string(backend_config)?);
            }
            println!("{}", docs.join("---\n"));
        }
        other => anyhow::bail!("Unknown format: {other}. Valid: yaml, json"),
    }

    info!(
        "{}: {} object(s), {} BackendConfig(s)",
        args.file.display(),
        objects.len(),
        backend_configs.len()
    );
    Ok(())
}

/// Cluster commands act on the project given with --test-project-id, or
/// the active gcloud project
async fn manage_cluster(args: cli::ClusterArgs, mut config: HarnessConfig) -> Result<()> {
    let harness: &HarnessArgs = match &args.action {
        ClusterAction::Ensure(h) | ClusterAction::Credentials(h) | ClusterAction::List(h) => h,
        ClusterAction::Delete { harness, .. } => harness,
    };
    harness.apply_to(&mut config);
    config.validate()?;

    let gcloud = GcloudCli::new(config.tools.gcloud.as_str());
    let manager = ClusterManager::new(gcloud.clone()).with_policy(config.reconcile_policy());

    let zone = config
        .cluster
        .location
        .clone()
        .context("--location must be set")?;

    if let ClusterAction::List(_) = args.action {
        for name in manager.list(&zone).await? {
            println!("{name}");
        }
        return Ok(());
    }

    let name = match (&args.action, &config.cluster.name) {
        (_, Some(name)) => name.clone(),
        (ClusterAction::Ensure(_), None) => generate_cluster_name(),
        _ => anyhow::bail!("--cluster-name must be set"),
    };
    let cluster = ClusterConfig {
        name,
        zone,
        num_nodes: config.cluster.num_nodes,
        network_name: config.cluster.network_name.clone(),
        subnet_name: config.cluster.subnet_name.clone(),
    };

    let project = match &config.cluster.project_id {
        Some(project) => project.clone(),
        None => current_project(&gcloud).await?,
    };
    let cloud = ComputeClient::new(project.as_str(), gcloud.clone())?
        .operation_poll(config.polling.operation.to_poll_config());

    match args.action {
        ClusterAction::Ensure(_) => {
            TestNetwork::ensure(
                &cloud,
                &cluster.zone,
                &cluster.network_name,
                &cluster.subnet_name,
            )
            .await?;
            manager.ensure(&cluster).await?;
            println!("✅ Cluster {} ready in {}", cluster.name, cluster.zone);
        }
        ClusterAction::Credentials(_) => {
            manager.get_credentials(&cluster).await?;
            println!("✅ Credentials for {} written to kubeconfig", cluster.name);
        }
        ClusterAction::Delete { with_network, .. } => {
            manager.delete(&cluster).await?;
            println!("✅ Cluster {} deleted", cluster.name);

            if with_network {
                let region = region_from_zone(&cluster.zone);
                let subnet = build_test_subnet(&cluster.subnet_name, "");
                delete_subnet(&cloud, &region, &subnet).await?;
                let network = build_test_network(&cluster.network_name);
                delete_network(&cloud, &network).await?;
                println!(
                    "✅ Subnet {} and network {} deleted",
                    cluster.subnet_name, cluster.network_name
                );
            }
        }
        ClusterAction::List(_) => {}
    }

    Ok(())
}

fn manage_config(
    args: cli::ConfigArgs,
    config: &HarnessConfig,
    env_config: &EnvConfig,
) -> Result<()> {
    match args.action {
        ConfigAction::Init { path, force } => {
            let path = path.unwrap_or_else(config::default_config_path);
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists. Use --force to overwrite.",
                    path.display()
                );
            }
            HarnessConfig::example().save(&path)?;
            println!("✅ Configuration written to {}", path.display());
        }
        ConfigAction::Show => {
            print!("{}", serde_yaml::to_string(config)?);
        }
        ConfigAction::Env => {
            config::env::print_env_help();
            println!();
            env_config.print_summary();
        }
    }
    Ok(())
}
