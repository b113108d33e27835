//! CLI command definitions and dispatch.

pub mod create;
pub mod plan;
pub mod rm;
pub mod up;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use corral_common::config::ClientConfig;
use corral_common::constants::{
    DEFAULT_API_URL, DEFAULT_MANIFEST_FILE, DEFAULT_OVERLAY_FILE, DEFAULT_TIMEOUT, ENV_ACCESS_KEY,
    ENV_SECRET_KEY, ENV_TIMEOUT_SECS, ENV_URL, STDIN_MANIFEST,
};
use corral_compose::Manifest;
use corral_engine::{Engine, HttpApi, InMemoryApi};

/// corral: compose manifests to orchestrated projects.
#[derive(Parser, Debug)]
#[command(name = "corral", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Log API calls and per-service decisions.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Manifest selection.
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// API connection settings.
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the project; fails if it already exists.
    Create(create::CreateArgs),
    /// Create the project or converge it onto the manifest.
    Up(up::UpArgs),
    /// Delete the project and everything in it.
    Rm,
    /// Print the resolved services and links without calling the API.
    Plan(plan::PlanArgs),
}

/// Where the manifest comes from and which project it describes.
#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Manifest file, or `-` for standard input.
    #[arg(short = 'f', long = "file", global = true, default_value = DEFAULT_MANIFEST_FILE)]
    pub file: String,

    /// Project name. Defaults to the manifest directory's name.
    #[arg(short = 'p', long = "project-name", global = true)]
    pub project_name: Option<String>,

    /// Overlay file. Defaults to `rancher-compose.yml` beside the manifest
    /// when present.
    #[arg(long = "rancher-file", global = true)]
    pub rancher_file: Option<PathBuf>,
}

/// Orchestration API connection settings.
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Base URL of the API.
    #[arg(long, global = true, env = ENV_URL, default_value = DEFAULT_API_URL)]
    pub url: String,

    /// API access key.
    #[arg(long, global = true, env = ENV_ACCESS_KEY)]
    pub access_key: Option<String>,

    /// API secret key.
    #[arg(long, global = true, env = ENV_SECRET_KEY, hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Per-call timeout in seconds.
    #[arg(
        long = "timeout",
        global = true,
        env = ENV_TIMEOUT_SECS,
        default_value_t = DEFAULT_TIMEOUT.as_secs()
    )]
    pub timeout_secs: u64,
}

impl ConnectionArgs {
    /// Client configuration for these settings.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&self.url)
            .with_timeout(Duration::from_secs(self.timeout_secs));
        config.access_key.clone_from(&self.access_key);
        config.secret_key.clone_from(&self.secret_key);
        config
    }
}

/// A manifest with its overlay applied, and where it was read from.
#[derive(Debug)]
pub struct LoadedManifest {
    /// Parsed manifest.
    pub manifest: Manifest,
    /// Directory relative paths resolve against.
    pub base_dir: PathBuf,
}

impl ManifestArgs {
    /// Reads the manifest and applies the overlay.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or does not parse.
    pub fn load(&self) -> anyhow::Result<LoadedManifest> {
        let (mut manifest, base_dir) = if self.file == STDIN_MANIFEST {
            let mut text = String::new();
            let _ = std::io::stdin()
                .read_to_string(&mut text)
                .context("reading manifest from standard input")?;
            let base_dir = std::env::current_dir().context("resolving working directory")?;
            let manifest = Manifest::parse(&text, &base_dir)
                .context("parsing manifest from standard input")?;
            (manifest, base_dir)
        } else {
            let path = Path::new(&self.file);
            let manifest = Manifest::from_file(path)
                .with_context(|| format!("loading manifest {}", path.display()))?;
            (manifest, manifest_dir(path)?)
        };

        if let Some(overlay) = self.overlay_path(&base_dir) {
            manifest
                .apply_overlay_file(&overlay)
                .with_context(|| format!("applying overlay {}", overlay.display()))?;
        }
        tracing::debug!(
            services = manifest.len(),
            base_dir = %base_dir.display(),
            "manifest loaded"
        );
        Ok(LoadedManifest { manifest, base_dir })
    }

    /// Explicit overlay, or the default one beside the manifest if present.
    fn overlay_path(&self, base_dir: &Path) -> Option<PathBuf> {
        if let Some(path) = &self.rancher_file {
            return Some(path.clone());
        }
        let default = base_dir.join(DEFAULT_OVERLAY_FILE);
        default.is_file().then_some(default)
    }

    /// Project name from `-p`, or derived from `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable name can be derived.
    pub fn project_name(&self, base_dir: &Path) -> anyhow::Result<String> {
        if let Some(name) = &self.project_name {
            return Ok(name.clone());
        }
        let derived = base_dir
            .file_name()
            .map(|n| normalize_project_name(&n.to_string_lossy()))
            .unwrap_or_default();
        if derived.is_empty() {
            anyhow::bail!(
                "cannot derive a project name from {}, pass -p <name>",
                base_dir.display()
            );
        }
        Ok(derived)
    }
}

/// Directory holding `path`, made absolute.
fn manifest_dir(path: &Path) -> anyhow::Result<PathBuf> {
    let absolute = std::fs::canonicalize(path)
        .with_context(|| format!("resolving {}", path.display()))?;
    Ok(absolute
        .parent()
        .map_or_else(|| absolute.clone(), Path::to_path_buf))
}

/// Lowercases `name` and keeps ASCII letters, digits and dashes.
fn normalize_project_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Engine over the HTTP API, or over an in-memory one for dry runs.
///
/// # Errors
///
/// Returns an error if the connection settings are invalid.
pub fn engine(connection: &ConnectionArgs, dry_run: bool) -> anyhow::Result<Engine> {
    if dry_run {
        tracing::info!("dry run, no request leaves this process");
        return Ok(Engine::new(Box::new(InMemoryApi::new())));
    }
    let api = HttpApi::new(connection.config()).context("configuring API client")?;
    Ok(Engine::new(Box::new(api)))
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Create(args) => create::execute(&args, &cli.manifest, &cli.connection),
        Command::Up(args) => up::execute(&args, &cli.manifest, &cli.connection),
        Command::Rm => rm::execute(&cli.manifest, &cli.connection),
        Command::Plan(args) => plan::execute(&args, &cli.manifest),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "corral",
            "up",
            "-d",
            "-f",
            "-",
            "-p",
            "demo",
            "--url",
            "http://api:8080/v1",
        ])
        .expect("parse");
        assert_eq!(cli.manifest.file, STDIN_MANIFEST);
        assert_eq!(cli.manifest.project_name.as_deref(), Some("demo"));
        assert_eq!(cli.connection.config().url, "http://api:8080/v1");
        assert!(matches!(cli.command, Command::Up(ref args) if args.detach));
    }

    #[test]
    fn project_name_is_derived_from_directory() {
        let args = ManifestArgs {
            file: DEFAULT_MANIFEST_FILE.into(),
            project_name: None,
            rancher_file: None,
        };
        let name = args
            .project_name(Path::new("/srv/My_Web.App"))
            .expect("derived");
        assert_eq!(name, "mywebapp");
        assert!(args.project_name(Path::new("/")).is_err());
    }

    #[test]
    fn default_overlay_is_picked_up_beside_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manifest = dir.path().join("docker-compose.yml");
        std::fs::write(&manifest, "web:\n  image: nginx\n").expect("write manifest");
        std::fs::write(dir.path().join(DEFAULT_OVERLAY_FILE), "web:\n  scale: 3\n")
            .expect("write overlay");

        let args = ManifestArgs {
            file: manifest.to_string_lossy().into_owned(),
            project_name: None,
            rancher_file: None,
        };
        let loaded = args.load().expect("load");
        assert_eq!(loaded.manifest.get("web").and_then(|s| s.scale), Some(3));
    }

    #[test]
    fn missing_manifest_reports_path() {
        let args = ManifestArgs {
            file: "/nonexistent/docker-compose.yml".into(),
            project_name: None,
            rancher_file: None,
        };
        let err = args.load().unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("/nonexistent/docker-compose.yml"), "got: {msg}");
    }
}
