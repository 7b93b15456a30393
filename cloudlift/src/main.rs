use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use cloudlift::config::UploadConfig;
use cloudlift::remote::disk::DiskRemote;
use cloudlift::remote::{Reauthenticator, RemoteStorage};
use cloudlift::session::{SessionConfig, TokenReauthenticator};
use cloudlift::upload::{
    ConflictMode, ConflictPolicy, FileUploader, FolderResolver, LinePrompt, StickyPrompt,
    TreeUploader, preview,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run,
    Preview,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CliOptions {
    mode: CliMode,
    verbose: bool,
}

fn parse_cli_options<I>(args: I) -> anyhow::Result<CliOptions>
where
    I: IntoIterator<Item = String>,
{
    let mut options = CliOptions {
        mode: CliMode::Run,
        verbose: false,
    };
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--preview" => options.mode = CliMode::Preview,
            "--verbose" | "-v" => options.verbose = true,
            "--help" | "-h" => options.mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(options)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn conflict_policy(mode: ConflictMode) -> ConflictPolicy {
    match mode {
        ConflictMode::Ask => {
            ConflictPolicy::new(mode, Box::new(StickyPrompt::new(LinePrompt::stdin())))
        }
        ConflictMode::Skip | ConflictMode::Overwrite => ConflictPolicy::unattended(mode),
    }
}

async fn show_preview(local_root: &Path, to_stdout: bool) -> anyhow::Result<()> {
    let lines = preview(local_root)
        .await
        .with_context(|| format!("cannot read local folder {}", local_root.display()))?;
    info!(path = %local_root.display(), items = lines.len(), "local folder");
    for line in lines {
        if to_stdout {
            println!("{}", line.render());
        } else {
            info!("  {}", line.render());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let options = parse_cli_options(std::env::args())?;
    if options.mode == CliMode::Help {
        println!("Usage: cloudlift [--preview] [--verbose]");
        println!("  --preview      List the local folder and exit");
        println!("  -v, --verbose  Log every remote call");
        println!("Settings are read from CLOUDLIFT_* environment variables or .env");
        return Ok(());
    }
    init_tracing(options.verbose);

    let config = UploadConfig::from_env().context("invalid upload settings")?;
    show_preview(&config.local_root, options.mode == CliMode::Preview).await?;
    if options.mode == CliMode::Preview {
        return Ok(());
    }

    let session = SessionConfig::from_env(&config.remote_root).context("invalid session settings")?;
    let reauth = Arc::new(TokenReauthenticator::new(&session)?);
    let client = reauth
        .connect()
        .await
        .context("failed to open remote session")?;
    let resolver = FolderResolver::new(config.settle)
        .with_reauthenticator(reauth as Arc<dyn Reauthenticator<DiskRemote>>);
    let mut uploader = TreeUploader::new(
        resolver,
        FileUploader::new(conflict_policy(config.conflict_mode)),
        config.success_policy,
    );
    info!(
        local = %config.local_root.display(),
        remote_root = %config.remote_root,
        mode = %config.conflict_mode,
        "starting upload"
    );

    let remote_root = client.root();
    let report = uploader
        .upload_tree(
            client,
            &remote_root,
            &config.local_root,
            config.remote_name.as_deref(),
        )
        .await?;
    println!("{report}");
    if !report.success {
        anyhow::bail!("upload into {} failed", report.remote_folder);
    }
    Ok(())
}
