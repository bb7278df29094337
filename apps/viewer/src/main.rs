use std::{path::PathBuf, pin::pin};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::{load_settings_from, ClientSettings},
    countdown::RefreshCountdown,
    histogram::UsageHistogram,
    load_settings,
    submission::{InputFile, DEFAULT_BOOTSTRAP_REPLICATES},
    AnalysisPoller, BoosterApi, BoosterClient, SubmissionForm, TreeView,
};
use futures::StreamExt;
use shared::domain::{
    AnalysisId, CollapseThreshold, ImageFormat, SupportAlgorithm, TreeLayout, Workflow,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "booster", about = "Command-line client for a BOOSTER web server")]
struct Cli {
    /// Base URL of the server, overrides the settings file.
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Settings file; `booster.toml` in the working directory is used otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Service health check.
    Status,
    /// Prints one analysis snapshot.
    Analysis { id: AnalysisId },
    /// Polls an analysis until it reaches a terminal status.
    Watch {
        id: AnalysisId,
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_secs: Option<u64>,
    },
    /// Loads the collapsed tree and optionally saves the full Newick tree.
    Tree {
        id: AnalysisId,
        #[arg(long, default_value_t = i64::from(CollapseThreshold::DEFAULT))]
        collapse: i64,
        /// Directory receiving `bootstrap.nh`.
        #[arg(long)]
        download: Option<PathBuf>,
    },
    /// Downloads a rendered tree image.
    Image {
        id: AnalysisId,
        #[arg(long, default_value_t = i64::from(CollapseThreshold::DEFAULT))]
        collapse: i64,
        #[arg(long, default_value = "normal")]
        layout: TreeLayout,
        #[arg(long, default_value = "tbe")]
        algorithm: SupportAlgorithm,
        #[arg(long, default_value = "svg")]
        format: ImageFormat,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Usage histograms per day, month and year.
    Stats {
        /// Writes one SVG chart per period into this directory instead of text.
        #[arg(long)]
        svg_dir: Option<PathBuf>,
        /// Bar length of the text output, in characters.
        #[arg(long, default_value_t = 60)]
        width: usize,
        /// Chart width in pixels; raised to at least 200.
        #[arg(long, default_value_t = 600)]
        svg_width: u32,
    },
    /// Asks the server for a random run name.
    RunName,
    /// Submits a new analysis.
    Submit {
        /// Sequence alignment; the tree is inferred by the selected workflow.
        #[arg(long, conflicts_with_all = ["reftree", "boottrees"])]
        alignment: Option<PathBuf>,
        #[arg(long, requires = "boottrees")]
        reftree: Option<PathBuf>,
        #[arg(long, requires = "reftree")]
        boottrees: Option<PathBuf>,
        #[arg(long, default_value = "PhyML-SMS")]
        workflow: Workflow,
        #[arg(long, default_value_t = DEFAULT_BOOTSTRAP_REPLICATES)]
        nboot: u32,
        #[arg(long)]
        run_name: Option<String>,
        #[arg(long, default_value = "")]
        email: String,
    },
    /// Prints the iTOL upload URL of an analysis.
    Itol {
        id: AnalysisId,
        #[arg(long)]
        raw: bool,
        #[arg(long)]
        fbp: bool,
    },
    /// Follows the auto-refresh countdown of an analysis page.
    Countdown { id: AnalysisId },
}

fn settings(cli: &Cli) -> Result<ClientSettings> {
    let mut settings = match &cli.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings(),
    };
    if let Some(url) = &cli.server_url {
        settings.server_url = url.clone();
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();
    let settings = settings(&cli)?;
    let client = BoosterClient::from_settings(&settings)
        .with_context(|| format!("invalid server url '{}'", settings.server_url))?;
    info!(server = %client.base_url(), "using booster server");

    match cli.command {
        Command::Status => {
            let status = client.service_status().await?;
            println!("{}", status.status);
            if !status.is_ok() {
                bail!("server reported status {}", status.status);
            }
        }
        Command::Analysis { id } => {
            let analysis = client.analysis(&id).await?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Command::Watch { id, interval_secs } => {
            let interval = interval_secs
                .map(std::time::Duration::from_secs)
                .unwrap_or_else(|| settings.poll_interval());
            let mut updates = pin!(AnalysisPoller::new(id, interval).watch(&client));
            while let Some(analysis) = updates.next().await {
                println!(
                    "{}\t{}\t{}",
                    analysis.status(),
                    analysis.run_time(chrono::Utc::now()),
                    analysis.message
                );
            }
        }
        Command::Tree {
            id,
            collapse,
            download,
        } => {
            let mut view = TreeView::new(id);
            let status = view.set_collapse(&client, collapse).await?;
            match view.displayed_tree() {
                Some(tree) => println!("{tree}"),
                None => println!("analysis is {status}, no tree to show yet"),
            }
            if let Some(dir) = download {
                match view.download_tree(&dir).await? {
                    Some(path) => println!("saved {}", path.display()),
                    None => println!("no tree received, nothing saved"),
                }
            }
        }
        Command::Image {
            id,
            collapse,
            layout,
            algorithm,
            format,
            output,
        } => {
            let mut view = TreeView::new(id);
            view.set_collapse(&client, collapse).await?;
            view.select_layout(layout);
            view.select_algorithm(algorithm);
            let image = view.fetch_image(&client, format).await?;
            tokio::fs::write(&output, image.as_bytes())
                .await
                .with_context(|| format!("failed to write '{}'", output.display()))?;
            println!("saved {}", output.display());
        }
        Command::Stats {
            svg_dir,
            width,
            svg_width,
        } => {
            let stats = client.usage_stats().await?;
            for histogram in UsageHistogram::all(&stats) {
                match &svg_dir {
                    Some(dir) => {
                        let path = dir.join(format!("{}.svg", histogram.period.chart_id()));
                        tokio::fs::write(&path, histogram.to_svg(svg_width)?)
                            .await
                            .with_context(|| format!("failed to write '{}'", path.display()))?;
                        println!("saved {}", path.display());
                    }
                    None => println!("{}", histogram.to_text(width)),
                }
            }
        }
        Command::RunName => {
            println!("{}", client.random_run_name().await?);
        }
        Command::Submit {
            alignment,
            reftree,
            boottrees,
            workflow,
            nboot,
            run_name,
            email,
        } => {
            let mut form = SubmissionForm::new();
            if let Some(path) = alignment {
                form.select_alignment(InputFile::from_path(path));
            }
            if let Some(path) = reftree {
                form.select_reference_tree(InputFile::from_path(path));
            }
            if let Some(path) = boottrees {
                form.select_bootstrap_trees(InputFile::from_path(path));
            }
            form.workflow = workflow;
            form.email = email;
            form.set_nboot(nboot);
            match run_name {
                Some(name) => form.run_name = name,
                None => {
                    form.request_run_name(&client).await?;
                }
            }
            let id = client.submit(form).await?;
            println!("{id}");
            println!("{}", client.url(&client_core::view_path(&id))?);
        }
        Command::Itol { id, raw, fbp } => {
            println!("{}", client.itol_url(&id, raw, fbp)?);
        }
        Command::Countdown { id } => {
            let page = client.view_page(&id).await?;
            let Some(countdown) = RefreshCountdown::from_html(&page) else {
                println!("page does not refresh");
                return Ok(());
            };
            let mut ticks = pin!(countdown.into_stream());
            while let Some(remaining) = ticks.next().await {
                println!("refresh in {remaining}s");
            }
        }
    }

    Ok(())
}
