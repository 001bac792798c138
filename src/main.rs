use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use forcelayout::backend::{CpuBackend, ForceBackend};
use forcelayout::params::SimulationParams;
use forcelayout::session::Session;
use forcelayout::TopologyMode;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod watch;

/// Force-directed 2D graph layout.
#[derive(Parser)]
#[command(name = "forcelayout")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// Host thread pool
    Cpu,
    /// wgpu compute (requires the `gpu` feature)
    Gpu,
}

/// Options shared by every subcommand
#[derive(Args, Debug)]
struct SimulationArgs {
    /// Input graph file (.json, .yaml, .yml)
    #[arg(short, long)]
    input: PathBuf,

    /// How links contribute to adjacency
    #[arg(short, long, value_enum, default_value_t = TopologyMode::Undirected)]
    mode: TopologyMode,

    /// Where the force kernel runs
    #[arg(short, long, value_enum, default_value_t = BackendKind::Cpu)]
    backend: BackendKind,

    /// Simulation parameters file (.json, .yaml, .yml)
    #[arg(short, long)]
    params: Option<PathBuf>,

    /// Seed for the initial layout jitter
    #[arg(long)]
    seed: Option<u64>,
}

impl SimulationArgs {
    fn load_params(&self) -> anyhow::Result<SimulationParams> {
        match &self.params {
            Some(path) => SimulationParams::load(path)
                .with_context(|| format!("loading parameters from {}", path.display())),
            None => Ok(SimulationParams::default()),
        }
    }

    fn session<B: ForceBackend>(&self, backend: B) -> anyhow::Result<Session<B>> {
        let session = Session::new(backend, self.mode, self.load_params()?);
        Ok(match self.seed {
            Some(seed) => session.with_seed(seed),
            None => session,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a fixed number of steps headlessly and report the result
    Run {
        #[command(flatten)]
        sim: SimulationArgs,

        /// Maximum number of simulation steps
        #[arg(long, default_value = "500")]
        steps: usize,

        /// Seconds per step
        #[arg(long, default_value = "0.016")]
        dt: f32,

        /// Stop early once the mean node speed drops below this value
        #[arg(long)]
        settle: Option<f32>,

        /// Write the laid-out graph here (.json, .yaml, .yml)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Step continuously, reloading the graph and parameters when their files change
    Watch {
        #[command(flatten)]
        sim: SimulationArgs,

        /// Target frame rate
        #[arg(long, default_value = "60")]
        fps: f32,

        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,

        /// Frames between statistics log lines (0 disables)
        #[arg(long, default_value = "120")]
        stats_every: u64,

        /// Write the laid-out graph here on exit
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Simulate on the GPU and render the final frame to a PPM image
    #[cfg(feature = "gpu")]
    Render {
        #[command(flatten)]
        sim: SimulationArgs,

        #[arg(long, default_value = "500")]
        steps: usize,

        #[arg(long, default_value = "0.016")]
        dt: f32,

        /// Output image (.ppm)
        #[arg(short, long, default_value = "frame.ppm")]
        output: PathBuf,

        #[arg(long, default_value = "800", value_parser = clap::value_parser!(u32).range(1..))]
        width: u32,

        #[arg(long, default_value = "600", value_parser = clap::value_parser!(u32).range(1..))]
        height: u32,
    },
}

fn create_backend(kind: BackendKind) -> anyhow::Result<Box<dyn ForceBackend>> {
    match kind {
        BackendKind::Cpu => Ok(Box::new(CpuBackend::new())),
        #[cfg(feature = "gpu")]
        BackendKind::Gpu => Ok(Box::new(forcelayout::gpu::GpuSimulation::new()?)),
        #[cfg(not(feature = "gpu"))]
        BackendKind::Gpu => anyhow::bail!("this build has no GPU support; rebuild with `--features gpu`"),
    }
}

fn run(
    sim: &SimulationArgs,
    steps: usize,
    dt: f32,
    settle: Option<f32>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut session = sim.session(create_backend(sim.backend)?)?;
    session
        .load_path(&sim.input)
        .with_context(|| format!("loading graph from {}", sim.input.display()))?;

    let stepped = match settle {
        Some(threshold) => session.run_until_settled(steps, threshold, dt)?,
        None => {
            session.run(steps, dt);
            steps
        }
    };

    let stats = session.stats()?;
    info!(
        steps = stepped,
        nodes = stats.nodes,
        links = stats.links,
        mean_speed = stats.mean_speed,
        "simulation finished"
    );

    if let Some(output) = output {
        watch::write_layout(&mut session, output)?;
    }
    println!("{}", serde_json::to_string(&stats)?);
    Ok(())
}

#[cfg(feature = "gpu")]
fn render(
    sim: &SimulationArgs,
    steps: usize,
    dt: f32,
    output: &Path,
    width: u32,
    height: u32,
) -> anyhow::Result<()> {
    use forcelayout::gpu::{GpuRenderer, GpuSimulation, RenderConfig, View2D, write_ppm};

    let mut session = sim.session(GpuSimulation::new()?)?;
    session
        .load_path(&sim.input)
        .with_context(|| format!("loading graph from {}", sim.input.display()))?;
    session.run(steps, dt);

    let config = RenderConfig {
        width,
        height,
        ..RenderConfig::default()
    };
    let nodes = session.nodes()?;
    let view = View2D::new(config.aspect()).fit(&nodes);

    let renderer = GpuRenderer::new(session.backend(), config);
    renderer.render(session.backend(), &view);
    let pixels = renderer.read_pixels()?;
    write_ppm(output, width, height, &pixels)?;

    println!("Rendered {} nodes to {}", nodes.len(), output.display());
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            sim,
            steps,
            dt,
            settle,
            output,
        } => {
            run(&sim, steps, dt, settle, output.as_deref())?;
        }
        Commands::Watch {
            sim,
            fps,
            max_frames,
            stats_every,
            output,
        } => {
            let mut session = sim.session(create_backend(sim.backend)?)?;
            let options = watch::WatchOptions {
                fps,
                max_frames,
                stats_every,
                output,
            };
            watch::watch(&mut session, &sim.input, sim.params.as_deref(), options).await?;
        }
        #[cfg(feature = "gpu")]
        Commands::Render {
            sim,
            steps,
            dt,
            output,
            width,
            height,
        } => {
            render(&sim, steps, dt, &output, width, height)?;
        }
    }

    Ok(())
}
