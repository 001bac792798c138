use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use forcelayout::backend::ForceBackend;
use forcelayout::io::FormatRegistry;
use forcelayout::params::SimulationParams;
use forcelayout::session::Session;
use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Quiet period before a burst of file events is acted on
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Which watched files changed during one debounce window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Changes {
    pub graph: bool,
    pub params: bool,
}

impl Changes {
    fn any(self) -> bool {
        self.graph || self.params
    }

    fn merge(&mut self, other: Changes) {
        self.graph |= other.graph;
        self.params |= other.params;
    }
}

/// Absolute, symlink-free form of `path` for comparison.
///
/// A file that no longer exists (an editor's rename-over-save) resolves
/// through its parent directory instead.
pub fn resolve(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| {
            let name = path
                .file_name()
                .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;
            Ok::<_, io::Error>(fs::canonicalize(parent_dir(path))?.join(name))
        })
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Match event paths against the watched files.
///
/// `graph` and `params` must already be [`resolve`]d.
pub fn classify(paths: &[PathBuf], graph: &Path, params: Option<&Path>) -> Changes {
    let resolved: Vec<PathBuf> = paths.iter().map(|p| resolve(p)).collect();
    let matches = |watched: &Path| resolved.iter().any(|p| p == watched);
    Changes {
        graph: matches(graph),
        params: params.is_some_and(matches),
    }
}

pub struct WatchOptions {
    pub fps: f32,
    /// Stop after this many frames; run until Ctrl+C when `None`
    pub max_frames: Option<u64>,
    /// Frames between statistics log lines
    pub stats_every: u64,
    /// Write the laid-out graph here on exit
    pub output: Option<PathBuf>,
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Run the frame loop, reloading the graph or parameters when their files change
pub async fn watch<B: ForceBackend>(
    session: &mut Session<B>,
    graph_path: &Path,
    params_path: Option<&Path>,
    options: WatchOptions,
) -> anyhow::Result<()> {
    session.load_path(graph_path)?;

    let (event_tx, mut event_rx) = mpsc::channel::<Changes>(16);
    let (reload_tx, mut reload_rx) = mpsc::channel::<Changes>(1);

    let graph_file = resolve(graph_path);
    let params_file = params_path.map(resolve);
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
        if let Ok(event) = res {
            if event.kind.is_modify() || event.kind.is_create() {
                let changes = classify(&event.paths, &graph_file, params_file.as_deref());
                if changes.any() {
                    let _ = event_tx.blocking_send(changes);
                }
            }
        }
    })?;

    let mut watched = vec![parent_dir(graph_path)];
    if let Some(params) = params_path {
        let dir = parent_dir(params);
        if !watched.contains(&dir) {
            watched.push(dir);
        }
    }
    for dir in &watched {
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
    }

    // Debounce: wait for the burst to settle, then fold everything queued into one reload
    tokio::spawn(async move {
        while let Some(first) = event_rx.recv().await {
            tokio::time::sleep(DEBOUNCE).await;
            let mut changes = first;
            while let Ok(more) = event_rx.try_recv() {
                changes.merge(more);
            }
            if reload_tx.send(changes).await.is_err() {
                break;
            }
        }
    });

    let fps = if options.fps.is_finite() && options.fps > 0.0 {
        options.fps
    } else {
        60.0
    };
    let mut ticker = tokio::time::interval(Duration::from_secs_f32(1.0 / fps));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        graph = %graph_path.display(),
        fps,
        "watching for changes, press Ctrl+C to stop"
    );

    let mut last = Instant::now();
    let mut frames: u64 = 0;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            now = ticker.tick() => {
                let dt = now.duration_since(last).as_secs_f32();
                last = now;
                session.frame(dt);
                frames += 1;

                if options.stats_every > 0 && frames % options.stats_every == 0 {
                    let stats = session.stats()?;
                    info!(
                        frames = stats.frames,
                        nodes = stats.nodes,
                        mean_speed = stats.mean_speed,
                        max_speed = stats.max_speed,
                        "frame stats"
                    );
                }
                if options.max_frames.is_some_and(|max| frames >= max) {
                    break;
                }
            }
            Some(changes) = reload_rx.recv() => {
                if changes.params {
                    if let Some(path) = params_path {
                        match SimulationParams::load(path) {
                            Ok(params) => {
                                session.set_params(params);
                                info!(path = %path.display(), "parameters reloaded");
                            }
                            Err(e) => warn!("keeping current parameters: {e}"),
                        }
                    }
                }
                if changes.graph {
                    if let Err(e) = session.reload() {
                        warn!("keeping current graph: {e}");
                    }
                }
            }
            _ = &mut shutdown => {
                info!("interrupted");
                break;
            }
        }
    }

    // Keep the watcher alive until the loop ends
    drop(watcher);

    if let Some(output) = &options.output {
        write_layout(session, output)?;
    }
    Ok(())
}

/// Write the session's laid-out graph, choosing the format from the extension
pub fn write_layout<B: ForceBackend>(session: &mut Session<B>, output: &Path) -> anyhow::Result<()> {
    let Some(graph) = session.laid_out_graph()? else {
        anyhow::bail!("no graph loaded");
    };
    FormatRegistry::with_defaults()
        .writer_for_path(output)?
        .write(&graph, output)?;
    info!(path = %output.display(), "wrote laid-out graph");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) -> PathBuf {
        fs::create_dir_all(parent_dir(path)).unwrap();
        fs::write(path, "{}").unwrap();
        path.to_path_buf()
    }

    #[test]
    fn classify_matches_resolved_paths() {
        let dir = TempDir::new().unwrap();
        let graph = touch(&dir.path().join("data/graph.json"));
        let params = touch(&dir.path().join("params.yaml"));
        let (graph_key, params_key) = (resolve(&graph), resolve(&params));

        // Same file reached through a different spelling
        let dotted = dir.path().join("data/../data/graph.json");
        assert_eq!(
            classify(&[dotted], &graph_key, Some(&params_key)),
            Changes {
                graph: true,
                params: false
            }
        );

        assert_eq!(
            classify(&[params.clone(), graph.clone()], &graph_key, Some(&params_key)),
            Changes {
                graph: true,
                params: true
            }
        );
    }

    #[test]
    fn same_file_name_in_another_directory_is_ignored() {
        let dir = TempDir::new().unwrap();
        let watched = touch(&dir.path().join("a/graph.json"));
        let other = touch(&dir.path().join("b/graph.json"));
        let other_params = touch(&dir.path().join("b/params.yaml"));
        let params = touch(&dir.path().join("a/params.yaml"));

        let changes = classify(
            &[other, other_params],
            &resolve(&watched),
            Some(&resolve(&params)),
        );
        assert!(!changes.any());
    }

    #[test]
    fn removed_file_still_matches_through_its_directory() {
        let dir = TempDir::new().unwrap();
        let graph = touch(&dir.path().join("graph.json"));
        let key = resolve(&graph);
        fs::remove_file(&graph).unwrap();

        assert!(classify(&[graph], &key, None).graph);
    }

    #[test]
    fn classify_ignores_unrelated_files() {
        let dir = TempDir::new().unwrap();
        let graph = touch(&dir.path().join("graph.json"));
        let swap = touch(&dir.path().join("graph.json.swp"));
        let changes = classify(&[swap, PathBuf::from("/")], &resolve(&graph), None);
        assert!(!changes.any());
    }

    #[test]
    fn merge_accumulates() {
        let mut changes = Changes::default();
        changes.merge(Changes {
            graph: false,
            params: true,
        });
        changes.merge(Changes {
            graph: true,
            params: false,
        });
        assert_eq!(
            changes,
            Changes {
                graph: true,
                params: true
            }
        );
    }

    #[test]
    fn parent_dir_of_bare_file_is_cwd() {
        assert_eq!(parent_dir(Path::new("graph.json")), PathBuf::from("."));
        assert_eq!(parent_dir(Path::new("a/b.json")), PathBuf::from("a"));
    }
}
