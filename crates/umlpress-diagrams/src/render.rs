//! Render dispatching.
//!
//! The dispatcher turns extracted blocks into render jobs, skips jobs whose
//! target already exists and runs the rest on a fixed-size thread pool. It
//! returns only after every job has finished, with one outcome per block.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::block::{DiagramBlock, DiagramFormat};
use crate::cache::{DiagramKey, TargetNaming};
use crate::plantuml::{ensure_wrapped, prepare_diagram_source};
use crate::renderer::{DiagramRenderer, RenderError, RenderJob};

/// Settings for a [`RenderDispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Directory receiving `.puml` sources and images.
    pub output_dir: PathBuf,
    /// Image format.
    pub format: DiagramFormat,
    /// How target files are named.
    pub naming: TargetNaming,
    /// Number of concurrent render jobs.
    pub workers: usize,
    /// Directories searched for `!include` files, in order.
    pub include_dirs: Vec<PathBuf>,
    /// DPI injected into every diagram.
    pub dpi: Option<u32>,
}

impl DispatchSettings {
    /// Settings with defaults for everything but the output directory.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            format: DiagramFormat::default(),
            naming: TargetNaming::default(),
            workers: 1,
            include_dirs: Vec::new(),
            dpi: None,
        }
    }

    /// Normalize and preprocess a block into a job with its target path.
    ///
    /// Returns the job together with any preparation warnings.
    #[must_use]
    pub fn prepare_job(&self, block: &DiagramBlock) -> (RenderJob, Vec<String>) {
        let wrapped = ensure_wrapped(&block.source);
        let prepared = prepare_diagram_source(&wrapped, &self.include_dirs, self.dpi);

        let key = DiagramKey {
            source: &prepared.source,
            format: self.format,
            dpi: self.dpi,
        };
        let stem = self.naming.file_stem(&key, block.index);

        let job = RenderJob {
            index: block.index,
            format: self.format,
            source_path: self.output_dir.join(format!("{stem}.puml")),
            target: self
                .output_dir
                .join(format!("{stem}.{}", self.format.as_str())),
            source: prepared.source,
        };
        (job, prepared.warnings)
    }
}

/// Errors that prevent dispatching altogether.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to create diagram directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to start render workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// What happened to one block.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    /// The target already existed (or was produced by an identical block).
    Cached(PathBuf),
    /// The target was rendered during this run.
    Rendered(PathBuf),
    /// Rendering failed.
    Failed(RenderError),
}

impl RenderOutcome {
    /// Image path, unless rendering failed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Cached(path) | Self::Rendered(path) => Some(path),
            Self::Failed(_) => None,
        }
    }
}

/// Outcomes of a dispatch, keyed by block index.
#[derive(Debug, Clone, Default)]
pub struct RenderReport {
    outcomes: BTreeMap<usize, RenderOutcome>,
    /// Preparation warnings (unresolved includes and the like).
    pub warnings: Vec<String>,
}

impl RenderReport {
    /// Outcome for the block with the given index.
    #[must_use]
    pub fn outcome(&self, index: usize) -> Option<&RenderOutcome> {
        self.outcomes.get(&index)
    }

    /// All outcomes in block order.
    pub fn outcomes(&self) -> impl Iterator<Item = (usize, &RenderOutcome)> {
        self.outcomes.iter().map(|(index, outcome)| (*index, outcome))
    }

    /// Number of blocks covered by this report.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    #[must_use]
    pub fn rendered(&self) -> usize {
        self.count(|o| matches!(o, RenderOutcome::Rendered(_)))
    }

    #[must_use]
    pub fn cached(&self) -> usize {
        self.count(|o| matches!(o, RenderOutcome::Cached(_)))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RenderOutcome::Failed(_)))
    }

    /// Whether any block failed to render.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Errors of the failed blocks, in block order.
    pub fn failures(&self) -> impl Iterator<Item = &RenderError> {
        self.outcomes.values().filter_map(|o| match o {
            RenderOutcome::Failed(err) => Some(err),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&RenderOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| pred(o)).count()
    }
}

/// How a block is resolved before any rendering happens.
enum Plan {
    Cached,
    /// Rendered by the job at this position.
    Job(usize),
    /// Shares its target with the job at this position.
    SameAs(usize),
}

/// Renders diagram blocks with a bounded pool of workers.
pub struct RenderDispatcher {
    renderer: Box<dyn DiagramRenderer>,
    settings: DispatchSettings,
}

impl RenderDispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(renderer: Box<dyn DiagramRenderer>, settings: DispatchSettings) -> Self {
        Self { renderer, settings }
    }

    /// Settings this dispatcher was created with.
    #[must_use]
    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Render every block and wait for all jobs to finish.
    ///
    /// Individual failures are recorded in the report; only setup problems
    /// (output directory, thread pool) are returned as errors.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the output directory cannot be created
    /// or the worker pool cannot be started.
    pub fn dispatch(&self, blocks: &[DiagramBlock]) -> Result<RenderReport, DispatchError> {
        if blocks.is_empty() {
            return Ok(RenderReport::default());
        }

        let output_dir = &self.settings.output_dir;
        std::fs::create_dir_all(output_dir).map_err(|source| DispatchError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let mut warnings = Vec::new();
        let mut jobs: Vec<RenderJob> = Vec::new();
        let mut planned: Vec<(usize, PathBuf, Plan)> = Vec::with_capacity(blocks.len());
        let mut by_target: HashMap<PathBuf, usize> = HashMap::new();

        for block in blocks {
            let (job, job_warnings) = self.settings.prepare_job(block);
            for warning in job_warnings {
                tracing::warn!(index = block.index, warning = %warning, "Diagram preparation");
                warnings.push(format!("Diagram {}: {warning}", block.index));
            }

            if job.target.exists() {
                tracing::info!(
                    index = block.index,
                    target = %job.target.display(),
                    "Diagram already exists, skipping"
                );
                planned.push((block.index, job.target, Plan::Cached));
            } else if let Some(&position) = by_target.get(&job.target) {
                tracing::debug!(
                    index = block.index,
                    same_as = jobs[position].index,
                    "Diagram identical to an earlier block"
                );
                planned.push((block.index, job.target, Plan::SameAs(position)));
            } else {
                by_target.insert(job.target.clone(), jobs.len());
                planned.push((block.index, job.target.clone(), Plan::Job(jobs.len())));
                jobs.push(job);
            }
        }

        let results = self.run(&jobs)?;

        let outcomes = planned
            .into_iter()
            .map(|(index, target, plan)| {
                let outcome = match plan {
                    Plan::Cached => RenderOutcome::Cached(target),
                    Plan::Job(position) => match &results[position] {
                        Ok(()) => RenderOutcome::Rendered(target),
                        Err(err) => RenderOutcome::Failed(err.clone()),
                    },
                    Plan::SameAs(position) => match &results[position] {
                        Ok(()) => RenderOutcome::Cached(target),
                        Err(err) => RenderOutcome::Failed(RenderError {
                            index,
                            kind: err.kind.clone(),
                        }),
                    },
                };
                (index, outcome)
            })
            .collect();

        let report = RenderReport { outcomes, warnings };
        tracing::info!(
            total = report.len(),
            rendered = report.rendered(),
            cached = report.cached(),
            failed = report.failed(),
            "Diagram rendering finished"
        );
        Ok(report)
    }

    /// Run jobs on a dedicated pool, preserving job order in the results.
    fn run(&self, jobs: &[RenderJob]) -> Result<Vec<Result<(), RenderError>>, DispatchError> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let workers = self.settings.workers.max(1);
        tracing::info!(jobs = jobs.len(), workers, "Rendering diagrams");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("umlpress-render-{i}"))
            .build()?;

        let results = pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    let result = self.renderer.render(job);
                    if let Err(err) = &result {
                        tracing::warn!(index = job.index, error = %err.kind, "Diagram failed");
                    }
                    result
                })
                .collect()
        });
        Ok(results)
    }
}
