//! Faceted predict and invert.
//!
//! A run has three phases:
//! 1. Plan: validate inputs, partition the image and the visibilities, and
//!    enumerate work items. Every configuration or partition error surfaces
//!    here, before any kernel is called.
//! 2. Execute: hand each work item to the kernel through the
//!    [`TransformInvoker`] under the configured [`Executor`].
//! 3. Fold: sum the collected partials in work-item order on the calling
//!    thread.

use crate::core::config::FacetConfig;
use crate::core::error::{EngineWarning, FacetResult};
use crate::core::image::Image;
use crate::core::visibility::Visibility;
use crate::execution::accumulate::{Accumulate, InvertAccumulator, PredictAccumulator};
use crate::execution::progress::{ProgressCallback, ProgressTracker, ProgressUpdate};
use crate::execution::strategy::Executor;
use crate::partition::facets::FacetGrid;
use crate::partition::slices::VisSlicer;
use crate::partition::work::{enumerate_work, WorkItem};
use crate::transform::invoker::TransformInvoker;
use crate::transform::{InvertTransform, PredictTransform};
use log::{debug, info, warn};
use ndarray::Array2;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Facets in the partition.
    pub facets: usize,
    /// Visibility slices in the partition.
    pub slices: usize,
    /// Work items enumerated.
    pub work_items: usize,
    /// Work items that ran to completion.
    pub items_executed: usize,
    /// Threads that executed items.
    pub workers: usize,
    /// Wall-clock time.
    pub total_duration: Duration,
}

/// Output of a run together with its bookkeeping.
#[derive(Debug, Clone)]
pub struct FacetRun<T> {
    /// The accumulated result.
    pub output: T,
    /// Run counters.
    pub stats: ExecutionStats,
    /// Non-fatal conditions encountered.
    pub warnings: Vec<EngineWarning>,
}

struct Plan {
    items: Vec<WorkItem>,
    stats: ExecutionStats,
    warnings: Vec<EngineWarning>,
}

/// Facet-partitioned transform engine.
#[derive(Clone)]
pub struct FacetEngine {
    config: FacetConfig,
    executor: Executor,
    progress_callback: Option<Arc<ProgressCallback>>,
}

impl std::fmt::Debug for FacetEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacetEngine")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .field("progress_callback", &self.progress_callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl FacetEngine {
    /// Validate `config` and build the executor it asks for.
    pub fn new(config: FacetConfig) -> FacetResult<Self> {
        config.validate()?;
        let executor = Executor::new(config.strategy, config.failure_policy)?;
        Ok(Self {
            config,
            executor,
            progress_callback: None,
        })
    }

    /// Set progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        let callback: ProgressCallback = Box::new(callback);
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// The engine's configuration.
    pub fn config(&self) -> &FacetConfig {
        &self.config
    }

    /// Predict `vis` from `model`, facet by facet.
    pub fn predict<P>(&self, vis: &Visibility, model: &Image, transform: &P) -> FacetResult<Visibility>
    where
        P: PredictTransform + ?Sized,
    {
        Ok(self.run_predict(vis, model, transform)?.output)
    }

    /// Invert `vis` onto `template`, facet by facet.
    pub fn invert<I>(
        &self,
        vis: &Visibility,
        template: &Image,
        transform: &I,
        make_psf: bool,
    ) -> FacetResult<(Image, Array2<f64>)>
    where
        I: InvertTransform + ?Sized,
    {
        Ok(self.run_invert(vis, template, transform, make_psf)?.output)
    }

    /// Predict and return run statistics alongside the result.
    pub fn run_predict<P>(
        &self,
        vis: &Visibility,
        model: &Image,
        transform: &P,
    ) -> FacetResult<FacetRun<Visibility>>
    where
        P: PredictTransform + ?Sized,
    {
        let start = Instant::now();
        let mut plan = self.plan(vis, model)?;

        if plan.items.is_empty() {
            plan.stats.total_duration = start.elapsed();
            return Ok(FacetRun {
                output: PredictAccumulator::passthrough(vis).finish(),
                stats: plan.stats,
                warnings: plan.warnings,
            });
        }

        let invoker = TransformInvoker::new(transform);
        let tracker = self.tracker(plan.items.len());
        let partials = self
            .executor
            .run(&plan.items, &tracker, |item| invoker.predict(item, vis, model));
        tracker.complete();
        let partials = partials?;

        let mut acc = PredictAccumulator::new(vis);
        acc.fold_all(partials.into_iter().map(|(_, partial)| partial))?;

        plan.stats.items_executed = acc.folded();
        plan.stats.total_duration = start.elapsed();
        info!(
            "predict: {} facet(s) x {} slice(s) in {:?}",
            plan.stats.facets, plan.stats.slices, plan.stats.total_duration
        );
        Ok(FacetRun {
            output: acc.finish(),
            stats: plan.stats,
            warnings: plan.warnings,
        })
    }

    /// Invert and return run statistics alongside the result.
    pub fn run_invert<I>(
        &self,
        vis: &Visibility,
        template: &Image,
        transform: &I,
        make_psf: bool,
    ) -> FacetResult<FacetRun<(Image, Array2<f64>)>>
    where
        I: InvertTransform + ?Sized,
    {
        let start = Instant::now();
        let mut plan = self.plan(vis, template)?;
        let mut acc = InvertAccumulator::new(template);

        if !plan.items.is_empty() {
            let invoker = TransformInvoker::new(transform);
            let tracker = self.tracker(plan.items.len());
            let partials = self.executor.run(&plan.items, &tracker, |item| {
                invoker.invert(item, vis, template, make_psf)
            });
            tracker.complete();
            acc.fold_all(partials?.into_iter().map(|(_, partial)| partial))?;
        }

        plan.stats.items_executed = acc.folded();
        plan.stats.total_duration = start.elapsed();
        info!(
            "invert{}: {} facet(s) x {} slice(s) in {:?}",
            if make_psf { " (psf)" } else { "" },
            plan.stats.facets,
            plan.stats.slices,
            plan.stats.total_duration
        );
        Ok(FacetRun {
            output: acc.finish(),
            stats: plan.stats,
            warnings: plan.warnings,
        })
    }

    fn plan(&self, vis: &Visibility, image: &Image) -> FacetResult<Plan> {
        vis.validate()?;
        let grid = FacetGrid::new(image.shape(), self.config.layout(), self.config.remainder)?;
        let slicer = VisSlicer::new(vis, self.config.slicing)?;
        let items = enumerate_work(&grid, &slicer);

        let mut warnings = Vec::new();
        if vis.is_empty() {
            let warning = EngineWarning::EmptyInput {
                facets: grid.facet_count(),
            };
            warn!("{}", warning);
            warnings.push(warning);
        }

        debug!(
            "planned {} work items: {} facets of {:?}, {} slices by {:?}",
            items.len(),
            grid.facet_count(),
            image.shape(),
            slicer.slice_count(),
            self.config.slicing
        );

        Ok(Plan {
            stats: ExecutionStats {
                facets: grid.facet_count(),
                slices: slicer.slice_count(),
                work_items: items.len(),
                workers: self.executor.workers(),
                ..ExecutionStats::default()
            },
            items,
            warnings,
        })
    }

    fn tracker(&self, total: usize) -> ProgressTracker {
        let mut tracker = ProgressTracker::new(total);
        if let Some(callback) = &self.progress_callback {
            let callback = callback.clone();
            tracker = tracker.with_callback(Box::new(move |update: ProgressUpdate| callback(update)));
        }
        tracker.start();
        tracker
    }
}

/// Predict `vis` from `model` by facets, calling `transform` per work item.
///
/// Returns `vis` with its `vis` column replaced by the sum of all facet
/// contributions. An empty `vis` is returned unchanged.
pub fn predict_by_facets<P>(
    vis: &Visibility,
    model: &Image,
    transform: &P,
    config: &FacetConfig,
) -> FacetResult<Visibility>
where
    P: PredictTransform + ?Sized,
{
    FacetEngine::new(config.clone())?.predict(vis, model, transform)
}

/// Invert `vis` by facets of `template`, calling `transform` per work item.
///
/// Returns the accumulated image over the full field and the summed
/// `(nchan, npol)` weights. An empty `vis` gives a zero image and zero weight.
pub fn invert_by_facets<I>(
    vis: &Visibility,
    template: &Image,
    transform: &I,
    make_psf: bool,
    config: &FacetConfig,
) -> FacetResult<(Image, Array2<f64>)>
where
    I: InvertTransform + ?Sized,
{
    FacetEngine::new(config.clone())?.invert(vis, template, transform, make_psf)
}
