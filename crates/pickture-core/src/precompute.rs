//! Background precompute of the likely-next variants of the selected image.
//!
//! Selecting an image cancels whatever job is in flight and starts a new
//! one that computes the RGB and value white balance variants in parallel
//! on a dedicated worker pool. Each variant is published to the cache as
//! soon as it is ready.
//!
//! # Job register
//!
//! A single slot holds the active job: its generation number, cancellation
//! token and one completion signal per in-flight variant. Selecting a new
//! image bumps the generation and cancels the old token under the register
//! lock, and workers publish under the same lock only while their
//! generation is still current. A superseded job can therefore never write
//! to the cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use rayon::prelude::*;
use thiserror::Error;

use crate::cache::{cache_key, ProcessedImageCache};
use crate::cancel::CancellationToken;
use crate::config::EngineConfig;
use crate::decode::read_source;
use crate::params::EnhanceSettings;
use crate::pipeline::{process_bytes, ProcessError, TransformKind};

/// Supplies the raw bytes of a source image.
pub trait ImageSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<Vec<u8>, ProcessError>;
}

/// Reads source images from the file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsImageSource;

impl ImageSource for FsImageSource {
    fn load(&self, path: &Path) -> Result<Vec<u8>, ProcessError> {
        Ok(read_source(path)?)
    }
}

/// Errors starting the coordinator.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Failed to start precompute workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// One-shot value: set once, awaited by any number of threads.
struct OnceSignal<T> {
    value: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T: Clone> OnceSignal<T> {
    fn new() -> Self {
        Self {
            value: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Store the value unless one is already set. Returns whether it won.
    fn set(&self, value: T) -> bool {
        let mut slot = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        self.ready.notify_all();
        true
    }

    fn get(&self) -> Option<T> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn wait(&self) -> T {
        let mut slot = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// How one precomputed variant ended.
#[derive(Clone)]
enum VariantOutcome {
    Ready(Arc<[u8]>),
    Cancelled,
    Failed,
}

/// Final report of a precompute job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSummary {
    pub generation: u64,
    /// Variants written to the cache.
    pub stored: usize,
    /// Variants already cached when the job started.
    pub skipped: usize,
    /// Variants whose computation failed.
    pub failed: usize,
    /// The job was superseded or cancelled before it finished.
    pub cancelled: bool,
}

/// Handle to a started precompute job.
#[derive(Clone)]
pub struct PrecomputeJob {
    generation: u64,
    done: Arc<OnceSignal<JobSummary>>,
}

impl PrecomputeJob {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Block until the job's worker has exited.
    pub fn wait(&self) -> JobSummary {
        self.done.wait()
    }

    pub fn is_finished(&self) -> bool {
        self.done.get().is_some()
    }
}

struct Variant {
    kind: TransformKind,
    key: String,
    signal: Arc<OnceSignal<VariantOutcome>>,
}

struct ActiveJob {
    generation: u64,
    path: PathBuf,
    token: CancellationToken,
    pending: HashMap<String, Arc<OnceSignal<VariantOutcome>>>,
    stored: usize,
    done: Arc<OnceSignal<JobSummary>>,
}

impl ActiveJob {
    /// Cancel the job and release everyone waiting on its variants.
    fn cancel(&mut self) {
        self.token.cancel();
        for signal in self.pending.values() {
            signal.set(VariantOutcome::Cancelled);
        }
        self.pending.clear();
        tracing::debug!(
            generation = self.generation,
            path = %self.path.display(),
            "Precompute job cancelled"
        );
    }
}

#[derive(Default)]
struct JobRegister {
    generation: u64,
    active: Option<ActiveJob>,
}

struct Shared {
    cache: Arc<ProcessedImageCache>,
    source: Arc<dyn ImageSource>,
    settings: EnhanceSettings,
    register: Mutex<JobRegister>,
}

impl Shared {
    // Lock order: register, then cache.
    fn lock_register(&self) -> MutexGuard<'_, JobRegister> {
        self.register.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_job(
        &self,
        generation: u64,
        path: &Path,
        token: &CancellationToken,
        variants: Vec<Variant>,
        skipped: usize,
        done: &OnceSignal<JobSummary>,
    ) {
        let outcomes: Vec<VariantOutcome> = if variants.is_empty() {
            Vec::new()
        } else {
            match token.check().and_then(|()| self.source.load(path)) {
                Ok(raw) => variants
                    .par_iter()
                    .map(|variant| {
                        let result = process_bytes(&raw, &variant.kind, &self.settings, token);
                        self.publish(generation, token, variant, result)
                    })
                    .collect(),
                Err(err) => variants
                    .iter()
                    .map(|variant| {
                        self.publish(generation, token, variant, Err(clone_error(&err)))
                    })
                    .collect(),
            }
        };

        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, VariantOutcome::Failed))
            .count();

        // A job still in the register retires itself; a superseded one is
        // already gone.
        let mut register = self.lock_register();
        let stored = match register.active.as_ref() {
            Some(job) if job.generation == generation => Some(job.stored),
            _ => None,
        };
        if stored.is_some() {
            register.active = None;
        }
        drop(register);

        let summary = JobSummary {
            generation,
            stored: stored.unwrap_or(0),
            skipped,
            failed,
            cancelled: stored.is_none() || token.is_cancelled(),
        };

        tracing::info!(
            generation,
            path = %path.display(),
            stored = summary.stored,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Precompute job finished"
        );
        done.set(summary);
    }

    /// Write a finished variant to the cache if its job is still current.
    fn publish(
        &self,
        generation: u64,
        token: &CancellationToken,
        variant: &Variant,
        result: Result<Vec<u8>, ProcessError>,
    ) -> VariantOutcome {
        let mut register = self.lock_register();
        let job = register
            .active
            .as_mut()
            .filter(|job| job.generation == generation && !token.is_cancelled());

        let outcome = match (job, result) {
            (Some(job), Ok(bytes)) => {
                let data: Arc<[u8]> = bytes.into();
                self.cache.set(variant.key.clone(), Arc::clone(&data));
                job.stored += 1;
                job.pending.remove(&variant.key);
                tracing::debug!(key = %variant.key, "Precomputed variant stored");
                VariantOutcome::Ready(data)
            }
            (Some(job), Err(ProcessError::Cancelled)) => {
                job.pending.remove(&variant.key);
                VariantOutcome::Cancelled
            }
            (Some(job), Err(err)) => {
                job.pending.remove(&variant.key);
                tracing::warn!(kind = %variant.kind, error = %err, "Precompute variant failed");
                VariantOutcome::Failed
            }
            (None, _) => {
                tracing::debug!(key = %variant.key, "Discarding result of superseded job");
                VariantOutcome::Cancelled
            }
        };
        drop(register);

        variant.signal.set(outcome.clone());
        outcome
    }
}

/// Shares a load failure across every variant of a job.
fn clone_error(err: &ProcessError) -> ProcessError {
    match err {
        ProcessError::Cancelled => ProcessError::Cancelled,
        other => ProcessError::Source(other.to_string()),
    }
}

/// Drives background precompute for the interactive selection.
///
/// The coordinator is used from one consumer thread; its workers run on a
/// private rayon pool.
pub struct PrecomputeCoordinator {
    pool: rayon::ThreadPool,
    shared: Arc<Shared>,
}

impl PrecomputeCoordinator {
    /// Create a coordinator with its own worker pool.
    ///
    /// `workers` of `None` uses rayon's default thread count.
    pub fn new(
        cache: Arc<ProcessedImageCache>,
        source: Arc<dyn ImageSource>,
        settings: EnhanceSettings,
        workers: Option<usize>,
    ) -> Result<Self, CoordinatorError> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|index| format!("pickture-precompute-{}", index));
        if let Some(workers) = workers {
            builder = builder.num_threads(workers);
        }
        let pool = builder.build()?;

        Ok(Self {
            pool,
            shared: Arc::new(Shared {
                cache,
                source,
                settings,
                register: Mutex::new(JobRegister::default()),
            }),
        })
    }

    /// Build the cache and coordinator described by an engine config.
    pub fn from_config(
        config: &EngineConfig,
        source: Arc<dyn ImageSource>,
    ) -> Result<Self, CoordinatorError> {
        let cache = Arc::new(ProcessedImageCache::new(config.cache));
        Self::new(cache, source, config.enhance, config.workers)
    }

    pub fn cache(&self) -> &Arc<ProcessedImageCache> {
        &self.shared.cache
    }

    pub fn settings(&self) -> &EnhanceSettings {
        &self.shared.settings
    }

    /// Make `path` the selected image.
    ///
    /// Cancels the previous job and starts computing the precomputed
    /// variants that aren't cached yet. Re-selecting the image of the
    /// active job returns that job.
    pub fn select(&self, path: &Path) -> PrecomputeJob {
        let mut register = self.shared.lock_register();

        if let Some(job) = register
            .active
            .as_ref()
            .filter(|job| job.path == path && !job.token.is_cancelled())
        {
            return PrecomputeJob {
                generation: job.generation,
                done: Arc::clone(&job.done),
            };
        }

        if let Some(mut previous) = register.active.take() {
            previous.cancel();
        }

        register.generation += 1;
        let generation = register.generation;
        let token = CancellationToken::new();
        let done = Arc::new(OnceSignal::new());

        let mut variants = Vec::new();
        let mut pending = HashMap::new();
        let mut skipped = 0;
        for kind in TransformKind::PRECOMPUTED {
            let key = cache_key(path, &kind, &self.shared.settings);
            if self.shared.cache.contains(&key) {
                skipped += 1;
                continue;
            }
            let signal = Arc::new(OnceSignal::new());
            pending.insert(key.clone(), Arc::clone(&signal));
            variants.push(Variant { kind, key, signal });
        }

        register.active = Some(ActiveJob {
            generation,
            path: path.to_path_buf(),
            token: token.clone(),
            pending,
            stored: 0,
            done: Arc::clone(&done),
        });
        drop(register);

        tracing::info!(
            generation,
            path = %path.display(),
            variants = variants.len(),
            "Precompute job started"
        );

        let shared = Arc::clone(&self.shared);
        let path = path.to_path_buf();
        let job_done = Arc::clone(&done);
        self.pool.spawn(move || {
            shared.run_job(generation, &path, &token, variants, skipped, &job_done);
        });

        PrecomputeJob { generation, done }
    }

    /// Cancel the active job, if any.
    pub fn cancel(&self) {
        if let Some(job) = self.shared.lock_register().active.as_mut() {
            job.cancel();
        }
    }

    /// Cached bytes of a variant, without computing anything.
    pub fn peek(&self, path: &Path, kind: &TransformKind) -> Option<Arc<[u8]>> {
        let key = cache_key(path, kind, &self.shared.settings);
        self.shared.cache.get(&key)
    }

    /// Bytes of a variant, from the cache, the in-flight job, or computed now.
    ///
    /// A variant that the active job is still computing is awaited rather
    /// than computed twice. If that job is cancelled or the variant fails,
    /// it is computed synchronously on the calling thread.
    pub fn fetch(&self, path: &Path, kind: &TransformKind) -> Result<Arc<[u8]>, ProcessError> {
        let key = cache_key(path, kind, &self.shared.settings);

        let pending = {
            let register = self.shared.lock_register();
            if let Some(data) = self.shared.cache.get(&key) {
                return Ok(data);
            }
            register
                .active
                .as_ref()
                .and_then(|job| job.pending.get(&key).cloned())
        };

        if let Some(signal) = pending {
            tracing::debug!(key = %key, "Waiting for in-flight precompute");
            if let VariantOutcome::Ready(data) = signal.wait() {
                return Ok(data);
            }
        }

        let raw = self.shared.source.load(path)?;
        let bytes = process_bytes(&raw, kind, &self.shared.settings, &CancellationToken::new())?;
        let data: Arc<[u8]> = bytes.into();
        self.shared.cache.set(key, Arc::clone(&data));
        Ok(data)
    }
}

impl Drop for PrecomputeCoordinator {
    fn drop(&mut self) {
        self.cancel();
    }
}
