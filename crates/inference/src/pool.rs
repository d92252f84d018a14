use crate::backend::{DetectorBackend, ObjectDetector};
use crate::registry::{ModelOrigin, ModelSource};
use image::DynamicImage;
use schema::Detection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub min_replicas: usize,
    pub max_replicas: usize,
    /// Bound on waiting for a free worker before the request is refused.
    pub admission_timeout: Duration,
    /// Bound on a single inference once dispatched.
    pub infer_timeout: Duration,
    pub autoscale_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_replicas: 1,
            max_replicas: 2,
            admission_timeout: Duration::from_millis(500),
            infer_timeout: Duration::from_millis(10_000),
            autoscale_interval: Duration::from_millis(2_000),
        }
    }
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("no inference worker available within {0:?}")]
    WorkerUnavailable(Duration),

    #[error("inference worker timed out after {0:?}")]
    WorkerTimeout(Duration),

    #[error("inference failed: {0}")]
    Inference(#[source] anyhow::Error),
}

/// Point-in-time pool observation used by autoscaling and health reporting.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    pub replicas: usize,
    pub in_flight: usize,
    pub waiting: usize,
}

struct Instance {
    detector: Arc<dyn ObjectDetector>,
    origin: ModelOrigin,
}

/// Instance factory: turns a model path into a live detector.
pub type InstanceLoader =
    dyn Fn(&std::path::Path) -> anyhow::Result<Arc<dyn ObjectDetector>> + Send + Sync;

struct PoolInner {
    config: PoolConfig,
    source: ModelSource,
    loader: Box<InstanceLoader>,
    /// Written only by the autoscaler; requests read the current set.
    instances: RwLock<Vec<Instance>>,
    /// Concurrency bound: one permit per live instance.
    permits: Arc<Semaphore>,
    next: AtomicUsize,
    in_flight: AtomicUsize,
    waiting: AtomicUsize,
}

/// Stateless inference workers behind a semaphore-bounded dispatch.
///
/// The pool holds between `min_replicas` and `max_replicas` instances at
/// all times; a single autoscaler task grows and shrinks the set from
/// observed load. Cloning shares the pool.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Build the pool with backend `B`, creating `min_replicas` instances
    /// up front.
    pub fn build<B: DetectorBackend + 'static>(
        source: ModelSource,
        config: PoolConfig,
    ) -> anyhow::Result<Self> {
        let loader: Box<InstanceLoader> =
            Box::new(|path| Ok(Arc::new(B::load_model(path)?) as Arc<dyn ObjectDetector>));
        Self::build_with_loader(loader, source, config)
    }

    /// Build with an explicit instance loader. Exposed for callers that
    /// construct detectors some other way than [`DetectorBackend`].
    pub fn build_with_loader(
        loader: Box<InstanceLoader>,
        source: ModelSource,
        config: PoolConfig,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(config.min_replicas >= 1, "min_replicas must be at least 1");
        anyhow::ensure!(
            config.min_replicas <= config.max_replicas,
            "min_replicas ({}) must not exceed max_replicas ({})",
            config.min_replicas,
            config.max_replicas
        );

        let mut instances = Vec::with_capacity(config.min_replicas);
        for _ in 0..config.min_replicas {
            instances.push(load_instance(&loader, &source)?);
        }

        tracing::info!(
            replicas = instances.len(),
            model = %source.model_name,
            "worker pool initialized"
        );

        let permits = Arc::new(Semaphore::new(config.min_replicas));
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                source,
                loader,
                instances: RwLock::new(instances),
                permits,
                next: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                waiting: AtomicUsize::new(0),
            }),
        })
    }

    /// Dispatch one inference to a free worker.
    ///
    /// Admission waits are bounded by `admission_timeout`; the inference
    /// itself by `infer_timeout`. A timed-out inference still occupies its
    /// blocking thread until the backend returns, but its permit is
    /// released so the request slot is not lost.
    pub async fn infer(&self, image: &DynamicImage) -> Result<Vec<Detection>, PoolError> {
        let inner = &self.inner;

        inner.waiting.fetch_add(1, Ordering::SeqCst);
        let admitted = tokio::time::timeout(
            inner.config.admission_timeout,
            inner.permits.clone().acquire_owned(),
        )
        .await;
        inner.waiting.fetch_sub(1, Ordering::SeqCst);

        let _permit = match admitted {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) | Err(_) => {
                return Err(PoolError::WorkerUnavailable(inner.config.admission_timeout));
            }
        };

        let detector = {
            let instances = inner
                .instances
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let idx = inner.next.fetch_add(1, Ordering::Relaxed) % instances.len();
            instances[idx].detector.clone()
        };

        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let img = image.clone();
        let handle = tokio::task::spawn_blocking(move || detector.infer(&img));
        let outcome = tokio::time::timeout(inner.config.infer_timeout, handle).await;
        inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Err(_) => Err(PoolError::WorkerTimeout(inner.config.infer_timeout)),
            Ok(Err(join)) => Err(PoolError::Inference(anyhow::anyhow!(
                "inference task failed: {join}"
            ))),
            Ok(Ok(Ok(detections))) => Ok(detections),
            Ok(Ok(Err(e))) => Err(PoolError::Inference(e)),
        }
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            replicas: self
                .inner
                .instances
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            in_flight: self.inner.in_flight.load(Ordering::SeqCst),
            waiting: self.inner.waiting.load(Ordering::SeqCst),
        }
    }

    /// Model origin of every live instance, in instance order.
    pub fn instance_origins(&self) -> Vec<ModelOrigin> {
        self.inner
            .instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|i| i.origin)
            .collect()
    }

    /// One autoscaling decision: grow by one instance when requests are
    /// waiting and the pool is below max; shrink by one when idle above
    /// min. Only this path mutates the instance set.
    pub async fn scale_once(&self) {
        let inner = &self.inner;
        let status = self.status();
        let (min, max) = (inner.config.min_replicas, inner.config.max_replicas);

        if status.waiting > 0 && status.replicas < max {
            let pool = self.inner.clone();
            let loaded =
                tokio::task::spawn_blocking(move || load_instance(&pool.loader, &pool.source))
                    .await;

            match loaded {
                Ok(Ok(instance)) => {
                    let replicas = {
                        let mut instances = inner
                            .instances
                            .write()
                            .unwrap_or_else(PoisonError::into_inner);
                        instances.push(instance);
                        instances.len()
                    };
                    inner.permits.add_permits(1);
                    tracing::info!(replicas, "scaled worker pool up");
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "failed to create worker instance");
                }
                Err(e) => {
                    tracing::error!(error = %e, "worker instance load task failed");
                }
            }
        } else if status.waiting == 0 && status.replicas > min && status.in_flight < status.replicas
        {
            // Remove a permit first so no request is admitted onto the
            // instance being retired.
            if let Ok(permit) = inner.permits.clone().try_acquire_owned() {
                permit.forget();
                let replicas = {
                    let mut instances = inner
                        .instances
                        .write()
                        .unwrap_or_else(PoisonError::into_inner);
                    instances.pop();
                    instances.len()
                };
                tracing::info!(replicas, "scaled worker pool down");
            }
        }
    }

    /// Run the autoscaling decision loop until the task is dropped.
    pub fn spawn_autoscaler(&self) -> JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(pool.inner.config.autoscale_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                pool.scale_once().await;
            }
        })
    }
}

/// Create one instance: primary model path first, configured fallback on
/// load failure. The fallback substitution is the only retry here.
fn load_instance(loader: &InstanceLoader, source: &ModelSource) -> anyhow::Result<Instance> {
    match loader(&source.path) {
        Ok(detector) => Ok(Instance {
            detector,
            origin: source.origin,
        }),
        Err(primary_err) if source.path != source.fallback_path => {
            tracing::warn!(
                error = %primary_err,
                path = %source.path.display(),
                "model load failed, degrading to fallback model"
            );
            let detector = loader(&source.fallback_path)?;
            Ok(Instance {
                detector,
                origin: ModelOrigin::BundledDefault,
            })
        }
        Err(e) => Err(e),
    }
}
