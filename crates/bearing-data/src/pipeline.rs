//! Staged dataset pipeline.
//!
//! [`Pipeline`] drives a [`SourceAdapter`] through a fixed sequence of
//! stages:
//!
//! ```text
//! download → build_dataset → split_dataset → build_data_loaders
//!          → truncate → [min_max_scale] → normalize
//! ```
//!
//! Each stage checks that the state it consumes has been produced and fails
//! with [`PipelineError::Sequence`] otherwise. New state is computed into
//! locals and stored only once the whole stage has succeeded, so a failed
//! stage leaves the pipeline exactly as it was. Re-running an upstream stage
//! discards everything derived from its previous result.
//!
//! The normalizing stages compute their statistics separately on each
//! partition's current loader, wrap that partition with a new
//! [`TransformDataset`] layer and rebuild its loader. Running one of them
//! twice stacks a second layer on top of the first.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::ThreadPool;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::adapter::SourceAdapter;
use crate::config::{validate_fractions, validate_n_sigma, PipelineConfig};
use crate::dataset::{ConcatDataset, LabeledDataset, SharedDataset, SubsetDataset};
use crate::encoder::{LabelEncoder, ENCODER_FILE};
use crate::error::{PipelineError, PipelineResult, StatsError};
use crate::loader::{worker_pool, DataLoader, LoaderOptions};
use crate::registry::build_adapter;
use crate::segment::{SegmentDataset, SegmentParams, SignalLoader};
use crate::stats::{compute_mean_std, compute_min_max, MeanStd};
use crate::transform::{Clamp, ImageTransform, Normalize, Resize, TransformDataset};

// ---------------------------------------------------------------------------
// Stage / Partition / Splits
// ---------------------------------------------------------------------------

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// [`Pipeline::download`].
    Download,
    /// [`Pipeline::build_dataset`].
    BuildDataset,
    /// [`Pipeline::split_dataset`].
    SplitDataset,
    /// [`Pipeline::build_data_loaders`].
    BuildDataLoaders,
    /// [`Pipeline::truncate`].
    Truncate,
    /// [`Pipeline::min_max_scale`].
    MinMaxScale,
    /// [`Pipeline::normalize`].
    Normalize,
}

impl Stage {
    /// Method name of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::BuildDataset => "build_dataset",
            Stage::SplitDataset => "split_dataset",
            Stage::BuildDataLoaders => "build_data_loaders",
            Stage::Truncate => "truncate",
            Stage::MinMaxScale => "min_max_scale",
            Stage::Normalize => "normalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Dataset partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Training partition (shuffled loader).
    Train,
    /// Validation partition.
    Valid,
    /// Test partition.
    Test,
}

impl Partition {
    /// All partitions in split order.
    pub const ALL: [Partition; 3] = [Partition::Train, Partition::Valid, Partition::Test];

    /// Lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Valid => "valid",
            Partition::Test => "test",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One value per partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Splits<T> {
    /// Training value.
    pub train: T,
    /// Validation value.
    pub valid: T,
    /// Test value.
    pub test: T,
}

impl<T> Splits<T> {
    /// Build from a fallible per-partition constructor, in split order.
    pub fn try_from_fn<E, F>(mut f: F) -> Result<Self, E>
    where
        F: FnMut(Partition) -> Result<T, E>,
    {
        Ok(Splits {
            train: f(Partition::Train)?,
            valid: f(Partition::Valid)?,
            test: f(Partition::Test)?,
        })
    }

    /// Value for `partition`.
    pub fn get(&self, partition: Partition) -> &T {
        match partition {
            Partition::Train => &self.train,
            Partition::Valid => &self.valid,
            Partition::Test => &self.test,
        }
    }

    /// Apply `f` to every value.
    pub fn map<U, F: FnMut(&T) -> U>(&self, mut f: F) -> Splits<U> {
        Splits {
            train: f(&self.train),
            valid: f(&self.valid),
            test: f(&self.test),
        }
    }

    /// `(partition, value)` pairs in split order.
    pub fn iter(&self) -> impl Iterator<Item = (Partition, &T)> {
        Partition::ALL.into_iter().map(move |p| (p, self.get(p)))
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Staged builder of normalized train / validation / test loaders.
pub struct Pipeline {
    adapter: Arc<dyn SourceAdapter>,
    cache_label_encoder: bool,

    data_dir: Option<PathBuf>,
    dataset: Option<SharedDataset>,
    encoder: Option<LabelEncoder>,
    num_classes: Option<usize>,
    seed: Option<u64>,
    subsets: Option<Splits<SharedDataset>>,
    batch_size: Option<usize>,
    num_workers: Option<usize>,
    pool: Option<Arc<ThreadPool>>,
    loaders: Option<Splits<DataLoader>>,
}

impl Pipeline {
    /// Empty pipeline reading through `adapter`.
    pub fn new(adapter: Arc<dyn SourceAdapter>) -> Self {
        Pipeline {
            adapter,
            cache_label_encoder: false,
            data_dir: None,
            dataset: None,
            encoder: None,
            num_classes: None,
            seed: None,
            subsets: None,
            batch_size: None,
            num_workers: None,
            pool: None,
            loaders: None,
        }
    }

    /// Empty pipeline using the adapter registered under `name`.
    pub fn from_registry(name: &str) -> PipelineResult<Self> {
        Ok(Pipeline::new(build_adapter(name)?))
    }

    /// Persist and reuse the label encoder at `<data_dir>/.encoder.json`.
    pub fn with_label_cache(mut self, enabled: bool) -> Self {
        self.cache_label_encoder = enabled;
        self
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    /// Ensure the raw data exists at `data_dir`, downloading it if the
    /// directory is absent, and record the directory.
    pub fn download(&mut self, data_dir: impl AsRef<Path>) -> PipelineResult<&mut Self> {
        let data_dir = data_dir.as_ref();
        info!("[{}] {} → {}", Stage::Download, self.adapter.name(), data_dir.display());
        if data_dir.exists() {
            debug!("{} already exists, skipping download", data_dir.display());
        } else {
            self.adapter.download(data_dir)?;
        }

        self.clear_from(Stage::BuildDataset);
        self.data_dir = Some(data_dir.to_path_buf());
        Ok(self)
    }

    /// Discover files, encode labels and build the concatenated segment
    /// dataset with images resized to `image_size` (`(height, width)`).
    pub fn build_dataset(
        &mut self,
        image_size: (usize, usize),
        params: SegmentParams,
    ) -> PipelineResult<&mut Self> {
        let stage = Stage::BuildDataset;
        let data_dir = self
            .data_dir
            .as_deref()
            .ok_or(PipelineError::sequence(stage, "a data directory (run download first)"))?;
        params.validate()?;
        info!("[{stage}] segments of {} samples → {}x{} images", params.seg_length, image_size.0, image_size.1);

        let files = self.adapter.list_data_files(data_dir)?;
        let labels = files
            .iter()
            .map(|f| self.adapter.read_label(f))
            .collect::<Result<Vec<_>, _>>()?;

        let encoder = if self.cache_label_encoder {
            LabelEncoder::load_or_fit(&data_dir.join(ENCODER_FILE), &labels)?
        } else {
            LabelEncoder::fit(&labels)?
        };
        let targets = encoder.encode_all(&labels)?;

        let adapter = Arc::clone(&self.adapter);
        let loader: SignalLoader = Arc::new(move |path: &Path| adapter.load_signal(path));
        let resize: Arc<dyn ImageTransform> = Arc::new(Resize::new(image_size.0, image_size.1)?);

        let mut members: Vec<SharedDataset> = Vec::with_capacity(files.len());
        for (file, target) in files.iter().zip(targets) {
            let ds = SegmentDataset::new(file.clone(), target, params, Arc::clone(&loader), Arc::clone(&resize))?;
            debug!("{}: {} segments, target {target}", file.display(), ds.len());
            members.push(Arc::new(ds));
        }
        let dataset: SharedDataset = Arc::new(ConcatDataset::new(members));

        info!(
            "[{stage}] {} files, {} samples, {} classes {:?}",
            files.len(),
            dataset.len(),
            encoder.num_classes(),
            encoder.classes()
        );

        self.clear_from(Stage::SplitDataset);
        self.num_classes = Some(encoder.num_classes());
        self.encoder = Some(encoder);
        self.dataset = Some(dataset);
        Ok(self)
    }

    /// Randomly partition the dataset with the given train / valid / test
    /// fractions. `seed` also seeds the train loader's shuffle.
    pub fn split_dataset(&mut self, fractions: [f64; 3], seed: u64) -> PipelineResult<&mut Self> {
        let stage = Stage::SplitDataset;
        let dataset = self
            .dataset
            .as_ref()
            .ok_or(PipelineError::sequence(stage, "a dataset (run build_dataset first)"))?;
        validate_fractions(&fractions)?;

        let n = dataset.len();
        let lengths = split_lengths(n, &fractions);
        let mut permutation: Vec<usize> = (0..n).collect();
        permutation.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut offset = 0;
        let mut chunks = lengths.iter().map(|&len| {
            let chunk = permutation[offset..offset + len].to_vec();
            offset += len;
            chunk
        });
        let subsets = Splits::try_from_fn(|_| -> PipelineResult<SharedDataset> {
            let indices = chunks.next().unwrap_or_default();
            Ok(Arc::new(SubsetDataset::new(Arc::clone(dataset), indices)?))
        })?;

        info!(
            "[{stage}] {n} samples → train {}, valid {}, test {} (seed {seed})",
            lengths[0], lengths[1], lengths[2]
        );

        self.clear_from(Stage::BuildDataLoaders);
        self.seed = Some(seed);
        self.subsets = Some(subsets);
        Ok(self)
    }

    /// Build one loader per partition; the train loader shuffles.
    ///
    /// `num_workers > 0` fetches batch samples in parallel on a pool of that
    /// many threads shared by the three loaders.
    pub fn build_data_loaders(&mut self, batch_size: usize, num_workers: usize) -> PipelineResult<&mut Self> {
        let stage = Stage::BuildDataLoaders;
        let subsets = self
            .subsets
            .as_ref()
            .ok_or(PipelineError::sequence(stage, "dataset partitions (run split_dataset first)"))?;
        let seed = self.seed.unwrap_or_default();

        let pool = worker_pool(num_workers)?;
        let loaders = make_loaders(subsets, batch_size, pool.as_ref(), seed)?;
        info!(
            "[{stage}] batch size {batch_size}, {num_workers} workers, batches: train {}, valid {}, test {}",
            loaders.train.num_batches(),
            loaders.valid.num_batches(),
            loaders.test.num_batches()
        );

        self.batch_size = Some(batch_size);
        self.num_workers = Some(num_workers);
        self.pool = pool;
        self.loaders = Some(loaders);
        Ok(self)
    }

    /// Clip every partition to `±n_sigma · std` of its current pixels.
    pub fn truncate(&mut self, n_sigma: f64) -> PipelineResult<&mut Self> {
        validate_n_sigma(n_sigma)?;
        self.restage(Stage::Truncate, |loader| {
            let stats = compute_mean_std(loader)?;
            let clamp = Clamp::symmetric(clip_limit(&stats, n_sigma)?)?;
            Ok(Arc::new(clamp))
        })
    }

    /// Map every partition's pixel range onto `[-1, 1]`.
    pub fn min_max_scale(&mut self) -> PipelineResult<&mut Self> {
        self.restage(Stage::MinMaxScale, |loader| {
            let range = compute_min_max(loader)?;
            Ok(Arc::new(Normalize::new(range.midpoint(), range.half_range())?))
        })
    }

    /// Standardise every partition to zero mean and unit standard deviation.
    pub fn normalize(&mut self) -> PipelineResult<&mut Self> {
        self.restage(Stage::Normalize, |loader| {
            let stats = compute_mean_std(loader)?;
            Ok(Arc::new(Normalize::new(stats.mean, stats.std)?))
        })
    }

    /// Run every stage with the settings in `config`:
    /// download, build, split, loaders, truncate, optional min-max, normalize.
    pub fn run(&mut self, config: &PipelineConfig) -> PipelineResult<&mut Self> {
        config.validate()?;
        self.cache_label_encoder = config.cache_label_encoder;

        self.download(&config.data_dir)?
            .build_dataset(config.image_size(), config.segment_params())?
            .split_dataset(config.fractions, config.seed)?
            .build_data_loaders(config.batch_size, config.num_workers)?
            .truncate(config.n_sigma)?;
        if config.min_max_scale {
            self.min_max_scale()?;
        }
        self.normalize()
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Source adapter.
    pub fn adapter(&self) -> &Arc<dyn SourceAdapter> {
        &self.adapter
    }

    /// Data directory recorded by [`download`](Self::download).
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Full concatenated dataset, before any normalization.
    pub fn dataset(&self) -> Option<&SharedDataset> {
        self.dataset.as_ref()
    }

    /// Label encoder fit by [`build_dataset`](Self::build_dataset).
    pub fn encoder(&self) -> Option<&LabelEncoder> {
        self.encoder.as_ref()
    }

    /// Number of classes.
    pub fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }

    /// Current (outermost) dataset layer of `partition`.
    pub fn subset(&self, partition: Partition) -> Option<&SharedDataset> {
        self.subsets.as_ref().map(|s| s.get(partition))
    }

    /// Loader of `partition`.
    pub fn loader(&self, partition: Partition) -> Option<&DataLoader> {
        self.loaders.as_ref().map(|l| l.get(partition))
    }

    /// All three loaders.
    pub fn loaders(&self) -> Option<&Splits<DataLoader>> {
        self.loaders.as_ref()
    }

    /// Batch size recorded by [`build_data_loaders`](Self::build_data_loaders).
    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    /// Worker count recorded by [`build_data_loaders`](Self::build_data_loaders).
    pub fn num_workers(&self) -> Option<usize> {
        self.num_workers
    }

    /// Split and shuffle seed recorded by [`split_dataset`](Self::split_dataset).
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Wrap every partition with the transform `make` derives from its
    /// current loader, then rebuild the loaders.
    fn restage<F>(&mut self, stage: Stage, make: F) -> PipelineResult<&mut Self>
    where
        F: Fn(&DataLoader) -> PipelineResult<Arc<dyn ImageTransform>>,
    {
        let (subsets, loaders, batch_size) = match (&self.subsets, &self.loaders, self.batch_size) {
            (Some(s), Some(l), Some(b)) => (s, l, b),
            _ => {
                return Err(PipelineError::sequence(
                    stage,
                    "data loaders (run build_data_loaders first)",
                ))
            }
        };
        info!("[{stage}] computing per-partition statistics");

        let wrapped = Splits::try_from_fn(|p| -> PipelineResult<SharedDataset> {
            let transform = make(loaders.get(p))?;
            debug!("[{stage}] {p}: {}", transform.describe());
            Ok(TransformDataset::wrap(Arc::clone(subsets.get(p)), transform))
        })?;
        let rebuilt = make_loaders(&wrapped, batch_size, self.pool.as_ref(), self.seed.unwrap_or_default())?;

        self.subsets = Some(wrapped);
        self.loaders = Some(rebuilt);
        info!("[{stage}] done");
        Ok(self)
    }

    /// Drop `stage`'s output and everything derived from it.
    fn clear_from(&mut self, stage: Stage) {
        if stage == Stage::BuildDataset {
            self.dataset = None;
            self.encoder = None;
            self.num_classes = None;
        }
        if matches!(stage, Stage::BuildDataset | Stage::SplitDataset) {
            self.seed = None;
            self.subsets = None;
        }
        self.batch_size = None;
        self.num_workers = None;
        self.pool = None;
        self.loaders = None;
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("adapter", &self.adapter.name())
            .field("data_dir", &self.data_dir)
            .field("num_classes", &self.num_classes)
            .field("dataset_len", &self.dataset.as_ref().map(|d| d.len()))
            .field("subset_lens", &self.subsets.as_ref().map(|s| s.map(|d| d.len())))
            .field("batch_size", &self.batch_size)
            .field("num_workers", &self.num_workers)
            .finish()
    }
}

/// Partition sizes for `n` samples: `floor(n · f)` each, then the remainder
/// handed out one at a time in train, valid, test order.
///
/// Fractions accepted by validation may sum to slightly more than 1; any
/// excess that yields is taken back from test, then valid, then train, so
/// the lengths always sum to `n`.
pub fn split_lengths(n: usize, fractions: &[f64; 3]) -> [usize; 3] {
    let mut lengths = fractions.map(|f| (n as f64 * f).floor() as usize);
    let assigned: usize = lengths.iter().sum();
    if assigned > n {
        let mut excess = assigned - n;
        for len in lengths.iter_mut().rev() {
            let take = excess.min(*len);
            *len -= take;
            excess -= take;
        }
    } else {
        for i in 0..n - assigned {
            lengths[i % 3] += 1;
        }
    }
    lengths
}

/// Half-width of the truncation band, `n_sigma · std`.
///
/// A zero or non-finite std (for instance from `-inf` dB pixels of a silent
/// recording) cannot define a band.
fn clip_limit(stats: &MeanStd, n_sigma: f64) -> Result<f32, StatsError> {
    if stats.std == 0.0 || !stats.std.is_finite() {
        return Err(StatsError::DegenerateScale { what: "std", value: stats.std });
    }
    Ok((n_sigma * stats.std) as f32)
}

fn make_loaders(
    subsets: &Splits<SharedDataset>,
    batch_size: usize,
    pool: Option<&Arc<ThreadPool>>,
    seed: u64,
) -> PipelineResult<Splits<DataLoader>> {
    Splits::try_from_fn(|p| -> PipelineResult<DataLoader> {
        let options = LoaderOptions::new(batch_size)
            .shuffle(p == Partition::Train)
            .seed(seed);
        Ok(DataLoader::new(Arc::clone(subsets.get(p)), options)?.with_workers(pool.cloned()))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
