//! Benchmarks for ML data stream pipelines

use std::time::{Duration, Instant};

use tracing::info;

use ml_stream_core::{read_list, Data, Pipeline, PipelineBuilder, Result, ZipOptions};

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Number of measured iterations
    pub iterations: usize,

    /// Iterations run before measuring
    pub warmup_iterations: usize,

    /// Number of elements produced by the leaf source
    pub num_examples: usize,

    /// Parallelism of the `map` stage
    pub num_parallel_calls: usize,

    /// Queue size of the `prefetch` stage
    pub prefetch_size: usize,

    /// Window of the `shuffle` stage
    pub shuffle_window: usize,

    /// Busy work per element in the `map` function, in microseconds
    pub map_cost_micros: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            warmup_iterations: 2,
            num_examples: 10_000,
            num_parallel_calls: num_cpus::get(),
            prefetch_size: 64,
            shuffle_window: 1000,
            map_cost_micros: 20,
        }
    }
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchResult {
    /// Name of the benchmark
    pub name: String,

    /// Total time taken
    pub total_time: Duration,

    /// Average time per iteration
    pub avg_time: Duration,

    /// Min time per iteration
    pub min_time: Duration,

    /// Max time per iteration
    pub max_time: Duration,

    /// Throughput (elements/second)
    pub throughput: f64,
}

/// Time `func` over `config.iterations` runs
///
/// `func` returns the number of elements it pulled.
pub fn run_benchmark<F>(name: &str, config: &BenchConfig, mut func: F) -> anyhow::Result<BenchResult>
where
    F: FnMut() -> anyhow::Result<usize>,
{
    for _ in 0..config.warmup_iterations {
        func()?;
    }

    let mut times = Vec::with_capacity(config.iterations);
    let mut total_examples = 0;

    let start_total = Instant::now();

    for _ in 0..config.iterations {
        let start = Instant::now();

        total_examples += func()?;

        times.push(start.elapsed());
    }

    let total_time = start_total.elapsed();

    let avg_time = times
        .iter()
        .sum::<Duration>()
        .checked_div(u32::try_from(times.len()).unwrap_or(u32::MAX))
        .unwrap_or_default();

    let min_time = times.iter().min().copied().unwrap_or_default();
    let max_time = times.iter().max().copied().unwrap_or_default();

    #[allow(clippy::cast_precision_loss)]
    let throughput = total_examples as f64 / total_time.as_secs_f64().max(f64::EPSILON);

    info!(name, ?avg_time, throughput, "Benchmark finished");

    Ok(BenchResult {
        name: name.to_string(),
        total_time,
        avg_time,
        min_time,
        max_time,
        throughput,
    })
}

/// Leaf source of `num_examples` integers
pub fn numbers(num_examples: usize) -> PipelineBuilder {
    let examples = (0..num_examples)
        .map(|n| Data::Int(i64::try_from(n).unwrap_or(i64::MAX)))
        .collect();

    read_list(examples)
}

/// Pull every element of `pipeline`, returning how many there were
pub fn consume(pipeline: &mut Pipeline) -> Result<usize> {
    let mut count = 0;

    while pipeline.next()?.is_some() {
        count += 1;
    }

    Ok(count)
}

/// Spin for `micros` microseconds to stand in for per-element work
pub fn busy_work(example: Data, micros: u64) -> anyhow::Result<Data> {
    let deadline = Instant::now() + Duration::from_micros(micros);

    while Instant::now() < deadline {
        std::hint::spin_loop();
    }

    Ok(example)
}

fn map_pipeline(config: &BenchConfig, num_parallel_calls: usize) -> Result<Pipeline> {
    let cost = config.map_cost_micros;

    numbers(config.num_examples)
        .map(move |example| busy_work(example, cost), num_parallel_calls, false)
        .and_return()
}

/// Benchmark `map` with one call at a time
pub fn bench_map_sequential(config: &BenchConfig) -> anyhow::Result<BenchResult> {
    run_benchmark("map (sequential)", config, || Ok(consume(&mut map_pipeline(config, 1)?)?))
}

/// Benchmark `map` with `config.num_parallel_calls` concurrent calls
pub fn bench_map_parallel(config: &BenchConfig) -> anyhow::Result<BenchResult> {
    let name = format!("map (parallel x{})", config.num_parallel_calls);

    run_benchmark(&name, config, || {
        Ok(consume(&mut map_pipeline(config, config.num_parallel_calls)?)?)
    })
}

/// Benchmark `prefetch` in front of a consumer doing its own work
pub fn bench_prefetch(config: &BenchConfig) -> anyhow::Result<BenchResult> {
    let cost = config.map_cost_micros;

    run_benchmark("map + prefetch", config, || {
        let mut pipeline = numbers(config.num_examples)
            .map(move |example| busy_work(example, cost), 1, false)
            .prefetch(config.prefetch_size)
            .and_return()?;

        let mut count = 0;

        while let Some(example) = pipeline.next()? {
            busy_work(example, cost)?;
            count += 1;
        }

        Ok(count)
    })
}

/// Benchmark a shuffled, bucketed stream
pub fn bench_shuffle_bucket(config: &BenchConfig) -> anyhow::Result<BenchResult> {
    run_benchmark("shuffle + bucket", config, || {
        let mut pipeline = numbers(config.num_examples)
            .shuffle(config.shuffle_window, true, true)
            .bucket(32, false)
            .and_return()?;

        Ok(consume(&mut pipeline)?)
    })
}

/// Benchmark `zip` over two streams
pub fn bench_zip(config: &BenchConfig) -> anyhow::Result<BenchResult> {
    run_benchmark("zip", config, || {
        let pipelines = vec![
            numbers(config.num_examples).and_return()?,
            numbers(config.num_examples).and_return()?,
        ];

        Ok(consume(&mut Pipeline::zip(pipelines, ZipOptions::default()).and_return()?)?)
    })
}
