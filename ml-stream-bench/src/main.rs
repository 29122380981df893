//! Benchmark runner for ML data stream pipelines

use ml_stream_bench::{
    bench_map_parallel, bench_map_sequential, bench_prefetch, bench_shuffle_bucket, bench_zip, BenchConfig,
    BenchResult,
};

fn print_result(result: &BenchResult) {
    println!("\nBenchmark: {}", result.name);
    println!("  Total time:   {:?}", result.total_time);
    println!("  Average time: {:?}", result.avg_time);
    println!("  Min time:     {:?}", result.min_time);
    println!("  Max time:     {:?}", result.max_time);
    println!("  Throughput:   {:.2} examples/sec", result.throughput);
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== ML Data Stream Benchmarks ===");

    let config = BenchConfig::default();

    print_result(&bench_map_sequential(&config)?);
    print_result(&bench_map_parallel(&config)?);
    print_result(&bench_prefetch(&config)?);
    print_result(&bench_shuffle_bucket(&config)?);
    print_result(&bench_zip(&config)?);

    println!("\n=== Map Scaling ===");

    for num_parallel_calls in [1, 2, 4, 8] {
        let config = BenchConfig {
            num_parallel_calls,
            iterations: 3,
            ..BenchConfig::default()
        };

        let result = bench_map_parallel(&config)?;

        println!("\nParallel calls: {num_parallel_calls}");
        println!("  Average time: {:?}", result.avg_time);
        println!("  Throughput:   {:.2} examples/sec", result.throughput);
    }

    Ok(())
}
