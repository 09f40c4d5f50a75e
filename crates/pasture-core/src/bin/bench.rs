/// Pure Rust core benchmarks for the pasture model.
///
/// Uses std::time::Instant for timing, a deterministic LCG PRNG for weather
/// generation, and std::hint::black_box to prevent dead-code elimination.
/// Set RUST_LOG to see the model's own logging (default: warn).
use std::hint::black_box;
use std::time::{Duration, Instant};

use pasture_core::forcing::WeatherSeries;
use pasture_core::soil::{SoilLayer, SoilZone};
use pasture_core::species::collaborators::NoCollaborators;
use pasture_core::species::params::Parameters;
use pasture_core::species::run::{run, DailyCycleDriver};
use tracing_subscriber::EnvFilter;

const REPEATS: usize = 7;

/// Synthetic weather with a seasonal cycle plus LCG noise.
fn make_weather(n: usize, seed: u64) -> WeatherSeries {
    let mut state = seed;
    let mut next_f64 = || -> f64 {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as f64 / (1u64 << 31) as f64
    };

    let mut max_t = Vec::with_capacity(n);
    let mut min_t = Vec::with_capacity(n);
    let mut radiation = Vec::with_capacity(n);
    let mut day_length = Vec::with_capacity(n);
    let mut water_demand = Vec::with_capacity(n);
    for i in 0..n {
        let season = (2.0 * std::f64::consts::PI * (i as f64) / 365.0).sin();
        let hot = 17.0 + 9.0 * season + 4.0 * (next_f64() - 0.5);
        max_t.push(hot);
        min_t.push(hot - 6.0 - 6.0 * next_f64());
        radiation.push((16.0 + 10.0 * season) * (0.5 + 0.5 * next_f64()));
        day_length.push(12.0 + 3.0 * season);
        water_demand.push((3.0 + 2.5 * season) * (0.6 + 0.4 * next_f64()));
    }
    WeatherSeries::new(1, max_t, min_t, radiation, vec![400.0; n], day_length, water_demand)
        .unwrap_or_else(|e| panic!("synthetic weather rejected: {e}"))
}

/// A deep, well-watered loam with plenty of mineral N.
fn make_soil() -> Vec<SoilZone> {
    let layer = |thickness: f64| SoilLayer {
        thickness,
        sw: 0.40,
        ll: 0.10,
        dul: 0.35,
        sat: 0.45,
        kl: 0.06,
        ksat: 500.0,
        no3: 200.0,
        nh4: 50.0,
    };
    vec![SoilZone::new(
        "paddock",
        vec![layer(100.0), layer(200.0), layer(300.0), layer(400.0), layer(500.0)],
    )]
}

/// Run a closure `REPEATS` times, return the median duration.
fn median_time<F: FnMut()>(mut f: F) -> Duration {
    let mut times: Vec<Duration> = (0..REPEATS)
        .map(|_| {
            let start = Instant::now();
            f();
            start.elapsed()
        })
        .collect();
    times.sort();
    times[REPEATS / 2]
}

fn bench_run(sizes: &[usize]) -> Vec<(&'static str, usize, Duration)> {
    let params = Parameters::default();
    let soil = make_soil();
    let mut results = Vec::new();

    for &n in sizes {
        let weather = make_weather(n, 42);

        // Warmup
        black_box(run(&params, &weather, &soil, None).ok());

        let dur = median_time(|| {
            black_box(run(&params, &weather, &soil, None).ok());
        });
        results.push(("run", n, dur));
    }
    results
}

fn bench_driver(sizes: &[usize]) -> Vec<(&'static str, usize, Duration)> {
    let params = Parameters::default();
    let soil = make_soil();
    let mut results = Vec::new();

    for &n in sizes {
        let weather = make_weather(n, 42);
        let drive = || {
            DailyCycleDriver::new(params.clone(), soil.clone(), NoCollaborators)
                .and_then(|mut driver| driver.run(&weather))
                .ok()
        };

        // Warmup
        black_box(drive());

        let dur = median_time(|| {
            black_box(drive());
        });
        results.push(("driver", n, dur));
    }
    results
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("Pasture Core Benchmarks");
    println!("============================================================");
    println!("{:<18} {:>6}   {:>12}", "Entry point", "Days", "Median (ms)");
    println!("--------------------------------------------");

    let mut all_results: Vec<(&str, usize, Duration)> = Vec::new();

    all_results.extend(bench_run(&[365, 1825, 3650]));
    all_results.extend(bench_driver(&[365, 3650]));

    for (entry, n, dur) in &all_results {
        let ms = dur.as_secs_f64() * 1000.0;
        println!("{:<18} {:>6}      {:>8.2}", entry, n, ms);
    }

    println!("============================================================");
}
