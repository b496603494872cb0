//! Modulation Benchmarks
//!
//! Every loop tick runs on the host's main thread between UI work, so a tick
//! and a full `advance` must stay far below a frame (16 ms). These benchmarks
//! measure single ticks, long simulated sessions and lifecycle churn.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use drift::prelude::*;

// ============================================================================
// Constants
// ============================================================================

/// Simulated session lengths in seconds
const SESSION_SECONDS: [u32; 3] = [60, 600, 3600];

/// Host polling interval in seconds
const POLL_INTERVAL: f64 = 0.1;

// ============================================================================
// Helper Functions
// ============================================================================

fn playing_engine(seed: u64) -> ModulationSupervisor<CommandGraph> {
    let mut engine = ModulationSupervisor::with_random(
        CommandGraph::new(),
        ModulationConfig::default(),
        RandomRange::from_seed(seed),
    );
    engine.on_first_user_interaction();
    engine.on_track_change(SourceRef::new("music/bench.mp3"));
    engine.on_play();
    engine
}

/// Poll the engine like a host timer would, draining commands as it goes
fn run_session(engine: &mut ModulationSupervisor<CommandGraph>, seconds: u32) -> usize {
    let steps = (seconds as f64 / POLL_INTERVAL) as usize;
    let mut fired = 0;
    for _ in 0..steps {
        engine.graph_mut().advance_time(POLL_INTERVAL);
        fired += engine.advance();
        engine.graph_mut().drain_commands();
    }
    fired
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_advance_idle(c: &mut Criterion) {
    c.bench_function("supervisor/advance_nothing_due", |b| {
        let mut engine = playing_engine(1);
        b.iter(|| black_box(engine.advance()));
    });
}

fn bench_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("supervisor/session");
    group.sample_size(20);

    for seconds in SESSION_SECONDS {
        group.throughput(Throughput::Elements(seconds as u64));
        group.bench_with_input(BenchmarkId::new("seconds", seconds), &seconds, |b, &s| {
            b.iter_with_setup(|| playing_engine(7), |mut engine| run_session(&mut engine, s));
        });
    }

    group.finish();
}

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("supervisor/lifecycle");

    group.bench_function("pause_play", |b| {
        let mut engine = playing_engine(3);
        b.iter(|| {
            engine.on_pause();
            engine.on_play();
            engine.graph_mut().clear_commands();
        });
    });

    group.bench_function("track_change", |b| {
        let mut engine = playing_engine(4);
        b.iter(|| {
            engine.on_track_change(SourceRef::new("music/next.mp3"));
            engine.graph_mut().clear_commands();
        });
    });

    group.bench_function("settings_change", |b| {
        let mut engine = playing_engine(5);
        let mut toggle = false;
        b.iter(|| {
            toggle = !toggle;
            let config = ModulationConfig {
                enable_binaural_beat: toggle,
                ..Default::default()
            };
            engine.on_settings_changed(black_box(config)).ok();
            engine.graph_mut().clear_commands();
        });
    });

    group.finish();
}

fn bench_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("random");
    let config = ModulationConfig::default();
    let tuning = ModulationTuning::default();

    group.bench_function("between", |b| {
        let mut random = RandomRange::from_seed(11);
        b.iter(|| random.between(black_box(200.0), black_box(2000.0)));
    });

    group.bench_function("plan_beat_frequencies", |b| {
        let mut random = RandomRange::from_seed(12);
        b.iter(|| {
            BinauralBeatModulator::plan_frequencies(&mut random, &config, &tuning, black_box(1500.0))
        });
    });

    group.finish();
}

criterion_group!(
    supervisor_benches,
    bench_advance_idle,
    bench_session,
    bench_lifecycle,
);

criterion_group!(sampling_benches, bench_sampling);

criterion_main!(supervisor_benches, sampling_benches);
