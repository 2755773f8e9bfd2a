use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use slicebox_engine::{EngineConfig, SliceEngine};

const BLOCK: usize = 512;

fn bench_process(c: &mut Criterion) {
    let (mut engine, handle) = SliceEngine::new(EngineConfig::default()).expect("config");

    // Give the engine something to chew on: a recorded burst and hot effects.
    handle.set_recording(true);
    let burst = vec![0.5f32; 48000];
    let mut sink_l = vec![0.0f32; 48000];
    let mut sink_r = vec![0.0f32; 48000];
    engine.process(&burst, &burst, &mut sink_l, &mut sink_r);
    handle.set_recording(false);
    handle.set_grain_wet(0.5);
    handle.set_grain_chaos(true);
    handle.set_delay_wet(0.5);
    handle.set_reverb_wet(0.5);
    handle.set_poly(4);
    handle.set_sequencer_enabled(true);

    let in_l = vec![0.1f32; BLOCK];
    let in_r = vec![0.1f32; BLOCK];
    let mut out_l = vec![0.0f32; BLOCK];
    let mut out_r = vec![0.0f32; BLOCK];

    let mut group = c.benchmark_group("engine");
    group.throughput(Throughput::Elements(BLOCK as u64));
    group.bench_function("process_512", |b| {
        b.iter(|| {
            engine.process(&in_l, &in_r, &mut out_l, &mut out_r);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_process);
criterion_main!(benches);
