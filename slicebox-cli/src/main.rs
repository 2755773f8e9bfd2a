//! Slicebox CLI — live duplex sampler or offline WAV renderer.
//!
//! Live mode captures the first `--capture` seconds from the input device,
//! slices the take, then keeps running the engine (optionally sequenced) until
//! `--duration` elapses or Ctrl+C. Offline mode (`--render=out.wav` with
//! `--in=take.wav`) does the same against a file, sample-accurate and without
//! any audio hardware.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};
use slicebox_engine::{EngineConfig, EngineHandle, SliceEngine};
use tracing::{info, warn};

#[derive(Debug)]
struct Args {
    list_devices: bool,
    input_device: Option<String>,
    output_device: Option<String>,
    sample_rate: Option<u32>,
    capture_secs: f32,
    duration_secs: Option<u64>,
    seed: u64,
    render: Option<String>,
    input_file: Option<String>,

    sequencer: bool,
    bpm: Option<f32>,
    poly: Option<usize>,
    speed: Option<f32>,
    scan: Option<f32>,
    feedback: Option<f32>,
    grain_wet: Option<f32>,
    grain_chaos: bool,
    delay_wet: Option<f32>,
    delay_chaos: bool,
    reverb_wet: Option<f32>,
    reverb_chaos: bool,
    gain: f32,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            list_devices: false,
            input_device: None,
            output_device: None,
            sample_rate: None,
            capture_secs: 4.0,
            duration_secs: None,
            seed: 0x5EED_BA5E,
            render: None,
            input_file: None,
            sequencer: false,
            bpm: None,
            poly: None,
            speed: None,
            scan: None,
            feedback: None,
            grain_wet: None,
            grain_chaos: false,
            delay_wet: None,
            delay_chaos: false,
            reverb_wet: None,
            reverb_chaos: false,
            gain: 1.0,
        }
    }
}

fn parse_args() -> Args {
    let mut a = Args::default();
    for s in std::env::args().skip(1) {
        if s == "--list-devices" { a.list_devices = true; continue; }
        if s == "--sequencer"    { a.sequencer = true;    continue; }
        if s == "--grain-chaos"  { a.grain_chaos = true;  continue; }
        if s == "--delay-chaos"  { a.delay_chaos = true;  continue; }
        if s == "--reverb-chaos" { a.reverb_chaos = true; continue; }
        if let Some(rest) = s.strip_prefix("--input-device=")  { a.input_device  = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--output-device=") { a.output_device = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--sample-rate=")   { a.sample_rate   = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--capture=")       { if let Ok(v) = rest.parse() { a.capture_secs = v; } continue; }
        if let Some(rest) = s.strip_prefix("--duration=")      { a.duration_secs = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--seed=")          { if let Ok(v) = rest.parse() { a.seed = v; } continue; }
        if let Some(rest) = s.strip_prefix("--render=")        { a.render        = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--in=")            { a.input_file    = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--bpm=")           { a.bpm           = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--poly=")          { a.poly          = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--speed=")         { a.speed         = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--scan=")          { a.scan          = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--feedback=")      { a.feedback      = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--grain-wet=")     { a.grain_wet     = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--delay-wet=")     { a.delay_wet     = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--reverb-wet=")    { a.reverb_wet    = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--gain=")          { if let Ok(v) = rest.parse() { a.gain = v; } continue; }
        warn!(arg = %s, "unknown arg");
    }
    a
}

/// Push the one-shot performance flags into the engine.
fn apply_flags(h: &EngineHandle, args: &Args) {
    if let Some(v) = args.bpm        { h.set_bpm(v); }
    if let Some(v) = args.poly       { h.set_poly(v); }
    if let Some(v) = args.speed      { h.set_speed(v); }
    if let Some(v) = args.scan       { h.set_scan(v); }
    if let Some(v) = args.feedback   { h.set_feedback(v); }
    if let Some(v) = args.grain_wet  { h.set_grain_wet(v); }
    if let Some(v) = args.delay_wet  { h.set_delay_wet(v); }
    if let Some(v) = args.reverb_wet { h.set_reverb_wet(v); }
    h.set_grain_chaos(args.grain_chaos);
    h.set_delay_chaos(args.delay_chaos);
    h.set_reverb_chaos(args.reverb_chaos);
}

fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    println!("Input devices:");
    for dev in host.input_devices()? {
        println!("- {}", dev.name()?);
    }
    println!("Output devices:");
    for dev in host.output_devices()? {
        println!("- {}", dev.name()?);
    }
    Ok(())
}

fn pick_output(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device> {
    if let Some(name) = name {
        for d in host.output_devices()? {
            if d.name()? == name {
                return Ok(d);
            }
        }
        bail!("requested output device not found: {name}");
    }
    host.default_output_device()
        .ok_or_else(|| anyhow!("no default output device"))
}

fn pick_input(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device> {
    if let Some(name) = name {
        for d in host.input_devices()? {
            if d.name()? == name {
                return Ok(d);
            }
        }
        bail!("requested input device not found: {name}");
    }
    host.default_input_device()
        .ok_or_else(|| anyhow!("no default input device"))
}

fn choose_output_config(
    device: &cpal::Device,
    req_sr: Option<u32>,
) -> Result<cpal::SupportedStreamConfig> {
    // If nothing requested, default is already concrete.
    if req_sr.is_none() {
        return Ok(device.default_output_config()?);
    }

    // Pick a SupportedStreamConfigRange first, scoring by distance to the
    // requested rate (stereo preferred).
    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in device.supported_output_configs()? {
        let sr_min = range.min_sample_rate().0;
        let sr_max = range.max_sample_rate().0;
        let sr_pen = match req_sr {
            Some(sr) if (sr_min..=sr_max).contains(&sr) => 0,
            Some(sr) => sr_min.abs_diff(sr).min(sr_max.abs_diff(sr)) as u64,
            None => 0,
        };
        let ch_pen = (i64::from(range.channels()) - 2).unsigned_abs();
        let score = sr_pen.saturating_mul(1000) + ch_pen;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range));
        }
    }
    let (_, range) = best.ok_or_else(|| anyhow!("no supported output configs"))?;

    let pick_sr = match req_sr {
        Some(sr) => {
            let lo = range.min_sample_rate().0;
            let hi = range.max_sample_rate().0;
            cpal::SampleRate(sr.clamp(lo, hi))
        }
        None => range.max_sample_rate(),
    };
    Ok(range.with_sample_rate(pick_sr))
}

fn build_input_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    tx: Sender<(f32, f32)>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    use cpal::Sample as _;
    let channels = cfg.channels as usize;
    let err_fn = |e: cpal::StreamError| warn!(error = %e, "input stream error");
    let stream = device.build_input_stream(
        cfg,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for frame in data.chunks(channels.max(1)) {
                let l = frame.first().map_or(0.0, |v| f32::from_sample(*v));
                let r = frame.get(1).map_or(l, |v| f32::from_sample(*v));
                // Drop frames when the consumer is behind; never block here.
                let _ = tx.try_send((l, r));
            }
        },
        err_fn,
        None,
    )?;
    Ok(stream)
}

fn build_output_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut engine: SliceEngine,
    rx: Receiver<(f32, f32)>,
    gain: f32,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
{
    let channels = cfg.channels as usize;
    let max_frames = 8192usize;
    let mut in_l = vec![0.0f32; max_frames];
    let mut in_r = vec![0.0f32; max_frames];
    let mut out_l = vec![0.0f32; max_frames];
    let mut out_r = vec![0.0f32; max_frames];
    let err_fn = |e: cpal::StreamError| warn!(error = %e, "output stream error");

    let stream = device.build_output_stream(
        cfg,
        move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = output.len() / channels.max(1);
            if frames > in_l.len() {
                in_l.resize(frames, 0.0);
                in_r.resize(frames, 0.0);
                out_l.resize(frames, 0.0);
                out_r.resize(frames, 0.0);
            }
            for i in 0..frames {
                let (l, r) = rx.try_recv().unwrap_or((0.0, 0.0));
                in_l[i] = l;
                in_r[i] = r;
            }
            engine.process(&in_l[..frames], &in_r[..frames], &mut out_l[..frames], &mut out_r[..frames]);
            for (i, frame) in output.chunks_mut(channels.max(1)).enumerate() {
                let l = (out_l[i] * gain).clamp(-1.0, 1.0);
                let r = (out_r[i] * gain).clamp(-1.0, 1.0);
                for (ch, slot) in frame.iter_mut().enumerate() {
                    *slot = T::from_sample(if ch % 2 == 0 { l } else { r });
                }
            }
        },
        err_fn,
        None,
    )?;
    Ok(stream)
}

fn run_live(args: &Args) -> Result<()> {
    let host = cpal::default_host();
    let out_dev = pick_output(&host, args.output_device.as_deref())?;
    let in_dev = pick_input(&host, args.input_device.as_deref())?;

    let out_sup = choose_output_config(&out_dev, args.sample_rate)?;
    let sample_format = out_sup.sample_format();
    let out_cfg: cpal::StreamConfig = out_sup.config();
    let sr = out_cfg.sample_rate.0;

    let in_sup = in_dev.default_input_config()?;
    let in_format = in_sup.sample_format();
    let mut in_cfg: cpal::StreamConfig = in_sup.config();
    in_cfg.sample_rate = cpal::SampleRate(sr);

    let (engine, handle) = SliceEngine::new(EngineConfig {
        sample_rate: sr as f32,
        max_record_secs: 60.0,
        seed: args.seed,
    })?;
    apply_flags(&handle, args);

    info!(output = %out_dev.name()?, input = %in_dev.name()?, sample_rate = sr, "live mode");

    // Half a second of slack between the callbacks.
    let (tx, rx) = bounded::<(f32, f32)>(sr as usize / 2);

    let in_stream = match in_format {
        cpal::SampleFormat::F32 => build_input_stream::<f32>(&in_dev, &in_cfg, tx)?,
        cpal::SampleFormat::I16 => build_input_stream::<i16>(&in_dev, &in_cfg, tx)?,
        cpal::SampleFormat::U16 => build_input_stream::<u16>(&in_dev, &in_cfg, tx)?,
        other => bail!("unsupported input sample format: {other:?}"),
    };
    let out_stream = match sample_format {
        cpal::SampleFormat::F32 => build_output_stream::<f32>(&out_dev, &out_cfg, engine, rx, args.gain)?,
        cpal::SampleFormat::I16 => build_output_stream::<i16>(&out_dev, &out_cfg, engine, rx, args.gain)?,
        cpal::SampleFormat::U16 => build_output_stream::<u16>(&out_dev, &out_cfg, engine, rx, args.gain)?,
        other => bail!("unsupported output sample format: {other:?}"),
    };

    in_stream.play()?;
    out_stream.play()?;

    info!(secs = args.capture_secs, "capturing");
    handle.set_recording(true);
    std::thread::sleep(Duration::from_secs_f32(args.capture_secs));
    handle.set_recording(false);
    // Give the audio thread a moment to pick up the disarm and rescan.
    std::thread::sleep(Duration::from_millis(100));
    let st = handle.status();
    info!(slices = st.slice_count, buffer_full = st.buffer_full, "take sliced");

    if args.sequencer {
        handle.set_sequencer_enabled(true);
    }

    match args.duration_secs {
        Some(d) => std::thread::sleep(Duration::from_secs(d)),
        None => loop {
            std::thread::sleep(Duration::from_millis(500));
        },
    }
    Ok(())
}

fn read_wav_stereo(path: &str) -> Result<(u32, Vec<f32>, Vec<f32>)> {
    let mut reader = hound::WavReader::open(path).with_context(|| format!("opening {path}"))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<_, _>>()?
        }
    };

    let frames = interleaved.len() / channels;
    let mut l = Vec::with_capacity(frames);
    let mut r = Vec::with_capacity(frames);
    for frame in interleaved.chunks(channels) {
        let cl = frame[0];
        l.push(cl);
        r.push(*frame.get(1).unwrap_or(&cl));
    }
    Ok((spec.sample_rate, l, r))
}

fn run_render(args: &Args, out_path: &str) -> Result<()> {
    let in_path = args
        .input_file
        .as_deref()
        .ok_or_else(|| anyhow!("--render requires --in=FILE"))?;
    let (sr, src_l, src_r) = read_wav_stereo(in_path)?;

    let (mut engine, handle) = SliceEngine::new(EngineConfig {
        sample_rate: sr as f32,
        max_record_secs: 60.0,
        seed: args.seed,
    })?;
    apply_flags(&handle, args);

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: sr,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer =
        hound::WavWriter::create(out_path, spec).with_context(|| format!("creating {out_path}"))?;

    const BLOCK: usize = 512;
    let mut out_l = [0.0f32; BLOCK];
    let mut out_r = [0.0f32; BLOCK];
    let silence = [0.0f32; BLOCK];

    // Phase 1: capture the source file as the take.
    handle.set_recording(true);
    let mut pos = 0usize;
    while pos < src_l.len() {
        let n = BLOCK.min(src_l.len() - pos);
        engine.process(
            &src_l[pos..pos + n],
            &src_r[pos..pos + n],
            &mut out_l[..n],
            &mut out_r[..n],
        );
        for i in 0..n {
            writer.write_sample(out_l[i])?;
            writer.write_sample(out_r[i])?;
        }
        pos += n;
    }
    handle.set_recording(false);
    if args.sequencer {
        handle.set_sequencer_enabled(true);
    }

    // Phase 2: replay the sliced take over silence.
    let tail_secs = args.duration_secs.unwrap_or(8) as f32;
    let mut remaining = (tail_secs * sr as f32) as usize;
    while remaining > 0 {
        let n = BLOCK.min(remaining);
        engine.process(&silence[..n], &silence[..n], &mut out_l[..n], &mut out_r[..n]);
        for i in 0..n {
            writer.write_sample(out_l[i])?;
            writer.write_sample(out_r[i])?;
        }
        remaining -= n;
    }

    let st = handle.status();
    writer.finalize()?;
    info!(slices = st.slice_count, output = out_path, "render complete");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = parse_args();
    if args.list_devices {
        return list_devices();
    }
    match args.render.clone() {
        Some(out) => run_render(&args, &out),
        None => run_live(&args),
    }
}
