/*!
Jammer excision demo.

Synthesizes white noise, adds a CW jammer after the warm-up, runs it
through a notch filter, and reports how much of the jammer is left.

```text
cargo run --example jammed_tone -- -v 2 --jammer 20 --freq 1234
```
 */
use anyhow::Result;
use clap::Parser;
use log::warn;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use notchradio::blocks::*;
use notchradio::graph::{Graph, GraphRunner};
use notchradio::notch::NotchConfig;
use notchradio::{Complex, Float};

#[derive(clap::Parser, Debug)]
#[command(version, about)]
struct Opt {
    /// JSON config file. Command line options override it.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Segment length.
    #[arg(short = 'l', long)]
    segment_length: Option<usize>,

    /// Warm-up segments.
    #[arg(long)]
    warmup: Option<u64>,

    /// CFAR false alarm probability.
    #[arg(long)]
    pfa: Option<Float>,

    /// Notch pole radius.
    #[arg(long)]
    pole_radius: Option<Float>,

    /// Sample rate.
    #[arg(long, default_value = "48000")]
    samp_rate: Float,

    /// Jammer frequency.
    #[arg(long, default_value = "5000")]
    freq: Float,

    /// Jammer amplitude. Noise power is 1.
    #[arg(long = "jammer", default_value = "10")]
    amplitude: Float,

    /// Jammed samples, after warm-up.
    #[arg(long, default_value = "100000")]
    samples: usize,

    /// Random seed for the noise.
    #[arg(long, default_value = "1")]
    seed: u64,

    /// Verbosity of debug messages.
    #[arg(short, default_value = "0")]
    verbose: usize,
}

fn noise(seed: u64, n: usize) -> Vec<Complex> {
    let mut rng = StdRng::seed_from_u64(seed);
    let sigma = std::f64::consts::FRAC_1_SQRT_2;
    (0..n)
        .map(|_| {
            let u1: f64 = 1.0 - rng.random::<f64>();
            let u2: f64 = rng.random::<f64>();
            let r = (-2.0 * u1.ln()).sqrt() * sigma;
            let t = 2.0 * std::f64::consts::PI * u2;
            Complex::new((r * t.cos()) as Float, (r * t.sin()) as Float)
        })
        .collect()
}

fn power(s: &[Complex]) -> f64 {
    s.iter().map(|x| x.norm_sqr() as f64).sum::<f64>() / s.len().max(1) as f64
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    stderrlog::new()
        .module(module_path!())
        .module("notchradio")
        .quiet(false)
        .verbosity(opt.verbose)
        .timestamp(stderrlog::Timestamp::Second)
        .init()?;

    let mut config = match &opt.config {
        Some(path) => NotchConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => NotchConfig {
            warmup_segment_count: 100,
            ..NotchConfig::default()
        },
    };
    if let Some(l) = opt.segment_length {
        config.segment_length = l;
    }
    if let Some(w) = opt.warmup {
        config.warmup_segment_count = w;
    }
    if let Some(p) = opt.pfa {
        config.false_alarm_probability = p;
    }
    if let Some(c) = opt.pole_radius {
        config.pole_radius = c;
    }
    config.validate()?;

    let warmup = config.segment_length * config.warmup_segment_count as usize;
    let mut input = noise(opt.seed, warmup + opt.samples);
    let (jammer, _) = SignalSourceComplex::new(opt.samp_rate, opt.freq, opt.amplitude);
    for (s, j) in input[warmup..].iter_mut().zip(jammer) {
        *s += j;
    }

    let mut g = Graph::new();
    let (src, prev) = VectorSource::new(input.clone());
    let (notch, prev) = NotchFilter::new(prev, &config)?;
    let sink = VectorSink::new(prev, input.len());
    let hook = sink.hook();
    g.add(Box::new(src));
    g.add(Box::new(notch));
    g.add(Box::new(sink));

    let cancel = g.cancel_token();
    ctrlc::set_handler(move || {
        warn!("Got Ctrl-C");
        cancel.cancel();
    })?;
    g.run()?;

    let data = hook.data();
    let out = data.samples();
    // Skip the first jammed segments, while the notch settles.
    let settle = std::cmp::min(warmup + 4 * config.segment_length, out.len());
    let pin = power(&input[settle..out.len()]);
    let pout = power(&out[settle..]);
    println!("Input power:  {:8.2} dB", 10.0 * pin.log10());
    println!("Output power: {:8.2} dB", 10.0 * pout.log10());
    println!("Suppression:  {:8.2} dB", 10.0 * (pin / pout).log10());
    Ok(())
}
