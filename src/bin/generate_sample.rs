use std::f64::consts::PI;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use eeg_spectrograms::config::SAMPLE_RATE_HZ;
use eeg_spectrograms::data::matfile;
use ndarray::Array2;

/// Columns in a recording matrix; EEG electrodes occupy 3..=16.
const N_COLUMNS: usize = 25;
const EEG_COLUMNS: std::ops::RangeInclusive<usize> = 3..=16;

#[derive(Parser)]
#[command(about = "Write labeled synthetic EEG recordings as MAT-files")]
struct Args {
    /// Directory the recordings are written to
    #[arg(default_value = "data")]
    out_dir: PathBuf,

    /// Recordings per attention state
    #[arg(long, default_value_t = 2)]
    count: usize,

    /// Length of each recording in seconds
    #[arg(long, default_value_t = 120)]
    seconds: usize,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        mean + std_dev * z
    }
}

/// Dominant rhythm per state: beta when focused, alpha when unfocused, theta when drowsy.
const STATE_RHYTHMS: [(&str, f64, f64); 3] = [
    ("focused", 20.0, 8.0),
    ("unfocused", 10.0, 15.0),
    ("drowsy", 6.0, 25.0),
];

fn synthesize(n_samples: usize, freq: f64, amplitude: f64, rng: &mut SimpleRng) -> Array2<f64> {
    let mut data = Array2::zeros((n_samples, N_COLUMNS));
    let phases: Vec<f64> = (0..N_COLUMNS).map(|_| rng.next_f64() * 2.0 * PI).collect();

    for r in 0..n_samples {
        let t = r as f64 / SAMPLE_RATE_HZ;
        // Bookkeeping columns: sample counter and a constant marker.
        data[[r, 0]] = r as f64;
        data[[r, 2]] = 1.0;
        for c in EEG_COLUMNS {
            let rhythm = amplitude * (2.0 * PI * freq * t + phases[c]).sin();
            // 1/f-ish background: slow drift plus white noise
            let drift = 3.0 * (2.0 * PI * 0.5 * t + phases[c]).sin();
            data[[r, c]] = 4200.0 + rhythm + drift + rng.gauss(0.0, 4.0);
        }
        for c in EEG_COLUMNS.end() + 1..N_COLUMNS {
            data[[r, c]] = rng.gauss(0.0, 1.0);
        }
    }
    data
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = SimpleRng::new(42);
    let n_samples = args.seconds * SAMPLE_RATE_HZ as usize;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let mut record = 0;
    for &(state, freq, amplitude) in &STATE_RHYTHMS {
        for _ in 0..args.count {
            record += 1;
            let data = synthesize(n_samples, freq, amplitude, &mut rng);
            let path = args.out_dir.join(format!("eeg_record{record}_{state}.mat"));
            let file = std::fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            matfile::write_mat(
                std::io::BufWriter::new(file),
                &[matfile::recording_struct(&data, SAMPLE_RATE_HZ)],
                true,
            )
            .with_context(|| format!("writing {}", path.display()))?;
        }
    }

    println!(
        "Wrote {record} recordings ({n_samples} samples x {N_COLUMNS} columns each) to {}",
        args.out_dir.display()
    );
    Ok(())
}
