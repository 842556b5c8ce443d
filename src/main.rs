// CLI entry for color_growth
use anyhow::{bail, Result};
use clap::{ArgAction, Parser, ValueHint};
use color_growth::{Config, Generator, MAX_SIZE};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "color_growth", version, about = "Grows an image that uses every palette color exactly once")]
struct Cli {
    /// Canvas side length (palette holds size*size colors)
    #[arg(long = "size", default_value_t = MAX_SIZE)]
    size: u32,

    /// Stop after placing this many palette colors (default: all of them)
    #[arg(long = "run-to")]
    run_to: Option<usize>,

    /// Seed for the palette shuffle, for reproducible runs
    #[arg(long = "shuffle-seed")]
    shuffle_seed: Option<u64>,

    /// Seed pixel, repeatable. Format: X,Y (default: the grid center)
    #[arg(long = "seed")]
    seed: Vec<String>,

    /// Directory for periodic snapshots
    #[arg(long = "snapshot-dir", default_value = "output", value_hint = ValueHint::DirPath)]
    snapshot_dir: String,

    /// Disable periodic snapshots
    #[arg(long = "no-snapshots", action = ArgAction::SetTrue)]
    no_snapshots: bool,

    /// Final image path
    #[arg(value_hint = ValueHint::FilePath, default_value = "output/final.png")]
    output: String,
}

fn parse_seed(s: &str) -> Result<(u32, u32)> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() == 2 {
        let x: u32 = parts[0].trim().parse()?;
        let y: u32 = parts[1].trim().parse()?;
        return Ok((x, y));
    }
    bail!("invalid seed format (expected X,Y): {}", s)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = Config {
        size: cli.size,
        shuffle_seed: cli.shuffle_seed,
        snapshot_dir: PathBuf::from(&cli.snapshot_dir),
        snapshots: !cli.no_snapshots,
    };

    let mut generator = Generator::new(config)?;
    generator.shuffle();

    if cli.seed.is_empty() {
        let center = cli.size / 2;
        generator.seed(center, center, 0)?;
    } else {
        for (i, arg) in cli.seed.iter().enumerate() {
            let (x, y) = parse_seed(arg)?;
            generator.seed(x, y, i)?;
        }
    }

    let run_to = cli.run_to.unwrap_or(generator.palette().len());
    generator.place_to(run_to)?;

    let output = PathBuf::from(&cli.output);
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    generator.write(&output)?;
    generator.finish();

    Ok(())
}
