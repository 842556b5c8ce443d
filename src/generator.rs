use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use image::{Rgb, RgbImage};
use log::info;

use crate::octree::Octree;
use crate::points::{push_neighbors, ColorPoint, FrontierPoint, SpacePoint};
use crate::snapshot::SnapshotWriter;

/// Largest supported canvas side: the 24-bit color cube runs out beyond
/// 4096x4096 pixels.
pub const MAX_SIZE: u32 = 4096;

#[derive(Debug, Clone)]
pub struct Config {
    /// Canvas side length; the palette holds size*size colors.
    pub size: u32,
    /// Seed for the palette shuffle. None draws one from the system.
    pub shuffle_seed: Option<u64>,
    /// Where periodic snapshots land.
    pub snapshot_dir: PathBuf,
    /// Disable to skip snapshots entirely (tests, benchmarks).
    pub snapshots: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            size: MAX_SIZE,
            shuffle_seed: None,
            snapshot_dir: PathBuf::from("output"),
            snapshots: true,
        }
    }
}

/// Owns the palette, the written grid, the image buffer, and the frontier
/// index, and runs the placement loop over them.
pub struct Generator {
    size: u32,
    colors: Vec<ColorPoint>,
    shuffle_seed: Option<u64>,
    written: Vec<bool>,
    written_count: usize,
    image: RgbImage,
    index: Octree,
    snapshots: Option<SnapshotWriter>,
    current: usize,
    neighbor_scratch: Vec<SpacePoint>,
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("size", &self.size)
            .field("written_count", &self.written_count)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl Generator {
    pub fn new(config: Config) -> Result<Generator> {
        let Config { size, shuffle_seed, snapshot_dir, snapshots } = config;
        if size == 0 || size > MAX_SIZE {
            bail!("canvas size {size} is out of range (1..={MAX_SIZE})");
        }

        let snapshots = if snapshots {
            Some(SnapshotWriter::create(&snapshot_dir)?)
        } else {
            None
        };

        let pixels = size as usize * size as usize;
        Ok(Generator {
            size,
            colors: dense_palette(size),
            shuffle_seed,
            written: vec![false; pixels],
            written_count: 0,
            image: RgbImage::new(size, size),
            index: Octree::new(),
            snapshots,
            current: 0,
            neighbor_scratch: Vec::with_capacity(4),
        })
    }

    /// Fisher-Yates over the whole palette.
    pub fn shuffle(&mut self) {
        let mut rng = match self.shuffle_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        rng.shuffle(&mut self.colors);
        info!("palette shuffled ({} colors)", self.colors.len());
    }

    /// Places the palette entry `palette_index` at (x, y) as a starting
    /// pixel, swapping it up to the front of the remaining palette.
    pub fn seed(&mut self, x: u32, y: u32, palette_index: usize) -> Result<()> {
        if x >= self.size || y >= self.size {
            bail!("seed pixel {x},{y} is out of bounds");
        }
        if palette_index >= self.colors.len() {
            bail!("seed palette index {palette_index} is out of range");
        }
        if palette_index < self.current {
            bail!("seed palette index {palette_index} was already placed");
        }

        let space = SpacePoint::new(x, y, self.size);
        if self.written[space.hash as usize] {
            bail!("seed pixel {x},{y} was already written");
        }

        self.colors.swap(self.current, palette_index);
        let color = self.colors[self.current];
        self.place(space, color);

        // Any open candidates for the seeded pixel die with it.
        if self.index.has_position(space.hash) {
            self.index.remove(&FrontierPoint { space, color })?;
        }

        self.current += 1;
        info!("seeded {x},{y} with {color}");
        Ok(())
    }

    /// Seeds with a specific color instead of a palette index, searching
    /// the unplaced palette tail for it.
    pub fn seed_color(&mut self, x: u32, y: u32, color: ColorPoint) -> Result<()> {
        let index = self.colors[self.current..]
            .iter()
            .position(|&c| c == color)
            .with_context(|| format!("color {color} is not in the remaining palette"))?;
        self.seed(x, y, self.current + index)
    }

    /// Places palette entries up to (excluding) `n`: each one lands on the
    /// open position whose candidate color is nearest.
    pub fn place_to(&mut self, n: usize) -> Result<()> {
        if self.current == 0 {
            bail!("no seed pixel has been placed");
        }
        if n > self.colors.len() {
            bail!("run target {n} exceeds the palette ({})", self.colors.len());
        }

        let track_interval = 16 * self.size as usize;
        let snapshot_interval = 256 * self.size as usize;
        let mut last_track = Instant::now();

        for c in self.current..n {
            if c % track_interval == 0 {
                let dt = last_track.elapsed().as_secs_f64().max(1e-9);
                let rate = track_interval as f64 / dt;
                let open = self.index.open_positions();
                info!(
                    "row {} with {open} open ({rate:.0} px/sec, {:.0} px/sec/ln(open))",
                    c / self.size as usize,
                    rate / (open.max(2) as f64).ln(),
                );
                last_track = Instant::now();
            }
            if c % snapshot_interval == 0 {
                if let Some(writer) = &mut self.snapshots {
                    writer.capture(&self.image);
                }
            }

            let at = self.colors[c];
            let next = self.index.find_nearest(at)?;
            self.place(next.space, at);
            self.index.remove(&next)?;
            self.current = c + 1;
        }

        Ok(())
    }

    /// Writes the pixel, marks it, and opens its unwritten neighbors with
    /// the placed color as their candidate.
    fn place(&mut self, space: SpacePoint, color: ColorPoint) {
        self.image.put_pixel(space.x, space.y, Rgb([color.r, color.g, color.b]));
        self.written[space.hash as usize] = true;
        self.written_count += 1;

        let mut scratch = std::mem::take(&mut self.neighbor_scratch);
        push_neighbors(space, self.size, &mut scratch);
        for &neighbor in &scratch {
            if !self.written[neighbor.hash as usize] {
                self.index.add(FrontierPoint { space: neighbor, color });
            }
        }
        self.neighbor_scratch = scratch;
    }

    /// Final image write; a failure here is fatal to the run.
    pub fn write(&self, path: &Path) -> Result<()> {
        self.image
            .save(path)
            .with_context(|| format!("writing image to {}", path.display()))?;
        info!("image written to {}", path.display());
        Ok(())
    }

    /// Waits for outstanding snapshot writers.
    pub fn finish(&mut self) {
        if let Some(writer) = &mut self.snapshots {
            writer.finish();
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn palette(&self) -> &[ColorPoint] {
        &self.colors
    }

    pub fn open_points(&self) -> usize {
        self.index.open_positions()
    }

    pub fn written_pixels(&self) -> usize {
        self.written_count
    }

    pub fn is_written(&self, x: u32, y: u32) -> bool {
        self.written[(y * self.size + x) as usize]
    }

    pub fn pixel(&self, x: u32, y: u32) -> ColorPoint {
        let Rgb([r, g, b]) = *self.image.get_pixel(x, y);
        ColorPoint::new(r, g, b)
    }
}

/// The palette: the 24-bit RGB cube strided down to size*size entries.
/// At the full 4096 side the stride is 1 and every color appears.
fn dense_palette(size: u32) -> Vec<ColorPoint> {
    let total = size as usize * size as usize;
    let stride = (1usize << 24) / total;

    (0..total)
        .map(|i| {
            let v = i * stride;
            ColorPoint::new((v >> 16) as u8, (v >> 8) as u8, v as u8)
        })
        .collect()
}
