use std::collections::{BTreeMap, HashMap};

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

use canvas_core::models::Pixel;

// see https://www.kaggle.com/andyxie/k-means-clustering-implementation-in-python
// see https://en.wikipedia.org/wiki/Color_difference

pub const MAX_PALETTE_SIZE: usize = 256;

// fixed seed, so the same frame always gets the same palette
const CLUSTERING_SEED: u64 = 0x4749_4638_3961;
const CLUSTERING_MIN_ERROR: u32 = 1;
const CLUSTERING_MIN_ITERATIONS: usize = 10;
const CLUSTERING_MAX_ITERATIONS: usize = 100;

type Rgb = (u8, u8, u8);

/// Reduces a frame to at most 256 colors and maps colors onto that palette.
pub struct Quantizer {
    sample: usize,
    max_colors: usize,
    colors: Vec<Pixel>,
    used: Vec<bool>,
    lookup_cache: HashMap<Rgb, u8>,
}

impl Quantizer {

    /// `sample` is the stride over pixels while gathering color statistics, 1 looks at every pixel.
    pub fn new(sample: u32, max_colors: usize) -> Self {
        Quantizer {
            sample: sample.max(1) as usize,
            max_colors: max_colors.max(2).min(MAX_PALETTE_SIZE),
            colors: Vec::new(),
            used: Vec::new(),
            lookup_cache: HashMap::new(),
        }
    }

    /// Builds the palette from rgb triplets. The result is padded with black to a power of two.
    /// Every pixel counts when the colors fit as they are, the stride only thins out clustering input.
    pub fn build_palette(&mut self, pixels: &[u8]) -> &[Pixel] {
        let histogram = sample_histogram(pixels, 1);
        debug!("{} distinct colors in {} pixels", histogram.len(), pixels.len() / 3);

        let mut colors: Vec<Pixel> = if histogram.len() <= self.max_colors {
            histogram.keys().map(|v| Pixel::from_rgb(v.0, v.1, v.2)).collect()
        } else {
            let sampled = sample_histogram(pixels, self.sample);
            debug!("{} distinct colors sampled with stride {}", sampled.len(), self.sample);

            // a sparse sample may see fewer colors than clusters, then every pixel counts
            let statistics = if sampled.len() > self.max_colors {
                &sampled
            } else {
                &histogram
            };

            info!("reducing {} colors to {}", statistics.len(), self.max_colors);
            cluster(
                statistics,
                self.max_colors,
                CLUSTERING_MIN_ERROR,
                CLUSTERING_MIN_ITERATIONS,
                CLUSTERING_MAX_ITERATIONS,
            )
        };

        let target_size = colors.len().max(2).next_power_of_two().min(MAX_PALETTE_SIZE);
        while colors.len() < target_size {
            colors.push(Pixel::black());
        }

        self.used = vec![false; colors.len()];
        self.lookup_cache.clear();
        self.colors = colors;

        &self.colors
    }

    /// Drops cached lookups, "used" marks stay. Called between frames to keep the cache small.
    pub fn forget_lookups(&mut self) {
        trace!("forgetting {} cached lookups", self.lookup_cache.len());
        self.lookup_cache.clear();
    }

    #[cfg(test)]
    pub(crate) fn cached_lookups(&self) -> usize {
        self.lookup_cache.len()
    }

    pub fn palette(&self) -> &[Pixel] {
        &self.colors
    }

    pub fn is_used(&self, index: usize) -> bool {
        self.used.get(index).copied().unwrap_or(false)
    }

    /// Nearest palette entry by squared euclidean distance, lowest index wins ties.
    /// The entry returned is marked as used.
    pub fn lookup_index(&mut self, red: u8, green: u8, blue: u8) -> Option<u8> {
        if let Some(index) = self.lookup_cache.get(&(red, green, blue)) {
            return Some(*index);
        }

        let mut closest = None;
        let mut closest_distance = u32::MAX;

        for (index, color) in self.colors.iter().enumerate() {
            let distance = distance_squared((red, green, blue), (color.red, color.green, color.blue));
            if distance < closest_distance {
                closest_distance = distance;
                closest = Some(index);
            }
        }

        let index = closest? as u8;
        self.used[index as usize] = true;
        self.lookup_cache.insert((red, green, blue), index);

        Some(index)
    }

    /// Like `lookup_index` for a 0xRRGGBB color, but only entries some pixel was mapped to qualify.
    pub fn closest_to(&self, color: u32) -> Option<u8> {
        if self.colors.is_empty() {
            return None;
        }

        let target = Pixel::from_hex_rgb(color);
        let target = (target.red, target.green, target.blue);

        let mut closest = 0;
        let mut closest_distance = 256 * 256 * 256;

        for (index, color) in self.colors.iter().enumerate() {
            let distance = distance_squared(target, (color.red, color.green, color.blue));
            if self.used[index] && distance < closest_distance {
                closest_distance = distance;
                closest = index;
            }
        }

        Some(closest as u8)
    }
}

fn sample_histogram(pixels: &[u8], sample: usize) -> BTreeMap<Rgb, u32> {
    let mut histogram = BTreeMap::new();

    for pixel in pixels.chunks_exact(3).step_by(sample) {
        *histogram.entry((pixel[0], pixel[1], pixel[2])).or_insert(0) += 1;
    }

    histogram
}

// simple weighted kmeans over distinct colors, it is okay for our purposes
fn cluster(histogram: &BTreeMap<Rgb, u32>, total_clusters: usize, min_error: u32, min_iterations: usize, max_iterations: usize) -> Vec<Pixel> {
    if histogram.is_empty() {
        return Vec::new();
    }

    let colors: Vec<(Rgb, u64)> = histogram.iter().map(|(color, count)| (*color, *count as u64)).collect();

    let mut rng = StdRng::seed_from_u64(CLUSTERING_SEED);
    let mean = mean_pixel(&colors);
    let std_dev = std_pixel(&colors, mean);

    let mut centers: Vec<Rgb> = (0..total_clusters)
        .map(|_| random_center(&mut rng, mean, std_dev))
        .collect();

    let mut error = u32::MAX;
    let mut iteration = 0;

    while (error > min_error && iteration < max_iterations) || iteration < min_iterations {
        // sum of all point coordinates inside cluster, weighted by how often the color occurs
        let mut cluster_sums = vec![(0u64, 0u64, 0u64, 0u64); total_clusters];

        for &(color, count) in &colors {
            let closest = closest_center(&centers, color);

            let prev = cluster_sums[closest];
            cluster_sums[closest] = (
                prev.0 + color.0 as u64 * count,
                prev.1 + color.1 as u64 * count,
                prev.2 + color.2 as u64 * count,
                prev.3 + count,
            );
        }

        let centers_old = centers.clone();
        let mut sum: u32 = 0;

        for cluster in 0..total_clusters {
            let entry = cluster_sums[cluster];
            if entry.3 == 0 {
                // empty cluster is thrown somewhere else and does not count towards the error
                centers[cluster] = random_center(&mut rng, mean, std_dev);
                continue;
            }

            centers[cluster] = ((entry.0 / entry.3) as u8, (entry.1 / entry.3) as u8, (entry.2 / entry.3) as u8);
            sum = sum.saturating_add(distance_squared(centers_old[cluster], centers[cluster]));
        }

        error = sum;
        iteration += 1;
    }

    trace!("clustering finished after {} iterations, error {}", iteration, error);

    centers.iter()
        .map(|v| Pixel::from_rgb(v.0, v.1, v.2))
        .collect()
}

fn closest_center(centers: &[Rgb], color: Rgb) -> usize {
    let mut closest = 0;
    let mut closest_distance = i32::MAX;

    for (cluster, center) in centers.iter().enumerate() {
        let distance = distance_weighted(color, *center);

        if distance < closest_distance {
            closest_distance = distance;
            closest = cluster;
        }
    }

    closest
}

fn distance_squared(a: Rgb, b: Rgb) -> u32 {
    let dr = a.0 as i32 - b.0 as i32;
    let dg = a.1 as i32 - b.1 as i32;
    let db = a.2 as i32 - b.2 as i32;

    (dr * dr + dg * dg + db * db) as u32
}

// "redmean" approximation, closer to perceived difference than plain euclidean
fn distance_weighted(a: Rgb, b: Rgb) -> i32 {
    let drp2 = (a.0 as i32 - b.0 as i32).pow(2);
    let dgp2 = (a.1 as i32 - b.1 as i32).pow(2);
    let dbp2 = (a.2 as i32 - b.2 as i32).pow(2);

    let t = (a.0 as i32 + b.0 as i32) / 2;

    2 * drp2 + 4 * dgp2 + 3 * dbp2 + t * (drp2 - dbp2) / 256
}

fn random_center(rng: &mut StdRng, mean: (f64, f64, f64), std_dev: (f64, f64, f64)) -> Rgb {
    let r: f64 = rng.sample(StandardNormal);
    let g: f64 = rng.sample(StandardNormal);
    let b: f64 = rng.sample(StandardNormal);

    // float to int casts saturate, so anything outside of 0..255 lands on the edge
    (
        (r * std_dev.0 + mean.0) as u8,
        (g * std_dev.1 + mean.1) as u8,
        (b * std_dev.2 + mean.2) as u8,
    )
}

// like np.mean, but for weighted colors!
fn mean_pixel(colors: &[(Rgb, u64)]) -> (f64, f64, f64) {
    let total: f64 = colors.iter().map(|v| v.1 as f64).sum();
    let sum = colors.iter()
        .map(|(color, count)| (
            color.0 as f64 * *count as f64,
            color.1 as f64 * *count as f64,
            color.2 as f64 * *count as f64,
        ))
        .fold((0.0, 0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2));

    (sum.0 / total, sum.1 / total, sum.2 / total)
}

// like np.std, but for weighted colors!
fn std_pixel(colors: &[(Rgb, u64)], mean: (f64, f64, f64)) -> (f64, f64, f64) {
    let total: f64 = colors.iter().map(|v| v.1 as f64).sum();
    let sum = colors.iter()
        .map(|(color, count)| (
            (color.0 as f64 - mean.0).powi(2) * *count as f64,
            (color.1 as f64 - mean.1).powi(2) * *count as f64,
            (color.2 as f64 - mean.2).powi(2) * *count as f64,
        ))
        .fold((0.0, 0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2));

    ((sum.0 / total).sqrt(), (sum.1 / total).sqrt(), (sum.2 / total).sqrt())
}
