//! Column and reading-order resolution for a page.

use super::lines::group_by_baseline;
use super::options::ColumnOptions;
use super::types::{median, TokenRef, MAX_HISTOGRAM_BINS};

/// A vertical reading band of a page with its tokens.
#[derive(Debug, Clone)]
pub struct ReadingBand<'a> {
    /// Band index (0 = leftmost)
    pub index: usize,
    /// Left edge of the band's tokens
    pub x0: f32,
    /// Right edge of the band's tokens
    pub x1: f32,
    /// Tokens assigned to the band
    pub tokens: Vec<TokenRef<'a>>,
}

impl<'a> ReadingBand<'a> {
    fn from_tokens(tokens: Vec<TokenRef<'a>>) -> Self {
        let x0 = tokens.iter().map(|t| t.token.x0).fold(f32::INFINITY, f32::min);
        let x1 = tokens.iter().map(|t| t.token.x1).fold(f32::NEG_INFINITY, f32::max);
        Self {
            index: 0,
            x0,
            x1,
            tokens,
        }
    }

    fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }
}

/// Splits a page into reading columns at vertical gutters.
pub struct ColumnResolver<'o> {
    options: &'o ColumnOptions,
    baseline_tolerance: f32,
}

impl<'o> ColumnResolver<'o> {
    /// Create a new resolver.
    ///
    /// `baseline_tolerance` is used to estimate line lengths inside a band.
    pub fn new(options: &'o ColumnOptions, baseline_tolerance: f32) -> Self {
        Self {
            options,
            baseline_tolerance,
        }
    }

    /// Resolve the reading bands of a page, left to right.
    ///
    /// Falls back to a single band when no gutter is found.
    pub fn resolve<'a>(&self, page: u32, tokens: Vec<TokenRef<'a>>) -> Vec<ReadingBand<'a>> {
        if tokens.is_empty() {
            return Vec::new();
        }

        let gutters = self.find_gutters(&tokens);
        if gutters.is_empty() {
            log::debug!("Page {}: no gutter, single column", page);
            return vec![ReadingBand::from_tokens(tokens)];
        }

        // Split at gutter centers, assigning tokens by horizontal center.
        let cuts: Vec<f32> = gutters.iter().map(|(a, b)| (a + b) / 2.0).collect();
        let mut buckets: Vec<Vec<TokenRef<'a>>> = vec![Vec::new(); cuts.len() + 1];
        for token in tokens {
            let center = token.token.center_x();
            let slot = cuts.iter().take_while(|cut| center > **cut).count();
            buckets[slot].push(token);
        }
        let mut bands: Vec<ReadingBand<'a>> = buckets
            .into_iter()
            .filter(|b| !b.is_empty())
            .map(ReadingBand::from_tokens)
            .collect();

        self.merge_noise_bands(&mut bands);

        for (index, band) in bands.iter_mut().enumerate() {
            band.index = index;
        }
        log::debug!(
            "Page {}: {} column(s) {:?}",
            page,
            bands.len(),
            bands
                .iter()
                .map(|b| (b.x0.round(), b.x1.round(), b.tokens.len()))
                .collect::<Vec<_>>()
        );
        bands
    }

    /// Find runs of near-empty histogram bins wide enough to be gutters.
    fn find_gutters(&self, tokens: &[TokenRef<'_>]) -> Vec<(f32, f32)> {
        let min_x = tokens.iter().map(|t| t.token.x0).fold(f32::INFINITY, f32::min);
        let max_x = tokens.iter().map(|t| t.token.x1).fold(f32::NEG_INFINITY, f32::max);
        let extent = max_x - min_x;
        if extent <= 0.0 || !extent.is_finite() {
            return Vec::new();
        }

        let mut widths: Vec<f32> = tokens.iter().map(|t| t.token.width()).collect();
        let min_gutter = self.options.min_gutter_width.resolve(median(&mut widths));

        let bin = self
            .options
            .bin_width
            .max(extent / MAX_HISTOGRAM_BINS as f32);
        let bins = (extent / bin).ceil() as usize + 1;
        let mut histogram = vec![0usize; bins];
        for token in tokens {
            let start = ((token.token.x0 - min_x) / bin).floor() as usize;
            let end = (((token.token.x1 - min_x) / bin).ceil() as usize)
                .saturating_sub(1)
                .max(start);
            for slot in histogram.iter_mut().take(end.min(bins - 1) + 1).skip(start) {
                *slot += 1;
            }
        }

        let noise = (tokens.len() as f32 * self.options.gutter_noise_ratio).floor() as usize;
        let mut gutters = Vec::new();
        let mut run_start: Option<usize> = None;
        for (i, &count) in histogram.iter().enumerate() {
            let empty = count <= noise && i > 0 && i < bins - 1;
            match (empty, run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(start)) => {
                    let width = (i - start) as f32 * bin;
                    if width >= min_gutter {
                        gutters.push((min_x + start as f32 * bin, min_x + i as f32 * bin));
                    }
                    run_start = None;
                }
                _ => {}
            }
        }

        log::trace!(
            "Gutter search: extent={:.1}, min_gutter={:.1}, noise={}, found={}",
            extent,
            min_gutter,
            noise,
            gutters.len()
        );
        gutters
    }

    /// Merge bands too sparse, narrow or short-lined to be reading columns.
    fn merge_noise_bands(&self, bands: &mut Vec<ReadingBand<'_>>) {
        let total: usize = bands.iter().map(|b| b.tokens.len()).sum();
        let text_x0 = bands.iter().map(|b| b.x0).fold(f32::INFINITY, f32::min);
        let text_x1 = bands.iter().map(|b| b.x1).fold(f32::NEG_INFINITY, f32::max);
        let text_width = (text_x1 - text_x0).max(0.0);
        let min_tokens = self
            .options
            .min_band_tokens
            .max((total as f32 * self.options.min_band_token_ratio).ceil() as usize);

        while bands.len() > 1 {
            let weakest = bands
                .iter()
                .enumerate()
                .filter(|(_, b)| {
                    b.tokens.len() < min_tokens
                        || b.width() < text_width * self.options.min_band_width_ratio
                        || self.median_line_tokens(b) < self.options.min_line_tokens
                })
                .min_by_key(|(_, b)| b.tokens.len())
                .map(|(i, _)| i);

            let Some(i) = weakest else {
                break;
            };

            let target = match (i.checked_sub(1), bands.get(i + 1)) {
                (Some(left), Some(right)) => {
                    let to_left = bands[i].x0 - bands[left].x1;
                    let to_right = right.x0 - bands[i].x1;
                    if to_left <= to_right {
                        left
                    } else {
                        i + 1
                    }
                }
                (Some(left), None) => left,
                _ => i + 1,
            };

            let removed = bands.remove(i);
            let target = if target > i { target - 1 } else { target };
            log::debug!(
                "Merging column band of {} token(s) into neighbor",
                removed.tokens.len()
            );
            let mut tokens = std::mem::take(&mut bands[target].tokens);
            tokens.extend(removed.tokens);
            bands[target] = ReadingBand::from_tokens(tokens);
        }
    }

    fn median_line_tokens(&self, band: &ReadingBand<'_>) -> f32 {
        let groups = group_by_baseline(band.tokens.clone(), self.baseline_tolerance);
        let mut counts: Vec<f32> = groups.iter().map(|g| g.len() as f32).collect();
        median(&mut counts)
    }
}
