//! Document-wide font statistics.

use std::collections::BTreeMap;

use crate::model::TokenStream;

/// Font statistics for body size and heading detection.
#[derive(Debug, Clone, Default)]
pub struct FontStatistics {
    /// Body text font size (most common)
    pub body_size: f32,
    /// Font sizes larger than body (potential headings), largest first
    pub heading_sizes: Vec<f32>,
    /// Observed font sizes (tenths of a point) weighted by character count
    pub size_histogram: BTreeMap<i32, usize>,
}

impl FontStatistics {
    /// Collect statistics over every well-formed token of a stream.
    pub fn from_stream(stream: &TokenStream) -> Self {
        let mut stats = Self::default();
        for page in stream.pages() {
            for (index, token) in page.tokens.iter().enumerate() {
                if stream.is_malformed(page.token_id(index)) {
                    continue;
                }
                let weight = token.text.chars().filter(|c| !c.is_whitespace()).count();
                stats.add_size_weighted(token.font_size, weight.max(1));
            }
        }
        stats.analyze();
        log::debug!(
            "Font statistics: body={:.1}pt, heading sizes={:?}",
            stats.body_size,
            stats.heading_sizes
        );
        stats
    }

    /// Add a font size observation.
    pub fn add_size(&mut self, size: f32) {
        self.add_size_weighted(size, 1);
    }

    fn add_size_weighted(&mut self, size: f32, weight: usize) {
        if !size.is_finite() || size <= 0.0 {
            return;
        }
        let key = (size * 10.0).round() as i32;
        *self.size_histogram.entry(key).or_insert(0) += weight;
    }

    /// Calculate body size and heading sizes.
    pub fn analyze(&mut self) {
        // Ties go to the smaller size: iteration is ascending and only a
        // strictly larger count replaces the best.
        let mut best: Option<(i32, usize)> = None;
        for (&key, &count) in &self.size_histogram {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((key, count));
            }
        }
        let Some((body_key, _)) = best else {
            self.body_size = 12.0;
            self.heading_sizes.clear();
            return;
        };
        self.body_size = body_key as f32 / 10.0;

        let mut larger: Vec<f32> = self
            .size_histogram
            .keys()
            .map(|k| *k as f32 / 10.0)
            .filter(|size| *size > self.body_size + 0.5)
            .collect();
        larger.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        self.heading_sizes = larger;
    }

    /// Get heading level for a font size (1-6, or 0 for body text).
    ///
    /// `min_delta` is how much larger than body text a heading must be.
    pub fn heading_level(&self, font_size: f32, min_delta: f32) -> u8 {
        if font_size < self.body_size + min_delta {
            return 0;
        }

        for (i, &heading_size) in self.heading_sizes.iter().enumerate() {
            if font_size >= heading_size - 0.5 {
                return (i + 1).min(6) as u8;
            }
        }

        5
    }

    /// Difference between a size and the body size.
    pub fn delta(&self, font_size: f32) -> f32 {
        font_size - self.body_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ErrorMode;
    use crate::model::Token;

    #[test]
    fn test_body_size_is_most_common() {
        let mut stats = FontStatistics::default();
        for _ in 0..10 {
            stats.add_size(10.0);
        }
        stats.add_size(18.0);
        stats.add_size(14.0);
        stats.analyze();

        assert_eq!(stats.body_size, 10.0);
        assert_eq!(stats.heading_sizes, vec![18.0, 14.0]);
        assert_eq!(stats.heading_level(18.0, 1.5), 1);
        assert_eq!(stats.heading_level(14.0, 1.5), 2);
        assert_eq!(stats.heading_level(10.5, 1.5), 0);
    }

    #[test]
    fn test_empty_defaults() {
        let mut stats = FontStatistics::default();
        stats.analyze();
        assert_eq!(stats.body_size, 12.0);
        assert!(stats.heading_sizes.is_empty());
    }

    #[test]
    fn test_from_stream_weights_characters() {
        let tokens = vec![
            Token::new("Title", 1, 0.0, 0.0, 60.0, 20.0).with_font_size(20.0),
            Token::new("body", 1, 0.0, 30.0, 20.0, 40.0).with_font_size(10.0),
            Token::new("words", 1, 25.0, 30.0, 50.0, 40.0).with_font_size(10.0),
        ];
        let stream = TokenStream::from_tokens(tokens, ErrorMode::Strict).unwrap();
        let stats = FontStatistics::from_stream(&stream);
        assert_eq!(stats.body_size, 10.0);
        assert_eq!(stats.delta(8.0), -2.0);
    }
}
