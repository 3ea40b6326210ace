//! Block classification over the lines of a column.
//!
//! Classification is a small state machine over line features. A table
//! run starts only when two consecutive lines share aligned horizontal
//! gaps, so a single ragged line never flips the state on its own.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use super::markers;
use super::options::LayoutOptions;
use super::stats::FontStatistics;
use super::types::{Block, BlockKind, Gap, Line};

/// Line-level features the classifier works on.
#[derive(Debug, Clone, Default)]
pub struct LineFeatures {
    /// Horizontal whitespace runs wide enough to separate cells
    pub gaps: Vec<Gap>,
    /// Font size minus body size
    pub font_delta: f32,
    /// Predominantly bold
    pub bold: bool,
    /// Heading level implied by font size (0 = body)
    pub heading_level: u8,
    /// Opens a figure or table caption
    pub caption: bool,
    /// Leading bullet or number marker
    pub list_marker: bool,
    /// Leading bullet marker
    pub bullet: bool,
    /// Small font with a leading footnote marker
    pub footnote_marker: bool,
    /// Leading reference-list marker
    pub reference_marker: bool,
    /// Line text names a reference section
    pub references_title: bool,
    /// Blank lines between this line and the one above
    pub blank_above: usize,
}

/// Classifies the lines of one column into blocks.
pub struct BlockClassifier<'o> {
    options: &'o LayoutOptions,
    stats: &'o FontStatistics,
}

impl<'o> BlockClassifier<'o> {
    /// Create a new classifier.
    pub fn new(options: &'o LayoutOptions, stats: &'o FontStatistics) -> Self {
        Self { options, stats }
    }

    /// Classify the lines of a column into blocks, in reading order.
    pub fn classify<'a>(&self, lines: Vec<Line<'a>>) -> Vec<Block<'a>> {
        self.classify_lines(lines, true)
    }

    /// Run a block back through classification.
    ///
    /// A block that already failed table reconstruction never becomes a
    /// table candidate again, so demotion is stable.
    pub fn reclassify<'a>(&self, block: Block<'a>) -> Vec<Block<'a>> {
        if !block.demoted {
            return self.classify_lines(block.lines, true);
        }
        let mut blocks = self.classify_lines(block.lines, false);
        for b in &mut blocks {
            b.demoted = true;
        }
        blocks
    }

    /// Compute the features of each line, top to bottom.
    pub fn features(&self, lines: &[Line<'_>]) -> Vec<LineFeatures> {
        let mut in_references = false;
        lines
            .iter()
            .map(|line| {
                let mut f = self.line_features(line);
                if f.references_title {
                    in_references = true;
                } else if f.heading_level > 0 {
                    in_references = false;
                }
                if in_references && !f.reference_marker {
                    f.reference_marker = line
                        .first()
                        .and_then(|t| markers::reference_label(t.text()))
                        .is_some();
                }
                f
            })
            .collect()
    }

    fn line_features(&self, line: &Line<'_>) -> LineFeatures {
        let classifier = &self.options.classifier;
        let first = line.first().map(|t| t.text()).unwrap_or("");
        let text = line.text();
        let font_delta = self.stats.delta(line.font_size);
        let small = font_delta <= -classifier.footnote_size_delta;

        LineFeatures {
            gaps: line.gaps(classifier.min_cell_gap_factor * line.font_size),
            font_delta,
            bold: line.is_bold(),
            heading_level: self
                .stats
                .heading_level(line.font_size, classifier.heading_size_delta),
            caption: markers::is_caption(&text),
            list_marker: markers::is_list_marker(first),
            bullet: markers::is_bullet_marker(first),
            footnote_marker: small && markers::footnote_body_label(first).is_some(),
            reference_marker: first.starts_with('[') && markers::reference_label(first).is_some(),
            references_title: references_title_regex().is_match(text.trim()),
            blank_above: line.blank_lines_above(self.options.lines.line_gap_factor),
        }
    }

    fn classify_lines<'a>(&self, lines: Vec<Line<'a>>, allow_tables: bool) -> Vec<Block<'a>> {
        if lines.is_empty() {
            return Vec::new();
        }

        let features = self.features(&lines);
        let runs = if allow_tables {
            self.table_runs(&lines, &features)
        } else {
            Vec::new()
        };

        // Cut the column into text segments and table runs.
        let mut segments: Vec<(Range<usize>, bool)> = Vec::new();
        let mut cursor = 0;
        for run in runs {
            if run.start > cursor {
                segments.push((cursor..run.start, false));
            }
            cursor = run.end;
            segments.push((run, true));
        }
        if cursor < lines.len() {
            segments.push((cursor..lines.len(), false));
        }

        let mut slots: Vec<Option<Line<'a>>> = lines.into_iter().map(Some).collect();
        let mut blocks = Vec::new();
        for (range, is_table) in segments {
            let taken: Vec<Line<'a>> = range.clone().filter_map(|i| slots[i].take()).collect();
            if is_table {
                log::debug!(
                    "Table candidate: {} line(s) starting on page {}",
                    taken.len(),
                    taken.first().map(|l| l.page).unwrap_or(0)
                );
                blocks.push(Block::new(BlockKind::TableCandidate, taken));
            } else {
                blocks.extend(self.group_text(taken, &features[range]));
            }
        }
        blocks
    }

    /// Find runs of lines that look tabular.
    fn table_runs(&self, lines: &[Line<'_>], features: &[LineFeatures]) -> Vec<Range<usize>> {
        let mut runs = Vec::new();
        let mut floor = 0;
        let mut i = 0;

        while i + 1 < lines.len() {
            let Some(gutters) = self.trigger(lines, features, i) else {
                i += 1;
                continue;
            };

            let mut start = i;
            while start > floor {
                let prev = start - 1;
                if features[start].blank_above > 0
                    || self.blocks_table(&features[prev])
                    || !compatible(&lines[prev], &gutters)
                {
                    break;
                }
                start = prev;
            }

            let mut end = i + 2;
            let mut misses = 0;
            for k in i + 2..lines.len() {
                if features[k].blank_above > 1 || self.blocks_table(&features[k]) {
                    break;
                }
                if compatible(&lines[k], &gutters) {
                    misses = 0;
                    end = k + 1;
                } else {
                    misses += 1;
                    if misses >= 2 {
                        break;
                    }
                }
            }

            log::trace!(
                "Table run lines {}..{} with {} gutter(s)",
                start,
                end,
                gutters.len()
            );
            runs.push(start..end);
            floor = end;
            i = end;
        }
        runs
    }

    /// Shared gutters of lines `i` and `i + 1` if the pair starts a table.
    fn trigger(&self, lines: &[Line<'_>], features: &[LineFeatures], i: usize) -> Option<Vec<Gap>> {
        let (a, b) = (&features[i], &features[i + 1]);
        if b.blank_above > 1 || self.blocks_table(a) || self.blocks_table(b) {
            return None;
        }
        if a.gaps.is_empty() || b.gaps.is_empty() {
            return None;
        }

        let min_overlap = 0.5
            * self.options.classifier.min_cell_gap_factor
            * lines[i].font_size.min(lines[i + 1].font_size);
        let shared: Vec<Gap> = a
            .gaps
            .iter()
            .flat_map(|ga| b.gaps.iter().filter_map(move |gb| ga.intersect(gb)))
            .filter(|g| g.width() >= min_overlap)
            .collect();

        if shared.len() < self.options.classifier.min_shared_gaps.max(1) {
            return None;
        }
        // bullet and numbered lists look like two-column tables
        if a.bullet || b.bullet || (shared.len() == 1 && a.list_marker && b.list_marker) {
            log::trace!("Rejecting list-shaped table trigger at line {}", i);
            return None;
        }
        Some(shared)
    }

    fn blocks_table(&self, f: &LineFeatures) -> bool {
        f.heading_level > 0 || f.caption || f.footnote_marker
    }

    /// Group non-table lines into text blocks.
    fn group_text<'a>(&self, lines: Vec<Line<'a>>, features: &[LineFeatures]) -> Vec<Block<'a>> {
        if lines.is_empty() {
            return Vec::new();
        }

        let avg_spacing = avg_line_spacing(&lines);
        let mut groups: Vec<(Vec<Line<'a>>, usize)> = Vec::new();
        for (i, line) in lines.into_iter().enumerate() {
            let starts_new = match groups.last() {
                None => true,
                Some((current, first)) => {
                    let prev_index = i - 1;
                    let prev = current.last();
                    match prev {
                        Some(prev) => self.should_break(
                            prev,
                            &line,
                            &features[*first],
                            &features[prev_index],
                            &features[i],
                            avg_spacing,
                        ),
                        None => true,
                    }
                }
            };
            if starts_new {
                groups.push((vec![line], i));
            } else if let Some((current, _)) = groups.last_mut() {
                current.push(line);
            }
        }

        groups
            .into_iter()
            .map(|(group, first)| self.label(group, &features[first]))
            .collect()
    }

    fn should_break(
        &self,
        prev: &Line<'_>,
        curr: &Line<'_>,
        group_first: &LineFeatures,
        prev_f: &LineFeatures,
        curr_f: &LineFeatures,
        avg_spacing: f32,
    ) -> bool {
        let classifier = &self.options.classifier;

        // Wrapped headings stay together
        if curr_f.heading_level > 0 || prev_f.heading_level > 0 {
            return !(curr_f.heading_level == prev_f.heading_level && curr_f.blank_above == 0);
        }

        if curr_f.blank_above > 0 {
            return true;
        }

        // Each footnote or reference entry starts its own block
        if curr_f.footnote_marker || curr_f.reference_marker {
            return true;
        }
        if curr_f.caption {
            return true;
        }
        // a caption ends where body-sized text in a new style begins
        if group_first.caption && curr_f.bold != prev_f.bold {
            return true;
        }

        let spacing = (curr.baseline() - prev.baseline()).abs();
        if spacing > avg_spacing * classifier.paragraph_gap_factor {
            return true;
        }

        if (prev.font_size - curr.font_size).abs() > 1.0 {
            return true;
        }

        // First-line indent of a new paragraph
        curr.x0 - prev.x0 > classifier.indent_break_factor * curr.font_size
    }

    fn label<'a>(&self, lines: Vec<Line<'a>>, first: &LineFeatures) -> Block<'a> {
        let classifier = &self.options.classifier;

        if first.heading_level > 0 {
            let mut block = Block::new(BlockKind::Heading, lines);
            block.heading_level = first.heading_level;
            return block;
        }
        if first.caption {
            return Block::new(BlockKind::Caption, lines);
        }
        if first.footnote_marker {
            return Block::new(BlockKind::Footnote, lines);
        }
        if first.reference_marker {
            return Block::new(BlockKind::Reference, lines);
        }

        // A lone short bold line reads as a heading one level below the ladder
        if lines.len() == 1 && first.bold && !first.list_marker {
            let text = lines[0].text();
            let trimmed = text.trim_end();
            if lines[0].word_count() <= classifier.max_heading_words
                && !trimmed.ends_with(['.', ',', ';'])
            {
                let level = (self.stats.heading_sizes.len() + 1).min(6) as u8;
                let mut block = Block::new(BlockKind::Heading, lines);
                block.heading_level = level;
                return block;
            }
        }

        Block::new(BlockKind::Paragraph, lines)
    }
}

/// A line fits a table run when it reaches into none of the gutters.
fn compatible(line: &Line<'_>, gutters: &[Gap]) -> bool {
    !gutters.iter().any(|g| line.crosses(g))
}

/// Average baseline-to-baseline distance.
fn avg_line_spacing(lines: &[Line<'_>]) -> f32 {
    let spacings: Vec<f32> = lines
        .windows(2)
        .map(|w| (w[1].baseline() - w[0].baseline()).abs())
        .filter(|s| *s > 0.1)
        .collect();

    if spacings.is_empty() {
        return lines.first().map(|l| l.font_size * 1.2).unwrap_or(12.0);
    }
    spacings.iter().sum::<f32>() / spacings.len() as f32
}

fn references_title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?i)(?:\d+(?:\.\d+)*\.?\s+)?(?:references|bibliography|works cited|literature cited)\.?$",
        )
        .expect("static regex")
    })
}
