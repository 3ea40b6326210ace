//! Line assembly within a layout column.

use super::options::LineOptions;
use super::types::{cmp_f32, Line, TokenRef};

/// Groups the tokens of one column into physical lines.
pub struct LineAssembler<'o> {
    options: &'o LineOptions,
}

impl<'o> LineAssembler<'o> {
    /// Create a new line assembler.
    pub fn new(options: &'o LineOptions) -> Self {
        Self { options }
    }

    /// Assemble lines top to bottom.
    ///
    /// Tokens whose baselines fall within `baseline_tolerance` of each
    /// other share a line. Groups made only of small raised or lowered
    /// tokens (superscripts, subscripts) are folded into the line they
    /// overlap.
    pub fn assemble<'a>(&self, page: u32, column: usize, tokens: Vec<TokenRef<'a>>) -> Vec<Line<'a>> {
        if tokens.is_empty() {
            return Vec::new();
        }

        let groups = group_by_baseline(tokens, self.options.baseline_tolerance);
        let groups = self.join_superscripts(groups);

        let mut lines: Vec<Line<'a>> = groups
            .into_iter()
            .map(|g| Line::from_tokens(g, page, column))
            .collect();
        lines.sort_by(|a, b| cmp_f32(a.baseline(), b.baseline()));

        for i in 1..lines.len() {
            let gap = (lines[i].y0 - lines[i - 1].y1).max(0.0);
            lines[i].gap_above = Some(gap);
        }

        log::trace!("Page {} column {}: {} lines", page, column, lines.len());
        lines
    }

    fn join_superscripts<'a>(&self, groups: Vec<Vec<TokenRef<'a>>>) -> Vec<Vec<TokenRef<'a>>> {
        let mut groups = groups;
        let mut i = 0;
        while i < groups.len() {
            if groups.len() < 2 {
                break;
            }
            let (y0, y1, font) = extent(&groups[i]);
            let mut best: Option<(usize, f32)> = None;
            for j in [i.wrapping_sub(1), i + 1] {
                let Some(neighbor) = groups.get(j) else {
                    continue;
                };
                let (ny0, ny1, nfont) = extent(neighbor);
                if font >= self.options.superscript_ratio * nfont {
                    continue;
                }
                let overlap = y1.min(ny1) - y0.max(ny0);
                if overlap > 0.0 && best.map_or(true, |(_, o)| overlap > o) {
                    best = Some((j, overlap));
                }
            }

            match best {
                Some((j, _)) => {
                    let moved = groups.remove(i);
                    let target = if j > i { j - 1 } else { j };
                    log::trace!("Joining {} superscript token(s) into neighbor line", moved.len());
                    groups[target].extend(moved);
                    // the merged group may now absorb another neighbor; restart from it
                    i = target;
                }
                None => i += 1,
            }
        }
        groups
    }
}

/// Group tokens by baseline, top to bottom.
pub(crate) fn group_by_baseline(mut tokens: Vec<TokenRef<'_>>, tolerance: f32) -> Vec<Vec<TokenRef<'_>>> {
    tokens.sort_by(|a, b| {
        cmp_f32(a.token.baseline(), b.token.baseline()).then(cmp_f32(a.token.x0, b.token.x0))
    });

    let mut groups: Vec<Vec<TokenRef<'_>>> = Vec::new();
    let mut current: Vec<TokenRef<'_>> = Vec::new();
    let mut anchor: Option<(f32, f32)> = None;

    for token in tokens {
        let baseline = token.token.baseline();
        match anchor {
            Some((y, size)) if (baseline - y).abs() <= tolerance * size.max(token.token.font_size) => {
                current.push(token);
            }
            _ => {
                if !current.is_empty() {
                    groups.push(std::mem::take(&mut current));
                }
                anchor = Some((baseline, token.token.font_size));
                current.push(token);
            }
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Vertical extent and largest font of a token group.
fn extent(group: &[TokenRef<'_>]) -> (f32, f32, f32) {
    let y0 = group.iter().map(|t| t.token.y0).fold(f32::INFINITY, f32::min);
    let y1 = group.iter().map(|t| t.token.y1).fold(f32::NEG_INFINITY, f32::max);
    let font = group.iter().map(|t| t.token.font_size).fold(0.0, f32::max);
    (y0, y1, font)
}
