//! Block layout for the session progress display.
//!
//! Sessions up to two minutes are shown as 10-second blocks. Longer sessions
//! are shown as one block per minute, except the final minute which is split
//! back into 10-second blocks so the end of the session stays visible.

use serde::Serialize;

use super::progression::BLOCK_SECONDS;

const MINUTE_SECONDS: u32 = 60;
const MINUTE_LAYOUT_THRESHOLD: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Minute,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    Pending,
    Current,
    Filled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub kind: BlockKind,
    /// Offset of the block's first second.
    pub start: u32,
    /// Never extends past the end of the session.
    pub duration: u32,
    pub label: String,
}

impl Block {
    pub fn end(&self) -> u32 {
        self.start + self.duration
    }

    pub fn status(&self, elapsed: f64, total_seconds: u32) -> BlockStatus {
        let start = self.start as f64;
        let end = self.end() as f64;
        if elapsed >= end {
            BlockStatus::Filled
        } else if elapsed >= start && elapsed < (total_seconds as f64) {
            BlockStatus::Current
        } else {
            BlockStatus::Pending
        }
    }

    /// Fill level in `[0, 1]`.
    pub fn progress(&self, elapsed: f64, total_seconds: u32) -> f64 {
        match self.status(elapsed, total_seconds) {
            BlockStatus::Filled => 1.0,
            BlockStatus::Pending => 0.0,
            BlockStatus::Current if self.duration == 0 => 1.0,
            BlockStatus::Current => (elapsed - self.start as f64) / self.duration as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockLayout {
    total_seconds: u32,
    blocks: Vec<Block>,
}

impl BlockLayout {
    pub fn for_duration(total_seconds: u32) -> Self {
        let mut blocks = Vec::new();

        let second_blocks_from = if total_seconds > MINUTE_LAYOUT_THRESHOLD {
            let full_minutes = total_seconds / MINUTE_SECONDS;
            let minute_blocks = if total_seconds % MINUTE_SECONDS > 0 {
                full_minutes
            } else {
                full_minutes - 1
            };
            for i in 0..minute_blocks {
                blocks.push(Block {
                    kind: BlockKind::Minute,
                    start: i * MINUTE_SECONDS,
                    duration: MINUTE_SECONDS,
                    label: format!("{}m", i + 1),
                });
            }
            minute_blocks * MINUTE_SECONDS
        } else {
            0
        };

        let tail = total_seconds - second_blocks_from;
        for i in 0..tail.div_ceil(BLOCK_SECONDS) {
            let start = second_blocks_from + i * BLOCK_SECONDS;
            blocks.push(Block {
                kind: BlockKind::Second,
                start,
                duration: BLOCK_SECONDS.min(total_seconds - start),
                label: format!("{}s", (i + 1) * BLOCK_SECONDS),
            });
        }

        Self {
            total_seconds,
            blocks,
        }
    }

    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn uses_minute_blocks(&self) -> bool {
        self.total_seconds > MINUTE_LAYOUT_THRESHOLD
    }

    pub fn minute_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.kind == BlockKind::Minute)
    }

    pub fn second_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.kind == BlockKind::Second)
    }

    pub fn statuses(&self, elapsed: f64) -> Vec<BlockStatus> {
        self.blocks
            .iter()
            .map(|b| b.status(elapsed, self.total_seconds))
            .collect()
    }

    /// Human-readable position, e.g. "minute 2 of 4" or "final minute · block 3 of 6".
    pub fn status_label(&self, elapsed: f64) -> String {
        if elapsed >= self.total_seconds as f64 {
            return "session complete".to_string();
        }

        if self.uses_minute_blocks() {
            let minute_count = self.minute_blocks().count();
            let final_minute_start = (minute_count as u32 * MINUTE_SECONDS) as f64;
            if elapsed < final_minute_start {
                let index = (elapsed / MINUTE_SECONDS as f64).floor() as usize;
                format!("minute {} of {}", index + 1, minute_count)
            } else {
                let index =
                    ((elapsed - final_minute_start) / BLOCK_SECONDS as f64).floor() as usize;
                format!(
                    "final minute · block {} of {}",
                    index + 1,
                    self.second_blocks().count()
                )
            }
        } else {
            let index = (elapsed / BLOCK_SECONDS as f64).floor() as usize;
            format!("block {} of {}", index + 1, self.blocks.len())
        }
    }

    /// One glyph per block; the final-minute row is separated by `|`. The
    /// current block darkens once it is half full.
    pub fn render(&self, elapsed: f64) -> String {
        let mut out = String::new();
        let mut previous_kind = None;
        for block in &self.blocks {
            if previous_kind == Some(BlockKind::Minute) && block.kind == BlockKind::Second {
                out.push('|');
            }
            out.push(match block.status(elapsed, self.total_seconds) {
                BlockStatus::Filled => '█',
                BlockStatus::Current if block.progress(elapsed, self.total_seconds) < 0.5 => '░',
                BlockStatus::Current => '▒',
                BlockStatus::Pending => '·',
            });
            previous_kind = Some(block.kind);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(total: u32) -> (usize, usize) {
        let layout = BlockLayout::for_duration(total);
        (layout.minute_blocks().count(), layout.second_blocks().count())
    }

    #[test]
    fn short_sessions_use_ten_second_blocks() {
        assert_eq!(counts(10), (0, 1));
        assert_eq!(counts(60), (0, 6));
        assert_eq!(counts(61), (0, 7));
        assert_eq!(counts(120), (0, 12));
    }

    #[test]
    fn long_sessions_split_only_the_final_minute() {
        assert_eq!(counts(121), (2, 1));
        assert_eq!(counts(125), (2, 1));
        assert_eq!(counts(180), (2, 6));
        assert_eq!(counts(185), (3, 1));
    }

    #[test]
    fn final_partial_block_is_clamped_to_the_session_end() {
        let layout = BlockLayout::for_duration(125);
        let last = layout.blocks().last().unwrap();
        assert_eq!(last.start, 120);
        assert_eq!(last.end(), 125);
        assert_eq!(last.label, "10s");
        assert_eq!(last.status(125.0, 125), BlockStatus::Filled);
    }

    #[test]
    fn block_status_tracks_elapsed() {
        let layout = BlockLayout::for_duration(30);
        assert_eq!(
            layout.statuses(12.5),
            vec![BlockStatus::Filled, BlockStatus::Current, BlockStatus::Pending]
        );
        assert!((layout.blocks()[1].progress(12.5, 30) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn block_boundary_counts_as_filled() {
        let layout = BlockLayout::for_duration(30);
        assert_eq!(layout.blocks()[0].status(10.0, 30), BlockStatus::Filled);
        assert_eq!(layout.blocks()[1].status(10.0, 30), BlockStatus::Current);
    }

    #[test]
    fn labels_name_minutes_and_seconds() {
        let layout = BlockLayout::for_duration(130);
        let labels: Vec<_> = layout.blocks().iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["1m", "2m", "10s"]);
    }

    #[test]
    fn status_label_in_minute_layout() {
        let layout = BlockLayout::for_duration(180);
        assert_eq!(layout.status_label(30.0), "minute 1 of 2");
        assert_eq!(layout.status_label(125.0), "final minute · block 1 of 6");
        assert_eq!(layout.status_label(180.0), "session complete");
    }

    #[test]
    fn status_label_in_second_layout() {
        let layout = BlockLayout::for_duration(60);
        assert_eq!(layout.status_label(0.0), "block 1 of 6");
        assert_eq!(layout.status_label(59.9), "block 6 of 6");
    }

    #[test]
    fn render_separates_final_minute() {
        let layout = BlockLayout::for_duration(130);
        assert_eq!(layout.render(65.0), "█░|·");
    }

    #[test]
    fn current_block_glyph_shows_its_fill() {
        let layout = BlockLayout::for_duration(130);
        assert_eq!(layout.render(100.0), "█▒|·");
        assert_eq!(layout.render(130.0), "██|█");
    }
}
