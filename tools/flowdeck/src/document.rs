use ratatui::style::{Color, Modifier};
use std::time::SystemTime;

/// Width policy of a block within its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Width {
    /// Exactly the natural width of the text.
    #[default]
    Fit,
    /// Stretch over the remaining row width.
    Fill,
    /// Truncate or pad to a fixed column count.
    Fixed(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinnerStyle {
    Dots,
    Star,
}

/// A live sub-component whose text is resolved at draw time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Live {
    Spinner {
        style: SpinnerStyle,
    },
    /// Elapsed-time watch: ticking while `ended_at` is None, frozen at the
    /// delta once it is set.
    Timer {
        started_at: SystemTime,
        ended_at: Option<SystemTime>,
    },
}

/// The smallest display unit: a styled run of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub text: String,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub modifier: Modifier,
    pub width: Width,
    pub live: Option<Live>,
}

impl Block {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fg: None,
            bg: None,
            modifier: Modifier::empty(),
            width: Width::Fit,
            live: None,
        }
    }

    /// A bold white-on-color label block.
    pub fn badge(text: impl Into<String>, bg: Color) -> Self {
        Self::text(text).fg(Color::White).bg(bg).bold()
    }

    pub fn spinner(style: SpinnerStyle) -> Self {
        let mut block = Self::text("");
        block.live = Some(Live::Spinner { style });
        block.modifier = Modifier::BOLD;
        block
    }

    pub fn timer(started_at: SystemTime, ended_at: Option<SystemTime>) -> Self {
        let mut block = Self::text("");
        block.live = Some(Live::Timer {
            started_at,
            ended_at,
        });
        block
    }

    pub fn fg(mut self, color: Color) -> Self {
        self.fg = Some(color);
        self
    }

    pub fn bg(mut self, color: Color) -> Self {
        self.bg = Some(color);
        self
    }

    pub fn bold(mut self) -> Self {
        self.modifier |= Modifier::BOLD;
        self
    }

    pub fn italic(mut self) -> Self {
        self.modifier |= Modifier::ITALIC;
        self
    }

    pub fn inverse(mut self) -> Self {
        self.modifier |= Modifier::REVERSED;
        self
    }

    pub fn fill(mut self) -> Self {
        self.width = Width::Fill;
        self
    }

    pub fn fixed(mut self, columns: u16) -> Self {
        self.width = Width::Fixed(columns);
        self
    }
}

/// Horizontal border decoration around a row.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Border {
    pub top: bool,
    pub bottom: bool,
    pub color: Option<Color>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub blocks: Vec<Block>,
    pub border: Option<Border>,
}

impl Row {
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            border: None,
        }
    }

    /// The readability spacer emitted after a routine's step rows.
    pub fn blank() -> Self {
        Self::from_blocks(vec![Block::text(" ")])
    }

    /// Static text of the row: block texts concatenated, live blocks empty.
    /// Meant for assertions, not for drawing.
    pub fn text_content(&self) -> String {
        self.blocks
            .iter()
            .map(|block| block.text.as_str())
            .collect()
    }
}

/// An ordered sequence of rows, pushed to the rendering surface as a whole.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub rows: Vec<Row>,
}

impl Document {
    pub fn text_lines(&self) -> Vec<String> {
        self.rows.iter().map(Row::text_content).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn badge_blocks_are_bold_white_on_background() {
        let block = Block::badge(" STEP ", Color::Green);
        assert_eq!(block.fg, Some(Color::White));
        assert_eq!(block.bg, Some(Color::Green));
        assert!(block.modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn text_content_skips_live_blocks() {
        let row = Row::from_blocks(vec![
            Block::text("a"),
            Block::spinner(SpinnerStyle::Dots),
            Block::text("b"),
        ]);
        assert_eq!(row.text_content(), "ab");
    }
}
