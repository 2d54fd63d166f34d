use crate::cache::StepOutputCache;
use crate::document::{Block, Border, Document, Live, Row, SpinnerStyle, Width};
use crate::errors::FlowdeckError;
use crate::flatten::{RowItem, RoutineRowItem, StepRowItem, StrategyRowItem};
use crate::graph::WorkflowGraph;
use crate::status::Status;
use ratatui::backend::TestBackend;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::Paragraph;
use ratatui::Terminal;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const WORKFLOW_BADGE_BG: Color = Color::Blue;

const DOTS_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const STAR_FRAMES: [&str; 6] = ["✶", "✸", "✹", "✺", "✹", "✷"];

/// Badge color for a node status. Purely a function of the status value.
pub fn status_color(status: Status) -> Color {
    match status {
        Status::Idle => Color::DarkGray,
        Status::Running => Color::Yellow,
        Status::Success => Color::Green,
        Status::Failure => Color::Red,
        Status::Stopping => Color::LightRed,
        Status::Stopped => Color::Red,
    }
}

/// Aggregate badge color for a strategy group: success only when every
/// member succeeded, failure as soon as one member failed or was stopped.
pub fn strategy_color(strategy: &crate::graph::StrategyGraph) -> Color {
    if strategy.all_success() {
        Color::Green
    } else if strategy.any_failed() {
        Color::Red
    } else if strategy.any_active() {
        Color::LightYellow
    } else {
        Color::DarkGray
    }
}

fn spinner_for(status: Status) -> Option<Block> {
    match status {
        Status::Running => Some(Block::spinner(SpinnerStyle::Dots)),
        Status::Stopping => Some(Block::spinner(SpinnerStyle::Star)),
        _ => None,
    }
}

fn timer_block(started_at: Option<SystemTime>, ended_at: Option<SystemTime>) -> Block {
    match started_at {
        Some(started_at) => Block::timer(started_at, ended_at),
        None => Block::text("--"),
    }
}

fn push_level_badge(blocks: &mut Vec<Block>, number: usize, show: bool) {
    if show {
        blocks.push(Block::text(format!(" {number} ")).fg(Color::Gray).bold().inverse());
        blocks.push(Block::text(" "));
    }
}

/// Builds the full display document for one graph snapshot: the workflow
/// header followed by the flattened rows. Pure; reads the cache, writes
/// nothing.
pub fn render_document(
    graph: &WorkflowGraph,
    rows: &[RowItem],
    cache: &StepOutputCache,
) -> Document {
    let mut out = vec![header_row(graph)];

    for item in rows {
        match item {
            RowItem::Strategy(strategy) => out.push(strategy_row(strategy)),
            RowItem::Routine(routine) => out.push(routine_row(routine)),
            RowItem::Step(step) => {
                out.push(step_row(step));
                if let Some(extra) = step_output_row(step, cache) {
                    out.push(extra);
                }
            }
            RowItem::Separator => out.push(Row::blank()),
        }
    }

    Document { rows: out }
}

fn header_row(graph: &WorkflowGraph) -> Row {
    let mut blocks = vec![
        Block::badge(" WORKFLOW ", WORKFLOW_BADGE_BG),
        Block::text(" "),
    ];
    if let Some(spinner) = spinner_for(graph.status) {
        blocks.push(spinner);
    }
    blocks.push(Block::text(format!(" {} ", graph.name)).italic());
    blocks.push(timer_block(graph.started_at, graph.ended_at));
    blocks.push(Block::text(" ").fill());

    Row {
        blocks,
        border: Some(Border {
            top: true,
            bottom: true,
            color: Some(WORKFLOW_BADGE_BG),
        }),
    }
}

fn routine_row(item: &RoutineRowItem) -> Row {
    let mut blocks = Vec::new();
    let routine = &item.graph;

    if item.is_strategy_member {
        blocks.push(Block::text("  "));
        push_level_badge(&mut blocks, item.strategy_index, true);
    } else {
        push_level_badge(&mut blocks, item.level + 1, item.level_count > 1);
    }

    blocks.push(Block::badge(" ROUTINE ", status_color(routine.status)));
    if let Some(spinner) = spinner_for(routine.status) {
        blocks.push(Block::text(" "));
        blocks.push(spinner);
    }
    blocks.push(
        Block::text(format!(" {} ", routine.name))
            .fg(Color::Cyan)
            .bold(),
    );
    blocks.push(timer_block(routine.started_at, routine.ended_at));

    Row::from_blocks(blocks)
}

fn strategy_row(item: &StrategyRowItem) -> Row {
    let strategy = &item.graph;
    let mut blocks = Vec::new();
    push_level_badge(&mut blocks, item.level + 1, item.level_count > 1);

    blocks.push(Block::badge(" STRATEGY ", strategy_color(strategy)));
    blocks.push(Block::text(" "));
    if strategy.any_active() {
        blocks.push(Block::spinner(SpinnerStyle::Dots));
    }
    blocks.push(
        Block::text(format!(" {} ", strategy.name))
            .fg(Color::Magenta)
            .bold()
            .italic(),
    );

    match strategy.earliest_start() {
        Some(earliest) => {
            // Keep the watch ticking while any member still runs, even if
            // some members already carry end timestamps.
            let target = if strategy.any_active() {
                None
            } else {
                strategy.latest_end()
            };
            blocks.push(Block::timer(earliest, target));
        }
        None => blocks.push(Block::text("--")),
    }

    Row::from_blocks(blocks)
}

fn step_row(item: &StepRowItem) -> Row {
    let step = &item.graph;
    let mut blocks = vec![Block::text(" ".repeat(item.indent()))];

    push_level_badge(&mut blocks, item.index + 1, item.step_count > 1);
    blocks.push(Block::badge(" STEP ", status_color(step.status)));
    if let Some(spinner) = spinner_for(step.status) {
        blocks.push(Block::text(" "));
        blocks.push(spinner);
    }
    if let Some(name) = &step.name {
        blocks.push(Block::text(format!(" {name} ")));
    }
    blocks.push(Block::text(format!(" {} ", step.command)));
    blocks.push(timer_block(step.started_at, step.ended_at));

    Row::from_blocks(blocks)
}

/// The extra indented row under a running or failed step carrying its last
/// cached output line.
fn step_output_row(item: &StepRowItem, cache: &StepOutputCache) -> Option<Row> {
    if !matches!(item.graph.status, Status::Running | Status::Failure) {
        return None;
    }
    let output = cache.get(&item.routine_name, item.index)?;
    if output.is_empty() {
        return None;
    }

    let mut text = Block::text(output);
    if item.graph.status == Status::Failure {
        text = text.fg(Color::Red);
    }
    Some(Row::from_blocks(vec![
        Block::text(" ".repeat(item.indent() + 2)),
        text,
    ]))
}

/// Elapsed-time text of a timer block: frozen at the delta once ended,
/// otherwise ticking against `now`.
pub fn format_elapsed(started_at: SystemTime, ended_at: Option<SystemTime>, now: SystemTime) -> String {
    let end = ended_at.unwrap_or(now);
    let elapsed = end
        .duration_since(started_at)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    if elapsed < 60 {
        format!("{elapsed:02}s")
    } else if elapsed < 3_600 {
        format!("{}m{:02}s", elapsed / 60, elapsed % 60)
    } else {
        format!("{}h{:02}m", elapsed / 3_600, (elapsed % 3_600) / 60)
    }
}

/// Wall-clock HH:MM:SS (UTC) for announcement lines.
pub fn format_clock(at: SystemTime) -> String {
    let secs = at
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    let of_day = secs % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        of_day / 3_600,
        (of_day % 3_600) / 60,
        of_day % 60
    )
}

fn resolve_text(block: &Block, now: SystemTime, tick: usize) -> String {
    let text = match &block.live {
        None => block.text.clone(),
        Some(Live::Spinner { style }) => match style {
            SpinnerStyle::Dots => DOTS_FRAMES[tick % DOTS_FRAMES.len()].to_string(),
            SpinnerStyle::Star => STAR_FRAMES[tick % STAR_FRAMES.len()].to_string(),
        },
        Some(Live::Timer {
            started_at,
            ended_at,
        }) => format_elapsed(*started_at, *ended_at, now),
    };

    match block.width {
        Width::Fixed(columns) => {
            let columns = columns as usize;
            let mut fixed = text.chars().take(columns).collect::<String>();
            while fixed.chars().count() < columns {
                fixed.push(' ');
            }
            fixed
        }
        Width::Fit | Width::Fill => text,
    }
}

fn resolve_row(row: &Row, width: u16, now: SystemTime, tick: usize) -> Vec<Line<'static>> {
    let mut spans = Vec::new();
    let mut used = 0usize;
    let mut fill_slot = None;

    for block in &row.blocks {
        let text = resolve_text(block, now, tick);
        let mut style = Style::default().add_modifier(block.modifier);
        if let Some(fg) = block.fg {
            style = style.fg(fg);
        }
        if let Some(bg) = block.bg {
            style = style.bg(bg);
        }
        let span = Span::styled(text, style);
        // Display columns, not chars: CJK and some spinner glyphs are
        // double-width.
        used += span.width();
        if block.width == Width::Fill && fill_slot.is_none() {
            fill_slot = Some(spans.len());
        }
        spans.push(span);
    }

    // Stretch the first fill block over the remaining row width.
    if let Some(slot) = fill_slot {
        let remaining = (width as usize).saturating_sub(used);
        if remaining > 0 {
            let span: &mut Span = &mut spans[slot];
            let padded = format!("{}{}", span.content, " ".repeat(remaining));
            span.content = padded.into();
        }
    }

    let mut lines = Vec::new();
    if let Some(border) = row.border {
        if border.top {
            lines.push(border_line(border, width));
        }
    }
    lines.push(Line::from(spans));
    if let Some(border) = row.border {
        if border.bottom {
            lines.push(border_line(border, width));
        }
    }
    lines
}

fn border_line(border: Border, width: u16) -> Line<'static> {
    let mut style = Style::default();
    if let Some(color) = border.color {
        style = style.fg(color);
    }
    Line::from(Span::styled("┄".repeat(width as usize), style))
}

/// Rasterizes documents to a plain-text frame through a ratatui test
/// backend, resolving live blocks against the given instant and spinner
/// tick. The production surface and the tests share this path.
pub fn render_frame(
    documents: &[&Document],
    width: u16,
    now: SystemTime,
    tick: usize,
) -> Result<String, FlowdeckError> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for document in documents {
        for row in &document.rows {
            lines.extend(resolve_row(row, width, now, tick));
        }
    }
    let height = (lines.len() as u16).max(1);

    let backend = TestBackend::new(width, height);
    let mut terminal =
        Terminal::new(backend).map_err(|e| FlowdeckError::Surface(e.to_string()))?;
    terminal
        .draw(|frame| {
            frame.render_widget(Paragraph::new(Text::from(lines.clone())), frame.area());
        })
        .map_err(|e| FlowdeckError::Surface(e.to_string()))?;

    let buffer = terminal.backend().buffer().clone();
    let mut out = String::new();
    for y in 0..height {
        for x in 0..width {
            match buffer.cell((x, y)) {
                Some(cell) => out.push_str(cell.symbol()),
                None => out.push(' '),
            }
        }
        out.push('\n');
    }
    Ok(out)
}
