//! Ratatui panels for the chain view: header, playback bar, chain table, OI-change chart and footer

use chainview::{
    ChainView, DetailGraph, Highlight, MetricKind, Mode, OptionMetrics, PlaybackState,
    RenderedChain, RenderedRow, Side, Theme, Trend, TrendKey, Zoom,
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, Gauge, GraphType, Paragraph, Row, Table},
};

// ============================================================================
// COLORS
// ============================================================================
const C_BUY: Color = Color::Rgb(100, 220, 100); // Green
const C_SELL: Color = Color::Rgb(220, 100, 100); // Red
const C_DIM: Color = Color::Rgb(120, 120, 120); // Gray
const C_ACCENT: Color = Color::Rgb(100, 180, 220); // Cyan
const C_HEADER: Color = Color::Rgb(180, 130, 220); // Purple
const C_PRIMARY: Color = Color::Rgb(240, 190, 60); // Amber

const HEADER_HEIGHT: u16 = 3;
const PLAYBACK_HEIGHT: u16 = 3;
const FOOTER_HEIGHT: u16 = 1;
const CHART_HEIGHT: u16 = 14;
/// Table borders plus the column header row.
const TABLE_CHROME: u16 = 3;

/// Theme-dependent colours.
struct Palette {
    bg: Color,
    fg: Color,
    itm_bg: Color,
    atm_bg: Color,
    focus_bg: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                bg: Color::Rgb(18, 18, 24),
                fg: Color::Rgb(220, 220, 220),
                itm_bg: Color::Rgb(42, 40, 22),
                atm_bg: Color::Rgb(28, 52, 74),
                focus_bg: Color::Rgb(40, 40, 56),
            },
            Theme::Light => Self {
                bg: Color::Rgb(246, 246, 240),
                fg: Color::Rgb(30, 30, 30),
                itm_bg: Color::Rgb(255, 246, 214),
                atm_bg: Color::Rgb(200, 224, 246),
                focus_bg: Color::Rgb(226, 226, 236),
            },
        }
    }
}

/// Screen regions, shared by [`render`] and [`table_rows`].
struct Areas {
    header: Rect,
    playback: Rect,
    table: Rect,
    chart: Option<Rect>,
    footer: Rect,
}

fn layout(area: Rect, graph_open: bool) -> Areas {
    let mut constraints = vec![
        Constraint::Length(HEADER_HEIGHT),
        Constraint::Length(PLAYBACK_HEIGHT),
        Constraint::Min(TABLE_CHROME + 1),
    ];
    if graph_open {
        constraints.push(Constraint::Length(CHART_HEIGHT));
    }
    constraints.push(Constraint::Length(FOOTER_HEIGHT));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    Areas {
        header: chunks[0],
        playback: chunks[1],
        table: chunks[2],
        chart: graph_open.then(|| chunks[3]),
        footer: chunks[chunks.len() - 1],
    }
}

/// Number of table rows visible in `area`.
pub fn table_rows(area: Rect, graph_open: bool) -> f64 {
    f64::from(layout(area, graph_open).table.height.saturating_sub(TABLE_CHROME))
}

pub fn render(f: &mut Frame, view: &ChainView<'_>) {
    let palette = Palette::for_theme(view.theme);
    let areas = layout(f.area(), view.graph.is_some());

    f.render_widget(
        Block::default().style(Style::default().bg(palette.bg).fg(palette.fg)),
        f.area(),
    );

    render_header_panel(f, areas.header, view);
    render_playback_panel(f, areas.playback, view);
    render_chain_panel(f, areas.table, view, &palette);
    if let (Some(area), Some(graph)) = (areas.chart, view.graph) {
        render_graph_panel(f, area, graph);
    }
    render_footer(f, areas.footer, view);
}

fn render_header_panel(f: &mut Frame, area: Rect, view: &ChainView<'_>) {
    let header = view.header;
    let change_color = if header.change >= 0.0 { C_BUY } else { C_SELL };
    let arrow = if header.change >= 0.0 { "▲" } else { "▼" };
    let mode = match view.mode {
        Mode::Live => Span::styled(" LIVE ", Style::default().fg(C_BUY).add_modifier(Modifier::BOLD)),
        Mode::Historical(date) => Span::styled(
            format!(" HISTORICAL {} ", date.format("%d-%b-%Y")),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        ),
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", header.symbol),
            Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format_price(header.spot_price),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}{:+.2} ({:+.2}%)", arrow, header.change, header.percent_change),
            Style::default().fg(change_color),
        ),
        Span::styled("   Expiry ", Style::default().fg(C_DIM)),
        Span::raw(view.expiry.label()),
        Span::raw("   "),
        mode,
    ]);

    let block = Block::default()
        .title(" OPTION CHAIN ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_HEADER));
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn render_playback_panel(f: &mut Frame, area: Rect, view: &ChainView<'_>) {
    let scrubber = view.scrubber;
    let block = Block::default()
        .title(" PLAYBACK ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_DIM));

    if view.mode == Mode::Live {
        let hint = Paragraph::new(Line::from(Span::styled(
            "live feed - press h for the historical session or space to play it",
            Style::default().fg(C_DIM),
        )))
        .block(block);
        f.render_widget(hint, area);
        return;
    }

    let state_color = match scrubber.state() {
        PlaybackState::Playing => C_BUY,
        PlaybackState::Paused => C_PRIMARY,
        PlaybackState::Stopped => C_DIM,
    };
    let label = format!(
        "{}  {}  minute {}/{}  {}x",
        scrubber.state(),
        scrubber.time_label(),
        scrubber.minute(),
        scrubber.last_minute(),
        scrubber.speed()
    );
    let ratio = scrubber.minute() as f64 / scrubber.last_minute().max(1) as f64;
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(state_color).bg(Color::Black))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(label);
    f.render_widget(gauge, area);
}

// ============================================================================
// CHAIN TABLE
// ============================================================================

/// One leg column of the chain table.
#[derive(Clone, Copy)]
enum Column {
    Iv,
    Delta,
    Gamma,
    Theta,
    Vega,
    Ltp,
    Ranked(MetricKind),
}

const CALL_COLUMNS: [Column; 9] = [
    Column::Iv,
    Column::Delta,
    Column::Gamma,
    Column::Theta,
    Column::Vega,
    Column::Ltp,
    Column::Ranked(MetricKind::OpenInterestChange),
    Column::Ranked(MetricKind::OpenInterest),
    Column::Ranked(MetricKind::Volume),
];

const PUT_COLUMNS: [Column; 9] = [
    Column::Ranked(MetricKind::Volume),
    Column::Ranked(MetricKind::OpenInterest),
    Column::Ranked(MetricKind::OpenInterestChange),
    Column::Ltp,
    Column::Vega,
    Column::Theta,
    Column::Gamma,
    Column::Delta,
    Column::Iv,
];

const STRIKE_WIDTH: u16 = 9;

impl Column {
    fn title(&self) -> String {
        match self {
            Column::Iv => "IV".to_string(),
            Column::Delta => "Delta".to_string(),
            Column::Gamma => "Gamma".to_string(),
            Column::Theta => "Theta".to_string(),
            Column::Vega => "Vega".to_string(),
            Column::Ltp => "LTP".to_string(),
            Column::Ranked(kind) => kind.to_string(),
        }
    }

    fn width(&self) -> u16 {
        match self {
            Column::Iv | Column::Delta | Column::Gamma | Column::Theta | Column::Vega => 7,
            Column::Ltp => 9,
            Column::Ranked(_) => 14,
        }
    }

    fn text(&self, metrics: &OptionMetrics) -> String {
        match self {
            Column::Iv => format!("{:.1}%", metrics.iv),
            Column::Delta => format!("{:.3}", metrics.delta),
            Column::Gamma => format!("{:.4}", metrics.gamma),
            Column::Theta => format!("{:.2}", metrics.theta),
            Column::Vega => format!("{:.2}", metrics.vega),
            Column::Ltp => format!("{:.2}", metrics.ltp),
            Column::Ranked(MetricKind::Volume) => group_digits(metrics.volume as i64),
            Column::Ranked(MetricKind::OpenInterest) => group_digits(metrics.open_interest as i64),
            Column::Ranked(MetricKind::OpenInterestChange) => {
                group_digits(metrics.open_interest_change)
            }
        }
    }
}

fn scaled(width: u16, zoom: Zoom) -> u16 {
    (f64::from(width) * zoom.factor()).round().max(1.0) as u16
}

fn header_cell(column: Column, side: Side, view: &ChainView<'_>) -> Cell<'static> {
    let style = Style::default().fg(C_HEADER).add_modifier(Modifier::BOLD);
    match column {
        Column::Ranked(kind) => {
            let trend = view.trends.get(TrendKey::new(kind, side));
            let color = match trend {
                Trend::Up => C_BUY,
                Trend::Down => C_SELL,
                Trend::None => C_HEADER,
            };
            Cell::from(Line::from(vec![
                Span::styled(format!("{:1} ", trend.arrow()), Style::default().fg(color)),
                Span::styled(column.title(), style),
            ]))
        }
        _ => Cell::from(column.title()).style(style),
    }
}

fn leg_cell(
    column: Column,
    side: Side,
    index: usize,
    row: &RenderedRow,
    rendered: &RenderedChain,
    base: Style,
) -> Cell<'static> {
    let metrics = row.leg(side);
    let text = column.text(metrics);
    let Column::Ranked(kind) = column else {
        return Cell::from(text).style(base);
    };

    let rank = rendered.rank(TrendKey::new(kind, side), index);
    match rank.and_then(|rank| rank.highlight.map(|highlight| (highlight, rank.percentage))) {
        Some((Highlight::Primary, percentage)) => Cell::from(format!("{text} {percentage}%")).style(
            base.fg(Color::Black)
                .bg(C_PRIMARY)
                .add_modifier(Modifier::BOLD),
        ),
        Some((Highlight::Secondary, percentage)) => Cell::from(format!("{text} {percentage}%"))
            .style(base.fg(C_PRIMARY).add_modifier(Modifier::BOLD)),
        None => Cell::from(text).style(base),
    }
}

fn render_chain_panel(f: &mut Frame, area: Rect, view: &ChainView<'_>, palette: &Palette) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_ACCENT));

    let Some(rendered) = view.rendered else {
        let placeholder = Paragraph::new(Line::from(Span::styled(
            "Waiting for chain data...",
            Style::default().fg(C_DIM),
        )))
        .block(block.title(" CALLS │ STRIKE │ PUTS "));
        f.render_widget(placeholder, area);
        return;
    };

    let visible = usize::from(area.height.saturating_sub(TABLE_CHROME));
    let first = view
        .viewport
        .map(|viewport| (viewport.offset / viewport.row_height.max(f64::EPSILON)).round() as usize)
        .unwrap_or_default()
        .min(rendered.rows.len().saturating_sub(visible));
    let focus = rendered.focus.last_viewed_strike;

    let header = Row::new(
        CALL_COLUMNS
            .iter()
            .map(|&column| header_cell(column, Side::Call, view))
            .chain(std::iter::once(
                Cell::from("Strike").style(Style::default().fg(C_HEADER).add_modifier(Modifier::BOLD)),
            ))
            .chain(PUT_COLUMNS.iter().map(|&column| header_cell(column, Side::Put, view))),
    )
    .height(1);

    let rows = rendered
        .rows
        .iter()
        .enumerate()
        .skip(first)
        .take(visible)
        .map(|(index, row)| {
            let is_focus = focus.is_some_and(|strike| (row.strike - strike).abs() < 1.0);
            let row_style = if row.flags.atm {
                Style::default().bg(palette.atm_bg).add_modifier(Modifier::BOLD)
            } else if is_focus {
                Style::default().bg(palette.focus_bg)
            } else {
                Style::default()
            };
            let leg_style = |itm: bool| {
                if itm && !row.flags.atm {
                    row_style.bg(palette.itm_bg)
                } else {
                    row_style
                }
            };
            let call_style = leg_style(row.flags.call_itm);
            let put_style = leg_style(row.flags.put_itm);

            let strike_style = if row.flags.atm {
                row_style.fg(C_ACCENT)
            } else {
                row_style.add_modifier(Modifier::BOLD)
            };

            Row::new(
                CALL_COLUMNS
                    .iter()
                    .map(|&column| leg_cell(column, Side::Call, index, row, rendered, call_style))
                    .chain(std::iter::once(
                        Cell::from(format!("{:.0}", row.strike)).style(strike_style),
                    ))
                    .chain(
                        PUT_COLUMNS
                            .iter()
                            .map(|&column| leg_cell(column, Side::Put, index, row, rendered, put_style)),
                    ),
            )
            .style(row_style)
            .height(1)
        });

    let widths = CALL_COLUMNS
        .iter()
        .map(|column| scaled(column.width(), view.zoom))
        .chain(std::iter::once(scaled(STRIKE_WIDTH, view.zoom)))
        .chain(PUT_COLUMNS.iter().map(|column| scaled(column.width(), view.zoom)))
        .map(Constraint::Length)
        .collect::<Vec<_>>();

    let title = match &rendered.time_label {
        Some(label) => format!(" CALLS │ STRIKE │ PUTS  @ {label} "),
        None => " CALLS │ STRIKE │ PUTS ".to_string(),
    };
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(block.title(title));
    f.render_widget(table, area);
}

// ============================================================================
// DETAIL GRAPH
// ============================================================================

fn render_graph_panel(f: &mut Frame, area: Rect, graph: &DetailGraph) {
    let call = graph
        .series(Side::Call)
        .enumerate()
        .map(|(x, y)| (x as f64, y as f64))
        .collect::<Vec<_>>();
    let put = graph
        .series(Side::Put)
        .enumerate()
        .map(|(x, y)| (x as f64, y as f64))
        .collect::<Vec<_>>();

    let (low, high) = call
        .iter()
        .chain(put.iter())
        .fold((f64::MAX, f64::MIN), |(low, high), &(_, y)| (low.min(y), high.max(y)));
    let (low, high) = if low <= high { (low, high) } else { (0.0, 0.0) };
    let pad = ((high - low) * 0.1).max(1.0);

    let labels = graph.labels().collect::<Vec<_>>();
    let x_labels = match (labels.first(), labels.get(labels.len() / 2), labels.last()) {
        (Some(first), Some(middle), Some(last)) => vec![first.to_string(), middle.to_string(), last.to_string()],
        _ => Vec::new(),
    };

    let datasets = vec![
        Dataset::default()
            .name("CALL OI Change")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(C_BUY))
            .data(&call),
        Dataset::default()
            .name("PUT OI Change")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(C_SELL))
            .data(&put),
    ];

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title(format!(" {} ({}) ", graph.title(), graph.side))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(C_HEADER)),
        )
        .x_axis(
            Axis::default()
                .style(Style::default().fg(C_DIM))
                .bounds([0.0, (graph.len().max(1) - 1) as f64])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(C_DIM))
                .bounds([low - pad, high + pad])
                .labels(vec![group_digits(low as i64), group_digits(high as i64)]),
        );
    f.render_widget(chart, area);
}

fn render_footer(f: &mut Frame, area: Rect, view: &ChainView<'_>) {
    let line = Line::from(vec![
        Span::styled(
            " q quit  ↑↓ scroll  a ATM  s symbol  e expiry  h history  space play  x stop  [ ] seek  < > speed  c/p graph  +/-/0 zoom  t theme ",
            Style::default().fg(C_DIM),
        ),
        Span::styled(
            format!(" zoom {}%  {} ", view.zoom.percent(), view.theme),
            Style::default().fg(C_ACCENT),
        ),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

// ============================================================================
// HELPERS
// ============================================================================

/// Thousands-separated integer, e.g. `-12,345`.
fn group_digits(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

fn format_price(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let whole = rounded.trunc() as i64;
    let cents = ((rounded - rounded.trunc()).abs() * 100.0).round() as i64;
    format!("{}.{:02}", group_digits(whole), cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_digits() {
        struct TestCase {
            input: i64,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: no separator
                input: 950,
                expected: "950",
            },
            TestCase {
                // TC1: thousands
                input: 110_000,
                expected: "110,000",
            },
            TestCase {
                // TC2: negative millions
                input: -1_234_567,
                expected: "-1,234,567",
            },
            TestCase {
                // TC3: zero
                input: 0,
                expected: "0",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(group_digits(test.input), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(22445.65), "22,445.65");
        assert_eq!(format_price(48756.2), "48,756.20");
    }

    #[test]
    fn test_table_rows_account_for_chart() {
        let area = Rect::new(0, 0, 200, 50);
        assert_eq!(table_rows(area, false), 40.0);
        assert_eq!(table_rows(area, true), 26.0);
    }
}
