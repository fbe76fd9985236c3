use crate::{
    app::App,
    view::{DashboardView, ExchangeView},
};
use funding_data::{BatchPhase, FeedStatus, MarkPriceRow, RateClass, SnapshotRow};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Row, Table, Wrap},
};

const COLUMN_WIDTHS: [Constraint; 6] = [
    Constraint::Length(16),
    Constraint::Length(14),
    Constraint::Length(20),
    Constraint::Length(13),
    Constraint::Length(16),
    Constraint::Length(21),
];

pub fn render(f: &mut Frame, app: &App, view: &DashboardView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(f.area());

    let selected = app
        .selected_exchange()
        .and_then(|exchange| view.exchange(exchange));

    render_header(f, app, view, chunks[0]);
    render_progress(f, selected, chunks[1]);

    match selected {
        Some(exchange) if app.show_mark_prices => render_mark_prices(f, app, exchange, chunks[2]),
        Some(exchange) => render_funding_table(f, app, exchange, chunks[2]),
        None => render_message(f, " FUNDING ", "No exchanges enabled", Color::DarkGray, chunks[2]),
    }

    render_footer(f, chunks[3]);
}

fn status_badge(status: &FeedStatus) -> Span<'static> {
    match status {
        FeedStatus::Loading => Span::styled(" LOADING", Style::default().fg(Color::DarkGray)),
        FeedStatus::Ready => Span::styled(" ●", Style::default().fg(Color::Green)),
        FeedStatus::Stale { .. } => Span::styled(" STALE", Style::default().fg(Color::Yellow)),
        FeedStatus::Unavailable { .. } => {
            Span::styled(" UNAVAILABLE", Style::default().fg(Color::Red))
        }
    }
}

fn render_header(f: &mut Frame, app: &App, view: &DashboardView, area: Rect) {
    let block = Block::default()
        .title(" FUNDING RATES ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let mut tabs = Vec::new();
    for (index, exchange) in view.exchanges.iter().enumerate() {
        let style = if index == app.selected {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD | Modifier::REVERSED)
        } else {
            Style::default().fg(Color::Gray)
        };
        tabs.push(Span::styled(format!(" {} ", exchange.exchange.name()), style));
        tabs.push(status_badge(&exchange.status));
        tabs.push(Span::raw("   "));
    }

    let pending = view
        .refresh
        .pending_symbol_count
        .map(|pending| format!("   Pending: {pending}"))
        .unwrap_or_default();

    let lines = vec![
        Line::from(tabs),
        Line::from(vec![
            Span::styled("Last refresh: ", Style::default().fg(Color::DarkGray)),
            Span::raw(view.last_refreshed()),
            Span::styled("   Next: ", Style::default().fg(Color::DarkGray)),
            Span::raw(view.next_refresh()),
            Span::styled("   Limit: ", Style::default().fg(Color::DarkGray)),
            Span::raw(app.symbol_limit_label()),
            Span::raw(pending),
        ]),
    ];

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_progress(f: &mut Frame, exchange: Option<&ExchangeView>, area: Rect) {
    let progress = exchange.map(|exchange| exchange.progress).unwrap_or_default();

    let (label, color) = match progress.phase {
        BatchPhase::Idle => ("Idle".to_string(), Color::DarkGray),
        BatchPhase::Listing => ("Listing symbols...".to_string(), Color::Cyan),
        BatchPhase::Fetching => (
            format!("Fetching {}/{}", progress.completed, progress.total),
            Color::Cyan,
        ),
        BatchPhase::Merged => (format!("Merged {} symbols", progress.total), Color::Green),
        BatchPhase::Failed => ("Listing failed".to_string(), Color::Red),
    };

    let gauge = Gauge::default()
        .block(Block::default().title(" BATCH ").borders(Borders::ALL))
        .gauge_style(Style::default().fg(color).bg(Color::Rgb(30, 30, 40)))
        .ratio(progress.ratio().clamp(0.0, 1.0))
        .label(Span::styled(
            label,
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));

    f.render_widget(gauge, area);
}

fn rate_color(class: RateClass) -> Color {
    match class {
        RateClass::Positive => Color::Green,
        RateClass::Negative => Color::Red,
        RateClass::Neutral => Color::White,
        RateClass::Unknown => Color::DarkGray,
    }
}

fn table_block(exchange: &ExchangeView, label: &str) -> Block<'static> {
    let name = exchange.exchange.name().to_uppercase();
    let (title, border) = match &exchange.status {
        FeedStatus::Stale { error } => (
            format!(" {name} {label} (STALE: {error}) "),
            Color::Yellow,
        ),
        _ => (format!(" {name} {label} "), Color::White),
    };

    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
}

/// Message shown instead of a table when no snapshot was published yet.
fn missing_snapshot(exchange: &ExchangeView) -> (String, Color) {
    match &exchange.status {
        FeedStatus::Unavailable { error } => (format!("Unavailable: {error}"), Color::Red),
        _ => ("Loading funding data...".to_string(), Color::DarkGray),
    }
}

fn render_funding_table(f: &mut Frame, app: &App, exchange: &ExchangeView, area: Rect) {
    let Some(snapshot) = &exchange.snapshot else {
        let (message, color) = missing_snapshot(exchange);
        let title = format!(" {} FUNDING ", exchange.exchange.name().to_uppercase());
        return render_message(f, &title, &message, color, area);
    };

    let rows = snapshot.rows(&app.rate_style);
    let skip = app.scroll.min(rows.len().saturating_sub(1));
    let rows = rows.iter().skip(skip).map(funding_row);

    let table = Table::new(rows, COLUMN_WIDTHS)
        .header(
            Row::new(SnapshotRow::COLUMNS)
                .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        )
        .block(table_block(exchange, "FUNDING"));

    f.render_widget(table, area);
}

fn funding_row(row: &SnapshotRow) -> Row<'static> {
    let funding_time = if row.derived_time {
        format!("{}*", row.funding_time)
    } else {
        row.funding_time.clone()
    };

    Row::new(vec![
        row.symbol.clone(),
        row.funding_rate.clone(),
        funding_time,
        row.max_leverage.clone(),
        row.price.clone(),
        row.retrieved_at.clone(),
    ])
    .style(Style::default().fg(rate_color(row.class)))
}

fn render_mark_prices(f: &mut Frame, app: &App, exchange: &ExchangeView, area: Rect) {
    let Some(snapshot) = &exchange.snapshot else {
        let (message, color) = missing_snapshot(exchange);
        let title = format!(" {} MARK PRICES ", exchange.exchange.name().to_uppercase());
        return render_message(f, &title, &message, color, area);
    };

    let Some(prices) = snapshot.mark_price_rows() else {
        let title = format!(" {} MARK PRICES ", exchange.exchange.name().to_uppercase());
        let message = format!("{} has no bulk mark price feed", exchange.exchange.name());
        return render_message(f, &title, &message, Color::DarkGray, area);
    };

    let skip = app.scroll.min(prices.len().saturating_sub(1));
    let rows = prices.into_iter().skip(skip).map(|MarkPriceRow { symbol, mark_price, retrieved_at }| {
        Row::new(vec![symbol, mark_price, retrieved_at])
    });

    let table = Table::new(
        rows,
        [Constraint::Length(16), Constraint::Length(18), Constraint::Length(21)],
    )
    .header(
        Row::new(MarkPriceRow::COLUMNS)
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
    )
    .block(table_block(exchange, "MARK PRICES"));

    f.render_widget(table, area);
}

fn render_message(f: &mut Frame, title: &str, message: &str, color: Color, area: Rect) {
    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let paragraph = Paragraph::new(Line::from(Span::styled(
        message.to_string(),
        Style::default().fg(color),
    )))
    .block(block)
    .wrap(Wrap { trim: true });

    f.render_widget(paragraph, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let key = |key: &'static str| {
        Span::styled(key, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
    };
    let hint = |hint: &'static str| Span::styled(hint, Style::default().fg(Color::DarkGray));

    let line = Line::from(vec![
        key(" r"),
        hint(" refresh  "),
        key("+/-/0"),
        hint(" symbol limit  "),
        key("Tab"),
        hint(" exchange  "),
        key("m"),
        hint(" mark prices  "),
        key("↑/↓"),
        hint(" scroll  "),
        key("q"),
        hint(" quit   * derived from next funding time"),
    ]);

    f.render_widget(Paragraph::new(line), area);
}
