use ratatui::{
    Frame,
    layout::{Layout, Direction, Constraint, Rect},
    widgets::{Block, Borders, BorderType, Paragraph, Wrap, Clear},
    style::{Style, Modifier},
    text::{Line, Span},
};
use crate::app::{App, InputMode};
use crate::theme::Palette;
use crate::view::{self, PageLine, Tone};

// ===============================
// Top-level draw
// ===============================
pub fn draw(f:&mut Frame, app:&mut App){
    let show_debug = app.debug_visible() && !app.debug_log().is_empty();

    let mut constraints: Vec<Constraint> = Vec::with_capacity(4);
    constraints.push(Constraint::Length(2));                                // header
    constraints.push(Constraint::Min(0));                                   // page
    if show_debug { constraints.push(Constraint::Length(8)); }              // debug
    constraints.push(Constraint::Length(2));                                // footer

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(f.area());

    let mut idx = 0usize;
    header(f, chunks[idx], app); idx += 1;
    body(f, chunks[idx], app); idx += 1;
    if show_debug {
        debug_panel(f, chunks[idx], app); idx += 1;
    }
    footer(f, chunks[idx], app);

    // Overlays render last
    if app.input_mode() == InputMode::PasteCallback {
        draw_paste_overlay(f, app);
    }
    if app.toast_message().is_some() {
        draw_toast_modal(f, app);
    }
}

// ===============================
// Header / Body
// ===============================
fn header(f:&mut Frame, area:Rect, app:&App){
    let p = app.theme().palette();
    let spans = vec![
        Span::styled("d2x", Style::default().fg(p.heading).add_modifier(Modifier::BOLD)),
        Span::styled(" · Destiny 2 API demo · ", Style::default().fg(p.text_dim)),
        Span::styled(app.api_base(), Style::default().fg(p.code)),
    ];
    let w = Paragraph::new(Line::from(spans))
        .style(Style::default().bg(p.background))
        .block(Block::default().borders(Borders::BOTTOM).border_type(BorderType::Plain).border_style(Style::default().fg(p.border)));
    f.render_widget(w, area);
}

fn tone_style(p:&Palette, tone:Tone) -> Style {
    match tone {
        Tone::Plain => Style::default().fg(p.text),
        Tone::Dim => Style::default().fg(p.text_dim),
        Tone::Highlight => Style::default().fg(p.highlight).add_modifier(Modifier::BOLD),
        Tone::Code => Style::default().fg(p.code),
        Tone::Pending => Style::default().fg(p.pending).add_modifier(Modifier::ITALIC),
        Tone::Error => Style::default().fg(p.error),
    }
}

fn to_lines<'a>(page:&'a [PageLine], p:&Palette) -> Vec<Line<'a>> {
    let mut out = Vec::with_capacity(page.len() * 2);
    for (i, pl) in page.iter().enumerate() {
        let (prefix, heading) = match pl.block {
            view::Block::H2 => ("", Some(Modifier::BOLD | Modifier::UNDERLINED)),
            view::Block::H3 => ("", Some(Modifier::BOLD)),
            view::Block::H4 => ("", Some(Modifier::ITALIC)),
            view::Block::Bullet => ("  • ", None),
            view::Block::Para => ("", None),
        };
        if pl.block == view::Block::H2 && i > 0 {
            out.push(Line::raw(""));
        }
        let mut spans = Vec::with_capacity(pl.segments.len() + 1);
        if !prefix.is_empty() { spans.push(Span::styled(prefix, Style::default().fg(p.text_dim))); }
        for seg in &pl.segments {
            let style = match heading {
                Some(m) => Style::default().fg(p.heading).add_modifier(m),
                None => tone_style(p, seg.tone),
            };
            spans.push(Span::styled(seg.text.as_str(), style));
        }
        out.push(Line::from(spans));
    }
    out
}

/// Rows a line takes once wrapped to `width`
fn wrapped_rows(line:&Line, width:u16) -> u16 {
    let w = line.width().max(1);
    let width = (width.max(1)) as usize;
    w.div_ceil(width).min(u16::MAX as usize) as u16
}

fn body(f:&mut Frame, area:Rect, app:&mut App){
    let p = app.theme().palette();
    let page = view::page(app);
    let lines = to_lines(&page, &p);

    let inner_w = area.width.saturating_sub(2);
    let inner_h = area.height.saturating_sub(2);
    let total: u16 = lines.iter().fold(0u16, |acc, l| acc.saturating_add(wrapped_rows(l, inner_w)));
    app.clamp_scroll(total.saturating_sub(inner_h));

    let w = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll(), 0))
        .style(Style::default().bg(p.background))
        .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded).border_style(Style::default().fg(p.border)));
    f.render_widget(w, area);
}

// ===============================
// Footer / Debug
// ===============================
fn footer(f:&mut Frame, area:Rect, app:&App){
    let p = app.theme().palette();
    let key = Style::default().fg(p.heading);
    let mut spans: Vec<Span> = Vec::with_capacity(24);

    spans.push(Span::styled("r", key));
    spans.push(Span::raw(" reroll │ "));
    spans.push(Span::styled("o", key));
    spans.push(Span::raw(" new authorize URL │ "));
    spans.push(Span::styled("p", key));
    spans.push(Span::raw(" paste redirect │ "));
    spans.push(Span::styled("↑/↓", key));
    spans.push(Span::raw(" scroll │ "));
    spans.push(Span::styled("Ctrl+D", key));
    spans.push(Span::raw(" debug │ "));
    spans.push(Span::styled("q", key));
    spans.push(Span::raw(" quit"));

    if app.debug_visible() {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled("[DEBUG]", Style::default().fg(p.debug_indicator)));
    }
    spans.push(Span::raw(format!(" │ {} │ FPS {}", app.theme(), app.fps())));

    let w = Paragraph::new(Line::from(spans))
        .style(Style::default().fg(p.text_dim).bg(p.background))
        .block(Block::default().borders(Borders::TOP).border_type(BorderType::Plain).border_style(Style::default().fg(p.border)));
    f.render_widget(w, area);
}

fn debug_panel(f:&mut Frame, area:Rect, app:&App){
    let p = app.theme().palette();
    let log = app.debug_log();

    let lines_to_show = (area.height.saturating_sub(2)) as usize; // inner height
    let start = log.len().saturating_sub(lines_to_show);
    let lines: Vec<Line> = log[start..].iter().map(|msg| Line::from(Span::raw(msg.as_str()))).collect();

    let paragraph = Paragraph::new(lines)
        .style(Style::default().fg(p.text_dim).bg(p.background))
        .block(Block::default()
            .title(" Debug ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(p.debug_indicator)));

    f.render_widget(paragraph, area);
}

// ===============================
// Overlays
// ===============================
fn centered(area:Rect, pct_w:u16, height:u16) -> Rect {
    let width = ((area.width as u32 * pct_w as u32) / 100) as u16;
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect { x, y, width, height }
}

fn draw_paste_overlay(f:&mut Frame, app:&App){
    let p = app.theme().palette();
    let overlay = centered(f.area(), 80, 5);
    f.render_widget(Clear, overlay);

    let input = app.paste_buf();
    let w = Paragraph::new(vec![
        Line::from(Span::styled(input, Style::default().fg(p.code))),
        Line::from(Span::styled("Enter submit · Esc cancel", Style::default().fg(p.text_dim))),
    ])
    .wrap(Wrap { trim: false })
    .style(Style::default().bg(p.background))
    .block(Block::default()
        .title(" Paste the URL you were redirected to ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(p.heading)));
    f.render_widget(w, overlay);

    if overlay.width > 2 {
        let room = overlay.width.saturating_sub(2) as usize;
        let x = overlay.x + 1 + (input.chars().count().min(room.saturating_sub(1)) as u16);
        f.set_cursor_position((x, overlay.y + 1));
    }
}

fn draw_toast_modal(f: &mut Frame, app: &App) {
    let p = app.theme().palette();
    let message = app.toast_message().unwrap_or("");
    let overlay = centered(f.area(), 50, 3);

    f.render_widget(Clear, overlay);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(p.highlight));

    let text = Paragraph::new(format!("✓ {message}"))
        .style(Style::default().fg(p.highlight).bg(p.background).add_modifier(Modifier::BOLD))
        .block(block);

    f.render_widget(text, overlay);
}
