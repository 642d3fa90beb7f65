use std::io::{self, IsTerminal, Write};

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::clock::Clock;
use crate::state::{CalendarState, DateDetail, grid_day_keys};

const MAX_TITLE_WIDTH: usize = 14;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self {
            color: color && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all, fields(cells = state.dates_in_range.len()))]
    pub fn print_calendar(&self, state: &CalendarState, clock: &dyn Clock) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_calendar(&mut out, state, clock)
    }

    /// Title line, weekday header, then one block of lines per grid week.
    pub fn write_calendar<W: Write>(
        &self,
        mut writer: W,
        state: &CalendarState,
        clock: &dyn Clock,
    ) -> anyhow::Result<()> {
        writeln!(writer, "{} ({})", state.title(), state.view_type.label())?;
        writeln!(writer)?;

        let weeks: Vec<Vec<Vec<Styled>>> = state
            .weeks()
            .map(|week| {
                week.iter()
                    .map(|cell| self.cell_lines(state, cell, clock))
                    .collect()
            })
            .collect();

        write_weeks(&mut writer, &grid_day_keys(), &weeks)?;
        Ok(())
    }

    fn cell_lines(&self, state: &CalendarState, cell: &DateDetail, clock: &dyn Clock) -> Vec<Styled> {
        let mut label = cell.calendar_date.format("%d").to_string();
        let style = if state.is_today(cell, clock) {
            label.push('*');
            Some("1;31")
        } else if !state.is_anchor_date(cell.calendar_date) {
            Some("2")
        } else {
            None
        };

        let mut lines = vec![self.styled(label, style)];
        for event in &cell.events {
            let title = truncate_to_width(&event.title, MAX_TITLE_WIDTH);
            if state.flags.should_fade(event, clock, state.timezone()) {
                lines.push(self.styled(format!("~{title}"), Some("2")));
            } else {
                lines.push(self.styled(title, None));
            }
        }
        lines
    }

    fn styled(&self, text: String, code: Option<&str>) -> Styled {
        let width = UnicodeWidthStr::width(text.as_str());
        let text = match code {
            Some(code) if self.color => format!("\x1b[{code}m{text}\x1b[0m"),
            _ => text,
        };
        Styled { text, width }
    }
}

/// Cell text with its display width measured before any escape codes.
#[derive(Debug, Clone, Default)]
struct Styled {
    text: String,
    width: usize,
}

fn truncate_to_width(text: &str, max: usize) -> String {
    if UnicodeWidthStr::width(text) <= max {
        return text.to_string();
    }

    let mut out = String::new();
    let mut width = 0;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + ch_width > max.saturating_sub(1) {
            break;
        }
        width += ch_width;
        out.push(ch);
    }
    out.push('…');
    out
}

/// Seven columns sized to their widest line, a rule under the header, and
/// each week as tall as its busiest day.
fn write_weeks<W: Write>(
    mut writer: W,
    headers: &[&str; 7],
    weeks: &[Vec<Vec<Styled>>],
) -> anyhow::Result<()> {
    let mut widths = headers.map(|key| UnicodeWidthStr::width(key));
    for week in weeks {
        for (column, lines) in week.iter().enumerate().take(7) {
            let widest = lines.iter().map(|line| line.width).max().unwrap_or(0);
            widths[column] = widths[column].max(widest);
        }
    }

    let header: Vec<String> = headers
        .iter()
        .zip(widths)
        .map(|(key, width)| format!("{key:width$}"))
        .collect();
    writeln!(writer, "{}", header.join(" ").trim_end())?;
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    let blank = Styled::default();
    for week in weeks {
        let height = week.iter().map(Vec::len).max().unwrap_or(0);
        for line in 0..height {
            let row: Vec<String> = week
                .iter()
                .zip(widths)
                .map(|(lines, width)| {
                    let cell = lines.get(line).unwrap_or(&blank);
                    format!("{}{}", cell.text, " ".repeat(width.saturating_sub(cell.width)))
                })
                .collect();
            writeln!(writer, "{}", row.join(" ").trim_end())?;
        }
    }

    Ok(())
}
