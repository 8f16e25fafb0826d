use std::io::{self, IsTerminal, Write};

use planner_shared::{Task, TaskFilter};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    /// Colour is used only when the `color` setting allows it and stdout is
    /// a terminal.
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = wants_color(cfg.get_bool("color")?, io::stdout().is_terminal());
        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    pub fn print_filters(&self, active: TaskFilter) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_filters(&mut out, active)
    }

    #[tracing::instrument(skip(self, writer, tasks))]
    pub fn write_task_list<W: Write>(
        &self,
        mut writer: W,
        filter: TaskFilter,
        tasks: &[&Task],
    ) -> anyhow::Result<()> {
        writeln!(writer, "{}", remaining_heading(tasks.len()))?;
        if tasks.is_empty() {
            return Ok(());
        }

        let headers = vec!["ID".to_string(), "Done".to_string(), "Name".to_string()];
        let rows = tasks
            .iter()
            .map(|task| {
                let done = if task.completed {
                    self.paint("x", "32")
                } else {
                    String::new()
                };
                vec![self.paint(&task.id, "33"), done, task.name.clone()]
            })
            .collect();

        write_table(&mut writer, headers, rows)?;
        if filter != TaskFilter::All {
            writeln!(writer, "(filter: {filter})")?;
        }
        Ok(())
    }

    pub fn write_filters<W: Write>(&self, mut writer: W, active: TaskFilter) -> anyhow::Result<()> {
        for filter in TaskFilter::ALL {
            if filter == active {
                writeln!(writer, "* {}", self.paint(filter.name(), "1"))?;
            } else {
                writeln!(writer, "  {}", filter.name())?;
            }
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

fn wants_color(setting: Option<bool>, stdout_is_terminal: bool) -> bool {
    setting.unwrap_or(true) && stdout_is_terminal
}

/// `"{count} tasks remaining"`, singular when exactly one is shown.
pub fn remaining_heading(count: usize) -> String {
    let noun = if count == 1 { "task" } else { "tasks" };
    format!("{count} {noun} remaining")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| pad(header, *width))
        .collect::<Vec<_>>();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let cells = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell, *width))
            .collect::<Vec<_>>();
        writeln!(writer, "{}", cells.join(" ").trim_end())?;
    }

    Ok(())
}

fn pad(cell: &str, width: usize) -> String {
    let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    format!("{cell}{}", " ".repeat(width.saturating_sub(visible_width)))
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
