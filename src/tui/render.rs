//! Frame composition for the dashboard.
//!
//! Everything here is pure: a [`SessionModel`] goes in, styled text lines come
//! out. The runtime only paints them.

#![allow(missing_docs)]

use crate::inventory::Volume;
use crate::session::{LoadState, Pane, PrunePlan, SessionModel};

/// Visual role of a line; the runtime maps it to colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Title,
    Normal,
    Dim,
    Cursor,
    Orphan,
    Alert,
    Notice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub tone: Tone,
}

impl Line {
    fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

/// Details shown in the Details pane: the live record, or why it could not be fetched.
pub type DetailsView<'a> = Option<Result<&'a Volume, &'a str>>;

const NAME_WIDTH: usize = 28;
const PROJECT_WIDTH: usize = 14;

/// `[✓]` or `[ ]`.
#[must_use]
pub const fn mark_box(marked: bool) -> &'static str {
    if marked { "[✓]" } else { "[ ]" }
}

/// One inventory row.
#[must_use]
pub fn table_row(volume: &Volume, marked: bool) -> String {
    format!(
        "{} {:<name_w$} {:>9}  {:<6}  {:<proj_w$} {}",
        mark_box(marked),
        truncate(&volume.name, NAME_WIDTH),
        volume.size_human(),
        volume.status_label(),
        truncate(volume.project_label(), PROJECT_WIDTH),
        volume.attached_label(","),
        name_w = NAME_WIDTH,
        proj_w = PROJECT_WIDTH,
    )
}

#[must_use]
pub fn table_header() -> String {
    format!(
        "    {:<name_w$} {:>9}  {:<6}  {:<proj_w$} {}",
        "NAME",
        "SIZE",
        "STATUS",
        "PROJECT",
        "ATTACHED",
        name_w = NAME_WIDTH,
        proj_w = PROJECT_WIDTH,
    )
}

#[must_use]
pub fn header_line(model: &SessionModel, backend: &str) -> Line {
    match model.load_state() {
        LoadState::Failed { message, .. } if model.snapshot().is_empty() => Line::new(
            format!(" volsweep [{backend}]  UNAVAILABLE: {message}"),
            Tone::Alert,
        ),
        LoadState::Failed { .. } => Line::new(
            format!(
                " volsweep [{backend}]  {} volumes, {} orphans  STALE",
                model.snapshot().len(),
                model.orphan_count()
            ),
            Tone::Alert,
        ),
        LoadState::NotLoaded => Line::new(format!(" volsweep [{backend}]  loading…"), Tone::Title),
        LoadState::Loaded { at } => Line::new(
            format!(
                " volsweep [{backend}]  {} volumes, {} orphans, {} marked  (read {})",
                model.snapshot().len(),
                model.orphan_count(),
                model.marked().len(),
                at.format("%H:%M:%S")
            ),
            Tone::Title,
        ),
    }
}

/// Pane tabs with the active one bracketed.
#[must_use]
pub fn tabs_line(active: Pane) -> String {
    [Pane::Table, Pane::Details, Pane::Plan]
        .iter()
        .map(|p| {
            if *p == active {
                format!("[{}]", p.label())
            } else {
                format!(" {} ", p.label())
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Table rows windowed so the cursor stays visible.
#[must_use]
pub fn table_lines(model: &SessionModel, height: usize) -> Vec<Line> {
    let mut lines = vec![Line::new(table_header(), Tone::Dim)];
    if model.snapshot().is_empty() {
        let text = if model.is_degraded() {
            "  (inventory unavailable, press r to retry)"
        } else {
            "  (no volumes)"
        };
        lines.push(Line::new(text, Tone::Dim));
        return lines;
    }
    let rows = height.saturating_sub(1).max(1);
    let first = model.cursor().saturating_sub(rows - 1);
    for (i, volume) in model.snapshot().iter().enumerate().skip(first).take(rows) {
        let tone = if i == model.cursor() {
            Tone::Cursor
        } else if volume.is_orphan() {
            Tone::Orphan
        } else {
            Tone::Normal
        };
        lines.push(Line::new(table_row(volume, model.is_marked(i)), tone));
    }
    lines
}

#[must_use]
pub fn details_lines(details: DetailsView<'_>) -> Vec<Line> {
    match details {
        None => vec![Line::new("  <none selected>", Tone::Dim)],
        Some(Err(reason)) => vec![Line::new(format!("  details unavailable: {reason}"), Tone::Alert)],
        Some(Ok(v)) => vec![
            Line::new(format!("  Name:      {}", v.name), Tone::Normal),
            Line::new(format!("  Driver:    {}", v.driver), Tone::Normal),
            Line::new(format!("  Size:      {}", v.size_human()), Tone::Normal),
            Line::new(format!("  Project:   {}", v.project_label()), Tone::Normal),
            Line::new(
                format!("  Status:    {}", v.status_label()),
                if v.is_orphan() { Tone::Orphan } else { Tone::Normal },
            ),
            Line::new(format!("  Attached:  {}", v.attached_label(", ")), Tone::Normal),
            Line::new(
                format!("  Last seen: {}", v.last_seen.format("%Y-%m-%d %H:%M:%S UTC")),
                Tone::Dim,
            ),
        ],
    }
}

#[must_use]
pub fn plan_lines(plan: &PrunePlan) -> Vec<Line> {
    if plan.is_empty() {
        return vec![Line::new("  <none selected>", Tone::Dim)];
    }
    let mut lines: Vec<Line> = plan
        .selected
        .iter()
        .map(|v| {
            let text = format!(
                "  {:<name_w$} {:>9}",
                truncate(&v.name, NAME_WIDTH),
                v.size_human(),
                name_w = NAME_WIDTH
            );
            Line::new(text, Tone::Normal)
        })
        .collect();
    let mut total = format!(
        "  Total reclaimable: {} across {} volume(s)",
        plan.total_human(),
        plan.len()
    );
    if plan.unknown_size_count > 0 {
        total.push_str(&format!(" ({} of unknown size)", plan.unknown_size_count));
    }
    lines.push(Line::new(total, Tone::Title));
    lines
}

#[must_use]
pub fn footer_line(model: &SessionModel) -> Line {
    if model.awaiting_confirm() {
        return Line::new(
            format!(" {}", model.notice().unwrap_or("confirm? [y/N]")),
            Tone::Alert,
        );
    }
    if let Some(notice) = model.notice() {
        return Line::new(format!(" {notice}"), Tone::Notice);
    }
    let keys = match model.pane() {
        Pane::Plan => " a apply  c clear  Tab next  r refresh  q quit",
        _ => " ↑/↓ move  Space mark  o orphans  c clear  Enter details  p plan  r refresh  q quit",
    };
    Line::new(keys, Tone::Dim)
}

/// The whole screen, top to bottom, for a terminal of `height` rows.
#[must_use]
pub fn compose(
    model: &SessionModel,
    backend: &str,
    details: DetailsView<'_>,
    height: usize,
) -> Vec<Line> {
    let mut lines = vec![
        header_line(model, backend),
        Line::new(tabs_line(model.pane()), Tone::Normal),
        Line::new(String::new(), Tone::Normal),
    ];
    let body_height = height.saturating_sub(lines.len() + 2);
    let body = match model.pane() {
        Pane::Table => table_lines(model, body_height),
        Pane::Details => details_lines(details),
        Pane::Plan => plan_lines(&model.compute_plan()),
    };
    lines.extend(body.into_iter().take(body_height.max(1)));
    lines.push(Line::new(String::new(), Tone::Normal));
    lines.push(footer_line(model));
    lines
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::core::errors::ErrorKind;
    use crate::inventory::SIZE_UNKNOWN;
    use crate::session::{SessionMsg, update};

    fn vol(name: &str, size: i64, attached: &[&str], project: &str) -> Volume {
        Volume::new(
            name,
            "local",
            size,
            attached.iter().map(|s| (*s).to_string()).collect(),
            project,
            Utc::now(),
        )
    }

    fn model() -> SessionModel {
        let mut m = SessionModel::new(Pane::Table, true);
        update(
            &mut m,
            SessionMsg::InventoryLoaded(vec![
                vol("A", 2048, &["web"], "shop"),
                vol("B", SIZE_UNKNOWN, &[], ""),
            ]),
        );
        m
    }

    #[test]
    fn rows_show_marks_status_and_placeholders() {
        let active = table_row(&vol("A", 2048, &["web"], "shop"), true);
        assert!(active.starts_with("[✓]"));
        assert!(active.contains("2.0 KB"));
        assert!(active.contains("ACTIVE"));
        assert!(active.contains("web"));

        let orphan = table_row(&vol("B", SIZE_UNKNOWN, &[], ""), false);
        assert!(orphan.starts_with("[ ]"));
        assert!(orphan.contains("ORPHAN"));
        assert!(orphan.contains("<none>"));
        assert!(orphan.contains('?'));
    }

    #[test]
    fn empty_plan_says_none_selected() {
        let lines = plan_lines(&PrunePlan::default());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].text.contains("<none selected>"));
    }

    #[test]
    fn plan_lists_each_volume_and_total() {
        let plan = PrunePlan::new(vec![vol("A", 2048, &[], ""), vol("B", SIZE_UNKNOWN, &[], "")]);
        let lines = plan_lines(&plan);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].text.contains('?'));
        assert!(lines[2].text.contains("2.0 KB"));
        assert!(lines[2].text.contains("1 of unknown size"));
    }

    #[test]
    fn unavailable_banner_differs_from_empty_inventory() {
        let mut failed = SessionModel::new(Pane::Table, true);
        update(
            &mut failed,
            SessionMsg::InventoryFailed {
                kind: ErrorKind::Unavailable,
                message: "daemon down".into(),
            },
        );
        let banner = header_line(&failed, "docker-cli");
        assert_eq!(banner.tone, Tone::Alert);
        assert!(banner.text.contains("UNAVAILABLE"));

        let mut empty = SessionModel::new(Pane::Table, true);
        update(&mut empty, SessionMsg::InventoryLoaded(Vec::new()));
        let header = header_line(&empty, "docker-cli");
        assert!(!header.text.contains("UNAVAILABLE"));
        assert!(header.text.contains("0 volumes"));
    }

    #[test]
    fn cursor_row_is_highlighted_and_window_follows() {
        let mut m = model();
        update(&mut m, SessionMsg::MoveCursor(1));
        let lines = table_lines(&m, 2);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].tone, Tone::Cursor);
        assert!(lines[1].text.contains('B'));
    }

    #[test]
    fn details_without_selection() {
        let lines = details_lines(None);
        assert!(lines[0].text.contains("<none selected>"));
        let v = vol("A", 2048, &["web", "worker"], "shop");
        let lines = details_lines(Some(Ok(&v)));
        assert!(lines.iter().any(|l| l.text.contains("web, worker")));
    }

    #[test]
    fn compose_fits_requested_height() {
        let m = model();
        let lines = compose(&m, "mock", None, 10);
        assert!(lines.len() <= 10);
        assert!(lines[1].text.contains("[Volumes]"));
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
