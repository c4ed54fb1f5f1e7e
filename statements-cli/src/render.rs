//! Plain-text rendering of the calendar and the dialogs.

use statements_core::{
    AccountData, CellState, ClickAction, FileSelectionDialog, MonthKey, ParseProgressDialog,
    ResultsDialog, UploadDialog, account, format_count, render_cell, summarize,
};
use std::fmt::Write;

const NAME_WIDTH: usize = 18;
const CELL_WIDTH: usize = 7;
const BAR_WIDTH: usize = 30;

/// `XP*42`: file icons by initial, parse symbol, compact count.
fn cell_text(cell: &CellState) -> String {
    if cell.icons.is_empty() {
        return cell.db_status.symbol().to_string();
    }
    let mut s: String = cell
        .icons
        .iter()
        .filter_map(|i| i.label().chars().next())
        .collect();
    s.push_str(cell.db_status.symbol());
    if cell.count > 0 {
        s.push_str(&format_count(cell.count));
    }
    s
}

fn account_cells(data: &AccountData, year: i32) -> Vec<CellState> {
    let Some(acct) = account::by_id(&data.id) else {
        return vec![CellState::empty(); 12];
    };
    MonthKey::year_months(year)
        .map(|key| {
            let record = data.month(key).map(|view| view.record());
            render_cell(acct, key, record.as_ref())
        })
        .collect()
}

pub fn calendar<'a>(year: i32, accounts: impl IntoIterator<Item = &'a AccountData>) -> String {
    let accounts: Vec<&AccountData> = accounts.into_iter().collect();
    let mut out = String::new();
    let _ = write!(out, "{:<NAME_WIDTH$}", year);
    for key in MonthKey::year_months(year) {
        let _ = write!(out, "{:>CELL_WIDTH$}", key.abbr());
    }
    let _ = writeln!(out, "{:>9}", "Total");

    for data in &accounts {
        let _ = write!(out, "{:<NAME_WIDTH$}", data.name);
        for cell in account_cells(data, year) {
            let _ = write!(out, "{:>CELL_WIDTH$}", cell_text(&cell));
        }
        let _ = writeln!(out, "{:>9}", format_count(data.total_transactions));
        if let Some(err) = &data.error {
            let _ = writeln!(out, "{:<NAME_WIDTH$}({err})", "");
        }
    }

    let summary = summarize(accounts.iter().copied());
    let _ = writeln!(
        out,
        "\n{} of {} account(s) with files, {} file(s), {} transaction(s)",
        summary.accounts_with_data,
        summary.total_accounts,
        summary.total_files,
        summary.total_transactions
    );
    out.push_str("X = Excel, P = PDF; * parsed, o not parsed, ! parse error, - no file\n");
    out
}

/// Month-by-month detail of one account.
pub fn account_detail(data: &AccountData, year: i32) -> String {
    let mut out = format!("{} ({}) {year}\n", data.name, data.identifier);
    for (key, cell) in MonthKey::year_months(year).zip(account_cells(data, year)) {
        let action = match cell.click {
            ClickAction::None => String::new(),
            ClickAction::Download { kind } => format!("download {}", kind.extension()),
            ClickAction::ChooseFile => "choose file".to_string(),
        };
        let _ = writeln!(
            out,
            "  {} {:<8} {:>8} tx  {}",
            key.abbr(),
            cell_text(&cell),
            cell.count,
            action
        );
    }
    let _ = writeln!(
        out,
        "  {} file(s), {} parsed month(s), {} transaction(s)",
        data.total_files, data.parsed_months, data.total_transactions
    );
    out
}

pub fn upload_dialog(dialog: &UploadDialog) -> String {
    let mut out = String::new();
    for row in &dialog.rows {
        let mark = if row.valid { "ok" } else { "x " };
        let _ = writeln!(out, "  [{mark}] {} ({}) {}", row.filename, row.size, row.note);
    }
    let _ = writeln!(out, "{}", dialog.summary);
    out
}

pub fn progress_line(dialog: &ParseProgressDialog) -> String {
    let filled = BAR_WIDTH * usize::from(dialog.percentage.min(100)) / 100;
    let bar = format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled));
    let mut line = format!(
        "{} [{bar}] {:>3}% {}: {}",
        dialog.title, dialog.percentage, dialog.status, dialog.details
    );
    if let Some(file) = &dialog.current_file {
        let _ = write!(line, " ({file})");
    }
    line
}

pub fn results(dialog: &ResultsDialog) -> String {
    let mut out = format!("{}\n", dialog.title);
    for line in &dialog.lines {
        let mark = if line.success { "ok" } else { "x " };
        let _ = writeln!(out, "  [{mark}] {}", line.text);
    }
    out
}

pub fn file_selection(dialog: &FileSelectionDialog) -> String {
    let mut out = format!("{}\n", dialog.title);
    for opt in &dialog.options {
        let _ = writeln!(out, "  --type {:<5} {}", opt.kind.extension(), opt.label);
    }
    out
}
