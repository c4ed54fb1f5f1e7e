//! Calendar cell rendering: what one (account, month) cell shows and what a
//! click on it does.

use serde::Serialize;

use crate::account::{Account, AccountKind};
use crate::classify::FileKind;
use crate::inventory::{FileInfo, MonthRecord, ParseStatus};
use crate::month::MonthKey;
use crate::statement::StatementMonth;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Icon {
    Xlsx,
    Pdf,
}

impl Icon {
    pub fn label(&self) -> &'static str {
        match self {
            Icon::Xlsx => "XLS",
            Icon::Pdf => "PDF",
        }
    }

    pub fn file_kind(&self) -> FileKind {
        match self {
            Icon::Xlsx => FileKind::Xlsx,
            Icon::Pdf => FileKind::Pdf,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DbStatus {
    Empty,
    NotParsed,
    Parsed,
    Error,
}

impl DbStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            DbStatus::Empty => "-",
            DbStatus::NotParsed => "o",
            DbStatus::Parsed => "*",
            DbStatus::Error => "!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClickAction {
    None,
    Download { kind: FileKind },
    /// STP with both variants on file: let the user pick.
    ChooseFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellState {
    pub icons: Vec<Icon>,
    pub db_status: DbStatus,
    pub count: u64,
    pub click: ClickAction,
}

impl CellState {
    pub fn empty() -> Self {
        Self {
            icons: Vec::new(),
            db_status: DbStatus::Empty,
            count: 0,
            click: ClickAction::None,
        }
    }

    pub fn is_clickable(&self) -> bool {
        self.click != ClickAction::None
    }
}

fn db_status(files: &[&FileInfo]) -> DbStatus {
    if files.is_empty() {
        DbStatus::Empty
    } else if files.iter().any(|f| f.parse_status == ParseStatus::Parsed) {
        DbStatus::Parsed
    } else if files.iter().any(|f| f.parse_status == ParseStatus::Error) {
        DbStatus::Error
    } else {
        DbStatus::NotParsed
    }
}

/// Render one calendar cell. `_month` only identifies the cell; the record
/// carries everything shown.
pub fn render_cell(account: &Account, _month: MonthKey, record: Option<&MonthRecord>) -> CellState {
    let Some(record) = record else {
        return CellState::empty();
    };

    let xlsx = record.xlsx();
    let pdf = record.pdf();
    let present: Vec<&FileInfo> = [xlsx, pdf].into_iter().flatten().collect();
    if present.is_empty() {
        return CellState::empty();
    }

    let mut icons = Vec::with_capacity(2);
    if xlsx.is_some() {
        icons.push(Icon::Xlsx);
    }
    if pdf.is_some() {
        icons.push(Icon::Pdf);
    }

    let click = match (xlsx.is_some(), pdf.is_some(), account.kind) {
        (true, true, AccountKind::Stp) => ClickAction::ChooseFile,
        (true, true, AccountKind::Bbva) => ClickAction::Download {
            kind: FileKind::Pdf,
        },
        (true, false, _) => ClickAction::Download {
            kind: FileKind::Xlsx,
        },
        _ => ClickAction::Download {
            kind: FileKind::Pdf,
        },
    };

    CellState {
        icons,
        db_status: db_status(&present),
        count: StatementMonth::for_account(account, record).transaction_count(),
        click,
    }
}

/// Compact transaction count: `999`, `1.2k`, `3.4M`.
pub fn format_count(count: u64) -> String {
    // 999_950 and up would print as 1000.0k.
    if count >= 999_950 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}k", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account;

    fn key() -> MonthKey {
        MonthKey::new(2025, 1).unwrap()
    }

    fn parsed(count: u64) -> FileInfo {
        FileInfo::present("f").with_count(count)
    }

    #[test]
    fn no_file_is_empty_and_inert() {
        let stp = account::by_id("stp_sa").unwrap();
        let cell = render_cell(stp, key(), None);
        assert_eq!(cell, CellState::empty());
        assert!(!cell.is_clickable());

        let ghost = MonthRecord {
            pdf: Some(FileInfo::default()),
            xlsx: None,
        };
        assert_eq!(render_cell(stp, key(), Some(&ghost)).db_status, DbStatus::Empty);
    }

    #[test]
    fn stp_xlsx_only_count_is_not_doubled() {
        let stp = account::by_id("stp_ip_pi").unwrap();
        let record = MonthRecord {
            xlsx: Some(parsed(120)),
            pdf: None,
        };
        let cell = render_cell(stp, key(), Some(&record));
        assert_eq!(cell.icons, vec![Icon::Xlsx]);
        assert_eq!(cell.count, 120);
        assert_eq!(cell.db_status, DbStatus::Parsed);
        assert_eq!(cell.click, ClickAction::Download { kind: FileKind::Xlsx });
    }

    #[test]
    fn both_files_click_depends_on_family() {
        let record = MonthRecord {
            xlsx: Some(parsed(10)),
            pdf: Some(parsed(10)),
        };
        let stp = render_cell(account::by_id("stp_sa").unwrap(), key(), Some(&record));
        assert_eq!(stp.click, ClickAction::ChooseFile);
        assert_eq!(stp.count, 10);

        let bbva = render_cell(account::by_id("bbva_mx_usd").unwrap(), key(), Some(&record));
        assert_eq!(bbva.click, ClickAction::Download { kind: FileKind::Pdf });
        assert_eq!(bbva.count, 20);
    }

    #[test]
    fn error_shown_when_nothing_parsed() {
        let mut bad = FileInfo::present("p");
        bad.parse_status = ParseStatus::Error;
        let record = MonthRecord {
            pdf: Some(bad),
            xlsx: None,
        };
        let cell = render_cell(account::by_id("bbva_sa_usd").unwrap(), key(), Some(&record));
        assert_eq!(cell.db_status, DbStatus::Error);
    }

    #[test]
    fn formats_counts() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_234), "1.2k");
        assert_eq!(format_count(3_400_000), "3.4M");
        assert_eq!(format_count(999_949), "999.9k");
        assert_eq!(format_count(999_950), "1.0M");
    }
}
