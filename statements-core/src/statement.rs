//! One month's statement for one account.
//!
//! STP publishes the same statement twice (Excel and PDF export); the two
//! files are variants of one logical statement and carry one transaction
//! count. BBVA files are independent documents whose counts add up.

use crate::account::{Account, AccountKind};
use crate::inventory::{FileInfo, MonthRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementMonth<'a> {
    /// Variants of one logical statement (STP).
    Shared {
        xlsx: Option<&'a FileInfo>,
        pdf: Option<&'a FileInfo>,
    },
    /// Independent documents (BBVA).
    Independent {
        xlsx: Option<&'a FileInfo>,
        pdf: Option<&'a FileInfo>,
    },
}

impl<'a> StatementMonth<'a> {
    pub fn new(kind: AccountKind, record: &'a MonthRecord) -> Self {
        let xlsx = record.xlsx();
        let pdf = record.pdf();
        match kind {
            AccountKind::Stp => StatementMonth::Shared { xlsx, pdf },
            AccountKind::Bbva => StatementMonth::Independent { xlsx, pdf },
        }
    }

    pub fn for_account(account: &Account, record: &'a MonthRecord) -> Self {
        Self::new(account.kind, record)
    }

    fn files(&self) -> (Option<&'a FileInfo>, Option<&'a FileInfo>) {
        match *self {
            StatementMonth::Shared { xlsx, pdf } | StatementMonth::Independent { xlsx, pdf } => {
                (xlsx, pdf)
            }
        }
    }

    /// Transactions this month contributes to the account total.
    pub fn transaction_count(&self) -> u64 {
        match *self {
            // The spreadsheet is the parsed source; the PDF only stands in
            // when it is the sole variant on file.
            StatementMonth::Shared { xlsx: Some(x), .. } => x.transaction_count,
            StatementMonth::Shared { xlsx: None, pdf } => pdf.map_or(0, |p| p.transaction_count),
            StatementMonth::Independent { xlsx, pdf } => {
                xlsx.map_or(0, |x| x.transaction_count) + pdf.map_or(0, |p| p.transaction_count)
            }
        }
    }

    pub fn file_count(&self) -> usize {
        let (xlsx, pdf) = self.files();
        usize::from(xlsx.is_some()) + usize::from(pdf.is_some())
    }

    pub fn has_both(&self) -> bool {
        self.file_count() == 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(count: u64) -> FileInfo {
        FileInfo::present("id").with_count(count)
    }

    #[test]
    fn stp_variants_are_not_summed() {
        let both = MonthRecord {
            xlsx: Some(file(40)),
            pdf: Some(file(40)),
        };
        assert_eq!(StatementMonth::new(AccountKind::Stp, &both).transaction_count(), 40);

        let only_xlsx = MonthRecord {
            xlsx: Some(file(17)),
            pdf: None,
        };
        assert_eq!(StatementMonth::new(AccountKind::Stp, &only_xlsx).transaction_count(), 17);

        let only_pdf = MonthRecord {
            xlsx: None,
            pdf: Some(file(5)),
        };
        assert_eq!(StatementMonth::new(AccountKind::Stp, &only_pdf).transaction_count(), 5);
    }

    #[test]
    fn bbva_documents_are_summed() {
        let both = MonthRecord {
            xlsx: Some(file(3)),
            pdf: Some(file(9)),
        };
        let m = StatementMonth::new(AccountKind::Bbva, &both);
        assert_eq!(m.transaction_count(), 12);
        assert!(m.has_both());
    }
}
