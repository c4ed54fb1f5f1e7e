//! Static account registry: 3 STP accounts and 6 BBVA accounts.
//!
//! Every other module refers to accounts through this table. The registry is
//! fixed at build time; `validate_registry` is run once at startup.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Stp,
    Bbva,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Stp => "stp",
            AccountKind::Bbva => "bbva",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccountKind::Stp => "STP",
            AccountKind::Bbva => "BBVA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: &'static str,
    #[serde(rename = "type")]
    pub kind: AccountKind,
    /// Display name, also what the upload endpoint reports back as `account_name`.
    pub name: &'static str,
    /// 18-digit account number (STP) or CLABE (BBVA).
    pub identifier: &'static str,
    pub currency: &'static str,
    /// Folder path inside the document store.
    pub folder: &'static str,
    pub description: &'static str,
    /// Filename pattern for files that belong to this account.
    pub file_pattern: &'static str,
}

pub static ACCOUNTS: [Account; 9] = [
    Account {
        id: "stp_sa",
        kind: AccountKind::Stp,
        name: "STP SA",
        identifier: "646180559700000009",
        currency: "MXN",
        folder: "STP SA New",
        description: "STP Servicios Administrativos",
        file_pattern: r"^ec-646180559700000009-(\d{4})(\d{2})\.(?i:pdf|xlsx|xls)$",
    },
    Account {
        id: "stp_ip_pi",
        kind: AccountKind::Stp,
        name: "STP IP - PI",
        identifier: "646990403000000003",
        currency: "MXN",
        folder: "STP IP",
        description: "STP Institución de Pagos - Payment Institution",
        file_pattern: r"^ec-646990403000000003-(\d{4})(\d{2})\.(?i:pdf|xlsx|xls)$",
    },
    Account {
        id: "stp_ip_pd",
        kind: AccountKind::Stp,
        name: "STP IP - PD",
        identifier: "646180403000000004",
        currency: "MXN",
        folder: "STP IP",
        description: "STP Institución de Pagos - Payment Distribution",
        file_pattern: r"^ec-646180403000000004-(\d{4})(\d{2})\.(?i:pdf|xlsx|xls)$",
    },
    Account {
        id: "bbva_mx_mxn",
        kind: AccountKind::Bbva,
        name: "BBVA MX MXN",
        identifier: "012180001198203451",
        currency: "MXN",
        folder: "Estados de Cuenta/BBVA/BBVA MX/BBVA MX MXN",
        description: "BBVA México - Pesos Mexicanos",
        file_pattern: r"^(\d{4})\s+FMX\s+BBVA\s+MXN.*\.(?i:pdf)$",
    },
    Account {
        id: "bbva_mx_usd",
        kind: AccountKind::Bbva,
        name: "BBVA MX USD",
        identifier: "012180001201205883",
        currency: "USD",
        folder: "Estados de Cuenta/BBVA/BBVA MX/BBVA MX USD",
        description: "BBVA México - Dólares Americanos",
        file_pattern: r"^(\d{4})\s+FMX\s+BBVA\s+USD.*\.(?i:pdf)$",
    },
    Account {
        id: "bbva_sa_mxn",
        kind: AccountKind::Bbva,
        name: "BBVA SA MXN",
        identifier: "012180001182790637",
        currency: "MXN",
        folder: "Estados de Cuenta/BBVA/BBVA SA/BBVA SA MXN",
        description: "BBVA Servicios Administrativos - Pesos Mexicanos",
        file_pattern: r"^(\d{4})\s+FSA\s+BBVA\s+MXN.*\.(?i:pdf)$",
    },
    Account {
        id: "bbva_sa_usd",
        kind: AccountKind::Bbva,
        name: "BBVA SA USD",
        identifier: "012222001182793149",
        currency: "USD",
        folder: "Estados de Cuenta/BBVA/BBVA SA/BBVA SA USD",
        description: "BBVA Servicios Administrativos - Dólares Americanos",
        file_pattern: r"^(\d{4})\s+FSA\s+BBVA\s+USD.*\.(?i:pdf)$",
    },
    Account {
        id: "bbva_ip_corp",
        kind: AccountKind::Bbva,
        name: "BBVA IP Corp",
        identifier: "012180001232011554",
        currency: "MXN",
        folder: "Estados de Cuenta/BBVA/BBVA IP/BBVA IP MXN Corp",
        description: "BBVA Institución de Pagos - Corporativo",
        file_pattern: r"^(\d{4})\s+BBVA\s+IP\s+MXN\s+Corp.*\.(?i:pdf)$",
    },
    Account {
        id: "bbva_ip_clientes",
        kind: AccountKind::Bbva,
        name: "BBVA IP Clientes",
        identifier: "012180001232011635",
        currency: "MXN",
        folder: "Estados de Cuenta/BBVA/BBVA IP/BBVA IP MXN Clientes",
        description: "BBVA Institución de Pagos - Clientes",
        file_pattern: r"^(\d{4})\s+BBVA\s+IP\s+MXN\s+Clientes.*\.(?i:pdf)$",
    },
];

// Compiled once, same order as ACCOUNTS.
static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ACCOUNTS
        .iter()
        .map(|a| Regex::new(a.file_pattern).expect("registry patterns are valid regexes"))
        .collect()
});

impl Account {
    pub fn is_stp(&self) -> bool {
        self.kind == AccountKind::Stp
    }

    /// True when `filename` follows this account's naming convention.
    pub fn matches_filename(&self, filename: &str) -> bool {
        ACCOUNTS
            .iter()
            .position(|a| a.id == self.id)
            .map(|i| PATTERNS[i].is_match(filename))
            .unwrap_or(false)
    }

    /// Name a statement file is stored under, e.g. `ec-<identifier>-202501.xlsx`
    /// or `2501 FSA BBVA MXN.pdf`. Always matches the account's own pattern.
    pub fn statement_filename(&self, year: i32, month: u32, ext: &str) -> String {
        match self.kind {
            AccountKind::Stp => format!("ec-{}-{year:04}{month:02}.{ext}", self.identifier),
            AccountKind::Bbva => {
                format!("{:02}{month:02} {}.pdf", year.rem_euclid(100), self.bbva_label())
            }
        }
    }

    fn bbva_label(&self) -> &'static str {
        match self.id {
            "bbva_mx_mxn" => "FMX BBVA MXN",
            "bbva_mx_usd" => "FMX BBVA USD",
            "bbva_sa_mxn" => "FSA BBVA MXN",
            "bbva_sa_usd" => "FSA BBVA USD",
            "bbva_ip_corp" => "BBVA IP MXN Corp",
            "bbva_ip_clientes" => "BBVA IP MXN Clientes",
            _ => self.name,
        }
    }
}

pub fn all() -> &'static [Account] {
    &ACCOUNTS
}

pub fn ids() -> impl Iterator<Item = &'static str> {
    ACCOUNTS.iter().map(|a| a.id)
}

pub fn by_id(id: &str) -> Option<&'static Account> {
    ACCOUNTS.iter().find(|a| a.id == id)
}

pub fn by_kind(kind: AccountKind) -> impl Iterator<Item = &'static Account> {
    ACCOUNTS.iter().filter(move |a| a.kind == kind)
}

pub fn by_identifier(identifier: &str) -> Option<&'static Account> {
    ACCOUNTS.iter().find(|a| a.identifier == identifier)
}

/// Map a display name (as returned in upload results) back to its account.
pub fn by_name(name: &str) -> Option<&'static Account> {
    let name = name.trim();
    ACCOUNTS.iter().find(|a| a.name.eq_ignore_ascii_case(name))
}

/// First account whose own filename pattern matches.
pub fn by_filename(filename: &str) -> Option<&'static Account> {
    ACCOUNTS
        .iter()
        .zip(PATTERNS.iter())
        .find(|(_, re)| re.is_match(filename))
        .map(|(a, _)| a)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCheck {
    pub accounts_defined: bool,
    pub stp_accounts_count: bool,
    pub bbva_accounts_count: bool,
    pub total_accounts_count: bool,
    pub all_required_fields: bool,
    pub unique_identifiers: bool,
    pub valid_patterns: bool,
}

impl RegistryCheck {
    pub fn is_ok(&self) -> bool {
        self.accounts_defined
            && self.stp_accounts_count
            && self.bbva_accounts_count
            && self.total_accounts_count
            && self.all_required_fields
            && self.unique_identifiers
            && self.valid_patterns
    }
}

pub fn validate_registry() -> RegistryCheck {
    let mut seen = HashSet::new();
    let unique_identifiers = ACCOUNTS.iter().all(|a| seen.insert(a.identifier));

    let all_required_fields = ACCOUNTS.iter().all(|a| {
        [a.id, a.name, a.identifier, a.currency, a.folder, a.description]
            .iter()
            .all(|f| !f.trim().is_empty())
    });

    let valid_patterns = ACCOUNTS
        .iter()
        .all(|a| !a.file_pattern.is_empty() && Regex::new(a.file_pattern).is_ok());

    RegistryCheck {
        accounts_defined: !ACCOUNTS.is_empty(),
        stp_accounts_count: by_kind(AccountKind::Stp).count() == 3,
        bbva_accounts_count: by_kind(AccountKind::Bbva).count() == 6,
        total_accounts_count: ACCOUNTS.len() == 9,
        all_required_fields,
        unique_identifiers,
        valid_patterns,
    }
}
