use statements_core::{
    AccountData, ClickAction, DbStatus, FileKind, Inventory, MonthKey, MonthStatus, account,
    render_cell, summarize, ui_data,
};

const INVENTORY: &str = r#"{
  "last_updated": "2025-03-05T12:00:00Z",
  "version": "1.0",
  "accounts": {
    "stp_sa": {
      "2025-01": {
        "xlsx": {"exists": true, "last_modified": "2025-02-02T09:00:00Z", "parse_status": "parsed", "transaction_count": 214, "file_size": 48213},
        "pdf":  {"exists": true, "last_modified": "2025-02-02T09:00:05Z", "parse_status": "parsed", "transaction_count": 214, "file_size": 90411}
      },
      "2025-02": {
        "xlsx": {"exists": true, "last_modified": "2025-03-01T09:00:00Z", "parse_status": "not_parsed", "transaction_count": 0}
      }
    },
    "bbva_mx_mxn": {
      "2025-01": {
        "pdf":  {"exists": true, "last_modified": "2025-02-10T10:00:00Z", "parse_status": "parsed", "transaction_count": 31},
        "xlsx": {"exists": true, "last_modified": "2025-02-10T10:00:00Z", "parse_status": "parsed", "transaction_count": 4}
      },
      "2024-12": {
        "pdf":  {"exists": true, "parse_status": "error", "transaction_count": 0}
      }
    }
  }
}"#;

fn inventory() -> Inventory {
    serde_json::from_str(INVENTORY).unwrap()
}

fn key(s: &str) -> MonthKey {
    s.parse().unwrap()
}

#[test]
fn stp_year_view_counts_each_statement_once() {
    let inv = inventory();
    let stp = account::by_id("stp_sa").unwrap();
    let data = AccountData::from_inventory(stp, &inv, 2025);

    assert_eq!(data.total_files, 3);
    assert_eq!(data.total_transactions, 214);
    assert_eq!(data.parsed_months, 1);
    assert_eq!(data.month(key("2025-01")).unwrap().status, MonthStatus::Complete);
    assert_eq!(data.month(key("2025-02")).unwrap().status, MonthStatus::Partial);
    assert!(data.month(key("2025-03")).is_none());

    let jan = render_cell(stp, key("2025-01"), inv.month(stp.id, key("2025-01")));
    assert_eq!(jan.count, 214);
    assert_eq!(jan.click, ClickAction::ChooseFile);

    let feb = render_cell(stp, key("2025-02"), inv.month(stp.id, key("2025-02")));
    assert_eq!(feb.db_status, DbStatus::NotParsed);
    assert_eq!(feb.click, ClickAction::Download { kind: FileKind::Xlsx });
}

#[test]
fn bbva_year_view_sums_documents() {
    let inv = inventory();
    let bbva = account::by_id("bbva_mx_mxn").unwrap();

    let data = AccountData::from_inventory(bbva, &inv, 2025);
    assert_eq!(data.total_transactions, 35);
    assert_eq!(data.months.len(), 1);

    let dec = render_cell(bbva, key("2024-12"), inv.month(bbva.id, key("2024-12")));
    assert_eq!(dec.db_status, DbStatus::Error);
    assert_eq!(dec.click, ClickAction::Download { kind: FileKind::Pdf });
}

#[test]
fn year_summary_and_ui_payload() {
    let inv = inventory();
    let all: Vec<AccountData> = account::all()
        .iter()
        .map(|a| AccountData::from_inventory(a, &inv, 2025))
        .collect();

    let summary = summarize(&all);
    assert_eq!(summary.total_accounts, 9);
    assert_eq!(summary.accounts_with_data, 2);
    assert_eq!(summary.total_files, 5);
    assert_eq!(summary.total_transactions, 249);

    let ui = ui_data(&all);
    assert_eq!(ui.keys().collect::<Vec<_>>(), vec!["bbva_mx_mxn", "stp_sa"]);
    assert_eq!(ui["stp_sa"].months.len(), 2);
    assert!(ui["stp_sa"].months[1].has_xlsx);
    assert!(!ui["stp_sa"].months[1].has_pdf);
}

#[test]
fn account_data_survives_the_wire() {
    let inv = inventory();
    let stp = account::by_id("stp_sa").unwrap();
    let data = AccountData::from_inventory(stp, &inv, 2025);

    let json = serde_json::to_value(&data).unwrap();
    assert_eq!(json["type"], "stp");
    assert!(json["months"]["2025-01"]["xlsx"]["exists"].as_bool().unwrap());

    let back: AccountData = serde_json::from_value(json).unwrap();
    assert_eq!(back, data);
}
