//! Table rendering for report lines.

use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::money::Money;
use crate::providers::{Account, AccountStatus};
use crate::reports::{AccountLine, BillLine, BudgetLine, ChangeLine};

fn status_color(status: AccountStatus) -> Color {
    match status {
        AccountStatus::Active => Color::Green,
        AccountStatus::Suspended => Color::Red,
        AccountStatus::PendingClosure => Color::Yellow,
    }
}

/// Rising cost is red, falling cost green.
fn delta_color(delta: f64) -> Color {
    if delta > 0.0 {
        Color::Red
    } else if delta < 0.0 {
        Color::Green
    } else {
        Color::White
    }
}

fn header(table: &mut Table, names: &[&str]) {
    table.set_header(
        names
            .iter()
            .map(|n| Cell::new(n).fg(Color::Cyan))
            .collect::<Vec<_>>(),
    );
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn base_cell(money: &Money) -> Cell {
    Cell::new(money.base.format()).set_alignment(CellAlignment::Right)
}

fn converted_cell(money: &Money) -> Cell {
    Cell::new(money.converted.format()).set_alignment(CellAlignment::Right)
}

fn delta_cells(delta: &Money) -> [Cell; 2] {
    let color = delta_color(delta.value());
    [base_cell(delta).fg(color), converted_cell(delta).fg(color)]
}

/// Create a table for the change report
pub fn change_table(lines: &[ChangeLine]) -> Table {
    let mut table = new_table();
    header(
        &mut table,
        &["Account", "Service", "Region", "Current", "Current €", "Change", "Change €"],
    );

    for line in lines {
        let [delta, delta_eur] = delta_cells(&line.delta);
        table.add_row(vec![
            Cell::new(format!("{} ({})", line.key.account_name, line.key.account_id)),
            Cell::new(&line.key.service),
            Cell::new(&line.key.region),
            base_cell(&line.current),
            converted_cell(&line.current),
            delta,
            delta_eur,
        ]);
    }

    table
}

/// Create a table for the accounts report
pub fn accounts_table(lines: &[AccountLine]) -> Table {
    let mut table = new_table();
    header(
        &mut table,
        &["Account", "ID", "Last month", "Last month €", "Forecast", "Forecast €", "Delta", "Delta €"],
    );

    for line in lines {
        let name = if line.key.suspended {
            Cell::new(format!("{} (suspended)", line.key.name)).fg(Color::DarkGrey)
        } else {
            Cell::new(&line.key.name)
        };
        let [delta, delta_eur] = delta_cells(&line.delta);
        table.add_row(vec![
            name,
            Cell::new(&line.key.id),
            base_cell(&line.current),
            converted_cell(&line.current),
            base_cell(&line.reference),
            converted_cell(&line.reference),
            delta,
            delta_eur,
        ]);
    }

    table
}

/// Create a table for monthly bills
pub fn bills_table(lines: &[BillLine]) -> Table {
    let mut table = new_table();
    header(&mut table, &["Month", "Cost", "Cost €"]);

    for line in lines {
        table.add_row(vec![
            Cell::new(&line.month),
            base_cell(&line.cost),
            converted_cell(&line.cost),
        ]);
    }

    table
}

/// Create a table for budgets
pub fn budgets_table(lines: &[BudgetLine]) -> Table {
    let mut table = new_table();
    header(
        &mut table,
        &["Budget", "Limit", "Spend", "Forecast", "Remaining", "Remaining €"],
    );

    for line in lines {
        // Remaining budget reads the other way round: negative is bad.
        let color = delta_color(-line.delta.value());
        table.add_row(vec![
            Cell::new(&line.name),
            base_cell(&line.limit),
            base_cell(&line.spend),
            base_cell(&line.forecast),
            base_cell(&line.delta).fg(color),
            converted_cell(&line.delta).fg(color),
        ]);
    }

    table
}

/// Create a table for the account list
pub fn account_list_table(accounts: &[Account]) -> Table {
    let mut table = new_table();
    header(&mut table, &["Account", "ID", "Status"]);

    for account in accounts {
        table.add_row(vec![
            Cell::new(&account.name),
            Cell::new(&account.id),
            Cell::new(account.status.to_string().to_lowercase()).fg(status_color(account.status)),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{series_record, DerivedRecord};
    use crate::money::ExchangeRate;
    use crate::reports::ChangeKey;

    #[test]
    fn test_delta_color() {
        assert_eq!(delta_color(5.0), Color::Red);
        assert_eq!(delta_color(-5.0), Color::Green);
        assert_eq!(delta_color(0.0), Color::White);
    }

    #[test]
    fn test_change_table_shows_both_currencies() {
        let line: DerivedRecord<ChangeKey> = series_record(
            ChangeKey {
                account_name: "prod".into(),
                account_id: "111".into(),
                service: "Amazon S3".into(),
                region: "us-east-1".into(),
            },
            &[10.0, 14.0],
            &ExchangeRate::fixed(0.5),
        );

        let rendered = change_table(&[line]).to_string();
        assert!(rendered.contains("prod (111)"));
        assert!(rendered.contains("Amazon S3"));
        assert!(rendered.contains("$4.00"));
        assert!(rendered.contains("€2.00"));
    }
}
