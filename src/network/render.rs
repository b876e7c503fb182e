use crate::executor::{DeleteSummary, QueryResult};
use comfy_table::{presets::UTF8_FULL, Cell, Table as ComfyTable};

/// Header text for a result column.
fn header(column: &str) -> String {
    if column == "_id" {
        "ObjectID".to_string()
    } else {
        column.to_uppercase()
    }
}

fn new_table<I, S>(columns: I) -> ComfyTable
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut table = ComfyTable::new();
    table.load_preset(UTF8_FULL);
    table.set_header(columns.into_iter().map(|c| Cell::new(header(c.as_ref()))));
    table
}

fn render_delete(summary: &DeleteSummary) -> String {
    if summary.matched == 0 {
        return "No matching tasks\n".to_string();
    }
    let mut out = format!("Deleted {} task(s)", summary.deleted);
    if !summary.failures.is_empty() {
        out.push_str(&format!(", {} failed", summary.failures.len()));
    }
    out.push('\n');
    for (key, reason) in &summary.failures {
        out.push_str(&format!("  {key}: {reason}\n"));
    }
    out
}

/// Human-readable text of a result, always newline-terminated.
#[must_use]
pub fn render(result: &QueryResult) -> String {
    match result {
        QueryResult::Count(n) => format!("Count={n}\n"),
        QueryResult::Aggregates { columns, values } => {
            let mut table = new_table(columns);
            table.add_row(values.iter().map(|v| Cell::new(v.to_string())));
            format!("{table}\n")
        }
        QueryResult::Groups {
            key_columns,
            agg_columns,
            rows,
        } => {
            if rows.is_empty() {
                return "(0 groups)\n".to_string();
            }
            let mut table = new_table(key_columns.iter().chain(agg_columns));
            for row in rows {
                let cells = row
                    .key
                    .iter()
                    .map(Cell::new)
                    .chain(row.values.iter().map(|v| Cell::new(v.to_string())));
                table.add_row(cells);
            }
            format!("{table}\n({} groups)\n", rows.len())
        }
        QueryResult::Rows { columns, rows } => {
            if rows.is_empty() {
                return "(0 rows)\n".to_string();
            }
            let mut table = new_table(columns);
            for row in rows {
                table.add_row(row.iter().map(|v| Cell::new(v.to_string())));
            }
            format!("{table}\n({} rows)\n", rows.len())
        }
        QueryResult::Inserted { object_id, id, .. } => {
            format!("Inserted task '{id}' (_id={object_id})\n")
        }
        QueryResult::Updated(0) => "No matching tasks\n".to_string(),
        QueryResult::Updated(n) => format!("Updated {n} task(s)\n"),
        QueryResult::Deleted(summary) => render_delete(summary),
        QueryResult::Message(msg) => format!("{msg}\n"),
        QueryResult::Databases(names) => {
            let mut table = new_table(["database"]);
            for name in names {
                table.add_row(vec![Cell::new(name)]);
            }
            format!("{table}\n")
        }
    }
}
