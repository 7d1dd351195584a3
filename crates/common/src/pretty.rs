use crate::RecordBatch;
use tabled::{Table, builder::Builder, settings};
use types::Value;

/// Predefined output styles that map to `tabled` styles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TableStyleKind {
    #[default]
    Modern,
    Ascii,
    Plain,
}

impl TableStyleKind {
    fn apply(self, table: &mut Table) {
        match self {
            Self::Modern => table.with(settings::Style::modern()),
            Self::Ascii => table.with(settings::Style::ascii()),
            Self::Plain => table.with(settings::Style::empty()),
        };
    }
}

/// Render a `RecordBatch` into a human-friendly table string.
pub fn render_record_batch(batch: &RecordBatch, style: TableStyleKind) -> String {
    if batch.columns.is_empty() {
        return "<empty>".into();
    }

    let mut builder = Builder::default();
    builder.push_record(batch.columns.iter().cloned());

    for row in &batch.rows {
        builder.push_record(row.values.iter().map(format_value));
    }

    let mut table = builder.build();
    style.apply(&mut table);
    table.to_string()
}

/// Format a full row into a comma-separated string.
pub fn format_row(values: &[Value]) -> String {
    values
        .iter()
        .map(format_value)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format a single value for display.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Text(text) => format!("'{text}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Row;

    #[test]
    fn record_batch_with_columns_renders_headers() {
        let batch = RecordBatch {
            columns: vec!["id".into(), "name".into()],
            rows: vec![Row::new(vec![Value::Int(1), Value::Text("Ada".into())])],
        };

        let rendered = render_record_batch(&batch, TableStyleKind::Modern);
        assert!(rendered.contains("id"));
        assert!(rendered.contains("'Ada'"));
    }

    #[test]
    fn empty_batches_render_placeholder() {
        let batch = RecordBatch {
            columns: vec![],
            rows: vec![],
        };

        assert_eq!(
            render_record_batch(&batch, TableStyleKind::Plain),
            "<empty>"
        );
    }
}
