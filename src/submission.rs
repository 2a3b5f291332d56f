//! Caller-side submission flow
//!
//! What a form front end does with the user's table: sanitize every row, gate
//! the batch, normalize the payload, call the endpoint and turn the answer
//! into a short message plus a debug dump. Success, rejection and failure all
//! produce both outputs through [`submit`].

use tracing::warn;

use crate::{
    coerce::{sanitize_table, CanonicalRow, RawRow, RawValue},
    error::Result,
    gate::{should_submit, REJECTION_MESSAGE, SKIPPED_RESPONSE},
    json_safe::{to_safe_json_pretty, to_safe_json_string, Loose},
    schema::FieldSchema,
};

/// Label used when rendering predictions for the user
pub const PREDICTION_LABEL: &str = "Predicted Coffee Quality Points";

/// Successful answer from the prediction endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ClientReply {
    /// One entry per submitted row
    pub predictions: Vec<Option<f64>>,
    /// Response body as received
    pub raw: String,
}

/// Something that can deliver a JSON body to the prediction endpoint
pub trait PredictionTransport {
    /// Post `body` and parse the answer
    ///
    /// # Errors
    ///
    /// Any transport, status or decoding failure.
    fn send(&self, body: &str) -> Result<ClientReply>;
}

/// What the form shows after a submit
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    /// Prediction lines, the rejection notice, or empty on failure
    pub message: String,
    /// Pretty JSON `{"payload": [...], "response_raw": "..."}`
    pub debug: String,
    /// Predictions, if the endpoint answered
    pub predictions: Option<Vec<Option<f64>>>,
}

/// Form table as the UI hands it over
#[derive(Debug, Clone, PartialEq)]
pub enum FormTable {
    /// Header row plus data rows
    Named {
        /// Column names
        header: Vec<String>,
        /// Cells, aligned to `header`
        rows: Vec<Vec<RawValue>>,
    },
    /// Rows in schema order, possibly short
    Positional(Vec<Vec<RawValue>>),
}

/// Convert a form table into raw rows
///
/// Positional rows are right-padded with empty strings up to the schema width.
#[must_use]
pub fn table_to_rows(table: &FormTable, schema: &FieldSchema) -> Vec<RawRow> {
    match table {
        FormTable::Named { header, rows } => rows
            .iter()
            .map(|row| RawRow::tabular(header.iter().cloned().zip(row.iter().cloned())))
            .collect(),
        FormTable::Positional(rows) => rows
            .iter()
            .map(|row| {
                let mut values = row.clone();
                if values.len() < schema.len() {
                    values.resize(schema.len(), RawValue::Text(String::new()));
                }
                RawRow::Positional(values)
            })
            .collect(),
    }
}

/// Request body for the named endpoint: `{"rows": [...]}`
#[must_use]
pub fn batch_payload(rows: &[CanonicalRow]) -> Loose {
    Loose::Map(vec![(
        "rows".to_string(),
        Loose::Seq(rows.iter().map(Loose::from).collect()),
    )])
}

/// Render predictions one per line
#[must_use]
pub fn format_predictions(predictions: &[Option<f64>]) -> String {
    predictions
        .iter()
        .map(|p| match p {
            Some(value) => format!("{PREDICTION_LABEL} = {value:.1}"),
            None => format!("{PREDICTION_LABEL} = unavailable"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn debug_dump(rows: &[CanonicalRow], response_raw: &str) -> String {
    let debug = Loose::Map(vec![
        (
            "payload".to_string(),
            Loose::Seq(rows.iter().map(Loose::from).collect()),
        ),
        ("response_raw".to_string(), Loose::from(response_raw)),
    ]);
    to_safe_json_pretty(&debug).unwrap_or_else(|e| e.to_string())
}

/// Run the full submission flow for `raw_rows`
pub fn submit<T: PredictionTransport + ?Sized>(
    raw_rows: &[RawRow],
    schema: &FieldSchema,
    transport: &T,
) -> SubmissionOutcome {
    let rows = sanitize_table(raw_rows, schema);

    if !should_submit(&rows) {
        return SubmissionOutcome {
            message: REJECTION_MESSAGE.to_string(),
            debug: debug_dump(&rows, SKIPPED_RESPONSE),
            predictions: None,
        };
    }

    let reply = to_safe_json_string(&batch_payload(&rows)).and_then(|body| transport.send(&body));
    match reply {
        Ok(reply) => SubmissionOutcome {
            message: format_predictions(&reply.predictions),
            debug: debug_dump(&rows, &reply.raw),
            predictions: Some(reply.predictions),
        },
        Err(e) => {
            warn!(error = %e, "prediction request failed");
            SubmissionOutcome {
                message: String::new(),
                debug: debug_dump(&rows, &format!("API error: {e}")),
                predictions: None,
            }
        },
    }
}

/// [`submit`] for a form table
pub fn submit_table<T: PredictionTransport + ?Sized>(
    table: &FormTable,
    schema: &FieldSchema,
    transport: &T,
) -> SubmissionOutcome {
    submit(&table_to_rows(table, schema), schema, transport)
}
