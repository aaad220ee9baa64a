use crate::drivers::Frame;
use crate::types::{NormalizedRow, Schema};
/// Decides whether a frame line is a data row at all (as opposed to an
/// echoed header, an error banner or other console chatter).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowPredicate {
    /// Line must start with this literal, e.g. a timestamp's year.
    Prefix(String),
    Any,
}
impl RowPredicate {
    pub fn from_prefix(prefix: Option<&str>) -> Self {
        match prefix {
            Some(p) if !p.is_empty() => RowPredicate::Prefix(p.to_string()),
            _ => RowPredicate::Any,
        }
    }
    pub fn accepts(&self, line: &str) -> bool {
        match self {
            RowPredicate::Prefix(prefix) => line.starts_with(prefix.as_str()),
            RowPredicate::Any => true,
        }
    }
}
/// Rows that survived plus counts of what was thrown away.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Normalized {
    pub rows: Vec<NormalizedRow>,
    /// Non-empty lines rejected by the row predicate.
    pub filtered: usize,
    /// Data lines whose field count differs from the schema.
    pub mismatched: usize,
}
/// Splits frame text into rows that fit `schema` exactly.
pub fn normalize(frame: &Frame, schema: &Schema, predicate: &RowPredicate) -> Normalized {
    let mut out = Normalized::default();
    for line in frame.as_str().lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !predicate.accepts(line) {
            out.filtered += 1;
            continue;
        }
        let fields: Vec<String> = line.split(schema.delimiter()).map(str::to_string).collect();
        if fields.len() != schema.len() {
            log::debug!(
                "dropping row with {} fields (expected {}): {line}",
                fields.len(),
                schema.len()
            );
            out.mismatched += 1;
            continue;
        }
        out.rows.push(NormalizedRow(fields));
    }
    out
}
#[cfg(test)]
mod tests {
    use super::*;
    const HEADER: &str =
        "Timestamp,Temperature(C),Humidity(%),MQ4_Voltage(V),MQ7_Voltage(V),MQ7_CO_PPM,ExtraField";
    fn schema() -> Schema {
        Schema::from_header(HEADER, ',')
    }
    fn year() -> RowPredicate {
        RowPredicate::from_prefix(Some("2025"))
    }
    #[test]
    fn keeps_rows_matching_schema_length_only() {
        let frame = Frame(
            "2025-06-10,22.1,51,5,0,0,,extra\n2025-06-10,22.1,51,5,0,0,ok".to_string(),
        );
        let out = normalize(&frame, &schema(), &year());
        assert_eq!(out.mismatched, 1);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].join(','), "2025-06-10,22.1,51,5,0,0,ok");
    }
    #[test]
    fn echoed_header_and_banners_are_filtered() {
        let frame = Frame(format!(
            "{HEADER}\nE (123) spiffs: read error\n  2025-06-10 19:30:00,22,50,1.1,0.4,3.2,x  \n\n"
        ));
        let out = normalize(&frame, &schema(), &year());
        assert_eq!(out.filtered, 2);
        assert_eq!(out.mismatched, 0);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].0[0], "2025-06-10 19:30:00");
    }
    #[test]
    fn any_predicate_only_checks_field_count() {
        let frame = Frame("1999-01-01,1,2,3,4,5,6\nshort,row".to_string());
        let out = normalize(&frame, &schema(), &RowPredicate::Any);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.mismatched, 1);
        assert_eq!(RowPredicate::from_prefix(Some("")), RowPredicate::Any);
    }
    #[test]
    fn empty_frame_gives_no_rows() {
        let out = normalize(&Frame(String::new()), &schema(), &year());
        assert_eq!(out, Normalized::default());
    }
}
