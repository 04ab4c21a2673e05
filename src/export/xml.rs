//! Markup export and its reader.
//!
//! Document shape:
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <TestProgram>
//!   <Record id="1">
//!     <Date>2024-01-05</Date>
//!     <FirstName>Anna</FirstName>
//!     <LastName>Ivanova</LastName>
//!     <SurName>Petrovna</SurName>
//!     <City>Kyiv</City>
//!     <Country>Ukraine</Country>
//!   </Record>
//! </TestProgram>
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::AppError;
use crate::model::{Record, DATE_FORMAT};
use crate::streaming::AtomicFileWriter;

pub const ROOT_ELEMENT: &str = "TestProgram";
pub const RECORD_ELEMENT: &str = "Record";

const FIELD_ELEMENTS: [&str; 6] = ["Date", "FirstName", "LastName", "SurName", "City", "Country"];

fn write_error(e: impl std::fmt::Display) -> AppError {
    AppError::ExportFailed(format!("Failed to write XML: {}", e))
}

/// Serializes `records` into `out` in input order.
pub fn render_xml<W: Write>(records: &[Record], out: W) -> Result<(), AppError> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(write_error)?;
    writer
        .write_event(Event::Start(BytesStart::new(ROOT_ELEMENT)))
        .map_err(write_error)?;

    for record in records {
        let id = record.id.to_string();
        let mut start = BytesStart::new(RECORD_ELEMENT);
        start.push_attribute(("id", id.as_str()));
        writer.write_event(Event::Start(start)).map_err(write_error)?;

        for (name, value) in FIELD_ELEMENTS.iter().zip(record.fields()) {
            writer
                .create_element(*name)
                .write_text_content(BytesText::new(&value))
                .map_err(write_error)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new(RECORD_ELEMENT)))
            .map_err(write_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))
        .map_err(write_error)?;

    Ok(())
}

/// Writes `records` as an XML document to `path` atomically.
pub fn write_xml(records: &[Record], path: &Path) -> Result<PathBuf, AppError> {
    let mut writer = AtomicFileWriter::new(path)?;
    render_xml(records, &mut writer)?;
    writer.finish()
}

// ─────────────────────────────────────────────────────────────────────────────
// Reading
// ─────────────────────────────────────────────────────────────────────────────

fn invalid(msg: impl Into<String>) -> AppError {
    AppError::Io(io::Error::new(io::ErrorKind::InvalidData, msg.into()))
}

/// Fields of the `Record` element being parsed.
#[derive(Default)]
struct PartialRecord {
    id: Option<i64>,
    values: [Option<String>; 6],
}

impl PartialRecord {
    fn build(self, position: u64) -> Result<Record, AppError> {
        let id = self
            .id
            .ok_or_else(|| invalid(format!("Record without id near byte {}", position)))?;

        let [date, first_name, last_name, sur_name, city, country] = self.values;
        let date = date.ok_or_else(|| invalid(format!("Record {} has no Date", id)))?;
        let record_date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
            .map_err(|e| invalid(format!("Record {} has invalid Date {:?}: {}", id, date, e)))?;

        Ok(Record {
            id,
            record_date,
            first_name: first_name.unwrap_or_default(),
            last_name: last_name.unwrap_or_default(),
            sur_name: sur_name.unwrap_or_default(),
            city: city.unwrap_or_default(),
            country: country.unwrap_or_default(),
        })
    }
}

fn field_index(name: &[u8]) -> Option<usize> {
    FIELD_ELEMENTS.iter().position(|f| f.as_bytes() == name)
}

/// Parses a document produced by [`render_xml`].
///
/// Text content is taken verbatim (no trimming), so exported records read
/// back unchanged. Unknown elements are ignored.
pub fn parse_xml(content: &str) -> Result<Vec<Record>, AppError> {
    let mut reader = Reader::from_str(content);
    let mut records = Vec::new();
    let mut current: Option<PartialRecord> = None;
    let mut field: Option<usize> = None;
    let mut text = String::new();

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader
            .read_event()
            .map_err(|e| invalid(format!("Malformed XML near byte {}: {}", position, e)))?;

        match event {
            Event::Start(e) if e.name().as_ref() == RECORD_ELEMENT.as_bytes() => {
                let id = e
                    .try_get_attribute("id")
                    .map_err(|e| invalid(e.to_string()))?
                    .map(|attr| -> Result<i64, AppError> {
                        let value = attr.unescape_value().map_err(|e| invalid(e.to_string()))?;
                        value
                            .trim()
                            .parse()
                            .map_err(|_| invalid(format!("Invalid record id {:?}", value)))
                    })
                    .transpose()?;
                current = Some(PartialRecord {
                    id,
                    ..PartialRecord::default()
                });
            }
            Event::Start(e) if current.is_some() => {
                field = field_index(e.name().as_ref());
                text.clear();
            }
            Event::Empty(e) => {
                if let (Some(rec), Some(i)) = (current.as_mut(), field_index(e.name().as_ref())) {
                    rec.values[i] = Some(String::new());
                }
            }
            Event::Text(t) if field.is_some() => {
                let value = t.unescape().map_err(|e| invalid(e.to_string()))?;
                text.push_str(&value);
            }
            Event::CData(c) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&c));
            }
            Event::End(e) => {
                let name = e.name();
                if name.as_ref() == RECORD_ELEMENT.as_bytes() {
                    if let Some(rec) = current.take() {
                        records.push(rec.build(position)?);
                    }
                } else if let (Some(rec), Some(i)) = (current.as_mut(), field.take()) {
                    rec.values[i] = Some(std::mem::take(&mut text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records)
}

/// Reads a document written by [`write_xml`] from disk.
pub fn read_xml(path: &Path) -> Result<Vec<Record>, AppError> {
    let content = std::fs::read_to_string(path)?;
    parse_xml(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::sample_records;
    use std::fs;
    use tempfile::TempDir;

    fn render_to_string(records: &[Record]) -> String {
        let mut buf = Vec::new();
        render_xml(records, &mut buf).expect("Failed to render");
        String::from_utf8(buf).expect("XML is not UTF-8")
    }

    #[test]
    fn renders_expected_structure() {
        let xml = render_to_string(&sample_records()[..1]);

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<TestProgram>"));
        assert!(xml.contains("<Record id=\"1\">"));
        assert!(xml.contains("<Date>2024-01-05</Date>"));
        assert!(xml.contains("<FirstName>Anna</FirstName>"));
        assert!(xml.contains("<Country>Ukraine</Country>"));
        assert!(xml.trim_end().ends_with("</TestProgram>"));

        let date = xml.find("<Date>").unwrap();
        let first = xml.find("<FirstName>").unwrap();
        let country = xml.find("<Country>").unwrap();
        assert!(date < first && first < country, "child order must be fixed");
    }

    #[test]
    fn special_characters_are_escaped() {
        let xml = render_to_string(&sample_records());
        assert!(xml.contains("&lt;Lviv&gt;"));
        assert!(xml.contains("&amp;"));
        assert!(!xml.contains("<Lviv>"));
    }

    #[test]
    fn empty_input_renders_empty_root() {
        let xml = render_to_string(&[]);
        assert!(xml.contains("<TestProgram>"));
        assert!(!xml.contains("<Record"));
        assert!(parse_xml(&xml).unwrap().is_empty());
    }

    #[test]
    fn export_then_parse_is_lossless() {
        let mut records = sample_records();
        records.push(Record {
            id: 42,
            record_date: NaiveDate::from_ymd_opt(1999, 2, 28).unwrap(),
            first_name: "  padded  ".into(),
            last_name: "\"quoted\"".into(),
            sur_name: "Ünïcödé".into(),
            city: "".into(),
            country: "a;b".into(),
        });

        let parsed = parse_xml(&render_to_string(&records)).expect("Failed to parse");
        assert_eq!(parsed, records);
    }

    #[test]
    fn self_closing_fields_read_as_empty() {
        let xml = r#"<TestProgram><Record id="5"><Date>2024-01-01</Date><FirstName/><LastName>L</LastName></Record></TestProgram>"#;
        let parsed = parse_xml(xml).unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, 5);
        assert_eq!(parsed[0].first_name, "");
        assert_eq!(parsed[0].last_name, "L");
        assert_eq!(parsed[0].country, "");
    }

    #[test]
    fn record_without_id_is_rejected() {
        let xml = "<TestProgram><Record><Date>2024-01-01</Date></Record></TestProgram>";
        assert!(matches!(parse_xml(xml), Err(AppError::Io(_))));
    }

    #[test]
    fn invalid_date_is_rejected() {
        let xml = r#"<TestProgram><Record id="1"><Date>yesterday</Date></Record></TestProgram>"#;
        assert!(matches!(parse_xml(xml), Err(AppError::Io(_))));
    }

    #[test]
    fn write_and_read_file() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("records.xml");

        write_xml(&sample_records(), &path).expect("Failed to write");
        let parsed = read_xml(&path).expect("Failed to read");

        assert_eq!(parsed, sample_records());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        assert!(matches!(
            read_xml(&dir.path().join("missing.xml")),
            Err(AppError::Io(_))
        ));
    }
}
