use std::borrow::Cow;
use std::io::Write;

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Writer;

use crate::error::{Error, Result};
use crate::models::{Column, Record, StudentRecord, TeacherRecord};

use super::{ROOT, STUDENT, STUDENTS, TEACHER, TEACHERS};

const INDENT: usize = 4;

/// Serialize both tables into a complete school document.
pub fn encode(teachers: &[TeacherRecord], students: &[StudentRecord]) -> Result<Vec<u8>> {
    let mut writer = document_writer()?;
    write(&mut writer, Event::Start(BytesStart::new(ROOT)))?;
    write_collection(&mut writer, TEACHERS, TEACHER, teachers)?;
    write_collection(&mut writer, STUDENTS, STUDENT, students)?;
    write(&mut writer, Event::End(BytesEnd::new(ROOT)))?;
    Ok(finish(writer))
}

/// Serialize only the students, for the report stage. The `<students>`
/// subtree is produced by the same code path as [`encode`], so it is
/// byte-identical to the one in a full document.
pub fn encode_report_subset(students: &[StudentRecord]) -> Result<Vec<u8>> {
    let mut writer = document_writer()?;
    write(&mut writer, Event::Start(BytesStart::new(ROOT)))?;
    write_collection(&mut writer, STUDENTS, STUDENT, students)?;
    write(&mut writer, Event::End(BytesEnd::new(ROOT)))?;
    Ok(finish(writer))
}

fn document_writer() -> Result<Writer<Vec<u8>>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT);
    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    Ok(writer)
}

fn finish(writer: Writer<Vec<u8>>) -> Vec<u8> {
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    bytes
}

fn write_collection<W: Write, R: Record>(
    writer: &mut Writer<W>,
    collection: &str,
    element: &str,
    records: &[R],
) -> Result<()> {
    if records.is_empty() {
        return write(writer, Event::Empty(BytesStart::new(collection)));
    }

    write(writer, Event::Start(BytesStart::new(collection)))?;
    for record in records {
        let mut tag = BytesStart::new(element);
        for column in R::Column::ALL {
            tag.push_attribute(Attribute {
                key: QName(column.attribute().as_bytes()),
                value: Cow::Owned(escape_attribute(record.field(*column)).into_bytes()),
            });
        }
        write(writer, Event::Empty(tag))?;
    }
    write(writer, Event::End(BytesEnd::new(collection)))
}

fn write<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(|err| Error::Encoding {
        detail: err.to_string(),
    })
}

/// Escape an attribute value so any conforming parser reads back exactly the
/// same string. Whitespace other than the plain space is written as a
/// character reference because parsers normalize it inside attributes.
fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\t' => escaped.push_str("&#9;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            other => escaped.push(other),
        }
    }
    escaped
}
