use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::models::{Column, StudentColumn, StudentRecord, TeacherColumn, TeacherRecord};

use super::{STUDENT, TEACHER};

/// Both tables read from one document, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub teachers: Vec<TeacherRecord>,
    pub students: Vec<StudentRecord>,
}

/// Parse a school document.
///
/// Every `teacher` and `student` element is collected wherever it appears.
/// Missing attributes read as empty strings and anything outside the schema is
/// skipped. The only failure is a document that is not well-formed XML.
///
/// Attribute values are normalised as any conforming parser would: literal
/// tabs and line breaks become spaces, while character references such as
/// `&#10;` keep the character they name.
pub fn decode(source: &[u8]) -> Result<Decoded> {
    let text = std::str::from_utf8(source).map_err(|err| Error::MalformedDocument {
        position: err.valid_up_to(),
        detail: "document is not valid UTF-8".to_string(),
    })?;

    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut decoded = Decoded::default();
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| malformed(&reader, err.to_string()))?;

        match event {
            Event::Start(element) => {
                open_element(&reader, &mut depth, &mut seen_root)?;
                collect(&reader, &element, &mut decoded)?;
            }
            Event::Empty(element) => {
                open_element(&reader, &mut depth, &mut seen_root)?;
                depth -= 1;
                collect(&reader, &element, &mut decoded)?;
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed(&reader, "unexpected closing tag".to_string()))?;
            }
            Event::Text(text) => {
                if depth == 0 && text.iter().any(|byte| !byte.is_ascii_whitespace()) {
                    return Err(malformed(&reader, "text outside the root element".to_string()));
                }
                text.unescape()
                    .map_err(|err| malformed(&reader, err.to_string()))?;
            }
            Event::CData(_) if depth == 0 => {
                return Err(malformed(&reader, "CDATA outside the root element".to_string()));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(malformed(&reader, "document has no root element".to_string()));
    }
    if depth != 0 {
        return Err(malformed(&reader, "document ended inside an element".to_string()));
    }

    Ok(decoded)
}

fn open_element(reader: &Reader<&[u8]>, depth: &mut usize, seen_root: &mut bool) -> Result<()> {
    if *depth == 0 {
        if *seen_root {
            return Err(malformed(reader, "more than one root element".to_string()));
        }
        *seen_root = true;
    }
    *depth += 1;
    Ok(())
}

/// Check every attribute of `element` and keep the row if it is a record.
fn collect(reader: &Reader<&[u8]>, element: &BytesStart<'_>, decoded: &mut Decoded) -> Result<()> {
    let attributes = read_attributes(reader, element)?;

    match element.local_name().as_ref() {
        name if name == TEACHER.as_bytes() => {
            let mut teacher = TeacherRecord::default();
            assign(attributes, |column: TeacherColumn, value| match column {
                TeacherColumn::FullName => teacher.full_name = value,
                TeacherColumn::Subject => teacher.subject = value,
                TeacherColumn::Classes => teacher.classes = value,
            });
            decoded.teachers.push(teacher);
        }
        name if name == STUDENT.as_bytes() => {
            let mut student = StudentRecord::default();
            assign(attributes, |column: StudentColumn, value| match column {
                StudentColumn::FullName => student.full_name = value,
                StudentColumn::ClassName => student.class_name = value,
                StudentColumn::Performance => student.performance = value,
            });
            decoded.students.push(student);
        }
        _ => {}
    }
    Ok(())
}

/// Every attribute of `element` as (local name, value). Duplicate names,
/// unquoted values and bad references are rejected.
fn read_attributes(
    reader: &Reader<&[u8]>,
    element: &BytesStart<'_>,
) -> Result<Vec<(Vec<u8>, String)>> {
    element
        .attributes()
        .map(|attribute| {
            let attribute = attribute.map_err(|err| malformed(reader, err.to_string()))?;
            let value = attribute_value(&attribute.value).map_err(|detail| malformed(reader, detail))?;
            Ok((attribute.key.local_name().as_ref().to_vec(), value))
        })
        .collect()
}

fn attribute_value(raw: &[u8]) -> std::result::Result<String, String> {
    let raw = std::str::from_utf8(raw).map_err(|err| err.to_string())?;
    if raw.contains('<') {
        return Err("`<` is not allowed in an attribute value".to_string());
    }
    let normalised = raw.replace("\r\n", " ").replace(['\r', '\n', '\t'], " ");
    unescape(&normalised)
        .map(|value| value.into_owned())
        .map_err(|err| err.to_string())
}

/// Hand each attribute that names a column of `C` to `assign`.
fn assign<C, F>(attributes: Vec<(Vec<u8>, String)>, mut assign: F)
where
    C: Column,
    F: FnMut(C, String),
{
    for (key, value) in attributes {
        if let Some(column) = C::ALL
            .iter()
            .copied()
            .find(|column| column.attribute().as_bytes() == key.as_slice())
        {
            assign(column, value);
        }
    }
}

fn malformed(reader: &Reader<&[u8]>, detail: String) -> Error {
    Error::MalformedDocument {
        position: reader.buffer_position(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_attributes_decode_to_empty() {
        let decoded = decode(br#"<school><students><student name="Kim"/></students></school>"#).unwrap();
        assert_eq!(decoded.students, [StudentRecord::new("Kim", "", "")]);
    }

    #[test]
    fn attribute_order_does_not_matter() {
        let decoded = decode(
            br#"<school><teachers><teacher classes="9A" name="Lee" subject="Art"></teacher></teachers></school>"#,
        )
        .unwrap();
        assert_eq!(decoded.teachers, [TeacherRecord::new("Lee", "Art", "9A")]);
    }

    #[test]
    fn unknown_elements_and_attributes_are_ignored() {
        let source = br#"<?xml version="1.0" encoding="UTF-8"?>
<!-- exported by hand -->
<school version="2">
    <principal name="Head"/>
    <teachers>
        <teacher name="A" subject="Math" classes="5A" room="12">notes</teacher>
    </teachers>
    <students>
        <student name="B" class="5A" performance="good" id="7"/>
    </students>
</school>"#;
        let decoded = decode(source).unwrap();
        assert_eq!(decoded.teachers, [TeacherRecord::new("A", "Math", "5A")]);
        assert_eq!(decoded.students, [StudentRecord::new("B", "5A", "good")]);
    }

    #[test]
    fn records_follow_document_order() {
        let source = br#"<school>
            <students><student name="s1"/></students>
            <teachers><teacher name="t1"/><teacher name="t2"/></teachers>
            <students><student name="s2"/></students>
        </school>"#;
        let decoded = decode(source).unwrap();
        let teachers: Vec<_> = decoded.teachers.iter().map(|t| t.full_name.as_str()).collect();
        let students: Vec<_> = decoded.students.iter().map(|s| s.full_name.as_str()).collect();
        assert_eq!(teachers, ["t1", "t2"]);
        assert_eq!(students, ["s1", "s2"]);
    }

    #[test]
    fn character_references_are_resolved() {
        let decoded = decode(
            br#"<school><teachers><teacher name="a&#10;b&#x9;c" subject="&lt;&amp;&gt;" classes="&quot;&apos;"/></teachers></school>"#,
        )
        .unwrap();
        assert_eq!(decoded.teachers, [TeacherRecord::new("a\nb\tc", "<&>", "\"'")]);
    }

    #[test]
    fn literal_whitespace_in_attributes_becomes_spaces() {
        let decoded = decode(b"<school><teacher name=\"a\r\nb\tc\" subject=\"x\ny\" classes=\"\r5A\"/></school>").unwrap();
        assert_eq!(decoded.teachers, [TeacherRecord::new("a b c", "x y", " 5A")]);
    }

    #[test]
    fn entities_in_text_are_accepted_when_valid() {
        let decoded = decode(b"<school>notes &amp; &#65;<teacher name=\"A\"/></school>").unwrap();
        assert_eq!(decoded.teachers.len(), 1);
    }

    #[test]
    fn malformed_documents_are_rejected() {
        let cases: &[&[u8]] = &[
            b"",
            b"not xml at all",
            b"<school><teachers></school>",
            b"<school><teachers>",
            b"<school/><school/>",
            b"<school><teacher name=\"unterminated/></school>",
            b"<school><teacher name=\"&bogus;\"/></school>",
            b"</school>",
            &[0x3c, 0x73, 0xff, 0x3e],
            b"<school foo=bar><teachers/></school>",
            b"<school><x a=\"1\" a=\"2\"/></school>",
            b"<school>a & b</school>",
            b"<teacher name=\"a<b\"/>",
            b"<teachers>&bogus;</teachers>",
            b"<school><principal title=\"&nope;\"/></school>",
        ];
        for case in cases {
            match decode(case) {
                Err(Error::MalformedDocument { .. }) => {}
                other => panic!("{:?} decoded as {other:?}", String::from_utf8_lossy(case)),
            }
        }
    }
}
