use std::collections::BTreeSet;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use crate::core::error::{Error, Result};
use crate::core::types::{ParsedEdition, ParsedRecord, ParsedRedirect};
use crate::parse::isbn;

pub const REDIRECT_TYPE: &str = "/type/redirect";
pub const EDITION_TYPE: &str = "/type/edition";

/// Fields in a catalog dump line: type, key, revision, timestamp, JSON body.
pub const DUMP_FIELD_COUNT: usize = 5;

/// Id suffixes of the redirects worth keeping (works and editions).
const REDIRECT_SUFFIXES: [char; 2] = ['W', 'M'];

/// Substring in `source_records` marking archive provenance.
pub const IA_SOURCE_MARKER: &str = "ia:";

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Collect invalid ISBNs alongside the parsed edition
    pub scrub_isbns: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParseOutcome {
    pub record: Option<ParsedRecord>,
    pub invalid_isbns: Vec<String>,
}

#[derive(Deserialize)]
struct RedirectBody {
    location: Option<String>,
}

#[derive(Deserialize)]
struct EditionBody {
    key: Option<String>,
    works: Option<Vec<Value>>,
    ocaid: Option<Value>,
    isbn_10: Option<Value>,
    isbn_13: Option<Value>,
    source_records: Option<Value>,
    covers: Option<Value>,
}

/// Dispatch one split dump line on its record type.
///
/// Unknown record types are not an error; they produce no record.
pub fn parse_line(fields: &[&str], options: ParseOptions) -> Result<ParseOutcome> {
    if fields.len() != DUMP_FIELD_COUNT {
        return Err(Error::malformed(format!(
            "expected {} fields, found {}: {:?}",
            DUMP_FIELD_COUNT,
            fields.len(),
            truncate_for_log(&fields.join("\t"))
        )));
    }

    match fields[0] {
        REDIRECT_TYPE => Ok(ParseOutcome {
            record: process_redirect_line(fields)?.map(ParsedRecord::Redirect),
            invalid_isbns: Vec::new(),
        }),
        EDITION_TYPE => {
            let (edition, invalid_isbns) = parse_edition(fields, options)?;
            Ok(ParseOutcome {
                record: Some(ParsedRecord::Edition(edition)),
                invalid_isbns,
            })
        }
        _ => Ok(ParseOutcome::default()),
    }
}

/// `None` for redirects of anything other than works and editions.
pub fn process_redirect_line(fields: &[&str]) -> Result<Option<ParsedRedirect>> {
    let key_path = field(fields, 1)?;
    let origin_id = last_segment(key_path);
    if !origin_id.ends_with(REDIRECT_SUFFIXES) {
        return Ok(None);
    }

    let body: RedirectBody = decode_body(fields)?;
    let destination_id = body
        .location
        .as_deref()
        .map(last_segment)
        .and_then(nuller)
        .ok_or_else(|| Error::malformed(format!("redirect {} has no location", origin_id)))?;

    Ok(Some(ParsedRedirect::new(origin_id, destination_id)))
}

pub fn process_edition_line(fields: &[&str]) -> Result<ParsedEdition> {
    parse_edition(fields, ParseOptions::default()).map(|(edition, _)| edition)
}

fn parse_edition(fields: &[&str], options: ParseOptions) -> Result<(ParsedEdition, Vec<String>)> {
    let body: EditionBody = decode_body(fields)?;

    let edition_id = body
        .key
        .as_deref()
        .map(last_segment)
        .and_then(nuller)
        .or_else(|| fields.get(1).map(|key| last_segment(key)).and_then(nuller))
        .ok_or_else(|| Error::malformed("edition has no key".to_string()))?;

    let works = body.works.unwrap_or_default();
    let work_id = works
        .first()
        .and_then(|work| work.get("key"))
        .and_then(Value::as_str)
        .map(last_segment)
        .and_then(nuller);

    let ocaid = body.ocaid.as_ref().and_then(Value::as_str).and_then(nuller);

    let isbn_10s = strings(&body.isbn_10);
    let isbn_13s = strings(&body.isbn_13);

    let mut canonical: BTreeSet<String> = isbn_10s.iter().filter_map(|i| isbn::to_isbn13(i)).collect();
    canonical.extend(
        isbn_13s
            .iter()
            .filter(|i| isbn::looks_like_isbn13(i))
            .map(|i| isbn::canonical(i)),
    );

    let has_ia_source_record = match &body.source_records {
        Some(Value::Array(records)) => records
            .iter()
            .filter_map(Value::as_str)
            .any(|record| record.contains(IA_SOURCE_MARKER)),
        _ => false,
    };

    let has_cover = matches!(&body.covers, Some(Value::Array(covers)) if !covers.is_empty());

    let invalid_isbns = if options.scrub_isbns {
        let mut bad = isbn::bad_isbn10s(isbn_10s.iter().copied());
        bad.extend(isbn::bad_isbn13s(isbn_13s.iter().copied()));
        bad
    } else {
        Vec::new()
    };

    let edition = ParsedEdition {
        edition_id: edition_id.to_string(),
        work_id: work_id.map(str::to_string),
        ocaid: ocaid.map(str::to_string),
        isbn_13: canonical.iter().next_back().cloned(),
        has_multiple_works: works.len() > 1,
        has_ia_source_record,
        has_cover,
        isbn_13s: canonical.into_iter().collect::<Vec<_>>().join(","),
    };

    Ok((edition, invalid_isbns))
}

/// Empty strings stand for "absent".
pub fn nuller(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}

/// Trailing path segment: `/books/OL1M` -> `OL1M`.
pub fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path).trim()
}

fn field<'a>(fields: &[&'a str], index: usize) -> Result<&'a str> {
    fields
        .get(index)
        .copied()
        .ok_or_else(|| Error::malformed(format!("missing field {} in {:?}", index, fields)))
}

/// The JSON body of a dump line. Decode failures name the record key and
/// carry the (truncated) line.
fn decode_body<T: DeserializeOwned>(fields: &[&str]) -> Result<T> {
    serde_json::from_str(field(fields, 4)?).map_err(|e| {
        Error::malformed(format!(
            "undecodable body for {}: {}: {:?}",
            fields.get(1).copied().unwrap_or("<no key>"),
            e,
            truncate_for_log(&fields.join("\t"))
        ))
    })
}

/// String members of a list field; a bare string counts as a one-element list.
fn strings(value: &Option<Value>) -> Vec<&str> {
    match value {
        Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(value)) => vec![value.as_str()],
        _ => Vec::new(),
    }
}

fn truncate_for_log(line: &str) -> &str {
    match line.char_indices().nth(200) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    const REDIRECT_BODY: &str = r#"{"created": {"type": "/type/datetime", "value": "2008-04-01T03:28:50.625462"}, "covers": [5685889], "latest_revision": 3, "location": "/books/OL002M", "key": "/books/OL001M", "type": {"key": "/type/redirect"}, "revision": 3}"#;

    const MULTI_WORKS_BODY: &str = r#"{"publishers": ["Addison-Wesley"], "isbn_10": ["0201570513"], "covers": [3858623], "key": "/books/OL1002158M", "source_records": ["marc:marc_records_scriblio_net/part25.dat:199740929:947", "ia:organizinggenius00benn", null], "title": "Organizing genius", "works": [{"key": "/works/OL1883432W"}, {"key": "/works/OL0000000W"}], "type": {"key": "/type/edition"}, "ocaid": "organizinggenius0000benn"}"#;

    const NO_WORK_BODY: &str = r#"{"publishers": ["Stationery Office Books"], "key": "/books/OL10000149M", "isbn_13": ["9780107805548"], "isbn_10": ["0107805545"], "title": "40house of Lords Official Report", "type": {"key": "/type/edition"}}"#;

    fn line<'a>(kind: &'a str, key: &'a str, body: &'a str) -> Vec<&'a str> {
        vec![kind, key, "3", "2010-04-14T02:53:24.620268", body]
    }

    fn edition(outcome: ParseOutcome) -> ParsedEdition {
        match outcome.record {
            Some(ParsedRecord::Edition(edition)) => edition,
            other => panic!("expected an edition, got {:?}", other),
        }
    }

    #[test]
    fn edition_redirect_yields_origin_and_destination() {
        let outcome = parse_line(&line(REDIRECT_TYPE, "/books/OL001M", REDIRECT_BODY), ParseOptions::default()).unwrap();
        assert_eq!(
            outcome.record,
            Some(ParsedRecord::Redirect(ParsedRedirect::new("OL001M", "OL002M")))
        );
    }

    #[test]
    fn author_redirect_is_skipped() {
        let body = r#"{"location": "/authors/OL3894951A"}"#;
        let outcome = parse_line(&line(REDIRECT_TYPE, "/authors/OL10219261A", body), ParseOptions::default()).unwrap();
        assert_eq!(outcome.record, None);
    }

    #[test]
    fn redirect_without_location_is_malformed() {
        let err = process_redirect_line(&line(REDIRECT_TYPE, "/works/OL1W", "{}")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedRecord);
    }

    #[test]
    fn first_of_many_works_is_kept_and_flagged() {
        let parsed = edition(parse_line(&line(EDITION_TYPE, "/books/OL1002158M", MULTI_WORKS_BODY), ParseOptions::default()).unwrap());
        assert_eq!(
            parsed,
            ParsedEdition {
                edition_id: "OL1002158M".to_string(),
                work_id: Some("OL1883432W".to_string()),
                ocaid: Some("organizinggenius0000benn".to_string()),
                isbn_13: Some("9780201570519".to_string()),
                has_multiple_works: true,
                has_ia_source_record: true,
                has_cover: true,
                isbn_13s: "9780201570519".to_string(),
            }
        );
    }

    #[test]
    fn edition_without_work_has_no_work_id() {
        let parsed = process_edition_line(&line(EDITION_TYPE, "/books/OL10000149M", NO_WORK_BODY)).unwrap();
        assert_eq!(parsed.work_id, None);
        assert_eq!(parsed.ocaid, None);
        assert!(!parsed.has_multiple_works);
        assert!(!parsed.has_ia_source_record);
        assert!(!parsed.has_cover);
        // The ISBN-10 converts to the ISBN-13 already listed.
        assert_eq!(parsed.isbn_13s, "9780107805548");
    }

    #[test]
    fn isbn10s_are_converted_and_unioned_with_isbn13s() {
        let body = r#"{"key": "/books/OL1M", "isbn_10": ["0201570513", "145167550X"], "isbn_13": ["1234567890123"]}"#;
        let parsed = process_edition_line(&line(EDITION_TYPE, "/books/OL1M", body)).unwrap();

        let set: Vec<&str> = parsed.isbn_13_list().collect();
        assert!(set.contains(&"9780201570519"));
        assert!(set.contains(&"9781451675504"));
        assert!(set.contains(&"1234567890123"));
        assert_eq!(set.len(), 3);

        let chosen = parsed.isbn_13.clone().unwrap();
        assert!(set.contains(&chosen.as_str()));
        assert!(!chosen.contains(','));
    }

    #[test]
    fn scrubbing_collects_invalid_isbns() {
        let body = r#"{"key": "/books/OL10000149M", "isbn_13": ["9780107805548", "XYZ", ""], "isbn_10": ["0107805545", "X111111111"]}"#;
        let options = ParseOptions { scrub_isbns: true };
        let outcome = parse_line(&line(EDITION_TYPE, "/books/OL10000149M", body), options).unwrap();

        assert_eq!(outcome.invalid_isbns, vec!["X111111111", "XYZ"]);
        assert_eq!(edition(outcome).isbn_13s, "9780107805548");
    }

    #[test]
    fn other_record_types_are_ignored() {
        let body = r#"{"type": {"key": "/type/author"}, "name": "Brian D. Egger", "key": "/authors/OL10001673A"}"#;
        let outcome = parse_line(&line("/type/author", "/authors/OL001A", body), ParseOptions::default()).unwrap();
        assert_eq!(outcome, ParseOutcome::default());
    }

    #[test]
    fn short_line_is_malformed() {
        let err = parse_line(&["/type/redirect", "/books/OL005M"], ParseOptions::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedRecord);
    }

    #[test]
    fn undecodable_body_is_malformed() {
        let err = parse_line(&line(EDITION_TYPE, "/books/OL1M", "{not json"), ParseOptions::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedRecord);
    }

    #[test]
    fn undecodable_body_names_the_record() {
        let body = r#"{"key": "/books/OL77M", broken"#;
        let err = parse_line(&line(EDITION_TYPE, "/books/OL77M", body), ParseOptions::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedRecord);
        assert!(err.context.contains("/books/OL77M"));
        assert!(err.context.contains("broken"));

        let err = parse_line(&line(REDIRECT_TYPE, "/works/OL9W", "[1, 2"), ParseOptions::default()).unwrap_err();
        assert!(err.context.contains("/works/OL9W"));
    }

    #[test]
    fn bare_string_isbns_keep_the_edition() {
        let body = r#"{"key": "/books/OL5M", "works": [{"key": "/works/OL5W"}], "ocaid": "item5", "covers": [12], "isbn_13": "9780201570519", "isbn_10": "0107805545"}"#;
        let parsed = process_edition_line(&line(EDITION_TYPE, "/books/OL5M", body)).unwrap();
        assert_eq!(parsed.work_id.as_deref(), Some("OL5W"));
        assert_eq!(parsed.ocaid.as_deref(), Some("item5"));
        assert!(parsed.has_cover);
        assert_eq!(parsed.isbn_13s, "9780107805548,9780201570519");
        assert_eq!(parsed.isbn_13.as_deref(), Some("9780201570519"));
    }

    #[test]
    fn empty_ocaid_is_absent() {
        let body = r#"{"key": "/books/OL7M", "ocaid": "", "covers": []}"#;
        let parsed = process_edition_line(&line(EDITION_TYPE, "/books/OL7M", body)).unwrap();
        assert_eq!(parsed.ocaid, None);
        assert!(!parsed.has_cover);
        assert_eq!(parsed.isbn_13, None);
    }
}
