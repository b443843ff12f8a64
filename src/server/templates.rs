//! HTML pages served by the upload service.

use crate::db::CandidateRecord;

/// Column headings of the records table, in display order
pub const RECORD_COLUMNS: [&str; 9] = [
    "id",
    "name",
    "dob",
    "email",
    "phone",
    "address",
    "training",
    "certifications",
    "family",
];

const STYLE: &str = "body { font-family: sans-serif; margin: 2rem; }\n\
    table { border-collapse: collapse; }\n\
    th, td { border: 1px solid #999; padding: 0.4rem; vertical-align: top; }\n\
    td { white-space: pre-wrap; }";

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>\n{STYLE}\n</style>\n</head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

pub fn upload_page() -> String {
    page(
        "Upload Candidate Form",
        "<h1>Upload Candidate Form</h1>\n\
         <form action=\"/upload\" method=\"post\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"file\" accept=\"image/*,application/pdf\">\n\
         <button type=\"submit\">Upload</button>\n\
         </form>\n\
         <p><a href=\"/records\">View extracted records</a></p>",
    )
}

pub fn records_page(records: &[CandidateRecord]) -> String {
    let header = RECORD_COLUMNS
        .iter()
        .map(|column| format!("<th>{column}</th>"))
        .collect::<String>();

    let rows = records
        .iter()
        .map(|record| {
            let cells = record
                .fields
                .as_pairs()
                .iter()
                .map(|(_, value)| format!("<td>{}</td>", html_escape(value)))
                .collect::<String>();
            format!("<tr><td>{}</td>{}</tr>\n", record.id, cells)
        })
        .collect::<String>();

    page(
        "Extracted Records",
        &format!(
            "<h1>Extracted Records</h1>\n<p><a href=\"/\">Upload another form</a></p>\n\
             <table>\n<thead><tr>{header}</tr></thead>\n<tbody>\n{rows}</tbody>\n</table>"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::CandidateFields;

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("<script>alert(\"x\") & 'y'</script>"),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_upload_page_has_file_field() {
        let html = upload_page();
        assert!(html.contains("enctype=\"multipart/form-data\""));
        assert!(html.contains("name=\"file\""));
        assert!(html.contains("action=\"/upload\""));
    }

    #[test]
    fn test_records_page_escapes_values() {
        let record = CandidateRecord {
            id: 3,
            fields: CandidateFields {
                name: "<b>Eve</b>".to_string(),
                training: "line one\nline two".to_string(),
                ..Default::default()
            },
        };

        let html = records_page(&[record]);
        assert!(html.contains("<td>3</td>"));
        assert!(html.contains("&lt;b&gt;Eve&lt;/b&gt;"));
        assert!(!html.contains("<b>Eve</b>"));
        assert!(html.contains("line one\nline two"));
        assert!(html.contains("white-space: pre-wrap"));
        for column in RECORD_COLUMNS {
            assert!(html.contains(&format!("<th>{column}</th>")));
        }
    }
}
