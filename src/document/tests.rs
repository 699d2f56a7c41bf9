use super::*;
use tempfile::TempDir;

/// Minimal PDF with one line of Helvetica text per page
fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let font_id = 3 + 2 * pages.len();
    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", 3 + 2 * i))
        .collect();

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ),
    ];
    for (i, text) in pages.iter().enumerate() {
        let content = format!("BT /F1 24 Tf 72 700 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 {} 0 R >> >> /Contents {} 0 R >>",
            font_id,
            4 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
    }

    let xref_offset = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    pdf
}

#[test]
fn pdf_pages_are_extracted_separately() {
    let bytes = pdf_with_pages(&["First page text", "Second page text"]);

    let pages = extract_pdf_pages(&bytes).expect("should extract");

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].number, 1);
    assert!(pages[0].text.contains("First page text"));
    assert!(!pages[0].text.contains("Second"));
    assert_eq!(pages[1].number, 2);
    assert!(pages[1].text.contains("Second page text"));
}

#[tokio::test]
async fn pdf_parser_keeps_page_numbers() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("report.pdf");
    std::fs::write(&path, pdf_with_pages(&["Revenue grew", "Costs fell", "Outlook is stable"]))
        .expect("should write file");

    let pages = ExtensionParser.parse(&path).await.expect("should parse");

    let numbers: Vec<usize> = pages.iter().map(|page| page.number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert!(pages[2].text.contains("Outlook is stable"));
}

#[test]
fn blank_pages_leave_gaps() {
    let pages = number_pages(["First page", "", "  Third page  \n"]);

    assert_eq!(
        pages,
        vec![
            Page {
                number: 1,
                text: "First page".to_string()
            },
            Page {
                number: 3,
                text: "Third page".to_string()
            },
        ]
    );
}

#[test]
fn blank_text_has_no_pages() {
    assert!(number_pages(["  \n", " \t"]).is_empty());
}

#[test]
fn garbage_is_not_a_pdf() {
    assert!(extract_pdf_pages(b"definitely not a pdf").is_err());
}

#[tokio::test]
async fn plain_text_parser_reads_single_page() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("notes.txt");
    std::fs::write(&path, "The sky is blue. Grass is green.").expect("should write file");

    let pages = ExtensionParser.parse(&path).await.expect("should parse");

    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].text, "The sky is blue. Grass is green.");
}

#[tokio::test]
async fn missing_file_is_unreadable() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("missing.pdf");

    let result = PdfParser.parse(&path).await;

    assert!(matches!(
        result,
        Err(SynapseError::UnreadableDocument { .. })
    ));
}

#[tokio::test]
async fn corrupt_pdf_is_unreadable() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("broken.pdf");
    std::fs::write(&path, b"%PDF-1.4 truncated").expect("should write file");

    let result = ExtensionParser.parse(&path).await;

    match result {
        Err(SynapseError::UnreadableDocument { path: reported, .. }) => {
            assert!(reported.ends_with("broken.pdf"));
        }
        other => panic!("expected UnreadableDocument, got {:?}", other),
    }
}

#[tokio::test]
async fn unknown_extension_is_unreadable() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("image.png");
    std::fs::write(&path, b"\x89PNG").expect("should write file");

    let result = ExtensionParser.parse(&path).await;

    assert!(matches!(
        result,
        Err(SynapseError::UnreadableDocument { .. })
    ));
}

#[tokio::test]
async fn invalid_utf8_text_is_unreadable() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("binary.txt");
    std::fs::write(&path, [0xff, 0xfe, 0x00]).expect("should write file");

    assert!(PlainTextParser.parse(&path).await.is_err());
}
