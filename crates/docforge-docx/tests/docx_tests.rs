use docforge_core::{
    discover, BatchGenerator, BatchOptions, CancelToken, DocumentSettings, FillableDocument,
    Mapping, MappingEntry, NoConversion, PagePreset, Record, SilentProgress, TemplateEngine,
    TemplateSource,
};
use docforge_docx::{DocxDocument, DocxTemplate, Package};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#;

const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer" Target="footer1.xml"/></Relationships>"#;

fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{body}<w:sectPr><w:headerReference w:type="default" r:id="rId1"/><w:footerReference w:type="default" r:id="rId2"/><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440"/></w:sectPr></w:body></w:document>"#
    )
}

fn part(root: &str, body: &str) -> String {
    format!(
        r#"<w:{root} xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">{body}</w:{root}>"#
    )
}

fn docx(body: &str, header: &str, footer: &str) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<()> = FileOptions::default();
    let files = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("word/document.xml", document_xml(body)),
        ("word/_rels/document.xml.rels", RELS.to_string()),
        ("word/header1.xml", part("hdr", header)),
        ("word/footer1.xml", part("ftr", footer)),
        ("word/media/logo.bin", "binary".to_string()),
    ];
    for (name, content) in files {
        zip.start_file(name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn para(runs: &[&str]) -> String {
    let runs: String = runs
        .iter()
        .map(|t| format!(r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">{t}</w:t></w:r>"#))
        .collect();
    format!("<w:p>{runs}</w:p>")
}

fn letter() -> Vec<u8> {
    let body = [
        para(&["Dear #NA", "ME,"]),
        para(&["#IF(VIP=yes)"]),
        para(&["Thanks for being a VIP."]),
        para(&["#ENDIF"]),
        format!(
            "<w:tbl><w:tr><w:tc>{}</w:tc><w:tc>{}</w:tc></w:tr></w:tbl>",
            para(&["Code"]),
            para(&["#CODE"])
        ),
    ]
    .concat();
    docx(&body, &para(&["Ref #CODE"]), &para(&["Page footer #NAME"]))
}

fn engine_for(template: &DocxTemplate) -> TemplateEngine {
    let discovery = template.discover().unwrap();
    TemplateEngine::new(Mapping::identity(&discovery, &[]), &discovery)
}

#[test]
fn test_reads_blocks_in_model_order() {
    let document = DocxDocument::from_bytes(&letter()).unwrap();
    let content = document.content();
    assert_eq!(content.body.len(), 4);
    assert_eq!(content.tables.len(), 1);
    assert_eq!(content.sections.len(), 1);
    assert!(content.sections[0].header.is_some());
    assert!(content.sections[0].footer.is_some());
    assert_eq!(
        content.plain_text(),
        "Dear #NAME,\n#IF(VIP=yes)\nThanks for being a VIP.\n#ENDIF\nCode\n#CODE\nRef #CODE\nPage footer #NAME"
    );
    assert!(content.body[0].runs[0].style.bold);

    let discovery = discover(content);
    assert_eq!(discovery.placeholders, vec!["#CODE", "#NAME"]);
    assert_eq!(discovery.rows_per_document, 2);
    assert_eq!(
        document.part_names().collect::<Vec<_>>(),
        vec!["word/document.xml", "word/header1.xml", "word/footer1.xml"]
    );
}

#[test]
fn test_fill_and_save_roundtrip() {
    let template = DocxTemplate::from_bytes(&letter()).unwrap();
    let engine = engine_for(&template);

    let mut document = template.open().unwrap();
    let record = Record::from_pairs([("NAME", "Ada <Lovelace>"), ("VIP", "YES"), ("CODE", "A-1")]);
    engine.fill_record(document.content_mut(), &record);

    let bytes = document.to_bytes().unwrap();
    let reopened = DocxDocument::from_bytes(&bytes).unwrap();
    assert_eq!(
        reopened.content().plain_text(),
        "Dear Ada <Lovelace>,\n\nThanks for being a VIP.\n\nCode\nA-1\nRef A-1\nPage footer Ada <Lovelace>"
    );
    // run-boundary placeholder collapses into the first run, formatting kept
    assert_eq!(reopened.content().body[0].runs[0].text, "Dear Ada <Lovelace>,");
    assert!(reopened.content().body[0].runs[0].style.bold);

    let package = Package::from_bytes(&bytes).unwrap();
    assert_eq!(package.get("word/media/logo.bin"), Some(&b"binary"[..]));
    let xml = String::from_utf8(package.get("word/document.xml").unwrap().to_vec()).unwrap();
    assert!(xml.contains("Ada &lt;Lovelace&gt;"));
}

#[test]
fn test_false_condition_clears_region() {
    let template = DocxTemplate::from_bytes(&letter()).unwrap();
    let engine = engine_for(&template);
    let mut document = template.open().unwrap();
    engine.fill_record(
        document.content_mut(),
        &Record::from_pairs([("NAME", "Bo"), ("VIP", "no")]),
    );
    let reopened = DocxDocument::from_bytes(&document.to_bytes().unwrap()).unwrap();
    let text = reopened.content().plain_text();
    assert!(!text.contains("VIP"));
    assert!(!text.contains('#'));
}

#[test]
fn test_settings_written_to_package() {
    let template = DocxTemplate::from_bytes(&letter()).unwrap();
    let engine = engine_for(&template)
        .with_settings(&DocumentSettings {
            page_size: PagePreset::Letter,
            font_name: Some("Calibri".to_string()),
            font_size: Some(11.0),
            ..DocumentSettings::default()
        })
        .unwrap();
    let mut document = template.open().unwrap();
    engine.fill_record(document.content_mut(), &Record::from_pairs([("NAME", "Ada")]));

    let reopened = DocxDocument::from_bytes(&document.to_bytes().unwrap()).unwrap();
    let content = reopened.content();
    let page = content.sections[0].page.unwrap();
    assert!((page.width - 8.5).abs() < 0.01);
    assert!((page.height - 11.0).abs() < 0.01);
    for paragraph in content.paragraphs() {
        for run in &paragraph.runs {
            assert_eq!(run.style.font_name.as_deref(), Some("Calibri"));
            assert_eq!(run.style.font_size, Some(11.0));
            assert!(run.style.bold);
        }
    }
}

#[test]
fn test_structure_change_rejected() {
    let mut document = DocxDocument::from_bytes(&letter()).unwrap();
    document.content_mut().body.pop();
    assert!(document.to_bytes().is_err());
}

#[test]
fn test_shared_header_part_listed_once() {
    let body = format!(
        r#"{}<w:p><w:pPr><w:sectPr><w:headerReference w:type="default" r:id="rId1"/></w:sectPr></w:pPr></w:p>"#,
        para(&["first section"])
    );
    let document = DocxDocument::from_bytes(&docx(&body, &para(&["#TITLE"]), "")).unwrap();
    let content = document.content();
    assert_eq!(content.sections.len(), 2);
    assert!(content.sections[0].header.is_some());
    assert!(content.sections[1].header.is_none());
    assert_eq!(discover(content).occurrences_of("#TITLE"), 1);
}

#[test]
fn test_batch_writes_docx_files() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = dir.path().join("letter.docx");
    std::fs::write(&template_path, letter()).unwrap();

    let template = DocxTemplate::from_path(&template_path).unwrap();
    let mut mapping = Mapping::identity(&template.discover().unwrap(), &[]);
    mapping.insert("#CODE", MappingEntry::literal("FIXED"));
    let engine = TemplateEngine::new(mapping, &template.discover().unwrap());
    let out = dir.path().join("out");
    let generator = BatchGenerator::new(template, engine, BatchOptions::new(&out));

    let records = vec![
        Record::from_pairs([("NAME", "Ada Lovelace")]),
        Record::from_pairs([("NAME", "Grace")]),
    ];
    let report = generator
        .run(&records, &mut NoConversion, &SilentProgress, &CancelToken::new())
        .unwrap();
    assert_eq!(report.documents.len(), 2);

    let first = DocxDocument::from_path(out.join("0001_Ada_Lovelace.docx")).unwrap();
    assert!(first.content().plain_text().contains("Ref FIXED"));
    assert!(out.join("0002_Grace.docx").exists());
}
