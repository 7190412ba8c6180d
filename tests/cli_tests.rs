//! CLI integration tests
//!
//! These tests run the built binary against schemas and documents written
//! to a temporary directory.

#![cfg(feature = "cli")]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
    xmlns="urn:lib" targetNamespace="urn:lib" elementFormDefault="qualified">
  <xs:element name="library">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="book" type="Book" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:complexType name="Book">
    <xs:sequence>
      <xs:element name="title" type="xs:string"/>
      <xs:element name="pages" type="xs:integer"/>
    </xs:sequence>
    <xs:attribute name="isbn" type="xs:string" use="required"/>
  </xs:complexType>
  <xs:simpleType name="Rating">
    <xs:restriction base="xs:integer"/>
  </xs:simpleType>
</xs:schema>"#;

const LIBRARY: &str = r#"<library xmlns="urn:lib">
  <book isbn="1"><title>Dune</title><pages>412</pages></book>
  <book isbn="2"><title>Emma</title><pages>474</pages></book>
</library>"#;

fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_xmlbinding"))
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(xml: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("library.xsd"), XSD).unwrap();
        std::fs::write(dir.path().join("library.xml"), xml).unwrap();
        Self { dir }
    }

    fn schema(&self) -> PathBuf {
        self.dir.path().join("library.xsd")
    }

    fn document(&self) -> PathBuf {
        self.dir.path().join("library.xml")
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn run(args: &[&Path]) -> Output {
    Command::new(bin())
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

// ============================================================================
// Inspect Command Tests
// ============================================================================

#[test]
fn test_cli_inspect_basic() {
    let fixture = Fixture::new(LIBRARY);
    let output = run(&[Path::new("inspect"), &fixture.schema()]);
    let stdout = stdout(&output);

    assert!(output.status.success(), "inspect should succeed");
    assert!(stdout.contains("xmlbinding v"), "should show version");
    assert!(stdout.contains("urn:lib"), "should show namespace");
    assert!(stdout.contains("library"), "should list the global element");
    assert!(stdout.contains("Book (complex)"), "should list complex types");
    assert!(stdout.contains("Rating (simple)"), "should list simple types");
}

#[test]
fn test_cli_inspect_json_output() {
    let fixture = Fixture::new(LIBRARY);
    let output = run(&[Path::new("inspect"), Path::new("--json"), &fixture.schema()]);
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("should be valid JSON");
    assert_eq!(json["targetNamespace"], "urn:lib");
    assert_eq!(json["elements"].as_array().unwrap().len(), 1);
    assert_eq!(json["types"].as_array().unwrap().len(), 2);
}

#[test]
fn test_cli_inspect_missing_file() {
    let output = run(&[Path::new("inspect"), Path::new("/nonexistent/schema.xsd")]);
    assert!(!output.status.success());
}

// ============================================================================
// Parse Command Tests
// ============================================================================

#[test]
fn test_cli_parse_prints_json() {
    let fixture = Fixture::new(LIBRARY);
    let output = run(&[
        Path::new("parse"),
        Path::new("--schema"),
        &fixture.schema(),
        &fixture.document(),
    ]);
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let books = json["book"].as_array().unwrap();
    assert_eq!(books.len(), 2);
    assert_eq!(books[0]["@isbn"], "1");
    assert_eq!(books[0]["title"], "Dune");
    assert_eq!(books[1]["pages"], 474);
}

#[test]
fn test_cli_parse_reports_validation_errors() {
    let fixture = Fixture::new(r#"<library xmlns="urn:lib"><book><title>X</title></book></library>"#);
    let output = run(&[
        Path::new("parse"),
        Path::new("--validate"),
        Path::new("--schema"),
        &fixture.schema(),
        &fixture.document(),
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Validation errors"));
}

#[test]
fn test_cli_parse_stream_prints_lines() {
    let fixture = Fixture::new(LIBRARY);
    let output = run(&[
        Path::new("parse"),
        Path::new("--stream"),
        Path::new("book"),
        Path::new("--schema"),
        &fixture.schema(),
        &fixture.document(),
    ]);
    assert!(output.status.success());

    let lines: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1]["title"], "Emma");
}

// ============================================================================
// Roundtrip Command Tests
// ============================================================================

#[test]
fn test_cli_roundtrip_writes_output() {
    let fixture = Fixture::new(LIBRARY);
    let target = fixture.path("out.xml");
    let output = run(&[
        Path::new("roundtrip"),
        Path::new("--schema"),
        &fixture.schema(),
        &fixture.document(),
        Path::new("--output"),
        &target,
    ]);
    assert!(output.status.success());

    let written = std::fs::read_to_string(&target).unwrap();
    assert!(written.starts_with("<?xml"));
    assert!(written.contains(r#"<book isbn="2"><title>Emma</title><pages>474</pages></book>"#));
}

#[test]
fn test_cli_help() {
    let output = Command::new(bin())
        .arg("--help")
        .output()
        .expect("Failed to execute command");
    let stdout = stdout(&output);
    assert!(output.status.success());
    assert!(stdout.contains("inspect"));
    assert!(stdout.contains("parse"));
    assert!(stdout.contains("roundtrip"));
}
