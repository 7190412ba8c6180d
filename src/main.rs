//! Command-line interface for xmlbinding

#[cfg(feature = "cli")]
use clap::{Parser as ClapParser, Subcommand};
#[cfg(feature = "cli")]
use serde::Serialize;

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::io::BufReader;
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::sync::Arc;

#[cfg(feature = "cli")]
use xmlbinding::documents::Document;
#[cfg(feature = "cli")]
use xmlbinding::{
    Encoder, EncoderSettings, Parser, ParserSettings, QName, SchemaIndex, Value, XsConfiguration, XsdSchema,
};

#[cfg(feature = "cli")]
#[derive(ClapParser, Debug)]
#[command(name = "xmlbinding")]
#[command(author, version, about = "Schema-driven XML parsing and encoding", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// List the global components of an XSD schema
    Inspect {
        /// Path to the XSD schema file
        #[arg(value_name = "SCHEMA")]
        schema: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Parse an XML document and print its value as JSON
    Parse {
        /// Path to the XSD schema file
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Path to the XML file to parse
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Fail on elements without a declaration
        #[arg(long)]
        strict: bool,

        /// Report validation errors
        #[arg(long)]
        validate: bool,

        /// Stop at the first validation error
        #[arg(long)]
        fail_fast: bool,

        /// Print the values of this element one per line as they are parsed
        #[arg(long, value_name = "ELEMENT")]
        stream: Option<String>,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Parse an XML document, encode the value again and print the XML
    Roundtrip {
        /// Path to the XSD schema file
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Path to the XML file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Indent the output
        #[arg(short, long)]
        pretty: bool,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect { schema, json } => cmd_inspect(schema, json),
        Commands::Parse {
            schema,
            file,
            strict,
            validate,
            fail_fast,
            stream,
            pretty,
        } => {
            let settings = ParserSettings::new()
                .with_strict(strict)
                .with_validating(validate || fail_fast)
                .with_fail_on_validation_error(fail_fast);
            match stream {
                Some(target) => cmd_stream(schema, file, settings, &target),
                None => cmd_parse(schema, file, settings, pretty),
            }
        }
        Commands::Roundtrip {
            schema,
            file,
            pretty,
            output,
        } => cmd_roundtrip(schema, file, pretty, output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SchemaSummary {
    target_namespace: Option<String>,
    elements: Vec<ElementSummary>,
    types: Vec<TypeSummary>,
    attributes: Vec<String>,
}

#[cfg(feature = "cli")]
#[derive(Serialize, Debug)]
struct ElementSummary {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
}

#[cfg(feature = "cli")]
#[derive(Serialize, Debug)]
struct TypeSummary {
    name: String,
    kind: &'static str,
}

#[cfg(feature = "cli")]
fn cmd_inspect(schema_path: PathBuf, json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    let schema = XsdSchema::from_file(&schema_path)?;
    let index = SchemaIndex::new(vec![schema.clone()]);

    let summary = SchemaSummary {
        target_namespace: schema.target_namespace().map(str::to_string),
        elements: index
            .global_elements()
            .iter()
            .map(|e| ElementSummary {
                name: e.name.to_string(),
                type_name: index.element_type(e).display_name(),
            })
            .collect(),
        types: schema
            .types()
            .iter()
            .filter_map(|t| {
                let kind = if t.is_simple() { "simple" } else { "complex" };
                t.name().map(|n| TypeSummary {
                    name: n.to_string(),
                    kind,
                })
            })
            .collect(),
        attributes: schema.attributes().iter().map(|a| a.name.to_string()).collect(),
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("xmlbinding v{}", xmlbinding::VERSION);
    println!();
    println!(
        "Target Namespace: {}",
        summary.target_namespace.as_deref().unwrap_or("(none)")
    );
    println!("\n=== Global Elements ===");
    for element in &summary.elements {
        println!("  {} : {}", element.name, element.type_name);
    }
    println!("\n=== Global Types ===");
    for t in &summary.types {
        println!("  {} ({})", t.name, t.kind);
    }
    println!("\n=== Global Attributes ===");
    for name in &summary.attributes {
        println!("  {}", name);
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn to_json_string(value: Option<&Value>, pretty: bool) -> Result<String, serde_json::Error> {
    let json = value.map(Value::to_json).unwrap_or(serde_json::Value::Null);
    if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    }
}

#[cfg(feature = "cli")]
fn cmd_parse(
    schema_path: PathBuf,
    file: PathBuf,
    settings: ParserSettings,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = XsdSchema::from_file(&schema_path)?;
    let mut parser = Parser::new(Arc::new(XsConfiguration)).with_settings(settings.with_schema(schema));
    let value = parser.parse_file(&file)?;
    println!("{}", to_json_string(value.as_ref(), pretty)?);

    let errors = parser.validation_errors();
    if !errors.is_empty() {
        eprintln!("Validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_stream(
    schema_path: PathBuf,
    file: PathBuf,
    settings: ParserSettings,
    target: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = XsdSchema::from_file(&schema_path)?;
    let target = if target.starts_with('{') {
        QName::parse_clark(target)?
    } else {
        QName::wildcard(target)
    };
    let parser = Parser::new(Arc::new(XsConfiguration))
        .with_settings(settings.with_schema(schema).with_streaming_target(target));
    let input = BufReader::new(fs::File::open(&file)?);
    for value in parser.stream(input)? {
        println!("{}", to_json_string(Some(&value?), false)?);
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_roundtrip(
    schema_path: PathBuf,
    file: PathBuf,
    pretty: bool,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = XsdSchema::from_file(&schema_path)?;
    let xml_content = fs::read_to_string(&file)?;
    let root = Document::from_string(&xml_content)?
        .root
        .map(|e| e.qname)
        .ok_or("XML document has no root element")?;

    let mut parser =
        Parser::new(Arc::new(XsConfiguration)).with_settings(ParserSettings::new().with_schema(schema.clone()));
    let value = parser.parse_str(&xml_content)?;

    let encoder = Encoder::new(Arc::new(XsConfiguration))
        .with_schema(schema)
        .with_settings(EncoderSettings::new().with_pretty(pretty));
    let xml = encoder.encode_to_string(value.as_ref(), &root)?;

    if let Some(output_path) = output {
        fs::write(output_path, &xml)?;
    } else {
        println!("{}", xml);
    }
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
