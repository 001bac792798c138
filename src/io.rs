//! Graph readers/writers and format dispatch
//!
//! Graph files are deserialized straight into [`Graph`] with no field remapping.
//! The format is chosen from the file extension through a [`FormatRegistry`].

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{LayoutError, LayoutResult};
use crate::graph::Graph;

/// Structured text encodings shared by graph and parameter files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Json,
    Yaml,
}

impl TextFormat {
    pub const ALL: [TextFormat; 2] = [TextFormat::Json, TextFormat::Yaml];

    /// File extensions that select this format
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            TextFormat::Json => &["json"],
            TextFormat::Yaml => &["yaml", "yml"],
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            TextFormat::Json => "json",
            TextFormat::Yaml => "yaml",
        }
    }

    /// Format for an extension, ignoring case
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Format selected by a path's extension
    pub fn from_path(path: &Path) -> LayoutResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| LayoutError::UnsupportedFormat(path.display().to_string()))?;
        Self::from_extension(ext).ok_or_else(|| LayoutError::UnsupportedFormat(ext.to_string()))
    }

    pub fn deserialize<T: DeserializeOwned>(self, content: &str) -> LayoutResult<T> {
        match self {
            TextFormat::Json => serde_json::from_str(content)
                .map_err(|e| LayoutError::Deserialization(e.to_string())),
            TextFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| LayoutError::Deserialization(e.to_string())),
        }
    }

    pub fn serialize<T: Serialize>(self, value: &T) -> LayoutResult<String> {
        match self {
            TextFormat::Json => serde_json::to_string_pretty(value)
                .map_err(|e| LayoutError::Serialization(e.to_string())),
            TextFormat::Yaml => {
                serde_yaml::to_string(value).map_err(|e| LayoutError::Serialization(e.to_string()))
            }
        }
    }
}

/// A reader parses one text format into a [`Graph`]
pub trait Reader {
    /// Parse an in-memory payload
    fn parse(&self, content: &str) -> LayoutResult<Graph>;

    /// File extensions this reader can handle (e.g., ["yaml", "yml"])
    fn supported_extensions(&self) -> &[&str];

    /// Read and parse a file
    fn read(&self, input: &Path) -> LayoutResult<Graph> {
        let content = fs::read_to_string(input)?;
        self.parse(&content)
    }

    /// Check if this reader can handle the given file extension
    fn supports_extension(&self, ext: &str) -> bool {
        self.supported_extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    }
}

/// A writer serializes a [`Graph`] to one text format
pub trait Writer {
    /// Serialize to a string
    fn render(&self, graph: &Graph) -> LayoutResult<String>;

    /// Identifier for this output format (e.g., "json", "yaml")
    fn format_id(&self) -> &str;

    /// File extensions that select this writer
    fn supported_extensions(&self) -> &[&str];

    /// Serialize and write to a file
    fn write(&self, graph: &Graph, output: &Path) -> LayoutResult<()> {
        let content = self.render(graph)?;
        fs::write(output, content)?;
        Ok(())
    }
}

/// Reader/writer for `.json` graph files
#[derive(Debug, Default)]
pub struct JsonFormat;

impl Reader for JsonFormat {
    fn parse(&self, content: &str) -> LayoutResult<Graph> {
        TextFormat::Json.deserialize(content)
    }

    fn supported_extensions(&self) -> &[&str] {
        TextFormat::Json.extensions()
    }
}

impl Writer for JsonFormat {
    fn render(&self, graph: &Graph) -> LayoutResult<String> {
        TextFormat::Json.serialize(graph)
    }

    fn format_id(&self) -> &str {
        TextFormat::Json.id()
    }

    fn supported_extensions(&self) -> &[&str] {
        TextFormat::Json.extensions()
    }
}

/// Reader/writer for `.yaml` / `.yml` graph files
#[derive(Debug, Default)]
pub struct YamlFormat;

impl Reader for YamlFormat {
    fn parse(&self, content: &str) -> LayoutResult<Graph> {
        TextFormat::Yaml.deserialize(content)
    }

    fn supported_extensions(&self) -> &[&str] {
        TextFormat::Yaml.extensions()
    }
}

impl Writer for YamlFormat {
    fn render(&self, graph: &Graph) -> LayoutResult<String> {
        TextFormat::Yaml.serialize(graph)
    }

    fn format_id(&self) -> &str {
        TextFormat::Yaml.id()
    }

    fn supported_extensions(&self) -> &[&str] {
        TextFormat::Yaml.extensions()
    }
}

/// Registry of available readers and writers
pub struct FormatRegistry {
    readers: Vec<Box<dyn Reader>>,
    writers: Vec<Box<dyn Writer>>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FormatRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            readers: Vec::new(),
            writers: Vec::new(),
        }
    }

    /// Create a registry with the JSON and YAML formats registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_reader(Box::new(JsonFormat));
        registry.register_reader(Box::new(YamlFormat));
        registry.register_writer(Box::new(JsonFormat));
        registry.register_writer(Box::new(YamlFormat));
        registry
    }

    pub fn register_reader(&mut self, reader: Box<dyn Reader>) {
        self.readers.push(reader);
    }

    pub fn register_writer(&mut self, writer: Box<dyn Writer>) {
        self.writers.push(writer);
    }

    /// Find a reader for the given file extension
    pub fn reader_for_extension(&self, ext: &str) -> Option<&dyn Reader> {
        self.readers
            .iter()
            .find(|r| r.supports_extension(ext))
            .map(|r| r.as_ref())
    }

    /// Find a writer by format ID
    pub fn writer_for_format(&self, format_id: &str) -> Option<&dyn Writer> {
        self.writers
            .iter()
            .find(|w| w.format_id().eq_ignore_ascii_case(format_id))
            .map(|w| w.as_ref())
    }

    /// Get file extension from a path
    pub fn extension_from_path(path: &Path) -> Option<&str> {
        path.extension().and_then(|e| e.to_str())
    }

    /// Find a reader for the given path based on its extension
    pub fn reader_for_path(&self, path: &Path) -> LayoutResult<&dyn Reader> {
        let ext = Self::extension_from_path(path)
            .ok_or_else(|| LayoutError::UnsupportedFormat(path.display().to_string()))?;

        self.reader_for_extension(ext)
            .ok_or_else(|| LayoutError::UnsupportedFormat(ext.to_string()))
    }

    /// Find a writer for the given path based on its extension
    pub fn writer_for_path(&self, path: &Path) -> LayoutResult<&dyn Writer> {
        let ext = Self::extension_from_path(path)
            .ok_or_else(|| LayoutError::UnsupportedFormat(path.display().to_string()))?;

        self.writers
            .iter()
            .find(|w| {
                w.supported_extensions()
                    .iter()
                    .any(|e| e.eq_ignore_ascii_case(ext))
            })
            .map(|w| w.as_ref())
            .ok_or_else(|| LayoutError::UnsupportedFormat(ext.to_string()))
    }

    /// Read a graph file, dispatching on its extension
    pub fn read_graph(&self, path: &Path) -> LayoutResult<Graph> {
        self.reader_for_path(path)?.read(path)
    }
}
