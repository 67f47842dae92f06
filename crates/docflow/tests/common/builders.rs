//! Builders for test inputs.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use docflow::config::EngineConfig;
use docflow::worker::InputFile;
use zip::write::SimpleFileOptions;

/// A small, valid invoice document.
pub fn invoice_xml(number: usize) -> String {
    format!(
        "<invoice id=\"{n}\"><number>INV-{n:04}</number><total>{n}.50</total></invoice>",
        n = number
    )
}

/// `count` standalone XML documents named `doc{i}.xml`.
pub fn xml_inputs(count: usize) -> Vec<InputFile> {
    (0..count)
        .map(|i| InputFile::new(format!("doc{}.xml", i), invoice_xml(i)))
        .collect()
}

/// Builds an in-memory zip archive.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start zip entry");
        writer.write_all(content).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Rewrites the uncompressed size recorded in the first central directory
/// header, leaving the entry data intact.
pub fn with_declared_size(mut archive: Vec<u8>, size: u32) -> Vec<u8> {
    let central = archive
        .windows(4)
        .position(|w| w == b"PK\x01\x02")
        .expect("central directory header");
    archive[central + 24..central + 28].copy_from_slice(&size.to_le_bytes());
    archive
}

/// Zip input holding `count` invoices plus the given extra entries.
pub fn zip_input(name: &str, count: usize, extra: &[(&str, &[u8])]) -> InputFile {
    let docs: Vec<(String, String)> = (0..count)
        .map(|i| (format!("{}-{}.xml", name.trim_end_matches(".zip"), i), invoice_xml(i)))
        .collect();
    let mut entries: Vec<(&str, &[u8])> = docs
        .iter()
        .map(|(n, c)| (n.as_str(), c.as_bytes()))
        .collect();
    entries.extend_from_slice(extra);
    InputFile::new(name, zip_bytes(&entries))
}

/// Builder for `EngineConfig` tuned for fast tests.
pub struct ConfigBuilder {
    config: EngineConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig {
                worker_count: 4,
                poll_interval_ms: 10,
                ..EngineConfig::default()
            },
        }
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    pub fn item_timeout_secs(mut self, secs: u64) -> Self {
        self.config.item_timeout_secs = secs;
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.persist_chunk_size = size;
        self
    }

    pub fn max_entry_bytes(mut self, limit: u64) -> Self {
        self.config.max_entry_bytes = limit;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
