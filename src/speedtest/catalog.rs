//! Catalog of downloadable synthetic files.

use serde::Serialize;

/// A synthetic file of exact size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSpec {
    #[serde(rename = "size")]
    pub size_label: &'static str,
    pub filename: &'static str,
    #[serde(rename = "bytes")]
    pub size_bytes: u64,
}

const MIB: u64 = 1024 * 1024;

static FILES: [FileSpec; 3] = [
    FileSpec {
        size_label: "100MB",
        filename: "100MB.bin",
        size_bytes: 100 * MIB,
    },
    FileSpec {
        size_label: "1GB",
        filename: "1GB.bin",
        size_bytes: 1024 * MIB,
    },
    FileSpec {
        size_label: "10GB",
        filename: "10GB.bin",
        size_bytes: 10 * 1024 * MIB,
    },
];

pub fn list_files() -> &'static [FileSpec] {
    &FILES
}

pub fn lookup(filename: &str) -> Option<&'static FileSpec> {
    FILES.iter().find(|f| f.filename == filename)
}
