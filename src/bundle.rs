//! SPDX-License-Identifier: MIT OR AGPL-3.0-or-later
//! Component I: materialize a bundle directory's `config.json` and
//! `runtime.json` from a desired process spec.

use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use oci_spec::runtime::{ProcessBuilder, SpecBuilder};
use serde::Serialize;

use crate::error::BundleError;

/// Mode the two bundle documents are written with, matching the original
/// implementation's `ioutil.WriteFile(path, bytes, 0700)`.
const BUNDLE_FILE_MODE: u32 = 0o700;

const NAMESPACE_TYPES: [&str; 6] = ["pid", "network", "mount", "ipc", "uts", "user"];

/// The minimal desired shape a bundle is materialized from: the process
/// args that will run and whether a terminal was requested.
#[derive(Debug, Clone)]
pub struct BundleSpec {
    pub args: Vec<String>,
    pub terminal: bool,
}

#[derive(Debug, Serialize)]
struct Namespace {
    #[serde(rename = "type")]
    ns_type: &'static str,
    path: &'static str,
}

#[derive(Debug, Serialize)]
struct Linux {
    namespaces: Vec<Namespace>,
}

#[derive(Debug, Serialize)]
struct RuntimeSpecDoc {
    linux: Linux,
}

/// Writes `config.json` and `runtime.json` into `dir`. `dir` must already
/// exist; bundle directory creation is the caller's responsibility (the
/// `BundleGenerator` collaborator, out of scope here).
pub fn materialize(dir: &Path, spec: &BundleSpec) -> Result<(), BundleError> {
    let mut process_builder = ProcessBuilder::default();
    process_builder.terminal(spec.terminal).args(spec.args.clone());
    let process = process_builder
        .build()
        .map_err(|e| BundleError::OciSpec(e.to_string()))?;

    let mut spec_builder = SpecBuilder::default();
    spec_builder.version("0.1.0".to_string()).process(process);
    let oci_spec = spec_builder
        .build()
        .map_err(|e| BundleError::OciSpec(e.to_string()))?;

    write_json(&dir.join("config.json"), &oci_spec)?;

    let runtime_doc = RuntimeSpecDoc {
        linux: Linux {
            namespaces: NAMESPACE_TYPES
                .iter()
                .map(|ns_type| Namespace { ns_type, path: "" })
                .collect(),
        },
    };
    write_json(&dir.join("runtime.json"), &runtime_doc)?;

    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), BundleError> {
    let bytes = serde_json::to_vec(value).map_err(|e| BundleError::OciSpec(e.to_string()))?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(BUNDLE_FILE_MODE)
        .open(path)
        .map_err(|source| BundleError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    file.write_all(&bytes).map_err(|source| BundleError::Write {
        path: path.to_path_buf(),
        source,
    })
}
