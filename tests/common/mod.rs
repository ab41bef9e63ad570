#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub fn zip_bytes(members: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in members {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start zip member");
        writer
            .write_all(contents.as_bytes())
            .expect("write zip member");
    }
    writer.finish().expect("finish zip").into_inner()
}

pub fn write_zip(path: &Path, members: &[(&str, &str)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, zip_bytes(members)).expect("write zip file");
}

pub const SAMPLE_INF: &str = "[Version]\nSignature=\"$CHICAGO$\"\n\n[DefaultInstall]\nCopyFiles=Driver.Copy\n";
