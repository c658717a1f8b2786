//! Test fixtures - payloads served by the mock vendor.

#![allow(dead_code)]

use std::io::{Cursor, Write};

/// Bytes of a fake Windows installer.
pub const INSTALLER: &[u8] = b"MZ\x90\x00fake installer payload";

/// Build an in-memory zip. Names ending in `/` become directories.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
    }
    zip.finish().unwrap().into_inner()
}

/// Vendor zip with everything nested under one version-named folder.
pub fn nested_driver_zip() -> Vec<u8> {
    zip_bytes(&[
        ("RTL8125_v10.062/", b""),
        ("RTL8125_v10.062/setup.exe", INSTALLER),
        ("RTL8125_v10.062/drivers/", b""),
        ("RTL8125_v10.062/drivers/rt640x64.inf", b"[Version]"),
    ])
}

/// Portable tool zip: one executable plus documentation.
pub fn portable_tool_zip() -> Vec<u8> {
    zip_bytes(&[
        ("DiskInfo64.exe", INSTALLER),
        ("License.txt", b"MIT"),
        ("CdiResource/", b""),
        ("CdiResource/themes.ini", b"[themes]"),
    ])
}

/// Zip with two executables at the top level.
pub fn ambiguous_zip() -> Vec<u8> {
    zip_bytes(&[("setup32.exe", INSTALLER), ("setup64.exe", INSTALLER)])
}
