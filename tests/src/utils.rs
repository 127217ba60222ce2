#![allow(dead_code)]

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};

pub fn temp_path(prefix: Option<&str>, ext: Option<&str>) -> Utf8PathBuf {
    use rand::{distributions::Alphanumeric, Rng};

    let mut filename = String::new();
    if let Some(prefix) = prefix {
        filename.push_str(prefix);
        filename.push('-');
    }
    let rnd: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect();
    filename.push_str(&rnd);
    if let Some(ext) = ext {
        filename.push('.');
        filename.push_str(ext);
    }
    let mut p = std::env::temp_dir();
    p.push(filename);
    p.try_into().unwrap()
}

#[derive(Debug, PartialEq, Eq)]
pub enum Node {
    Dir,
    File(Vec<u8>),
}

/// Every entry below `root`, keyed by relative path.
pub fn tree(root: &Utf8Path) -> BTreeMap<String, Node> {
    fn walk(root: &Utf8Path, dir: &Utf8Path, nodes: &mut BTreeMap<String, Node>) {
        for entry in dir.read_dir_utf8().unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            let rel = path.strip_prefix(root).unwrap().to_string();
            if entry.file_type().unwrap().is_dir() {
                nodes.insert(rel, Node::Dir);
                walk(root, path, nodes);
            } else {
                nodes.insert(rel, Node::File(std::fs::read(path).unwrap()));
            }
        }
    }
    let mut nodes = BTreeMap::new();
    walk(root, root, &mut nodes);
    nodes
}

/// Whether any unfinished transfer is present below `root`.
///
/// Only names are looked at, and entries vanishing during the walk are
/// ignored, so this can run while a copy is in progress.
pub fn has_staged_files(root: &Utf8Path) -> bool {
    let Ok(read_dir) = root.read_dir_utf8() else {
        return false;
    };
    read_dir.flatten().any(|entry| {
        entry.file_name().contains(".snapcopy-")
            || (entry.file_type().map(|ty| ty.is_dir()).unwrap_or(false)
                && has_staged_files(entry.path()))
    })
}

#[cfg(unix)]
pub fn set_mode(path: &Utf8Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).unwrap();
}

/// Apply `mode` to `root` and everything below it, like `chmod -R`.
#[cfg(unix)]
pub fn set_mode_all(root: &Utf8Path, mode: u32) {
    set_mode(root, mode);
    for path in tree(root).keys() {
        set_mode(&root.join(path), mode);
    }
}

/// Whether the file modes are enforced for this process, which they are
/// not for root.
///
/// The permission tests return early when this is false: they need a
/// non-root user to exercise anything.
#[cfg(unix)]
pub fn permissions_enforced() -> bool {
    let probe = temp_path(Some("snapcopy-probe"), None);
    std::fs::write(&probe, "probe").unwrap();
    set_mode(&probe, 0o000);
    let enforced = std::fs::File::open(&probe).is_err();
    std::fs::remove_file(&probe).unwrap();
    enforced
}

/// Write `len` bytes, all zero except a few 4 KiB blocks spread every
/// `stride` bytes.
pub fn write_holey_file(path: &Utf8Path, len: u64, stride: u64) {
    use std::io::{Seek, SeekFrom, Write};

    let mut file = std::fs::File::create(path).unwrap();
    file.set_len(len).unwrap();
    let block: Vec<u8> = (0..4096u32).map(|i| (i % 251 + 1) as u8).collect();
    let mut offset = 0;
    while offset + block.len() as u64 <= len {
        file.seek(SeekFrom::Start(offset)).unwrap();
        file.write_all(&block).unwrap();
        offset += stride;
    }
}
