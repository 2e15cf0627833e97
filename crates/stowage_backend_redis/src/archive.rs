//! Directory-structure previews for uploaded zip archives.
use std::io::{Read, Seek};

use serde_json::{json, Map, Value};

use super::errors::Result;

/// Descend into `map` following `segments`, creating directory entries as needed,
/// and return the deepest map reached. Stops early (returning the map reached so
/// far) if a segment along the way already holds a non-directory value.
fn navigate<'a>(map: &'a mut Map<String, Value>, segments: &[&str]) -> &'a mut Map<String, Value> {
    let Some((segment, rest)) = segments.split_first() else {
        return map;
    };
    let key = segment.to_string();
    map.entry(key.clone()).or_insert_with(|| json!({"is_dir": true}));
    let is_obj = map.get(&key).is_some_and(Value::is_object);
    if is_obj {
        navigate(map.get_mut(&key).unwrap().as_object_mut().unwrap(), rest)
    } else {
        map
    }
}

/// Walk the archive and build a nested map of its directory structure. Directories
/// carry `{"is_dir": true}`; files carry their name and uncompressed size.
pub fn generate_archive_preview<R: Read + Seek>(reader: R) -> Result<Value> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut results = Map::new();

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let entry_name = entry.name().to_string();
        let segments: Vec<&str> = entry_name
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        if segments.is_empty() {
            continue;
        }

        let current = navigate(&mut results, &segments[..segments.len() - 1]);

        if entry.is_dir() {
            current
                .entry(segments[segments.len() - 1].to_string())
                .or_insert_with(|| json!({"is_dir": true}));
        } else {
            let filename = segments[segments.len() - 1];
            current.insert(
                filename.to_string(),
                json!({
                    "filename": filename,
                    "size": entry.size(),
                    "is_dir": false,
                }),
            );
        }
    }

    Ok(Value::Object(results))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use zip::write::FileOptions;
    use zip::ZipWriter;

    use super::*;

    fn sample_archive() -> Cursor<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        writer.add_directory("docs/", options).unwrap();
        writer.start_file("docs/readme.txt", options).unwrap();
        writer.write_all(b"hello").unwrap();
        writer.start_file("docs/img/logo.png", options).unwrap();
        writer.write_all(&[0u8; 16]).unwrap();
        writer.start_file("top.csv", options).unwrap();
        writer.write_all(b"a,b").unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn preview_nests_directories_and_files() {
        let preview = generate_archive_preview(sample_archive()).unwrap();

        assert_eq!(preview["docs"]["is_dir"], true);
        assert_eq!(preview["docs"]["readme.txt"]["size"], 5);
        assert_eq!(preview["docs"]["readme.txt"]["is_dir"], false);
        assert_eq!(preview["docs"]["img"]["is_dir"], true);
        assert_eq!(preview["docs"]["img"]["logo.png"]["size"], 16);
        assert_eq!(preview["top.csv"]["filename"], "top.csv");
    }

    #[test]
    fn non_zip_input_is_an_error() {
        let bogus = Cursor::new(b"definitely not an archive".to_vec());
        assert!(generate_archive_preview(bogus).is_err());
    }

    #[test]
    fn preview_reads_archives_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.zip");
        std::fs::write(&path, sample_archive().into_inner()).unwrap();

        let preview = generate_archive_preview(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(preview["docs"]["readme.txt"]["size"], 5);
    }
}
