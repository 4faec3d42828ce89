use crate::IngestError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const CHUNK_SIZE: usize = 64 * 1024;

pub fn hash_reader<R: Read>(reader: R) -> io::Result<String> {
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, reader);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        };
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn hash_file(path: &Path) -> Result<String, IngestError> {
    let file = File::open(path)?;
    Ok(hash_reader(file)?)
}

#[cfg(test)]
mod tests {
    use super::{hash_file, hash_reader};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("a.pdf");
        fs::write(&file_path, b"abc")?;

        let first = hash_file(&file_path)?;
        let second = hash_file(&file_path)?;
        assert_eq!(first, second);
        assert_eq!(
            first,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        Ok(())
    }

    #[test]
    fn identical_bytes_at_different_paths_share_identity() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("one.pdf"), b"%PDF-1.4 same")?;
        fs::write(dir.path().join("two.pdf"), b"%PDF-1.4 same")?;
        fs::write(dir.path().join("three.pdf"), b"%PDF-1.4 samf")?;

        let one = hash_file(&dir.path().join("one.pdf"))?;
        let two = hash_file(&dir.path().join("two.pdf"))?;
        let three = hash_file(&dir.path().join("three.pdf"))?;
        assert_eq!(one, two);
        assert_ne!(one, three);
        Ok(())
    }

    #[test]
    fn streaming_matches_across_chunk_boundaries() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = vec![7u8; 200 * 1024 + 13];
        let streamed = hash_reader(bytes.as_slice())?;
        let dir = tempdir()?;
        let path = dir.path().join("big.pdf");
        fs::write(&path, &bytes)?;
        assert_eq!(streamed, hash_file(&path)?);
        assert_eq!(streamed.len(), 64);
        Ok(())
    }

    #[test]
    fn missing_file_reports_io_error() {
        let result = hash_file(std::path::Path::new("/definitely/not/here.pdf"));
        assert!(matches!(result, Err(crate::IngestError::Io(_))));
    }
}
