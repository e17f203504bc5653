use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::bytes::{NoExpand, Regex};

use crate::domain::PseudonymPair;
use crate::error::RetrieveError;

/// Literal, binary-safe find/replace for one pseudonym pair.
#[derive(Debug, Clone)]
pub struct TokenReplacer {
    pattern: Regex,
    replacement: Vec<u8>,
}

impl TokenReplacer {
    pub fn new(pair: &PseudonymPair) -> Result<Self, RetrieveError> {
        let pattern = Regex::new(&regex::escape(&pair.pseudonym))
            .map_err(|err| RetrieveError::InvalidPair(format!("{pair}: {err}")))?;
        Ok(Self {
            pattern,
            replacement: pair.real_id.as_bytes().to_vec(),
        })
    }

    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.pattern.is_match(haystack)
    }

    pub fn replace<'h>(&self, haystack: &'h [u8]) -> Cow<'h, [u8]> {
        self.pattern
            .replace_all(haystack, NoExpand(self.replacement.as_slice()))
    }
}

/// Applies every replacer in order to the file's bytes and writes the result
/// back in place. Returns whether anything changed; unchanged files are not
/// rewritten.
pub fn rewrite_file_content(path: &Path, replacers: &[TokenReplacer]) -> io::Result<bool> {
    let mut data = fs::read(path)?;
    let mut changed = false;
    for replacer in replacers {
        let replaced = match replacer.replace(&data) {
            Cow::Borrowed(_) => None,
            Cow::Owned(replaced) => Some(replaced),
        };
        if let Some(replaced) = replaced {
            data = replaced;
            changed = true;
        }
    }
    if changed {
        fs::write(path, &data)?;
    }
    Ok(changed)
}

/// Directory entries sorted by file name, so traversal order is reproducible.
pub fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacer_treats_token_literally() {
        let replacer = TokenReplacer::new(&PseudonymPair::new("S.1+", "REAL$1")).unwrap();
        let out = replacer.replace(b"aS.1+b SX1+ S.1+");
        assert_eq!(out.as_ref(), b"aREAL$1b SX1+ REAL$1");
    }

    #[test]
    fn replacer_is_binary_safe() {
        let replacer = TokenReplacer::new(&PseudonymPair::new("PSEUDO_A", "REAL_1")).unwrap();
        let input = [0xff, 0x00, b'P', b'S', b'E', b'U', b'D', b'O', b'_', b'A', 0xfe];
        let out = replacer.replace(&input);
        assert_eq!(out.as_ref(), &[0xff, 0x00, b'R', b'E', b'A', b'L', b'_', b'1', 0xfe]);
    }

    #[test]
    fn rewrite_skips_unchanged_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("SampleSheet.csv");
        fs::write(&path, "Sample_ID\nOTHER\n").unwrap();
        let replacer = TokenReplacer::new(&PseudonymPair::new("PSEUDO_A", "REAL_1")).unwrap();
        assert!(!rewrite_file_content(&path, &[replacer]).unwrap());
    }
}
