//! Gzip page archive.
//!
//! Every fetched page is archived before it is parsed, so any parse is
//! replayable offline against the archived copy. Layout under the data dir:
//!
//! ```text
//! results/offset-{offset}.html.gz
//! matches/{match_id}/overview.html.gz
//! matches/{match_id}/map-{mapstatsid}-stats.html.gz
//! matches/{match_id}/map-{mapstatsid}-performance.html.gz
//! matches/{match_id}/map-{mapstatsid}-economy.html.gz
//! ```

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// The three per-map stats pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapPage {
    Stats,
    Performance,
    Economy,
}

impl MapPage {
    fn slug(self) -> &'static str {
        match self {
            Self::Stats => "stats",
            Self::Performance => "performance",
            Self::Economy => "economy",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageArchive {
    root: PathBuf,
}

impl PageArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn save_results(&self, offset: u32, html: &str) -> io::Result<()> {
        self.write_gz(&self.results_path(offset), html)
    }

    pub fn load_results(&self, offset: u32) -> io::Result<String> {
        read_gz(&self.results_path(offset))
    }

    pub fn save_overview(&self, match_id: u64, html: &str) -> io::Result<()> {
        self.write_gz(&self.overview_path(match_id), html)
    }

    pub fn load_overview(&self, match_id: u64) -> io::Result<String> {
        read_gz(&self.overview_path(match_id))
    }

    pub fn save_map_page(
        &self,
        match_id: u64,
        mapstatsid: u64,
        page: MapPage,
        html: &str,
    ) -> io::Result<()> {
        self.write_gz(&self.map_page_path(match_id, mapstatsid, page), html)
    }

    pub fn load_map_page(
        &self,
        match_id: u64,
        mapstatsid: u64,
        page: MapPage,
    ) -> io::Result<String> {
        read_gz(&self.map_page_path(match_id, mapstatsid, page))
    }

    fn results_path(&self, offset: u32) -> PathBuf {
        self.root.join("results").join(format!("offset-{offset}.html.gz"))
    }

    fn overview_path(&self, match_id: u64) -> PathBuf {
        self.root
            .join("matches")
            .join(match_id.to_string())
            .join("overview.html.gz")
    }

    fn map_page_path(&self, match_id: u64, mapstatsid: u64, page: MapPage) -> PathBuf {
        self.root
            .join("matches")
            .join(match_id.to_string())
            .join(format!("map-{mapstatsid}-{}.html.gz", page.slug()))
    }

    fn write_gz(&self, path: &Path, html: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(html.as_bytes())?;
        encoder.finish()?;
        Ok(())
    }
}

fn read_gz(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(file);
    let mut html = String::new();
    decoder.read_to_string(&mut html)?;
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_results_page() {
        let dir = tempfile::tempdir().unwrap();
        let archive = PageArchive::new(dir.path());
        archive.save_results(300, "<html>listing</html>").unwrap();
        assert_eq!(archive.load_results(300).unwrap(), "<html>listing</html>");
        assert!(dir.path().join("results/offset-300.html.gz").exists());
    }

    #[test]
    fn map_pages_live_under_the_match_dir() {
        let dir = tempfile::tempdir().unwrap();
        let archive = PageArchive::new(dir.path());
        archive
            .save_map_page(2372000, 171234, MapPage::Performance, "<html/>")
            .unwrap();
        assert!(dir
            .path()
            .join("matches/2372000/map-171234-performance.html.gz")
            .exists());
        assert_eq!(
            archive
                .load_map_page(2372000, 171234, MapPage::Performance)
                .unwrap(),
            "<html/>"
        );
    }

    #[test]
    fn overwrite_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let archive = PageArchive::new(dir.path());
        archive.save_overview(1, "first").unwrap();
        archive.save_overview(1, "second").unwrap();
        assert_eq!(archive.load_overview(1).unwrap(), "second");
    }

    #[test]
    fn missing_page_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let archive = PageArchive::new(dir.path());
        let err = archive.load_overview(42).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
