use crate::book::Image;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of exporting a book's images to disk.
#[derive(Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    Exported { count: usize, dir: PathBuf },
    AlreadyExists(PathBuf),
    NoImages,
}

/// Writes `images` into `dir`, one file each.
///
/// Refuses to touch an existing directory so that a previous export is never
/// overwritten.
pub fn export_images(images: &[Image], dir: &Path) -> Result<ExportOutcome> {
    if dir.exists() {
        return Ok(ExportOutcome::AlreadyExists(dir.to_path_buf()));
    }
    if images.is_empty() {
        return Ok(ExportOutcome::NoImages);
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create image directory: {}", dir.display()))?;

    for img in images {
        let dest = dir.join(&img.name);
        fs::write(&dest, &img.data)
            .with_context(|| format!("Failed to write image: {}", dest.display()))?;
    }

    log::info!("exported {} images to {}", images.len(), dir.display());

    Ok(ExportOutcome::Exported {
        count: images.len(),
        dir: dir.to_path_buf(),
    })
}

pub fn clean_filename(href: &str) -> String {
    Path::new(href)
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "image.bin".to_string())
}

/// Hands out export names, keeping them unique within one book.
#[derive(Default)]
pub struct ImageNamer {
    taken: HashSet<String>,
}

impl ImageNamer {
    /// Picks a name for the image stored as `file_name`: the caption that
    /// follows it in the text with the original extension, else the chapter
    /// title as a prefix, else the file name itself.
    pub fn name(
        &mut self,
        file_name: &str,
        caption: Option<&str>,
        chapter: Option<&str>,
    ) -> String {
        let ext = Path::new(file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_string());

        let base = match (caption.map(sanitize), chapter.map(sanitize)) {
            (Some(caption), _) if !caption.is_empty() => match &ext {
                Some(ext) => format!("{}.{}", caption, ext),
                None => caption,
            },
            (_, Some(chapter)) if !chapter.is_empty() => format!("{}-{}", chapter, file_name),
            _ => file_name.to_string(),
        };

        let (stem, suffix) = match base.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{}", ext)),
            _ => (base.clone(), String::new()),
        };
        let mut candidate = base;
        let mut n = 2;
        while !self.taken.insert(candidate.clone()) {
            candidate = format!("{}-{}{}", stem, n, suffix);
            n += 1;
        }
        candidate
    }
}

/// Makes `text` usable as a single path component.
fn sanitize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    cleaned.trim_matches('.').chars().take(80).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn image(name: &str, data: &[u8]) -> Image {
        Image {
            name: name.to_string(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn export_writes_every_image() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("img").join("Book");
        let images = [image("a.png", b"png"), image("b.jpg", b"jpg")];

        let outcome = export_images(&images, &dir).unwrap();

        assert_eq!(
            outcome,
            ExportOutcome::Exported {
                count: 2,
                dir: dir.clone()
            }
        );
        assert_eq!(fs::read(dir.join("a.png")).unwrap(), b"png");
        assert_eq!(fs::read(dir.join("b.jpg")).unwrap(), b"jpg");
    }

    #[test]
    fn export_refuses_existing_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("Book");
        fs::create_dir_all(&dir).unwrap();

        let outcome = export_images(&[image("a.png", b"x")], &dir).unwrap();

        assert_eq!(outcome, ExportOutcome::AlreadyExists(dir.clone()));
        assert!(!dir.join("a.png").exists());
    }

    #[test]
    fn export_without_images_creates_nothing() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("Book");

        assert_eq!(export_images(&[], &dir).unwrap(), ExportOutcome::NoImages);
        assert!(!dir.exists());
    }

    #[test]
    fn names_prefer_caption_then_chapter() {
        let mut namer = ImageNamer::default();
        assert_eq!(namer.name("fig.png", Some("A / B"), Some("Ch")), "A _ B.png");
        assert_eq!(namer.name("fig.png", None, Some("Ch 1")), "Ch 1-fig.png");
        assert_eq!(namer.name("fig.png", Some("  "), None), "fig.png");
    }

    #[test]
    fn duplicate_names_get_a_suffix() {
        let mut namer = ImageNamer::default();
        assert_eq!(namer.name("a.png", Some("Map"), None), "Map.png");
        assert_eq!(namer.name("b.png", Some("Map"), None), "Map-2.png");
        assert_eq!(namer.name("c.png", Some("Map"), None), "Map-3.png");
        assert_eq!(namer.name("noext", None, None), "noext");
        assert_eq!(namer.name("noext", None, None), "noext-2");
    }

    #[test]
    fn clean_filename_keeps_last_component() {
        assert_eq!(clean_filename("OEBPS/images/fig.png"), "fig.png");
        assert_eq!(clean_filename(""), "image.bin");
    }
}
