use crate::book::{BookSource, ImageResource, Metadata as BookMetadata};
use crate::markdown;
use anyhow::{Context, Result};
use rbook::prelude::*;
use rbook::Epub;
use std::path::Path;

pub struct EpubData {
    epub: Epub,
}

impl EpubData {
    pub fn open(path: &Path) -> Result<Self> {
        let epub = Epub::options()
            .strict(false)
            .open(path)
            .with_context(|| format!("Failed to open EPUB: {}", path.display()))?;
        Ok(Self { epub })
    }
}

impl BookSource for EpubData {
    fn documents(&self) -> Result<Vec<String>> {
        let mut documents = Vec::new();
        let mut reader = self.epub.reader();

        while let Some(result) = reader.read_next() {
            let data = result.context("Failed to read chapter content")?;
            let html = data.content().to_string();

            // Skip empty or near-empty content
            if html.trim().is_empty() {
                continue;
            }

            documents.push(markdown::html_to_markdown(&html));
        }

        Ok(documents)
    }

    fn images(&self) -> Result<Vec<ImageResource>> {
        let mut images = Vec::new();
        for entry in self.epub.manifest().images() {
            let href = entry
                .resource()
                .key()
                .value()
                .unwrap_or("unknown")
                .to_string();

            let bytes = entry
                .read_bytes()
                .with_context(|| format!("Failed to read image: {}", href))?;

            images.push(ImageResource {
                original_href: href,
                data: bytes,
            });
        }

        Ok(images)
    }

    fn metadata(&self) -> BookMetadata {
        let metadata = self.epub.metadata();
        BookMetadata {
            title: metadata.title().map(|t| t.value().to_string()),
            authors: metadata
                .creators()
                .map(|creator| creator.value().to_string())
                .collect(),
        }
    }
}
