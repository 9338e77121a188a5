use crate::image::{self, ImageNamer};
use crate::markdown::{self, normalize_whitespace};
use anyhow::Result;
use std::collections::HashMap;

/// One chapter as extracted from the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    /// Plain text, one paragraph or heading per line.
    pub text: String,
    /// Headings after the first one, in document order.
    pub subsections: Vec<String>,
}

/// An embedded image, named for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub name: String,
    pub data: Vec<u8>,
}

/// Raw image as read from the container, keyed by its archive path.
pub struct ImageResource {
    pub original_href: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
}

/// Anything that can hand out chapter documents and images.
pub trait BookSource {
    /// Chapter documents, already converted to markdown, in reading order.
    fn documents(&self) -> Result<Vec<String>>;
    /// Embedded images
    fn images(&self) -> Result<Vec<ImageResource>>;
    fn metadata(&self) -> Metadata;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Book {
    pub metadata: Metadata,
    pub chapters: Vec<Chapter>,
    pub images: Vec<Image>,
}

impl Book {
    pub fn from_source(source: &dyn BookSource) -> Result<Self> {
        let mut chapters = Vec::new();
        // Caption and chapter title for each referenced image file name.
        let mut figures: HashMap<String, (Option<String>, String)> = HashMap::new();

        for md in source.documents()? {
            let doc = markdown::markdown_to_text(&md);
            if doc.body.is_empty() {
                continue;
            }

            let mut headings = doc.headings.into_iter();
            let title = headings
                .next()
                .unwrap_or_else(|| format!("Chapter {}", chapters.len() + 1));

            for figure in doc.figures {
                figures
                    .entry(figure.file_name)
                    .or_insert_with(|| (figure.caption, title.clone()));
            }

            chapters.push(Chapter {
                title: normalize_whitespace(&title),
                text: doc.body,
                subsections: headings.collect(),
            });
        }

        let mut namer = ImageNamer::default();
        let images = source
            .images()?
            .into_iter()
            .map(|resource| {
                let file_name = image::clean_filename(&resource.original_href);
                let (caption, chapter) = match figures.get(&file_name) {
                    Some((caption, chapter)) => (caption.as_deref(), Some(chapter.as_str())),
                    None => (None, None),
                };
                Image {
                    name: namer.name(&file_name, caption, chapter),
                    data: resource.data,
                }
            })
            .collect();

        log::debug!("extracted {} chapters", chapters.len());

        Ok(Book {
            metadata: source.metadata(),
            chapters,
            images,
        })
    }
}
