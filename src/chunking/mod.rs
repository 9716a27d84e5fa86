//! Chunking: splits loaded pages into overlapping character windows while
//! carrying each page's metadata onto its chunks.

pub mod recursive;

use std::collections::HashMap;

use crate::models::{Chunk, DocumentPage};
use recursive::RecursiveSplitter;

/// Number of chunks logged as a sample after splitting.
const SAMPLE_CHUNKS: usize = 5;

/// Split pages into chunks. `chunk_index` counts chunks per source file,
/// continuing across that file's pages.
pub fn chunk_pages(pages: &[DocumentPage], chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let splitter = RecursiveSplitter::new(chunk_size, overlap);
    let mut next_index: HashMap<&str, usize> = HashMap::new();
    let mut chunks = Vec::new();

    for page in pages {
        for text in splitter.split(&page.text) {
            let index = next_index.entry(page.source.as_str()).or_insert(0);
            chunks.push(Chunk {
                source: page.source.clone(),
                domain: page.domain,
                page: page.page,
                chunk_index: *index,
                text,
            });
            *index += 1;
        }
    }

    tracing::info!("Created {} chunks from {} page(s)", chunks.len(), pages.len());
    for chunk in chunks.iter().take(SAMPLE_CHUNKS) {
        let excerpt: String = chunk.text.chars().take(100).collect();
        tracing::debug!(
            "Sample chunk - source: {}, domain: {}, text: {}...",
            chunk.source,
            chunk.domain,
            excerpt.replace('\n', " ")
        );
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::domain::Domain;

    fn page(source: &str, page: Option<usize>, text: &str) -> DocumentPage {
        DocumentPage {
            source: source.to_string(),
            domain: Domain::Droit,
            page,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_chunk_pages_empty() {
        assert!(chunk_pages(&[], 500, 100).is_empty());
        assert!(chunk_pages(&[page("a.pdf", Some(1), "   ")], 500, 100).is_empty());
    }

    #[test]
    fn test_metadata_carried_to_chunks() {
        let pages = vec![page("cours.pdf", Some(3), "Le droit penal.")];
        let chunks = chunk_pages(&pages, 500, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source, "cours.pdf");
        assert_eq!(chunks[0].domain, Domain::Droit);
        assert_eq!(chunks[0].page, Some(3));
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Le droit penal.");
    }

    #[test]
    fn test_chunk_index_sequential_per_source() {
        let long = "mot ".repeat(200);
        let pages = vec![
            page("a.pdf", Some(1), &long),
            page("b.txt", None, "court"),
            page("a.pdf", Some(2), &long),
        ];
        let chunks = chunk_pages(&pages, 100, 20);

        let a: Vec<usize> = chunks
            .iter()
            .filter(|c| c.source == "a.pdf")
            .map(|c| c.chunk_index)
            .collect();
        assert!(a.len() > 2);
        assert_eq!(a, (0..a.len()).collect::<Vec<_>>());

        let b: Vec<&Chunk> = chunks.iter().filter(|c| c.source == "b.txt").collect();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].chunk_index, 0);
    }
}
