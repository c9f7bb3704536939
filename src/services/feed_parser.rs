// Parser do feed Atom do arXiv (<feed><entry>...</entry></feed>)
//
// Cada <entry> precisa de id, updated, published, title, summary e pelo menos
// um <author><name>. O primeiro filho de cada tipo vence e o texto é mantido
// exatamente como veio (apenas com as entidades XML resolvidas).

use crate::models::Paper;
use quick_xml::events::Event;
use quick_xml::Reader;

// Element nesting levels: <feed> = 1, <entry> = 2, entry fields = 3, author name = 4
const FEED_LEVEL: usize = 1;
const ENTRY_LEVEL: usize = 2;
const FIELD_LEVEL: usize = 3;
const AUTHOR_NAME_LEVEL: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Updated,
    Published,
    Title,
    Summary,
    AuthorName,
}

impl Field {
    fn from_entry_child(name: &[u8]) -> Option<Self> {
        match name {
            b"id" => Some(Field::Id),
            b"updated" => Some(Field::Updated),
            b"published" => Some(Field::Published),
            b"title" => Some(Field::Title),
            b"summary" => Some(Field::Summary),
            _ => None,
        }
    }
}

#[derive(Default)]
struct PartialEntry {
    id: Option<String>,
    updated: Option<String>,
    published: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    authors: Vec<String>,
    in_author: bool,
    author_name: Option<String>,
}

impl PartialEntry {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Id => &mut self.id,
            Field::Updated => &mut self.updated,
            Field::Published => &mut self.published,
            Field::Title => &mut self.title,
            Field::Summary => &mut self.summary,
            Field::AuthorName => &mut self.author_name,
        }
    }

    fn finish(self, index: usize) -> Result<Paper, String> {
        let missing = |tag: &str| format!("entry #{} is missing <{}>", index + 1, tag);

        if self.authors.is_empty() {
            return Err(missing("author"));
        }

        Ok(Paper {
            id: self.id.ok_or_else(|| missing("id"))?,
            updated: self.updated.ok_or_else(|| missing("updated"))?,
            published: self.published.ok_or_else(|| missing("published"))?,
            title: self.title.ok_or_else(|| missing("title"))?,
            summary: self.summary.ok_or_else(|| missing("summary"))?,
            authors: self.authors,
        })
    }
}

#[derive(Default)]
struct FeedState {
    depth: usize,
    saw_feed: bool,
    entry: Option<PartialEntry>,
    // (field being read, its nesting level, accumulated text)
    capture: Option<(Field, usize, String)>,
    papers: Vec<Paper>,
}

impl FeedState {
    fn open(&mut self, name: &[u8], level: usize) -> Result<(), String> {
        if level == FEED_LEVEL {
            if name != b"feed" {
                return Err(format!(
                    "unexpected root element <{}>",
                    String::from_utf8_lossy(name)
                ));
            }
            if self.saw_feed {
                return Err("more than one <feed> root element".to_string());
            }
            self.saw_feed = true;
            return Ok(());
        }

        if self.capture.is_some() {
            return Ok(());
        }

        match self.entry.as_mut() {
            None => {
                if level == ENTRY_LEVEL && name == b"entry" {
                    self.entry = Some(PartialEntry::default());
                }
            }
            Some(entry) => {
                if level == FIELD_LEVEL {
                    if name == b"author" {
                        entry.in_author = true;
                        entry.author_name = None;
                    } else if let Some(field) = Field::from_entry_child(name) {
                        if entry.slot(field).is_none() {
                            self.capture = Some((field, level, String::new()));
                        }
                    }
                } else if level == AUTHOR_NAME_LEVEL
                    && entry.in_author
                    && name == b"name"
                    && entry.author_name.is_none()
                {
                    self.capture = Some((Field::AuthorName, level, String::new()));
                }
            }
        }

        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some((_, _, buf)) = self.capture.as_mut() {
            buf.push_str(text);
        }
    }

    fn close(&mut self, name: &[u8], level: usize) -> Result<(), String> {
        if let Some(capture_level) = self.capture.as_ref().map(|(_, l, _)| *l) {
            if capture_level == level {
                if let (Some((field, _, value)), Some(entry)) =
                    (self.capture.take(), self.entry.as_mut())
                {
                    let slot = entry.slot(field);
                    if slot.is_none() {
                        *slot = Some(value);
                    }
                }
            }
            return Ok(());
        }

        if level == FIELD_LEVEL && name == b"author" {
            let index = self.papers.len() + 1;
            if let Some(entry) = self.entry.as_mut() {
                entry.in_author = false;
                let author = entry
                    .author_name
                    .take()
                    .ok_or_else(|| format!("entry #{} has an <author> without <name>", index))?;
                entry.authors.push(author);
            }
        } else if level == ENTRY_LEVEL && name == b"entry" {
            if let Some(entry) = self.entry.take() {
                let paper = entry.finish(self.papers.len())?;
                self.papers.push(paper);
            }
        }

        Ok(())
    }
}

/// Parse an Atom feed payload into papers, in feed order.
///
/// Any structural problem (malformed XML, wrong root, unclosed elements, an
/// entry missing a required field) fails the whole payload.
pub fn parse_feed(xml: &str) -> Result<Vec<Paper>, String> {
    let mut reader = Reader::from_str(xml);
    let mut state = FeedState::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at position {}: {}", reader.buffer_position(), e))?;

        match event {
            Event::Start(e) => {
                state.depth += 1;
                let level = state.depth;
                state.open(e.local_name().as_ref(), level)?;
            }
            Event::Empty(e) => {
                let level = state.depth + 1;
                let name = e.local_name();
                state.open(name.as_ref(), level)?;
                state.close(name.as_ref(), level)?;
            }
            Event::End(e) => {
                let level = state.depth;
                state.close(e.local_name().as_ref(), level)?;
                state.depth = state.depth.saturating_sub(1);
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| format!("Invalid text in feed: {}", e))?;
                state.text(&text);
            }
            Event::CData(c) => {
                state.text(&String::from_utf8_lossy(&c));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if state.depth != 0 {
        return Err("unexpected end of document (unclosed elements)".to_string());
    }
    if !state.saw_feed {
        return Err("missing <feed> root element".to_string());
    }

    Ok(state.papers)
}

/// Lenient form used by the digest: a bad payload is logged and yields no papers.
pub fn papers_from_feed(xml: &str) -> Vec<Paper> {
    match parse_feed(xml) {
        Ok(papers) => {
            log::debug!("📄 Parsed {} papers from feed", papers.len());
            papers
        }
        Err(e) => {
            log::error!("❌ Error parsing feed XML: {}", e);
            Vec::new()
        }
    }
}
