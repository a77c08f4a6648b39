// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// hOCR parser: turns one invocation's structured markup into page-numbered
// lists of located text fragments.
//
// Pages are `ocr_page` elements whose `id` ends in `_<n>`. Fragments are the
// line-level or word-level elements selected by the granularity, each with a
// `bbox l t r b` property in its `title`. A fragment whose box does not parse
// is dropped with a warning; the rest of the page is kept.

use std::path::Path;

use roxmltree::{Document, Node, ParsingOptions};
use scanwerk_core::config::RunConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{BoundingBox, Granularity, OutputMode, ParsedPages, TextFragment};
use scanwerk_engine::RawArtifact;
use scanwerk_engine::engine::artifact_for;
use tracing::{debug, instrument, warn};

const PAGE_CLASS: &str = "ocr_page";

/// Parses hOCR artifacts at a fixed granularity and confidence threshold.
#[derive(Debug, Clone, Copy)]
pub struct MarkupParser {
    granularity: Granularity,
    /// Fragments with a confidence below this are discarded; 0 disables.
    min_confidence: f32,
}

impl MarkupParser {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            min_confidence: 0.0,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.granularity).with_min_confidence(config.min_confidence)
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Parse the artifacts of one invocation.
    ///
    /// The structured artifact is required; a plain-text artifact, when
    /// present, is used as auxiliary text for the first page.
    #[instrument(skip_all, fields(artifacts = artifacts.len(), granularity = ?self.granularity))]
    pub fn parse_artifacts(&self, artifacts: &[RawArtifact]) -> Result<ParsedPages> {
        let structured = artifact_for(artifacts, OutputMode::Structured).ok_or_else(|| {
            ScanwerkError::MarkupSyntax {
                path: artifacts
                    .first()
                    .map(|a| a.path().to_path_buf())
                    .unwrap_or_default(),
                reason: "engine produced no structured markup artifact".into(),
            }
        })?;
        let markup = structured.read_to_string()?;

        let auxiliary = match artifact_for(artifacts, OutputMode::PlainText) {
            Some(artifact) => match artifact.read_to_string() {
                Ok(text) => Some(text),
                Err(err) => {
                    warn!(error = %err, "Auxiliary text unreadable; keeping markup text");
                    None
                }
            },
            None => None,
        };

        let mut pages = ParsedPages::new();
        self.parse_into(&mut pages, &markup, auxiliary.as_deref(), structured.path())?;
        Ok(pages)
    }

    /// Parse `markup` into a fresh page map.
    pub fn parse(
        &self,
        markup: &str,
        auxiliary: Option<&str>,
        origin: &Path,
    ) -> Result<ParsedPages> {
        let mut pages = ParsedPages::new();
        self.parse_into(&mut pages, markup, auxiliary, origin)?;
        Ok(pages)
    }

    /// Parse `markup` and insert its pages into `pages`.
    ///
    /// A page number already present in `pages` is placed after the current
    /// last page instead. Pages left with no fragments are not inserted.
    /// `origin` names the artifact in errors.
    pub fn parse_into(
        &self,
        pages: &mut ParsedPages,
        markup: &str,
        auxiliary: Option<&str>,
        origin: &Path,
    ) -> Result<()> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = Document::parse_with_options(markup, options).map_err(|err| {
            ScanwerkError::MarkupSyntax {
                path: origin.to_path_buf(),
                reason: err.to_string(),
            }
        })?;

        let page_nodes = doc
            .descendants()
            .filter(|node| node.is_element() && has_class(node, PAGE_CLASS));

        for (ordinal, page) in page_nodes.enumerate() {
            let number = match page_number(&page) {
                Some(number) => number,
                None => {
                    let next = pages.next_page();
                    warn!(
                        id = page.attribute("id").unwrap_or(""),
                        assigned = next,
                        "Page id carries no page number"
                    );
                    next
                }
            };

            let mut fragments = self.collect_fragments(&page);
            fragments.retain(|fragment| self.passes_confidence(fragment));

            if ordinal == 0 {
                if let Some(text) = auxiliary {
                    self.apply_auxiliary(&mut fragments, text);
                }
            }

            if fragments.is_empty() {
                debug!(page = number, "Page has no fragments; not inserted");
                continue;
            }

            let count = fragments.len();
            let slot = pages.insert_page(number, fragments);
            if slot != number {
                debug!(requested = number, slot, "Page number taken; appended");
            }
            debug!(page = slot, fragments = count, "Page parsed");
        }
        Ok(())
    }

    fn is_fragment(&self, node: &Node) -> bool {
        node.is_element()
            && node
                .attribute("class")
                .is_some_and(|class| self.granularity.matches_class(class))
    }

    /// Fragment elements under `page`, outermost only, in document order.
    fn collect_fragments(&self, page: &Node) -> Vec<TextFragment> {
        page.descendants()
            .filter(|node| self.is_fragment(node))
            .filter(|node| {
                !node
                    .ancestors()
                    .skip(1)
                    .take_while(|ancestor| ancestor != page)
                    .any(|ancestor| self.is_fragment(&ancestor))
            })
            .filter_map(|node| self.fragment_from(&node))
            .collect()
    }

    fn fragment_from(&self, node: &Node) -> Option<TextFragment> {
        let title = node.attribute("title").unwrap_or("");
        let bbox = match parse_bbox(title) {
            Ok(bbox) => bbox,
            Err(err) => {
                warn!(
                    id = node.attribute("id").unwrap_or(""),
                    error = %err,
                    "Fragment dropped"
                );
                return None;
            }
        };
        Some(TextFragment::new(
            fragment_text(node),
            bbox,
            fragment_confidence(node, title),
        ))
    }

    fn passes_confidence(&self, fragment: &TextFragment) -> bool {
        if self.min_confidence <= 0.0 {
            return true;
        }
        fragment
            .confidence
            .is_none_or(|confidence| confidence >= self.min_confidence)
    }

    /// Replace fragment texts with the auxiliary text when the counts agree.
    fn apply_auxiliary(&self, fragments: &mut [TextFragment], auxiliary: &str) {
        let replacements = self.granularity.split_auxiliary(auxiliary);
        if replacements.len() != fragments.len() {
            warn!(
                auxiliary = replacements.len(),
                fragments = fragments.len(),
                "Auxiliary text does not line up with fragments; keeping markup text"
            );
            return;
        }
        for (fragment, text) in fragments.iter_mut().zip(replacements) {
            fragment.text = text;
        }
    }
}

fn has_class(node: &Node, class: &str) -> bool {
    node.attribute("class")
        .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
}

/// Trailing integer after the last underscore of the page id.
fn page_number(page: &Node) -> Option<u32> {
    let (_, tail) = page.attribute("id")?.rsplit_once('_')?;
    tail.parse().ok().filter(|n| *n > 0)
}

/// Value of one `;`-separated property in an hOCR `title`.
fn title_property<'a>(title: &'a str, key: &str) -> Option<&'a str> {
    title.split(';').map(str::trim).find_map(|prop| {
        let rest = prop.strip_prefix(key)?;
        (rest.is_empty() || rest.starts_with(char::is_whitespace)).then(|| rest.trim())
    })
}

fn parse_bbox(title: &str) -> Result<BoundingBox> {
    let malformed = || ScanwerkError::MalformedMarkup(format!("unusable bbox in title {title:?}"));
    let value = title_property(title, "bbox").ok_or_else(malformed)?;
    let coords: Vec<u32> = value
        .split_whitespace()
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| malformed())?;
    let &[left, top, right, bottom] = coords.as_slice() else {
        return Err(malformed());
    };
    BoundingBox::new(left, top, right, bottom).ok_or_else(malformed)
}

fn x_wconf(title: &str) -> Option<f32> {
    title_property(title, "x_wconf")?
        .parse::<f32>()
        .ok()
        .map(|c| c.clamp(0.0, 100.0))
}

/// Own `x_wconf`, else the mean over contained words.
fn fragment_confidence(node: &Node, title: &str) -> Option<f32> {
    if let Some(confidence) = x_wconf(title) {
        return Some(confidence);
    }
    let word_confidences: Vec<f32> = word_nodes(node)
        .filter_map(|word| x_wconf(word.attribute("title").unwrap_or("")))
        .collect();
    if word_confidences.is_empty() {
        return None;
    }
    Some(word_confidences.iter().sum::<f32>() / word_confidences.len() as f32)
}

fn word_nodes<'a, 'input>(node: &Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants().filter(|n| {
        n.is_element()
            && n.attribute("class")
                .is_some_and(|class| Granularity::ByWord.matches_class(class))
    })
}

/// Words joined by single spaces, or the element's own text when it has no
/// word children.
fn fragment_text(node: &Node) -> String {
    let words: Vec<String> = word_nodes(node)
        .map(|word| normalize_whitespace(&text_content(&word)))
        .filter(|text| !text.is_empty())
        .collect();
    if words.is_empty() {
        normalize_whitespace(&text_content(node))
    } else {
        words.join(" ")
    }
}

fn text_content(node: &Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
