// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page assembler: folds per-invocation parser output into one page map per
// input file.
//
// Results must be pushed in ascending frame order. Each successful invocation
// contributes exactly one logical page, so the finished map is keyed `1..=N`
// for N successful frames, even when a frame yielded no text.

use scanwerk_core::types::{DocumentFragmentMap, PageFragments, ParsedPages};
use tracing::{debug, warn};

/// How invocations relate to frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyMode {
    /// One invocation per original frame; extra pages an invocation reports
    /// are appended after the last page.
    PerFrame,
    /// Each invocation saw a flattened single frame; only its first page counts.
    Flattened,
}

/// Parser output of one invocation, tagged with the frame it came from.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub frame_index: u32,
    pub pages: ParsedPages,
}

impl InvocationResult {
    pub fn new(frame_index: u32, pages: ParsedPages) -> Self {
        Self { frame_index, pages }
    }
}

/// Incremental builder of a [`DocumentFragmentMap`].
#[derive(Debug)]
pub struct PageAssembler {
    mode: AssemblyMode,
    map: DocumentFragmentMap,
}

impl PageAssembler {
    pub fn new(mode: AssemblyMode) -> Self {
        Self {
            mode,
            map: DocumentFragmentMap::new(),
        }
    }

    pub fn mode(&self) -> AssemblyMode {
        self.mode
    }

    /// Add the next invocation's result; returns its logical page number.
    pub fn push(&mut self, result: InvocationResult) -> u32 {
        let frame_index = result.frame_index;
        let mut pages = result.pages.into_iter();

        // The invocation's first reported page; normally page 1.
        let primary = match pages.next() {
            Some((number, fragments)) => {
                if number != 1 {
                    debug!(frame_index, reported = number, "First page is not numbered 1");
                }
                fragments
            }
            None => Vec::new(),
        };
        let page = self.map.push_page(PageFragments {
            frame_index,
            fragments: primary,
        });

        let extra: Vec<_> = pages.collect();
        if !extra.is_empty() {
            match self.mode {
                AssemblyMode::PerFrame => {
                    for (reported, fragments) in extra {
                        let slot = self.map.insert_page(
                            reported,
                            PageFragments {
                                frame_index,
                                fragments,
                            },
                        );
                        warn!(frame_index, reported, slot, "Invocation reported an extra page");
                    }
                }
                AssemblyMode::Flattened => {
                    debug!(
                        frame_index,
                        dropped = extra.len(),
                        "Flattened invocation reported extra pages; ignored"
                    );
                }
            }
        }
        page
    }

    pub fn finish(self) -> DocumentFragmentMap {
        self.map
    }
}

/// Assemble a whole file's results at once.
pub fn assemble(
    mode: AssemblyMode,
    results: impl IntoIterator<Item = InvocationResult>,
) -> DocumentFragmentMap {
    let mut assembler = PageAssembler::new(mode);
    for result in results {
        assembler.push(result);
    }
    assembler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanwerk_core::types::{BoundingBox, TextFragment};

    fn fragment(text: &str) -> TextFragment {
        TextFragment::new(text, BoundingBox::new(0, 0, 10, 10).expect("box"), None)
    }

    fn single_page(text: &str) -> ParsedPages {
        let mut pages = ParsedPages::new();
        pages.insert_page(1, vec![fragment(text)]);
        pages
    }

    #[test]
    fn frames_become_contiguous_pages() {
        let results = (0..3).map(|i| InvocationResult::new(i, single_page(&format!("f{i}"))));
        let map = assemble(AssemblyMode::PerFrame, results);
        assert_eq!(map.page_numbers(), vec![1, 2, 3]);
        assert_eq!(map.get(3).expect("page 3").frame_index, 2);
    }

    #[test]
    fn missing_frame_leaves_no_gap() {
        // Frame 1 failed upstream and never reached the assembler.
        let results = [0, 2].map(|i| InvocationResult::new(i, single_page("x")));
        let map = assemble(AssemblyMode::PerFrame, results);
        assert_eq!(map.page_numbers(), vec![1, 2]);
        assert_eq!(map.get(2).expect("page 2").frame_index, 2);
    }

    #[test]
    fn textless_frame_keeps_its_page() {
        let results = vec![
            InvocationResult::new(0, single_page("a")),
            InvocationResult::new(1, ParsedPages::new()),
            InvocationResult::new(2, single_page("c")),
        ];
        let map = assemble(AssemblyMode::PerFrame, results);
        assert_eq!(map.page_numbers(), vec![1, 2, 3]);
        assert!(map.get(2).expect("page 2").fragments.is_empty());
    }

    #[test]
    fn flattened_takes_first_page_only() {
        let mut pages = single_page("first");
        pages.insert_page(2, vec![fragment("second")]);
        let map = assemble(
            AssemblyMode::Flattened,
            vec![
                InvocationResult::new(0, pages),
                InvocationResult::new(1, single_page("next")),
            ],
        );
        assert_eq!(map.page_numbers(), vec![1, 2]);
        assert_eq!(map.get(2).expect("page 2").fragments[0].text, "next");
    }

    #[test]
    fn per_frame_extra_pages_are_appended() {
        let mut pages = single_page("first");
        pages.insert_page(2, vec![fragment("overflow")]);
        let mut assembler = PageAssembler::new(AssemblyMode::PerFrame);
        assert_eq!(assembler.push(InvocationResult::new(0, pages)), 1);
        let map = assembler.finish();
        assert_eq!(map.page_numbers(), vec![1, 2]);
        assert_eq!(map.get(2).expect("page 2").fragments[0].text, "overflow");
    }
}
