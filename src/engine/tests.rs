use std::cell::Cell;
use std::collections::HashMap;

use anyhow::Result;
use proptest::prelude::*;

use super::align::token_len;
use super::citations::{CitationEntry, CitationId, citation_token};
use super::output::format_records;
use super::*;

fn builtin_pipeline() -> Pipeline {
    Pipeline::new(PipelineConfig::for_language("en")).expect("pipeline compiles")
}

fn run(markup: &str) -> DocumentResult {
    let renderer = WikiTextRenderer::new().expect("renderer compiles");
    builtin_pipeline()
        .process_document(markup, &renderer, &RuleSentenceSplitter::default())
        .expect("document processes")
}

fn extractor() -> CitationExtractor {
    CitationExtractor::new(ExtractOptions::default()).expect("extractor compiles")
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn normalize_removes_tabs_and_truncates_at_references_heading() {
    let headings = ReferenceHeadings::for_language("en");
    let normalized = normalize_markup(
        "Intro\ttext.\n== History ==\nBody.\n== References ==\n{{reflist}}\n== External links ==\n",
        &headings,
    );

    assert_eq!(normalized.text, "Introtext.\n== History ==\nBody.\n");
    assert_eq!(normalized.tabs_removed, 1);
    assert_eq!(normalized.truncated_at.as_deref(), Some("References"));
}

#[test]
fn normalize_keeps_full_text_without_heading() {
    let headings = ReferenceHeadings::for_language("en");
    let normalized = normalize_markup("No references section here.\n", &headings);

    assert_eq!(normalized.text, "No references section here.\n");
    assert!(normalized.truncated_at.is_none());
}

#[test]
fn reference_headings_follow_language_and_extras() {
    let german = ReferenceHeadings::for_language("de");
    assert!(german.matches("einzelnachweise"));
    assert!(!german.matches("References"));

    let unknown = ReferenceHeadings::for_language("xx");
    assert!(unknown.matches("References"));

    let extended = ReferenceHeadings::for_language("en").with_extra(vec!["Sources".to_string()]);
    assert!(extended.matches(" sources "));
    assert!(extended.titles().contains(&"sources".to_string()));
}

#[test]
fn extract_assigns_increasing_tokens_and_preserves_surrounding_bytes() {
    let markup = "A.<ref>http://a.test</ref> B.<ref name=\"n\">{{cite web|url=http://b.test|title=B}}</ref> C.<ref name=n />";
    let extraction = extractor().extract(markup);

    let tokens = extraction
        .map
        .entries()
        .iter()
        .map(|entry| entry.token.clone())
        .collect::<Vec<_>>();
    assert_eq!(tokens, vec![citation_token(1), citation_token(2), citation_token(3)]);
    assert!(tokens.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(
        extraction.substituted,
        "A.ZZCITE000001ZZ B.ZZCITE000002ZZ C.ZZCITE000003ZZ"
    );

    let entries = extraction.map.entries();
    assert_eq!(entries[0].id, CitationId::Anonymous(1));
    assert_eq!(entries[0].kind, CitationKind::Anonymous);
    assert_eq!(entries[1].id, CitationId::Named("n".to_string()));
    assert_eq!(entries[1].urls, strings(&["http://b.test"]));
    assert_eq!(entries[2].kind, CitationKind::Reference);
    assert_eq!(entries[2].urls, strings(&["http://b.test"]));
    assert!(entries.windows(2).all(|pair| pair[0].span.start < pair[1].span.start));
}

#[test]
fn extract_degrades_unresolved_and_malformed_footnotes() {
    let markup = "One.<ref name=\"later\"/> Two.<ref>no link here</ref> Three.<ref name=\"\">http://x.test</ref> Four.<ref>http://open.test";
    let extraction = extractor().extract(markup);
    let entries = extraction.map.entries();

    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].kind, CitationKind::Unresolved);
    assert!(entries[0].urls.is_empty());
    assert_eq!(entries[1].kind, CitationKind::Anonymous);
    assert!(entries[1].urls.is_empty());
    assert_eq!(entries[2].kind, CitationKind::Malformed);
    assert!(entries[2].urls.is_empty());
    assert_eq!(entries[3].kind, CitationKind::Malformed);
    assert_eq!(
        extraction.substituted,
        "One.ZZCITE000001ZZ Two.ZZCITE000002ZZ Three.ZZCITE000003ZZ Four.ZZCITE000004ZZhttp://open.test"
    );
}

#[test]
fn extract_fixes_named_urls_at_first_definition() {
    let markup = "A.<ref name=a>http://first.test</ref> B.<ref name=a>http://second.test</ref> C.<ref name='a'/>";
    let extraction = extractor().extract(markup);
    let urls = extraction
        .map
        .entries()
        .iter()
        .map(|entry| entry.urls.clone())
        .collect::<Vec<_>>();

    assert_eq!(
        urls,
        vec![
            strings(&["http://first.test"]),
            strings(&["http://first.test"]),
            strings(&["http://first.test"]),
        ]
    );
}

#[test]
fn extract_skips_commented_footnotes_and_reference_lists() {
    let markup = "A.<!-- <ref>http://hidden.test</ref> --> B.<ref>http://shown.test</ref>\n<references />";
    let extraction = extractor().extract(markup);

    assert_eq!(extraction.map.len(), 1);
    assert_eq!(
        extraction.map.urls_for(&citation_token(1)),
        Some(strings(&["http://shown.test"]).as_slice())
    );
    assert!(extraction.substituted.contains("<!-- <ref>http://hidden.test</ref> -->"));
    assert!(extraction.substituted.ends_with("<references />"));
}

#[test]
fn extract_urls_reads_url_parameters_and_bare_links() {
    let extractor = extractor();
    let content = "{{cite news |title=T |url=https://news.test/a_(b) |archive-url=https://web.archive.test/x |chapter-url = https://ch.test }} see [http://link.test/page Page], also (http://paren.test).";

    assert_eq!(
        extractor.extract_urls(content),
        strings(&[
            "https://news.test/a_(b)",
            "https://ch.test",
            "http://link.test/page",
            "http://paren.test",
        ])
    );

    let with_archive = CitationExtractor::new(ExtractOptions {
        include_archive_urls: true,
    })
    .expect("extractor compiles");
    assert!(
        with_archive
            .extract_urls(content)
            .contains(&"https://web.archive.test/x".to_string())
    );
}

#[test]
fn extract_urls_drops_duplicates_within_one_citation() {
    let urls = extractor().extract_urls("{{cite web|url=http://d.test}} http://d.test");
    assert_eq!(urls, strings(&["http://d.test"]));
}

#[test]
fn token_len_recognizes_only_well_formed_tokens() {
    assert_eq!(token_len("ZZCITE000001ZZ rest"), Some(14));
    assert_eq!(token_len("ZZCITE1234567ZZ"), Some(15));
    assert_eq!(token_len("ZZCITEZZ"), None);
    assert_eq!(token_len("ZZCITE0001Z"), None);
    assert_eq!(token_len("Zebra"), None);
}

#[test]
fn align_assigns_tokens_to_enclosing_and_preceding_sentences() {
    let sentences = strings(&["The sky is blue.", "It may rain.", "No cite here."]);
    let token_text = "The sky ZZCITE000001ZZis blue.ZZCITE000002ZZ It may rain. ZZCITE000003ZZ No cite here.";

    let alignment = align_tokens(&sentences, token_text).expect("aligns");
    assert_eq!(
        alignment.token_lists,
        vec![
            strings(&["ZZCITE000001ZZ", "ZZCITE000002ZZ"]),
            strings(&["ZZCITE000003ZZ"]),
            Vec::<String>::new(),
        ]
    );
    assert_eq!(alignment.trailing_tokens, 0);
}

#[test]
fn align_tolerates_whitespace_differences() {
    let sentences = strings(&["A  long\nsentence.", "Next one."]);
    let token_text = "A long sentence. ZZCITE000001ZZ\n\nNext   one.";

    let alignment = align_tokens(&sentences, token_text).expect("aligns");
    assert_eq!(
        alignment.token_lists,
        vec![strings(&["ZZCITE000001ZZ"]), Vec::<String>::new()]
    );
}

#[test]
fn align_attributes_trailing_tokens_to_last_sentence() {
    let sentences = strings(&["First.", "Second."]);
    let token_text = "ZZCITE000001ZZFirst. Second.\ncaption fragment ZZCITE000002ZZ|ZZCITE000003ZZ";

    let alignment = align_tokens(&sentences, token_text).expect("aligns");
    assert_eq!(alignment.token_lists.len(), 2);
    assert_eq!(alignment.token_lists[0], strings(&["ZZCITE000001ZZ"]));
    assert_eq!(
        alignment.token_lists[1],
        strings(&["ZZCITE000002ZZ", "ZZCITE000003ZZ"])
    );
    assert_eq!(alignment.trailing_tokens, 2);
    assert_eq!(alignment.unmatched_trailing_chars, "captionfragment|".len());
}

#[test]
fn align_without_sentences_drops_tokens() {
    let alignment = align_tokens(&[], "ZZCITE000001ZZ").expect("aligns");
    assert!(alignment.token_lists.is_empty());
    assert_eq!(alignment.dropped_tokens, 1);
}

#[test]
fn align_reports_divergence() {
    let sentences = strings(&["Alpha.", "Beta."]);
    let error = align_tokens(&sentences, "Alpha. Gamma.").expect_err("diverges");

    assert_eq!(
        error,
        AlignmentError::Diverged {
            sentence: 1,
            offset: 7,
            expected: 'B',
            found: Some('G'),
        }
    );
}

#[test]
fn resolve_deduplicates_within_sentence_and_tolerates_unknown_tokens() {
    let map = CitationMap::new(vec![
        CitationEntry {
            token: citation_token(1),
            id: CitationId::Named("a".to_string()),
            kind: CitationKind::Defined,
            urls: strings(&["http://a.test", "http://b.test"]),
            span: 0..1,
        },
        CitationEntry {
            token: citation_token(2),
            id: CitationId::Anonymous(1),
            kind: CitationKind::Anonymous,
            urls: strings(&["http://b.test", "http://c.test"]),
            span: 2..3,
        },
    ]);
    let token_lists = vec![
        vec![citation_token(1), citation_token(2)],
        vec![citation_token(1), "ZZCITE000009ZZ".to_string()],
        Vec::new(),
    ];

    let resolution = resolve_urls(&token_lists, &map);
    assert_eq!(
        resolution.url_lists,
        vec![
            strings(&["http://a.test", "http://b.test", "http://c.test"]),
            strings(&["http://a.test", "http://b.test"]),
            Vec::<String>::new(),
        ]
    );
    assert_eq!(resolution.unknown_tokens, strings(&["ZZCITE000009ZZ"]));
}

#[test]
fn pipeline_reuses_named_citation_urls() {
    let document =
        run("The sky is blue.<ref name=\"a\">http://x.test</ref> It may rain.<ref name=\"a\"/>");

    assert_eq!(document.sentences, strings(&["The sky is blue.", "It may rain."]));
    assert_eq!(
        document.url_lists,
        vec![strings(&["http://x.test"]), strings(&["http://x.test"])]
    );
    assert_eq!(document.stats.reference_footnotes, 1);
}

#[test]
fn pipeline_handles_text_without_citations() {
    let document = run("Plain text only.");

    assert_eq!(document.sentences, strings(&["Plain text only."]));
    assert_eq!(document.url_lists, vec![Vec::<String>::new()]);
    assert_eq!(
        format_records(&document.records()),
        "Plain text only.\n"
    );
}

#[test]
fn pipeline_attributes_anonymous_citation_without_url_as_empty() {
    let document = run("A claim.<ref>Smith, J. (2001). A Book. Publisher.</ref> Another claim.");

    assert_eq!(document.sentences.len(), 2);
    assert_eq!(document.url_lists, vec![Vec::<String>::new(), Vec::new()]);
    assert_eq!(document.stats.anonymous_footnotes, 1);
}

#[test]
fn pipeline_collapses_duplicate_urls_within_a_sentence() {
    let document = run(
        "Rain falls<ref>http://dup.test</ref> on the plain.<ref>{{cite web|url=http://dup.test}} http://other.test</ref> Sun shines.<ref>http://dup.test</ref>",
    );

    assert_eq!(
        document.url_lists,
        vec![
            strings(&["http://dup.test", "http://other.test"]),
            strings(&["http://dup.test"]),
        ]
    );
}

#[test]
fn pipeline_attributes_trailing_fragment_citations_to_last_sentence() {
    let document = run(
        "First point.<ref>http://one.test</ref> Second point.\n\n<ref>http://late.test</ref>\n== References ==\n<references/>",
    );

    assert_eq!(document.sentences, strings(&["First point.", "Second point."]));
    assert_eq!(
        document.url_lists,
        vec![strings(&["http://one.test"]), strings(&["http://late.test"])]
    );
    assert_eq!(document.stats.truncated_at_heading.as_deref(), Some("References"));
}

#[test]
fn pipeline_sentences_cover_the_plain_rendering() {
    let document = run(
        "'''Alpha''' is a [[letter|symbol]].<ref>http://a.test</ref> It comes first.\n\n* Beta follows it.<ref name=b>http://b.test</ref>\n{{Infobox|x=1}}Gamma is third.",
    );

    let joined = document.sentences.join(" ");
    let normalize = |text: &str| text.split_whitespace().collect::<Vec<_>>().join(" ");
    assert_eq!(normalize(&joined), normalize(&document.plain_text));
    assert_eq!(document.sentences.len(), document.url_lists.len());
}

#[test]
fn pipeline_output_has_no_trailing_tab_and_strips_tabs() {
    let document = run("Tabbed\ttext here.<ref>http://t.test</ref> Quiet sentence.");
    let output = format_records(&document.records());

    assert_eq!(output, "Tabbedtext here.\thttp://t.test\nQuiet sentence.\n");

    let mut written = Vec::new();
    write_records(&mut written, &document.records()).expect("records write");
    assert_eq!(String::from_utf8(written).expect("records are UTF-8"), output);
}

#[test]
fn pipeline_aligns_citations_next_to_quotes_and_emphasis() {
    let document = run("''The Times''<ref>http://t.test</ref>'s editor resigned. He left.");

    assert_eq!(
        document.sentences,
        strings(&["The Times's editor resigned.", "He left."])
    );
    assert_eq!(
        document.url_lists,
        vec![strings(&["http://t.test"]), Vec::new()]
    );

    let document = run("He said '<ref>http://q.test</ref>' then left.");

    assert_eq!(document.sentences, strings(&["He said '' then left."]));
    assert_eq!(document.url_lists, vec![strings(&["http://q.test"])]);
}

#[test]
fn pipeline_keeps_citations_from_templates_captions_and_headings() {
    let document = run(
        "{{Infobox town|population=5<ref>http://pop.test</ref>}}\nTown is big.[[File:Map.png|thumb|Map<ref>http://cap.test</ref>]] It grew.\n== Growth<ref>http://head.test</ref> ==\nIt shrank.",
    );

    assert_eq!(
        document.sentences,
        strings(&["Town is big.", "It grew.", "It shrank."])
    );
    assert_eq!(
        document.url_lists,
        vec![
            strings(&["http://pop.test", "http://cap.test"]),
            strings(&["http://head.test"]),
            Vec::new(),
        ]
    );
    assert_eq!(document.stats.footnotes, 3);
    assert_eq!(document.stats.tokens_aligned, 3);
    assert_eq!(document.stats.lost_tokens, 0);
}

/// Renders only the text before the first footnote or token.
struct TruncatingRenderer;

impl MarkupRenderer for TruncatingRenderer {
    fn name(&self) -> &str {
        "truncating"
    }

    fn render(&self, markup: &str) -> Result<String> {
        let cut = [markup.find('<'), markup.find("ZZCITE")]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(markup.len());
        Ok(markup[..cut].trim().to_string())
    }
}

#[test]
fn pipeline_counts_tokens_a_renderer_loses() {
    let document = builtin_pipeline()
        .process_document(
            "Kept words here. <ref>http://gone.test</ref>",
            &TruncatingRenderer,
            &RuleSentenceSplitter::default(),
        )
        .expect("document processes");

    assert_eq!(document.sentences, strings(&["Kept words here."]));
    assert_eq!(document.url_lists, vec![Vec::<String>::new()]);
    assert_eq!(document.stats.footnotes, 1);
    assert_eq!(document.stats.lost_tokens, 1);
}

struct FlakyRenderer {
    calls: Cell<usize>,
}

impl MarkupRenderer for FlakyRenderer {
    fn name(&self) -> &str {
        "flaky"
    }

    fn render(&self, markup: &str) -> Result<String> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if call == 0 {
            Ok(markup.to_string())
        } else {
            Ok(format!("Changed {markup}"))
        }
    }
}

#[test]
fn pipeline_fails_loudly_when_renderings_diverge() {
    let renderer = FlakyRenderer {
        calls: Cell::new(0),
    };
    let error = builtin_pipeline()
        .process_document(
            "Stable text. More text.",
            &renderer,
            &RuleSentenceSplitter::default(),
        )
        .expect_err("divergent renderings are fatal");

    assert!(matches!(
        error.downcast_ref::<AlignmentError>(),
        Some(AlignmentError::Diverged { sentence: 0, .. })
    ));
}

#[cfg(unix)]
#[test]
fn command_adapters_filter_through_external_programs() {
    let renderer = CommandRenderer::parse("cat").expect("command parses");
    assert_eq!(renderer.name(), "cat");
    assert_eq!(
        renderer.render("Sky is blue.").expect("cat runs"),
        "Sky is blue."
    );

    let splitter = CommandSplitter::parse("cat").expect("command parses");
    assert_eq!(
        splitter.split("One.\n\n  Two.  \n").expect("cat runs"),
        strings(&["One.", "Two."])
    );
}

#[cfg(unix)]
#[test]
fn command_adapters_report_empty_and_failing_commands() {
    assert!(CommandRenderer::parse("   ").is_err());

    let failing = CommandRenderer::parse("false").expect("command parses");
    assert!(failing.render("text").is_err());
}

/// Builds one sentence per piece. The layout byte wraps the sentence in
/// emphasis, a template, quotes or a list item, with the citation placed
/// next to the markup it is most likely to disturb.
fn generated_markup(pieces: &[(Vec<String>, u8, usize, u8)]) -> (String, Vec<Vec<String>>) {
    let mut defined = HashMap::<usize, String>::new();
    let mut expected = Vec::new();
    let mut parts = Vec::new();

    for (index, (words, kind, name, layout)) in pieces.iter().enumerate() {
        let (cite, urls) = match kind {
            1 => {
                let url = format!("http://anon{index}.test");
                (format!("<ref>{url}</ref>"), vec![url])
            }
            2 => {
                let url = format!("http://named{name}.test");
                defined.entry(*name).or_insert_with(|| url.clone());
                (format!("<ref name=\"n{name}\">{url}</ref>"), vec![url])
            }
            3 => (
                format!("<ref name=\"n{name}\"/>"),
                defined.get(name).cloned().into_iter().collect(),
            ),
            _ => (String::new(), Vec::new()),
        };

        let words = words.join(" ");
        let sentence = match layout {
            1 => format!("Alpha ''{words}'' today.{cite}"),
            2 => format!("Alpha '''{words}'''{cite}'s today."),
            3 => format!("Alpha {words} {{{{note|aside{cite}}}}} today."),
            4 => format!("Alpha said '{cite}' {words} today."),
            5 => format!("\n* Alpha {words} today.{cite}\n"),
            _ => format!("Alpha {words} today.{cite}"),
        };
        parts.push(sentence);
        expected.push(urls);
    }

    (parts.join(" "), expected)
}

proptest! {
    #[test]
    fn pipeline_attributes_generated_citations(
        pieces in prop::collection::vec(
            (prop::collection::vec("[a-z]{2,8}", 1..6), 0u8..4, 0usize..3, 0u8..6),
            1..8,
        )
    ) {
        let (markup, expected) = generated_markup(&pieces);
        let first = run(&markup);
        let second = run(&markup);

        prop_assert_eq!(first.sentences.len(), pieces.len());
        prop_assert_eq!(first.sentences.len(), first.url_lists.len());
        prop_assert_eq!(&first.url_lists, &expected);
        prop_assert_eq!(first.stats.lost_tokens, 0);
        prop_assert_eq!(&first.sentences, &second.sentences);
        prop_assert_eq!(&first.url_lists, &second.url_lists);
    }

    #[test]
    fn align_keeps_one_list_per_sentence(
        sentences in prop::collection::vec("[A-Z][a-z]{1,6}( [a-z]{1,6}){0,4}\\.", 0..6),
        cites in prop::collection::vec(0usize..4, 0..6),
    ) {
        let mut token_text = String::new();
        let mut number = 0usize;
        for (index, sentence) in sentences.iter().enumerate() {
            token_text.push_str(sentence);
            for _ in 0..cites.get(index).copied().unwrap_or(0) {
                number += 1;
                token_text.push_str(&citation_token(number));
            }
            token_text.push(' ');
        }

        let alignment = align_tokens(&sentences, &token_text).expect("aligns");
        prop_assert_eq!(alignment.token_lists.len(), sentences.len());
        let total = alignment.token_count() + alignment.dropped_tokens;
        prop_assert_eq!(total, number);
    }
}
