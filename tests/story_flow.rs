use storyhatch::flow::CreationStep;
use storyhatch::generation::ChapterTask;
use storyhatch::models::Plan;
use storyhatch::outline::parse_outline;
use storyhatch::usage::{usage_status, Remaining};
use storyhatch::viewer::{into_spreads, page_views, split_into_pages, WORDS_PER_PAGE};
use uuid::Uuid;

const LOST_KITTEN_OUTLINE: &str = r#"{
    "title": "The Lost Kitten",
    "chapters": [
        {"chapter_number": 1, "title": "A Whisker in the Wind", "summary": "Milo the shy kitten chases a butterfly far from home."},
        {"chapter_number": 2, "title": "The Deep Dark Woods", "summary": "Lost among tall trees, Milo meets Olga the wise owl."},
        {"chapter_number": 3, "title": "A Plan Takes Flight", "summary": "Olga teaches Milo to read the stars for directions."},
        {"chapter_number": 4, "title": "The Rushing River", "summary": "Milo bravely crosses a river on a floating log."},
        {"chapter_number": 5, "title": "Home at Last", "summary": "Milo follows the owl's path home to a warm welcome."}
    ]
}"#;

#[test]
fn a_valid_outline_parses_with_complete_stubs() {
    let outline = parse_outline(LOST_KITTEN_OUTLINE).unwrap();
    assert!(outline.chapters.len() >= 5 && outline.chapters.len() <= 6);
    for chapter in &outline.chapters {
        assert!(!chapter.title.trim().is_empty());
        assert!(!chapter.summary.trim().is_empty());
    }
}

#[test]
fn the_wizard_walks_from_form_to_complete() {
    let outline = parse_outline(LOST_KITTEN_OUTLINE).unwrap();
    let total = outline.chapters.len();
    let story_id = Uuid::new_v4();

    let mut step = CreationStep::Form
        .outline_ready(Uuid::new_v4(), outline.clone())
        .unwrap()
        .approve(story_id)
        .unwrap();

    // The client fans chapter calls out concurrently; completions arrive in
    // any order, and each one ticks the same counter.
    let tasks: Vec<ChapterTask> = outline
        .chapters
        .iter()
        .enumerate()
        .map(|(i, chapter)| ChapterTask {
            chapter_number: chapter.chapter_number,
            title: chapter.title.clone(),
            summary: chapter.summary.clone(),
            is_last_chapter: i + 1 == total,
        })
        .collect();
    assert_eq!(tasks.iter().filter(|t| t.is_last_chapter).count(), 1);
    for _ in &tasks {
        step = step.chapter_finished().unwrap();
    }

    let step = step.cover_finished().unwrap();
    assert_eq!(step, CreationStep::Complete { story_id });
}

#[test]
fn an_exhausted_free_account_is_blocked_before_generation() {
    // story_count=5 on the free plan: the gate the outline endpoint checks
    // before spending anything on the model.
    let status = usage_status(Plan::Free, 5);
    assert!(!status.can_generate);
    assert_eq!(status.remaining, Remaining::Limited(0));
}

#[test]
fn viewer_pages_preserve_the_story_text() {
    let chapters: Vec<String> = (1..=5)
        .map(|n| {
            (0..180)
                .map(|i| format!("chapter{}word{}", n, i))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();

    let pages = split_into_pages(chapters.iter().map(String::as_str), WORDS_PER_PAGE);

    let reassembled: Vec<&str> = pages.iter().flat_map(|p| p.split_whitespace()).collect();
    let original: Vec<&str> = chapters.iter().flat_map(|c| c.split_whitespace()).collect();
    assert_eq!(reassembled, original);

    // Every chapter opens a fresh page.
    for n in 1..=5 {
        let first_word = format!("chapter{}word0", n);
        assert!(
            pages.iter().any(|p| p.starts_with(&first_word)),
            "chapter {} does not start a page",
            n
        );
    }

    let views = page_views(Some("https://cdn.example.com/covers/kitten.png"), pages);
    let spreads = into_spreads(views);
    assert_eq!(spreads[0].len(), 1);
    assert!(spreads.iter().skip(1).all(|s| s.len() <= 2));
}
