use forgecore::output::{format_human, HumanOutput};

#[test]
fn format_human_includes_sections() {
    let mut human = HumanOutput::new("Issue tagged with: bug");
    human.push_summary("target", "test#1");
    human.push_detail("Issue **un**tagged with: easyfix");
    human.push_warning("events log unavailable");
    human.push_next_step("forgecore issue show test#1");

    let rendered = format_human(&human);
    assert!(rendered.contains("Issue tagged with: bug"));
    assert!(rendered.contains("Summary:"));
    assert!(rendered.contains("- target: test#1"));
    assert!(rendered.contains("Details:"));
    assert!(rendered.contains("- Issue **un**tagged with: easyfix"));
    assert!(rendered.contains("Warnings:"));
    assert!(rendered.contains("- events log unavailable"));
    assert!(rendered.contains("Next steps:"));
    assert!(rendered.contains("- forgecore issue show test#1"));
}

#[test]
fn format_human_omits_empty_sections() {
    let human = HumanOutput::new("forgecore init: already initialized");
    let rendered = format_human(&human);
    assert_eq!(rendered, "forgecore init: already initialized");
}

#[test]
fn format_human_lists_extra_changes() {
    let mut human = HumanOutput::new("Issue tagged with: tag3");
    human.push_change("Issue **un**tagged with: tag1");
    let rendered = format_human(&human);
    assert_eq!(
        rendered,
        "Issue tagged with: tag3\n\nChanges:\n- Issue **un**tagged with: tag1"
    );
}
