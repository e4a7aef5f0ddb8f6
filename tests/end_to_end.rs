use std::collections::BTreeMap;
use std::fs;

use extsort::Config;

fn sort_in_scratch(input: &str, config_fn: impl FnOnce(&mut Config)) -> String {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.work_dir = dir.path().to_path_buf();
    config_fn(&mut config);
    extsort::sort(input.as_bytes(), &config).unwrap();
    let output = fs::read_to_string(config.output_path()).unwrap();

    let leftover: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("tmp"))
        .collect();
    assert!(leftover.is_empty(), "left temp files behind: {leftover:?}");

    output
}

fn multiset(text: &str) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for line in text.lines() {
        *counts.entry(line).or_insert(0) += 1;
    }
    counts
}

#[test]
fn empty_input_produces_empty_output() {
    let output = sort_in_scratch("", |_| {});
    assert_eq!(output, "");
}

#[test]
fn single_line() {
    let output = sort_in_scratch("hello\n", |_| {});
    assert_eq!(output, "hello\n");
}

#[test]
fn already_sorted() {
    let output = sort_in_scratch("a\nb\nc\n", |_| {});
    assert_eq!(output, "a\nb\nc\n");
}

#[test]
fn reverse_sorted() {
    let output = sort_in_scratch("c\nb\na\n", |_| {});
    assert_eq!(output, "a\nb\nc\n");
}

#[test]
fn duplicates_are_preserved() {
    let output = sort_in_scratch("b\na\nb\na\n", |_| {});
    assert_eq!(output, "a\na\nb\nb\n");
}

#[test]
fn forces_multiple_slabs_and_merge_rounds() {
    // A tiny budget forces many slabs (and so many run files and several
    // levels of pairwise merge) even for a small input.
    let mut lines: Vec<String> = (0..500).map(|i| format!("{:05}", (i * 7919) % 500)).collect();
    let input = lines.join("\n") + "\n";

    let output = sort_in_scratch(&input, |config| {
        config.max_strings_in_memory = 40;
        config.num_threads = Some(4);
        config.files_queue_capacity = 4;
    });

    lines.sort();
    let expected = lines.join("\n") + "\n";
    assert_eq!(output, expected);
}

#[test]
fn idempotent_on_already_sorted_input() {
    let input = "a\nb\nb\nc\nd\nd\nd\ne\n";
    let once = sort_in_scratch(input, |_| {});
    let twice = sort_in_scratch(&once, |_| {});
    assert_eq!(once, twice);
}

#[test]
fn composition_matches_sorting_the_concatenation() {
    let left = "d\nb\nf\na\n";
    let right = "c\ne\na\ng\n";

    let sorted_left = sort_in_scratch(left, |_| {});
    let sorted_right = sort_in_scratch(right, |_| {});
    let resorted = sort_in_scratch(&(sorted_left + &sorted_right), |_| {});

    let direct = sort_in_scratch(&(left.to_string() + right), |_| {});

    assert_eq!(multiset(&resorted), multiset(&direct));
    let lines: Vec<&str> = resorted.lines().collect();
    assert!(lines.windows(2).all(|w| w[0].as_bytes() <= w[1].as_bytes()));
}

#[test]
fn oversized_lines_are_truncated_not_dropped() {
    let long = "x".repeat(50);
    let input = format!("{long}\nshort\n");
    let output = sort_in_scratch(&input, |config| config.max_line_len = 10);
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().any(|l| l.len() == 9));
}
