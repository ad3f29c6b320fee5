use northbase_core::path::{sanitize, sanitize_prefix};
use northbase_core::NorthbaseError;
use std::path::Path;

struct TestCase {
    name: &'static str,
    input: &'static str,
    expected: Option<&'static str>,
}

#[test]
fn test_sanitize_table_driven() {
    let test_cases = vec![
        TestCase { name: "nested path", input: "a/b/c", expected: Some("a/b/c") },
        TestCase { name: "plain file", input: "a.txt", expected: Some("a.txt") },
        TestCase { name: "leading slash stripped", input: "/notes/today.md", expected: Some("notes/today.md") },
        TestCase { name: "many leading slashes", input: "///x", expected: Some("x") },
        TestCase { name: "backslashes normalized", input: "dir\\sub\\f.txt", expected: Some("dir/sub/f.txt") },
        TestCase { name: "dots inside names are fine", input: "v1.2/..hidden", expected: Some("v1.2/..hidden") },
        TestCase { name: "parent escape", input: "../x", expected: None },
        TestCase { name: "parent in the middle", input: "/a/../b", expected: None },
        TestCase { name: "current dir segment", input: "a/./b", expected: None },
        TestCase { name: "empty", input: "", expected: None },
        TestCase { name: "only slashes", input: "///", expected: None },
        TestCase { name: "empty segment", input: "a//b", expected: None },
        TestCase { name: "trailing slash", input: "a/b/", expected: None },
        TestCase { name: "whitespace segment", input: "a/ /b", expected: None },
        TestCase { name: "backslash parent escape", input: "..\\etc\\passwd", expected: None },
    ];

    for case in test_cases {
        let result = sanitize(case.input);
        match case.expected {
            Some(expected) => {
                let rel = result.unwrap_or_else(|e| panic!("[{}] expected success, got {e}", case.name));
                assert_eq!(rel.as_str(), expected, "[{}]", case.name);
            }
            None => {
                assert!(
                    matches!(result, Err(NorthbaseError::InvalidPath { .. })),
                    "[{}] expected InvalidPath for {:?}, got {:?}",
                    case.name,
                    case.input,
                    result
                );
            }
        }
    }
}

#[test]
fn test_sanitize_is_idempotent_on_accepted_paths() {
    for input in ["a/b/c", "/x/y.txt", "k\\v"] {
        let once = sanitize(input).unwrap();
        let twice = sanitize(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }
}

#[test]
fn test_relative_path_maps_under_root() {
    let rel = sanitize("notes/2024/today.md").unwrap();
    let full = rel.under(Path::new("/mirror"));
    assert_eq!(full, Path::new("/mirror").join("notes").join("2024").join("today.md"));
}

#[test]
fn test_sanitize_prefix() {
    assert_eq!(sanitize_prefix("").unwrap(), "");
    assert_eq!(sanitize_prefix("/").unwrap(), "");
    assert_eq!(sanitize_prefix("notes/").unwrap(), "notes/");
    assert_eq!(sanitize_prefix("\\notes\\2024").unwrap(), "notes/2024");
    assert!(sanitize_prefix("../").is_err());
    assert!(sanitize_prefix("a//").is_err());
    assert!(sanitize_prefix("a/./b").is_err());
}
